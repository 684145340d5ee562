use polars::prelude::*;
use std::collections::HashMap;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Header,
    End,
    Trigger,
    Logic,
    Analog,
    FrameBegin,
    FrameEnd,
}

/// Samples of one or more analog channels delivered together.
///
/// `data[i]` holds the samples of `channels[i]`. Payloads where the two
/// lengths differ are ignored by [`AcquiredData::parse_packet`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogPayload {
    channels: Vec<String>,
    data: Vec<Vec<f32>>,
    unit: Option<String>,
}

impl AnalogPayload {
    pub fn new(channels: Vec<String>, data: Vec<Vec<f32>>) -> Self {
        Self {
            channels,
            data,
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn data(&self) -> &[Vec<f32>] {
        &self.data
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn num_samples(&self) -> usize {
        self.data.first().map_or(0, Vec::len)
    }
}

/// Bit-packed logic samples, `unit_size` bytes per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicPayload {
    unit_size: usize,
    data: Vec<u8>,
}

impl LogicPayload {
    pub fn new(unit_size: usize, data: Vec<u8>) -> Self {
        Self { unit_size, data }
    }

    pub fn unit_size(&self) -> usize {
        self.unit_size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn num_samples(&self) -> usize {
        if self.unit_size == 0 {
            0
        } else {
            self.data.len() / self.unit_size
        }
    }
}

/// One unit of data delivered to a session's datafeed callback.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Header,
    End,
    Trigger,
    Logic(LogicPayload),
    Analog(AnalogPayload),
    FrameBegin,
    FrameEnd,
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Header => PacketType::Header,
            Packet::End => PacketType::End,
            Packet::Trigger => PacketType::Trigger,
            Packet::Logic(_) => PacketType::Logic,
            Packet::Analog(_) => PacketType::Analog,
            Packet::FrameBegin => PacketType::FrameBegin,
            Packet::FrameEnd => PacketType::FrameEnd,
        }
    }
}

pub fn is_analog_packet(packet: &Packet) -> bool {
    packet.packet_type() == PacketType::Analog
}

pub fn is_logic_packet(packet: &Packet) -> bool {
    packet.packet_type() == PacketType::Logic
}

/// Channel names carried by an analog packet, empty for every other packet.
pub fn packet_channels(packet: &Packet) -> Vec<String> {
    match packet {
        Packet::Analog(payload) => payload.channels().to_vec(),
        _ => Vec::new(),
    }
}

/// Analog samples collected from a session, per channel, in arrival order.
///
/// Nothing here limits growth: bound the acquisition itself (e.g. with
/// `limit_samples`) when running long sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AcquiredData {
    order: Vec<String>,
    samples: HashMap<String, Vec<f32>>,
}

impl AcquiredData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel names in the order they were first seen.
    pub fn channel_names(&self) -> &[String] {
        &self.order
    }

    pub fn channel(&self, name: &str) -> Option<&[f32]> {
        self.samples.get(name).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn total_samples(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    /// Append the samples of an analog packet. Logic and control packets
    /// are ignored.
    pub fn parse_packet(&mut self, packet: &Packet) -> &mut Self {
        log::trace!("parse_packet: packet type {:?}", packet.packet_type());
        match packet {
            Packet::Analog(payload) => {
                if payload.channels().len() != payload.data().len() {
                    log::warn!(
                        "parse_packet: dropping analog packet with {} channels but {} data chunks",
                        payload.channels().len(),
                        payload.data().len()
                    );
                    return self;
                }
                for (channel, chunk) in payload.channels().iter().zip(payload.data()) {
                    log::trace!("parse_packet: channel {} {}", channel, chunk.len());
                    self.extend_channel(channel, chunk);
                }
            }
            Packet::Logic(payload) => {
                // TODO: collect logic samples once there is a per-bit representation to store them in
                log::trace!("parse_packet: skipping {} logic samples", payload.num_samples());
            }
            _ => {}
        }
        self
    }

    fn extend_channel(&mut self, channel: &str, chunk: &[f32]) {
        match self.samples.get_mut(channel) {
            Some(samples) => samples.extend_from_slice(chunk),
            None => {
                self.order.push(channel.to_string());
                self.samples.insert(channel.to_string(), chunk.to_vec());
            }
        }
    }

    /// One `f32` column per channel. Fails if channels hold different
    /// numbers of samples.
    pub fn to_dataframe(&self) -> Result<DataFrame, PolarsError> {
        let columns = self
            .order
            .iter()
            .map(|name| {
                let samples = self.samples.get(name).map(Vec::as_slice).unwrap_or(&[][..]);
                Column::new(name.as_str().into(), samples)
            })
            .collect::<Vec<_>>();

        DataFrame::new(columns)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), PolarsError> {
        let mut df = self.to_dataframe()?;
        CsvWriter::new(writer).include_header(true).finish(&mut df)
    }
}

/// Accumulate an analog packet into `data`, returning it for chaining.
pub fn parse_packet_data<'a>(packet: &Packet, data: &'a mut AcquiredData) -> &'a mut AcquiredData {
    data.parse_packet(packet)
}
