// Data acquisition through the session helpers
//
// This example configures the demo device, runs one bounded acquisition and
// one open-ended acquisition that is stopped from the data callback, and
// exports the collected analog samples.

use polars::prelude::DataFrame;
use sigrok_wrapper::{is_analog_packet, AcquiredData, Context, DemoBackend, Driver, PacketType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("sigrok-wrapper Data Acquisition Example");
    println!("=======================================\n");

    let context = Context::new(DemoBackend::default());
    let mut driver = Driver::new(&context, "demo:logic_channels=4,analog_channels=2")?;
    println!("Using {}\n", driver);

    // Example 1: Bounded acquisition
    println!("1. Acquisition limited to 500 samples");
    let device = driver.open()?;
    device.set("samplerate", 1_000_000u64, None)?;
    device.set("limit_samples", 500u64, None)?;
    device.set_str("pattern", "square", Some("A1"))?;
    device.set("amplitude", 3.3, Some("A1"))?;

    context.session_create()?;
    context.session_add_device(device)?;

    let data = Arc::new(Mutex::new(AcquiredData::new()));
    let sink = data.clone();
    context.session_start(
        move |_device, packet| {
            if packet.packet_type() == PacketType::Header {
                println!("   Acquisition started");
            }
            if let Ok(mut data) = sink.lock() {
                data.parse_packet(packet);
            }
        },
        Some(Box::new(|| println!("   Acquisition ended"))),
    )?;
    context.session_run()?;

    let frame = match data.lock() {
        Ok(data) => data.to_dataframe()?,
        Err(_) => return Err("data callback panicked".into()),
    };
    println!("   Captured {} samples per channel", frame.height());
    print_data_summary(&frame)?;

    // Example 2: Open-ended acquisition stopped from the callback
    println!("\n2. Open-ended acquisition, stopped after 10 analog packets");
    // Closing forgets the session; the next create starts from scratch.
    context.session_close();
    let session = context.session_create()?;
    driver.device().set("limit_samples", 0u64, None)?;
    context.session_add_device(driver.device())?;
    let stopper = session.stopper();
    let packets = Arc::new(AtomicUsize::new(0));
    let counter = packets.clone();
    context.session_start(
        move |_device, packet| {
            if is_analog_packet(packet) && counter.fetch_add(1, Ordering::SeqCst) + 1 == 10 {
                if let Err(e) = stopper.stop() {
                    eprintln!("   Stop failed: {}", e);
                }
            }
        },
        None,
    )?;
    context.session_run()?;
    println!("   Received {} analog packets", packets.load(Ordering::SeqCst));

    context.session_close();
    driver.close()?;

    // Example 3: CSV export
    println!("\n3. CSV export of the first acquisition:");
    if let Ok(data) = data.lock() {
        let mut csv = Vec::new();
        data.write_csv(&mut csv)?;
        for line in String::from_utf8_lossy(&csv).lines().take(5) {
            println!("   {}", line);
        }
    }

    println!("\nData acquisition examples completed!");
    Ok(())
}

// Helper function to print basic statistics about acquired data
fn print_data_summary(data: &DataFrame) -> Result<(), Box<dyn std::error::Error>> {
    for column in data.get_columns() {
        let series = column.f32()?;
        let values: Vec<f32> = series.into_no_null_iter().collect();

        if !values.is_empty() {
            let min = values.iter().fold(f32::INFINITY, |a, &b| a.min(b));
            let max = values.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
            let mean = values.iter().sum::<f32>() / values.len() as f32;

            println!(
                "   {}: {:.3}V to {:.3}V (mean: {:.3}V)",
                column.name(),
                min,
                max,
                mean
            );
        }
    }

    Ok(())
}
