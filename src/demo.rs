//! In-process backend with a single `demo` driver.
//!
//! Modelled on libsigrok's demo driver: a device with logic channels
//! `D0..` and analog channels `A0..`, a `Logic` channel group plus one
//! group per analog channel, and a session that generates deterministic
//! data. Useful for trying the facade without hardware and as the backend
//! of this crate's tests.

use crate::backend::{
    Backend, BackendError, ChannelInfo, ChannelType, Configurable, DatafeedCallback,
    DeviceHandle, RawDevice, RawDriver, RawSession, StoppedCallback,
};
use crate::config_key::{Capability, ConfigKey, ConfigValue};
use crate::driver_spec::DriverOptions;
use crate::packet::{AnalogPayload, LogicPayload, Packet};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

const LOGIC_PATTERNS: [&str; 7] = [
    "sigrok",
    "random",
    "incremental",
    "walking-one",
    "walking-zero",
    "all-low",
    "all-high",
];

const ANALOG_PATTERNS: [&str; 4] = ["sine", "square", "triangle", "sawtooth"];

const SAMPLERATES: [u64; 8] = [
    1_000,
    10_000,
    100_000,
    200_000,
    1_000_000,
    10_000_000,
    50_000_000,
    200_000_000,
];

/// Defaults of the demo backend. Scan options override the channel counts.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub logic_channels: usize,
    pub analog_channels: usize,
    /// Samples per channel in each generated packet.
    pub chunk_samples: usize,
    pub samplerate: u64,
    /// `0` runs until the session is stopped.
    pub limit_samples: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            logic_channels: 8,
            analog_channels: 4,
            chunk_samples: 16,
            samplerate: 200_000,
            limit_samples: 64,
        }
    }
}

/// Counts of backend open/close calls across all demo devices.
#[derive(Debug, Default)]
pub struct DemoStats {
    open_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl DemoStats {
    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

pub struct DemoBackend {
    driver: Arc<DemoDriver>,
    stats: Arc<DemoStats>,
}

impl DemoBackend {
    pub fn new(config: DemoConfig) -> Self {
        let stats = Arc::new(DemoStats::default());
        Self {
            driver: Arc::new(DemoDriver {
                config,
                stats: stats.clone(),
            }),
            stats,
        }
    }

    pub fn stats(&self) -> Arc<DemoStats> {
        self.stats.clone()
    }
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::new(DemoConfig::default())
    }
}

impl Backend for DemoBackend {
    fn drivers(&self) -> Vec<Arc<dyn RawDriver>> {
        vec![self.driver.clone()]
    }

    fn create_session(&self) -> Result<Arc<dyn RawSession>, BackendError> {
        Ok(Arc::new(DemoSession::new(self.driver.config.chunk_samples)))
    }
}

pub struct DemoDriver {
    config: DemoConfig,
    stats: Arc<DemoStats>,
}

impl DemoDriver {
    fn channel_count(options: &DriverOptions, key: &str, default: usize) -> Result<usize, BackendError> {
        match options.get(key) {
            Some(text) => text
                .parse()
                .map_err(|_| BackendError::Arg(format!("'{}' is not a valid value for {}", text, key))),
            None => Ok(default),
        }
    }
}

impl RawDriver for DemoDriver {
    fn name(&self) -> &str {
        "demo"
    }

    fn long_name(&self) -> &str {
        "Demo driver and pattern generator"
    }

    fn scan(&self, options: &DriverOptions) -> Result<Vec<DeviceHandle>, BackendError> {
        if options.get("conn").is_some() {
            log::debug!("demo: no device behind a connection, scan finds nothing");
            return Ok(Vec::new());
        }
        for (key, _) in options.iter() {
            if key != "logic_channels" && key != "analog_channels" {
                log::debug!("demo: ignoring unsupported scan option '{}'", key);
            }
        }

        let logic = Self::channel_count(options, "logic_channels", self.config.logic_channels)?;
        let analog = Self::channel_count(options, "analog_channels", self.config.analog_channels)?;
        if logic == 0 && analog == 0 {
            return Err(BackendError::Arg("demo device needs at least one channel".to_string()));
        }

        let device: DeviceHandle = Arc::new(DemoDevice::new(&self.config, logic, analog, self.stats.clone()));
        Ok(vec![device])
    }
}

struct Entry {
    key: ConfigKey,
    capabilities: Vec<Capability>,
    choices: Vec<ConfigValue>,
}

impl Entry {
    fn new(key: ConfigKey, capabilities: &[Capability]) -> Self {
        Self {
            key,
            capabilities: capabilities.to_vec(),
            choices: Vec::new(),
        }
    }

    fn with_choices(mut self, choices: impl IntoIterator<Item = ConfigValue>) -> Self {
        self.choices = choices.into_iter().collect();
        self
    }
}

/// Key store shared by the device and its channel groups. Every access
/// fails while the owning device is closed.
struct DemoConfigurable {
    open: Arc<AtomicBool>,
    entries: Vec<Entry>,
    values: Mutex<HashMap<ConfigKey, ConfigValue>>,
}

impl DemoConfigurable {
    fn new(open: Arc<AtomicBool>, entries: Vec<Entry>, values: Vec<(ConfigKey, ConfigValue)>) -> Self {
        Self {
            open,
            entries,
            values: Mutex::new(values.into_iter().collect()),
        }
    }

    fn entry(&self, key: ConfigKey) -> Result<&Entry, BackendError> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .ok_or_else(|| BackendError::NotApplicable(format!("key '{}' not supported", key)))
    }

    fn check_open(&self) -> Result<(), BackendError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::DeviceClosed("demo device is not open".to_string()))
        }
    }

    fn require(&self, key: ConfigKey, capability: Capability) -> Result<&Entry, BackendError> {
        let entry = self.entry(key)?;
        if !entry.capabilities.contains(&capability) {
            return Err(BackendError::NotApplicable(format!(
                "key '{}' does not support {:?}",
                key, capability
            )));
        }
        Ok(entry)
    }

    fn value(&self, key: ConfigKey) -> Option<ConfigValue> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }
}

impl Configurable for DemoConfigurable {
    fn config_keys(&self) -> Vec<ConfigKey> {
        self.entries.iter().map(|entry| entry.key).collect()
    }

    fn config_get(&self, key: ConfigKey) -> Result<ConfigValue, BackendError> {
        self.check_open()?;
        self.require(key, Capability::Get)?;
        self.value(key)
            .ok_or_else(|| BackendError::Other(format!("no value for key '{}'", key)))
    }

    fn config_set(&self, key: ConfigKey, value: &ConfigValue) -> Result<(), BackendError> {
        self.check_open()?;
        let entry = self.require(key, Capability::Set)?;
        if value.data_type() != key.data_type() {
            return Err(BackendError::Arg(format!(
                "key '{}' expects {}, got {}",
                key,
                key.data_type(),
                value.data_type()
            )));
        }
        if !entry.choices.is_empty() && !entry.choices.contains(value) {
            return Err(BackendError::Arg(format!("'{}' is not a valid {}", value, key)));
        }
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value.clone());
        Ok(())
    }

    fn config_capabilities(&self, key: ConfigKey) -> Result<Vec<Capability>, BackendError> {
        Ok(self.entry(key)?.capabilities.clone())
    }

    fn config_list(&self, key: ConfigKey) -> Result<Vec<ConfigValue>, BackendError> {
        Ok(self.require(key, Capability::List)?.choices.clone())
    }
}

struct DemoChannelGroup {
    name: String,
    config: Arc<DemoConfigurable>,
}

pub struct DemoDevice {
    channels: Vec<ChannelInfo>,
    open: Arc<AtomicBool>,
    config: DemoConfigurable,
    groups: Vec<DemoChannelGroup>,
    stats: Arc<DemoStats>,
}

impl DemoDevice {
    fn new(config: &DemoConfig, logic: usize, analog: usize, stats: Arc<DemoStats>) -> Self {
        use Capability::{Get, List, Set};

        let open = Arc::new(AtomicBool::new(false));

        let logic_channels = (0..logic).map(|i| ChannelInfo {
            name: format!("D{}", i),
            channel_type: ChannelType::Logic,
            enabled: true,
        });
        let analog_channels = (0..analog).map(|i| ChannelInfo {
            name: format!("A{}", i),
            channel_type: ChannelType::Analog,
            enabled: true,
        });
        let channels: Vec<ChannelInfo> = logic_channels.chain(analog_channels).collect();

        let device_config = DemoConfigurable::new(
            open.clone(),
            vec![
                Entry::new(ConfigKey::SAMPLERATE, &[Get, Set, List])
                    .with_choices(SAMPLERATES.iter().map(|&rate| ConfigValue::UInt64(rate))),
                Entry::new(ConfigKey::LIMIT_SAMPLES, &[Get, Set]),
                Entry::new(ConfigKey::LIMIT_MSEC, &[Get, Set]),
                Entry::new(ConfigKey::AVERAGING, &[Get, Set]),
            ],
            vec![
                (ConfigKey::SAMPLERATE, ConfigValue::UInt64(config.samplerate)),
                (ConfigKey::LIMIT_SAMPLES, ConfigValue::UInt64(config.limit_samples)),
                (ConfigKey::LIMIT_MSEC, ConfigValue::UInt64(0)),
                (ConfigKey::AVERAGING, ConfigValue::Bool(false)),
            ],
        );

        let mut groups = Vec::new();
        if logic > 0 {
            groups.push(DemoChannelGroup {
                name: "Logic".to_string(),
                config: Arc::new(DemoConfigurable::new(
                    open.clone(),
                    vec![Entry::new(ConfigKey::PATTERN, &[Get, Set, List])
                        .with_choices(LOGIC_PATTERNS.iter().map(|&p| ConfigValue::from(p)))],
                    vec![(ConfigKey::PATTERN, ConfigValue::from("sigrok"))],
                )),
            });
        }
        for i in 0..analog {
            groups.push(DemoChannelGroup {
                name: format!("A{}", i),
                config: Arc::new(DemoConfigurable::new(
                    open.clone(),
                    vec![
                        Entry::new(ConfigKey::PATTERN, &[Get, Set, List])
                            .with_choices(ANALOG_PATTERNS.iter().map(|&p| ConfigValue::from(p))),
                        Entry::new(ConfigKey::AMPLITUDE, &[Get, Set]),
                        Entry::new(ConfigKey::OFFSET, &[Get, Set]),
                    ],
                    vec![
                        (ConfigKey::PATTERN, ConfigValue::from(ANALOG_PATTERNS[i % ANALOG_PATTERNS.len()])),
                        (ConfigKey::AMPLITUDE, ConfigValue::Float(10.0)),
                        (ConfigKey::OFFSET, ConfigValue::Float(0.0)),
                    ],
                )),
            });
        }

        Self {
            channels,
            open,
            config: device_config,
            groups,
            stats,
        }
    }
}

impl Configurable for DemoDevice {
    fn config_keys(&self) -> Vec<ConfigKey> {
        self.config.config_keys()
    }

    fn config_get(&self, key: ConfigKey) -> Result<ConfigValue, BackendError> {
        self.config.config_get(key)
    }

    fn config_set(&self, key: ConfigKey, value: &ConfigValue) -> Result<(), BackendError> {
        self.config.config_set(key, value)
    }

    fn config_capabilities(&self, key: ConfigKey) -> Result<Vec<Capability>, BackendError> {
        self.config.config_capabilities(key)
    }

    fn config_list(&self, key: ConfigKey) -> Result<Vec<ConfigValue>, BackendError> {
        self.config.config_list(key)
    }
}

impl RawDevice for DemoDevice {
    fn vendor(&self) -> String {
        "Sigrok".to_string()
    }

    fn model(&self) -> String {
        "Demo device".to_string()
    }

    fn version(&self) -> String {
        String::new()
    }

    fn channels(&self) -> Vec<ChannelInfo> {
        self.channels.clone()
    }

    fn channel_groups(&self) -> Vec<String> {
        self.groups.iter().map(|group| group.name.clone()).collect()
    }

    fn channel_group(&self, name: &str) -> Option<Arc<dyn Configurable>> {
        self.groups
            .iter()
            .find(|group| group.name == name)
            .map(|group| group.config.clone() as Arc<dyn Configurable>)
    }

    fn open(&self) -> Result<(), BackendError> {
        self.stats.open_calls.fetch_add(1, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<(), BackendError> {
        self.stats.close_calls.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn as_configurable(&self) -> &dyn Configurable {
        self
    }
}

/// What one device will produce during a run, captured at start.
struct Plan {
    device: DeviceHandle,
    logic_channels: usize,
    analog: Vec<AnalogPlan>,
    limit: Option<u64>,
}

struct AnalogPlan {
    name: String,
    pattern: String,
    amplitude: f32,
    offset: f32,
}

impl AnalogPlan {
    const PERIOD: u64 = 32;

    fn sample(&self, index: u64) -> f32 {
        let phase = (index % Self::PERIOD) as f32 / Self::PERIOD as f32;
        let unit = match self.pattern.as_str() {
            "square" => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            "triangle" => 1.0 - 4.0 * (phase - 0.5).abs(),
            "sawtooth" => 2.0 * phase - 1.0,
            _ => (phase * std::f32::consts::TAU).sin(),
        };
        unit * self.amplitude + self.offset
    }
}

pub struct DemoSession {
    chunk_samples: usize,
    devices: Mutex<Vec<DeviceHandle>>,
    callbacks: Mutex<Vec<DatafeedCallback>>,
    stopped_callback: Mutex<Option<StoppedCallback>>,
    plans: Mutex<Vec<Plan>>,
    running: AtomicBool,
    stop_requested: AtomicBool,
}

impl DemoSession {
    fn new(chunk_samples: usize) -> Self {
        Self {
            chunk_samples: chunk_samples.max(1),
            devices: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
            stopped_callback: Mutex::new(None),
            plans: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    fn plan(device: &DeviceHandle) -> Result<Plan, BackendError> {
        let config = device.as_configurable();
        let limit_samples = config
            .config_get(ConfigKey::LIMIT_SAMPLES)?
            .as_u64()
            .unwrap_or(0);
        let limit_msec = config.config_get(ConfigKey::LIMIT_MSEC)?.as_u64().unwrap_or(0);
        let samplerate = config.config_get(ConfigKey::SAMPLERATE)?.as_u64().unwrap_or(0);

        let by_time = (limit_msec > 0).then(|| samplerate.saturating_mul(limit_msec) / 1000);
        let by_count = (limit_samples > 0).then_some(limit_samples);
        let limit = match (by_count, by_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let channels = device.channels();
        let logic_channels = channels
            .iter()
            .filter(|ch| ch.channel_type == ChannelType::Logic && ch.enabled)
            .count();

        let mut analog = Vec::new();
        for ch in channels
            .iter()
            .filter(|ch| ch.channel_type == ChannelType::Analog && ch.enabled)
        {
            let group = device.channel_group(&ch.name);
            let read = |key: ConfigKey| group.as_ref().and_then(|g| g.config_get(key).ok());
            analog.push(AnalogPlan {
                name: ch.name.clone(),
                pattern: read(ConfigKey::PATTERN)
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| "sine".to_string()),
                amplitude: read(ConfigKey::AMPLITUDE).and_then(|v| v.as_f64()).unwrap_or(10.0) as f32,
                offset: read(ConfigKey::OFFSET).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32,
            });
        }

        Ok(Plan {
            device: device.clone(),
            logic_channels,
            analog,
            limit,
        })
    }

    fn emit(callbacks: &mut [DatafeedCallback], device: &DeviceHandle, packet: &Packet) {
        for callback in callbacks.iter_mut() {
            callback(device.as_ref(), packet);
        }
    }

    fn logic_chunk(plan: &Plan, start: u64, count: usize) -> Packet {
        let unit_size = plan.logic_channels.div_ceil(8).max(1);
        let mut data = Vec::with_capacity(unit_size * count);
        for index in start..start + count as u64 {
            // Incrementing counter pattern, little endian over unit_size bytes.
            for byte in 0..unit_size {
                data.push((index >> (8 * byte)) as u8);
            }
        }
        Packet::Logic(LogicPayload::new(unit_size, data))
    }

    fn analog_chunk(plan: &Plan, start: u64, count: usize) -> Packet {
        let channels = plan.analog.iter().map(|a| a.name.clone()).collect();
        let data = plan
            .analog
            .iter()
            .map(|a| (start..start + count as u64).map(|i| a.sample(i)).collect())
            .collect();
        Packet::Analog(AnalogPayload::new(channels, data).with_unit("V"))
    }

    fn generate(&self, plans: &[Plan], callbacks: &mut [DatafeedCallback]) {
        for plan in plans {
            Self::emit(callbacks, &plan.device, &Packet::Header);
        }

        let mut position = 0u64;
        let mut active = true;
        while active && !self.stop_requested.load(Ordering::SeqCst) {
            active = false;
            for plan in plans {
                let remaining = match plan.limit {
                    Some(limit) if position >= limit => continue,
                    Some(limit) => (limit - position).min(self.chunk_samples as u64) as usize,
                    None => self.chunk_samples,
                };
                active = true;
                if plan.logic_channels > 0 {
                    Self::emit(callbacks, &plan.device, &Self::logic_chunk(plan, position, remaining));
                }
                if !plan.analog.is_empty() {
                    Self::emit(callbacks, &plan.device, &Self::analog_chunk(plan, position, remaining));
                }
            }
            position += self.chunk_samples as u64;
        }

        for plan in plans {
            Self::emit(callbacks, &plan.device, &Packet::End);
        }
    }
}

impl RawSession for DemoSession {
    fn add_device(&self, device: DeviceHandle) -> Result<(), BackendError> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(device);
        Ok(())
    }

    fn add_datafeed_callback(&self, callback: DatafeedCallback) -> Result<(), BackendError> {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
        Ok(())
    }

    fn remove_datafeed_callbacks(&self) -> Result<(), BackendError> {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn set_stopped_callback(&self, callback: StoppedCallback) -> Result<(), BackendError> {
        *self
            .stopped_callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
        Ok(())
    }

    fn start(&self) -> Result<(), BackendError> {
        let devices = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if devices.is_empty() {
            return Err(BackendError::Arg("no devices in session".to_string()));
        }

        let plans = devices.iter().map(Self::plan).collect::<Result<Vec<_>, _>>()?;
        *self.plans.lock().unwrap_or_else(PoisonError::into_inner) = plans;
        self.stop_requested.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn run(&self) -> Result<(), BackendError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(BackendError::Arg("session not started".to_string()));
        }

        let plans = std::mem::take(&mut *self.plans.lock().unwrap_or_else(PoisonError::into_inner));
        // Callbacks are taken out for the run so they may call back into the session.
        let mut callbacks =
            std::mem::take(&mut *self.callbacks.lock().unwrap_or_else(PoisonError::into_inner));

        self.generate(&plans, &mut callbacks);

        {
            let mut slot = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
            callbacks.append(&mut slot);
            *slot = callbacks;
        }
        self.running.store(false, Ordering::SeqCst);

        let stopped = self
            .stopped_callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut stopped) = stopped {
            stopped();
            *self
                .stopped_callback
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(stopped);
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), BackendError> {
        self.stop_requested.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(backend: &DemoBackend, options: &DriverOptions) -> Vec<DeviceHandle> {
        backend.drivers()[0].scan(options).unwrap()
    }

    #[test]
    fn test_scan_defaults() {
        let backend = DemoBackend::default();
        let devices = scan(&backend, &DriverOptions::new());
        assert_eq!(devices.len(), 1);

        let device = &devices[0];
        assert_eq!(device.channels().len(), 12);
        assert_eq!(device.channel_groups(), vec!["Logic", "A0", "A1", "A2", "A3"]);
    }

    #[test]
    fn test_scan_options() {
        let backend = DemoBackend::default();
        let options = DriverOptions::new()
            .with("logic_channels", "0")
            .with("analog_channels", "2");
        let device = scan(&backend, &options).remove(0);
        let names: Vec<_> = device.channels().into_iter().map(|ch| ch.name).collect();
        assert_eq!(names, vec!["A0", "A1"]);
        assert_eq!(device.channel_groups(), vec!["A0", "A1"]);

        assert!(scan(&backend, &DriverOptions::new().with("conn", "/dev/ttyUSB0")).is_empty());
        assert!(backend.drivers()[0]
            .scan(&DriverOptions::new().with("logic_channels", "many"))
            .is_err());
    }

    #[test]
    fn test_config_requires_open_device() {
        let backend = DemoBackend::default();
        let device = scan(&backend, &DriverOptions::new()).remove(0);

        assert!(matches!(
            device.config_get(ConfigKey::SAMPLERATE),
            Err(BackendError::DeviceClosed(_))
        ));
        device.open().unwrap();
        assert_eq!(
            device.config_get(ConfigKey::SAMPLERATE).unwrap(),
            ConfigValue::UInt64(200_000)
        );
        assert!(device
            .config_set(ConfigKey::SAMPLERATE, &ConfigValue::UInt64(12_345))
            .is_err());
        assert_eq!(
            device.config_list(ConfigKey::SAMPLERATE).unwrap().len(),
            SAMPLERATES.len()
        );
    }

    #[test]
    fn test_session_generates_limited_samples() {
        let backend = DemoBackend::new(DemoConfig {
            logic_channels: 0,
            analog_channels: 1,
            chunk_samples: 10,
            limit_samples: 25,
            ..DemoConfig::default()
        });
        let device = scan(&backend, &DriverOptions::new()).remove(0);
        device.open().unwrap();

        let session = backend.create_session().unwrap();
        session.add_device(device).unwrap();

        let packets = Arc::new(Mutex::new(Vec::new()));
        let sink = packets.clone();
        session
            .add_datafeed_callback(Box::new(move |_: &dyn RawDevice, packet: &Packet| {
                sink.lock().unwrap().push(packet.clone());
            }))
            .unwrap();

        session.start().unwrap();
        assert!(session.is_running());
        session.run().unwrap();
        assert!(!session.is_running());

        let packets = packets.lock().unwrap();
        assert_eq!(packets.first(), Some(&Packet::Header));
        assert_eq!(packets.last(), Some(&Packet::End));
        let sizes: Vec<_> = packets
            .iter()
            .filter_map(|p| match p {
                Packet::Analog(a) => Some(a.num_samples()),
                _ => None,
            })
            .collect();
        assert_eq!(sizes, vec![10, 10, 5]);
    }

    #[test]
    fn test_run_without_start_fails() {
        let backend = DemoBackend::default();
        let session = backend.create_session().unwrap();
        assert!(session.run().is_err());
        assert!(session.start().is_err());
    }

    #[test]
    fn test_analog_patterns() {
        let plan = AnalogPlan {
            name: "A0".to_string(),
            pattern: "square".to_string(),
            amplitude: 2.0,
            offset: 1.0,
        };
        assert_eq!(plan.sample(0), 3.0);
        assert_eq!(plan.sample(AnalogPlan::PERIOD / 2), -1.0);
    }
}
