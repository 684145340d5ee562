use crate::backend::{BackendError, Configurable, DeviceHandle};
use crate::config_key::{Capability, ConfigKey, ConfigKeyError, ConfigValue};
use std::fmt;
use std::sync::Arc;

/// Result of a configuration access that is skipped while the device is
/// closed.
///
/// A closed device is not an error: [`Device::get`] and [`Device::set`]
/// log a warning and return [`Access::DeviceClosed`]. Bad key or group
/// names are still reported as [`DeviceError`].
#[derive(Debug, Clone, PartialEq)]
pub enum Access<T> {
    Done(T),
    DeviceClosed,
}

impl<T> Access<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, Access::Done(_))
    }

    pub fn is_device_closed(&self) -> bool {
        matches!(self, Access::DeviceClosed)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Access::Done(value) => Some(value),
            Access::DeviceClosed => None,
        }
    }
}

/// Where a key is looked up: the device itself or one of its channel groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Device,
    ChannelGroup(String),
}

impl Scope {
    fn from_group(group: Option<&str>) -> Self {
        match group {
            Some(name) => Scope::ChannelGroup(name.to_string()),
            None => Scope::Device,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Device => f.write_str("device"),
            Scope::ChannelGroup(name) => write!(f, "channel group '{}'", name),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Invalid channel group '{group}'. Expect one of {valid:?}")]
    InvalidChannelGroup { group: String, valid: Vec<String> },

    #[error("Invalid key '{key}' for {scope}. Expect one of: {valid:?}")]
    InvalidKey {
        key: String,
        scope: Scope,
        valid: Vec<String>,
        #[source]
        source: ConfigKeyError,
    },

    #[error("Invalid value for key '{key}' on {scope}: {source}")]
    InvalidValue {
        key: String,
        scope: Scope,
        #[source]
        source: ConfigKeyError,
    },

    #[error("Error reading '{key}' on {scope}. Expect one of: {valid:?}")]
    Read {
        key: String,
        scope: Scope,
        valid: Vec<String>,
        #[source]
        source: BackendError,
    },

    #[error("Error in setting '{key}' on {scope} to value {value}[{value_type}].{valid_values}")]
    Set {
        key: String,
        scope: Scope,
        value: ConfigValue,
        value_type: &'static str,
        valid_values: String,
        #[source]
        source: BackendError,
    },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// A device found by a driver scan.
///
/// Tracks whether the underlying handle is open and maps key names to
/// [`ConfigKey`]s for [`Device::get`] and [`Device::set`].
pub struct Device {
    handle: DeviceHandle,
    is_open: bool,
}

impl Device {
    /// Wrap a raw handle. The handle is assumed closed.
    pub fn new(handle: DeviceHandle) -> Self {
        Self {
            handle,
            is_open: false,
        }
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn vendor(&self) -> String {
        self.handle.vendor()
    }

    pub fn model(&self) -> String {
        self.handle.model()
    }

    pub fn version(&self) -> String {
        self.handle.version()
    }

    pub fn channels(&self) -> Vec<String> {
        self.handle.channels().into_iter().map(|ch| ch.name).collect()
    }

    pub fn channel_groups(&self) -> Vec<String> {
        self.handle.channel_groups()
    }

    /// Identifiers of the keys available on the device, or on `channel_group`
    /// if given. These are the names [`Device::get`] and [`Device::set`]
    /// accept.
    pub fn config_keys(&self, channel_group: Option<&str>) -> Result<Vec<String>, DeviceError> {
        Ok(key_names(self.target(channel_group)?.as_ref()))
    }

    /// Read `key_name` from the device or from `channel_group`.
    pub fn get(
        &self,
        key_name: &str,
        channel_group: Option<&str>,
    ) -> Result<Access<ConfigValue>, DeviceError> {
        log::info!("get: key_name={}, channel_group={:?}", key_name, channel_group);
        if !self.is_open {
            log::warn!("Device {} not open", self);
            return Ok(Access::DeviceClosed);
        }

        let target = self.target(channel_group)?;
        let scope = Scope::from_group(channel_group);
        let key = resolve_key(key_name, &scope, target.as_ref())?;

        target
            .config_get(key)
            .map(Access::Done)
            .map_err(|source| DeviceError::Read {
                key: key_name.to_string(),
                valid: key_names(target.as_ref()),
                scope,
                source,
            })
    }

    /// Assign `value` to `key_name` on the device or on `channel_group`.
    pub fn set(
        &self,
        key_name: &str,
        value: impl Into<ConfigValue>,
        channel_group: Option<&str>,
    ) -> Result<Access<()>, DeviceError> {
        let value = value.into();
        log::info!(
            "set: key_name={}, value={}, channel_group={:?}",
            key_name,
            value,
            channel_group
        );
        if !self.is_open {
            log::warn!("Device {} not open - nothing done", self);
            return Ok(Access::DeviceClosed);
        }

        let target = self.target(channel_group)?;
        let scope = Scope::from_group(channel_group);
        let key = resolve_key(key_name, &scope, target.as_ref())?;

        match target.config_set(key, &value) {
            Ok(()) => Ok(Access::Done(())),
            Err(source) => Err(DeviceError::Set {
                key: key_name.to_string(),
                valid_values: describe_valid_values(target.as_ref(), key, key_name),
                scope,
                value_type: value.data_type().as_str(),
                value,
                source,
            }),
        }
    }

    /// Like [`Device::set`], with the value given as text and parsed
    /// according to the key's type.
    pub fn set_str(
        &self,
        key_name: &str,
        text: &str,
        channel_group: Option<&str>,
    ) -> Result<Access<()>, DeviceError> {
        let scope = Scope::from_group(channel_group);
        let value = match ConfigKey::from_identifier(key_name) {
            Ok(key) => key.parse_value(text).map_err(|source| DeviceError::InvalidValue {
                key: key_name.to_string(),
                scope,
                source,
            })?,
            // Let `set` report the unknown key with the scope's valid names.
            Err(_) => ConfigValue::String(text.to_string()),
        };
        self.set(key_name, value, channel_group)
    }

    /// Open the underlying handle unless already open.
    pub fn open(&mut self) -> Result<&mut Self, DeviceError> {
        if !self.is_open {
            self.handle.open()?;
            self.is_open = true;
            log::debug!("Opened {}", self);
        }
        Ok(self)
    }

    /// Close the underlying handle unless already closed.
    pub fn close(&mut self) -> Result<(), DeviceError> {
        if self.is_open {
            self.is_open = false;
            self.handle.close()?;
            log::debug!("Closed {}", self);
        }
        Ok(())
    }

    fn target(&self, channel_group: Option<&str>) -> Result<Arc<dyn Configurable>, DeviceError> {
        match channel_group {
            Some(group) => {
                self.handle
                    .channel_group(group)
                    .ok_or_else(|| DeviceError::InvalidChannelGroup {
                        group: group.to_string(),
                        valid: self.handle.channel_groups(),
                    })
            }
            None => Ok(Arc::new(DeviceConfig(self.handle.clone()))),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = self.channels();
        write!(
            f,
            "{}, model: {}, version: {} - {} channels: {}",
            self.vendor(),
            self.model(),
            self.version(),
            channels.len(),
            channels.join(", ")
        )
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("vendor", &self.vendor())
            .field("model", &self.model())
            .field("is_open", &self.is_open)
            .finish()
    }
}

/// Device-level configuration seen through the same trait object as a
/// channel group.
struct DeviceConfig(DeviceHandle);

impl Configurable for DeviceConfig {
    fn config_keys(&self) -> Vec<ConfigKey> {
        self.0.as_configurable().config_keys()
    }

    fn config_get(&self, key: ConfigKey) -> Result<ConfigValue, BackendError> {
        self.0.as_configurable().config_get(key)
    }

    fn config_set(&self, key: ConfigKey, value: &ConfigValue) -> Result<(), BackendError> {
        self.0.as_configurable().config_set(key, value)
    }

    fn config_capabilities(&self, key: ConfigKey) -> Result<Vec<Capability>, BackendError> {
        self.0.as_configurable().config_capabilities(key)
    }

    fn config_list(&self, key: ConfigKey) -> Result<Vec<ConfigValue>, BackendError> {
        self.0.as_configurable().config_list(key)
    }
}

fn key_names(target: &dyn Configurable) -> Vec<String> {
    target
        .config_keys()
        .iter()
        .map(|key| key.identifier().to_string())
        .collect()
}

fn resolve_key(
    key_name: &str,
    scope: &Scope,
    target: &dyn Configurable,
) -> Result<ConfigKey, DeviceError> {
    ConfigKey::from_identifier(key_name).map_err(|source| DeviceError::InvalidKey {
        key: key_name.to_string(),
        scope: scope.clone(),
        valid: key_names(target),
        source,
    })
}

/// Best-effort list of accepted values for a failed assignment. Never fails:
/// problems while building the hint end up in the hint itself.
fn describe_valid_values(target: &dyn Configurable, key: ConfigKey, key_name: &str) -> String {
    let capabilities = match target.config_capabilities(key) {
        Ok(capabilities) => capabilities,
        Err(e) => {
            log::warn!("{}[{:?}]: capabilities unavailable: {}", key_name, key, e);
            return " Valid values unavailable".to_string();
        }
    };

    let listable = capabilities.contains(&Capability::List);
    log::warn!(
        "{}[{:?}], capabilities={:?}, listable: {}",
        key_name,
        key,
        capabilities,
        listable
    );

    if !listable {
        return String::new();
    }

    match target.config_list(key) {
        Ok(values) => format!(
            " Valid values={}",
            values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Err(e) => {
            log::warn!("{}[{:?}]: listing values failed: {}", key_name, key, e);
            " Valid values unavailable".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChannelInfo, RawDevice};
    use crate::demo::{DemoBackend, DemoConfig};
    use crate::driver_spec::DriverOptions;
    use crate::Backend;

    fn demo_device(backend: &DemoBackend) -> Device {
        let driver = backend.drivers().remove(0);
        let handle = driver.scan(&DriverOptions::new()).unwrap().remove(0);
        Device::new(handle)
    }

    #[test]
    fn test_open_close_idempotent() {
        let backend = DemoBackend::new(DemoConfig::default());
        let mut device = demo_device(&backend);

        assert!(!device.is_open());
        device.open().unwrap().open().unwrap();
        assert!(device.is_open());
        assert_eq!(backend.stats().open_calls(), 1);

        device.close().unwrap();
        device.close().unwrap();
        assert!(!device.is_open());
        assert_eq!(backend.stats().close_calls(), 1);
    }

    #[test]
    fn test_closed_device_is_soft_failure() {
        let backend = DemoBackend::new(DemoConfig::default());
        let device = demo_device(&backend);

        assert_eq!(device.get("samplerate", None).unwrap(), Access::DeviceClosed);
        assert_eq!(device.set("samplerate", 1_000u64, None).unwrap(), Access::DeviceClosed);
        // Not even bad names are looked at while closed.
        assert!(device.get("no_such_key", Some("nope")).unwrap().is_device_closed());
    }

    #[test]
    fn test_get_and_set() {
        let backend = DemoBackend::new(DemoConfig::default());
        let mut device = demo_device(&backend);
        device.open().unwrap();

        device.set("limit_samples", 128u64, None).unwrap();
        let value = device.get("limit_samples", None).unwrap().into_option();
        assert_eq!(value, Some(ConfigValue::UInt64(128)));

        device.set("amplitude", 2.5, Some("A0")).unwrap();
        assert_eq!(
            device.get("amplitude", Some("A0")).unwrap(),
            Access::Done(ConfigValue::Float(2.5))
        );
    }

    #[test]
    fn test_set_str_parses_by_key_type() {
        let backend = DemoBackend::new(DemoConfig::default());
        let mut device = demo_device(&backend);
        device.open().unwrap();

        device.set_str("samplerate", "1M", None).unwrap();
        assert_eq!(
            device.get("samplerate", None).unwrap(),
            Access::Done(ConfigValue::UInt64(1_000_000))
        );
        assert!(matches!(
            device.set_str("samplerate", "fast", None),
            Err(DeviceError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_unknown_key_lists_scope_keys() {
        let backend = DemoBackend::new(DemoConfig::default());
        let mut device = demo_device(&backend);
        device.open().unwrap();

        match device.set("sample_rate", 1u64, None) {
            Err(DeviceError::InvalidKey { key, scope, valid, .. }) => {
                assert_eq!(key, "sample_rate");
                assert_eq!(scope, Scope::Device);
                assert_eq!(valid, device.config_keys(None).unwrap());
                assert!(valid.contains(&"samplerate".to_string()));
            }
            other => panic!("Unexpected result: {:?}", other),
        }

        match device.get("volume", Some("A1")) {
            Err(DeviceError::InvalidKey { scope, valid, .. }) => {
                assert_eq!(scope, Scope::ChannelGroup("A1".to_string()));
                assert_eq!(valid, vec!["pattern", "amplitude", "offset"]);
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_channel_group() {
        let backend = DemoBackend::new(DemoConfig::default());
        let mut device = demo_device(&backend);

        let err = device.config_keys(Some("A9")).unwrap_err();
        match err {
            DeviceError::InvalidChannelGroup { group, valid } => {
                assert_eq!(group, "A9");
                assert_eq!(valid, device.channel_groups());
            }
            other => panic!("Unexpected error: {:?}", other),
        }

        device.open().unwrap();
        assert!(matches!(
            device.set("amplitude", 1.0, Some("Analog")),
            Err(DeviceError::InvalidChannelGroup { .. })
        ));
    }

    #[test]
    fn test_set_failure_lists_valid_values() {
        let backend = DemoBackend::new(DemoConfig::default());
        let mut device = demo_device(&backend);
        device.open().unwrap();

        let err = device.set("pattern", "zigzag", Some("A0")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'pattern'"), "{}", message);
        assert!(message.contains("zigzag[string]"), "{}", message);
        assert!(message.contains("Valid values=sine, square, triangle, sawtooth"), "{}", message);
    }

    #[test]
    fn test_set_failure_without_list_capability() {
        let backend = DemoBackend::new(DemoConfig::default());
        let mut device = demo_device(&backend);
        device.open().unwrap();

        // Wrong value type for a key that cannot list its values.
        let err = device.set("limit_samples", "many", None).unwrap_err();
        match err {
            DeviceError::Set { valid_values, value_type, .. } => {
                assert_eq!(valid_values, "");
                assert_eq!(value_type, "string");
            }
            other => panic!("Unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_read_failure_lists_scope_keys() {
        let backend = DemoBackend::new(DemoConfig::default());
        let mut device = demo_device(&backend);
        device.open().unwrap();

        // A known key the device does not carry.
        match device.get("voltage_target", None) {
            Err(DeviceError::Read { key, valid, .. }) => {
                assert_eq!(key, "voltage_target");
                assert!(valid.contains(&"limit_samples".to_string()));
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_display() {
        let backend = DemoBackend::new(DemoConfig {
            logic_channels: 2,
            analog_channels: 1,
            ..DemoConfig::default()
        });
        let device = demo_device(&backend);
        assert_eq!(
            device.to_string(),
            "Sigrok, model: Demo device, version:  - 3 channels: D0, D1, A0"
        );
    }

    /// Rejects every assignment and cannot describe its keys either.
    struct Unhelpful {
        capabilities_fail: bool,
    }

    impl Configurable for Unhelpful {
        fn config_keys(&self) -> Vec<ConfigKey> {
            vec![ConfigKey::SAMPLERATE]
        }

        fn config_get(&self, _key: ConfigKey) -> Result<ConfigValue, BackendError> {
            Ok(ConfigValue::UInt64(1_000))
        }

        fn config_set(&self, _key: ConfigKey, _value: &ConfigValue) -> Result<(), BackendError> {
            Err(BackendError::Arg("rate not supported".to_string()))
        }

        fn config_capabilities(&self, _key: ConfigKey) -> Result<Vec<Capability>, BackendError> {
            if self.capabilities_fail {
                Err(BackendError::Other("capabilities query failed".to_string()))
            } else {
                Ok(vec![Capability::Get, Capability::Set, Capability::List])
            }
        }

        fn config_list(&self, _key: ConfigKey) -> Result<Vec<ConfigValue>, BackendError> {
            Err(BackendError::NotApplicable("no list".to_string()))
        }
    }

    impl RawDevice for Unhelpful {
        fn vendor(&self) -> String {
            "Test".to_string()
        }

        fn model(&self) -> String {
            "Unhelpful".to_string()
        }

        fn version(&self) -> String {
            String::new()
        }

        fn channels(&self) -> Vec<ChannelInfo> {
            Vec::new()
        }

        fn channel_groups(&self) -> Vec<String> {
            Vec::new()
        }

        fn channel_group(&self, _name: &str) -> Option<Arc<dyn Configurable>> {
            None
        }

        fn open(&self) -> Result<(), BackendError> {
            Ok(())
        }

        fn close(&self) -> Result<(), BackendError> {
            Ok(())
        }

        fn as_configurable(&self) -> &dyn Configurable {
            self
        }
    }

    #[test]
    fn test_valid_values_unavailable() {
        for capabilities_fail in [true, false] {
            let target = Unhelpful { capabilities_fail };
            assert_eq!(
                describe_valid_values(&target, ConfigKey::SAMPLERATE, "samplerate"),
                " Valid values unavailable"
            );
        }
    }

    #[test]
    fn test_set_failure_keeps_source_when_hint_fails() {
        for capabilities_fail in [true, false] {
            let mut device = Device::new(Arc::new(Unhelpful { capabilities_fail }));
            device.open().unwrap();

            match device.set("samplerate", 5u64, None) {
                Err(DeviceError::Set {
                    valid_values,
                    source,
                    ..
                }) => {
                    assert_eq!(valid_values, " Valid values unavailable");
                    assert_eq!(source, BackendError::Arg("rate not supported".to_string()));
                }
                other => panic!("Unexpected result: {:?}", other),
            }
        }
    }
}
