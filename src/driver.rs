use crate::backend::{BackendError, RawDriver};
use crate::context::Context;
use crate::device::{Device, DeviceError};
use crate::driver_spec::{DriverOptions, DriverSpec, DriverSpecError};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Invalid driver specification: {0}")]
    Spec(#[from] DriverSpecError),

    #[error(
        "Unknown driver name '{name}' in '{spec}'. Supported hardware drivers: {}",
        .available.join(",")
    )]
    UnknownDriver {
        name: String,
        spec: String,
        available: Vec<String>,
    },

    #[error("Could not find any device for driver '{driver}' with options '{options}'{hint}")]
    DeviceNotFound {
        driver: String,
        options: DriverOptions,
        hint: String,
    },

    #[error("Scan with driver '{driver}' failed: {source}")]
    Scan {
        driver: String,
        #[source]
        source: BackendError,
    },

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// A driver resolved from a driver specification together with the first
/// device its scan found.
///
/// ```rust
/// use sigrok_wrapper::{Context, DemoBackend, Driver};
///
/// let context = Context::new(DemoBackend::default());
/// let mut driver = Driver::new(&context, "demo:analog_channels=2")?;
///
/// driver.with_device(|device| {
///     device.set("limit_samples", 100u64, None)?;
///     println!("{}", device);
///     Ok::<_, sigrok_wrapper::DriverError>(())
/// })?;
///
/// assert!(!driver.device().is_open());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Driver {
    raw: Arc<dyn RawDriver>,
    spec: DriverSpec,
    device: Device,
}

impl Driver {
    /// Driver used when an application does not name one.
    pub const DEFAULT_SPEC: &'static str = "rdtech-dps";

    /// Resolve `spec` (e.g. `rdtech-dps:conn=/dev/ttyUSB0`) against the
    /// context's drivers and scan for a device.
    pub fn new(context: &Context, spec: &str) -> Result<Self, DriverError> {
        let spec: DriverSpec = spec.parse()?;
        Self::from_spec(context, spec)
    }

    /// Resolve [`Driver::DEFAULT_SPEC`].
    pub fn with_default_spec(context: &Context) -> Result<Self, DriverError> {
        Self::new(context, Self::DEFAULT_SPEC)
    }

    pub fn from_spec(context: &Context, spec: DriverSpec) -> Result<Self, DriverError> {
        let raw = context
            .driver(&spec.driver)
            .ok_or_else(|| DriverError::UnknownDriver {
                name: spec.driver.clone(),
                spec: spec.to_string(),
                available: context.driver_names(),
            })?;

        let device = Self::find_device(raw.as_ref(), &spec.options)?;
        log::debug!("Driver '{}' found device {}", raw.name(), device);

        Ok(Self { raw, spec, device })
    }

    /// Wrap the first device `driver` finds with `options`.
    pub fn find_device(driver: &dyn RawDriver, options: &DriverOptions) -> Result<Device, DriverError> {
        log::debug!("Scanning with driver '{}', options '{}'", driver.name(), options);
        let scanned = driver.scan(options).map_err(|source| DriverError::Scan {
            driver: driver.name().to_string(),
            source,
        })?;

        if scanned.len() > 1 {
            log::debug!("Scan found {} devices, using the first", scanned.len());
        }

        scanned
            .into_iter()
            .next()
            .map(Device::new)
            .ok_or_else(|| DriverError::DeviceNotFound {
                driver: driver.name().to_string(),
                options: options.clone(),
                hint: serial_port_hint(options),
            })
    }

    pub fn name(&self) -> &str {
        self.raw.name()
    }

    pub fn long_name(&self) -> &str {
        self.raw.long_name()
    }

    pub fn spec(&self) -> &DriverSpec {
        &self.spec
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn open(&mut self) -> Result<&mut Device, DriverError> {
        Ok(self.device.open()?)
    }

    pub fn close(&mut self) -> Result<(), DriverError> {
        Ok(self.device.close()?)
    }

    /// Open the device for the lifetime of the returned guard. Dropping the
    /// guard closes the device, also while unwinding.
    pub fn acquire(&mut self) -> Result<DeviceGuard<'_>, DriverError> {
        self.device.open()?;
        Ok(DeviceGuard {
            device: &mut self.device,
        })
    }

    /// Run `f` with the device open and close it afterwards, whatever `f`
    /// returns.
    pub fn with_device<T, E>(&mut self, f: impl FnOnce(&mut Device) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DriverError>,
    {
        let mut guard = self.acquire()?;
        f(&mut *guard)
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.device, f)
    }
}

/// An open device, closed again on drop.
pub struct DeviceGuard<'a> {
    device: &'a mut Device,
}

impl Deref for DeviceGuard<'_> {
    type Target = Device;

    fn deref(&self) -> &Device {
        self.device
    }
}

impl DerefMut for DeviceGuard<'_> {
    fn deref_mut(&mut self) -> &mut Device {
        self.device
    }
}

impl Drop for DeviceGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.device.close() {
            log::warn!("Failed to close device {}: {}", self.device, e);
        }
    }
}

/// Serial ports present on this machine, for scans that named a `conn`.
fn serial_port_hint(options: &DriverOptions) -> String {
    if options.get("conn").is_none() {
        return String::new();
    }

    match serialport::available_ports() {
        Ok(ports) if ports.is_empty() => ". No serial ports detected".to_string(),
        Ok(ports) => format!(
            ". Detected serial ports: {}",
            ports
                .iter()
                .map(|port| port.port_name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Err(e) => {
            log::debug!("Listing serial ports failed: {}", e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_key::ConfigValue;
    use crate::demo::{DemoBackend, DemoStats};
    use crate::device::Access;
    use std::panic::{self, AssertUnwindSafe};

    fn demo_context() -> (Context, Arc<DemoStats>) {
        let backend = DemoBackend::default();
        let stats = backend.stats();
        (Context::new(backend), stats)
    }

    #[test]
    fn test_unknown_driver_lists_registered_drivers() {
        let (context, _) = demo_context();
        let err = Driver::new(&context, "rdtech-dps:conn=/dev/ttyUSB0").err().unwrap();

        match &err {
            DriverError::UnknownDriver { name, available, .. } => {
                assert_eq!(name, "rdtech-dps");
                assert_eq!(available, &context.driver_names());
            }
            other => panic!("Unexpected error: {:?}", other),
        }
        assert_eq!(
            err.to_string(),
            "Unknown driver name 'rdtech-dps' in 'rdtech-dps:conn=/dev/ttyUSB0'. Supported hardware drivers: demo"
        );
    }

    #[test]
    fn test_default_spec() {
        let (context, _) = demo_context();
        match Driver::with_default_spec(&context) {
            Err(DriverError::UnknownDriver { name, spec, .. }) => {
                assert_eq!(name, "rdtech-dps");
                assert_eq!(spec, Driver::DEFAULT_SPEC);
            }
            Err(other) => panic!("Unexpected error: {:?}", other),
            Ok(_) => panic!("demo backend has no rdtech-dps driver"),
        }
    }

    #[test]
    fn test_empty_scan_reports_options() {
        let (context, _) = demo_context();
        let err = Driver::new(&context, "demo:conn=/dev/ttyUSB0").err().unwrap();

        assert!(matches!(err, DriverError::DeviceNotFound { .. }));
        let message = err.to_string();
        assert!(
            message.starts_with("Could not find any device for driver 'demo' with options 'conn=/dev/ttyUSB0'"),
            "{}",
            message
        );
    }

    #[test]
    fn test_scan_failure_and_bad_spec() {
        let (context, _) = demo_context();
        assert!(matches!(
            Driver::new(&context, "demo:logic_channels=lots"),
            Err(DriverError::Scan { .. })
        ));
        assert!(matches!(
            Driver::new(&context, "demo:logic_channels"),
            Err(DriverError::Spec(_))
        ));
    }

    #[test]
    fn test_open_close_through_driver() {
        let (context, stats) = demo_context();
        let mut driver = Driver::new(&context, "demo").unwrap();
        assert_eq!(driver.name(), "demo");

        driver.open().unwrap();
        driver.open().unwrap();
        assert!(driver.device().is_open());
        driver.close().unwrap();
        driver.close().unwrap();

        assert_eq!(stats.open_calls(), 1);
        assert_eq!(stats.close_calls(), 1);
    }

    #[test]
    fn test_guard_closes_device() {
        let (context, stats) = demo_context();
        let mut driver = Driver::new(&context, "demo").unwrap();

        {
            let device = driver.acquire().unwrap();
            assert!(device.is_open());
            assert!(device.get("samplerate", None).unwrap().is_done());
        }

        assert!(!driver.device().is_open());
        assert_eq!(stats.close_calls(), 1);
    }

    #[test]
    fn test_with_device_closes_on_error() {
        let (context, _) = demo_context();
        let mut driver = Driver::new(&context, "demo").unwrap();

        let result = driver.with_device(|device| {
            device.set("limit_samples", 10u64, None)?;
            device.set("no_such_key", 1u64, None)?;
            Ok::<_, DriverError>(())
        });

        assert!(matches!(result, Err(DriverError::Device(DeviceError::InvalidKey { .. }))));
        assert!(!driver.device().is_open());
    }

    #[test]
    fn test_guard_closes_device_on_panic() {
        let (context, stats) = demo_context();
        let mut driver = Driver::new(&context, "demo").unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _device = driver.acquire().unwrap();
            panic!("failure inside scope");
        }));

        assert!(result.is_err());
        assert!(!driver.device().is_open());
        assert_eq!(stats.close_calls(), 1);
    }

    #[test]
    fn test_with_device_returns_value() {
        let (context, _) = demo_context();
        let mut driver = Driver::new(&context, "demo").unwrap();

        let value = driver
            .with_device(|device| {
                device.set("averaging", true, None)?;
                Ok::<_, DriverError>(device.get("averaging", None)?)
            })
            .unwrap();

        assert_eq!(value, Access::Done(ConfigValue::Bool(true)));
        // Closed again: access is skipped.
        assert!(driver.device().get("averaging", None).unwrap().is_device_closed());
    }
}
