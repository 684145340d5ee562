//! # sigrok-wrapper
//!
//! A convenience layer over a sigrok-style acquisition library.
//!
//! The wrapped library (drivers, instrument protocols, the datafeed) is
//! described by the traits in [`backend`]. On top of it this crate provides:
//!
//! ## Features
//!
//! - **One context per application**: [`Context`] owns the library context and
//!   the acquisition session; [`Context::global_or_init`] creates it at most once
//! - **Driver specifications**: `sigrok-cli` style strings such as
//!   `rdtech-dps:conn=/dev/ttyUSB0` resolve to a driver and its first device
//! - **Device state management**: idempotent open/close and scoped acquisition
//!   that always closes the device again ([`DeviceGuard`], [`Driver::with_device`])
//! - **Key names**: get and set configuration by key identifier
//!   (`samplerate`, `voltage_target`, ...) with errors listing the valid names
//! - **Session helpers**: create, start, run and stop the acquisition session
//! - **Packet parsing**: accumulate analog samples per channel and export them
//!   as a `polars` DataFrame or CSV
//! - **Demo backend**: an in-process `demo` driver for trying things out without
//!   hardware
//!
//! ## Examples
//!
//! ### Device Configuration
//!
//! ```rust
//! use sigrok_wrapper::{Access, ConfigValue, Context, DemoBackend, Driver};
//!
//! let context = Context::new(DemoBackend::default());
//! let mut driver = Driver::new(&context, "demo")?;
//! println!("{}", driver);
//!
//! {
//!     let device = driver.acquire()?;
//!     device.set("samplerate", 1_000_000u64, None)?;
//!     device.set("amplitude", 2.5, Some("A0"))?;
//!     assert_eq!(
//!         device.get("samplerate", None)?,
//!         Access::Done(ConfigValue::UInt64(1_000_000))
//!     );
//! } // device closed here
//!
//! // Closed devices ignore configuration access instead of failing.
//! assert!(driver.device().get("samplerate", None)?.is_device_closed());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Listing Keys and Channel Groups
//!
//! ```rust
//! use sigrok_wrapper::{Context, DemoBackend, Driver};
//!
//! let context = Context::new(DemoBackend::default());
//! let driver = Driver::new(&context, "demo:logic_channels=4,analog_channels=1")?;
//! let device = driver.device();
//!
//! assert_eq!(device.channels(), vec!["D0", "D1", "D2", "D3", "A0"]);
//! assert_eq!(device.channel_groups(), vec!["Logic", "A0"]);
//! println!("device keys: {:?}", device.config_keys(None)?);
//! println!("A0 keys: {:?}", device.config_keys(Some("A0"))?);
//!
//! // Unknown groups are reported with the valid ones.
//! assert!(device.config_keys(Some("A1")).is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod config_key;
pub mod context;
pub mod demo;
pub mod device;
pub mod driver;
pub mod driver_spec;
pub mod packet;
pub mod session;

// Re-export the main types for convenience
pub use backend::{
    Backend, BackendError, ChannelInfo, ChannelType, Configurable, DeviceHandle, RawDevice,
    RawDriver, RawSession,
};

pub use config_key::{Capability, ConfigKey, ConfigKeyError, ConfigValue, DataType};

pub use context::Context;

pub use demo::{DemoBackend, DemoConfig};

pub use device::{Access, Device, DeviceError, Scope};

pub use driver::{DeviceGuard, Driver, DriverError};

pub use driver_spec::{DriverOptions, DriverSpec, DriverSpecError};

pub use packet::{
    is_analog_packet, is_logic_packet, packet_channels, parse_packet_data, AcquiredData,
    AnalogPayload, LogicPayload, Packet, PacketType,
};

pub use session::{Session, SessionError, SessionStopper};
