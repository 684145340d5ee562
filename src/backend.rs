//! Traits describing the acquisition library this crate wraps.
//!
//! Everything that talks to instruments (drivers, wire protocols, the
//! datafeed and its scheduling) lives behind these traits. The facade types
//! in [`crate::context`], [`crate::driver`], [`crate::device`] and
//! [`crate::session`] only ever call through them. [`crate::demo`] provides
//! an in-process implementation.
//!
//! All methods take `&self`; implementations use interior mutability so
//! that a session can be stopped from another thread while `run` blocks.

use crate::config_key::{Capability, ConfigKey, ConfigValue};
use crate::driver_spec::DriverOptions;
use crate::packet::Packet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("Invalid argument: {0}")]
    Arg(String),

    #[error("Not applicable: {0}")]
    NotApplicable(String),

    #[error("Device closed: {0}")]
    DeviceClosed(String),

    #[error("Backend error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    Logic,
    Analog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub channel_type: ChannelType,
    pub enabled: bool,
}

pub type DeviceHandle = Arc<dyn RawDevice>;

/// Receives every packet while a session runs.
pub type DatafeedCallback = Box<dyn FnMut(&dyn RawDevice, &Packet) + Send>;

/// Called once a running session has stopped.
pub type StoppedCallback = Box<dyn FnMut() + Send>;

/// Something that carries configuration keys: a device or one of its
/// channel groups.
pub trait Configurable: Send + Sync {
    fn config_keys(&self) -> Vec<ConfigKey>;
    fn config_get(&self, key: ConfigKey) -> Result<ConfigValue, BackendError>;
    fn config_set(&self, key: ConfigKey, value: &ConfigValue) -> Result<(), BackendError>;
    fn config_capabilities(&self, key: ConfigKey) -> Result<Vec<Capability>, BackendError>;
    fn config_list(&self, key: ConfigKey) -> Result<Vec<ConfigValue>, BackendError>;
}

pub trait RawDevice: Configurable {
    fn vendor(&self) -> String;
    fn model(&self) -> String;
    fn version(&self) -> String;
    fn channels(&self) -> Vec<ChannelInfo>;
    /// Channel group names in device order.
    fn channel_groups(&self) -> Vec<String>;
    fn channel_group(&self, name: &str) -> Option<Arc<dyn Configurable>>;
    fn open(&self) -> Result<(), BackendError>;
    fn close(&self) -> Result<(), BackendError>;
    fn as_configurable(&self) -> &dyn Configurable;
}

pub trait RawDriver: Send + Sync {
    fn name(&self) -> &str;
    fn long_name(&self) -> &str;
    fn scan(&self, options: &DriverOptions) -> Result<Vec<DeviceHandle>, BackendError>;
}

pub trait RawSession: Send + Sync {
    fn add_device(&self, device: DeviceHandle) -> Result<(), BackendError>;
    fn add_datafeed_callback(&self, callback: DatafeedCallback) -> Result<(), BackendError>;
    fn remove_datafeed_callbacks(&self) -> Result<(), BackendError>;
    fn set_stopped_callback(&self, callback: StoppedCallback) -> Result<(), BackendError>;
    fn start(&self) -> Result<(), BackendError>;
    /// Blocks until the acquisition ends or [`RawSession::stop`] is called.
    fn run(&self) -> Result<(), BackendError>;
    fn stop(&self) -> Result<(), BackendError>;
    fn is_running(&self) -> bool;
}

/// The library context: driver registry and session factory.
///
/// Creating more than one per process is not supported by real libraries;
/// see [`crate::Context::global_or_init`].
pub trait Backend: Send + Sync {
    /// Registered drivers, in registration order.
    fn drivers(&self) -> Vec<Arc<dyn RawDriver>>;
    fn create_session(&self) -> Result<Arc<dyn RawSession>, BackendError>;
}
