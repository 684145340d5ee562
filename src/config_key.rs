use std::fmt;

/// Value type a configuration key carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int32,
    UInt64,
    Float,
    String,
    Rational,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int32 => "int32",
            DataType::UInt64 => "uint64",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Rational => "rational",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a backend allows for a key on a given device or channel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Get,
    Set,
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int32(i32),
    UInt64(u64),
    Float(f64),
    String(String),
    Rational(u64, u64),
}

impl ConfigValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ConfigValue::Bool(_) => DataType::Bool,
            ConfigValue::Int32(_) => DataType::Int32,
            ConfigValue::UInt64(_) => DataType::UInt64,
            ConfigValue::Float(_) => DataType::Float,
            ConfigValue::String(_) => DataType::String,
            ConfigValue::Rational(_, _) => DataType::Rational,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ConfigValue::UInt64(v) => Some(*v),
            ConfigValue::Int32(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            ConfigValue::UInt64(v) => Some(*v as f64),
            ConfigValue::Int32(v) => Some(f64::from(*v)),
            ConfigValue::Rational(p, q) if *q != 0 => Some(*p as f64 / *q as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(v) => write!(f, "{}", v),
            ConfigValue::Int32(v) => write!(f, "{}", v),
            ConfigValue::UInt64(v) => write!(f, "{}", v),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::String(v) => write!(f, "{}", v),
            ConfigValue::Rational(p, q) => write!(f, "{}/{}", p, q),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<u64> for ConfigValue {
    fn from(value: u64) -> Self {
        Self::UInt64(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigKeyError {
    #[error("Unknown config key identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("Cannot parse '{text}' as {data_type} for key '{key}'")]
    InvalidValue {
        key: &'static str,
        text: String,
        data_type: DataType,
    },
}

struct KeyInfo {
    id: u32,
    identifier: &'static str,
    description: &'static str,
    data_type: DataType,
}

const fn key(
    id: u32,
    identifier: &'static str,
    description: &'static str,
    data_type: DataType,
) -> KeyInfo {
    KeyInfo {
        id,
        identifier,
        description,
        data_type,
    }
}

// Scan options live in the 20000 range, device options from 30000 on.
static KEYS: &[KeyInfo] = &[
    key(20000, "conn", "Connection", DataType::String),
    key(20001, "serialcomm", "Serial communication", DataType::String),
    key(20002, "modbusaddr", "Modbus slave address", DataType::UInt64),
    key(20003, "logic_channels", "Number of logic channels", DataType::Int32),
    key(20004, "analog_channels", "Number of analog channels", DataType::Int32),
    key(30000, "samplerate", "Sample rate", DataType::UInt64),
    key(30001, "captureratio", "Pre-trigger capture ratio", DataType::UInt64),
    key(30002, "pattern", "Pattern", DataType::String),
    key(30003, "rle", "Run length encoding", DataType::Bool),
    key(30004, "triggerslope", "Trigger slope", DataType::String),
    key(30005, "averaging", "Averaging", DataType::Bool),
    key(30006, "avg_samples", "Number of samples to average over", DataType::UInt64),
    key(30007, "triggersource", "Trigger source", DataType::String),
    key(30008, "horiz_triggerpos", "Horizontal trigger position", DataType::Float),
    key(30009, "buffersize", "Buffer size", DataType::UInt64),
    key(30010, "timebase", "Time base", DataType::Rational),
    key(30011, "filter", "Filter", DataType::Bool),
    key(30012, "vdiv", "Volts/div", DataType::Rational),
    key(30013, "coupling", "Coupling", DataType::String),
    key(30014, "datalog", "Datalog", DataType::Bool),
    key(30015, "enabled", "Channel output enabled", DataType::Bool),
    key(30016, "regulation", "Channel regulation", DataType::String),
    key(30017, "voltage", "Current voltage", DataType::Float),
    key(30018, "voltage_target", "Voltage target", DataType::Float),
    key(30019, "current", "Current current", DataType::Float),
    key(30020, "current_limit", "Current limit", DataType::Float),
    key(30021, "ovp_enabled", "Over-voltage protection enabled", DataType::Bool),
    key(30022, "ovp_active", "Over-voltage protection active", DataType::Bool),
    key(30023, "ovp_threshold", "Over-voltage protection threshold", DataType::Float),
    key(30024, "ocp_enabled", "Over-current protection enabled", DataType::Bool),
    key(30025, "ocp_active", "Over-current protection active", DataType::Bool),
    key(30026, "ocp_threshold", "Over-current protection threshold", DataType::Float),
    key(30027, "amplitude", "Amplitude", DataType::Float),
    key(30028, "offset", "Offset", DataType::Float),
    key(30029, "power", "Power", DataType::Float),
    key(30030, "power_target", "Power target", DataType::Float),
    key(50000, "limit_msec", "Time limit", DataType::UInt64),
    key(50001, "limit_samples", "Sample limit", DataType::UInt64),
    key(50002, "limit_frames", "Frame limit", DataType::UInt64),
];

/// Opaque identifier of a configuration key.
///
/// Keys are recovered from their textual identifier (the names `sigrok-cli
/// --show` prints, e.g. `samplerate` or `voltage_target`) with
/// [`ConfigKey::from_identifier`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigKey {
    id: u32,
}

impl ConfigKey {
    pub const CONN: ConfigKey = ConfigKey { id: 20000 };
    pub const LOGIC_CHANNELS: ConfigKey = ConfigKey { id: 20003 };
    pub const ANALOG_CHANNELS: ConfigKey = ConfigKey { id: 20004 };
    pub const SAMPLERATE: ConfigKey = ConfigKey { id: 30000 };
    pub const PATTERN: ConfigKey = ConfigKey { id: 30002 };
    pub const AVERAGING: ConfigKey = ConfigKey { id: 30005 };
    pub const AMPLITUDE: ConfigKey = ConfigKey { id: 30027 };
    pub const OFFSET: ConfigKey = ConfigKey { id: 30028 };
    pub const LIMIT_MSEC: ConfigKey = ConfigKey { id: 50000 };
    pub const LIMIT_SAMPLES: ConfigKey = ConfigKey { id: 50001 };

    /// Map a key identifier to the key.
    pub fn from_identifier(identifier: &str) -> Result<ConfigKey, ConfigKeyError> {
        KEYS.iter()
            .find(|info| info.identifier == identifier)
            .map(|info| ConfigKey { id: info.id })
            .ok_or_else(|| ConfigKeyError::UnknownIdentifier(identifier.to_string()))
    }

    pub fn from_id(id: u32) -> Option<ConfigKey> {
        KEYS.iter().any(|info| info.id == id).then_some(ConfigKey { id })
    }

    /// Every key identifier this crate knows about.
    pub fn identifiers() -> impl Iterator<Item = &'static str> {
        KEYS.iter().map(|info| info.identifier)
    }

    fn info(&self) -> &'static KeyInfo {
        // Keys are only constructed from table entries.
        KEYS.iter()
            .find(|info| info.id == self.id)
            .unwrap_or(&KEYS[0])
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn identifier(&self) -> &'static str {
        self.info().identifier
    }

    pub fn description(&self) -> &'static str {
        self.info().description
    }

    pub fn data_type(&self) -> DataType {
        self.info().data_type
    }

    /// Parse a value given as text (e.g. from a driver spec or a command
    /// line) into the type this key carries.
    ///
    /// Unsigned integers accept an SI suffix (`k`, `M`, `G`) and an optional
    /// `Hz` unit, so `samplerate` can be given as `1M` or `100 kHz`.
    pub fn parse_value(&self, text: &str) -> Result<ConfigValue, ConfigKeyError> {
        let trimmed = text.trim();
        let parsed = match self.data_type() {
            DataType::Bool => parse_bool(trimmed).map(ConfigValue::Bool),
            DataType::Int32 => trimmed.parse().ok().map(ConfigValue::Int32),
            DataType::UInt64 => parse_si_u64(trimmed).map(ConfigValue::UInt64),
            DataType::Float => trimmed.parse().ok().map(ConfigValue::Float),
            DataType::String => Some(ConfigValue::String(trimmed.to_string())),
            DataType::Rational => parse_rational(trimmed),
        };

        parsed.ok_or_else(|| ConfigKeyError::InvalidValue {
            key: self.identifier(),
            text: text.to_string(),
            data_type: self.data_type(),
        })
    }
}

impl fmt::Debug for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigKey({}, {})", self.id, self.identifier())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn parse_si_u64(text: &str) -> Option<u64> {
    let text = text
        .strip_suffix("Hz")
        .or_else(|| text.strip_suffix("hz"))
        .unwrap_or(text)
        .trim_end();

    let (digits, multiplier) = match text.char_indices().last() {
        Some((i, 'k')) | Some((i, 'K')) => (&text[..i], 1_000),
        Some((i, 'M')) => (&text[..i], 1_000_000),
        Some((i, 'G')) => (&text[..i], 1_000_000_000),
        _ => (text, 1),
    };

    digits.trim().parse::<u64>().ok()?.checked_mul(multiplier)
}

fn parse_rational(text: &str) -> Option<ConfigValue> {
    match text.split_once('/') {
        Some((p, q)) => {
            let p = p.trim().parse().ok()?;
            let q: u64 = q.trim().parse().ok()?;
            (q != 0).then_some(ConfigValue::Rational(p, q))
        }
        None => text.parse().ok().map(|p| ConfigValue::Rational(p, 1)),
    }
}
