use std::fmt;
use std::str::FromStr;

/// Scan options passed to a driver, in the order they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverOptions {
    pairs: Vec<(String, String)>,
}

impl DriverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an option, builder style.
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.pairs.push((key.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for DriverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverSpecError {
    #[error("Missing driver name in driver specification '{spec}'")]
    EmptyDriverName { spec: String },

    #[error("Malformed option '{option}' in driver specification '{spec}'. Expected key=value")]
    MalformedOption { spec: String, option: String },
}

/// A driver specification as used by `sigrok-cli --driver`:
/// `driverName[:key=value[,key=value...]]`.
///
/// Options may be separated by `:` or `,`, so `rdtech-dps:conn=/dev/ttyUSB0:modbusaddr=1`
/// and `rdtech-dps:conn=/dev/ttyUSB0,modbusaddr=1` are equivalent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSpec {
    pub driver: String,
    pub options: DriverOptions,
}

impl DriverSpec {
    pub fn new(driver: &str) -> Self {
        Self {
            driver: driver.to_string(),
            options: DriverOptions::new(),
        }
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key, value);
        self
    }
}

impl FromStr for DriverSpec {
    type Err = DriverSpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parts = spec.split(':');
        let driver = parts.next().unwrap_or_default().trim();
        if driver.is_empty() {
            return Err(DriverSpecError::EmptyDriverName {
                spec: spec.to_string(),
            });
        }

        let mut options = DriverOptions::new();
        for option in parts.flat_map(|part| part.split(',')) {
            if option.trim().is_empty() {
                continue;
            }
            match option.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    options.insert(key.trim(), value.trim());
                }
                _ => {
                    return Err(DriverSpecError::MalformedOption {
                        spec: spec.to_string(),
                        option: option.to_string(),
                    })
                }
            }
        }

        Ok(Self {
            driver: driver.to_string(),
            options,
        })
    }
}

impl fmt::Display for DriverSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.driver)?;
        if !self.options.is_empty() {
            write!(f, ":{}", self.options)?;
        }
        Ok(())
    }
}
