use std::error::Error;
use std::fmt;

pub const ENV_LOCKDEP: &str = "TANGLE_LOCKDEP";
pub const ENV_LOCKDEP_KEY: &str = "TANGLE_LOCKDEP_KEY";
pub const ENV_LOCKDEP_BACKTRACE: &str = "TANGLE_LOCKDEP_BACKTRACE";

/// How the tracker decides that two acquisitions concern "the same lock".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Keying {
    /// Every lock instance is its own graph node.
    #[default]
    Instance,
    /// All locks sharing a name form one node, so an inversion between two
    /// different pairs of instances is still reported.
    Name,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockdepConfig {
    pub enabled: bool,
    pub keying: Keying,
    pub capture_backtraces: bool,
}

impl Default for LockdepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keying: Keying::Instance,
            capture_backtraces: false,
        }
    }
}

impl LockdepConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Empty or whitespace-only values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let read = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_ascii_lowercase())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = read(ENV_LOCKDEP) {
            config.enabled = parse_flag(ENV_LOCKDEP, value)?;
        }
        if let Some(value) = read(ENV_LOCKDEP_KEY) {
            config.keying = match value.as_str() {
                "instance" => Keying::Instance,
                "name" => Keying::Name,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: ENV_LOCKDEP_KEY,
                        value,
                        expected: "`instance` or `name`",
                    });
                }
            };
        }
        if let Some(value) = read(ENV_LOCKDEP_BACKTRACE) {
            config.capture_backtraces = parse_flag(ENV_LOCKDEP_BACKTRACE, value)?;
        }

        Ok(config)
    }
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.as_str() {
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value,
            expected: "a boolean (`1`/`on`/`true` or `0`/`off`/`false`)",
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue {
                var,
                value,
                expected,
            } => write!(f, "{var}={value:?} is invalid, expected {expected}"),
        }
    }
}

impl Error for ConfigError {}
