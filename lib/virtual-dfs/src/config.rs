//! Backend configuration.
//!
//! The factory string carries configuration in its query, e.g.
//! `file:///var/lib/dfs?buffer_size=4096&rename=overwrite`. The same
//! settings deserialize with serde so callers can embed them in their own
//! configuration files.

use serde::Deserialize;

use crate::{DfsError, RenamePolicy, Result};

/// Default size for write buffers.
///
/// Chosen to be large enough that small appends are coalesced before they
/// reach the backend.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Largest accepted write buffer.
pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Bytes a write handle buffers before pushing them to the backend.
    #[serde(deserialize_with = "deserialize_buffer_size")]
    pub buffer_size: usize,
    /// What a rename onto an existing destination does.
    pub rename: RenamePolicy,
    /// Upper bound on any single file's length. Writes past it are short.
    pub max_file_size: Option<u64>,
    /// Create the backend root if it is missing.
    pub create_root: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            rename: RenamePolicy::default(),
            max_file_size: None,
            create_root: true,
        }
    }
}

impl BackendConfig {
    /// Builds a configuration from `key=value` pairs, starting from the defaults.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            config.set(key.as_ref(), value.as_ref())?;
        }
        Ok(config)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "buffer_size" => {
                self.buffer_size = check_buffer_size(parse(key, value)?)?;
            }
            "rename" => self.rename = value.parse()?,
            "max_file_size" => self.max_file_size = Some(parse(key, value)?),
            "create_root" => self.create_root = parse(key, value)?,
            other => {
                return Err(DfsError::InvalidConfig(format!(
                    "unknown configuration key `{other}`"
                )));
            }
        }
        Ok(())
    }

    pub fn with_rename_policy(mut self, rename: RenamePolicy) -> Self {
        self.rename = rename;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.clamp(1, MAX_BUFFER_SIZE);
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = Some(max_file_size);
        self
    }
}

fn check_buffer_size(buffer_size: usize) -> Result<usize> {
    if buffer_size == 0 || buffer_size > MAX_BUFFER_SIZE {
        return Err(DfsError::InvalidConfig(format!(
            "buffer_size must be between 1 and {MAX_BUFFER_SIZE}, got {buffer_size}"
        )));
    }
    Ok(buffer_size)
}

fn deserialize_buffer_size<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let buffer_size = usize::deserialize(deserializer)?;
    check_buffer_size(buffer_size).map_err(serde::de::Error::custom)
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| DfsError::InvalidConfig(format!("invalid value `{value}` for `{key}`: {e}")))
}
