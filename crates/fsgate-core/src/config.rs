//! Startup configuration
//!
//! Read once from the environment:
//! - `ALLOWED_PATHS`: comma separated `path:read-only` / `path:read-write` entries
//! - `MAX_FILE_SIZE_MB`: size ceiling in megabytes (default 10)
//! - `NO_SIZE_LIMIT=true`: disable the ceiling

use crate::error::ConfigError;
use crate::sandbox::PermissionRegistry;
use std::fmt;

pub const ALLOWED_PATHS_VAR: &str = "ALLOWED_PATHS";
pub const MAX_FILE_SIZE_VAR: &str = "MAX_FILE_SIZE_MB";
pub const NO_SIZE_LIMIT_VAR: &str = "NO_SIZE_LIMIT";

pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Size ceiling applied to reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLimit {
    Disabled,
    Bytes(u64),
}

impl SizeLimit {
    pub fn from_megabytes(mb: u64) -> Self {
        Self::Bytes(mb.saturating_mul(BYTES_PER_MB))
    }

    /// The ceiling in bytes, if one is active
    pub fn bytes(&self) -> Option<u64> {
        match self {
            SizeLimit::Disabled => None,
            SizeLimit::Bytes(limit) => Some(*limit),
        }
    }

    /// `Some(limit)` when `size` is over an active ceiling
    pub fn exceeded_by(&self, size: u64) -> Option<u64> {
        self.bytes().filter(|limit| size > *limit)
    }
}

impl Default for SizeLimit {
    fn default() -> Self {
        Self::from_megabytes(DEFAULT_MAX_FILE_SIZE_MB)
    }
}

impl fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeLimit::Disabled => f.write_str("DISABLED"),
            SizeLimit::Bytes(b) if b % BYTES_PER_MB == 0 => write!(f, "{}MB", b / BYTES_PER_MB),
            SizeLimit::Bytes(b) => write!(f, "{} bytes", b),
        }
    }
}

/// Everything the server needs, resolved and validated
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub registry: PermissionRegistry,
    pub size_limit: SizeLimit,
}

impl ServerConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let allowed = lookup(ALLOWED_PATHS_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingConfiguration)?;
        let registry = PermissionRegistry::from_entries(allowed.split(','))?;

        let size_limit = Self::parse_size_limit(
            lookup(NO_SIZE_LIMIT_VAR).as_deref(),
            lookup(MAX_FILE_SIZE_VAR).as_deref(),
        )?;

        Ok(Self {
            registry,
            size_limit,
        })
    }

    fn parse_size_limit(
        no_limit: Option<&str>,
        max_mb: Option<&str>,
    ) -> Result<SizeLimit, ConfigError> {
        if no_limit.is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(SizeLimit::Disabled);
        }

        match max_mb {
            None => Ok(SizeLimit::default()),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(mb) if mb > 0 => Ok(SizeLimit::from_megabytes(mb)),
                _ => Err(ConfigError::InvalidSizeLimit(raw.to_string())),
            },
        }
    }
}
