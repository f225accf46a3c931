//! Configuration management for the annotation server

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::annotations::NOTE_MAX_CHARS;

/// A set environment variable that could not be used
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value {value:?}")]
    Invalid { key: String, value: String },

    #[error("{key} is not valid unicode")]
    NotUnicode { key: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub annotations: AnnotationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationConfig {
    /// Quiet period before a note edit is saved
    pub autosave_ms: u64,
    /// Longest note body kept
    pub note_max_chars: usize,
    /// Class prefix for rendered marks
    pub class_prefix: String,
}

impl AnnotationConfig {
    pub fn autosave_quiet_period(&self) -> Duration {
        Duration::from_millis(self.autosave_ms)
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        AnnotationConfig {
            autosave_ms: 2000,
            note_max_chars: NOTE_MAX_CHARS,
            class_prefix: "ia-mark".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./annotations.db".to_string(),
            },
            annotations: AnnotationConfig::default(),
        }
    }
}

impl Config {
    /// Read overrides from the environment; unset variables keep their defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Config {
            server: ServerConfig {
                host: parse_var("SERVER_HOST", defaults.server.host)?,
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            database: DatabaseConfig {
                url: parse_var("DATABASE_URL", defaults.database.url)?,
            },
            annotations: AnnotationConfig {
                autosave_ms: parse_var("NOTE_AUTOSAVE_MS", defaults.annotations.autosave_ms)?,
                note_max_chars: parse_var("NOTE_MAX_CHARS", defaults.annotations.note_max_chars)?,
                class_prefix: parse_var("MARK_CLASS_PREFIX", defaults.annotations.class_prefix)?,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { key: key.to_string() }),
    }
}
