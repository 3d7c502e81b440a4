use std::collections::HashMap;
use std::env;

use chrono::Duration;
use notesync_core::config::{DEFAULT_CONFLICT_WINDOW_SECS, DEFAULT_LIMIT};
use notesync_core::{SyncField, SyncSettings};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: String,
    pub default_limit: usize,
    pub conflict_window: Duration,
    pub sync_fields: Vec<SyncField>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "NOTESYNC_BIND_ADDR", "127.0.0.1:8080");
        let database_path = value_or_default(&lookup, "NOTESYNC_DATABASE_PATH", "notesync.db");

        let default_limit = value_or_default(
            &lookup,
            "NOTESYNC_DEFAULT_LIMIT",
            &DEFAULT_LIMIT.to_string(),
        )
        .parse::<usize>()
        .map_err(|_| {
            ConfigError::Invalid(format!(
                "NOTESYNC_DEFAULT_LIMIT must be an integer in [1, {DEFAULT_LIMIT}]"
            ))
        })?;
        if !(1..=DEFAULT_LIMIT).contains(&default_limit) {
            return Err(ConfigError::Invalid(format!(
                "NOTESYNC_DEFAULT_LIMIT must be in [1, {DEFAULT_LIMIT}]"
            )));
        }

        let conflict_window_secs = value_or_default(
            &lookup,
            "NOTESYNC_CONFLICT_WINDOW_SECS",
            &DEFAULT_CONFLICT_WINDOW_SECS.to_string(),
        )
        .parse::<i64>()
        .map_err(|_| {
            ConfigError::Invalid(
                "NOTESYNC_CONFLICT_WINDOW_SECS must be an integer in [1, 3600]".to_string(),
            )
        })?;
        if !(1..=3_600).contains(&conflict_window_secs) {
            return Err(ConfigError::Invalid(
                "NOTESYNC_CONFLICT_WINDOW_SECS must be in [1, 3600]".to_string(),
            ));
        }

        let sync_fields = match optional_trimmed(&lookup, "NOTESYNC_SYNC_FIELDS") {
            Some(raw) => SyncField::parse_list(&raw)
                .map_err(|error| ConfigError::Invalid(format!("NOTESYNC_SYNC_FIELDS: {error}")))?,
            None => SyncField::DEFAULT.to_vec(),
        };
        if sync_fields.is_empty() {
            return Err(ConfigError::Invalid(
                "NOTESYNC_SYNC_FIELDS must name at least one field".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            database_path,
            default_limit,
            conflict_window: Duration::seconds(conflict_window_secs),
            sync_fields,
        })
    }

    /// Engine settings handed to every per-request sync manager.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings::default()
            .with_default_limit(self.default_limit)
            .with_conflict_window(self.conflict_window)
            .with_sync_fields(self.sync_fields.clone())
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_defaults_without_env() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database_path, "notesync.db");
        assert_eq!(config.default_limit, 100_000);
        assert_eq!(config.conflict_window, Duration::seconds(20));
        assert_eq!(config.sync_fields, SyncField::DEFAULT.to_vec());
    }

    #[test]
    fn config_reads_overrides() {
        let config = config_from(&[
            ("NOTESYNC_DEFAULT_LIMIT", "500"),
            ("NOTESYNC_CONFLICT_WINDOW_SECS", " 45 "),
            ("NOTESYNC_SYNC_FIELDS", "content,deleted"),
        ])
        .unwrap();

        let settings = config.sync_settings();
        assert_eq!(settings.default_limit, 500);
        assert_eq!(settings.conflict_window, Duration::seconds(45));
        assert_eq!(
            settings.sync_fields,
            vec![SyncField::Content, SyncField::Deleted]
        );
    }

    #[test]
    fn config_rejects_out_of_range_values() {
        let err = config_from(&[("NOTESYNC_DEFAULT_LIMIT", "0")]).unwrap_err();
        assert!(err.to_string().contains("NOTESYNC_DEFAULT_LIMIT"));

        let err = config_from(&[("NOTESYNC_CONFLICT_WINDOW_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("NOTESYNC_CONFLICT_WINDOW_SECS"));

        let err = config_from(&[("NOTESYNC_SYNC_FIELDS", "content,uuid")]).unwrap_err();
        assert!(err.to_string().contains("uuid"));

        let err = config_from(&[("NOTESYNC_SYNC_FIELDS", " , ")]).unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }
}
