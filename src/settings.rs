//! Runtime settings read from the environment (`.env` is honoured through dotenvy).

use crate::error::ConfigError;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/digiurban";
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_BUCKET: &str = "digiurban-assets";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    /// Schema holding every registry table. Must be a valid PostgreSQL identifier.
    pub schema: String,
    /// Secret required by privileged routes. `None` disables them.
    pub service_key: Option<String>,
    pub cache_ttl: Duration,
    pub read_retries: u32,
    pub retry_delay: Duration,
    pub max_connections: u32,
    pub bind_addr: String,
    pub storage_bucket: String,
    pub storage_public_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.into(),
            schema: DEFAULT_SCHEMA.into(),
            service_key: None,
            cache_ttl: Duration::from_secs(300),
            read_retries: 3,
            retry_delay: Duration::from_millis(200),
            max_connections: 5,
            bind_addr: DEFAULT_BIND_ADDR.into(),
            storage_bucket: DEFAULT_BUCKET.into(),
            storage_public_url: public_url_for_bucket(DEFAULT_BUCKET),
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read every `DIGIURBAN_*` variable over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Unset or blank keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut s = Settings::default();

        if let Some(url) = get("DATABASE_URL") {
            s.database_url = url;
        }
        if let Some(schema) = get("DIGIURBAN_SCHEMA") {
            if !crate::sql::is_identifier(&schema) {
                return Err(ConfigError::InvalidValue {
                    key: "DIGIURBAN_SCHEMA",
                    value: schema,
                });
            }
            s.schema = schema;
        }
        s.service_key = get("DIGIURBAN_SERVICE_KEY");
        if let Some(v) = get("DIGIURBAN_CACHE_TTL_SECS") {
            s.cache_ttl = Duration::from_secs(parse_number("DIGIURBAN_CACHE_TTL_SECS", &v)?);
        }
        if let Some(v) = get("DIGIURBAN_READ_RETRIES") {
            s.read_retries = parse_number("DIGIURBAN_READ_RETRIES", &v)? as u32;
        }
        if let Some(v) = get("DIGIURBAN_RETRY_DELAY_MS") {
            s.retry_delay = Duration::from_millis(parse_number("DIGIURBAN_RETRY_DELAY_MS", &v)?);
        }
        if let Some(v) = get("DIGIURBAN_DB_MAX_CONNECTIONS") {
            s.max_connections = parse_number("DIGIURBAN_DB_MAX_CONNECTIONS", &v)? as u32;
        }
        if let Some(addr) = get("DIGIURBAN_BIND_ADDR") {
            s.bind_addr = addr;
        }
        if let Some(bucket) = get("DIGIURBAN_STORAGE_BUCKET") {
            s.storage_public_url = public_url_for_bucket(&bucket);
            s.storage_bucket = bucket;
        }
        if let Some(url) = get("DIGIURBAN_STORAGE_PUBLIC_URL") {
            s.storage_public_url = url.trim_end_matches('/').to_string();
        }
        Ok(s)
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

fn public_url_for_bucket(bucket: &str) -> String {
    format!("https://{}.s3.amazonaws.com", bucket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(s.schema, "public");
        assert_eq!(s.cache_ttl, Duration::from_secs(300));
        assert_eq!(s.read_retries, 3);
        assert!(s.service_key.is_none());
        assert_eq!(s.storage_public_url, "https://digiurban-assets.s3.amazonaws.com");
    }

    #[test]
    fn overrides_are_read() {
        let s = Settings::from_lookup(lookup(&[
            ("DIGIURBAN_CACHE_TTL_SECS", "60"),
            ("DIGIURBAN_READ_RETRIES", "1"),
            ("DIGIURBAN_STORAGE_BUCKET", "municipio"),
            ("DIGIURBAN_SERVICE_KEY", "  segredo "),
        ]))
        .unwrap();
        assert_eq!(s.cache_ttl, Duration::from_secs(60));
        assert_eq!(s.read_retries, 1);
        assert_eq!(s.storage_bucket, "municipio");
        assert_eq!(s.storage_public_url, "https://municipio.s3.amazonaws.com");
        assert_eq!(s.service_key.as_deref(), Some("segredo"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Settings::from_lookup(lookup(&[("DIGIURBAN_READ_RETRIES", "many")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("DIGIURBAN_SCHEMA", "bad-schema;")])).is_err());
    }
}
