//! Property resolution with environment variable support.
//!
//! Resolution chain, highest priority first:
//! 1. Environment variable `{prefix}{env_key}` (e.g. `VELOSTREAM_EDGE_TICK_INTERVAL_MS`)
//! 2. Query property from the `WITH (...)` clause, trying each key in order
//! 3. The caller's current value

use log::{debug, warn};
use std::collections::HashMap;
use std::str::FromStr;

/// Default environment prefix for engine settings.
pub const ENV_PREFIX: &str = "VELOSTREAM_EDGE_";

#[derive(Debug, Clone)]
pub struct PropertyResolver {
    prefix: String,
}

impl Default for PropertyResolver {
    fn default() -> Self {
        Self::new(ENV_PREFIX)
    }
}

impl PropertyResolver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn env_var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Resolve a typed value, falling back to `current`.
    ///
    /// Values that fail to parse are skipped with a warning.
    pub fn resolve<T: FromStr>(
        &self,
        env_key: &str,
        prop_keys: &[&str],
        props: &HashMap<String, String>,
        current: T,
    ) -> T {
        let full_env_key = self.env_var_name(env_key);

        if let Ok(env_value) = std::env::var(&full_env_key) {
            match env_value.trim().parse::<T>() {
                Ok(parsed) => {
                    debug!("{} = '{}' (from env var)", full_env_key, env_value);
                    return parsed;
                }
                Err(_) => warn!(
                    "{} = '{}' could not be parsed, ignoring",
                    full_env_key, env_value
                ),
            }
        }

        for key in prop_keys {
            if let Some(value) = lookup_ignore_case(props, key) {
                match value.trim().parse::<T>() {
                    Ok(parsed) => {
                        debug!("{} = '{}' (from property '{}')", full_env_key, value, key);
                        return parsed;
                    }
                    Err(_) => {
                        warn!("Property '{}' = '{}' could not be parsed, ignoring", key, value)
                    }
                }
            }
        }

        current
    }

    /// Resolve a boolean. Accepts true/false, 1/0, yes/no and on/off.
    pub fn resolve_bool(
        &self,
        env_key: &str,
        prop_keys: &[&str],
        props: &HashMap<String, String>,
        current: bool,
    ) -> bool {
        if let Ok(env_value) = std::env::var(self.env_var_name(env_key)) {
            if let Some(parsed) = parse_bool(&env_value) {
                return parsed;
            }
        }

        prop_keys
            .iter()
            .filter_map(|key| lookup_ignore_case(props, key))
            .find_map(|value| parse_bool(value))
            .unwrap_or(current)
    }
}

fn lookup_ignore_case<'a>(props: &'a HashMap<String, String>, key: &str) -> Option<&'a String> {
    props.get(key).or_else(|| {
        props
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
