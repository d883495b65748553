use crate::errors::CompsError;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,

    // Comparable source
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub api_timeout: Duration,
    pub api_max_attempts: u32,

    // Search defaults
    pub default_radius_miles: f64,
    pub default_max_results: u32,
    pub default_max_age_months: u32,

    pub freshness_window: chrono::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "lead_comps.sqlite3".to_string(),
            api_base_url: "https://api.propertydata.co.uk".to_string(),
            api_key: None,
            api_timeout: Duration::from_secs(30),
            api_max_attempts: 3,
            default_radius_miles: 1.0,
            default_max_results: 20,
            default_max_age_months: 18,
            freshness_window: chrono::Duration::hours(24),
        }
    }
}

impl Config {
    /// Process environment, after loading `./.env` if there is one.
    pub fn from_env() -> Result<Self, CompsError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Process environment, falling back to the entries of a dotenv-style file.
    pub fn from_env_file(path: &Path) -> Result<Self, CompsError> {
        let file_vars = read_env_file(path)?;
        Self::from_lookup(|key| env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    /// Builds a config from any key lookup, falling back to defaults for absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CompsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let timeout_secs: u64 = parse_or(&lookup, "COMPS_API_TIMEOUT_SECS", 30)?;
        let freshness_hours: i64 = parse_or(&lookup, "COMPS_FRESHNESS_HOURS", 24)?;
        if freshness_hours <= 0 {
            return Err(CompsError::Config(
                "COMPS_FRESHNESS_HOURS must be positive".to_string(),
            ));
        }

        let api_max_attempts = parse_or(&lookup, "COMPS_API_MAX_ATTEMPTS", defaults.api_max_attempts)?;
        if api_max_attempts == 0 {
            return Err(CompsError::Config(
                "COMPS_API_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            db_path: lookup("COMPS_DB_PATH").unwrap_or(defaults.db_path),
            api_base_url: lookup("COMPS_API_BASE_URL").unwrap_or(defaults.api_base_url),
            api_key: lookup("COMPS_API_KEY").filter(|k| !k.trim().is_empty()),
            api_timeout: Duration::from_secs(timeout_secs),
            api_max_attempts,
            default_radius_miles: parse_or(
                &lookup,
                "COMPS_DEFAULT_RADIUS_MILES",
                defaults.default_radius_miles,
            )?,
            default_max_results: parse_or(
                &lookup,
                "COMPS_DEFAULT_MAX_RESULTS",
                defaults.default_max_results,
            )?,
            default_max_age_months: parse_or(
                &lookup,
                "COMPS_DEFAULT_MAX_AGE_MONTHS",
                defaults.default_max_age_months,
            )?,
            freshness_window: chrono::Duration::hours(freshness_hours),
        })
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, CompsError> {
    let read_err = |e: dotenvy::Error| CompsError::Config(format!("{}: {e}", path.display()));
    dotenvy::from_path_iter(path)
        .map_err(read_err)?
        .map(|item| item.map_err(read_err))
        .collect()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, CompsError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CompsError::Config(format!("{key} has an invalid value: {raw:?}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.db_path, "lead_comps.sqlite3");
        assert_eq!(config.api_key, None);
        assert_eq!(config.default_max_results, 20);
        assert_eq!(config.freshness_window, chrono::Duration::hours(24));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("COMPS_API_KEY", "abc"),
            ("COMPS_DEFAULT_RADIUS_MILES", "2.5"),
            ("COMPS_FRESHNESS_HOURS", "6"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.default_radius_miles, 2.5);
        assert_eq!(config.freshness_window, chrono::Duration::hours(6));
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        let err = Config::from_lookup(lookup_from(&[("COMPS_DEFAULT_MAX_RESULTS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, CompsError::Config(_)));

        let err = Config::from_lookup(lookup_from(&[("COMPS_FRESHNESS_HOURS", "0")])).unwrap_err();
        assert!(matches!(err, CompsError::Config(_)));
    }

    #[test]
    fn env_file_supplies_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# local settings").unwrap();
        writeln!(file, "COMPS_DEFAULT_MAX_RESULTS=42").unwrap();
        writeln!(file, "COMPS_FRESHNESS_HOURS=12").unwrap();

        let config = Config::from_env_file(file.path()).unwrap();
        assert_eq!(config.default_max_results, 42);
        assert_eq!(config.freshness_window, chrono::Duration::hours(12));
    }

    #[test]
    fn missing_env_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::from_env_file(&dir.path().join("absent.env")).unwrap_err();
        assert!(matches!(err, CompsError::Config(_)));
    }
}
