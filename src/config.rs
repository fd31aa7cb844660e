use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::pipeline::processor::PipelineLimits;

/// Application-level constants
pub const APP_NAME: &str = "Intake";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 60;
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_UPLOAD_MB: u64 = 50;

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,intake_lib=info,tower_http=warn"
}

/// Application data directory: ~/Intake/, or ./Intake when no home
/// directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Runtime settings, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    /// clamd TCP address. No scanner is used when absent.
    pub clamd_addr: Option<String>,
    pub scan_timeout: Duration,
    pub extraction_timeout: Duration,
    pub max_upload_bytes: u64,
    /// Tesseract language data directory (`TESSDATA_PREFIX`).
    pub tessdata_dir: Option<PathBuf>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            data_dir: app_data_dir(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            clamd_addr: None,
            scan_timeout: Duration::from_secs(DEFAULT_SCAN_TIMEOUT_SECS),
            extraction_timeout: Duration::from_secs(DEFAULT_EXTRACTION_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            tessdata_dir: None,
        }
    }
}

impl IntakeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset; values that
    /// fail to parse fall back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();
        Self {
            data_dir: get("INTAKE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            bind_addr: parse_or("INTAKE_BIND_ADDR", get("INTAKE_BIND_ADDR"), defaults.bind_addr),
            clamd_addr: get("INTAKE_CLAMD_ADDR"),
            scan_timeout: Duration::from_secs(parse_or(
                "INTAKE_SCAN_TIMEOUT_SECS",
                get("INTAKE_SCAN_TIMEOUT_SECS"),
                DEFAULT_SCAN_TIMEOUT_SECS,
            )),
            extraction_timeout: Duration::from_secs(parse_or(
                "INTAKE_EXTRACTION_TIMEOUT_SECS",
                get("INTAKE_EXTRACTION_TIMEOUT_SECS"),
                DEFAULT_EXTRACTION_TIMEOUT_SECS,
            )),
            max_upload_bytes: parse_or(
                "INTAKE_MAX_UPLOAD_MB",
                get("INTAKE_MAX_UPLOAD_MB"),
                DEFAULT_MAX_UPLOAD_MB,
            )
            .saturating_mul(1024 * 1024),
            tessdata_dir: get("TESSDATA_PREFIX").map(PathBuf::from),
        }
    }

    /// Root of the per-identity upload directories.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("intake.db")
    }

    pub fn limits(&self) -> PipelineLimits {
        PipelineLimits {
            scan_timeout: self.scan_timeout,
            extraction_timeout: self.extraction_timeout,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Invalid setting, using default");
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> IntakeConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IntakeConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config, IntakeConfig::default());
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert!(config.clamd_addr.is_none());
    }

    #[test]
    fn app_data_dir_named_after_app() {
        assert!(app_data_dir().ends_with("Intake"));
    }

    #[test]
    fn environment_overrides() {
        let config = config_from(&[
            ("INTAKE_DATA_DIR", "/srv/intake"),
            ("INTAKE_BIND_ADDR", "0.0.0.0:9000"),
            ("INTAKE_CLAMD_ADDR", "127.0.0.1:3310"),
            ("INTAKE_SCAN_TIMEOUT_SECS", "5"),
            ("INTAKE_EXTRACTION_TIMEOUT_SECS", "30"),
            ("INTAKE_MAX_UPLOAD_MB", "2"),
            ("TESSDATA_PREFIX", "/usr/share/tessdata"),
        ]);

        assert_eq!(config.data_dir, PathBuf::from("/srv/intake"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.clamd_addr.as_deref(), Some("127.0.0.1:3310"));
        assert_eq!(config.scan_timeout, Duration::from_secs(5));
        assert_eq!(config.extraction_timeout, Duration::from_secs(30));
        assert_eq!(config.max_upload_bytes, 2 * 1024 * 1024);
        assert_eq!(config.tessdata_dir, Some(PathBuf::from("/usr/share/tessdata")));
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let config = config_from(&[
            ("INTAKE_SCAN_TIMEOUT_SECS", "soon"),
            ("INTAKE_MAX_UPLOAD_MB", "-3"),
            ("INTAKE_BIND_ADDR", "not an address"),
        ]);
        assert_eq!(config.scan_timeout, Duration::from_secs(DEFAULT_SCAN_TIMEOUT_SECS));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_MB * 1024 * 1024);
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn blank_values_are_unset() {
        let config = config_from(&[("INTAKE_CLAMD_ADDR", "   "), ("INTAKE_DATA_DIR", "")]);
        assert!(config.clamd_addr.is_none());
        assert_eq!(config.data_dir, app_data_dir());
    }

    #[test]
    fn derived_paths_live_under_data_dir() {
        let config = config_from(&[("INTAKE_DATA_DIR", "/data")]);
        assert_eq!(config.uploads_dir(), PathBuf::from("/data/uploads"));
        assert_eq!(config.database_path(), PathBuf::from("/data/intake.db"));
        assert_eq!(config.limits().max_upload_bytes, config.max_upload_bytes);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
