use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::workflows::intake::eligibility::{EligibilityConfig, IncomeThresholds, ThresholdError};
use crate::workflows::intake::notifications::DispatchMode;

const DEFAULT_MAIL_FROM: &str = "Get Water Wise Buffalo <hello@getwaterwisebuffalo.org>";
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub program: ProgramConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat(raw))?,
            Err(_) => LogFormat::Compact,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            program: ProgramConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Program rules and outbound integration settings for the intake workflows.
#[derive(Debug, Clone, Default)]
pub struct ProgramConfig {
    pub eligibility: EligibilityConfig,
    pub notifications: NotificationConfig,
    pub uploads: UploadConfig,
}

impl ProgramConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let eligibility = match env::var("APP_INCOME_LIMITS_CSV") {
            Ok(path) => load_income_limits_csv(Path::new(&path))?,
            Err(_) => {
                let defaults = EligibilityConfig::default();
                EligibilityConfig {
                    eligibility: thresholds_from_env(
                        "APP_ELIGIBILITY_CEILINGS",
                        defaults.eligibility,
                    )?,
                    very_low_income: thresholds_from_env(
                        "APP_VERY_LOW_INCOME_CEILINGS",
                        defaults.very_low_income,
                    )?,
                }
            }
        };

        let from_address =
            env::var("APP_MAIL_FROM").unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string());
        let dispatch = match env::var("APP_NOTIFICATION_DISPATCH") {
            Ok(raw) => DispatchMode::parse(&raw).ok_or(ConfigError::InvalidDispatchMode(raw))?,
            Err(_) => DispatchMode::Background,
        };

        let max_bytes = match env::var("APP_MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|bytes| *bytes > 0)
                .ok_or(ConfigError::InvalidUploadLimit)?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            eligibility,
            notifications: NotificationConfig {
                from_address,
                dispatch,
            },
            uploads: UploadConfig { max_bytes },
        })
    }
}

/// Sender identity and delivery mode for applicant emails.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub from_address: String,
    pub dispatch: DispatchMode,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            from_address: DEFAULT_MAIL_FROM.to_string(),
            dispatch: DispatchMode::Background,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn thresholds_from_env(
    variable: &'static str,
    fallback: IncomeThresholds,
) -> Result<IncomeThresholds, ConfigError> {
    match env::var(variable) {
        Ok(raw) => IncomeThresholds::parse_list(&raw)
            .map_err(|source| ConfigError::InvalidThresholds { variable, source }),
        Err(_) => Ok(fallback),
    }
}

#[derive(Debug, Deserialize)]
struct IncomeLimitRow {
    household_size: u8,
    eligibility_ceiling: Decimal,
    very_low_income_ceiling: Decimal,
}

/// Read both threshold tables from a CSV export of the program-year income limits.
pub fn load_income_limits_csv(path: &Path) -> Result<EligibilityConfig, ConfigError> {
    let mut reader = csv::Reader::from_path(path).map_err(|source| ConfigError::IncomeLimits {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rows = Vec::new();
    for row in reader.deserialize::<IncomeLimitRow>() {
        rows.push(row.map_err(|source| ConfigError::IncomeLimits {
            path: path.to_path_buf(),
            source,
        })?);
    }
    rows.sort_by_key(|row| row.household_size);

    for (index, row) in rows.iter().enumerate() {
        let expected = index + 1;
        if usize::from(row.household_size) != expected {
            return Err(ConfigError::InvalidThresholds {
                variable: "APP_INCOME_LIMITS_CSV",
                source: ThresholdError::Gap {
                    expected,
                    found: row.household_size,
                },
            });
        }
    }

    Ok(EligibilityConfig {
        eligibility: csv_table(&rows, |row| row.eligibility_ceiling)?,
        very_low_income: csv_table(&rows, |row| row.very_low_income_ceiling)?,
    })
}

fn csv_table(
    rows: &[IncomeLimitRow],
    select: fn(&IncomeLimitRow) -> Decimal,
) -> Result<IncomeThresholds, ConfigError> {
    IncomeThresholds::new(rows.iter().map(select).collect()).map_err(|source| {
        ConfigError::InvalidThresholds {
            variable: "APP_INCOME_LIMITS_CSV",
            source,
        }
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidLogFormat(String),
    InvalidThresholds {
        variable: &'static str,
        source: ThresholdError,
    },
    IncomeLimits {
        path: PathBuf,
        source: csv::Error,
    },
    InvalidDispatchMode(String),
    InvalidUploadLimit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be compact or pretty (found '{value}')")
            }
            ConfigError::InvalidThresholds { variable, source } => {
                write!(f, "{variable} is not a usable income table: {source}")
            }
            ConfigError::IncomeLimits { path, .. } => {
                write!(f, "unable to read income limits from {}", path.display())
            }
            ConfigError::InvalidDispatchMode(value) => write!(
                f,
                "APP_NOTIFICATION_DISPATCH must be inline or background (found '{value}')"
            ),
            ConfigError::InvalidUploadLimit => {
                write!(f, "APP_MAX_UPLOAD_BYTES must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidThresholds { source, .. } => Some(source),
            ConfigError::IncomeLimits { source, .. } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLogFormat(_)
            | ConfigError::InvalidDispatchMode(_)
            | ConfigError::InvalidUploadLimit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for variable in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "APP_ELIGIBILITY_CEILINGS",
            "APP_VERY_LOW_INCOME_CEILINGS",
            "APP_INCOME_LIMITS_CSV",
            "APP_MAIL_FROM",
            "APP_NOTIFICATION_DISPATCH",
            "APP_MAX_UPLOAD_BYTES",
        ] {
            env::remove_var(variable);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.log_format, LogFormat::Compact);
        assert_eq!(
            config.program.eligibility.eligibility.ceiling_for(1),
            Decimal::from(41_850u32)
        );
        assert_eq!(config.program.notifications.dispatch, DispatchMode::Background);
        assert_eq!(config.program.uploads.max_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn threshold_tables_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ELIGIBILITY_CEILINGS", "30000, 40000");
        env::set_var("APP_NOTIFICATION_DISPATCH", "inline");
        let config = AppConfig::load().expect("config loads");
        let table = &config.program.eligibility.eligibility;
        assert_eq!(table.ceiling_for(1), Decimal::from(30_000u32));
        assert_eq!(table.ceiling_for(2), Decimal::from(40_000u32));
        assert_eq!(table.ceiling_for(7), Decimal::from(40_000u32));
        assert_eq!(config.program.notifications.dispatch, DispatchMode::Inline);
        reset_env();
    }

    #[test]
    fn rejects_decreasing_threshold_table() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_VERY_LOW_INCOME_CEILINGS", "30000,20000");
        match AppConfig::load() {
            Err(ConfigError::InvalidThresholds { variable, .. }) => {
                assert_eq!(variable, "APP_VERY_LOW_INCOME_CEILINGS");
            }
            other => panic!("expected threshold error, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn income_limits_csv_overrides_both_tables() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let path = env::temp_dir().join(format!("income-limits-{}.csv", std::process::id()));
        let mut file = std::fs::File::create(&path).expect("create csv");
        writeln!(
            file,
            "household_size,eligibility_ceiling,very_low_income_ceiling\n2,50000,31000\n1,44000,27000"
        )
        .expect("write csv");
        env::set_var("APP_INCOME_LIMITS_CSV", &path);

        let config = AppConfig::load().expect("config loads");
        let limits = &config.program.eligibility;
        assert_eq!(limits.eligibility.ceiling_for(1), Decimal::from(44_000u32));
        assert_eq!(limits.very_low_income.ceiling_for(2), Decimal::from(31_000u32));

        std::fs::remove_file(&path).ok();
        reset_env();
    }

    #[test]
    fn income_limits_csv_must_be_contiguous() {
        let path = env::temp_dir().join(format!("income-gap-{}.csv", std::process::id()));
        std::fs::write(
            &path,
            "household_size,eligibility_ceiling,very_low_income_ceiling\n1,44000,27000\n3,52000,32000\n",
        )
        .expect("write csv");

        match load_income_limits_csv(&path) {
            Err(ConfigError::InvalidThresholds {
                source: ThresholdError::Gap { expected, found },
                ..
            }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("expected gap error, got {other:?}"),
        }
        std::fs::remove_file(&path).ok();
    }
}
