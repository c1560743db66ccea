use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::workflows::applications::{BankDetails, WorkflowSettings};

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

/// Top-level configuration for the admissions service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub admissions: AdmissionsConfig,
    pub storage: StorageConfig,
    pub notify: NotifyConfig,
    /// Bearer token guarding the admin routes; admin access is disabled when unset.
    pub admin_token: Option<String>,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");

        let defaults = WorkflowSettings::default();
        let bank_defaults = defaults.bank.clone();
        let academic_year = var_or("ADMISSIONS_ACADEMIC_YEAR", &defaults.academic_year);
        if !is_academic_year(&academic_year) {
            return Err(ConfigError::InvalidAcademicYear(academic_year));
        }
        let reference_prefix = var_or("ADMISSIONS_REFERENCE_PREFIX", &defaults.reference_prefix);
        if !reference_prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidReferencePrefix(reference_prefix));
        }

        let admissions = AdmissionsConfig {
            academic_year,
            stream: var_or("ADMISSIONS_STREAM", &defaults.stream),
            reference_prefix: reference_prefix.to_ascii_uppercase(),
            reference_store: PathBuf::from(var_or(
                "ADMISSIONS_REFERENCE_STORE",
                ".admissions/current_application.json",
            )),
            bank: BankDetails {
                bank_name: var_or("ADMISSIONS_BANK_NAME", &bank_defaults.bank_name),
                account_name: var_or("ADMISSIONS_BANK_ACCOUNT_NAME", &bank_defaults.account_name),
                account_number: var_or(
                    "ADMISSIONS_BANK_ACCOUNT_NUMBER",
                    &bank_defaults.account_number,
                ),
                fee_amount: var_or("ADMISSIONS_FEE_AMOUNT", &bank_defaults.fee_amount),
            },
        };

        let storage = StorageConfig {
            root: PathBuf::from(var_or("STORAGE_ROOT", "./storage")),
            public_base_url: var_or("STORAGE_PUBLIC_BASE_URL", "http://127.0.0.1:3000/files"),
            documents_bucket: var_or("STORAGE_DOCUMENTS_BUCKET", &defaults.documents_bucket),
            payments_bucket: var_or("STORAGE_PAYMENTS_BUCKET", &defaults.payments_bucket),
        };

        let timeout_secs = var_or("NOTIFY_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNotifyTimeout)?;
        let notify = NotifyConfig {
            webhook_url: optional_var("NOTIFY_WEBHOOK_URL"),
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            admissions,
            storage,
            notify,
            admin_token: optional_var("ADMIN_API_TOKEN"),
        })
    }

    /// Settings handed to the submission, reconciliation, and export workflows.
    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            academic_year: self.admissions.academic_year.clone(),
            stream: self.admissions.stream.clone(),
            reference_prefix: self.admissions.reference_prefix.clone(),
            documents_bucket: self.storage.documents_bucket.clone(),
            payments_bucket: self.storage.payments_bucket.clone(),
            bank: self.admissions.bank.clone(),
        }
    }
}

/// `YYYY/YYYY` with consecutive years.
fn is_academic_year(value: &str) -> bool {
    match value.split_once('/') {
        Some((start, end)) => match (start.parse::<u16>(), end.parse::<u16>()) {
            (Ok(start), Ok(end)) => start.checked_add(1) == Some(end),
            _ => false,
        },
        None => false,
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
}

#[derive(Debug, Clone)]
pub struct AdmissionsConfig {
    pub academic_year: String,
    pub stream: String,
    pub reference_prefix: String,
    /// Client-side reference slot used by the CLI and the demo wizard.
    pub reference_store: PathBuf,
    pub bank: BankDetails,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub public_base_url: String,
    pub documents_bucket: String,
    pub payments_bucket: String,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidAcademicYear(String),
    InvalidReferencePrefix(String),
    InvalidNotifyTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidAcademicYear(value) => write!(
                f,
                "ADMISSIONS_ACADEMIC_YEAR must look like 2026/2027, got '{value}'"
            ),
            ConfigError::InvalidReferencePrefix(value) => write!(
                f,
                "ADMISSIONS_REFERENCE_PREFIX must be alphanumeric, got '{value}'"
            ),
            ConfigError::InvalidNotifyTimeout => {
                write!(f, "NOTIFY_TIMEOUT_SECS must be a whole number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
