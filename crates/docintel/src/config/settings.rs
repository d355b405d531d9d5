//! Process configuration read from environment variables.
//!
//! Everything is read once by [`Settings::from_env`] at start-up and handed
//! to the constructors of the storage client, ledger store, summarizer and
//! worker pool. Nothing here is global.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

const DEFAULT_SERVER_PORT: u16 = 8000;
const DEFAULT_STORAGE_ROOT: &str = "./storage";
const DEFAULT_STORAGE_REGION: &str = "us-east-1";
const DEFAULT_OCR_DPI: u32 = 300;
const DEFAULT_SUMMARIZER_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SUMMARIZER_MODEL: &str = "facebook/bart-large-cnn";

#[derive(Debug)]
pub struct Settings {
    pub server_port: u16,
    pub storage: StorageSettings,
    pub ledger: LedgerBackend,
    pub worker_count: usize,
    pub ocr_dpi: u32,
    pub summarizer: SummarizerSettings,
    pub rules_path: Option<PathBuf>,
    pub completion_webhook_url: Option<String>,
    pub log_format: LogFormat,
}

#[derive(Debug)]
pub enum StorageSettings {
    Filesystem {
        root: PathBuf,
    },
    Http {
        endpoint: String,
        bucket: String,
        region: String,
        token: Option<SecretString>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerBackend {
    Memory,
    /// `sqlite:<path>`; `sqlite::memory:` opens a private in-memory database.
    Sqlite(Option<PathBuf>),
}

#[derive(Debug)]
pub struct SummarizerSettings {
    /// Endpoint of a hosted summarization model. When unset the extractive
    /// summarizer is used.
    pub url: Option<String>,
    pub token: Option<SecretString>,
    /// Reported in the record's model versions.
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

impl FromStr for LedgerBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("memory") {
            return Ok(Self::Memory);
        }
        match s.strip_prefix("sqlite:") {
            Some(":memory:") => Ok(Self::Sqlite(None)),
            Some(path) if !path.is_empty() => {
                Ok(Self::Sqlite(Some(PathBuf::from(path.trim_start_matches("//")))))
            }
            _ => Err(()),
        }
    }
}

impl Settings {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let storage = match env
            .optional("STORAGE_BACKEND")
            .unwrap_or_else(|| "filesystem".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "filesystem" | "fs" => StorageSettings::Filesystem {
                root: PathBuf::from(
                    env.optional("STORAGE_ROOT")
                        .unwrap_or_else(|| DEFAULT_STORAGE_ROOT.to_string()),
                ),
            },
            "http" | "s3" => StorageSettings::Http {
                endpoint: env.required("STORAGE_ENDPOINT")?,
                bucket: env.required("STORAGE_BUCKET")?,
                region: env
                    .optional("STORAGE_REGION")
                    .unwrap_or_else(|| DEFAULT_STORAGE_REGION.to_string()),
                token: env.optional("STORAGE_TOKEN").map(SecretString::from),
            },
            other => {
                return Err(ConfigError::InvalidValue {
                    name: "STORAGE_BACKEND".to_string(),
                    reason: format!("unknown backend '{}'", other),
                })
            }
        };

        let ledger = match env.optional("LEDGER_URL") {
            Some(url) => url.parse().map_err(|()| ConfigError::InvalidValue {
                name: "LEDGER_URL".to_string(),
                reason: format!("expected 'memory' or 'sqlite:<path>', got '{}'", url),
            })?,
            None => LedgerBackend::Memory,
        };

        let worker_count = env.parsed("WORKER_COUNT")?.unwrap_or_else(num_cpus::get);
        if worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                name: "WORKER_COUNT".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let log_format = match env.optional("LOG_FORMAT") {
            Some(value) => value.parse().map_err(|()| ConfigError::InvalidValue {
                name: "LOG_FORMAT".to_string(),
                reason: format!("expected 'compact' or 'json', got '{}'", value),
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            server_port: env.parsed("SERVER_PORT")?.unwrap_or(DEFAULT_SERVER_PORT),
            storage,
            ledger,
            worker_count,
            ocr_dpi: env.parsed("OCR_DPI")?.unwrap_or(DEFAULT_OCR_DPI),
            summarizer: SummarizerSettings {
                url: env.optional("SUMMARIZER_URL"),
                token: env.optional("SUMMARIZER_TOKEN").map(SecretString::from),
                model: env
                    .optional("SUMMARIZER_MODEL")
                    .unwrap_or_else(|| DEFAULT_SUMMARIZER_MODEL.to_string()),
                timeout: Duration::from_secs(
                    env.parsed("SUMMARIZER_TIMEOUT_SECS")?
                        .unwrap_or(DEFAULT_SUMMARIZER_TIMEOUT_SECS),
                ),
            },
            rules_path: env.optional("RULES_PATH").map(PathBuf::from),
            completion_webhook_url: env.optional("COMPLETION_WEBHOOK_URL"),
            log_format,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, ConfigError> {
        self.optional(name)
            .ok_or_else(|| ConfigError::MissingVariable(name.to_string()))
    }

    fn parsed<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(name)
            .map(|value| {
                value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                    name: name.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()
    }
}
