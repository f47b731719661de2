// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`ServiceConfig`] they are
//! parsed into once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for the audit log | `./data` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `ANALYSIS_TIMEOUT_MS` | Upper bound on one risk analysis | `10000` |
//! | `FALLBACK_FEE_SOL` | Fee reported when estimation fails | `0.000005` |
//! | `LAMPORTS_PER_SIGNATURE` | Base fee per signature | `5000` |
//! | `STRICT_ACCOUNT_LOOKUP` | Flag accounts not in the resolver table | `false` |
//! | `TIME_LOCK_DELAY_SECS` | Hold applied above the time-lock threshold | `86400` |
//! | `TIME_LOCK_SWEEP_SECS` | Interval of the time-lock sweeper | `30` |
//! | `SCAM_ADDRESSES` | Comma-separated denylist seed | empty |
//! | `SCAM_PATTERNS` | Comma-separated regex patterns | `(?i)drain,(?i)phish,(?i)airdrop` |
//! | `MALICIOUS_PROGRAMS` | Comma-separated malicious program ids | empty |
//! | `EMAIL_API_URL` | HTTP relay used to deliver OTP emails | unset (OTP delivery fails) |
//! | `EMAIL_API_TOKEN` | Bearer token for the relay | unset |
//! | `GATE_PIN_KEY` | HMAC key for the gate PIN (base64) | unset (PIN stage always fails) |
//! | `GATE_PIN_DIGEST` | `HMAC-SHA256(key, pin)` (base64) | unset |
//! | `TLS_CERT_PATH` | PEM certificate chain | unset (plain HTTP) |
//! | `TLS_KEY_PATH` | PEM private key | unset |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use base64ct::{Base64, Encoding};
use url::Url;

use crate::risk::analyzer::{DEFAULT_FALLBACK_FEE_SOL, DEFAULT_LAMPORTS_PER_SIGNATURE};
use crate::risk::registry::DEFAULT_SUSPICIOUS_PATTERNS;
use crate::storage::paths::DATA_ROOT;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const ANALYSIS_TIMEOUT_MS_ENV: &str = "ANALYSIS_TIMEOUT_MS";
pub const FALLBACK_FEE_SOL_ENV: &str = "FALLBACK_FEE_SOL";
pub const LAMPORTS_PER_SIGNATURE_ENV: &str = "LAMPORTS_PER_SIGNATURE";
pub const STRICT_ACCOUNT_LOOKUP_ENV: &str = "STRICT_ACCOUNT_LOOKUP";
pub const TIME_LOCK_DELAY_SECS_ENV: &str = "TIME_LOCK_DELAY_SECS";
pub const TIME_LOCK_SWEEP_SECS_ENV: &str = "TIME_LOCK_SWEEP_SECS";
pub const SCAM_ADDRESSES_ENV: &str = "SCAM_ADDRESSES";
pub const SCAM_PATTERNS_ENV: &str = "SCAM_PATTERNS";
pub const MALICIOUS_PROGRAMS_ENV: &str = "MALICIOUS_PROGRAMS";
pub const EMAIL_API_URL_ENV: &str = "EMAIL_API_URL";
pub const EMAIL_API_TOKEN_ENV: &str = "EMAIL_API_TOKEN";
pub const GATE_PIN_KEY_ENV: &str = "GATE_PIN_KEY";
pub const GATE_PIN_DIGEST_ENV: &str = "GATE_PIN_DIGEST";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ANALYSIS_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_TIME_LOCK_DELAY_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_TIME_LOCK_SWEEP_SECS: u64 = 30;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{present} is set but {missing} is not")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("expected `json` or `pretty`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinConfig {
    pub key: Vec<u8>,
    pub digest: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub log_format: LogFormat,
    pub analysis_timeout: Duration,
    pub fallback_fee_sol: f64,
    pub lamports_per_signature: u64,
    pub strict_account_lookup: bool,
    pub time_lock_delay: Duration,
    pub time_lock_sweep: Duration,
    pub scam_addresses: Vec<String>,
    pub scam_patterns: Vec<String>,
    pub malicious_programs: Vec<String>,
    pub email_api_url: Option<Url>,
    pub email_api_token: Option<String>,
    pub pin: Option<PinConfig>,
    pub tls: Option<TlsPaths>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DATA_ROOT),
            log_format: LogFormat::default(),
            analysis_timeout: Duration::from_millis(DEFAULT_ANALYSIS_TIMEOUT_MS),
            fallback_fee_sol: DEFAULT_FALLBACK_FEE_SOL,
            lamports_per_signature: DEFAULT_LAMPORTS_PER_SIGNATURE,
            strict_account_lookup: false,
            time_lock_delay: Duration::from_secs(DEFAULT_TIME_LOCK_DELAY_SECS),
            time_lock_sweep: Duration::from_secs(DEFAULT_TIME_LOCK_SWEEP_SECS),
            scam_addresses: Vec::new(),
            scam_patterns: DEFAULT_SUSPICIOUS_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            malicious_programs: Vec::new(),
            email_api_url: None,
            email_api_token: None,
            pin: None,
            tls: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let pin = match (get(GATE_PIN_KEY_ENV), get(GATE_PIN_DIGEST_ENV)) {
            (Some(key), Some(digest)) => Some(PinConfig {
                key: decode_base64(GATE_PIN_KEY_ENV, &key)?,
                digest: decode_base64(GATE_PIN_DIGEST_ENV, &digest)?,
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: GATE_PIN_KEY_ENV,
                    missing: GATE_PIN_DIGEST_ENV,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: GATE_PIN_DIGEST_ENV,
                    missing: GATE_PIN_KEY_ENV,
                })
            }
            (None, None) => None,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: TLS_CERT_PATH_ENV,
                    missing: TLS_KEY_PATH_ENV,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: TLS_KEY_PATH_ENV,
                    missing: TLS_CERT_PATH_ENV,
                })
            }
            (None, None) => None,
        };

        let email_api_url = get(EMAIL_API_URL_ENV)
            .map(|raw| {
                Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
                    var: EMAIL_API_URL_ENV,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let fallback_fee_sol = parse_or(&get, FALLBACK_FEE_SOL_ENV, defaults.fallback_fee_sol)?;
        if !fallback_fee_sol.is_finite() || fallback_fee_sol < 0.0 {
            return Err(ConfigError::Invalid {
                var: FALLBACK_FEE_SOL_ENV,
                reason: "must be a non-negative number".to_string(),
            });
        }

        Ok(Self {
            host: get(HOST_ENV).unwrap_or(defaults.host),
            port: parse_or(&get, PORT_ENV, defaults.port)?,
            data_dir: get(DATA_DIR_ENV).map(PathBuf::from).unwrap_or(defaults.data_dir),
            log_format: parse_or(&get, LOG_FORMAT_ENV, defaults.log_format)?,
            analysis_timeout: Duration::from_millis(parse_or(
                &get,
                ANALYSIS_TIMEOUT_MS_ENV,
                DEFAULT_ANALYSIS_TIMEOUT_MS,
            )?),
            fallback_fee_sol,
            lamports_per_signature: parse_or(
                &get,
                LAMPORTS_PER_SIGNATURE_ENV,
                defaults.lamports_per_signature,
            )?,
            strict_account_lookup: parse_or(&get, STRICT_ACCOUNT_LOOKUP_ENV, false)?,
            time_lock_delay: Duration::from_secs(parse_or(
                &get,
                TIME_LOCK_DELAY_SECS_ENV,
                DEFAULT_TIME_LOCK_DELAY_SECS,
            )?),
            time_lock_sweep: Duration::from_secs(parse_or(
                &get,
                TIME_LOCK_SWEEP_SECS_ENV,
                DEFAULT_TIME_LOCK_SWEEP_SECS,
            )?),
            scam_addresses: get(SCAM_ADDRESSES_ENV)
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            scam_patterns: get(SCAM_PATTERNS_ENV)
                .map(|v| split_list(&v))
                .unwrap_or(defaults.scam_patterns),
            malicious_programs: get(MALICIOUS_PROGRAMS_ENV)
                .map(|v| split_list(&v))
                .unwrap_or_default(),
            email_api_url,
            email_api_token: get(EMAIL_API_TOKEN_ENV),
            pin,
            tls,
        })
    }
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn decode_base64(var: &'static str, raw: &str) -> Result<Vec<u8>, ConfigError> {
    Base64::decode_vec(raw.trim()).map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("not valid base64: {e}"),
    })
}
