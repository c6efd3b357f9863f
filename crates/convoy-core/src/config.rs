//! Configuration module
//!
//! Both services read their settings from the environment (with `.env`
//! support). Shared storage and queue settings live in `BaseConfig`; each
//! service wraps it with its own knobs.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::backend_types::{QueueBackend, StorageBackend};
use crate::constants::{
    DEFAULT_RESULT_PREFIX, DEFAULT_RESULT_TOPIC, DEFAULT_SOURCE_PREFIX, DEFAULT_UPLOAD_TOPIC,
};

const STORAGE_TIMEOUT_SECS: u64 = 30;
const QUEUE_TIMEOUT_SECS: u64 = 10;
const QUEUE_WAIT_SECS: u64 = 20;
const QUEUE_VISIBILITY_TIMEOUT_SECS: u64 = 900;
const GATEWAY_PORT: u16 = 3000;
const VERIFIER_TIMEOUT_SECS: u64 = 5;
const MAX_UPLOAD_SIZE_MB: usize = 20;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const WORKER_CONCURRENCY: usize = 4;
const CONVERSION_TIMEOUT_SECS: u64 = 600;
const DEFAULT_LOCAL_STORAGE_PATH: &str = "./data";

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!(
                "LOG_FORMAT must be 'compact' or 'json', got '{}'",
                other
            )),
        }
    }
}

/// Object store settings
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_storage_path: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    // Custom endpoint for S3-compatible providers (MinIO, LocalStack, ...)
    pub s3_endpoint: Option<String>,
    pub source_prefix: String,
    pub result_prefix: String,
    pub timeout: Duration,
}

/// Task queue settings
#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    pub sqs_endpoint: Option<String>,
    pub sqs_region: Option<String>,
    pub upload_topic: String,
    pub result_topic: String,
    pub timeout: Duration,
    /// Long-poll wait per receive call
    pub wait_time: Duration,
    /// How long a received message stays hidden before the broker redelivers it
    pub visibility_timeout: Duration,
}

/// Configuration shared by the gateway and the worker
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub environment: String,
    pub log_format: LogFormat,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
}

/// Ingress gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub base: BaseConfig,
    pub server_port: u16,
    pub auth_svc_url: String,
    pub verifier_timeout: Duration,
    pub max_upload_size_bytes: usize,
    /// Server-level cap on in-flight requests
    pub http_concurrency_limit: usize,
}

/// Conversion worker configuration
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub base: BaseConfig,
    pub concurrency: usize,
    pub ffmpeg_path: String,
    pub conversion_timeout: Duration,
}

fn parse_or<T: FromStr>(
    lookup: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, anyhow::Error> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", key, raw)),
        _ => Ok(default),
    }
}

fn non_empty(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl BaseConfig {
    pub fn from_vars(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let environment = non_empty(lookup, "ENVIRONMENT")
            .or_else(|| non_empty(lookup, "APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let log_format = match non_empty(lookup, "LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        let aws_region = non_empty(lookup, "AWS_REGION");

        let storage = StorageConfig {
            backend: match non_empty(lookup, "STORAGE_BACKEND") {
                Some(raw) => raw.parse()?,
                None => StorageBackend::Local,
            },
            local_storage_path: non_empty(lookup, "LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| DEFAULT_LOCAL_STORAGE_PATH.to_string()),
            s3_bucket: non_empty(lookup, "S3_BUCKET"),
            s3_region: non_empty(lookup, "S3_REGION").or_else(|| aws_region.clone()),
            s3_endpoint: non_empty(lookup, "S3_ENDPOINT"),
            source_prefix: non_empty(lookup, "SOURCE_PREFIX")
                .unwrap_or_else(|| DEFAULT_SOURCE_PREFIX.to_string()),
            result_prefix: non_empty(lookup, "RESULT_PREFIX")
                .unwrap_or_else(|| DEFAULT_RESULT_PREFIX.to_string()),
            timeout: Duration::from_secs(parse_or(
                lookup,
                "STORAGE_TIMEOUT_SECS",
                STORAGE_TIMEOUT_SECS,
            )?),
        };

        let queue = QueueConfig {
            backend: match non_empty(lookup, "QUEUE_BACKEND") {
                Some(raw) => raw.parse()?,
                None => QueueBackend::Sqs,
            },
            sqs_endpoint: non_empty(lookup, "SQS_ENDPOINT"),
            sqs_region: non_empty(lookup, "SQS_REGION").or(aws_region),
            upload_topic: non_empty(lookup, "UPLOAD_TOPIC")
                .unwrap_or_else(|| DEFAULT_UPLOAD_TOPIC.to_string()),
            result_topic: non_empty(lookup, "RESULT_TOPIC")
                .unwrap_or_else(|| DEFAULT_RESULT_TOPIC.to_string()),
            timeout: Duration::from_secs(parse_or(
                lookup,
                "QUEUE_TIMEOUT_SECS",
                QUEUE_TIMEOUT_SECS,
            )?),
            wait_time: Duration::from_secs(parse_or(lookup, "QUEUE_WAIT_SECS", QUEUE_WAIT_SECS)?),
            visibility_timeout: Duration::from_secs(parse_or(
                lookup,
                "QUEUE_VISIBILITY_TIMEOUT_SECS",
                QUEUE_VISIBILITY_TIMEOUT_SECS,
            )?),
        };

        Ok(Self {
            environment,
            log_format,
            storage,
            queue,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage.backend {
            StorageBackend::S3 => {
                if self.storage.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when STORAGE_BACKEND=s3"
                    ));
                }
                if self.storage.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when STORAGE_BACKEND=s3"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.storage.local_storage_path.is_empty() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when STORAGE_BACKEND=local"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        if self.queue.backend == QueueBackend::Sqs && self.queue.sqs_region.is_none() {
            return Err(anyhow::anyhow!(
                "SQS_REGION or AWS_REGION must be set when QUEUE_BACKEND=sqs"
            ));
        }

        if self.queue.upload_topic == self.queue.result_topic {
            return Err(anyhow::anyhow!(
                "UPLOAD_TOPIC and RESULT_TOPIC must differ (both are '{}')",
                self.queue.upload_topic
            ));
        }

        if self.storage.source_prefix == self.storage.result_prefix {
            return Err(anyhow::anyhow!(
                "SOURCE_PREFIX and RESULT_PREFIX must differ (both are '{}')",
                self.storage.source_prefix
            ));
        }

        if self.storage.timeout.is_zero() {
            return Err(anyhow::anyhow!("STORAGE_TIMEOUT_SECS must be greater than 0"));
        }
        if self.queue.timeout.is_zero() {
            return Err(anyhow::anyhow!("QUEUE_TIMEOUT_SECS must be greater than 0"));
        }
        // SQS caps long polling at 20 seconds
        if self.queue.wait_time > Duration::from_secs(20) {
            return Err(anyhow::anyhow!("QUEUE_WAIT_SECS must be at most 20"));
        }

        Ok(())
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(&|key| env::var(key).ok())
    }

    pub fn from_vars(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let base = BaseConfig::from_vars(lookup)?;

        let auth_svc_url = non_empty(lookup, "AUTH_SVC_URL")
            .ok_or_else(|| anyhow::anyhow!("AUTH_SVC_URL must be set for authentication"))?;

        let max_upload_size_mb = parse_or(lookup, "MAX_UPLOAD_SIZE_MB", MAX_UPLOAD_SIZE_MB)?;

        Ok(Self {
            base,
            server_port: parse_or(lookup, "PORT", GATEWAY_PORT)?,
            auth_svc_url: auth_svc_url.trim_end_matches('/').to_string(),
            verifier_timeout: Duration::from_secs(parse_or(
                lookup,
                "VERIFIER_TIMEOUT_SECS",
                VERIFIER_TIMEOUT_SECS,
            )?),
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            http_concurrency_limit: parse_or(
                lookup,
                "HTTP_CONCURRENCY_LIMIT",
                HTTP_CONCURRENCY_LIMIT,
            )?
            .max(1),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.base.validate()?;

        if !self.auth_svc_url.starts_with("http://") && !self.auth_svc_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "AUTH_SVC_URL must be an http(s) URL, got '{}'",
                self.auth_svc_url
            ));
        }
        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }
        if self.verifier_timeout.is_zero() {
            return Err(anyhow::anyhow!("VERIFIER_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.base.is_production()
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(&|key| env::var(key).ok())
    }

    pub fn from_vars(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        Ok(Self {
            base: BaseConfig::from_vars(lookup)?,
            concurrency: parse_or(lookup, "WORKER_CONCURRENCY", WORKER_CONCURRENCY)?,
            ffmpeg_path: non_empty(lookup, "FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            conversion_timeout: Duration::from_secs(parse_or(
                lookup,
                "CONVERSION_TIMEOUT_SECS",
                CONVERSION_TIMEOUT_SECS,
            )?),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.base.validate()?;

        if self.concurrency == 0 {
            return Err(anyhow::anyhow!("WORKER_CONCURRENCY must be greater than 0"));
        }
        if self.conversion_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "CONVERSION_TIMEOUT_SECS must be greater than 0"
            ));
        }
        if self.base.queue.visibility_timeout < self.conversion_timeout {
            tracing::warn!(
                visibility_timeout_secs = self.base.queue.visibility_timeout.as_secs(),
                conversion_timeout_secs = self.conversion_timeout.as_secs(),
                "Queue visibility timeout is shorter than the conversion timeout; slow tasks may be redelivered while still running"
            );
        }

        Ok(())
    }
}
