//! Ingestion configuration
//!
//! Loaded from environment variables (a `.env` file is honored). Every
//! tunable that the pipeline used to hard-code lives here with a `DEFAULT_*`
//! constant.

use crate::retry::RetryPolicy;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_AUTH_SCHEME: &str = "JWT";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
pub const DEFAULT_CELLBASE_VERSION: &str = "v4";
pub const DEFAULT_CELLBASE_SPECIES: &str = "hsapiens";
pub const DEFAULT_ANNOTATION_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_PANELAPP_URL: &str = "https://panelapp.genomicsengland.co.uk/WebServices";
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TIER_THRESHOLD: u8 = 3;
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_EXOMISER_SCORE: f64 = 0.95;

const USER_AGENT: &str = concat!("mdt-ingest/", env!("CARGO_PKG_VERSION"));

/// Remote case source (CIP API)
#[derive(Clone)]
pub struct CipConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Scheme placed before the token in the `Authorization` header
    pub auth_scheme: String,
    pub token_ttl_secs: u64,
}

impl fmt::Debug for CipConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("auth_scheme", &self.auth_scheme)
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

impl Default for CipConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

/// Variant annotation service (CellBase)
#[derive(Debug, Clone)]
pub struct CellBaseConfig {
    pub base_url: String,
    pub version: String,
    pub species: String,
    /// Maximum variant keys per request
    pub chunk_size: usize,
}

impl Default for CellBaseConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            version: DEFAULT_CELLBASE_VERSION.to_string(),
            species: DEFAULT_CELLBASE_SPECIES.to_string(),
            chunk_size: DEFAULT_ANNOTATION_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PanelAppConfig {
    pub base_url: String,
}

impl Default for PanelAppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PANELAPP_URL.to_string(),
        }
    }
}

/// Participant demographics service (LabKey)
#[derive(Debug, Clone, Default)]
pub struct LabKeyConfig {
    pub base_url: String,
    /// Container paths, tried in order until a row is found
    pub containers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

impl HttpConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Shared HTTP client for every external service
    pub fn client(&self) -> crate::Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.timeout())
            .user_agent(USER_AGENT)
            .build()?)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tiered variants with minimum tier at or above this are dropped unless
    /// tier 3 is pulled
    pub tier_threshold: u8,
    /// Cases per annotation batch
    pub batch_size: usize,
    /// Raw JSON of committed cases is written here when set
    pub archive_dir: Option<PathBuf>,
    /// Exomiser variants are flagged only with an event scoring at least this
    pub exomiser_score: f64,
    /// Site codes whose cases are never ingested
    pub excluded_sites: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tier_threshold: DEFAULT_TIER_THRESHOLD,
            batch_size: DEFAULT_BATCH_SIZE,
            archive_dir: None,
            exomiser_score: DEFAULT_EXOMISER_SCORE,
            excluded_sites: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestConfig {
    pub cip: CipConfig,
    pub cellbase: CellBaseConfig,
    pub panelapp: PanelAppConfig,
    pub labkey: Option<LabKeyConfig>,
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub pipeline: PipelineConfig,
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    env_var(key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

impl IngestConfig {
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::default()
    }

    /// Load configuration from the environment
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let labkey = env_var("LABKEY_URL").map(|base_url| LabKeyConfig {
            base_url,
            containers: env_list("LABKEY_CONTAINERS"),
        });

        let config = Self {
            cip: CipConfig {
                base_url: env_var("CIP_API_URL").unwrap_or_default(),
                username: env_var("CIP_API_USERNAME").unwrap_or_default(),
                password: env_var("CIP_API_PASSWORD").unwrap_or_default(),
                auth_scheme: env_var("CIP_API_AUTH_SCHEME")
                    .unwrap_or_else(|| DEFAULT_AUTH_SCHEME.to_string()),
                token_ttl_secs: env_parse("CIP_API_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS),
            },
            cellbase: CellBaseConfig {
                base_url: env_var("CELLBASE_URL").unwrap_or_default(),
                version: env_var("CELLBASE_VERSION")
                    .unwrap_or_else(|| DEFAULT_CELLBASE_VERSION.to_string()),
                species: env_var("CELLBASE_SPECIES")
                    .unwrap_or_else(|| DEFAULT_CELLBASE_SPECIES.to_string()),
                chunk_size: env_parse("CELLBASE_CHUNK_SIZE", DEFAULT_ANNOTATION_CHUNK_SIZE),
            },
            panelapp: PanelAppConfig {
                base_url: env_var("PANELAPP_URL").unwrap_or_else(|| DEFAULT_PANELAPP_URL.to_string()),
            },
            labkey,
            database: DatabaseConfig {
                url: env_var("DATABASE_URL"),
                max_connections: env_parse(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
            },
            http: HttpConfig {
                timeout_secs: env_parse("INGEST_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
                max_retries: env_parse("INGEST_MAX_RETRIES", DEFAULT_MAX_RETRIES),
                retry_base_delay_ms: env_parse(
                    "INGEST_RETRY_BASE_DELAY_MS",
                    DEFAULT_RETRY_BASE_DELAY_MS,
                ),
            },
            pipeline: PipelineConfig {
                tier_threshold: env_parse("INGEST_TIER_THRESHOLD", DEFAULT_TIER_THRESHOLD),
                batch_size: env_parse("INGEST_BATCH_SIZE", DEFAULT_BATCH_SIZE),
                archive_dir: env_var("INGEST_ARCHIVE_DIR").map(PathBuf::from),
                exomiser_score: env_parse("INGEST_EXOMISER_SCORE", DEFAULT_EXOMISER_SCORE),
                excluded_sites: env_list("INGEST_EXCLUDED_SITES"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cellbase.base_url.is_empty() {
            anyhow::bail!("CELLBASE_URL must be set");
        }
        if self.cellbase.chunk_size == 0 {
            anyhow::bail!("CELLBASE_CHUNK_SIZE must be greater than 0");
        }
        if self.panelapp.base_url.is_empty() {
            anyhow::bail!("PANELAPP_URL cannot be empty");
        }
        if self.http.max_retries == 0 {
            anyhow::bail!("INGEST_MAX_RETRIES must be greater than 0");
        }
        if self.http.timeout_secs == 0 {
            anyhow::bail!("INGEST_HTTP_TIMEOUT_SECS must be greater than 0");
        }
        if self.pipeline.batch_size == 0 {
            anyhow::bail!("INGEST_BATCH_SIZE must be greater than 0");
        }
        if !(1..=4).contains(&self.pipeline.tier_threshold) {
            anyhow::bail!(
                "INGEST_TIER_THRESHOLD must be between 1 and 4, got {}",
                self.pipeline.tier_threshold
            );
        }
        if let Some(labkey) = &self.labkey {
            if labkey.containers.is_empty() {
                anyhow::bail!("LABKEY_CONTAINERS must list at least one container when LABKEY_URL is set");
            }
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
        }
        Ok(())
    }

    /// Checks only needed when cases are polled from the remote source
    pub fn validate_remote_source(&self) -> anyhow::Result<()> {
        if self.cip.base_url.is_empty() {
            anyhow::bail!("CIP_API_URL must be set");
        }
        if self.cip.username.is_empty() || self.cip.password.is_empty() {
            anyhow::bail!("CIP_API_USERNAME and CIP_API_PASSWORD must be set");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn cip(
        mut self,
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.cip.base_url = base_url.into();
        self.config.cip.username = username.into();
        self.config.cip.password = password.into();
        self
    }

    pub fn cellbase_url(mut self, url: impl Into<String>) -> Self {
        self.config.cellbase.base_url = url.into();
        self
    }

    pub fn panelapp_url(mut self, url: impl Into<String>) -> Self {
        self.config.panelapp.base_url = url.into();
        self
    }

    pub fn labkey(mut self, url: impl Into<String>, containers: Vec<String>) -> Self {
        self.config.labkey = Some(LabKeyConfig {
            base_url: url.into(),
            containers,
        });
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database.url = Some(url.into());
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.http.max_retries = retries;
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.http.retry_base_delay_ms = ms;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.http.timeout_secs = secs;
        self
    }

    pub fn tier_threshold(mut self, tier: u8) -> Self {
        self.config.pipeline.tier_threshold = tier;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.pipeline.batch_size = size;
        self
    }

    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pipeline.archive_dir = Some(dir.into());
        self
    }

    pub fn excluded_sites(mut self, sites: Vec<String>) -> Self {
        self.config.pipeline.excluded_sites = sites;
        self
    }

    pub fn build(self) -> IngestConfig {
        self.config
    }
}
