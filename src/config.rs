//! Benchmark configuration.
//!
//! The configuration file doubles as the credential file: it names the
//! kind of object store to use and, for a Swift store, how to log in.

use crate::backoff::Backoff;
use crate::identity::Credentials;

use log::trace;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identity service used when the configuration doesn't name one.
pub const DEFAULT_AUTH_URL: &str = "https://identity.api.rackspacecloud.com/v2.0";

/// Region used when neither the command line nor the configuration names one.
pub const DEFAULT_REGION: &str = "ORD";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_FETCH_RETRIES: u32 = 5;
const DEFAULT_POLL_INITIAL_MS: u64 = 100;
const DEFAULT_POLL_MAX_DELAY_MS: u64 = 5000;
const DEFAULT_POLL_MAX_WAIT_SECS: u64 = 120;

/// Kind of object store to benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// An OpenStack Swift / Rackspace Cloud Files service.
    Swift,
    /// A directory on the local file system.
    Local,
    /// Memory of the benchmark process.
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
struct TentativeBenchConfig {
    backend: Option<Backend>,
    auth_url: Option<String>,
    username: Option<String>,
    api_key: Option<String>,
    password: Option<String>,
    tenant_name: Option<String>,
    region: Option<String>,
    internal_url: Option<bool>,
    verify_tls_cert: Option<bool>,
    timeout_secs: Option<u64>,
    local_root: Option<PathBuf>,
    fetch_retries: Option<u32>,
    poll_initial_ms: Option<u64>,
    poll_max_delay_ms: Option<u64>,
    poll_max_wait_secs: Option<u64>,
}

/// Configuration for a benchmark run.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Name of configuration file.
    pub filename: PathBuf,
    /// Kind of object store.
    pub backend: Backend,
    /// URL of the identity service.
    pub auth_url: String,
    /// How to log in to the identity service.
    pub credentials: Option<Credentials>,
    /// Region whose object store endpoint is used.
    pub region: String,
    /// Use the internal (service network) endpoint instead of the public one?
    pub internal_url: bool,
    /// Should the server's TLS certificate be verified using CA
    /// signatures? Set to false for self-signed certificates.
    pub verify_tls_cert: bool,
    /// Timeout for each HTTP request.
    pub timeout: Duration,
    /// Root directory of a local store.
    pub local_root: PathBuf,
    /// How many times a failed fetch is retried.
    pub fetch_retries: u32,
    /// How to wait for deleted objects to disappear from listings.
    pub poll: Backoff,
}

impl BenchConfig {
    /// Read a configuration from a file.
    pub fn read(filename: &Path) -> Result<Self, ConfigError> {
        trace!("read_config: filename={:?}", filename);
        let config = std::fs::read_to_string(filename)
            .map_err(|err| ConfigError::Read(filename.to_path_buf(), err))?;
        Self::parse(filename, &config)
    }

    fn parse(filename: &Path, yaml: &str) -> Result<Self, ConfigError> {
        let tentative: TentativeBenchConfig = serde_yaml::from_str(yaml)
            .map_err(|err| ConfigError::YamlParse(filename.to_path_buf(), err))?;

        let credentials = match (tentative.username, tentative.api_key, tentative.password) {
            (None, None, None) => None,
            (Some(username), Some(api_key), None) => Some(Credentials::ApiKey { username, api_key }),
            (Some(username), None, Some(password)) => Some(Credentials::Password {
                username,
                password,
                tenant_name: tentative.tenant_name,
            }),
            (Some(_), Some(_), Some(_)) => return Err(ConfigError::ConflictingCredentials),
            _ => return Err(ConfigError::IncompleteCredentials),
        };

        let poll = Backoff::new(
            Duration::from_millis(tentative.poll_initial_ms.unwrap_or(DEFAULT_POLL_INITIAL_MS)),
            Duration::from_millis(
                tentative
                    .poll_max_delay_ms
                    .unwrap_or(DEFAULT_POLL_MAX_DELAY_MS),
            ),
            Duration::from_secs(
                tentative
                    .poll_max_wait_secs
                    .unwrap_or(DEFAULT_POLL_MAX_WAIT_SECS),
            ),
        );

        let config = Self {
            filename: filename.to_path_buf(),
            backend: tentative.backend.unwrap_or(Backend::Swift),
            auth_url: tentative
                .auth_url
                .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            credentials,
            region: tentative
                .region
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            internal_url: tentative.internal_url.unwrap_or(false),
            verify_tls_cert: tentative.verify_tls_cert.unwrap_or(true),
            timeout: Duration::from_secs(tentative.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            local_root: tentative
                .local_root
                .map(|path| expand_tilde(&path))
                .unwrap_or_default(),
            fetch_retries: tentative.fetch_retries.unwrap_or(DEFAULT_FETCH_RETRIES),
            poll,
        };

        config.check()?;
        Ok(config)
    }

    /// Use a region given on the command line instead of the configured one.
    pub fn with_region(mut self, region: Option<String>) -> Result<Self, ConfigError> {
        if let Some(region) = region {
            self.region = region;
        }
        self.check()?;
        Ok(self)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.region.is_empty() || !self.region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::BadRegion(self.region.clone()));
        }
        if self.poll.max_wait().is_zero() {
            return Err(ConfigError::NoPollWait);
        }
        if self.poll.initial().is_zero() {
            return Err(ConfigError::NoPollDelay);
        }
        match self.backend {
            Backend::Swift => {
                if self.credentials.is_none() {
                    return Err(ConfigError::NoCredentials);
                }
                if !self.auth_url.starts_with("https://") && !self.auth_url.starts_with("http://")
                {
                    return Err(ConfigError::BadAuthUrl(self.auth_url.clone()));
                }
            }
            Backend::Local => {
                if self.local_root.as_os_str().is_empty() {
                    return Err(ConfigError::NoLocalRoot);
                }
            }
            Backend::Memory => (),
        }
        Ok(())
    }
}

/// Possible errors from configuration files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Swift store needs credentials.
    #[error("No credentials in config: username and api_key or password are needed")]
    NoCredentials,

    /// Only one of `api_key` and `password` can be used.
    #[error("Config has both api_key and password; use only one")]
    ConflictingCredentials,

    /// A username without a secret, or a secret without a username.
    #[error("Config credentials are incomplete: username and api_key or password are needed")]
    IncompleteCredentials,

    /// Local store needs a root directory.
    #[error("local_root is not set, but the local backend needs it")]
    NoLocalRoot,

    /// The identity service URL is not an HTTP one.
    #[error("auth_url doesn't use http or https: {0}")]
    BadAuthUrl(String),

    /// The region is not a plain region name.
    #[error("region must be a non-empty alphanumeric name, such as ORD: {0:?}")]
    BadRegion(String),

    /// Waiting for deletions must be allowed to take some time.
    #[error("poll_max_wait_secs must be more than zero")]
    NoPollWait,

    /// Waiting for deletions needs a delay to start from.
    #[error("poll_initial_ms must be more than zero")]
    NoPollDelay,

    /// Error reading a configuation file.
    #[error("failed to read configuration file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    /// Error parsing configuration file as YAML.
    #[error("failed to parse configuration file {0} as YAML: {1}")]
    YamlParse(PathBuf, serde_yaml::Error),
}

fn expand_tilde(path: &Path) -> PathBuf {
    if path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            for comp in path.components().skip(1) {
                expanded.push(comp);
            }
            expanded
        } else {
            path.to_path_buf()
        }
    } else {
        path.to_path_buf()
    }
}
