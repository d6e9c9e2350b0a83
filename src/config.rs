//! Mule configuration
//!
//! Everything the mule needs to know about the outside world: endpoint
//! identifiers, remote and local paths, timing knobs and API locations.
//! Values come from `MULE_*` environment variables, falling back to the
//! values the deployed mule has always used.

use crate::error::MuleError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Native-app client registered with Globus Auth for this mule
pub const DEFAULT_CLIENT_ID: &str = "231634e4-37cc-4a06-96ce-12a262a62da7";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Transfer and Auth API settings
    pub service: ServiceConfig,
    /// Storage endpoint identifiers
    pub endpoints: EndpointConfig,
    /// Remote and local paths
    pub paths: PathConfig,
    /// Deadlines, poll timeouts and sleeps
    pub timing: TimingConfig,
    /// How many recent tasks to summarize into the status file
    pub status_task_count: usize,
}

/// Transfer and Auth API settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Transfer API base URL (without trailing slash)
    pub transfer_base_url: String,
    /// Auth API base URL (without trailing slash)
    pub auth_base_url: String,
    /// OAuth client id of the native app
    pub client_id: String,
    /// Redirect URI that displays the auth code to the operator
    pub redirect_uri: String,
    /// Space separated scopes requested during login
    pub scopes: String,
    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,
}

/// Storage endpoint identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Cluster the test data originates from (site A)
    pub cluster_a: String,
    /// Second cluster, also hosts the trigger and monitoring files (site B)
    pub cluster_b: String,
    /// Nearline archive
    pub archive: String,
    /// Endpoint on the machine running the mule
    pub local: String,
    /// Registered but unused by the current workflow
    pub spare: String,
}

/// Remote and local paths
#[derive(Debug, Clone)]
pub struct PathConfig {
    /// Test scratch space, identical on cluster A, cluster B and the archive
    pub scratch: String,
    /// Directory on cluster B holding the trigger file and monitoring uploads
    pub monitor_dir: String,
    /// Directory of the working directory as seen through the local endpoint
    pub local_endpoint_dir: String,
    /// The same working directory on the local filesystem
    pub local_dir: PathBuf,
    /// Name of the trigger file
    pub trigger_name: String,
    /// Name of the status file
    pub status_name: String,
    /// Name of the error log
    pub error_name: String,
    /// Credential file
    pub token_file: PathBuf,
}

/// Deadlines, poll timeouts and sleeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    /// Minutes after submission the service cancels a task
    pub task_deadline_minutes: u64,
    /// Length of a single task wait round
    pub poll_timeout_secs: u64,
    /// Interval between status checks inside a wait round
    pub poll_interval_secs: u64,
    /// Sleep after a completed workflow run
    pub cooldown_secs: u64,
    /// Sleep when no trigger file was found
    pub idle_sleep_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            transfer_base_url: "https://transfer.api.globusonline.org/v0.10".to_string(),
            auth_base_url: "https://auth.globus.org".to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_uri: "https://auth.globus.org/v2/web/auth-code".to_string(),
            scopes: "openid email profile urn:globus:auth:scope:transfer.api.globus.org:all"
                .to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            cluster_a: "d0ccdc02-6d04-11e5-ba46-22000b92c6ec".to_string(),
            cluster_b: "d59900ef-6d04-11e5-ba46-22000b92c6ec".to_string(),
            archive: "d599008e-6d04-11e5-ba46-22000b92c6ec".to_string(),
            local: "ce71c6f2-6d04-11e5-ba46-22000b92c6ec".to_string(),
            spare: "7169968a-3288-11e8-b90d-0ac6873fc732".to_string(),
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            scratch: "/~/scratch/jenkins-mule".to_string(),
            monitor_dir: "/~/jenkins-mule".to_string(),
            local_endpoint_dir: "/~/globus-cli/jenkins-globus-online-workflow".to_string(),
            local_dir: PathBuf::from("."),
            trigger_name: "jenkins_test_request".to_string(),
            status_name: "status_file".to_string(),
            error_name: "error_file".to_string(),
            token_file: PathBuf::from("refresh-tokens.json"),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            task_deadline_minutes: 5,
            poll_timeout_secs: 60,
            poll_interval_secs: 10,
            cooldown_secs: 30,
            idle_sleep_secs: 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            endpoints: EndpointConfig::default(),
            paths: PathConfig::default(),
            timing: TimingConfig::default(),
            status_task_count: 6,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    ///
    /// The local endpoint id is additionally read from the file named by
    /// `MULE_LOCAL_ENDPOINT_FILE` (default `uuid.txt`) when it exists;
    /// `MULE_EP_LOCAL` still wins over the file.
    pub fn from_env() -> Result<Self, MuleError> {
        let defaults = Config::default();

        let mut local = defaults.endpoints.local.clone();
        let uuid_file =
            env::var("MULE_LOCAL_ENDPOINT_FILE").unwrap_or_else(|_| "uuid.txt".to_string());
        if let Ok(contents) = std::fs::read_to_string(&uuid_file) {
            let id = contents.trim();
            if !id.is_empty() {
                local = id.to_string();
            }
        }

        let config = Self {
            service: ServiceConfig {
                transfer_base_url: string_var(
                    "MULE_TRANSFER_BASE_URL",
                    defaults.service.transfer_base_url,
                ),
                auth_base_url: string_var("MULE_AUTH_BASE_URL", defaults.service.auth_base_url),
                client_id: string_var("MULE_CLIENT_ID", defaults.service.client_id),
                redirect_uri: string_var("MULE_REDIRECT_URI", defaults.service.redirect_uri),
                scopes: string_var("MULE_SCOPES", defaults.service.scopes),
                request_timeout_secs: parsed_var(
                    "MULE_REQUEST_TIMEOUT_SECS",
                    defaults.service.request_timeout_secs,
                ),
            },
            endpoints: EndpointConfig {
                cluster_a: string_var("MULE_EP_CLUSTER_A", defaults.endpoints.cluster_a),
                cluster_b: string_var("MULE_EP_CLUSTER_B", defaults.endpoints.cluster_b),
                archive: string_var("MULE_EP_ARCHIVE", defaults.endpoints.archive),
                local: string_var("MULE_EP_LOCAL", local),
                spare: string_var("MULE_EP_SPARE", defaults.endpoints.spare),
            },
            paths: PathConfig {
                scratch: string_var("MULE_SCRATCH_PATH", defaults.paths.scratch),
                monitor_dir: string_var("MULE_MONITOR_DIR", defaults.paths.monitor_dir),
                local_endpoint_dir: string_var(
                    "MULE_LOCAL_ENDPOINT_DIR",
                    defaults.paths.local_endpoint_dir,
                ),
                local_dir: env::var_os("MULE_LOCAL_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.paths.local_dir),
                trigger_name: string_var("MULE_TRIGGER_NAME", defaults.paths.trigger_name),
                status_name: string_var("MULE_STATUS_NAME", defaults.paths.status_name),
                error_name: string_var("MULE_ERROR_NAME", defaults.paths.error_name),
                token_file: env::var_os("MULE_TOKEN_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.paths.token_file),
            },
            timing: TimingConfig {
                task_deadline_minutes: parsed_var(
                    "MULE_TASK_DEADLINE_MINUTES",
                    defaults.timing.task_deadline_minutes,
                ),
                poll_timeout_secs: parsed_var(
                    "MULE_POLL_TIMEOUT_SECS",
                    defaults.timing.poll_timeout_secs,
                ),
                poll_interval_secs: parsed_var(
                    "MULE_POLL_INTERVAL_SECS",
                    defaults.timing.poll_interval_secs,
                ),
                cooldown_secs: parsed_var("MULE_COOLDOWN_SECS", defaults.timing.cooldown_secs),
                idle_sleep_secs: parsed_var(
                    "MULE_IDLE_SLEEP_SECS",
                    defaults.timing.idle_sleep_secs,
                ),
            },
            status_task_count: parsed_var("MULE_STATUS_TASK_COUNT", defaults.status_task_count),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the mule cannot run with
    pub fn validate(&self) -> Result<(), MuleError> {
        let endpoints = [
            ("cluster_a", &self.endpoints.cluster_a),
            ("cluster_b", &self.endpoints.cluster_b),
            ("archive", &self.endpoints.archive),
            ("local", &self.endpoints.local),
        ];
        for (name, id) in endpoints {
            if id.trim().is_empty() {
                return Err(MuleError::Config(format!(
                    "endpoint id for {} cannot be empty",
                    name
                )));
            }
        }

        if self.paths.scratch.is_empty() {
            return Err(MuleError::Config("scratch path cannot be empty".to_string()));
        }
        if self.timing.task_deadline_minutes == 0 {
            return Err(MuleError::Config(
                "task_deadline_minutes must be > 0".to_string(),
            ));
        }
        if self.timing.poll_timeout_secs == 0 {
            return Err(MuleError::Config("poll_timeout_secs must be > 0".to_string()));
        }
        if self.timing.poll_interval_secs == 0 {
            return Err(MuleError::Config(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }
        if self.service.request_timeout_secs == 0 {
            return Err(MuleError::Config(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.status_task_count == 0 {
            return Err(MuleError::Config("status_task_count must be > 0".to_string()));
        }
        Ok(())
    }
}

impl ServiceConfig {
    /// HTTP client shared by the Auth and Transfer clients
    ///
    /// Every request is bounded by `request_timeout_secs` so a stalled
    /// connection cannot hold up the poll loop.
    pub fn http_client(&self) -> Result<reqwest::Client, MuleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()?;
        Ok(client)
    }
}

impl PathConfig {
    fn remote(dir: &str, name: &str) -> String {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }

    /// Trigger file on cluster B
    pub fn remote_trigger(&self) -> String {
        Self::remote(&self.monitor_dir, &self.trigger_name)
    }

    /// Trigger file as seen through the local endpoint
    pub fn local_endpoint_trigger(&self) -> String {
        Self::remote(&self.local_endpoint_dir, &self.trigger_name)
    }

    /// Trigger file on the local filesystem
    pub fn local_trigger(&self) -> PathBuf {
        self.local_dir.join(&self.trigger_name)
    }

    /// Status file on the local filesystem
    pub fn status_file(&self) -> PathBuf {
        self.local_dir.join(&self.status_name)
    }

    /// Error log on the local filesystem
    pub fn error_file(&self) -> PathBuf {
        self.local_dir.join(&self.error_name)
    }

    /// Status file as seen through the local endpoint
    pub fn local_endpoint_status(&self) -> String {
        Self::remote(&self.local_endpoint_dir, &self.status_name)
    }

    /// Error log as seen through the local endpoint
    pub fn local_endpoint_error(&self) -> String {
        Self::remote(&self.local_endpoint_dir, &self.error_name)
    }

    /// Upload destination of the status file on cluster B
    pub fn monitor_status(&self) -> String {
        Self::remote(&self.monitor_dir, &self.status_name)
    }

    /// Upload destination of the error log on cluster B
    pub fn monitor_error(&self) -> String {
        Self::remote(&self.monitor_dir, &self.error_name)
    }
}

impl TimingConfig {
    /// Offset between submission and the deadline sent to the service
    pub fn task_deadline(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.task_deadline_minutes as i64)
    }

    /// Length of a single wait round
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// Interval between status checks inside a wait round
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Upper bound on waiting for one task
    ///
    /// The service cancels a task at its deadline, so anything still
    /// running two wait rounds past it is treated as lost.
    pub fn max_task_wait(&self) -> Duration {
        Duration::from_secs(self.task_deadline_minutes * 60 + 2 * self.poll_timeout_secs)
    }

    /// Sleep after a completed workflow run
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Sleep when no trigger file was found
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_secs(self.idle_sleep_secs)
    }
}

fn string_var(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn parsed_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timing.task_deadline_minutes, 5);
        assert_eq!(config.timing.poll_timeout_secs, 60);
        assert_eq!(config.status_task_count, 6);
    }

    #[test]
    fn test_derived_paths() {
        let paths = PathConfig {
            local_dir: PathBuf::from("/tmp/mule"),
            monitor_dir: "/~/jenkins-mule/".to_string(),
            ..PathConfig::default()
        };
        assert_eq!(paths.remote_trigger(), "/~/jenkins-mule/jenkins_test_request");
        assert_eq!(
            paths.local_endpoint_trigger(),
            "/~/globus-cli/jenkins-globus-online-workflow/jenkins_test_request"
        );
        assert_eq!(
            paths.local_trigger(),
            PathBuf::from("/tmp/mule/jenkins_test_request")
        );
        assert_eq!(paths.monitor_status(), "/~/jenkins-mule/status_file");
        assert_eq!(paths.monitor_error(), "/~/jenkins-mule/error_file");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.endpoints.archive = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timing.task_deadline_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timing.poll_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timing.poll_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(MuleError::Config(ref msg)) if msg.contains("poll_interval_secs")
        ));

        let mut config = Config::default();
        config.service.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.status_task_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_task_wait_covers_deadline() {
        let timing = TimingConfig::default();
        assert_eq!(timing.max_task_wait(), Duration::from_secs(5 * 60 + 120));
        assert_eq!(timing.task_deadline(), chrono::Duration::minutes(5));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let uuid_path = dir.path().join("uuid.txt");
        std::fs::write(&uuid_path, "local-endpoint-from-file\n").unwrap();

        env::set_var("MULE_LOCAL_ENDPOINT_FILE", &uuid_path);
        env::set_var("MULE_TASK_DEADLINE_MINUTES", "7");
        env::set_var("MULE_SCRATCH_PATH", "/~/scratch/other");
        env::set_var("MULE_COOLDOWN_SECS", "not-a-number");

        let config = Config::from_env().unwrap();

        env::remove_var("MULE_LOCAL_ENDPOINT_FILE");
        env::remove_var("MULE_TASK_DEADLINE_MINUTES");
        env::remove_var("MULE_SCRATCH_PATH");
        env::remove_var("MULE_COOLDOWN_SECS");

        assert_eq!(config.endpoints.local, "local-endpoint-from-file");
        assert_eq!(config.timing.task_deadline_minutes, 7);
        assert_eq!(config.paths.scratch, "/~/scratch/other");
        assert_eq!(config.timing.cooldown_secs, 30);
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_zero_poll_interval() {
        env::set_var("MULE_POLL_INTERVAL_SECS", "0");
        let result = Config::from_env();
        env::remove_var("MULE_POLL_INTERVAL_SECS");

        assert!(matches!(result, Err(MuleError::Config(_))));
    }
}
