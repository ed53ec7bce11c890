use reqwest::blocking::Client;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;
use crate::config::Config;

const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("stager/", env!("CARGO_PKG_VERSION"));
/// Longest response body quoted in a rejection error
const MAX_ERROR_BODY: usize = 512;

/// Errors raised by backend writes. Never retried by the caller in this crate.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Backend could not be reached or did not answer in time
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Backend answered with a non-success status
    #[error("Backend rejected staging workflow of '{project}': HTTP {status} {message}")]
    Rejected {
        project: String,
        status: u16,
        message: String,
    },
}

/// Destination for rendered staging workflows
pub trait StagingBackend {
    /// Store the rendered workflow of `project_name` on behalf of `login`
    ///
    /// `timeout` overrides the client's request timeout for this call.
    fn write_staging_workflow(
        &self,
        project_name: &str,
        login: &str,
        rendered: &str,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError>;
}

/// HTTP implementation talking to the source backend
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Create a client with connect and request timeouts
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| BackendError::Unavailable(format!("Invalid backend URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Unavailable(format!(
                "Invalid backend URL '{}': not a base URL",
                base_url
            )));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BackendError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(&config.backend_url, config.backend_timeout)
    }

    /// URL of the staging workflow resource of a project
    ///
    /// The project name is a single path segment and is percent-encoded.
    pub fn workflow_url(&self, project_name: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("source")
                .push(project_name)
                .push("_staging_workflow");
        }
        url
    }
}

impl StagingBackend for HttpBackend {
    fn write_staging_workflow(
        &self,
        project_name: &str,
        login: &str,
        rendered: &str,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        let url = self.workflow_url(project_name);
        log::debug!("PUT {} as {}", url, login);

        let mut request = self
            .client
            .put(url.clone())
            .query(&[("user", login)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(rendered.to_string());
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                BackendError::Unavailable(format!("Timed out writing to {}", url))
            } else {
                BackendError::Unavailable(format!("Failed to reach {}: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            let message = if message.trim().is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                message.trim().to_string()
            };
            return Err(BackendError::Rejected {
                project: project_name.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        log::info!("Wrote staging workflow of '{}' to backend", project_name);
        Ok(())
    }
}
