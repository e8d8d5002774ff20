//! Configuration for the upload workflow.
//!
//! Every timing constant and endpoint detail lives in [`WorkflowConfig`],
//! built via its [`WorkflowConfigBuilder`]. Hosts set only what they care
//! about and rely on the documented defaults for the rest.

use crate::error::MdropError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the upload workflow controller.
///
/// Built via [`WorkflowConfig::builder()`] or using
/// [`WorkflowConfig::default()`].
///
/// # Example
/// ```rust
/// use mdrop::WorkflowConfig;
///
/// let config = WorkflowConfig::builder()
///     .endpoint("http://localhost:5000/convert")
///     .tick_interval_ms(100)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Conversion endpoint receiving the multipart POST.
    /// Default: `http://127.0.0.1:5000/convert`.
    pub endpoint: String,

    /// Name of the single multipart field carrying the file. Default: `file`.
    pub field_name: String,

    /// Interval between simulated progress ticks in milliseconds. Default: 200.
    pub tick_interval_ms: u64,

    /// Smallest pseudo-random progress increment per tick. Default: 3.
    pub min_step: u8,

    /// Largest pseudo-random progress increment per tick. Default: 12.
    pub max_step: u8,

    /// Highest value the simulated bar may show while a request is pending.
    /// Must stay below 100 so completion is only claimed by a real reply.
    /// Default: 90.
    pub progress_ceiling: u8,

    /// Grace period before the progress bar is hidden after a reply, in
    /// milliseconds. Default: 1000.
    pub hide_delay_ms: u64,

    /// Delay before success and info notices dismiss themselves, in
    /// milliseconds. Danger notices never expire. Default: 5000.
    pub notice_dismiss_ms: u64,

    /// Client-side request timeout. Default: none, a hung request simply
    /// leaves the bar parked at the ceiling.
    pub request_timeout_secs: Option<u64>,

    /// Lower-case file extensions accepted before a request is issued.
    /// Empty means every file is forwarded to the service. Default: empty.
    pub accepted_extensions: Vec<String>,

    /// Base name used for downloads when the submitted file name has no
    /// usable stem. Default: `converted`.
    pub default_artifact_stem: String,

    /// Seed for the progress step generator. Default: entropy.
    pub seed: Option<u64>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/convert".to_string(),
            field_name: "file".to_string(),
            tick_interval_ms: 200,
            min_step: 3,
            max_step: 12,
            progress_ceiling: 90,
            hide_delay_ms: 1000,
            notice_dismiss_ms: 5000,
            request_timeout_secs: None,
            accepted_extensions: Vec::new(),
            default_artifact_stem: "converted".to_string(),
            seed: None,
        }
    }
}

impl WorkflowConfig {
    /// Create a new builder for `WorkflowConfig`.
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.hide_delay_ms)
    }

    pub fn notice_dismiss(&self) -> Duration {
        Duration::from_millis(self.notice_dismiss_ms)
    }

    /// Whether a file name passes the local extension allow-list.
    ///
    /// Matching is case-insensitive. A name without an extension (or a
    /// dot-only name) never passes a non-empty list.
    pub fn accepts(&self, file_name: &str) -> bool {
        if self.accepted_extensions.is_empty() {
            return true;
        }
        match file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.accepted_extensions.iter().any(|a| *a == ext)
            }
            _ => false,
        }
    }
}

/// Builder for [`WorkflowConfig`].
#[derive(Debug)]
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl WorkflowConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.config.field_name = name.into();
        self
    }

    pub fn tick_interval_ms(mut self, ms: u64) -> Self {
        self.config.tick_interval_ms = ms.max(1);
        self
    }

    pub fn step_range(mut self, min: u8, max: u8) -> Self {
        self.config.min_step = min;
        self.config.max_step = max;
        self
    }

    pub fn progress_ceiling(mut self, ceiling: u8) -> Self {
        self.config.progress_ceiling = ceiling;
        self
    }

    pub fn hide_delay_ms(mut self, ms: u64) -> Self {
        self.config.hide_delay_ms = ms;
        self
    }

    pub fn notice_dismiss_ms(mut self, ms: u64) -> Self {
        self.config.notice_dismiss_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    /// Restrict submissions to these extensions (leading dots and case are
    /// normalised away).
    pub fn accepted_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.accepted_extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn default_artifact_stem(mut self, stem: impl Into<String>) -> Self {
        self.config.default_artifact_stem = stem.into();
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkflowConfig, MdropError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.endpoint).map_err(|e| {
            MdropError::InvalidConfig(format!("endpoint '{}' is not a URL: {e}", c.endpoint))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(MdropError::InvalidConfig(format!(
                "endpoint must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.field_name.trim().is_empty() {
            return Err(MdropError::InvalidConfig(
                "multipart field name must not be empty".into(),
            ));
        }
        if c.min_step == 0 || c.min_step > c.max_step {
            return Err(MdropError::InvalidConfig(format!(
                "step range must satisfy 1 ≤ min ≤ max, got {}..={}",
                c.min_step, c.max_step
            )));
        }
        if c.progress_ceiling >= 100 {
            return Err(MdropError::InvalidConfig(format!(
                "progress ceiling must be below 100, got {}",
                c.progress_ceiling
            )));
        }
        if c.default_artifact_stem.trim().is_empty() {
            return Err(MdropError::InvalidConfig(
                "default artifact stem must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
