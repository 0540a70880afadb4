//! Configuration for AtlasPipe
//!
//! Centralized configuration with sensible defaults.

/// Main configuration for a pipeline and the in-memory backend
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Execution Configuration
    // -------------------------------------------------------------------------
    /// Minimum number of pending connection groups that triggers
    /// concurrent execution. Never lower than 2.
    ///
    /// The default of 2 gives every group its own worker as soon as more
    /// than one connection is involved. Raising it is an opt-in tuning
    /// knob: batches that span fewer groups than the threshold run their
    /// groups one after another on the calling thread, trading the
    /// fan-out for no thread spawns on small multi-connection batches.
    pub parallel_threshold: usize,

    /// Worker threads are named `{prefix}-{index}`
    pub worker_name_prefix: String,

    /// Stack size for worker threads (platform default when None)
    pub worker_stack_size: Option<usize>,

    // -------------------------------------------------------------------------
    // Backend Configuration
    // -------------------------------------------------------------------------
    /// Fail the whole round trip on the first failing command.
    /// When false, failures are delivered to callbacks as `Value::Error`.
    pub raise_on_error: bool,

    /// TTL applied when an expiry is requested without an explicit time (seconds)
    pub default_expire_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parallel_threshold: 2,
            worker_name_prefix: "atlaspipe-exec".to_string(),
            worker_stack_size: None,
            raise_on_error: true,
            default_expire_secs: 60,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of groups at which execution goes concurrent (clamped to >= 2)
    ///
    /// Values above 2 run smaller multi-connection batches sequentially.
    pub fn parallel_threshold(mut self, groups: usize) -> Self {
        self.config.parallel_threshold = groups.max(2);
        self
    }

    /// Set the worker thread name prefix
    pub fn worker_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.worker_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size (in bytes)
    pub fn worker_stack_size(mut self, size: usize) -> Self {
        self.config.worker_stack_size = Some(size);
        self
    }

    /// Set whether a failing command fails the whole round trip
    pub fn raise_on_error(mut self, raise: bool) -> Self {
        self.config.raise_on_error = raise;
        self
    }

    /// Set the default expiry (in seconds)
    pub fn default_expire_secs(mut self, secs: u64) -> Self {
        self.config.default_expire_secs = secs;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
