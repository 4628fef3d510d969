//! Logging plugin.
//!
//! [`TracingPlugin`] publishes its [`TracingConfig`] as a global during
//! `build()` and installs the `tracing_subscriber` registry in `ready()`, so
//! plugins built in between can still read the intended level.
//!
//! # Example
//!
//! ```
//! use rosyn_app::app::App;
//! use rosyn_core_plugins::{TracingConfig, TracingFormat, TracingPlugin};
//! use tracing::Level;
//!
//! let mut app = App::new();
//! app.add_plugins(
//!     TracingPlugin::default()
//!         .with_level(Level::DEBUG)
//!         .with_format(TracingFormat::Compact),
//! );
//! app.finish();
//!
//! let config = app.get_global::<TracingConfig>().unwrap();
//! assert_eq!(config.level, Level::DEBUG);
//! ```

use rosyn_app::app::App;
use rosyn_app::plugin::Plugin;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line colored output (default).
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// JSON lines for log aggregation.
    Json,
}

/// The configuration a [`TracingPlugin`] was added with.
///
/// Inserted as an app global.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    /// Level used when neither an explicit filter nor `RUST_LOG` is set.
    pub level: Level,
    /// Output format.
    pub format: TracingFormat,
}

/// Installs a `tracing` subscriber.
///
/// The filter is taken from [`with_env_filter`](Self::with_env_filter) if
/// given, else from `RUST_LOG`, else from the configured level. Installing
/// is skipped silently when a global subscriber already exists, so tests can
/// add the plugin repeatedly.
///
/// ```
/// use rosyn_core_plugins::{TracingFormat, TracingPlugin};
/// use tracing::Level;
///
/// let development = TracingPlugin::default()
///     .with_level(Level::DEBUG)
///     .with_span_events(true);
///
/// let production = TracingPlugin::default()
///     .with_format(TracingFormat::Json)
///     .with_env_filter("rosyn_components=info,warn");
/// ```
#[derive(Debug, Clone)]
pub struct TracingPlugin {
    level: Level,
    format: TracingFormat,
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingPlugin {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingPlugin {
    /// Creates the plugin with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets an explicit filter directive, e.g. `rosyn_components=debug,info`.
    ///
    /// An unparsable directive falls back to the configured level.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Logs span enter and exit, including the `initial` span of every
    /// component instance.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    fn filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.as_str());
        match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

impl Plugin for TracingPlugin {
    fn build(&self, app: &mut App) {
        app.insert_global(TracingConfig {
            level: self.level,
            format: self.format,
        });
    }

    fn ready(&self, _app: &mut App) {
        let filter = self.filter();
        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            TracingFormat::Pretty => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_span_events(span_events),
                )
                .try_init(),
            TracingFormat::Compact => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_span_events(span_events),
                )
                .try_init(),
            TracingFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_span_events(span_events),
                )
                .try_init(),
        };

        if installed.is_ok() {
            tracing::info!(level = %self.level, format = ?self.format, "tracing initialized");
        } else {
            tracing::debug!("global subscriber already set; keeping it");
        }
    }

    fn cleanup(&self, _app: &mut App) {
        tracing::info!("tracing plugin shutting down");
    }
}
