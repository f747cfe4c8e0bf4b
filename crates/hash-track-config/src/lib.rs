//! Configuration primitives and loader for hash-track.
//!
//! Settings resolve through a precedence stack:
//! override file → working directory `.hash-track.toml` → built-in defaults.
//! Each field remembers which layer supplied it so validation failures can
//! point at the offending file.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hash_track::{DetectorSettings, DEFAULT_SURFACE_ID};
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = ".hash-track.toml";

const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
const DEFAULT_RETRY_DELAY_MS: u64 = 10;
const DEFAULT_EVENT_NAME: &str = "hashchange";

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub detector: DetectorConfig,
    pub surface: SurfaceConfig,
    pub adapter: AdapterConfig,
    pub sources: ConfigSources,
}

/// Timing of the polling strategies and surface retries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectorConfig {
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub max_retries: Option<u32>,
}

/// Settings for the hidden history surface used on legacy hosts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub element_id: String,
}

/// Settings for the event-dispatch adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterConfig {
    pub event_name: String,
    /// Whether link bindings set `href="#fragment"` unless told otherwise.
    pub set_href: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        AdapterConfig {
            event_name: DEFAULT_EVENT_NAME.to_owned(),
            set_href: true,
        }
    }
}

impl Config {
    /// Loads configuration using the precedence rules and returns typed settings.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let override_path = options
            .override_path
            .map(|path| make_absolute(&path, &working_dir));

        if let Some(path) = &override_path {
            if !path.exists() {
                return Err(ConfigError::OverrideNotFound { path: path.clone() });
            }
        }

        let default_source = ConfigSource::default(working_dir.clone());
        let mut merged = PartialConfig::defaults(&default_source);
        let mut layers = vec![default_source];

        let local_path = working_dir.join(CONFIG_FILE_NAME);
        if local_path.exists() && Some(&local_path) != override_path.as_ref() {
            let source = ConfigSource::for_file(ConfigSourceKind::Local, local_path.clone());
            merged.merge(load_layer(&local_path, source.clone())?);
            layers.push(source);
        }

        if let Some(path) = override_path {
            let source = ConfigSource::for_file(ConfigSourceKind::Override, path.clone());
            merged.merge(load_layer(&path, source.clone())?);
            layers.push(source);
        }

        let resolved = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(Config {
            detector: resolved.detector,
            surface: resolved.surface,
            adapter: resolved.adapter,
            sources: ConfigSources {
                working_directory: working_dir,
                layers,
            },
        })
    }

    /// Parses a single TOML document layered over the built-in defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let default_source = ConfigSource::default(PathBuf::from("."));
        let inline = ConfigSource {
            kind: ConfigSourceKind::Override,
            path: None,
            base_dir: PathBuf::from("."),
        };
        let mut merged = PartialConfig::defaults(&default_source);
        merged.merge(
            parse_layer(contents, inline.clone()).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?,
        );
        let resolved = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(Config {
            detector: resolved.detector,
            surface: resolved.surface,
            adapter: resolved.adapter,
            sources: ConfigSources {
                working_directory: PathBuf::from("."),
                layers: vec![default_source, inline],
            },
        })
    }

    /// Detector settings derived from the `[detector]` and `[surface]` tables.
    pub fn detector_settings(&self) -> DetectorSettings {
        DetectorSettings {
            poll_interval: self.detector.poll_interval,
            retry_delay: self.detector.retry_delay,
            max_retries: self.detector.max_retries,
            surface_id: self.surface.element_id.clone(),
        }
    }
}

impl Default for Config {
    /// Built-in defaults only; no files are consulted.
    fn default() -> Self {
        let defaults = DetectorSettings::default();
        Config {
            detector: DetectorConfig {
                poll_interval: defaults.poll_interval,
                retry_delay: defaults.retry_delay,
                max_retries: defaults.max_retries,
            },
            surface: SurfaceConfig {
                element_id: defaults.surface_id,
            },
            adapter: AdapterConfig::default(),
            sources: ConfigSources {
                working_directory: PathBuf::from("."),
                layers: vec![ConfigSource::default(PathBuf::from("."))],
            },
        }
    }
}

/// Provenance information for resolved configuration.
#[derive(Clone, Debug)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

/// Specific layer of configuration (default/local/override).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
    pub base_dir: PathBuf,
}

impl ConfigSource {
    fn default(base_dir: PathBuf) -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Default,
            path: None,
            base_dir,
        }
    }

    fn for_file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        ConfigSource {
            kind,
            path: Some(path),
            base_dir,
        }
    }

    fn describe(&self) -> String {
        match (&self.kind, &self.path) {
            (ConfigSourceKind::Default, _) => "built-in defaults".to_owned(),
            (kind, Some(path)) => format!("{} at {}", kind, path.display()),
            (kind, None) => kind.to_string(),
        }
    }
}

/// Kinds of configuration sources, ordered from lowest to highest precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    Local,
    Override,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfigSourceKind::Default => "defaults",
            ConfigSourceKind::Local => "local config",
            ConfigSourceKind::Override => "override config",
        };
        f.write_str(label)
    }
}

/// Loader options, typically supplied by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve working directory {attempted}: {source}")]
    WorkingDirectory {
        attempted: PathBuf,
        source: io::Error,
    },
    #[error("override config {path} not found")]
    OverrideNotFound { path: PathBuf },
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("configuration validation failed:\n{0}")]
    Validation(ConfigValidationErrors),
}

/// A single validation problem, tagged with the layer that caused it.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub source: Option<ConfigSource>,
    pub message: String,
}

impl ConfigValidationError {
    fn new(source: Option<ConfigSource>, message: impl Into<String>) -> Self {
        ConfigValidationError {
            source,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({})", self.message, source.describe()),
            None => f.write_str(&self.message),
        }
    }
}

/// Every validation problem found in one pass.
#[derive(Clone, Debug)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl ConfigValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ConfigValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {error}")?;
        }
        Ok(())
    }
}

fn resolve_working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(path) => fs::canonicalize(&path).map_err(|source| ConfigError::WorkingDirectory {
            attempted: path,
            source,
        }),
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
            attempted: PathBuf::from("."),
            source,
        }),
    }
}

fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn load_layer(path: &Path, source: ConfigSource) -> Result<PartialConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.into(),
        source,
    })?;
    parse_layer(&contents, source).map_err(|source| ConfigError::Parse {
        path: path.into(),
        source,
    })
}

fn parse_layer(contents: &str, source: ConfigSource) -> Result<PartialConfig, toml::de::Error> {
    let raw: RawConfig = toml::from_str(contents)?;
    Ok(raw.into_partial(source))
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    detector: Option<RawDetector>,
    surface: Option<RawSurface>,
    adapter: Option<RawAdapter>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDetector {
    poll_interval_ms: Option<u64>,
    retry_delay_ms: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSurface {
    element_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAdapter {
    event_name: Option<String>,
    set_href: Option<bool>,
}

impl RawConfig {
    fn into_partial(self, source: ConfigSource) -> PartialConfig {
        let detector = self.detector.unwrap_or_default();
        let surface = self.surface.unwrap_or_default();
        let adapter = self.adapter.unwrap_or_default();
        PartialConfig {
            poll_interval_ms: detector
                .poll_interval_ms
                .map(|value| Located::new(value, source.clone())),
            retry_delay_ms: detector
                .retry_delay_ms
                .map(|value| Located::new(value, source.clone())),
            max_retries: detector
                .max_retries
                .map(|value| Located::new(value, source.clone())),
            element_id: surface
                .element_id
                .map(|value| Located::new(value, source.clone())),
            event_name: adapter
                .event_name
                .map(|value| Located::new(value, source.clone())),
            set_href: adapter
                .set_href
                .map(|value| Located::new(value, source.clone())),
        }
    }
}

#[derive(Clone, Debug)]
struct Located<T> {
    value: T,
    source: ConfigSource,
}

impl<T> Located<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Located { value, source }
    }
}

#[derive(Clone, Debug, Default)]
struct PartialConfig {
    poll_interval_ms: Option<Located<u64>>,
    retry_delay_ms: Option<Located<u64>>,
    max_retries: Option<Located<u32>>,
    element_id: Option<Located<String>>,
    event_name: Option<Located<String>>,
    set_href: Option<Located<bool>>,
}

struct ResolvedConfig {
    detector: DetectorConfig,
    surface: SurfaceConfig,
    adapter: AdapterConfig,
}

impl PartialConfig {
    fn defaults(source: &ConfigSource) -> Self {
        PartialConfig {
            poll_interval_ms: Some(Located::new(DEFAULT_POLL_INTERVAL_MS, source.clone())),
            retry_delay_ms: Some(Located::new(DEFAULT_RETRY_DELAY_MS, source.clone())),
            max_retries: None,
            element_id: Some(Located::new(DEFAULT_SURFACE_ID.to_owned(), source.clone())),
            event_name: Some(Located::new(DEFAULT_EVENT_NAME.to_owned(), source.clone())),
            set_href: Some(Located::new(true, source.clone())),
        }
    }

    fn merge(&mut self, other: PartialConfig) {
        if other.poll_interval_ms.is_some() {
            self.poll_interval_ms = other.poll_interval_ms;
        }
        if other.retry_delay_ms.is_some() {
            self.retry_delay_ms = other.retry_delay_ms;
        }
        if other.max_retries.is_some() {
            self.max_retries = other.max_retries;
        }
        if other.element_id.is_some() {
            self.element_id = other.element_id;
        }
        if other.event_name.is_some() {
            self.event_name = other.event_name;
        }
        if other.set_href.is_some() {
            self.set_href = other.set_href;
        }
    }

    fn finalize(self) -> Result<ResolvedConfig, ConfigValidationErrors> {
        let mut errors = Vec::new();

        let poll_interval = positive_millis(
            self.poll_interval_ms,
            "detector.poll_interval_ms",
            DEFAULT_POLL_INTERVAL_MS,
            &mut errors,
        );
        let retry_delay = positive_millis(
            self.retry_delay_ms,
            "detector.retry_delay_ms",
            DEFAULT_RETRY_DELAY_MS,
            &mut errors,
        );

        if let Some(max_retries) = &self.max_retries {
            if max_retries.value == 0 {
                errors.push(ConfigValidationError::new(
                    Some(max_retries.source.clone()),
                    "detector.max_retries must be greater than 0 (omit it to retry forever)",
                ));
            }
        }

        let element_id = non_empty(
            self.element_id,
            "surface.element_id",
            DEFAULT_SURFACE_ID,
            &mut errors,
        );
        let event_name = non_empty(
            self.event_name,
            "adapter.event_name",
            DEFAULT_EVENT_NAME,
            &mut errors,
        );
        let set_href = self.set_href.map_or(true, |located| located.value);

        if !errors.is_empty() {
            return Err(ConfigValidationErrors(errors));
        }

        Ok(ResolvedConfig {
            detector: DetectorConfig {
                poll_interval,
                retry_delay,
                max_retries: self.max_retries.map(|located| located.value),
            },
            surface: SurfaceConfig { element_id },
            adapter: AdapterConfig {
                event_name,
                set_href,
            },
        })
    }
}

fn positive_millis(
    value: Option<Located<u64>>,
    field: &str,
    fallback: u64,
    errors: &mut Vec<ConfigValidationError>,
) -> Duration {
    match value {
        Some(located) if located.value == 0 => {
            errors.push(ConfigValidationError::new(
                Some(located.source),
                format!("{field} must be greater than 0"),
            ));
            Duration::from_millis(fallback)
        }
        Some(located) => Duration::from_millis(located.value),
        None => Duration::from_millis(fallback),
    }
}

fn non_empty(
    value: Option<Located<String>>,
    field: &str,
    fallback: &str,
    errors: &mut Vec<ConfigValidationError>,
) -> String {
    match value {
        Some(located) if located.value.trim().is_empty() => {
            errors.push(ConfigValidationError::new(
                Some(located.source),
                format!("{field} must not be empty"),
            ));
            fallback.to_owned()
        }
        Some(located) => located.value,
        None => fallback.to_owned(),
    }
}
