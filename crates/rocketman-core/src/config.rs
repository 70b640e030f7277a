//! Configuration loading and typed config structures.
//!
//! Configuration can come from a YAML file (`rocketman.yaml`) or purely
//! from the environment. In both cases environment variables override the
//! loaded values, so a container only needs to set what differs from the
//! defaults.
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `MIN_ENGINES` | `bounds.min_engines` | 1 |
//! | `MAX_ENGINES` | `bounds.max_engines` | 8 |
//! | `MIN_HEIGHT` | `bounds.min_height` | 50 |
//! | `MAX_HEIGHT` | `bounds.max_height` | 600 |
//! | `RF_DENSITY` | `physics.rf_density` | 820 |
//! | `WALL_THICKNESS` | `physics.wall_thickness` | 0.01 |
//! | `TIME_DELTA` | `physics.time_delta` | 0.5 |
//! | `MASS_FLOW` | `physics.mass_flow` | 2500 |
//! | `STARTUP_DELAY_MS` | `engine.startup_delay_ms` | 5000 |
//! | `ID_MAX_RETRIES` | `engine.id_max_retries` | 10 |
//! | `SERVICE_NAME` | `service.name` | `Rocket Manager` |
//! | `DRAGONFLY_URL` | `infrastructure.dragonfly_url` | `redis://localhost:6379` |
//! | `NATS_URL` | `infrastructure.nats_url` | `nats://localhost:4222` |
//! | `API_HOST` | `infrastructure.api_host` | `0.0.0.0` |
//! | `API_PORT` | `infrastructure.api_port` | 8080 |
//! | `USER_SECRET` | `infrastructure.user_secret` | none: must be set |

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rocketman_types::RocketParams;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value for {name}: {message}")]
    Override {
        /// The environment variable name.
        name: String,
        /// Why the value was rejected.
        message: String,
    },

    /// The configuration is internally inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RocketConfig {
    /// Service identity reported by the API root.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Accepted rocket geometry.
    #[serde(default)]
    pub bounds: BoundsConfig,

    /// Physics constants.
    #[serde(default)]
    pub physics: PhysicsConfig,

    /// Event-processing settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Connection strings and listen addresses.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,
}

impl RocketConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, an
    /// override is malformed, or the result fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from defaults plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override is malformed or the result
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] if a set variable cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Override`] if a present value cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "MIN_ENGINES", &mut self.bounds.min_engines)?;
        override_parsed(&lookup, "MAX_ENGINES", &mut self.bounds.max_engines)?;
        override_parsed(&lookup, "MIN_HEIGHT", &mut self.bounds.min_height)?;
        override_parsed(&lookup, "MAX_HEIGHT", &mut self.bounds.max_height)?;
        override_parsed(&lookup, "RF_DENSITY", &mut self.physics.rf_density)?;
        override_parsed(&lookup, "WALL_THICKNESS", &mut self.physics.wall_thickness)?;
        override_parsed(&lookup, "TIME_DELTA", &mut self.physics.time_delta)?;
        override_parsed(&lookup, "MASS_FLOW", &mut self.physics.mass_flow)?;
        override_parsed(&lookup, "STARTUP_DELAY_MS", &mut self.engine.startup_delay_ms)?;
        override_parsed(&lookup, "ID_MAX_RETRIES", &mut self.engine.id_max_retries)?;
        override_parsed(&lookup, "API_PORT", &mut self.infrastructure.api_port)?;
        if let Some(val) = lookup("SERVICE_NAME") {
            self.service.name = val;
        }
        if let Some(val) = lookup("DRAGONFLY_URL") {
            self.infrastructure.dragonfly_url = val;
        }
        if let Some(val) = lookup("NATS_URL") {
            self.infrastructure.nats_url = val;
        }
        if let Some(val) = lookup("API_HOST") {
            self.infrastructure.api_host = val;
        }
        if let Some(val) = lookup("USER_SECRET") {
            self.infrastructure.user_secret = val;
        }
        Ok(())
    }

    /// Reject configurations the simulation cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.bounds;
        if b.min_engines == 0 {
            return Err(ConfigError::Invalid("MIN_ENGINES must be at least 1".to_owned()));
        }
        if b.min_engines > b.max_engines {
            return Err(ConfigError::Invalid(format!(
                "MIN_ENGINES ({}) exceeds MAX_ENGINES ({})",
                b.min_engines, b.max_engines
            )));
        }
        if !(b.min_height > 0.0 && b.min_height <= b.max_height) {
            return Err(ConfigError::Invalid(format!(
                "height bounds [{}, {}] are not a positive range",
                b.min_height, b.max_height
            )));
        }
        let p = &self.physics;
        for (name, value) in [
            ("RF_DENSITY", p.rf_density),
            ("WALL_THICKNESS", p.wall_thickness),
            ("TIME_DELTA", p.time_delta),
            ("MASS_FLOW", p.mass_flow),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        let secret = &self.infrastructure.user_secret;
        if secret.trim().is_empty() || secret == PLACEHOLDER_USER_SECRET {
            return Err(ConfigError::Invalid(
                "USER_SECRET must be set to the user service's token signing key".to_owned(),
            ));
        }
        if self.engine.id_max_retries == 0 {
            return Err(ConfigError::Invalid("ID_MAX_RETRIES must be at least 1".to_owned()));
        }
        Ok(())
    }
}

/// Parse `name` from the lookup into `slot` when present.
fn override_parsed<F, T>(lookup: &F, name: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: core::fmt::Display,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse().map_err(|e: T::Err| ConfigError::Override {
            name: name.to_owned(),
            message: format!("{raw:?}: {e}"),
        })?;
    }
    Ok(())
}

/// Service identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// Display name returned by `GET /`.
    #[serde(default = "default_service_name")]
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
        }
    }
}

/// Accepted rocket geometry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BoundsConfig {
    /// Fewest engines a rocket may have.
    #[serde(default = "default_min_engines")]
    pub min_engines: u32,
    /// Most engines a rocket may have.
    #[serde(default = "default_max_engines")]
    pub max_engines: u32,
    /// Shortest rocket, in metres.
    #[serde(default = "default_min_height")]
    pub min_height: f64,
    /// Tallest rocket, in metres.
    #[serde(default = "default_max_height")]
    pub max_height: f64,
}

impl BoundsConfig {
    /// Check requested geometry against the bounds.
    ///
    /// # Errors
    ///
    /// Returns the [`BoundsViolation`] for the first parameter out of range.
    pub fn check(&self, params: &RocketParams) -> Result<(), BoundsViolation> {
        if params.num_engines < self.min_engines {
            return Err(BoundsViolation::TooFewEngines {
                requested: params.num_engines,
                min: self.min_engines,
            });
        }
        if params.num_engines > self.max_engines {
            return Err(BoundsViolation::TooManyEngines {
                requested: params.num_engines,
                max: self.max_engines,
            });
        }
        if !params.height.is_finite() || params.height < self.min_height {
            return Err(BoundsViolation::TooShort {
                requested: params.height,
                min: self.min_height,
            });
        }
        if params.height > self.max_height {
            return Err(BoundsViolation::TooTall {
                requested: params.height,
                max: self.max_height,
            });
        }
        Ok(())
    }
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            min_engines: default_min_engines(),
            max_engines: default_max_engines(),
            min_height: default_min_height(),
            max_height: default_max_height(),
        }
    }
}

/// Requested geometry that falls outside [`BoundsConfig`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoundsViolation {
    /// Fewer engines than allowed.
    #[error("not enough engines: {requested} requested, at least {min} required")]
    TooFewEngines {
        /// Requested engine count.
        requested: u32,
        /// Configured minimum.
        min: u32,
    },
    /// More engines than allowed.
    #[error("too many engines: {requested} requested, at most {max} allowed")]
    TooManyEngines {
        /// Requested engine count.
        requested: u32,
        /// Configured maximum.
        max: u32,
    },
    /// Shorter than allowed (or not a number).
    #[error("rocket is not tall enough: {requested} requested, at least {min} required")]
    TooShort {
        /// Requested height.
        requested: f64,
        /// Configured minimum.
        min: f64,
    },
    /// Taller than allowed.
    #[error("rocket is too tall: {requested} requested, at most {max} allowed")]
    TooTall {
        /// Requested height.
        requested: f64,
        /// Configured maximum.
        max: f64,
    },
}

/// Physics constants shared by every tick.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PhysicsConfig {
    /// Propellant density (kg per unit of fuel volume).
    #[serde(default = "default_rf_density")]
    pub rf_density: f64,
    /// Hull wall thickness in metres.
    #[serde(default = "default_wall_thickness")]
    pub wall_thickness: f64,
    /// Tick length in seconds. Also the real-time delay between ticks.
    #[serde(default = "default_time_delta")]
    pub time_delta: f64,
    /// Propellant mass flow per engine (kg/s).
    #[serde(default = "default_mass_flow")]
    pub mass_flow: f64,
}

impl PhysicsConfig {
    /// The tick length as a wall-clock duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_delta).unwrap_or(Duration::ZERO)
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            rf_density: default_rf_density(),
            wall_thickness: default_wall_thickness(),
            time_delta: default_time_delta(),
            mass_flow: default_mass_flow(),
        }
    }
}

/// Event-processing settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// How long to wait after startup before consuming events, so the
    /// broker and store have time to come up.
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    /// Attempts the ID generator makes before giving up.
    #[serde(default = "default_id_max_retries")]
    pub id_max_retries: u32,
}

impl EngineConfig {
    /// The startup delay as a duration.
    pub const fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: default_startup_delay_ms(),
            id_max_retries: default_id_max_retries(),
        }
    }
}

/// Connection strings and listen addresses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// `Dragonfly` (Redis-compatible) URL.
    #[serde(default = "default_dragonfly_url")]
    pub dragonfly_url: String,
    /// NATS server URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
    /// Address the HTTP API binds to.
    #[serde(default = "default_api_host")]
    pub api_host: String,
    /// Port the HTTP API listens on.
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// HMAC secret used to verify user bearer tokens.
    #[serde(default = "default_user_secret")]
    pub user_secret: String,
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            dragonfly_url: default_dragonfly_url(),
            nats_url: default_nats_url(),
            api_host: default_api_host(),
            api_port: default_api_port(),
            user_secret: default_user_secret(),
        }
    }
}

fn default_service_name() -> String {
    "Rocket Manager".to_owned()
}

const fn default_min_engines() -> u32 {
    1
}

const fn default_max_engines() -> u32 {
    8
}

const fn default_min_height() -> f64 {
    50.0
}

const fn default_max_height() -> f64 {
    600.0
}

const fn default_rf_density() -> f64 {
    820.0
}

const fn default_wall_thickness() -> f64 {
    0.01
}

const fn default_time_delta() -> f64 {
    0.5
}

const fn default_mass_flow() -> f64 {
    2500.0
}

const fn default_startup_delay_ms() -> u64 {
    5000
}

const fn default_id_max_retries() -> u32 {
    10
}

fn default_dragonfly_url() -> String {
    "redis://localhost:6379".to_owned()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_api_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_api_port() -> u16 {
    8080
}

/// Stands in for the signing key until one is configured; never valid.
const PLACEHOLDER_USER_SECRET: &str = "change-me";

fn default_user_secret() -> String {
    PLACEHOLDER_USER_SECRET.to_owned()
}
