//! Configuration for the generator.
//!
//! Loaded from a YAML or JSON file (format picked from the extension), then
//! overridden by environment variables prefixed with `CAMTRAP__`, e.g.
//! `CAMTRAP__GENERATION__BATCH_SIZE=1000`.

use crate::error::{GeneratorError, Result};
use camtrap_loader::ElasticsearchConfig;
use config::{Config, Environment, File, FileFormat};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

const BUILTIN_CONFIG: &str = include_str!("../config/generator.yaml");

/// Longest supported capture window, in days.
pub const MAX_DAYS_BACK: i64 = 36_500;

/// Top-level generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    /// Organizational topology
    pub tenants: Vec<TenantConfig>,

    /// Records generated per device
    #[serde(default = "default_media_count")]
    pub media_count_per_device: CountSpec,

    /// Capture window
    #[serde(default)]
    pub date_range: DateRangeConfig,

    #[serde(default)]
    pub generation: GenerationSettings,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Climate bias applied to sampled weather
    #[serde(default)]
    pub weather: SeasonBias,

    /// Document store settings (endpoint and credentials come from the CLI)
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Port for the Prometheus exporter; disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PropertyConfig {
    pub id: String,
    pub name: String,
    /// IANA timezone name, e.g. "America/Chicago"
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    /// `[longitude, latitude]`; validated when the topology is built
    #[serde(default)]
    pub location: Vec<serde_json::Value>,
    #[serde(default)]
    pub boundary_id: Option<String>,
}

/// How many records each device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountSpec {
    Fixed(u32),
    Range { min: u32, max: u32 },
}

impl CountSpec {
    pub fn validate(&self) -> Result<()> {
        match self {
            CountSpec::Range { min, max } if min > max => Err(GeneratorError::config(format!(
                "media_count_per_device: min ({min}) exceeds max ({max})"
            ))),
            _ => Ok(()),
        }
    }

    /// Resolve to a concrete count. Called once per device.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match *self {
            CountSpec::Fixed(n) => n,
            CountSpec::Range { min, max } => rng.gen_range(min..=max.max(min)),
        }
    }

    pub fn max(&self) -> u32 {
        match *self {
            CountSpec::Fixed(n) => n,
            CountSpec::Range { max, .. } => max,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateRangeConfig {
    /// Capture timestamps fall within the last `days_back` days
    #[serde(default = "default_days_back")]
    pub days_back: i64,
}

/// Run-level generation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSettings {
    /// Base seed; a random seed is drawn (and logged) when absent
    #[serde(default)]
    pub seed: Option<u64>,

    /// Records per streamed batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Batches buffered between generation and the loader
    #[serde(default = "default_queue_batches")]
    pub queue_batches: usize,

    /// Devices generated concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Share of records that are videos
    #[serde(default = "default_video_probability")]
    pub video_probability: f64,

    /// Check every record against the strict document mapping
    #[serde(default)]
    pub strict_validation: bool,
}

/// Detection distribution. Tunable; defaults are wildlife-heavy.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_empty_probability")]
    pub empty_probability: f64,

    #[serde(default)]
    pub category_weights: CategoryWeights,

    /// Chance a trackable wildlife object is individually identified
    #[serde(default = "default_identification_probability")]
    pub identification_probability: f64,

    /// Chance an identification reuses a known individual instead of minting one
    #[serde(default = "default_recurrence_probability")]
    pub recurrence_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CategoryWeights {
    #[serde(default = "default_wildlife_weight")]
    pub wildlife: f64,
    #[serde(default = "default_person_weight")]
    pub person: f64,
    #[serde(default = "default_vehicle_weight")]
    pub vehicle: f64,
    #[serde(default = "default_other_weight")]
    pub other: f64,
}

impl CategoryWeights {
    pub fn as_array(&self) -> [f64; 4] {
        [self.wildlife, self.person, self.vehicle, self.other]
    }

    /// Weights must be finite, non-negative, and not all zero.
    pub fn validate(&self) -> Result<()> {
        let weights = self.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(GeneratorError::config(
                "detection.category_weights must be finite and non-negative",
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(GeneratorError::config(
                "detection.category_weights sum to zero",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Chance the weather / astronomical enrichment ran at all
    #[serde(default = "default_run_probability")]
    pub run_probability: f64,

    #[serde(default)]
    pub failure_probability: FailureRates,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FailureRates {
    #[serde(default = "default_weather_failure")]
    pub weather: f64,
    #[serde(default = "default_astronomical_failure")]
    pub astronomical: f64,
    #[serde(default = "default_detection_failure")]
    pub detection: f64,
}

/// Climate bias applied on top of the latitude/season model.
#[derive(Debug, Clone, Deserialize)]
pub struct SeasonBias {
    #[serde(default)]
    pub temperature_offset_f: f64,
    #[serde(default = "default_precipitation_scale")]
    pub precipitation_scale: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_media_count() -> CountSpec {
    CountSpec::Fixed(10)
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_days_back() -> i64 {
    30
}
fn default_batch_size() -> usize {
    500
}
fn default_queue_batches() -> usize {
    4
}
fn default_workers() -> usize {
    4
}
fn default_video_probability() -> f64 {
    0.15
}
fn default_empty_probability() -> f64 {
    0.10
}
fn default_wildlife_weight() -> f64 {
    0.80
}
fn default_person_weight() -> f64 {
    0.08
}
fn default_vehicle_weight() -> f64 {
    0.07
}
fn default_other_weight() -> f64 {
    0.05
}
fn default_identification_probability() -> f64 {
    0.25
}
fn default_recurrence_probability() -> f64 {
    0.70
}
fn default_run_probability() -> f64 {
    0.92
}
fn default_weather_failure() -> f64 {
    0.05
}
fn default_astronomical_failure() -> f64 {
    0.02
}
fn default_detection_failure() -> f64 {
    0.02
}
fn default_precipitation_scale() -> f64 {
    1.0
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for DateRangeConfig {
    fn default() -> Self {
        Self {
            days_back: default_days_back(),
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            seed: None,
            batch_size: default_batch_size(),
            queue_batches: default_queue_batches(),
            workers: default_workers(),
            video_probability: default_video_probability(),
            strict_validation: false,
        }
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            wildlife: default_wildlife_weight(),
            person: default_person_weight(),
            vehicle: default_vehicle_weight(),
            other: default_other_weight(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            empty_probability: default_empty_probability(),
            category_weights: CategoryWeights::default(),
            identification_probability: default_identification_probability(),
            recurrence_probability: default_recurrence_probability(),
        }
    }
}

impl Default for FailureRates {
    fn default() -> Self {
        Self {
            weather: default_weather_failure(),
            astronomical: default_astronomical_failure(),
            detection: default_detection_failure(),
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            run_probability: default_run_probability(),
            failure_probability: FailureRates::default(),
        }
    }
}

impl Default for SeasonBias {
    fn default() -> Self {
        Self {
            temperature_offset_f: 0.0,
            precipitation_scale: default_precipitation_scale(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("CAMTRAP")
        .separator("__")
        .try_parsing(true)
}

impl GeneratorConfig {
    /// Load and validate configuration from a YAML or JSON file plus environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path))
            .add_source(environment())
            .build()?;

        let parsed: GeneratorConfig = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// The sample topology shipped with the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_str(BUILTIN_CONFIG, FileFormat::Yaml)
    }

    /// Parse configuration from an in-memory document.
    pub fn from_str(contents: &str, format: FileFormat) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(contents, format))
            .build()?;

        let parsed: GeneratorConfig = config.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Replace the per-device count with a fixed value.
    pub fn with_count_override(mut self, count: Option<u32>) -> Self {
        if let Some(n) = count {
            self.media_count_per_device = CountSpec::Fixed(n);
        }
        self
    }

    /// Validate settings. Topology checks happen in [`crate::Topology::load`].
    pub fn validate(&self) -> Result<()> {
        self.media_count_per_device.validate()?;

        if !(0..=MAX_DAYS_BACK).contains(&self.date_range.days_back) {
            return Err(GeneratorError::config(format!(
                "date_range.days_back must be within [0, {MAX_DAYS_BACK}], got {}",
                self.date_range.days_back
            )));
        }

        if self.generation.batch_size == 0 {
            return Err(GeneratorError::config("generation.batch_size must be greater than 0"));
        }
        if self.generation.queue_batches == 0 {
            return Err(GeneratorError::config("generation.queue_batches must be greater than 0"));
        }
        if self.generation.workers == 0 {
            return Err(GeneratorError::config("generation.workers must be greater than 0"));
        }

        self.detection.category_weights.validate()?;

        let probabilities = [
            ("generation.video_probability", self.generation.video_probability),
            ("detection.empty_probability", self.detection.empty_probability),
            ("detection.identification_probability", self.detection.identification_probability),
            ("detection.recurrence_probability", self.detection.recurrence_probability),
            ("enrichment.run_probability", self.enrichment.run_probability),
            ("enrichment.failure_probability.weather", self.enrichment.failure_probability.weather),
            ("enrichment.failure_probability.astronomical", self.enrichment.failure_probability.astronomical),
            ("enrichment.failure_probability.detection", self.enrichment.failure_probability.detection),
        ];
        for (field, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(GeneratorError::config(format!(
                    "{field} must be within [0, 1], got {value}"
                )));
            }
        }

        if !self.weather.precipitation_scale.is_finite() || self.weather.precipitation_scale < 0.0 {
            return Err(GeneratorError::config("weather.precipitation_scale must be >= 0"));
        }
        if !self.weather.temperature_offset_f.is_finite() {
            return Err(GeneratorError::config(format!(
                "weather.temperature_offset_f must be finite, got {}",
                self.weather.temperature_offset_f
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const MINIMAL: &str = r#"
tenants:
  - id: tenant-001
    name: Test Tenant
    properties:
      - id: prop-001
        name: Rain Creek Ranch
        timezone: America/Chicago
        devices:
          - id: device-001
            name: Main Gate Camera
            location: [-99.607781, 30.990075]
"#;

    #[test]
    fn test_defaults_applied() {
        let config = GeneratorConfig::from_str(MINIMAL, FileFormat::Yaml).unwrap();
        assert_eq!(config.media_count_per_device, CountSpec::Fixed(10));
        assert_eq!(config.date_range.days_back, 30);
        assert_eq!(config.generation.batch_size, 500);
        assert_eq!(config.detection.category_weights, CategoryWeights::default());
        assert_eq!(config.elasticsearch.index_prefix, "camtrap-media");
        assert!(config.metrics_port.is_none());
    }

    #[test]
    fn test_count_spec_accepts_integer_and_range() {
        let fixed = format!("{MINIMAL}media_count_per_device: 25\n");
        let config = GeneratorConfig::from_str(&fixed, FileFormat::Yaml).unwrap();
        assert_eq!(config.media_count_per_device, CountSpec::Fixed(25));

        let range = format!("{MINIMAL}media_count_per_device:\n  min: 5\n  max: 15\n");
        let config = GeneratorConfig::from_str(&range, FileFormat::Yaml).unwrap();
        assert_eq!(config.media_count_per_device, CountSpec::Range { min: 5, max: 15 });
    }

    #[test]
    fn test_inverted_range_rejected() {
        let range = format!("{MINIMAL}media_count_per_device:\n  min: 15\n  max: 5\n");
        let err = GeneratorConfig::from_str(&range, FileFormat::Yaml).unwrap_err();
        assert!(matches!(err, GeneratorError::Configuration(_)));
    }

    #[test]
    fn test_negative_days_back_rejected() {
        let doc = format!("{MINIMAL}date_range:\n  days_back: -1\n");
        let err = GeneratorConfig::from_str(&doc, FileFormat::Yaml).unwrap_err();
        assert!(matches!(err, GeneratorError::Configuration(_)));
    }

    #[test]
    fn test_days_back_beyond_a_century_rejected() {
        let doc = format!("{MINIMAL}date_range:\n  days_back: 200000000\n");
        let err = GeneratorConfig::from_str(&doc, FileFormat::Yaml).unwrap_err();
        assert!(matches!(err, GeneratorError::Configuration(_)));

        let doc = format!("{MINIMAL}date_range:\n  days_back: {MAX_DAYS_BACK}\n");
        assert!(GeneratorConfig::from_str(&doc, FileFormat::Yaml).is_ok());
    }

    #[test]
    fn test_non_finite_temperature_offset_rejected() {
        for offset in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut config = GeneratorConfig::builtin().unwrap();
            config.weather.temperature_offset_f = offset;
            assert!(matches!(config.validate(), Err(GeneratorError::Configuration(_))));
        }
        let mut config = GeneratorConfig::builtin().unwrap();
        config.weather.temperature_offset_f = -4.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_category_weights_rejected() {
        let doc = format!(
            "{MINIMAL}detection:\n  category_weights:\n    wildlife: 0\n    person: 0\n    vehicle: 0\n    other: 0\n"
        );
        let err = GeneratorConfig::from_str(&doc, FileFormat::Yaml).unwrap_err();
        assert!(matches!(err, GeneratorError::Configuration(_)));
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        let doc = format!("{MINIMAL}generation:\n  video_probability: 1.5\n");
        assert!(GeneratorConfig::from_str(&doc, FileFormat::Yaml).is_err());
    }

    #[test]
    fn test_json_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("generator.json");
        std::fs::write(
            &path,
            r#"{
                "tenants": [{
                    "id": "tenant-001",
                    "name": "Test",
                    "properties": [{
                        "id": "prop-001",
                        "name": "Ranch",
                        "timezone": "UTC",
                        "devices": [{ "id": "d1", "name": "Cam", "location": [10.0, 45.0] }]
                    }]
                }],
                "media_count_per_device": { "min": 1, "max": 3 }
            }"#,
        )
        .unwrap();

        let config = GeneratorConfig::load(&path).unwrap();
        assert_eq!(config.tenants.len(), 1);
        assert_eq!(config.media_count_per_device, CountSpec::Range { min: 1, max: 3 });
    }

    #[test]
    fn test_builtin_config_is_valid() {
        let config = GeneratorConfig::builtin().unwrap();
        assert!(!config.tenants.is_empty());
    }

    #[test]
    fn test_count_override() {
        let config = GeneratorConfig::from_str(MINIMAL, FileFormat::Yaml)
            .unwrap()
            .with_count_override(Some(3));
        assert_eq!(config.media_count_per_device, CountSpec::Fixed(3));
    }

    #[test]
    fn test_range_resolves_within_bounds() {
        let spec = CountSpec::Range { min: 5, max: 15 };
        let mut rng = rand::rngs::StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let n = spec.resolve(&mut rng);
            assert!((5..=15).contains(&n));
        }
        assert_eq!(CountSpec::Fixed(4).resolve(&mut rng), 4);
    }
}
