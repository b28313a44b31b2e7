//! Camtrap Generator - synthetic camera-trap media records
//!
//! Builds internally consistent media documents for a configured topology of
//! tenants, properties and devices:
//!
//! - capture and upload timestamps rendered in each property's timezone
//! - weather and sun/moon state derived from capture time and device location
//! - detected objects with category-specific attributes, including recurring
//!   individually identified animals tracked across the whole run
//!
//! Records are produced lazily ([`Orchestrator::records`]) or streamed in
//! batches to a bounded channel ([`Orchestrator::run`]) that the
//! `camtrap-loader` drain writes to a sink.
//!
//! # Example
//!
//! ```rust,no_run
//! use camtrap_generator::{GeneratorConfig, Orchestrator, Topology};
//! use std::sync::Arc;
//!
//! fn main() -> camtrap_generator::Result<()> {
//!     let config = GeneratorConfig::builtin()?.with_count_override(Some(5));
//!     let topology = Arc::new(Topology::load(&config)?);
//!     let orchestrator = Orchestrator::new(&config, topology, chrono::Utc::now())?;
//!
//!     for record in orchestrator.records() {
//!         let record = record?;
//!         println!("{} {}", record.media.id, record.media.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod catalog;
pub mod config;
pub mod detection;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod random;
pub mod record;
pub mod schema;
pub mod sky;
pub mod topology;
pub mod weather;

// Re-export main types
pub use builder::MediaRecordBuilder;
pub use config::{CountSpec, GeneratorConfig};
pub use detection::{Detection, DetectionSynthesizer, FrameContext};
pub use error::{GeneratorError, Result};
pub use identity::{Identity, IdentityRegistry};
pub use orchestrator::{DevicePlan, GenerationReport, Orchestrator, RecordStream};
pub use record::MediaRecord;
pub use schema::SchemaChecker;
pub use sky::{astronomy, AstronomicalState, SunPosition};
pub use topology::{DeviceRef, GeoPoint, Topology};
pub use weather::{weather, WeatherState};
