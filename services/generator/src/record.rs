//! The media document and its blocks.

use crate::detection::Detection;
use crate::error::{GeneratorError, Result};
use crate::sky::AstronomicalState;
use crate::weather::WeatherState;
use camtrap_loader::BulkDocument;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;

/// Enrichment starts shortly after upload and may finish after the run's
/// reference time, but never more than this many seconds after upload.
pub const MAX_ENRICHMENT_LAG_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyInfo {
    pub id: String,
    pub name: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaInfo {
    pub id: String,
    pub name: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub capture_timestamp: DateTime<Utc>,
    pub capture_timestamp_local: DateTime<FixedOffset>,
    pub upload_timestamp: DateTime<Utc>,
    pub upload_timestamp_local: DateTime<FixedOffset>,
    pub upload_delay_ms: i64,
    pub status: String,
}

/// Fields that depend on the media type. Images and videos never share them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FileDetails {
    Image {
        width: u32,
        height: u32,
        megapixels: f64,
    },
    Video {
        duration_s: f64,
        fps: u32,
        codec: String,
        bitrate_kbps: u32,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub size_bytes: u64,
    pub format: String,
    pub mime_type: String,
    #[serde(flatten)]
    pub details: FileDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct Storage {
    pub original: String,
    pub thumbnail: String,
    pub medium: String,
    pub processed: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Location {
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
    pub accuracy: String,
    pub source: String,
    pub boundary_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub battery_level: u8,
    pub signal_strength: String,
    pub temperature_f: i32,
    pub storage_remaining_gb: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceSettings {
    pub mode: String,
    pub sensitivity: String,
    pub resolution: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub id: String,
    pub name: String,
    pub make: String,
    pub model: String,
    pub serial_number: String,
    pub status: DeviceStatus,
    pub settings: DeviceSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: String,
    pub confidence: f64,
    pub zone: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailSource {
    pub from: String,
    pub message_id: String,
    pub subject: String,
    pub sent_timestamp: DateTime<Utc>,
    pub received_timestamp: DateTime<Utc>,
    pub reception_delay_sec: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Ingestion {
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub batch_id: String,
    pub uploaded_by: String,
    pub processing_time_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailSource>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedMedia {
    pub media_id: String,
    pub media_type: MediaKind,
    pub relationship: String,
    pub capture_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherBlock {
    #[serde(flatten)]
    pub state: WeatherState,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AstronomicalBlock {
    #[serde(flatten)]
    pub state: AstronomicalState,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessType {
    #[serde(rename = "weather")]
    Weather,
    #[serde(rename = "astronomical")]
    Astronomical,
    #[serde(rename = "object-detection")]
    ObjectDetection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputSummary {
    pub objects_detected: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_class: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentProcess {
    pub process_id: String,
    #[serde(rename = "type")]
    pub process_type: ProcessType,
    pub status: ProcessStatus,
    pub started_timestamp: DateTime<Utc>,
    pub completed_timestamp: DateTime<Utc>,
    pub duration_ms: i64,
    pub service: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub priority: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<OutputSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserMetadata {
    pub notes: String,
    pub rating: u8,
    pub is_favorite: bool,
    pub is_hidden: bool,
    pub is_archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_viewed_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Tags {
    pub system: Vec<String>,
    pub user: Vec<String>,
    pub ai: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Access {
    pub visibility: String,
    pub shared_with: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentState {
    Completed,
    Failed,
    Pending,
}

impl From<ProcessStatus> for EnrichmentState {
    fn from(status: ProcessStatus) -> Self {
        match status {
            ProcessStatus::Completed => EnrichmentState::Completed,
            ProcessStatus::Failed => EnrichmentState::Failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentStatus {
    pub weather: EnrichmentState,
    pub astronomical: EnrichmentState,
    pub detection: EnrichmentState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Complete,
    Partial,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub created_timestamp: DateTime<Utc>,
    pub created_by: String,
    pub updated_timestamp: DateTime<Utc>,
    pub updated_by: String,
    pub version: u32,
    pub processing_status: ProcessingStatus,
    pub enrichment_status: EnrichmentStatus,
}

/// One synthetic camera-trap media document.
#[derive(Debug, Clone, Serialize)]
pub struct MediaRecord {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub tenant_id: String,
    pub property: PropertyInfo,
    pub media: MediaInfo,
    pub file: FileInfo,
    pub storage: Storage,
    pub location: Location,
    pub device: DeviceSnapshot,
    pub trigger: Trigger,
    pub ingestion: Ingestion,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherBlock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub astronomical: Option<AstronomicalBlock>,
    pub detection: Detection,
    pub enrichment_processes: Vec<EnrichmentProcess>,
    pub user_metadata: UserMetadata,
    pub tags: Tags,
    pub access: Access,
    pub system: SystemInfo,
}

impl BulkDocument for MediaRecord {
    fn document_id(&self) -> &str {
        &self.media.id
    }

    fn partition_key(&self) -> &str {
        &self.tenant_id
    }
}

fn violation(media_id: &str, message: impl std::fmt::Display) -> GeneratorError {
    GeneratorError::invariant(format!("{media_id}: {message}"))
}

impl MediaRecord {
    pub fn is_video(&self) -> bool {
        self.media.kind == MediaKind::Video
    }

    fn process(&self, process_type: ProcessType) -> Option<&EnrichmentProcess> {
        self.enrichment_processes
            .iter()
            .find(|p| p.process_type == process_type)
    }

    /// Check the cross-field consistency rules of a generated record.
    ///
    /// `now` is the run's reference time and `days_back` the capture window.
    pub fn check_invariants(&self, now: DateTime<Utc>, days_back: i64) -> Result<()> {
        let id = self.media.id.as_str();
        let capture = self.media.capture_timestamp;
        let upload = self.media.upload_timestamp;

        if self.timestamp != capture {
            return Err(violation(id, "@timestamp differs from capture timestamp"));
        }
        let window_start = Duration::try_days(days_back)
            .and_then(|window| now.checked_sub_signed(window))
            .ok_or_else(|| violation(id, format!("date window of {days_back} days is out of range")))?;
        if capture < window_start || capture > now {
            return Err(violation(id, format!("capture {capture} outside the date window")));
        }
        if upload < capture || upload > now {
            return Err(violation(id, format!("upload {upload} not within [capture, now]")));
        }
        if self.media.upload_delay_ms != (upload - capture).num_milliseconds() {
            return Err(violation(id, "upload delay disagrees with timestamps"));
        }
        if self.media.capture_timestamp_local != capture || self.media.upload_timestamp_local != upload {
            return Err(violation(id, "local timestamps name a different instant"));
        }

        match (&self.file.details, self.media.kind) {
            (FileDetails::Image { .. }, MediaKind::Image) | (FileDetails::Video { .. }, MediaKind::Video) => {}
            _ => return Err(violation(id, "file fields do not match media type")),
        }
        if !self.related.is_empty() && !self.is_video() {
            return Err(violation(id, "related frames on a still image"));
        }

        let mut previous_end = upload;
        for process in &self.enrichment_processes {
            if process.started_timestamp < previous_end {
                return Err(violation(id, "enrichment processes overlap or precede upload"));
            }
            if (process.completed_timestamp - process.started_timestamp).num_milliseconds() != process.duration_ms {
                return Err(violation(id, "enrichment duration disagrees with timestamps"));
            }
            previous_end = process.completed_timestamp;
        }
        if self.system.updated_timestamp != previous_end || self.system.created_timestamp != upload {
            return Err(violation(id, "system timestamps disagree with enrichment timeline"));
        }
        if (previous_end - upload).num_seconds() > MAX_ENRICHMENT_LAG_SECS {
            return Err(violation(id, "enrichment finished too long after upload"));
        }

        let status = &self.system.enrichment_status;
        check_enrichment_link(
            id,
            "weather",
            self.process(ProcessType::Weather),
            status.weather,
            self.weather.as_ref().map(|w| w.placeholder),
        )?;
        check_enrichment_link(
            id,
            "astronomical",
            self.process(ProcessType::Astronomical),
            status.astronomical,
            self.astronomical.as_ref().map(|a| a.placeholder),
        )?;
        check_enrichment_link(
            id,
            "detection",
            self.process(ProcessType::ObjectDetection),
            status.detection,
            Some(self.detection.placeholder),
        )?;

        let all_completed = [status.weather, status.astronomical, status.detection]
            .iter()
            .all(|s| *s == EnrichmentState::Completed);
        let expected = if all_completed { ProcessingStatus::Complete } else { ProcessingStatus::Partial };
        if self.system.processing_status != expected {
            return Err(violation(id, "processing status disagrees with enrichment status"));
        }

        if !(1..=5).contains(&self.user_metadata.rating) {
            return Err(violation(id, "rating outside 1-5"));
        }

        self.detection
            .check_consistency(self.is_video())
            .map_err(|e| violation(id, e))
    }
}

/// Process entry, status value and block presence must tell the same story:
/// completed means a real block, failed a placeholder, not run means no
/// process entry and no block.
fn check_enrichment_link(
    media_id: &str,
    name: &str,
    process: Option<&EnrichmentProcess>,
    state: EnrichmentState,
    block_placeholder: Option<bool>,
) -> Result<()> {
    let consistent = match (process.map(|p| p.status), state, block_placeholder) {
        (Some(ProcessStatus::Completed), EnrichmentState::Completed, Some(false)) => true,
        (Some(ProcessStatus::Failed), EnrichmentState::Failed, Some(true)) => true,
        (None, EnrichmentState::Pending, None) => true,
        _ => false,
    };
    if consistent {
        Ok(())
    } else {
        Err(violation(
            media_id,
            format!("{name} enrichment status {state:?} does not match its process and block"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MediaRecordBuilder;
    use crate::config::GeneratorConfig;
    use crate::identity::IdentityRegistry;
    use crate::random::rng_from_seed;
    use crate::topology::Topology;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn sample(kind: MediaKind) -> MediaRecord {
        let config = GeneratorConfig::builtin().unwrap();
        let topology = Topology::load(&config).unwrap();
        let builder = MediaRecordBuilder::new(&config, Arc::new(IdentityRegistry::new()), now()).unwrap();
        let device = topology.resolve(topology.addresses()[0]).unwrap();
        let mut rng = rng_from_seed(17);
        (0..500)
            .map(|i| builder.build(device, i, &mut rng).unwrap())
            .find(|record| record.media.kind == kind)
            .unwrap()
    }

    fn days_back() -> i64 {
        GeneratorConfig::builtin().unwrap().date_range.days_back
    }

    #[test]
    fn test_generated_record_passes() {
        sample(MediaKind::Image).check_invariants(now(), days_back()).unwrap();
        sample(MediaKind::Video).check_invariants(now(), days_back()).unwrap();
    }

    #[test]
    fn test_image_with_video_fields_rejected() {
        let mut record = sample(MediaKind::Image);
        record.file.details = FileDetails::Video {
            duration_s: 10.0,
            fps: 30,
            codec: "h264".to_string(),
            bitrate_kbps: 4_000,
        };
        let err = record.check_invariants(now(), days_back()).unwrap_err();
        assert!(matches!(err, GeneratorError::GenerationInvariant(_)));
    }

    #[test]
    fn test_capture_outside_window_rejected() {
        let mut record = sample(MediaKind::Image);
        record.media.capture_timestamp = now() + Duration::minutes(1);
        record.timestamp = record.media.capture_timestamp;
        assert!(record.check_invariants(now(), days_back()).is_err());
    }

    #[test]
    fn test_unrepresentable_window_is_violation_not_panic() {
        let record = sample(MediaKind::Image);
        assert!(matches!(
            record.check_invariants(now(), i64::MAX),
            Err(GeneratorError::GenerationInvariant(_))
        ));
    }

    #[test]
    fn test_enrichment_link_combinations() {
        let record = sample(MediaKind::Image);
        let detection = record.process(ProcessType::ObjectDetection).unwrap().clone();
        let mut failed = detection.clone();
        failed.status = ProcessStatus::Failed;

        assert!(check_enrichment_link("m", "weather", None, EnrichmentState::Pending, None).is_ok());
        assert!(check_enrichment_link("m", "weather", None, EnrichmentState::Failed, Some(true)).is_err());
        assert!(check_enrichment_link("m", "weather", Some(&failed), EnrichmentState::Completed, Some(true)).is_err());
        assert!(check_enrichment_link("m", "weather", Some(&failed), EnrichmentState::Failed, Some(false)).is_err());
        assert!(check_enrichment_link("m", "weather", Some(&failed), EnrichmentState::Failed, Some(true)).is_ok());
        assert!(check_enrichment_link("m", "weather", Some(&detection), EnrichmentState::Pending, None).is_err());
    }

    #[test]
    fn test_status_mismatch_on_record_rejected() {
        let mut record = sample(MediaKind::Image);
        record.system.enrichment_status.detection = EnrichmentState::Pending;
        assert!(record.check_invariants(now(), days_back()).is_err());
    }
}
