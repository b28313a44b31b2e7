//! Composes one complete media record for a device.

use crate::config::{EnrichmentConfig, GeneratorConfig, SeasonBias};
use crate::detection::{
    push_unique, Attributes, Detection, DetectionSynthesizer, FrameContext, DETECTOR_MODEL, DETECTOR_VERSION,
};
use crate::error::{GeneratorError, Result};
use crate::identity::IdentityRegistry;
use crate::random::{hex_id, pick, round_to, weighted_pick, SimRng};
use crate::record::{
    Access, AstronomicalBlock, DeviceSettings, DeviceSnapshot, DeviceStatus, EmailSource, EnrichmentProcess,
    EnrichmentState, EnrichmentStatus, FileDetails, FileInfo, Ingestion, Location, MediaInfo, MediaKind, MediaRecord,
    OutputSummary, ProcessStatus, ProcessType, ProcessingStatus, PropertyInfo, RelatedMedia, Storage, SystemInfo,
    Tags, Trigger, UserMetadata, WeatherBlock,
};
use crate::schema::SchemaChecker;
use crate::sky::{self, AstronomicalState};
use crate::topology::DeviceRef;
use crate::weather::{self, WeatherState};
use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

const SECONDS_PER_DAY: i64 = 86_400;

const RESOLUTIONS: &[(&str, u32, u32)] = &[("720p", 1280, 720), ("1080p", 1920, 1080), ("4K", 3840, 2160)];

/// Store-and-forward delay buckets in milliseconds: (range, weight).
const UPLOAD_DELAYS: &[((i64, i64), f64)] = &[
    ((5_000, 300_000), 0.80),
    ((300_000, 10_800_000), 0.15),
    ((10_800_000, 172_800_000), 0.05),
];

const INGESTION_METHODS: &[(&str, f64)] = &[("email", 0.55), ("ftp", 0.20), ("api", 0.20), ("manual", 0.05)];

const QUALITY_TAGS: &[&str] = &["good-shot", "blurry", "clear-view", "partial-view", "keep", "review", "share"];

const LOCATION_TAGS: &[&str] = &["food-plot", "water-hole", "main-trail", "fence-line", "north-pasture", "creek-crossing"];

/// A planned enrichment step before it is rendered into a process entry.
#[derive(Debug, Clone, Copy)]
struct PlannedProcess {
    process_type: ProcessType,
    status: ProcessStatus,
    started: DateTime<Utc>,
    completed: DateTime<Utc>,
    duration_ms: i64,
}

impl PlannedProcess {
    fn failed(&self) -> bool {
        self.status == ProcessStatus::Failed
    }
}

/// Builds media records against a fixed reference time.
#[derive(Debug, Clone)]
pub struct MediaRecordBuilder {
    now: DateTime<Utc>,
    days_back: i64,
    video_probability: f64,
    enrichment: EnrichmentConfig,
    weather_bias: SeasonBias,
    detection: DetectionSynthesizer,
    schema: Option<Arc<SchemaChecker>>,
}

impl MediaRecordBuilder {
    /// `now` is the run's reference time; every capture falls in
    /// `[now - days_back, now]`.
    pub fn new(config: &GeneratorConfig, registry: Arc<IdentityRegistry>, now: DateTime<Utc>) -> Result<Self> {
        let schema = if config.generation.strict_validation {
            Some(Arc::new(SchemaChecker::new()?))
        } else {
            None
        };

        Ok(Self {
            now,
            days_back: config.date_range.days_back,
            video_probability: config.generation.video_probability,
            enrichment: config.enrichment.clone(),
            weather_bias: config.weather.clone(),
            detection: DetectionSynthesizer::new(&config.detection, registry)?,
            schema,
        })
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn days_back(&self) -> i64 {
        self.days_back
    }

    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        self.detection.registry()
    }

    pub fn build(&self, target: DeviceRef<'_>, sequence_index: u64, rng: &mut SimRng) -> Result<MediaRecord> {
        let DeviceRef {
            tenant,
            property,
            device,
        } = target;
        let timezone = property.timezone;

        let media_id = format!("media-{:07}-{}", sequence_index, hex_id(rng, 6));
        let capture = self.capture_timestamp(rng)?;
        let upload = self.upload_timestamp(capture, rng)?;

        let kind = if rng.gen_bool(self.video_probability) {
            MediaKind::Video
        } else {
            MediaKind::Image
        };
        let (resolution, width, height) = pick(rng, RESOLUTIONS);
        let file = file_info(kind, width, height, rng);
        let extension = file.format.clone();
        let media_name = format!("{}_{:07}.{}", capture.format("%Y%m%d%H%M%S"), sequence_index, extension);

        // Astronomy is deterministic; the detection scene always uses it even
        // when the astronomical enrichment did not run.
        let astronomy = sky::astronomy(capture, device.location);
        let plan = self.plan_enrichment(upload, rng);
        let planned = |process_type: ProcessType| plan.iter().find(|p| p.process_type == process_type).copied();

        let weather_block = planned(ProcessType::Weather).map(|p| WeatherBlock {
            state: weather::weather(capture, device.location, &self.weather_bias, rng),
            placeholder: p.failed(),
        });
        let astronomical_block = planned(ProcessType::Astronomical).map(|p| AstronomicalBlock {
            state: astronomy.clone(),
            placeholder: p.failed(),
        });

        let detection_process = planned(ProcessType::ObjectDetection).ok_or_else(|| {
            GeneratorError::invariant(format!("{media_id}: detection enrichment was not planned"))
        })?;
        let frame = FrameContext {
            tenant_id: &tenant.id,
            media_id: &media_id,
            capture,
            is_video: kind == MediaKind::Video,
            width,
            height,
            duration_ms: match &file.details {
                FileDetails::Video { duration_s, .. } => Some((duration_s * 1000.0).round() as u64),
                FileDetails::Image { .. } => None,
            },
            sun_position: astronomy.sun.position,
            processed_at: detection_process.completed,
        };
        let detection = if detection_process.failed() {
            self.detection.placeholder(&frame, rng)
        } else {
            self.detection.synthesize(&frame, rng)?
        };

        let enrichment_processes: Vec<EnrichmentProcess> =
            plan.iter().map(|p| enrichment_process(p, &detection, rng)).collect();
        let state_of = |process_type: ProcessType| {
            planned(process_type).map_or(EnrichmentState::Pending, |p| p.status.into())
        };
        let enrichment_status = EnrichmentStatus {
            weather: state_of(ProcessType::Weather),
            astronomical: state_of(ProcessType::Astronomical),
            detection: state_of(ProcessType::ObjectDetection),
        };
        let all_completed = [
            enrichment_status.weather,
            enrichment_status.astronomical,
            enrichment_status.detection,
        ]
        .iter()
        .all(|s| *s == EnrichmentState::Completed);
        let updated = plan.last().map_or(upload, |p| p.completed);

        let trigger = trigger(rng);
        let ingestion = ingestion(target, capture, upload, timezone, rng)?;
        let related = if kind == MediaKind::Video && rng.gen_bool(0.8) {
            vec![RelatedMedia {
                media_id: format!("{media_id}-frame"),
                media_type: MediaKind::Image,
                relationship: "frame-of".to_string(),
                capture_timestamp: capture,
            }]
        } else {
            Vec::new()
        };

        let weather_state = weather_block.as_ref().filter(|w| !w.placeholder).map(|w| &w.state);
        let astronomical_state = astronomical_block.as_ref().filter(|a| !a.placeholder).map(|a| &a.state);
        let tags = Tags {
            system: system_tags(kind, capture, &trigger, &detection, weather_state, astronomical_state),
            user: user_tags(&detection, rng),
            ai: ai_tags(&detection),
        };

        let serial_number = device
            .serial_number
            .clone()
            .unwrap_or_else(|| format!("SN{}", rng.gen_range(10_000..=99_999)));
        // Housing runs a few degrees above ambient
        let temperature_f = match &weather_block {
            Some(w) => w.state.temperature.round() as i32 + rng.gen_range(0..=8),
            None => rng.gen_range(35..=95),
        };

        let record = MediaRecord {
            timestamp: capture,
            tenant_id: tenant.id.clone(),
            property: PropertyInfo {
                id: property.id.clone(),
                name: property.name.clone(),
                timezone: timezone.name().to_string(),
            },
            media: MediaInfo {
                id: media_id.clone(),
                name: media_name.clone(),
                title: title(&detection, &device.name),
                description: description(&detection, &device.name, capture, timezone),
                kind,
                capture_timestamp: capture,
                capture_timestamp_local: local_time(capture, timezone),
                upload_timestamp: upload,
                upload_timestamp_local: local_time(upload, timezone),
                upload_delay_ms: (upload - capture).num_milliseconds(),
                status: "processed".to_string(),
            },
            storage: storage(target, capture, &media_name, &extension, rng),
            file,
            location: Location {
                coordinates: [device.location.lon, device.location.lat],
                accuracy: pick(rng, &["high", "medium"]).to_string(),
                source: "device".to_string(),
                boundary_id: device.boundary_id.clone(),
            },
            device: DeviceSnapshot {
                id: device.id.clone(),
                name: device.name.clone(),
                make: device.make.clone(),
                model: device.model.clone(),
                serial_number,
                status: DeviceStatus {
                    battery_level: rng.gen_range(15..=100),
                    signal_strength: pick(rng, &["excellent", "good", "fair", "poor"]).to_string(),
                    temperature_f,
                    storage_remaining_gb: rng.gen_range(1..=32),
                },
                settings: DeviceSettings {
                    mode: if trigger.trigger_type == "motion" { "motion" } else { "time-lapse" }.to_string(),
                    sensitivity: pick(rng, &["low", "medium", "high"]).to_string(),
                    resolution: resolution.to_string(),
                },
            },
            trigger,
            ingestion,
            related,
            weather: weather_block,
            astronomical: astronomical_block,
            user_metadata: user_metadata(&detection, upload, self.now, rng),
            detection,
            enrichment_processes,
            tags,
            access: access(rng)?,
            system: SystemInfo {
                created_timestamp: upload,
                created_by: "ingestion-service".to_string(),
                updated_timestamp: updated,
                updated_by: "enrichment-service".to_string(),
                version: 1,
                processing_status: if all_completed {
                    ProcessingStatus::Complete
                } else {
                    ProcessingStatus::Partial
                },
                enrichment_status,
            },
        };

        if let Some(schema) = &self.schema {
            record.check_invariants(self.now, self.days_back)?;
            schema.check(&record)?;
        }
        Ok(record)
    }

    fn capture_timestamp(&self, rng: &mut SimRng) -> Result<DateTime<Utc>> {
        let window_secs = self
            .days_back
            .checked_mul(SECONDS_PER_DAY)
            .ok_or_else(|| GeneratorError::invariant(format!("days_back {} overflows the window", self.days_back)))?;
        let offset = Duration::try_seconds(rng.gen_range(0..=window_secs))
            .ok_or_else(|| GeneratorError::invariant(format!("days_back {} overflows the window", self.days_back)))?;
        self.now.checked_sub_signed(offset).ok_or_else(|| {
            GeneratorError::invariant(format!("days_back {} reaches before the supported calendar", self.days_back))
        })
    }

    fn upload_timestamp(&self, capture: DateTime<Utc>, rng: &mut SimRng) -> Result<DateTime<Utc>> {
        let (low, high) = weighted_pick(rng, UPLOAD_DELAYS)?;
        let delay = Duration::milliseconds(rng.gen_range(low..=high));
        Ok((capture + delay).min(self.now))
    }

    /// Weather and astronomy each ran with `run_probability`; detection
    /// always runs last. Steps are sequential, starting shortly after upload,
    /// so for uploads close to `now` they may finish after it (bounded by
    /// [`crate::record::MAX_ENRICHMENT_LAG_SECS`]).
    fn plan_enrichment(&self, upload: DateTime<Utc>, rng: &mut SimRng) -> Vec<PlannedProcess> {
        let failure = &self.enrichment.failure_probability;
        let steps = [
            (ProcessType::Weather, failure.weather, (500, 2_000)),
            (ProcessType::Astronomical, failure.astronomical, (300, 1_500)),
            (ProcessType::ObjectDetection, failure.detection, (1_200, 4_000)),
        ];

        let mut cursor = upload + Duration::seconds(rng.gen_range(10..=30));
        let mut plan = Vec::with_capacity(steps.len());
        for (process_type, failure_probability, (low, high)) in steps {
            let ran = process_type == ProcessType::ObjectDetection || rng.gen_bool(self.enrichment.run_probability);
            if !ran {
                continue;
            }
            if !plan.is_empty() {
                cursor += Duration::seconds(rng.gen_range(1..=5));
            }
            let duration_ms = rng.gen_range(low..=high);
            let started = cursor;
            cursor += Duration::milliseconds(duration_ms);
            let status = if rng.gen_bool(failure_probability) {
                ProcessStatus::Failed
            } else {
                ProcessStatus::Completed
            };
            plan.push(PlannedProcess {
                process_type,
                status,
                started,
                completed: cursor,
                duration_ms,
            });
        }
        plan
    }
}

/// Render `ts` in the property timezone as a fixed-offset timestamp.
fn local_time(ts: DateTime<Utc>, timezone: Tz) -> DateTime<FixedOffset> {
    let local = ts.with_timezone(&timezone);
    local.with_timezone(&local.offset().fix())
}

fn file_info(kind: MediaKind, width: u32, height: u32, rng: &mut SimRng) -> FileInfo {
    match kind {
        MediaKind::Image => {
            let format = pick(rng, &["jpg", "png"]);
            let pixels = u64::from(width) * u64::from(height);
            let bytes_per_pixel = if format == "png" { rng.gen_range(1.2..2.0) } else { rng.gen_range(0.25..0.6) };
            FileInfo {
                size_bytes: (pixels as f64 * bytes_per_pixel) as u64,
                mime_type: if format == "png" { "image/png" } else { "image/jpeg" }.to_string(),
                format: format.to_string(),
                details: FileDetails::Image {
                    width,
                    height,
                    megapixels: round_to(pixels as f64 / 1_000_000.0, 1),
                },
            }
        }
        MediaKind::Video => {
            let format = pick(rng, &["mp4", "mov"]);
            let duration_s = round_to(rng.gen_range(5.0..=30.0), 1);
            let bitrate_kbps: u32 = rng.gen_range(8_000..=16_000);
            FileInfo {
                size_bytes: (f64::from(bitrate_kbps) * 1000.0 / 8.0 * duration_s) as u64,
                mime_type: if format == "mov" { "video/quicktime" } else { "video/mp4" }.to_string(),
                format: format.to_string(),
                details: FileDetails::Video {
                    duration_s,
                    fps: pick(rng, &[15, 30]),
                    codec: pick(rng, &["h264", "h265"]).to_string(),
                    bitrate_kbps,
                },
            }
        }
    }
}

fn storage(target: DeviceRef<'_>, capture: DateTime<Utc>, name: &str, extension: &str, rng: &mut SimRng) -> Storage {
    let base = format!(
        "{}/{}/{}/{}",
        target.tenant.id,
        target.property.id,
        target.device.id,
        capture.format("%Y/%m/%d")
    );
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    Storage {
        original: format!("{base}/original/{name}"),
        thumbnail: format!("{base}/thumbnail/{stem}.jpg"),
        medium: format!("{base}/medium/{stem}.jpg"),
        processed: format!("{base}/processed/{stem}.{extension}"),
        url: format!(
            "https://media.camtrap.example/{base}/original/{name}?token={}",
            hex_id(rng, 32)
        ),
    }
}

fn trigger(rng: &mut SimRng) -> Trigger {
    let trigger_type = if rng.gen_bool(0.92) { "motion" } else { "scheduled" };
    Trigger {
        trigger_type: trigger_type.to_string(),
        confidence: round_to(rng.gen_range(0.7..=1.0), 2),
        zone: pick(rng, &["center", "left", "right", "full-frame"]).to_string(),
    }
}

fn ingestion(
    target: DeviceRef<'_>,
    capture: DateTime<Utc>,
    upload: DateTime<Utc>,
    timezone: Tz,
    rng: &mut SimRng,
) -> Result<Ingestion> {
    let method = weighted_pick(rng, INGESTION_METHODS)?;
    let email = (method == "email").then(|| {
        let sent = (upload - Duration::seconds(rng.gen_range(1..=10))).max(capture);
        EmailSource {
            from: format!("{}@cams.{}.example", target.device.id, target.tenant.id),
            message_id: format!(
                "<{}@mx.camtrap.example>",
                uuid::Uuid::from_u128(rng.gen::<u128>()).simple()
            ),
            subject: format!(
                "Motion Detected from {} at {}",
                target.device.name,
                capture.with_timezone(&timezone).format("%Y/%m/%d %H:%M:%S")
            ),
            sent_timestamp: sent,
            received_timestamp: upload,
            reception_delay_sec: (upload - sent).num_seconds(),
        }
    });

    Ok(Ingestion {
        method: method.to_string(),
        timestamp: upload,
        batch_id: format!("batch-{}-{}", upload.format("%Y%m%d"), hex_id(rng, 8)),
        uploaded_by: if method == "manual" { "user" } else { "system" }.to_string(),
        processing_time_ms: rng.gen_range(50..=2_500),
        email,
    })
}

fn enrichment_process(planned: &PlannedProcess, detection: &Detection, rng: &mut SimRng) -> EnrichmentProcess {
    let (prefix, service, version, model, priority, error) = match planned.process_type {
        ProcessType::Weather => ("weather", "weather-service", "1.2.3", None, "high", "API connection timeout"),
        ProcessType::Astronomical => (
            "astro",
            "ephemeris-service",
            "1.1.5",
            None,
            "medium",
            "Calculation error for moon position",
        ),
        ProcessType::ObjectDetection => (
            "detect",
            "wildlife-detection-service",
            DETECTOR_VERSION,
            Some(DETECTOR_MODEL),
            "high",
            "Model loading error",
        ),
    };
    let failed = planned.failed();
    let output_summary = (planned.process_type == ProcessType::ObjectDetection && !failed).then(|| OutputSummary {
        objects_detected: detection.summary.total_objects,
        primary_class: detection.summary.class_distribution.primary_class.clone(),
    });

    EnrichmentProcess {
        process_id: format!("{prefix}-{}", hex_id(rng, 8)),
        process_type: planned.process_type,
        status: planned.status,
        started_timestamp: planned.started,
        completed_timestamp: planned.completed,
        duration_ms: planned.duration_ms,
        service: service.to_string(),
        version: version.to_string(),
        model: model.map(str::to_string),
        priority: priority.to_string(),
        error: failed.then(|| error.to_string()),
        output_summary,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title(detection: &Detection, device_name: &str) -> String {
    match &detection.summary.class_distribution.primary_class {
        Some(class) => format!("{} at {}", capitalize(class), device_name),
        None => format!("Motion Detection at {device_name}"),
    }
}

fn description(detection: &Detection, device_name: &str, capture: DateTime<Utc>, timezone: Tz) -> String {
    let local = capture.with_timezone(&timezone).format("%Y-%m-%d %H:%M %Z");
    let counts = &detection.summary.class_distribution.class_counts;
    if counts.is_empty() {
        return format!("Motion trigger at {device_name} on {local}, no objects detected");
    }
    let seen: Vec<String> = counts.iter().map(|c| format!("{} {}", c.count, c.class)).collect();
    format!("Detected {} at {device_name} on {local}", seen.join(", "))
}

fn system_tags(
    kind: MediaKind,
    capture: DateTime<Utc>,
    trigger: &Trigger,
    detection: &Detection,
    weather: Option<&WeatherState>,
    astronomy: Option<&AstronomicalState>,
) -> Vec<String> {
    let mut tags = vec![kind.as_str().to_string()];
    push_unique(&mut tags, &trigger.trigger_type);

    if let Some(astronomy) = astronomy {
        push_unique(&mut tags, astronomy.sun.position.as_str());
        push_unique(&mut tags, astronomy.moon.phase.slug());
        if astronomy.feeding.major.iter().any(|w| w.contains(capture)) {
            push_unique(&mut tags, "major-feeding-window");
        }
    }
    if let Some(weather) = weather {
        push_unique(&mut tags, &format!("{}-weather", weather.conditions.main.to_lowercase()));
        if weather.temperature <= 32.0 {
            push_unique(&mut tags, "freezing");
        } else if weather.temperature >= 90.0 {
            push_unique(&mut tags, "hot");
        }
    }

    let summary = &detection.summary;
    if summary.empty_frame {
        push_unique(&mut tags, "empty");
    }
    if summary.contains_known_individuals {
        push_unique(&mut tags, "known-individual");
    }
    if summary.total_objects > 1 {
        push_unique(&mut tags, "multiple-objects");
    }
    if let Some(primary) = &summary.class_distribution.primary_class {
        push_unique(&mut tags, primary);
    }
    tags
}

/// Labels a person might have added: a location tag, then content and quality tags.
fn user_tags(detection: &Detection, rng: &mut SimRng) -> Vec<String> {
    if !rng.gen_bool(0.7) {
        return Vec::new();
    }
    let wanted = rng.gen_range(1..=4);
    let mut tags = vec![pick(rng, LOCATION_TAGS).to_string()];

    for class in &detection.summary.class_distribution.classes {
        if tags.len() < wanted && rng.gen_bool(0.6) {
            push_unique(&mut tags, class);
        }
    }
    for name in &detection.summary.named_individuals {
        if tags.len() < wanted {
            push_unique(&mut tags, &slug(name));
        }
    }

    let mut quality: Vec<&str> = QUALITY_TAGS.to_vec();
    quality.shuffle(rng);
    for tag in quality {
        if tags.len() >= wanted {
            break;
        }
        push_unique(&mut tags, tag);
    }
    tags
}

fn ai_tags(detection: &Detection) -> Vec<String> {
    let mut tags = Vec::new();
    for object in &detection.objects {
        push_unique(&mut tags, &object.class);
        if let Some(subclass) = &object.subclass {
            push_unique(&mut tags, subclass);
        }
        match &object.attributes {
            Attributes::Wildlife(a) => {
                if let Some(sex) = &a.sex {
                    push_unique(&mut tags, sex);
                }
                push_unique(&mut tags, &a.age);
                push_unique(&mut tags, &a.action);
                if let Some(points) = a.antler_points {
                    push_unique(&mut tags, &format!("{points}-point"));
                }
                if a.group_size.is_some_and(|n| n > 1) {
                    push_unique(&mut tags, "group");
                }
                if a.with_young == Some(true) {
                    push_unique(&mut tags, "with-young");
                }
            }
            Attributes::Person(p) => {
                push_unique(&mut tags, &p.activity);
                push_unique(&mut tags, &p.age_range);
            }
            Attributes::Vehicle(v) => {
                push_unique(&mut tags, &v.vehicle_type);
                push_unique(&mut tags, &slug(&v.make));
                if v.is_moving {
                    push_unique(&mut tags, "moving-vehicle");
                }
            }
            Attributes::Other(o) => {
                push_unique(&mut tags, &o.behavior);
                if o.is_domestic {
                    push_unique(&mut tags, "domestic");
                }
            }
        }
        if let Some(identification) = &object.identification {
            push_unique(&mut tags, &slug(&identification.name));
        }
    }

    if let Some(event) = &detection.event {
        push_unique(&mut tags, &event.event_type);
    }
    let scene = &detection.summary.scene_context;
    if !detection.summary.empty_frame {
        push_unique(&mut tags, &scene.habitat);
        for (flag, tag) in [
            (scene.is_feeding_area, "feeding-area"),
            (scene.is_water_source, "water-source"),
            (scene.is_trail, "trail"),
        ] {
            if flag {
                push_unique(&mut tags, tag);
            }
        }
    }
    tags
}

fn slug(value: &str) -> String {
    value.to_lowercase().replace(' ', "-")
}

fn user_metadata(detection: &Detection, upload: DateTime<Utc>, now: DateTime<Utc>, rng: &mut SimRng) -> UserMetadata {
    let summary = &detection.summary;
    let trophy = detection.objects.iter().any(|o| match &o.attributes {
        Attributes::Wildlife(a) => a.antler_points.is_some_and(|p| p >= 8),
        _ => false,
    });

    let mut rating: i32 = 3;
    if summary.contains_known_individuals {
        rating += 1;
    }
    if trophy {
        rating += 1;
    }
    if summary.empty_frame {
        rating -= 2;
    }
    if detection.placeholder {
        rating -= 1;
    }
    rating += rng.gen_range(-1..=1);
    let rating = rating.clamp(1, 5) as u8;

    let notes = if summary.contains_known_individuals && rng.gen_bool(0.6) {
        format!("{} is back", summary.named_individuals.join(" and "))
    } else if trophy && rng.gen_bool(0.7) {
        "Shooter buck, keep an eye on this one".to_string()
    } else if summary.contains_people && rng.gen_bool(0.5) {
        "Check who was on the property".to_string()
    } else if summary.contains_vehicles && rng.gen_bool(0.4) {
        "Vehicle on the road, confirm it was expected".to_string()
    } else if rng.gen_bool(0.15) {
        pick(rng, &["Nice shot", "Camera angle needs adjusting", "Moved feeder last week"]).to_string()
    } else {
        String::new()
    };

    let last_viewed_timestamp = if rng.gen_bool(0.5) && now > upload {
        let span = (now - upload).num_milliseconds();
        Some(upload + Duration::milliseconds(rng.gen_range(0..=span)))
    } else {
        None
    };

    UserMetadata {
        notes,
        rating,
        is_favorite: rating >= 5 && rng.gen_bool(0.5),
        is_hidden: rating <= 1 && rng.gen_bool(0.2),
        is_archived: rng.gen_bool(0.05),
        last_viewed_timestamp,
    }
}

fn access(rng: &mut SimRng) -> Result<Access> {
    let visibility = weighted_pick(rng, &[("private", 0.6), ("tenant", 0.3), ("shared", 0.1)])?;
    let shared_with = if visibility == "shared" {
        (0..rng.gen_range(1..=3)).map(|_| format!("user-{}", hex_id(rng, 6))).collect()
    } else {
        Vec::new()
    };
    Ok(Access {
        visibility: visibility.to_string(),
        shared_with,
    })
}
