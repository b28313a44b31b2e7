//! Object detection synthesis.
//!
//! A frame is either empty or holds one to four objects. Each object gets a
//! category from the configured distribution, a class from that category's
//! pool and attributes drawn only from that category's vocabulary. Trackable
//! wildlife may carry an identification sourced from the shared
//! [`IdentityRegistry`]. The summary is always recomputed from the objects.

use crate::catalog::{self, OtherClass, SpeciesProfile, VehicleKind, OTHER, SPECIES, VEHICLES};
use crate::config::DetectionConfig;
use crate::error::{GeneratorError, Result};
use crate::identity::{Identity, IdentityRegistry};
use crate::random::{distribution, hex_id, normal, pick, round_to, SimRng};
use crate::sky::SunPosition;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DETECTOR_MODEL: &str = "multi-detector-v3";
pub const DETECTOR_VERSION: &str = "3.2.1";
pub const CONFIDENCE_THRESHOLD: f64 = 0.65;

const OBJECT_COUNT_WEIGHTS: [f64; 4] = [0.55, 0.25, 0.12, 0.08];
const REPEAT_FIRST_CATEGORY: f64 = 0.6;
const SAME_SPECIES_IN_HERD: f64 = 0.7;
const EVENT_PROBABILITY: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Wildlife,
    Person,
    Vehicle,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Wildlife,
        Category::Person,
        Category::Vehicle,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Wildlife => "wildlife",
            Category::Person => "person",
            Category::Vehicle => "vehicle",
            Category::Other => "other",
        }
    }

    /// Attribute keys an object of this category may carry.
    pub fn attribute_vocabulary(&self) -> &'static [&'static str] {
        match self {
            Category::Wildlife => &[
                "sex",
                "age",
                "action",
                "color",
                "size",
                "antler_points",
                "antler_spread",
                "body_condition",
                "distinctive_features",
                "group_size",
                "with_young",
            ],
            Category::Person => &[
                "gender",
                "age_range",
                "activity",
                "posture",
                "height",
                "build",
                "clothing",
                "accessories",
                "carrying",
            ],
            Category::Vehicle => &[
                "vehicle_type",
                "make",
                "model",
                "paint_color",
                "year_range",
                "wheels",
                "doors",
                "is_moving",
                "lights_on",
                "license_plate",
                "plate_state",
                "distinctive_marks",
                "occupants",
                "direction_of_travel",
            ],
            Category::Other => &["behavior", "is_domestic", "approx_length_cm"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visibility {
    pub position: String,
    pub occlusion: f64,
    pub blur: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Taxonomy {
    pub kingdom: String,
    pub phylum: String,
    pub class: String,
    pub order: String,
    pub family: String,
    pub genus: String,
    pub species: String,
}

impl Taxonomy {
    fn from_ranks(ranks: &[&str; 7]) -> Self {
        Self {
            kingdom: ranks[0].to_string(),
            phylum: ranks[1].to_string(),
            class: ranks[2].to_string(),
            order: ranks[3].to_string(),
            family: ranks[4].to_string(),
            genus: ranks[5].to_string(),
            species: ranks[6].to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WildlifeAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<String>,
    pub age: String,
    pub action: String,
    pub color: String,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub antler_points: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub antler_spread: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinctive_features: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_size: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_young: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clothing {
    pub upper_body: String,
    pub lower_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headwear: Option<String>,
    pub colors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    pub age_range: String,
    pub activity: String,
    pub posture: String,
    pub height: String,
    pub build: String,
    pub clothing: Clothing,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessories: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrying: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleAttributes {
    pub vehicle_type: String,
    pub make: String,
    pub model: String,
    pub paint_color: String,
    pub year_range: String,
    pub wheels: u8,
    pub doors: u8,
    pub is_moving: bool,
    pub lights_on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plate_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinctive_marks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupants: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction_of_travel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OtherAttributes {
    pub behavior: String,
    pub is_domestic: bool,
    pub approx_length_cm: u32,
}

/// Category-specific attributes. Serialized without a tag; the owning
/// object's `category` identifies the variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Attributes {
    Wildlife(WildlifeAttributes),
    Person(PersonAttributes),
    Vehicle(VehicleAttributes),
    Other(OtherAttributes),
}

impl Attributes {
    pub fn category(&self) -> Category {
        match self {
            Attributes::Wildlife(_) => Category::Wildlife,
            Attributes::Person(_) => Category::Person,
            Attributes::Vehicle(_) => Category::Vehicle,
            Attributes::Other(_) => Category::Other,
        }
    }

    /// Keys present once serialized.
    pub fn keys(&self) -> Vec<String> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identification {
    pub id: String,
    pub name: String,
    pub confidence: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub historical_matches: u32,
    pub match_media_ids: Vec<String>,
}

impl Identification {
    fn from_identity(identity: &Identity, observed_at: DateTime<Utc>, rng: &mut SimRng) -> Self {
        // Confidence climbs toward the high 0.9s as the individual is matched more often.
        let trend = 0.70 + 0.26 * (1.0 - (-(identity.historical_matches as f64) / 6.0).exp());
        let confidence = (trend + normal(rng, 0.0, 0.015)).clamp(0.5, 0.99);
        Self {
            id: identity.id.clone(),
            name: identity.name.clone(),
            confidence: round_to(confidence, 2),
            first_seen: identity.first_seen.unwrap_or(observed_at),
            last_seen: identity.last_seen.unwrap_or(observed_at),
            historical_matches: identity.historical_matches,
            match_media_ids: identity.match_media_ids.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Motion {
    pub direction: String,
    pub speed: f64,
    pub is_stationary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tracking {
    pub tracking_id: String,
    pub appearance_timestamp: DateTime<Utc>,
    pub disappearance_timestamp: DateTime<Utc>,
    pub duration_ms: i64,
    pub motion: Motion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedObject {
    pub detection_id: String,
    pub category: Category,
    pub class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subclass: Option<String>,
    pub confidence: f64,
    pub count: u32,
    pub bounding_box: BoundingBox,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<Taxonomy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<Identification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<Tracking>,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectCounts {
    pub wildlife: u32,
    pub people: u32,
    pub vehicles: u32,
    pub other: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCount {
    pub class: String,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassDistribution {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_confidence: Option<f64>,
    pub classes: Vec<String>,
    pub subclasses: Vec<String>,
    pub class_counts: Vec<ClassCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predominant_direction: Option<String>,
    pub activity_level: String,
    pub entry_points: Vec<String>,
    pub exit_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneContext {
    pub time_of_day: SunPosition,
    pub lighting_conditions: String,
    pub terrain: String,
    pub habitat: String,
    pub is_feeding_area: bool,
    pub is_water_source: bool,
    pub is_trail: bool,
    pub is_road: bool,
    pub is_boundary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub total_objects: u32,
    pub empty_frame: bool,
    pub contains_wildlife: bool,
    pub contains_people: bool,
    pub contains_vehicles: bool,
    pub contains_other: bool,
    pub contains_known_individuals: bool,
    pub named_individuals: Vec<String>,
    pub object_counts: ObjectCounts,
    pub class_distribution: ClassDistribution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion_summary: Option<MotionSummary>,
    pub scene_context: SceneContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub confidence: f64,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub duration_ms: i64,
    pub primary_objects: Vec<String>,
    pub secondary_objects: Vec<String>,
    pub description: String,
    pub significance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Processing {
    pub model: String,
    pub version: String,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub confidence_threshold: f64,
    pub models_used: Vec<String>,
    pub is_reprocessed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub objects: Vec<DetectedObject>,
    pub summary: DetectionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
    pub processing: Processing,
    /// Set when the detection process failed and this block is a stand-in.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

/// Per-frame inputs to detection synthesis.
#[derive(Debug, Clone)]
pub struct FrameContext<'a> {
    pub tenant_id: &'a str,
    pub media_id: &'a str,
    pub capture: DateTime<Utc>,
    pub is_video: bool,
    pub width: u32,
    pub height: u32,
    /// Clip length; videos only.
    pub duration_ms: Option<u64>,
    pub sun_position: SunPosition,
    /// When the detection enrichment completed.
    pub processed_at: DateTime<Utc>,
}

pub(crate) fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

/// Mode of a list of labels; ties go to the lexicographically smallest.
fn mode<'a>(labels: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let best = counts.values().copied().max()?;
    counts
        .into_iter()
        .find(|(_, count)| *count == best)
        .map(|(label, _)| label.to_string())
}

/// Derive the detection summary from the objects. Deterministic except for
/// the scene context, which is passed through.
pub fn summarize(objects: &[DetectedObject], is_video: bool, scene_context: SceneContext) -> DetectionSummary {
    let mut counts = ObjectCounts::default();
    let mut named_individuals = Vec::new();
    let mut class_counts: BTreeMap<&str, u32> = BTreeMap::new();
    let mut class_scores: BTreeMap<&str, f64> = BTreeMap::new();
    let mut subclasses: Vec<String> = Vec::new();

    for object in objects {
        match object.category {
            Category::Wildlife => counts.wildlife += 1,
            Category::Person => counts.people += 1,
            Category::Vehicle => counts.vehicles += 1,
            Category::Other => counts.other += 1,
        }
        if let Some(identification) = &object.identification {
            push_unique(&mut named_individuals, &identification.name);
        }
        *class_counts.entry(object.class.as_str()).or_default() += object.count;
        *class_scores.entry(object.class.as_str()).or_default() += object.confidence * object.count as f64;
        if let Some(subclass) = &object.subclass {
            push_unique(&mut subclasses, subclass);
        }
    }
    subclasses.sort();

    // Highest confidence-weighted count; BTreeMap order breaks ties by name.
    let primary_class = class_scores
        .iter()
        .fold(None::<(&str, f64)>, |best, (class, score)| match best {
            Some((_, best_score)) if best_score >= *score => best,
            _ => Some((*class, *score)),
        })
        .map(|(class, _)| class.to_string());
    let primary_confidence = primary_class.as_ref().and_then(|primary| {
        objects
            .iter()
            .filter(|o| &o.class == primary)
            .map(|o| o.confidence)
            .fold(None, |best: Option<f64>, c| Some(best.map_or(c, |b| b.max(c))))
    });

    let motion_summary = if is_video && !objects.is_empty() {
        let directions: Vec<&str> = objects
            .iter()
            .filter_map(|o| o.tracking.as_ref())
            .map(|t| t.motion.direction.as_str())
            .collect();
        let mut entry_points = Vec::new();
        let mut exit_points = Vec::new();
        for direction in &directions {
            match *direction {
                "towards" => push_unique(&mut entry_points, "front"),
                "away" => push_unique(&mut exit_points, "back"),
                "left" => {
                    push_unique(&mut entry_points, "right");
                    push_unique(&mut exit_points, "left");
                }
                "right" => {
                    push_unique(&mut entry_points, "left");
                    push_unique(&mut exit_points, "right");
                }
                _ => {}
            }
        }
        let activity_level = match objects.len() {
            0 => "none",
            1 => "low",
            2 => "medium",
            _ => "high",
        };
        Some(MotionSummary {
            predominant_direction: mode(directions.iter().copied()),
            activity_level: activity_level.to_string(),
            entry_points,
            exit_points,
        })
    } else {
        None
    };

    DetectionSummary {
        total_objects: objects.len() as u32,
        empty_frame: objects.is_empty(),
        contains_wildlife: counts.wildlife > 0,
        contains_people: counts.people > 0,
        contains_vehicles: counts.vehicles > 0,
        contains_other: counts.other > 0,
        contains_known_individuals: !named_individuals.is_empty(),
        named_individuals,
        object_counts: counts,
        class_distribution: ClassDistribution {
            primary_class,
            primary_confidence,
            classes: class_counts.keys().map(|c| c.to_string()).collect(),
            subclasses,
            class_counts: class_counts
                .iter()
                .map(|(class, count)| ClassCount {
                    class: class.to_string(),
                    count: *count,
                })
                .collect(),
        },
        motion_summary,
        scene_context,
    }
}

impl Detection {
    /// Check the block's internal consistency rules.
    pub fn check_consistency(&self, is_video: bool) -> Result<()> {
        let expected = summarize(&self.objects, is_video, self.summary.scene_context.clone());
        if expected != self.summary {
            return Err(GeneratorError::invariant(
                "detection summary does not match its objects",
            ));
        }

        for object in &self.objects {
            if object.attributes.category() != object.category {
                return Err(GeneratorError::invariant(format!(
                    "object {} is {} but carries {} attributes",
                    object.detection_id,
                    object.category.as_str(),
                    object.attributes.category().as_str()
                )));
            }
            let vocabulary = object.category.attribute_vocabulary();
            if let Some(key) = object
                .attributes
                .keys()
                .into_iter()
                .find(|k| !vocabulary.contains(&k.as_str()))
            {
                return Err(GeneratorError::invariant(format!(
                    "attribute {key} is not part of the {} vocabulary",
                    object.category.as_str()
                )));
            }
            if !(0.0..=1.0).contains(&object.confidence) {
                return Err(GeneratorError::invariant(format!(
                    "object {} confidence {} out of range",
                    object.detection_id, object.confidence
                )));
            }
            if object.tracking.is_some() && !is_video {
                return Err(GeneratorError::invariant("tracking on a still image"));
            }
        }
        Ok(())
    }
}

/// Synthesizes the detection block of a record.
#[derive(Debug, Clone)]
pub struct DetectionSynthesizer {
    config: DetectionConfig,
    object_counts: WeightedIndex<f64>,
    categories: WeightedIndex<f64>,
    species: WeightedIndex<f64>,
    others: WeightedIndex<f64>,
    registry: Arc<IdentityRegistry>,
}

impl DetectionSynthesizer {
    /// Fails when the category weights are negative or sum to zero.
    pub fn new(config: &DetectionConfig, registry: Arc<IdentityRegistry>) -> Result<Self> {
        config.category_weights.validate()?;
        Ok(Self {
            config: config.clone(),
            object_counts: distribution("object count", OBJECT_COUNT_WEIGHTS)?,
            categories: distribution("category", config.category_weights.as_array())?,
            species: distribution("species", SPECIES.iter().map(|s| s.abundance))?,
            others: distribution("other class", OTHER.iter().map(|o| o.abundance))?,
            registry,
        })
    }

    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        &self.registry
    }

    pub fn synthesize(&self, ctx: &FrameContext<'_>, rng: &mut SimRng) -> Result<Detection> {
        let scene_context = scene_context(ctx.sun_position, rng);

        if rng.gen_bool(self.config.empty_probability) {
            let summary = summarize(&[], ctx.is_video, scene_context);
            return Ok(Detection {
                objects: Vec::new(),
                summary,
                event: None,
                processing: processing(ctx, 0, &[], false, rng),
                placeholder: false,
            });
        }

        let object_count = self.object_counts.sample(rng) + 1;
        let mut objects: Vec<DetectedObject> = Vec::with_capacity(object_count);
        let mut in_frame: Vec<String> = Vec::new();
        let mut first: Option<(Category, Option<&'static SpeciesProfile>)> = None;

        for _ in 0..object_count {
            let category = match first {
                Some((category, _)) if rng.gen_bool(REPEAT_FIRST_CATEGORY) => category,
                _ => Category::ALL[self.categories.sample(rng)],
            };

            let object = match category {
                Category::Wildlife => {
                    let profile = match first {
                        Some((_, Some(herd))) if herd.herd_animal && rng.gen_bool(SAME_SPECIES_IN_HERD) => herd,
                        _ => &SPECIES[self.species.sample(rng)],
                    };
                    if first.is_none() {
                        first = Some((category, Some(profile)));
                    }
                    self.wildlife_object(ctx, profile, &mut in_frame, rng)?
                }
                Category::Person => person_object(ctx, rng),
                Category::Vehicle => {
                    let kind = VEHICLES
                        .choose(rng)
                        .ok_or_else(|| GeneratorError::invariant("vehicle catalog is empty"))?;
                    vehicle_object(ctx, kind, rng)
                }
                Category::Other => {
                    let class = &OTHER[self.others.sample(rng)];
                    other_object(ctx, class, rng)
                }
            };
            if first.is_none() {
                first = Some((category, None));
            }
            objects.push(object);
        }

        let summary = summarize(&objects, ctx.is_video, scene_context);
        let event = if ctx.is_video && rng.gen_bool(EVENT_PROBABILITY) {
            Some(event(ctx, &objects, rng))
        } else {
            None
        };
        let reidentified = objects.iter().any(|o| o.identification.is_some());
        let categories: Vec<Category> = objects.iter().map(|o| o.category).collect();

        Ok(Detection {
            processing: processing(ctx, objects.len(), &categories, reidentified, rng),
            objects,
            summary,
            event,
            placeholder: false,
        })
    }

    /// Stand-in block for a failed detection process. Never touches the registry.
    pub fn placeholder(&self, ctx: &FrameContext<'_>, rng: &mut SimRng) -> Detection {
        let summary = summarize(&[], ctx.is_video, scene_context(ctx.sun_position, rng));
        Detection {
            objects: Vec::new(),
            summary,
            event: None,
            processing: processing(ctx, 0, &[], false, rng),
            placeholder: true,
        }
    }

    fn wildlife_object(
        &self,
        ctx: &FrameContext<'_>,
        profile: &'static SpeciesProfile,
        in_frame: &mut Vec<String>,
        rng: &mut SimRng,
    ) -> Result<DetectedObject> {
        let bounding_box = bounding_box(ctx, (0.15, 0.3), (0.15, 0.4), rng);

        let mut sex = if profile.sex_often_unknown && rng.gen_bool(0.3) {
            None
        } else {
            Some(pick(rng, profile.sexes).to_string())
        };

        let mut identification = None;
        if profile.trackable && sex.is_some() && rng.gen_bool(self.config.identification_probability) {
            let identity = self.registry.observe(
                ctx.tenant_id,
                profile.key,
                profile.name_pools,
                ctx.capture,
                ctx.media_id,
                self.config.recurrence_probability,
                in_frame,
                rng,
            )?;
            in_frame.push(identity.id.clone());
            sex = Some(identity.sex.clone());
            identification = Some(Identification::from_identity(&identity, ctx.capture, rng));
        }

        let age = pick(rng, profile.ages).to_string();
        let mut attributes = WildlifeAttributes {
            sex: sex.clone(),
            action: pick(rng, profile.actions).to_string(),
            color: pick(rng, profile.colors).to_string(),
            size: pick(rng, profile.sizes).to_string(),
            antler_points: None,
            antler_spread: None,
            body_condition: None,
            distinctive_features: None,
            group_size: None,
            with_young: None,
            age,
        };

        if profile.carries_antlers(sex.as_deref(), &attributes.age) {
            attributes.antler_points = Some(rng.gen_range(6..=12));
            attributes.antler_spread = Some(round_to(rng.gen_range(15.0..22.0), 1));
            attributes.body_condition = Some(pick(rng, catalog::BODY_CONDITIONS).to_string());
            if rng.gen_bool(0.3) {
                attributes.distinctive_features = Some(pick(rng, catalog::ANTLER_FEATURES).to_string());
            }
        }
        if profile.herd_animal && rng.gen_bool(0.4) {
            attributes.group_size = Some(rng.gen_range(2..=8));
            let female = profile.sexes.get(1).copied();
            if sex.as_deref() == female && rng.gen_bool(0.6) {
                attributes.with_young = Some(true);
            }
        }

        let tracking = tracking(ctx, Category::Wildlife, None, rng);
        Ok(DetectedObject {
            detection_id: format!("det-{}", hex_id(rng, 8)),
            category: Category::Wildlife,
            class: profile.class.to_string(),
            subclass: profile.subclass.map(str::to_string),
            confidence: confidence(rng),
            count: 1,
            visibility: visibility(ctx, &bounding_box, rng),
            bounding_box,
            taxonomy: Some(Taxonomy::from_ranks(&profile.taxonomy)),
            identification,
            tracking,
            attributes: Attributes::Wildlife(attributes),
        })
    }
}

fn confidence(rng: &mut SimRng) -> f64 {
    let skew = rng.gen::<f64>().max(rng.gen::<f64>());
    round_to(0.6 + 0.39 * skew, 2)
}

fn bounding_box(ctx: &FrameContext<'_>, width_frac: (f64, f64), height_frac: (f64, f64), rng: &mut SimRng) -> BoundingBox {
    let width = ((ctx.width as f64) * rng.gen_range(width_frac.0..width_frac.1)) as u32;
    let height = ((ctx.height as f64) * rng.gen_range(height_frac.0..height_frac.1)) as u32;
    let x = (rng.gen_range(0.1..0.9) * ctx.width.saturating_sub(width) as f64) as u32;
    let y = (rng.gen_range(0.1..0.9) * ctx.height.saturating_sub(height) as f64) as u32;
    BoundingBox { x, y, width, height }
}

/// Position is derived from where the box sits in the frame.
fn visibility(ctx: &FrameContext<'_>, bbox: &BoundingBox, rng: &mut SimRng) -> Visibility {
    let frame_area = (ctx.width as f64 * ctx.height as f64).max(1.0);
    let coverage = (bbox.width as f64 * bbox.height as f64) / frame_area;
    let center = (bbox.x as f64 + bbox.width as f64 / 2.0) / (ctx.width as f64).max(1.0);

    let position = if coverage < 0.03 {
        "background"
    } else if coverage > 0.2 {
        "foreground"
    } else if center < 0.33 {
        "left"
    } else if center > 0.66 {
        "right"
    } else {
        "center"
    };

    let occlusion = if rng.gen_bool(0.3) { round_to(rng.gen_range(0.0..0.4), 2) } else { 0.0 };
    let blur = if rng.gen_bool(0.2) { round_to(rng.gen_range(0.0..0.3), 2) } else { 0.0 };
    Visibility {
        position: position.to_string(),
        occlusion,
        blur,
    }
}

const DIRECTIONS: &[&str] = &["left", "right", "stationary", "towards", "away"];

/// Videos only. `moving` pins vehicles to their `is_moving` attribute.
fn tracking(ctx: &FrameContext<'_>, category: Category, moving: Option<bool>, rng: &mut SimRng) -> Option<Tracking> {
    if !ctx.is_video {
        return None;
    }
    let clip_ms = ctx.duration_ms.unwrap_or(10_000).max(2_000) as i64;
    let appear_offset = rng.gen_range(0..clip_ms / 2);
    let visible_ms = rng.gen_range(1_000..=(clip_ms - appear_offset).max(1_000));
    let appearance_timestamp = ctx.capture + Duration::milliseconds(appear_offset);
    let disappearance_timestamp = appearance_timestamp + Duration::milliseconds(visible_ms);

    let direction = match moving {
        Some(false) => "stationary",
        Some(true) => pick(rng, &DIRECTIONS[..2]),
        None => pick(rng, DIRECTIONS),
    };
    let is_stationary = direction == "stationary";
    let top_speed = match category {
        Category::Wildlife => 5.0,
        Category::Person => 3.0,
        Category::Vehicle => 15.0,
        Category::Other => 4.0,
    };
    let speed = if is_stationary { 0.0 } else { round_to(rng.gen_range(0.3..top_speed), 2) };

    Some(Tracking {
        tracking_id: format!("track-{}", hex_id(rng, 6)),
        appearance_timestamp,
        disappearance_timestamp,
        duration_ms: visible_ms,
        motion: Motion {
            direction: direction.to_string(),
            speed,
            is_stationary,
        },
    })
}

fn maybe(rng: &mut SimRng, probability: f64, pool: &[&str]) -> Option<String> {
    if rng.gen_bool(probability) {
        Some(pick(rng, pool).to_string())
    } else {
        None
    }
}

fn person_object(ctx: &FrameContext<'_>, rng: &mut SimRng) -> DetectedObject {
    use catalog::person;

    let bounding_box = bounding_box(ctx, (0.08, 0.25), (0.2, 0.8), rng);
    let subclass = pick(rng, person::SUBCLASSES).to_string();
    let attributes = PersonAttributes {
        gender: maybe(rng, 0.8, person::GENDERS),
        age_range: pick(rng, person::AGE_RANGES).to_string(),
        activity: if subclass == "hunter" {
            "hunting".to_string()
        } else {
            pick(rng, person::ACTIVITIES).to_string()
        },
        posture: pick(rng, person::POSTURES).to_string(),
        height: pick(rng, person::HEIGHTS).to_string(),
        build: pick(rng, person::BUILDS).to_string(),
        clothing: Clothing {
            upper_body: pick(rng, person::UPPER_BODY).to_string(),
            lower_body: pick(rng, person::LOWER_BODY).to_string(),
            headwear: maybe(rng, 0.75, person::HEADWEAR),
            colors: vec![
                pick(rng, person::COLORS).to_string(),
                pick(rng, person::COLORS).to_string(),
            ],
        },
        accessories: maybe(rng, 0.6, person::ACCESSORIES),
        carrying: maybe(rng, 0.5, person::CARRYING),
    };

    let tracking = tracking(ctx, Category::Person, None, rng);
    DetectedObject {
        detection_id: format!("det-{}", hex_id(rng, 8)),
        category: Category::Person,
        class: "person".to_string(),
        subclass: Some(subclass),
        confidence: confidence(rng),
        count: 1,
        visibility: visibility(ctx, &bounding_box, rng),
        bounding_box,
        taxonomy: None,
        identification: None,
        tracking,
        attributes: Attributes::Person(attributes),
    }
}

fn license_plate(rng: &mut SimRng) -> String {
    use catalog::vehicle::PLATE_LETTERS;
    let letters: String = (0..3)
        .map(|_| pick(rng, PLATE_LETTERS) as char)
        .collect();
    format!("{}-{:04}", letters, rng.gen_range(0..10_000))
}

fn vehicle_object(ctx: &FrameContext<'_>, kind: &VehicleKind, rng: &mut SimRng) -> DetectedObject {
    use catalog::vehicle;

    let bounding_box = bounding_box(ctx, (0.15, 0.4), (0.15, 0.3), rng);
    let (make, models) = pick(rng, kind.makes);
    let is_moving = rng.gen_bool(0.55);
    let night = matches!(ctx.sun_position, SunPosition::Night | SunPosition::Dusk);

    let plate = if kind.kind != "atv" && kind.kind != "utility vehicle" && rng.gen_bool(0.2) {
        Some((license_plate(rng), pick(rng, vehicle::PLATE_STATES).to_string()))
    } else {
        None
    };
    let (license_plate, plate_state) = match plate {
        Some((plate, state)) => (Some(plate), Some(state)),
        None => (None, None),
    };

    let attributes = VehicleAttributes {
        vehicle_type: kind.kind.to_string(),
        make: make.to_string(),
        model: pick(rng, models).to_string(),
        paint_color: pick(rng, vehicle::PAINT_COLORS).to_string(),
        year_range: pick(rng, vehicle::YEAR_RANGES).to_string(),
        wheels: pick(rng, kind.wheels),
        doors: pick(rng, kind.doors),
        is_moving,
        lights_on: rng.gen_bool(if night { 0.8 } else { 0.2 }),
        license_plate,
        plate_state,
        distinctive_marks: maybe(rng, 0.5, vehicle::DISTINCTIVE_MARKS),
        occupants: if kind.carries_occupants && rng.gen_bool(0.6) {
            Some(rng.gen_range(1..=5))
        } else {
            None
        },
        direction_of_travel: if is_moving {
            Some(pick(rng, vehicle::DIRECTIONS).to_string())
        } else {
            None
        },
    };

    let tracking = tracking(ctx, Category::Vehicle, Some(is_moving), rng);
    DetectedObject {
        detection_id: format!("det-{}", hex_id(rng, 8)),
        category: Category::Vehicle,
        class: "vehicle".to_string(),
        subclass: Some(kind.kind.to_string()),
        confidence: confidence(rng),
        count: 1,
        visibility: visibility(ctx, &bounding_box, rng),
        bounding_box,
        taxonomy: None,
        identification: None,
        tracking,
        attributes: Attributes::Vehicle(attributes),
    }
}

fn other_object(ctx: &FrameContext<'_>, class: &OtherClass, rng: &mut SimRng) -> DetectedObject {
    let bounding_box = bounding_box(ctx, (0.05, 0.3), (0.05, 0.3), rng);
    let subclass = if class.subclasses.is_empty() {
        None
    } else {
        Some(pick(rng, class.subclasses).to_string())
    };
    let attributes = OtherAttributes {
        behavior: pick(rng, class.behaviors).to_string(),
        is_domestic: class.is_domestic,
        approx_length_cm: rng.gen_range(class.length_cm.0..=class.length_cm.1),
    };

    let tracking = tracking(ctx, Category::Other, None, rng);
    DetectedObject {
        detection_id: format!("det-{}", hex_id(rng, 8)),
        category: Category::Other,
        class: class.class.to_string(),
        subclass,
        confidence: confidence(rng),
        count: 1,
        visibility: visibility(ctx, &bounding_box, rng),
        bounding_box,
        taxonomy: None,
        identification: None,
        tracking,
        attributes: Attributes::Other(attributes),
    }
}

fn scene_context(sun_position: SunPosition, rng: &mut SimRng) -> SceneContext {
    let lighting = match sun_position {
        SunPosition::Day => "good",
        SunPosition::Dawn | SunPosition::Dusk => "low",
        SunPosition::Night => "infrared",
    };
    SceneContext {
        time_of_day: sun_position,
        lighting_conditions: lighting.to_string(),
        terrain: pick(rng, &["field", "forest", "road", "trail", "water"]).to_string(),
        habitat: pick(rng, &["grassland", "woodland", "wetland", "mixed"]).to_string(),
        is_feeding_area: rng.gen_bool(0.3),
        is_water_source: rng.gen_bool(0.2),
        is_trail: rng.gen_bool(0.4),
        is_road: rng.gen_bool(0.2),
        is_boundary: rng.gen_bool(0.15),
    }
}

fn event(ctx: &FrameContext<'_>, objects: &[DetectedObject], rng: &mut SimRng) -> Event {
    let event_type = pick(rng, &["passing", "feeding", "resting", "hunting", "interaction"]);
    let clip_ms = ctx.duration_ms.unwrap_or(10_000).max(2_000) as i64;
    let start_offset = rng.gen_range(0..clip_ms / 3);
    let duration_ms = rng.gen_range(clip_ms / 3..=clip_ms - start_offset);
    let start_timestamp = ctx.capture + Duration::milliseconds(start_offset);

    let mut primary_objects = Vec::new();
    let mut secondary_objects = Vec::new();
    if let Some((first, rest)) = objects.split_first() {
        primary_objects.push(first.class.clone());
        for object in rest {
            push_unique(&mut secondary_objects, &object.class);
        }
    }

    let mut description = event_type.to_string();
    if let Some(first) = description.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    Event {
        event_type: event_type.to_string(),
        confidence: round_to(rng.gen_range(0.7..0.95), 2),
        start_timestamp,
        end_timestamp: start_timestamp + Duration::milliseconds(duration_ms),
        duration_ms,
        primary_objects,
        secondary_objects,
        description: format!("{description} event detected"),
        significance: pick(rng, &["low", "medium", "high"]).to_string(),
    }
}

fn processing(
    ctx: &FrameContext<'_>,
    object_count: usize,
    categories: &[Category],
    reidentified: bool,
    rng: &mut SimRng,
) -> Processing {
    let mut models_used = vec!["base-detector-v3".to_string()];
    for (category, model) in [
        (Category::Wildlife, "wildlife-classifier-v2"),
        (Category::Person, "person-detector-v2"),
        (Category::Vehicle, "vehicle-detector-v1"),
        (Category::Other, "general-classifier-v1"),
    ] {
        if categories.contains(&category) {
            models_used.push(model.to_string());
        }
    }
    if reidentified {
        models_used.push("individual-reid-v1".to_string());
    }

    Processing {
        model: DETECTOR_MODEL.to_string(),
        version: DETECTOR_VERSION.to_string(),
        processing_time_ms: 150 + object_count as u64 * 75 + rng.gen_range(0..100),
        timestamp: ctx.processed_at,
        confidence_threshold: CONFIDENCE_THRESHOLD,
        models_used,
        is_reprocessed: rng.gen_bool(0.05),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryWeights;
    use crate::random::rng_from_seed;
    use chrono::TimeZone;

    fn ctx(is_video: bool, media_id: &str) -> FrameContext<'_> {
        let capture = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        FrameContext {
            tenant_id: "tenant-001",
            media_id,
            capture,
            is_video,
            width: 1920,
            height: 1080,
            duration_ms: is_video.then_some(15_000),
            sun_position: SunPosition::Day,
            processed_at: capture + Duration::seconds(40),
        }
    }

    fn synthesizer(config: DetectionConfig) -> DetectionSynthesizer {
        DetectionSynthesizer::new(&config, Arc::new(IdentityRegistry::new())).unwrap()
    }

    #[test]
    fn test_zero_weights_rejected() {
        let config = DetectionConfig {
            category_weights: CategoryWeights {
                wildlife: 0.0,
                person: 0.0,
                vehicle: 0.0,
                other: 0.0,
            },
            ..DetectionConfig::default()
        };
        let err = DetectionSynthesizer::new(&config, Arc::new(IdentityRegistry::new())).unwrap_err();
        assert!(matches!(err, GeneratorError::Configuration(_)));
    }

    #[test]
    fn test_summary_and_vocabulary_hold_for_many_frames() {
        let synth = synthesizer(DetectionConfig::default());
        let mut rng = rng_from_seed(11);
        for i in 0..1_500 {
            let media_id = format!("media-{i}");
            let frame = ctx(i % 4 == 0, &media_id);
            let detection = synth.synthesize(&frame, &mut rng).unwrap();
            detection.check_consistency(frame.is_video).unwrap();
            assert_eq!(detection.summary.total_objects as usize, detection.objects.len());
            assert!(detection.objects.len() <= 4);
        }
    }

    #[test]
    fn test_empty_probability_one_gives_empty_frames() {
        let synth = synthesizer(DetectionConfig {
            empty_probability: 1.0,
            ..DetectionConfig::default()
        });
        let mut rng = rng_from_seed(12);
        let detection = synth.synthesize(&ctx(false, "media-1"), &mut rng).unwrap();
        assert!(detection.objects.is_empty());
        assert!(detection.summary.empty_frame);
        assert!(detection.summary.class_distribution.primary_class.is_none());
        assert_eq!(detection.processing.models_used, vec!["base-detector-v3"]);
    }

    #[test]
    fn test_single_category_weights() {
        let synth = synthesizer(DetectionConfig {
            empty_probability: 0.0,
            category_weights: CategoryWeights {
                wildlife: 0.0,
                person: 0.0,
                vehicle: 1.0,
                other: 0.0,
            },
            ..DetectionConfig::default()
        });
        let mut rng = rng_from_seed(13);
        for _ in 0..100 {
            let detection = synth.synthesize(&ctx(false, "media-1"), &mut rng).unwrap();
            assert!(!detection.objects.is_empty());
            for object in &detection.objects {
                assert_eq!(object.category, Category::Vehicle);
                let Attributes::Vehicle(attrs) = &object.attributes else {
                    panic!("vehicle object with foreign attributes");
                };
                if attrs.vehicle_type == "motorcycle" {
                    assert_eq!(attrs.wheels, 2);
                    assert_eq!(attrs.doors, 0);
                }
                assert_eq!(attrs.direction_of_travel.is_some(), attrs.is_moving);
                assert_eq!(attrs.license_plate.is_some(), attrs.plate_state.is_some());
            }
            assert!(detection.summary.contains_vehicles);
            assert!(!detection.summary.contains_wildlife);
        }
    }

    #[test]
    fn test_antlers_only_on_deer_bucks() {
        let synth = synthesizer(DetectionConfig {
            empty_probability: 0.0,
            category_weights: CategoryWeights {
                wildlife: 1.0,
                person: 0.0,
                vehicle: 0.0,
                other: 0.0,
            },
            ..DetectionConfig::default()
        });
        let mut rng = rng_from_seed(14);
        let mut antlered = 0;
        for _ in 0..1_000 {
            let detection = synth.synthesize(&ctx(false, "media-1"), &mut rng).unwrap();
            for object in &detection.objects {
                let Attributes::Wildlife(attrs) = &object.attributes else {
                    panic!("wildlife object with foreign attributes");
                };
                assert!(object.taxonomy.is_some());
                if attrs.antler_points.is_some() {
                    antlered += 1;
                    assert_eq!(object.class, "deer");
                    assert!(matches!(attrs.sex.as_deref(), Some("buck") | Some("stag")));
                    assert!(attrs.antler_spread.is_some());
                }
            }
        }
        assert!(antlered > 0);
    }

    #[test]
    fn test_identification_sex_matches_attribute() {
        let synth = synthesizer(DetectionConfig {
            empty_probability: 0.0,
            identification_probability: 1.0,
            category_weights: CategoryWeights {
                wildlife: 1.0,
                person: 0.0,
                vehicle: 0.0,
                other: 0.0,
            },
            ..DetectionConfig::default()
        });
        let mut rng = rng_from_seed(15);
        let mut identified = 0;
        for i in 0..300 {
            let media_id = format!("media-{i}");
            let detection = synth.synthesize(&ctx(false, &media_id), &mut rng).unwrap();
            for object in &detection.objects {
                let Some(identification) = &object.identification else { continue };
                identified += 1;
                let (key, identity) = synth
                    .registry()
                    .snapshot()
                    .into_iter()
                    .find(|(_, i)| i.id == identification.id && i.name == identification.name)
                    .unwrap();
                assert_eq!(key.tenant_id, "tenant-001");
                let Attributes::Wildlife(attrs) = &object.attributes else { unreachable!() };
                assert_eq!(attrs.sex.as_deref(), Some(identity.sex.as_str()));
                assert!(identification.match_media_ids.contains(&media_id));
            }
            let named: Vec<&String> = detection
                .objects
                .iter()
                .filter_map(|o| o.identification.as_ref().map(|i| &i.name))
                .collect();
            for name in named {
                assert!(detection.summary.named_individuals.contains(name));
            }
        }
        assert!(identified > 100);
        assert!(!synth.registry().is_empty());
    }

    #[test]
    fn test_identification_confidence_trends_upward() {
        let synth = synthesizer(DetectionConfig::default());
        let registry = synth.registry();
        let mut rng = rng_from_seed(16);
        let profile = crate::catalog::species("whitetail").unwrap();
        let capture = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let mut early = Vec::new();
        let mut late = Vec::new();
        for i in 0..40 {
            let identity = registry
                .observe("t", profile.key, profile.name_pools, capture, &format!("m-{i}"), 1.0, &[], &mut rng)
                .unwrap();
            let confidence = Identification::from_identity(&identity, capture, &mut rng).confidence;
            if i < 3 {
                early.push(confidence);
            } else if i >= 30 {
                late.push(confidence);
            }
        }
        let avg = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
        assert!(avg(&late) > avg(&early));
    }

    #[test]
    fn test_video_objects_carry_tracking_within_clip() {
        let synth = synthesizer(DetectionConfig {
            empty_probability: 0.0,
            ..DetectionConfig::default()
        });
        let mut rng = rng_from_seed(17);
        let frame = ctx(true, "media-1");
        let clip_end = frame.capture + Duration::milliseconds(15_000);
        for _ in 0..200 {
            let detection = synth.synthesize(&frame, &mut rng).unwrap();
            assert!(detection.summary.motion_summary.is_some());
            for object in &detection.objects {
                let tracking = object.tracking.as_ref().unwrap();
                assert!(tracking.appearance_timestamp >= frame.capture);
                assert!(tracking.disappearance_timestamp <= clip_end);
                assert_eq!(tracking.motion.is_stationary, tracking.motion.speed == 0.0);
            }
            if let Some(event) = &detection.event {
                assert_eq!(event.primary_objects[0], detection.objects[0].class);
                assert!(event.end_timestamp <= clip_end);
                assert_eq!((event.end_timestamp - event.start_timestamp).num_milliseconds(), event.duration_ms);
            }
        }
    }

    #[test]
    fn test_placeholder_leaves_registry_untouched() {
        let synth = synthesizer(DetectionConfig {
            identification_probability: 1.0,
            ..DetectionConfig::default()
        });
        let mut rng = rng_from_seed(18);
        let detection = synth.placeholder(&ctx(false, "media-1"), &mut rng);
        assert!(detection.placeholder);
        assert!(detection.objects.is_empty());
        assert!(synth.registry().is_empty());
        detection.check_consistency(false).unwrap();

        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(json["placeholder"], true);
        let real = synth.synthesize(&ctx(false, "media-2"), &mut rng).unwrap();
        assert!(serde_json::to_value(&real).unwrap().get("placeholder").is_none());
    }

    #[test]
    fn test_primary_class_prefers_weighted_count_then_name() {
        let mut rng = rng_from_seed(19);
        let synth = synthesizer(DetectionConfig {
            empty_probability: 0.0,
            ..DetectionConfig::default()
        });
        let frame = ctx(false, "media-1");
        let base = loop {
            let detection = synth.synthesize(&frame, &mut rng).unwrap();
            if let Some(object) = detection.objects.into_iter().next() {
                break object;
            }
        };

        let with = |class: &str, confidence: f64| DetectedObject {
            class: class.to_string(),
            confidence,
            subclass: None,
            ..base.clone()
        };
        let scene = scene_context(SunPosition::Day, &mut rng);

        let summary = summarize(&[with("coyote", 0.7), with("bobcat", 0.7)], false, scene.clone());
        assert_eq!(summary.class_distribution.primary_class.as_deref(), Some("bobcat"));

        let summary = summarize(
            &[with("coyote", 0.9), with("bobcat", 0.6), with("bobcat", 0.61)],
            false,
            scene.clone(),
        );
        assert_eq!(summary.class_distribution.primary_class.as_deref(), Some("bobcat"));
        assert_eq!(summary.class_distribution.primary_confidence, Some(0.61));
        assert_eq!(
            summary.class_distribution.class_counts,
            vec![
                ClassCount { class: "bobcat".to_string(), count: 2 },
                ClassCount { class: "coyote".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_vocabularies_are_disjoint() {
        for (i, a) in Category::ALL.iter().enumerate() {
            for b in &Category::ALL[i + 1..] {
                for key in a.attribute_vocabulary() {
                    assert!(!b.attribute_vocabulary().contains(key), "{key} shared");
                }
            }
        }
    }
}
