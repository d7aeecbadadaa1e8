use crate::config::ConfigError;
use log::info;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// Joints below this confidence are skipped during scoring rather than
/// penalized: an occluded elbow should not drag a good pose to zero.
pub const MIN_JOINT_CONFIDENCE: f32 = 0.2;

/// Distance in normalized units at which a joint counts as fully wrong.
pub const MAX_MEANINGFUL_DISTANCE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub confidence: f32,
}

/// One observed pose reading from the external estimator. Immutable once
/// built; the engine borrows it for a single resolution pass and never
/// retains it.
#[derive(Debug, Clone)]
pub struct PoseSample {
    joints: FxHashMap<String, Keypoint>,
    timestamp_ms: f64,
    overall_confidence: f32,
}

impl PoseSample {
    pub fn new(joints: FxHashMap<String, Keypoint>, timestamp_ms: f64) -> Self {
        let overall_confidence = if joints.is_empty() {
            0.0
        } else {
            joints.values().map(|k| k.confidence).sum::<f32>() / joints.len() as f32
        };
        Self { joints, timestamp_ms, overall_confidence }
    }

    #[inline(always)]
    pub fn joint(&self, name: &str) -> Option<&Keypoint> {
        self.joints.get(name)
    }

    #[inline(always)]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    #[inline(always)]
    pub fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }

    /// Mean joint confidence, computed once at construction.
    #[inline(always)]
    pub fn overall_confidence(&self) -> f32 {
        self.overall_confidence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TemplateJoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Importance of this joint in the weighted similarity average.
    pub weight: f32,
}

/// A named reference pose. Static per level, shared read-only (`Arc`) across
/// every target that schedules it.
#[derive(Debug, Clone, Deserialize)]
pub struct PoseTemplate {
    pub name: String,
    pub joints: FxHashMap<String, TemplateJoint>,
}

impl PoseTemplate {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.joints.is_empty() {
            return Err(ConfigError::InvalidTemplate {
                name: self.name.clone(),
                reason: "template has no joints",
            });
        }
        for joint in self.joints.values() {
            if !joint.weight.is_finite() || joint.weight <= 0.0 {
                return Err(ConfigError::InvalidTemplate {
                    name: self.name.clone(),
                    reason: "joint weight must be finite and positive",
                });
            }
        }
        Ok(())
    }
}

/// The per-level template table: pose name to shared template.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    templates: FxHashMap<String, Arc<PoseTemplate>>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template: PoseTemplate) -> Result<(), ConfigError> {
        template.validate()?;
        self.templates
            .insert(template.name.clone(), Arc::new(template));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PoseTemplate>> {
        self.templates.get(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Loads a JSON array of templates, validating each before insertion.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
        let templates: Vec<PoseTemplate> =
            serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        let mut set = Self::new();
        for template in templates {
            set.insert(template)?;
        }
        info!("Loaded {} pose templates", set.len());
        Ok(set)
    }
}

/// Confidence-weighted similarity between a reference pose and an observed
/// sample, in [0, 1]. Pure and deterministic.
///
/// Template joints that are missing from the sample or fall below
/// MIN_JOINT_CONFIDENCE contribute to neither numerator nor denominator.
/// Returns 0 when no joint carries weight.
pub fn similarity_score(template: &PoseTemplate, sample: &PoseSample) -> f32 {
    let mut weighted_sum = 0.0_f32;
    let mut total_weight = 0.0_f32;

    for (name, reference) in &template.joints {
        let Some(observed) = sample.joint(name) else {
            continue;
        };
        if observed.confidence < MIN_JOINT_CONFIDENCE {
            continue;
        }

        let dx = observed.x - reference.x;
        let dy = observed.y - reference.y;
        let dz = observed.z - reference.z;
        let distance = (dx * dx + dy * dy + dz * dz).sqrt();
        let joint_similarity = (1.0 - distance / MAX_MEANINGFUL_DISTANCE).max(0.0);

        let weight = reference.weight * observed.confidence;
        weighted_sum += joint_similarity * weight;
        total_weight += weight;
    }

    if total_weight <= 0.0 {
        return 0.0;
    }
    (weighted_sum / total_weight).clamp(0.0, 1.0)
}
