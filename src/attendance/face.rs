use crate::attendance::error::PunchError;
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Distance that maps to a similarity of 0%. Widening it makes matching more lenient.
pub const DISTANCE_SCALE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn euclidean_distance(&self, other: &FeatureVector) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

/// Face location in pixels, in (top, right, bottom, left) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        let width = u64::from(self.right.saturating_sub(self.left));
        let height = u64::from(self.bottom.saturating_sub(self.top));
        width * height
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    #[serde(flatten)]
    pub bounding_box: BoundingBox,
    pub encoding: FeatureVector,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetections {
    pub model_version: String,
    pub faces: Vec<DetectedFace>,
}

/// Picks the face to verify: the largest box wins, ties go to the top-most then left-most.
pub fn select_primary_face(faces: Vec<DetectedFace>) -> Result<DetectedFace, PunchError> {
    if faces.len() > 1 {
        tracing::debug!("{} faces detected, selecting the largest", faces.len());
    }

    faces
        .into_iter()
        .reduce(|best, candidate| {
            let best_key = (
                best.bounding_box.area(),
                std::cmp::Reverse(best.bounding_box.top),
                std::cmp::Reverse(best.bounding_box.left),
            );
            let candidate_key = (
                candidate.bounding_box.area(),
                std::cmp::Reverse(candidate.bounding_box.top),
                std::cmp::Reverse(candidate.bounding_box.left),
            );
            if candidate_key > best_key { candidate } else { best }
        })
        .ok_or(PunchError::NoFaceDetected)
}

pub fn decode_image(bytes: &[u8], max_bytes: usize) -> Result<RgbImage, PunchError> {
    if bytes.is_empty() {
        return Err(PunchError::InvalidImage("empty upload".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(PunchError::InvalidImage(format!(
            "image is {} bytes, limit is {}",
            bytes.len(),
            max_bytes
        )));
    }

    let image =
        image::load_from_memory(bytes).map_err(|e| PunchError::InvalidImage(e.to_string()))?;
    Ok(image.to_rgb8())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub distance: f64,
    pub score: f64,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct FaceMatcher {
    threshold_percent: f64,
}

impl FaceMatcher {
    pub fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    pub fn match_vectors(
        &self,
        enrolled: &FeatureVector,
        sample: &FeatureVector,
    ) -> Result<MatchResult, PunchError> {
        if enrolled.is_empty() || enrolled.len() != sample.len() {
            return Err(PunchError::DimensionMismatch {
                enrolled: enrolled.len(),
                sample: sample.len(),
            });
        }

        let distance = enrolled.euclidean_distance(sample);
        let score = similarity_percent(distance);

        Ok(MatchResult {
            distance,
            score,
            accepted: score >= self.threshold_percent,
        })
    }
}

/// Maps a distance to a 0-100 similarity, rounded to two decimals.
pub fn similarity_percent(distance: f64) -> f64 {
    let raw = ((1.0 - distance / DISTANCE_SCALE) * 100.0).clamp(0.0, 100.0);
    (raw * 100.0).round() / 100.0
}
