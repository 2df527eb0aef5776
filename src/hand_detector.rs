use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sample_store::LandmarkSample;
use crate::types::{Frame, HandObservation};

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Detector backend error: {0}")]
    Backend(String),

    #[error("Invalid detector config: {0}")]
    InvalidConfig(String),
}

/// Parámetros del detector de landmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Confianza mínima de detección de la palma (default: 0.5)
    pub min_detection_confidence: f32,
    /// Confianza mínima de seguimiento entre frames (default: 0.5)
    pub min_tracking_confidence: f32,
    /// Manos seguidas simultáneamente (default: 2)
    pub max_num_hands: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            max_num_hands: 2,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), DetectorError> {
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DetectorError::InvalidConfig(format!(
                    "{} fuera de [0, 1]: {}",
                    name, value
                )));
            }
        }
        if self.max_num_hands == 0 {
            return Err(DetectorError::InvalidConfig(
                "max_num_hands debe ser >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Detector de landmarks de mano (MediaPipe u otro backend externo)
pub trait HandDetector {
    /// Devuelve las manos detectadas en el frame; vacío si no hay ninguna
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandObservation>, DetectorError>;
}

impl<D: HandDetector + ?Sized> HandDetector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandObservation>, DetectorError> {
        (**self).detect(frame)
    }
}

/// Reproduce un guion de manos por frame, indexado por `Frame::index`.
/// Más allá del final del guion no hay manos.
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    script: Vec<Vec<HandObservation>>,
    config: DetectorConfig,
}

impl ReplayDetector {
    pub fn new(script: Vec<Vec<HandObservation>>) -> Self {
        Self {
            script,
            config: DetectorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DetectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Un frame por muestra simple, cinco por muestra secuencial, y
    /// `gap_frames` frames sin manos entre muestras
    pub fn from_samples(samples: &[LandmarkSample], gap_frames: usize) -> Self {
        let mut script = Vec::new();
        for sample in samples {
            for features in sample.frames() {
                script.push(vec![HandObservation::from_features(features)]);
            }
            script.extend(std::iter::repeat_with(Vec::new).take(gap_frames));
        }
        Self::new(script)
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }
}

impl HandDetector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandObservation>, DetectorError> {
        let Ok(idx) = usize::try_from(frame.index) else {
            return Ok(Vec::new());
        };
        let mut hands = self.script.get(idx).cloned().unwrap_or_default();

        // El detector real respeta max_num_hands y el umbral de detección
        let min_score = self.config.min_detection_confidence;
        hands.retain(|h| h.score.map_or(true, |s| s >= min_score));
        hands.truncate(self.config.max_num_hands);
        Ok(hands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureVector, Landmark};

    fn hand_with_score(score: f32) -> HandObservation {
        HandObservation {
            landmarks: vec![Landmark::default(); 21],
            handedness: None,
            score: Some(score),
        }
    }

    #[test]
    fn test_replay_by_frame_index() {
        let mut detector = ReplayDetector::new(vec![
            vec![hand_with_score(0.9)],
            vec![],
            vec![hand_with_score(0.9), hand_with_score(0.8)],
        ]);

        assert_eq!(detector.detect(&Frame::empty(0)).unwrap().len(), 1);
        assert!(detector.detect(&Frame::empty(1)).unwrap().is_empty());
        assert_eq!(detector.detect(&Frame::empty(2)).unwrap().len(), 2);
        assert!(detector.detect(&Frame::empty(99)).unwrap().is_empty());
    }

    #[test]
    fn test_replay_applies_config() {
        let mut detector = ReplayDetector::new(vec![vec![
            hand_with_score(0.2),
            hand_with_score(0.9),
            hand_with_score(0.9),
            hand_with_score(0.9),
        ]])
        .with_config(DetectorConfig::default());

        assert_eq!(detector.detect(&Frame::empty(0)).unwrap().len(), 2);
    }

    #[test]
    fn test_from_samples_with_gaps() {
        let samples = vec![
            LandmarkSample::single("hola", FeatureVector::default()),
            LandmarkSample::sequence("gracias", vec![FeatureVector::default(); 5]),
        ];
        let mut detector = ReplayDetector::from_samples(&samples, 2);

        // 1 + 2 huecos + 5 + 2 huecos
        assert_eq!(detector.len(), 10);
        assert_eq!(detector.detect(&Frame::empty(0)).unwrap().len(), 1);
        assert!(detector.detect(&Frame::empty(1)).unwrap().is_empty());
        assert_eq!(detector.detect(&Frame::empty(3)).unwrap().len(), 1);
    }

    #[test]
    fn test_config_validation() {
        assert!(DetectorConfig::default().validate().is_ok());
        let bad = DetectorConfig {
            min_tracking_confidence: 1.5,
            ..DetectorConfig::default()
        };
        assert!(bad.validate().is_err());
        let no_hands = DetectorConfig {
            max_num_hands: 0,
            ..DetectorConfig::default()
        };
        assert!(no_hands.validate().is_err());
    }
}
