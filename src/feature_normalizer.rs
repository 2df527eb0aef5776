use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::{FeatureVector, Landmark, COORDS_PER_LANDMARK, NUM_LANDMARKS};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Invalid landmark count: expected {expected}, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },

    #[error("Invalid feature length: expected {expected}, got {actual}")]
    FeatureLength { expected: usize, actual: usize },
}

#[derive(Error, Debug)]
pub enum ScalerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Shape(#[from] ShapeError),
}

#[derive(Debug, Deserialize)]
struct ScalerJson {
    #[serde(alias = "mean_")]
    mean: Vec<f32>,
    #[serde(alias = "scale_")]
    scale: Vec<f32>,
}

/// Estandarización media/varianza ajustada durante el entrenamiento
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: FeatureVector,
    scale: FeatureVector,
}

impl StandardScaler {
    pub fn new(mean: &[f32], scale: &[f32]) -> Result<Self, ShapeError> {
        let mean = FeatureVector::from_slice(mean)?;
        let mut scale = FeatureVector::from_slice(scale)?;
        for s in scale.as_mut_slice() {
            // Columnas constantes: escala 0 se trata como 1
            if !s.is_finite() || *s == 0.0 {
                *s = 1.0;
            }
        }

        Ok(Self { mean, scale })
    }

    /// Carga un scaler exportado a JSON: {"mean": [63], "scale": [63]}
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScalerError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ScalerError> {
        let data: ScalerJson = serde_json::from_str(content)?;
        Ok(Self::new(&data.mean, &data.scale)?)
    }

    pub fn transform(&self, features: &mut FeatureVector) {
        for ((v, m), s) in features
            .as_mut_slice()
            .iter_mut()
            .zip(self.mean.as_slice())
            .zip(self.scale.as_slice())
        {
            *v = (*v - m) / s;
        }
    }
}

/// Aplana una mano a 63 floats [punto][x, y, z] y aplica el scaler si existe
#[derive(Debug, Clone, Default)]
pub struct FeatureNormalizer {
    scaler: Option<StandardScaler>,
}

impl FeatureNormalizer {
    pub fn new() -> Self {
        Self { scaler: None }
    }

    pub fn with_scaler(scaler: StandardScaler) -> Self {
        Self {
            scaler: Some(scaler),
        }
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }

    pub fn normalize(&self, landmarks: &[Landmark]) -> Result<FeatureVector, ShapeError> {
        if landmarks.len() != NUM_LANDMARKS {
            return Err(ShapeError::LandmarkCount {
                expected: NUM_LANDMARKS,
                actual: landmarks.len(),
            });
        }

        let mut features = FeatureVector::default();
        for (dst, lm) in features.as_mut_slice().chunks_exact_mut(COORDS_PER_LANDMARK).zip(landmarks) {
            dst[0] = lm.x;
            dst[1] = lm.y;
            dst[2] = lm.z;
        }

        if let Some(scaler) = &self.scaler {
            scaler.transform(&mut features);
        }

        Ok(features)
    }
}
