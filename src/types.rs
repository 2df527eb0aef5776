use serde::{Deserialize, Serialize};

use crate::feature_normalizer::ShapeError;

/// Un punto clave 3-D de la mano: x/y normalizados a la imagen, z profundidad relativa
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Lateralidad reportada por el detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// Una mano detectada en un frame, tal como la entrega el detector.
/// El invariante de 21 puntos lo verifica el normalizador, no el constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct HandObservation {
    pub landmarks: Vec<Landmark>,
    pub handedness: Option<Handedness>,
    pub score: Option<f32>,
}

impl HandObservation {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self {
            landmarks,
            handedness: None,
            score: None,
        }
    }

    pub fn with_handedness(mut self, handedness: Handedness) -> Self {
        self.handedness = Some(handedness);
        self
    }

    /// Reconstruye la mano desde un vector persistido de 63 floats
    pub fn from_features(features: &FeatureVector) -> Self {
        let landmarks = features
            .as_slice()
            .chunks_exact(COORDS_PER_LANDMARK)
            .map(|p| Landmark::new(p[0], p[1], p[2]))
            .collect();
        Self::new(landmarks)
    }
}

/// Vector plano [punto][x, y, z] de una mano: 63 floats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; FEATURE_LEN]);

impl FeatureVector {
    pub fn new(values: [f32; FEATURE_LEN]) -> Self {
        Self(values)
    }

    pub fn from_slice(values: &[f32]) -> Result<Self, ShapeError> {
        let array: [f32; FEATURE_LEN] = values.try_into().map_err(|_| ShapeError::FeatureLength {
            expected: FEATURE_LEN,
            actual: values.len(),
        })?;
        Ok(Self(array))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self([0.0; FEATURE_LEN])
    }
}

/// Predicción de un frame para una mano
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Gesto estable derivado del historial; nunca se almacena
#[derive(Debug, Clone, PartialEq)]
pub struct StableGesture {
    pub label: String,
    pub confidence: f32,
}

/// Frame de cámara RGB8. `index` es el número de captura, monotónico por sesión.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            index,
            width,
            height,
            pixels,
        }
    }

    /// Frame sin píxeles, útil para detectores que no miran la imagen (replay)
    pub fn empty(index: u64) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }
}

/// Constantes del sistema
pub const NUM_LANDMARKS: usize = 21;
pub const COORDS_PER_LANDMARK: usize = 3; // x, y, z
pub const FEATURE_LEN: usize = NUM_LANDMARKS * COORDS_PER_LANDMARK; // 63
pub const SEQUENCE_FRAMES: usize = 5; // variante secuencial del modelo
pub const HISTORY_SIZE: usize = 5;
