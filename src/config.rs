use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::hand_detector::DetectorConfig;
use crate::stabilizer::StabilizerConfig;
use crate::types::SEQUENCE_FRAMES;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Política cuando hay varias manos en el mismo frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandPolicy {
    /// Un estabilizador por mano (slot por lateralidad u orden de detección)
    #[default]
    PerHandSlot,
    /// Un único historial; solo la última mano clasificada del frame lo alimenta
    SharedHistory,
}

/// Configuración de una sesión de reconocimiento
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub stabilizer: StabilizerConfig,
    pub detector: DetectorConfig,
    /// Frames seguidos sin manos antes de vaciar el historial (default: 30)
    pub no_hand_reset_frames: u32,
    pub hand_policy: HandPolicy,
    /// Frames por ventana del modelo: 1 = modelo simple, 5 = secuencial (default: 1)
    pub sequence_len: usize,
    /// Cadencia de captura del daemon (default: 30)
    pub fps: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stabilizer: StabilizerConfig::default(),
            detector: DetectorConfig::default(),
            no_hand_reset_frames: 30,
            hand_policy: HandPolicy::default(),
            sequence_len: 1,
            fps: 30,
        }
    }
}

impl SessionConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuración del modelo secuencial de 5 frames
    pub fn sequence() -> Self {
        Self {
            sequence_len: SEQUENCE_FRAMES,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.stabilizer;
        if s.history_size == 0 {
            return Err(ConfigError::Invalid("history_size debe ser >= 1".into()));
        }
        if s.min_history > s.history_size {
            return Err(ConfigError::Invalid(format!(
                "min_history ({}) mayor que history_size ({})",
                s.min_history, s.history_size
            )));
        }
        if s.min_votes == 0 || s.min_votes > s.history_size {
            return Err(ConfigError::Invalid(format!(
                "min_votes ({}) fuera de [1, {}]",
                s.min_votes, s.history_size
            )));
        }
        if !(0.0..1.0).contains(&s.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold fuera de [0, 1): {}",
                s.confidence_threshold
            )));
        }
        if self.sequence_len == 0 {
            return Err(ConfigError::Invalid("sequence_len debe ser >= 1".into()));
        }
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps debe ser >= 1".into()));
        }
        self.detector
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
