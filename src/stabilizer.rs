use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::prediction_history::PredictionHistory;
use crate::types::{Prediction, StableGesture, HISTORY_SIZE};

/// Cómo desempatar cuando dos etiquetas tienen el mismo número de votos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Gana la etiqueta con la aparición más reciente
    #[default]
    MostRecent,
    /// Gana la primera encontrada recorriendo de la más antigua a la más nueva
    FirstSeen,
}

/// Parámetros del estabilizador
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Capacidad del historial (default: 5)
    pub history_size: usize,
    /// Mínimo de predicciones antes de decidir (default: 3)
    pub min_history: usize,
    /// Votos mínimos de la etiqueta ganadora (default: 2)
    pub min_votes: usize,
    /// La confianza media debe superar estrictamente este valor (default: 0.6)
    pub confidence_threshold: f32,
    pub tie_break: TieBreak,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            history_size: HISTORY_SIZE,
            min_history: 3,
            min_votes: 2,
            confidence_threshold: 0.6,
            tie_break: TieBreak::default(),
        }
    }
}

/// Convierte el flujo ruidoso de predicciones por frame en un gesto estable:
/// voto por mayoría + umbral de confianza media sobre una ventana corta.
#[derive(Debug, Clone)]
pub struct PredictionStabilizer {
    config: StabilizerConfig,
    history: PredictionHistory,
}

impl PredictionStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        let history = PredictionHistory::with_capacity(config.history_size);
        Self { config, history }
    }

    pub fn observe(&mut self, prediction: Prediction) -> Option<StableGesture> {
        self.history.push(prediction);

        if self.history.len() < self.config.min_history {
            return None;
        }

        let (label, votes) = self.most_common()?;
        let avg_confidence = self.history.mean_confidence()?;

        trace!(
            label,
            votes,
            avg_confidence,
            history = self.history.len(),
            "votación del historial"
        );

        if votes >= self.config.min_votes && avg_confidence > self.config.confidence_threshold {
            Some(StableGesture {
                label: label.to_string(),
                confidence: avg_confidence,
            })
        } else {
            None
        }
    }

    /// Etiqueta más votada y sus votos, según la política de desempate
    fn most_common(&self) -> Option<(&str, usize)> {
        match self.config.tie_break {
            TieBreak::FirstSeen => self.scan(self.history.iter()),
            TieBreak::MostRecent => self.scan(self.history.iter().rev()),
        }
    }

    /// Solo un conteo estrictamente mayor reemplaza al candidato actual,
    /// así que el orden del recorrido decide los empates.
    fn scan<'a>(&'a self, order: impl Iterator<Item = &'a Prediction>) -> Option<(&'a str, usize)> {
        let mut best: Option<(&'a str, usize)> = None;
        for prediction in order {
            let votes = self.history.count(&prediction.label);
            if best.map_or(true, |(_, best_votes)| votes > best_votes) {
                best = Some((prediction.label.as_str(), votes));
            }
        }
        best
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &PredictionHistory {
        &self.history
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for PredictionStabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(stabilizer: &mut PredictionStabilizer, seq: &[(&str, f32)]) -> Option<StableGesture> {
        let mut last = None;
        for &(label, conf) in seq {
            last = stabilizer.observe(Prediction::new(label, conf));
        }
        last
    }

    #[test]
    fn test_insufficient_evidence_below_three() {
        let mut stabilizer = PredictionStabilizer::default();
        assert!(stabilizer.observe(Prediction::new("a", 1.0)).is_none());
        assert!(stabilizer.observe(Prediction::new("a", 1.0)).is_none());
        assert!(stabilizer.observe(Prediction::new("a", 1.0)).is_some());
    }

    #[test]
    fn test_identical_predictions_become_stable() {
        let mut stabilizer = PredictionStabilizer::default();
        let mut stable = None;
        for _ in 0..7 {
            if let Some(g) = stabilizer.observe(Prediction::new("hola", 0.9)) {
                stable = Some(g);
            }
        }
        let stable = stable.unwrap();
        assert_eq!(stable.label, "hola");
        assert!((stable.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_majority_with_one_outlier() {
        let mut stabilizer = PredictionStabilizer::default();
        let stable = feed(&mut stabilizer, &[("A", 0.9), ("A", 0.9), ("B", 0.5)]).unwrap();
        assert_eq!(stable.label, "A");
        assert!((stable.confidence - 0.7667).abs() < 1e-3);
    }

    #[test]
    fn test_all_distinct_low_confidence() {
        let mut stabilizer = PredictionStabilizer::default();
        assert!(feed(&mut stabilizer, &[("A", 0.3), ("B", 0.3), ("C", 0.3)]).is_none());
    }

    #[test]
    fn test_all_distinct_high_confidence_still_needs_two_votes() {
        let mut stabilizer = PredictionStabilizer::default();
        assert!(feed(&mut stabilizer, &[("A", 0.99), ("B", 0.99), ("C", 0.99)]).is_none());
    }

    #[test]
    fn test_aggregate_average_not_per_sample_filter() {
        let mut stabilizer = PredictionStabilizer::default();
        let stable = feed(&mut stabilizer, &[("A", 0.9), ("B", 0.9), ("A", 0.2)]).unwrap();
        assert_eq!(stable.label, "A");
        assert!((stable.confidence - 0.6667).abs() < 1e-3);
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut stabilizer = PredictionStabilizer::new(StabilizerConfig {
            confidence_threshold: 0.5,
            ..StabilizerConfig::default()
        });
        assert!(feed(&mut stabilizer, &[("A", 0.5), ("A", 0.5), ("A", 0.5)]).is_none());
        assert!(stabilizer.observe(Prediction::new("A", 0.8)).is_some());
    }

    #[test]
    fn test_reset_requires_three_fresh_entries() {
        let mut stabilizer = PredictionStabilizer::default();
        assert!(feed(&mut stabilizer, &[("A", 0.9), ("A", 0.9), ("A", 0.9)]).is_some());

        stabilizer.reset();
        assert!(stabilizer.is_empty());
        assert!(stabilizer.observe(Prediction::new("A", 0.9)).is_none());
        assert!(stabilizer.observe(Prediction::new("A", 0.9)).is_none());
        assert!(stabilizer.observe(Prediction::new("A", 0.9)).is_some());
    }

    #[test]
    fn test_window_slides_to_new_gesture() {
        let mut stabilizer = PredictionStabilizer::default();
        feed(&mut stabilizer, &[("A", 0.9); 5]);
        // Tras 4 "B" el historial es [A, B, B, B, B]
        let stable = feed(&mut stabilizer, &[("B", 0.9); 4]).unwrap();
        assert_eq!(stable.label, "B");
        assert_eq!(stabilizer.history().count("A"), 1);
    }

    #[test]
    fn test_tie_break_most_recent() {
        let mut stabilizer = PredictionStabilizer::default();
        let stable = feed(&mut stabilizer, &[("A", 0.9), ("A", 0.9), ("B", 0.9), ("B", 0.9)]).unwrap();
        assert_eq!(stable.label, "B");
    }

    #[test]
    fn test_tie_break_first_seen() {
        let mut stabilizer = PredictionStabilizer::new(StabilizerConfig {
            tie_break: TieBreak::FirstSeen,
            ..StabilizerConfig::default()
        });
        let stable = feed(&mut stabilizer, &[("A", 0.9), ("A", 0.9), ("B", 0.9), ("B", 0.9)]).unwrap();
        assert_eq!(stable.label, "A");
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: StabilizerConfig =
            serde_json::from_str(r#"{"history_size": 7, "tie_break": "first_seen"}"#).unwrap();
        assert_eq!(config.history_size, 7);
        assert_eq!(config.min_history, 3);
        assert_eq!(config.tie_break, TieBreak::FirstSeen);
    }
}
