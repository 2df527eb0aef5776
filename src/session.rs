use std::fmt;

use tracing::{debug, warn};

use crate::config::{ConfigError, HandPolicy, SessionConfig};
use crate::feature_normalizer::FeatureNormalizer;
use crate::feature_window::FeatureWindow;
use crate::gesture_classifier::Classifier;
use crate::hand_detector::HandDetector;
use crate::stabilizer::PredictionStabilizer;
use crate::types::{Frame, HandObservation, Handedness, Prediction, StableGesture};

/// Estado de la sesión tras procesar un frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No hay manos visibles
    NoHand,
    /// Hay manos pero todavía no hay evidencia suficiente
    Accumulating,
    /// El último frame produjo un gesto estable
    Stable,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NoHand => "NO_HAND",
            SessionState::Accumulating => "ACCUMULATING",
            SessionState::Stable => "STABLE",
        }
    }
}

/// Resultado de `process_frame`
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
    pub state: SessionState,
    pub gesture: Option<StableGesture>,
    pub hands_detected: usize,
    /// Slot de mano que produjo el gesto
    pub slot: Option<usize>,
}

impl FrameOutcome {
    fn no_hand() -> Self {
        Self {
            state: SessionState::NoHand,
            gesture: None,
            hands_detected: 0,
            slot: None,
        }
    }
}

impl fmt::Display for FrameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.state, &self.gesture) {
            (SessionState::Stable, Some(g)) => {
                write!(f, "Gesto: {} (confianza: {:.2}%)", g.label, g.confidence * 100.0)
            }
            (SessionState::NoHand, _) => write!(f, "No se detectan manos"),
            _ => write!(f, "Procesando gesto..."),
        }
    }
}

/// Ventana temporal y contador de ausencia de un slot de mano
#[derive(Debug, Clone)]
struct HandSlot {
    window: FeatureWindow,
    missing_frames: u32,
}

/// Orquesta detector → normalizador → clasificador → estabilizador frame a frame.
/// Cada instancia es dueña exclusiva de sus historiales.
pub struct GestureSessionController<D, C> {
    detector: D,
    classifier: C,
    normalizer: FeatureNormalizer,
    config: SessionConfig,
    /// Un estabilizador por slot, o uno solo compartido
    stabilizers: Vec<PredictionStabilizer>,
    slots: Vec<HandSlot>,
    no_hand_frames: u32,
    state: SessionState,
    frames_processed: u64,
}

impl<D: HandDetector, C: Classifier> GestureSessionController<D, C> {
    pub fn new(
        detector: D,
        classifier: C,
        normalizer: FeatureNormalizer,
        config: SessionConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let max_hands = config.detector.max_num_hands;
        let num_stabilizers = match config.hand_policy {
            HandPolicy::PerHandSlot => max_hands,
            HandPolicy::SharedHistory => 1,
        };
        let stabilizers = (0..num_stabilizers)
            .map(|_| PredictionStabilizer::new(config.stabilizer.clone()))
            .collect();
        let slots = (0..max_hands)
            .map(|_| HandSlot {
                window: FeatureWindow::new(config.sequence_len),
                missing_frames: 0,
            })
            .collect();

        Ok(Self {
            detector,
            classifier,
            normalizer,
            config,
            stabilizers,
            slots,
            no_hand_frames: 0,
            state: SessionState::NoHand,
            frames_processed: 0,
        })
    }

    pub fn process_frame(&mut self, frame: &Frame) -> FrameOutcome {
        self.frames_processed += 1;

        let hands = match self.detector.detect(frame) {
            Ok(hands) => hands,
            Err(e) => {
                warn!(frame = frame.index, error = %e, "fallo del detector, frame sin manos");
                Vec::new()
            }
        };

        if hands.is_empty() {
            return self.on_no_hand();
        }
        self.no_hand_frames = 0;

        let assignments = assign_slots(&hands, self.slots.len());
        if assignments.len() < hands.len() {
            debug!(
                detected = hands.len(),
                tracked = assignments.len(),
                "manos extra ignoradas"
            );
        }

        let mut seen = vec![false; self.slots.len()];
        let mut best: Option<(usize, StableGesture)> = None;
        let mut shared_latest: Option<(usize, Prediction)> = None;

        for &(hand_idx, slot) in &assignments {
            seen[slot] = true;
            let Some(prediction) = self.classify_hand(&hands[hand_idx], slot) else {
                continue;
            };

            match self.config.hand_policy {
                HandPolicy::PerHandSlot => {
                    if let Some(gesture) = self.stabilizers[slot].observe(prediction) {
                        keep_most_confident(&mut best, slot, gesture);
                    }
                }
                HandPolicy::SharedHistory => shared_latest = Some((slot, prediction)),
            }
        }

        // Historial compartido: solo la última mano clasificada del frame cuenta
        if let Some((slot, prediction)) = shared_latest {
            if let Some(gesture) = self.stabilizers[0].observe(prediction) {
                best = Some((slot, gesture));
            }
        }

        self.age_slots(&seen);

        let outcome = match best {
            Some((slot, gesture)) => FrameOutcome {
                state: SessionState::Stable,
                gesture: Some(gesture),
                hands_detected: hands.len(),
                slot: Some(slot),
            },
            None => FrameOutcome {
                state: SessionState::Accumulating,
                gesture: None,
                hands_detected: hands.len(),
                slot: None,
            },
        };
        self.state = outcome.state;
        outcome
    }

    /// Normaliza, ventana y clasifica una mano; None si se descarta en este frame
    fn classify_hand(&mut self, hand: &HandObservation, slot: usize) -> Option<Prediction> {
        let features = match self.normalizer.normalize(&hand.landmarks) {
            Ok(features) => features,
            Err(e) => {
                warn!(slot, error = %e, "mano descartada");
                return None;
            }
        };

        let window = &mut self.slots[slot].window;
        window.push(features);
        let frames = window.window()?;

        let result = self
            .classifier
            .predict_window(frames)
            .and_then(|p| p.validate().map(|_| p));

        match result {
            Ok(class_prediction) => {
                let prediction = class_prediction.to_prediction();
                debug!(slot, label = %prediction.label, confidence = prediction.confidence, "predicción");
                Some(prediction)
            }
            Err(e) => {
                warn!(slot, error = %e, "fallo del clasificador, mano omitida");
                None
            }
        }
    }

    fn on_no_hand(&mut self) -> FrameOutcome {
        self.no_hand_frames = self.no_hand_frames.saturating_add(1);
        let seen = vec![false; self.slots.len()];
        self.age_slots(&seen);

        if self.no_hand_frames > self.config.no_hand_reset_frames && self.has_evidence() {
            debug!(frames = self.no_hand_frames, "sin manos, historial vaciado");
            self.clear_histories();
        }

        self.state = SessionState::NoHand;
        FrameOutcome::no_hand()
    }

    /// Un slot que no aparece durante más de `no_hand_reset_frames` frames se reinicia solo
    fn age_slots(&mut self, seen: &[bool]) {
        let threshold = self.config.no_hand_reset_frames;
        let per_slot = self.config.hand_policy == HandPolicy::PerHandSlot;

        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if seen[idx] {
                slot.missing_frames = 0;
                continue;
            }

            slot.missing_frames = slot.missing_frames.saturating_add(1);
            if slot.missing_frames > threshold {
                let stale_history = per_slot && !self.stabilizers[idx].is_empty();
                if stale_history || slot.window.frame_count() > 0 {
                    debug!(slot = idx, "slot de mano inactivo, reiniciado");
                }
                slot.window.clear();
                if per_slot {
                    self.stabilizers[idx].reset();
                }
            }
        }
    }

    fn has_evidence(&self) -> bool {
        self.stabilizers.iter().any(|s| !s.is_empty())
            || self.slots.iter().any(|s| s.window.frame_count() > 0)
    }

    fn clear_histories(&mut self) {
        for stabilizer in &mut self.stabilizers {
            stabilizer.reset();
        }
        for slot in &mut self.slots {
            slot.window.clear();
        }
    }

    /// Vacía todo el estado acumulado; la sesión vuelve a empezar
    pub fn reset(&mut self) {
        self.clear_histories();
        for slot in &mut self.slots {
            slot.missing_frames = 0;
        }
        self.no_hand_frames = 0;
        self.state = SessionState::NoHand;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Estabilizador de un slot (en modo compartido, solo existe el 0)
    pub fn stabilizer(&self, idx: usize) -> Option<&PredictionStabilizer> {
        self.stabilizers.get(idx)
    }

    pub fn no_hand_frames(&self) -> u32 {
        self.no_hand_frames
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }
}

fn keep_most_confident(best: &mut Option<(usize, StableGesture)>, slot: usize, gesture: StableGesture) {
    let replace = best
        .as_ref()
        .map_or(true, |(_, current)| gesture.confidence > current.confidence);
    if replace {
        *best = Some((slot, gesture));
    }
}

/// Asigna cada mano a un slot: primero por lateralidad (Left → 0, Right → 1),
/// luego al primer slot libre en orden de detección. Devuelve (mano, slot)
/// en orden de detección; las manos sin slot libre se ignoran.
fn assign_slots(hands: &[HandObservation], num_slots: usize) -> Vec<(usize, usize)> {
    let mut taken = vec![false; num_slots];
    let mut slot_of: Vec<Option<usize>> = vec![None; hands.len()];

    for (idx, hand) in hands.iter().enumerate() {
        let preferred = match hand.handedness {
            Some(Handedness::Left) => 0,
            Some(Handedness::Right) => 1,
            None => continue,
        };
        if preferred < num_slots && !taken[preferred] {
            taken[preferred] = true;
            slot_of[idx] = Some(preferred);
        }
    }

    for slot in slot_of.iter_mut() {
        if slot.is_some() {
            continue;
        }
        if let Some(free) = taken.iter().position(|t| !t) {
            taken[free] = true;
            *slot = Some(free);
        }
    }

    slot_of
        .into_iter()
        .enumerate()
        .filter_map(|(idx, slot)| slot.map(|s| (idx, s)))
        .collect()
}
