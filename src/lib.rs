//! Reconocimiento de lenguaje de señas en tiempo real a partir de landmarks de mano.
//!
//! Flujo por frame: detector → normalizador → clasificador → estabilizador → sesión.

pub mod config;
pub mod feature_normalizer;
pub mod feature_window;
pub mod gesture_classifier;
pub mod hand_detector;
pub mod mailbox;
pub mod prediction_history;
pub mod sample_store;
pub mod session;
pub mod stabilizer;
pub mod types;

pub use config::{ConfigError, HandPolicy, SessionConfig};
pub use feature_normalizer::{FeatureNormalizer, ShapeError, StandardScaler};
pub use gesture_classifier::{ClassPrediction, Classifier, ClassifierError};
pub use hand_detector::{DetectorConfig, DetectorError, HandDetector, ReplayDetector};
pub use session::{FrameOutcome, GestureSessionController, SessionState};
pub use stabilizer::{PredictionStabilizer, StabilizerConfig, TieBreak};
pub use types::{FeatureVector, Frame, HandObservation, Landmark, Prediction, StableGesture};
