use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::{FeatureVector, Prediction};

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[cfg(feature = "onnx")]
    #[error("ONNX Runtime error: {0}")]
    OnnxError(#[from] ort::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid feature size: expected {expected}, got {actual}")]
    InvalidFeatureSize { expected: usize, actual: usize },

    #[error("Unsupported window length: model takes {expected} frames, got {actual}")]
    UnsupportedWindow { expected: usize, actual: usize },

    #[error("Malformed classifier output: {0}")]
    MalformedOutput(String),

    #[error("No output tensor found")]
    NoOutputTensor,

    #[error("Missing ONNX {kind}")]
    MissingIo { kind: &'static str },
}

/// Tolerancia para probabilidades ligeramente fuera de [0, 1]
const PROB_TOLERANCE: f32 = 1e-3;
/// Desviación máxima de la suma de la distribución respecto de 1
const SUM_TOLERANCE: f32 = 0.05;

/// Salida del modelo: etiqueta predicha y distribución sobre las clases conocidas
#[derive(Debug, Clone, PartialEq)]
pub struct ClassPrediction {
    pub label: String,
    pub probabilities: Vec<(String, f32)>,
}

impl ClassPrediction {
    /// Etiqueta = clase de mayor probabilidad
    pub fn from_probabilities(probabilities: Vec<(String, f32)>) -> Result<Self, ClassifierError> {
        let label = probabilities
            .iter()
            .filter(|(_, p)| p.is_finite())
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(label, _)| label.clone())
            .ok_or_else(|| ClassifierError::MalformedOutput("distribución vacía".to_string()))?;

        let prediction = Self {
            label,
            probabilities,
        };
        prediction.validate()?;
        Ok(prediction)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.probabilities.is_empty() {
            return Err(ClassifierError::MalformedOutput(
                "distribución vacía".to_string(),
            ));
        }

        let mut sum = 0.0f32;
        for (label, p) in &self.probabilities {
            if !p.is_finite() || *p < -PROB_TOLERANCE || *p > 1.0 + PROB_TOLERANCE {
                return Err(ClassifierError::MalformedOutput(format!(
                    "probabilidad inválida para '{}': {}",
                    label, p
                )));
            }
            sum += p;
        }

        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(ClassifierError::MalformedOutput(format!(
                "la distribución suma {}",
                sum
            )));
        }

        if !self.probabilities.iter().any(|(l, _)| *l == self.label) {
            return Err(ClassifierError::MalformedOutput(format!(
                "la etiqueta '{}' no está en la distribución",
                self.label
            )));
        }

        Ok(())
    }

    /// Probabilidad asignada a la etiqueta predicha (la máxima cuando es el argmax)
    pub fn confidence(&self) -> f32 {
        self.probabilities
            .iter()
            .find(|(l, _)| *l == self.label)
            .map_or(0.0, |(_, p)| *p)
            .clamp(0.0, 1.0)
    }

    /// Las `k` clases más probables, de mayor a menor
    pub fn top_k(&self, k: usize) -> Vec<(&str, f32)> {
        let mut sorted: Vec<(&str, f32)> = self
            .probabilities
            .iter()
            .map(|(l, p)| (l.as_str(), *p))
            .collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
        sorted.truncate(k);
        sorted
    }

    pub fn to_prediction(&self) -> Prediction {
        Prediction::new(self.label.clone(), self.confidence())
    }
}

/// Modelo entrenado: vector de características (o ventana de ellos) → clase
pub trait Classifier {
    fn predict(&mut self, features: &FeatureVector) -> Result<ClassPrediction, ClassifierError>;

    /// Ventana temporal en orden cronológico. Por defecto solo se aceptan ventanas de 1 frame.
    fn predict_window(
        &mut self,
        window: &[FeatureVector],
    ) -> Result<ClassPrediction, ClassifierError> {
        match window {
            [single] => self.predict(single),
            _ => Err(ClassifierError::UnsupportedWindow {
                expected: 1,
                actual: window.len(),
            }),
        }
    }

    fn labels(&self) -> &[String];
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn predict(&mut self, features: &FeatureVector) -> Result<ClassPrediction, ClassifierError> {
        (**self).predict(features)
    }

    fn predict_window(
        &mut self,
        window: &[FeatureVector],
    ) -> Result<ClassPrediction, ClassifierError> {
        (**self).predict_window(window)
    }

    fn labels(&self) -> &[String] {
        (**self).labels()
    }
}

#[derive(Debug, Deserialize)]
struct ClassesJson {
    index_to_class: HashMap<String, String>,
}

/// Lee classes.json ({"index_to_class": {"0": "hola", ...}}) ordenado por índice
pub fn load_classes(path: impl AsRef<Path>) -> Result<Vec<String>, ClassifierError> {
    let content = fs::read_to_string(path)?;
    parse_classes(&content)
}

pub fn parse_classes(content: &str) -> Result<Vec<String>, ClassifierError> {
    let data: ClassesJson = serde_json::from_str(content)?;

    let mut pairs: Vec<(usize, String)> = data
        .index_to_class
        .into_iter()
        .filter_map(|(k, v)| k.parse::<usize>().ok().map(|idx| (idx, v)))
        .collect();

    pairs.sort_by_key(|(idx, _)| *idx);
    Ok(pairs.into_iter().map(|(_, name)| name).collect())
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

#[cfg(feature = "onnx")]
mod onnx {
    use super::*;
    use crate::types::FEATURE_LEN;
    use ort::session::Session;
    use ort::tensor::TensorElementType;
    use ort::value::ValueType;
    use tracing::info;

    /// Clasificador ONNX. Entrada [1, 63] o, con `sequence_len` > 1, [1, T, 63].
    pub struct OnnxClassifier {
        session: Session,
        labels: Vec<String>,
        input_name: String,
        prob_output_name: String,
        sequence_len: usize,
    }

    impl OnnxClassifier {
        pub fn new(
            model_path: impl AsRef<Path>,
            classes_path: impl AsRef<Path>,
        ) -> Result<Self, ClassifierError> {
            let model_path = model_path.as_ref();
            let labels = load_classes(classes_path)?;

            let session = Session::builder()?.commit_from_file(model_path)?;

            let input_name = session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or(ClassifierError::MissingIo { kind: "input" })?;

            // skl2onnx exporta etiqueta + probabilidades; nos quedamos con el tensor float
            let prob_output_name = session
                .outputs
                .iter()
                .find(|output| {
                    matches!(
                        output.output_type,
                        ValueType::Tensor {
                            ty: TensorElementType::Float32,
                            ..
                        }
                    )
                })
                .or_else(|| session.outputs.first())
                .map(|output| output.name.clone())
                .ok_or(ClassifierError::MissingIo { kind: "output" })?;

            info!(
                model = %model_path.display(),
                classes = labels.len(),
                input = %input_name,
                output = %prob_output_name,
                "modelo ONNX cargado"
            );

            Ok(Self {
                session,
                labels,
                input_name,
                prob_output_name,
                sequence_len: 1,
            })
        }

        /// Modelo secuencial: consume ventanas de `frames` vectores
        pub fn with_sequence_len(mut self, frames: usize) -> Self {
            self.sequence_len = frames.max(1);
            self
        }

        fn run(&mut self, window: &[FeatureVector]) -> Result<ClassPrediction, ClassifierError> {
            if window.len() != self.sequence_len {
                return Err(ClassifierError::UnsupportedWindow {
                    expected: self.sequence_len,
                    actual: window.len(),
                });
            }

            let mut input_data = Vec::with_capacity(window.len() * FEATURE_LEN);
            for features in window {
                input_data.extend_from_slice(features.as_slice());
            }
            if input_data.len() != self.sequence_len * FEATURE_LEN {
                return Err(ClassifierError::InvalidFeatureSize {
                    expected: self.sequence_len * FEATURE_LEN,
                    actual: input_data.len(),
                });
            }

            let shape_vec = if self.sequence_len == 1 {
                vec![1_usize, FEATURE_LEN]
            } else {
                vec![1_usize, self.sequence_len, FEATURE_LEN]
            };

            let input_value = ort::value::Value::from_array((shape_vec, input_data))?;

            let outputs = self.session.run(ort::inputs![
                self.input_name.as_str() => &input_value,
            ])?;

            let (prob_shape, prob_data) =
                outputs[self.prob_output_name.as_str()].try_extract_tensor::<f32>()?;

            let num_classes = if prob_shape.len() >= 2 {
                prob_shape[1] as usize
            } else {
                prob_shape[0] as usize
            };

            if num_classes == 0 || prob_data.len() < num_classes {
                return Err(ClassifierError::NoOutputTensor);
            }

            let probabilities = self
                .labels
                .iter()
                .zip(prob_data.iter().take(num_classes))
                .map(|(label, &p)| (label.clone(), p))
                .collect();

            ClassPrediction::from_probabilities(probabilities)
        }
    }

    impl Classifier for OnnxClassifier {
        fn predict(&mut self, features: &FeatureVector) -> Result<ClassPrediction, ClassifierError> {
            self.run(std::slice::from_ref(features))
        }

        fn predict_window(
            &mut self,
            window: &[FeatureVector],
        ) -> Result<ClassPrediction, ClassifierError> {
            self.run(window)
        }

        fn labels(&self) -> &[String] {
            &self.labels
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(&str, f32)]) -> Vec<(String, f32)> {
        pairs.iter().map(|(l, p)| (l.to_string(), *p)).collect()
    }

    #[test]
    fn test_argmax_and_confidence() {
        let pred =
            ClassPrediction::from_probabilities(dist(&[("hola", 0.2), ("gracias", 0.7), ("adios", 0.1)]))
                .unwrap();
        assert_eq!(pred.label, "gracias");
        assert!((pred.confidence() - 0.7).abs() < 1e-6);
        assert_eq!(pred.to_prediction(), Prediction::new("gracias", 0.7));
    }

    #[test]
    fn test_top_k() {
        let pred =
            ClassPrediction::from_probabilities(dist(&[("a", 0.1), ("b", 0.6), ("c", 0.3)])).unwrap();
        let top = pred.top_k(2);
        assert_eq!(top, vec![("b", 0.6), ("c", 0.3)]);
    }

    #[test]
    fn test_rejects_empty_distribution() {
        assert!(matches!(
            ClassPrediction::from_probabilities(Vec::new()),
            Err(ClassifierError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_rejects_nan_and_out_of_range() {
        assert!(ClassPrediction::from_probabilities(dist(&[("a", f32::NAN), ("b", 1.0)])).is_err());
        assert!(ClassPrediction::from_probabilities(dist(&[("a", 1.5), ("b", -0.5)])).is_err());
    }

    #[test]
    fn test_rejects_unnormalized_distribution() {
        assert!(ClassPrediction::from_probabilities(dist(&[("a", 0.4), ("b", 0.3)])).is_err());
    }

    #[test]
    fn test_rejects_label_missing_from_distribution() {
        let pred = ClassPrediction {
            label: "otro".to_string(),
            probabilities: dist(&[("a", 1.0)]),
        };
        assert!(pred.validate().is_err());
    }

    #[test]
    fn test_parse_classes_sorted_by_index() {
        let labels =
            parse_classes(r#"{"index_to_class": {"2": "adios", "0": "hola", "1": "gracias"}}"#)
                .unwrap();
        assert_eq!(labels, vec!["hola", "gracias", "adios"]);
    }

    struct Fixed;

    impl Classifier for Fixed {
        fn predict(&mut self, _: &FeatureVector) -> Result<ClassPrediction, ClassifierError> {
            ClassPrediction::from_probabilities(vec![("hola".to_string(), 1.0)])
        }

        fn labels(&self) -> &[String] {
            &[]
        }
    }

    #[test]
    fn test_default_window_accepts_only_single_frame() {
        let mut classifier = Fixed;
        let one = [FeatureVector::default()];
        let five = [FeatureVector::default(); 5];

        assert!(classifier.predict_window(&one).is_ok());
        assert!(matches!(
            classifier.predict_window(&five),
            Err(ClassifierError::UnsupportedWindow { expected: 1, actual: 5 })
        ));
    }
}
