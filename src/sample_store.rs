use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::types::{FeatureVector, FEATURE_LEN, NUM_LANDMARKS, SEQUENCE_FRAMES};

/// Muestra cruda etiquetada: un frame (modelo simple) o cinco (modelo secuencial)
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSample {
    pub label: String,
    frames: Vec<FeatureVector>,
}

impl LandmarkSample {
    pub fn single(label: impl Into<String>, landmarks: FeatureVector) -> Self {
        Self {
            label: label.into(),
            frames: vec![landmarks],
        }
    }

    pub fn sequence(label: impl Into<String>, frames: Vec<FeatureVector>) -> Self {
        Self {
            label: label.into(),
            frames,
        }
    }

    pub fn frames(&self) -> &[FeatureVector] {
        &self.frames
    }

    pub fn is_sequence(&self) -> bool {
        self.frames.len() > 1
    }
}

/// Registro JSON por línea: {label, landmarks: [63]} o {label, frames: [[63]; 5]}
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum SampleRecord {
    Sequence { label: String, frames: Vec<Vec<f32>> },
    Single { label: String, landmarks: Vec<f32> },
}

impl SampleRecord {
    fn into_sample(self) -> Result<LandmarkSample> {
        match self {
            SampleRecord::Single { label, landmarks } => {
                Ok(LandmarkSample::single(label, FeatureVector::from_slice(&landmarks)?))
            }
            SampleRecord::Sequence { label, frames } => {
                ensure!(
                    frames.len() == SEQUENCE_FRAMES,
                    "La secuencia '{}' tiene {} frames (se esperaban {})",
                    label,
                    frames.len(),
                    SEQUENCE_FRAMES
                );
                let frames = frames
                    .iter()
                    .map(|f| FeatureVector::from_slice(f))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(LandmarkSample::sequence(label, frames))
            }
        }
    }

    fn from_sample(sample: &LandmarkSample) -> Self {
        if sample.is_sequence() {
            SampleRecord::Sequence {
                label: sample.label.clone(),
                frames: sample.frames.iter().map(|f| f.as_slice().to_vec()).collect(),
            }
        } else {
            SampleRecord::Single {
                label: sample.label.clone(),
                landmarks: sample
                    .frames
                    .first()
                    .map(|f| f.as_slice().to_vec())
                    .unwrap_or_default(),
            }
        }
    }
}

/// Encabezado del CSV de captura: gesture,point_0_x,point_0_y,point_0_z,...
pub fn csv_header() -> Vec<String> {
    let mut header = Vec::with_capacity(FEATURE_LEN + 1);
    header.push("gesture".to_string());
    for i in 0..NUM_LANDMARKS {
        for coord in ["x", "y", "z"] {
            header.push(format!("point_{}_{}", i, coord));
        }
    }
    header
}

/// Carga muestras simples desde el CSV de captura (una fila por mano y frame)
pub fn load_samples_from_csv(path: impl AsRef<Path>) -> Result<Vec<LandmarkSample>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut samples = Vec::new();
    let mut values = Vec::with_capacity(FEATURE_LEN);

    for (row_idx, result) in reader.records().enumerate() {
        let record =
            result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;
        if record.len() != FEATURE_LEN + 1 {
            bail!(
                "La fila {} tiene {} columnas (se esperaban {})",
                row_idx + 1,
                record.len(),
                FEATURE_LEN + 1
            );
        }

        values.clear();
        for (col, field) in record.iter().enumerate().skip(1) {
            let value: f32 = field
                .trim()
                .parse()
                .with_context(|| format!("Valor inválido en fila {}, columna {}", row_idx + 1, col))?;
            values.push(value);
        }

        samples.push(LandmarkSample::single(
            &record[0],
            FeatureVector::from_slice(&values)?,
        ));
    }

    Ok(samples)
}

pub fn write_samples_to_csv(path: impl AsRef<Path>, samples: &[LandmarkSample]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("No se pudo crear el CSV {:?}", path))?;

    writer.write_record(csv_header())?;
    for sample in samples {
        if sample.is_sequence() {
            bail!(
                "La muestra secuencial '{}' no cabe en el formato CSV",
                sample.label
            );
        }
        let Some(features) = sample.frames.first() else {
            continue;
        };
        let mut row = Vec::with_capacity(FEATURE_LEN + 1);
        row.push(sample.label.clone());
        row.extend(features.as_slice().iter().map(|v| v.to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_samples_from_jsonl(path: impl AsRef<Path>) -> Result<Vec<LandmarkSample>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("No se pudo abrir {:?}", path))?;

    let mut samples = Vec::new();
    for (line_idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: SampleRecord = serde_json::from_str(&line)
            .with_context(|| format!("Línea {} inválida en {:?}", line_idx + 1, path))?;
        samples.push(
            record
                .into_sample()
                .with_context(|| format!("Línea {} de {:?}", line_idx + 1, path))?,
        );
    }
    Ok(samples)
}

pub fn write_samples_to_jsonl(path: impl AsRef<Path>, samples: &[LandmarkSample]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("No se pudo crear {:?}", path))?;
    let mut out = BufWriter::new(file);
    for sample in samples {
        serde_json::to_writer(&mut out, &SampleRecord::from_sample(sample))?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Elige el formato por extensión: .csv o .jsonl/.json
pub fn load_samples(path: impl AsRef<Path>) -> Result<Vec<LandmarkSample>> {
    let path = path.as_ref();
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => load_samples_from_csv(path),
        Some(ext) if ext.eq_ignore_ascii_case("jsonl") || ext.eq_ignore_ascii_case("json") => {
            load_samples_from_jsonl(path)
        }
        _ => bail!("Formato de muestras no reconocido: {:?}", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(offset: f32) -> FeatureVector {
        let values: Vec<f32> = (0..FEATURE_LEN).map(|i| offset + i as f32 / 100.0).collect();
        FeatureVector::from_slice(&values).unwrap()
    }

    #[test]
    fn test_csv_header_layout() {
        let header = csv_header();
        assert_eq!(header.len(), 64);
        assert_eq!(header[0], "gesture");
        assert_eq!(header[1], "point_0_x");
        assert_eq!(header[63], "point_20_z");
    }

    #[test]
    fn test_csv_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hola_gesture_data.csv");
        let samples = vec![
            LandmarkSample::single("hola", ramp(0.0)),
            LandmarkSample::single("hola", ramp(0.5)),
        ];

        write_samples_to_csv(&path, &samples).unwrap();
        let loaded = load_samples(&path).unwrap();
        assert_eq!(loaded, samples);
    }

    #[test]
    fn test_csv_rejects_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "gesture,point_0_x\nhola,0.1\n").unwrap();

        let err = load_samples_from_csv(&path).unwrap_err();
        assert!(err.to_string().contains("columnas"));
    }

    #[test]
    fn test_csv_refuses_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.csv");
        let samples = vec![LandmarkSample::sequence("adios", vec![ramp(0.0); 5])];
        assert!(write_samples_to_csv(&path, &samples).is_err());
    }

    #[test]
    fn test_jsonl_mixed_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.jsonl");
        let samples = vec![
            LandmarkSample::single("hola", ramp(0.0)),
            LandmarkSample::sequence("gracias", vec![ramp(0.1); SEQUENCE_FRAMES]),
        ];

        write_samples_to_jsonl(&path, &samples).unwrap();
        let loaded = load_samples(&path).unwrap();
        assert_eq!(loaded, samples);
        assert!(!loaded[0].is_sequence());
        assert!(loaded[1].is_sequence());
    }

    #[test]
    fn test_jsonl_wrong_sequence_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        let frame = vec![0.0f32; FEATURE_LEN];
        let line = serde_json::json!({"label": "x", "frames": [frame.clone(), frame]});
        std::fs::write(&path, format!("{}\n", line)).unwrap();

        assert!(load_samples_from_jsonl(&path).is_err());
    }

    #[test]
    fn test_jsonl_wrong_landmark_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"label\": \"x\", \"landmarks\": [0.1, 0.2]}\n").unwrap();

        assert!(load_samples_from_jsonl(&path).is_err());
    }
}
