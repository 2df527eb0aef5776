use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use intouch::gesture_classifier::OnnxClassifier;
use intouch::sample_store::load_samples;
use intouch::types::{FeatureVector, HandObservation};
use intouch::{Classifier, FeatureNormalizer, PredictionStabilizer, StabilizerConfig, StandardScaler};

const USAGE: &str = "Uso: replay_csv [--scaler scaler.json] [--sequence] [--top N] \
<modelo.onnx> <classes.json> <muestras.csv|jsonl>";

struct ReplayOptions {
    scaler_path: Option<PathBuf>,
    sequence: bool,
    top: usize,
}

fn parse_args() -> Result<([PathBuf; 3], ReplayOptions)> {
    let mut positional: Vec<PathBuf> = Vec::new();
    let mut scaler_path = None;
    let mut sequence = false;
    let mut top = 5;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--scaler" => {
                scaler_path = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("--scaler requiere una ruta"))?,
                ))
            }
            "--sequence" => sequence = true,
            "--top" => {
                let value = args.next().ok_or_else(|| anyhow!("--top requiere un número"))?;
                top = value
                    .parse()
                    .with_context(|| format!("--top inválido: {}", value))?;
            }
            _ if arg.starts_with("--") => bail!("Opción desconocida {}\n{}", arg, USAGE),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let paths: [PathBuf; 3] = positional
        .try_into()
        .map_err(|_| anyhow!("{}", USAGE))?;

    Ok((
        paths,
        ReplayOptions {
            scaler_path,
            sequence,
            top,
        },
    ))
}

fn main() -> Result<()> {
    let ([model_path, classes_path, samples_path], opts) = parse_args()?;
    println!("🎞️  Reproduciendo muestras desde {:?}", samples_path);

    let samples = load_samples(&samples_path)?;
    if samples.is_empty() {
        bail!("El archivo no contiene muestras");
    }

    let normalizer = match &opts.scaler_path {
        Some(path) => FeatureNormalizer::with_scaler(StandardScaler::from_json_file(path)?),
        None => FeatureNormalizer::new(),
    };

    let sequence_len = if opts.sequence {
        intouch::types::SEQUENCE_FRAMES
    } else {
        1
    };
    let mut classifier =
        OnnxClassifier::new(&model_path, &classes_path)?.with_sequence_len(sequence_len);
    let mut stabilizer = PredictionStabilizer::new(StabilizerConfig::default());

    let mut hits = 0usize;
    for (idx, sample) in samples.iter().enumerate() {
        let window = sample
            .frames()
            .iter()
            .map(|raw| normalizer.normalize(&HandObservation::from_features(raw).landmarks))
            .collect::<Result<Vec<FeatureVector>, _>>()
            .with_context(|| format!("Muestra {} mal formada", idx))?;

        // Las muestras sueltas con modelo secuencial se repiten para llenar la ventana
        let window = if window.len() == 1 && sequence_len > 1 {
            vec![window[0]; sequence_len]
        } else {
            window
        };

        let prediction = match classifier.predict_window(&window) {
            Ok(p) => p,
            Err(e) => {
                println!("⚠️  Muestra {}: {}", idx, e);
                continue;
            }
        };

        let mark = if prediction.label == sample.label {
            hits += 1;
            "✅"
        } else {
            "❌"
        };
        println!(
            "\n{} Muestra {:>3} [{}] → {} ({:.1}%)",
            mark,
            idx,
            sample.label,
            prediction.label,
            prediction.confidence() * 100.0
        );
        for (rank, (label, score)) in prediction.top_k(opts.top).iter().enumerate() {
            println!("  {:>2}. {:<25} {:>6.2}%", rank + 1, label, score * 100.0);
        }

        if let Some(gesture) = stabilizer.observe(prediction.to_prediction()) {
            println!(
                "🗳️  Estable: {} ({:.1}%)",
                gesture.label,
                gesture.confidence * 100.0
            );
        }
    }

    println!(
        "\n📈 Aciertos: {}/{} ({:.1}%)",
        hits,
        samples.len(),
        hits as f32 / samples.len() as f32 * 100.0
    );

    Ok(())
}
