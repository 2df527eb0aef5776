/*
InTouch AI - Traductor de Lenguaje de Señas en tiempo real

Daemon de reconocimiento que:
1. Reproduce landmarks de mano capturados (CSV o JSONL) como si vinieran de la cámara
2. Entrega los frames por un buzón de un solo hueco (el frame más nuevo gana)
3. Clasifica cada mano con el modelo ONNX exportado del entrenamiento
4. Estabiliza las predicciones y muestra el gesto cuando es fiable

Para compilar y ejecutar:
    cargo run --release --features onnx -- modelo_gestos.onnx classes.json gestos_csv/hola_gesture_data.csv \
        --scaler scaler.json --config session.json

Logs con RUST_LOG=intouch=debug
*/

use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use intouch::gesture_classifier::OnnxClassifier;
use intouch::mailbox::frame_mailbox;
use intouch::sample_store::load_samples;
use intouch::{
    FeatureNormalizer, Frame, GestureSessionController, ReplayDetector, SessionConfig,
    SessionState, StandardScaler,
};

const USAGE: &str = "Uso: intouch <modelo.onnx> <classes.json> <muestras.csv|jsonl> \
[--scaler scaler.json] [--config session.json] [--gap N]";

struct DaemonOptions {
    model_path: PathBuf,
    classes_path: PathBuf,
    samples_path: PathBuf,
    scaler_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    /// Frames sin manos insertados entre muestras
    gap_frames: usize,
}

fn parse_args() -> Result<DaemonOptions> {
    let mut positional: Vec<PathBuf> = Vec::new();
    let mut scaler_path = None;
    let mut config_path = None;
    let mut gap_frames = 0;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--scaler" => {
                scaler_path = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("--scaler requiere una ruta"))?,
                ))
            }
            "--config" => {
                config_path = Some(PathBuf::from(
                    args.next().ok_or_else(|| anyhow!("--config requiere una ruta"))?,
                ))
            }
            "--gap" => {
                let value = args.next().ok_or_else(|| anyhow!("--gap requiere un número"))?;
                gap_frames = value
                    .parse()
                    .with_context(|| format!("--gap inválido: {}", value))?;
            }
            _ if arg.starts_with("--") => bail!("Opción desconocida {}\n{}", arg, USAGE),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let [model_path, classes_path, samples_path]: [PathBuf; 3] = positional
        .try_into()
        .map_err(|_| anyhow!("{}", USAGE))?;

    Ok(DaemonOptions {
        model_path,
        classes_path,
        samples_path,
        scaler_path,
        config_path,
        gap_frames,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("intouch=info")),
        )
        .init();

    println!("🤟 InTouch AI - Traductor de Lenguaje de Señas\n");

    let opts = parse_args()?;

    let config = match &opts.config_path {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("No se pudo cargar la configuración {:?}", path))?,
        None => SessionConfig::default(),
    };

    let samples = load_samples(&opts.samples_path)?;
    println!("📂 {} muestras cargadas de {:?}", samples.len(), opts.samples_path);

    let detector = ReplayDetector::from_samples(&samples, opts.gap_frames)
        .with_config(config.detector.clone());
    let total_frames = detector.len() as u64;

    println!("🔧 Inicializando clasificador ONNX...");
    let classifier = OnnxClassifier::new(&opts.model_path, &opts.classes_path)?
        .with_sequence_len(config.sequence_len);
    println!("✅ Clasificador cargado\n");

    let normalizer = match &opts.scaler_path {
        Some(path) => FeatureNormalizer::with_scaler(
            StandardScaler::from_json_file(path)
                .with_context(|| format!("No se pudo cargar el scaler {:?}", path))?,
        ),
        None => {
            warn!("sin scaler: los landmarks pasan sin estandarizar");
            FeatureNormalizer::new()
        }
    };

    let fps = config.fps;
    let mut controller = GestureSessionController::new(detector, classifier, normalizer, config)?;

    // Hilo de captura: publica frames a la cadencia de la cámara
    let (tx_frame, rx_frame) = frame_mailbox::<Frame>();
    let frame_period = Duration::from_secs_f64(1.0 / f64::from(fps));
    let producer = thread::spawn(move || {
        for index in 0..total_frames {
            if tx_frame.publish(Frame::empty(index)).is_err() {
                break;
            }
            thread::sleep(frame_period);
        }
        tx_frame.dropped()
    });

    println!("🎬 Iniciando reconocimiento en tiempo real...\n");

    let mut last_state = SessionState::NoHand;
    let mut last_label: Option<String> = None;
    let mut recognized = 0u32;

    while let Ok(frame) = rx_frame.recv() {
        let outcome = controller.process_frame(&frame);

        let label = outcome.gesture.as_ref().map(|g| g.label.clone());
        if outcome.state != last_state || (label.is_some() && label != last_label) {
            match outcome.state {
                SessionState::Stable => {
                    recognized += 1;
                    println!("[GESTO] {}", outcome);
                }
                _ => println!("[{}] {}", outcome.state.as_str(), outcome),
            }
        }

        last_state = outcome.state;
        if label.is_some() {
            last_label = label;
        } else if outcome.state == SessionState::NoHand {
            last_label = None;
        }
    }

    let dropped = producer
        .join()
        .map_err(|_| anyhow!("El hilo de captura terminó con pánico"))?;

    info!(
        frames = controller.frames_processed(),
        dropped,
        recognized,
        "sesión terminada"
    );
    println!(
        "\n👋 Sesión terminada: {} frames analizados, {} descartados, {} gestos",
        controller.frames_processed(),
        dropped,
        recognized
    );

    Ok(())
}
