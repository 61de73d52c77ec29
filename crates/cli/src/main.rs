mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use facesearch_core::detection::domain::face_detector::FaceDescriptorExtractor;
use facesearch_core::detection::infrastructure::model_resolver::{
    self, ModelResolveError, ModelSpec, FACE_EMBEDDING_MODEL, FACE_LOCATOR_MODEL,
};
use facesearch_core::detection::infrastructure::onnx_descriptor_extractor::{
    ModelPaths, OnnxDescriptorExtractor,
};
use facesearch_core::normalization::domain::image_normalizer::ImageNormalizer;
use facesearch_core::normalization::infrastructure::letterbox_normalizer::LetterboxNormalizer;
use facesearch_core::pipeline::batch_result::BatchResult;
use facesearch_core::pipeline::extract_descriptors_use_case::ExtractDescriptorsUseCase;
use facesearch_core::pipeline::extraction_config::{parse_hex_color, ExtractionConfig};
use facesearch_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facesearch_core::pipeline::shared_extractor::SharedExtractor;
use facesearch_core::search::domain::face_search::{FaceSearch, SearchMatch};
use facesearch_core::search::infrastructure::static_face_search::StaticFaceSearch;
use facesearch_core::shared::constants::{IMAGE_EXTENSIONS, MAX_BATCH_SIZE};
use facesearch_core::shared::source_image::SourceImage;

use settings::Settings;

/// Extract face descriptors from photos of one person and search for them.
#[derive(Parser)]
#[command(name = "facesearch")]
struct Cli {
    /// Photos of the person to search for (1 to 3).
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Edge length of the square canvas each photo is letterboxed into.
    #[arg(long)]
    canvas_size: Option<u32>,

    /// Letterbox fill color as #rrggbb.
    #[arg(long)]
    fill: Option<String>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long)]
    confidence: Option<f64>,

    /// Maximum number of concurrent inference calls.
    #[arg(long)]
    inference_permits: Option<usize>,

    /// Directory with bundled model files, checked before downloading.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Write each normalized canvas as PNG into this directory.
    #[arg(long)]
    save_canvases: Option<PathBuf>,

    /// Store the effective options as the new defaults.
    #[arg(long)]
    save_settings: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let mut settings = Settings::load();
    apply_overrides(&mut settings, &cli)?;
    settings.extraction.validate()?;
    if cli.save_settings {
        settings.save();
    }

    let images = read_images(&cli.images)?;
    if let Some(dir) = &cli.save_canvases {
        save_canvases(&images, &settings.extraction, dir)?;
    }

    // Model download uses blocking HTTP, so it must finish before the runtime starts.
    let extractor = SharedExtractor::new(
        build_extractor(&settings)?,
        settings.extraction.inference_permits,
    );
    let mut use_case = ExtractDescriptorsUseCase::from_config(
        &settings.extraction,
        extractor,
        Box::new(StdoutPipelineLogger::new()),
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Cancelling after the current image...");
                flag.store(true, Ordering::Relaxed);
            }
        });
        use_case.execute(images, &cancelled).await
    })?;

    report(&result)?;
    Ok(())
}

fn report(result: &BatchResult) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Extracted {} descriptor(s) from {} image(s)",
        result.descriptors().len(),
        result.processed()
    );
    for failure in result.failures() {
        println!("  skipped {}", failure.message());
    }
    if result.is_cancelled() {
        println!("Cancelled: results are partial.");
    }

    let matches = StaticFaceSearch::new()
        .search(result.descriptors())
        .map_err(|e| e.to_string())?;
    if matches.is_empty() {
        println!("No matches found.");
        return Ok(());
    }
    println!("Matches:");
    for m in &matches {
        println!("  {}", format_match(m));
    }
    Ok(())
}

fn format_match(m: &SearchMatch) -> String {
    format!(
        "{:<10} {:<12} {:>3.0}%  {}",
        m.platform,
        m.username,
        m.similarity * 100.0,
        m.post
    )
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let extraction = &mut settings.extraction;
    if let Some(size) = cli.canvas_size {
        extraction.canvas_size = size;
    }
    if let Some(fill) = &cli.fill {
        extraction.fill_color = parse_hex_color(fill)?;
    }
    if let Some(confidence) = cli.confidence {
        extraction.min_confidence = confidence;
    }
    if let Some(permits) = cli.inference_permits {
        extraction.inference_permits = permits;
    }
    if let Some(dir) = &cli.model_dir {
        settings.model_dir = Some(dir.clone());
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.images.len() > MAX_BATCH_SIZE {
        return Err(format!(
            "At most {MAX_BATCH_SIZE} photos can be searched at once, got {}",
            cli.images.len()
        )
        .into());
    }
    for path in &cli.images {
        if !path.exists() {
            return Err(format!("Input file not found: {}", path.display()).into());
        }
        if !is_image(path) {
            log::warn!("{} does not look like an image", path.display());
        }
    }
    Ok(())
}

fn read_images(paths: &[PathBuf]) -> Result<Vec<SourceImage>, Box<dyn std::error::Error>> {
    paths
        .iter()
        .map(|path| -> Result<SourceImage, Box<dyn std::error::Error>> {
            let bytes = fs::read(path)
                .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
            Ok(SourceImage::new(display_name(path), bytes))
        })
        .collect()
}

fn save_canvases(
    images: &[SourceImage],
    config: &ExtractionConfig,
    dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    fs::create_dir_all(dir)?;
    let normalizer = LetterboxNormalizer::new(config.canvas_size, config.fill_color);
    for (index, image) in images.iter().enumerate() {
        match normalizer.normalize(image) {
            Ok(canvas) => {
                let path = dir.join(format!("canvas_{index}.png"));
                canvas.to_rgb_image().save(&path)?;
                log::info!("Saved canvas for {} to {}", image.name(), path.display());
            }
            Err(e) => log::warn!("No canvas for {e}"),
        }
    }
    Ok(())
}

fn build_extractor(
    settings: &Settings,
) -> Result<Arc<dyn FaceDescriptorExtractor>, Box<dyn std::error::Error>> {
    let bundled = settings.model_dir.as_deref();
    let paths = ModelPaths {
        face_locator: resolve_model(FACE_LOCATOR_MODEL, bundled)?,
        face_embedding: resolve_model(FACE_EMBEDDING_MODEL, bundled)?,
    };
    Ok(Arc::new(OnnxDescriptorExtractor::new(
        paths,
        settings.extraction.min_confidence,
    )))
}

fn resolve_model(spec: ModelSpec, bundled: Option<&Path>) -> Result<PathBuf, ModelResolveError> {
    log::info!("Resolving model: {}", spec.name);
    let path = model_resolver::resolve(spec, bundled, Some(Box::new(download_progress)))?;
    log::debug!("Using {}", path.display());
    Ok(path)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face model... {pct}%");
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!("\rDownloading face model... {downloaded} bytes");
    }
}
