use std::path::{Path, PathBuf};
use std::time::Instant;

use docscan_core::{BoundsPolicy, Config, ConfigError, ExtractedRecord, FieldKind, FieldMap, NormalizedRecord};
use image::DynamicImage;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::normalize::{ConfusionCorrector, MonthMatch, Normalizer};
use crate::orientation::{correct_orientation, OrientationEstimator};
use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{recognize_with_retry, OcrBackend, OcrError};
use crate::region::{extract_regions, RegionError};
use crate::tesseract_cli::TesseractOsd;
use crate::types::join_tokens;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Could not decode image: {0}")]
    Decode(#[from] PreprocessError),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error("OCR failed on field '{field}': {source}")]
    Ocr {
        field: FieldKind,
        #[source]
        source: OcrError,
    },
}

/// Orchestrates: decode → orientation → crop → OCR per field → normalize.
///
/// Persisting the result is left to the caller, so a failed document never
/// produces a partial row.
pub struct DocumentPipeline<R: OcrBackend> {
    recognizer: R,
    field_map: FieldMap,
    bounds: BoundsPolicy,
    orientation: Option<Box<dyn OrientationEstimator>>,
    normalizer: Normalizer,
    engine_retries: u32,
}

impl<R: OcrBackend> DocumentPipeline<R> {
    pub fn new(recognizer: R, field_map: FieldMap) -> Self {
        Self {
            recognizer,
            field_map,
            bounds: BoundsPolicy::default(),
            orientation: None,
            normalizer: Normalizer::default(),
            engine_retries: 0,
        }
    }

    /// Build from deployment settings. Orientation detection uses the
    /// tesseract binary when enabled.
    pub fn from_config(recognizer: R, config: &Config) -> Result<Self, ConfigError> {
        let corrector = config
            .confusion_table()
            .map(ConfusionCorrector::new)
            .unwrap_or_default();
        let months = if config.lenient_months { MonthMatch::Corrected } else { MonthMatch::Exact };
        let normalizer = Normalizer::new(corrector, config.phone_prefix_digit()?).with_months(months);
        let mut pipeline = Self::new(recognizer, config.field_map()?)
            .with_bounds(config.bounds)
            .with_normalizer(normalizer)
            .with_engine_retries(config.engine_retries);
        if config.detect_orientation {
            pipeline = pipeline.with_orientation(Box::new(TesseractOsd));
        }
        Ok(pipeline)
    }

    pub fn with_bounds(mut self, bounds: BoundsPolicy) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_orientation(mut self, estimator: Box<dyn OrientationEstimator>) -> Self {
        self.orientation = Some(estimator);
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_engine_retries(mut self, retries: u32) -> Self {
        self.engine_retries = retries;
        self
    }

    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    /// Raw recognized text for every field.
    pub fn extract(&self, image: DynamicImage, filename: &str) -> Result<ExtractedRecord, PipelineError> {
        let image = match &self.orientation {
            Some(estimator) => correct_orientation(image, estimator.as_ref()),
            None => image,
        };

        let crops = extract_regions(&image, &self.field_map, self.bounds)?;

        let mut record = ExtractedRecord::new(filename);
        for crop in crops {
            let tokens = recognize_with_retry(&self.recognizer, &crop.image, self.engine_retries)
                .map_err(|source| PipelineError::Ocr { field: crop.kind, source })?;
            let text = join_tokens(&tokens);
            tracing::debug!(field = %crop.kind, tokens = tokens.len(), text = %text, "Recognized field");
            record.fields.insert(crop.kind, text);
        }
        Ok(record)
    }

    pub fn process_image(&self, image: DynamicImage, filename: &str) -> Result<NormalizedRecord, PipelineError> {
        let started = Instant::now();
        let extracted = self.extract(image, filename)?;
        let normalized = self.normalizer.normalize(&extracted);
        tracing::info!(
            filename,
            date_canonical = normalized.date_canonical,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extracted document"
        );
        Ok(normalized)
    }

    /// Process raw bytes (from an upload or file read).
    pub fn process_bytes(&self, data: &[u8], filename: &str) -> Result<NormalizedRecord, PipelineError> {
        let image = preprocess::decode_image(data)?;
        self.process_image(image, filename)
    }

    /// Process a file on disk. The record carries the file's name, not its path.
    /// A file that cannot be read fails like one that cannot be decoded.
    pub async fn process_file(&self, path: &Path) -> Result<NormalizedRecord, PipelineError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| PreprocessError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.process_bytes(&bytes, &filename)
    }
}

/// JPEG and PNG, by extension.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

// ── Watch-folder integration ──────────────────────────────────────────────────

/// True for events after which a file in the intake folder is complete:
/// a writer closed it, or it was moved in under its final name.
fn is_intake_ready(kind: &notify::EventKind) -> bool {
    use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
    use notify::EventKind;

    matches!(
        kind,
        EventKind::Access(AccessKind::Close(AccessMode::Write))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

/// Spawn a notify watcher on `watch_dir` that sends finished image paths to `tx`.
/// Returns the watcher; it must be kept alive for watching to continue.
///
/// Paths are queued once the file is closed after writing or renamed into
/// the folder, never on creation. A full queue blocks the watcher thread
/// until the consumer catches up.
pub fn spawn_intake_watcher(
    watch_dir: &Path,
    tx: mpsc::Sender<PathBuf>,
) -> notify::Result<impl notify::Watcher> {
    use notify::{RecursiveMode, Watcher};

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| match event {
        Ok(ev) if is_intake_ready(&ev.kind) => {
            for path in ev.paths.into_iter().filter(|p| is_supported_image(p)) {
                tracing::debug!("Queued for intake: {}", path.display());
                if tx.blocking_send(path).is_err() {
                    tracing::warn!("Intake queue closed, ignoring new file");
                }
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Intake watcher error: {e}"),
    })?;

    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
