use image::DynamicImage;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::types::TextRegion;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Failed to encode image for the engine: {0}")]
    Encode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR engine not available: {0}")]
    NotAvailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstraction over an OCR backend.
///
/// Backends are expensive to build and are constructed once per process; the
/// pipeline borrows or shares a single instance. Backends that need exclusive
/// access to their engine handle serialize callers internally.
pub trait OcrBackend: Send + Sync {
    /// Recognize every text token in `image`, in reading order.
    /// An image with no readable text yields an empty vector.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextRegion>, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for &T {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
        (**self).recognize(image)
    }
}

impl<T: OcrBackend + ?Sized> OcrBackend for Arc<T> {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
        (**self).recognize(image)
    }
}

impl<T: OcrBackend + ?Sized> OcrBackend for Box<T> {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
        (**self).recognize(image)
    }
}

/// Run `backend`, retrying engine failures up to `retries` extra times.
/// Other errors are returned immediately.
pub fn recognize_with_retry<B: OcrBackend + ?Sized>(
    backend: &B,
    image: &DynamicImage,
    retries: u32,
) -> Result<Vec<TextRegion>, OcrError> {
    let mut attempt = 0;
    loop {
        match backend.recognize(image) {
            Err(OcrError::Engine(msg)) if attempt < retries => {
                attempt += 1;
                tracing::warn!(attempt, retries, "OCR engine failed, retrying: {msg}");
            }
            other => return other,
        }
    }
}

// ── Mock backends (always available, used for tests) ──────────────────────────

/// Returns the same tokens for every image. Used for unit testing the
/// pipeline without requiring Tesseract to be installed.
pub struct MockRecognizer {
    pub tokens: Vec<String>,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let tokens = text.split_whitespace().map(str::to_string).collect();
        Self { tokens }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
        Ok(self.tokens.iter().map(|t| TextRegion::new(t.clone(), 1.0)).collect())
    }
}

/// Replays one queued response per call, then reports an engine error once
/// the queue is exhausted.
#[derive(Default)]
pub struct ScriptedRecognizer {
    responses: Mutex<VecDeque<Result<Vec<TextRegion>, String>>>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response; whitespace separates tokens.
    pub fn then_text(self, text: &str) -> Self {
        let tokens = text
            .split_whitespace()
            .map(|t| TextRegion::new(t, 1.0))
            .collect();
        self.push(Ok(tokens))
    }

    /// Queue an engine failure.
    pub fn then_fail(self, msg: &str) -> Self {
        self.push(Err(msg.to_string()))
    }

    fn push(mut self, response: Result<Vec<TextRegion>, String>) -> Self {
        if let Ok(q) = self.responses.get_mut() {
            q.push_back(response);
        }
        self
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl OcrBackend for ScriptedRecognizer {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
        let mut q = self
            .responses
            .lock()
            .map_err(|_| OcrError::Engine("scripted recognizer poisoned".into()))?;
        match q.pop_front() {
            Some(Ok(tokens)) => Ok(tokens),
            Some(Err(msg)) => Err(OcrError::Engine(msg)),
            None => Err(OcrError::Engine("no scripted response left".into())),
        }
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use crate::preprocess::prepare_for_ocr;
    use crate::tesseract_cli::parse_tsv;
    use crate::types::TextRegion;
    use image::DynamicImage;
    use leptess::LepTess;
    use std::sync::Mutex;

    /// libtesseract handle, loaded once and shared behind a lock. The API
    /// handle is stateful (current image), so calls are serialized.
    pub struct TesseractRecognizer {
        engine: Mutex<LepTess>,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<&str>, lang: &str) -> Result<Self, OcrError> {
            let lt = LepTess::new(data_path, lang).map_err(|e| OcrError::NotAvailable(e.to_string()))?;
            tracing::info!(lang, "Loaded libtesseract model");
            Ok(Self { engine: Mutex::new(lt) })
        }
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
            let png = prepare_for_ocr(image).map_err(|e| OcrError::Encode(e.to_string()))?;
            let mut lt = self
                .engine
                .lock()
                .map_err(|_| OcrError::Engine("tesseract handle poisoned".into()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            let tsv = lt.get_tsv_text(0).map_err(|e| OcrError::Engine(e.to_string()))?;
            Ok(parse_tsv(&tsv))
        }
    }
}
