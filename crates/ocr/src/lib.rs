pub mod normalize;
pub mod orientation;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod region;
pub mod tesseract_cli;
pub mod types;

pub use normalize::{
    canonicalize_date, canonicalize_date_with, normalize_phone, ConfusionCorrector, DateOutcome, MonthMatch, Normalizer,
    MAX_PASSES,
};
pub use orientation::{correct_orientation, FixedOrientation, OrientationEstimator};
pub use pipeline::{is_supported_image, DocumentPipeline, PipelineError};
pub use preprocess::{decode_image, prepare_for_ocr, PreprocessError};
pub use recognizer::{recognize_with_retry, MockRecognizer, OcrBackend, OcrError, ScriptedRecognizer};
pub use region::{extract_regions, FieldCrop, RegionError};
pub use tesseract_cli::{TesseractCli, TesseractOsd};
pub use types::{join_tokens, Rotation, TextRegion};
