//! Tesseract via its command-line binary.
//!
//! Needs `tesseract` on `PATH`; orientation detection also needs the `osd`
//! traineddata.

use image::DynamicImage;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use crate::orientation::OrientationEstimator;
use crate::preprocess::{encode_as_png, prepare_for_ocr};
use crate::recognizer::{OcrBackend, OcrError};
use crate::types::{Rotation, TextRegion};

/// Word-level recognizer backed by `tesseract <image> stdout tsv`.
pub struct TesseractCli {
    language: String,
    version: String,
}

impl TesseractCli {
    /// Probe the binary once; fails when tesseract is not installed.
    pub fn new(language: &str) -> Result<Self, OcrError> {
        let version = probe_version()?;
        tracing::info!(%version, language, "Using tesseract binary");
        Ok(Self { language: language.to_string(), version })
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

impl OcrBackend for TesseractCli {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextRegion>, OcrError> {
        let png = prepare_for_ocr(image).map_err(|e| OcrError::Encode(e.to_string()))?;
        let file = write_temp_png(&png)?;
        let stdout = run_tesseract(
            file.path(),
            &["-l", &self.language, "--psm", "6", "tsv"],
        )?;
        Ok(parse_tsv(&stdout))
    }
}

/// Orientation and script detection (`--psm 0`).
pub struct TesseractOsd;

impl OrientationEstimator for TesseractOsd {
    fn estimate(&self, image: &DynamicImage) -> Result<Rotation, OcrError> {
        let png = encode_as_png(image).map_err(|e| OcrError::Encode(e.to_string()))?;
        let file = write_temp_png(&png)?;
        let stdout = run_tesseract(file.path(), &["--psm", "0"])?;
        parse_osd(&stdout)
            .ok_or_else(|| OcrError::Engine(format!("no rotation in OSD output: {stdout:?}")))
    }
}

fn probe_version() -> Result<String, OcrError> {
    match Command::new("tesseract").arg("--version").output() {
        Ok(out) if out.status.success() => {
            // Older builds print the banner on stderr.
            let text = if out.stdout.is_empty() { out.stderr } else { out.stdout };
            Ok(String::from_utf8_lossy(&text)
                .lines()
                .next()
                .unwrap_or("tesseract")
                .trim()
                .to_string())
        }
        Ok(out) => Err(OcrError::NotAvailable(
            String::from_utf8_lossy(&out.stderr).trim().to_string(),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::NotAvailable(
            "tesseract not found (install tesseract-ocr)".to_string(),
        )),
        Err(e) => Err(OcrError::Io(e)),
    }
}

fn write_temp_png(png: &[u8]) -> Result<tempfile::NamedTempFile, OcrError> {
    let mut file = tempfile::Builder::new().suffix(".png").tempfile()?;
    file.write_all(png)?;
    file.flush()?;
    Ok(file)
}

fn run_tesseract(image_path: &Path, args: &[&str]) -> Result<String, OcrError> {
    let output = Command::new("tesseract")
        .arg(image_path)
        .arg("stdout")
        .args(args)
        .output();

    match output {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(OcrError::Engine(format!("tesseract failed: {}", stderr.trim())))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::NotAvailable(
            "tesseract not found (install tesseract-ocr)".to_string(),
        )),
        Err(e) => Err(OcrError::Io(e)),
    }
}

/// Word rows (level 5) of Tesseract TSV output, in reading order.
pub(crate) fn parse_tsv(tsv: &str) -> Vec<TextRegion> {
    tsv.lines()
        .filter(|line| !line.starts_with("level"))
        .filter_map(|line| {
            let cols: Vec<&str> = line.splitn(12, '\t').collect();
            if cols.len() < 12 || cols[0] != "5" {
                return None;
            }
            let text = cols[11].trim();
            if text.is_empty() {
                return None;
            }
            let num = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);
            let conf = cols[10].trim().parse::<f32>().unwrap_or(0.0);
            Some(TextRegion::new(text, conf / 100.0).at(num(6), num(7), num(8), num(9)))
        })
        .collect()
}

/// `Rotate: N` line of `--psm 0` output.
pub(crate) fn parse_osd(out: &str) -> Option<Rotation> {
    out.lines()
        .find_map(|l| l.trim().strip_prefix("Rotate:"))
        .and_then(|v| v.trim().parse::<i32>().ok())
        .and_then(Rotation::from_degrees)
}
