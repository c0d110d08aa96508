use anyhow::Context;
use docscan_core::{FieldMap, NormalizedRecord, StoredRow};
use docscan_ocr::{DocumentPipeline, OcrBackend};
use docscan_storage::RecordStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// What `process` prints for each stored document.
#[derive(Debug, Serialize)]
pub struct IngestOutput {
    pub sr_no: u64,
    #[serde(flatten)]
    pub record: NormalizedRecord,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub stored: usize,
    pub failed: usize,
}

#[derive(Debug, Serialize)]
pub struct FieldOutput {
    pub key: &'static str,
    pub name: &'static str,
    #[serde(rename = "box")]
    pub bbox: [u32; 4],
}

/// Extract one image and append it to the store. Nothing is written when
/// extraction fails.
pub async fn ingest_file<R: OcrBackend>(
    pipeline: &DocumentPipeline<R>,
    store: &RecordStore,
    path: &Path,
) -> anyhow::Result<IngestOutput> {
    let record = pipeline
        .process_file(path)
        .await
        .with_context(|| format!("Failed to extract {}", path.display()))?;
    let row = store
        .append(&record)
        .with_context(|| format!("Failed to store {}", path.display()))?;
    Ok(IngestOutput { sr_no: row.sr_no, record })
}

/// Process images one after another, printing each stored record as a JSON line.
/// A failing image is logged and skipped.
pub async fn process_paths<R: OcrBackend>(
    pipeline: &DocumentPipeline<R>,
    store: &RecordStore,
    paths: &[PathBuf],
) -> anyhow::Result<ProcessSummary> {
    let mut summary = ProcessSummary::default();
    for path in paths {
        match ingest_file(pipeline, store, path).await {
            Ok(out) => {
                println!("{}", serde_json::to_string(&out)?);
                summary.stored += 1;
            }
            Err(e) => {
                tracing::warn!("{e:#}");
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}

/// Drain the intake queue until it closes. One document at a time.
pub async fn run_intake<R: OcrBackend>(
    pipeline: &DocumentPipeline<R>,
    store: &RecordStore,
    rx: &mut mpsc::Receiver<PathBuf>,
) -> ProcessSummary {
    let mut summary = ProcessSummary::default();
    while let Some(path) = rx.recv().await {
        tracing::info!("Processing document: {}", path.display());
        match ingest_file(pipeline, store, &path).await {
            Ok(out) => {
                tracing::info!(sr_no = out.sr_no, "Document stored: {}", path.display());
                summary.stored += 1;
            }
            Err(e) => {
                tracing::warn!("Intake pipeline error: {e:#}");
                summary.failed += 1;
            }
        }
    }
    summary
}

pub fn list_rows(store: &RecordStore) -> anyhow::Result<Vec<StoredRow>> {
    store
        .rows()
        .with_context(|| format!("Failed to read {}", store.path().display()))
}

pub fn describe_fields(map: &FieldMap) -> Vec<FieldOutput> {
    map.iter()
        .map(|def| FieldOutput {
            key: def.kind.key(),
            name: def.name(),
            bbox: def.bbox.into(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_ocr::{MockRecognizer, ScriptedRecognizer};
    use image::{DynamicImage, GrayImage, Luma};

    fn write_scan(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageLuma8(GrayImage::from_pixel(1400, 900, Luma([240u8])))
            .save(&path)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn ingest_stores_normalized_row() {
        let dir = tempfile::tempdir().unwrap();
        let scan = write_scan(dir.path(), "form_1.png");
        let store = RecordStore::new(dir.path().join("extracted_data.csv"));
        let recognizer = ScriptedRecognizer::new()
            .then_text("ASHA DEVI")
            .then_text("98-7654-321")
            .then_text("O5-Jan-2O23")
            .then_text("4411");
        let pipeline = DocumentPipeline::new(recognizer, FieldMap::default());

        let out = ingest_file(&pipeline, &store, &scan).await.unwrap();
        assert_eq!(out.sr_no, 1);

        let rows = list_rows(&store).unwrap();
        assert_eq!(
            rows,
            vec![StoredRow {
                sr_no: 1,
                filename: "form_1.png".into(),
                beneficiary_name: "ASHA DEVI".into(),
                record_number: "4411".into(),
                date: "05/01/2023".into(),
                mobile: "8987654321".into(),
            }]
        );
    }

    #[tokio::test]
    async fn undecodable_image_writes_no_row() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("broken.jpg");
        std::fs::write(&bad, b"not a jpeg").unwrap();
        let store = RecordStore::new(dir.path().join("out.csv"));
        let pipeline = DocumentPipeline::new(MockRecognizer::new("x"), FieldMap::default());

        assert!(ingest_file(&pipeline, &store, &bad).await.is_err());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn batch_skips_failures_and_keeps_numbering_gapless() {
        let dir = tempfile::tempdir().unwrap();
        let good_a = write_scan(dir.path(), "a.png");
        let bad = dir.path().join("missing.png");
        let good_b = write_scan(dir.path(), "b.png");
        let store = RecordStore::new(dir.path().join("out.csv"));
        let pipeline = DocumentPipeline::new(MockRecognizer::new("12-34"), FieldMap::default());

        let summary = process_paths(&pipeline, &store, &[good_a, bad, good_b]).await.unwrap();
        assert_eq!(summary, ProcessSummary { stored: 2, failed: 1 });

        let rows = list_rows(&store).unwrap();
        assert_eq!(rows.iter().map(|r| r.sr_no).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(rows[1].filename, "b.png");
        assert_eq!(rows[1].mobile, "81234");
    }

    #[tokio::test]
    async fn intake_drains_queue_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("out.csv"));
        let pipeline = DocumentPipeline::new(MockRecognizer::new("ASHA"), FieldMap::default());

        let (tx, mut rx) = mpsc::channel(8);
        for name in ["first.png", "second.png", "third.png"] {
            tx.send(write_scan(dir.path(), name)).await.unwrap();
        }
        drop(tx);

        let summary = run_intake(&pipeline, &store, &mut rx).await;
        assert_eq!(summary, ProcessSummary { stored: 3, failed: 0 });
        let names: Vec<String> = list_rows(&store).unwrap().into_iter().map(|r| r.filename).collect();
        assert_eq!(names, vec!["first.png", "second.png", "third.png"]);
    }

    #[tokio::test]
    async fn watched_file_written_in_chunks_is_stored_once() {
        use std::io::Write;

        let intake = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let store = RecordStore::new(scratch.path().join("out.csv"));
        let pipeline = DocumentPipeline::new(MockRecognizer::new("ASHA"), FieldMap::default());

        let png = std::fs::read(write_scan(scratch.path(), "source.png")).unwrap();
        let (first, rest) = png.split_at(png.len() / 2);

        let (tx, mut rx) = mpsc::channel(8);
        let watcher = docscan_ocr::pipeline::spawn_intake_watcher(intake.path(), tx).unwrap();

        let mut file = std::fs::File::create(intake.path().join("arriving.png")).unwrap();
        file.write_all(first).unwrap();
        file.flush().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        file.write_all(rest).unwrap();
        drop(file);

        tokio::time::sleep(std::time::Duration::from_millis(1000)).await;
        drop(watcher);

        let summary = run_intake(&pipeline, &store, &mut rx).await;
        assert_eq!(summary, ProcessSummary { stored: 1, failed: 0 });
        let rows = list_rows(&store).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].filename, "arriving.png");
    }

    #[test]
    fn fields_listing_uses_config_keys() {
        let fields = describe_fields(&FieldMap::default());
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].key, "beneficiary_name");
        assert_eq!(fields[0].name, "Name of beneficiary");
        assert_eq!(fields[0].bbox, [515, 491, 817, 523]);
    }

    #[test]
    fn ingest_output_flattens_record() {
        let out = IngestOutput { sr_no: 3, record: NormalizedRecord { mobile: "81234".into(), ..Default::default() } };
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["sr_no"], 3);
        assert_eq!(json["mobile"], "81234");
    }
}
