//! Workbook output.
//!
//! Rows are appended to `output.xlsx`, which is created from a template on
//! first use. Each append is a full read-modify-write of the file, so
//! appends to the same path are serialized through a process-wide lock.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;

use crate::error::PersistenceError;
use crate::events::LogSink;
use crate::models::OutputRow;

type PathLock = Arc<tokio::sync::Mutex<()>>;

static WORKBOOK_LOCKS: OnceLock<Mutex<HashMap<PathBuf, PathLock>>> = OnceLock::new();

/// Lock guarding read-modify-write cycles on `path`.
fn workbook_lock(path: &Path) -> PathLock {
    let registry = WORKBOOK_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut locks = registry.lock().unwrap_or_else(|e| e.into_inner());
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

/// Appends rows to the output workbook.
#[derive(Debug, Clone)]
pub struct WorkbookSink {
    template_path: PathBuf,
    output_path: PathBuf,
}

impl WorkbookSink {
    pub fn new(template_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
            output_path: output_path.into(),
        }
    }

    /// Sink using `template_file` and `output_file` inside `dir`.
    pub fn in_dir(dir: &Path, template_file: &str, output_file: &str) -> Self {
        Self::new(dir.join(template_file), dir.join(output_file))
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Append one row after the last used row of the first sheet.
    pub async fn append(&self, row: &OutputRow, log: &dyn LogSink) -> Result<(), PersistenceError> {
        let lock = workbook_lock(&self.output_path);
        let _guard = lock.lock().await;

        if !tokio::fs::try_exists(&self.output_path).await? {
            if !tokio::fs::try_exists(&self.template_path).await? {
                return Err(PersistenceError::MissingTemplate(
                    self.template_path.clone(),
                ));
            }
            log.log("Output file does not exist. Creating new file...");
            tokio::fs::copy(&self.template_path, &self.output_path).await?;
        }

        let path = self.output_path.clone();
        let cells = row.cells().to_vec();
        let written_at = tokio::task::spawn_blocking(move || append_row(&path, &cells))
            .await
            .map_err(|e| PersistenceError::Task(e.to_string()))??;
        debug!("Wrote row {} to {}", written_at, self.output_path.display());

        log.log("Excel processing complete.");
        Ok(())
    }

    /// Current output workbook bytes, `None` when nothing was written yet.
    pub async fn read_output(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        let lock = workbook_lock(&self.output_path);
        let _guard = lock.lock().await;
        match tokio::fs::read(&self.output_path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Blocking append. Returns the 1-based row number written.
fn append_row(path: &Path, cells: &[String]) -> Result<u32, PersistenceError> {
    let mut book = umya_spreadsheet::reader::xlsx::read(path)
        .map_err(|e| PersistenceError::Format(e.to_string()))?;
    let sheet = book
        .get_sheet_mut(&0)
        .ok_or_else(|| PersistenceError::NoSheet(path.to_path_buf()))?;

    let row = sheet.get_highest_row() + 1;
    for (idx, value) in cells.iter().enumerate() {
        // blank cells stay unset
        if value.is_empty() {
            continue;
        }
        sheet
            .get_cell_mut((idx as u32 + 1, row))
            .set_value_string(value.as_str());
    }

    umya_spreadsheet::writer::xlsx::write(&book, path)
        .map_err(|e| PersistenceError::Format(e.to_string()))?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryLog;
    use crate::models::{ProductRecord, RowDefaults};

    fn write_template(path: &Path) {
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_mut(&0).unwrap();
        sheet.get_cell_mut((1, 1)).set_value_string("Header");
        sheet.get_cell_mut((2, 1)).set_value_string("Title");
        umya_spreadsheet::writer::xlsx::write(&book, path).unwrap();
    }

    fn row(title: &str) -> OutputRow {
        let record = ProductRecord {
            title: title.to_string(),
            description: format!("{} description", title),
            images: vec![],
            attributes: Default::default(),
            specification: None,
        };
        OutputRow::from_record(&record, "https://example.com/dp/1", &RowDefaults::default())
    }

    #[tokio::test]
    async fn test_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WorkbookSink::in_dir(dir.path(), "template.xlsx", "output.xlsx");
        let log = MemoryLog::new();

        let err = sink.append(&row("One"), &log).await.unwrap_err();
        assert!(matches!(err, PersistenceError::MissingTemplate(_)));
        assert!(!sink.output_path().exists());
    }

    #[tokio::test]
    async fn test_creates_output_from_template_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        write_template(&dir.path().join("template.xlsx"));
        let sink = WorkbookSink::in_dir(dir.path(), "template.xlsx", "output.xlsx");
        let log = MemoryLog::new();

        sink.append(&row("One"), &log).await.unwrap();
        sink.append(&row("Two"), &log).await.unwrap();

        assert_eq!(
            log.lines(),
            vec![
                "Output file does not exist. Creating new file...",
                "Excel processing complete.",
                "Excel processing complete.",
            ]
        );

        let book = umya_spreadsheet::reader::xlsx::read(sink.output_path()).unwrap();
        let sheet = book.get_sheet(&0).unwrap();
        assert_eq!(sheet.get_value((2, 1)), "Title");
        assert_eq!(sheet.get_value((2, 2)), "One");
        assert_eq!(sheet.get_value((2, 3)), "Two");
        assert_eq!(sheet.get_value((13, 3)), "https://example.com/dp/1");
        assert_eq!(sheet.get_value((11, 2)), "10");

        // template untouched
        let template = umya_spreadsheet::reader::xlsx::read(sink.template_path()).unwrap();
        assert_eq!(template.get_sheet(&0).unwrap().get_highest_row(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        write_template(&dir.path().join("template.xlsx"));
        let sink = Arc::new(WorkbookSink::in_dir(
            dir.path(),
            "template.xlsx",
            "output.xlsx",
        ));

        let mut handles = Vec::new();
        for i in 0..4 {
            let sink = Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                let log = MemoryLog::new();
                sink.append(&row(&format!("Item {}", i)), &log).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let book = umya_spreadsheet::reader::xlsx::read(sink.output_path()).unwrap();
        assert_eq!(book.get_sheet(&0).unwrap().get_highest_row(), 5);
    }

    #[tokio::test]
    async fn test_read_output() {
        let dir = tempfile::tempdir().unwrap();
        write_template(&dir.path().join("template.xlsx"));
        let sink = WorkbookSink::in_dir(dir.path(), "template.xlsx", "output.xlsx");
        assert!(sink.read_output().await.unwrap().is_none());

        sink.append(&row("One"), &MemoryLog::new()).await.unwrap();
        let bytes = sink.read_output().await.unwrap().unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
