use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::Storage;
use crate::storage::types::ExportDocument;

/// Writes the export as pretty-printed JSON to `<directory>/<file_name>`.
///
/// The document is first written next to the target and then renamed over it, so a
/// reader never sees a half-written export.
pub struct FileStorage {
    output_path: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(directory: P, file_name: &str) -> Result<Self, StorageError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory).map_err(|e| {
            error!("Failed to create output dir {}: {}", directory.display(), e);
            StorageError::WriteFailed(format!("{}: {}", directory.display(), e))
        })?;
        info!("FileStorage initialized at {}", directory.display());

        Ok(Self {
            output_path: directory.join(file_name),
        })
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .output_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.output_path.with_file_name(name)
    }

    fn write_failed(path: &Path, e: impl std::fmt::Display) -> StorageError {
        error!("Failed to write {}: {}", path.display(), e);
        StorageError::WriteFailed(format!("{}: {}", path.display(), e))
    }

    fn read_failed(path: &Path, e: impl std::fmt::Display) -> StorageError {
        error!("Failed to read {}: {}", path.display(), e);
        StorageError::ReadFailed(format!("{}: {}", path.display(), e))
    }
}

impl Storage for FileStorage {
    fn save_export(&self, document: &ExportDocument) -> Result<(), StorageError> {
        let tmp = self.temp_path();
        let file = File::create(&tmp).map_err(|e| Self::write_failed(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, document)
            .map_err(|e| Self::write_failed(&tmp, e))?;
        writer.flush().map_err(|e| Self::write_failed(&tmp, e))?;
        drop(writer);

        fs::rename(&tmp, &self.output_path).map_err(|e| Self::write_failed(&self.output_path, e))?;
        info!(
            "Saved {} session(s) to {}",
            document.session_count,
            self.output_path.display()
        );
        Ok(())
    }

    fn load_export(&self) -> Result<ExportDocument, StorageError> {
        let file = File::open(&self.output_path).map_err(|e| Self::read_failed(&self.output_path, e))?;
        let document: ExportDocument = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Self::read_failed(&self.output_path, e))?;
        debug!(
            "Loaded {} session(s) from {}",
            document.session_count,
            self.output_path.display()
        );
        Ok(document)
    }
}
