use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced by the workspace manager and the watermark store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A filesystem call failed. `path` is the entry being touched.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The uploaded watermark is not a PNG file (or has no usable name).
    #[error("watermark must be a PNG image, got `{file_name}`")]
    InvalidWatermark { file_name: String },
}

impl StorageError {
    /// Closure for `map_err` that attaches `path` to an I/O error.
    pub(crate) fn at(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
        move |source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
