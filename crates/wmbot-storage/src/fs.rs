//! Directory helpers.
//!
//! Tree removal walks the directory breadth-first into a flat arena and then
//! deletes the arena back to front, so children always go before their parent.
//! No recursion, and symlinks are unlinked rather than followed, so a link
//! cycle cannot trap the walk.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, StorageError};

struct Entry {
    path: PathBuf,
    is_dir: bool,
}

/// Remove `path` and everything below it. An absent path is not an error.
pub fn remove_tree_blocking(path: &Path) -> Result<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StorageError::at(path)(e)),
    };

    let mut arena = vec![Entry {
        path: path.to_path_buf(),
        is_dir: meta.is_dir(),
    }];

    let mut cursor = 0;
    while cursor < arena.len() {
        if arena[cursor].is_dir {
            let dir = arena[cursor].path.clone();
            let read = match std::fs::read_dir(&dir) {
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    cursor += 1;
                    continue;
                }
                Err(e) => return Err(StorageError::at(&dir)(e)),
            };
            for child in read {
                let child = child.map_err(StorageError::at(&dir))?;
                // DirEntry::file_type does not follow symlinks.
                let file_type = child.file_type().map_err(StorageError::at(&dir))?;
                arena.push(Entry {
                    path: child.path(),
                    is_dir: file_type.is_dir(),
                });
            }
        }
        cursor += 1;
    }

    for entry in arena.iter().rev() {
        let removed = if entry.is_dir {
            std::fs::remove_dir(&entry.path)
        } else {
            std::fs::remove_file(&entry.path)
        };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::at(&entry.path)(e)),
        }
    }
    Ok(())
}

/// Async wrapper around [`remove_tree_blocking`] on the blocking pool.
pub async fn remove_tree(path: &Path) -> Result<()> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || remove_tree_blocking(&owned))
        .await
        .map_err(|e| StorageError::Io {
            path: path.to_path_buf(),
            source: io::Error::other(e),
        })?
}

/// Wipe `path` (if present) and recreate it as an empty directory.
pub async fn recreate_dir(path: &Path) -> Result<()> {
    remove_tree(path).await?;
    tokio::fs::create_dir_all(path)
        .await
        .map_err(StorageError::at(path))
}

/// Number of entries directly inside `path`; 0 when it does not exist.
pub async fn count_entries(path: &Path) -> Result<usize> {
    let mut read = match tokio::fs::read_dir(path).await {
        Ok(read) => read,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StorageError::at(path)(e)),
    };
    let mut count = 0;
    while read
        .next_entry()
        .await
        .map_err(StorageError::at(path))?
        .is_some()
    {
        count += 1;
    }
    Ok(count)
}
