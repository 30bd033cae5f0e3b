use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::trace;

use crate::commons::error::PreflightIoError;

pub fn create_dir(dir: &Path) -> Result<(), PreflightIoError> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)
            .map_err(|e| PreflightIoError::new(format!("could not create dir: {}", dir.to_string_lossy()), e))?;
    }
    Ok(())
}

/// Derive the path for this file.
pub fn file_path(base_path: &Path, file_name: &str) -> PathBuf {
    let mut path = base_path.to_path_buf();
    path.push(file_name);
    path
}

/// Saves a file, creating parent dirs as needed.
///
/// The content is written to a temporary file in the same directory first,
/// and then renamed to the target. Readers therefore either see the old
/// content or the complete new content, never a partially written file.
pub fn save(content: &[u8], full_path: &Path) -> Result<(), PreflightIoError> {
    let dir = full_path.parent().unwrap_or_else(|| Path::new("."));
    create_dir(dir)?;

    let mut tmp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        PreflightIoError::new(
            format!(
                "Issue writing tmp file for: {}. Check permissions and space on disk.",
                full_path.to_string_lossy()
            ),
            e,
        )
    })?;

    tmp_file.write_all(content).map_err(|e| {
        PreflightIoError::new(
            format!(
                "Issue writing tmp file: {} for: {}. Check permissions and space on disk.",
                tmp_file.path().display(),
                full_path.to_string_lossy()
            ),
            e,
        )
    })?;

    tmp_file.persist(full_path).map_err(|e| {
        PreflightIoError::new(
            format!(
                "Cannot rename temp file {} to {}.",
                e.file.path().display(),
                full_path.display()
            ),
            e.error,
        )
    })?;

    trace!("Saved file: {}", full_path.to_string_lossy());
    Ok(())
}

/// Reads a file, returns `None` if it does not exist.
pub fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, PreflightIoError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PreflightIoError::new(
            format!("Could not read: {}", path.to_string_lossy()),
            e,
        )),
    }
}

/// Deletes a file. A file that does not exist is not an error.
pub fn delete_file(full_path: &Path) -> Result<(), PreflightIoError> {
    trace!("Removing file: {}", full_path.to_string_lossy());
    match fs::remove_file(full_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PreflightIoError::new(
            format!("Could not remove file: {}", full_path.to_string_lossy()),
            e,
        )),
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test;

    #[test]
    fn save_replaces_content_and_leaves_no_tmp_files() {
        test::test_under_tmp(|dir| {
            let path = file_path(&dir.join("nested"), "value.bin");
            save(b"first", &path).unwrap();
            save(b"second", &path).unwrap();

            assert_eq!(read_if_exists(&path).unwrap(), Some(b"second".to_vec()));
            let entries = fs::read_dir(dir.join("nested")).unwrap().count();
            assert_eq!(entries, 1);
        })
    }

    #[test]
    fn delete_missing_file_is_ok() {
        test::test_under_tmp(|dir| {
            let path = file_path(&dir, "absent");
            delete_file(&path).unwrap();
            assert_eq!(read_if_exists(&path).unwrap(), None);
        })
    }
}
