// ABOUTME: Utility functions for the revelation application
// ABOUTME: Path validation, directory creation and recursive copy helpers

use crate::errors::{RevelationError, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Validate that a presentation file exists
pub fn validate_presentation(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(RevelationError::PresentationNotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Validate that a style override is an existing `.css` file
pub fn validate_style(path: &Path) -> Result<()> {
    let is_css = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("css"))
        .unwrap_or(false);

    if !path.is_file() || !is_css {
        return Err(RevelationError::StyleInvalid(path.to_path_buf()));
    }
    Ok(())
}

/// Return `path` if it is an existing directory
pub fn existing_dir(path: PathBuf) -> Option<PathBuf> {
    if path.is_dir() {
        Some(path)
    } else {
        None
    }
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    } else if !path.is_dir() {
        return Err(RevelationError::OutputConflict(path.to_path_buf()));
    }
    Ok(())
}

/// Recursively copy the directory `src` to `dst`, creating `dst`
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    debug!("Copying {:?} to {:?}", src, dst);

    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| RevelationError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .unwrap_or_else(|_| Path::new(""));
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Get the absolute, symlink-free path
pub fn get_absolute_path(path: &Path) -> Result<PathBuf> {
    Ok(fs::canonicalize(path)?)
}

/// File name of `path` as a string, empty if it has none
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_style() {
        let dir = TempDir::new().unwrap();
        let css = dir.path().join("custom.css");
        let txt = dir.path().join("custom.txt");
        fs::write(&css, "body {}").unwrap();
        fs::write(&txt, "body {}").unwrap();

        assert!(validate_style(&css).is_ok());
        assert!(matches!(
            validate_style(&txt),
            Err(RevelationError::StyleInvalid(_))
        ));
        assert!(matches!(
            validate_style(&dir.path().join("missing.css")),
            Err(RevelationError::StyleInvalid(_))
        ));
    }

    #[test]
    fn test_copy_dir_all() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("nested/deeper")).unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();
        fs::write(src.join("nested/deeper/leaf.txt"), "leaf").unwrap();

        let dst = dir.path().join("dst");
        copy_dir_all(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
        assert_eq!(
            fs::read_to_string(dst.join("nested/deeper/leaf.txt")).unwrap(),
            "leaf"
        );
        assert!(src.join("top.txt").exists());
    }
}
