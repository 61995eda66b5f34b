//! File validation utilities for opening files
//!
//! Validates files before the loader opens them, checking for:
//! - File existence and permissions
//! - Directories passed where a file is expected
//! - Binary file detection

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// Errors that can occur when opening a file for browsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOpenError {
    /// File does not exist
    NotFound,
    /// Permission denied to read file
    PermissionDenied,
    /// Path is a directory, not a file
    IsDirectory,
    /// File appears to be binary (contains null bytes)
    BinaryFile,
    /// Other I/O error
    IoError(String),
}

impl FileOpenError {
    /// Get a user-friendly error message
    pub fn user_message(&self, filename: &str) -> String {
        match self {
            Self::NotFound => format!("File not found: {}", filename),
            Self::PermissionDenied => format!("Permission denied: {}", filename),
            Self::IsDirectory => format!("Cannot open directory: {}", filename),
            Self::BinaryFile => format!("Cannot open binary file: {}", filename),
            Self::IoError(msg) => format!("Error opening {}: {}", filename, msg),
        }
    }
}

impl From<std::io::Error> for FileOpenError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => FileOpenError::NotFound,
            std::io::ErrorKind::PermissionDenied => FileOpenError::PermissionDenied,
            _ => FileOpenError::IoError(e.to_string()),
        }
    }
}

impl std::fmt::Display for FileOpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "file not found"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::IsDirectory => write!(f, "is a directory"),
            Self::BinaryFile => write!(f, "binary file"),
            Self::IoError(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FileOpenError {}

/// Validate a file before attempting to open it
///
/// Checks:
/// - File exists
/// - Is not a directory
/// - Has read permissions (via metadata)
///
/// There is no size limit: the loader never holds the whole file.
pub fn validate_file_for_opening(path: &Path) -> Result<(), FileOpenError> {
    let metadata = fs::metadata(path)?;

    if metadata.is_dir() {
        return Err(FileOpenError::IsDirectory);
    }

    Ok(())
}

/// Check if a file is likely binary by scanning for null bytes
///
/// Reads the first 8KB of the file and checks for null bytes,
/// which are common in binary files but rare in text files.
///
/// Returns `false` on any read error (let the actual open fail with a better error).
pub fn is_likely_binary(path: &Path) -> bool {
    let Ok(mut file) = File::open(path) else {
        return false;
    };

    let mut buffer = [0u8; 8192];
    let Ok(bytes_read) = file.read(&mut buffer) else {
        return false;
    };

    buffer[..bytes_read].contains(&0)
}

/// Read up to `limit` bytes from the start of a file as lossy UTF-8
///
/// Used to sniff the delimiter without touching the rest of the file.
pub fn read_prefix(path: &Path, limit: usize) -> std::io::Result<String> {
    let file = File::open(path)?;
    let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Get the filename from a path for display in error messages
pub fn filename_for_display(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_nonexistent_file() {
        let result = validate_file_for_opening(Path::new("/nonexistent/path/file.csv"));
        assert!(matches!(result, Err(FileOpenError::NotFound)));
    }

    #[test]
    fn test_validate_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate_file_for_opening(dir.path());
        assert!(matches!(result, Err(FileOpenError::IsDirectory)));
    }

    #[test]
    fn test_validate_valid_file() {
        let temp = NamedTempFile::new().unwrap();
        assert!(validate_file_for_opening(temp.path()).is_ok());
    }

    #[test]
    fn test_is_binary_text_file() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "name,age").unwrap();
        writeln!(temp, "alice,30").unwrap();
        temp.flush().unwrap();

        assert!(!is_likely_binary(temp.path()));
    }

    #[test]
    fn test_is_binary_with_null_bytes() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"Hello\x00World").unwrap();
        temp.flush().unwrap();

        assert!(is_likely_binary(temp.path()));
    }

    #[test]
    fn test_read_prefix_is_bounded() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"a,b,c\n1,2,3\n").unwrap();
        temp.flush().unwrap();

        assert_eq!(read_prefix(temp.path(), 5).unwrap(), "a,b,c");
        assert_eq!(read_prefix(temp.path(), 1024).unwrap(), "a,b,c\n1,2,3\n");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            FileOpenError::NotFound.user_message("test.csv"),
            "File not found: test.csv"
        );
        assert_eq!(
            FileOpenError::IsDirectory.user_message("mydir"),
            "Cannot open directory: mydir"
        );
        assert_eq!(
            FileOpenError::BinaryFile.user_message("image.png"),
            "Cannot open binary file: image.png"
        );
    }
}
