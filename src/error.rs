use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a load. Malformed numeric cells in the profiler log
/// are not represented here; they fall back to zero.
#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Bad file format: {0}")]
    BadFileFormat(String),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Load cancelled")]
    Cancelled,
}

impl ProfilerError {
    pub fn bad_format(msg: impl Into<String>) -> Self {
        ProfilerError::BadFileFormat(msg.into())
    }

    /// Maps an I/O failure on `path`, turning `NotFound` into `FileNotFound`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            ProfilerError::FileNotFound(path)
        } else {
            ProfilerError::Io { path, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, ProfilerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_file_not_found() {
        let err = ProfilerError::from_io("a.bas", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(matches!(err, ProfilerError::FileNotFound(ref p) if p == &PathBuf::from("a.bas")));
    }

    #[test]
    fn other_io_errors_keep_source() {
        let err = ProfilerError::from_io("a.bas", io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(matches!(err, ProfilerError::Io { .. }));
        assert!(err.to_string().contains("a.bas"));
    }

    #[test]
    fn bad_format_message() {
        let err = ProfilerError::bad_format("header has 2 fields");
        assert_eq!(err.to_string(), "Bad file format: header has 2 fields");
    }
}
