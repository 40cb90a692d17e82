use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use memmap2::Mmap;
use tracing::trace;

use crate::error::{ProfilerError, Result};

pub const MMAP_THRESHOLD: u64 = 64 * 1024;
pub const BINARY_CHECK_SIZE: usize = 8192;

/// Fails with `Cancelled` once the flag is raised. Loads call this before
/// every file read.
pub fn checkpoint(cancelled: &AtomicBool) -> Result<()> {
    if cancelled.load(Ordering::Relaxed) {
        Err(ProfilerError::Cancelled)
    } else {
        Ok(())
    }
}

/// Reads a whole text file. The handle is closed before returning on every path.
pub fn read_file(path: &Path, cancelled: &AtomicBool) -> Result<String> {
    checkpoint(cancelled)?;
    let metadata = std::fs::metadata(path).map_err(|e| ProfilerError::from_io(path, e))?;
    if !metadata.is_file() {
        return Err(ProfilerError::FileNotFound(path.to_path_buf()));
    }
    trace!(path = %path.display(), bytes = metadata.len(), "reading file");
    if metadata.len() == 0 {
        return Ok(String::new());
    }
    if metadata.len() >= MMAP_THRESHOLD {
        read_file_mmap(path)
    } else {
        read_file_buffered(path)
    }
}

fn read_file_mmap(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| ProfilerError::from_io(path, e))?;
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| ProfilerError::from_io(path, e))?;
    decode(path, &mmap[..])
}

fn read_file_buffered(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| ProfilerError::from_io(path, e))?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut all = Vec::new();
    reader.read_to_end(&mut all).map_err(|e| ProfilerError::from_io(path, e))?;
    decode(path, &all)
}

fn decode(path: &Path, data: &[u8]) -> Result<String> {
    if is_binary(data) {
        return Err(ProfilerError::bad_format(format!(
            "{} is not a text file",
            path.display()
        )));
    }
    match std::str::from_utf8(data) {
        Ok(s) => Ok(s.to_owned()),
        // Non-UTF-8 bytes (Latin-1 exports) become replacement characters.
        Err(_) => Ok(String::from_utf8_lossy(data).into_owned()),
    }
}

pub fn is_binary(data: &[u8]) -> bool {
    let check_len = data.len().min(BINARY_CHECK_SIZE);
    data[..check_len].contains(&0)
}
