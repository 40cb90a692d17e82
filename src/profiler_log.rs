//! Reader for the profiler's CSV export.
//!
//! Line 1 is a header `/<label>/<field>/<file>.bas` (leading `/` optional).
//! Every following line is `calls,time,"code",file,lineNo`, where the code
//! text may itself contain commas. An empty file name means the main program.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use tracing::{debug, trace};

use crate::basic;
use crate::error::{ProfilerError, Result};
use crate::file_reader;
use crate::models::{Line, SourceFileSpan, MAIN_PROGRAM};

pub const SOURCE_EXTENSION: &str = ".bas";

/// One log row. Consumed immediately, never kept in the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilerRecord {
    pub calls: u32,
    pub time_micros: f64,
    pub code: String,
    /// Span key; an empty name in the log is mapped to `MAIN_PROGRAM`.
    pub file_name: String,
    pub line_no: u32,
}

/// Reads and validates a whole log. The header is checked before any row
/// is parsed.
pub fn read_log(path: &Path, cancelled: &AtomicBool) -> Result<Vec<ProfilerRecord>> {
    let content = file_reader::read_file(path, cancelled)?;
    let mut rows = content.lines();

    validate_header(rows.next())?;

    let mut records = Vec::new();
    for (n, row) in rows.enumerate() {
        if row.trim().is_empty() {
            continue;
        }
        // Row numbers in messages are 1-based file lines; the header is line 1.
        records.push(parse_record(row, n + 2)?);
    }
    debug!(path = %path.display(), records = records.len(), "read profiler log");
    Ok(records)
}

pub fn validate_header(header: Option<&str>) -> Result<()> {
    let header = header.map(str::trim).unwrap_or_default();
    if header.is_empty() {
        return Err(ProfilerError::bad_format("profiler log has no header"));
    }
    let header = header.strip_prefix('/').unwrap_or(header);
    let parts: Vec<&str> = header.split('/').collect();
    if parts.len() != 3 {
        return Err(ProfilerError::bad_format(format!(
            "profiler log header has {} fields, expected 3",
            parts.len()
        )));
    }
    if !parts[2].trim_end().ends_with(SOURCE_EXTENSION) {
        return Err(ProfilerError::bad_format(format!(
            "profiler log header does not name a {} file",
            SOURCE_EXTENSION
        )));
    }
    Ok(())
}

pub fn parse_record(row: &str, row_no: usize) -> Result<ProfilerRecord> {
    let parts: Vec<&str> = row.split(',').collect();
    if parts.len() < 4 {
        return Err(ProfilerError::bad_format(format!(
            "profiler log line {} has {} fields, expected at least 4",
            row_no,
            parts.len()
        )));
    }
    let n = parts.len();

    let code = if n > 4 { parts[2..n - 2].join(",") } else { String::new() };
    let code = code.trim();
    let code = code.strip_prefix('"').unwrap_or(code);
    let code = code.strip_suffix('"').unwrap_or(code);

    let file_name = parts[n - 2].trim();
    let file_name = if file_name.is_empty() { MAIN_PROGRAM } else { file_name };

    Ok(ProfilerRecord {
        calls: parse_count(parts[0]),
        time_micros: parse_time(parts[1]),
        code: code.to_owned(),
        file_name: file_name.to_owned(),
        line_no: parse_count(parts[n - 1]),
    })
}

/// Integer cell; anything unparsable counts as 0.
pub fn parse_count(cell: &str) -> u32 {
    cell.trim().parse().unwrap_or_else(|_| {
        trace!(cell, "unparsable count, using 0");
        0
    })
}

/// Time cell in microseconds. Falls back to decimal-comma notation, then 0.
pub fn parse_time(cell: &str) -> f64 {
    let cell = cell.trim();
    cell.parse::<f64>()
        .or_else(|_| cell.replace(',', ".").parse::<f64>())
        .unwrap_or_else(|_| {
            trace!(cell, "unparsable time, using 0");
            0.0
        })
}

/// Writes each record's counters onto the source line it refers to.
///
/// Every row is resolved before anything is written, so a fatal row leaves
/// `lines` untouched.
pub fn overlay(records: &[ProfilerRecord], lines: &mut [Line], spans: &[SourceFileSpan]) -> Result<()> {
    let mut targets = Vec::with_capacity(records.len());
    for record in records {
        let span = spans
            .iter()
            .find(|s| s.name == record.file_name)
            .ok_or_else(|| {
                ProfilerError::bad_format(format!("unknown source file \"{}\"", record.file_name))
            })?;
        if record.line_no == 0 || record.line_no as usize > span.len {
            return Err(ProfilerError::bad_format(format!(
                "line {} is outside \"{}\" ({} lines)",
                record.line_no, record.file_name, span.len
            )));
        }
        targets.push(span.first_index + record.line_no as usize - 1);
    }

    for (record, idx) in records.iter().zip(targets) {
        let line = &mut lines[idx];
        line.calls = record.calls;
        line.time_micros = record.time_micros;
    }
    Ok(())
}

/// Builds the line sequence from the log alone, grouped by file name in
/// first-seen order. No nesting levels are computed in this mode.
pub fn build_from_log(records: Vec<ProfilerRecord>) -> (Vec<Line>, Vec<SourceFileSpan>) {
    let mut groups: Vec<(String, Vec<Line>)> = Vec::new();
    let mut code_line_no = 0u32;

    for record in records {
        let mut line = basic::classify(&record.code);
        line.calls = record.calls;
        line.time_micros = record.time_micros;
        line.file_line_no = record.line_no;
        line.code_line_no = code_line_no;
        if line.is_code_line() {
            code_line_no += 1;
        }

        match groups.iter_mut().find(|(name, _)| *name == record.file_name) {
            Some((_, group)) => group.push(line),
            None => groups.push((record.file_name, vec![line])),
        }
    }

    let mut lines = Vec::new();
    let mut spans = Vec::with_capacity(groups.len());
    for (name, group) in groups {
        spans.push(SourceFileSpan::new(name.clone(), name, lines.len(), group.len()));
        lines.extend(group);
    }
    for (i, line) in lines.iter_mut().enumerate() {
        line.index = i;
    }
    (lines, spans)
}
