use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::assembler;
use crate::error::{ProfilerError, Result};
use crate::extractor;
use crate::file_reader;
use crate::models::{Function, Line, LoadMode, SourceFileSpan};
use crate::profiler_log;

/// What to load: `<directory>/<base_name>.bas` and/or `<base_name>.csv`.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub directory: PathBuf,
    pub base_name: String,
    cancel: Arc<AtomicBool>,
}

impl LoadRequest {
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            base_name: base_name.into(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Splits a picked file (`demo.bas`, `demo.csv` or plain `demo`) into
    /// its directory and base name.
    pub fn from_path(path: &Path) -> Self {
        let directory = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base_name = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bas") || ext.eq_ignore_ascii_case("csv") => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            _ => path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        Self::new(directory, base_name)
    }

    pub fn source_file(&self) -> String {
        format!("{}.bas", self.base_name)
    }

    pub fn source_path(&self) -> PathBuf {
        self.directory.join(self.source_file())
    }

    pub fn log_path(&self) -> PathBuf {
        self.directory.join(format!("{}.csv", self.base_name))
    }

    /// Shared flag; raising it stops the load before its next file read.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Ordering for function listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionOrder {
    /// Declaration order.
    Source,
    /// Case-insensitive, ascending.
    Name,
    /// Average time per call, highest first.
    Time,
    /// Call count, highest first.
    Calls,
}

/// One node of the file → function → line hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub enum OutlineEntry {
    Line(usize),
    Function { function: usize, body: Vec<usize> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileOutline {
    pub span: usize,
    pub entries: Vec<OutlineEntry>,
}

/// The finished, line-addressable model of a profiled program.
///
/// Built once by [`SourceModel::load`] and read-only afterwards.
#[derive(Debug, Default)]
pub struct SourceModel {
    mode: LoadMode,
    name: String,
    lines: Vec<Line>,
    spans: Vec<SourceFileSpan>,
    functions: Vec<Function>,
}

impl SourceModel {
    pub fn load(request: &LoadRequest) -> Result<Self> {
        let start = Instant::now();
        let cancelled = request.cancel.as_ref();
        let source_path = request.source_path();
        let log_path = request.log_path();

        let (mut lines, mut spans, mode) = if source_path.is_file() {
            let assembly = assembler::assemble(&request.directory, &request.source_file(), cancelled)?;
            let mut lines = assembly.lines;
            if log_path.is_file() {
                let records = profiler_log::read_log(&log_path, cancelled)?;
                profiler_log::overlay(&records, &mut lines, &assembly.spans)?;
                (lines, assembly.spans, LoadMode::SourceAndProfiler)
            } else {
                (lines, assembly.spans, LoadMode::SourceOnly)
            }
        } else if log_path.is_file() {
            let records = profiler_log::read_log(&log_path, cancelled)?;
            let (lines, spans) = profiler_log::build_from_log(records);
            (lines, spans, LoadMode::ProfilerOnly)
        } else {
            return Err(ProfilerError::FileNotFound(source_path));
        };

        file_reader::checkpoint(cancelled)?;
        let (kept, mut functions) = extractor::extract(std::mem::take(&mut lines), &mut spans);
        extractor::collect_references(&mut functions, &kept);

        info!(
            program = %request.base_name,
            mode = mode.as_str(),
            files = spans.len(),
            lines = kept.len(),
            functions = functions.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "program loaded"
        );

        Ok(Self {
            mode,
            name: request.base_name.clone(),
            lines: kept,
            spans,
            functions,
        })
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    pub fn program_name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(index)
    }

    /// Spans in file-appearance order; the main program comes first.
    pub fn spans(&self) -> &[SourceFileSpan] {
        &self.spans
    }

    pub fn span(&self, name: &str) -> Option<&SourceFileSpan> {
        self.spans.iter().find(|s| s.name == name)
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Case-insensitive lookup.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn sorted_functions(&self, order: FunctionOrder) -> Vec<&Function> {
        let mut list: Vec<&Function> = self.functions.iter().collect();
        match order {
            FunctionOrder::Source => {}
            FunctionOrder::Name => list.sort_by_key(|f| f.key()),
            FunctionOrder::Time => list.sort_by(|a, b| {
                b.total_time_micros
                    .partial_cmp(&a.total_time_micros)
                    .unwrap_or(CmpOrdering::Equal)
            }),
            FunctionOrder::Calls => list.sort_by(|a, b| b.calls.cmp(&a.calls)),
        }
        list
    }

    /// Time attributed to all files: top-level code plus function averages.
    pub fn total_time_micros(&self) -> f64 {
        self.spans.iter().map(|s| s.header.time_micros).sum()
    }

    /// Groups every span's lines under the functions that contain them.
    ///
    /// A declaration opens a function node that runs through its end line;
    /// blank lines right after the end line stay in the node.
    pub fn outline(&self) -> Vec<FileOutline> {
        let by_declaration: HashMap<usize, usize> = self
            .functions
            .iter()
            .enumerate()
            .map(|(fi, f)| (f.declaration, fi))
            .collect();

        self.spans
            .iter()
            .enumerate()
            .map(|(si, span)| {
                let mut entries = Vec::new();
                let mut open: Option<(usize, Vec<usize>)> = None;
                let mut ended = false;

                for idx in span.indices() {
                    let line = &self.lines[idx];
                    if ended && !line.is_empty() {
                        if let Some((function, body)) = open.take() {
                            entries.push(OutlineEntry::Function { function, body });
                        }
                        ended = false;
                    }
                    if let Some(&fi) = by_declaration.get(&idx) {
                        if let Some((function, body)) = open.take() {
                            entries.push(OutlineEntry::Function { function, body });
                        }
                        open = Some((fi, Vec::new()));
                        ended = false;
                        continue;
                    }
                    match open.as_mut() {
                        Some((_, body)) => {
                            body.push(idx);
                            if line.is_block_end() {
                                ended = true;
                            }
                        }
                        None => entries.push(OutlineEntry::Line(idx)),
                    }
                }
                if let Some((function, body)) = open {
                    entries.push(OutlineEntry::Function { function, body });
                }

                FileOutline { span: si, entries }
            })
            .collect()
    }

    /// Span and enclosing function of the line at `index`, as placed by
    /// [`outline`](Self::outline).
    pub fn locate(&self, index: usize) -> Option<(usize, Option<usize>)> {
        let si = self.spans.iter().position(|s| s.contains(index))?;
        let outline = self.outline();
        let file = outline.into_iter().nth(si)?;
        for entry in file.entries {
            match entry {
                OutlineEntry::Line(i) if i == index => return Some((si, None)),
                OutlineEntry::Function { function, body }
                    if self.functions[function].declaration == index || body.contains(&index) =>
                {
                    return Some((si, Some(function)))
                }
                _ => {}
            }
        }
        Some((si, None))
    }
}
