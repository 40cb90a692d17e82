use std::fmt;
use std::ops::Range;

use crate::basic;

/// Key of the span holding the main program file.
pub const MAIN_PROGRAM: &str = "Main Program";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Empty,
    Code,
    Comment,
    Option,
    Define,
    Include,
    /// Synthetic file header; never read from disk.
    Header,
}

impl LineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LineKind::Empty => "empty",
            LineKind::Code => "code",
            LineKind::Comment => "comment",
            LineKind::Option => "option",
            LineKind::Define => "define",
            LineKind::Include => "include",
            LineKind::Header => "header",
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical source line after classification.
///
/// `kind == Comment` implies an empty `code`; `kind == Empty` implies both
/// `code` and `comment` are empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub kind: LineKind,
    pub code: String,
    pub comment: String,
    /// Position in the flattened sequence. Re-stamped by the cleanup pass.
    pub index: usize,
    /// 1-based position within the physical file (or the log row's line number).
    pub file_line_no: u32,
    /// Running count of code lines read before this one, across all files.
    pub code_line_no: u32,
    /// Display nesting depth.
    pub level: i32,
    pub calls: u32,
    pub time_micros: f64,
}

impl Line {
    pub fn new(kind: LineKind, code: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            comment: comment.into(),
            index: 0,
            file_line_no: 0,
            code_line_no: 0,
            level: 0,
            calls: 0,
            time_micros: 0.0,
        }
    }

    pub fn empty() -> Self {
        Self::new(LineKind::Empty, "", "")
    }

    pub fn header(text: impl Into<String>) -> Self {
        Self::new(LineKind::Header, text, "")
    }

    /// Lines the profiler numbers: code, `#INCLUDE` and `#DEFINE`.
    pub fn is_code_line(&self) -> bool {
        matches!(self.kind, LineKind::Code | LineKind::Include | LineKind::Define)
    }

    pub fn is_empty(&self) -> bool {
        self.kind == LineKind::Empty
    }

    pub fn is_header(&self) -> bool {
        self.kind == LineKind::Header
    }

    /// `FUNCTION name(...)` or `SUB name`.
    pub fn is_declaration(&self) -> bool {
        basic::is_declaration(&self.code)
    }

    /// `END FUNCTION` or `END SUB`.
    pub fn is_block_end(&self) -> bool {
        basic::is_block_end(&self.code)
    }

    /// Total time consumed by this line over all its executions.
    pub fn weighted_time(&self) -> f64 {
        self.time_micros * f64::from(self.calls)
    }
}

/// One physical file contributing a contiguous range of the line sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFileSpan {
    /// Key in the span map: `MAIN_PROGRAM` or the include path as referenced.
    pub name: String,
    /// File name as referenced, relative to the program directory.
    pub path: String,
    pub first_index: usize,
    pub len: usize,
    pub header: Line,
}

impl SourceFileSpan {
    pub fn new(name: impl Into<String>, path: impl Into<String>, first_index: usize, len: usize) -> Self {
        let name = name.into();
        let header = Line::header(name.clone());
        Self {
            name,
            path: path.into(),
            first_index,
            len,
            header,
        }
    }

    /// Inclusive upper bound, `None` for a file that contributed no lines.
    pub fn last_index(&self) -> Option<usize> {
        (self.len > 0).then(|| self.first_index + self.len - 1)
    }

    pub fn indices(&self) -> Range<usize> {
        self.first_index..self.first_index + self.len
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices().contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Sub,
    Function,
}

impl FunctionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FunctionKind::Sub => "sub",
            FunctionKind::Function => "function",
        }
    }
}

/// A `SUB` or `FUNCTION` with its inferred profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Name as written in the declaration.
    pub name: String,
    pub kind: FunctionKind,
    /// Index of the declaration line.
    pub declaration: usize,
    pub calls: u32,
    /// Weighted body time while scanning; average time per call once finalized.
    pub total_time_micros: f64,
    /// Indices of lines calling this function by name.
    pub references: Vec<usize>,
}

impl Function {
    pub fn new(name: impl Into<String>, kind: FunctionKind, declaration: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            declaration,
            calls: 0,
            total_time_micros: 0.0,
            references: Vec::new(),
        }
    }

    /// Case-normalized name used for matching.
    pub fn key(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    pub fn is_sub(&self) -> bool {
        self.kind == FunctionKind::Sub
    }

    pub fn is_function(&self) -> bool {
        self.kind == FunctionKind::Function
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Which inputs a load found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    #[default]
    NoData,
    SourceOnly,
    ProfilerOnly,
    SourceAndProfiler,
}

impl LoadMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadMode::NoData => "noData",
            LoadMode::SourceOnly => "sourceOnly",
            LoadMode::ProfilerOnly => "profilerOnly",
            LoadMode::SourceAndProfiler => "sourceAndProfiler",
        }
    }

    pub fn has_profile(self) -> bool {
        matches!(self, LoadMode::ProfilerOnly | LoadMode::SourceAndProfiler)
    }
}
