//! Post-processing of the assembled, profile-merged line sequence.
//!
//! One forward pass per span drops noise lines (comments, `#INCLUDE`
//! directives, repeated blank lines), tightens the span bounds, builds the
//! function list and settles each function's call count and time. A second
//! pass collects the call sites of every function.

use regex::Regex;
use tracing::{debug, warn};

use crate::basic;
use crate::models::{Function, Line, LineKind, SourceFileSpan};

/// Per-span state of the extraction pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractState {
    /// Function whose body is being scanned; `None` means file level.
    pub current: Option<usize>,
    /// Waiting for the first executed body line to supply the call count.
    pub catch_next: bool,
}

impl ExtractState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes the kept line at `idx`.
    pub fn step(&mut self, idx: usize, lines: &mut [Line], functions: &mut Vec<Function>, header: &mut Line) {
        if lines[idx].is_declaration() {
            let declared = basic::parse_declaration(&lines[idx].code);
            if let Some(open) = self.current {
                warn!(function = %functions[open].name, "declaration inside an unterminated function");
                self.finalize(open, lines, functions, header);
            }
            if let Some((kind, name)) = declared {
                functions.push(Function::new(name, kind, idx));
                self.current = Some(functions.len() - 1);
                self.catch_next = true;
            }
            return;
        }

        let line = &lines[idx];
        let calls = line.calls;
        let weighted = line.weighted_time();
        let is_end = line.is_block_end();

        let Some(fi) = self.current else {
            header.time_micros += weighted;
            return;
        };

        let function = &mut functions[fi];
        // A declaration's own counter only says the header was reached; the
        // first body line that ran holds the real number of calls.
        if self.catch_next && (calls > 0 || is_end) {
            function.calls = calls;
            self.catch_next = false;
        }
        function.total_time_micros += weighted;

        if is_end {
            self.finalize(fi, lines, functions, header);
        }
    }

    /// Turns the weighted total into an average per call and adds it to the
    /// enclosing file's total.
    pub fn finalize(&mut self, fi: usize, lines: &mut [Line], functions: &mut [Function], header: &mut Line) {
        let function = &mut functions[fi];
        function.total_time_micros = if function.calls == 0 {
            0.0
        } else {
            function.total_time_micros / f64::from(function.calls)
        };

        let declaration = &mut lines[function.declaration];
        declaration.calls = function.calls;
        declaration.time_micros = function.total_time_micros;

        header.time_micros += function.total_time_micros;
        self.current = None;
        self.catch_next = false;
    }
}

fn is_noise(line: &Line, last_was_empty: bool) -> bool {
    match line.kind {
        LineKind::Comment | LineKind::Include => true,
        LineKind::Empty => last_was_empty,
        _ => false,
    }
}

/// Runs the cleanup and extraction pass. Spans must be contiguous, in
/// order, and cover `lines` exactly; their bounds are rewritten to match
/// the returned sequence.
pub fn extract(lines: Vec<Line>, spans: &mut [SourceFileSpan]) -> (Vec<Line>, Vec<Function>) {
    let total = lines.len();
    let mut source = lines.into_iter();
    let mut kept: Vec<Line> = Vec::with_capacity(total);
    let mut functions = Vec::new();
    let mut last_was_empty = true;

    for span in spans.iter_mut() {
        let first = kept.len();
        let mut state = ExtractState::new();

        for mut line in source.by_ref().take(span.len) {
            if is_noise(&line, last_was_empty) {
                continue;
            }
            last_was_empty = line.is_empty();
            line.index = kept.len();
            kept.push(line);
            state.step(kept.len() - 1, &mut kept, &mut functions, &mut span.header);
        }

        if let Some(open) = state.current {
            warn!(function = %functions[open].name, file = %span.name, "function not terminated before end of file");
            state.finalize(open, &mut kept, &mut functions, &mut span.header);
        }

        debug!(file = %span.name, before = span.len, after = kept.len() - first, "cleaned span");
        span.first_index = first;
        span.len = kept.len() - first;
    }

    (kept, functions)
}

/// Pattern matching a call of `name`: preceded by start of line, `+`, `-`,
/// `,`, `=` or whitespace, followed by a space, `(`, `:` or end of line.
pub fn reference_pattern(name: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?i)(?:^|[+\-,=\s]){}(?:[ (:]|$)", regex::escape(name)))
}

/// Fills `Function::references` with the indices of lines whose code text
/// calls the function, skipping its own declaration.
pub fn collect_references(functions: &mut [Function], lines: &[Line]) {
    for function in functions.iter_mut() {
        if function.name.is_empty() {
            continue;
        }
        let pattern = match reference_pattern(&function.name) {
            Ok(p) => p,
            Err(e) => {
                warn!(function = %function.name, error = %e, "cannot build reference pattern");
                continue;
            }
        };
        function.references = lines
            .iter()
            .enumerate()
            .filter(|(i, line)| *i != function.declaration && pattern.is_match(&line.code))
            .map(|(i, _)| i)
            .collect();
    }
}
