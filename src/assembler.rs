//! Flattens the main program and its `#INCLUDE` files into one line sequence.
//!
//! Main-file lines come first; each include is appended in directive order
//! right after the previously loaded file, so every file owns a contiguous
//! span. Includes are resolved one level deep: directives inside an include
//! file are kept as lines but not followed.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use tracing::{debug, warn};

use crate::basic::{self, NestingTracker};
use crate::error::{ProfilerError, Result};
use crate::file_reader;
use crate::models::{Line, SourceFileSpan, MAIN_PROGRAM};

/// Shortest directive that can name a file: `#INCLUDE "x"`.
const MIN_INCLUDE_LEN: usize = 12;

/// Counters threaded through every line read during assembly.
#[derive(Debug, Default, Clone)]
pub struct AssemblyState {
    nesting: NestingTracker,
    code_line_no: u32,
}

impl AssemblyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nesting restarts at zero for every physical file; code-line numbering
    /// keeps running.
    pub fn begin_file(&mut self) {
        self.nesting = NestingTracker::new();
    }

    pub fn code_line_no(&self) -> u32 {
        self.code_line_no
    }

    pub fn level(&self) -> i32 {
        self.nesting.level()
    }

    /// Classifies `raw` and stamps it with the current counters.
    pub fn admit(&mut self, raw: &str, file_line_no: u32) -> Line {
        let mut line = basic::classify(raw);
        line.level = self.nesting.next_level(&line.code);
        line.file_line_no = file_line_no;
        line.code_line_no = self.code_line_no;
        if line.is_code_line() {
            self.code_line_no += 1;
        }
        line
    }
}

/// Result of assembling a program: the flat sequence and one span per file.
#[derive(Debug, Default)]
pub struct Assembly {
    pub lines: Vec<Line>,
    pub spans: Vec<SourceFileSpan>,
}

impl Assembly {
    pub fn span(&self, name: &str) -> Option<&SourceFileSpan> {
        self.spans.iter().find(|s| s.name == name)
    }
}

/// Loads `main_file` (relative to `dir`) and every file it includes.
pub fn assemble(dir: &Path, main_file: &str, cancelled: &AtomicBool) -> Result<Assembly> {
    let mut state = AssemblyState::new();
    let mut assembly = Assembly::default();

    let main_len = load_file(dir, main_file, &mut state, &mut assembly.lines, cancelled)?;
    assembly.spans.push(SourceFileSpan::new(MAIN_PROGRAM, main_file, 0, main_len));
    debug!(file = main_file, lines = main_len, "loaded main program");

    for n in 0..main_len {
        let name = match include_target(&assembly.lines[n].code) {
            Ok(Some(name)) => name.to_owned(),
            Ok(None) => continue,
            Err(e) => {
                return Err(ProfilerError::bad_format(format!(
                    "{} line {}: {}",
                    main_file,
                    assembly.lines[n].file_line_no,
                    e
                )))
            }
        };

        if assembly.span(&name).is_some() {
            warn!(file = %name, "file included twice, ignoring repeat");
            continue;
        }

        let first = assembly.lines.len();
        let count = load_file(dir, &name, &mut state, &mut assembly.lines, cancelled)?;
        if count == 0 {
            warn!(file = %name, "include file is empty");
        }
        debug!(file = %name, first, lines = count, "loaded include");
        assembly.spans.push(SourceFileSpan::new(name.clone(), name, first, count));
    }

    Ok(assembly)
}

/// Reads one physical file through the classifier, appending to `lines`.
/// Returns the number of lines read.
pub fn load_file(
    dir: &Path,
    name: &str,
    state: &mut AssemblyState,
    lines: &mut Vec<Line>,
    cancelled: &AtomicBool,
) -> Result<usize> {
    let content = file_reader::read_file(&dir.join(name), cancelled)?;
    state.begin_file();

    let before = lines.len();
    for (i, raw) in content.lines().enumerate() {
        let mut line = state.admit(raw, i as u32 + 1);
        line.index = lines.len();
        lines.push(line);
    }
    Ok(lines.len() - before)
}

/// File name named by a `#INCLUDE "name"` directive, if `code` is one.
pub fn include_target(code: &str) -> std::result::Result<Option<&str>, &'static str> {
    if code.len() < MIN_INCLUDE_LEN || !basic::starts_with_ci(code, "#INCLUDE") {
        return Ok(None);
    }
    let open = code.find('"').ok_or("#INCLUDE without a quoted file name")? + 1;
    let close = code[open..]
        .find('"')
        .ok_or("#INCLUDE file name is missing its closing quote")?;
    Ok(Some(&code[open..open + close]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineKind;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn state_counts_only_code_lines() {
        let mut state = AssemblyState::new();
        let a = state.admit("' header", 1);
        let b = state.admit("OPTION EXPLICIT", 2);
        let c = state.admit("PRINT 1", 3);
        let d = state.admit("", 4);
        let e = state.admit("#INCLUDE \"x.inc\"", 5);
        let f = state.admit("PRINT 2", 6);
        assert_eq!(
            [a.code_line_no, b.code_line_no, c.code_line_no, d.code_line_no, e.code_line_no, f.code_line_no],
            [0, 0, 0, 1, 1, 2]
        );
        assert_eq!(state.code_line_no(), 3);
        assert_eq!(f.file_line_no, 6);
    }

    #[test]
    fn state_tracks_levels() {
        let mut state = AssemblyState::new();
        let levels: Vec<i32> = ["SUB A", "X=1", "END SUB"]
            .iter()
            .enumerate()
            .map(|(i, l)| state.admit(l, i as u32 + 1).level)
            .collect();
        assert_eq!(levels, vec![0, 1, 0]);
    }

    #[test]
    fn include_target_parsing() {
        assert_eq!(include_target("#INCLUDE \"lib.inc\""), Ok(Some("lib.inc")));
        assert_eq!(include_target("#include \"sub/gfx.inc\""), Ok(Some("sub/gfx.inc")));
        assert_eq!(include_target("#INCLUDE"), Ok(None));
        assert_eq!(include_target("PRINT \"#INCLUDE\""), Ok(None));
        assert!(include_target("#INCLUDE \"broken.inc").is_err());
    }

    #[test]
    fn include_is_appended_after_main() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prog.bas", "PRINT 1\n#INCLUDE \"inc.bas\"\nPRINT 2\n");
        write(dir.path(), "inc.bas", "SUB Hello\nPRINT \"hi\"\nEND SUB\n");

        let asm = assemble(dir.path(), "prog.bas", &AtomicBool::new(false)).unwrap();
        assert_eq!(asm.lines.len(), 3 + 3);

        let main = asm.span(MAIN_PROGRAM).unwrap();
        assert_eq!((main.first_index, main.last_index()), (0, Some(2)));
        let inc = asm.span("inc.bas").unwrap();
        assert_eq!((inc.first_index, inc.last_index()), (3, Some(5)));
        assert_eq!(asm.lines[3].code, "SUB Hello");
        assert_eq!(asm.lines[3].file_line_no, 1);
        assert_eq!(asm.lines[4].level, 1);
        assert_eq!(asm.lines[1].kind, LineKind::Include);
    }

    #[test]
    fn code_numbering_continues_into_includes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prog.bas", "' demo\nPRINT 1\n#INCLUDE \"a.inc\"\n");
        write(dir.path(), "a.inc", "X=1\n");

        let asm = assemble(dir.path(), "prog.bas", &AtomicBool::new(false)).unwrap();
        assert_eq!(asm.lines[3].code_line_no, 2);
    }

    #[test]
    fn spans_follow_directive_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prog.bas", "#INCLUDE \"b.inc\"\n#INCLUDE \"a.inc\"\n");
        write(dir.path(), "a.inc", "A=1\n");
        write(dir.path(), "b.inc", "B=1\nB=2\n");

        let asm = assemble(dir.path(), "prog.bas", &AtomicBool::new(false)).unwrap();
        let names: Vec<&str> = asm.spans.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![MAIN_PROGRAM, "b.inc", "a.inc"]);
        assert_eq!(asm.span("a.inc").unwrap().first_index, 4);
    }

    #[test]
    fn missing_main_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = assemble(dir.path(), "prog.bas", &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, ProfilerError::FileNotFound(_)));
    }

    #[test]
    fn missing_include_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prog.bas", "#INCLUDE \"gone.inc\"\n");
        let err = assemble(dir.path(), "prog.bas", &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, ProfilerError::FileNotFound(ref p) if p.ends_with("gone.inc")));
    }

    #[test]
    fn malformed_include_is_bad_format() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prog.bas", "PRINT 1\n#INCLUDE \"broken.inc\n");
        let err = assemble(dir.path(), "prog.bas", &AtomicBool::new(false)).unwrap_err();
        assert!(matches!(err, ProfilerError::BadFileFormat(ref m) if m.contains("line 2")));
    }

    #[test]
    fn nested_includes_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prog.bas", "#INCLUDE \"a.inc\"\n");
        write(dir.path(), "a.inc", "#INCLUDE \"b.inc\"\n");

        let asm = assemble(dir.path(), "prog.bas", &AtomicBool::new(false)).unwrap();
        assert_eq!(asm.spans.len(), 2);
    }

    #[test]
    fn cancellation_stops_before_next_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prog.bas", "PRINT 1\n");
        let err = assemble(dir.path(), "prog.bas", &AtomicBool::new(true)).unwrap_err();
        assert!(matches!(err, ProfilerError::Cancelled));
    }
}
