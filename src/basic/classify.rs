use super::starts_with_ci;
use crate::models::{Line, LineKind};

/// Classifies one raw source line and splits off its trailing comment.
///
/// Counters, level and line numbers are left at zero for later stages.
pub fn classify(raw: &str) -> Line {
    let text = raw.trim();
    if text.is_empty() {
        return Line::empty();
    }

    let (code, comment) = match find_comment_marker(text) {
        Some(0) => return Line::new(LineKind::Comment, "", text),
        Some(pos) => (text[..pos].trim(), text[pos..].trim()),
        None => (text, ""),
    };

    let kind = if starts_with_ci(code, "OPTION") {
        LineKind::Option
    } else if starts_with_ci(code, "#DEFINE") {
        LineKind::Define
    } else if starts_with_ci(code, "#INCLUDE") {
        LineKind::Include
    } else {
        LineKind::Code
    };

    Line::new(kind, code, comment)
}

/// Byte offset where the comment starts in an already trimmed line.
///
/// A leading apostrophe makes the whole line a comment. Otherwise a
/// `<space>'` pair is preferred over a bare apostrophe. Apostrophes inside
/// double-quoted strings are ignored.
pub fn find_comment_marker(text: &str) -> Option<usize> {
    if text.starts_with('\'') {
        return Some(0);
    }

    let mut in_string = false;
    let mut first_bare = None;
    let mut prev = '\0';
    for (pos, c) in text.char_indices() {
        match c {
            '"' => in_string = !in_string,
            '\'' if !in_string => {
                if prev == ' ' {
                    return Some(pos - 1);
                }
                first_bare.get_or_insert(pos);
            }
            _ => {}
        }
        prev = c;
    }
    first_bare
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_line_is_empty() {
        let line = classify("   \t ");
        assert_eq!(line.kind, LineKind::Empty);
        assert_eq!(line.code, "");
        assert_eq!(line.comment, "");
    }

    #[test]
    fn indented_comment_line() {
        let line = classify("  ' just a comment");
        assert_eq!(line.kind, LineKind::Comment);
        assert_eq!(line.comment, "' just a comment");
        assert_eq!(line.code, "");
    }

    #[test]
    fn trailing_comment_is_split() {
        let line = classify("PRINT 1 ' note");
        assert_eq!(line.kind, LineKind::Code);
        assert_eq!(line.code, "PRINT 1");
        assert_eq!(line.comment, "' note");
    }

    #[test]
    fn bare_apostrophe_splits_too() {
        let line = classify("X=1'set x");
        assert_eq!(line.code, "X=1");
        assert_eq!(line.comment, "'set x");
    }

    #[test]
    fn spaced_marker_preferred_over_bare() {
        assert_eq!(find_comment_marker("A'B ' C"), Some(3));
    }

    #[test]
    fn apostrophe_in_string_is_not_a_comment() {
        let line = classify("PRINT \"it's fine\"");
        assert_eq!(line.code, "PRINT \"it's fine\"");
        assert_eq!(line.comment, "");

        let line = classify("PRINT \"it's\" ' real one");
        assert_eq!(line.code, "PRINT \"it's\"");
        assert_eq!(line.comment, "' real one");
    }

    #[test]
    fn directive_kinds() {
        assert_eq!(classify("Option Explicit").kind, LineKind::Option);
        assert_eq!(classify("#define \"A\",\"B\"").kind, LineKind::Define);
        assert_eq!(classify("#Include \"lib.inc\" ' helpers").kind, LineKind::Include);
        assert_eq!(classify("DIM a%").kind, LineKind::Code);
    }

    #[test]
    fn original_case_is_kept() {
        let line = classify("  Print Foo  ");
        assert_eq!(line.code, "Print Foo");
    }
}
