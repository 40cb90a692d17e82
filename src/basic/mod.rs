//! MMBasic dialect rules: line classification, block nesting and the
//! keyword checks shared by the later passes.

mod classify;
mod nesting;

pub use classify::{classify, find_comment_marker};
pub use nesting::{is_do_loop_oneliner, is_for_next_oneliner, is_if_then_oneliner, NestingTracker};

use crate::models::FunctionKind;

/// ASCII case-insensitive `starts_with`.
pub fn starts_with_ci(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Like `starts_with_ci`, but the keyword must not run into an identifier:
/// `SUB` matches `SUB x` and `SUB` but not `SUBTOTAL=1`.
pub fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    if !starts_with_ci(text, keyword) {
        return false;
    }
    match text.as_bytes().get(keyword.len()) {
        None => true,
        Some(&b) => !(b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'%' || b == b'!'),
    }
}

pub fn is_declaration(code: &str) -> bool {
    starts_with_ci(code, "FUNCTION ") || starts_with_ci(code, "SUB ")
}

pub fn is_block_end(code: &str) -> bool {
    starts_with_ci(code, "END FUNCTION") || starts_with_ci(code, "END SUB")
}

/// Splits a declaration line into its kind and name. A `FUNCTION` name runs
/// up to `(`; a `SUB` name up to the first space or `(`.
pub fn parse_declaration(code: &str) -> Option<(FunctionKind, String)> {
    if starts_with_ci(code, "FUNCTION ") {
        let rest = &code["FUNCTION ".len()..];
        let name = match rest.find('(') {
            Some(pos) => &rest[..pos],
            None => rest,
        };
        Some((FunctionKind::Function, name.trim().to_owned()))
    } else if starts_with_ci(code, "SUB ") {
        let rest = code["SUB ".len()..].trim_start();
        let end = rest.find(|c: char| c == ' ' || c == '(').unwrap_or(rest.len());
        Some((FunctionKind::Sub, rest[..end].trim().to_owned()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_ci_ignores_case() {
        assert!(starts_with_ci("#include \"a.inc\"", "#INCLUDE"));
        assert!(!starts_with_ci("#inc", "#INCLUDE"));
    }

    #[test]
    fn keyword_needs_boundary() {
        assert!(starts_with_keyword("SUB Foo", "SUB"));
        assert!(starts_with_keyword("loop", "LOOP"));
        assert!(starts_with_keyword("IF(a>1) THEN", "IF"));
        assert!(!starts_with_keyword("SUBTOTAL=1", "SUB"));
        assert!(!starts_with_keyword("DONE$=\"y\"", "DO"));
        assert!(!starts_with_keyword("NEXT_ITEM=2", "NEXT"));
    }

    #[test]
    fn declaration_detection() {
        assert!(is_declaration("Function Area(w, h)"));
        assert!(is_declaration("sub DrawBox"));
        assert!(!is_declaration("SUBTOTAL = 1"));
        assert!(!is_declaration("END SUB"));
    }

    #[test]
    fn block_end_detection() {
        assert!(is_block_end("End Function"));
        assert!(is_block_end("END SUB"));
        assert!(!is_block_end("END"));
        assert!(!is_block_end("END SELECT"));
    }

    #[test]
    fn function_name_stops_at_paren() {
        assert_eq!(
            parse_declaration("FUNCTION Area$(w, h) AS STRING"),
            Some((FunctionKind::Function, "Area$".to_owned()))
        );
    }

    #[test]
    fn function_without_parens_keeps_rest() {
        assert_eq!(
            parse_declaration("FUNCTION Ticks"),
            Some((FunctionKind::Function, "Ticks".to_owned()))
        );
    }

    #[test]
    fn sub_name_stops_at_space_or_paren() {
        assert_eq!(parse_declaration("SUB DrawBox x, y"), Some((FunctionKind::Sub, "DrawBox".to_owned())));
        assert_eq!(parse_declaration("Sub Plot(a, b)"), Some((FunctionKind::Sub, "Plot".to_owned())));
        assert_eq!(parse_declaration("SUB Init"), Some((FunctionKind::Sub, "Init".to_owned())));
    }

    #[test]
    fn non_declaration_has_no_name() {
        assert_eq!(parse_declaration("PRINT 1"), None);
    }
}
