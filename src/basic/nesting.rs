use std::sync::LazyLock;

use regex::Regex;

use super::{starts_with_ci, starts_with_keyword};

static IF_THEN_ONELINER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^IF\b.+\bTHEN\b.+").expect("static regex"));
static FOR_NEXT_ONELINER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^FOR\b.+\bTO\b.+\bNEXT\b.*").expect("static regex"));
static DO_LOOP_ONELINER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^DO\b.*\bLOOP\b.*").expect("static regex"));

/// `IF cond THEN stmt` on a single line.
pub fn is_if_then_oneliner(code: &str) -> bool {
    IF_THEN_ONELINER.is_match(&code.to_ascii_uppercase())
}

/// `FOR i = a TO b : ... : NEXT` on a single line.
pub fn is_for_next_oneliner(code: &str) -> bool {
    FOR_NEXT_ONELINER.is_match(&code.to_ascii_uppercase())
}

/// `DO : ... : LOOP` on a single line.
pub fn is_do_loop_oneliner(code: &str) -> bool {
    DO_LOOP_ONELINER.is_match(&code.to_ascii_uppercase())
}

const OPENERS: &[&str] = &["FUNCTION", "SUB", "SELECT CASE"];
const CLOSERS: &[&str] = &["END FUNCTION", "END SUB", "END SELECT", "ENDIF", "END IF", "NEXT", "LOOP"];

/// Running block depth over a file's lines, used for display indentation.
///
/// The level is assumed never to go negative for well-formed programs; it is
/// not clamped.
#[derive(Debug, Default, Clone)]
pub struct NestingTracker {
    level: i32,
}

impl NestingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Feeds one comment-stripped code text and returns the level to display
    /// for that line.
    pub fn next_level(&mut self, code: &str) -> i32 {
        let current = self.level;

        if opens_block(code) {
            self.level += 1;
            current
        } else if starts_with_ci(code, "ELSE") || starts_with_ci(code, "CASE ") {
            current - 1
        } else if CLOSERS.iter().any(|kw| starts_with_keyword(code, kw)) {
            self.level -= 1;
            self.level
        } else {
            current
        }
    }
}

fn opens_block(code: &str) -> bool {
    OPENERS.iter().any(|kw| starts_with_keyword(code, kw))
        || (starts_with_keyword(code, "DO") && !is_do_loop_oneliner(code))
        || (starts_with_keyword(code, "FOR") && !is_for_next_oneliner(code))
        || (starts_with_keyword(code, "IF") && !is_if_then_oneliner(code))
}
