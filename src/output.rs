use std::io::{self, BufWriter, Write};

use crate::models::{Function, Line};
use crate::source_model::{FileOutline, FunctionOrder, OutlineEntry, SourceModel};

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// How the per-line section of a report is laid out.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub enum BodyLayout {
    /// Omit per-line data.
    None,
    /// Every kept line, grouped by file.
    #[default]
    Lines,
    /// Lines grouped by file, then by enclosing function.
    Outline,
}

#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    pub order: FunctionOrder,
    pub top: Option<usize>,
    pub body: BodyLayout,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            order: FunctionOrder::Source,
            top: None,
            body: BodyLayout::Lines,
        }
    }
}

#[derive(Debug, Default)]
pub struct MetaInfo {
    pub program: String,
    pub elapsed_ms: u128,
    pub timeout: bool,
}

#[derive(Default)]
pub struct OutputEnvelope<'a> {
    pub meta: Option<MetaInfo>,
    pub error: Option<String>,
    pub model: Option<&'a SourceModel>,
    pub options: RenderOptions,
}

pub fn write_output(envelope: &OutputEnvelope, format: OutputFormat) {
    let stdout = io::stdout();
    let mut w = BufWriter::with_capacity(64 * 1024, stdout.lock());
    match format {
        OutputFormat::Yaml => { write_envelope_yaml(&mut w, envelope).ok(); }
        OutputFormat::Json => { write_envelope_json(&mut w, envelope).ok(); }
    }
    w.flush().ok();
}

pub fn write_output_to(envelope: &OutputEnvelope, format: OutputFormat, path: &str) -> io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut w = BufWriter::with_capacity(64 * 1024, file);
    match format {
        OutputFormat::Yaml => write_envelope_yaml(&mut w, envelope)?,
        OutputFormat::Json => write_envelope_json(&mut w, envelope)?,
    }
    w.flush()
}

/// Microseconds rounded to three decimals, trailing zeros dropped.
fn format_micros(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-0" { "0".to_owned() } else { s.to_owned() }
}

/// `file:line` of a kept line, using the physical line number.
fn location(model: &SourceModel, index: usize) -> String {
    let file = model
        .spans()
        .iter()
        .find(|s| s.contains(index))
        .map(|s| s.name.as_str())
        .unwrap_or("?");
    let line_no = model.line(index).map(|l| l.file_line_no).unwrap_or(0);
    format!("{}:{}", file, line_no)
}

fn listed_functions<'m>(model: &'m SourceModel, options: &RenderOptions) -> Vec<&'m Function> {
    let mut list = model.sorted_functions(options.order);
    if let Some(top) = options.top {
        list.truncate(top);
    }
    list
}

// ── YAML output ──

fn write_envelope_yaml(w: &mut impl Write, envelope: &OutputEnvelope) -> io::Result<()> {
    if let Some(ref meta) = envelope.meta {
        write_meta(w, meta, envelope.model)?;
    }
    if let Some(ref error) = envelope.error {
        write_scalar(w, "error", error, 0)?;
    }
    if let Some(model) = envelope.model {
        write_files(w, model)?;
        write_functions(w, model, &envelope.options)?;
        match envelope.options.body {
            BodyLayout::None => {}
            BodyLayout::Lines => write_lines(w, model)?,
            BodyLayout::Outline => write_outline(w, model, &model.outline())?,
        }
    }
    Ok(())
}

fn write_meta(w: &mut impl Write, meta: &MetaInfo, model: Option<&SourceModel>) -> io::Result<()> {
    write!(w, "meta:\n")?;
    write_scalar(w, "program", &meta.program, 2)?;
    if let Some(model) = model {
        write!(w, "  mode: {}\n", model.mode().as_str())?;
        write!(w, "  totalTimeMicros: {}\n", format_micros(model.total_time_micros()))?;
        write!(w, "  fileCount: {}\n", model.spans().len())?;
        write!(w, "  functionCount: {}\n", model.functions().len())?;
        write!(w, "  lineCount: {}\n", model.lines().len())?;
    }
    if meta.elapsed_ms != 0 {
        write!(w, "  elapsedMs: {}\n", meta.elapsed_ms)?;
    }
    if meta.timeout {
        write!(w, "  timeout: true\n")?;
    }
    Ok(())
}

fn write_files(w: &mut impl Write, model: &SourceModel) -> io::Result<()> {
    write!(w, "files:\n")?;
    for span in model.spans() {
        write!(w, "- name: ")?;
        write_inline_string(w, &span.name)?;
        write!(w, "\n")?;
        write_scalar(w, "path", &span.path, 2)?;
        write!(w, "  firstIndex: {}\n", span.first_index)?;
        if let Some(last) = span.last_index() {
            write!(w, "  lastIndex: {}\n", last)?;
        }
        write!(w, "  lines: {}\n", span.len)?;
        write!(w, "  timeMicros: {}\n", format_micros(span.header.time_micros))?;
    }
    Ok(())
}

fn write_functions(w: &mut impl Write, model: &SourceModel, options: &RenderOptions) -> io::Result<()> {
    let list = listed_functions(model, options);
    if list.is_empty() {
        return Ok(());
    }
    write!(w, "functions:\n")?;
    for f in list {
        write!(w, "- name: ")?;
        write_inline_string(w, &f.name)?;
        write!(w, "\n")?;
        write!(w, "  kind: {}\n", f.kind.as_str())?;
        write_scalar(w, "at", &location(model, f.declaration), 2)?;
        write!(w, "  calls: {}\n", f.calls)?;
        write!(w, "  avgTimeMicros: {}\n", format_micros(f.total_time_micros))?;
        if !f.references.is_empty() {
            write!(w, "  references:\n")?;
            for &r in &f.references {
                write!(w, "  - ")?;
                write_inline_string(w, &location(model, r))?;
                write!(w, "\n")?;
            }
        }
    }
    Ok(())
}

fn write_lines(w: &mut impl Write, model: &SourceModel) -> io::Result<()> {
    write!(w, "lines:\n")?;
    for span in model.spans() {
        write!(w, "- file: ")?;
        write_inline_string(w, &span.name)?;
        write!(w, "\n")?;
        if span.is_empty() {
            continue;
        }
        write!(w, "  lines:\n")?;
        for idx in span.indices() {
            write_line(w, &model.lines()[idx], 2)?;
        }
    }
    Ok(())
}

fn write_outline(w: &mut impl Write, model: &SourceModel, outline: &[FileOutline]) -> io::Result<()> {
    write!(w, "outline:\n")?;
    for file in outline {
        let span = &model.spans()[file.span];
        write!(w, "- file: ")?;
        write_inline_string(w, &span.name)?;
        write!(w, "\n")?;
        if file.entries.is_empty() {
            continue;
        }
        write!(w, "  entries:\n")?;
        for entry in &file.entries {
            match entry {
                OutlineEntry::Line(idx) => write_line(w, &model.lines()[*idx], 2)?,
                OutlineEntry::Function { function, body } => {
                    let f = &model.functions()[*function];
                    write!(w, "  - function: ")?;
                    write_inline_string(w, &f.name)?;
                    write!(w, "\n")?;
                    write!(w, "    calls: {}\n", f.calls)?;
                    write!(w, "    avgTimeMicros: {}\n", format_micros(f.total_time_micros))?;
                    if !body.is_empty() {
                        write!(w, "    body:\n")?;
                        for &idx in body {
                            write_line(w, &model.lines()[idx], 4)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn write_line(w: &mut impl Write, line: &Line, indent: usize) -> io::Result<()> {
    write_indent(w, indent)?;
    write!(w, "- no: {}\n", line.file_line_no)?;
    write_indent(w, indent)?;
    write!(w, "  kind: {}\n", line.kind.as_str())?;
    write_indent(w, indent)?;
    write!(w, "  level: {}\n", line.level)?;
    write_indent(w, indent)?;
    write!(w, "  index: {}\n", line.index)?;
    if line.is_code_line() {
        write_indent(w, indent)?;
        write!(w, "  codeLineNo: {}\n", line.code_line_no)?;
    }
    if line.calls != 0 || line.time_micros != 0.0 {
        write_indent(w, indent)?;
        write!(w, "  calls: {}\n", line.calls)?;
        write_indent(w, indent)?;
        write!(w, "  timeMicros: {}\n", format_micros(line.time_micros))?;
    }
    if !line.code.is_empty() {
        write_scalar(w, "code", &line.code, indent + 2)?;
    }
    if !line.comment.is_empty() {
        write_scalar(w, "comment", &line.comment, indent + 2)?;
    }
    Ok(())
}

fn write_scalar(w: &mut impl Write, key: &str, value: &str, indent: usize) -> io::Result<()> {
    write_indent(w, indent)?;
    write!(w, "{}: ", key)?;
    write_inline_string(w, value)?;
    write!(w, "\n")?;
    Ok(())
}

fn write_inline_string(w: &mut impl Write, value: &str) -> io::Result<()> {
    if value.is_empty() {
        return write!(w, "''");
    }

    if needs_quoting(value) {
        write!(w, "\"")?;
        for c in value.chars() {
            match c {
                '"' => write!(w, "\\\"")?,
                '\\' => write!(w, "\\\\")?,
                '\n' => write!(w, "\\n")?,
                '\r' => write!(w, "\\r")?,
                '\t' => write!(w, "\\t")?,
                _ => write!(w, "{}", c)?,
            }
        }
        write!(w, "\"")?;
    } else {
        write!(w, "{}", value)?;
    }
    Ok(())
}

fn needs_quoting(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }

    let first = value.as_bytes()[0];
    if matches!(first, b'-' | b'[' | b']' | b'{' | b'}' | b'\'' | b'"' |
        b'!' | b'&' | b'*' | b'|' | b'>' | b'%' | b'@' | b'`' | b',' | b'?' | b'#') {
        return true;
    }

    match value {
        "true" | "false" | "null" | "True" | "False" | "Null" |
        "TRUE" | "FALSE" | "NULL" | "yes" | "no" | "Yes" | "No" |
        "YES" | "NO" | "on" | "off" | "On" | "Off" | "ON" | "OFF" => return true,
        _ => {}
    }

    if looks_numeric(value) {
        return true;
    }

    // BASIC sources lean on `:` separators, `'` remarks and trailing spaces.
    if value.ends_with(' ') || value.starts_with(' ') {
        return true;
    }
    value.chars().any(|c| matches!(c, ':' | '#' | '\n' | '\r' | '\t'))
}

fn looks_numeric(value: &str) -> bool {
    let bytes = value.as_bytes();
    let start = match bytes.first() {
        Some(b'-') | Some(b'+') => 1,
        Some(_) => 0,
        None => return false,
    };
    let rest = &bytes[start..];
    if rest.is_empty() {
        return false;
    }
    let mut has_dot = false;
    for &b in rest {
        match b {
            b'0'..=b'9' => {}
            b'.' if !has_dot => has_dot = true,
            _ => return false,
        }
    }
    true
}

fn write_indent(w: &mut impl Write, n: usize) -> io::Result<()> {
    const SPACES: &[u8; 32] = b"                                ";
    if n <= SPACES.len() {
        w.write_all(&SPACES[..n])
    } else {
        for _ in 0..n {
            w.write_all(b" ")?;
        }
        Ok(())
    }
}

// ── JSON output ──

fn write_envelope_json(w: &mut impl Write, envelope: &OutputEnvelope) -> io::Result<()> {
    write!(w, "{{")?;
    let mut first = true;

    if let Some(ref meta) = envelope.meta {
        json_comma(w, &mut first)?;
        write_meta_json(w, meta, envelope.model)?;
    }
    if let Some(ref error) = envelope.error {
        json_comma(w, &mut first)?;
        write!(w, "\"error\":")?;
        write_json_string(w, error)?;
    }
    if let Some(model) = envelope.model {
        json_comma(w, &mut first)?;
        write_files_json(w, model)?;
        json_comma(w, &mut first)?;
        write_functions_json(w, model, &envelope.options)?;
        match envelope.options.body {
            BodyLayout::None => {}
            BodyLayout::Lines => {
                json_comma(w, &mut first)?;
                write_lines_json(w, model)?;
            }
            BodyLayout::Outline => {
                json_comma(w, &mut first)?;
                write_outline_json(w, model, &model.outline())?;
            }
        }
    }

    write!(w, "}}\n")
}

fn json_comma(w: &mut impl Write, first: &mut bool) -> io::Result<()> {
    if !*first { write!(w, ",")?; }
    *first = false;
    Ok(())
}

fn write_json_string(w: &mut impl Write, s: &str) -> io::Result<()> {
    write!(w, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(w, "\\\"")?,
            '\\' => write!(w, "\\\\")?,
            '\n' => write!(w, "\\n")?,
            '\r' => write!(w, "\\r")?,
            '\t' => write!(w, "\\t")?,
            c if (c as u32) < 0x20 => write!(w, "\\u{:04x}", c as u32)?,
            _ => write!(w, "{}", c)?,
        }
    }
    write!(w, "\"")
}

fn write_meta_json(w: &mut impl Write, meta: &MetaInfo, model: Option<&SourceModel>) -> io::Result<()> {
    write!(w, "\"meta\":{{\"program\":")?;
    write_json_string(w, &meta.program)?;
    if let Some(model) = model {
        write!(w, ",\"mode\":\"{}\",\"totalTimeMicros\":{},\"fileCount\":{},\"functionCount\":{},\"lineCount\":{}",
            model.mode().as_str(), format_micros(model.total_time_micros()),
            model.spans().len(), model.functions().len(), model.lines().len())?;
    }
    write!(w, ",\"elapsedMs\":{},\"timeout\":{}}}", meta.elapsed_ms, meta.timeout)
}

fn write_files_json(w: &mut impl Write, model: &SourceModel) -> io::Result<()> {
    write!(w, "\"files\":[")?;
    for (i, span) in model.spans().iter().enumerate() {
        if i > 0 { write!(w, ",")?; }
        write!(w, "{{\"name\":")?;
        write_json_string(w, &span.name)?;
        write!(w, ",\"path\":")?;
        write_json_string(w, &span.path)?;
        write!(w, ",\"firstIndex\":{}", span.first_index)?;
        if let Some(last) = span.last_index() {
            write!(w, ",\"lastIndex\":{}", last)?;
        }
        write!(w, ",\"lines\":{},\"timeMicros\":{}}}", span.len, format_micros(span.header.time_micros))?;
    }
    write!(w, "]")
}

fn write_functions_json(w: &mut impl Write, model: &SourceModel, options: &RenderOptions) -> io::Result<()> {
    write!(w, "\"functions\":[")?;
    for (i, f) in listed_functions(model, options).into_iter().enumerate() {
        if i > 0 { write!(w, ",")?; }
        write!(w, "{{\"name\":")?;
        write_json_string(w, &f.name)?;
        write!(w, ",\"kind\":\"{}\",\"at\":", f.kind.as_str())?;
        write_json_string(w, &location(model, f.declaration))?;
        write!(w, ",\"calls\":{},\"avgTimeMicros\":{},\"references\":[",
            f.calls, format_micros(f.total_time_micros))?;
        for (j, &r) in f.references.iter().enumerate() {
            if j > 0 { write!(w, ",")?; }
            write_json_string(w, &location(model, r))?;
        }
        write!(w, "]}}")?;
    }
    write!(w, "]")
}

fn write_lines_json(w: &mut impl Write, model: &SourceModel) -> io::Result<()> {
    write!(w, "\"lines\":[")?;
    for (i, span) in model.spans().iter().enumerate() {
        if i > 0 { write!(w, ",")?; }
        write!(w, "{{\"file\":")?;
        write_json_string(w, &span.name)?;
        write!(w, ",\"lines\":[")?;
        for (j, idx) in span.indices().enumerate() {
            if j > 0 { write!(w, ",")?; }
            write_line_json(w, &model.lines()[idx])?;
        }
        write!(w, "]}}")?;
    }
    write!(w, "]")
}

fn write_outline_json(w: &mut impl Write, model: &SourceModel, outline: &[FileOutline]) -> io::Result<()> {
    write!(w, "\"outline\":[")?;
    for (i, file) in outline.iter().enumerate() {
        if i > 0 { write!(w, ",")?; }
        write!(w, "{{\"file\":")?;
        write_json_string(w, &model.spans()[file.span].name)?;
        write!(w, ",\"entries\":[")?;
        for (j, entry) in file.entries.iter().enumerate() {
            if j > 0 { write!(w, ",")?; }
            match entry {
                OutlineEntry::Line(idx) => write_line_json(w, &model.lines()[*idx])?,
                OutlineEntry::Function { function, body } => {
                    let f = &model.functions()[*function];
                    write!(w, "{{\"function\":")?;
                    write_json_string(w, &f.name)?;
                    write!(w, ",\"calls\":{},\"avgTimeMicros\":{},\"body\":[",
                        f.calls, format_micros(f.total_time_micros))?;
                    for (k, &idx) in body.iter().enumerate() {
                        if k > 0 { write!(w, ",")?; }
                        write_line_json(w, &model.lines()[idx])?;
                    }
                    write!(w, "]}}")?;
                }
            }
        }
        write!(w, "]}}")?;
    }
    write!(w, "]")
}

fn write_line_json(w: &mut impl Write, line: &Line) -> io::Result<()> {
    write!(w, "{{\"no\":{},\"index\":{},\"kind\":\"{}\",\"level\":{}",
        line.file_line_no, line.index, line.kind.as_str(), line.level)?;
    if line.is_code_line() {
        write!(w, ",\"codeLineNo\":{}", line.code_line_no)?;
    }
    write!(w, ",\"calls\":{},\"timeMicros\":{},\"code\":", line.calls, format_micros(line.time_micros))?;
    write_json_string(w, &line.code)?;
    if !line.comment.is_empty() {
        write!(w, ",\"comment\":")?;
        write_json_string(w, &line.comment)?;
    }
    write!(w, "}}")
}
