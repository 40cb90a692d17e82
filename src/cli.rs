use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::output::{BodyLayout, OutputFormat, RenderOptions};
use crate::source_model::FunctionOrder;

#[derive(Parser, Debug)]
#[command(name = "basprof")]
#[command(version, about = "Annotate an MMBasic program with its profiler log", long_about = None)]
#[command(after_help = "\
Examples:
  basprof demo.bas                       Source plus demo.csv when present
  basprof demo.csv --sort time --top 10  Ten slowest functions
  basprof demo --outline --format json   File/function/line hierarchy as JSON")]
pub struct CliArgs {
    /// `<name>.bas`, `<name>.csv` or a bare `<dir>/<name>`
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Yaml)]
    pub format: Format,

    /// Write to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Function list order (default: declaration order)
    #[arg(long, value_enum)]
    pub sort: Option<SortKey>,

    /// Only list the first N functions
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Group lines by file and enclosing function
    #[arg(long, conflicts_with = "no_lines")]
    pub outline: bool,

    /// Omit per-line data
    #[arg(long)]
    pub no_lines: bool,

    /// Cancel the load after N seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Verbose logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum Format {
    Yaml,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum SortKey {
    Name,
    Time,
    Calls,
}

impl CliArgs {
    pub fn output_format(&self) -> OutputFormat {
        match self.format {
            Format::Yaml => OutputFormat::Yaml,
            Format::Json => OutputFormat::Json,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        let order = match self.sort {
            None => FunctionOrder::Source,
            Some(SortKey::Name) => FunctionOrder::Name,
            Some(SortKey::Time) => FunctionOrder::Time,
            Some(SortKey::Calls) => FunctionOrder::Calls,
        };
        let body = if self.no_lines {
            BodyLayout::None
        } else if self.outline {
            BodyLayout::Outline
        } else {
            BodyLayout::Lines
        };
        RenderOptions { order, top: self.top, body }
    }

    /// `warn` by default, raised one step per `-v`.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
