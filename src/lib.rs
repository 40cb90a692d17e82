//! Reconstructs an MMBasic program and its profiler log into one
//! line-addressable model: source lines with nesting levels, per-file
//! spans, functions with call counts and average times, and call sites.

pub mod assembler;
pub mod basic;
pub mod cli;
pub mod error;
pub mod extractor;
pub mod file_reader;
pub mod loader;
pub mod models;
pub mod output;
pub mod profiler_log;
pub mod source_model;

pub use error::{ProfilerError, Result};
pub use loader::LoadService;
pub use models::{Function, FunctionKind, Line, LineKind, LoadMode, SourceFileSpan};
pub use source_model::{FunctionOrder, LoadRequest, SourceModel};
