use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use basprof::cli::CliArgs;
use basprof::output::{self, MetaInfo, OutputEnvelope};
use basprof::{LoadRequest, LoadService, ProfilerError};

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let args = match CliArgs::try_parse() {
        Ok(a) => a,
        Err(e) => {
            e.print().ok();
            // Help and version are reported through the same path.
            return if e.use_stderr() { 1 } else { 0 };
        }
    };
    init_logging(args.log_level());
    execute(&args)
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn execute(args: &CliArgs) -> i32 {
    let start = Instant::now();
    let request = LoadRequest::from_path(&args.input);
    let program = request.base_name.clone();
    let cancelled = request.cancel_token();

    let service = match LoadService::new() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "cannot start loader thread");
            return 1;
        }
    };

    ctrlc_handler(&cancelled);

    if let Some(secs) = args.timeout {
        let cancelled = Arc::clone(&cancelled);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            cancelled.store(true, Ordering::Relaxed);
        });
    }

    let result = service.load_blocking(request);
    let elapsed = start.elapsed().as_millis();
    let timed_out = matches!(result, Err(ProfilerError::Cancelled));

    let (model, error, code) = match result {
        Ok(model) => (Some(model), None, 0),
        Err(ProfilerError::Cancelled) => (None, Some("Operation cancelled".to_owned()), 2),
        Err(e) => (None, Some(e.to_string()), 1),
    };

    let envelope = OutputEnvelope {
        meta: Some(MetaInfo { program, elapsed_ms: elapsed, timeout: timed_out }),
        error,
        model: model.as_deref(),
        options: args.render_options(),
    };
    if emit(&envelope, args) { code } else { 1 }
}

fn emit(envelope: &OutputEnvelope, args: &CliArgs) -> bool {
    match args.output {
        Some(ref path) => match output::write_output_to(envelope, args.output_format(), path) {
            Ok(()) => true,
            Err(e) => {
                error!(path = %path, error = %e, "cannot write output file");
                false
            }
        },
        None => {
            output::write_output(envelope, args.output_format());
            true
        }
    }
}

#[cfg(unix)]
fn ctrlc_handler(cancelled: &Arc<AtomicBool>) {
    if let Err(e) = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(cancelled)) {
        debug!(error = %e, "SIGINT handler not installed");
    }
}

#[cfg(not(unix))]
fn ctrlc_handler(_cancelled: &Arc<AtomicBool>) {}
