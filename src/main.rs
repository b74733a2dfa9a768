use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser};
use pptx_rtl::{Config, GlossaryTranslator};

/// Convert a left-to-right PowerPoint deck into a mirrored right-to-left one.
#[derive(Parser, Debug)]
#[command(name = "pptx-rtl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input .pptx file
    input: PathBuf,

    /// Output .pptx file
    output: PathBuf,

    /// JSON object mapping source strings to translations; without it only the layout is converted
    #[arg(long)]
    glossary: Option<PathBuf>,

    /// Write a JSON report of what each slide went through
    #[arg(long)]
    report: Option<PathBuf>,

    /// Font family for translated text
    #[arg(long)]
    font: Option<String>,

    /// Maximum concurrent translation calls
    #[arg(long)]
    workers: Option<usize>,

    /// Per-call translation timeout in seconds
    #[arg(long = "timeout-secs")]
    timeout_secs: Option<u64>,

    /// Use debug logging level
    #[arg(short = 'v', long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn run(args: Args) -> Result<(), pptx_rtl::Error> {
    let mut cfg = Config::from_env();
    if let Some(font) = args.font {
        cfg.target_font = font;
    }
    if let Some(workers) = args.workers.filter(|&w| w > 0) {
        cfg.max_workers = workers;
    }
    if let Some(secs) = args.timeout_secs {
        cfg.translation_timeout = Duration::from_secs(secs);
    }

    let report = match &args.glossary {
        Some(path) => {
            let translator = Arc::new(GlossaryTranslator::from_path(path)?);
            pptx_rtl::translate_pptx_to_rtl(&args.input, &args.output, translator, &cfg)?
        }
        None => pptx_rtl::convert_pptx_to_rtl(&args.input, &args.output, &cfg)?,
    };

    let unresolved = report.unresolved_collisions();
    if unresolved > 0 {
        log::warn!("{unresolved} collision(s) could not be resolved");
    }
    if let Some(path) = &args.report {
        report.write_json(path)?;
    }
    println!(
        "Converted {} slide(s) -> {}",
        report.slides.len(),
        args.output.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
