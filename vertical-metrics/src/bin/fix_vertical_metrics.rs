//! Fix vertical metrics
//!
//! This command line tool makes the `hhea` and `OS/2` vertical metrics of a
//! font agree, so line height renders the same on every platform.

use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use vertical_metrics::{fix_vertical_metrics_with_report, Flavor, MetricsReport};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Make the hhea and OS/2 vertical metrics of a font consistent.",
    after_help = "Examples:\n  fix-vertical-metrics input.ttf output.ttf\n  fix-vertical-metrics input.ttf output.woff --flavor woff\n  fix-vertical-metrics input.ttf output.woff2 --flavor woff2"
)]
struct Args {
    /// The input font file (ttf, otf, woff or woff2).
    input: PathBuf,

    /// The output font file. Defaults to `<input>-fixed.<ext>` next to the input.
    output: Option<PathBuf>,

    /// Output format: ttf, woff or woff2. Defaults to the input's format.
    #[arg(long)]
    flavor: Option<Flavor>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let input = std::fs::read(&args.input)
        .map_err(|e| format!("Unable to read {}: {e}", args.input.display()))?;
    let flavor = args
        .flavor
        .or_else(|| Flavor::sniff(&input))
        .unwrap_or(Flavor::Raw);
    let (output, report) = fix_vertical_metrics_with_report(&input, flavor)?;
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input, flavor, &input));
    std::fs::write(&output_path, output)
        .map_err(|e| format!("Unable to write {}: {e}", output_path.display()))?;

    println!(
        "Fixed vertical metrics: {} -> {}",
        args.input.display(),
        output_path.display()
    );
    print_summary(&report);
    Ok(())
}

fn print_summary(report: &MetricsReport) {
    let MetricsReport {
        line_metrics,
        bbox,
        after,
        ..
    } = report;
    println!(
        "  - hhea ascent: {}, descent: {}, lineGap: {}",
        line_metrics.ascender, line_metrics.descender, line_metrics.line_gap
    );
    println!(
        "  - OS/2 typo: ascent={}, descent={}, lineGap={}",
        after.typo_ascender, after.typo_descender, after.typo_line_gap
    );
    println!(
        "  - OS/2 win: ascent={}, descent={}",
        after.win_ascent, after.win_descent
    );
    println!("  - Glyph bounds: ymax={}, ymin={}", bbox.y_max, bbox.y_min);
    println!(
        "  - USE_TYPO_METRICS bit set: {}",
        after.uses_typo_metrics()
    );
    if report.input_flavor != report.output_flavor {
        println!(
            "  - Converted {} to {}",
            report.input_flavor, report.output_flavor
        );
    }
}

/// `dir/name.ext` becomes `dir/name-fixed.<ext for flavor>`.
fn default_output_path(input: &Path, flavor: Flavor, data: &[u8]) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "font".to_string());
    // keep CFF flavored fonts recognizable
    let extension = match flavor {
        Flavor::Raw if data.starts_with(b"OTTO") => "otf",
        _ => flavor.extension(),
    };
    input.with_file_name(format!("{stem}-fixed.{extension}"))
}
