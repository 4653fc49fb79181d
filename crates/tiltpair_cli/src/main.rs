//! Status report for a tilt-pair picking session.
//!
//! # Responsibility
//! - Open a picker from a JSON config or from command-line paths.
//! - Print one line per pair plus totals; optionally re-save to persist angles.

use clap::Parser;
use std::error::Error as _;
use std::path::PathBuf;
use tiltpair_core::{
    default_log_level, init_logging, AngleEstimate, Color, Family, PickerConfig, TiltPairPicker,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "tiltpair")]
#[command(about = "Inspect and re-save tilt-pair particle picks")]
#[command(version)]
struct Cli {
    /// JSON session config (selfile, output_dir, family).
    #[arg(long, conflicts_with_all = ["selfile", "output_dir", "family"])]
    config: Option<PathBuf>,

    /// Pair list, as `path` or `block@path`.
    #[arg(long, required_unless_present = "config", requires = "output_dir")]
    selfile: Option<String>,

    /// Directory holding the per-micrograph `.pos` files.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Family name used as the record block inside `.pos` files.
    #[arg(long)]
    family: Option<String>,

    /// Directory for rolling log files; logging is off when omitted.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long)]
    log_level: Option<String>,

    /// Write picks and recomputed angles back after loading.
    #[arg(long)]
    save: bool,
}

fn main() {
    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir)?;
    }

    let config = session_config(&cli)?;
    let mut picker = TiltPairPicker::from_config(&config)?;

    for failure in picker.load_failures() {
        eprintln!("warning: pair {} not loaded: {failure}", failure.micrograph.0);
    }

    println!("# index untilted tilted untilted_count tilted_count angles");
    for (index, micrograph) in picker.micrographs().iter().enumerate() {
        println!(
            "{index} {} {} {} {} {}",
            micrograph.file(),
            micrograph.tilted().file(),
            micrograph.particles().len(),
            micrograph.tilted().particles().len(),
            format_angles(micrograph.angles())
        );
    }
    println!(
        "total pairs={} untilted={} tilted={} manual={}",
        picker.micrographs().len(),
        picker.untilted_particle_count(),
        picker.tilted_particle_count(),
        picker.manual_particle_count()
    );
    match picker.next_free_micrograph() {
        Some(index) => println!("next_free={index}"),
        None => println!("next_free=none"),
    }

    if cli.save {
        let summary = picker.save()?;
        println!(
            "saved written={} cleaned={} skipped={} angles={}",
            summary.written, summary.cleaned, summary.skipped, summary.angles_written
        );
    }
    Ok(())
}

fn session_config(cli: &Cli) -> CliResult<PickerConfig> {
    if let Some(path) = &cli.config {
        return Ok(PickerConfig::load(path)?);
    }

    let (Some(selfile), Some(output_dir)) = (&cli.selfile, &cli.output_dir) else {
        return Err("either --config or --selfile with --output-dir is required".into());
    };
    let mut config = PickerConfig::new(selfile.clone(), output_dir.clone());
    if let Some(name) = &cli.family {
        config.family = Family::new(name.clone(), config.family.size(), Color::default());
    }
    config.validate()?;
    Ok(config)
}

fn format_angles(angles: &AngleEstimate) -> String {
    match angles {
        AngleEstimate::Computed(angles) => format!(
            "y={:.2} y2={:.2} tilt={:.2}",
            angles.angle_y, angles.angle_y2, angles.angle_tilt
        ),
        AngleEstimate::Degenerate(reason) => format!("undefined ({reason})"),
        AngleEstimate::Pending => "pending".to_string(),
    }
}
