//! GUX checker CLI
//!
//! The `gux` command verifies a UI screenshot against a `.gux` visual spec.
//!
//! ## Commands
//!
//! - `check`: Score a screenshot (and optional reference) against a spec
//! - `parse`: Print the parsed zone tree as JSON
//! - `techniques`: List the available analysis techniques
//!
//! ## Exit codes
//!
//! `0` the gate passed, `1` the gate failed, `2` the spec file did not parse,
//! `3` anything else went wrong.

mod artifacts;
mod env;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gux_core::{ExternalFinding, GuxError, ParseError, VerifyOptions};
use tracing::{info, Level};

const EXIT_PARSE: u8 = 2;
const EXIT_ERROR: u8 = 3;

#[derive(Parser)]
#[command(name = "gux")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Verify UI screenshots against declarative visual specs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "GUX_LOG_JSON")]
    log_json: bool,

    /// Load environment variables from this file instead of the nearest `.env`
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a screenshot against a spec
    Check {
        /// Screenshot to verify
        image: PathBuf,

        /// GUX spec file
        #[arg(short, long, env = "GUX_SPEC")]
        spec: PathBuf,

        /// Known-good screenshot to diff against
        #[arg(long = "ref", env = "GUX_REF")]
        reference: Option<PathBuf>,

        /// Print the report as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Directory for zone crops and diff images
        #[arg(long, env = "GUX_OUT_DIR")]
        out_dir: Option<PathBuf>,

        /// Run only these techniques (repeatable)
        #[arg(short, long = "technique")]
        techniques: Vec<String>,

        /// Maximum ΔE between expected and measured colour
        #[arg(long, env = "GUX_COLOUR_THRESHOLD")]
        colour_threshold: Option<f64>,

        /// Maximum percentage of mismatched pixels against the reference
        #[arg(long, env = "GUX_MAX_MISMATCH")]
        max_mismatch: Option<f64>,

        /// Maximum census shift against the reference
        #[arg(long, env = "GUX_CENSUS_SHIFT")]
        census_shift: Option<f64>,

        /// Fail the gate when any zone is unverified
        #[arg(long, env = "GUX_FAIL_ON_UNVERIFIED")]
        fail_on_unverified: bool,

        /// TOML file with verification options
        #[arg(long, env = "GUX_CONFIG")]
        config: Option<PathBuf>,

        /// JSON array of pre-resolved findings to merge into the report
        #[arg(long, env = "GUX_FINDINGS")]
        findings: Option<PathBuf>,
    },

    /// Parse a spec and print its zone tree
    Parse {
        /// GUX spec file
        spec: PathBuf,
    },

    /// List analysis techniques
    Techniques,
}

struct CheckArgs {
    image: PathBuf,
    spec: PathBuf,
    reference: Option<PathBuf>,
    json: bool,
    out_dir: Option<PathBuf>,
    techniques: Vec<String>,
    colour_threshold: Option<f64>,
    max_mismatch: Option<f64>,
    census_shift: Option<f64>,
    fail_on_unverified: bool,
    config: Option<PathBuf>,
    findings: Option<PathBuf>,
}

fn main() -> ExitCode {
    // `.env` must be loaded before clap reads GUX_* variables.
    let env_file = env::env_file_from_args(std::env::args_os());
    let env_loaded = env::load(env_file.as_deref());

    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    gux_core::init_tracing(cli.log_json, level);

    match env_loaded {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "loaded env file"),
        Ok(None) => {
            if let Some(path) = &cli.env_file {
                tracing::warn!(path = %path.display(), "env file not found, skipping");
            }
        }
        Err(err) => tracing::warn!(error = %format!("{err:#}"), "env file ignored"),
    }

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            if is_parse_failure(&err) {
                ExitCode::from(EXIT_PARSE)
            } else {
                ExitCode::from(EXIT_ERROR)
            }
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Check {
            image,
            spec,
            reference,
            json,
            out_dir,
            techniques,
            colour_threshold,
            max_mismatch,
            census_shift,
            fail_on_unverified,
            config,
            findings,
        } => cmd_check(CheckArgs {
            image,
            spec,
            reference,
            json,
            out_dir,
            techniques,
            colour_threshold,
            max_mismatch,
            census_shift,
            fail_on_unverified,
            config,
            findings,
        }),
        Commands::Parse { spec } => cmd_parse(&spec).map(|_| ExitCode::SUCCESS),
        Commands::Techniques => {
            cmd_techniques();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn is_parse_failure(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.downcast_ref::<ParseError>().is_some()
            || matches!(cause.downcast_ref::<GuxError>(), Some(GuxError::Parse(_)))
    })
}

fn build_options(args: &CheckArgs) -> Result<VerifyOptions> {
    let mut options = match &args.config {
        Some(path) => VerifyOptions::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => VerifyOptions::default(),
    };
    if let Some(v) = args.colour_threshold {
        options.colour_threshold = v;
    }
    if let Some(v) = args.max_mismatch {
        options.max_mismatch_pct = v;
    }
    if let Some(v) = args.census_shift {
        options.census_shift_threshold = v;
    }
    if args.fail_on_unverified {
        options.policy.fail_on_unverified = true;
    }
    if !args.techniques.is_empty() {
        options.techniques = Some(args.techniques.clone());
    }
    if args.out_dir.is_some() {
        options.diff_artifacts = true;
    }
    options.validate()?;
    Ok(options)
}

fn load_image(path: &Path) -> Result<image::RgbImage> {
    let decoded = image::open(path).with_context(|| format!("read image {}", path.display()))?;
    Ok(decoded.to_rgb8())
}

fn load_findings(path: &Path) -> Result<Vec<ExternalFinding>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read findings {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("decode findings {}", path.display()))
}

fn cmd_check(args: CheckArgs) -> Result<ExitCode> {
    let options = build_options(&args)?;
    let spec = gux_core::parse_file(&args.spec)
        .with_context(|| format!("parse spec {}", args.spec.display()))?;
    let image = load_image(&args.image)?;
    let reference = args.reference.as_deref().map(load_image).transpose()?;
    let findings = match &args.findings {
        Some(path) => load_findings(path)?,
        None => Vec::new(),
    };

    let verification =
        gux_core::verify(&spec, &image, reference.as_ref(), &findings, &options)?;

    if let Some(dir) = &args.out_dir {
        let written = artifacts::write_all(dir, &verification.artifacts)?;
        info!(dir = %dir.display(), files = written.len(), "saved zone artifacts");
    }

    let report = &verification.report;
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", gux_core::render_text(report));
    }

    Ok(ExitCode::from(u8::try_from(report.exit_code()).unwrap_or(1)))
}

fn cmd_parse(path: &Path) -> Result<()> {
    let spec =
        gux_core::parse_file(path).with_context(|| format!("parse spec {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}

fn cmd_techniques() {
    for entry in gux_core::registry() {
        let marker = if entry.needs_reference { " (needs --ref)" } else { "" };
        println!("{:<12} {}{}", entry.name, entry.help, marker);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn check_args(argv: &[&str]) -> CheckArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Check {
                image,
                spec,
                reference,
                json,
                out_dir,
                techniques,
                colour_threshold,
                max_mismatch,
                census_shift,
                fail_on_unverified,
                config,
                findings,
            } => CheckArgs {
                image,
                spec,
                reference,
                json,
                out_dir,
                techniques,
                colour_threshold,
                max_mismatch,
                census_shift,
                fail_on_unverified,
                config,
                findings,
            },
            _ => panic!("expected check"),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = check_args(&[
            "gux",
            "check",
            "shot.png",
            "--spec",
            "page.gux",
            "--colour-threshold",
            "2.5",
            "--technique",
            "colours",
            "--technique",
            "lines",
            "--fail-on-unverified",
        ]);
        let options = build_options(&args).unwrap();
        assert_eq!(options.colour_threshold, 2.5);
        assert_eq!(
            options.techniques,
            Some(vec!["colours".to_string(), "lines".to_string()])
        );
        assert!(options.policy.fail_on_unverified);
        assert!(!options.diff_artifacts);
    }

    #[test]
    fn test_out_dir_enables_diff_artifacts() {
        let args = check_args(&[
            "gux", "check", "shot.png", "--spec", "page.gux", "--out-dir", "out",
        ]);
        assert!(build_options(&args).unwrap().diff_artifacts);
    }

    #[test]
    fn test_unknown_technique_is_rejected() {
        let args = check_args(&[
            "gux",
            "check",
            "shot.png",
            "--spec",
            "page.gux",
            "--technique",
            "ocr",
        ]);
        assert!(build_options(&args).is_err());
    }

    #[test]
    fn test_parse_failure_maps_to_exit_two() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gux");
        std::fs::write(&path, "Zone('orphan')").unwrap();

        let err = cmd_parse(&path).unwrap_err();
        assert!(is_parse_failure(&err));

        let missing = cmd_parse(&dir.path().join("missing.gux")).unwrap_err();
        assert!(!is_parse_failure(&missing));
    }

    #[test]
    fn test_findings_file_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("findings.json");
        std::fs::write(
            &path,
            r#"[{"zone": "header", "source": "ocr", "outcome": "fail", "reason": "title missing"}]"#,
        )
        .unwrap();
        let findings = load_findings(&path).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].zone, "header");
    }
}
