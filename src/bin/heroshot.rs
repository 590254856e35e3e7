use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use heroshot::{
    AssetCache, Composition, Compositor, ExportFormat, HeroshotResult, ImageFetcher,
    pipeline, validate,
};

#[derive(Parser, Debug)]
#[command(name = "heroshot", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a composition against the rule engine and print the report.
    Validate(ValidateArgs),
    /// Apply every available auto-fix and write the fixed composition.
    Fix(FixArgs),
    /// Render and export a composition.
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input composition JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Emit the full report as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct FixArgs {
    /// Input composition JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output path; defaults to rewriting the input in place.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input composition JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output image path; defaults to the metadata-derived file name next to
    /// the input.
    #[arg(long)]
    out: Option<PathBuf>,

    /// avif, webp, jpeg, or png.
    #[arg(long, default_value = "webp")]
    format: String,

    /// Encoder quality 1-100; per-format default when omitted.
    #[arg(long)]
    quality: Option<u8>,

    /// Print the schema.org JSON-LD for the exported image.
    #[arg(long)]
    schema_org: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Fix(args) => cmd_fix(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn read_comp_json(path: &Path) -> anyhow::Result<Composition> {
    let f = File::open(path).with_context(|| format!("open composition '{}'", path.display()))?;
    let r = BufReader::new(f);
    let comp: Composition =
        serde_json::from_reader(r).with_context(|| "parse composition JSON")?;
    Ok(comp)
}

/// Resolves relative image URLs against the composition file's directory.
struct RootedFetcher {
    root: PathBuf,
}

impl ImageFetcher for RootedFetcher {
    fn fetch(&mut self, url: &str) -> HeroshotResult<Vec<u8>> {
        let path = if Path::new(url).is_absolute() {
            PathBuf::from(url)
        } else {
            self.root.join(url)
        };
        std::fs::read(&path)
            .with_context(|| format!("read image source '{}'", path.display()))
            .map_err(heroshot::HeroshotError::from)
    }
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let comp = read_comp_json(&args.in_path)?;
    comp.validate()?;

    let report = validate::evaluate(&comp);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for r in &report.rule_results {
            let status = if r.passed {
                "pass"
            } else {
                match r.severity {
                    validate::Severity::Error => "FAIL",
                    validate::Severity::Warning => "warn",
                }
            };
            let fix = if r.auto_fix_available { " (fixable)" } else { "" };
            println!("{status:>4}  {:<26} {}{fix}", r.rule_id, r.message);
        }
        println!(
            "score {}/100, export {}",
            report.score,
            if report.can_export() {
                "allowed"
            } else {
                "blocked"
            }
        );
    }

    if !report.can_export() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_fix(args: FixArgs) -> anyhow::Result<()> {
    let comp = read_comp_json(&args.in_path)?;
    comp.validate()?;

    let (fixed, report) = validate::apply_all_fixes(&comp, &validate::FixContext::default());
    for fix in &report.applied {
        eprintln!("fixed {}: {}", fix.rule_id, fix.rule_name);
    }
    if report.applied.is_empty() {
        eprintln!("nothing to fix");
    }

    let out = args.out.unwrap_or(args.in_path);
    let json = serde_json::to_string_pretty(&fixed)?;
    std::fs::write(&out, json).with_context(|| format!("write '{}'", out.display()))?;
    eprintln!("wrote {}", out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let comp = read_comp_json(&args.in_path)?;
    comp.validate()?;

    let format: ExportFormat = args.format.parse()?;

    let root = args
        .in_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let mut assets = AssetCache::new(Box::new(RootedFetcher { root: root.clone() }));
    let mut compositor = Compositor::new();

    let out = pipeline::export(&comp, &mut compositor, &mut assets, format, args.quality)?;

    let out_path = args.out.unwrap_or_else(|| root.join(&out.file_name));
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&out_path, &out.bytes)
        .with_context(|| format!("write '{}'", out_path.display()))?;

    if args.schema_org {
        println!("{}", serde_json::to_string_pretty(&out.schema_org)?);
    }

    eprintln!("wrote {} ({} bytes)", out_path.display(), out.bytes.len());
    Ok(())
}
