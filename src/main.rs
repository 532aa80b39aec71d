//! docspan — scan source files for documentation carriers and emit
//! normalized metadata records.
//!
//! Two modes:
//!
//! - **stdin mode**: `docspan -l python < file.py`
//! - **file mode**: `docspan src/*.py lib/**/*.rs`

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use docspan::{Catalog, Diagnostic, Engine, NormalizedRecord, PayloadPolicy, SymbolMarker, UnknownKeyPolicy};

#[derive(Parser)]
#[command(
    name = "docspan",
    about = "Scan source files for documentation carriers and emit normalized metadata records"
)]
struct Cli {
    /// Input files (glob patterns supported). If omitted, reads from stdin.
    files: Vec<String>,

    /// Language name or alias. Required in stdin mode; overrides
    /// extension-based inference in file mode.
    #[arg(short = 'l', long)]
    language: Option<String>,

    /// Symbol markers JSON: either a list of markers, or an object mapping
    /// file paths to marker lists.
    #[arg(short = 'm', long)]
    markers: Option<PathBuf>,

    /// Carrier catalog JSON. Defaults to the built-in language table.
    #[arg(short = 'c', long)]
    catalog: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "json")]
    format: Format,

    /// Exit nonzero when any diagnostic is reported
    #[arg(long)]
    strict: bool,

    /// Policy for payload keys outside the canonical schema
    #[arg(long, value_enum, default_value = "warn")]
    unknown_keys: UnknownKeys,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Summary,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UnknownKeys {
    Allow,
    Warn,
    Reject,
}

impl From<UnknownKeys> for UnknownKeyPolicy {
    fn from(value: UnknownKeys) -> Self {
        match value {
            UnknownKeys::Allow => UnknownKeyPolicy::Allow,
            UnknownKeys::Warn => UnknownKeyPolicy::Warn,
            UnknownKeys::Reject => UnknownKeyPolicy::Reject,
        }
    }
}

/// Markers file: a bare list applies to every input, an object maps file
/// paths to lists.
#[derive(Deserialize)]
#[serde(untagged)]
enum MarkersFile {
    Shared(Vec<SymbolMarker>),
    PerFile(BTreeMap<String, Vec<SymbolMarker>>),
}

impl MarkersFile {
    fn for_file(&self, file: &str) -> &[SymbolMarker] {
        match self {
            MarkersFile::Shared(markers) => markers,
            MarkersFile::PerFile(map) => map.get(file).map_or(&[], Vec::as_slice),
        }
    }
}

/// One input file's pipeline output.
#[derive(Serialize)]
struct FileReport {
    file: String,
    records: Vec<NormalizedRecord>,
    diagnostics: Vec<Diagnostic>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let engine = build_engine(&cli)?;
    let markers = load_markers(cli.markers.as_deref())?;

    let reports = if cli.files.is_empty() {
        vec![stdin_report(&cli, &engine, markers.as_ref())?]
    } else {
        file_reports(&cli, &engine, markers.as_ref())?
    };

    match cli.format {
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(&reports)?);
            for report in &reports {
                for diagnostic in &report.diagnostics {
                    eprintln!("warning: {}: {diagnostic}", report.file);
                }
            }
        }
        Format::Summary => print_summary(&reports),
    }

    if cli.strict && reports.iter().any(|r| !r.diagnostics.is_empty()) {
        std::process::exit(1);
    }
    Ok(())
}

fn build_engine(cli: &Cli) -> Result<Engine> {
    let catalog = match &cli.catalog {
        Some(path) => {
            let catalog = Catalog::load(path)
                .with_context(|| format!("failed to load catalog {}", path.display()))?;
            for message in catalog.load_errors() {
                eprintln!("warning: {message}");
            }
            catalog
        }
        None => Catalog::builtin(),
    };
    let policy = PayloadPolicy {
        unknown_keys: cli.unknown_keys.into(),
        ..PayloadPolicy::default()
    };
    Ok(Engine::with_policy(catalog, policy))
}

fn load_markers(path: Option<&Path>) -> Result<Option<MarkersFile>> {
    match path {
        None => Ok(None),
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read markers {}", path.display()))?;
            let markers = serde_json::from_str(&text)
                .with_context(|| format!("invalid markers file {}", path.display()))?;
            Ok(Some(markers))
        }
    }
}

/// stdin mode: one anonymous input, language required.
fn stdin_report(cli: &Cli, engine: &Engine, markers: Option<&MarkersFile>) -> Result<FileReport> {
    let language = cli
        .language
        .as_deref()
        .context("--language is required when reading from stdin")?;
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;

    let marker_slice = markers.map_or(&[][..], |m| m.for_file("-"));
    let (records, diagnostics) = engine.scan_and_resolve(language, "-", &input, marker_slice)?;
    Ok(FileReport {
        file: "-".into(),
        records,
        diagnostics,
    })
}

fn file_reports(
    cli: &Cli,
    engine: &Engine,
    markers: Option<&MarkersFile>,
) -> Result<Vec<FileReport>> {
    let mut reports = Vec::new();
    for path in expand_globs(&cli.files)? {
        let name = path.to_string_lossy().to_string();
        let language = match cli.language.as_deref() {
            Some(language) => language.to_string(),
            None => infer_language(&path)
                .with_context(|| format!("cannot infer language for {name}, pass --language"))?,
        };
        let bytes =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let marker_slice = markers.map_or(&[][..], |m| m.for_file(&name));
        let (records, diagnostics) =
            engine.scan_and_resolve_bytes(&language, &name, &bytes, marker_slice)?;
        reports.push(FileReport {
            file: name,
            records,
            diagnostics,
        });
    }
    Ok(reports)
}

fn print_summary(reports: &[FileReport]) {
    for report in reports {
        println!(
            "{}: {} record(s), {} diagnostic(s)",
            report.file,
            report.records.len(),
            report.diagnostics.len()
        );
        for record in &report.records {
            println!(
                "  lines {}-{} [{}] {} / {} / {}",
                record.source.line_start,
                record.source.line_end,
                record.carrier,
                record.payload.format,
                record.payload.purpose,
                record.payload.user
            );
            for warning in &record.warnings {
                println!("    warning: {warning}");
            }
        }
        for diagnostic in &report.diagnostics {
            println!("  {:?}: {}", diagnostic.kind(), diagnostic);
        }
    }
}

/// Extensions mapped to built-in catalog names; the catalog's own alias
/// table handles the rest.
fn infer_language(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let language = match ext.as_str() {
        "py" => "python",
        "jl" => "julia",
        "rs" => "rust",
        "js" | "mjs" => "javascript",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "cs" => "csharp",
        "d" => "d",
        "lua" => "lua",
        "hs" => "haskell",
        "erl" | "hrl" => "erlang",
        "ex" | "exs" => "elixir",
        "sh" | "bash" => "shell",
        "cob" | "cbl" => "cobol",
        "f" | "for" | "f77" => "fortran",
        "c" | "h" => "c",
        _ => return None,
    };
    Some(language.to_string())
}

/// Expand glob patterns into real file paths; literal paths pass through.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        let matches =
            glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
        let mut matched = false;
        for entry in matches {
            let entry = entry?;
            if entry.is_file() {
                files.push(entry);
                matched = true;
            }
        }
        if !matched {
            anyhow::bail!("no files match {pattern}");
        }
    }
    Ok(files)
}
