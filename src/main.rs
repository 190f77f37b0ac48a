use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use krm_setters::config::{
    load_data_from_path, load_kptfile, FunctionConfig, SearchReplaceConfig, KPTFILE_NAME,
};
use krm_setters::engine::Report;
use krm_setters::functions::{
    annotate_mutations, apply_setters, create_setters, fix, list_setters, search_replace,
};
use krm_setters::logging::initialize_logging;
use krm_setters::package::{FileChange, Package};
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "krm-setters")]
#[command(about = "Apply, create and list kpt setters in KRM configuration packages", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set fields marked with `# kpt-set:` directives
    ApplySetters {
        #[command(flatten)]
        setters: SetterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Find fields by value, regex, path or file, optionally rewriting them
    SearchReplace {
        #[command(flatten)]
        criteria: SearchArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Add `# kpt-set:` directives to fields holding setter values
    CreateSetters {
        #[command(flatten)]
        setters: SetterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List the setters referenced in a package
    ListSetters {
        /// Package directory or file
        #[arg(default_value = ".")]
        path: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Migrate legacy setter comments using the package Kptfile
    Fix {
        /// Kptfile with setter definitions (defaults to <PATH>/Kptfile)
        #[arg(long)]
        kptfile: Option<PathBuf>,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Turn `# apply-time-mutation:` comments into annotations
    #[command(name = "annotate-apply-time-mutations", alias = "annotate-mutations")]
    AnnotateMutations {
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Package directory or file
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Dry run - show what would be changed without modifying files
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show unified diff of changes
    #[arg(short, long)]
    diff: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Args)]
struct SetterArgs {
    /// Function config (YAML `data:` map, ApplySetters list, or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Setter value as NAME=VALUE; overrides the config
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_pair)]
    set: Vec<(String, String)>,
}

#[derive(Args)]
struct SearchArgs {
    /// Function config with the reserved search-replace keys
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    by_value: Option<String>,

    #[arg(long)]
    by_value_regex: Option<String>,

    #[arg(long)]
    by_path: Option<String>,

    #[arg(long)]
    by_file_path: Option<String>,

    #[arg(long)]
    put_value: Option<String>,

    #[arg(long)]
    put_comment: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    initialize_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::ApplySetters { setters, output } => cmd_apply_setters(setters, output),
        Commands::SearchReplace { criteria, output } => cmd_search_replace(criteria, output),
        Commands::CreateSetters { setters, output } => cmd_create_setters(setters, output),
        Commands::ListSetters { path, format } => cmd_list_setters(&path, format),
        Commands::Fix { kptfile, output } => cmd_fix(kptfile, output),
        Commands::AnnotateMutations { output } => {
            let mut package = Package::load(&output.path, None)?;
            let report = annotate_mutations(&mut package.resources)?;
            finish(&package, &report, &output)
        }
    }
}

fn parse_pair(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, found {input:?}")),
    }
}

/// Helper: Merge the config file (if any) with `--set` pairs.
fn setter_data(args: &SetterArgs) -> Result<BTreeMap<String, String>> {
    let mut data = match &args.config {
        Some(path) => load_data_from_path(path)?,
        None => BTreeMap::new(),
    };
    data.extend(args.set.iter().cloned());
    Ok(data)
}

fn cmd_apply_setters(args: SetterArgs, output: OutputArgs) -> Result<()> {
    let data = setter_data(&args)?;
    let config = FunctionConfig::from_data(&data).context("invalid function config")?;
    let mut package = Package::load(&output.path, args.config.as_deref())?;

    let report = match &config {
        FunctionConfig::Setters(setters) => apply_setters(&mut package.resources, setters)?,
        FunctionConfig::SearchReplace(criteria) => {
            eprintln!(
                "{}",
                "Note: config holds search-replace keys, running search-replace".dimmed()
            );
            search_replace(&mut package.resources, criteria)?
        }
    };
    if report.count() == 0 && output.format == Format::Text {
        println!("{}", "no matches for input setter(s)".yellow());
    }
    finish(&package, &report, &output)
}

fn cmd_search_replace(args: SearchArgs, output: OutputArgs) -> Result<()> {
    let mut data = match &args.config {
        Some(path) => load_data_from_path(path)?,
        None => BTreeMap::new(),
    };
    let flags = [
        ("by-value", &args.by_value),
        ("by-value-regex", &args.by_value_regex),
        ("by-path", &args.by_path),
        ("by-file-path", &args.by_file_path),
        ("put-value", &args.put_value),
        ("put-comment", &args.put_comment),
    ];
    for (key, value) in flags {
        if let Some(value) = value {
            data.insert(key.to_string(), value.clone());
        }
    }
    let config = SearchReplaceConfig::from_data(&data).context("invalid search-replace config")?;

    let mut package = Package::load(&output.path, args.config.as_deref())?;
    let report = search_replace(&mut package.resources, &config)?;
    finish(&package, &report, &output)
}

fn cmd_create_setters(args: SetterArgs, output: OutputArgs) -> Result<()> {
    let data = setter_data(&args)?;
    if data.is_empty() {
        bail!("no setters given: pass --config or --set NAME=VALUE");
    }
    let mut package = Package::load(&output.path, args.config.as_deref())?;
    let report = create_setters(&mut package.resources, &data)?;
    finish(&package, &report, &output)
}

fn cmd_list_setters(path: &Path, format: Format) -> Result<()> {
    let kptfile = package_dir(path).join(KPTFILE_NAME);
    let known = if kptfile.is_file() {
        load_kptfile(&kptfile)?.setters
    } else {
        BTreeMap::new()
    };
    let mut package = Package::load(path, None)?;
    let listing = list_setters(&mut package.resources, &known)?;
    match format {
        Format::Json => print_json(&listing)?,
        Format::Text if listing.setters.is_empty() => {
            println!("{}", "No setters found".yellow())
        }
        Format::Text => print!("{listing}"),
    }
    Ok(())
}

fn cmd_fix(kptfile: Option<PathBuf>, output: OutputArgs) -> Result<()> {
    let kptfile = kptfile.unwrap_or_else(|| package_dir(&output.path).join(KPTFILE_NAME));
    if !kptfile.is_file() {
        bail!(
            "{}\n  {}",
            format!("No {KPTFILE_NAME} found at {}", kptfile.display()).red(),
            "Specify one explicitly: krm-setters fix --kptfile <path>"
        );
    }
    let definitions = load_kptfile(&kptfile)?;
    let mut package = Package::load(&output.path, None)?;
    let report = fix(&mut package.resources, definitions.graph)?;

    if output.format == Format::Text && !definitions.setters.is_empty() {
        println!("{}", "Setters from Kptfile:".bold());
        for (name, value) in &definitions.setters {
            println!("  {name}: {value}");
        }
        println!();
    }
    finish(&package, &report, &output)
}

/// Helper: Directory holding the package Kptfile.
fn package_dir(path: &Path) -> &Path {
    if path.is_file() {
        path.parent().unwrap_or(Path::new("."))
    } else {
        path
    }
}

/// Helper: Report results, then write (or diff) the changed files.
fn finish(package: &Package, report: &Report, output: &OutputArgs) -> Result<()> {
    let changes = if output.dry_run {
        package.changes()
    } else {
        package.write()?
    };

    match output.format {
        Format::Json => print_json(report)?,
        Format::Text => print_report(report, &changes, output.dry_run),
    }
    if output.diff {
        for change in &changes {
            display_diff(change);
        }
    }
    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report(report: &Report, changes: &[FileChange], dry_run: bool) {
    for result in &report.results {
        let comment = result
            .comment
            .as_deref()
            .map(|c| format!(" {}", c.dimmed()))
            .unwrap_or_default();
        println!("{}", result.file_path.bold());
        println!("fieldPath: {}", result.field_path);
        println!("value: {}{comment}", result.new_value);
        println!();
    }
    println!("{}", report.summary().green());

    if dry_run {
        println!("{}", "[DRY RUN - no files written]".cyan());
    }
    for change in changes {
        let verb = if dry_run { "Would update" } else { "Updated" };
        println!("{} {verb} {}", "✓".green(), change.path.display());
    }
}

/// Helper: Show unified diff between original and modified content
fn display_diff(change: &FileChange) {
    let file = change.path.display();
    println!("\n{}", format!("--- {file} (original)").dimmed());
    println!("{}", format!("+++ {file} (updated)").dimmed());

    let diff = TextDiff::from_lines(&change.before, &change.after);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{change}").red(),
            ChangeTag::Insert => format!("+{change}").green(),
            ChangeTag::Equal => format!(" {change}").normal(),
        };
        print!("{sign}");
    }
}
