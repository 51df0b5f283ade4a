use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use erschema::config::Config;
use erschema::format::Format;
use erschema::impact::ImpactAnalysis;
use erschema::model::SchemaModel;
use erschema::{ChangeSet, DdlGenerator, ImpactAnalyzer, MigrationPlanner, SchemaComparer, SchemaValidator, store};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "erschema")]
#[command(about = "Validate ER schemas, diff them and plan SQL Server migrations", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (default: erschema.toml in the current directory or a parent)
    #[arg(long, global = true, env = "ERSCHEMA_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Input {
    /// Schema document
    path: PathBuf,

    /// Input format (default: by extension, then by content)
    #[arg(long)]
    from: Option<Format>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a schema
    Check {
        #[command(flatten)]
        input: Input,
    },

    /// Re-render a schema, optionally in another format
    Fmt {
        #[command(flatten)]
        input: Input,

        /// Output format (default: the input format)
        #[arg(long)]
        to: Option<Format>,

        /// Write here instead of stdout; an existing file is backed up first
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a T-SQL creation script
    Ddl {
        #[command(flatten)]
        input: Input,

        /// Target schema name
        #[arg(long)]
        schema: Option<String>,

        /// Prefix the script with drops of existing objects
        #[arg(long)]
        drop_existing: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare two schemas and classify the impact
    Diff {
        old: PathBuf,
        new: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// Plan the migration from one schema to another
    Plan {
        old: PathBuf,
        new: PathBuf,

        #[arg(long)]
        allow_table_drop: bool,

        #[arg(long)]
        no_transaction: bool,

        #[arg(long)]
        no_backup: bool,

        /// Database name used for the backup step
        #[arg(long)]
        database: Option<String>,

        /// Emit the plan as JSON instead of a script
        #[arg(long)]
        json: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(&std::env::current_dir().context("Failed to get current directory")?)?,
    };

    match cli.command {
        Commands::Check { input } => {
            let (_, model) = read_model(&input.path, input.from)?;
            let result = SchemaValidator::with_naming(config.naming.clone()).validate(&model);
            for error in &result.errors {
                println!("error: {}", error);
            }
            for warning in &result.warnings {
                println!("warning: {}", warning);
            }
            if !result.is_valid {
                return Ok(ExitCode::FAILURE);
            }
            println!(
                "{}: {} tables, {} relationships",
                input.path.display(),
                model.tables.len(),
                model.relationships.len()
            );
        }

        Commands::Fmt { input, to, output } => {
            let (format, model) = read_model(&input.path, input.from)?;
            let text = to.unwrap_or(format).render(&model, &config.ddl_options())?;
            write_output(output.as_deref(), &text)?;
        }

        Commands::Ddl {
            input,
            schema,
            drop_existing,
            output,
        } => {
            let (_, model) = read_model(&input.path, input.from)?;
            let mut options = config.ddl_options();
            if let Some(schema) = schema {
                options.schema = schema;
            }
            options.drop_existing |= drop_existing;
            let ddl = DdlGenerator::with_options(options).generate(&model)?;
            for warning in &ddl.warnings {
                eprintln!("warning: {}", warning);
            }
            write_output(output.as_deref(), &ddl.script())?;
        }

        Commands::Diff { old, new, json } => {
            let changes = compare(&config, &old, &new)?;
            let impact = ImpactAnalyzer::new().analyze(&changes);
            if json {
                let report = serde_json::json!({ "changes": changes, "impact": impact });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_diff(&changes, &impact);
            }
            if impact.has_breaking_changes() {
                return Ok(ExitCode::from(2));
            }
        }

        Commands::Plan {
            old,
            new,
            allow_table_drop,
            no_transaction,
            no_backup,
            database,
            json,
            output,
        } => {
            let changes = compare(&config, &old, &new)?;
            let mut options = config.migration.clone();
            options.allow_table_drop |= allow_table_drop;
            options.use_transaction &= !no_transaction;
            options.create_backup_before_changes &= !no_backup;
            if let Some(database) = database {
                options.database = database;
            }

            let generator = DdlGenerator::with_options(config.ddl_options());
            let plan = MigrationPlanner::with_generator(generator, options).plan(&changes)?;
            for skipped in &plan.skipped {
                eprintln!("skipped: {}", skipped);
            }
            for warning in &plan.warnings {
                eprintln!("warning: {}", warning);
            }
            let text = if json {
                serde_json::to_string_pretty(&plan)?
            } else {
                plan.to_script()
            };
            write_output(output.as_deref(), &text)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn read_model(path: &Path, from: Option<Format>) -> Result<(Format, SchemaModel)> {
    let text = store::load(path)?;
    let format = from
        .or_else(|| Format::from_path(path))
        .unwrap_or_else(|| Format::detect(&text));
    tracing::debug!(path = %path.display(), %format, "reading schema");

    let output = format.parse(&text);
    if !output.is_ok() {
        for error in &output.errors {
            eprintln!("{}: {}", path.display(), error);
        }
        bail!("{} could not be parsed as {}", path.display(), format);
    }
    Ok((format, output.model))
}

fn compare(config: &Config, old: &Path, new: &Path) -> Result<ChangeSet> {
    let (_, old_model) = read_model(old, None)?;
    let (_, new_model) = read_model(new, None)?;
    SchemaComparer::with_naming(config.naming.clone())
        .compare(&old_model, &new_model)
        .with_context(|| format!("Failed to compare {} with {}", old.display(), new.display()))
}

fn print_diff(changes: &ChangeSet, impact: &ImpactAnalysis) {
    if changes.is_empty() {
        println!("No changes.");
        return;
    }
    for change in &changes.changes {
        println!(
            "[{:?}] {} {}: {}",
            change.severity, change.change_type, change.object_name, change.details
        );
    }
    println!();
    println!(
        "{} changes, {} breaking",
        changes.statistics.total, changes.statistics.breaking_changes
    );
    let sections = [
        ("Breaking changes", &impact.breaking_changes),
        ("Potential issues", &impact.potential_issues),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        println!("{}:", title);
        for item in items {
            println!("  {}", item);
        }
    }
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(backup) = store::save_with_backup(path, text)? {
                eprintln!("previous {} saved as {}", path.display(), backup.display());
            }
        }
        None => print!("{}", text),
    }
    Ok(())
}
