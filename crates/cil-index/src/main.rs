use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cil_index::commands::{self, QueryArgs};
use cil_index::completions::write_completions;
use cil_index::configuration::IndexConfig;
use cil_index::store::{SqliteStore, Store};

/// Index SELinux CIL policy modules and answer structured queries against them.
#[derive(Parser)]
#[command(author, version, about, max_term_width = 100)]
struct Cli {
    /// CIL files to index and query against
    files: Vec<PathBuf>,

    /// Use every file already recorded in the store instead of FILES
    #[arg(long, global = true)]
    from_all_known: bool,

    /// Restrict TE search to one of the eight TE rule kinds
    #[arg(long)]
    r#type: Option<String>,

    /// TAS search mode
    #[arg(long)]
    attr: bool,

    /// Type-transition search mode
    #[arg(long)]
    tt: bool,

    /// Attribute-resolution mode
    #[arg(long)]
    resolveattr: bool,

    /// Query filter: source symbol
    #[arg(long)]
    source: Option<String>,

    /// Query filter: target symbol
    #[arg(long)]
    target: Option<String>,

    /// Query filter: excluded source symbol
    #[arg(long = "not-source")]
    not_source: Option<String>,

    /// Query filter: excluded target symbol
    #[arg(long = "not-target")]
    not_target: Option<String>,

    /// Query filter: object class
    #[arg(long)]
    class: Option<String>,

    /// Query filter: TT subject type
    #[arg(long)]
    subject: Option<String>,

    /// Query filter: TT filename
    #[arg(long)]
    filename: Option<String>,

    /// Permission set, space-joined (TE search only)
    #[arg(long)]
    perms: Option<String>,

    /// Enable from-diff mode against FILE
    #[arg(long)]
    from: Option<PathBuf>,

    /// Increase logging verbosity (warn -> info -> debug -> trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Override the store database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Override the configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit a shell completion script
    Completions { shell: Shell },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        write_completions(shell, &mut cmd, "cil-index", &mut std::io::stdout());
        return Ok(());
    }

    let mode_count = [cli.r#type.is_some(), cli.attr, cli.tt, cli.resolveattr]
        .iter()
        .filter(|b| **b)
        .count();
    if mode_count > 1 {
        bail!("--type, --attr, --tt, and --resolveattr are mutually exclusive");
    }
    if cli.from_all_known && !cli.files.is_empty() {
        bail!("--from-all-known and positional FILES are mutually exclusive");
    }

    let config = IndexConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path.clone());
    let mut store = SqliteStore::open(&db_path, config.busy_timeout()).context("opening store")?;

    let paths: Vec<String> = if cli.from_all_known {
        store.list_files().context("listing known files")?
    } else {
        cli.files.iter().map(|p| p.to_string_lossy().into_owned()).collect()
    };
    commands::refresh_files(&mut store, &paths).context("refreshing index")?;

    let index = commands::build_index(&store).context("building attribute index")?;

    let args = QueryArgs {
        source: cli.source.clone(),
        target: cli.target.clone(),
        not_source: cli.not_source.clone(),
        not_target: cli.not_target.clone(),
        class: cli.class.clone(),
        subject: cli.subject.clone(),
        filename: cli.filename.clone(),
        perms: cli.perms.clone(),
    };

    if let Some(from_path) = &cli.from {
        commands::from_diff_command(&store, &index, &from_path.to_string_lossy())?;
    } else if cli.attr {
        commands::attr_command(&store, &args)?;
    } else if cli.tt {
        commands::tt_command(&store, &index, &args)?;
    } else if cli.resolveattr {
        commands::resolveattr_command(&index, &args)?;
    } else {
        let kind = cli
            .r#type
            .as_deref()
            .map(|k| k.parse().expect("RuleKind::from_str is infallible"));
        commands::te_command(&store, &index, kind, &args)?;
    }

    Ok(())
}
