use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ptp_assist::config::{BackendKind, Config, DEFAULT_CONFIG_FILE};
use ptp_assist::console::{self, Console};
use ptp_assist::llm::{self, CompletionRequest};
use ptp_assist::pipeline::{self, Answers, AssistSettings, Document, Matcher};
use ptp_assist::{embed, prompt};

#[derive(Parser)]
#[command(
    name = "ptp-assist",
    version,
    about = "Find a PTP config by meaning and rewrite it with a local LLM"
)]
struct Cli {
    /// Config file (defaults apply when it does not exist)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Document to match against, overriding the config
    #[arg(long, global = true)]
    document: Option<PathBuf>,
    /// LLM backend, overriding the config
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendKind>,
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a query against the document and optionally rewrite it (default)
    Assist {
        /// Query to match, instead of asking for one
        #[arg(long)]
        query: Option<String>,
        /// Modification request, instead of asking for one
        #[arg(long)]
        modify: Option<String>,
    },
    /// Print the similarity score of a query against the document
    Score {
        /// Natural language query
        query: String,
    },
    /// Print the prompt a modification request would send, without calling a model
    Prompt {
        /// Modification request
        request: String,
    },
    /// Write the effective config (defaults plus overrides) to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(&cli.config)?;
    config.override_with(cli.document, cli.backend);

    match cli.command.unwrap_or(Commands::Assist {
        query: None,
        modify: None,
    }) {
        Commands::Assist { query, modify } => assist(&config, Answers { query, modify }),
        Commands::Score { query } => score(&config, &query),
        Commands::Prompt { request } => print_prompt(&config, &request),
        Commands::Init { force } => init(&config, &cli.config, force),
    }
}

fn assist(config: &Config, answers: Answers) -> Result<()> {
    let document = Document::load(&config.document)?;
    let embedder = embed::open(&config.embed.backend).context("loading embedding model")?;
    let matcher = Matcher::new(embedder.as_ref(), &document)?;

    let settings = AssistSettings {
        console: &config.console,
        completion: CompletionRequest::from(&config.llm),
        backend_label: config.llm.backend.label(),
    };
    let stdin = io::stdin();
    let mut term = Console::new(stdin.lock(), io::stdout());
    pipeline::assist(&matcher, &mut term, &settings, answers, || {
        llm::open(&config.llm.backend)
    })?;
    Ok(())
}

fn score(config: &Config, query: &str) -> Result<()> {
    let document = Document::load(&config.document)?;
    let embedder = embed::open(&config.embed.backend).context("loading embedding model")?;
    let verdict = Matcher::new(embedder.as_ref(), &document)?.score(query)?;

    let mut out = io::stdout().lock();
    writeln!(out, "{}", console::score_line(verdict.score).trim_start())?;
    writeln!(out, "{}", if verdict.matched { "match" } else { "no match" })?;
    Ok(())
}

fn print_prompt(config: &Config, request: &str) -> Result<()> {
    let document = Document::load(&config.document)?;
    for marker in prompt::injection_markers(request) {
        tracing::warn!(%marker, "modification request contains prompt structure");
    }
    print!("{}", prompt::build(&document.text, request));
    Ok(())
}

fn init(config: &Config, path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    config.save(path)?;
    println!("wrote {}", path.display());
    Ok(())
}
