//! # CodeAlive CLI (`codealive`)
//!
//! ## Usage
//!
//! ```bash
//! codealive [--config PATH] [--api-key KEY] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `codealive datasources` | List ready (or with `--all`, all) data sources |
//! | `codealive search <query> <names>...` | Semantic code search |
//! | `codealive chat <question> [names]...` | Ask about the codebase |
//! | `codealive explore <mode:query> <names>...` | Search, then chat, per workflow |
//! | `codealive setup` | Store and verify the API key |
//! | `codealive auth-check` | Check a key is configured, offline |
//! | `codealive completions <shell>` | Print shell completions |
//!
//! Every failure prints a message to stderr and exits with code 1.

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use codealive::models::SearchMode;
use codealive::setup::SetupOptions;
use codealive::{chat, config, datasources, explore, logging, search, setup};

/// CodeAlive CLI: semantic code search and codebase Q&A from the terminal.
#[derive(Parser)]
#[command(
    name = "codealive",
    about = "Search and ask questions about codebases indexed by CodeAlive",
    version
)]
struct Cli {
    /// Path to a TOML configuration file.
    ///
    /// Defaults to `<config dir>/codealive/config.toml` when that file exists.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API key to use instead of CODEALIVE_API_KEY or the OS credential store.
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List indexed repositories and workspaces.
    ///
    /// Only sources ready for use are shown unless `--all` is given.
    Datasources {
        /// Include sources that are still processing.
        #[arg(long)]
        all: bool,

        /// Print the raw server response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Semantic search across one or more data sources.
    Search {
        /// What to look for.
        query: String,

        /// Data source names (repositories or `workspace:NAME`).
        data_sources: Vec<String>,

        /// Search strategy.
        #[arg(long, value_enum, default_value_t = SearchMode::Auto)]
        mode: SearchMode,

        /// Return full file content with each result.
        #[arg(long)]
        include_content: bool,
    },

    /// Ask a question about the codebase.
    ///
    /// Starts a new conversation over the given data sources, or continues
    /// one with `--continue`.
    Chat {
        /// The question.
        question: String,

        /// Data source names. Ignored when continuing a conversation.
        data_sources: Vec<String>,

        /// Continue an earlier conversation.
        #[arg(long = "continue", visible_alias = "conversation-id", value_name = "ID")]
        conversation_id: Option<String>,
    },

    /// Run a search-then-chat workflow.
    ///
    /// Prefix the query with a mode: `understand:`, `dependency:`,
    /// `pattern:`, `implement:` or `debug:`. Unprefixed queries use
    /// `understand`.
    Explore {
        /// `mode:query`, e.g. `debug:slow database queries`.
        query: String,

        /// Data source names.
        data_sources: Vec<String>,

        /// Add `workspace:NAME` to the data sources. Repeatable.
        #[arg(long = "workspace", value_name = "NAME")]
        workspaces: Vec<String>,
    },

    /// Store and verify the API key.
    Setup {
        /// Use this key instead of prompting.
        #[arg(long)]
        key: Option<String>,

        /// Print an `export` line for the shell profile instead of using
        /// the OS credential store.
        #[arg(long)]
        env: bool,
    },

    /// Check that an API key is configured. Makes no network requests.
    AuthCheck,

    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

/// Dispatch one command. `Ok(false)` exits 1 without an error message.
fn run(cli: Cli) -> anyhow::Result<bool> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "codealive", &mut std::io::stdout());
        return Ok(true);
    }

    let cfg = config::resolve_config(cli.config.as_deref())?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Datasources { all, json } => {
            datasources::run_datasources(&cfg, cli.api_key, all, json)?;
        }
        Commands::Search {
            query,
            data_sources,
            mode,
            include_content,
        } => {
            search::run_search(
                &cfg,
                cli.api_key,
                &query,
                &data_sources,
                mode,
                include_content,
            )?;
        }
        Commands::Chat {
            question,
            data_sources,
            conversation_id,
        } => {
            chat::run_chat(
                &cfg,
                cli.api_key,
                &question,
                &data_sources,
                conversation_id.as_deref(),
            )?;
        }
        Commands::Explore {
            query,
            data_sources,
            workspaces,
        } => {
            explore::run_explore(&cfg, cli.api_key, &query, data_sources, &workspaces)?;
        }
        Commands::Setup { key, env } => {
            setup::run_setup(&cfg, &SetupOptions { key, env_mode: env })?;
        }
        Commands::AuthCheck => {
            return Ok(setup::run_auth_check(&cfg));
        }
        Commands::Completions { .. } => {}
    }

    Ok(true)
}
