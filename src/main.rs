use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_mem::commands::{self, branch, entries, lifecycle, reflect, share};
use agent_mem_core::reflect::GatherOptions;

#[derive(Parser)]
#[command(name = "amem")]
#[command(about = "Versioned, branchable memory for AI coding agents")]
#[command(version)]
struct Cli {
    /// Show debug logs and full error chains
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap .context/ in the current directory
    Init {
        /// Reinitialize an existing .context/
        #[arg(long)]
        force: bool,
    },
    /// Full context view (the agent's primary read)
    Snapshot,
    /// Quick status overview
    Status,
    /// Print a context file
    Read { path: String },
    /// Create or replace a context file
    Write {
        path: String,
        /// File content (reads stdin when omitted)
        #[arg(long)]
        content: Option<String>,
    },
    /// Checkpoint the context
    Commit {
        /// Commit message
        message: Vec<String>,
    },
    /// Append an entry to memory
    Remember {
        #[arg(long, group = "category")]
        decision: bool,
        #[arg(long, group = "category")]
        pattern: bool,
        #[arg(long, group = "category")]
        mistake: bool,
        /// Default category
        #[arg(long, group = "category")]
        note: bool,
        /// Write to this file instead of the category file
        #[arg(long)]
        file: Option<String>,
        text: Vec<String>,
    },
    /// Record a problem/resolution lesson
    Lesson {
        /// Title, or "problem -> resolution"
        text: Vec<String>,
        #[arg(long)]
        problem: Option<String>,
        #[arg(long)]
        resolution: Option<String>,
        #[arg(long)]
        tags: Option<String>,
    },
    /// Search all context files
    Search { query: Vec<String> },
    /// Archive a file and remove it from live context
    Forget { path: String },
    /// Move a memory file into system/ (always loaded)
    Pin { path: String },
    /// Move a system file back into memory/
    Unpin { path: String },
    /// Create an exploration branch and switch to it
    Branch {
        name: String,
        /// What the branch is exploring
        purpose: Vec<String>,
    },
    /// Switch the active branch
    Switch { name: String },
    /// Merge a branch back into main
    Merge {
        name: String,
        /// Outcome of the exploration
        summary: Vec<String>,
    },
    /// List branches
    Branches,
    /// Compare a branch with main
    Diff { name: String },
    /// Archive old entries and reflections
    Compact {
        /// Keep pinned files only
        #[arg(long)]
        hard: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Auto-resolve merge conflicts in .context/
    Resolve {
        #[arg(long)]
        dry_run: bool,
    },
    /// Reflection cycle
    Reflect {
        #[command(subcommand)]
        command: ReflectCommands,
    },
    /// Show or change config.yaml
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Export the context as a portable snapshot file
    Share {
        /// Directory to write the snapshot into (defaults to the project root)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import a snapshot file
    Import {
        file: PathBuf,
        /// Only write files that do not exist locally
        #[arg(long)]
        merge: bool,
    },
}

#[derive(Subcommand)]
enum ReflectCommands {
    /// Render the reflection prompt for recent activity
    Gather {
        /// Start the window at this commit
        #[arg(long)]
        since: Option<String>,
        /// Include memory diffs
        #[arg(long)]
        deep: bool,
        /// Focus on shrinking the context
        #[arg(long)]
        compaction: bool,
    },
    /// Save a reflection written by the agent
    Save {
        /// Reflection text (reads stdin when omitted)
        #[arg(long)]
        content: Option<String>,
    },
    /// List past reflections and recurring themes
    History {
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Analyze memory health
    Defrag {
        #[arg(long)]
        dry_run: bool,
        /// Flag stale entries in place
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective config
    Show,
    /// Set a dotted key, e.g. reflection.trigger auto
    Set { key: String, value: String },
}

/// Initialize tracing. Logs go to stderr so stdout stays clean for reports.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "amem=debug,agent_mem=debug,agent_mem_core=debug"
    } else {
        "amem=warn,agent_mem=warn,agent_mem_core=warn"
    };
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default.into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(command: Commands, verbose: bool) -> anyhow::Result<()> {
    match command {
        Commands::Init { force } => lifecycle::init(force),
        Commands::Snapshot => lifecycle::snapshot(),
        Commands::Status => lifecycle::status(),
        Commands::Read { path } => entries::read(&path),
        Commands::Write { path, content } => entries::write(&path, content),
        Commands::Commit { message } => {
            let message = (!message.is_empty()).then(|| message.join(" "));
            lifecycle::commit(message)
        }
        Commands::Remember {
            decision,
            pattern,
            mistake,
            note: _,
            file,
            text,
        } => {
            let text = entries::require_text(&text, "amem remember [--decision|--pattern|--mistake|--note] <text>")?;
            let category = entries::category_from_flags(decision, pattern, mistake);
            entries::remember(category, file, &text)
        }
        Commands::Lesson {
            text,
            problem,
            resolution,
            tags,
        } => entries::lesson(
            &text.join(" "),
            problem.as_deref(),
            resolution.as_deref(),
            tags.as_deref(),
        ),
        Commands::Search { query } => {
            let query = entries::require_text(&query, "amem search <query>")?;
            entries::search(&query)
        }
        Commands::Forget { path } => entries::forget(&path),
        Commands::Pin { path } => entries::pin(&path),
        Commands::Unpin { path } => entries::unpin(&path),
        Commands::Branch { name, purpose } => branch::create(&name, &purpose.join(" ")),
        Commands::Switch { name } => branch::switch(&name),
        Commands::Merge { name, summary } => branch::merge(&name, &summary.join(" ")),
        Commands::Branches => branch::list(),
        Commands::Diff { name } => branch::diff(&name, verbose),
        Commands::Compact { hard, dry_run } => lifecycle::compact(hard, dry_run),
        Commands::Resolve { dry_run } => lifecycle::resolve(dry_run),
        Commands::Reflect { command } => match command {
            ReflectCommands::Gather {
                since,
                deep,
                compaction,
            } => reflect::gather(GatherOptions {
                since,
                deep,
                compaction,
            }),
            ReflectCommands::Save { content } => reflect::save(content),
            ReflectCommands::History { limit } => reflect::history(limit),
            ReflectCommands::Defrag { dry_run, apply } => reflect::defrag(dry_run, apply),
        },
        Commands::Config { command } => match command.unwrap_or(ConfigCommands::Show) {
            ConfigCommands::Show => lifecycle::config_show(),
            ConfigCommands::Set { key, value } => lifecycle::config_set(&key, &value),
        },
        Commands::Share { output } => share::export(output),
        Commands::Import { file, merge } => share::import(&file, merge),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!("amem started at {}", commands::now());

    match run(cli.command, cli.verbose) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("❌ {err}");
            if cli.verbose {
                for cause in err.chain().skip(1) {
                    eprintln!("  caused by: {cause}");
                }
            }
            ExitCode::FAILURE
        }
    }
}
