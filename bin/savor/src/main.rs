mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::articles::ShowField;

#[derive(Parser)]
#[command(name = "savor")]
#[command(about = "Writing-style skills that learn from your edits", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage writing-style skills and their versions
    #[command(alias = "skills")]
    Skill {
        #[command(subcommand)]
        command: SkillCommands,
    },

    /// Draft, refine and publish articles
    #[command(alias = "articles")]
    Article {
        #[command(subcommand)]
        command: ArticleCommands,
    },

    /// Compare drafts with refinements and evolve skills from the edits
    Diff {
        #[command(subcommand)]
        command: DiffCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

// ── Skills ──────────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum SkillCommands {
    /// Create a skill (version 1 is an empty template unless --content is given)
    Create {
        name: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Markdown file with the initial skill content
        #[arg(long)]
        content: Option<PathBuf>,
    },
    /// Create a skill by extracting the style of writing samples
    CreateFromSamples {
        name: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Samples inline, separated by lines containing only ---
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// File with the samples (- for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// List skills, most recently updated first
    List,
    /// Show a skill and its current content
    Show {
        skill_id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Update name, category or description
    Update {
        skill_id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a skill and its versions
    Delete {
        skill_id: i64,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// List the version history
    Versions { skill_id: i64 },
    /// Show one version
    Version {
        skill_id: i64,
        version_number: i64,
        #[arg(long)]
        json: bool,
    },
    /// Export the current version as markdown or JSON
    Export {
        skill_id: i64,
        /// md or json
        #[arg(long, default_value = "md")]
        format: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write into ~/.savor/exports
        #[arg(long, conflicts_with = "output")]
        save: bool,
    },
    /// List the original samples of a skill
    Samples { skill_id: i64 },
}

// ── Articles ────────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ArticleCommands {
    /// Draft an article with a skill
    Generate {
        skill_id: i64,
        /// What the article is about
        topic: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Save your refined version of an article
    Save {
        article_id: i64,
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// File with the refined text (- for stdin)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show an article
    Show {
        article_id: i64,
        /// refined, draft or original
        #[arg(long, default_value = "refined")]
        field: String,
        #[arg(long)]
        json: bool,
    },
    /// List articles, newest first
    List {
        /// Only articles drafted with this skill
        #[arg(long)]
        skill: Option<i64>,
    },
    /// Mark an article as published
    Publish { article_id: i64 },
    /// Show where an article is in the evolution loop
    State { article_id: i64 },
}

// ── Diff & evolution ────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum DiffCommands {
    /// Diff two files without storing anything
    Compute {
        original: PathBuf,
        modified: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Analyze the edits made on an article
    Analyze {
        article_id: i64,
        /// Original text (defaults to the stored draft)
        #[arg(long, requires = "modified")]
        original: Option<PathBuf>,
        /// Modified text (defaults to the stored refinement)
        #[arg(long, requires = "original")]
        modified: Option<PathBuf>,
    },
    /// Re-run a failed analysis
    Retry { diff_record_id: i64 },
    /// Apply a diff record's rules to its skill as a new version
    Evolve { diff_record_id: i64 },
    /// List diff records of an article
    List { article_id: i64 },
    /// Show a diff record
    Show {
        diff_record_id: i64,
        #[arg(long)]
        json: bool,
    },
}

// ── Config ──────────────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the configuration (API keys masked)
    Show,
    /// Print config, database and export locations
    Path,
    /// Get a config value by dot-separated key (e.g. llm.model)
    Get { key: String },
    /// Set a config value by dot-separated key
    Set {
        key: String,
        /// Value to set (auto-detects JSON types; string fields stay strings)
        value: String,
    },
    /// Send a short prompt to the configured model
    Test,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Skill { command } => match command {
            SkillCommands::Create { name, category, description, content } => {
                commands::skills::create(name, category, description, content).await?;
            }
            SkillCommands::CreateFromSamples { name, category, description, text, file } => {
                commands::skills::create_from_samples(name, category, description, text, file).await?;
            }
            SkillCommands::List => {
                commands::skills::list().await?;
            }
            SkillCommands::Show { skill_id, json } => {
                commands::skills::show(skill_id, json).await?;
            }
            SkillCommands::Update { skill_id, name, category, description } => {
                commands::skills::update(skill_id, name, category, description).await?;
            }
            SkillCommands::Delete { skill_id, force } => {
                commands::skills::delete(skill_id, force).await?;
            }
            SkillCommands::Versions { skill_id } => {
                commands::skills::versions(skill_id).await?;
            }
            SkillCommands::Version { skill_id, version_number, json } => {
                commands::skills::version(skill_id, version_number, json).await?;
            }
            SkillCommands::Export { skill_id, format, output, save } => {
                commands::skills::export(skill_id, &format, output, save).await?;
            }
            SkillCommands::Samples { skill_id } => {
                commands::skills::samples(skill_id).await?;
            }
        },

        Commands::Article { command } => match command {
            ArticleCommands::Generate { skill_id, topic, title } => {
                commands::articles::generate(skill_id, &topic, title).await?;
            }
            ArticleCommands::Save { article_id, text, file } => {
                commands::articles::save(article_id, text, file).await?;
            }
            ArticleCommands::Show { article_id, field, json } => {
                commands::articles::show(article_id, ShowField::parse(&field)?, json).await?;
            }
            ArticleCommands::List { skill } => {
                commands::articles::list(skill).await?;
            }
            ArticleCommands::Publish { article_id } => {
                commands::articles::publish(article_id).await?;
            }
            ArticleCommands::State { article_id } => {
                commands::articles::state(article_id).await?;
            }
        },

        Commands::Diff { command } => match command {
            DiffCommands::Compute { original, modified, json } => {
                commands::diff::compute(original, modified, json).await?;
            }
            DiffCommands::Analyze { article_id, original, modified } => {
                commands::diff::analyze(article_id, original, modified).await?;
            }
            DiffCommands::Retry { diff_record_id } => {
                commands::diff::retry(diff_record_id).await?;
            }
            DiffCommands::Evolve { diff_record_id } => {
                commands::diff::evolve(diff_record_id).await?;
            }
            DiffCommands::List { article_id } => {
                commands::diff::list(article_id).await?;
            }
            DiffCommands::Show { diff_record_id, json } => {
                commands::diff::show(diff_record_id, json).await?;
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                commands::config_cmd::show().await?;
            }
            ConfigCommands::Path => {
                commands::config_cmd::path().await?;
            }
            ConfigCommands::Get { key } => {
                commands::config_cmd::get(&key).await?;
            }
            ConfigCommands::Set { key, value } => {
                commands::config_cmd::set(&key, &value).await?;
            }
            ConfigCommands::Test => {
                commands::config_cmd::test().await?;
            }
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<savor_core::Error>() {
            Some(err) => eprintln!("error[{}]: {}", err.kind(), err),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}
