use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use learning_store::backend::initialize_backend;
use learning_store::{BackendPreference, DataAccess, StoreConfig};
use serde::Serialize;
use shared::{ComfortLevel, ConceptStatus, LearningGoal, OnboardingUpdate};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "learning-store")]
#[command(version)]
#[command(about = "Inspect and edit the learning journal's local data")]
struct Cli {
    /// YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config and LEARNING_STORE_DATA_DIR)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Storage backend (overrides config and LEARNING_STORE_BACKEND)
    #[arg(short, long, global = true, value_enum)]
    backend: Option<BackendPreference>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show backend, onboarding and progress counts
    Status,

    /// Show or change onboarding answers
    Onboarding {
        /// fluency, curiosity, career, personal_growth or none
        #[arg(long)]
        goal: Option<String>,

        #[arg(long)]
        comfort: Option<ComfortLevel>,

        #[arg(long)]
        completed: Option<bool>,

        #[arg(long)]
        first_concept_viewed: Option<bool>,
    },

    /// Per-concept learning state
    #[command(subcommand)]
    Concept(ConceptCommands),

    /// Journal entries
    #[command(subcommand)]
    Journal(JournalCommands),

    /// Key/value settings
    #[command(subcommand)]
    Setting(SettingCommands),

    /// Print everything as JSON
    Export,

    /// Delete all learning data
    Clear,
}

#[derive(Subcommand)]
enum ConceptCommands {
    /// Set a concept's status
    Status { id: String, status: ConceptStatus },
    /// Mark a concept explored
    Explore { id: String },
    List,
}

#[derive(Subcommand)]
enum JournalCommands {
    Add {
        #[arg(long)]
        concept: Option<String>,
        text: String,
    },
    Edit { id: String, text: String },
    Delete { id: String },
    List {
        #[arg(long)]
        concept: Option<String>,
    },
}

#[derive(Subcommand)]
enum SettingCommands {
    Get { key: String },
    Set { key: String, value: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_goal(raw: &str) -> Result<Option<LearningGoal>> {
    if raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Ok(Some(raw.parse()?))
}

async fn run(data: &DataAccess, command: Commands) -> Result<()> {
    match command {
        Commands::Status => {
            let onboarding = data.get_onboarding_state().await?;
            let counts = data.status_counts().await?;
            println!("backend:     {}", data.kind());
            println!("onboarding:  {}", if onboarding.completed { "completed" } else { "in progress" });
            println!("explored:    {}", counts.explored);
            println!("resonates:   {}", counts.resonates);
            println!("journal:     {} entries", data.get_journal_entries().await?.len());
        }
        Commands::Onboarding {
            goal,
            comfort,
            completed,
            first_concept_viewed,
        } => {
            let mut update = OnboardingUpdate::new();
            if let Some(goal) = goal {
                update = update.goal(parse_goal(&goal)?);
            }
            if let Some(comfort) = comfort {
                update = update.comfort_level(comfort);
            }
            if let Some(completed) = completed {
                update = update.completed(completed);
            }
            if let Some(viewed) = first_concept_viewed {
                update = update.first_concept_viewed(viewed);
            }

            let state = if update.is_empty() {
                data.get_onboarding_state().await?
            } else {
                data.update_onboarding(&update).await?
            };
            print_json(&state)?;
        }
        Commands::Concept(ConceptCommands::Status { id, status }) => {
            print_json(&data.update_concept_status(&id, status).await?)?;
        }
        Commands::Concept(ConceptCommands::Explore { id }) => {
            print_json(&data.mark_concept_explored(&id).await?)?;
        }
        Commands::Concept(ConceptCommands::List) => {
            print_json(&data.get_all_user_concepts().await?)?;
        }
        Commands::Journal(JournalCommands::Add { concept, text }) => {
            print_json(&data.create_journal_entry(concept.as_deref(), &text).await?)?;
        }
        Commands::Journal(JournalCommands::Edit { id, text }) => {
            print_json(&data.update_journal_entry(&id, &text).await?)?;
        }
        Commands::Journal(JournalCommands::Delete { id }) => {
            data.delete_journal_entry(&id).await?;
        }
        Commands::Journal(JournalCommands::List { concept }) => {
            let entries = match concept {
                Some(concept_id) => data.get_journal_entries_for_concept(&concept_id).await?,
                None => data.get_journal_entries().await?,
            };
            print_json(&entries)?;
        }
        Commands::Setting(SettingCommands::Get { key }) => match data.get_setting(&key).await? {
            Some(value) => println!("{}", value),
            None => println!("(unset)"),
        },
        Commands::Setting(SettingCommands::Set { key, value }) => {
            data.set_setting(&key, &value).await?;
        }
        Commands::Export => {
            print_json(&data.export_snapshot().await?)?;
        }
        Commands::Clear => {
            data.clear_all_data().await?;
            info!("All data cleared");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_directory = data_dir;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    info!("Opening learning store in {}", config.data_directory.display());
    let data = initialize_backend(&config)
        .await
        .context("Failed to open learning store")?;

    run(&data, cli.command).await
}
