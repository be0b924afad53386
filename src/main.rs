//! Main module for the pagechat CLI.
//!
//! Parses the command line, loads and validates the configuration, builds the
//! chatbot's collaborators and runs the selected command.
//!
//! # Examples
//!
//! ```sh
//! pagechat init
//! pagechat pages --cql "space=GP"
//! pagechat ask "How do I request a new laptop?"
//! pagechat            # interactive
//! ```

use std::{error::Error, fs, io, path::Path, process};

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use pagechat::{
    chatbot::ConfluenceChatbot,
    commands::{Cli, Commands},
    config::{self, ChatConfig, CredentialOverrides},
    confluence::ConfluenceClient,
    context::ContextAssembler,
    default_config_path,
    embeddings::SentenceEmbedder,
    llm::OpenAiChat,
    repl,
};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt().with_writer(io::stderr).init();
    });

    let outcome = tokio::runtime::Runtime::new()
        .map_err(Box::<dyn Error>::from)
        .and_then(|runtime| runtime.block_on(run()));

    if let Err(e) = outcome {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let overrides = cli.overrides();

    match cli.command.unwrap_or_default() {
        Commands::Init => init(&config_path)?,
        Commands::Pages { cql, limit } => {
            let config = load_config(&config_path, overrides)?;
            let client = ConfluenceClient::new(&config.confluence)?;
            for id in client.search_pages(&cql, limit).await? {
                println!("{id}");
            }
        }
        Commands::Ask { question } => {
            let config = load_config(&config_path, overrides)?;
            let bot = start_chatbot(&config).await?;
            let reply = bot.chat_with_context(&question).await?;
            println!("{}", reply.answer);
        }
        Commands::Interactive => {
            let config = load_config(&config_path, overrides)?;
            let bot = start_chatbot(&config).await?;
            let stdin = io::stdin();
            repl::interactive_mode(&bot, config.fetch_failures, stdin.lock(), &mut io::stdout())
                .await?;
        }
    }

    Ok(())
}

fn load_config(path: &Path, overrides: CredentialOverrides) -> Result<ChatConfig, Box<dyn Error>> {
    let config = config::load_or_default(path)?.with_overrides(overrides);
    debug!("Config loaded: {:?}", config);
    Ok(config)
}

/// Validate the configuration, build the collaborators and index the corpus.
async fn start_chatbot(
    config: &ChatConfig,
) -> Result<ConfluenceChatbot<SentenceEmbedder, ConfluenceClient, OpenAiChat>, Box<dyn Error>> {
    config.validate()?;

    let store = ConfluenceClient::new(&config.confluence)?;
    let llm = OpenAiChat::new(&config.llm)?;
    let settings = config.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || SentenceEmbedder::load(&settings)).await??;

    let mut bot = ConfluenceChatbot::new(embedder, store, llm)
        .with_assembler(ContextAssembler::from(&config.retrieval))
        .with_top_k(config.retrieval.top_k);

    println!("Indexing Confluence pages...");
    let progress = ProgressBar::new(config.page_ids.len() as u64)
        .with_style(ProgressStyle::with_template("{bar:40} [{pos}/{len}] Fetching {msg}")?);
    let report = bot
        .index_pages_with_progress(&config.page_ids, &progress)
        .await?;
    repl::write_index_report(&mut io::stdout(), &report, config.fetch_failures)?;

    Ok(bot)
}

/// Write a default configuration to `config_path`, leaving an existing file alone.
fn init(config_path: &Path) -> Result<(), Box<dyn Error>> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }
    if let Some(parent) = config_path.parent() {
        info!("Creating config directory: {}", parent.display());
        fs::create_dir_all(parent)?;
    }

    info!("Creating config file: {}", config_path.display());
    let config_yaml = serde_yaml::to_string(&ChatConfig::default())?;
    fs::write(config_path, config_yaml)?;
    println!(
        "Wrote {}. Add page_ids and credentials before asking questions.",
        config_path.display()
    );

    Ok(())
}
