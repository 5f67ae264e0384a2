use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::Rng;
use tracing_subscriber::EnvFilter;

use wynbot::corpus::load_corpus_text;
use wynbot::markov::{TaggedTokenizer, Tokenizer, WordTokenizer, load_or_build};
use wynbot::{
    Archive, ChatSession, Config, Corpus, CorpusMode, CredentialManager, FALLBACK_MESSAGE,
    LoopbackTransport, SessionConfig, StdinPrompt, config,
};

/// wynbot - send one generated message in a contact's writing style
#[derive(Parser)]
#[command(name = "wynbot", version, about)]
struct Cli {
    /// Directory containing wynbot.toml, the corpus, and the model cache
    #[arg(short, long, env = "WYNBOT_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Delay in seconds before sending; -1 picks a random delay
    #[arg(short, long, default_value = "-1")]
    delay: i64,

    /// Max character length for the generated message
    #[arg(short = 'n', long, default_value = "140")]
    max_chars: usize,

    /// State size for the Markov model
    #[arg(short = 's', long, default_value = "2")]
    order: usize,

    /// Tag tokens with a word class during training
    #[arg(long)]
    tagged: bool,

    /// Recipients to address; omit to send to the whole roster
    #[arg(short, long)]
    to: Vec<String>,

    /// Generate and print the message without connecting
    #[arg(long)]
    print_only: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log errors only
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List conversation ids and participants found in an archive
    Conversations {
        /// Path to the takeout JSON archive
        archive: PathBuf,
    },
    /// Build the training corpus from an archive
    BuildCorpus {
        /// Path to the takeout JSON archive
        archive: PathBuf,
        /// Conversation id to extract
        #[arg(short, long)]
        conversation: String,
        /// Keep every message in order instead of collapsing by timestamp
        #[arg(long)]
        ordered: bool,
        /// Output file; defaults to the corpus path from config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Random pre-send window when no delay is given: 1s to 8 hours
const RANDOM_DELAY_RANGE: std::ops::RangeInclusive<u64> = 1..=8 * 60 * 60;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "info,wynbot=debug",
            2 => "debug",
            _ => "trace",
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(config::default_config_dir);
    let config_path = config_dir.join(config::CONFIG_FILE);
    let config = Config::load(&config_path)?;
    tracing::debug!(path = %config_path.display(), "using config file");

    if let Some(command) = cli.command {
        return match command {
            Command::Conversations { archive } => list_conversations(&archive),
            Command::BuildCorpus {
                archive,
                conversation,
                ordered,
                output,
            } => {
                // Keyed corpora serialize as JSON, ordered ones as plain text
                let default_ext = if ordered { "txt" } else { "json" };
                let output = output.unwrap_or_else(|| {
                    config.corpus_path(&config_dir).with_extension(default_ext)
                });
                build_corpus(&archive, &conversation, ordered, output)
            }
        };
    }

    send_generated_message(&cli, &config, &config_dir, &config_path).await
}

async fn send_generated_message(
    cli: &Cli,
    config: &Config,
    config_dir: &std::path::Path,
    config_path: &std::path::Path,
) -> anyhow::Result<()> {
    let tokenizer: Box<dyn Tokenizer> = if cli.tagged {
        Box::new(TaggedTokenizer)
    } else {
        Box::new(WordTokenizer)
    };

    let corpus_path = resolve_corpus_path(config, config_dir);
    let cache_path = config.model_cache_path(config_dir);
    let (chain, source) =
        load_or_build(&corpus_path, &cache_path, cli.order, tokenizer.as_ref())?;
    tracing::debug!(?source, order = cli.order, "model ready");

    let corpus_text = load_corpus_text(&corpus_path)?;
    // Scope the thread-local rng so it is not held across awaits
    let (message, delay) = {
        let mut rng = rand::thread_rng();
        let message = chain
            .make_short_sentence(&corpus_text, cli.max_chars, tokenizer.as_ref(), &mut rng)
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
        let delay = if cli.delay < 0 {
            rng.gen_range(RANDOM_DELAY_RANGE)
        } else {
            cli.delay.unsigned_abs()
        };
        (message, delay)
    };
    tracing::info!(chars = message.chars().count(), %message, "generated message");

    if cli.print_only {
        println!("{message}");
        return Ok(());
    }
    if delay > 0 {
        tracing::info!(delay_secs = delay, "sleeping before send");
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }

    let mut credentials =
        CredentialManager::new(config, config_path.to_path_buf(), Box::new(StdinPrompt));
    let identity = credentials.profile_email().await?;
    tracing::debug!(%identity, "chat login identity");

    // Real protocol bindings implement ChatTransport; the loopback stands in
    // until one is wired up
    let transport = LoopbackTransport::new(&identity, Vec::new());
    let mut session = ChatSession::new(transport, SessionConfig::default());
    session.connect(&mut credentials).await?;

    let reached = if cli.to.is_empty() {
        session.send_to_all(&message).await?
    } else {
        session.send_to(&cli.to, &message).await?
    };
    session.teardown(true).await?;

    tracing::info!(reached, "finished sending today's message");
    Ok(())
}

/// Prefer the configured corpus path, then an existing keyed JSON corpus,
/// then the plain-text default
fn resolve_corpus_path(config: &Config, config_dir: &std::path::Path) -> PathBuf {
    if let Some(path) = &config.paths.corpus {
        return path.clone();
    }
    let json = config_dir.join("corpus.json");
    if json.exists() {
        return json;
    }
    config_dir.join(config::CORPUS_FILE)
}

fn list_conversations(archive_path: &std::path::Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(archive_path)?;
    let archive = Archive::from_json(&bytes)?;

    for conversation in archive.conversations() {
        println!("{}\t{}", conversation.id, conversation.participants.join(", "));
    }
    Ok(())
}

fn build_corpus(
    archive_path: &std::path::Path,
    conversation: &str,
    ordered: bool,
    output: PathBuf,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(archive_path)?;
    let archive = Archive::from_json(&bytes)?;

    let mode = if ordered {
        CorpusMode::Ordered
    } else {
        CorpusMode::Keyed
    };
    let corpus = Corpus::build(archive.messages(conversation), mode);
    if corpus.is_empty() {
        tracing::warn!(conversation, "no messages extracted for conversation");
    }
    corpus.write(&output)?;

    println!("{} records written to {}", corpus.len(), output.display());
    Ok(())
}
