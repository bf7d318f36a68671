use std::path::PathBuf;
use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use blogchat_core::session::error_text;
use blogchat_core::{ChatSession, Config, FeedLoader, PostCache, SendOutcome};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

const DEFAULT_LOG_FILTER: &str = "blogchat=info,blogchat_core=info";

#[derive(Parser)]
#[command(name = "blogchat", version)]
#[command(about = "Chat with an AI assistant about a technical blog")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Feed location (URL or local file), overrides the configured site
    #[arg(long, global = true)]
    feed: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        question: String,
    },
    /// List posts from the feed
    Posts {
        /// Only show posts matching this text
        #[arg(short, long)]
        search: Option<String>,
        /// Maximum number of posts to list
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Print the system prompt that would be sent
    Prompt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let feed_location = cli.feed.clone().unwrap_or_else(|| config.feed_location());
    let loader = FeedLoader::new(&feed_location);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            init_file_logging()?;
            run_tui(config, loader).await
        }
        Commands::Ask { question } => {
            init_stderr_logging();
            ask(config, loader, &question).await
        }
        Commands::Posts { search, limit } => {
            init_stderr_logging();
            list_posts(&loader, search.as_deref(), limit).await
        }
        Commands::Prompt => {
            init_stderr_logging();
            let session = ChatSession::new(config, loader.load().await);
            println!("{}", session.system_prompt());
            Ok(())
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// The terminal belongs to the TUI, so logs go to a file next to the config.
fn init_file_logging() -> Result<()> {
    let dir = Config::get_config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("blogchat.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

async fn run_tui(config: Config, loader: FeedLoader) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut app = App::new(ChatSession::new(config, PostCache::new()));
    app.spawn_feed_load(loader);

    let result = run_loop(&mut terminal, &mut app).await;

    tui::restore()?;
    info!("chat closed");
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}

async fn ask(config: Config, loader: FeedLoader, question: &str) -> Result<()> {
    let mut session = ChatSession::new(config, loader.load().await);

    let (text, answered) = reply_text(session.send(question).await)?;
    println!("{}", text);
    if !answered {
        std::process::exit(1);
    }
    Ok(())
}

/// What `ask` prints to stdout. A failed request still prints its formatted
/// error, flagged so the process exits non-zero.
fn reply_text(outcome: SendOutcome) -> Result<(String, bool)> {
    match outcome {
        SendOutcome::Answered(answer) => Ok((answer, true)),
        SendOutcome::Failed(e) => Ok((error_text(&e), false)),
        SendOutcome::Rejected(e) => bail!(e.to_string()),
        SendOutcome::Ignored | SendOutcome::Busy => bail!("Nothing to send"),
    }
}

async fn list_posts(loader: &FeedLoader, search: Option<&str>, limit: usize) -> Result<()> {
    let posts = loader.load().await;
    if posts.is_empty() {
        println!("No posts loaded from {}", loader.location());
        return Ok(());
    }

    let listed: Vec<_> = match search {
        Some(query) => posts.search(query),
        None => posts.get_all_posts().iter().take(limit).collect(),
    };

    if listed.is_empty() {
        println!("No posts found");
        return Ok(());
    }

    println!("{} of {} posts:\n", listed.len(), posts.len());
    for (i, post) in listed.iter().enumerate() {
        println!("{}. {}", i + 1, post.title);
        if !post.link.is_empty() {
            println!("   {}", post.link);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogchat_core::ChatError;

    #[test]
    fn failed_request_prints_formatted_error() {
        let (text, answered) =
            reply_text(SendOutcome::Failed(ChatError::Network("overloaded".to_string()))).unwrap();
        assert_eq!(text, "❌ 错误: overloaded");
        assert!(!answered);
    }

    #[test]
    fn answer_is_printed_as_is() {
        let (text, answered) = reply_text(SendOutcome::Answered("**hi**".to_string())).unwrap();
        assert_eq!(text, "**hi**");
        assert!(answered);
    }

    #[test]
    fn rejected_send_is_an_error() {
        let outcome = SendOutcome::Rejected(ChatError::Configuration("no key".to_string()));
        assert!(reply_text(outcome).is_err());
        assert!(reply_text(SendOutcome::Ignored).is_err());
    }
}
