use std::io::Read;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use idea_critic::config::{ClientConfig, ConfigError};
use idea_critic::net::types::{Critique, ScoreBand, ScoreCategory};
use idea_critic::net::{ApiClient, ApiError};
use idea_critic::state::{AppState, AppStore};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("client setup failed: {0}")]
    Api(#[from] ApiError),
    #[error("failed to read input: {0}")]
    Input(#[from] std::io::Error),
    #[error("idea text is empty")]
    EmptyIdea,
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "idea-critic", about = "Submit ideas for critique and revise the result")]
struct Cli {
    /// Overrides `IDEA_CRITIC_API_URL`.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Critique one idea and print the result.
    Submit(SubmitArgs),
    /// Interactive session.
    Shell {
        #[arg(long)]
        stream: bool,
    },
}

#[derive(Args, Debug)]
struct SubmitArgs {
    /// Idea text, or `-` to read stdin.
    idea: String,
    #[arg(long)]
    stream: bool,
    #[arg(long)]
    defend: bool,
    #[arg(long)]
    improve: bool,
    /// Print the critique as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = resolve_config(cli.base_url.as_deref())?;
    let store = AppStore::new(Arc::new(ApiClient::new(config)?));

    match cli.command {
        Command::Submit(args) => run_submit(&store, args).await,
        Command::Shell { stream } => run_shell(&store, stream).await,
    }
}

fn resolve_config(base_url: Option<&str>) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = base_url {
        config.base_url = ClientConfig::new(url)?.base_url;
    }
    Ok(config)
}

async fn run_submit(store: &AppStore, args: SubmitArgs) -> Result<(), CliError> {
    let idea = if args.idea == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        args.idea
    };
    if idea.trim().is_empty() {
        return Err(CliError::EmptyIdea);
    }

    store.set_idea(idea);
    submit(store, args.stream).await;
    check(&store.snapshot())?;

    if args.defend {
        store.defend_idea().await;
        check(&store.snapshot())?;
    }
    if args.improve {
        store.improve_idea().await;
        check(&store.snapshot())?;
    }

    let state = store.snapshot();
    let Some(critique) = state.critique else {
        return Err(CliError::Request("no critique returned".into()));
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&critique)?);
    } else {
        print_critique(&critique);
    }
    Ok(())
}

/// Submit the current idea and wait until the store settles.
async fn submit(store: &AppStore, stream: bool) {
    if !stream {
        store.submit_idea().await;
        return;
    }

    let mut rx = store.subscribe();
    store.submit_idea_streaming().await;
    let mut shown = String::new();
    loop {
        {
            let state = rx.borrow_and_update();
            if !state.is_loading {
                break;
            }
            if state.streaming_content != shown {
                shown.clone_from(&state.streaming_content);
                eprintln!("{shown}");
            }
        }
        if rx.changed().await.is_err() {
            break;
        }
    }
}

fn check(state: &AppState) -> Result<(), CliError> {
    match &state.last_error {
        Some(message) => Err(CliError::Request(message.clone())),
        None => Ok(()),
    }
}

fn print_critique(critique: &Critique) {
    println!("{}", critique.review.trim_end());
    println!();
    for category in ScoreCategory::ALL {
        let score = critique.scores.get(category);
        let filled = usize::from(score / 10);
        println!(
            "{:<12} {:>3}  [{}{}] {}",
            category.label(),
            score,
            "#".repeat(filled),
            ".".repeat(10 - filled),
            ScoreBand::from_score(score).label()
        );
    }
}

async fn run_shell(store: &AppStore, stream: bool) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("enter an idea, or :defend :improve :reset :quit");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" => break,
            ":reset" => {
                store.reset();
                eprintln!("cleared");
                continue;
            }
            ":defend" => store.defend_idea().await,
            ":improve" => store.improve_idea().await,
            idea => {
                store.set_idea(idea);
                submit(store, stream).await;
            }
        }

        let state = store.snapshot();
        if let Some(message) = &state.last_error {
            eprintln!("error: {message}");
        } else if let Some(critique) = &state.critique {
            print_critique(critique);
        } else {
            eprintln!("nothing to revise yet");
        }
    }
    Ok(())
}
