use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use tutor_chat::{
    deliver, handler, highlight, tui, ui, App, Config, Conversation, GenerateClient,
    RevealScheduler,
};

#[derive(Parser)]
#[command(name = "tutor", version)]
#[command(about = "Chat with the Python tutor from your terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Generation endpoint URL (overrides config and TUTOR_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Delay between revealed characters, in milliseconds
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// Log at info level instead of warn
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one prompt and type the reply to stdout
    Ask {
        /// Your question
        prompt: String,
        /// Print the reply at once instead of typing it out
        #[arg(long)]
        instant: bool,
    },
    /// Show settings, optionally updating and saving them
    Config {
        /// Name shown in the header
        #[arg(long)]
        tutor_name: Option<String>,
        /// Syntax highlighting theme for code blocks
        #[arg(long)]
        code_theme: Option<String>,
        /// Write the resulting settings to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(cli.debug)?;

    match cli.command {
        None => run_chat(runtime_config(cli.endpoint, cli.interval_ms)?).await,
        Some(Commands::Ask { prompt, instant }) => {
            let config = runtime_config(cli.endpoint, cli.interval_ms)?;
            ask(&config, &prompt, instant).await
        }
        Some(Commands::Config { tutor_name, code_theme, save }) => {
            // Only the file layer is shown and saved; one-run overrides stay out.
            let path = Config::get_config_path()?;
            let mut config = Config::load_from(&path)?;
            if let Some(name) = tutor_name {
                config.tutor_name = name;
            }
            if let Some(theme) = code_theme {
                config.code_theme = theme;
            }
            show_config(&config, &path, save)
        }
    }
}

/// File config, then the environment, then command-line flags
fn runtime_config(endpoint: Option<String>, interval_ms: Option<u64>) -> Result<Config> {
    let mut config = Config::load()?;
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }
    if let Some(interval_ms) = interval_ms {
        config.reveal_interval_ms = interval_ms;
    }
    tracing::info!(endpoint = %config.endpoint, "starting");
    Ok(config)
}

/// Logs go to a file so they never draw over the terminal UI
fn init_logging(debug: bool) -> Result<WorkerGuard> {
    let log_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join("tutor-chat")
        .join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let mut log_file_opts = OpenOptions::new();
    log_file_opts.create(true).append(true);

    // Ensure the file is only readable and writable by the current user.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        log_file_opts.mode(0o600);
    }

    let log_file = log_file_opts.open(log_dir.join("tutor-chat.log"))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let default_filter = if debug {
        "tutor_chat=info,tutor=info"
    } else {
        "tutor_chat=warn,tutor=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(file_layer).try_init();
    Ok(guard)
}

async fn run_chat(config: Config) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(config.reveal_interval());
    let mut app = App::new(&config);

    let result: Result<()> = async {
        loop {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            let Some(event) = events.next().await else {
                break;
            };
            handler::handle_event(&mut app, event);

            if app.should_quit {
                break;
            }
        }
        Ok(())
    }
    .await;

    tui::restore()?;
    result
}

async fn ask(config: &Config, prompt: &str, instant: bool) -> Result<()> {
    let mut conversation = Conversation::new();
    let mut reveal = RevealScheduler::new();
    let client = GenerateClient::new(&config.endpoint);

    let Some(prompt) = conversation.submit_user_text(prompt) else {
        bail!("prompt is empty");
    };
    let reply = client.generate(&prompt).await;
    deliver(reply, &mut conversation, &mut reveal)?;

    let mut stdout = io::stdout();
    let interval = (!instant).then(|| config.reveal_interval());
    reveal.type_out(&mut conversation, &mut stdout, interval).await?;
    writeln!(stdout)?;
    Ok(())
}

fn show_config(config: &Config, path: &Path, save: bool) -> Result<()> {
    if !highlight::theme_exists(&config.code_theme) {
        eprintln!(
            "Unknown code theme '{}', available: {}",
            config.code_theme,
            highlight::available_themes().join(", ")
        );
    }

    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config.save_to(path)?;
        println!("Saved to {}", path.display());
    } else {
        println!("Config file: {}", path.display());
    }
    Ok(())
}
