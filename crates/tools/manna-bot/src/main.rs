use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use manna_bot::console::run_console;
use manna_bot::{BotConfig, Dispatcher};
use manna_ledger::{metrics, Ledger, PlayerId, SledPlayerStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Manna ledger for a Lancer campaign
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Path to the bot configuration file.
    #[clap(short, long, value_parser, default_value = "config/bot.toml")]
    config: PathBuf,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single command message, e.g. `exec --user 42 ">buy l ta"`
    Exec {
        /// User id the message is sent as
        #[clap(long)]
        user: PlayerId,

        /// The message text; the command prefix is added if missing
        #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        message: Vec<String>,
    },

    /// Read command messages from stdin until EOF or Ctrl+C.
    /// Start a line with `<@id>` to send it as another user.
    Console {
        /// Default user id for lines without a mention
        #[clap(long)]
        user: PlayerId,

        /// Print Prometheus metrics when the console exits
        #[clap(long)]
        metrics_on_exit: bool,
    },

    /// Print every player's status line
    List,
}

fn init_tracing(config: &BotConfig) {
    let log_level_str = config.log_level.as_deref().unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level_str))
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BotConfig::load(&cli.config)?;
    init_tracing(&config);
    info!("Loaded configuration from: {:?}", cli.config);

    let store = SledPlayerStore::open(&config.storage_path)
        .with_context(|| format!("Failed to open player store at {:?}", config.storage_path))?;
    let ledger = Arc::new(Ledger::with_pricing(store, config.pricing));
    let dispatcher = Dispatcher::new(ledger.clone(), config.command_prefix.clone(), config.gm_manna);

    let outcome = match cli.command {
        Commands::Exec { user, message } => {
            let mut text = message.join(" ");
            if !text.starts_with(dispatcher.prefix()) {
                text.insert_str(0, dispatcher.prefix());
            }
            match dispatcher.handle_message(user, &text)? {
                Some(reply) => {
                    println!("{}", reply.text());
                    if let Some(announcement) = &reply.announcement {
                        println!("{} {}", "announce:".bold(), announcement);
                    }
                }
                None => println!("{}", "Not a command.".yellow()),
            }
            Ok(())
        }
        Commands::Console {
            user,
            metrics_on_exit,
        } => {
            info!("Console started; default user {}", user);
            let stdin = BufReader::new(tokio::io::stdin());
            let stdout = tokio::io::stdout();
            let result = tokio::select! {
                res = run_console(&dispatcher, user, stdin, stdout) => {
                    res.map(|answered| info!("Console input closed after {} commands", answered))
                }
                _ = signal::ctrl_c() => {
                    info!("Received shutdown signal (Ctrl+C).");
                    Ok(())
                }
            };
            if metrics_on_exit {
                eprintln!("{}", metrics::render());
            }
            result
        }
        Commands::List => {
            let records = ledger.list()?;
            if records.is_empty() {
                println!("{}", "No players yet.".yellow());
            }
            for record in records {
                println!("{} {}", format!("{:>20}", record.id.0).dimmed(), record);
            }
            Ok(())
        }
    };

    if let Err(e) = ledger.flush() {
        error!("Failed to flush player store on exit: {}", e);
    }
    outcome
}
