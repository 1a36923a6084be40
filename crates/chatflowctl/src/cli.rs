use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands;
use crate::commands::completion::Shell;
use crate::config::ChatflowConfig;

/// chatflowctl - run and inspect keyword-triggered conversation flows
#[derive(Parser, Debug)]
#[command(name = "chatflowctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (ChatflowConfig YAML)
    #[arg(long, short = 'c', global = true, env = "CHATFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Flows directory (overrides spec.flows.directory)
    #[arg(long, short = 'f', global = true, env = "CHATFLOW_FLOWS_DIR")]
    pub flows_dir: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the flows from the terminal (one line per message)
    Chat {
        /// User id the messages are sent as
        #[arg(long, short = 'u', default_value = "local-user")]
        user: String,

        /// Platform name recorded on conversations
        #[arg(long, short = 'p', default_value = "cli")]
        platform: String,

        /// Conversation store file (overrides spec.store.path)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Disable intent detection
        #[arg(long)]
        no_intent: bool,
    },

    /// Show which flow a message would start
    Match {
        /// Message text
        text: String,

        /// Also ask the intent detector when no keyword matches
        #[arg(long)]
        intent: bool,

        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Validate flow definition files
    Validate {
        /// Flow files or directories (defaults to the flows directory)
        paths: Vec<PathBuf>,
    },

    /// Conversation metrics from the persisted store
    Metrics {
        /// Period in days
        #[arg(long, short = 'd', default_value_t = 30)]
        days: u32,

        /// Conversation store file (overrides spec.store.path)
        #[arg(long)]
        store: Option<PathBuf>,

        /// Output format (json, yaml, text)
        #[arg(short, long, default_value = "text")]
        output: String,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    pub async fn execute(self) -> anyhow::Result<()> {
        if let Commands::Completion { shell } = self.command {
            return commands::completion::execute(shell);
        }

        let mut config = ChatflowConfig::load(self.config.as_deref())?;
        if let Some(dir) = self.flows_dir {
            config.spec.flows.directory = dir;
        }

        match self.command {
            Commands::Chat {
                user,
                platform,
                store,
                no_intent,
            } => {
                if let Some(path) = store {
                    config.spec.store.path = Some(path);
                }
                if no_intent {
                    config.spec.intent.enabled = false;
                }
                commands::chat::execute(&config, &user, &platform).await
            }
            Commands::Match {
                text,
                intent,
                output,
            } => commands::matching::execute(&config, &text, intent, &output).await,
            Commands::Validate { paths } => {
                let paths = if paths.is_empty() {
                    vec![config.spec.flows.directory.clone()]
                } else {
                    paths
                };
                commands::validate::execute(&paths).await
            }
            Commands::Metrics {
                days,
                store,
                output,
            } => {
                if let Some(path) = store {
                    config.spec.store.path = Some(path);
                }
                commands::metrics::execute(&config, days, &output).await
            }
            Commands::Completion { .. } => Ok(()),
        }
    }
}
