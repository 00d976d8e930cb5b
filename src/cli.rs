//! Command-line argument parsing for querygate.

use clap::{Parser, Subcommand};
use querygate::config::Config;
use std::path::PathBuf;

/// Identifier sanitization and confirmation-gated execution for generated SQL.
#[derive(Parser, Debug)]
#[command(name = "querygate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", global = true, env = "QUERYGATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Quote known identifiers in a SQL statement
    Sanitize {
        /// The SQL text
        sql: String,

        /// Known identifiers, comma-separated
        #[arg(short, long, value_name = "NAMES", value_delimiter = ',')]
        identifiers: Vec<String>,

        /// Dialect tag or connection URL
        #[arg(short, long, value_name = "DIALECT", default_value = "postgres")]
        dialect: String,

        /// Take identifiers and dialect from a configured data source
        #[arg(short, long, value_name = "ID", conflicts_with_all = ["identifiers", "dialect"])]
        source: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a SQL statement by operation kind and risk
    Classify {
        /// The SQL text
        sql: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask questions about a data source interactively
    Chat {
        /// Data source id (defaults to the first configured one)
        #[arg(short, long, value_name = "ID")]
        source: Option<String>,

        /// Generator provider, overriding the config file
        #[arg(long, value_name = "PROVIDER")]
        llm: Option<String>,
    },
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// True for the interactive command.
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, Command::Chat { .. })
    }
}
