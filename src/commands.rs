//! This module defines the command-line interface for the application using `clap`.
//!
//! Credentials can be passed as flags or, more usually, through the
//! environment; [`Cli::overrides`] collects whatever was given so it can be
//! laid over the YAML configuration.
//!
//! # Examples
//!
//! ```no_run
//! use clap::Parser;
//! use pagechat::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! match cli.command.unwrap_or_default() {
//!     Commands::Ask { question } => println!("asking {question}"),
//!     _ => {}
//! }
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::CredentialOverrides;
use crate::confluence::DEFAULT_CQL;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// Configuration file. Defaults to `config.yaml` in the platform config directory.
    #[arg(long, short = 'c', global = true, env = "PAGECHAT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// The subcommand to run. `interactive` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Credentials that override the configuration file.
#[derive(Args, Debug, Default)]
pub struct CredentialArgs {
    #[arg(long, global = true, env = "CONFLUENCE_BASE_URL")]
    pub confluence_base_url: Option<String>,

    #[arg(long, global = true, env = "CONFLUENCE_USER_EMAIL")]
    pub confluence_user_email: Option<String>,

    #[arg(long, global = true, env = "CONFLUENCE_API_TOKEN", hide_env_values = true)]
    pub confluence_api_token: Option<String>,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, global = true, env = "OPENAI_API_BASE")]
    pub openai_api_base: Option<String>,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug, PartialEq, Default)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Index the configured pages, then answer questions until `exit`.
    ///
    /// This subcommand can be invoked with either 'i' or 'interactive'.
    #[default]
    #[clap(name = "interactive", alias = "i")]
    Interactive,

    /// Index the configured pages and answer a single question.
    #[clap(name = "ask", alias = "a")]
    Ask {
        /// The question to be asked.
        question: String,
    },

    /// List page ids matching a CQL query, for filling in `page_ids`.
    Pages {
        #[arg(long, default_value = DEFAULT_CQL)]
        cql: String,

        #[arg(long, default_value_t = 25)]
        limit: usize,
    },

    /// Write a default configuration file.
    Init,
}

impl Cli {
    pub fn overrides(&self) -> CredentialOverrides {
        let CredentialArgs {
            confluence_base_url,
            confluence_user_email,
            confluence_api_token,
            openai_api_key,
            openai_api_base,
        } = &self.credentials;

        CredentialOverrides {
            confluence_base_url: confluence_base_url.clone(),
            confluence_user_email: confluence_user_email.clone(),
            confluence_api_token: confluence_api_token.clone(),
            openai_api_key: openai_api_key.clone(),
            openai_api_base: openai_api_base.clone(),
        }
    }
}
