use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taxchat")]
#[command(version)]
#[command(about = "Terminal client for the tax assistant chat API", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// API base URL (overrides configuration)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Output format for one-shot commands
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output_format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Initialize configuration
    Init,
    /// Log in and print an access token to export
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TAXCHAT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TAXCHAT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the logged-in account
    Whoami,
    /// List conversations
    List,
    /// Start a new conversation
    New {
        #[arg(long)]
        title: Option<String>,
    },
    /// Print a conversation's messages
    Show { id: String },
    /// Send one message and print the reply
    Send {
        id: String,
        text: String,
        /// Upload and attach a file first
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Rename a conversation
    Rename { id: String, title: String },
    /// Delete a conversation
    Delete { id: String },
    /// Start an interactive chat session (default)
    Chat {
        /// Conversation to resume; a new one is created when omitted
        id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    Text,
    /// JSON structured output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_with_file() {
        let cli = Cli::parse_from([
            "taxchat",
            "send",
            "c1",
            "What can I claim?",
            "--file",
            "receipts.pdf",
        ]);
        assert_eq!(
            cli.command,
            Some(Commands::Send {
                id: "c1".to_string(),
                text: "What can I claim?".to_string(),
                file: Some(PathBuf::from("receipts.pdf")),
            })
        );
        assert_eq!(cli.output_format, OutputFormat::Text);
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from([
            "taxchat",
            "--api-url",
            "https://tax.example.com/api",
            "--output-format",
            "json",
            "-v",
            "list",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.api_url.as_deref(), Some("https://tax.example.com/api"));
        assert_eq!(cli.output_format, OutputFormat::Json);
        assert_eq!(cli.command, Some(Commands::List));
    }

    #[test]
    fn test_chat_is_optional() {
        let cli = Cli::parse_from(["taxchat"]);
        assert_eq!(cli.command, None);

        let cli = Cli::parse_from(["taxchat", "chat", "c9"]);
        assert_eq!(cli.command, Some(Commands::Chat { id: Some("c9".to_string()) }));
    }
}
