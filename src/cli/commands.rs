use anyhow::{bail, Result};
use colored::Colorize;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::app::{init_config, AppState};
use crate::models::User;
use crate::upload::UploadFile;

use super::chat::{format_conversation, format_message, progress_printer, run_chat};
use super::{Commands, OutputFormat};

/// Handle CLI subcommands
pub async fn handle_command(command: &Commands, state: &AppState, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Init => {
            println!("Initializing TaxChat configuration...");
            let path = init_config()?;
            println!("Configuration written to {}", path.display());
            Ok(())
        }
        Commands::Login { email, password } => {
            let user = state.auth.login(email, password).await?;
            print_login(state, &user, format)
        }
        Commands::Signup {
            name,
            email,
            password,
        } => {
            let user = state.auth.signup(name, email, password).await?;
            print_login(state, &user, format)
        }
        Commands::Whoami => {
            let user = require_login(state).await?;
            emit(format, &user, || {
                println!("{} <{}>", user.name.bold(), user.email);
            })
        }
        Commands::List => {
            require_login(state).await?;
            state.session.list_conversations().await?;
            let snapshot = state.session.snapshot();
            emit(format, &snapshot.conversations, || {
                if snapshot.conversations.is_empty() {
                    println!("{}", "No conversations yet.".dimmed());
                }
                for conversation in &snapshot.conversations {
                    println!("{}", format_conversation(conversation, false));
                }
            })
        }
        Commands::New { title } => {
            require_login(state).await?;
            let conversation = state.session.create_conversation(title.as_deref()).await?;
            emit(format, &conversation, || {
                println!("Created {} ({})", conversation.title.bold(), conversation.id);
            })
        }
        Commands::Show { id } => {
            require_login(state).await?;
            state.session.select_conversation(Some(id.as_str())).await;
            let snapshot = state.session.snapshot();
            if let Some(error) = snapshot.error {
                bail!(error);
            }
            emit(format, &snapshot.messages, || {
                for message in &snapshot.messages {
                    println!("{}", format_message(message));
                }
            })
        }
        Commands::Send { id, text, file } => {
            require_login(state).await?;
            state.session.select_conversation(Some(id.as_str())).await;
            let before = state.session.snapshot().messages.len();

            match file {
                Some(path) => {
                    let file = UploadFile::from_path(path, state.config.upload.max_file_size).await?;
                    state
                        .session
                        .send_message_with_file(
                            id,
                            text,
                            file,
                            (format == OutputFormat::Text).then(progress_printer),
                            CancellationToken::new(),
                        )
                        .await?
                }
                None => state.session.send_message(id, text, None).await?,
            }

            let snapshot = state.session.snapshot();
            let exchange = snapshot.messages.get(before..).unwrap_or_default();
            emit(format, &exchange, || {
                for message in exchange {
                    println!("{}", format_message(message));
                }
            })
        }
        Commands::Rename { id, title } => {
            require_login(state).await?;
            state.session.list_conversations().await?;
            state.session.rename_conversation(id, title).await?;
            println!("Renamed {} to {}", id, title.bold());
            Ok(())
        }
        Commands::Delete { id } => {
            require_login(state).await?;
            state.session.delete_conversation(id).await?;
            println!("Deleted {}", id);
            Ok(())
        }
        Commands::Chat { id } => {
            require_login(state).await?;
            run_chat(state, id.clone()).await
        }
    }
}

async fn require_login(state: &AppState) -> Result<User> {
    match state.auth.check_auth().await {
        Some(user) => Ok(user),
        None => bail!(
            "Not logged in. Run `taxchat login` and export ${} first.",
            state.config.api.token_env
        ),
    }
}

fn print_login(state: &AppState, user: &User, format: OutputFormat) -> Result<()> {
    let token = state.tokens.access_token().unwrap_or_default();
    if format == OutputFormat::Json {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Login<'a> {
            user: &'a User,
            access_token: &'a str,
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&Login {
                user,
                access_token: &token
            })?
        );
        return Ok(());
    }

    println!("Logged in as {} <{}>", user.name.bold(), user.email);
    println!("Export the access token to use it in later commands:");
    println!("  export {}={}", state.config.api.token_env, token);
    Ok(())
}

/// Print `value` as JSON, or run `text` for human output
fn emit<T: Serialize + ?Sized>(format: OutputFormat, value: &T, text: impl FnOnce()) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(),
    }
    Ok(())
}
