use anyhow::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::app::AppState;
use crate::models::{Conversation, Message, Role};
use crate::session::{ConversationSessionManager, SessionSnapshot};
use crate::upload::{ProgressCallback, UploadFile};

/// One line typed at the chat prompt
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Input {
    Empty,
    Message(String),
    Help,
    Quit,
    List,
    New(Option<String>),
    Switch(String),
    Rename(String),
    Delete,
    Refresh,
    Attach { path: PathBuf, text: String },
    Invalid(String),
}

pub(crate) fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line.to_string());
    };

    let (name, rest) = match command.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" => Input::Quit,
        "help" => Input::Help,
        "list" => Input::List,
        "new" => Input::New(Some(rest.to_string()).filter(|t| !t.is_empty())),
        "switch" if !rest.is_empty() => Input::Switch(rest.to_string()),
        "switch" => Input::Invalid("Usage: /switch <conversation-id>".to_string()),
        "rename" if !rest.is_empty() => Input::Rename(rest.to_string()),
        "rename" => Input::Invalid("Usage: /rename <title>".to_string()),
        "delete" => Input::Delete,
        "refresh" => Input::Refresh,
        "attach" => match rest.split_once(char::is_whitespace) {
            Some((path, text)) => Input::Attach {
                path: PathBuf::from(path),
                text: text.trim().to_string(),
            },
            None if !rest.is_empty() => Input::Attach {
                path: PathBuf::from(rest),
                text: String::new(),
            },
            None => Input::Invalid("Usage: /attach <path> [message]".to_string()),
        },
        other => Input::Invalid(format!("Unknown command: /{}", other)),
    }
}

/// Run the interactive chat loop until `/quit` or end of input
pub async fn run_chat(state: &AppState, conversation_id: Option<String>) -> Result<()> {
    let session = state.session.clone();
    // Failures land in the error banner, which the renderer prints
    let _ = session.list_conversations().await;

    match conversation_id {
        Some(id) => session.select_conversation(Some(id.as_str())).await,
        None => {
            session.create_conversation(None).await?;
        }
    }

    let mut view = ChatView::default();
    print_lines(view.update(&session.snapshot()));
    let renderer = tokio::spawn(render(session.subscribe(), view));

    print_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if !handle_input(&session, parse_input(&line), state.config.upload.max_file_size).await {
            break;
        }
    }

    renderer.abort();
    Ok(())
}

/// Apply one input to the session; false ends the loop
async fn handle_input(session: &ConversationSessionManager, input: Input, max_file_size: u64) -> bool {
    let current = session.snapshot().current_conversation_id;
    let outcome = match input {
        Input::Empty => Ok(()),
        Input::Quit => return false,
        Input::Help => {
            print_help();
            Ok(())
        }
        Input::Invalid(reason) => {
            println!("{}", reason.yellow());
            Ok(())
        }
        Input::List => session.list_conversations().await.map(|()| {
            let snapshot = session.snapshot();
            for conversation in &snapshot.conversations {
                let current = snapshot.current_conversation_id.as_deref() == Some(conversation.id.as_str());
                println!("{}", format_conversation(conversation, current));
            }
        }),
        Input::New(title) => session.create_conversation(title.as_deref()).await.map(|_| ()),
        Input::Switch(id) => {
            session.select_conversation(Some(id.as_str())).await;
            Ok(())
        }
        Input::Refresh => {
            session.refresh_messages().await;
            Ok(())
        }
        Input::Rename(title) => match current {
            Some(id) => session.rename_conversation(&id, &title).await,
            None => no_conversation(),
        },
        Input::Delete => match current {
            Some(id) => session.delete_conversation(&id).await.map(|()| {
                println!("{}", "Conversation deleted. Use /new or /switch to continue.".dimmed());
            }),
            None => no_conversation(),
        },
        Input::Message(text) => match current {
            Some(id) => session.send_message(&id, &text, None).await,
            None => no_conversation(),
        },
        Input::Attach { path, text } => match current {
            Some(id) => match UploadFile::from_path(&path, max_file_size).await {
                Ok(file) => {
                    session
                        .send_message_with_file(&id, &text, file, Some(progress_printer()), CancellationToken::new())
                        .await
                }
                Err(err) => {
                    session.set_error(format!("Could not read {}: {}", path.display(), err));
                    Ok(())
                }
            },
            None => no_conversation(),
        },
    };

    if let Err(err) = outcome {
        debug!("Chat command failed: {:?}", err);
    }
    true
}

fn no_conversation() -> crate::session::SessionResult<()> {
    println!("{}", "No conversation selected. Use /new or /switch.".yellow());
    Ok(())
}

/// Print what changed each time the session publishes a snapshot
async fn render(mut updates: watch::Receiver<SessionSnapshot>, mut view: ChatView) {
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        print_lines(view.update(&snapshot));
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

/// Remembers what has been printed so each snapshot only adds new lines
#[derive(Debug, Default)]
pub(crate) struct ChatView {
    conversation: Option<String>,
    shown: HashSet<String>,
    error: Option<String>,
    waiting: bool,
}

impl ChatView {
    pub(crate) fn update(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        if snapshot.current_conversation_id != self.conversation {
            self.conversation = snapshot.current_conversation_id.clone();
            self.shown.clear();
            self.waiting = false;
            if let Some(conversation) = snapshot.current_conversation() {
                lines.push(format!("--- {} ---", conversation.title).bold().to_string());
            }
        }

        for message in &snapshot.messages {
            let Some(id) = message.id.confirmed() else {
                continue;
            };
            if self.shown.insert(id.to_string()) {
                lines.push(format_message(message));
            }
        }

        let waiting = snapshot.is_loading && snapshot.messages.iter().any(Message::is_pending);
        if waiting && !self.waiting {
            lines.push("Assistant is thinking...".dimmed().to_string());
        }
        self.waiting = waiting;

        if snapshot.error != self.error {
            if let Some(error) = &snapshot.error {
                lines.push(format!("! {}", error).red().to_string());
            }
            self.error = snapshot.error.clone();
        }

        lines
    }
}

pub(crate) fn format_message(message: &Message) -> String {
    let label = format!("{}:", message.role);
    let label = match message.role {
        Role::User => label.cyan().bold(),
        Role::Assistant => label.green().bold(),
    };

    let mut out = format!("{} {}", label, message.content);
    for attachment in &message.attachments {
        out.push_str(&format!("\n    {}", format!("attachment: {}", attachment).dimmed()));
    }
    out
}

pub(crate) fn format_conversation(conversation: &Conversation, current: bool) -> String {
    let marker = if current { "*" } else { " " };
    format!(
        "{} {}  {}  {}",
        marker,
        conversation.id.dimmed(),
        conversation.title,
        conversation
            .updated_at
            .format("%Y-%m-%d %H:%M")
            .to_string()
            .dimmed()
    )
}

pub(crate) fn progress_printer() -> ProgressCallback {
    Arc::new(|percent| {
        eprint!("\rUploading... {:>3}%", percent);
        if percent >= 100 {
            eprintln!();
        }
    })
}

fn print_help() {
    println!("{}", "Type a message and press Enter. Commands:".dimmed());
    for (command, help) in [
        ("/list", "list conversations"),
        ("/new [title]", "start a new conversation"),
        ("/switch <id>", "open another conversation"),
        ("/rename <title>", "rename this conversation"),
        ("/delete", "delete this conversation"),
        ("/refresh", "reload messages"),
        ("/attach <path> [message]", "upload a file and send it"),
        ("/quit", "leave"),
    ] {
        println!("  {:<26} {}", command.cyan(), help.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageId;
    use chrono::Utc;

    fn conversation(id: &str, title: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            user_id: None,
            title: title.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn confirmed(id: &str, role: Role, content: &str) -> Message {
        Message {
            id: MessageId::Confirmed(id.to_string()),
            conversation_id: "c1".to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
            attachments: Vec::new(),
        }
    }

    fn snapshot(messages: Vec<Message>) -> SessionSnapshot {
        SessionSnapshot {
            conversations: vec![conversation("c1", "Pension relief")],
            current_conversation_id: Some("c1".to_string()),
            messages,
            is_loading: false,
            error: None,
        }
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(
            parse_input("What is PAYE?"),
            Input::Message("What is PAYE?".to_string())
        );
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/new"), Input::New(None));
        assert_eq!(
            parse_input("/new  Self assessment "),
            Input::New(Some("Self assessment".to_string()))
        );
        assert_eq!(parse_input("/switch c2"), Input::Switch("c2".to_string()));
        assert_eq!(
            parse_input("/switch"),
            Input::Invalid("Usage: /switch <conversation-id>".to_string())
        );
        assert_eq!(
            parse_input("/attach p60.pdf Is this right?"),
            Input::Attach {
                path: PathBuf::from("p60.pdf"),
                text: "Is this right?".to_string()
            }
        );
        assert_eq!(
            parse_input("/attach p60.pdf"),
            Input::Attach {
                path: PathBuf::from("p60.pdf"),
                text: String::new()
            }
        );
        assert_eq!(
            parse_input("/bogus"),
            Input::Invalid("Unknown command: /bogus".to_string())
        );
    }

    #[test]
    fn test_view_prints_each_message_once() {
        let mut view = ChatView::default();
        let first = view.update(&snapshot(vec![confirmed("m1", Role::User, "hi")]));
        assert_eq!(first.len(), 2);
        assert!(first[0].contains("Pension relief"));
        assert!(first[1].contains("hi"));

        let second = view.update(&snapshot(vec![
            confirmed("m1", Role::User, "hi"),
            confirmed("m2", Role::Assistant, "hello"),
        ]));
        assert_eq!(second.len(), 1);
        assert!(second[0].contains("hello"));
    }

    #[test]
    fn test_view_skips_placeholders_and_reports_waiting() {
        let mut view = ChatView::default();
        view.update(&snapshot(Vec::new()));

        let mut pending = snapshot(vec![Message::pending("c1", "typed", Vec::new())]);
        pending.is_loading = true;
        let lines = view.update(&pending);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("thinking"));
        assert!(view.update(&pending).is_empty());
    }

    #[test]
    fn test_view_prints_error_once() {
        let mut view = ChatView::default();
        view.update(&snapshot(Vec::new()));

        let mut failed = snapshot(Vec::new());
        failed.error = Some("Network error.".to_string());
        assert_eq!(view.update(&failed).len(), 1);
        assert!(view.update(&failed).is_empty());
    }

    #[test]
    fn test_format_message_lists_attachments() {
        let mut message = confirmed("m1", Role::User, "see file");
        message.attachments = vec!["https://cdn.example.com/p60.pdf".to_string()];
        let text = format_message(&message);
        assert!(text.contains("see file"));
        assert!(text.contains("https://cdn.example.com/p60.pdf"));
    }
}
