//! Line-based interactive chat.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::core::message::Feedback;
use crate::core::orchestrator::{ChatRequest, Orchestrator, StreamEvent};
use crate::core::session::{ChatSession, SessionStore};

const HELP_TEXT: &str = "Commands:
  /new [name]        Start a new session
  /sessions          List sessions
  /switch <id|name>  Switch to another session (id prefixes work)
  /rename <name>     Rename the current session
  /clear             Forget the current session's messages
  /delete            Delete the current session and start a new one
  /like, /dislike    Rate the last answer
  /tools             List the backend's tools
  /health            Check the tool backend
  /help              Show this help
  /quit              Leave
Ctrl+C cancels an answer while it streams.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    New(Option<String>),
    Sessions,
    Switch(String),
    Rename(String),
    Clear,
    Delete,
    Rate(Feedback),
    Tools,
    Health,
    Help,
    Quit,
}

/// Parses a line starting with `/`.
pub fn parse_command(line: &str) -> Result<ReplCommand, String> {
    let line = line.trim();
    let body = line.strip_prefix('/').unwrap_or(line);
    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    let argument = (!rest.is_empty()).then(|| rest.to_string());

    match name.to_ascii_lowercase().as_str() {
        "new" => Ok(ReplCommand::New(argument)),
        "sessions" | "list" => Ok(ReplCommand::Sessions),
        "switch" => argument
            .map(ReplCommand::Switch)
            .ok_or_else(|| "Usage: /switch <id|name>".to_string()),
        "rename" => argument
            .map(ReplCommand::Rename)
            .ok_or_else(|| "Usage: /rename <name>".to_string()),
        "clear" => Ok(ReplCommand::Clear),
        "delete" => Ok(ReplCommand::Delete),
        "like" => Ok(ReplCommand::Rate(Feedback::Liked)),
        "dislike" => Ok(ReplCommand::Rate(Feedback::Disliked)),
        "tools" => Ok(ReplCommand::Tools),
        "health" => Ok(ReplCommand::Health),
        "help" | "?" => Ok(ReplCommand::Help),
        "quit" | "exit" | "q" => Ok(ReplCommand::Quit),
        other => Err(format!("Unknown command: /{other} (try /help)")),
    }
}

/// Finds a session by exact id, unique id prefix, or exact name.
pub fn find_session(store: &SessionStore, needle: &str) -> Option<ChatSession> {
    if let Some(session) = store.get(needle) {
        return Some(session);
    }
    let sessions = store.list_all();
    let by_prefix: Vec<&ChatSession> = sessions
        .iter()
        .filter(|session| session.id.starts_with(needle))
        .collect();
    if let [only] = by_prefix.as_slice() {
        return Some((*only).clone());
    }
    sessions.into_iter().find(|session| session.name == needle)
}

pub async fn run_chat(
    orchestrator: Orchestrator,
    auth_token: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let mut current = orchestrator.store().create(None).id;
    println!(
        "toolrelay v{} - type a message, /help for commands",
        env!("CARGO_PKG_VERSION")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('/') {
            match parse_command(line) {
                Ok(ReplCommand::Quit) => break,
                Ok(command) => run_command(&orchestrator, &mut current, command).await,
                Err(err) => eprintln!("{err}"),
            }
            continue;
        }

        let mut request = ChatRequest::new(current.clone(), line);
        request.auth_token = auth_token.clone();
        stream_turn(&orchestrator, request).await?;
    }

    Ok(())
}

async fn stream_turn(orchestrator: &Orchestrator, request: ChatRequest) -> io::Result<()> {
    let mut stream = orchestrator.spawn(request);
    let mut stdout = io::stdout();
    loop {
        tokio::select! {
            event = stream.events.recv() => match event {
                Some(StreamEvent::Chunk { content }) => {
                    print!("{content}");
                    stdout.flush()?;
                }
                Some(StreamEvent::Done { .. }) => println!(),
                Some(StreamEvent::Error { error }) => eprintln!("\n❌ Error: {error}"),
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                stream.cancel.cancel();
                println!("\n[cancelled]");
            }
        }
    }
    if let Err(err) = stream.handle.await {
        eprintln!("❌ Chat task failed: {err}");
    }
    Ok(())
}

async fn run_command(orchestrator: &Orchestrator, current: &mut String, command: ReplCommand) {
    let store = orchestrator.store();
    match command {
        ReplCommand::New(name) => {
            let session = store.create(name.as_deref());
            println!("Started session {} ({})", session.name, session.id);
            *current = session.id;
        }
        ReplCommand::Sessions => {
            let mut sessions = store.list_all();
            sessions.sort_by_key(|session| session.created_at);
            for session in sessions {
                let marker = if session.id == *current { "*" } else { " " };
                println!(
                    "{marker} {}  {:<24} {} messages",
                    session.id,
                    session.name,
                    session.messages.len()
                );
            }
        }
        ReplCommand::Switch(needle) => match find_session(store, &needle) {
            Some(session) => {
                println!("Switched to {} ({})", session.name, session.id);
                *current = session.id;
            }
            None => eprintln!("No session matches {needle}"),
        },
        ReplCommand::Rename(name) => {
            if store.rename(current, &name) {
                println!("Renamed to {name}");
            }
        }
        ReplCommand::Clear => {
            if store.clear_messages(current) {
                println!("Cleared");
            }
        }
        ReplCommand::Delete => {
            store.delete(current);
            let session = store.create(None);
            println!("Deleted; started session {}", session.id);
            *current = session.id;
        }
        ReplCommand::Rate(feedback) => {
            let last_answer = store.get(current).and_then(|session| {
                session
                    .messages
                    .iter()
                    .rev()
                    .find(|message| message.is_assistant())
                    .map(|message| message.id.clone())
            });
            match last_answer {
                Some(message_id) => match store.set_feedback(current, &message_id, Some(feedback)) {
                    Ok(_) => println!("Noted"),
                    Err(err) => eprintln!("{err}"),
                },
                None => eprintln!("Nothing to rate yet"),
            }
        }
        ReplCommand::Tools => super::print_tools(orchestrator.tools().as_ref()).await,
        ReplCommand::Health => {
            super::print_health(orchestrator.tools().as_ref()).await;
        }
        ReplCommand::Help => println!("{HELP_TEXT}"),
        ReplCommand::Quit => {}
    }
}
