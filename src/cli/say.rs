//! One-shot "say" command

use std::error::Error;
use std::io::{self, Write};

use crate::core::orchestrator::{ChatRequest, Orchestrator, StreamEvent};

pub async fn run_say(
    orchestrator: Orchestrator,
    prompt: Vec<String>,
    auth_token: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: toolrelay say <prompt>");
        std::process::exit(1);
    }

    let session = orchestrator.store().create(None);
    let mut request = ChatRequest::new(session.id, prompt);
    request.auth_token = auth_token;

    let mut stream = orchestrator.spawn(request);
    let mut stdout = io::stdout();
    while let Some(event) = stream.events.recv().await {
        match event {
            StreamEvent::Chunk { content } => {
                print!("{}", content);
                stdout.flush()?;
            }
            StreamEvent::Done { .. } => println!(),
            StreamEvent::Error { error } => {
                eprintln!("\n\n❌ Error: {}", error);
                std::process::exit(1);
            }
            StreamEvent::UserAck { .. } | StreamEvent::Start { .. } => {}
        }
    }
    stream.handle.await??;
    Ok(())
}
