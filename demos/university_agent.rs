//! Interactive campus assistant
//!
//! Reads questions from stdin and answers them with the SGR agent, streaming model
//! output and tool activity as it happens. Clarifying questions are answered on the
//! next line. Type `reset` to start over, `exit` to quit.
//!
//! Configuration comes from the environment (or `.env`): OPENAI_API_KEY,
//! OPENAI_API_ENDPOINT, AGENT_MODEL and friends.
//!
//! Run with: cargo run --example university_agent

use anyhow::Context;
use campus_agent::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const USER_ID: &str = "console";

const CAMPUS_NOTES: &[&str] = &[
    "The main library is in building 52, open 9:00-21:00 on weekdays and 10:00-18:00 on Saturday.",
    "The canteen on the ground floor of building 52 serves lunch from 11:30 to 15:00.",
    "Room numbers follow the pattern building-room: 52-18 is room 18 in building 52.",
    "Student ID cards are issued by the dean's office, room 52-233, within three working days.",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let settings = AgentSettings::from_env().context("loading settings")?;

    let knowledge = Arc::new(InMemoryKnowledgeBase::new(settings.broker()?));
    for note in CAMPUS_NOTES {
        knowledge
            .add_document(*note, HashMap::new())
            .await
            .context("embedding campus notes")?;
    }

    let services = ToolServices::default()
        .with_knowledge(knowledge)
        .with_schedule(Arc::new(settings.schedule_service()?));
    let service = settings.service(AgentVariant::university(), services)?;

    println!("Campus Assistant ({})", settings.model);
    println!("{}\n", "=".repeat(40));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        match message {
            "" => continue,
            "exit" | "quit" => break,
            "reset" => {
                service.reset(USER_ID).await;
                println!("Session cleared.\n");
                continue;
            }
            _ => {}
        }

        let (sink, mut events) = ChannelSink::new();
        let printer = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    AgentStreamEvent::Content { text } => print!("{}", text),
                    AgentStreamEvent::ToolCall { name, .. } => println!("\n[{}]", name),
                    AgentStreamEvent::ToolResult { .. } => {}
                    AgentStreamEvent::Finished => break,
                }
            }
        });

        let result = service
            .process_message_streaming(USER_ID, message, Arc::new(sink))
            .await;
        printer.await?;

        match result {
            Ok(AgentOutcome::ClarificationNeeded { questions }) => {
                println!("\nI need a few details first:\n{}\n", questions);
            }
            Ok(outcome) => println!("\n{}\n", outcome.text()),
            Err(e) => eprintln!("\nError: {}\n", e),
        }
    }

    Ok(())
}

fn print_prompt() {
    use std::io::Write;
    print!("> ");
    let _ = std::io::stdout().flush();
}
