//! Non-interactive messaging commands.

use std::error::Error;

use crate::api::models::Conversation;
use crate::cli::context::ClientContext;
use crate::core::message::{ChatMessage, Sender};

pub async fn run_say(conversation: Option<i64>, prompt: Vec<String>) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("Usage: parlor say [--conversation <id>] <message>");
        std::process::exit(1);
    }

    let context = ClientContext::open()?;
    context.require_login().await;

    let mut chat = context.chat();
    if let Some(id) = conversation {
        if let Err(err) = chat.load_messages(id).await {
            eprintln!("❌ Could not open conversation {id}: {err}");
            std::process::exit(1);
        }
    }

    if let Err(err) = chat.send_message(&prompt).await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }

    if let Some(reply) = chat.messages().last() {
        println!("{}", reply.text);
    }
    if conversation.is_none() {
        if let Some(id) = chat.current_conversation_id() {
            eprintln!("(conversation {id})");
        }
    }
    Ok(())
}

pub async fn run_conversations() -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    context.require_login().await;

    let mut chat = context.chat();
    if let Err(err) = chat.load_conversations().await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    print_conversations(chat.conversations());
    Ok(())
}

pub async fn run_messages(conversation: i64) -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    context.require_login().await;

    let mut chat = context.chat();
    if let Err(err) = chat.load_messages(conversation).await {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
    for message in chat.messages() {
        print_message(message);
    }
    Ok(())
}

pub fn print_conversations(conversations: &[Conversation]) {
    if conversations.is_empty() {
        println!("No conversations yet.");
        return;
    }
    println!("Conversations:");
    for conversation in conversations {
        let title = if conversation.title.trim().is_empty() {
            "(untitled)"
        } else {
            conversation.title.as_str()
        };
        match conversation.updated_at.as_deref() {
            Some(updated) => println!("  {:>5}  {title}  [{updated}]", conversation.id),
            None => println!("  {:>5}  {title}", conversation.id),
        }
    }
}

pub fn print_message(message: &ChatMessage) {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "assistant",
    };
    match message.timestamp {
        Some(at) => println!("[{}] {who}: {}", at.format("%Y-%m-%d %H:%M"), message.text),
        None => println!("{who}: {}", message.text),
    }
}
