//! Line-based interactive chat on stdin.

use std::error::Error;
use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::context::ClientContext;
use crate::cli::say::{print_conversations, print_message};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReplCommand {
    New,
    Open(i64),
    List,
    Quit,
    Help,
    Say(String),
    Invalid(String),
}

pub(crate) fn parse_repl_line(line: &str) -> Option<ReplCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(ReplCommand::Say(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let argument = parts.next();
    Some(match (name, argument) {
        ("new", None) => ReplCommand::New,
        ("list", None) => ReplCommand::List,
        ("quit" | "exit", None) => ReplCommand::Quit,
        ("help", None) => ReplCommand::Help,
        ("open", Some(id)) => match id.parse() {
            Ok(id) => ReplCommand::Open(id),
            Err(_) => ReplCommand::Invalid(format!("Not a conversation id: {id}")),
        },
        ("open", None) => ReplCommand::Invalid("Usage: /open <id>".to_string()),
        _ => ReplCommand::Invalid(format!("Unknown command: /{name} (try /help)")),
    })
}

const HELP: &str = "\
Commands:
  /new         Start a new conversation
  /open <id>   Continue an existing conversation
  /list        List your conversations
  /quit        Leave the chat
Anything else is sent as a message.";

pub async fn run_chat(conversation: Option<i64>) -> Result<(), Box<dyn Error>> {
    let context = ClientContext::open()?;
    let user = context.require_login().await;
    let watch = context
        .session
        .spawn_expiry_watch(context.config.token_check_interval());

    let mut chat = context.chat();
    if let Some(id) = conversation {
        if chat.load_messages(id).await.is_ok() {
            for message in chat.messages() {
                print_message(message);
            }
        }
    }

    println!("Chatting as {}. Type /help for commands.", user.display_name());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        if !context.session.snapshot().is_authenticated() {
            eprintln!("❌ Your session has expired. Run `parlor login` to continue.");
            break;
        }

        let Some(command) = parse_repl_line(&line) else {
            continue;
        };
        match command {
            ReplCommand::Quit => break,
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::New => {
                chat.start_new_conversation();
                println!("Started a new conversation.");
            }
            ReplCommand::List => {
                if chat.load_conversations().await.is_ok() {
                    print_conversations(chat.conversations());
                }
            }
            ReplCommand::Open(id) => {
                if chat.load_messages(id).await.is_ok() {
                    for message in chat.messages() {
                        print_message(message);
                    }
                }
            }
            ReplCommand::Say(text) => {
                if chat.send_message(&text).await.is_ok() {
                    if let Some(reply) = chat.messages().last() {
                        print_message(reply);
                    }
                }
            }
            ReplCommand::Invalid(message) => eprintln!("{message}"),
        }

        if let Some(error) = chat.error() {
            eprintln!("❌ {error}");
            chat.clear_error();
        }
    }

    watch.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_messages() {
        assert_eq!(
            parse_repl_line("  hello there "),
            Some(ReplCommand::Say("hello there".to_string()))
        );
        assert_eq!(parse_repl_line("   "), None);
    }

    #[test]
    fn slash_commands_are_recognized() {
        assert_eq!(parse_repl_line("/new"), Some(ReplCommand::New));
        assert_eq!(parse_repl_line("/open 12"), Some(ReplCommand::Open(12)));
        assert_eq!(parse_repl_line("/list"), Some(ReplCommand::List));
        assert_eq!(parse_repl_line("/quit"), Some(ReplCommand::Quit));
        assert!(matches!(
            parse_repl_line("/open twelve"),
            Some(ReplCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_repl_line("/dance"),
            Some(ReplCommand::Invalid(_))
        ));
    }
}
