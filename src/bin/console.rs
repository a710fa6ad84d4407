//! EngiChat terminal client.
//! Run with: cargo run --bin engichat-console

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use engichat::console::{Command, HELP, parse_command, render_screen, render_sidebar};
use engichat::core::ChatConfig;
use engichat::manager::ConversationManager;
use engichat::start_engichat;

#[tokio::main]
async fn main() -> Result<()> {
    start_engichat::init_tracing();

    let config = ChatConfig::from_env().context("invalid configuration")?;
    let manager = start_engichat::open_session(&config)
        .await
        .context("failed to open session")?;

    let mut updates = manager.subscribe();
    tokio::spawn(async move {
        let mut was_pending = false;
        while updates.changed().await.is_ok() {
            let pending = updates.borrow_and_update().pending;
            if pending && !was_pending {
                println!("Assistant is typing...");
            }
            was_pending = pending;
        }
    });

    manager.open().await;
    print_all(&manager);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Invalid(message) => println!("{message}"),
            Command::List => {
                manager.list_conversations().await;
                println!("{}", render_sidebar(&manager.snapshot()));
            }
            Command::New(category) => {
                if manager.create_conversation(category).await.is_ok() {
                    print_all(&manager);
                } else {
                    println!("{}", render_screen(&manager.snapshot()));
                }
            }
            Command::Open(n) => {
                if let Some(id) = nth_conversation(&manager, n) {
                    manager.select_conversation(id).await;
                    print_all(&manager);
                }
            }
            Command::Delete(n) => {
                if let Some(id) = nth_conversation(&manager, n) {
                    if let Err(err) = manager.delete_conversation(id).await {
                        println!("! {err}");
                    }
                    print_all(&manager);
                }
            }
            Command::Dismiss => {
                manager.dismiss_error();
                print_all(&manager);
            }
            Command::Send(content) => {
                if let Err(err) = manager.send_message(&content).await {
                    println!("! {err}");
                }
                println!("{}", render_screen(&manager.snapshot()));
            }
        }
    }

    Ok(())
}

fn nth_conversation(
    manager: &ConversationManager,
    n: usize,
) -> Option<engichat::core::ConversationId> {
    let state = manager.snapshot();
    let found = state.conversations.get(n - 1).map(|c| c.id);
    if found.is_none() {
        println!("No conversation {n}");
    }
    found
}

fn print_all(manager: &ConversationManager) {
    let state = manager.snapshot();
    println!("{}\n\n{}", render_sidebar(&state), render_screen(&state));
}
