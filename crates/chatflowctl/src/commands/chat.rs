//! Interactive terminal transport
//!
//! Each stdin line is one inbound message from `--user` on `--platform`.
//! Lines starting with `/` are local commands, not messages.

use std::io::Write;

use anyhow::Result;
use chatflow_core::FlowResponse;
use chatflow_triggers::{InboundMessage, Route, RouteOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::ChatflowConfig;
use crate::engine::Engine;

const HELP: &str = "\
Commands:
  /flows    list active flows
  /reload   reload flow files and keyword triggers
  /reset    abandon the current conversation
  /quit     exit";

pub async fn execute(config: &ChatflowConfig, user: &str, platform: &str) -> Result<()> {
    let engine = Engine::build(config).await?;
    let conversations = engine.store.repository();

    println!(
        "chatflow: {} flows loaded. Type a message, or /help for commands.",
        engine.catalog.len()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        let message = InboundMessage::new(platform, user, text);

        if message.is_command() {
            match text {
                "/quit" | "/exit" => break,
                "/help" => println!("{}", HELP),
                "/flows" => {
                    for flow in engine.catalog.all().iter().filter(|f| f.is_active) {
                        println!("  {:<24} {}", flow.name, flow.description);
                    }
                }
                "/reload" => match engine.reload().await {
                    Ok(count) => println!("(reloaded {} flows)", count),
                    Err(e) => println!("(reload failed: {:#})", e),
                },
                "/reset" => match conversations.get_active_conversation(user, platform).await? {
                    Some(active) => {
                        conversations.mark_abandoned(&active.id).await?;
                        println!("(conversation {} abandoned)", active.id);
                    }
                    None => println!("(no active conversation)"),
                },
                other => println!("(unknown command {}; /help lists commands)", other),
            }
        } else if !text.is_empty() {
            let outcome = engine.router.handle(&message).await;
            render(&outcome);
        }

        prompt()?;
    }

    let recorded = engine.events.events().await.len();
    if recorded > 0 {
        println!("\n{} analytics events recorded this session.", recorded);
    }
    Ok(())
}

fn prompt() -> Result<()> {
    print!("you> ");
    std::io::stdout().flush()?;
    Ok(())
}

fn render(outcome: &RouteOutcome) {
    for response in &outcome.responses {
        match response {
            FlowResponse::Message { content } => println!("bot> {}", content),
            FlowResponse::Buttons { options } => {
                for option in options {
                    println!("     [{}] ({})", option.label, option.value);
                }
            }
        }
    }

    match &outcome.route {
        Route::NoMatch if outcome.responses.is_empty() => println!("(no flow matched)"),
        _ if outcome.completed => println!("(conversation completed)"),
        _ => {}
    }
}
