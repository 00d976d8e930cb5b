//! Line-based chat over stdin.

use anyhow::{bail, Context, Result};
use futures::stream::{BoxStream, StreamExt};
use querygate::catalog::StaticCatalog;
use querygate::error::GateError;
use querygate::gate::RequestId;
use querygate::session::{DataSourceChange, SessionHandle, TurnEvent};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const HELP: &str = "\
Type a question, or one of:
  /confirm [id]   run the statement awaiting confirmation
  /cancel         discard it
  /reset          start the conversation over
  /source <id>    switch data source
  /history        show the conversation
  /quit           leave
Ctrl-C aborts a running request.";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Question(String),
    Confirm(Option<RequestId>),
    Cancel,
    Reset,
    Source(String),
    History,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Parses one input line.
pub fn parse_line(line: &str) -> ChatInput {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return ChatInput::Question(line.to_string());
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match (name.to_lowercase().as_str(), arg) {
        ("confirm" | "yes", "") => ChatInput::Confirm(None),
        ("confirm" | "yes", id) => match RequestId::parse(id) {
            Some(id) => ChatInput::Confirm(Some(id)),
            None => ChatInput::Invalid(format!("Not a request id: {id}")),
        },
        ("cancel" | "no", _) => ChatInput::Cancel,
        ("reset" | "clear", _) => ChatInput::Reset,
        ("source", "") => ChatInput::Invalid("Usage: /source <id>".to_string()),
        ("source", id) => ChatInput::Source(id.to_string()),
        ("history", _) => ChatInput::History,
        ("help" | "?", _) => ChatInput::Help,
        ("quit" | "exit" | "q", _) => ChatInput::Quit,
        _ => ChatInput::Invalid(format!("Unknown command: /{name}. Type /help.")),
    }
}

/// Runs the REPL until /quit or end of input.
pub async fn run(handle: SessionHandle, catalog: &StaticCatalog) -> Result<()> {
    let snapshot = handle.snapshot().await?;
    for message in &snapshot.history {
        if let Some(TurnEvent::Reply { text }) = TurnEvent::from_message(message) {
            println!("{text}");
        }
    }
    if let Some(source) = &snapshot.data_source_id {
        println!("(data source: {source}; type /help for commands)");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt().await?;
        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        match parse_line(&line) {
            ChatInput::Empty => {}
            ChatInput::Quit => break,
            ChatInput::Help => println!("{HELP}"),
            ChatInput::Invalid(message) => println!("{message}"),
            ChatInput::Question(question) => match handle.submit(question).await {
                Ok(events) => print_turn(&handle, events).await?,
                Err(e) => println!("{}", render_error(&e)),
            },
            ChatInput::Confirm(id) => match handle.confirm(id).await {
                Ok(events) => print_turn(&handle, events).await?,
                Err(e) => println!("{}", render_error(&e)),
            },
            ChatInput::Cancel => match handle.cancel(None).await {
                Ok(()) => println!("Query cancelled."),
                Err(e) => println!("{}", render_error(&e)),
            },
            ChatInput::Reset => {
                handle.reset_conversation().await?;
                print_greeting(&handle).await?;
            }
            ChatInput::Source(id) => {
                if !catalog.contains(&id) {
                    let known: Vec<_> = catalog.ids().collect();
                    println!("Unknown data source '{id}'. Known: {}", known.join(", "));
                    continue;
                }
                match handle.switch_data_source(id.as_str()).await? {
                    DataSourceChange::Unchanged => println!("Already using '{id}'."),
                    DataSourceChange::Initial => println!("Using '{id}'."),
                    DataSourceChange::Switched { cancelled } => {
                        if cancelled.is_some() {
                            println!("The statement awaiting confirmation was cancelled.");
                        }
                        println!("Switched to '{id}'.");
                        print_greeting(&handle).await?;
                    }
                }
            }
            ChatInput::History => {
                for message in handle.snapshot().await?.history {
                    println!("{}", message.summary());
                }
            }
        }
    }

    handle.close().await?;
    Ok(())
}

async fn prompt() -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    Ok(())
}

async fn print_greeting(handle: &SessionHandle) -> Result<()> {
    let snapshot = handle.snapshot().await?;
    match snapshot.history.first().and_then(TurnEvent::from_message) {
        Some(TurnEvent::Reply { text }) => println!("{text}"),
        _ => bail!("Session has no greeting"),
    }
    Ok(())
}

/// Prints a turn's events as they arrive. Ctrl-C aborts the turn.
async fn print_turn(handle: &SessionHandle, mut events: BoxStream<'static, TurnEvent>) -> Result<()> {
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => {
                    println!("{}", render_event(&event));
                    if event.is_terminal() {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => handle.abort().await?,
        }
    }
    Ok(())
}

/// Renders a rejected request for the terminal.
pub fn render_error(error: &GateError) -> String {
    format!("{}: {error}", error.category())
}

/// Renders an event for the terminal.
pub fn render_event(event: &TurnEvent) -> String {
    match event {
        TurnEvent::StepAnnouncement { step } => format!("... {step}"),
        TurnEvent::SqlGenerated { text, was_modified } => {
            let note = if *was_modified {
                " (identifiers quoted)"
            } else {
                ""
            };
            format!("SQL{note}:\n  {text}")
        }
        TurnEvent::ConfirmationRequested {
            request_id,
            statement,
            operation_kind,
            risk_tier,
        } => format!(
            "This is a {operation_kind} statement ({risk_tier} risk) and needs confirmation:\n  \
             {statement}\nType /confirm to run it or /cancel to discard it. [request {request_id}]"
        ),
        TurnEvent::Result { result } => result.format_table(),
        TurnEvent::Reply { text } => text.clone(),
        TurnEvent::Error { kind, message } => format!("Error ({kind}): {message}"),
        TurnEvent::Cancelled { reason } => format!("Cancelled: {reason}"),
    }
}
