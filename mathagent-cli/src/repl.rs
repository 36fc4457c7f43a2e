use anyhow::Context;
use mathagent_client::{
    conversation, ChatClient, ConversationError, ConversationIndex, ConversationView,
    DeletePolicy, GraphImage,
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::output;

const HELP: &str = "\
commands:
  /new            start a new conversation
  /list           list conversations
  /open ID        switch to a conversation
  /delete ID      delete a conversation
  /graph [FILE]   plot the last problem of this conversation
  /quit           leave";

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    New,
    List,
    Open(i64),
    Delete(i64),
    Graph(Option<&'a str>),
    Help,
    Quit,
    Invalid(String),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::Message(line);
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    let id = || arg.and_then(|value| value.parse::<i64>().ok());

    match name {
        "new" => Input::New,
        "list" => Input::List,
        "open" => id().map_or_else(|| Input::Invalid("usage: /open ID".into()), Input::Open),
        "delete" => id().map_or_else(|| Input::Invalid("usage: /delete ID".into()), Input::Delete),
        "graph" => Input::Graph(arg),
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Invalid(format!("unknown command /{other}, try /help")),
    }
}

fn print_view(client: &ChatClient, view: &ConversationView) {
    if let Some(title) = view.title() {
        println!("# {title}");
    }
    for entry in view.entries() {
        println!("{}", output::entry_block(client, entry));
    }
}

/// Returns `false` when the session ended and the loop should stop.
fn report(err: &ConversationError) -> bool {
    match err {
        ConversationError::Client(inner) if inner.is_unauthorized() => {
            eprintln!("Session expired. Run `mathagent login` to sign in again.");
            false
        }
        ConversationError::Client(inner) => {
            eprintln!("error: {}", inner.user_message());
            true
        }
        other => {
            eprintln!("{other}");
            true
        }
    }
}

pub async fn run(client: &ChatClient, conversation_id: Option<i64>) -> anyhow::Result<()> {
    let user = client.current_user().await.context("fetching user")?;
    println!("Hello {}. Ask a math question, or /help.", user.name);

    let mut view = ConversationView::new();
    let mut index = ConversationIndex::new();
    if let Err(err) = index.refresh(client).await {
        tracing::warn!(error = %err, "failed to load conversations");
    }
    if let Some(id) = conversation_id {
        view.open(client, id)
            .await
            .with_context(|| format!("opening conversation {id}"))?;
        print_view(client, &view);
    }

    let mut editor = DefaultEditor::new().context("starting line editor")?;
    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err).context("reading input"),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        let keep_going = match parse_input(&line) {
            Input::Message("") => true,
            Input::Message(text) => {
                let started_new = view.conversation_id().is_none();
                match view.send(client, text).await {
                    Ok(response) => {
                        println!("{}", output::message_block(client, &response.message));
                        if response.should_offer_graph {
                            println!("(type /graph to plot this)");
                        }
                        if started_new {
                            if let Err(err) = index.refresh(client).await {
                                tracing::warn!(error = %err, "failed to refresh conversations");
                            }
                        }
                        true
                    }
                    Err(err) => report(&err),
                }
            }
            Input::New => {
                view.reset();
                println!("Started a new conversation.");
                true
            }
            Input::List => match index.refresh(client).await {
                Ok(()) => {
                    for item in index.items() {
                        let marker = if view.conversation_id() == Some(item.id) { "*" } else { " " };
                        println!("{marker}{}", output::summary_line(item));
                    }
                    true
                }
                Err(err) => report(&err),
            },
            Input::Open(id) => match view.open(client, id).await {
                Ok(()) => {
                    print_view(client, &view);
                    true
                }
                Err(err) => report(&err),
            },
            Input::Delete(id) => {
                match conversation::delete_conversation(
                    client,
                    &mut index,
                    &mut view,
                    id,
                    DeletePolicy::Strict,
                )
                .await
                {
                    Ok(()) => {
                        println!("Deleted conversation {id}.");
                        true
                    }
                    Err(err) => report(&err),
                }
            }
            Input::Graph(path) => match view.conversation_id() {
                None => {
                    println!("Send a problem first.");
                    true
                }
                Some(id) => match client.generate_graph(id).await {
                    Ok(response) => {
                        let out = path
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("graph_{id}.png"));
                        match GraphImage::from_base64(&response.graph_base64)
                            .and_then(|image| image.save(&out))
                        {
                            Ok(()) => println!("Saved graph to {out}"),
                            Err(err) => eprintln!("error: {err}"),
                        }
                        true
                    }
                    Err(err) => report(&ConversationError::Client(err)),
                },
            },
            Input::Help => {
                println!("{HELP}");
                true
            }
            Input::Quit => false,
            Input::Invalid(message) => {
                println!("{message}");
                true
            }
        };

        if !keep_going {
            break;
        }
    }

    Ok(())
}
