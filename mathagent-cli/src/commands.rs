use std::path::PathBuf;

use anyhow::Context;
use mathagent_client::{ChatClient, GraphImage};
use url::Url;

use crate::output;

pub async fn login(client: &ChatClient, callback: Option<&str>) -> anyhow::Result<()> {
    let Some(callback) = callback else {
        println!("Open this URL in your browser to sign in:");
        println!("  {}", client.google_auth_url());
        println!();
        println!("Then run `mathagent login --callback '<redirect URL>'` with the URL you land on.");
        return Ok(());
    };

    let url = Url::parse(callback.trim()).context("parsing callback URL")?;
    client
        .session()
        .complete_login(&url)
        .context("completing sign-in")?;
    let user = client.current_user().await.context("fetching signed-in user")?;
    println!("Signed in as {}", output::user_line(&user));
    Ok(())
}

pub fn logout(client: &ChatClient) -> anyhow::Result<()> {
    client.session().set_token(None).context("clearing session")?;
    println!("Signed out.");
    Ok(())
}

pub async fn whoami(client: &ChatClient) -> anyhow::Result<()> {
    let user = client.current_user().await.context("fetching user")?;
    println!("{}", output::user_line(&user));
    Ok(())
}

pub async fn send(
    client: &ChatClient,
    text: &str,
    conversation: Option<i64>,
) -> anyhow::Result<()> {
    let response = client
        .send_message(text, conversation)
        .await
        .context("sending message")?;
    println!("{}", output::message_block(client, &response.message));
    println!("(conversation {})", response.conversation_id);
    if response.should_offer_graph {
        println!(
            "A graph may help here: run `mathagent graph {}`.",
            response.conversation_id
        );
    }
    Ok(())
}

pub async fn history(client: &ChatClient) -> anyhow::Result<()> {
    let conversations = client
        .list_conversations()
        .await
        .context("listing conversations")?;
    if conversations.is_empty() {
        println!("No conversations yet.");
        return Ok(());
    }
    for item in &conversations {
        println!("{}", output::summary_line(item));
    }
    Ok(())
}

pub async fn show(client: &ChatClient, id: i64) -> anyhow::Result<()> {
    let conversation = client
        .get_conversation(id)
        .await
        .with_context(|| format!("loading conversation {id}"))?;
    println!("# {}", conversation.title);
    for message in &conversation.messages {
        println!();
        println!("{}", output::message_block(client, message));
    }
    Ok(())
}

pub async fn delete(client: &ChatClient, id: i64, ignore_missing: bool) -> anyhow::Result<()> {
    match client.delete_conversation(id).await {
        Ok(()) => println!("Deleted conversation {id}."),
        Err(err) if ignore_missing && err.is_not_found() => {
            println!("Conversation {id} was already deleted.");
        }
        Err(err) => return Err(err).with_context(|| format!("deleting conversation {id}")),
    }
    Ok(())
}

pub async fn graph(client: &ChatClient, id: i64, out: Option<PathBuf>) -> anyhow::Result<()> {
    let response = client
        .generate_graph(id)
        .await
        .with_context(|| format!("generating graph for conversation {id}"))?;
    let image = GraphImage::from_base64(&response.graph_base64).context("decoding graph")?;
    let out = out.unwrap_or_else(|| PathBuf::from(format!("graph_{id}.png")));
    image.save(&out)?;
    println!("Saved graph to {}", out.display());
    Ok(())
}
