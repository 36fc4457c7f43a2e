use chrono::{DateTime, Utc};
use mathagent_client::{ChatClient, ConversationSummary, Message, MessageEntry, Role, User};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "tutor",
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIME_FORMAT).to_string()
}

pub fn user_line(user: &User) -> String {
    format!("{} <{}> via {}", user.name, user.email, user.provider)
}

pub fn summary_line(item: &ConversationSummary) -> String {
    let plural = if item.message_count == 1 { "" } else { "s" };
    format!(
        "{:>6}  {}  {} ({} message{plural})",
        item.id,
        timestamp(&item.updated_at),
        item.title,
        item.message_count
    )
}

pub fn message_block(client: &ChatClient, message: &Message) -> String {
    let mut block = format!("{}> {}", label(message.role), message.content);
    if let Some(url) = client.graph_url(message) {
        block.push_str(&format!("\n  [graph] {url}"));
    }
    block
}

pub fn entry_block(client: &ChatClient, entry: &MessageEntry) -> String {
    match entry {
        MessageEntry::Pending(pending) => format!("you> {} (sending...)", pending.content),
        MessageEntry::Confirmed(message) => message_block(client, message),
    }
}
