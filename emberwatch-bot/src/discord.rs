//! Discord message publishing.
//!
//! A status display is one embed (plus an optional chart attachment) that
//! gets edited in place. [`MessageStore`] is the seam the reconciler works
//! through; [`DiscordMessages`] is the real implementation over serenity's
//! HTTP client. No gateway connection is held; everything here is plain
//! REST calls.

use std::sync::Arc;

use serenity::all::{
    ChannelId, CreateAttachment, CreateEmbed, CreateEmbedFooter, CreateMessage, EditAttachments,
    EditMessage, GetMessages, Http, MessageId, Timestamp, UserId,
};
use thiserror::Error;

/// Attachment filename the embed's image URL points at.
pub const CHART_FILENAME: &str = "player-count-chart.png";

const ONLINE_EMBED_COLOR: u32 = 0x57f287;
const OFFLINE_EMBED_COLOR: u32 = 0xed4245;

/// Default Bedrock port, appended when the configured address has none.
const BEDROCK_DEFAULT_PORT: u16 = 19132;

/// Everything needed to render one status message.
#[derive(Debug, Clone)]
pub struct StatusPost {
    pub server_name: String,
    pub online: bool,
    pub player_count: u32,
    pub players: Vec<String>,
    pub java_address: Option<String>,
    pub bedrock_address: Option<String>,
    pub server_version: String,
    /// PNG bytes; absent when the sample window was empty.
    pub chart: Option<Vec<u8>>,
}

/// A candidate message found while scanning a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentMessage {
    pub id: u64,
    pub created_at: i64,
}

#[derive(Debug, Error)]
pub enum PublishError {
    /// The message id we hold no longer points at a message.
    #[error("message not found")]
    NotFound,
    #[error("channel unreachable: {0}")]
    ChannelUnreachable(String),
}

/// Channel operations the reconciler needs. Tests substitute a fake.
#[serenity::async_trait]
pub trait MessageStore: Send + Sync {
    /// Confirm a bound message still exists.
    async fn fetch(&self, channel_id: u64, message_id: u64) -> Result<(), PublishError>;

    /// The newest bot-authored messages in a channel, newest first.
    async fn list_recent(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> Result<Vec<RecentMessage>, PublishError>;

    async fn edit(
        &self,
        channel_id: u64,
        message_id: u64,
        post: &StatusPost,
    ) -> Result<(), PublishError>;

    /// Post a fresh message, returning its id for binding.
    async fn send(&self, channel_id: u64, post: &StatusPost) -> Result<u64, PublishError>;
}

/// [`MessageStore`] backed by the Discord REST API.
pub struct DiscordMessages {
    http: Arc<Http>,
    bot_user_id: UserId,
}

impl DiscordMessages {
    pub fn new(http: Arc<Http>, bot_user_id: UserId) -> Self {
        Self { http, bot_user_id }
    }
}

#[serenity::async_trait]
impl MessageStore for DiscordMessages {
    async fn fetch(&self, channel_id: u64, message_id: u64) -> Result<(), PublishError> {
        ChannelId::new(channel_id)
            .message(&self.http, MessageId::new(message_id))
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn list_recent(
        &self,
        channel_id: u64,
        limit: u8,
    ) -> Result<Vec<RecentMessage>, PublishError> {
        let messages = ChannelId::new(channel_id)
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(classify)?;

        // Discord returns newest first; keep that order.
        Ok(messages
            .into_iter()
            .filter(|message| message.author.id == self.bot_user_id)
            .map(|message| RecentMessage {
                id: message.id.get(),
                created_at: message.timestamp.unix_timestamp(),
            })
            .collect())
    }

    async fn edit(
        &self,
        channel_id: u64,
        message_id: u64,
        post: &StatusPost,
    ) -> Result<(), PublishError> {
        let mut builder = EditMessage::new().embed(build_embed(post));
        // Replace the attachment set wholesale so a chartless cycle clears
        // the stale image instead of orphaning it.
        builder = match &post.chart {
            Some(chart) => builder.attachments(
                EditAttachments::new().add(CreateAttachment::bytes(chart.clone(), CHART_FILENAME)),
            ),
            None => builder.attachments(EditAttachments::new()),
        };

        ChannelId::new(channel_id)
            .edit_message(&self.http, MessageId::new(message_id), builder)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn send(&self, channel_id: u64, post: &StatusPost) -> Result<u64, PublishError> {
        let mut builder = CreateMessage::new().embed(build_embed(post));
        if let Some(chart) = &post.chart {
            builder = builder.add_file(CreateAttachment::bytes(chart.clone(), CHART_FILENAME));
        }

        let message = ChannelId::new(channel_id)
            .send_message(&self.http, builder)
            .await
            .map_err(classify)?;

        Ok(message.id.get())
    }
}

fn classify(err: serenity::Error) -> PublishError {
    if let serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(ref response)) = err
    {
        if response.status_code == serenity::http::StatusCode::NOT_FOUND {
            return PublishError::NotFound;
        }
    }
    PublishError::ChannelUnreachable(err.to_string())
}

/// Build the status embed.
pub fn build_embed(post: &StatusPost) -> CreateEmbed {
    let (state, color) = if post.online {
        ("online", ONLINE_EMBED_COLOR)
    } else {
        ("offline", OFFLINE_EMBED_COLOR)
    };

    let mut embed = CreateEmbed::new()
        .title(format!("{} Status", post.server_name))
        .description(format!("Server is currently **{}**", state))
        .color(color);

    if let Some(java) = &post.java_address {
        embed = embed.field("Java IP", format!("`{}`", java), true);
    }
    if let Some(bedrock) = &post.bedrock_address {
        embed = embed.field("Bedrock IP", format!("`{}`", bedrock_display(bedrock)), true);
    }
    if !post.server_version.is_empty() {
        embed = embed.field("Version", format!("`{}`", post.server_version), true);
    }

    embed = embed.field(
        player_field_name(post.player_count),
        player_field_value(post),
        false,
    );

    if post.chart.is_some() {
        embed = embed.image(format!("attachment://{}", CHART_FILENAME));
    }

    embed
        .footer(CreateEmbedFooter::new("Last updated"))
        .timestamp(Timestamp::now())
}

fn player_field_name(count: u32) -> String {
    if count == 1 {
        "1 player online".to_string()
    } else {
        format!("{} players online", count)
    }
}

fn player_field_value(post: &StatusPost) -> String {
    if post.players.is_empty() {
        if post.player_count == 0 {
            "*No players online*".to_string()
        } else {
            // Count came through but the name list didn't
            "*Player list unavailable*".to_string()
        }
    } else {
        let mut names = post.players.clone();
        names.sort_by_key(|name| name.to_lowercase());
        format!("```\n{}\n```", names.join("\n"))
    }
}

/// Append the default Bedrock port when the address has none.
fn bedrock_display(address: &str) -> String {
    if address.contains(':') {
        address.to_string()
    } else {
        format!("{}:{}", address, BEDROCK_DEFAULT_PORT)
    }
}
