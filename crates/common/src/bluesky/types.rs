//! Wire types for the subset of the Bluesky XRPC API the curator uses

use serde::{Deserialize, Deserializer, Serialize};

/// Collection NSID of curated list records
pub const LIST_COLLECTION: &str = "app.bsky.graph.list";

/// Collection NSID of list membership records
pub const LIST_ITEM_COLLECTION: &str = "app.bsky.graph.listitem";

/// Purpose value for curation (non-moderation) lists
pub const CURATE_LIST_PURPOSE: &str = "app.bsky.graph.defs#curatelist";

/// Authenticated session of the controlling account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub did: String,
    pub handle: String,
}

/// `com.atproto.server.createSession` / `refreshSession` output
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
    pub refresh_jwt: String,
}

/// Minimal actor view, as returned in follow lists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRef {
    #[serde(default)]
    pub did: String,
    pub handle: String,
}

/// `app.bsky.graph.getFollows` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowsPage {
    #[serde(default)]
    pub follows: Vec<ActorRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// `app.bsky.actor.getProfile` output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub did: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub followers_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub follows_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub posts_count: u64,
}

/// Post view inside an author feed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(default)]
    pub indexed_at: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub like_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub repost_count: u64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub reply_count: u64,
}

impl PostView {
    /// Likes, reposts and replies combined, saturating at `u64::MAX`
    pub fn interactions(&self) -> u64 {
        self.like_count
            .saturating_add(self.repost_count)
            .saturating_add(self.reply_count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub post: PostView,
}

/// `app.bsky.feed.getAuthorFeed` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorFeed {
    #[serde(default)]
    pub feed: Vec<FeedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListView {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    pub name: String,
}

/// `app.bsky.graph.getLists` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListsPage {
    #[serde(default)]
    pub lists: Vec<ListView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSubject {
    pub did: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemView {
    pub subject: ListSubject,
}

/// `app.bsky.graph.getList` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemsPage {
    #[serde(default)]
    pub items: Vec<ListItemView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Strong reference returned by `createRecord` and `putRecord`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    pub cid: String,
}

impl RecordRef {
    /// Record key: the last path segment of the AT URI
    pub fn rkey(&self) -> &str {
        rkey_from_uri(&self.uri)
    }
}

/// Extract the record key from an `at://did/collection/rkey` URI
pub fn rkey_from_uri(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

/// `app.bsky.graph.list` record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub name: String,
    pub description: String,
    pub purpose: String,
    pub created_at: String,
}

impl ListRecord {
    pub fn curated(name: &str, description: &str, created_at: String) -> Self {
        Self {
            record_type: LIST_COLLECTION.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            purpose: CURATE_LIST_PURPOSE.to_string(),
            created_at,
        }
    }
}

/// `app.bsky.graph.listitem` record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItemRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub list: String,
    pub subject: String,
    pub created_at: String,
}

impl ListItemRecord {
    pub fn new(list: &str, subject: &str, created_at: String) -> Self {
        Self {
            record_type: LIST_ITEM_COLLECTION.to_string(),
            list: list.to_string(),
            subject: subject.to_string(),
            created_at,
        }
    }
}

/// XRPC error body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XrpcErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Accept counters as numbers or numeric strings; anything else counts as 0.
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let count = match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    };
    Ok(count)
}
