//! Bluesky (AT Protocol) client abstraction
//!
//! The curator talks to the network through the [`BlueskyApi`] trait so the
//! crawl, the list reconciliation and the refresh cycle can run against the
//! real XRPC client or an in-memory double.

pub mod client;
pub mod types;

use crate::errors::Result;
use async_trait::async_trait;

pub use client::XrpcClient;
pub use types::{
    ActorRef, AuthorFeed, FeedItem, FollowsPage, ListItemRecord, ListItemsPage, ListRecord,
    ListView, ListsPage, PostView, ProfileView, RecordRef, Session,
};

/// Operations the curator consumes from the network
#[async_trait]
pub trait BlueskyApi: Send + Sync {
    /// Currently authenticated account, if logged in
    async fn session(&self) -> Option<Session>;

    /// One page of the accounts `actor` follows
    async fn get_follows(&self, actor: &str, limit: u32, cursor: Option<&str>) -> Result<FollowsPage>;

    /// Profile with follower / follow / post counters
    async fn get_profile(&self, actor: &str) -> Result<ProfileView>;

    /// Most recent feed items of `actor`
    async fn get_author_feed(&self, actor: &str, limit: u32) -> Result<AuthorFeed>;

    /// One page of the lists created by `actor`
    async fn get_lists(&self, actor: &str, cursor: Option<&str>) -> Result<ListsPage>;

    /// Overwrite the record at `repo/collection/rkey`
    async fn put_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
        record: serde_json::Value,
    ) -> Result<RecordRef>;

    /// Create a record with a server-assigned key
    async fn create_record(
        &self,
        repo: &str,
        collection: &str,
        record: serde_json::Value,
    ) -> Result<RecordRef>;

    /// One page of a list's members
    async fn get_list(&self, list: &str, cursor: Option<&str>) -> Result<ListItemsPage>;
}
