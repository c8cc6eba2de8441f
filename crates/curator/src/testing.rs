//! In-memory Bluesky double for unit tests

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use starterpack_common::bluesky::types::{
    ListItemView, ListSubject, LIST_COLLECTION, LIST_ITEM_COLLECTION,
};
use starterpack_common::bluesky::{
    ActorRef, AuthorFeed, BlueskyApi, FeedItem, FollowsPage, ListItemsPage, ListView, ListsPage,
    PostView, ProfileView, RecordRef, Session,
};
use starterpack_common::config::AppConfig;
use starterpack_common::errors::{AppError, Result};
use starterpack_common::models::AccountMetrics;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

const LIST_PAGE_SIZE: usize = 2;

#[derive(Default)]
struct State {
    calls: HashMap<String, usize>,
    failures: HashMap<String, usize>,
    lists: Vec<ListView>,
    members: HashMap<String, Vec<String>>,
    next_rkey: usize,
}

/// Scriptable [`BlueskyApi`] keeping lists and members in memory
pub struct FakeBluesky {
    session: Option<Session>,
    follows: HashMap<String, Vec<String>>,
    profiles: HashMap<String, ProfileView>,
    feeds: HashMap<String, Vec<FeedItem>>,
    broken_profiles: HashSet<String>,
    gate: Option<Arc<Notify>>,
    state: Mutex<State>,
}

impl FakeBluesky {
    pub fn new() -> Self {
        Self {
            session: Some(Session {
                did: "did:plc:curator".into(),
                handle: "curator.test".into(),
            }),
            follows: HashMap::new(),
            profiles: HashMap::new(),
            feeds: HashMap::new(),
            broken_profiles: HashSet::new(),
            gate: None,
            state: Mutex::new(State::default()),
        }
    }

    pub fn logged_out(mut self) -> Self {
        self.session = None;
        self
    }

    pub fn with_follows<I, S>(mut self, seed: &str, handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.follows.insert(
            seed.to_string(),
            handles.into_iter().map(|h| h.as_ref().to_string()).collect(),
        );
        self
    }

    /// Account whose sampled feed yields `posting_rate` posts per day (whole numbers)
    pub fn with_account(mut self, handle: &str, followers: u64, posting_rate: f64) -> Self {
        let now = Utc::now();
        let posts = (posting_rate.round() as i64).max(1);
        let feed = (0..posts)
            .map(|i| feed_item(&(now - ChronoDuration::minutes(i)).to_rfc3339(), 0, 0, 0))
            .collect();

        self.profiles.insert(handle.to_string(), profile(handle, followers));
        self.feeds.insert(handle.to_string(), feed);
        self
    }

    pub fn with_failing_profile(mut self, handle: &str) -> Self {
        self.broken_profiles.insert(handle.to_string());
        self
    }

    /// The first `count` calls of `method` fail
    pub fn with_transient_failures(self, method: &str, count: usize) -> Self {
        self.fail_next(method, count);
        self
    }

    /// Lists already owned by the controlling account, in creation order
    pub fn with_lists(self, names: &[&str]) -> Self {
        {
            let mut state = self.state();
            for name in names {
                state.next_rkey += 1;
                let rkey = state.next_rkey;
                state.lists.push(ListView {
                    uri: format!("at://did:plc:curator/{}/3k{}", LIST_COLLECTION, rkey),
                    cid: Some(format!("cid{}", rkey)),
                    name: name.to_string(),
                });
            }
        }
        self
    }

    /// `getFollows` waits for the gate before answering
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn fail_next(&self, method: &str, count: usize) {
        self.state().failures.insert(method.to_string(), count);
    }

    pub fn calls(&self, method: &str) -> usize {
        self.state().calls.get(method).copied().unwrap_or(0)
    }

    pub fn list_names(&self) -> Vec<String> {
        self.state().lists.iter().map(|l| l.name.clone()).collect()
    }

    pub fn member_count(&self, list_uri: &str) -> usize {
        self.state().members.get(list_uri).map_or(0, Vec::len)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Count the call and fail it if failures are still scripted
    fn enter(&self, method: &str) -> Result<()> {
        let mut state = self.state();
        *state.calls.entry(method.to_string()).or_default() += 1;
        match state.failures.get_mut(method) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(AppError::Upstream {
                    method: method.to_string(),
                    status: 502,
                    error: "UpstreamFailure".into(),
                    message: None,
                })
            }
            _ => Ok(()),
        }
    }

    fn did(&self) -> Result<String> {
        self.session
            .as_ref()
            .map(|s| s.did.clone())
            .ok_or(AppError::NotInitialized)
    }
}

fn page<T: Clone>(items: &[T], limit: usize, cursor: Option<&str>) -> (Vec<T>, Option<String>) {
    let start = cursor.and_then(|c| c.parse().ok()).unwrap_or(0).min(items.len());
    let end = (start + limit.max(1)).min(items.len());
    let next = (end < items.len()).then(|| end.to_string());
    (items[start..end].to_vec(), next)
}

#[async_trait]
impl BlueskyApi for FakeBluesky {
    async fn session(&self) -> Option<Session> {
        self.session.clone()
    }

    async fn get_follows(&self, actor: &str, limit: u32, cursor: Option<&str>) -> Result<FollowsPage> {
        self.enter("getFollows")?;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let handles = self.follows.get(actor).cloned().unwrap_or_default();
        let (slice, cursor) = page(&handles, limit as usize, cursor);
        Ok(FollowsPage {
            follows: slice
                .into_iter()
                .map(|handle| ActorRef {
                    did: format!("did:plc:{}", handle),
                    handle,
                })
                .collect(),
            cursor,
        })
    }

    async fn get_profile(&self, actor: &str) -> Result<ProfileView> {
        self.enter("getProfile")?;
        if self.broken_profiles.contains(actor) {
            return Err(AppError::Upstream {
                method: "app.bsky.actor.getProfile".into(),
                status: 400,
                error: "InvalidRequest".into(),
                message: Some("Profile not found".into()),
            });
        }
        self.profiles.get(actor).cloned().ok_or_else(|| AppError::Upstream {
            method: "app.bsky.actor.getProfile".into(),
            status: 400,
            error: "InvalidRequest".into(),
            message: Some("Profile not found".into()),
        })
    }

    async fn get_author_feed(&self, actor: &str, limit: u32) -> Result<AuthorFeed> {
        self.enter("getAuthorFeed")?;
        let mut feed = self.feeds.get(actor).cloned().unwrap_or_default();
        feed.truncate(limit as usize);
        Ok(AuthorFeed { feed, cursor: None })
    }

    async fn get_lists(&self, _actor: &str, cursor: Option<&str>) -> Result<ListsPage> {
        self.enter("getLists")?;
        let lists = self.state().lists.clone();
        let (lists, cursor) = page(&lists, LIST_PAGE_SIZE, cursor);
        Ok(ListsPage { lists, cursor })
    }

    async fn put_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
        record: serde_json::Value,
    ) -> Result<RecordRef> {
        self.enter("putRecord")?;
        let uri = format!("at://{}/{}/{}", repo, collection, rkey);
        let mut state = self.state();
        state.next_rkey += 1;
        let cid = format!("cid{}", state.next_rkey);
        if let Some(list) = state.lists.iter_mut().find(|l| l.uri == uri) {
            if let Some(name) = record["name"].as_str() {
                list.name = name.to_string();
            }
            list.cid = Some(cid.clone());
        }
        Ok(RecordRef { uri, cid })
    }

    async fn create_record(
        &self,
        repo: &str,
        collection: &str,
        record: serde_json::Value,
    ) -> Result<RecordRef> {
        self.enter("createRecord")?;
        if repo != self.did()? {
            return Err(AppError::Unauthorized {
                message: "repo does not match session".into(),
            });
        }

        let mut state = self.state();
        state.next_rkey += 1;
        let rkey = format!("3k{}", state.next_rkey);
        let uri = format!("at://{}/{}/{}", repo, collection, rkey);
        let cid = format!("cid{}", state.next_rkey);

        match collection {
            LIST_COLLECTION => {
                let name = record["name"].as_str().unwrap_or_default().to_string();
                state.lists.push(ListView {
                    uri: uri.clone(),
                    cid: Some(cid.clone()),
                    name,
                });
            }
            LIST_ITEM_COLLECTION => {
                let list = record["list"].as_str().unwrap_or_default().to_string();
                let subject = record["subject"].as_str().unwrap_or_default().to_string();
                state.members.entry(list).or_default().push(subject);
            }
            _ => {}
        }

        Ok(RecordRef { uri, cid })
    }

    async fn get_list(&self, list: &str, cursor: Option<&str>) -> Result<ListItemsPage> {
        self.enter("getList")?;
        let members = self.state().members.get(list).cloned().unwrap_or_default();
        let (slice, cursor) = page(&members, LIST_PAGE_SIZE, cursor);
        Ok(ListItemsPage {
            items: slice
                .into_iter()
                .map(|did| ListItemView {
                    subject: ListSubject { did },
                })
                .collect(),
            cursor,
        })
    }
}

/// Configuration with default pacing and no retry delay
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.retry.base_delay_ms = 0;
    config
}

pub fn profile(handle: &str, followers: u64) -> ProfileView {
    ProfileView {
        did: format!("did:plc:{}", handle),
        handle: handle.to_string(),
        display_name: Some(handle.trim_end_matches(".dev").to_string()),
        description: Some(format!("Posts from {}", handle)),
        followers_count: followers,
        follows_count: 10,
        posts_count: 100,
    }
}

pub fn feed_item(indexed_at: &str, likes: u64, reposts: u64, replies: u64) -> FeedItem {
    FeedItem {
        post: PostView {
            indexed_at: indexed_at.to_string(),
            like_count: likes,
            repost_count: reposts,
            reply_count: replies,
        },
    }
}

pub fn metrics(handle: &str, followers: u64, posting_rate: f64, engagement: f64) -> AccountMetrics {
    AccountMetrics {
        handle: handle.to_string(),
        display_name: handle.to_string(),
        description: String::new(),
        follower_count: followers,
        following_count: 0,
        post_count: 0,
        posting_rate,
        average_engagement: engagement,
        last_active: Utc::now(),
    }
}
