//! XRPC client over HTTPS
//!
//! Holds the session of the controlling account. Calls that fail with
//! `ExpiredToken` refresh the session once and are replayed. Concurrent
//! expirations share a single refresh.

use super::types::{
    AuthorFeed, FollowsPage, ListItemsPage, ListsPage, ProfileView, RecordRef, Session,
    SessionTokens, XrpcErrorBody,
};
use super::BlueskyApi;
use crate::config::BlueskyConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Bluesky XRPC client
pub struct XrpcClient {
    http: reqwest::Client,
    service_url: String,
    identifier: String,
    password: String,
    session: RwLock<Option<SessionTokens>>,
    refresh_lock: Mutex<()>,
}

impl XrpcClient {
    /// Create a client for the configured service; no network I/O happens here
    pub fn new(config: &BlueskyConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("starterpack-curator/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            service_url: config.service_url.trim_end_matches('/').to_string(),
            identifier: config.identifier.clone(),
            password: config.password.clone(),
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Log in with the configured identifier and app password
    pub async fn login(&self) -> Result<Session> {
        if self.identifier.is_empty() || self.password.is_empty() {
            return Err(AppError::Configuration {
                message: "bluesky.identifier and bluesky.password must be set".to_string(),
            });
        }

        let nsid = "com.atproto.server.createSession";
        let response = self
            .http
            .post(self.url(nsid))
            .json(&json!({
                "identifier": self.identifier,
                "password": self.password,
            }))
            .send()
            .await?;

        let tokens: SessionTokens = decode(nsid, response).await?;
        let session = Session {
            did: tokens.did.clone(),
            handle: tokens.handle.clone(),
        };

        info!(did = %session.did, handle = %session.handle, "Logged in to Bluesky");
        *self.session.write().await = Some(tokens);
        Ok(session)
    }

    /// Exchange the refresh token for a new session, falling back to a full login.
    ///
    /// `stale_access` is the token that was rejected; if the session no longer
    /// holds it, another caller already refreshed and nothing is sent.
    async fn refresh_session(&self, stale_access: &str) -> Result<()> {
        let _refreshing = self.refresh_lock.lock().await;

        let current = self
            .session
            .read()
            .await
            .as_ref()
            .map(|tokens| (tokens.access_jwt.clone(), tokens.refresh_jwt.clone()));
        let refresh_jwt = match current {
            Some((access, _)) if access != stale_access => {
                debug!("Session already refreshed");
                return Ok(());
            }
            Some((_, refresh)) => refresh,
            None => return self.login().await.map(|_| ()),
        };

        let nsid = "com.atproto.server.refreshSession";
        let refreshed = async {
            let response = self
                .http
                .post(self.url(nsid))
                .bearer_auth(&refresh_jwt)
                .send()
                .await?;
            decode::<SessionTokens>(nsid, response).await
        }
        .await;

        match refreshed {
            Ok(tokens) => {
                debug!(did = %tokens.did, "Session refreshed");
                *self.session.write().await = Some(tokens);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed, logging in again");
                self.login().await.map(|_| ())
            }
        }
    }

    fn url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service_url, nsid)
    }

    async fn access_token(&self) -> Result<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|tokens| tokens.access_jwt.clone())
            .ok_or_else(|| AppError::Unauthorized {
                message: "no active Bluesky session".to_string(),
            })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        nsid: &str,
        params: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let token = self.access_token().await?;
        match self.call_once(method.clone(), nsid, &token, params, body).await {
            Err(e) if e.is_expired_token() => {
                debug!(nsid = nsid, "Access token expired, refreshing session");
                self.refresh_session(&token).await?;
                let token = self.access_token().await?;
                self.call_once(method, nsid, &token, params, body).await
            }
            result => result,
        }
    }

    async fn call_once<T: DeserializeOwned>(
        &self,
        method: Method,
        nsid: &str,
        token: &str,
        params: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let mut request = self.http.request(method, self.url(nsid)).bearer_auth(token);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        decode(nsid, response).await
    }

    async fn query<T: DeserializeOwned>(&self, nsid: &str, params: &[(&str, String)]) -> Result<T> {
        self.call(Method::GET, nsid, params, None).await
    }

    async fn procedure<T: DeserializeOwned>(&self, nsid: &str, body: serde_json::Value) -> Result<T> {
        self.call(Method::POST, nsid, &[], Some(&body)).await
    }
}

/// Turn an XRPC response into `T` or an [`AppError::Upstream`]
async fn decode<T: DeserializeOwned>(nsid: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body: XrpcErrorBody = response.json().await.unwrap_or_default();
        return Err(AppError::Upstream {
            method: nsid.to_string(),
            status: status.as_u16(),
            error: body
                .error
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string()),
            message: body.message,
        });
    }

    Ok(response.json::<T>().await?)
}

fn paging(limit: u32, cursor: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", limit.to_string())];
    if let Some(cursor) = cursor {
        params.push(("cursor", cursor.to_string()));
    }
    params
}

#[async_trait]
impl BlueskyApi for XrpcClient {
    async fn session(&self) -> Option<Session> {
        self.session.read().await.as_ref().map(|tokens| Session {
            did: tokens.did.clone(),
            handle: tokens.handle.clone(),
        })
    }

    async fn get_follows(&self, actor: &str, limit: u32, cursor: Option<&str>) -> Result<FollowsPage> {
        let mut params = vec![("actor", actor.to_string())];
        params.extend(paging(limit, cursor));
        self.query("app.bsky.graph.getFollows", &params).await
    }

    async fn get_profile(&self, actor: &str) -> Result<ProfileView> {
        self.query("app.bsky.actor.getProfile", &[("actor", actor.to_string())])
            .await
    }

    async fn get_author_feed(&self, actor: &str, limit: u32) -> Result<AuthorFeed> {
        let mut params = vec![("actor", actor.to_string())];
        params.extend(paging(limit, None));
        self.query("app.bsky.feed.getAuthorFeed", &params).await
    }

    async fn get_lists(&self, actor: &str, cursor: Option<&str>) -> Result<ListsPage> {
        let mut params = vec![("actor", actor.to_string())];
        params.extend(paging(100, cursor));
        self.query("app.bsky.graph.getLists", &params).await
    }

    async fn put_record(
        &self,
        repo: &str,
        collection: &str,
        rkey: &str,
        record: serde_json::Value,
    ) -> Result<RecordRef> {
        self.procedure(
            "com.atproto.repo.putRecord",
            json!({
                "repo": repo,
                "collection": collection,
                "rkey": rkey,
                "record": record,
            }),
        )
        .await
    }

    async fn create_record(
        &self,
        repo: &str,
        collection: &str,
        record: serde_json::Value,
    ) -> Result<RecordRef> {
        self.procedure(
            "com.atproto.repo.createRecord",
            json!({
                "repo": repo,
                "collection": collection,
                "record": record,
            }),
        )
        .await
    }

    async fn get_list(&self, list: &str, cursor: Option<&str>) -> Result<ListItemsPage> {
        let mut params = vec![("list", list.to_string())];
        params.extend(paging(100, cursor));
        self.query("app.bsky.graph.getList", &params).await
    }
}
