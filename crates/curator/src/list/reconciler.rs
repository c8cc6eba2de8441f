//! Curated list reconciliation
//!
//! Makes the remote list contain every ranked account:
//! - the list record is found by name and overwritten, or created
//! - current members are read page by page
//! - missing accounts are appended in paced batches
//!
//! Members are never removed, so running it twice with the same ranking
//! leaves the list unchanged the second time.

use chrono::Utc;
use serde::Serialize;
use starterpack_common::bluesky::types::{rkey_from_uri, LIST_COLLECTION, LIST_ITEM_COLLECTION};
use starterpack_common::bluesky::{BlueskyApi, ListItemRecord, ListRecord, ListView, Session};
use starterpack_common::config::AppConfig;
use starterpack_common::errors::{AppError, Result};
use starterpack_common::metrics;
use starterpack_common::models::ScoredAccount;
use starterpack_common::retry::RetryPolicy;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Name, description and pacing of the published list
#[derive(Debug, Clone)]
pub struct ListSettings {
    pub name: String,
    pub description: String,
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl From<&AppConfig> for ListSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            name: config.pack.list_name.clone(),
            description: config.pack.list_description.clone(),
            batch_size: config.crawl.list_batch_size,
            batch_delay: config.crawl.batch_delay(),
        }
    }
}

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub list_uri: String,
    pub list_cid: String,
    /// Whether the list record had to be created
    pub created: bool,
    /// Members present before this run
    pub existing_members: usize,
    pub added: usize,
    pub already_present: usize,
    pub failed: usize,
}

enum MemberOutcome {
    Added(String),
    Present,
}

pub struct ListReconciler {
    api: Arc<dyn BlueskyApi>,
    retry: RetryPolicy,
    settings: ListSettings,
}

impl ListReconciler {
    pub fn new(api: Arc<dyn BlueskyApi>, config: &AppConfig) -> Self {
        Self::with_settings(api, RetryPolicy::from(&config.retry), ListSettings::from(config))
    }

    pub fn with_settings(api: Arc<dyn BlueskyApi>, retry: RetryPolicy, settings: ListSettings) -> Self {
        Self { api, retry, settings }
    }

    /// Bring the remote list in line with `ranked`
    #[instrument(skip(self, ranked), fields(list = %self.settings.name, accounts = ranked.len()))]
    pub async fn reconcile(&self, ranked: &[ScoredAccount]) -> Result<ReconcileReport> {
        let session = self.api.session().await.ok_or(AppError::NotInitialized)?;

        let mut report = self.upsert_list(&session).await?;
        let mut members = self.current_members(&report.list_uri).await?;
        report.existing_members = members.len();
        info!(
            list_uri = %report.list_uri,
            existing_members = members.len(),
            "Updating list members"
        );

        let batch_size = self.settings.batch_size.max(1);
        let batch_count = ranked.len().div_ceil(batch_size);

        for (i, batch) in ranked.chunks(batch_size).enumerate() {
            for account in batch {
                match self
                    .add_member(&session, &report.list_uri, account.handle(), &members)
                    .await
                {
                    Ok(MemberOutcome::Added(did)) => {
                        debug!(handle = account.handle(), did = %did, "Added list member");
                        members.insert(did);
                        report.added += 1;
                    }
                    Ok(MemberOutcome::Present) => report.already_present += 1,
                    Err(e) => {
                        warn!(handle = account.handle(), error = %e, "Error adding list member");
                        report.failed += 1;
                    }
                }
            }

            if i + 1 < batch_count {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        metrics::record_list_sync(report.added, report.failed);
        info!(
            added = report.added,
            already_present = report.already_present,
            failed = report.failed,
            "List updated"
        );
        Ok(report)
    }

    /// Overwrite the list record with this name, or create it
    async fn upsert_list(&self, session: &Session) -> Result<ReconcileReport> {
        let existing = self.find_list(session).await?;

        let record = serde_json::to_value(ListRecord::curated(
            &self.settings.name,
            &self.settings.description,
            Utc::now().to_rfc3339(),
        ))?;

        match existing {
            Some(existing) => {
                info!(uri = %existing.uri, "Updating existing list");
                let written = self
                    .retry
                    .run("com.atproto.repo.putRecord", || {
                        self.api.put_record(
                            &session.did,
                            LIST_COLLECTION,
                            rkey_from_uri(&existing.uri),
                            record.clone(),
                        )
                    })
                    .await?;
                Ok(ReconcileReport {
                    list_uri: existing.uri,
                    list_cid: written.cid,
                    ..Default::default()
                })
            }
            None => {
                info!("Creating new list");
                let created = self
                    .retry
                    .run("com.atproto.repo.createRecord", || {
                        self.api
                            .create_record(&session.did, LIST_COLLECTION, record.clone())
                    })
                    .await?;
                Ok(ReconcileReport {
                    list_uri: created.uri,
                    list_cid: created.cid,
                    created: true,
                    ..Default::default()
                })
            }
        }
    }

    /// First list owned by the session account with the configured name
    async fn find_list(&self, session: &Session) -> Result<Option<ListView>> {
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .retry
                .run("app.bsky.graph.getLists", || {
                    self.api.get_lists(&session.did, cursor.as_deref())
                })
                .await?;

            if let Some(found) = page
                .lists
                .into_iter()
                .find(|list| list.name == self.settings.name)
            {
                return Ok(Some(found));
            }

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(None),
            }
        }
    }

    /// DIDs currently on the list
    async fn current_members(&self, list_uri: &str) -> Result<HashSet<String>> {
        let mut members = HashSet::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .retry
                .run("app.bsky.graph.getList", || {
                    self.api.get_list(list_uri, cursor.as_deref())
                })
                .await?;

            members.extend(page.items.into_iter().map(|item| item.subject.did));

            match page.cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(members)
    }

    async fn add_member(
        &self,
        session: &Session,
        list_uri: &str,
        handle: &str,
        members: &HashSet<String>,
    ) -> Result<MemberOutcome> {
        let profile = self
            .retry
            .run("app.bsky.actor.getProfile", || self.api.get_profile(handle))
            .await?;

        if members.contains(&profile.did) {
            return Ok(MemberOutcome::Present);
        }

        let item = serde_json::to_value(ListItemRecord::new(
            list_uri,
            &profile.did,
            Utc::now().to_rfc3339(),
        ))?;
        self.api
            .create_record(&session.did, LIST_ITEM_COLLECTION, item)
            .await?;

        Ok(MemberOutcome::Added(profile.did))
    }
}
