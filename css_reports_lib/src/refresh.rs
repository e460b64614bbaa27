//! Periodic session keep-alive for persisted organisation tokens.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::pipeline::ReportPipeline;
use crate::token_store::TokenStore;

/// Outcome counts of one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub rotated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Revisits every stored organisation so the portal keeps its session
/// alive, picking up any rotated auth cookie.
pub struct TokenRefresher {
    pipeline: Arc<ReportPipeline>,
    store: Arc<TokenStore>,
    interval: Duration,
}

impl TokenRefresher {
    pub fn new(pipeline: Arc<ReportPipeline>, store: Arc<TokenStore>, interval: Duration) -> Self {
        Self {
            pipeline,
            store,
            interval,
        }
    }

    /// Runs one pass over the store.
    pub async fn refresh_once(&self) -> RefreshSummary {
        let portal = self.pipeline.portal();
        let mut summary = RefreshSummary::default();

        for org in self.store.org_ids() {
            let Some(pair) = self.store.get(&org) else {
                continue;
            };
            let url = match portal.sales_reports_url(&org) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(org = %org, "Skipping token refresh: {}", e);
                    summary.failed += 1;
                    continue;
                }
            };

            match portal.build_context(&url, &pair.effective).await {
                Ok(context) => match context.issued_auth {
                    Some(fresh) if fresh != pair.effective => {
                        if self.store.rotate(&org, &pair.effective, &fresh) {
                            tracing::info!(org = %org, "Session token rotated");
                            summary.rotated += 1;
                        } else {
                            summary.unchanged += 1;
                        }
                    }
                    _ => summary.unchanged += 1,
                },
                Err(guild_portal::Error::Authentication { .. }) => {
                    if self.store.expire(&org, &pair.effective) {
                        tracing::warn!(org = %org, "Stored session expired, removing");
                        summary.removed += 1;
                    } else {
                        summary.unchanged += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(org = %org, "Token refresh failed: {}", e);
                    summary.failed += 1;
                }
            }
        }

        tracing::debug!(
            rotated = summary.rotated,
            unchanged = summary.unchanged,
            removed = summary.removed,
            failed = summary.failed,
            "Token refresh pass complete"
        );
        summary
    }

    /// Starts refreshing in the background every `interval`. The first
    /// pass happens one interval after the call.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.refresh_once().await;
            }
        })
    }
}
