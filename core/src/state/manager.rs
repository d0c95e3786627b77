//! Session registry and the HITL channel

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use super::controller::PauseController;
use super::types::{HitlResponse, PauseEvent, PauseMode};

/// Owns one [`PauseController`] per session and routes HITL operations to it.
///
/// Operations on unknown sessions are errors; illegal transitions are `Ok(false)`.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<SessionRegistryInner>,
}

struct SessionRegistryInner {
    sessions: RwLock<HashMap<String, PauseController>>,
    event_tx: broadcast::Sender<PauseEvent>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1000);

        Self {
            inner: Arc::new(SessionRegistryInner {
                sessions: RwLock::new(HashMap::new()),
                event_tx,
            }),
        }
    }

    /// Pause events from every session
    pub fn subscribe(&self) -> broadcast::Receiver<PauseEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Create a session, or return the existing controller for `session_id`.
    pub async fn create_session(&self, session_id: Option<String>) -> PauseController {
        let session_id = session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut sessions = self.inner.sessions.write().await;
        sessions
            .entry(session_id.clone())
            .or_insert_with(|| {
                tracing::debug!(session_id = %session_id, "session created");
                PauseController::with_event_sender(session_id.clone(), self.inner.event_tx.clone())
            })
            .clone()
    }

    pub async fn get(&self, session_id: &str) -> Result<PauseController> {
        let sessions = self.inner.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .context("Session not found")
    }

    pub async fn remove(&self, session_id: &str) -> Option<PauseController> {
        self.inner.sessions.write().await.remove(session_id)
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Sessions currently waiting on a human, with their mode
    pub async fn waiting_sessions(&self) -> Vec<(String, PauseMode)> {
        let sessions = self.inner.sessions.read().await;
        let mut waiting: Vec<(String, PauseMode)> = sessions
            .iter()
            .filter(|(_, ctl)| !ctl.is_cancelled())
            .map(|(id, ctl)| (id.clone(), ctl.mode()))
            .filter(|(_, mode)| !mode.is_running())
            .collect();
        waiting.sort_by(|a, b| a.0.cmp(&b.0));
        waiting
    }

    /// Drop cancelled sessions; returns how many were removed.
    pub async fn cleanup_cancelled(&self) -> usize {
        let mut sessions = self.inner.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, ctl| !ctl.is_cancelled());
        before - sessions.len()
    }

    pub async fn approve(&self, session_id: &str, comment: Option<String>) -> Result<bool> {
        let ctl = self.get(session_id).await?;
        Ok(ctl.submit_approval(HitlResponse::Approved { comment }))
    }

    pub async fn reject(&self, session_id: &str, comment: Option<String>) -> Result<bool> {
        let ctl = self.get(session_id).await?;
        Ok(ctl.submit_approval(HitlResponse::Rejected { comment }))
    }

    pub async fn modify(
        &self,
        session_id: &str,
        instruction: impl Into<String>,
        comment: Option<String>,
    ) -> Result<bool> {
        let ctl = self.get(session_id).await?;
        Ok(ctl.submit_approval(HitlResponse::Modified {
            instruction: instruction.into(),
            comment,
        }))
    }

    pub async fn provide_input(
        &self,
        session_id: &str,
        value: Value,
        comment: Option<String>,
    ) -> Result<bool> {
        let ctl = self.get(session_id).await?;
        Ok(ctl.submit_input(value, comment))
    }

    pub async fn pause(&self, session_id: &str, reason: impl Into<String>) -> Result<bool> {
        let ctl = self.get(session_id).await?;
        Ok(ctl.request_pause(reason))
    }

    pub async fn resume(&self, session_id: &str) -> Result<bool> {
        let ctl = self.get(session_id).await?;
        Ok(ctl.resume())
    }

    pub async fn enter_plan_edit(&self, session_id: &str) -> Result<bool> {
        let ctl = self.get(session_id).await?;
        Ok(ctl.enter_plan_edit())
    }

    pub async fn exit_plan_edit(&self, session_id: &str, save: bool) -> Result<bool> {
        let ctl = self.get(session_id).await?;
        Ok(ctl.exit_plan_edit(save))
    }

    pub async fn cancel(&self, session_id: &str) -> Result<bool> {
        let ctl = self.get(session_id).await?;
        Ok(ctl.cancel())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
