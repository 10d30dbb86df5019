use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use futures::StreamExt;
use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::core::models::question::Question;
use crate::core::models::response::{AnswerValue, Answers, CreatedAt, Patch, Response, ResponseId, RESPONSES, TIMESTAMP_FIELD};
use crate::core::ports::confirmation::Confirmation;
use crate::core::ports::document_store::{DocumentStore, OrderBy, Snapshot};
use crate::core::ports::local_storage::KeyValueStorage;
use crate::core::services::local_store::LocalResponseStore;
use crate::error::Error;

pub const DELETE_PROMPT: &str = "¿Seguro que deseas eliminar esta respuesta?";
pub const CLEANUP_PROMPT: &str = "¿Seguro que deseas eliminar respuestas vacías o duplicadas?";

/// How the remote half of a submission settled. The respondent sees the same result in
/// every case since the response is already stored locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "remote_id", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Succeeded(String),
    Failed,
    TimedOut,
}

/// Keeps the response list in sync between the local slot, the remote collection and memory.
pub struct ResponseSynchronizer<S, K> {
    store: Arc<S>,
    local: Mutex<LocalResponseStore<K>>,
    responses: RwLock<Vec<Response>>,
    submit_timeout: Duration,
}

/// Open subscription to the remote responses; dropping it tears the subscription down.
pub struct Listener {
    task: JoinHandle<()>,
}

impl Listener {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn next_local_id<K: KeyValueStorage>(local: &LocalResponseStore<K>, now: DateTime<Utc>) -> ResponseId {
    let mut millis = now.timestamp_millis();
    loop {
        let id = ResponseId::Local(millis.to_string());
        if !local.contains(&id) {
            return id;
        }
        millis += 1;
    }
}

/// Responses a cleanup removes, in list order: those with no answer to any current question,
/// and those whose answers repeat an earlier response's exactly. Answers are compared in the
/// current question order.
pub fn cleanup_candidates(responses: &[Response], questions: &[Question]) -> Vec<ResponseId> {
    if questions.is_empty() {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    responses
        .iter()
        .filter_map(|r| {
            let values: Vec<Option<&AnswerValue>> = questions.iter().map(|q| r.answer(&q.id)).collect();
            let is_empty = values.iter().all(|v| v.map_or(true, AnswerValue::is_empty));
            let key = values.iter().map(|v| serde_json::to_string(v).unwrap_or_default()).join("|");
            if is_empty || !seen.insert(key) {
                Some(r.id.clone())
            } else {
                None
            }
        })
        .collect()
}

impl<S, K> ResponseSynchronizer<S, K>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    /// Starts from whatever the local slot holds.
    pub fn new(store: Arc<S>, local: LocalResponseStore<K>, submit_timeout: Duration) -> Self {
        let responses = local.load_all();
        Self {
            store,
            local: Mutex::new(local),
            responses: RwLock::new(responses),
            submit_timeout,
        }
    }

    pub async fn responses(&self) -> Vec<Response> {
        self.responses.read().await.clone()
    }

    pub async fn local_responses(&self) -> Vec<Response> {
        self.local.lock().await.load_all()
    }

    /// Stores the answers locally, then gives the remote store `submit_timeout` to accept
    /// them. A remote write still in flight at the deadline keeps running; its result is dropped.
    pub async fn submit(&self, answers: Answers, device: Option<String>) -> SubmitOutcome {
        let now = Utc::now().trunc_subsecs(3);
        let response = {
            let mut local = self.local.lock().await;
            let response = Response {
                id: next_local_id(&*local, now),
                answers,
                device,
                created_at: CreatedAt::Client(now),
            };
            local.prepend(response.clone());
            response
        };
        self.responses.write().await.insert(0, response.clone());

        let store = Arc::clone(&self.store);
        let fields = response.to_remote_fields();
        let write = tokio::spawn(async move { store.create(RESPONSES, fields, TIMESTAMP_FIELD).await });
        match timeout(self.submit_timeout, write).await {
            Ok(Ok(Ok(remote_id))) => {
                info!("response {} stored remotely as {}", response.id, remote_id);
                SubmitOutcome::Succeeded(remote_id)
            }
            Ok(Ok(Err(e))) => {
                warn!("remote submission failed, response {} kept locally: {}", response.id, e);
                SubmitOutcome::Failed
            }
            Ok(Err(e)) => {
                error!("remote submission task failed: {}", e);
                SubmitOutcome::Failed
            }
            Err(_) => {
                warn!("{}, response {} kept locally", Error::RemoteTimeout, response.id);
                SubmitOutcome::TimedOut
            }
        }
    }

    /// Merges one subscription delivery: a non-empty snapshot replaces the list, an empty one
    /// keeps it, an error reloads the list from the local slot.
    pub async fn apply_snapshot(&self, snapshot: Snapshot) {
        match snapshot {
            Ok(docs) if docs.is_empty() => debug!("empty remote snapshot, keeping current responses"),
            Ok(docs) => {
                let responses: Vec<Response> = docs.into_iter().map(Response::from_document).collect();
                debug!("remote snapshot with {} responses", responses.len());
                *self.responses.write().await = responses;
            }
            Err(e) => {
                error!("responses subscription failed, using local responses: {}", e);
                self.load_local().await;
            }
        }
    }

    pub async fn load_local(&self) {
        let local = self.local.lock().await.load_all();
        *self.responses.write().await = local;
    }

    /// Subscribes to the remote responses, newest first, until the listener is dropped or the
    /// subscription fails.
    pub fn listen(self: &Arc<Self>) -> Listener {
        let sync = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut subscription = match sync.store.subscribe(RESPONSES, &OrderBy::desc(TIMESTAMP_FIELD)).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    sync.apply_snapshot(Err(e)).await;
                    return;
                }
            };
            while let Some(snapshot) = subscription.next().await {
                let failed = snapshot.is_err();
                sync.apply_snapshot(snapshot).await;
                if failed {
                    break;
                }
            }
        });
        Listener { task }
    }

    pub async fn update(&self, id: &ResponseId, patch: Patch) -> Result<(), Error> {
        match id {
            ResponseId::Local(_) => {
                if !self.local.lock().await.update(id, |r| patch.apply(r)) {
                    return Err(Error::NotFound(format!("response {}", id)));
                }
            }
            ResponseId::Remote(remote_id) => self.store.update(RESPONSES, remote_id, patch.to_fields()).await?,
        }
        if let Some(response) = self.responses.write().await.iter_mut().find(|r| &r.id == id) {
            patch.apply(response);
        }
        Ok(())
    }

    async fn remove(&self, id: &ResponseId) -> Result<(), Error> {
        match id {
            ResponseId::Local(_) => self.local.lock().await.remove(id),
            ResponseId::Remote(remote_id) => self.store.delete(RESPONSES, remote_id).await?,
        }
        self.responses.write().await.retain(|r| &r.id != id);
        Ok(())
    }

    /// Returns `false` when the operator declines.
    pub async fn delete<C>(&self, id: &ResponseId, confirmation: &C) -> Result<bool, Error>
    where
        C: Confirmation,
    {
        if !confirmation.confirm(DELETE_PROMPT) {
            return Ok(false);
        }
        self.remove(id).await?;
        Ok(true)
    }

    /// Deletes empty and duplicated responses, returning how many were deleted, or `None`
    /// when the operator declines. Individual failures are logged and skipped.
    pub async fn cleanup<C>(&self, questions: &[Question], confirmation: &C) -> Option<usize>
    where
        C: Confirmation,
    {
        if !confirmation.confirm(CLEANUP_PROMPT) {
            return None;
        }
        let candidates = cleanup_candidates(&self.responses.read().await, questions);
        let mut deleted = 0;
        for id in candidates {
            match self.remove(&id).await {
                Ok(()) => deleted += 1,
                Err(e) => error!("failed to delete response {}: {}", id, e),
            }
        }
        info!("cleanup deleted {} responses", deleted);
        Some(deleted)
    }
}
