use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::error::Error;

pub type Fields = Map<String, Value>;

/// A document as returned by the remote store: its store-assigned id plus its field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self { id: id.into(), fields }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_owned(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_owned(),
            direction: Direction::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchWrite {
    pub collection: String,
    pub id: String,
    pub fields: Fields,
}

pub type Snapshot = Result<Vec<Document>, Error>;

/// Live view over an ordered collection. Every item is the full, ordered content of the
/// collection at that point; an `Err` item ends the subscription.
///
/// Dropping the subscription tears it down.
pub struct Subscription {
    receiver: UnboundedReceiver<Snapshot>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(receiver: UnboundedReceiver<Snapshot>) -> Self {
        Self { receiver, task: None }
    }

    /// A subscription whose snapshots are produced by a background task; the task is aborted
    /// together with the subscription.
    pub fn with_task(receiver: UnboundedReceiver<Snapshot>, task: JoinHandle<()>) -> Self {
        Self { receiver, task: Some(task) }
    }
}

impl Stream for Subscription {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn query(&self, collection: &str, order: &OrderBy) -> Result<Vec<Document>, Error>;

    /// Applies every write or none of them.
    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> Result<(), Error>;

    async fn subscribe(&self, collection: &str, order: &OrderBy) -> Result<Subscription, Error>;

    /// Creates a document with a store-assigned id. The store stamps `timestamp_field` with its own clock.
    async fn create(&self, collection: &str, fields: Fields, timestamp_field: &str) -> Result<String, Error>;

    /// Upsert. With `merge`, fields absent from `fields` keep their stored values.
    async fn set(&self, collection: &str, id: &str, fields: Fields, merge: bool) -> Result<(), Error>;

    /// Partial update of an existing document; fails with `NotFound` when it does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), Error>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), Error>;
}
