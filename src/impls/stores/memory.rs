use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use uuid::Uuid;

use crate::core::models::response::format_timestamp;
use crate::core::ports::document_store::{BatchWrite, Direction, Document, DocumentStore, Fields, OrderBy, Snapshot, Subscription};
use crate::error::Error;

/// Every operation issued against a [`MemoryDocumentStore`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Query(String),
    Batch(usize),
    Subscribe(String),
    Create(String),
    Set(String, String),
    Update(String, String),
    Delete(String, String),
}

impl Call {
    pub fn is_write(&self) -> bool {
        !matches!(self, Call::Query(_) | Call::Subscribe(_))
    }
}

struct Subscriber {
    collection: String,
    order: OrderBy,
    sender: UnboundedSender<Snapshot>,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<Document>>,
    subscribers: Vec<Subscriber>,
    calls: Vec<Call>,
    offline: bool,
    read_only: bool,
    latency: Duration,
}

impl Inner {
    fn snapshot(&self, collection: &str, order: &OrderBy) -> Vec<Document> {
        let mut docs = self.collections.get(collection).cloned().unwrap_or_default();
        docs.sort_by(|a, b| {
            let ord = compare_values(a.fields.get(&order.field), b.fields.get(&order.field));
            match order.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
        docs
    }

    fn notify(&mut self, collection: &str) {
        let mut subscribers = std::mem::take(&mut self.subscribers);
        subscribers.retain(|s| s.collection != collection || s.sender.send(Ok(self.snapshot(&s.collection, &s.order))).is_ok());
        self.subscribers = subscribers;
    }

    fn upsert(&mut self, collection: &str, id: &str, fields: Fields, merge: bool) {
        let docs = self.collections.entry(collection.to_owned()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(doc) if merge => doc.fields.extend(fields),
            Some(doc) => doc.fields = fields,
            None => docs.push(Document::new(id, fields)),
        }
    }
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// In-process document store. Collections keep insertion order, which breaks ties when
/// ordering. It can be switched offline and given a latency, and it records every call.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Reads keep working, every write fails.
    pub fn set_read_only(&self, read_only: bool) {
        self.lock().read_only = read_only;
    }

    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current content of a collection in store order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.lock().collections.get(collection).cloned().unwrap_or_default()
    }

    /// Delivers an error to every open subscription, ending them.
    pub fn fail_subscriptions(&self, message: &str) {
        let mut inner = self.lock();
        for s in inner.subscribers.drain(..) {
            s.sender.send(Err(Error::RemoteUnavailable(message.to_owned()))).ok();
        }
    }

    async fn enter(&self, call: Call) -> Result<(), Error> {
        let is_write = call.is_write();
        let latency = {
            let mut inner = self.lock();
            inner.calls.push(call);
            inner.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let inner = self.lock();
        if inner.offline || (is_write && inner.read_only) {
            return Err(Error::RemoteUnavailable("document store rejected the operation".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query(&self, collection: &str, order: &OrderBy) -> Result<Vec<Document>, Error> {
        self.enter(Call::Query(collection.to_owned())).await?;
        Ok(self.lock().snapshot(collection, order))
    }

    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> Result<(), Error> {
        self.enter(Call::Batch(writes.len())).await?;
        let mut inner = self.lock();
        let mut touched: Vec<String> = Vec::new();
        for w in writes {
            inner.upsert(&w.collection, &w.id, w.fields, false);
            if !touched.contains(&w.collection) {
                touched.push(w.collection);
            }
        }
        for collection in touched {
            inner.notify(&collection);
        }
        Ok(())
    }

    async fn subscribe(&self, collection: &str, order: &OrderBy) -> Result<Subscription, Error> {
        let (sender, receiver) = unbounded_channel();
        if let Err(e) = self.enter(Call::Subscribe(collection.to_owned())).await {
            sender.send(Err(e)).ok();
            return Ok(Subscription::new(receiver));
        }
        let mut inner = self.lock();
        sender.send(Ok(inner.snapshot(collection, order))).ok();
        inner.subscribers.push(Subscriber {
            collection: collection.to_owned(),
            order: order.clone(),
            sender,
        });
        Ok(Subscription::new(receiver))
    }

    async fn create(&self, collection: &str, mut fields: Fields, timestamp_field: &str) -> Result<String, Error> {
        self.enter(Call::Create(collection.to_owned())).await?;
        let id = Uuid::new_v4().simple().to_string();
        fields.insert(timestamp_field.to_owned(), Value::String(format_timestamp(&Utc::now())));
        let mut inner = self.lock();
        inner.upsert(collection, &id, fields, false);
        inner.notify(collection);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields, merge: bool) -> Result<(), Error> {
        self.enter(Call::Set(collection.to_owned(), id.to_owned())).await?;
        let mut inner = self.lock();
        inner.upsert(collection, id, fields, merge);
        inner.notify(collection);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), Error> {
        self.enter(Call::Update(collection.to_owned(), id.to_owned())).await?;
        let mut inner = self.lock();
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| Error::NotFound(format!("{}/{}", collection, id)))?;
        doc.fields.extend(fields);
        inner.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), Error> {
        self.enter(Call::Delete(collection.to_owned(), id.to_owned())).await?;
        let mut inner = self.lock();
        if let Some(docs) = inner.collections.get_mut(collection) {
            docs.retain(|d| d.id != id);
        }
        inner.notify(collection);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_ordering_keeps_store_order_on_ties() {
        let store = MemoryDocumentStore::new();
        store.set("preguntas", "b", fields(json!({"order": 1})), false).await.unwrap();
        store.set("preguntas", "a", fields(json!({"order": 0})), false).await.unwrap();
        store.set("preguntas", "c", fields(json!({"order": 1})), false).await.unwrap();
        let ids: Vec<String> = store.query("preguntas", &OrderBy::asc("order")).await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_merge_set_preserves_fields() {
        let store = MemoryDocumentStore::new();
        store.set("preguntas", "1", fields(json!({"pregunta": "a", "placeholder": "p"})), false).await.unwrap();
        store.set("preguntas", "1", fields(json!({"pregunta": "b"})), true).await.unwrap();
        let doc = &store.documents("preguntas")[0];
        assert_eq!(doc.fields["pregunta"], json!("b"));
        assert_eq!(doc.fields["placeholder"], json!("p"));
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryDocumentStore::new();
        let res = store.update("respuestas", "nope", Fields::new()).await;
        assert!(matches!(res, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_subscription_receives_changes() {
        let store = MemoryDocumentStore::new();
        let mut sub = store.subscribe("respuestas", &OrderBy::desc("timestamp")).await.unwrap();
        assert!(sub.next().await.unwrap().unwrap().is_empty());
        let id = store.create("respuestas", fields(json!({"1": "Rock"})), "timestamp").await.unwrap();
        let snapshot = sub.next().await.unwrap().unwrap();
        assert_eq!(snapshot[0].id, id);
        assert!(snapshot[0].fields.contains_key("timestamp"));
        store.fail_subscriptions("gone");
        assert!(sub.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_offline() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);
        let res = store.query("preguntas", &OrderBy::asc("order")).await;
        assert!(matches!(res, Err(Error::RemoteUnavailable(_))));
        assert_eq!(store.calls(), vec![Call::Query("preguntas".into())]);
    }
}
