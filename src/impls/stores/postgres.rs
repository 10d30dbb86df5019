use async_trait::async_trait;
use log::{error, info};
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{query, query_as, PgPool};
use tokio::sync::mpsc::unbounded_channel;
use uuid::Uuid;

use crate::core::ports::document_store::{BatchWrite, Direction, Document, DocumentStore, Fields, OrderBy, Subscription};
use crate::error::Error;

const CHANNEL: &str = "documents_changed";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    seq BIGSERIAL,
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    fields JSONB NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (collection, id)
)";

const UPSERT_REPLACE: &str = "
INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3)
ON CONFLICT (collection, id) DO UPDATE SET fields = EXCLUDED.fields";

const UPSERT_MERGE: &str = "
INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3)
ON CONFLICT (collection, id) DO UPDATE SET fields = documents.fields || EXCLUDED.fields";

/// Documents stored as JSONB rows in PostgreSQL. Writes announce the touched collection on a
/// notification channel, which drives subscriptions.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
        let store = Self::new(pool);
        store.init().await?;
        Ok(store)
    }

    pub async fn init(&self) -> Result<(), Error> {
        query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn notify(&self, collection: &str) -> Result<(), Error> {
        query("SELECT pg_notify($1, $2)").bind(CHANNEL).bind(collection).execute(&self.pool).await?;
        Ok(())
    }
}

async fn fetch(pool: &PgPool, collection: &str, order: &OrderBy) -> Result<Vec<Document>, Error> {
    let direction = match order.direction {
        Direction::Asc => "ASC",
        Direction::Desc => "DESC",
    };
    let rows: Vec<(String, Json<Fields>)> = query_as(&format!(
        "SELECT id, fields FROM documents WHERE collection = $1 ORDER BY fields -> $2 {}, seq ASC",
        direction
    ))
    .bind(collection)
    .bind(&order.field)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id, Json(fields))| Document::new(id, fields)).collect())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn query(&self, collection: &str, order: &OrderBy) -> Result<Vec<Document>, Error> {
        fetch(&self.pool, collection, order).await
    }

    async fn commit_batch(&self, writes: Vec<BatchWrite>) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;
        let mut touched: Vec<String> = Vec::new();
        for w in writes {
            query(UPSERT_REPLACE).bind(&w.collection).bind(&w.id).bind(Json(&w.fields)).execute(&mut tx).await?;
            if !touched.contains(&w.collection) {
                touched.push(w.collection);
            }
        }
        for collection in &touched {
            query("SELECT pg_notify($1, $2)").bind(CHANNEL).bind(collection).execute(&mut tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn subscribe(&self, collection: &str, order: &OrderBy) -> Result<Subscription, Error> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(CHANNEL).await?;
        let (sender, receiver) = unbounded_channel();
        sender.send(fetch(&self.pool, collection, order).await).ok();
        let pool = self.pool.clone();
        let collection = collection.to_owned();
        let order = order.clone();
        let task = tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) if notification.payload() == collection => {
                        if sender.send(fetch(&pool, &collection, &order).await).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("listener for {} failed: {}", collection, e);
                        sender.send(Err(e.into())).ok();
                        break;
                    }
                }
            }
            info!("subscription to {} closed", collection);
        });
        Ok(Subscription::with_task(receiver, task))
    }

    async fn create(&self, collection: &str, fields: Fields, timestamp_field: &str) -> Result<String, Error> {
        let id = Uuid::new_v4().simple().to_string();
        query(
            r#"INSERT INTO documents (collection, id, fields)
            VALUES ($1, $2, $3 || jsonb_build_object($4::text, to_char(now() AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.MS"Z"')))"#,
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(&fields))
        .bind(timestamp_field)
        .execute(&self.pool)
        .await?;
        self.notify(collection).await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields, merge: bool) -> Result<(), Error> {
        let stmt = if merge { UPSERT_MERGE } else { UPSERT_REPLACE };
        query(stmt).bind(collection).bind(id).bind(Json(&fields)).execute(&self.pool).await?;
        self.notify(collection).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<(), Error> {
        let res = query("UPDATE documents SET fields = fields || $3 WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .bind(Json(&fields))
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("{}/{}", collection, id)));
        }
        self.notify(collection).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), Error> {
        query("DELETE FROM documents WHERE collection = $1 AND id = $2").bind(collection).bind(id).execute(&self.pool).await?;
        self.notify(collection).await
    }
}
