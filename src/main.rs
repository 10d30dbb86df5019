mod config;
mod context;
mod core;
mod error;
mod handlers;
mod impls;
mod request;
mod response;

use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use log::{info, warn};

use crate::config::Config;
use crate::core::models::template::SurveyTemplate;
use crate::core::ports::document_store::DocumentStore;
use crate::core::ports::local_storage::KeyValueStorage;
use crate::core::services::survey::Survey;
use crate::core::services::template::load_template;
use crate::handlers::session::Sessions;
use crate::impls::storage::file::FileStorage;
use crate::impls::stores::memory::MemoryDocumentStore;
use crate::impls::stores::postgres::PgDocumentStore;

async fn serve<S, K>(store: Arc<S>, storage: K, template: SurveyTemplate, config: Config) -> anyhow::Result<()>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let survey = Data::new(Survey::load(store, storage, template, config.submit_timeout, config.load_fail_safe).await);
    let sessions = Data::new(Sessions::default());
    info!("listening on {}", config.bind_addr);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(survey.clone())
            .app_data(sessions.clone())
            .configure(handlers::configure::<S, K>)
    })
    .bind(&config.bind_addr)?
    .run()
    .await?;
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::from_env()?;
    let template = load_template(config.template_path.as_deref()).context("failed to load the survey template")?;
    let storage = FileStorage::new(&config.local_store_dir).context("failed to open the local store")?;
    match config.database_url.clone() {
        Some(url) => {
            let store = PgDocumentStore::connect(&url).await.context("failed to connect to database")?;
            serve(Arc::new(store), storage, template, config).await
        }
        None => {
            warn!("{} not set, documents are kept in memory", config::DATABASE_URL);
            serve(Arc::new(MemoryDocumentStore::new()), storage, template, config).await
        }
    }
}
