use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::core::models::template::SurveyTemplate;
use crate::core::ports::document_store::DocumentStore;
use crate::core::ports::local_storage::KeyValueStorage;
use crate::core::services::local_store::LocalResponseStore;
use crate::core::services::question::QuestionRepository;
use crate::core::services::response::{Listener, ResponseSynchronizer};

/// Everything a running survey holds: its template, question set and responses. The
/// responses subscription lives as long as this value.
pub struct Survey<S, K> {
    template: Arc<SurveyTemplate>,
    questions: Arc<RwLock<QuestionRepository<S>>>,
    responses: Arc<ResponseSynchronizer<S, K>>,
    loading: JoinHandle<()>,
    _listener: Listener,
}

impl<S, K> Survey<S, K>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    /// Loads questions and responses. Questions still missing after `fail_safe` are taken
    /// from the template until the load finishes and replaces them; responses start from the
    /// local slot until the remote store answers.
    pub async fn load(store: Arc<S>, storage: K, template: SurveyTemplate, submit_timeout: Duration, fail_safe: Duration) -> Self {
        let template = Arc::new(template);
        let questions = Arc::new(RwLock::new(QuestionRepository::new(Arc::clone(&store), Arc::clone(&template))));
        let mut loading = {
            let questions = Arc::clone(&questions);
            let mut loader = QuestionRepository::new(Arc::clone(&store), Arc::clone(&template));
            tokio::spawn(async move {
                let loaded = loader.fetch_or_seed().await;
                info!("{} questions loaded", loaded.len());
                questions.write().await.replace(loaded);
            })
        };
        if timeout(fail_safe, &mut loading).await.is_err() {
            warn!("questions not loaded after {}ms, using the template for now", fail_safe.as_millis());
            questions.write().await.use_template_if_empty();
        }
        let responses = Arc::new(ResponseSynchronizer::new(store, LocalResponseStore::new(storage), submit_timeout));
        let listener = responses.listen();
        info!("survey \"{}\" loaded with {} questions", template.title(), questions.read().await.questions().len());
        Self {
            template,
            questions,
            responses,
            loading,
            _listener: listener,
        }
    }

    pub fn template(&self) -> &SurveyTemplate {
        &self.template
    }

    pub fn questions(&self) -> &RwLock<QuestionRepository<S>> {
        &self.questions
    }

    pub fn responses(&self) -> &ResponseSynchronizer<S, K> {
        &self.responses
    }
}

impl<S, K> Drop for Survey<S, K> {
    fn drop(&mut self) {
        self.loading.abort();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::models::question::QUESTIONS;
    use crate::core::services::template::load_template;
    use crate::impls::storage::memory::MemoryStorage;
    use crate::impls::stores::memory::MemoryDocumentStore;

    async fn load(store: Arc<MemoryDocumentStore>) -> Survey<MemoryDocumentStore, MemoryStorage> {
        Survey::load(store, MemoryStorage::new(), load_template(None).unwrap(), Duration::from_millis(3500), Duration::from_millis(3000)).await
    }

    #[tokio::test]
    async fn test_load_seeds_questions() {
        let store = Arc::new(MemoryDocumentStore::new());
        let survey = load(store.clone()).await;
        let expected = survey.template().questions().len();
        assert_eq!(survey.questions().read().await.questions().len(), expected);
        assert_eq!(store.documents(QUESTIONS).len(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_safe_uses_template() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.set_latency(Duration::from_secs(60));
        let started = tokio::time::Instant::now();
        let survey = load(store).await;
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(survey.questions().read().await.questions(), survey.template().questions().as_slice());
        assert!(survey.responses().responses().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_load_replaces_template() {
        let store = Arc::new(MemoryDocumentStore::new());
        let fields = serde_json::json!({"pregunta": "¿Desde la base?", "tipo": "text_short", "order": 0});
        store.set(QUESTIONS, "remota", fields.as_object().unwrap().clone(), false).await.unwrap();
        store.set_latency(Duration::from_millis(3200));
        let survey = load(store).await;
        assert_eq!(survey.questions().read().await.questions(), survey.template().questions().as_slice());
        tokio::time::sleep(Duration::from_secs(1)).await;
        let questions = survey.questions().read().await.questions().to_vec();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "remota");
    }
}
