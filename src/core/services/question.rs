use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};

use crate::core::models::question::{Patch, Question, QuestionKind, ORDER_FIELD, QUESTIONS};
use crate::core::models::template::SurveyTemplate;
use crate::core::ports::document_store::{BatchWrite, DocumentStore, OrderBy};
use crate::error::Error;

pub const DRAFT_TEXT: &str = "Nueva Pregunta";
pub const DRAFT_OPTION: &str = "Opción 1";
pub const NEW_OPTION: &str = "Nueva Opción";

/// The survey's question set. The in-memory list is what respondents and the admin see;
/// edits land there first and reach the remote store only on an explicit save.
pub struct QuestionRepository<S> {
    store: Arc<S>,
    template: Arc<SurveyTemplate>,
    questions: Vec<Question>,
}

impl<S> QuestionRepository<S>
where
    S: DocumentStore,
{
    pub fn new(store: Arc<S>, template: Arc<SurveyTemplate>) -> Self {
        Self {
            store,
            template,
            questions: Vec::new(),
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Falls back to the template questions unless something is already loaded.
    pub fn use_template_if_empty(&mut self) {
        if self.questions.is_empty() {
            self.questions = self.template.questions();
        }
    }

    async fn read(&self) -> Result<Vec<Question>, Error> {
        let docs = self.store.query(QUESTIONS, &OrderBy::asc(ORDER_FIELD)).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| {
                let id = doc.id.clone();
                Question::from_document(doc).map_err(|e| warn!("skipping malformed question {}: {}", id, e)).ok()
            })
            .collect())
    }

    async fn seed(&self) -> Result<Vec<Question>, Error> {
        let writes = self
            .template
            .questions()
            .into_iter()
            .map(|q| BatchWrite {
                collection: QUESTIONS.to_owned(),
                id: q.id.clone(),
                fields: q.to_fields(),
            })
            .collect();
        self.store.commit_batch(writes).await.map_err(|e| Error::SeedFailure(e.to_string()))?;
        self.read().await.map_err(|e| Error::SeedFailure(e.to_string()))
    }

    /// Loads the questions, seeding the remote store from the template when it has none.
    /// Whatever goes wrong, the template questions are used instead.
    pub async fn fetch_or_seed(&mut self) -> Vec<Question> {
        let questions = match self.read().await {
            Ok(questions) if !questions.is_empty() => questions,
            Ok(_) => {
                info!("remote questions empty, seeding from template");
                match self.seed().await {
                    Ok(questions) => questions,
                    Err(e) => {
                        error!("{}", e);
                        self.template.questions()
                    }
                }
            }
            Err(e) => {
                error!("failed to fetch questions: {}", e);
                self.template.questions()
            }
        };
        self.questions = questions.clone();
        questions
    }

    fn next_id(&self) -> String {
        let mut millis = Utc::now().timestamp_millis();
        loop {
            let id = format!("q{}", millis);
            if self.get(&id).is_none() {
                return id;
            }
            millis += 1;
        }
    }

    /// Appends a new question to the in-memory list. [`QuestionWriter::create`] sends it.
    pub fn push_draft(&mut self) -> Question {
        let question = Question {
            id: self.next_id(),
            text: DRAFT_TEXT.into(),
            kind: QuestionKind::SingleChoice,
            options: vec![DRAFT_OPTION.into()],
            order: self.questions.len() as i64,
            placeholder: None,
            description: None,
        };
        self.questions.push(question.clone());
        question
    }

    /// Edits the in-memory question only.
    pub fn update_local(&mut self, id: &str, patch: Patch) -> Result<&Question, Error> {
        let question = self.questions.iter_mut().find(|q| q.id == id).ok_or_else(|| Error::NotFound(format!("question {}", id)))?;
        patch.apply(question);
        Ok(question)
    }

    /// The current in-memory state of a question, as it would be saved.
    pub fn snapshot(&self, id: &str) -> Result<Question, Error> {
        self.get(id).cloned().ok_or_else(|| Error::PersistFailure(format!("question {} is not in the local state", id)))
    }

    /// Drops a question from the in-memory list. Returns whether it was there.
    pub fn remove_local(&mut self, id: &str) -> bool {
        let before = self.questions.len();
        self.questions.retain(|q| q.id != id);
        self.questions.len() != before
    }

    /// Replaces the whole list, as when a late load arrives.
    pub fn replace(&mut self, questions: Vec<Question>) {
        self.questions = questions;
    }

    pub fn writer(&self) -> QuestionWriter<S> {
        QuestionWriter {
            store: Arc::clone(&self.store),
        }
    }

    fn options(&self, id: &str) -> Result<Vec<String>, Error> {
        self.get(id).map(|q| q.options.clone()).ok_or_else(|| Error::NotFound(format!("question {}", id)))
    }

    pub fn add_option(&mut self, id: &str) -> Result<&Question, Error> {
        let mut options = self.options(id)?;
        options.push(NEW_OPTION.into());
        self.update_local(id, Patch::options(options))
    }

    pub fn remove_option(&mut self, id: &str, idx: usize) -> Result<&Question, Error> {
        let options = self.options(id)?.into_iter().enumerate().filter(|(i, _)| *i != idx).map(|(_, o)| o).collect();
        self.update_local(id, Patch::options(options))
    }

    pub fn rename_option(&mut self, id: &str, idx: usize, text: &str) -> Result<&Question, Error> {
        let mut options = self.options(id)?;
        let option = options.get_mut(idx).ok_or_else(|| Error::BusinessError(format!("question {} has no option {}", id, idx)))?;
        *option = text.to_owned();
        self.update_local(id, Patch::options(options))
    }
}

/// Remote writes for questions, usable once the repository lock is released.
pub struct QuestionWriter<S> {
    store: Arc<S>,
}

impl<S> QuestionWriter<S>
where
    S: DocumentStore,
{
    /// A failed write is only logged; the question stays in the list.
    pub async fn create(&self, question: &Question) {
        if let Err(e) = self.store.set(QUESTIONS, &question.id, question.persisted_fields(), false).await {
            error!("failed to create question {}: {}", question.id, e);
        }
    }

    /// Merges the question into its remote document.
    pub async fn persist(&self, question: &Question) -> Result<(), Error> {
        self.store
            .set(QUESTIONS, &question.id, question.persisted_fields(), true)
            .await
            .map_err(|e| Error::PersistFailure(e.to_string()))
    }

    pub async fn remove(&self, id: &str) {
        if let Err(e) = self.store.delete(QUESTIONS, id).await {
            error!("failed to delete question {}: {}", id, e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::services::template::load_template;
    use crate::impls::stores::memory::{Call, MemoryDocumentStore};
    use serde_json::json;

    fn repository() -> (Arc<MemoryDocumentStore>, QuestionRepository<MemoryDocumentStore>) {
        let store = Arc::new(MemoryDocumentStore::new());
        let template = Arc::new(load_template(None).unwrap());
        (store.clone(), QuestionRepository::new(store, template))
    }

    #[tokio::test]
    async fn test_seed_when_empty() {
        let (store, mut repo) = repository();
        let expected = load_template(None).unwrap().questions();
        let questions = repo.fetch_or_seed().await;
        assert_eq!(questions, expected);
        assert_eq!(store.documents(QUESTIONS).len(), expected.len());
        assert_eq!(
            store.calls(),
            vec![Call::Query(QUESTIONS.into()), Call::Batch(expected.len()), Call::Query(QUESTIONS.into())]
        );
    }

    #[tokio::test]
    async fn test_no_seed_when_present() {
        let (store, mut repo) = repository();
        let fields = json!({"pregunta": "¿Solo una?", "tipo": "text_short", "order": 0});
        store.set(QUESTIONS, "solo", fields.as_object().unwrap().clone(), false).await.unwrap();
        store.clear_calls();
        let questions = repo.fetch_or_seed().await;
        assert_eq!(questions.len(), 1);
        assert_eq!(store.calls(), vec![Call::Query(QUESTIONS.into())]);
    }

    #[tokio::test]
    async fn test_seed_failure_falls_back_to_template() {
        let (store, mut repo) = repository();
        store.set_read_only(true);
        let questions = repo.fetch_or_seed().await;
        assert_eq!(questions, load_template(None).unwrap().questions());
        assert!(store.documents(QUESTIONS).is_empty());
        assert_eq!(repo.questions().len(), questions.len());
    }

    #[tokio::test]
    async fn test_create_draft_is_optimistic() {
        let (store, mut repo) = repository();
        repo.fetch_or_seed().await;
        let count = repo.questions().len();
        store.set_offline(true);
        let draft = repo.push_draft();
        repo.writer().create(&draft).await;
        assert_eq!(draft.order, count as i64);
        assert_eq!(draft.options, vec![DRAFT_OPTION]);
        assert!(draft.id.starts_with('q'));
        assert_eq!(repo.questions().len(), count + 1);
        assert!(repo.get(&draft.id).is_some());
    }

    #[tokio::test]
    async fn test_update_local_never_writes() {
        let (store, mut repo) = repository();
        repo.fetch_or_seed().await;
        store.clear_calls();
        let id = repo.questions()[0].id.clone();
        repo.update_local(
            &id,
            Patch {
                text: Some("¿Edad?".into()),
                ..Default::default()
            },
        )
        .unwrap();
        repo.add_option(&id).unwrap();
        repo.rename_option(&id, 0, "Menos de 18").unwrap();
        repo.remove_option(&id, 1).unwrap();
        assert!(store.calls().is_empty());
        let q = repo.get(&id).unwrap();
        assert_eq!(q.text, "¿Edad?");
        assert_eq!(q.options.first().map(String::as_str), Some("Menos de 18"));
        assert_eq!(q.options.last().map(String::as_str), Some(NEW_OPTION));
        assert!(repo.rename_option(&id, 99, "x").is_err());
        assert!(matches!(repo.update_local("missing", Patch::default()), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_persist_merges() {
        let (store, mut repo) = repository();
        repo.fetch_or_seed().await;
        let q = repo.questions().iter().find(|q| q.placeholder.is_some()).cloned().unwrap();
        repo.update_local(
            &q.id,
            Patch {
                text: Some("¿Qué mejorarías?".into()),
                ..Default::default()
            },
        )
        .unwrap();
        repo.writer().persist(&repo.snapshot(&q.id).unwrap()).await.unwrap();
        let doc = store.documents(QUESTIONS).into_iter().find(|d| d.id == q.id).unwrap();
        assert_eq!(doc.fields["pregunta"], json!("¿Qué mejorarías?"));
        assert_eq!(doc.fields["placeholder"], json!(q.placeholder.unwrap()));
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_local_state() {
        let (store, mut repo) = repository();
        repo.fetch_or_seed().await;
        let id = repo.questions()[0].id.clone();
        repo.update_local(
            &id,
            Patch {
                text: Some("editada".into()),
                ..Default::default()
            },
        )
        .unwrap();
        store.set_offline(true);
        let edited = repo.snapshot(&id).unwrap();
        assert!(matches!(repo.writer().persist(&edited).await, Err(Error::PersistFailure(_))));
        assert!(matches!(repo.snapshot("missing"), Err(Error::PersistFailure(_))));
        assert_eq!(repo.get(&id).unwrap().text, "editada");
    }

    #[tokio::test]
    async fn test_remove_is_optimistic() {
        let (store, mut repo) = repository();
        repo.fetch_or_seed().await;
        let id = repo.questions()[0].id.clone();
        store.set_offline(true);
        assert!(repo.remove_local(&id));
        repo.writer().remove(&id).await;
        assert!(repo.get(&id).is_none());
        assert!(!repo.remove_local(&id));
        assert_eq!(store.documents(QUESTIONS).len(), repo.questions().len() + 1);
    }
}
