use std::collections::HashMap;
use std::sync::Arc;

use actix_web::web::{Data, Json, Path};
use log::debug;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::context::Device;
use crate::core::models::question::Question;
use crate::core::ports::document_store::DocumentStore;
use crate::core::ports::local_storage::KeyValueStorage;
use crate::core::services::flow::{Step, SurveyFlow};
use crate::core::services::survey::Survey;
use crate::error::Error;
use crate::request::Selection;

/// Respondent flows in progress, one per session id.
#[derive(Default)]
pub struct Sessions {
    flows: RwLock<HashMap<Uuid, Arc<Mutex<SurveyFlow>>>>,
}

impl Sessions {
    async fn open(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.flows.write().await.insert(id, Arc::new(Mutex::new(SurveyFlow::new())));
        debug!("session {} opened", id);
        id
    }

    async fn get(&self, id: &Uuid) -> Result<Arc<Mutex<SurveyFlow>>, Error> {
        self.flows.read().await.get(id).cloned().ok_or_else(|| Error::NotFound(format!("session {}", id)))
    }

    async fn close(&self, id: &Uuid) {
        if self.flows.write().await.remove(id).is_some() {
            debug!("session {} closed", id);
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    id: Uuid,
    #[serde(flatten)]
    flow: SurveyFlow,
    question: Option<Question>,
    can_advance: bool,
    progress: f64,
    total: usize,
}

impl SessionView {
    fn new(id: Uuid, flow: &SurveyFlow, questions: &[Question]) -> Self {
        SessionView {
            id,
            flow: flow.clone(),
            question: flow.current_question(questions).cloned(),
            can_advance: flow.can_advance(questions),
            progress: flow.progress(questions.len()),
            total: questions.len(),
        }
    }
}

pub async fn create<S, K>(survey: Data<Survey<S, K>>, sessions: Data<Sessions>) -> Result<Json<SessionView>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let id = sessions.open().await;
    let questions = survey.questions().read().await;
    Ok(Json(SessionView::new(id, &SurveyFlow::new(), questions.questions())))
}

pub async fn detail<S, K>(survey: Data<Survey<S, K>>, sessions: Data<Sessions>, id: Path<Uuid>) -> Result<Json<SessionView>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let flow = sessions.get(&id).await?;
    let flow = flow.lock().await;
    let questions = survey.questions().read().await;
    Ok(Json(SessionView::new(*id, &flow, questions.questions())))
}

pub async fn start<S, K>(survey: Data<Survey<S, K>>, sessions: Data<Sessions>, id: Path<Uuid>) -> Result<Json<SessionView>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let flow = sessions.get(&id).await?;
    let mut flow = flow.lock().await;
    let questions = survey.questions().read().await;
    flow.start(questions.questions())?;
    Ok(Json(SessionView::new(*id, &flow, questions.questions())))
}

pub async fn answer<S, K>(survey: Data<Survey<S, K>>, sessions: Data<Sessions>, id: Path<Uuid>, Json(selection): Json<Selection>) -> Result<Json<SessionView>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let flow = sessions.get(&id).await?;
    let mut flow = flow.lock().await;
    let questions = survey.questions().read().await;
    flow.select_answer(questions.questions(), &selection.value)?;
    Ok(Json(SessionView::new(*id, &flow, questions.questions())))
}

pub async fn advance<S, K>(survey: Data<Survey<S, K>>, sessions: Data<Sessions>, id: Path<Uuid>, Device(device): Device) -> Result<Json<SessionView>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let flow = sessions.get(&id).await?;
    let mut flow = flow.lock().await;
    let questions = survey.questions().read().await.questions().to_vec();
    flow.advance(&questions, survey.responses(), device).await?;
    let view = SessionView::new(*id, &flow, &questions);
    if flow.step() == Step::Success {
        drop(flow);
        sessions.close(&id).await;
    }
    Ok(Json(view))
}

pub async fn retreat<S, K>(survey: Data<Survey<S, K>>, sessions: Data<Sessions>, id: Path<Uuid>) -> Result<Json<SessionView>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let flow = sessions.get(&id).await?;
    let mut flow = flow.lock().await;
    flow.retreat();
    let questions = survey.questions().read().await;
    Ok(Json(SessionView::new(*id, &flow, questions.questions())))
}
