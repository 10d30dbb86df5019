use actix_web::web::{Data, Json, Path, Query};
use actix_web::HttpResponse;

use crate::core::models::question::{Patch, Question};
use crate::core::ports::document_store::DocumentStore;
use crate::core::ports::local_storage::KeyValueStorage;
use crate::core::services::survey::Survey;
use crate::error::Error;
use crate::request::{Confirm, OptionText};
use crate::response::{DeleteResponse, List};

pub async fn list<S, K>(survey: Data<Survey<S, K>>) -> Result<Json<List<Question>>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let questions = survey.questions().read().await.questions().to_vec();
    Ok(Json(List::new(questions)))
}

pub async fn create<S, K>(survey: Data<Survey<S, K>>) -> Result<Json<Question>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let (question, writer) = {
        let mut questions = survey.questions().write().await;
        (questions.push_draft(), questions.writer())
    };
    writer.create(&question).await;
    Ok(Json(question))
}

pub async fn update<S, K>(survey: Data<Survey<S, K>>, id: Path<String>, Json(patch): Json<Patch>) -> Result<Json<Question>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let mut questions = survey.questions().write().await;
    Ok(Json(questions.update_local(&id, patch)?.clone()))
}

pub async fn persist<S, K>(survey: Data<Survey<S, K>>, id: Path<String>) -> Result<HttpResponse, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let (question, writer) = {
        let questions = survey.questions().read().await;
        (questions.snapshot(&id)?, questions.writer())
    };
    writer.persist(&question).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn delete<S, K>(survey: Data<Survey<S, K>>, id: Path<String>, Query(confirm): Query<Confirm>) -> Result<Json<DeleteResponse>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    if !confirm.confirm {
        return Ok(Json(DeleteResponse { deleted: false }));
    }
    let writer = {
        let mut questions = survey.questions().write().await;
        if !questions.remove_local(&id) {
            return Err(Error::NotFound(format!("question {}", id)));
        }
        questions.writer()
    };
    writer.remove(&id).await;
    Ok(Json(DeleteResponse { deleted: true }))
}

pub async fn add_option<S, K>(survey: Data<Survey<S, K>>, id: Path<String>) -> Result<Json<Question>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let mut questions = survey.questions().write().await;
    Ok(Json(questions.add_option(&id)?.clone()))
}

pub async fn rename_option<S, K>(survey: Data<Survey<S, K>>, path: Path<(String, usize)>, Json(body): Json<OptionText>) -> Result<Json<Question>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let (id, idx) = path.into_inner();
    let mut questions = survey.questions().write().await;
    Ok(Json(questions.rename_option(&id, idx, &body.text)?.clone()))
}

pub async fn remove_option<S, K>(survey: Data<Survey<S, K>>, path: Path<(String, usize)>) -> Result<Json<Question>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let (id, idx) = path.into_inner();
    let mut questions = survey.questions().write().await;
    Ok(Json(questions.remove_option(&id, idx)?.clone()))
}
