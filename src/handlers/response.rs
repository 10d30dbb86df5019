use std::collections::BTreeMap;

use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::web::{Data, Json, Path, Query};
use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};

use crate::context::Device;
use crate::core::models::question::QuestionKind;
use crate::core::models::response::{AnswerValue, Answers, Patch, Response, ResponseId};
use crate::core::ports::document_store::DocumentStore;
use crate::core::ports::local_storage::KeyValueStorage;
use crate::core::services::export::{export as export_rows, summarize_device};
use crate::core::services::response::SubmitOutcome;
use crate::core::services::survey::Survey;
use crate::error::Error;
use crate::impls::exporters::xlsx::XlsxExporter;
use crate::request::Confirm;
use crate::response::{CleanupResponse, DeleteResponse, List};

#[derive(Debug, Serialize)]
pub struct Item {
    #[serde(flatten)]
    response: Response,
    device_summary: Option<String>,
}

pub async fn list<S, K>(survey: Data<Survey<S, K>>) -> Result<Json<List<Item>>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let items = survey
        .responses()
        .responses()
        .await
        .into_iter()
        .map(|response| Item {
            device_summary: response.device.as_deref().map(summarize_device),
            response,
        })
        .collect();
    Ok(Json(List::new(items)))
}

pub async fn submit<S, K>(survey: Data<Survey<S, K>>, Device(device): Device, Json(answers): Json<Answers>) -> Result<Json<SubmitOutcome>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    Ok(Json(survey.responses().submit(answers, device).await))
}

/// Cells as typed in the admin table, keyed by question id.
#[derive(Debug, Deserialize)]
pub struct Edit {
    #[serde(default)]
    answers: BTreeMap<String, String>,
    device: Option<String>,
}

pub async fn update<S, K>(survey: Data<Survey<S, K>>, id: Path<String>, Json(edit): Json<Edit>) -> Result<HttpResponse, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let answers = {
        let questions = survey.questions().read().await;
        edit.answers
            .into_iter()
            .map(|(qid, text)| {
                let kind = questions.get(&qid).map_or(QuestionKind::ShortText, |q| q.kind);
                let value = AnswerValue::from_edit_text(kind, &text);
                (qid, value)
            })
            .collect()
    };
    let patch = Patch { answers, device: edit.device };
    survey.responses().update(&ResponseId::from(id.as_str()), patch).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn delete<S, K>(survey: Data<Survey<S, K>>, id: Path<String>, Query(confirm): Query<Confirm>) -> Result<Json<DeleteResponse>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let deleted = survey.responses().delete(&ResponseId::from(id.as_str()), &confirm).await?;
    Ok(Json(DeleteResponse { deleted }))
}

pub async fn cleanup<S, K>(survey: Data<Survey<S, K>>, Query(confirm): Query<Confirm>) -> Result<Json<CleanupResponse>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let questions = survey.questions().read().await.questions().to_vec();
    let deleted = survey.responses().cleanup(&questions, &confirm).await;
    Ok(Json(CleanupResponse {
        confirmed: deleted.is_some(),
        deleted: deleted.unwrap_or(0),
    }))
}

pub async fn export<S, K>(survey: Data<Survey<S, K>>) -> Result<HttpResponse, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let questions = survey.questions().read().await.questions().to_vec();
    let responses = survey.responses().responses().await;
    let file = export_rows(&XlsxExporter::default(), &responses, &questions)?;
    Ok(HttpResponse::Ok()
        .content_type(file.content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(file.filename)],
        })
        .body(file.content))
}
