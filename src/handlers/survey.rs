use actix_web::web::{Data, Json};
use actix_web::HttpRequest;
use serde::Serialize;

use crate::core::ports::document_store::DocumentStore;
use crate::core::ports::local_storage::KeyValueStorage;
use crate::core::services::flow::Mode;
use crate::core::services::survey::Survey;
use crate::error::Error;

#[derive(Debug, Serialize)]
pub struct Overview {
    mode: Mode,
    title: String,
    description: String,
    questions: usize,
}

pub async fn overview<S, K>(req: HttpRequest, survey: Data<Survey<S, K>>) -> Result<Json<Overview>, Error>
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    let questions = survey.questions().read().await.questions().len();
    Ok(Json(Overview {
        mode: Mode::from_path(req.path()),
        title: survey.template().title().to_owned(),
        description: survey.template().description().to_owned(),
        questions,
    }))
}
