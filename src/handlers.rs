pub mod question;
pub mod response;
pub mod session;
pub mod survey;

use actix_web::web::{delete, get, patch, post, put, resource, scope, ServiceConfig};

use crate::core::ports::document_store::DocumentStore;
use crate::core::ports::local_storage::KeyValueStorage;
use crate::core::services::flow::ADMIN_PATH;

pub fn configure<S, K>(cfg: &mut ServiceConfig)
where
    S: DocumentStore,
    K: KeyValueStorage + 'static,
{
    cfg.route("/", get().to(survey::overview::<S, K>))
        .route(ADMIN_PATH, get().to(survey::overview::<S, K>))
        .service(
            scope("questions")
                .service(resource("").route(get().to(question::list::<S, K>)).route(post().to(question::create::<S, K>)))
                .service(
                    scope("{id}")
                        .service(
                            resource("")
                                .route(patch().to(question::update::<S, K>))
                                .route(put().to(question::persist::<S, K>))
                                .route(delete().to(question::delete::<S, K>)),
                        )
                        .service(resource("options").route(post().to(question::add_option::<S, K>)))
                        .service(
                            resource("options/{index}")
                                .route(put().to(question::rename_option::<S, K>))
                                .route(delete().to(question::remove_option::<S, K>)),
                        ),
                ),
        )
        .service(
            scope("responses")
                .service(resource("").route(get().to(response::list::<S, K>)).route(post().to(response::submit::<S, K>)))
                .service(resource("cleanup").route(post().to(response::cleanup::<S, K>)))
                .service(resource("export").route(get().to(response::export::<S, K>)))
                .service(
                    resource("{id}")
                        .route(patch().to(response::update::<S, K>))
                        .route(delete().to(response::delete::<S, K>)),
                ),
        )
        .service(
            scope("sessions")
                .service(resource("").route(post().to(session::create::<S, K>)))
                .service(
                    scope("{id}")
                        .service(resource("").route(get().to(session::detail::<S, K>)))
                        .service(resource("start").route(post().to(session::start::<S, K>)))
                        .service(resource("answer").route(post().to(session::answer::<S, K>)))
                        .service(resource("advance").route(post().to(session::advance::<S, K>)))
                        .service(resource("retreat").route(post().to(session::retreat::<S, K>))),
                ),
        );
}
