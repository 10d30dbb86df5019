use actix_web::http::header::USER_AGENT;
use actix_web::{dev::Payload, Error, FromRequest, HttpRequest};
use std::future::{ready, Ready};

/// The respondent's device descriptor, taken from the `User-Agent` header.
#[derive(Debug, Clone, Default)]
pub struct Device(pub Option<String>);

impl FromRequest for Device {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let agent = req.headers().get(USER_AGENT).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty()).map(str::to_owned);
        ready(Ok(Device(agent)))
    }
}
