pub mod export;
pub mod flow;
pub mod local_store;
pub mod question;
pub mod response;
pub mod survey;
pub mod template;
