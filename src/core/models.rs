pub mod export;
pub mod question;
pub mod response;
pub mod template;
