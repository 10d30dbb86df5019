pub mod confirmation;
pub mod document_store;
pub mod exporter;
pub mod local_storage;
