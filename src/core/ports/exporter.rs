use crate::core::models::export::Row;
use crate::error::Error;

#[derive(Debug, Clone)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

pub trait TableExporter {
    fn export(&self, rows: &[Row]) -> Result<ExportFile, Error>;
}
