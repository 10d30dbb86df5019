use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct List<T> {
    list: Vec<T>,
    total: usize,
}

impl<T> List<T> {
    pub fn new(list: Vec<T>) -> Self {
        let total = list.len();
        List { list, total }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub confirmed: bool,
    pub deleted: usize,
}
