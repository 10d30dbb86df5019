use log::{error, warn};
use serde_json::Value;

use crate::core::models::response::{Response, ResponseId};
use crate::core::ports::local_storage::KeyValueStorage;
use crate::error::Error;

pub const SLOT: &str = "respuestas_locales";

/// Ordered sequence of responses kept in one slot of local storage, most recent first.
///
/// Reads never fail: a missing slot is empty and unreadable content is logged and treated
/// as empty. Writes log their failures instead of reporting them.
pub struct LocalResponseStore<K> {
    storage: K,
}

impl<K> LocalResponseStore<K>
where
    K: KeyValueStorage,
{
    pub fn new(storage: K) -> Self {
        Self { storage }
    }

    fn try_load(&self) -> Result<Vec<Response>, Error> {
        let raw = match self.storage.get(SLOT)? {
            Some(raw) => raw,
            None => return Ok(Vec::new()),
        };
        let records: Vec<Value> = serde_json::from_str(&raw).map_err(|e| Error::StorageCorrupt(e.to_string()))?;
        records.iter().map(Response::from_local_record).collect()
    }

    pub fn load_all(&self) -> Vec<Response> {
        match self.try_load() {
            Ok(responses) => responses,
            Err(e) => {
                warn!("ignoring local responses: {}", e);
                Vec::new()
            }
        }
    }

    pub fn save_all(&mut self, responses: &[Response]) {
        let records: Vec<Value> = responses.iter().map(Response::to_local_record).collect();
        let res = serde_json::to_string(&records).map_err(Error::from).and_then(|raw| self.storage.set(SLOT, &raw));
        if let Err(e) = res {
            error!("failed to save local responses: {}", e);
        }
    }

    pub fn prepend(&mut self, response: Response) {
        let mut responses = self.load_all();
        responses.insert(0, response);
        self.save_all(&responses);
    }

    /// Applies `f` to the stored response with the given id. Returns whether it was found.
    pub fn update<F>(&mut self, id: &ResponseId, f: F) -> bool
    where
        F: FnOnce(&mut Response),
    {
        let mut responses = self.load_all();
        match responses.iter_mut().find(|r| &r.id == id) {
            Some(response) => {
                f(response);
                self.save_all(&responses);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &ResponseId) {
        let mut responses = self.load_all();
        responses.retain(|r| &r.id != id);
        self.save_all(&responses);
    }

    pub fn contains(&self, id: &ResponseId) -> bool {
        self.load_all().iter().any(|r| &r.id == id)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::models::response::{AnswerValue, Answers, CreatedAt};
    use crate::impls::storage::memory::MemoryStorage;
    use chrono::Utc;

    fn local(key: &str) -> Response {
        Response {
            id: ResponseId::Local(key.into()),
            answers: Answers::from([("1".to_owned(), AnswerValue::One("Rock".into()))]),
            device: None,
            created_at: CreatedAt::Client(Utc::now()),
        }
    }

    #[test]
    fn test_empty_slot() {
        let store = LocalResponseStore::new(MemoryStorage::new());
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_corrupt_slot_is_empty() {
        let mut storage = MemoryStorage::new();
        storage.set(SLOT, "{not json").unwrap();
        assert!(LocalResponseStore::new(storage).load_all().is_empty());
    }

    #[test]
    fn test_prepend_is_most_recent_first() {
        let mut store = LocalResponseStore::new(MemoryStorage::new());
        store.prepend(local("1"));
        store.prepend(local("2"));
        let ids: Vec<String> = store.load_all().into_iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["local_2", "local_1"]);
    }

    #[test]
    fn test_update_and_remove() {
        let mut store = LocalResponseStore::new(MemoryStorage::new());
        store.prepend(local("1"));
        let id = ResponseId::Local("1".into());
        assert!(store.update(&id, |r| r.device = Some("tablet".into())));
        assert_eq!(store.load_all()[0].device.as_deref(), Some("tablet"));
        assert!(!store.update(&ResponseId::Local("9".into()), |_| {}));
        store.remove(&id);
        assert!(!store.contains(&id));
    }
}
