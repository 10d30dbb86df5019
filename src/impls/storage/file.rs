use std::fs::{create_dir_all, read_to_string, write};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::core::ports::local_storage::KeyValueStorage;
use crate::error::Error;

/// One file per slot under a directory.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, Error> {
        create_dir_all(path.as_ref())?;
        Ok(Self { path: path.as_ref().to_owned() })
    }

    fn slot(&self, key: &str) -> PathBuf {
        self.path.join(format!("{}.json", key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        match read_to_string(self.slot(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        write(self.slot(key), value)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_and_read_slot() {
        let dir = std::env::temp_dir().join(format!("encuesta-{}", uuid::Uuid::new_v4()));
        let mut storage = FileStorage::new(&dir).unwrap();
        assert_eq!(storage.get("respuestas_locales").unwrap(), None);
        storage.set("respuestas_locales", "[]").unwrap();
        assert_eq!(storage.get("respuestas_locales").unwrap().as_deref(), Some("[]"));
        std::fs::remove_dir_all(dir).ok();
    }
}
