use crate::error::Error;

/// Named-slot string storage, the persistent key/value area local to this client.
pub trait KeyValueStorage: Send {
    fn get(&self, key: &str) -> Result<Option<String>, Error>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), Error>;
}
