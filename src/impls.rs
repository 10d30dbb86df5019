pub mod exporters;
pub mod storage;
pub mod stores;
