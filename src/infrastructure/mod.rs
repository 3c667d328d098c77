pub mod in_memory;
pub mod ledger_backend;
pub mod openai;
pub mod rest_backend;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
