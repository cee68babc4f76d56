//! # aftercare-store
//!
//! `RecordStore` implementations: an in-memory map and a directory of JSON
//! documents. Both refuse to save, and the file store refuses to load, a
//! patient whose interaction records break the workflow invariants.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileRecordStore;
pub use memory::InMemoryRecordStore;
