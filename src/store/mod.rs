//! Storage layer (in-memory, optimistically versioned).
//!
//! The persistence technology itself is a collaborator concern; this store
//! gives the pipeline the typed operations and write-conflict semantics it
//! needs without binding to one.

pub mod memory;

pub use memory::Store;
