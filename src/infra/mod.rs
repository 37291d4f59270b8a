//! Infrastructure adapters: queue backends.

pub mod queue;

pub use queue::InMemoryQueue;
