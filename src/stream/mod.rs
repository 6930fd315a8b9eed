//! Async document I/O over tokio byte streams.

pub mod reader;
pub mod writer;

pub use reader::DocumentReader;
pub use writer::DocumentWriter;
