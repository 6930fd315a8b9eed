//! Objectr: reference-counted value objects and their binary codecs.
//!
//! This crate provides a small dynamically-typed document model (null,
//! boolean, number, string, data, date, array and dictionary values that
//! share children by reference) and a pluggable serialization engine that
//! reads and writes it in several wire formats.
//!
//! # Architecture
//!
//! - **`types`**: The value model (`Value`, `Number`, `Kind`)
//! - **`format`**: Reader/writer traits, the format `Registry`, extension hooks
//! - **`tbo`**: The compact TBO binary format with back-reference sharing
//! - **`bplist`**: Apple's binary property list format
//! - **`json`**: JSON adapter built on `serde_json` (feature `json`)
//! - **`stream`**: Async document reader/writer over tokio streams
//! - **`config`**: Decode limits and wire options
//!
//! # Example
//!
//! ```
//! use objectr::format::{FormatId, Registry};
//! use objectr::types::Value;
//!
//! let registry = Registry::with_defaults();
//! let shared = Value::array_from(vec![Value::from(1u8)]);
//! let root: Value = [("a", shared.clone()), ("b", shared)].into_iter().collect();
//!
//! let bytes = registry.to_bytes(&root, FormatId::Bplist)?;
//! let decoded = registry.read_auto(&bytes)?;
//! assert_eq!(decoded, root);
//! assert!(Value::ptr_eq(&decoded.get("a").unwrap(), &decoded.get("b").unwrap()));
//! # Ok::<(), objectr::error::ObjectError>(())
//! ```

pub mod bplist;
pub mod config;
pub mod error;
pub mod format;
pub mod stream;
pub mod tbo;
pub mod types;

#[cfg(feature = "json")]
pub mod json;
