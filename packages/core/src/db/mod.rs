//! Storage Layer
//!
//! This module owns the flat record collection and the persistence boundary:
//!
//! - `RecordStore` - the ordered flat node array, load sanitation, invariant checks
//! - `CatalogSink` - async trait for the external save collaborator
//!
//! # Architecture
//!
//! The engine keeps the whole catalog in memory. Persistence is write-behind: the
//! editor schedules the full array with a save scheduler, which hands it to a sink
//! after a quiet period. Which backend sits behind the sink (a file, an HTTP
//! endpoint) is not the engine's concern.

mod record_store;
mod sink;

pub use record_store::{LoadReport, RecordStore};
pub use sink::{CatalogSink, JsonFileSink, MemorySink};
