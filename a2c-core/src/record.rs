//! Types and traits for recording training metrics.
//!
//! * [`Record`] - A container for key-value pairs of metrics
//! * [`RecordValue`] - The values that can be stored in a record
//! * [`Recorder`] - Writes records to some destination
//! * [`TabularRecorder`] - Dumps records as a key/value table through `log`
//! * [`BufferedRecorder`] - Keeps records in memory
//!
//! # Basic Usage
//!
//! ```rust
//! use a2c_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("nupdates", RecordValue::Scalar(1.0));
//! record.insert("value_loss", RecordValue::Scalar(0.25));
//! assert_eq!(record.get_scalar("value_loss").ok(), Some(0.25));
//! ```
mod base;
mod buffered_recorder;
mod recorder;
mod tabular_recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use recorder::Recorder;
pub use tabular_recorder::TabularRecorder;
