//! Types and traits for recording training metrics.
//!
//! * [`Record`] - key-value pairs of scalars and timestamps
//! * [`RecordValue`] - the types of values a record can hold
//! * [`Recorder`] - the interface of metric sinks
//! * [`BufferedRecorder`] - keeps records in memory
//! * [`NullRecorder`] - discards all records
//!
//! ```rust
//! use pursuit_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("player_avg_p_loss", 0.25);
//! record.insert("iteration", RecordValue::Scalar(1.0));
//! assert_eq!(record.get_scalar("player_avg_p_loss").unwrap(), 0.25);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
