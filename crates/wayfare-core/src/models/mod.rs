//! Data models for Wayfare

mod record;

pub use record::{CandidateRecord, Record, RecordKind, ServerFields};
