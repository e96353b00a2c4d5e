//! wayfare-core - Core library for Wayfare
//!
//! This crate owns the local-first record store used by the Wayfare clients:
//! saved deals, created trips and bookings live in named collections in local
//! storage, are mirrored best-effort to the travel backend, and stay consistent
//! across every open context that shares the same storage.

pub mod api;
pub mod bus;
pub mod config;
pub mod error;
pub mod mirror;
pub mod models;
pub mod storage;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use models::{CandidateRecord, Record, RecordKind};
pub use store::{collections, RecordStore};
