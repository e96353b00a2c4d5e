pub mod book;
pub mod clear;
pub mod common;
pub mod config;
pub mod deals;
pub mod list;
pub mod remove;
pub mod save;
pub mod search;
pub mod subscribe;
pub mod trip;
pub mod watch;
