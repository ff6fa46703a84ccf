//! Medblocks Gateway Library
//!
//! Patient registration over an embedded relational store: typed patient
//! operations, a free-form query console and the HTTP surface serving both.

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod gateway;
pub mod patient;
pub mod store;
