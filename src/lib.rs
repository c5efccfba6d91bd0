//! Funding Scout Library
//!
//! Core library for funding-announcement extraction and entry-level job search

pub mod ats;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod extraction;
pub mod extraction_rules;
pub mod filter;
pub mod pipeline;
pub mod scrapers;
pub mod slug;
pub mod storage;
pub mod types;

pub use types::*;
