//! Client code for wikisweep.
//!
//! This crate provides the MediaWiki Action API session that the CLI plugs
//! into the core pipeline as its `ContentStore`.

pub mod mediawiki;

pub use mediawiki::{ApiError, MediaWikiClient, UserInfo, WikiConfig};
