//! Core of wikisweep: bulk wiki maintenance as a two-phase pipeline.
//!
//! This crate provides:
//! - The `ContentStore` capability surface and an in-memory implementation
//! - TTL-gated content cache and title directory
//! - Boolean `~OR~` / `~AND~` query evaluation
//! - Bounded-concurrency scan pool, mutation queue and unique-target dedup
//! - Serial, throttled committer with structured results
//! - Safety gate, durable artifacts, configuration and unified errors

pub mod artifacts;
pub mod cache;
pub mod commit;
pub mod config;
pub mod durable;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod queue;
pub mod safety;
pub mod scan;
pub mod store;

pub use artifacts::RedirectMap;
pub use cache::{ContentCache, ContentSnapshot, TitleDirectory};
pub use commit::{
    Applied, CommitRecord, CommitResult, CommitSummary, Committer, FixedDelay, MinInterval, Mutator, Precondition,
    RetryPolicy, Throttle,
};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use pipeline::{Pipeline, PipelineReport};
pub use query::{Expression, SearchQuery, evaluate};
pub use queue::{CommitQueue, MutationQueue, QueueItem, TargetVotes};
pub use safety::{EditorAllowList, Gated, Safety, SafetyGate};
pub use scan::{Inspector, ScanOutcome, ScanPool, ScanSummary, Verdict};
pub use store::{ContentStore, MemoryStore, Revision, StoreError, StoreErrorKind, Title};
