//! # Kindred
//!
//! An embedding-based peer-story matching engine with conversational intake
//! and content-risk screening.
//!
//! Kindred matches a free-text description of a personal struggle against a
//! corpus of first-person mentor stories, returning the most semantically
//! similar entries after a safety screen, and can gate that matching behind
//! a multi-turn conversational intake.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │  Corpus  │──▶│   Import     │──▶│  SQLite   │
//! │  JSONL   │   │ Filter+Embed │   │ snapshot  │
//! └──────────┘   └──────────────┘   └─────┬─────┘
//!                                         │ loaded read-only
//!                     ┌───────────────────▼─────┐
//!   query ───────────▶│  Matcher ─▶ Safety Gate │──▶ ranked, screened
//!                     └───────────▲─────────────┘       matches
//!                                 │
//!   chat turns ──▶ Controller ────┘  (after intake threshold)
//! ```
//!
//! Both entry points converge on the same pipeline: classify the query,
//! rank by cosine similarity, filter risky candidates, return survivors in
//! rank order.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed error taxonomy for the serving core |
//! | [`embedding`] | Embedding provider boundary + vector utilities |
//! | [`features`] | Stylistic feature extraction |
//! | [`moderator`] | Risk classifier: predict, train, persist |
//! | [`index`] | Story index build / snapshot persistence |
//! | [`matcher`] | Cosine ranking and top-k selection |
//! | [`gate`] | Safety gate over queries and candidates |
//! | [`session`] | Per-session conversation storage |
//! | [`reply`] | Conversational reply service boundary |
//! | [`chat`] | Conversational intake controller |
//! | [`service`] | Serving facade (match / moderate / readiness) |
//! | [`ingest`] | Corpus import batch job |
//! | [`train_cmd`] | Offline training command |
//! | [`stats`] | Readiness overview |
//!
//! ## Concurrency
//!
//! The index and risk model are loaded once at startup and are immutable
//! for the process lifetime; reads take no locks. Conversation sessions are
//! the only mutable shared state, guarded by one exclusive lock per session
//! so distinct sessions never contend. Rebuilding the index is an
//! out-of-process batch step that produces a new snapshot, picked up at the
//! next start.

pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;
pub mod features;
pub mod gate;
pub mod index;
pub mod ingest;
pub mod matcher;
pub mod models;
pub mod moderator;
pub mod reply;
pub mod service;
pub mod session;
pub mod stats;
pub mod train_cmd;
