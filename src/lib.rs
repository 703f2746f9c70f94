//! # Page Harness
//!
//! A local full-text index of visited and bookmarked web pages.
//!
//! This crate is the application layer over
//! [`page_harness_core`]: TOML configuration, the SQLite connection pool
//! and schema, a [`Store`](page_harness_core::store::Store) implementation
//! on top of it, logging setup, and the command handlers behind the `pgh`
//! binary.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────────┐   ┌──────────────┐
//! │  pgh (CLI)   │──▶│  PageIndex (core)   │──▶│ SqliteStore  │
//! │ add/search/… │   │ reconcile + postings│   │ pages/visits │
//! └──────────────┘   └─────────────────────┘   │ bookmarks/   │
//!                                              │ tags (WAL)   │
//!                                              └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pgh init
//! pgh import history.jsonl
//! pgh search "rust #reading" --count
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] | Connection pool and index loading |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `Store` implementation |
//! | [`ingest`] | `add`, `add-terms` and JSONL import |
//! | [`annotate`] | Visit, bookmark and tag commands |
//! | [`delete`] | Deletion by URL, domain or pattern |
//! | [`get`] | Single-page retrieval |
//! | [`search`] | Search and suggestion commands |
//! | [`stats`] | Stats and index check |

pub mod annotate;
pub mod config;
pub mod db;
pub mod delete;
pub mod get;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod search;
pub mod sqlite_store;
pub mod stats;
