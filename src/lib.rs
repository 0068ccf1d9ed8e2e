//! `beacon_core` is the core library for building Beacon analytics SDKs. If you're
//! integrating Beacon into an app, you probably want one of the platform SDKs built on top
//! of this crate.
//!
//! # Overview
//!
//! `beacon_core` is organized as a set of building blocks. Host integrations wire them to
//! the platform (storage, connectivity, lifecycle) and keep the rest.
//!
//! [`model`] holds the domain value objects: a [`model::Profile`] is the current user's
//! identifiers plus an open attribute bag, a [`model::Event`] is one tracked behavior.
//! Both are plain values with typed keys and a closed [`model::PropertyValue`] sum type.
//!
//! [`requests::ApiRequest`] is the unit of outbound work: one durable, retryable,
//! deduplicable API call with a small state machine
//! (`Unsent → Inflight → {Complete | PendingRetry | Failed}`), JSON persistence for queue
//! storage, and per-endpoint constructors that snapshot their inputs. The physical queue
//! that drains requests lives behind the [`api_client::ApiClient`] trait; this crate
//! produces requests and reacts to their completions.
//!
//! [`state::UserState`] stores the current user: identifiers, custom attributes, and push
//! registration state, each lazily hydrated from an injected [`data_store::DataStore`] and
//! mutated through validating setters that broadcast [`state::StateChange`]s.
//!
//! [`state::StateSideEffects`] is the reactive coordinator: it watches state changes and
//! request completions, coalesces bursts of profile edits into one debounced sync, flushes
//! immediately on reset, registers push tokens when registration state changes, and rolls
//! back identifier fields the backend rejects.
//!
//! Time is abstracted behind [`clock::Clock`] so the debounce and the event-buffer TTLs
//! are deterministic under test.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum, but almost nothing here throws: send
//! outcomes surface as request statuses, malformed persisted data degrades to empty values
//! with a logged warning, and backend rejections turn into targeted state rollbacks.
//!
//! # Logging
//!
//! The crate uses the [`log`](https://docs.rs/log/latest/log/) crate with target
//! `"beacon"`. Integrate a `log`-compatible logger for visibility into SDK operations.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

pub mod api_client;
pub mod clock;
pub mod data_store;
pub mod model;
pub mod network_monitor;
pub mod observers;
pub mod requests;
pub mod state;
pub mod transport;

mod config;
mod error;
#[cfg(test)]
pub(crate) mod fixtures;

pub use config::{Config, DeviceInfo};
pub use error::{Error, Result};
