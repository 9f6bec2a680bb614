//! Google Cloud Firestore integration for Synaptic.
//!
//! This crate provides:
//! - [`FirestoreLoader`]: a [`Loader`](synaptic_core::Loader) that drains a
//!   Firestore collection into [`Document`]s, with an async `load()` and a
//!   blocking [`load_blocking()`](FirestoreLoader::load_blocking).
//! - [`FirestoreClient`] / [`CollectionReference`]: the narrow client
//!   capability the loader depends on, so any client can be injected.
//! - [`FirestoreRestClient`]: the default client, over the Firestore REST
//!   API (cargo feature `rest`, on by default).
//! - [`InMemoryFirestore`]: an in-memory client for tests and local use.
//!
//! # Example
//!
//! ```rust,no_run
//! use synaptic_core::Loader;
//! use synaptic_firestore::{FirestoreConfig, FirestoreLoader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FirestoreConfig::new("my-project", "restaurants")
//!     .with_database("sample_restaurants");
//! let loader = FirestoreLoader::new(config)?;
//! let docs = loader.load().await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "rest")]
pub mod auth;
mod client;
mod config;
mod loader;
mod memory;
#[cfg(feature = "rest")]
mod rest;
mod snapshot;
#[cfg(feature = "rest")]
mod value;

pub use client::{
    block_on_stream, CollectionReference, FirestoreClient, SnapshotIter, SnapshotStream,
};
pub use config::{FirestoreConfig, DEFAULT_PAGE_SIZE, FIRESTORE_DEFAULT_DB};
pub use loader::{document_from_snapshot, FirestoreLoader};
pub use memory::InMemoryFirestore;
#[cfg(feature = "rest")]
pub use rest::{FirestoreRestClient, FIRESTORE_BASE_URL};
pub use snapshot::DocumentSnapshot;

// Re-export core types for convenience.
pub use synaptic_core::{Document, Loader, SynapticError};
