//! Client-side data layer for the fleet admin console.
//!
//! Loaders fetch entity collections into a shared [`cache::CacheStore`],
//! updaters run mutations and reconcile the cached copy, and selectors derive
//! the filtered and sorted views the console renders.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
