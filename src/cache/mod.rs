//! Fleetview cache system
//!
//! Holds the client-side copy of every entity collection the console shows:
//!
//! - **Store**: collections keyed by [`CacheKey`], mutated only by the five
//!   [`CacheAction`]s
//! - **Pending requests**: at most one in-flight fetch or mutation per key and
//!   parameter subset
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! all_key = "__all__"
//! unique_identifier = "id"
//! ```

mod actions;
mod config;
mod keys;
mod lock;
mod pending;
mod store;

pub use actions::{CacheAction, Epoch};
pub use config::CacheConfig;
pub use keys::{ALL_TAG, CacheKey, IndexedParams, PendingKey};
pub use pending::{PendingRequests, RequestFuture, SharedRequest};
pub use store::CacheStore;

pub(crate) use lock::{mutex_lock, rw_read, rw_write};
