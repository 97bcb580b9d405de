//! Loaders, updaters and the registry that wires them to the cache.

pub mod error;
pub mod loader;
pub mod messages;
pub mod registry;
pub mod selector;
pub mod sorter;
pub mod sources;
pub mod updater;

pub use loader::{DataMapper, Loader, LoaderOptions};
pub use messages::{LogListener, UpdateListener};
pub use registry::DataRegistry;
pub use selector::{DeriveFn, Selector};
pub use sorter::Sorter;
pub use sources::{EntityFetcher, EntityMutator};
pub use updater::{UpdateOutcome, Updater, UpdaterOptions};
