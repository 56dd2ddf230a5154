//! Component discovery and lifecycle registry.
//!
//! The Registry Core ([`SourceManager`]) discovers installed components that
//! advertise a configured action, hands each one to the configured loaders,
//! and keeps the resulting items current across install, change, remove and
//! user-switch events. [`spawn_core`] runs it behind the isolated executor
//! boundary where it is reachable only through boundary envelopes.

pub mod boundary;
pub mod directory;
pub mod factory;
pub mod loader;
pub mod manager;
pub mod memory;

pub use boundary::{CORE_ACTOR_NAME, CoreActor, CoreHandle, CoreInput, spawn_core};
pub use directory::{AbilityQuery, BundleEvent, BundleEventKind, BundleMonitor, ComponentDirectory, DirectoryError, QueryKind, SubscriptionId};
pub use factory::LoaderFactory;
pub use loader::{ItemStore, LoaderChannel, LoaderSettings, SourceLoader};
pub use manager::SourceManager;
pub use memory::{CatalogEntry, QueryRecord, StaticDirectory};
