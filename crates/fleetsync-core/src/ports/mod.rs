//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteReplica`] - Remote authoritative store (rows, settings, change feed)
//! - [`ILocalStore`] - Durable local key-value persistence
//! - [`ISyncObserver`] - UI callbacks invoked after synchronization
//! - [`IConnectivity`] - Network availability gate

pub mod connectivity;
pub mod local_store;
pub mod observer;
pub mod remote_replica;

pub use connectivity::{AlwaysOnline, IConnectivity};
pub use local_store::ILocalStore;
pub use observer::{ISyncObserver, NoopObserver};
pub use remote_replica::{IRemoteReplica, Subscription, SubscriptionHandle};
