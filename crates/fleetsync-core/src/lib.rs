//! FleetSync Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Entity`, `RemoteRow`, `SettingRow`, `BackendId`, `Timestamp`
//! - **Use cases** - `LocalReplica` (typed access to the local store), `RecordMutations`
//! - **Port definitions** - Traits for adapters: `IRemoteReplica`, `ILocalStore`,
//!   `ISyncObserver`, `IConnectivity`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O. Ports define trait
//! interfaces that adapter crates implement (`fleetsync-cache` for the local
//! store, `fleetsync-remote` for the backend). Use cases orchestrate domain
//! types through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
