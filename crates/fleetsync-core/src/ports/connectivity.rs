//! Connectivity port
//!
//! A synchronous gate consulted before a sync pass starts. Offline is not an
//! error: the orchestrator simply skips the pass.

/// Port trait reporting whether the device believes it is online
pub trait IConnectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity source that always reports online
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl IConnectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }
}
