//! Backend sessions.
//!
//! Remote backends are external collaborators that implement
//! [`BackendSession`]. This module provides the in-memory one, which
//! evaluates [`MemoryPlan`]s directly.
//!
//! [`MemoryPlan`]: crate::compiler::MemoryPlan

mod eval;
mod memory;

pub use crate::executor::{BackendError, BackendSession, RawDocumentStream};
pub use memory::{MemoryBackend, MemoryBackendConfig, ID_FIELD};
