//! Workspace facade crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `provider-msgraph`, `bridge-reqwest`,
//! `backend-runtime`). Host backup engines can depend on
//! `graphvault-workspace` and enable the documented features without needing
//! to wire each crate individually.

pub use backend_traits as traits;

#[cfg(feature = "runtime")]
pub use backend_runtime as runtime;

#[cfg(feature = "reqwest-transport")]
pub use bridge_reqwest as transport;

#[cfg(feature = "msgraph")]
pub use provider_msgraph as msgraph;
