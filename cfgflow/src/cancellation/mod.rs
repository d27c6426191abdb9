//! Cooperative cancellation for synthesis runs.
//!
//! A run checks its token between stages and between completion attempts,
//! and races retry back-off sleeps against it. Cleanup of per-run resources
//! does not depend on cancellation being observed: workspaces release their
//! directory on drop.

mod token;

pub use token::CancellationToken;
