//! Filesystem serving subsystem.
//!
//! # Data Flow
//! ```text
//! request path
//!     → classify.rs (sanitize, join under root, stat, pushstate substitution)
//!     → ResolvedTarget { path, kind }
//!     → [pipeline branches]
//!         File      → stream.rs  (conditional GET, ranges, cache defeat)
//!         Directory → listing.rs (content-negotiated listing)
//!         Missing   → archive.rs (suffix detection, streamed archive)
//! ```

pub mod archive;
pub mod classify;
pub mod listing;
pub mod stream;

pub use classify::{ResolvedTarget, TargetKind};
pub use stream::ServedSet;
