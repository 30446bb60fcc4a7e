//! The engagement counter and idempotency subsystem.
//!
//! - [`dedup`] decides whether a view or click is the first from a visitor
//!   within the dedup window.
//! - [`counter`] and [`reconciler`] keep the fast like counter and the
//!   authoritative relational counters in step.
//! - [`likes`] is the per-(subject, actor) like toggle.
//! - [`bus`] runs image cleanup strictly after the owning commit.
//!
//! [`Engagement`] ties them together for the HTTP layer.

pub mod bus;
pub mod clock;
pub mod counter;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod fs_objects;
pub mod likes;
pub mod memory;
pub mod reconciler;

pub use engine::{EngageConfig, Engagement};
pub use error::{EngageError, Result};
