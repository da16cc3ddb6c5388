//! Session store
//!
//! Content-addressed, append-only record of one sampling campaign, and the
//! planner that resumes a partially successful session.

pub mod gap_fill;
pub mod store;

pub use gap_fill::{plan_gap_fill, GapFill, Progress};
pub use store::{allocate_session, Session};
