//! # Race Coordinator Library
//!
//! This library provides the coordinator side of the typing-race
//! network layer. The coordinator owns the authoritative session:
//! the shared passage everyone types, the participant roster, and
//! every participant's progress. It serves three request/response
//! operations (join, fetch-text, submit-progress) and advertises the
//! session on the local network so participants can find it without a
//! configured address.
//!
//! ## Module Organization
//!
//! ### State Module (`state`)
//! The authoritative `SessionState`: capacity-bounded join with dense
//! identity assignment, per-participant progress, and value-copy
//! snapshots. Pure data behind the service's lock; no I/O.
//!
//! ### Service Module (`service`)
//! The TCP control channel. An accept loop hands each connection to a
//! short-lived handler task; submit-progress folds "write mine, read
//! everyone's" into one exchange so steady-state traffic is a single
//! round trip per sync tick.
//!
//! ### Broadcast Module (`broadcast`)
//! Periodic UDP announcements carrying the session label and live
//! participant counts, so lobby browsers on the subnet stay current.
//!
//! ## Consistency Model
//!
//! The session state sits behind one lock held only across individual
//! reads and mutations, never across socket I/O. Snapshots returned to
//! participants are value copies taken under that lock; two
//! participants syncing concurrently may observe each other's update
//! one tick late, which the game tolerates.

pub mod broadcast;
pub mod service;
pub mod state;
