//! # Race Participant Library
//!
//! The participant side of the typing-race network layer. A client
//! joins a coordinator (found via LAN discovery or given directly),
//! fetches the shared passage, and then keeps its progress
//! synchronized from a background loop: each tick submits the local
//! progress and brings back a fresh snapshot of everyone's standing.
//!
//! The presentation layer stays out of this crate. It pushes progress
//! with [`network::Client::submit_local_progress`] on every keystroke,
//! reads [`network::Client::latest_snapshot`] once per frame, and
//! offers the user a coordinator list assembled by
//! [`discovery::CoordinatorDirectory`].

pub mod discovery;
pub mod network;
