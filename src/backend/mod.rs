//! Client side of the source backend.
//!
//! The staging core only ever writes to the backend; reads go through the
//! local store.

pub mod client;

pub use client::*;
