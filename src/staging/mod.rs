//! Staging workflow domain
//!
//! A staging workflow belongs to one project and a managers group. It owns
//! the staging projects under `<project>:Staging:*`, selects the requests
//! that can be staged, and mirrors itself to the backend on request.

pub mod error;
pub mod selector;
pub mod projects;
pub mod directory;
pub mod render;
pub mod workflow;

pub use error::*;
pub use selector::*;
pub use projects::*;
pub use directory::*;
pub use render::*;
pub use workflow::*;
