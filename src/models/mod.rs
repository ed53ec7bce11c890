// Core data models for stager
// These structs represent the domain entities

pub mod project;
pub mod directory;
pub mod request;
pub mod workflow;

pub use project::*;
pub use directory::*;
pub use request::*;
pub use workflow::*;
