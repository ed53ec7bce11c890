pub mod project;
pub mod directory;
pub mod relationship;
pub mod request;
pub mod workflow;

pub use project::*;
pub use directory::*;
pub use relationship::*;
pub use request::*;
pub use workflow::*;
