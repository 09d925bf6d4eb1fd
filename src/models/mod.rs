pub mod api;
pub mod case;
pub mod project;
pub mod testcase;

pub use api::*;
pub use case::*;
pub use project::*;
pub use testcase::*;
