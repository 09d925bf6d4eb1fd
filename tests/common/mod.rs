mod app;
mod factory;

pub use app::TestApp;
#[allow(unused_imports)]
pub use factory::{Factory, TestAuth};
