pub mod api;
pub mod case;
pub mod case_step;
pub mod project;
