pub mod properties;
pub mod runner;
