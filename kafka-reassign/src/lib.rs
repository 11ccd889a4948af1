pub mod commands;
pub mod config;
pub mod error;
pub mod input;
pub mod reassign;
pub mod utils;

pub mod cmd {
    pub use super::commands::Cli;
}
