pub mod all;
pub mod commands;
pub mod context;
pub mod list;
pub mod output;
pub mod run;
pub mod validate;

pub use commands::{Cli, Commands};
pub use context::GlobalOptions;
