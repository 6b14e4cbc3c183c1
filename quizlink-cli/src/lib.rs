pub mod error;
pub mod game_io;
pub mod infrastructure;

pub use error::{CliError, Result};
