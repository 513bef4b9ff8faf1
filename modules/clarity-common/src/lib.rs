pub mod config;
pub mod error;
pub mod scoring;
pub mod text;

pub use config::Config;
pub use error::{ClarityError, Result};
pub use scoring::*;
pub use text::*;
