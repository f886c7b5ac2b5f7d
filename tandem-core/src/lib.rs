pub mod error;
pub mod model;
pub mod utils;

pub use error::{Error, Result};
pub use model::*;
