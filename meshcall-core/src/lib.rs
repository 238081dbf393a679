pub mod error;
pub mod model;
pub mod utils;

pub use error::{ErrorCode, ProtocolError};
pub use model::*;
