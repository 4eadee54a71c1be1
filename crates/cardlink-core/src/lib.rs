pub mod constants;
pub mod error;
pub mod normalize;
pub mod types;

pub use error::{Error, Result};
pub use normalize::{Presence, object_exists};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
