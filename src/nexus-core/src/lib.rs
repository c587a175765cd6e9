pub mod core;
pub mod helpers;
pub mod models;

pub use self::core::*;
pub use self::helpers::*;
pub use self::models::*;

pub use nexus_errors::{NexusError, Result};
