pub mod query;
pub mod storage;
pub mod validation;

pub use query::*;
pub use storage::*;
pub use validation::*;
