pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::{DbType, Row};
pub use value::Value;
