pub mod canon;
pub mod error;
pub mod focus;
pub mod types;

pub use error::UrlError;
pub use types::*;
