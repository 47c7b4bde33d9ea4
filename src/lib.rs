mod config;
mod cursor;
mod error;
mod escape;
mod session;

pub use config::*;
pub use cursor::*;
pub use error::*;
pub use escape::*;
pub use session::*;

pub type Result<T> = std::result::Result<T, Error>;
