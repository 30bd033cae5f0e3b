//! Common types used by the various preflight components.
pub mod crypto;
pub mod error;
pub mod storage;
pub mod util;

pub use self::error::Error;

//------------ Response Aliases ----------------------------------------------

pub type PreflightEmptyResult = std::result::Result<(), self::error::Error>;
pub type PreflightResult<T> = std::result::Result<T, self::error::Error>;
