pub mod config;
pub mod errors;
pub mod matches;
pub mod parameter;

pub use config::*;
pub use errors::*;
pub use matches::*;
pub use parameter::*;
