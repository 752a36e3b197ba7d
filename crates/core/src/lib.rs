pub mod action;
pub mod config;
pub mod error;
pub mod features;
pub mod observation;

pub use action::*;
pub use config::Config;
pub use error::*;
pub use features::*;
pub use observation::*;
