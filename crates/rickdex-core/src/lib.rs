pub mod config;
pub mod controller;
pub mod error;
pub mod loader;
pub mod resolver;
pub mod state;

pub use config::*;
pub use controller::*;
pub use error::*;
pub use loader::*;
pub use resolver::*;
pub use state::*;
