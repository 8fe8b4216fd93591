mod config;
mod logging;
mod nomad;
mod provider;

pub use config::*;
pub use logging::*;
pub use nomad::*;
pub use provider::*;
