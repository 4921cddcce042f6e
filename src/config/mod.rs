//! Configuration module.

mod baresip_conf;
mod identity;
mod loader;
mod types;

pub use baresip_conf::*;
pub use identity::*;
pub use loader::*;
pub use types::*;
