//! The baresip side of the session: spawning it on a pseudo-terminal,
//! the commands it accepts and the classification of what it prints.

mod classifier;
mod commands;
mod events;
mod process;

pub use classifier::*;
pub use commands::*;
pub use events::*;
pub use process::*;
