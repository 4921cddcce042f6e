//! Call session: state machine, hooks, command façade and reader loop.

mod hooks;
mod phone;
mod reader;
mod state;

pub use hooks::*;
pub use phone::*;
pub use reader::*;
pub use state::*;
