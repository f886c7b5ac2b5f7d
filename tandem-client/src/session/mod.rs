mod call_command;
mod controller;
mod handle;
mod reconnect;
mod state_machine;

pub use call_command::*;
pub use handle::*;
pub use reconnect::*;
pub use state_machine::*;
