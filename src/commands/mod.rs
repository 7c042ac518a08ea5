// Commands module - handles CLI command execution

pub mod config;
pub mod listen;
pub mod replay;

pub use config::handle_config;
pub use listen::handle_listen;
pub use replay::handle_replay;
