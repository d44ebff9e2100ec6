pub mod articles;
pub mod config_cmd;
pub mod diff;
pub mod runtime;
pub mod skills;
