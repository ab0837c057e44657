pub mod config_cmd;
pub mod progress;
pub mod run;
