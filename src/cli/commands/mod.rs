//! CLI command implementations.

mod config;
mod init;
mod run;
mod serve;
mod status;
mod submit;

pub use config::run_config;
pub use init::run_init;
pub use run::run_run;
pub use serve::run_serve;
pub use status::run_status;
pub use submit::run_submit;
