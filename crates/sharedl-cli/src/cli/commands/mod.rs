//! CLI command handlers, one file per command.

mod cancel;
mod method;
mod remove;
mod run;
mod stats;
mod status;
mod submit;

pub use cancel::run_cancel;
pub use method::run_method;
pub use remove::run_remove;
pub use run::run_pool;
pub use stats::run_stats;
pub use status::run_status;
pub use submit::run_submit;
