mod info;
mod run;

pub use info::cmd_info;
pub use run::{RunArgs, cmd_run};
