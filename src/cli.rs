mod parser;
mod tracing;

pub(crate) use parser::{Cli, Commands, ReplayArgs, ServeArgs};
pub(crate) use self::tracing::init as init_tracing;
