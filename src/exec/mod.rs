//! Execution backends for stitch.
//!
//! Every operation reaches a host through the [`Executor`] trait. Hosts
//! flagged `local` get a [`LocalExecutor`]; everything else is reached
//! over SSH.

mod executor;
#[cfg(test)]
pub(crate) mod fake;
mod local;
mod ssh;

#[cfg(test)]
pub use executor::MockExecutor;
pub use executor::{CommandOutput, Executor, join_path, parent_path, shell_quote};
pub use local::{LOCAL_RESTART_COMMAND, LocalExecutor};
pub use ssh::{REMOTE_RESTART_COMMAND, SshExecutor};

use tracing::debug;

use crate::config::HostEntry;

/// Returns the executor matching a host's execution mode.
#[must_use]
pub fn executor_for(host: &HostEntry) -> Box<dyn Executor> {
    if host.local {
        debug!(host = host.shortname.as_str(), "Using local execution");
        let executor = host
            .restart_command
            .as_ref()
            .map_or_else(LocalExecutor::new, |command| {
                LocalExecutor::new().with_restart_command(command.clone())
            });
        Box::new(executor)
    } else {
        debug!(host = host.shortname.as_str(), "Using SSH execution");
        Box::new(SshExecutor::for_host(host))
    }
}
