//! Execution engine
//!
//! Runs every drained connection group's round trip.
//!
//! ## Scheduling
//! - Below `parallel_threshold` groups: inline, in the caller's thread.
//! - Otherwise: one scoped worker thread per group, all joined before
//!   returning.
//!
//! ## Failures
//! Every group runs to completion or failure on its own. Each outcome is
//! kept in the slot of its group's registration index; afterwards the
//! first failure in registration order is returned, tagged with its
//! connection. Later failures are logged and dropped. Worker backtraces
//! do not cross the thread boundary.

use crate::backend::ConnectionId;
use crate::config::Config;
use crate::error::{PipeError, Result};

use super::registry::ConnectionGroup;

/// Execute the given groups
pub(crate) fn execute_groups(groups: Vec<ConnectionGroup>, config: &Config) -> Result<()> {
    if groups.is_empty() {
        return Ok(());
    }

    let connections: Vec<ConnectionId> = groups.iter().map(ConnectionGroup::connection).collect();

    let outcomes = if groups.len() < config.parallel_threshold.max(2) {
        tracing::debug!("Executing {} group(s) inline", groups.len());
        groups.into_iter().map(ConnectionGroup::run).collect()
    } else {
        tracing::debug!("Executing {} groups concurrently", groups.len());
        run_concurrent(groups, &connections, config)?
    };

    first_failure(&connections, outcomes)
}

/// One worker per group; outcome slots follow registration order
fn run_concurrent(
    groups: Vec<ConnectionGroup>,
    connections: &[ConnectionId],
    config: &Config,
) -> Result<Vec<Result<usize>>> {
    crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = groups
            .into_iter()
            .enumerate()
            .map(|(index, group)| {
                let mut builder = scope
                    .builder()
                    .name(format!("{}-{}", config.worker_name_prefix, index));
                if let Some(size) = config.worker_stack_size {
                    builder = builder.stack_size(size);
                }
                builder.spawn(move |_| group.run())
            })
            .collect();

        handles
            .into_iter()
            .zip(connections)
            .map(|(handle, &connection)| match handle {
                Ok(handle) => handle
                    .join()
                    .unwrap_or_else(|_| Err(PipeError::WorkerPanicked { connection })),
                Err(e) => Err(PipeError::Backend(format!("failed to spawn worker: {}", e))),
            })
            .collect()
    })
    .map_err(|_| PipeError::Backend("execution scope panicked".to_string()))
}

fn first_failure(connections: &[ConnectionId], outcomes: Vec<Result<usize>>) -> Result<()> {
    let mut first: Option<PipeError> = None;

    for (&connection, outcome) in connections.iter().zip(outcomes) {
        match outcome {
            Ok(delivered) => {
                tracing::debug!("Delivered {} results on {}", delivered, connection);
            }
            Err(e) => {
                let e = tag(connection, e);
                if first.is_none() {
                    tracing::debug!("Execution failed on {}: {}", connection, e);
                    first = Some(e);
                } else {
                    tracing::warn!("Dropping failure on {}: {}", connection, e);
                }
            }
        }
    }

    match first {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn tag(connection: ConnectionId, error: PipeError) -> PipeError {
    match error {
        tagged @ PipeError::WorkerPanicked { .. } => tagged,
        tagged @ PipeError::Execution { .. } => tagged,
        source => PipeError::Execution {
            connection,
            source: Box::new(source),
        },
    }
}
