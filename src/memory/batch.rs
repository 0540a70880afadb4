//! Pipelined batch for the in-memory backend

use std::sync::Arc;

use crate::backend::BatchHandle;
use crate::error::{PipeError, Result};
use crate::protocol::{Command, Value};

use super::Inner;

/// Commands waiting for one round trip
pub struct MemoryBatch {
    inner: Arc<Inner>,
    commands: Vec<Command>,
    executed: bool,
}

impl MemoryBatch {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self {
            inner,
            commands: Vec::new(),
            executed: false,
        }
    }
}

impl BatchHandle for MemoryBatch {
    fn queue(&mut self, command: Command) -> Result<()> {
        if self.executed {
            return Err(PipeError::BatchConsumed);
        }
        self.commands.push(command);
        Ok(())
    }

    fn len(&self) -> usize {
        self.commands.len()
    }

    fn execute(&mut self) -> Result<Vec<Value>> {
        if self.executed {
            return Err(PipeError::BatchConsumed);
        }
        self.executed = true;
        let commands = std::mem::take(&mut self.commands);
        self.inner.round_trip(&commands)
    }
}
