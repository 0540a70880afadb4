//! Pipeline Module
//!
//! Deferred batching of backend commands across connections.
//!
//! ## Lifecycle
//! ```text
//!   attach / hydrate / dispatch        execute
//!   ───────────────────────────▶ Registry ──────▶ one round trip per connection
//!        (queue in memory)        conn#1 ─▶ [cmd, cmd, cmd] ─▶ callbacks, in order
//!                                 conn#2 ─▶ [cmd]           ─▶ callbacks, in order
//! ```
//!
//! A pipeline is an explicit object: build one per logical unit of work,
//! queue into it, execute it. Execution drains it, so it may be reused.
//!
//! ## Failure semantics
//! There is no all-or-nothing guarantee. A failed `execute` can leave some
//! entities and responses populated and others untouched.

mod dispatch;
mod execute;
mod registry;
mod response;

pub use dispatch::Arg;
pub use registry::{ConnectionGroup, Registry};
pub use response::Response;

use crate::backend::{Callback, Entity};
use crate::config::Config;
use crate::error::Result;
use crate::protocol::Command;

/// Accumulates deferred commands and executes them per connection
#[derive(Default)]
pub struct Pipeline {
    config: Config,
    registry: Registry,
}

impl Pipeline {
    /// Create an empty pipeline with the default config
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            registry: Registry::new(),
        }
    }

    /// Queue a load for an entity that isn't initialized yet
    ///
    /// Returns false, queuing nothing, when the entity is already
    /// initialized and `force` is off.
    pub fn attach(&mut self, entity: &dyn Entity, force: bool) -> Result<bool> {
        if !force && entity.initialized() {
            return Ok(false);
        }

        self.registry.obtain_group(entity).prepare(entity)?;
        Ok(true)
    }

    /// Attach every entity, then execute if anything was queued
    ///
    /// All entities are attached before deciding. When none needed
    /// loading, no round trip happens and false is returned.
    pub fn hydrate(&mut self, entities: &[&dyn Entity], force: bool) -> Result<bool> {
        let mut queued = false;
        for entity in entities {
            queued |= self.attach(*entity, force)?;
        }

        if !queued {
            tracing::trace!("Hydration of {} entities needed no round trip", entities.len());
            return Ok(false);
        }

        self.execute()?;
        Ok(true)
    }

    /// Hydrate a single entity
    pub fn hydrate_one(&mut self, entity: &dyn Entity, force: bool) -> Result<bool> {
        self.hydrate(&[entity], force)
    }

    /// Run every pending round trip and deliver results
    pub fn execute(&mut self) -> Result<()> {
        let groups = self.registry.drain();
        execute::execute_groups(groups, &self.config)
    }

    /// Queue a parsed command on the entity's connection
    pub fn queue(&mut self, entity: &dyn Entity, command: Command, callback: Callback) -> Result<()> {
        self.registry.obtain_group(entity).push(command, callback)
    }

    /// Number of connections with pending commands
    pub fn pending_groups(&self) -> usize {
        self.registry.len()
    }

    /// Number of pending commands across all connections
    pub fn pending_commands(&self) -> usize {
        self.registry.pending_commands()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
