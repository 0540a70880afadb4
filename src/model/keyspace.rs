//! Keyspaces
//!
//! Namespace plus routing for a family of entities.

use std::sync::Arc;

use bytes::Bytes;

use crate::backend::Connection;
use crate::cluster::Cluster;

/// Where a keyspace's keys live
#[derive(Clone)]
pub enum Route {
    /// Every key on one connection
    Single(Arc<dyn Connection>),

    /// Keys spread over a cluster by hash tag
    Cluster(Cluster),
}

/// A named family of keys
///
/// Storage keys look like `name{primary_key}`, so the primary key is
/// also the hash tag.
#[derive(Clone)]
pub struct Keyspace {
    name: String,
    route: Route,
    fields: Option<Vec<String>>,
}

impl Keyspace {
    /// Keyspace on a single connection
    pub fn new(name: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        Self {
            name: name.into(),
            route: Route::Single(connection),
            fields: None,
        }
    }

    /// Keyspace spread over a cluster
    pub fn clustered(name: impl Into<String>, cluster: Cluster) -> Self {
        Self {
            name: name.into(),
            route: Route::Cluster(cluster),
            fields: None,
        }
    }

    /// Declare the record fields; loads then fetch exactly these
    pub fn with_fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Declared fields, if any
    pub fn fields(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    pub fn storage_key(&self, primary_key: &str) -> Bytes {
        Bytes::from(format!("{}{{{}}}", self.name, primary_key))
    }

    /// Every connection the keyspace can route to
    pub fn nodes(&self) -> &[Arc<dyn Connection>] {
        match &self.route {
            Route::Single(connection) => std::slice::from_ref(connection),
            Route::Cluster(cluster) => cluster.nodes(),
        }
    }

    /// Connection holding a primary key's data
    pub fn connection_for(&self, primary_key: &str) -> &Arc<dyn Connection> {
        match &self.route {
            Route::Single(connection) => connection,
            Route::Cluster(cluster) => cluster.node_for(&self.storage_key(primary_key)),
        }
    }
}
