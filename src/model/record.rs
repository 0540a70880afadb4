//! Hash-backed records
//!
//! A record is one hash per primary key. Field values are kept as raw
//! bytes; typed accessors convert on read.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use super::Keyspace;
use crate::backend::{BatchHandle, Callback, ConnectionId, Entity};
use crate::error::{PipeError, Result};
use crate::pipeline::Pipeline;
use crate::protocol::{Command, Value};

#[derive(Debug, Default)]
struct RecordState {
    data: BTreeMap<String, Bytes>,

    /// Fields changed since the last save or load
    dirty: BTreeSet<String>,

    /// Data is present in memory (created locally or loaded)
    initialized: bool,

    /// Created locally and never saved
    new: bool,
}

/// A hash stored under `keyspace{primary_key}`
///
/// Clones share state, so a clone handed to a pipeline sees the load.
#[derive(Clone)]
pub struct Record {
    keyspace: Arc<Keyspace>,
    primary_key: String,
    state: Arc<RwLock<RecordState>>,
}

impl Record {
    /// A fresh, unsaved record
    pub fn new(keyspace: Arc<Keyspace>, primary_key: impl Into<String>) -> Self {
        Self::with_state(
            keyspace,
            primary_key.into(),
            RecordState {
                initialized: true,
                new: true,
                ..RecordState::default()
            },
        )
    }

    /// A reference to a stored record, not loaded yet
    pub fn reference(keyspace: Arc<Keyspace>, primary_key: impl Into<String>) -> Self {
        Self::with_state(keyspace, primary_key.into(), RecordState::default())
    }

    fn with_state(keyspace: Arc<Keyspace>, primary_key: String, state: RecordState) -> Self {
        Self {
            keyspace,
            primary_key,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Fetch records by primary key in one hydration
    ///
    /// Records that don't exist are left out; order follows `ids`.
    pub fn get<S: AsRef<str>>(keyspace: &Arc<Keyspace>, ids: &[S]) -> Result<Vec<Record>> {
        let records: Vec<Record> = ids
            .iter()
            .map(|id| Record::reference(Arc::clone(keyspace), id.as_ref()))
            .collect();

        let entities: Vec<&dyn Entity> = records.iter().map(|r| r as &dyn Entity).collect();
        Pipeline::new().hydrate(&entities, false)?;

        Ok(records.into_iter().filter(Record::exists).collect())
    }

    /// Fetch a single record
    pub fn get_one(keyspace: &Arc<Keyspace>, id: &str) -> Result<Option<Record>> {
        Ok(Self::get(keyspace, &[id])?.into_iter().next())
    }

    pub fn keyspace(&self) -> &Arc<Keyspace> {
        &self.keyspace
    }

    /// Stored, loaded and not new
    pub fn exists(&self) -> bool {
        let state = self.state.read();
        state.initialized && !state.new && !state.data.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.read().initialized
    }

    pub fn is_new(&self) -> bool {
        self.state.read().new
    }

    // =========================================================================
    // Field access
    // =========================================================================

    /// Set a field; declared keyspaces reject unknown fields
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        self.check_field(field)?;
        let value: Value = value.into();
        let value = value.to_arg()?;
        let mut state = self.state.write();
        state.data.insert(field.to_string(), value);
        state.dirty.insert(field.to_string());
        Ok(())
    }

    /// Clear a field; the next save deletes it
    pub fn remove(&self, field: &str) -> Result<()> {
        self.check_field(field)?;
        let mut state = self.state.write();
        state.data.remove(field);
        state.dirty.insert(field.to_string());
        Ok(())
    }

    pub fn get_raw(&self, field: &str) -> Option<Bytes> {
        self.state.read().data.get(field).cloned()
    }

    pub fn get_str(&self, field: &str) -> Result<Option<String>> {
        self.get_raw(field)
            .map(|raw| {
                String::from_utf8(raw.to_vec())
                    .map_err(|_| PipeError::Conversion(format!("field '{}' is not UTF-8", field)))
            })
            .transpose()
    }

    pub fn get_int(&self, field: &str) -> Result<Option<i64>> {
        self.get_str(field)?
            .map(|text| {
                text.parse::<i64>()
                    .map_err(|_| PipeError::Conversion(format!("field '{}' is not an integer: {}", field, text)))
            })
            .transpose()
    }

    /// Copy of all field data
    pub fn fields(&self) -> BTreeMap<String, Bytes> {
        self.state.read().data.clone()
    }

    fn check_field(&self, field: &str) -> Result<()> {
        match self.keyspace.fields() {
            Some(declared) if !declared.iter().any(|f| f == field) => Err(PipeError::InvalidArgument(
                format!("unknown field '{}' in {}", field, self.keyspace.name()),
            )),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Queue the changed fields; `full` writes every field
    ///
    /// Returns the number of changed fields. Fields stop counting as
    /// changed, and the record as new, only once the write has executed;
    /// a failed execution leaves them for the next save.
    pub fn save(&self, pipe: &mut Pipeline, full: bool) -> Result<usize> {
        if self.primary_key.is_empty() {
            return Err(PipeError::MissingPrimaryKey);
        }

        let (add, remove) = {
            let state = self.state.read();
            let candidates: Vec<String> = if full {
                let mut all: BTreeSet<String> = state.data.keys().cloned().collect();
                all.extend(state.dirty.iter().cloned());
                all.into_iter().collect()
            } else {
                state.dirty.iter().cloned().collect()
            };

            let mut add = Vec::new();
            let mut remove = Vec::new();
            for field in candidates {
                match state.data.get(&field) {
                    Some(value) => add.push((field, value.clone())),
                    None => remove.push(field),
                }
            }
            (add, remove)
        };

        let changes = add.len() + remove.len();
        if changes == 0 {
            return Ok(0);
        }

        let key = self.storage_key(&self.primary_key);
        if !add.is_empty() {
            let command = Command::HMSet {
                key: key.clone(),
                pairs: add
                    .iter()
                    .map(|(field, value)| (Bytes::from(field.clone()), value.clone()))
                    .collect(),
            };
            let state = Arc::clone(&self.state);
            pipe.queue(
                self,
                command,
                Box::new(move |raw: Value| {
                    if let Value::Error(message) = raw {
                        return Err(PipeError::Backend(message));
                    }
                    let mut state = state.write();
                    for (field, value) in &add {
                        // A newer local edit stays dirty
                        if state.data.get(field) == Some(value) {
                            state.dirty.remove(field);
                        }
                    }
                    state.new = false;
                    Ok(())
                }),
            )?;
        }
        if !remove.is_empty() {
            let command = Command::HDel {
                key,
                fields: remove.iter().map(|field| Bytes::from(field.clone())).collect(),
            };
            let state = Arc::clone(&self.state);
            pipe.queue(
                self,
                command,
                Box::new(move |raw: Value| {
                    if let Value::Error(message) = raw {
                        return Err(PipeError::Backend(message));
                    }
                    let mut state = state.write();
                    for field in &remove {
                        if !state.data.contains_key(field) {
                            state.dirty.remove(field);
                        }
                    }
                    state.new = false;
                    Ok(())
                }),
            )?;
        }

        tracing::trace!("Queued {} changes for {}", changes, self.primary_key);
        Ok(changes)
    }

    /// Queue field changes for a stored record without loading it
    ///
    /// `None` deletes the field. Returns the number of fields touched.
    pub fn patch<S, V>(
        keyspace: &Arc<Keyspace>,
        primary_key: &str,
        pipe: &mut Pipeline,
        changes: impl IntoIterator<Item = (S, Option<V>)>,
    ) -> Result<usize>
    where
        S: Into<String>,
        V: Into<Value>,
    {
        if primary_key.is_empty() {
            return Err(PipeError::MissingPrimaryKey);
        }
        let record = Record::reference(Arc::clone(keyspace), primary_key);

        let mut add = Vec::new();
        let mut remove = Vec::new();
        for (field, value) in changes {
            let field = field.into();
            record.check_field(&field)?;
            match value {
                Some(value) => add.push((field, value.into())),
                None => remove.push(field),
            }
        }

        if !add.is_empty() {
            pipe.hmset(&record, add.iter().map(|(f, v)| (f.as_str(), v.clone())))?;
        }
        if !remove.is_empty() {
            pipe.hdel(&record, remove.iter().map(String::as_str))?;
        }
        Ok(add.len() + remove.len())
    }

    /// Primary keys of every record stored in the keyspace
    ///
    /// Scans each node once; the result is sorted.
    pub fn ids(keyspace: &Keyspace) -> Result<Vec<String>> {
        let prefix = format!("{}{{", keyspace.name());
        let mut ids = Vec::new();
        for node in keyspace.nodes() {
            let mut batch = node.pipeline();
            batch.queue(Command::Keys {
                pattern: Bytes::from(format!("{}*}}", prefix)),
            })?;
            for result in batch.execute()? {
                let keys = match result {
                    Value::Error(message) => return Err(PipeError::Backend(message)),
                    other => other.into_array().unwrap_or_default(),
                };
                for key in keys {
                    let id = key
                        .as_str()
                        .and_then(|key| key.strip_prefix(prefix.as_str()))
                        .and_then(|rest| rest.strip_suffix('}'));
                    if let Some(id) = id {
                        ids.push(id.to_string());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Save through a pipeline of its own and execute it
    pub fn save_now(&self) -> Result<usize> {
        let mut pipe = Pipeline::new();
        let changes = self.save(&mut pipe, false)?;
        pipe.execute()?;
        Ok(changes)
    }

    /// Queue removal of the whole record
    pub fn delete(&self, pipe: &mut Pipeline) -> Result<()> {
        pipe.del(self)?;
        let mut state = self.state.write();
        state.data.clear();
        state.dirty.clear();
        Ok(())
    }

    /// Populate from a raw HGETALL / HMGET result
    ///
    /// An empty or all-nil result means the record isn't stored; the
    /// record then stays as it was.
    pub fn load(&self, raw: Value) -> Result<()> {
        let data = decode(raw, self.keyspace.fields())?;
        if let Some(data) = data {
            let mut state = self.state.write();
            state.data = data;
            state.dirty.clear();
            state.initialized = true;
            state.new = false;
        }
        Ok(())
    }
}

fn decode(raw: Value, fields: Option<&[String]>) -> Result<Option<BTreeMap<String, Bytes>>> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Nil => return Ok(None),
        Value::Error(message) => return Err(PipeError::Backend(message)),
        other => {
            return Err(PipeError::Conversion(format!(
                "expected an array for a record, got {:?}",
                other
            )))
        }
    };

    if items.iter().all(Value::is_nil) {
        return Ok(None);
    }

    let mut data = BTreeMap::new();
    match fields {
        Some(fields) => {
            if items.len() != fields.len() {
                return Err(PipeError::Conversion(format!(
                    "expected {} fields, got {}",
                    fields.len(),
                    items.len()
                )));
            }
            for (field, item) in fields.iter().zip(items) {
                if let Some(value) = scalar(item)? {
                    data.insert(field.clone(), value);
                }
            }
        }
        None => {
            if items.len() % 2 != 0 {
                return Err(PipeError::Conversion("odd number of hash items".to_string()));
            }
            let mut iter = items.into_iter();
            while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
                let field = field
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| PipeError::Conversion("hash field is not UTF-8".to_string()))?;
                if let Some(value) = scalar(value)? {
                    data.insert(field, value);
                }
            }
        }
    }
    Ok(Some(data))
}

fn scalar(item: Value) -> Result<Option<Bytes>> {
    match item {
        Value::Nil => Ok(None),
        other => other
            .as_bytes()
            .map(Some)
            .ok_or_else(|| PipeError::Conversion(format!("expected a scalar, got {:?}", other))),
    }
}

impl Entity for Record {
    fn connection(&self) -> ConnectionId {
        self.keyspace.connection_for(&self.primary_key).id()
    }

    fn new_batch(&self) -> Box<dyn BatchHandle> {
        self.keyspace.connection_for(&self.primary_key).pipeline()
    }

    fn prepare_load(&self, batch: &mut dyn BatchHandle) -> Result<Callback> {
        let key = self.storage_key(&self.primary_key);
        let command = match self.keyspace.fields() {
            Some(fields) => Command::HMGet {
                key,
                fields: fields.iter().map(|f| Bytes::from(f.clone())).collect(),
            },
            None => Command::HGetAll { key },
        };
        batch.queue(command)?;

        let record = self.clone();
        Ok(Box::new(move |raw: Value| record.load(raw)))
    }

    fn storage_key(&self, primary_key: &str) -> Bytes {
        self.keyspace.storage_key(primary_key)
    }

    fn primary_key(&self) -> String {
        self.primary_key.clone()
    }

    fn initialized(&self) -> bool {
        self.is_initialized()
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("keyspace", &self.keyspace.name())
            .field("primary_key", &self.primary_key)
            .field("data", &self.state.read().data)
            .finish()
    }
}
