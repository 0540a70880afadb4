//! Generic command dispatch
//!
//! Any command can be queued against an entity. The acting entity sits
//! at argument 0, except for `eval` where the script text and key count
//! come first and it sits at 2. That argument is replaced by the
//! entity's storage key; everything else is forwarded untouched.
//! Names the protocol does not know travel as raw commands.

use crate::backend::Entity;
use crate::error::{PipeError, Result};
use crate::protocol::{key_position, Command, Kwargs, Value};

use super::{Pipeline, Response};

/// A positional argument to a dispatched command
pub enum Arg<'a> {
    /// The acting entity, resolved to its storage key when queued
    Entity(&'a dyn Entity),

    /// Any other argument
    Value(Value),
}

impl<'a> Arg<'a> {
    pub fn value(value: impl Into<Value>) -> Self {
        Arg::Value(value.into())
    }
}

impl From<Value> for Arg<'_> {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl Pipeline {
    /// Queue any named command and get a placeholder for its result
    ///
    /// The placeholder is unset until `execute` (or a `hydrate` that
    /// executes) returns.
    pub fn dispatch(&mut self, command: &str, args: Vec<Arg<'_>>, kwargs: Kwargs) -> Result<Response> {
        let position = key_position(command).ok_or_else(|| {
            PipeError::InvalidArgument(format!("'{}' does not act on an entity", command))
        })?;

        let entity = match args.get(position) {
            Some(Arg::Entity(entity)) => *entity,
            _ => {
                return Err(PipeError::InvalidArgument(format!(
                    "argument {} of '{}' must be an entity",
                    position, command
                )))
            }
        };

        let primary_key = entity.primary_key();
        let storage_key = entity.storage_key(&primary_key);

        let values = args
            .into_iter()
            .enumerate()
            .map(|(index, arg)| match arg {
                Arg::Value(value) => Ok(value),
                Arg::Entity(_) if index == position => Ok(Value::Bytes(storage_key.clone())),
                Arg::Entity(_) => Err(PipeError::InvalidArgument(format!(
                    "argument {} of '{}' is an entity; only argument {} may be",
                    index, command, position
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let parsed = Command::parse(command, values, &kwargs)?;
        let response = Response::new(primary_key);
        self.queue(entity, parsed, response.settler())?;
        Ok(response)
    }

    // =========================================================================
    // Named pass-throughs
    // =========================================================================

    pub fn get(&mut self, entity: &dyn Entity) -> Result<Response> {
        self.dispatch("get", vec![Arg::Entity(entity)], Kwargs::new())
    }

    pub fn set(&mut self, entity: &dyn Entity, value: impl Into<Value>) -> Result<Response> {
        self.dispatch("set", vec![Arg::Entity(entity), Arg::value(value)], Kwargs::new())
    }

    pub fn del(&mut self, entity: &dyn Entity) -> Result<Response> {
        self.dispatch("del", vec![Arg::Entity(entity)], Kwargs::new())
    }

    pub fn exists(&mut self, entity: &dyn Entity) -> Result<Response> {
        self.dispatch("exists", vec![Arg::Entity(entity)], Kwargs::new())
    }

    pub fn expire(&mut self, entity: &dyn Entity, seconds: u64) -> Result<Response> {
        self.dispatch(
            "expire",
            vec![Arg::Entity(entity), Arg::value(seconds as i64)],
            Kwargs::new(),
        )
    }

    pub fn incr(&mut self, entity: &dyn Entity) -> Result<Response> {
        self.dispatch("incr", vec![Arg::Entity(entity)], Kwargs::new())
    }

    pub fn hget(&mut self, entity: &dyn Entity, field: impl Into<Value>) -> Result<Response> {
        self.dispatch("hget", vec![Arg::Entity(entity), Arg::value(field)], Kwargs::new())
    }

    pub fn hset(
        &mut self,
        entity: &dyn Entity,
        field: impl Into<Value>,
        value: impl Into<Value>,
    ) -> Result<Response> {
        self.dispatch(
            "hset",
            vec![Arg::Entity(entity), Arg::value(field), Arg::value(value)],
            Kwargs::new(),
        )
    }

    /// Set several hash fields at once
    pub fn hmset<K, V>(&mut self, entity: &dyn Entity, pairs: impl IntoIterator<Item = (K, V)>) -> Result<Response>
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        let mut args = vec![Arg::Entity(entity)];
        for (field, value) in pairs {
            args.push(Arg::value(field));
            args.push(Arg::value(value));
        }
        self.dispatch("hmset", args, Kwargs::new())
    }

    pub fn hmget<F: Into<Value>>(
        &mut self,
        entity: &dyn Entity,
        fields: impl IntoIterator<Item = F>,
    ) -> Result<Response> {
        let mut args = vec![Arg::Entity(entity)];
        args.extend(fields.into_iter().map(Arg::value));
        self.dispatch("hmget", args, Kwargs::new())
    }

    pub fn hgetall(&mut self, entity: &dyn Entity) -> Result<Response> {
        self.dispatch("hgetall", vec![Arg::Entity(entity)], Kwargs::new())
    }

    pub fn hdel<F: Into<Value>>(
        &mut self,
        entity: &dyn Entity,
        fields: impl IntoIterator<Item = F>,
    ) -> Result<Response> {
        let mut args = vec![Arg::Entity(entity)];
        args.extend(fields.into_iter().map(Arg::value));
        self.dispatch("hdel", args, Kwargs::new())
    }

    pub fn hincrby(&mut self, entity: &dyn Entity, field: impl Into<Value>, delta: i64) -> Result<Response> {
        self.dispatch(
            "hincrby",
            vec![Arg::Entity(entity), Arg::value(field), Arg::value(delta)],
            Kwargs::new(),
        )
    }

    pub fn sadd<M: Into<Value>>(
        &mut self,
        entity: &dyn Entity,
        members: impl IntoIterator<Item = M>,
    ) -> Result<Response> {
        let mut args = vec![Arg::Entity(entity)];
        args.extend(members.into_iter().map(Arg::value));
        self.dispatch("sadd", args, Kwargs::new())
    }

    pub fn smembers(&mut self, entity: &dyn Entity) -> Result<Response> {
        self.dispatch("smembers", vec![Arg::Entity(entity)], Kwargs::new())
    }

    pub fn zadd(&mut self, entity: &dyn Entity, score: f64, member: impl Into<Value>) -> Result<Response> {
        self.dispatch(
            "zadd",
            vec![Arg::Entity(entity), Arg::value(score), Arg::value(member)],
            Kwargs::new(),
        )
    }

    pub fn zrange(&mut self, entity: &dyn Entity, start: i64, stop: i64, with_scores: bool) -> Result<Response> {
        let kwargs = if with_scores {
            Kwargs::new().with("withscores", 1)
        } else {
            Kwargs::new()
        };
        self.dispatch(
            "zrange",
            vec![Arg::Entity(entity), Arg::value(start), Arg::value(stop)],
            kwargs,
        )
    }

    pub fn lpush<V: Into<Value>>(
        &mut self,
        entity: &dyn Entity,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Response> {
        let mut args = vec![Arg::Entity(entity)];
        args.extend(values.into_iter().map(Arg::value));
        self.dispatch("lpush", args, Kwargs::new())
    }

    pub fn rpush<V: Into<Value>>(
        &mut self,
        entity: &dyn Entity,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Response> {
        let mut args = vec![Arg::Entity(entity)];
        args.extend(values.into_iter().map(Arg::value));
        self.dispatch("rpush", args, Kwargs::new())
    }

    pub fn lrange(&mut self, entity: &dyn Entity, start: i64, stop: i64) -> Result<Response> {
        self.dispatch(
            "lrange",
            vec![Arg::Entity(entity), Arg::value(start), Arg::value(stop)],
            Kwargs::new(),
        )
    }

    /// Run a script with the entity as its single key
    pub fn eval(&mut self, script: &str, entity: &dyn Entity, args: Vec<Value>) -> Result<Response> {
        let mut dispatch_args = vec![Arg::value(script), Arg::value(1), Arg::Entity(entity)];
        dispatch_args.extend(args.into_iter().map(Arg::Value));
        self.dispatch("eval", dispatch_args, Kwargs::new())
    }
}
