//! Typed container keys
//!
//! Thin handles over [`KeyRef`] for each backend data type. Every method
//! queues one command on the given pipeline and hands back its
//! [`Response`]; nothing runs until the pipeline executes.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use super::{KeyRef, Keyspace};
use crate::backend::{BatchHandle, Callback, ConnectionId, Entity};
use crate::error::Result;
use crate::pipeline::{Arg, Pipeline, Response};
use crate::protocol::{Kwargs, Value};

/// Default shard count for an [`Index`]
pub const DEFAULT_SHARD_COUNT: u32 = 64;

macro_rules! container {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            inner: KeyRef,
        }

        impl $name {
            pub fn new(keyspace: Arc<Keyspace>, key: impl Into<String>) -> Self {
                Self {
                    inner: KeyRef::new(keyspace, key),
                }
            }

            /// The underlying key, for existence checks and expiry
            pub fn key_ref(&self) -> &KeyRef {
                &self.inner
            }

            pub fn key(&self) -> &str {
                self.inner.key()
            }

            fn call(&self, pipe: &mut Pipeline, command: &str, args: Vec<Value>) -> Result<Response> {
                self.call_with(pipe, command, args, Kwargs::new())
            }

            fn call_with(
                &self,
                pipe: &mut Pipeline,
                command: &str,
                args: Vec<Value>,
                kwargs: Kwargs,
            ) -> Result<Response> {
                let mut dispatch_args = vec![Arg::Entity(self)];
                dispatch_args.extend(args.into_iter().map(Arg::Value));
                pipe.dispatch(command, dispatch_args, kwargs)
            }
        }

        impl Entity for $name {
            fn connection(&self) -> ConnectionId {
                self.inner.connection()
            }

            fn new_batch(&self) -> Box<dyn BatchHandle> {
                self.inner.new_batch()
            }

            fn prepare_load(&self, batch: &mut dyn BatchHandle) -> Result<Callback> {
                self.inner.prepare_load(batch)
            }

            fn storage_key(&self, primary_key: &str) -> Bytes {
                self.inner.storage_key(primary_key)
            }

            fn primary_key(&self) -> String {
                self.inner.primary_key()
            }

            fn initialized(&self) -> bool {
                self.inner.initialized()
            }
        }
    };
}

fn values<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Vec<Value> {
    items.into_iter().map(Into::into).collect()
}

fn scores(with_scores: bool) -> Kwargs {
    if with_scores {
        Kwargs::new().with("withscores", 1)
    } else {
        Kwargs::new()
    }
}

// =============================================================================
// Strings
// =============================================================================

container!(
    /// A string value
    StringKey
);

impl StringKey {
    pub fn get(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "get", Vec::new())
    }

    /// Set the value, optionally expiring after `expire_secs`
    pub fn set(&self, pipe: &mut Pipeline, value: impl Into<Value>, expire_secs: Option<u64>) -> Result<Response> {
        let kwargs = match expire_secs {
            Some(secs) => Kwargs::new().with("ex", secs as i64),
            None => Kwargs::new(),
        };
        self.call_with(pipe, "set", vec![value.into()], kwargs)
    }

    pub fn incr(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "incr", Vec::new())
    }

    pub fn incrby(&self, pipe: &mut Pipeline, delta: i64) -> Result<Response> {
        self.call(pipe, "incrby", vec![Value::Int(delta)])
    }

    pub fn incrbyfloat(&self, pipe: &mut Pipeline, delta: f64) -> Result<Response> {
        self.call(pipe, "incrbyfloat", vec![Value::from(delta)])
    }
}

// =============================================================================
// Sets
// =============================================================================

container!(
    /// An unordered set of members
    SetKey
);

impl SetKey {
    pub fn sadd<M: Into<Value>>(&self, pipe: &mut Pipeline, members: impl IntoIterator<Item = M>) -> Result<Response> {
        self.call(pipe, "sadd", values(members))
    }

    pub fn srem<M: Into<Value>>(&self, pipe: &mut Pipeline, members: impl IntoIterator<Item = M>) -> Result<Response> {
        self.call(pipe, "srem", values(members))
    }

    pub fn spop(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "spop", Vec::new())
    }

    pub fn scard(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "scard", Vec::new())
    }

    pub fn sismember(&self, pipe: &mut Pipeline, member: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "sismember", vec![member.into()])
    }

    pub fn srandmember(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "srandmember", Vec::new())
    }

    /// Every member
    pub fn all(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "smembers", Vec::new())
    }
}

// =============================================================================
// Lists
// =============================================================================

container!(
    /// A list of values
    ListKey
);

impl ListKey {
    pub fn lpush<V: Into<Value>>(&self, pipe: &mut Pipeline, items: impl IntoIterator<Item = V>) -> Result<Response> {
        self.call(pipe, "lpush", values(items))
    }

    pub fn rpush<V: Into<Value>>(&self, pipe: &mut Pipeline, items: impl IntoIterator<Item = V>) -> Result<Response> {
        self.call(pipe, "rpush", values(items))
    }

    pub fn lpop(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "lpop", Vec::new())
    }

    pub fn rpop(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "rpop", Vec::new())
    }

    pub fn llen(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "llen", Vec::new())
    }

    pub fn lrange(&self, pipe: &mut Pipeline, start: i64, stop: i64) -> Result<Response> {
        self.call(pipe, "lrange", vec![Value::Int(start), Value::Int(stop)])
    }

    pub fn lindex(&self, pipe: &mut Pipeline, index: i64) -> Result<Response> {
        self.call(pipe, "lindex", vec![Value::Int(index)])
    }

    pub fn lset(&self, pipe: &mut Pipeline, index: i64, value: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "lset", vec![Value::Int(index), value.into()])
    }

    /// Remove `count` copies of `value`; see [`crate::Command::LRem`]
    pub fn lrem(&self, pipe: &mut Pipeline, count: i64, value: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "lrem", vec![Value::Int(count), value.into()])
    }

    pub fn ltrim(&self, pipe: &mut Pipeline, start: i64, stop: i64) -> Result<Response> {
        self.call(pipe, "ltrim", vec![Value::Int(start), Value::Int(stop)])
    }

    /// Every item, head first
    pub fn all(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.lrange(pipe, 0, -1)
    }
}

// =============================================================================
// Sorted sets
// =============================================================================

container!(
    /// Members ordered by score
    ///
    /// Score bounds accept numbers, `-inf`/`+inf` and `(x` for an
    /// exclusive bound.
    SortedSetKey
);

impl SortedSetKey {
    /// Add or update members with their scores
    pub fn zadd<M: Into<Value>>(
        &self,
        pipe: &mut Pipeline,
        entries: impl IntoIterator<Item = (M, f64)>,
    ) -> Result<Response> {
        let mut args = Vec::new();
        for (member, score) in entries {
            args.push(Value::from(score));
            args.push(member.into());
        }
        self.call(pipe, "zadd", args)
    }

    pub fn zrem<M: Into<Value>>(&self, pipe: &mut Pipeline, members: impl IntoIterator<Item = M>) -> Result<Response> {
        self.call(pipe, "zrem", values(members))
    }

    pub fn zincrby(&self, pipe: &mut Pipeline, member: impl Into<Value>, delta: f64) -> Result<Response> {
        self.call(pipe, "zincrby", vec![Value::from(delta), member.into()])
    }

    pub fn zcard(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "zcard", Vec::new())
    }

    pub fn zscore(&self, pipe: &mut Pipeline, member: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "zscore", vec![member.into()])
    }

    pub fn zrank(&self, pipe: &mut Pipeline, member: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "zrank", vec![member.into()])
    }

    pub fn zrevrank(&self, pipe: &mut Pipeline, member: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "zrevrank", vec![member.into()])
    }

    pub fn zrange(&self, pipe: &mut Pipeline, start: i64, stop: i64, with_scores: bool) -> Result<Response> {
        self.call_with(pipe, "zrange", vec![Value::Int(start), Value::Int(stop)], scores(with_scores))
    }

    pub fn zrevrange(&self, pipe: &mut Pipeline, start: i64, stop: i64, with_scores: bool) -> Result<Response> {
        self.call_with(pipe, "zrevrange", vec![Value::Int(start), Value::Int(stop)], scores(with_scores))
    }

    /// Members scored between `min` and `max`; `limit` is (offset, count)
    pub fn zrangebyscore(
        &self,
        pipe: &mut Pipeline,
        min: impl Into<Value>,
        max: impl Into<Value>,
        with_scores: bool,
        limit: Option<(usize, usize)>,
    ) -> Result<Response> {
        let kwargs = with_limit(scores(with_scores), limit);
        self.call_with(pipe, "zrangebyscore", vec![min.into(), max.into()], kwargs)
    }

    /// Like [`Self::zrangebyscore`] from the top; `max` comes first
    pub fn zrevrangebyscore(
        &self,
        pipe: &mut Pipeline,
        max: impl Into<Value>,
        min: impl Into<Value>,
        with_scores: bool,
        limit: Option<(usize, usize)>,
    ) -> Result<Response> {
        let kwargs = with_limit(scores(with_scores), limit);
        self.call_with(pipe, "zrevrangebyscore", vec![max.into(), min.into()], kwargs)
    }

    pub fn zremrangebyrank(&self, pipe: &mut Pipeline, start: i64, stop: i64) -> Result<Response> {
        self.call(pipe, "zremrangebyrank", vec![Value::Int(start), Value::Int(stop)])
    }

    pub fn zremrangebyscore(&self, pipe: &mut Pipeline, min: impl Into<Value>, max: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "zremrangebyscore", vec![min.into(), max.into()])
    }
}

fn with_limit(kwargs: Kwargs, limit: Option<(usize, usize)>) -> Kwargs {
    match limit {
        Some((start, num)) => kwargs.with("start", start).with("num", num),
        None => kwargs,
    }
}

// =============================================================================
// Hashes
// =============================================================================

container!(
    /// A field/value map
    HashKey
);

impl HashKey {
    pub fn hlen(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "hlen", Vec::new())
    }

    pub fn hset(&self, pipe: &mut Pipeline, field: impl Into<Value>, value: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "hset", vec![field.into(), value.into()])
    }

    /// Set only if the field is absent
    pub fn hsetnx(&self, pipe: &mut Pipeline, field: impl Into<Value>, value: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "hsetnx", vec![field.into(), value.into()])
    }

    pub fn hdel<F: Into<Value>>(&self, pipe: &mut Pipeline, fields: impl IntoIterator<Item = F>) -> Result<Response> {
        self.call(pipe, "hdel", values(fields))
    }

    pub fn hkeys(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "hkeys", Vec::new())
    }

    pub fn hvals(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "hvals", Vec::new())
    }

    pub fn hgetall(&self, pipe: &mut Pipeline) -> Result<Response> {
        self.call(pipe, "hgetall", Vec::new())
    }

    pub fn hget(&self, pipe: &mut Pipeline, field: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "hget", vec![field.into()])
    }

    pub fn hexists(&self, pipe: &mut Pipeline, field: impl Into<Value>) -> Result<Response> {
        self.call(pipe, "hexists", vec![field.into()])
    }

    pub fn hincrby(&self, pipe: &mut Pipeline, field: impl Into<Value>, delta: i64) -> Result<Response> {
        self.call(pipe, "hincrby", vec![field.into(), Value::Int(delta)])
    }

    pub fn hmget<F: Into<Value>>(&self, pipe: &mut Pipeline, fields: impl IntoIterator<Item = F>) -> Result<Response> {
        self.call(pipe, "hmget", values(fields))
    }

    pub fn hmset<K, V>(&self, pipe: &mut Pipeline, pairs: impl IntoIterator<Item = (K, V)>) -> Result<Response>
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        let mut args = Vec::new();
        for (field, value) in pairs {
            args.push(field.into());
            args.push(value.into());
        }
        self.call(pipe, "hmset", args)
    }
}

// =============================================================================
// Sharded index
// =============================================================================

/// A large string-to-string map spread over several hashes
///
/// Each key lives as a field of the shard hash `keyspace{n}`, where `n`
/// is the key's CRC32 modulo the shard count.
#[derive(Clone)]
pub struct Index {
    keyspace: Arc<Keyspace>,
    shard_count: u32,
}

impl Index {
    pub fn new(keyspace: Arc<Keyspace>) -> Self {
        Self {
            keyspace,
            shard_count: DEFAULT_SHARD_COUNT,
        }
    }

    /// Override the shard count; never lower than 1
    pub fn with_shard_count(mut self, shard_count: u32) -> Self {
        self.shard_count = shard_count.max(1);
        self
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// The hash holding `key`
    pub fn shard(&self, key: &str) -> HashKey {
        let shard = crc32fast::hash(key.as_bytes()) % self.shard_count;
        HashKey::new(Arc::clone(&self.keyspace), shard.to_string())
    }

    pub fn get(&self, pipe: &mut Pipeline, key: &str) -> Result<Response> {
        self.shard(key).hget(pipe, key)
    }

    /// Queue a lookup per key
    pub fn mget<S: AsRef<str>>(&self, pipe: &mut Pipeline, keys: &[S]) -> Result<Vec<(String, Response)>> {
        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                Ok((key.to_string(), self.get(pipe, key)?))
            })
            .collect()
    }

    /// Look up keys in a pipeline of its own; missing keys are left out
    pub fn fetch<S: AsRef<str>>(&self, keys: &[S]) -> Result<BTreeMap<String, Bytes>> {
        let mut pipe = Pipeline::new();
        let pending = self.mget(&mut pipe, keys)?;
        pipe.execute()?;

        Ok(pending
            .into_iter()
            .filter_map(|(key, response)| response.data().and_then(Value::as_bytes).map(|value| (key, value)))
            .collect())
    }

    pub fn remove(&self, pipe: &mut Pipeline, key: &str) -> Result<Response> {
        self.shard(key).hdel(pipe, [key])
    }

    /// Set only if the key is absent
    pub fn setnx(&self, pipe: &mut Pipeline, key: &str, value: impl Into<Value>) -> Result<Response> {
        self.shard(key).hsetnx(pipe, key, value)
    }

    pub fn set(&self, pipe: &mut Pipeline, key: &str, value: impl Into<Value>) -> Result<Response> {
        self.shard(key).hset(pipe, key, value)
    }
}
