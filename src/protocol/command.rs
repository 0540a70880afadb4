//! Command definitions
//!
//! Turns a command name plus loosely-typed arguments into a checked command.
//! Names outside the table are not rejected: they become [`Command::Raw`]
//! and the backend decides whether it supports them.

use bytes::Bytes;

use super::Value;
use crate::error::{PipeError, Result};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Ping,
    Keys,
    Get,
    Set,
    Del,
    Exists,
    Expire,
    Incr,
    IncrBy,
    IncrByFloat,
    HGet,
    HSet,
    HSetNx,
    HMSet,
    HMGet,
    HGetAll,
    HDel,
    HExists,
    HIncrBy,
    HLen,
    HKeys,
    HVals,
    SAdd,
    SRem,
    SPop,
    SCard,
    SMembers,
    SIsMember,
    SRandMember,
    ZAdd,
    ZRem,
    ZIncrBy,
    ZRange,
    ZRevRange,
    ZRangeByScore,
    ZRevRangeByScore,
    ZCard,
    ZScore,
    ZRank,
    ZRevRank,
    ZRemRangeByRank,
    ZRemRangeByScore,
    LPush,
    RPush,
    LPop,
    RPop,
    LRange,
    LLen,
    LIndex,
    LSet,
    LRem,
    LTrim,
    Eval,
}

/// Name table, lowercase
const COMMAND_TABLE: &[(&str, CommandType)] = &[
    ("ping", CommandType::Ping),
    ("keys", CommandType::Keys),
    ("get", CommandType::Get),
    ("set", CommandType::Set),
    ("del", CommandType::Del),
    ("exists", CommandType::Exists),
    ("expire", CommandType::Expire),
    ("incr", CommandType::Incr),
    ("incrby", CommandType::IncrBy),
    ("incrbyfloat", CommandType::IncrByFloat),
    ("hget", CommandType::HGet),
    ("hset", CommandType::HSet),
    ("hsetnx", CommandType::HSetNx),
    ("hmset", CommandType::HMSet),
    ("hmget", CommandType::HMGet),
    ("hgetall", CommandType::HGetAll),
    ("hdel", CommandType::HDel),
    ("hexists", CommandType::HExists),
    ("hincrby", CommandType::HIncrBy),
    ("hlen", CommandType::HLen),
    ("hkeys", CommandType::HKeys),
    ("hvals", CommandType::HVals),
    ("sadd", CommandType::SAdd),
    ("srem", CommandType::SRem),
    ("spop", CommandType::SPop),
    ("scard", CommandType::SCard),
    ("smembers", CommandType::SMembers),
    ("sismember", CommandType::SIsMember),
    ("srandmember", CommandType::SRandMember),
    ("zadd", CommandType::ZAdd),
    ("zrem", CommandType::ZRem),
    ("zincrby", CommandType::ZIncrBy),
    ("zrange", CommandType::ZRange),
    ("zrevrange", CommandType::ZRevRange),
    ("zrangebyscore", CommandType::ZRangeByScore),
    ("zrevrangebyscore", CommandType::ZRevRangeByScore),
    ("zcard", CommandType::ZCard),
    ("zscore", CommandType::ZScore),
    ("zrank", CommandType::ZRank),
    ("zrevrank", CommandType::ZRevRank),
    ("zremrangebyrank", CommandType::ZRemRangeByRank),
    ("zremrangebyscore", CommandType::ZRemRangeByScore),
    ("lpush", CommandType::LPush),
    ("rpush", CommandType::RPush),
    ("lpop", CommandType::LPop),
    ("rpop", CommandType::RPop),
    ("lrange", CommandType::LRange),
    ("llen", CommandType::LLen),
    ("lindex", CommandType::LIndex),
    ("lset", CommandType::LSet),
    ("lrem", CommandType::LRem),
    ("ltrim", CommandType::LTrim),
    ("eval", CommandType::Eval),
];

impl CommandType {
    /// Look up a command by name (case-insensitive)
    pub fn lookup(name: &str) -> Result<Self> {
        COMMAND_TABLE
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, t)| *t)
            .ok_or_else(|| PipeError::UnknownCommand(name.to_string()))
    }

    /// Lowercase command name
    pub fn name(&self) -> &'static str {
        COMMAND_TABLE
            .iter()
            .find(|(_, t)| t == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }

    /// Position of the acting key among positional arguments
    ///
    /// Scripts take the script text and key count first.
    pub fn key_position(&self) -> Option<usize> {
        match self {
            CommandType::Ping | CommandType::Keys => None,
            CommandType::Eval => Some(2),
            _ => Some(0),
        }
    }

    /// Keyword arguments the typed form understands
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            CommandType::Set => &["ex"],
            CommandType::ZRange | CommandType::ZRevRange => &["withscores"],
            CommandType::ZRangeByScore | CommandType::ZRevRangeByScore => &["withscores", "start", "num"],
            _ => &[],
        }
    }
}

/// Position of the acting key for any command name
///
/// Names outside the table act on argument 0.
pub fn key_position(name: &str) -> Option<usize> {
    match CommandType::lookup(name) {
        Ok(command_type) => command_type.key_position(),
        Err(_) => Some(0),
    }
}

/// Keyword arguments forwarded verbatim to a command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs(Vec<(String, Value)>);

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyword argument
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }
}

/// One end of a score range; `(` in front of a number makes it exclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBound {
    pub value: f64,
    pub exclusive: bool,
}

impl ScoreBound {
    pub fn inclusive(value: f64) -> Self {
        Self { value, exclusive: false }
    }

    /// Whether `score` lies on the upper side of this bound
    pub fn admits_above(&self, score: f64) -> bool {
        if self.exclusive {
            score > self.value
        } else {
            score >= self.value
        }
    }

    /// Whether `score` lies on the lower side of this bound
    pub fn admits_below(&self, score: f64) -> bool {
        if self.exclusive {
            score < self.value
        } else {
            score <= self.value
        }
    }

    fn parse(value: &Value) -> Result<Self> {
        if let Value::Int(i) = value {
            return Ok(Self::inclusive(*i as f64));
        }
        let text = value
            .as_str()
            .ok_or_else(|| PipeError::InvalidArgument("min or max is not a float".to_string()))?;
        let (exclusive, number) = match text.strip_prefix('(') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let parsed = match number.to_ascii_lowercase().as_str() {
            "-inf" => Some(f64::NEG_INFINITY),
            "+inf" | "inf" => Some(f64::INFINITY),
            other => other.parse::<f64>().ok().filter(|f| !f.is_nan()),
        };
        parsed
            .map(|value| Self { value, exclusive })
            .ok_or_else(|| PipeError::InvalidArgument("min or max is not a float".to_string()))
    }
}

/// A parsed command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Ping (health check)
    Ping,

    /// Keys matching a glob pattern (`*` and `?`)
    Keys { pattern: Bytes },

    Get { key: Bytes },

    /// Set a string value, optionally with a TTL in seconds
    Set { key: Bytes, value: Bytes, expire_secs: Option<u64> },

    Del { keys: Vec<Bytes> },
    Exists { key: Bytes },
    Expire { key: Bytes, seconds: u64 },
    IncrBy { key: Bytes, delta: i64 },
    IncrByFloat { key: Bytes, delta: f64 },

    HGet { key: Bytes, field: Bytes },
    HSet { key: Bytes, field: Bytes, value: Bytes },
    HSetNx { key: Bytes, field: Bytes, value: Bytes },
    HMSet { key: Bytes, pairs: Vec<(Bytes, Bytes)> },
    HMGet { key: Bytes, fields: Vec<Bytes> },
    HGetAll { key: Bytes },
    HDel { key: Bytes, fields: Vec<Bytes> },
    HExists { key: Bytes, field: Bytes },
    HIncrBy { key: Bytes, field: Bytes, delta: i64 },
    HLen { key: Bytes },
    HKeys { key: Bytes },
    HVals { key: Bytes },

    SAdd { key: Bytes, members: Vec<Bytes> },
    SRem { key: Bytes, members: Vec<Bytes> },
    SPop { key: Bytes },
    SCard { key: Bytes },
    SMembers { key: Bytes },
    SIsMember { key: Bytes, member: Bytes },
    SRandMember { key: Bytes },

    /// Score/member pairs, score first
    ZAdd { key: Bytes, entries: Vec<(f64, Bytes)> },
    ZRem { key: Bytes, members: Vec<Bytes> },
    ZIncrBy { key: Bytes, delta: f64, member: Bytes },
    ZRange { key: Bytes, start: i64, stop: i64, with_scores: bool },
    ZRevRange { key: Bytes, start: i64, stop: i64, with_scores: bool },

    /// Members with `min <= score <= max`; `rev` walks from the top.
    /// `limit` is (offset, count).
    ZRangeByScore {
        key: Bytes,
        min: ScoreBound,
        max: ScoreBound,
        with_scores: bool,
        limit: Option<(usize, usize)>,
        rev: bool,
    },

    ZCard { key: Bytes },
    ZScore { key: Bytes, member: Bytes },
    ZRank { key: Bytes, member: Bytes, rev: bool },
    ZRemRangeByRank { key: Bytes, start: i64, stop: i64 },
    ZRemRangeByScore { key: Bytes, min: ScoreBound, max: ScoreBound },

    LPush { key: Bytes, values: Vec<Bytes> },
    RPush { key: Bytes, values: Vec<Bytes> },
    LPop { key: Bytes },
    RPop { key: Bytes },
    LRange { key: Bytes, start: i64, stop: i64 },
    LLen { key: Bytes },
    LIndex { key: Bytes, index: i64 },
    LSet { key: Bytes, index: i64, value: Bytes },

    /// Remove `count` occurrences; negative counts from the tail, 0 removes all
    LRem { key: Bytes, count: i64, value: Bytes },
    LTrim { key: Bytes, start: i64, stop: i64 },

    /// Run a registered script
    Eval { script: String, keys: Vec<Bytes>, args: Vec<Bytes> },

    /// Any other command, forwarded as given
    Raw { name: String, args: Vec<Bytes>, kwargs: Kwargs },
}

impl Command {
    /// Parse a command from its name, positional and keyword arguments
    ///
    /// Known commands are checked here; nothing is queued, so a rejected
    /// command leaves no trace. A known command carrying keywords its
    /// typed form does not model, and any unknown name, is forwarded as
    /// [`Command::Raw`].
    pub fn parse(name: &str, args: Vec<Value>, kwargs: &Kwargs) -> Result<Self> {
        let command_type = match CommandType::lookup(name) {
            Ok(command_type) => command_type,
            Err(e) => {
                if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c.is_control()) {
                    return Err(e);
                }
                return raw(name, &args, kwargs);
            }
        };

        let allowed = command_type.keywords();
        let forward = kwargs
            .names()
            .any(|n| !allowed.iter().any(|a| a.eq_ignore_ascii_case(n)));
        if forward {
            // Positional arguments still have to make sense
            Self::parse_typed(command_type, args.clone(), kwargs)?;
            return raw(name, &args, kwargs);
        }

        Self::parse_typed(command_type, args, kwargs)
    }

    fn parse_typed(command_type: CommandType, args: Vec<Value>, kwargs: &Kwargs) -> Result<Self> {
        let mut args = Args::new(command_type, args);
        let command = match command_type {
            CommandType::Ping => Command::Ping,
            CommandType::Keys => Command::Keys { pattern: args.bytes()? },
            CommandType::Get => Command::Get { key: args.bytes()? },
            CommandType::Set => Command::Set {
                key: args.bytes()?,
                value: args.bytes()?,
                expire_secs: match kwargs.get("ex") {
                    Some(v) => Some(to_u64(v, "ex")?),
                    None => None,
                },
            },
            CommandType::Del => Command::Del { keys: args.rest_bytes(1)? },
            CommandType::Exists => Command::Exists { key: args.bytes()? },
            CommandType::Expire => Command::Expire {
                key: args.bytes()?,
                seconds: to_u64(&args.value()?, "seconds")?,
            },
            CommandType::Incr => Command::IncrBy { key: args.bytes()?, delta: 1 },
            CommandType::IncrBy => Command::IncrBy { key: args.bytes()?, delta: args.int()? },
            CommandType::IncrByFloat => Command::IncrByFloat {
                key: args.bytes()?,
                delta: to_f64(&args.value()?)?,
            },
            CommandType::HGet => Command::HGet { key: args.bytes()?, field: args.bytes()? },
            CommandType::HSet => Command::HSet {
                key: args.bytes()?,
                field: args.bytes()?,
                value: args.bytes()?,
            },
            CommandType::HSetNx => Command::HSetNx {
                key: args.bytes()?,
                field: args.bytes()?,
                value: args.bytes()?,
            },
            CommandType::HMSet => {
                let key = args.bytes()?;
                let flat = args.rest_bytes(2)?;
                if flat.len() % 2 != 0 {
                    return Err(args.arity_error());
                }
                let pairs = flat
                    .chunks(2)
                    .map(|pair| (pair[0].clone(), pair[1].clone()))
                    .collect();
                Command::HMSet { key, pairs }
            }
            CommandType::HMGet => Command::HMGet { key: args.bytes()?, fields: args.rest_bytes(1)? },
            CommandType::HGetAll => Command::HGetAll { key: args.bytes()? },
            CommandType::HDel => Command::HDel { key: args.bytes()?, fields: args.rest_bytes(1)? },
            CommandType::HExists => Command::HExists { key: args.bytes()?, field: args.bytes()? },
            CommandType::HIncrBy => Command::HIncrBy {
                key: args.bytes()?,
                field: args.bytes()?,
                delta: args.int()?,
            },
            CommandType::HLen => Command::HLen { key: args.bytes()? },
            CommandType::HKeys => Command::HKeys { key: args.bytes()? },
            CommandType::HVals => Command::HVals { key: args.bytes()? },
            CommandType::SAdd => Command::SAdd { key: args.bytes()?, members: args.rest_bytes(1)? },
            CommandType::SRem => Command::SRem { key: args.bytes()?, members: args.rest_bytes(1)? },
            CommandType::SPop => Command::SPop { key: args.bytes()? },
            CommandType::SCard => Command::SCard { key: args.bytes()? },
            CommandType::SMembers => Command::SMembers { key: args.bytes()? },
            CommandType::SIsMember => Command::SIsMember { key: args.bytes()?, member: args.bytes()? },
            CommandType::SRandMember => Command::SRandMember { key: args.bytes()? },
            CommandType::ZAdd => {
                let key = args.bytes()?;
                let flat = args.rest_values(2)?;
                if flat.len() % 2 != 0 {
                    return Err(args.arity_error());
                }
                let mut entries = Vec::with_capacity(flat.len() / 2);
                for pair in flat.chunks(2) {
                    entries.push((to_f64(&pair[0])?, pair[1].to_arg()?));
                }
                Command::ZAdd { key, entries }
            }
            CommandType::ZRem => Command::ZRem { key: args.bytes()?, members: args.rest_bytes(1)? },
            CommandType::ZIncrBy => Command::ZIncrBy {
                key: args.bytes()?,
                delta: to_f64(&args.value()?)?,
                member: args.bytes()?,
            },
            CommandType::ZRange => Command::ZRange {
                key: args.bytes()?,
                start: args.int()?,
                stop: args.int()?,
                with_scores: with_scores(kwargs),
            },
            CommandType::ZRevRange => Command::ZRevRange {
                key: args.bytes()?,
                start: args.int()?,
                stop: args.int()?,
                with_scores: with_scores(kwargs),
            },
            CommandType::ZRangeByScore | CommandType::ZRevRangeByScore => {
                let rev = command_type == CommandType::ZRevRangeByScore;
                let key = args.bytes()?;
                let first = ScoreBound::parse(&args.value()?)?;
                let second = ScoreBound::parse(&args.value()?)?;
                // The reverse form names max before min
                let (min, max) = if rev { (second, first) } else { (first, second) };
                Command::ZRangeByScore {
                    key,
                    min,
                    max,
                    with_scores: with_scores(kwargs),
                    limit: limit(kwargs)?,
                    rev,
                }
            }
            CommandType::ZCard => Command::ZCard { key: args.bytes()? },
            CommandType::ZScore => Command::ZScore { key: args.bytes()?, member: args.bytes()? },
            CommandType::ZRank | CommandType::ZRevRank => Command::ZRank {
                key: args.bytes()?,
                member: args.bytes()?,
                rev: command_type == CommandType::ZRevRank,
            },
            CommandType::ZRemRangeByRank => Command::ZRemRangeByRank {
                key: args.bytes()?,
                start: args.int()?,
                stop: args.int()?,
            },
            CommandType::ZRemRangeByScore => Command::ZRemRangeByScore {
                key: args.bytes()?,
                min: ScoreBound::parse(&args.value()?)?,
                max: ScoreBound::parse(&args.value()?)?,
            },
            CommandType::LPush => Command::LPush { key: args.bytes()?, values: args.rest_bytes(1)? },
            CommandType::RPush => Command::RPush { key: args.bytes()?, values: args.rest_bytes(1)? },
            CommandType::LPop => Command::LPop { key: args.bytes()? },
            CommandType::RPop => Command::RPop { key: args.bytes()? },
            CommandType::LRange => Command::LRange {
                key: args.bytes()?,
                start: args.int()?,
                stop: args.int()?,
            },
            CommandType::LLen => Command::LLen { key: args.bytes()? },
            CommandType::LIndex => Command::LIndex { key: args.bytes()?, index: args.int()? },
            CommandType::LSet => Command::LSet {
                key: args.bytes()?,
                index: args.int()?,
                value: args.bytes()?,
            },
            CommandType::LRem => Command::LRem {
                key: args.bytes()?,
                count: args.int()?,
                value: args.bytes()?,
            },
            CommandType::LTrim => Command::LTrim {
                key: args.bytes()?,
                start: args.int()?,
                stop: args.int()?,
            },
            CommandType::Eval => {
                let script = args.bytes()?;
                let script = String::from_utf8(script.to_vec())
                    .map_err(|_| PipeError::InvalidArgument("script is not UTF-8".to_string()))?;
                let numkeys = args.int()?;
                if numkeys < 0 {
                    return Err(PipeError::InvalidArgument("negative key count".to_string()));
                }
                let rest = args.rest_bytes(0)?;
                if rest.len() < numkeys as usize {
                    return Err(PipeError::InvalidArgument(
                        "key count is greater than the number of arguments".to_string(),
                    ));
                }
                let (keys, script_args) = rest.split_at(numkeys as usize);
                Command::Eval {
                    script,
                    keys: keys.to_vec(),
                    args: script_args.to_vec(),
                }
            }
        };

        args.finish()?;
        Ok(command)
    }

    /// Get the command type; None for raw commands
    pub fn command_type(&self) -> Option<CommandType> {
        let command_type = match self {
            Command::Ping => CommandType::Ping,
            Command::Keys { .. } => CommandType::Keys,
            Command::Get { .. } => CommandType::Get,
            Command::Set { .. } => CommandType::Set,
            Command::Del { .. } => CommandType::Del,
            Command::Exists { .. } => CommandType::Exists,
            Command::Expire { .. } => CommandType::Expire,
            Command::IncrBy { .. } => CommandType::IncrBy,
            Command::IncrByFloat { .. } => CommandType::IncrByFloat,
            Command::HGet { .. } => CommandType::HGet,
            Command::HSet { .. } => CommandType::HSet,
            Command::HSetNx { .. } => CommandType::HSetNx,
            Command::HMSet { .. } => CommandType::HMSet,
            Command::HMGet { .. } => CommandType::HMGet,
            Command::HGetAll { .. } => CommandType::HGetAll,
            Command::HDel { .. } => CommandType::HDel,
            Command::HExists { .. } => CommandType::HExists,
            Command::HIncrBy { .. } => CommandType::HIncrBy,
            Command::HLen { .. } => CommandType::HLen,
            Command::HKeys { .. } => CommandType::HKeys,
            Command::HVals { .. } => CommandType::HVals,
            Command::SAdd { .. } => CommandType::SAdd,
            Command::SRem { .. } => CommandType::SRem,
            Command::SPop { .. } => CommandType::SPop,
            Command::SCard { .. } => CommandType::SCard,
            Command::SMembers { .. } => CommandType::SMembers,
            Command::SIsMember { .. } => CommandType::SIsMember,
            Command::SRandMember { .. } => CommandType::SRandMember,
            Command::ZAdd { .. } => CommandType::ZAdd,
            Command::ZRem { .. } => CommandType::ZRem,
            Command::ZIncrBy { .. } => CommandType::ZIncrBy,
            Command::ZRange { .. } => CommandType::ZRange,
            Command::ZRevRange { .. } => CommandType::ZRevRange,
            Command::ZRangeByScore { rev: false, .. } => CommandType::ZRangeByScore,
            Command::ZRangeByScore { rev: true, .. } => CommandType::ZRevRangeByScore,
            Command::ZCard { .. } => CommandType::ZCard,
            Command::ZScore { .. } => CommandType::ZScore,
            Command::ZRank { rev: false, .. } => CommandType::ZRank,
            Command::ZRank { rev: true, .. } => CommandType::ZRevRank,
            Command::ZRemRangeByRank { .. } => CommandType::ZRemRangeByRank,
            Command::ZRemRangeByScore { .. } => CommandType::ZRemRangeByScore,
            Command::LPush { .. } => CommandType::LPush,
            Command::RPush { .. } => CommandType::RPush,
            Command::LPop { .. } => CommandType::LPop,
            Command::RPop { .. } => CommandType::RPop,
            Command::LRange { .. } => CommandType::LRange,
            Command::LLen { .. } => CommandType::LLen,
            Command::LIndex { .. } => CommandType::LIndex,
            Command::LSet { .. } => CommandType::LSet,
            Command::LRem { .. } => CommandType::LRem,
            Command::LTrim { .. } => CommandType::LTrim,
            Command::Eval { .. } => CommandType::Eval,
            Command::Raw { .. } => return None,
        };
        Some(command_type)
    }

    /// Command name as sent to the backend
    pub fn name(&self) -> &str {
        match self {
            Command::Raw { name, .. } => name,
            other => other.command_type().map(|t| t.name()).unwrap_or("unknown"),
        }
    }
}

fn raw(name: &str, args: &[Value], kwargs: &Kwargs) -> Result<Command> {
    Ok(Command::Raw {
        name: name.to_string(),
        args: args.iter().map(Value::to_arg).collect::<Result<Vec<_>>>()?,
        kwargs: kwargs.clone(),
    })
}

fn with_scores(kwargs: &Kwargs) -> bool {
    kwargs.get("withscores").map(is_truthy).unwrap_or(false)
}

/// `start` and `num` keywords, which only make sense together
fn limit(kwargs: &Kwargs) -> Result<Option<(usize, usize)>> {
    match (kwargs.get("start"), kwargs.get("num")) {
        (None, None) => Ok(None),
        (Some(start), Some(num)) => Ok(Some((
            to_u64(start, "start")? as usize,
            to_u64(num, "num")? as usize,
        ))),
        _ => Err(PipeError::InvalidArgument(
            "``start`` and ``num`` must both be specified".to_string(),
        )),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,
        Value::Int(i) => *i != 0,
        Value::Bytes(b) => !b.is_empty() && b.as_ref() != b"0",
        _ => true,
    }
}

fn to_u64(value: &Value, what: &str) -> Result<u64> {
    value
        .as_int()
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| PipeError::InvalidArgument(format!("{} is not a non-negative integer", what)))
}

fn to_f64(value: &Value) -> Result<f64> {
    let parsed = match value {
        Value::Int(i) => Some(*i as f64),
        other => other.as_str().and_then(|s| s.parse::<f64>().ok()),
    };
    parsed
        .filter(|f| !f.is_nan())
        .ok_or_else(|| PipeError::InvalidArgument("value is not a valid float".to_string()))
}

/// Cursor over positional arguments with arity checking
struct Args {
    command_type: CommandType,
    values: std::vec::IntoIter<Value>,
}

impl Args {
    fn new(command_type: CommandType, values: Vec<Value>) -> Self {
        Self {
            command_type,
            values: values.into_iter(),
        }
    }

    fn arity_error(&self) -> PipeError {
        PipeError::InvalidArgument(format!(
            "wrong number of arguments for '{}' command",
            self.command_type.name()
        ))
    }

    fn value(&mut self) -> Result<Value> {
        self.values.next().ok_or_else(|| self.arity_error())
    }

    fn bytes(&mut self) -> Result<Bytes> {
        self.value()?.to_arg()
    }

    fn int(&mut self) -> Result<i64> {
        let value = self.value()?;
        value
            .as_int()
            .ok_or_else(|| PipeError::InvalidArgument("value is not an integer".to_string()))
    }

    /// Remaining values; at least `min` of them
    fn rest_values(&mut self, min: usize) -> Result<Vec<Value>> {
        let rest: Vec<Value> = self.values.by_ref().collect();
        if rest.len() < min {
            return Err(self.arity_error());
        }
        Ok(rest)
    }

    fn rest_bytes(&mut self, min: usize) -> Result<Vec<Bytes>> {
        self.rest_values(min)?.iter().map(Value::to_arg).collect()
    }

    fn finish(mut self) -> Result<()> {
        match self.values.next() {
            Some(_) => Err(self.arity_error()),
            None => Ok(()),
        }
    }
}
