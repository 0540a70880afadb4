//! In-memory keyspace
//!
//! BTreeMap of typed entries with lazy expiry.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::{PipeError, Result};
use crate::protocol::{format_score, Command, Value};

/// A typed value stored under a key
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    String(Bytes),
    Hash(BTreeMap<Bytes, Bytes>),
    Set(BTreeSet<Bytes>),
    /// member -> score
    SortedSet(BTreeMap<Bytes, f64>),
    List(VecDeque<Bytes>),
}

#[derive(Debug, Clone)]
struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(entry: Entry) -> Self {
        Self { entry, expires_at: None }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// The data behind one in-memory connection
#[derive(Debug, Default)]
pub struct Store {
    data: BTreeMap<Bytes, Slot>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.values().filter(|slot| !slot.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry under `key`, if live
    pub fn entry(&self, key: &[u8]) -> Option<&Entry> {
        let now = Instant::now();
        self.data
            .get(key)
            .filter(|slot| !slot.is_expired(now))
            .map(|slot| &slot.entry)
    }

    /// Apply one command
    ///
    /// EVAL is resolved by the connection, not here.
    pub fn apply(&mut self, command: &Command) -> Result<Value> {
        match command {
            Command::Ping => Ok(Value::Status("PONG".to_string())),

            Command::Keys { pattern } => {
                let now = Instant::now();
                Ok(Value::Array(
                    self.data
                        .iter()
                        .filter(|(key, slot)| !slot.is_expired(now) && glob_match(pattern, key))
                        .map(|(key, _)| Value::Bytes(key.clone()))
                        .collect(),
                ))
            }

            Command::Get { key } => match self.live(key) {
                None => Ok(Value::Nil),
                Some(Entry::String(v)) => Ok(Value::Bytes(v.clone())),
                Some(_) => Err(PipeError::WrongType),
            },

            Command::Set { key, value, expire_secs } => {
                let mut slot = Slot::new(Entry::String(value.clone()));
                slot.expires_at = match expire_secs {
                    Some(secs) => Some(deadline(*secs)?),
                    None => None,
                };
                self.data.insert(key.clone(), slot);
                Ok(Value::ok())
            }

            Command::Del { keys } => {
                let mut removed = 0;
                for key in keys {
                    if self.live(key).is_some() {
                        removed += 1;
                    }
                    self.data.remove(key);
                }
                Ok(Value::Int(removed))
            }

            Command::Exists { key } => Ok(Value::Int(self.live(key).is_some() as i64)),

            Command::Expire { key, seconds } => {
                let expires_at = deadline(*seconds)?;
                if self.live(key).is_none() {
                    return Ok(Value::Int(0));
                }
                if let Some(slot) = self.data.get_mut(key) {
                    slot.expires_at = Some(expires_at);
                }
                Ok(Value::Int(1))
            }

            Command::IncrBy { key, delta } => {
                let current = match self.live(key) {
                    None => 0,
                    Some(Entry::String(v)) => parse_int(v)?,
                    Some(_) => return Err(PipeError::WrongType),
                };
                let next = current
                    .checked_add(*delta)
                    .ok_or_else(|| PipeError::Backend("increment or decrement would overflow".to_string()))?;
                let expires_at = self.data.get(key).and_then(|slot| slot.expires_at);
                self.data.insert(
                    key.clone(),
                    Slot {
                        entry: Entry::String(Bytes::from(next.to_string())),
                        expires_at,
                    },
                );
                Ok(Value::Int(next))
            }

            Command::IncrByFloat { key, delta } => {
                let current = match self.live(key) {
                    None => 0.0,
                    Some(Entry::String(v)) => parse_float(v)?,
                    Some(_) => return Err(PipeError::WrongType),
                };
                let next = current + delta;
                if !next.is_finite() {
                    return Err(PipeError::Backend("increment would produce NaN or Infinity".to_string()));
                }
                let rendered = Bytes::from(format_score(next));
                let expires_at = self.data.get(key).and_then(|slot| slot.expires_at);
                self.data.insert(
                    key.clone(),
                    Slot {
                        entry: Entry::String(rendered.clone()),
                        expires_at,
                    },
                );
                Ok(Value::Bytes(rendered))
            }

            Command::HGet { key, field } => Ok(match self.hash(key)? {
                Some(hash) => hash.get(field).cloned().map(Value::Bytes).unwrap_or(Value::Nil),
                None => Value::Nil,
            }),

            Command::HSet { key, field, value } => {
                let hash = self.hash_mut(key)?;
                let added = hash.insert(field.clone(), value.clone()).is_none();
                Ok(Value::Int(added as i64))
            }

            Command::HSetNx { key, field, value } => {
                let hash = self.hash_mut(key)?;
                if hash.contains_key(field) {
                    return Ok(Value::Int(0));
                }
                hash.insert(field.clone(), value.clone());
                Ok(Value::Int(1))
            }

            Command::HMSet { key, pairs } => {
                let hash = self.hash_mut(key)?;
                for (field, value) in pairs {
                    hash.insert(field.clone(), value.clone());
                }
                Ok(Value::ok())
            }

            Command::HMGet { key, fields } => {
                let hash = self.hash(key)?;
                Ok(Value::Array(
                    fields
                        .iter()
                        .map(|field| {
                            hash.and_then(|h| h.get(field))
                                .cloned()
                                .map(Value::Bytes)
                                .unwrap_or(Value::Nil)
                        })
                        .collect(),
                ))
            }

            Command::HGetAll { key } => {
                let mut flat = Vec::new();
                if let Some(hash) = self.hash(key)? {
                    for (field, value) in hash {
                        flat.push(Value::Bytes(field.clone()));
                        flat.push(Value::Bytes(value.clone()));
                    }
                }
                Ok(Value::Array(flat))
            }

            Command::HDel { key, fields } => {
                let removed = match self.hash_existing_mut(key)? {
                    Some(hash) => fields.iter().filter(|f| hash.remove(*f).is_some()).count(),
                    None => 0,
                };
                self.drop_if_empty(key);
                Ok(Value::Int(removed as i64))
            }

            Command::HExists { key, field } => {
                let found = self.hash(key)?.map(|h| h.contains_key(field)).unwrap_or(false);
                Ok(Value::Int(found as i64))
            }

            Command::HIncrBy { key, field, delta } => {
                let hash = self.hash_mut(key)?;
                let current = match hash.get(field) {
                    Some(v) => parse_int(v)?,
                    None => 0,
                };
                let next = current
                    .checked_add(*delta)
                    .ok_or_else(|| PipeError::Backend("increment or decrement would overflow".to_string()))?;
                hash.insert(field.clone(), Bytes::from(next.to_string()));
                Ok(Value::Int(next))
            }

            Command::HLen { key } => Ok(Value::Int(self.hash(key)?.map(|h| h.len()).unwrap_or(0) as i64)),

            Command::HKeys { key } => Ok(Value::Array(
                self.hash(key)?
                    .map(|h| h.keys().cloned().map(Value::Bytes).collect())
                    .unwrap_or_default(),
            )),

            Command::HVals { key } => Ok(Value::Array(
                self.hash(key)?
                    .map(|h| h.values().cloned().map(Value::Bytes).collect())
                    .unwrap_or_default(),
            )),

            Command::SAdd { key, members } => {
                let set = self.set_mut(key)?;
                let added = members.iter().filter(|m| set.insert((*m).clone())).count();
                Ok(Value::Int(added as i64))
            }

            Command::SRem { key, members } => {
                let removed = match self.live_mut(key) {
                    None => 0,
                    Some(Entry::Set(set)) => members.iter().filter(|m| set.remove(*m)).count(),
                    Some(_) => return Err(PipeError::WrongType),
                };
                self.drop_if_empty(key);
                Ok(Value::Int(removed as i64))
            }

            // Members come out in sorted order, so "random" picks the first one
            Command::SPop { key } => {
                let popped = match self.live_mut(key) {
                    None => None,
                    Some(Entry::Set(set)) => set.pop_first(),
                    Some(_) => return Err(PipeError::WrongType),
                };
                self.drop_if_empty(key);
                Ok(popped.map(Value::Bytes).unwrap_or(Value::Nil))
            }

            Command::SRandMember { key } => match self.live(key) {
                None => Ok(Value::Nil),
                Some(Entry::Set(set)) => Ok(set.first().cloned().map(Value::Bytes).unwrap_or(Value::Nil)),
                Some(_) => Err(PipeError::WrongType),
            },

            Command::SCard { key } => match self.live(key) {
                None => Ok(Value::Int(0)),
                Some(Entry::Set(set)) => Ok(Value::Int(set.len() as i64)),
                Some(_) => Err(PipeError::WrongType),
            },

            Command::SMembers { key } => match self.live(key) {
                None => Ok(Value::Array(Vec::new())),
                Some(Entry::Set(set)) => Ok(Value::Array(set.iter().cloned().map(Value::Bytes).collect())),
                Some(_) => Err(PipeError::WrongType),
            },

            Command::SIsMember { key, member } => match self.live(key) {
                None => Ok(Value::Int(0)),
                Some(Entry::Set(set)) => Ok(Value::Int(set.contains(member) as i64)),
                Some(_) => Err(PipeError::WrongType),
            },

            Command::ZAdd { key, entries } => {
                let zset = self.sorted_set_mut(key)?;
                let mut added = 0;
                for (score, member) in entries {
                    if zset.insert(member.clone(), *score).is_none() {
                        added += 1;
                    }
                }
                Ok(Value::Int(added))
            }

            Command::ZRem { key, members } => {
                let removed = match self.live_mut(key) {
                    None => 0,
                    Some(Entry::SortedSet(zset)) => members.iter().filter(|m| zset.remove(*m).is_some()).count(),
                    Some(_) => return Err(PipeError::WrongType),
                };
                self.drop_if_empty(key);
                Ok(Value::Int(removed as i64))
            }

            Command::ZIncrBy { key, delta, member } => {
                let zset = self.sorted_set_mut(key)?;
                let score = zset.get(member).copied().unwrap_or(0.0) + delta;
                if score.is_nan() {
                    return Err(PipeError::Backend("resulting score is not a number (NaN)".to_string()));
                }
                zset.insert(member.clone(), score);
                Ok(Value::Bytes(Bytes::from(format_score(score))))
            }

            Command::ZRange { key, start, stop, with_scores } => {
                let ranked = self.ranked(key)?;
                Ok(render_members(ranked_slice(&ranked, *start, *stop), *with_scores))
            }

            Command::ZRevRange { key, start, stop, with_scores } => {
                let mut ranked = self.ranked(key)?;
                ranked.reverse();
                Ok(render_members(ranked_slice(&ranked, *start, *stop), *with_scores))
            }

            Command::ZRangeByScore { key, min, max, with_scores, limit, rev } => {
                let mut ranked = self.ranked(key)?;
                if *rev {
                    ranked.reverse();
                }
                let matching = ranked
                    .iter()
                    .filter(|(_, score)| min.admits_above(*score) && max.admits_below(*score));
                let picked: Vec<&(Bytes, f64)> = match limit {
                    Some((offset, count)) => matching.skip(*offset).take(*count).collect(),
                    None => matching.collect(),
                };
                Ok(render_members(picked, *with_scores))
            }

            Command::ZCard { key } => match self.live(key) {
                None => Ok(Value::Int(0)),
                Some(Entry::SortedSet(zset)) => Ok(Value::Int(zset.len() as i64)),
                Some(_) => Err(PipeError::WrongType),
            },

            Command::ZRank { key, member, rev } => {
                let mut ranked = self.ranked(key)?;
                if *rev {
                    ranked.reverse();
                }
                Ok(ranked
                    .iter()
                    .position(|(m, _)| m == member)
                    .map(|rank| Value::Int(rank as i64))
                    .unwrap_or(Value::Nil))
            }

            Command::ZRemRangeByRank { key, start, stop } => {
                let ranked = self.ranked(key)?;
                let doomed: Vec<Bytes> = ranked_slice(&ranked, *start, *stop)
                    .into_iter()
                    .map(|(m, _)| m.clone())
                    .collect();
                Ok(Value::Int(self.remove_members(key, &doomed) as i64))
            }

            Command::ZRemRangeByScore { key, min, max } => {
                let doomed: Vec<Bytes> = self
                    .ranked(key)?
                    .into_iter()
                    .filter(|(_, score)| min.admits_above(*score) && max.admits_below(*score))
                    .map(|(m, _)| m)
                    .collect();
                Ok(Value::Int(self.remove_members(key, &doomed) as i64))
            }

            Command::ZScore { key, member } => match self.live(key) {
                None => Ok(Value::Nil),
                Some(Entry::SortedSet(zset)) => Ok(zset
                    .get(member)
                    .map(|s| Value::Bytes(Bytes::from(format_score(*s))))
                    .unwrap_or(Value::Nil)),
                Some(_) => Err(PipeError::WrongType),
            },

            Command::LPush { key, values } => {
                let list = self.list_mut(key)?;
                for value in values {
                    list.push_front(value.clone());
                }
                Ok(Value::Int(list.len() as i64))
            }

            Command::RPush { key, values } => {
                let list = self.list_mut(key)?;
                for value in values {
                    list.push_back(value.clone());
                }
                Ok(Value::Int(list.len() as i64))
            }

            Command::LPop { key } | Command::RPop { key } => {
                let front = matches!(command, Command::LPop { .. });
                let popped = match self.live_mut(key) {
                    None => None,
                    Some(Entry::List(list)) if front => list.pop_front(),
                    Some(Entry::List(list)) => list.pop_back(),
                    Some(_) => return Err(PipeError::WrongType),
                };
                self.drop_if_empty(key);
                Ok(popped.map(Value::Bytes).unwrap_or(Value::Nil))
            }

            Command::LIndex { key, index } => match self.live(key) {
                None => Ok(Value::Nil),
                Some(Entry::List(list)) => Ok(list_index(list.len(), *index)
                    .and_then(|i| list.get(i))
                    .cloned()
                    .map(Value::Bytes)
                    .unwrap_or(Value::Nil)),
                Some(_) => Err(PipeError::WrongType),
            },

            Command::LSet { key, index, value } => match self.live_mut(key) {
                None => Err(PipeError::Backend("no such key".to_string())),
                Some(Entry::List(list)) => {
                    let slot = list_index(list.len(), *index)
                        .and_then(|i| list.get_mut(i))
                        .ok_or_else(|| PipeError::Backend("index out of range".to_string()))?;
                    *slot = value.clone();
                    Ok(Value::ok())
                }
                Some(_) => Err(PipeError::WrongType),
            },

            Command::LRem { key, count, value } => {
                let removed = match self.live_mut(key) {
                    None => 0,
                    Some(Entry::List(list)) => remove_occurrences(list, *count, value),
                    Some(_) => return Err(PipeError::WrongType),
                };
                self.drop_if_empty(key);
                Ok(Value::Int(removed as i64))
            }

            Command::LTrim { key, start, stop } => {
                match self.live_mut(key) {
                    None => {}
                    Some(Entry::List(list)) => match resolve_range(list.len(), *start, *stop) {
                        Some((from, to)) => {
                            list.truncate(to + 1);
                            list.drain(..from);
                        }
                        None => list.clear(),
                    },
                    Some(_) => return Err(PipeError::WrongType),
                }
                self.drop_if_empty(key);
                Ok(Value::ok())
            }

            Command::LRange { key, start, stop } => match self.live(key) {
                None => Ok(Value::Array(Vec::new())),
                Some(Entry::List(list)) => {
                    let out = match resolve_range(list.len(), *start, *stop) {
                        Some((from, to)) => list
                            .iter()
                            .skip(from)
                            .take(to - from + 1)
                            .cloned()
                            .map(Value::Bytes)
                            .collect(),
                        None => Vec::new(),
                    };
                    Ok(Value::Array(out))
                }
                Some(_) => Err(PipeError::WrongType),
            },

            Command::LLen { key } => match self.live(key) {
                None => Ok(Value::Int(0)),
                Some(Entry::List(list)) => Ok(Value::Int(list.len() as i64)),
                Some(_) => Err(PipeError::WrongType),
            },

            Command::Eval { .. } => Err(PipeError::InvalidArgument(
                "EVAL must be resolved by the connection".to_string(),
            )),

            Command::Raw { name, .. } => Err(PipeError::UnknownCommand(name.clone())),
        }
    }

    /// Sorted-set members by ascending score, ties broken by member
    fn ranked(&mut self, key: &Bytes) -> Result<Vec<(Bytes, f64)>> {
        let mut ranked: Vec<(Bytes, f64)> = match self.live(key) {
            None => Vec::new(),
            Some(Entry::SortedSet(zset)) => zset.iter().map(|(m, s)| (m.clone(), *s)).collect(),
            Some(_) => return Err(PipeError::WrongType),
        };
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked)
    }

    fn remove_members(&mut self, key: &Bytes, members: &[Bytes]) -> usize {
        let removed = match self.live_mut(key) {
            Some(Entry::SortedSet(zset)) => members.iter().filter(|m| zset.remove(*m).is_some()).count(),
            _ => 0,
        };
        self.drop_if_empty(key);
        removed
    }

    // =========================================================================
    // Typed access
    // =========================================================================

    /// Live entry, evicting it first if it has expired
    fn live(&mut self, key: &Bytes) -> Option<&Entry> {
        self.evict_expired(key);
        self.data.get(key).map(|slot| &slot.entry)
    }

    fn live_mut(&mut self, key: &Bytes) -> Option<&mut Entry> {
        self.evict_expired(key);
        self.data.get_mut(key).map(|slot| &mut slot.entry)
    }

    fn evict_expired(&mut self, key: &Bytes) {
        let now = Instant::now();
        if self.data.get(key).map(|slot| slot.is_expired(now)).unwrap_or(false) {
            self.data.remove(key);
        }
    }

    fn drop_if_empty(&mut self, key: &Bytes) {
        let empty = match self.data.get(key).map(|slot| &slot.entry) {
            Some(Entry::Hash(h)) => h.is_empty(),
            Some(Entry::Set(s)) => s.is_empty(),
            Some(Entry::SortedSet(z)) => z.is_empty(),
            Some(Entry::List(l)) => l.is_empty(),
            _ => false,
        };
        if empty {
            self.data.remove(key);
        }
    }

    fn hash(&mut self, key: &Bytes) -> Result<Option<&BTreeMap<Bytes, Bytes>>> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(PipeError::WrongType),
        }
    }

    fn hash_existing_mut(&mut self, key: &Bytes) -> Result<Option<&mut BTreeMap<Bytes, Bytes>>> {
        match self.live_mut(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(PipeError::WrongType),
        }
    }

    fn hash_mut(&mut self, key: &Bytes) -> Result<&mut BTreeMap<Bytes, Bytes>> {
        match self.slot_or_insert(key, || Entry::Hash(BTreeMap::new())) {
            Entry::Hash(hash) => Ok(hash),
            _ => Err(PipeError::WrongType),
        }
    }

    fn set_mut(&mut self, key: &Bytes) -> Result<&mut BTreeSet<Bytes>> {
        match self.slot_or_insert(key, || Entry::Set(BTreeSet::new())) {
            Entry::Set(set) => Ok(set),
            _ => Err(PipeError::WrongType),
        }
    }

    fn sorted_set_mut(&mut self, key: &Bytes) -> Result<&mut BTreeMap<Bytes, f64>> {
        match self.slot_or_insert(key, || Entry::SortedSet(BTreeMap::new())) {
            Entry::SortedSet(zset) => Ok(zset),
            _ => Err(PipeError::WrongType),
        }
    }

    fn list_mut(&mut self, key: &Bytes) -> Result<&mut VecDeque<Bytes>> {
        match self.slot_or_insert(key, || Entry::List(VecDeque::new())) {
            Entry::List(list) => Ok(list),
            _ => Err(PipeError::WrongType),
        }
    }

    fn slot_or_insert(&mut self, key: &Bytes, empty: impl FnOnce() -> Entry) -> &mut Entry {
        self.evict_expired(key);
        &mut self
            .data
            .entry(key.clone())
            .or_insert_with(|| Slot::new(empty()))
            .entry
    }
}

/// Expiry instant `secs` from now
fn deadline(secs: u64) -> Result<Instant> {
    Instant::now()
        .checked_add(Duration::from_secs(secs))
        .ok_or_else(|| PipeError::InvalidArgument("invalid expire time".to_string()))
}

fn parse_float(raw: &Bytes) -> Result<f64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|f| f.is_finite())
        .ok_or_else(|| PipeError::Backend("value is not a valid float".to_string()))
}

fn parse_int(raw: &Bytes) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PipeError::Backend("value is not an integer or out of range".to_string()))
}

/// Inclusive index range with negative indexes counted from the end
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

fn ranked_slice(ranked: &[(Bytes, f64)], start: i64, stop: i64) -> Vec<&(Bytes, f64)> {
    match resolve_range(ranked.len(), start, stop) {
        Some((from, to)) => ranked[from..=to].iter().collect(),
        None => Vec::new(),
    }
}

fn render_members(members: Vec<&(Bytes, f64)>, with_scores: bool) -> Value {
    let mut out = Vec::new();
    for (member, score) in members {
        out.push(Value::Bytes(member.clone()));
        if with_scores {
            out.push(Value::Bytes(Bytes::from(format_score(*score))));
        }
    }
    Value::Array(out)
}

/// Single list position, negative counted from the end
fn list_index(len: usize, index: i64) -> Option<usize> {
    let resolved = if index < 0 { len as i64 + index } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return None;
    }
    Some(resolved as usize)
}

/// Remove up to `count` copies of `value`; negative walks from the tail
fn remove_occurrences(list: &mut VecDeque<Bytes>, count: i64, value: &Bytes) -> usize {
    let limit = if count == 0 { usize::MAX } else { count.unsigned_abs() as usize };
    let positions: Vec<usize> = if count < 0 {
        (0..list.len()).rev().filter(|i| &list[*i] == value).take(limit).collect()
    } else {
        (0..list.len()).filter(|i| &list[*i] == value).take(limit).collect()
    };
    let mut sorted = positions;
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    for index in &sorted {
        list.remove(*index);
    }
    sorted.len()
}

/// Glob match supporting `*` and `?`
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_range(5, -2, -1), Some((3, 4)));
        assert_eq!(resolve_range(5, 1, 100), Some((1, 4)));
        assert_eq!(resolve_range(5, 3, 1), None);
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(3, -10, 0), Some((0, 0)));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match(b"user{*}", b"user{42}"));
        assert!(glob_match(b"*", b""));
        assert!(glob_match(b"a?c", b"abc"));
        assert!(!glob_match(b"user{*}", b"post{42}"));
        assert!(!glob_match(b"a?c", b"ac"));
    }

    #[test]
    fn test_remove_occurrences() {
        let list = || -> VecDeque<Bytes> { ["a", "b", "a", "c", "a"].iter().map(|s| Bytes::from(*s)).collect() };
        let a = Bytes::from("a");

        let mut head = list();
        assert_eq!(remove_occurrences(&mut head, 2, &a), 2);
        assert_eq!(head, ["b", "c", "a"].iter().map(|s| Bytes::from(*s)).collect::<VecDeque<_>>());

        let mut tail = list();
        assert_eq!(remove_occurrences(&mut tail, -1, &a), 1);
        assert_eq!(tail.len(), 4);
        assert_eq!(tail.back(), Some(&Bytes::from("c")));

        let mut all = list();
        assert_eq!(remove_occurrences(&mut all, 0, &a), 3);
    }
}
