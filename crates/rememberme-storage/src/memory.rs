//! In-memory storage backend.
//!
//! [`MemoryBackend`] keeps sets and sorted sets in a single map guarded by an
//! async `RwLock`. A batch holds the write lock for its whole duration, which
//! makes every batch indivisible with respect to every other batch. Mutations
//! are journaled per key so a failing command rolls the whole batch back.
//!
//! Like the reference store, a set or sorted set that loses its last member
//! disappears.
//!
//! # Example
//!
//! ```ignore
//! use rememberme_storage::{Batch, MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!     let mut batch = Batch::new();
//!     batch.sadd("users", "alice").scard("users");
//!     let replies = backend.execute(batch).await.unwrap();
//!     assert_eq!(replies.integer(1).unwrap(), 1);
//! }
//! ```

use std::{
    collections::{BTreeSet, HashMap, hash_map::Entry},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    backend::{StorageBackend, StorageError, StorageResult},
    command::{Batch, Command, Replies, Reply, ScoreRange},
};

#[derive(Debug, Clone)]
enum Value {
    Set(BTreeSet<String>),
    SortedSet(SortedSet),
}

#[derive(Debug, Clone, Default)]
struct SortedSet {
    scores: HashMap<String, i64>,
    ordered: BTreeSet<(i64, String)>,
}

impl SortedSet {
    fn add(&mut self, score: i64, member: String) -> bool {
        match self.scores.insert(member.clone(), score) {
            Some(previous) => {
                self.ordered.remove(&(previous, member.clone()));
                self.ordered.insert((score, member));
                false
            },
            None => {
                self.ordered.insert((score, member));
                true
            },
        }
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(score, member.to_string()));
                true
            },
            None => false,
        }
    }

    fn range(&self, range: ScoreRange) -> impl Iterator<Item = &(i64, String)> {
        self.ordered
            .iter()
            .skip_while(move |(score, _)| range.min.is_some_and(|min| *score < min))
            .take_while(move |(score, _)| range.max.is_none_or(|max| *score <= max))
    }

    fn len(&self) -> usize {
        self.ordered.len()
    }
}

/// Thread-safe in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Applies commands against the locked map while recording each key's value
/// before its first mutation.
struct Executor<'a> {
    data: &'a mut HashMap<String, Value>,
    journal: HashMap<String, Option<Value>>,
}

impl<'a> Executor<'a> {
    fn new(data: &'a mut HashMap<String, Value>) -> Self {
        Self { data, journal: HashMap::new() }
    }

    fn remember(&mut self, key: &str) {
        if let Entry::Vacant(slot) = self.journal.entry(key.to_string()) {
            slot.insert(self.data.get(key).cloned());
        }
    }

    fn rollback(self) {
        for (key, previous) in self.journal {
            match previous {
                Some(value) => {
                    self.data.insert(key, value);
                },
                None => {
                    self.data.remove(&key);
                },
            }
        }
    }

    fn set(&self, key: &str) -> StorageResult<Option<&BTreeSet<String>>> {
        match self.data.get(key) {
            Some(Value::Set(set)) => Ok(Some(set)),
            Some(Value::SortedSet(_)) => Err(StorageError::wrong_type(key, "set")),
            None => Ok(None),
        }
    }

    fn sorted_set(&self, key: &str) -> StorageResult<Option<&SortedSet>> {
        match self.data.get(key) {
            Some(Value::SortedSet(zset)) => Ok(Some(zset)),
            Some(Value::Set(_)) => Err(StorageError::wrong_type(key, "sorted set")),
            None => Ok(None),
        }
    }

    fn set_mut(&mut self, key: &str) -> StorageResult<&mut BTreeSet<String>> {
        self.set(key)?;
        self.remember(key);
        match self.data.entry(key.to_string()).or_insert_with(|| Value::Set(BTreeSet::new())) {
            Value::Set(set) => Ok(set),
            Value::SortedSet(_) => Err(StorageError::wrong_type(key, "set")),
        }
    }

    fn sorted_set_mut(&mut self, key: &str) -> StorageResult<&mut SortedSet> {
        self.sorted_set(key)?;
        self.remember(key);
        match self
            .data
            .entry(key.to_string())
            .or_insert_with(|| Value::SortedSet(SortedSet::default()))
        {
            Value::SortedSet(zset) => Ok(zset),
            Value::Set(_) => Err(StorageError::wrong_type(key, "sorted set")),
        }
    }

    /// Drop `key` if its collection became empty
    fn prune(&mut self, key: &str) {
        let empty = match self.data.get(key) {
            Some(Value::Set(set)) => set.is_empty(),
            Some(Value::SortedSet(zset)) => zset.len() == 0,
            None => false,
        };
        if empty {
            self.data.remove(key);
        }
    }

    fn apply(&mut self, command: Command) -> StorageResult<Reply> {
        let reply = match command {
            Command::SAdd { key, member } => {
                let added = self.set_mut(&key)?.insert(member);
                Reply::Integer(i64::from(added))
            },
            Command::SRem { key, member } => {
                if self.set(&key)?.is_none() {
                    return Ok(Reply::Integer(0));
                }
                let removed = self.set_mut(&key)?.remove(&member);
                self.prune(&key);
                Reply::Integer(i64::from(removed))
            },
            Command::SCard { key } => {
                Reply::Integer(self.set(&key)?.map_or(0, |set| set.len() as i64))
            },
            Command::SMembers { key } => Reply::Members(
                self.set(&key)?.map(|set| set.iter().cloned().collect()).unwrap_or_default(),
            ),
            Command::ZAdd { key, score, member } => {
                let added = self.sorted_set_mut(&key)?.add(score, member);
                Reply::Integer(i64::from(added))
            },
            Command::ZRem { key, member } => {
                if self.sorted_set(&key)?.is_none() {
                    return Ok(Reply::Integer(0));
                }
                let removed = self.sorted_set_mut(&key)?.remove(&member);
                self.prune(&key);
                Reply::Integer(i64::from(removed))
            },
            Command::ZRangeByScore { key, range } => Reply::Members(
                self.sorted_set(&key)?
                    .map(|zset| zset.range(range).map(|(_, member)| member.clone()).collect())
                    .unwrap_or_default(),
            ),
            Command::ZRemRangeByScore { key, range } => {
                let Some(zset) = self.sorted_set(&key)? else {
                    return Ok(Reply::Integer(0));
                };
                let doomed: Vec<String> =
                    zset.range(range).map(|(_, member)| member.clone()).collect();
                let zset = self.sorted_set_mut(&key)?;
                for member in &doomed {
                    zset.remove(member);
                }
                self.prune(&key);
                Reply::Integer(doomed.len() as i64)
            },
            Command::ZCard { key } => {
                Reply::Integer(self.sorted_set(&key)?.map_or(0, |zset| zset.len() as i64))
            },
            Command::Exists { key } => Reply::Integer(i64::from(self.data.contains_key(&key))),
            Command::Del { keys } => {
                let mut deleted = 0;
                for key in keys {
                    if self.data.contains_key(&key) {
                        self.remember(&key);
                        self.data.remove(&key);
                        deleted += 1;
                    }
                }
                Reply::Integer(deleted)
            },
        };
        Ok(reply)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn execute(&self, batch: Batch) -> StorageResult<Replies> {
        let mut data = self.data.write().await;
        let mut executor = Executor::new(&mut data);
        let mut replies = Vec::with_capacity(batch.len());

        for command in batch {
            let name = command.name();
            match executor.apply(command) {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    tracing::debug!(command = name, error = %e, "Batch command failed, rolling back");
                    executor.rollback();
                    return Err(e);
                },
            }
        }

        Ok(Replies::new(replies))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    async fn run(backend: &MemoryBackend, build: impl FnOnce(&mut Batch)) -> Replies {
        let mut batch = Batch::new();
        build(&mut batch);
        backend.execute(batch).await.unwrap()
    }

    #[tokio::test]
    async fn test_set_operations() {
        let backend = MemoryBackend::new();

        let replies = run(&backend, |b| {
            b.sadd("s", "a").sadd("s", "a").sadd("s", "b").scard("s").smembers("s");
        })
        .await;
        assert_eq!(replies.integer(0).unwrap(), 1);
        assert_eq!(replies.integer(1).unwrap(), 0);
        assert_eq!(replies.integer(2).unwrap(), 1);
        assert_eq!(replies.integer(3).unwrap(), 2);
        assert_eq!(replies.members(4).unwrap(), ["a".to_string(), "b".to_string()]);

        let replies = run(&backend, |b| {
            b.srem("s", "a").srem("s", "a").srem("missing", "a");
        })
        .await;
        assert_eq!(replies.integer(0).unwrap(), 1);
        assert_eq!(replies.integer(1).unwrap(), 0);
        assert_eq!(replies.integer(2).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_emptied_collections_disappear() {
        let backend = MemoryBackend::new();

        run(&backend, |b| {
            b.sadd("s", "a").zadd("z", 1, "m");
        })
        .await;
        let replies = run(&backend, |b| {
            b.srem("s", "a").zrem("z", "m").exists("s").exists("z");
        })
        .await;
        assert_eq!(replies.integer(2).unwrap(), 0);
        assert_eq!(replies.integer(3).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sorted_set_range_operations() {
        let backend = MemoryBackend::new();

        run(&backend, |b| {
            b.zadd("z", 30, "c").zadd("z", 10, "a").zadd("z", 20, "b").zadd("z", 40, "d");
        })
        .await;

        let replies = run(&backend, |b| {
            b.zrange_by_score("z", ScoreRange::up_to(30))
                .zrange_by_score("z", ScoreRange { min: Some(20), max: Some(30) })
                .zcard("z");
        })
        .await;
        assert_eq!(replies.members(0).unwrap(), ["a", "b", "c"].map(String::from));
        assert_eq!(replies.members(1).unwrap(), ["b", "c"].map(String::from));
        assert_eq!(replies.integer(2).unwrap(), 4);

        let replies = run(&backend, |b| {
            b.zrem_range_by_score("z", ScoreRange::up_to(20)).zrange_by_score("z", ScoreRange::all());
        })
        .await;
        assert_eq!(replies.integer(0).unwrap(), 2);
        assert_eq!(replies.members(1).unwrap(), ["c", "d"].map(String::from));
    }

    #[tokio::test]
    async fn test_zadd_rescores_existing_member() {
        let backend = MemoryBackend::new();

        let replies = run(&backend, |b| {
            b.zadd("z", 50, "m").zadd("z", 5, "m").zrange_by_score("z", ScoreRange::up_to(10));
        })
        .await;
        assert_eq!(replies.integer(0).unwrap(), 1);
        assert_eq!(replies.integer(1).unwrap(), 0);
        assert_eq!(replies.members(2).unwrap(), ["m".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back() {
        let backend = MemoryBackend::new();
        run(&backend, |b| {
            b.zadd("index", 1, "entry").sadd("s", "kept");
        })
        .await;

        let mut batch = Batch::new();
        batch.sadd("s", "new").sadd("fresh", "x").del(["s"]).sadd("index", "oops");
        let err = backend.execute(batch).await.unwrap_err();
        assert_eq!(err, StorageError::wrong_type("index", "set"));

        let replies = run(&backend, |b| {
            b.smembers("s").exists("fresh").zcard("index");
        })
        .await;
        assert_eq!(replies.members(0).unwrap(), ["kept".to_string()]);
        assert_eq!(replies.integer(1).unwrap(), 0);
        assert_eq!(replies.integer(2).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_counts_existing_keys() {
        let backend = MemoryBackend::new();
        run(&backend, |b| {
            b.sadd("a", "1").sadd("b", "1");
        })
        .await;

        let deleted =
            backend.delete(&["a".to_string(), "b".to_string(), "c".to_string()]).await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(backend.delete(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();

        run(&backend, |b| {
            b.sadd("shared", "v");
        })
        .await;
        let replies = run(&clone, |b| {
            b.scard("shared");
        })
        .await;
        assert_eq!(replies.integer(0).unwrap(), 1);
    }
}
