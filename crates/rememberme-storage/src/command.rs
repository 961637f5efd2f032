//! Batch commands and replies.
//!
//! Commands mirror the subset of a Redis-style key-value store the token
//! service relies on. A [`Batch`] is built up front and handed to
//! [`StorageBackend::execute`](crate::StorageBackend::execute) in one round
//! trip.

use crate::backend::{StorageError, StorageResult};

/// Inclusive score range for sorted-set queries. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl ScoreRange {
    /// Every score from negative infinity up to and including `max`
    pub fn up_to(max: i64) -> Self {
        Self { min: None, max: Some(max) }
    }

    /// Every score
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, score: i64) -> bool {
        self.min.is_none_or(|min| score >= min) && self.max.is_none_or(|max| score <= max)
    }
}

/// A single store command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add `member` to the set at `key`; replies 1 if it was added
    SAdd { key: String, member: String },
    /// Remove `member` from the set at `key`; replies 1 if it was present
    SRem { key: String, member: String },
    /// Number of members of the set at `key`
    SCard { key: String },
    /// All members of the set at `key`, sorted
    SMembers { key: String },
    /// Add or rescore `member` in the sorted set at `key`; replies 1 if it was added
    ZAdd { key: String, score: i64, member: String },
    /// Remove `member` from the sorted set at `key`; replies 1 if it was present
    ZRem { key: String, member: String },
    /// Members with a score inside `range`, ordered by score then member
    ZRangeByScore { key: String, range: ScoreRange },
    /// Remove members with a score inside `range`; replies the count removed
    ZRemRangeByScore { key: String, range: ScoreRange },
    /// Number of members of the sorted set at `key`
    ZCard { key: String },
    /// 1 if `key` holds a value
    Exists { key: String },
    /// Delete every key in `keys`; replies the count that existed
    Del { keys: Vec<String> },
}

impl Command {
    /// Command name as a store would spell it
    pub fn name(&self) -> &'static str {
        match self {
            Command::SAdd { .. } => "SADD",
            Command::SRem { .. } => "SREM",
            Command::SCard { .. } => "SCARD",
            Command::SMembers { .. } => "SMEMBERS",
            Command::ZAdd { .. } => "ZADD",
            Command::ZRem { .. } => "ZREM",
            Command::ZRangeByScore { .. } => "ZRANGEBYSCORE",
            Command::ZRemRangeByScore { .. } => "ZREMRANGEBYSCORE",
            Command::ZCard { .. } => "ZCARD",
            Command::Exists { .. } => "EXISTS",
            Command::Del { .. } => "DEL",
        }
    }
}

/// Ordered list of commands executed as one indivisible unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::SAdd { key: key.into(), member: member.into() })
    }

    pub fn srem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::SRem { key: key.into(), member: member.into() })
    }

    pub fn scard(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::SCard { key: key.into() })
    }

    pub fn smembers(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::SMembers { key: key.into() })
    }

    pub fn zadd(
        &mut self,
        key: impl Into<String>,
        score: i64,
        member: impl Into<String>,
    ) -> &mut Self {
        self.push(Command::ZAdd { key: key.into(), score, member: member.into() })
    }

    pub fn zrem(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::ZRem { key: key.into(), member: member.into() })
    }

    pub fn zrange_by_score(&mut self, key: impl Into<String>, range: ScoreRange) -> &mut Self {
        self.push(Command::ZRangeByScore { key: key.into(), range })
    }

    pub fn zrem_range_by_score(&mut self, key: impl Into<String>, range: ScoreRange) -> &mut Self {
        self.push(Command::ZRemRangeByScore { key: key.into(), range })
    }

    pub fn zcard(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::ZCard { key: key.into() })
    }

    pub fn exists(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::Exists { key: key.into() })
    }

    pub fn del<I, K>(&mut self, keys: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.push(Command::Del { keys: keys.into_iter().map(Into::into).collect() })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl IntoIterator for Batch {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

/// Result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Integer(i64),
    Members(Vec<String>),
}

/// Replies of a batch, one per command, in submission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replies(Vec<Reply>);

impl Replies {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self(replies)
    }

    /// Integer reply at `index`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnexpectedReply`] if the reply is missing or is
    /// not an integer.
    pub fn integer(&self, index: usize) -> StorageResult<i64> {
        match self.0.get(index) {
            Some(Reply::Integer(n)) => Ok(*n),
            _ => Err(StorageError::unexpected_reply(index, "integer")),
        }
    }

    /// Member list reply at `index`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnexpectedReply`] if the reply is missing or is
    /// not a member list.
    pub fn members(&self, index: usize) -> StorageResult<&[String]> {
        match self.0.get(index) {
            Some(Reply::Members(members)) => Ok(members),
            _ => Err(StorageError::unexpected_reply(index, "member list")),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<Reply> {
        self.0
    }
}
