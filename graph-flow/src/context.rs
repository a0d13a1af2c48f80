use dashmap::{DashMap, mapref::entry::Entry};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{GraphError, Result};

/// Run-scoped state shared between the tasks of one graph execution.
///
/// Every key is write-once: the first write wins and any later write to the same
/// key is rejected with [`GraphError::FieldAlreadyWritten`]. Tasks do not mutate the
/// context directly; they return a [`StateDelta`] that the graph merges.
#[derive(Clone, Debug)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// Write a single key. Fails if the key already holds a value.
    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.insert_value(key.into(), value)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_sync(key)
    }

    /// Synchronous read, used by edge guards which cannot await.
    pub fn get_sync<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Merge a delta. All keys are checked before anything is written, so a rejected
    /// delta leaves the context untouched.
    pub fn merge(&self, delta: StateDelta) -> Result<()> {
        if let Some(key) = delta.keys().find(|key| self.data.contains_key(*key)) {
            return Err(GraphError::FieldAlreadyWritten(key.to_string()));
        }
        for (key, value) in delta.writes {
            self.insert_value(key, value)?;
        }
        Ok(())
    }

    fn insert_value(&self, key: String, value: Value) -> Result<()> {
        match self.data.entry(key) {
            Entry::Occupied(entry) => Err(GraphError::FieldAlreadyWritten(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered set of writes produced by one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDelta {
    writes: Vec<(String, Value)>,
}

impl StateDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Result<Self> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        if self.writes.iter().any(|(existing, _)| *existing == key) {
            return Err(GraphError::FieldAlreadyWritten(key));
        }
        self.writes.push((key, serde_json::to_value(value)?));
        Ok(())
    }

    /// Append another delta; overlapping keys are a conflict.
    pub fn extend(&mut self, other: StateDelta) -> Result<()> {
        for (key, value) in other.writes {
            if self.writes.iter().any(|(existing, _)| *existing == key) {
                return Err(GraphError::FieldAlreadyWritten(key));
            }
            self.writes.push((key, value));
        }
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.writes.iter().map(|(key, _)| key.as_str())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.writes
            .iter()
            .find(|(existing, _)| existing == key)
            .and_then(|(_, value)| serde_json::from_value(value.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_write_is_rejected() {
        let context = Context::new();
        context.set("topic", "migraine").await.unwrap();

        let err = context.set("topic", "asthma").await.unwrap_err();
        assert!(matches!(err, GraphError::FieldAlreadyWritten(key) if key == "topic"));

        let topic: String = context.get("topic").await.unwrap();
        assert_eq!(topic, "migraine");
    }

    #[test]
    fn rejected_merge_writes_nothing() {
        let context = Context::new();
        context.merge(StateDelta::new().with("a", 1).unwrap()).unwrap();

        let delta = StateDelta::new()
            .with("b", 2)
            .unwrap()
            .with("a", 3)
            .unwrap();
        assert!(context.merge(delta).is_err());
        assert!(!context.contains_key("b"));
        assert_eq!(context.get_sync::<i32>("a"), Some(1));
    }

    #[test]
    fn delta_extend_detects_overlap() {
        let mut left = StateDelta::new().with("x", true).unwrap();
        let right = StateDelta::new().with("x", false).unwrap();
        assert!(left.extend(right).is_err());
    }

    #[test]
    fn prefix_keys_are_sorted() {
        let context = Context::new();
        let delta = StateDelta::new()
            .with("agent.b", 1)
            .unwrap()
            .with("agent.a", 2)
            .unwrap()
            .with("other", 3)
            .unwrap();
        context.merge(delta).unwrap();
        assert_eq!(context.keys_with_prefix("agent."), vec!["agent.a", "agent.b"]);
    }
}
