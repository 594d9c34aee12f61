//! Client-side session module
//!
//! The session travels in a signed cookie. The server keeps nothing between
//! requests: it reads the cookie at request start and writes it back, re-signed,
//! when the handler changed something.

mod codec;

pub use codec::{SessionCodec, SessionError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const FLASHES_KEY: &str = "_flashes";

/// A message queued for display on the next rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: String,
    pub message: String,
}

/// Per-client key/value state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    values: BTreeMap<String, Value>,
    modified: bool,
}

impl Session {
    pub(crate) const fn from_values(values: BTreeMap<String, Value>) -> Self {
        Self {
            values,
            modified: false,
        }
    }

    pub(crate) const fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
        self.modified = true;
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    #[allow(dead_code)]
    pub fn clear(&mut self) {
        if !self.values.is_empty() {
            self.values.clear();
            self.modified = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    /// Entries excluding internal bookkeeping keys
    pub fn items(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Queue a message for the next rendered page
    pub fn flash(&mut self, message: impl Into<String>, category: impl Into<String>) {
        let mut flashes = self.peek_flashes();
        flashes.push(Flash {
            category: category.into(),
            message: message.into(),
        });
        self.insert(FLASHES_KEY, serde_json::to_value(flashes).unwrap_or(Value::Null));
    }

    /// Remove and return every queued message
    pub fn take_flashes(&mut self) -> Vec<Flash> {
        let flashes = self.peek_flashes();
        self.remove(FLASHES_KEY);
        flashes
    }

    fn peek_flashes(&self) -> Vec<Flash> {
        self.values
            .get(FLASHES_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_marks_modified() {
        let mut session = Session::default();
        assert!(!session.is_modified());
        session.insert("name", "Alice");
        assert!(session.is_modified());
        assert_eq!(session.get_str("name"), Some("Alice"));
    }

    #[test]
    fn test_remove_missing_key_is_not_a_change() {
        let mut session = Session::default();
        assert!(session.remove("nothing").is_none());
        session.clear();
        assert!(!session.is_modified());
    }

    #[test]
    fn test_flashes_round_trip_in_order() {
        let mut session = Session::default();
        session.flash("first", "info");
        session.flash("second", "success");
        assert_eq!(session.items().count(), 0);

        let flashes = session.take_flashes();
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].message, "first");
        assert_eq!(flashes[1].category, "success");
        assert!(session.take_flashes().is_empty());
        assert!(session.is_empty());
    }

    #[test]
    fn test_items_hide_internal_keys() {
        let mut session = Session::default();
        session.insert("name", "Bob");
        session.flash("hi", "info");
        let keys: Vec<_> = session.items().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name"]);
    }
}
