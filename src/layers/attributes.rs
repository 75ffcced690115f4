//! Typed attribute records with change notification.
//!
//! Every overlay keeps its persisted attributes in an [`AttributeModel`]. A
//! mutation (typed closure or string-keyed JSON value) is diffed against the
//! previous record and one [`AttributeChange`] is emitted for each key whose
//! JSON value actually changed. Changes are delivered to registered
//! listeners immediately and queued on a channel for sessions to drain.

use crate::{prelude::HashMap, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// One attribute whose value changed.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    pub key: String,
    pub old: Value,
    pub new: Value,
}

type Listener = Box<dyn Fn(&AttributeChange) + Send + Sync>;

/// Event name every change is published under.
pub const CHANGE_EVENT: &str = "change";

pub struct AttributeModel<A> {
    attrs: A,
    sender: Sender<AttributeChange>,
    receiver: Receiver<AttributeChange>,
    listeners: HashMap<String, Vec<Listener>>,
}

impl<A> AttributeModel<A>
where
    A: Serialize + DeserializeOwned + Clone,
{
    pub fn new(attrs: A) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            attrs,
            sender,
            receiver,
            listeners: HashMap::default(),
        }
    }

    pub fn get(&self) -> &A {
        &self.attrs
    }

    /// JSON value of one attribute, by its persisted key.
    pub fn value(&self, key: &str) -> Option<Value> {
        match to_json(&self.attrs) {
            Value::Object(mut map) => map.remove(key),
            _ => None,
        }
    }

    /// True when the attribute is present and not null.
    pub fn has(&self, key: &str) -> bool {
        self.value(key).is_some_and(|value| !value.is_null())
    }

    /// Mutate through a closure; returns the keys that changed.
    pub fn set<F>(&mut self, mutate: F) -> Vec<String>
    where
        F: FnOnce(&mut A),
    {
        let mut next = self.attrs.clone();
        mutate(&mut next);
        self.commit(next)
    }

    /// Replace the whole record, e.g. when reverting to a snapshot.
    pub fn replace(&mut self, attrs: A) -> Vec<String> {
        self.commit(attrs)
    }

    /// String-keyed set of a single attribute.
    pub fn set_value(&mut self, key: &str, value: Value) -> Result<Vec<String>> {
        let mut values = serde_json::Map::new();
        values.insert(key.to_string(), value);
        self.set_values(values)
    }

    /// String-keyed set of many attributes at once.
    ///
    /// The merged record must still deserialize into `A`; otherwise nothing
    /// changes and the error is returned.
    pub fn set_values(&mut self, values: serde_json::Map<String, Value>) -> Result<Vec<String>> {
        let mut merged = match to_json(&self.attrs) {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        merged.extend(values);
        let next: A = serde_json::from_value(Value::Object(merged))?;
        Ok(self.commit(next))
    }

    /// Listen for `"change"` (every key) or `"change:<key>"`.
    pub fn on<F>(&mut self, event: &str, listener: F)
    where
        F: Fn(&AttributeChange) + Send + Sync + 'static,
    {
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(Box::new(listener));
    }

    /// Take every change queued since the last drain.
    pub fn drain_changes(&self) -> Vec<AttributeChange> {
        self.receiver.try_iter().collect()
    }

    fn commit(&mut self, next: A) -> Vec<String> {
        let changes = diff(&to_json(&self.attrs), &to_json(&next));
        self.attrs = next;

        for change in &changes {
            let keyed = format!("{}:{}", CHANGE_EVENT, change.key);
            for event in [CHANGE_EVENT, keyed.as_str()] {
                if let Some(listeners) = self.listeners.get(event) {
                    for listener in listeners {
                        listener(change);
                    }
                }
            }
            // The receiver lives as long as the sender, so this cannot fail.
            let _ = self.sender.send(change.clone());
        }

        changes.into_iter().map(|change| change.key).collect()
    }
}

fn to_json<A: Serialize>(attrs: &A) -> Value {
    serde_json::to_value(attrs).unwrap_or_default()
}

fn diff(old: &Value, new: &Value) -> Vec<AttributeChange> {
    let (Value::Object(old), Value::Object(new)) = (old, new) else {
        return if old == new {
            Vec::new()
        } else {
            vec![AttributeChange {
                key: String::new(),
                old: old.clone(),
                new: new.clone(),
            }]
        };
    };

    let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| {
            let before = old.get(key).cloned().unwrap_or(Value::Null);
            let after = new.get(key).cloned().unwrap_or(Value::Null);
            (before != after).then(|| AttributeChange {
                key: key.clone(),
                old: before,
                new: after,
            })
        })
        .collect()
}
