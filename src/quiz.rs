//! Quiz data model.
//!
//! A [`Quiz`] is built once per generation request and never mutated
//! afterwards; answers and scores live in [`crate::session`].

use crate::difficulty::Difficulty;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Index;

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Ordinal position, "1" for the first question.
    pub id: String,
    pub prompt: String,
    /// Choice key ("a".."d") to option text, in the order the model wrote
    /// them. Never empty.
    pub options: OptionMap,
    /// Key of the right option, or `None` when the model gave no usable answer.
    pub correct_key: Option<String>,
    pub explanation: String,
}

impl QuizQuestion {
    /// Whether `key` is the right answer. Always false for unresolved questions.
    pub fn is_correct(&self, key: &str) -> bool {
        self.correct_key.as_deref() == Some(key)
    }

    pub fn correct_option(&self) -> Option<&str> {
        self.correct_key
            .as_deref()
            .and_then(|k| self.options.get(k))
    }

    pub fn is_scoreable(&self) -> bool {
        self.correct_option().is_some()
    }
}

/// Choice key to option text, kept in insertion order.
///
/// Serialises as a JSON object. Keys are unique: inserting an existing key
/// replaces its text in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap(Vec<(String, String)>);

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, text: impl Into<String>) {
        let (key, text) = (key.into(), text.into());
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = text,
            None => self.0.push((key, text)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, text)| text.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, text)| (k.as_str(), text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for OptionMap {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl Index<&str> for OptionMap {
    type Output = str;

    fn index(&self, key: &str) -> &str {
        match self.get(key) {
            Some(text) => text,
            None => panic!("no option with key {key:?}"),
        }
    }
}

impl Serialize for OptionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OptionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OptionMapVisitor;

        impl<'de> Visitor<'de> for OptionMapVisitor {
            type Value = OptionMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of choice keys to option text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<OptionMap, A::Error> {
                let mut map = OptionMap::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    map.insert(k, v);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OptionMapVisitor)
    }
}

/// An ordered set of questions on one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub topic: String,
    /// Level the quiz was generated at.
    pub difficulty: Difficulty,
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    pub fn new(topic: impl Into<String>, difficulty: Difficulty, questions: Vec<QuizQuestion>) -> Self {
        Self {
            topic: topic.into(),
            difficulty,
            questions,
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, id: &str) -> Option<&QuizQuestion> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Ids of questions whose correct key could not be resolved.
    pub fn unscoreable_ids(&self) -> Vec<String> {
        self.questions
            .iter()
            .filter(|q| !q.is_scoreable())
            .map(|q| q.id.clone())
            .collect()
    }

    /// Keep at most `count` questions.
    pub(crate) fn truncate(&mut self, count: usize) {
        self.questions.truncate(count);
    }
}
