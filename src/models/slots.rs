//! Keyed containers for tests (`Prueba`) and defects (`Defecto`).
//!
//! Stored documents hold these as objects keyed by stringified sequence
//! numbers (`{"0": {...}, "1": {...}}`). Older documents, and milestones that
//! were just created, carry an array (`[]`) or an empty string instead, so
//! all three shapes are accepted on read. Writes always produce the keyed
//! object form.
//!
//! Keys are assigned at insertion time and never renumbered. Deleting a slot
//! leaves a gap; iteration tolerates gaps and stays in numeric key order.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Unexpected, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

/// An ordered, string-keyed collection that emulates an array.
#[derive(Debug, Clone, PartialEq)]
pub struct Slots<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Slots<T> {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container holds no slots.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a slot by key.
    pub fn get(&self, key: &str) -> Option<&T> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    /// Look up a slot by key for mutation.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.position(key).map(|i| &mut self.entries[i].1)
    }

    /// The key the next [`Slots::push`] will use.
    ///
    /// On a dense container this is the slot count, so the first insert gets
    /// `"0"`, the second `"1"`, and so on. After deletions the key skips past
    /// the highest numeric key in use, so an insert never overwrites a
    /// surviving slot. If the highest key is `u64::MAX`, the first unused
    /// key from the slot count upward is taken instead.
    pub fn next_key(&self) -> String {
        let count = self.entries.len() as u64;
        let highest = self
            .entries
            .iter()
            .filter_map(|(key, _)| key.parse::<u64>().ok())
            .max();
        match highest.map(|n| n.checked_add(1)) {
            None => count.to_string(),
            Some(Some(after_highest)) => count.max(after_highest).to_string(),
            Some(None) => self.first_unused_from(count),
        }
    }

    fn first_unused_from(&self, start: u64) -> String {
        let mut candidate = start;
        while self.position(&candidate.to_string()).is_some() {
            candidate += 1;
        }
        candidate.to_string()
    }

    /// Append a value under a freshly generated key and return that key.
    pub fn push(&mut self, value: T) -> String {
        let key = self.next_key();
        self.insert(key.clone(), value);
        key
    }

    /// Insert or replace the slot at `key`, returning the previous value.
    pub fn insert(&mut self, key: String, value: T) -> Option<T> {
        if let Some(i) = self.position(&key) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        let at = self
            .entries
            .partition_point(|(existing, _)| key_order(existing, &key) == Ordering::Less);
        self.entries.insert(at, (key, value));
        None
    }

    /// Remove the slot at `key`. Other keys are left untouched.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over values in key order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    /// Iterate over keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

impl<T> FromIterator<T> for Slots<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut slots = Slots::new();
        for value in iter {
            slots.push(value);
        }
        slots
    }
}

/// Numeric keys first in numeric order, then everything else lexically.
fn key_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl<T: Serialize> Serialize for Slots<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Slots<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(SlotsVisitor(PhantomData))
    }
}

struct SlotsVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for SlotsVisitor<T> {
    type Value = Slots<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a keyed object, an array, or an empty string")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut slots = Slots::new();
        while let Some((key, value)) = map.next_entry::<String, T>()? {
            slots.insert(key, value);
        }
        Ok(slots)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut slots = Slots::new();
        while let Some(value) = seq.next_element::<T>()? {
            slots.push(value);
        }
        Ok(slots)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if v.is_empty() {
            Ok(Slots::new())
        } else {
            Err(E::invalid_value(Unexpected::Str(v), &self))
        }
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Slots::new())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(Slots::new())
    }
}
