//! Compact immutable bit sets over densely numbered keys.
//!
//! Bracket id sets are built and merged on every parse step, so the common
//! case (fewer than 64 distinct bracket literals) is a single `u64` with no
//! allocation. Larger key spaces spill into a shared `Arc<[u64]>`.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// A type that maps onto a dense `u32` key space.
pub trait DenseKey: Copy {
    fn from_key(key: u32) -> Self;
    fn key(self) -> u32;
}

pub struct SmallImmutableSet<T> {
    items: u64,
    additional_items: Option<Arc<[u64]>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SmallImmutableSet<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items,
            additional_items: self.additional_items.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SmallImmutableSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> SmallImmutableSet<T> {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            items: 0,
            additional_items: None,
            _marker: PhantomData,
        }
    }

    fn from_words(items: u64, additional: Vec<u64>) -> Self {
        let mut additional = additional;
        while additional.last() == Some(&0) {
            additional.pop();
        }
        Self {
            items,
            additional_items: if additional.is_empty() {
                None
            } else {
                Some(additional.into())
            },
            _marker: PhantomData,
        }
    }

    fn additional(&self) -> &[u64] {
        self.additional_items.as_deref().unwrap_or(&[])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items == 0 && self.additional().iter().all(|w| *w == 0)
    }

    /// The union of both sets. Returns a clone of `self` or `other` when the
    /// union equals one of them.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let merged_items = self.items | other.items;

        if self.additional_items.is_none() && other.additional_items.is_none() {
            if merged_items == self.items {
                return self.clone();
            }
            if merged_items == other.items {
                return other.clone();
            }
            return Self::from_words(merged_items, Vec::new());
        }

        let (a, b) = (self.additional(), other.additional());
        let merged: Vec<u64> = (0..a.len().max(b.len()))
            .map(|i| a.get(i).copied().unwrap_or(0) | b.get(i).copied().unwrap_or(0))
            .collect();
        let candidate = Self::from_words(merged_items, merged);
        if candidate == *self {
            self.clone()
        } else if candidate == *other {
            other.clone()
        } else {
            candidate
        }
    }

    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        if self.items & other.items != 0 {
            return true;
        }
        self.additional()
            .iter()
            .zip(other.additional())
            .any(|(a, b)| a & b != 0)
    }
}

impl<T: DenseKey> SmallImmutableSet<T> {
    #[must_use]
    pub fn single(value: T) -> Self {
        Self::empty().add(value)
    }

    #[must_use]
    pub fn add(&self, value: T) -> Self {
        let key = value.key() as usize;
        if key < 64 {
            let mask = 1u64 << key;
            if self.items & mask != 0 {
                return self.clone();
            }
            return Self {
                items: self.items | mask,
                additional_items: self.additional_items.clone(),
                _marker: PhantomData,
            };
        }

        let word = key / 64 - 1;
        let mask = 1u64 << (key % 64);
        let mut additional = self.additional().to_vec();
        if additional.get(word).is_some_and(|w| w & mask != 0) {
            return self.clone();
        }
        if additional.len() <= word {
            additional.resize(word + 1, 0);
        }
        additional[word] |= mask;
        Self::from_words(self.items, additional)
    }

    #[must_use]
    pub fn has(&self, value: T) -> bool {
        let key = value.key() as usize;
        if key < 64 {
            return self.items & (1u64 << key) != 0;
        }
        self.additional()
            .get(key / 64 - 1)
            .is_some_and(|w| w & (1u64 << (key % 64)) != 0)
    }

    /// Members in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::once(self.items)
            .chain(self.additional().iter().copied())
            .enumerate()
            .flat_map(|(word_idx, word)| {
                (0..64u32)
                    .filter(move |bit| word & (1u64 << bit) != 0)
                    .map(move |bit| T::from_key(word_idx as u32 * 64 + bit))
            })
    }
}

impl<T> PartialEq for SmallImmutableSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items && self.additional() == other.additional()
    }
}

impl<T> Eq for SmallImmutableSet<T> {}

impl<T> Hash for SmallImmutableSet<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.items.hash(state);
        self.additional().hash(state);
    }
}

impl<T: DenseKey + fmt::Debug> fmt::Debug for SmallImmutableSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Assigns dense keys to values in first-seen order.
#[derive(Debug, Clone)]
pub struct DenseKeyProvider<V> {
    keys: HashMap<V, u32>,
    values: Vec<V>,
}

impl<V> Default for DenseKeyProvider<V> {
    fn default() -> Self {
        Self {
            keys: HashMap::new(),
            values: Vec::new(),
        }
    }
}

impl<V: Eq + Hash + Clone> DenseKeyProvider<V> {
    /// Returns the key of `value`, assigning the next free key if unseen.
    pub fn key_of(&mut self, value: &V) -> u32 {
        if let Some(key) = self.keys.get(value) {
            return *key;
        }
        let key = self.values.len() as u32;
        self.keys.insert(value.clone(), key);
        self.values.push(value.clone());
        key
    }

    #[must_use]
    pub fn get(&self, value: &V) -> Option<u32> {
        self.keys.get(value).copied()
    }

    #[must_use]
    pub fn reverse_lookup(&self, key: u32) -> Option<&V> {
        self.values.get(key as usize)
    }

    pub fn reverse_lookup_set<'a, K: DenseKey>(
        &'a self,
        set: &'a SmallImmutableSet<K>,
    ) -> impl Iterator<Item = &'a V> + 'a {
        set.iter().filter_map(|k| self.reverse_lookup(k.key()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
