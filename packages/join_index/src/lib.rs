#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Binary join index.
//!
//! A [`JoinIndex`] collects typed records append-only, then is frozen by
//! one of the record's declared key fields. Once frozen, all records that
//! share a key value form a contiguous run that is found by binary search
//! and walked with a linear scan.
//!
//! The index can be re-frozen by a different key at any time, which
//! re-sorts the records and invalidates positions returned earlier.
//!
//! Using the index out of phase (inserting after a freeze, or querying
//! before one, or querying with a key other than the frozen one) is a
//! stage-ordering bug in the caller and panics.

use std::fmt;

/// A named key extractor for records of type `R`.
pub struct KeyField<R> {
    /// Name used in phase tracking and panic messages.
    pub name: &'static str,
    /// Extracts the key value.
    pub key: fn(&R) -> i64,
}

impl<R> KeyField<R> {
    /// Creates a key field.
    #[must_use]
    pub const fn new(name: &'static str, key: fn(&R) -> i64) -> Self {
        Self { name, key }
    }
}

impl<R> Clone for KeyField<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for KeyField<R> {}

impl<R> fmt::Debug for KeyField<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyField").field("name", &self.name).finish()
    }
}

/// Lifecycle state of a [`JoinIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    /// Accepting inserts.
    Collecting,
    /// Sorted by the named key field, read-only for inserts.
    Frozen(&'static str),
}

/// Sorted record container with an insert-then-freeze lifecycle.
#[derive(Debug)]
pub struct JoinIndex<R> {
    name: &'static str,
    records: Vec<R>,
    phase: IndexPhase,
}

impl<R> JoinIndex<R> {
    /// Creates an empty index. `name` only shows up in logs and panics.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            records: Vec::new(),
            phase: IndexPhase::Collecting,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> IndexPhase {
        self.phase
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends a record.
    ///
    /// # Panics
    ///
    /// Panics if the index is frozen.
    pub fn insert(&mut self, record: R) {
        if let IndexPhase::Frozen(key) = self.phase {
            panic!(
                "join index `{}`: insert after freeze (frozen by `{key}`)",
                self.name
            );
        }
        self.records.push(record);
    }

    /// Sorts the records by `field` (stable) and closes the index for
    /// inserts. Freezing again by the same field is a no-op.
    pub fn freeze(&mut self, field: KeyField<R>) {
        if self.phase == IndexPhase::Frozen(field.name) {
            return;
        }
        self.records.sort_by_key(|r| (field.key)(r));
        self.phase = IndexPhase::Frozen(field.name);
        log::debug!(
            "join index `{}`: frozen by `{}` ({} records)",
            self.name,
            field.name,
            self.records.len()
        );
    }

    fn assert_frozen_by(&self, field: KeyField<R>) {
        match self.phase {
            IndexPhase::Frozen(name) if name == field.name => {}
            IndexPhase::Frozen(name) => panic!(
                "join index `{}`: queried by `{}` but frozen by `{name}`",
                self.name, field.name
            ),
            IndexPhase::Collecting => panic!(
                "join index `{}`: queried by `{}` before freeze",
                self.name, field.name
            ),
        }
    }

    /// Position of the first record whose key equals `key`.
    ///
    /// # Panics
    ///
    /// Panics if the index is not frozen by `field`.
    #[must_use]
    pub fn find(&self, key: i64, field: KeyField<R>) -> Option<usize> {
        self.assert_frozen_by(field);
        let start = self.records.partition_point(|r| (field.key)(r) < key);
        self.records
            .get(start)
            .filter(|r| (field.key)(r) == key)
            .map(|_| start)
    }

    /// Iterates the contiguous run of records with key `key`, starting at
    /// `start` (normally the result of [`Self::find`]).
    ///
    /// # Panics
    ///
    /// Panics if the index is not frozen by `field`.
    pub fn find_all(
        &self,
        start: usize,
        key: i64,
        field: KeyField<R>,
    ) -> impl Iterator<Item = &R> + '_ {
        self.assert_frozen_by(field);
        self.records
            .get(start..)
            .unwrap_or_default()
            .iter()
            .take_while(move |r| (field.key)(r) == key)
    }

    /// Mutable variant of [`Self::find_all`]. Callers must not change the
    /// key field of the yielded records.
    ///
    /// # Panics
    ///
    /// Panics if the index is not frozen by `field`.
    pub fn find_all_mut(
        &mut self,
        start: usize,
        key: i64,
        field: KeyField<R>,
    ) -> impl Iterator<Item = &mut R> + '_ {
        self.assert_frozen_by(field);
        self.records
            .get_mut(start..)
            .unwrap_or_default()
            .iter_mut()
            .take_while(move |r| (field.key)(r) == key)
    }

    /// The whole run of records with key `key`. Empty when there is none.
    ///
    /// # Panics
    ///
    /// Panics if the index is not frozen by `field`.
    #[must_use]
    pub fn run(&self, key: i64, field: KeyField<R>) -> &[R] {
        let Some(start) = self.find(key, field) else {
            return &[];
        };
        let len = self.records[start..]
            .iter()
            .take_while(|r| (field.key)(r) == key)
            .count();
        &self.records[start..start + len]
    }

    /// Applies `f` to every record with key `key`. Returns how many records
    /// were visited.
    ///
    /// # Panics
    ///
    /// Panics if the index is not frozen by `field`.
    pub fn update_run(&mut self, key: i64, field: KeyField<R>, mut f: impl FnMut(&mut R)) -> usize {
        let Some(start) = self.find(key, field) else {
            return 0;
        };
        let mut count = 0;
        for record in self.find_all_mut(start, key, field) {
            f(record);
            count += 1;
        }
        count
    }

    /// All records in the current order.
    #[must_use]
    pub fn records(&self) -> &[R] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Pair {
        left: i64,
        right: i64,
        payload: u32,
    }

    const fn left(p: &Pair) -> i64 {
        p.left
    }

    const fn right(p: &Pair) -> i64 {
        p.right
    }

    const LEFT: KeyField<Pair> = KeyField::new("left", left);
    const RIGHT: KeyField<Pair> = KeyField::new("right", right);

    fn pair(left: i64, right: i64, payload: u32) -> Pair {
        Pair {
            left,
            right,
            payload,
        }
    }

    fn sample() -> JoinIndex<Pair> {
        let mut index = JoinIndex::new("pairs");
        for (i, (l, r)) in [(5, 1), (3, 2), (5, 3), (1, 1), (3, 1), (5, 2), (9, 9)]
            .into_iter()
            .enumerate()
        {
            index.insert(pair(l, r, u32::try_from(i).unwrap()));
        }
        index
    }

    #[test]
    fn find_all_returns_exactly_the_matching_records() {
        let mut index = sample();
        let inserted: Vec<Pair> = index.records().to_vec();
        index.freeze(LEFT);

        for key in [1, 3, 5, 9] {
            let start = index.find(key, LEFT).unwrap();
            let mut found: Vec<Pair> = index.find_all(start, key, LEFT).cloned().collect();
            let mut expected: Vec<Pair> =
                inserted.iter().filter(|p| p.left == key).cloned().collect();
            found.sort_by_key(|p| p.payload);
            expected.sort_by_key(|p| p.payload);
            assert_eq!(found, expected, "key {key}");
        }

        assert_eq!(index.find(4, LEFT), None);
        assert_eq!(index.find(100, LEFT), None);
        assert!(index.run(4, LEFT).is_empty());
    }

    #[test]
    fn freeze_is_stable_and_refreeze_resorts() {
        let mut index = sample();
        index.freeze(LEFT);
        let run: Vec<u32> = index.run(5, LEFT).iter().map(|p| p.payload).collect();
        assert_eq!(run, vec![0, 2, 5]);

        index.freeze(RIGHT);
        assert_eq!(index.phase(), IndexPhase::Frozen("right"));
        let run: Vec<i64> = index.run(1, RIGHT).iter().map(|p| p.left).collect();
        assert_eq!(run, vec![1, 3, 5]);
    }

    #[test]
    fn find_all_mut_updates_in_place() {
        let mut index = sample();
        index.freeze(LEFT);
        let visited = index.update_run(3, LEFT, |p| p.payload = 100);
        assert_eq!(visited, 2);
        assert!(index.run(3, LEFT).iter().all(|p| p.payload == 100));
        assert_eq!(index.len(), 7);
    }

    #[test]
    #[should_panic(expected = "before freeze")]
    fn query_before_freeze_panics() {
        let index = sample();
        let _ = index.find_all(0, 5, LEFT).count();
    }

    #[test]
    #[should_panic(expected = "insert after freeze")]
    fn insert_after_freeze_panics() {
        let mut index = sample();
        index.freeze(LEFT);
        index.insert(pair(0, 0, 0));
    }

    #[test]
    #[should_panic(expected = "frozen by `left`")]
    fn query_with_other_key_panics() {
        let mut index = sample();
        index.freeze(LEFT);
        let _ = index.find(1, RIGHT);
    }
}
