//! Per-track interval index: `[start, end) -> key` with overlap and point queries.
//!
//! Augmented AVL tree ordered by `(start, key)`. Every node caches the largest
//! `end` in its subtree so queries skip subtrees that end before the window.
//!
//! # Query semantics
//!
//! - Range `search(a, b)` with `a < b`: half-open overlap, `start < b && end > a`.
//! - Point `search_point(p)`: `start <= p < end`.
//! - Degenerate intervals (`start == end`, instantaneous markers) match any
//!   query whose closed range `[a, b]` contains the instant, so a point query
//!   exactly at the marker finds it.
//!
//! Results are ordered by `start`, ties broken by key.
//!
//! Malformed intervals (non-finite or inverted) are logged and rejected; the
//! rest of the index is unaffected.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

type Link<K> = Option<Box<Node<K>>>;

#[derive(Debug, Clone)]
struct Node<K> {
    start: f64,
    end: f64,
    key: K,
    max_end: f64,
    height: i32,
    left: Link<K>,
    right: Link<K>,
}

impl<K: Ord> Node<K> {
    fn leaf(start: f64, end: f64, key: K) -> Box<Self> {
        Box::new(Self {
            start,
            end,
            key,
            max_end: end,
            height: 1,
            left: None,
            right: None,
        })
    }

    fn cmp_to(&self, start: f64, key: &K) -> Ordering {
        self.start.total_cmp(&start).then_with(|| self.key.cmp(key))
    }
}

/// True if `[start, end)` matches the closed query range `[a, b]`.
fn matches(start: f64, end: f64, a: f64, b: f64) -> bool {
    if start == end {
        a <= start && start <= b
    } else if a == b {
        start <= a && a < end
    } else {
        start < b && end > a
    }
}

fn height<K>(link: &Link<K>) -> i32 {
    link.as_ref().map_or(0, |n| n.height)
}

fn max_end<K>(link: &Link<K>) -> f64 {
    link.as_ref().map_or(f64::NEG_INFINITY, |n| n.max_end)
}

fn update<K>(node: &mut Node<K>) {
    node.height = 1 + height(&node.left).max(height(&node.right));
    node.max_end = node.end.max(max_end(&node.left)).max(max_end(&node.right));
}

fn rotate_right<K>(mut node: Box<Node<K>>) -> Box<Node<K>> {
    let Some(mut pivot) = node.left.take() else {
        return node;
    };
    node.left = pivot.right.take();
    update(&mut node);
    pivot.right = Some(node);
    update(&mut pivot);
    pivot
}

fn rotate_left<K>(mut node: Box<Node<K>>) -> Box<Node<K>> {
    let Some(mut pivot) = node.right.take() else {
        return node;
    };
    node.right = pivot.left.take();
    update(&mut node);
    pivot.left = Some(node);
    update(&mut pivot);
    pivot
}

fn balance<K>(mut node: Box<Node<K>>) -> Box<Node<K>> {
    update(&mut node);
    let factor = height(&node.left) - height(&node.right);

    if factor > 1 {
        if let Some(left) = node.left.take() {
            let left = if height(&left.left) < height(&left.right) {
                rotate_left(left)
            } else {
                left
            };
            node.left = Some(left);
        }
        return rotate_right(node);
    }

    if factor < -1 {
        if let Some(right) = node.right.take() {
            let right = if height(&right.right) < height(&right.left) {
                rotate_right(right)
            } else {
                right
            };
            node.right = Some(right);
        }
        return rotate_left(node);
    }

    node
}

fn insert_node<K: Ord>(link: Link<K>, new: Box<Node<K>>) -> Box<Node<K>> {
    let Some(mut node) = link else {
        return new;
    };
    match node.cmp_to(new.start, &new.key) {
        Ordering::Greater => node.left = Some(insert_node(node.left.take(), new)),
        _ => node.right = Some(insert_node(node.right.take(), new)),
    }
    balance(node)
}

/// Detach the leftmost node. Returns (remaining subtree, detached node).
fn take_min<K>(mut node: Box<Node<K>>) -> (Link<K>, Box<Node<K>>) {
    match node.left.take() {
        None => {
            let rest = node.right.take();
            (rest, node)
        }
        Some(left) => {
            let (rest, min) = take_min(left);
            node.left = rest;
            (Some(balance(node)), min)
        }
    }
}

fn remove_node<K: Ord>(link: Link<K>, start: f64, key: &K) -> (Link<K>, bool) {
    let Some(mut node) = link else {
        return (None, false);
    };
    match node.cmp_to(start, key) {
        Ordering::Greater => {
            let (left, removed) = remove_node(node.left.take(), start, key);
            node.left = left;
            (Some(balance(node)), removed)
        }
        Ordering::Less => {
            let (right, removed) = remove_node(node.right.take(), start, key);
            node.right = right;
            (Some(balance(node)), removed)
        }
        Ordering::Equal => {
            let left = node.left.take();
            let right = node.right.take();
            let replacement = match (left, right) {
                (None, None) => None,
                (Some(l), None) => Some(l),
                (None, Some(r)) => Some(r),
                (Some(l), Some(r)) => {
                    let (rest, mut min) = take_min(r);
                    min.left = Some(l);
                    min.right = rest;
                    Some(balance(min))
                }
            };
            (replacement, true)
        }
    }
}

/// Build a perfectly balanced subtree from the next `count` sorted items.
fn build_sorted<K, I>(count: usize, items: &mut I) -> Link<K>
where
    I: Iterator<Item = (f64, f64, K)>,
{
    if count == 0 {
        return None;
    }
    let left_count = count / 2;
    let left = build_sorted(left_count, items);
    let Some((start, end, key)) = items.next() else {
        return left;
    };
    let right = build_sorted(count - left_count - 1, items);
    let mut node = Box::new(Node {
        start,
        end,
        key,
        max_end: end,
        height: 1,
        left,
        right,
    });
    update(&mut node);
    Some(node)
}

fn collect<K: Clone>(link: &Link<K>, a: f64, b: f64, out: &mut Vec<K>) {
    let Some(node) = link else {
        return;
    };
    // Nothing below reaches the window
    if node.max_end < a {
        return;
    }
    collect(&node.left, a, b, out);
    // This node and its right subtree start after the window
    if node.start > b {
        return;
    }
    if matches(node.start, node.end, a, b) {
        out.push(node.key.clone());
    }
    collect(&node.right, a, b, out);
}

/// Interval index keyed by `K` (tag ids in practice).
///
/// `name` only labels log messages (the owning track id).
#[derive(Debug, Clone)]
pub struct IntervalIndex<K> {
    name: String,
    root: Link<K>,
    intervals: HashMap<K, (f64, f64)>,
}

impl<K> Default for IntervalIndex<K>
where
    K: Ord + Hash + Clone + Display,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> IntervalIndex<K>
where
    K: Ord + Hash + Clone + Display,
{
    pub fn new() -> Self {
        Self::named("")
    }

    /// Index whose log messages name the owning track
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
            intervals: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.intervals.contains_key(key)
    }

    /// Stored `(start, end)` for a key
    pub fn interval(&self, key: &K) -> Option<(f64, f64)> {
        self.intervals.get(key).copied()
    }

    /// Tree height (0 for empty)
    pub fn depth(&self) -> usize {
        height(&self.root) as usize
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.intervals.clear();
    }

    fn accepts(&self, start: f64, end: f64, key: &K) -> bool {
        if start.is_finite() && end.is_finite() && start <= end {
            return true;
        }
        log::warn!(
            "Track '{}': excluding malformed interval {} [{}, {})",
            self.name,
            key,
            start,
            end
        );
        false
    }

    /// Insert or replace the interval for `key`.
    ///
    /// Returns false (and leaves any previous interval for `key` removed) if
    /// the interval is malformed.
    pub fn insert(&mut self, start: f64, end: f64, key: K) -> bool {
        self.remove(&key);
        if !self.accepts(start, end, &key) {
            return false;
        }
        self.intervals.insert(key.clone(), (start, end));
        let root = self.root.take();
        self.root = Some(insert_node(root, Node::leaf(start, end, key)));
        true
    }

    /// Remove a key. Returns true if it was indexed.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some((start, _)) = self.intervals.remove(key) else {
            return false;
        };
        let (root, removed) = remove_node(self.root.take(), start, key);
        self.root = root;
        if !removed {
            log::error!("Track '{}': interval {} missing from tree", self.name, key);
        }
        removed
    }

    /// Replace the whole index in `O(n log n)` (one sort, linear build).
    ///
    /// Duplicate keys keep their last interval. Returns the number of
    /// intervals rejected as malformed.
    pub fn rebuild<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = (f64, f64, K)>,
    {
        self.clear();
        let mut rejected = 0;
        let mut latest: HashMap<K, (f64, f64)> = HashMap::new();
        for (start, end, key) in items {
            if self.accepts(start, end, &key) {
                latest.insert(key, (start, end));
            } else {
                latest.remove(&key);
                rejected += 1;
            }
        }

        let mut sorted: Vec<(f64, f64, K)> = latest
            .iter()
            .map(|(k, &(s, e))| (s, e, k.clone()))
            .collect();
        sorted.sort_by(|x, y| x.0.total_cmp(&y.0).then_with(|| x.2.cmp(&y.2)));

        let count = sorted.len();
        self.root = build_sorted(count, &mut sorted.into_iter());
        self.intervals = latest;
        rejected
    }

    /// Keys whose intervals overlap `[a, b]`, ordered by start then key.
    pub fn search(&self, a: f64, b: f64) -> Vec<K> {
        if a.is_nan() || b.is_nan() {
            return Vec::new();
        }
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let mut out = Vec::new();
        collect(&self.root, a, b, &mut out);
        out
    }

    /// Keys whose intervals contain `p` (same as `search(p, p)`)
    pub fn search_point(&self, p: f64) -> Vec<K> {
        self.search(p, p)
    }

    /// All keys in index order
    pub fn keys(&self) -> Vec<K> {
        self.search(f64::NEG_INFINITY, f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn brute_force(items: &[(f64, f64, u32)], a: f64, b: f64) -> Vec<u32> {
        let mut hits: Vec<&(f64, f64, u32)> = items
            .iter()
            .filter(|(s, e, _)| {
                if s == e {
                    a <= *s && *s <= b
                } else if a == b {
                    *s <= a && a < *e
                } else {
                    *s < b && *e > a
                }
            })
            .collect();
        hits.sort_by(|x, y| x.0.total_cmp(&y.0).then_with(|| x.2.cmp(&y.2)));
        hits.into_iter().map(|(_, _, k)| *k).collect()
    }

    fn random_items(rng: &mut StdRng, n: u32) -> Vec<(f64, f64, u32)> {
        (0..n)
            .map(|k| {
                let start: f64 = rng.random_range(0.0..1000.0);
                // Every eighth item is an instantaneous marker
                if k % 8 == 0 {
                    return (start, start, k);
                }
                let len: f64 = rng.random_range(0.01..50.0);
                (start, start + len, k)
            })
            .collect()
    }

    #[test]
    fn test_search_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let items = random_items(&mut rng, 2000);

        let mut index = IntervalIndex::named("random");
        index.rebuild(items.iter().copied());
        assert_eq!(index.len(), 2000);

        for _ in 0..500 {
            let a: f64 = rng.random_range(-10.0..1010.0);
            let b: f64 = a + rng.random_range(0.001..100.0);
            assert_eq!(index.search(a, b), brute_force(&items, a, b), "window [{}, {}]", a, b);
        }

        // Points exactly on interval and marker starts
        for (s, _, k) in items.iter().step_by(5) {
            let hits = index.search_point(*s);
            assert!(hits.contains(k), "point {} misses {}", s, k);
            assert_eq!(hits, brute_force(&items, *s, *s), "point {}", s);
        }
        // Windows whose edges sit on markers
        for (s, _, _) in items.iter().filter(|(s, e, _)| s == e).take(50) {
            assert_eq!(index.search(*s - 5.0, *s), brute_force(&items, *s - 5.0, *s));
            assert_eq!(index.search(*s, *s + 5.0), brute_force(&items, *s, *s + 5.0));
        }
    }

    #[test]
    fn test_incremental_matches_rebuild() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut items = random_items(&mut rng, 800);

        let mut index = IntervalIndex::new();
        for &(s, e, k) in &items {
            assert!(index.insert(s, e, k));
        }
        // Remove every third item
        let removed: Vec<u32> = items.iter().map(|i| i.2).filter(|k| k % 3 == 0).collect();
        for k in &removed {
            assert!(index.remove(k));
        }
        items.retain(|i| i.2 % 3 != 0);
        assert_eq!(index.len(), items.len());

        // AVL height bound: 1.44 * log2(n + 2)
        let bound = (1.45 * ((items.len() + 2) as f64).log2()).ceil() as usize;
        assert!(index.depth() <= bound, "depth {} > {}", index.depth(), bound);

        for _ in 0..300 {
            let a: f64 = rng.random_range(0.0..1000.0);
            let b: f64 = a + rng.random_range(0.5..80.0);
            assert_eq!(index.search(a, b), brute_force(&items, a, b));
        }
    }

    #[test]
    fn test_point_query_boundaries() {
        let mut index = IntervalIndex::new();
        index.insert(10.0, 20.0, "tag".to_string());

        assert_eq!(index.search_point(10.0), vec!["tag".to_string()]);
        assert_eq!(index.search_point(19.999), vec!["tag".to_string()]);
        assert!(index.search_point(20.0).is_empty());
        assert!(index.search_point(9.999).is_empty());
    }

    #[test]
    fn test_degenerate_interval() {
        let mut index = IntervalIndex::new();
        index.insert(5.0, 5.0, 1u32);
        index.insert(4.0, 6.0, 2u32);

        assert_eq!(index.search_point(5.0), vec![2, 1]);
        assert_eq!(index.search_point(5.0001), vec![2]);
        assert_eq!(index.search(0.0, 5.0), vec![2, 1]);
        assert_eq!(index.search(5.0, 10.0), vec![2, 1]);
        assert_eq!(index.search(5.5, 10.0), vec![2]);
    }

    #[test]
    fn test_malformed_excluded() {
        let mut index = IntervalIndex::named("track-1");
        let rejected = index.rebuild(vec![
            (0.0, 1.0, 1u32),
            (f64::NAN, 2.0, 2),
            (3.0, 2.0, 3),
            (2.0, f64::INFINITY, 4),
            (2.0, 3.0, 5),
        ]);
        assert_eq!(rejected, 3);
        assert_eq!(index.keys(), vec![1, 5]);
        assert!(!index.insert(f64::NAN, 1.0, 9));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_ordering_ties_by_key() {
        let mut index = IntervalIndex::new();
        index.insert(1.0, 2.0, 30u32);
        index.insert(1.0, 3.0, 10u32);
        index.insert(0.5, 1.5, 20u32);
        assert_eq!(index.search(0.0, 10.0), vec![20, 10, 30]);
    }

    #[test]
    fn test_insert_replaces_existing_key() {
        let mut index = IntervalIndex::new();
        index.insert(0.0, 1.0, 1u32);
        index.insert(5.0, 6.0, 1u32);
        assert_eq!(index.len(), 1);
        assert!(index.search_point(0.5).is_empty());
        assert_eq!(index.search_point(5.5), vec![1]);
        assert_eq!(index.interval(&1), Some((5.0, 6.0)));
    }

    #[test]
    fn test_reversed_and_nan_queries() {
        let mut index = IntervalIndex::new();
        index.insert(1.0, 2.0, 1u32);
        assert_eq!(index.search(3.0, 0.0), vec![1]);
        assert!(index.search(f64::NAN, 3.0).is_empty());
        assert!(!index.remove(&7));
    }
}
