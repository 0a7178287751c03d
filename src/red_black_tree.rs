use colored::Colorize;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::fmt::Debug;
use std::ops::{Index, IndexMut};
use thiserror::Error;

use crate::node_arena::{NodeArena, TreeField as Field, SENTINEL};

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
pub enum Color {
    Black = 0,
    Red = 1,
}

/// Exploits the fact that LEFT and RIGHT are set to 0 and 1 respectively
#[inline(always)]
fn opposite(dir: u32) -> u32 {
    1 - dir
}

/// Errors surfaced by keyed access and cursor misuse. The map never recovers
/// from these internally; they always reach the caller.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum MapError {
    /// Keyed access to a key with no entry in the map.
    #[error("key has no entry in the map")]
    KeyOutOfBound,
    /// The cursor is singular, past-the-end where an entry is required,
    /// dangling, or was issued by a different map.
    #[error("cursor is not usable with this map")]
    InvalidCursor,
}

/// Strict weak ordering over keys. Two keys are equivalent when neither
/// orders before the other; equivalent keys share one entry.
///
/// The relation must be pure and must not change while entries ordered by it
/// are stored in a map.
pub trait Comparator<K> {
    fn lt(&self, a: &K, b: &K) -> bool;
}

/// Orders keys by their `Ord` implementation.
#[derive(Debug, Default, Copy, Clone)]
pub struct NaturalOrder;

impl<K: Ord> Comparator<K> for NaturalOrder {
    #[inline(always)]
    fn lt(&self, a: &K, b: &K) -> bool {
        a < b
    }
}

/// Adapts a plain `Fn(&K, &K) -> bool` predicate to a [`Comparator`].
#[derive(Debug, Copy, Clone)]
pub struct OrderFn<F>(pub F);

impl<K, F: Fn(&K, &K) -> bool> Comparator<K> for OrderFn<F> {
    #[inline(always)]
    fn lt(&self, a: &K, b: &K) -> bool {
        (self.0)(a, b)
    }
}

#[derive(Debug, Clone)]
struct Entry<K, V> {
    key: K,
    value: V,
}

impl<K, V> Entry<K, V> {
    fn new(key: K, value: V) -> Self {
        Entry { key, value }
    }

    fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

/// Copyable handle to one entry of a [`RedBlackTree`], or to its
/// past-the-end position. A cursor borrows nothing; every access goes back
/// through the owning map, which revalidates it first.
///
/// Cursors stay usable across any mutation that leaves their entry in place.
/// Removing the referenced entry invalidates only that cursor; a cursor from
/// another map, or a default-constructed (singular) one, fails every
/// operation with [`MapError::InvalidCursor`]. Cursors of different maps
/// never compare equal.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Cursor {
    node: u32,
    map_id: usize,
}

enum SearchResult {
    Found(u32),
    Miss(u32, u32),
    Empty,
}

/// Ordered map over a red-black tree whose nodes live in a contiguous
/// [`NodeArena`]. Entry handles are slot indices, so rebalancing never
/// invalidates them. The arena is boxed so its address can double as the map
/// identity baked into every [`Cursor`]; slot 0 of that box is the per-map
/// past-the-end target.
#[derive(Clone)]
pub struct RedBlackTree<K, V, C = NaturalOrder>
where
    C: Comparator<K>,
{
    comparator: C,
    root: u32,
    arena: Box<NodeArena<Entry<K, V>>>,
}

impl<K, V, C: Comparator<K> + Default> Default for RedBlackTree<K, V, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K, V, C: Comparator<K>> RedBlackTree<K, V, C> {
    pub fn new() -> Self
    where
        C: Default,
    {
        Self::default()
    }

    pub fn with_comparator(comparator: C) -> Self {
        RedBlackTree {
            comparator,
            root: SENTINEL,
            arena: Box::new(NodeArena::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Drops every entry in one flat pass. Cursors into the map become
    /// invalid, except past-the-end ones.
    pub fn clear(&mut self) {
        self.root = SENTINEL;
        self.arena.clear();
    }

    #[inline(always)]
    fn map_id(&self) -> usize {
        &*self.arena as *const NodeArena<Entry<K, V>> as usize
    }

    #[inline(always)]
    fn make_cursor(&self, node: u32) -> Cursor {
        Cursor {
            node,
            map_id: self.map_id(),
        }
    }

    fn check_cursor(&self, at: Cursor) -> Result<u32, MapError> {
        if at.map_id != self.map_id() {
            return Err(MapError::InvalidCursor);
        }
        if at.node != SENTINEL && !self.arena.is_occupied(at.node) {
            return Err(MapError::InvalidCursor);
        }
        Ok(at.node)
    }

    #[inline(always)]
    fn get_entry(&self, node: u32) -> &Entry<K, V> {
        self.arena.get(node).value()
    }

    #[inline(always)]
    fn get_entry_mut(&mut self, node: u32) -> &mut Entry<K, V> {
        self.arena.get_mut(node).value_mut()
    }

    #[inline(always)]
    fn color_red(&mut self, node: u32) {
        if node != SENTINEL {
            self.arena
                .set_register(node, Color::Red as u32, Field::Color as u32);
        }
    }

    #[inline(always)]
    fn color_black(&mut self, node: u32) {
        self.arena
            .set_register(node, Color::Black as u32, Field::Color as u32);
    }

    #[inline(always)]
    fn color_node(&mut self, node: u32, color: u32) {
        self.arena.set_register(node, color, Field::Color as u32);
    }

    #[inline(always)]
    fn is_red(&self, node: u32) -> bool {
        self.arena.get_register(node, Field::Color as u32) == Color::Red as u32
    }

    #[inline(always)]
    fn is_black(&self, node: u32) -> bool {
        self.arena.get_register(node, Field::Color as u32) == Color::Black as u32
    }

    #[inline(always)]
    fn get_color(&self, node: u32) -> u32 {
        self.arena.get_register(node, Field::Color as u32)
    }

    #[inline(always)]
    fn get_child(&self, node: u32, dir: u32) -> u32 {
        self.arena.get_register(node, dir)
    }

    #[inline(always)]
    fn get_left(&self, node: u32) -> u32 {
        self.arena.get_register(node, Field::Left as u32)
    }

    #[inline(always)]
    fn get_right(&self, node: u32) -> u32 {
        self.arena.get_register(node, Field::Right as u32)
    }

    #[inline(always)]
    fn get_parent(&self, node: u32) -> u32 {
        self.arena.get_register(node, Field::Parent as u32)
    }

    #[inline(always)]
    fn is_leaf(&self, node: u32) -> bool {
        self.get_left(node) == SENTINEL && self.get_right(node) == SENTINEL
    }

    #[inline(always)]
    fn connect(&mut self, parent: u32, child: u32, dir: u32) {
        self.arena.connect(parent, child, dir, Field::Parent as u32);
    }

    #[inline(always)]
    fn child_dir(&self, parent: u32, child: u32) -> u32 {
        if child == self.get_left(parent) {
            Field::Left as u32
        } else if child == self.get_right(parent) {
            Field::Right as u32
        } else {
            panic!("Nodes are not connected");
        }
    }

    fn rotate_dir(&mut self, parent_index: u32, dir: u32) -> Option<u32> {
        let grandparent_index = self.get_parent(parent_index);
        if !matches!(
            FromPrimitive::from_u32(dir),
            Some(Field::Left) | Some(Field::Right),
        ) {
            return None;
        }
        let sibling_index = self.get_child(parent_index, opposite(dir));
        if sibling_index == SENTINEL {
            return None;
        }
        let child_index = self.get_child(sibling_index, dir);
        self.connect(sibling_index, parent_index, dir);
        self.connect(parent_index, child_index, opposite(dir));
        if grandparent_index != SENTINEL {
            self.connect(
                grandparent_index,
                sibling_index,
                self.child_dir(grandparent_index, parent_index),
            );
        } else {
            self.arena
                .clear_register(sibling_index, Field::Parent as u32);
            self.root = sibling_index;
        }
        Some(sibling_index)
    }

    /// Descends from the root without writing anything. A panic in the
    /// comparator therefore leaves the tree exactly as it was.
    fn search(&self, key: &K) -> SearchResult {
        let mut reference_node = self.root;
        if reference_node == SENTINEL {
            return SearchResult::Empty;
        }
        loop {
            let ref_key = &self.get_entry(reference_node).key;
            let (target, dir) = if self.comparator.lt(key, ref_key) {
                (self.get_left(reference_node), Field::Left as u32)
            } else if self.comparator.lt(ref_key, key) {
                (self.get_right(reference_node), Field::Right as u32)
            } else {
                return SearchResult::Found(reference_node);
            };
            if target == SENTINEL {
                return SearchResult::Miss(reference_node, dir);
            }
            reference_node = target;
        }
    }

    fn fix_insert(&mut self, mut node: u32) {
        while self.is_red(self.get_parent(node)) {
            let mut parent = self.get_parent(node);
            let mut grandparent = self.get_parent(parent);
            if grandparent == SENTINEL {
                assert!(parent == self.root);
                break;
            }
            let dir = self.child_dir(grandparent, parent);
            let uncle = self.get_child(grandparent, opposite(dir));
            if self.is_red(uncle) {
                self.color_black(uncle);
                self.color_black(parent);
                self.color_red(grandparent);
                node = grandparent;
            } else {
                if self.child_dir(parent, node) == opposite(dir) {
                    let _ = self.rotate_dir(parent, dir);
                    node = parent;
                }
                parent = self.get_parent(node);
                grandparent = self.get_parent(parent);
                self.color_black(parent);
                self.color_red(grandparent);
                let _ = self.rotate_dir(grandparent, opposite(dir));
            }
        }
        self.color_black(self.root);
    }

    /// Links a freshly allocated entry below `link`, or as the root when
    /// `link` is `None`, and restores the color invariants.
    fn attach_new(&mut self, link: Option<(u32, u32)>, entry: Entry<K, V>) -> u32 {
        let node = self.arena.add_node(entry);
        match link {
            None => self.root = node,
            Some((parent, dir)) => {
                self.color_red(node);
                self.connect(parent, node, dir);
                // This is only false when the parent is the root
                if self.get_parent(parent) != SENTINEL {
                    self.fix_insert(node);
                }
            }
        }
        node
    }

    /// Inserts `(key, value)`, returning a cursor to the entry and whether a
    /// new entry was created. On collision the existing value is kept and
    /// `value` is dropped.
    pub fn insert(&mut self, key: K, value: V) -> (Cursor, bool) {
        match self.search(&key) {
            SearchResult::Found(node) => (self.make_cursor(node), false),
            SearchResult::Empty => {
                let node = self.attach_new(None, Entry::new(key, value));
                (self.make_cursor(node), true)
            }
            SearchResult::Miss(parent, dir) => {
                let node = self.attach_new(Some((parent, dir)), Entry::new(key, value));
                (self.make_cursor(node), true)
            }
        }
    }

    /// Returns the value for `key`, default-constructing a new entry when
    /// the key is absent. The entry keeps its slot until removed, so the
    /// value can be revisited through a cursor later.
    pub fn get_or_insert(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let node = match self.search(&key) {
            SearchResult::Found(node) => node,
            SearchResult::Empty => self.attach_new(None, Entry::new(key, V::default())),
            SearchResult::Miss(parent, dir) => {
                self.attach_new(Some((parent, dir)), Entry::new(key, V::default()))
            }
        };
        &mut self.get_entry_mut(node).value
    }

    pub fn get(&self, key: &K) -> Result<&V, MapError> {
        match self.search(key) {
            SearchResult::Found(node) => Ok(&self.get_entry(node).value),
            _ => Err(MapError::KeyOutOfBound),
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Result<&mut V, MapError> {
        match self.search(key) {
            SearchResult::Found(node) => Ok(&mut self.get_entry_mut(node).value),
            _ => Err(MapError::KeyOutOfBound),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        matches!(self.search(key), SearchResult::Found(_))
    }

    /// Number of entries with a key equivalent to `key`: 0 or 1, since
    /// duplicates are forbidden.
    pub fn count(&self, key: &K) -> usize {
        self.contains(key) as usize
    }

    /// Cursor to the entry for `key`, or `end()` when the key is absent.
    pub fn find(&self, key: &K) -> Cursor {
        match self.search(key) {
            SearchResult::Found(node) => self.make_cursor(node),
            _ => self.end(),
        }
    }

    /// Removes the entry for `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        match self.search(key) {
            SearchResult::Found(node) => Some(self.unlink(node).into_pair().1),
            _ => None,
        }
    }

    /// Removes the entry the cursor points at and returns the payload. The
    /// cursor must reference a live entry of this map; past-the-end,
    /// singular, dangling and foreign cursors are rejected.
    pub fn remove_at(&mut self, at: Cursor) -> Result<(K, V), MapError> {
        let node = self.check_cursor(at)?;
        if node == SENTINEL {
            return Err(MapError::InvalidCursor);
        }
        Ok(self.unlink(node).into_pair())
    }

    /// Detaches `node` from the tree, rebalances, and hands back its payload.
    fn unlink(&mut self, node: u32) -> Entry<K, V> {
        if self.get_left(node) != SENTINEL && self.get_right(node) != SENTINEL {
            let successor = self.find_min(self.get_right(node));
            self.swap_positions(node, successor);
        }
        // At most one child from here on.
        if self.is_leaf(node) {
            if node == self.root {
                self.root = SENTINEL;
            } else {
                // Rebalance around the doomed leaf while it still occupies
                // its position, then cut it loose.
                if self.is_black(node) {
                    self.fix_remove(node);
                }
                let parent = self.get_parent(node);
                self.arena
                    .clear_register(parent, self.child_dir(parent, node));
            }
        } else {
            let left = self.get_left(node);
            let child = if left != SENTINEL {
                left
            } else {
                self.get_right(node)
            };
            let was_black = self.is_black(node);
            self.transplant(node, child);
            if was_black {
                self.fix_remove(child);
            }
        }
        self.detach_payload(node)
    }

    /// Exchanges the tree positions and colors of `node` and `successor`
    /// (the minimum of `node`'s right subtree) by relinking only. Payloads
    /// never move between slots, so handles to the surviving entry keep
    /// observing it.
    fn swap_positions(&mut self, node: u32, successor: u32) {
        let node_left = self.get_left(node);
        let node_right = self.get_right(node);
        let succ_right = self.get_right(successor);
        let node_color = self.get_color(node);
        let succ_color = self.get_color(successor);

        if successor == node_right {
            self.transplant(node, successor);
            self.connect(successor, node, Field::Right as u32);
        } else {
            // The successor sits leftmost in the right subtree, so it is its
            // parent's left child.
            let succ_parent = self.get_parent(successor);
            self.transplant(node, successor);
            self.connect(succ_parent, node, Field::Left as u32);
            self.connect(successor, node_right, Field::Right as u32);
        }
        self.connect(successor, node_left, Field::Left as u32);
        self.connect(node, succ_right, Field::Right as u32);
        self.arena.clear_register(node, Field::Left as u32);
        self.color_node(node, succ_color);
        self.color_node(successor, node_color);
    }

    fn fix_remove(&mut self, mut node: u32) {
        while node != self.root && self.is_black(node) {
            let parent = self.get_parent(node);
            let dir = self.child_dir(parent, node);
            let mut sibling = self.get_child(parent, opposite(dir));
            if self.is_red(sibling) {
                self.color_black(sibling);
                self.color_red(parent);
                let _ = self.rotate_dir(parent, dir);
                sibling = self.get_child(parent, opposite(dir));
            }
            if self.is_black(self.get_left(sibling)) && self.is_black(self.get_right(sibling)) {
                self.color_red(sibling);
                node = parent;
            } else {
                if self.is_black(self.get_child(sibling, opposite(dir))) {
                    self.color_black(self.get_child(sibling, dir));
                    self.color_red(sibling);
                    let _ = self.rotate_dir(sibling, opposite(dir));
                    sibling = self.get_child(parent, opposite(dir));
                }
                self.color_node(sibling, self.get_color(parent));
                self.color_black(parent);
                self.color_black(self.get_child(sibling, opposite(dir)));
                let _ = self.rotate_dir(parent, dir);
                node = self.root;
            }
        }
        self.color_black(node);
    }

    /// This helper function connects the parent of `target` to `source`.
    /// It is the start of the process of removing `target` from the tree.
    #[inline(always)]
    fn transplant(&mut self, target: u32, source: u32) {
        let parent = self.get_parent(target);
        if parent == SENTINEL {
            self.root = source;
            self.arena
                .set_register(source, SENTINEL, Field::Parent as u32);
            return;
        }
        let dir = self.child_dir(parent, target);
        self.connect(parent, source, dir);
    }

    fn detach_payload(&mut self, node: u32) -> Entry<K, V> {
        self.arena.clear_register(node, Field::Left as u32);
        self.arena.clear_register(node, Field::Right as u32);
        self.arena.clear_register(node, Field::Parent as u32);
        self.arena.clear_register(node, Field::Color as u32);
        self.arena
            .remove_node(node)
            .expect("detached node was occupied")
    }

    fn find_min(&self, index: u32) -> u32 {
        let mut node = index;
        while self.get_left(node) != SENTINEL {
            node = self.get_left(node);
        }
        node
    }

    fn find_max(&self, index: u32) -> u32 {
        let mut node = index;
        while self.get_right(node) != SENTINEL {
            node = self.get_right(node);
        }
        node
    }

    /// In-order successor, or the sentinel when `node` is the maximum.
    fn successor(&self, node: u32) -> u32 {
        let right = self.get_right(node);
        if right != SENTINEL {
            return self.find_min(right);
        }
        let mut child = node;
        let mut parent = self.get_parent(child);
        while parent != SENTINEL && self.child_dir(parent, child) == Field::Right as u32 {
            child = parent;
            parent = self.get_parent(child);
        }
        parent
    }

    /// In-order predecessor, or the sentinel when `node` is the minimum.
    fn predecessor(&self, node: u32) -> u32 {
        let left = self.get_left(node);
        if left != SENTINEL {
            return self.find_max(left);
        }
        let mut child = node;
        let mut parent = self.get_parent(child);
        while parent != SENTINEL && self.child_dir(parent, child) == Field::Left as u32 {
            child = parent;
            parent = self.get_parent(child);
        }
        parent
    }

    /// Cursor to the minimum entry, or `end()` on an empty map.
    pub fn begin(&self) -> Cursor {
        if self.root == SENTINEL {
            self.end()
        } else {
            self.make_cursor(self.find_min(self.root))
        }
    }

    /// The past-the-end cursor. Equal to `begin()` exactly when the map is
    /// empty.
    pub fn end(&self) -> Cursor {
        self.make_cursor(SENTINEL)
    }

    /// Cursor one entry after `at` in ascending key order; stepping off the
    /// maximum lands on `end()`. Advancing `end()` is an error.
    pub fn next(&self, at: Cursor) -> Result<Cursor, MapError> {
        let node = self.check_cursor(at)?;
        if node == SENTINEL {
            return Err(MapError::InvalidCursor);
        }
        Ok(self.make_cursor(self.successor(node)))
    }

    /// Cursor one entry before `at`; stepping back from `end()` lands on the
    /// maximum. Stepping before the first entry, or back from `end()` on an
    /// empty map, is an error.
    pub fn prev(&self, at: Cursor) -> Result<Cursor, MapError> {
        let node = self.check_cursor(at)?;
        let target = if node == SENTINEL {
            if self.root == SENTINEL {
                return Err(MapError::InvalidCursor);
            }
            self.find_max(self.root)
        } else {
            let predecessor = self.predecessor(node);
            if predecessor == SENTINEL {
                return Err(MapError::InvalidCursor);
            }
            predecessor
        };
        Ok(self.make_cursor(target))
    }

    /// The entry `at` points to. Past-the-end cursors hold no entry.
    pub fn get_at(&self, at: Cursor) -> Result<(&K, &V), MapError> {
        let node = self.check_cursor(at)?;
        if node == SENTINEL {
            return Err(MapError::InvalidCursor);
        }
        let entry = self.get_entry(node);
        Ok((&entry.key, &entry.value))
    }

    /// Like [`get_at`](Self::get_at) with the value writable in place. The
    /// key stays immutable.
    pub fn get_at_mut(&mut self, at: Cursor) -> Result<(&K, &mut V), MapError> {
        let node = self.check_cursor(at)?;
        if node == SENTINEL {
            return Err(MapError::InvalidCursor);
        }
        let entry = self.get_entry_mut(node);
        Ok((&entry.key, &mut entry.value))
    }

    pub fn iter(&self) -> Iter<'_, K, V, C> {
        Iter {
            tree: self,
            stack: vec![],
            rev_stack: vec![],
            node: self.root,
            rev_node: self.root,
            remaining: self.len(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V, C> {
        let node = self.root;
        let remaining = self.len();
        IterMut {
            tree: self,
            stack: vec![],
            rev_stack: vec![],
            node,
            rev_node: node,
            remaining,
        }
    }

    pub fn pretty_print(&self)
    where
        K: Debug,
    {
        let mut s = String::new();
        let mut stack = vec![(self.root, String::new(), String::new())];
        while let Some((node, mut padding, pointer)) = stack.pop() {
            if node == SENTINEL {
                continue;
            }
            let label = format!("{:?}", self.get_entry(node).key);
            s.push_str(&padding);
            s.push_str(&pointer);
            if self.is_red(node) {
                s.push_str(&label.red().to_string());
            } else {
                s.push_str(&label);
            }
            s.push('\n');
            padding.push_str("│  ");

            let right_pointer = "└──".to_string();
            let left_pointer = if self.get_right(node) != SENTINEL {
                "├──".to_string()
            } else {
                "└──".to_string()
            };
            stack.push((self.get_right(node), padding.clone(), right_pointer));
            stack.push((self.get_left(node), padding.clone(), left_pointer));
        }
        println!("{}", s);
    }

    /// Structural self-check: color and black-height invariants, parent
    /// coherence, strictly ascending key order, size accounting, and
    /// sentinel isolation. Intended for tests and debugging.
    pub fn is_valid_red_black_tree(&self) -> bool {
        // The root is black and parentless
        if self.is_red(self.root) {
            return false;
        }
        if self.root != SENTINEL && self.get_parent(self.root) != SENTINEL {
            return false;
        }
        // The sentinel links to nothing
        for field in 0..crate::node_arena::NUM_REGISTERS {
            if self.arena.get_register(SENTINEL, field as u32) != SENTINEL {
                return false;
            }
        }

        let mut stack = vec![(self.root, 0u32)];
        let mut black_count: Vec<u32> = vec![];
        let mut reachable = 0usize;
        while let Some((node, count)) = stack.pop() {
            if node == SENTINEL {
                black_count.push(count);
                continue;
            }
            reachable += 1;
            let count = count + self.is_black(node) as u32;
            for child in [self.get_left(node), self.get_right(node)] {
                if child != SENTINEL {
                    // Red nodes cannot have red children
                    if self.is_red(node) && self.is_red(child) {
                        return false;
                    }
                    if self.get_parent(child) != node {
                        return false;
                    }
                }
                stack.push((child, count));
            }
        }
        if reachable != self.len() {
            return false;
        }
        // All paths from the root to an absent child cross the same number
        // of black nodes
        if !black_count.iter().all(|&c| c == black_count[0]) {
            return false;
        }

        let keys: Vec<&K> = self.iter().map(|(k, _)| k).collect();
        keys.windows(2).all(|w| self.comparator.lt(w[0], w[1]))
    }
}

impl<'a, K, V, C: Comparator<K>> IntoIterator for &'a RedBlackTree<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, C>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, C: Comparator<K>> IntoIterator for &'a mut RedBlackTree<K, V, C> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V, C>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

/// Borrowing in-order iterator. The two ends keep independent descent
/// frontiers and share a remaining-count, so interleaved `next`/`next_back`
/// calls partition the sequence without overlap.
pub struct Iter<'a, K, V, C: Comparator<K>> {
    tree: &'a RedBlackTree<K, V, C>,
    stack: Vec<u32>,
    rev_stack: Vec<u32>,
    node: u32,
    rev_node: u32,
    remaining: usize,
}

impl<'a, K, V, C: Comparator<K>> Iterator for Iter<'a, K, V, C> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        while !self.stack.is_empty() || self.node != SENTINEL {
            if self.node != SENTINEL {
                self.stack.push(self.node);
                self.node = self.tree.get_left(self.node);
            } else {
                let index = self.stack.pop().unwrap();
                self.node = self.tree.get_right(index);
                self.remaining -= 1;
                let entry = self.tree.get_entry(index);
                return Some((&entry.key, &entry.value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V, C: Comparator<K>> DoubleEndedIterator for Iter<'a, K, V, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        while !self.rev_stack.is_empty() || self.rev_node != SENTINEL {
            if self.rev_node != SENTINEL {
                self.rev_stack.push(self.rev_node);
                self.rev_node = self.tree.get_right(self.rev_node);
            } else {
                let index = self.rev_stack.pop().unwrap();
                self.rev_node = self.tree.get_left(index);
                self.remaining -= 1;
                let entry = self.tree.get_entry(index);
                return Some((&entry.key, &entry.value));
            }
        }
        None
    }
}

/// Borrowing in-order iterator with writable values.
pub struct IterMut<'a, K, V, C: Comparator<K>> {
    tree: &'a mut RedBlackTree<K, V, C>,
    stack: Vec<u32>,
    rev_stack: Vec<u32>,
    node: u32,
    rev_node: u32,
    remaining: usize,
}

impl<'a, K, V, C: Comparator<K>> Iterator for IterMut<'a, K, V, C> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        while !self.stack.is_empty() || self.node != SENTINEL {
            if self.node != SENTINEL {
                self.stack.push(self.node);
                self.node = self.tree.get_left(self.node);
            } else {
                let index = self.stack.pop().unwrap();
                self.node = self.tree.get_right(index);
                self.remaining -= 1;
                // Each occupied slot is yielded at most once, so the
                // exclusive borrows handed out never alias.
                unsafe {
                    let slot = &mut *self.tree.arena.slots.as_mut_ptr().add(index as usize);
                    let entry = slot.value_mut();
                    return Some((&entry.key, &mut entry.value));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V, C: Comparator<K>> DoubleEndedIterator for IterMut<'a, K, V, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        while !self.rev_stack.is_empty() || self.rev_node != SENTINEL {
            if self.rev_node != SENTINEL {
                self.rev_stack.push(self.rev_node);
                self.rev_node = self.tree.get_right(self.rev_node);
            } else {
                let index = self.rev_stack.pop().unwrap();
                self.rev_node = self.tree.get_left(index);
                self.remaining -= 1;
                unsafe {
                    let slot = &mut *self.tree.arena.slots.as_mut_ptr().add(index as usize);
                    let entry = slot.value_mut();
                    return Some((&entry.key, &mut entry.value));
                }
            }
        }
        None
    }
}

impl<K, V, C: Comparator<K>> Index<&K> for RedBlackTree<K, V, C> {
    type Output = V;

    fn index(&self, index: &K) -> &Self::Output {
        self.get(index).unwrap()
    }
}

impl<K, V, C: Comparator<K>> IndexMut<&K> for RedBlackTree<K, V, C> {
    fn index_mut(&mut self, index: &K) -> &mut Self::Output {
        self.get_mut(index).unwrap()
    }
}

#[test]
/// This test addresses the case where a node's parent and uncle are both red.
/// This is resolved by coloring the parent and uncle black and the grandparent red.
fn test_insert_with_red_parent_and_uncle() {
    let mut tree = RedBlackTree::<u64, u64>::new();
    let addrs: Vec<u32> = [61, 52, 85, 76, 93]
        .iter()
        .map(|k| tree.insert(*k, 0).0.node)
        .collect();

    let parent = addrs[4];
    let uncle = addrs[3];
    let grandparent = addrs[2];

    assert_eq!(tree.get_left(addrs[0]), addrs[1]);
    assert_eq!(tree.get_right(addrs[0]), grandparent);
    assert_eq!(tree.get_parent(addrs[1]), addrs[0]);
    assert_eq!(tree.get_parent(grandparent), addrs[0]);

    assert_eq!(tree.get_left(grandparent), uncle);
    assert_eq!(tree.get_right(grandparent), parent);
    assert_eq!(tree.get_parent(uncle), grandparent);
    assert_eq!(tree.get_parent(parent), grandparent);

    assert!(tree.is_black(addrs[0]) && tree.is_black(addrs[1]) && tree.is_black(grandparent));
    assert!(tree.is_red(uncle) && tree.is_red(parent));

    let leaf = tree.insert(100, 0).0.node;

    assert!(
        tree.is_black(addrs[0])
            && tree.is_black(addrs[1])
            && tree.is_black(uncle)
            && tree.is_black(parent)
    );
    assert!(tree.is_red(grandparent) && tree.is_red(leaf));
    assert!(tree.is_valid_red_black_tree());
}

#[test]
/// This test addresses the case where a node's parent (P) is red and uncle is black.
/// The new leaf (L) is the right child of the parent and the parent is the right
/// child of the grandparent (G).
///
/// "P is right child of G and L is right child of P."
///
/// We resolve this by rotating the grandparent left and then
/// fixing the colors.
fn test_right_insert_with_red_right_child_parent_and_black_uncle() {
    let mut tree = RedBlackTree::<u64, u64>::new();
    let addrs: Vec<u32> = [61, 52, 85, 93]
        .iter()
        .map(|k| tree.insert(*k, 0).0.node)
        .collect();

    let parent = addrs[3];
    // Uncle is black as it is null
    let grandparent = addrs[2];

    assert!(tree.is_black(addrs[0]) && tree.is_black(addrs[1]) && tree.is_black(grandparent));
    assert!(tree.is_red(parent));

    assert_eq!(tree.get_left(addrs[0]), addrs[1]);
    assert_eq!(tree.get_right(addrs[0]), grandparent);
    assert_eq!(tree.get_parent(addrs[1]), addrs[0]);
    assert_eq!(tree.get_parent(grandparent), addrs[0]);

    assert_eq!(tree.get_left(grandparent), SENTINEL);
    assert_eq!(tree.get_right(grandparent), parent);
    assert_eq!(tree.get_parent(parent), grandparent);

    let leaf = tree.insert(100, 0).0.node;

    assert!(tree.is_black(addrs[0]) && tree.is_black(addrs[1]) && tree.is_black(parent));
    assert!(tree.is_red(grandparent) && tree.is_red(leaf));

    assert_eq!(tree.get_left(addrs[0]), addrs[1]);
    assert_eq!(tree.get_right(addrs[0]), parent);
    assert_eq!(tree.get_parent(addrs[1]), addrs[0]);
    assert_eq!(tree.get_parent(parent), addrs[0]);

    assert_eq!(tree.get_left(parent), grandparent);
    assert_eq!(tree.get_right(parent), leaf);
    assert_eq!(tree.get_parent(grandparent), parent);
    assert_eq!(tree.get_parent(leaf), parent);
    assert!(tree.is_leaf(leaf) && tree.is_leaf(grandparent));
}

#[test]
/// This test addresses the case where a node's parent is red and uncle is black.
/// The new leaf is the left child of the parent and the parent is the right
/// child of the grandparent.
///
/// "P is right child of G and L is left child of P."
///
/// We resolve this by rotating the parent right then applying the same
/// algorithm as the previous test.
fn test_left_insert_with_red_right_child_parent_and_black_uncle() {
    let mut tree = RedBlackTree::<u64, u64>::new();
    let addrs: Vec<u32> = [61, 52, 85, 93]
        .iter()
        .map(|k| tree.insert(*k, 0).0.node)
        .collect();

    let parent = addrs[3];
    // Uncle is black as it is null
    let grandparent = addrs[2];

    let leaf = tree.insert(87, 0).0.node;

    assert!(tree.is_black(addrs[0]) && tree.is_black(addrs[1]) && tree.is_black(leaf));
    assert!(tree.is_red(grandparent) && tree.is_red(parent));

    assert_eq!(tree.get_left(addrs[0]), addrs[1]);
    assert_eq!(tree.get_right(addrs[0]), leaf);
    assert_eq!(tree.get_parent(addrs[1]), addrs[0]);
    assert_eq!(tree.get_parent(leaf), addrs[0]);

    assert_eq!(tree.get_left(leaf), grandparent);
    assert_eq!(tree.get_right(leaf), parent);
    assert_eq!(tree.get_parent(grandparent), leaf);
    assert_eq!(tree.get_parent(parent), leaf);
    assert!(tree.is_leaf(parent) && tree.is_leaf(grandparent));
}

#[test]
/// This test addresses the case where a node's parent is red and uncle is black.
/// The new leaf is the left child of the parent and the parent is the left
/// child of the grandparent.
///
/// "P is left child of G and L is left child of P."
///
/// We resolve this by rotating the grandparent right and then
/// fixing the colors.
fn test_left_insert_with_red_left_child_parent_and_black_uncle() {
    let mut tree = RedBlackTree::<u64, u64>::new();
    let addrs: Vec<u32> = [61, 85, 52, 41]
        .iter()
        .map(|k| tree.insert(*k, 0).0.node)
        .collect();

    let parent = addrs[3];
    // Uncle is black as it is null
    let grandparent = addrs[2];

    assert_eq!(tree.get_right(grandparent), SENTINEL);
    assert_eq!(tree.get_left(grandparent), parent);
    assert_eq!(tree.get_parent(parent), grandparent);

    let leaf = tree.insert(25, 0).0.node;

    assert!(tree.is_black(addrs[0]) && tree.is_black(addrs[1]) && tree.is_black(parent));
    assert!(tree.is_red(grandparent) && tree.is_red(leaf));

    assert_eq!(tree.get_right(addrs[0]), addrs[1]);
    assert_eq!(tree.get_left(addrs[0]), parent);

    assert_eq!(tree.get_right(parent), grandparent);
    assert_eq!(tree.get_left(parent), leaf);
    assert_eq!(tree.get_parent(grandparent), parent);
    assert_eq!(tree.get_parent(leaf), parent);
    assert!(tree.is_leaf(leaf) && tree.is_leaf(grandparent));
}

#[test]
/// This test addresses the case where a node's parent is red and uncle is black.
/// The new leaf is the right child of the parent and the parent is the left
/// child of the grandparent.
///
/// "P is left child of G and L is right child of P."
///
/// We resolve this by rotating the parent left then applying the same
/// algorithm as the previous test.
fn test_right_insert_with_red_left_child_parent_and_black_uncle() {
    let mut tree = RedBlackTree::<u64, u64>::new();
    let addrs: Vec<u32> = [61, 85, 52, 41]
        .iter()
        .map(|k| tree.insert(*k, 0).0.node)
        .collect();

    let parent = addrs[3];
    // Uncle is black as it is null
    let grandparent = addrs[2];

    let leaf = tree.insert(47, 0).0.node;

    assert!(tree.is_black(addrs[0]) && tree.is_black(addrs[1]) && tree.is_black(leaf));
    assert!(tree.is_red(grandparent) && tree.is_red(parent));

    assert_eq!(tree.get_right(addrs[0]), addrs[1]);
    assert_eq!(tree.get_left(addrs[0]), leaf);

    assert_eq!(tree.get_right(leaf), grandparent);
    assert_eq!(tree.get_left(leaf), parent);
    assert_eq!(tree.get_parent(grandparent), leaf);
    assert_eq!(tree.get_parent(parent), leaf);
    assert!(tree.is_leaf(parent) && tree.is_leaf(grandparent));
}

#[test]
/// Removing a node with two children must move its in-order successor into
/// the vacated position by relinking, leaving the successor's slot (and any
/// handle to it) untouched.
fn test_remove_two_children_relinks_successor() {
    let mut tree = RedBlackTree::<u64, &str>::new();
    for k in [50, 25, 75, 60, 90, 55] {
        tree.insert(k, "v");
    }
    assert!(tree.is_valid_red_black_tree());

    let victim = tree.find(&50).node;
    let successor = tree.find(&55).node;
    assert_eq!(tree.root, victim);

    assert_eq!(tree.remove(&50), Some("v"));
    assert!(tree.is_valid_red_black_tree());
    assert_eq!(tree.len(), 5);

    // The successor was promoted in place of the removed root.
    assert_eq!(tree.root, successor);
    assert_eq!(tree.find(&55).node, successor);
    assert!(!tree.arena.is_occupied(victim));
}

#[test]
/// Exercises the relink path where the successor is the victim's own right
/// child.
fn test_remove_with_adjacent_successor() {
    let mut tree = RedBlackTree::<u64, u64>::new();
    for k in [20, 10, 30, 25, 40] {
        tree.insert(k, k);
    }
    // 30 carries children 25 and 40; its successor 40 is its own right child.
    let successor = tree.find(&40).node;

    assert_eq!(tree.remove(&30), Some(30));
    assert!(tree.is_valid_red_black_tree());
    assert_eq!(tree.find(&40).node, successor);
    assert_eq!(
        tree.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
        vec![10, 20, 25, 40]
    );
}

#[test]
fn test_remove_descending_chain() {
    let mut tree = RedBlackTree::<u64, u64>::new();
    for k in 0..64 {
        tree.insert(k, k * k);
        assert!(tree.is_valid_red_black_tree());
    }
    for k in (0..64).rev() {
        assert_eq!(tree.remove(&k), Some(k * k));
        assert!(tree.is_valid_red_black_tree());
    }
    assert!(tree.is_empty());
}
