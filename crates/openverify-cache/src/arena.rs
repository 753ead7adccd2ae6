use crate::trie::Entry;
use ahash::AHashMap;

/// Sentinel value indicating "no node" (null pointer equivalent).
pub const NIL: u32 = u32::MAX;

/// Index of the root node. The root always exists and is never reclaimed.
pub const ROOT: u32 = 0;

/// A node in the arena-allocated trie.
///
/// Children are keyed by path segment and addressed by arena index. The
/// parent's map holds the only reference to each child — there are no
/// back-references and no sharing.
pub struct Node {
    pub children: AHashMap<String, u32>,
    pub entry: Option<Entry>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: AHashMap::new(),
            entry: None,
        }
    }

    /// A node with no entry and no children carries no information and is
    /// a pruning candidate (the root is exempt).
    #[inline]
    pub fn is_vacant(&self) -> bool {
        self.entry.is_none() && self.children.is_empty()
    }
}

/// Arena-allocated node store.
///
/// Nodes are stored in a `Vec<Option<Node>>`. Indices (`u32`) serve as
/// pointers. A free-list tracks reclaimed slots for O(1) allocation, so the
/// backing vector stops growing once the working set stabilizes.
pub struct Arena {
    slots: Vec<Option<Node>>,
    free_list: Vec<u32>,
}

impl Arena {
    /// Create an arena containing only the root node.
    pub fn new() -> Self {
        Self {
            slots: vec![Some(Node::new())],
            free_list: Vec::new(),
        }
    }

    /// Get a reference to the node at `index`.
    #[inline]
    pub fn get(&self, index: u32) -> Option<&Node> {
        self.slots.get(index as usize).and_then(|s| s.as_ref())
    }

    /// Get a mutable reference to the node at `index`.
    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut Node> {
        self.slots.get_mut(index as usize).and_then(|s| s.as_mut())
    }

    /// Allocate an empty node, reusing a reclaimed slot when one exists.
    pub fn alloc(&mut self) -> u32 {
        if let Some(index) = self.free_list.pop() {
            self.slots[index as usize] = Some(Node::new());
            return index;
        }
        let index = self.slots.len() as u32;
        self.slots.push(Some(Node::new()));
        index
    }

    /// Release the node at `index` and reclaim its slot. The caller is
    /// responsible for having unlinked it from its parent first.
    pub fn free(&mut self, index: u32) {
        debug_assert_ne!(index, ROOT, "the root node is never freed");
        if self.slots[index as usize].take().is_some() {
            self.free_list.push(index);
        }
    }

    /// Number of live nodes, root included.
    pub fn live_nodes(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Drop every node except the root and clear the root itself.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.slots.push(Some(Node::new()));
        self.free_list.clear();
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
