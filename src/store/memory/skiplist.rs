use rand::Rng;

use crate::types::Cells;

/// Maximum height of the skip list. LevelDB uses 12.
pub const MAX_HEIGHT: usize = 12;

/// Index of the head sentinel in the node arena.
const HEAD: usize = 0;

/// A single node in the skip list.
///
/// Each node has `height` forward pointers. Level 0 contains all nodes
/// (a regular linked list). Higher levels skip over nodes, enabling
/// O(log n) average-case search.
///
/// ```text
/// Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
/// Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
/// Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
/// Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► 70 ► NIL
/// ```
struct SkipNode {
    key: Vec<u8>,
    cells: Cells,
    /// Indices into `SkipList::nodes`, one per level.
    forward: Vec<Option<usize>>,
}

/// Sorted map of row key → cells.
///
/// Nodes live in an arena and link by index, so there is no unsafe code.
/// Removed nodes are unlinked on every level and their slots go on a free
/// list for the next insert, so the arena never outgrows the live rows.
pub struct SkipList {
    nodes: Vec<SkipNode>,
    free: Vec<usize>,
    height: usize,
    len: usize,
    size_bytes: usize,
}

fn cells_size(cells: &Cells) -> usize {
    cells.iter().map(|(q, v)| q.len() + v.len()).sum()
}

impl SkipList {
    /// Create a new empty skip list.
    pub fn new() -> Self {
        let head = SkipNode {
            key: Vec::new(),
            cells: Cells::new(),
            forward: vec![None; MAX_HEIGHT],
        };
        SkipList {
            nodes: vec![head],
            free: Vec::new(),
            height: 1,
            len: 0,
            size_bytes: 0,
        }
    }

    /// Insert or replace the cells stored under `key`.
    ///
    /// Algorithm:
    ///   1. Find the insertion point at each level (track predecessors)
    ///   2. Generate a random height for the new node
    ///   3. Splice into the list at each level up to the node's height
    pub fn insert(&mut self, key: Vec<u8>, cells: Cells) {
        let mut prev = [HEAD; MAX_HEIGHT];
        if let Some(found) = self.find_greater_or_equal(&key, &mut prev) {
            if self.nodes[found].key == key {
                let node = &mut self.nodes[found];
                self.size_bytes = self.size_bytes - cells_size(&node.cells) + cells_size(&cells);
                node.cells = cells;
                return;
            }
        }

        let height = self.random_height();
        if height > self.height {
            // prev[] for the new levels already points at HEAD
            self.height = height;
        }

        let forward = (0..height).map(|level| self.nodes[prev[level]].forward[level]).collect();
        self.size_bytes += key.len() + cells_size(&cells);
        let node = SkipNode {
            key,
            cells,
            forward,
        };
        let index = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        for (level, &p) in prev.iter().enumerate().take(height) {
            self.nodes[p].forward[level] = Some(index);
        }
        self.len += 1;
    }

    /// Unlink `key` and return its cells.
    pub fn remove(&mut self, key: &[u8]) -> Option<Cells> {
        let mut prev = [HEAD; MAX_HEIGHT];
        let found = self.find_greater_or_equal(key, &mut prev)?;
        if self.nodes[found].key != key {
            return None;
        }

        let forward = std::mem::take(&mut self.nodes[found].forward);
        for (level, next) in forward.into_iter().enumerate() {
            if self.nodes[prev[level]].forward[level] == Some(found) {
                self.nodes[prev[level]].forward[level] = next;
            }
        }
        while self.height > 1 && self.nodes[HEAD].forward[self.height - 1].is_none() {
            self.height -= 1;
        }

        let key = std::mem::take(&mut self.nodes[found].key);
        let cells = std::mem::take(&mut self.nodes[found].cells);
        self.size_bytes -= key.len() + cells_size(&cells);
        self.len -= 1;
        self.free.push(found);
        Some(cells)
    }

    /// Look up the cells stored under `key`.
    pub fn get(&self, key: &[u8]) -> Option<&Cells> {
        let mut prev = [HEAD; MAX_HEIGHT];
        let found = self.find_greater_or_equal(key, &mut prev)?;
        let node = &self.nodes[found];
        (node.key == key).then_some(&node.cells)
    }

    /// Number of keys in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Approximate bytes held by keys and cells.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Iterator positioned at the first entry.
    pub fn iter(&self) -> SkipListIterator<'_> {
        SkipListIterator {
            list: self,
            current: self.nodes[HEAD].forward[0],
        }
    }

    /// Walk from the top level down to the first node with key >= target,
    /// recording the last node visited on each level in `prev`.
    fn find_greater_or_equal(&self, key: &[u8], prev: &mut [usize; MAX_HEIGHT]) -> Option<usize> {
        let mut x = HEAD;
        let mut level = self.height - 1;
        loop {
            let next = self.nodes[x].forward[level];
            match next {
                Some(n) if self.nodes[n].key.as_slice() < key => x = n,
                _ => {
                    prev[level] = x;
                    if level == 0 {
                        return next;
                    }
                    level -= 1;
                }
            }
        }
    }

    /// Each extra level has a 1/4 probability, as in LevelDB.
    fn random_height(&self) -> usize {
        let mut rng = rand::thread_rng();
        let mut height = 1;
        while height < MAX_HEIGHT && rng.gen_bool(0.25) {
            height += 1;
        }
        height
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over skip list entries in sorted order.
///
/// Follows level 0 forward pointers, which link every entry.
pub struct SkipListIterator<'a> {
    list: &'a SkipList,
    current: Option<usize>,
}

impl<'a> SkipListIterator<'a> {
    /// Current key. Only valid when `is_valid()` is true.
    pub fn key(&self) -> &'a [u8] {
        match self.current {
            Some(i) => &self.list.nodes[i].key,
            None => &[],
        }
    }

    /// Current cells. Only meaningful when `is_valid()` is true.
    pub fn cells(&self) -> Option<&'a Cells> {
        self.current.map(|i| &self.list.nodes[i].cells)
    }

    pub fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    pub fn next(&mut self) {
        if let Some(i) = self.current {
            self.current = self.list.nodes[i].forward[0];
        }
    }

    /// Position at the first entry with key >= target.
    pub fn seek(&mut self, target: &[u8]) {
        let mut prev = [HEAD; MAX_HEIGHT];
        self.current = self.list.find_greater_or_equal(target, &mut prev);
    }
}
