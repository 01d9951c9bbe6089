//! In-memory shape of the scene forest.
//!
//! Scenes are held in an id-keyed arena with an explicit parent-to-children
//! index. Traversals use an explicit stack, so depth is bounded by heap, not
//! by the call stack.

use std::collections::{HashMap, HashSet};

use panorama_db::models::SceneLinkRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleDetected(pub i64);

#[derive(Debug, Default)]
pub struct SceneArena {
    nodes: HashMap<i64, SceneLinkRow>,
    children: HashMap<i64, Vec<i64>>,
}

impl SceneArena {
    pub fn from_links(links: Vec<SceneLinkRow>) -> Self {
        let mut arena = SceneArena::default();
        for link in links {
            if let Some(parent) = link.parent_id {
                arena.children.entry(parent).or_default().push(link.id);
            }
            arena.nodes.insert(link.id, link);
        }
        for ids in arena.children.values_mut() {
            ids.sort_unstable();
        }
        arena
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Option<&SceneLinkRow> {
        self.nodes.get(&id)
    }

    pub fn children(&self, id: i64) -> &[i64] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `root` and all of its transitive descendants, every scene listed after
    /// all of its descendants. Empty if `root` is unknown.
    pub fn subtree_post_order(&self, root: i64) -> Vec<i64> {
        if !self.contains(root) {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut stack = vec![root];
        let mut pre_order = Vec::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            pre_order.push(id);
            stack.extend(self.children(id).iter().rev());
        }

        pre_order.reverse();
        pre_order
    }

    /// Parent chain from `id` up to its root, nearest first. A well-formed
    /// forest reaches a root within `len()` steps; anything longer is a cycle.
    pub fn ancestors(&self, id: i64) -> Result<Vec<i64>, CycleDetected> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(parent) = current {
            if chain.len() >= self.nodes.len() {
                return Err(CycleDetected(id));
            }
            chain.push(parent);
            current = self.nodes.get(&parent).and_then(|n| n.parent_id);
        }
        Ok(chain)
    }

    /// First scene whose parent chain does not terminate, if any.
    pub fn find_cycle(&self) -> Option<CycleDetected> {
        let mut ids: Vec<i64> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().find_map(|id| self.ancestors(id).err())
    }
}
