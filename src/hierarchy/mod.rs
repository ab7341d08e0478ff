//! Parent/child relationships between snapshots, held as id references.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::StoreError;

/// Outcome of removing a node from the forest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Detached {
    /// Former parent of the removed node.
    pub parent: Option<String>,
    /// Children that moved to `parent` (or became roots).
    pub reparented: Vec<String>,
}

/// Parent→children adjacency with upward links for ancestry checks.
///
/// Every child has at most one parent and no id is its own ancestor.
#[derive(Debug, Default)]
pub struct HierarchyManager {
    parents: HashMap<String, String>,
    children: HashMap<String, Vec<String>>,
}

impl HierarchyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `child` under `parent`, moving it away from any previous parent.
    ///
    /// Returns the previous parent, if there was one.
    pub fn attach(&mut self, parent: &str, child: &str) -> Result<Option<String>, StoreError> {
        if parent == child || self.is_descendant_of(parent, child) {
            return Err(StoreError::CycleDetected {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }

        let previous = self.parents.get(child).cloned();
        if previous.as_deref() == Some(parent) {
            return Ok(previous);
        }
        if let Some(old) = &previous {
            self.unlink(old, child);
        }

        self.parents.insert(child.to_string(), parent.to_string());
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        Ok(previous)
    }

    /// Detach `child` from `parent`. Returns false when they were not linked.
    pub fn detach(&mut self, parent: &str, child: &str) -> bool {
        if self.parents.get(child).map(String::as_str) != Some(parent) {
            return false;
        }
        self.parents.remove(child);
        self.unlink(parent, child);
        true
    }

    /// Remove `id`, handing its children to its own parent.
    pub fn remove(&mut self, id: &str) -> Detached {
        let parent = self.parents.remove(id);
        if let Some(parent) = &parent {
            self.unlink(parent, id);
        }

        let reparented = self.children.remove(id).unwrap_or_default();
        for child in &reparented {
            match &parent {
                Some(grandparent) => {
                    self.parents.insert(child.clone(), grandparent.clone());
                    self.children
                        .entry(grandparent.clone())
                        .or_default()
                        .push(child.clone());
                }
                None => {
                    self.parents.remove(child);
                }
            }
        }

        Detached { parent, reparented }
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    pub fn children_of(&self, id: &str) -> Vec<String> {
        self.children.get(id).cloned().unwrap_or_default()
    }

    /// All descendants of `id`, breadth-first.
    pub fn descendants_of(&self, id: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.children.get(current) {
                for child in children {
                    result.push(child.clone());
                    queue.push_back(child);
                }
            }
        }
        result
    }

    /// Walk the parent chain upward from `child` looking for `ancestor`.
    pub fn is_descendant_of(&self, child: &str, ancestor: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = child;
        while let Some(parent) = self.parents.get(current) {
            if parent == ancestor {
                return true;
            }
            if !seen.insert(parent.as_str()) {
                return false;
            }
            current = parent;
        }
        false
    }

    fn unlink(&mut self, parent: &str, child: &str) {
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.retain(|c| c != child);
            if siblings.is_empty() {
                self.children.remove(parent);
            }
        }
    }
}
