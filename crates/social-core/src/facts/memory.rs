//! In-memory fact tree.

use std::collections::BTreeMap;

use super::{path_segments, FactDatabase};

#[derive(Debug, Clone, Default, PartialEq)]
struct FactNode {
    children: BTreeMap<String, FactNode>,
    /// Children are mutually exclusive values (`stat!value`)
    exclusive: bool,
}

impl FactNode {
    fn find(&self, segments: &[&str]) -> Option<&FactNode> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.children.get(*segment))
    }

    fn count(&self) -> usize {
        self.children.values().map(|c| 1 + c.count()).sum()
    }

    fn collect_leaves(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, child) in &self.children {
            let separator = if self.exclusive { '!' } else { '.' };
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}{}{}", prefix, separator, name)
            };
            if child.children.is_empty() {
                out.push(path);
            } else {
                child.collect_leaves(&path, out);
            }
        }
    }
}

/// Fact database backed by a tree of path segments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryFactDb {
    root: FactNode,
}

impl MemoryFactDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.root.count()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Every root-to-leaf path, sorted, in fact-path notation.
    pub fn leaves(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_leaves("", &mut out);
        out
    }

    pub fn clear(&mut self) {
        self.root.children.clear();
    }
}

/// Splits off the exclusive segment, if the path ends with one.
fn split_exclusive(path: &str) -> (&str, Option<&str>) {
    match path.rsplit_once('!') {
        Some((head, value)) if !value.is_empty() => (head, Some(value)),
        Some((head, _)) => (head, None),
        None => (path, None),
    }
}

impl FactDatabase for MemoryFactDb {
    fn insert(&mut self, path: &str) {
        let (head, exclusive) = split_exclusive(path);
        let mut node = &mut self.root;
        for segment in path_segments(head) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        if let Some(value) = exclusive {
            node.exclusive = true;
            node.children.retain(|name, _| name == value);
            node.children.entry(value.to_string()).or_default();
        }
    }

    fn delete(&mut self, path: &str) -> bool {
        let segments = path_segments(path);
        let Some((last, parents)) = segments.split_last() else {
            return false;
        };
        let mut node = &mut self.root;
        for segment in parents {
            match node.children.get_mut(*segment) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.children.remove(*last).is_some()
    }

    fn contains(&self, path: &str) -> bool {
        let segments = path_segments(path);
        !segments.is_empty() && self.root.find(&segments).is_some()
    }

    fn children(&self, path: &str) -> Vec<String> {
        self.root
            .find(&path_segments(path))
            .map(|node| node.children.keys().cloned().collect())
            .unwrap_or_default()
    }
}
