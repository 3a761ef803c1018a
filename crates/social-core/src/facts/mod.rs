//! Fact Database
//!
//! The narrow contract the engine uses to record facts about the social graph
//! and to evaluate rule/event preconditions against them.
//!
//! Fact paths are dot-separated segments. A `!` before the last segment marks it
//! exclusive: inserting `liza.stats.Confidence!20` replaces any previous
//! `liza.stats.Confidence!<value>`.

pub mod memory;
pub mod query;

use std::collections::BTreeMap;

pub use memory::MemoryFactDb;
pub use query::{Clause, CompareOp, Query, QueryError, QueryResult, Term};

/// Role name (without the leading `?`) to agent id or literal value
pub type Bindings = BTreeMap<String, String>;

/// Storage the social graph writes facts into
pub trait FactDatabase {
    /// Inserts a fact path, creating intermediate nodes.
    fn insert(&mut self, path: &str);

    /// Deletes the node at `path` together with everything below it.
    /// Returns false if nothing was stored there.
    fn delete(&mut self, path: &str) -> bool;

    /// Whether the node at `path` exists.
    fn contains(&self, path: &str) -> bool;

    /// Child segment names below `path` in sorted order. The empty path lists
    /// the roots.
    fn children(&self, path: &str) -> Vec<String>;
}

/// Splits a fact path into segments, ignoring the exclusivity marker. The
/// segment after `!` is kept whole so values like `12.5` stay one segment.
pub fn path_segments(path: &str) -> Vec<&str> {
    let (head, value) = match path.rsplit_once('!') {
        Some((head, value)) => (head, Some(value)),
        None => (path, None),
    };
    let mut segments: Vec<&str> = head.split('.').filter(|s| !s.is_empty()).collect();
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        segments.push(value);
    }
    segments
}

/// Fact path of an agent.
pub fn agent_path(agent: &str) -> String {
    agent.to_string()
}

/// Fact path of a trait attached to an agent.
pub fn agent_trait_path(agent: &str, trait_id: &str) -> String {
    format!("{}.traits.{}", agent, trait_id)
}

/// Fact path prefix of an agent stat (without the value).
pub fn agent_stat_path(agent: &str, stat: &str) -> String {
    format!("{}.stats.{}", agent, stat)
}

/// Fact path of a relationship.
pub fn relationship_path(owner: &str, target: &str) -> String {
    format!("{}.relationships.{}", owner, target)
}

/// Fact path of a trait attached to a relationship.
pub fn relationship_trait_path(owner: &str, target: &str, trait_id: &str) -> String {
    format!("{}.relationships.{}.traits.{}", owner, target, trait_id)
}

/// Fact path prefix of a relationship stat (without the value).
pub fn relationship_stat_path(owner: &str, target: &str, stat: &str) -> String {
    format!("{}.relationships.{}.stats.{}", owner, target, stat)
}

/// Appends an exclusive value segment to a stat path.
pub fn with_value(stat_path: &str, value: f64) -> String {
    format!("{}!{}", stat_path, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        assert_eq!(
            path_segments("liza.stats.Confidence!20"),
            vec!["liza", "stats", "Confidence", "20"]
        );
        assert_eq!(
            path_segments("liza.stats.Confidence!12.5"),
            vec!["liza", "stats", "Confidence", "12.5"]
        );
        assert!(path_segments("").is_empty());
    }

    #[test]
    fn test_path_builders() {
        assert_eq!(agent_trait_path("liza", "friendly"), "liza.traits.friendly");
        assert_eq!(
            with_value(&relationship_stat_path("liza", "zim", "Friendship"), 12.0),
            "liza.relationships.zim.stats.Friendship!12"
        );
        assert_eq!(
            with_value(&agent_stat_path("liza", "Confidence"), 12.5),
            "liza.stats.Confidence!12.5"
        );
    }
}
