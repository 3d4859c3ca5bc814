//! Relationship graph between tasks.
//!
//! Design:
//! - One adjacency structure, keyed by task id, with typed edge kinds.
//! - `ChildOf`: child -> parent. `Triggers`: source -> target.
//! - Each edge is recorded once per direction inside the same struct, and
//!   only the methods here touch them, so forward/reverse views never drift.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Kind of a directed edge between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `from` is a child of `to`.
    ChildOf,
    /// Completing `from` activates `to`.
    Triggers,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 2] = [EdgeKind::ChildOf, EdgeKind::Triggers];
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeKind::ChildOf => f.write_str("child-of"),
            EdgeKind::Triggers => f.write_str("triggers"),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Adjacency {
    forward: HashMap<TaskId, BTreeSet<TaskId>>,
    reverse: HashMap<TaskId, BTreeSet<TaskId>>,
}

impl Adjacency {
    fn insert(&mut self, from: TaskId, to: TaskId) -> bool {
        let added = self.forward.entry(from).or_default().insert(to);
        self.reverse.entry(to).or_default().insert(from);
        added
    }

    fn remove(&mut self, from: TaskId, to: TaskId) -> bool {
        let removed = remove_from(&mut self.forward, from, to);
        remove_from(&mut self.reverse, to, from);
        removed
    }
}

fn remove_from(map: &mut HashMap<TaskId, BTreeSet<TaskId>>, key: TaskId, value: TaskId) -> bool {
    match map.entry(key) {
        Entry::Occupied(mut e) => {
            let removed = e.get_mut().remove(&value);
            if e.get().is_empty() {
                e.remove_entry();
            }
            removed
        }
        Entry::Vacant(_) => false,
    }
}

/// Typed adjacency structure for every task relationship.
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    child_of: Adjacency,
    triggers: Adjacency,
}

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn adjacency(&self, kind: EdgeKind) -> &Adjacency {
        match kind {
            EdgeKind::ChildOf => &self.child_of,
            EdgeKind::Triggers => &self.triggers,
        }
    }

    fn adjacency_mut(&mut self, kind: EdgeKind) -> &mut Adjacency {
        match kind {
            EdgeKind::ChildOf => &mut self.child_of,
            EdgeKind::Triggers => &mut self.triggers,
        }
    }

    /// Add `from -(kind)-> to`. Returns false if the edge already existed.
    pub fn add_edge(&mut self, kind: EdgeKind, from: TaskId, to: TaskId) -> bool {
        self.adjacency_mut(kind).insert(from, to)
    }

    /// Remove `from -(kind)-> to`. Returns false if there was no such edge.
    pub fn remove_edge(&mut self, kind: EdgeKind, from: TaskId, to: TaskId) -> bool {
        self.adjacency_mut(kind).remove(from, to)
    }

    pub fn has_edge(&self, kind: EdgeKind, from: TaskId, to: TaskId) -> bool {
        self.adjacency(kind)
            .forward
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// Outgoing neighbours: parents for `ChildOf`, targets for `Triggers`.
    pub fn targets(&self, kind: EdgeKind, from: TaskId) -> BTreeSet<TaskId> {
        self.adjacency(kind)
            .forward
            .get(&from)
            .cloned()
            .unwrap_or_default()
    }

    /// Incoming neighbours: children for `ChildOf`, sources for `Triggers`.
    pub fn sources(&self, kind: EdgeKind, to: TaskId) -> BTreeSet<TaskId> {
        self.adjacency(kind)
            .reverse
            .get(&to)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every edge touching `task`.
    pub fn remove_task(&mut self, task: TaskId) {
        for kind in EdgeKind::ALL {
            for to in self.targets(kind, task) {
                self.remove_edge(kind, task, to);
            }
            for from in self.sources(kind, task) {
                self.remove_edge(kind, from, task);
            }
        }
    }

    /// Four-way view of one task's relationships.
    pub fn relations(&self, task: TaskId) -> TaskRelations {
        TaskRelations {
            parents: self.targets(EdgeKind::ChildOf, task),
            children: self.sources(EdgeKind::ChildOf, task),
            triggered_by: self.sources(EdgeKind::Triggers, task),
            triggers: self.targets(EdgeKind::Triggers, task),
        }
    }
}

/// Generated four-way view of a task's relationships.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRelations {
    pub parents: BTreeSet<TaskId>,
    pub children: BTreeSet<TaskId>,
    pub triggered_by: BTreeSet<TaskId>,
    pub triggers: BTreeSet<TaskId>,
}

/// Requested relationship sets submitted with a save.
pub type RelationRequest = TaskRelations;

impl TaskRelations {
    pub fn with_parents(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.parents.extend(ids);
        self
    }

    pub fn with_children(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.children.extend(ids);
        self
    }

    pub fn with_triggered_by(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.triggered_by.extend(ids);
        self
    }

    pub fn with_triggers(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.triggers.extend(ids);
        self
    }

    /// Every edge this view describes, oriented as stored (`from -(kind)-> to`)
    /// from the point of view of `task`.
    pub fn edges_of(&self, task: TaskId) -> Vec<(EdgeKind, TaskId, TaskId)> {
        let mut edges = Vec::new();
        edges.extend(self.parents.iter().map(|&p| (EdgeKind::ChildOf, task, p)));
        edges.extend(self.children.iter().map(|&c| (EdgeKind::ChildOf, c, task)));
        edges.extend(self.triggers.iter().map(|&t| (EdgeKind::Triggers, task, t)));
        edges.extend(self.triggered_by.iter().map(|&s| (EdgeKind::Triggers, s, task)));
        edges
    }
}
