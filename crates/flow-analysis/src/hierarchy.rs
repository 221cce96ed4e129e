//! Sender→receiver hierarchy decomposition.
//!
//! Builds a directed multigraph from (sender, receiver) pairs, detects root
//! addresses (senders that never receive), and walks depth-first from each
//! root assigning every visited position a dotted path label: a root's
//! label is its own address, a child's label is `{parent_label}.{i}` with a
//! 1-based index. Key accounts are recorded at every depth a label is
//! assigned to them.
//!
//! ## Revisit semantics
//!
//! A node already visited is not expanded again: the edge that reached it a
//! second time contributes a child label to its parent's list (and a key
//! level, when applicable) but no hierarchy entry of its own. This is
//! lossy: an address reachable via multiple parents is only decomposed
//! under the first path that claims it. It also guarantees termination on
//! cyclic input.
//!
//! Addresses are opaque, case-sensitive strings here; any normalization or
//! validation belongs to callers.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::Serialize;

/// Directed multigraph: sender → ordered receivers, duplicates preserved.
#[derive(Clone, Debug, Default)]
pub struct FlowGraph {
    adjacency: HashMap<String, Vec<String>>,
    receivers: HashSet<String>,
}

impl FlowGraph {
    /// Build from (sender, receiver) pairs, dropping any pair with a
    /// missing side. Pure function; input order is preserved per sender.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Option<String>, Option<String>)>,
    {
        Self::from_pairs_among(pairs, None)
    }

    /// Like [`FlowGraph::from_pairs`] but keeping only edges where both
    /// endpoints are in `allowed` (the key-only graph variant).
    pub fn from_pairs_among<I>(pairs: I, allowed: Option<&BTreeSet<String>>) -> Self
    where
        I: IntoIterator<Item = (Option<String>, Option<String>)>,
    {
        let mut graph = Self::default();
        for (sender, receiver) in pairs {
            let (sender, receiver) = match (sender, receiver) {
                (Some(sender), Some(receiver)) => (sender, receiver),
                _ => continue,
            };
            if let Some(allowed) = allowed {
                if !allowed.contains(&sender) || !allowed.contains(&receiver) {
                    continue;
                }
            }
            graph.receivers.insert(receiver.clone());
            graph.adjacency.entry(sender).or_default().push(receiver);
        }
        graph
    }

    /// Ordered receivers of `node`; empty when it never sent anything.
    pub fn children(&self, node: &str) -> &[String] {
        self.adjacency
            .get(node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Addresses seen as receivers at least once.
    pub fn receivers(&self) -> &HashSet<String> {
        &self.receivers
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }
}

/// Root addresses: senders that never appear as a receiver, unioned with
/// the caller's forced roots. Idempotent; returned sorted.
pub fn find_roots(graph: &FlowGraph, forced: &BTreeSet<String>) -> BTreeSet<String> {
    let mut roots: BTreeSet<String> = graph
        .adjacency
        .keys()
        .filter(|sender| !graph.receivers.contains(*sender))
        .cloned()
        .collect();
    roots.extend(forced.iter().cloned());
    roots
}

/// Result of the depth-first labeling walk.
#[derive(Clone, Debug, Default)]
pub struct Hierarchy {
    /// Label → ordered labels of its immediate children. Every expanded
    /// node has an entry, even when its child list is empty; a node cut
    /// off by the revisit guard appears only inside its parent's list.
    pub children: HashMap<String, Vec<String>>,
    /// Depth → key accounts assigned a label of that depth.
    pub key_levels: BTreeMap<usize, BTreeSet<String>>,
}

/// Depth of a label: the number of dot-separated segments.
pub fn label_depth(label: &str) -> usize {
    label.split('.').count()
}

/// Walk depth-first from each root (in sorted order), assigning labels and
/// recording key-account depths.
///
/// Implemented with an explicit stack so arbitrarily deep chains cannot
/// overflow the call stack; children are pushed in reverse so the first
/// child's subtree is fully expanded before its siblings, matching the
/// recursive formulation. Runs in O(V + E).
pub fn build_hierarchy(
    roots: &BTreeSet<String>,
    graph: &FlowGraph,
    key_accounts: &BTreeSet<String>,
) -> Hierarchy {
    let mut hierarchy = Hierarchy::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<(String, String)> = Vec::new();

    for root in roots {
        if key_accounts.contains(root) {
            hierarchy
                .key_levels
                .entry(1)
                .or_default()
                .insert(root.clone());
        }

        stack.push((root.clone(), root.clone()));
        while let Some((node, label)) = stack.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }

            let node_children = graph.children(&node);
            let mut child_labels = Vec::with_capacity(node_children.len());
            for (index, child) in node_children.iter().enumerate() {
                let child_label = format!("{label}.{}", index + 1);
                if key_accounts.contains(child) {
                    hierarchy
                        .key_levels
                        .entry(label_depth(&child_label))
                        .or_default()
                        .insert(child.clone());
                }
                child_labels.push(child_label);
            }

            for (child, child_label) in node_children
                .iter()
                .zip(child_labels.iter())
                .rev()
            {
                stack.push((child.clone(), child_label.clone()));
            }

            hierarchy.children.insert(label, child_labels);
        }
    }

    hierarchy
}

/// One parent→child edge of the hierarchy, as exported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HierarchyEdge {
    #[serde(rename = "Parent")]
    pub parent: String,
    #[serde(rename = "Child")]
    pub child: String,
}

/// One key-account level assignment, as exported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyLevelRow {
    #[serde(rename = "Account")]
    pub account: String,
    #[serde(rename = "Level")]
    pub level: usize,
}

/// Per-depth summary: distinct labels and distinct key accounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    pub level: usize,
    pub total_accounts: usize,
    pub key_accounts: usize,
}

impl Hierarchy {
    /// Flatten to (parent, child) rows: parents in sorted order, children
    /// in traversal order.
    pub fn edge_rows(&self) -> Vec<HierarchyEdge> {
        let mut parents: Vec<&String> = self.children.keys().collect();
        parents.sort();

        let mut rows = Vec::new();
        for parent in parents {
            for child in &self.children[parent] {
                rows.push(HierarchyEdge {
                    parent: parent.clone(),
                    child: child.clone(),
                });
            }
        }
        rows
    }

    /// Flatten key levels to (account, level) rows, sorted by level then
    /// account.
    pub fn key_level_rows(&self) -> Vec<KeyLevelRow> {
        let mut rows = Vec::new();
        for (level, accounts) in &self.key_levels {
            for account in accounts {
                rows.push(KeyLevelRow {
                    account: account.clone(),
                    level: *level,
                });
            }
        }
        rows
    }

    /// Distinct label count per depth, paired with per-depth key counts.
    /// Counts hierarchy keys (expanded positions), not child labels, so a
    /// revisit-cut label is not double counted.
    pub fn level_summaries(&self) -> Vec<LevelSummary> {
        let mut totals: BTreeMap<usize, usize> = BTreeMap::new();
        for label in self.children.keys() {
            *totals.entry(label_depth(label)).or_default() += 1;
        }

        let mut levels: BTreeSet<usize> = totals.keys().copied().collect();
        levels.extend(self.key_levels.keys().copied());

        levels
            .into_iter()
            .map(|level| LevelSummary {
                level,
                total_accounts: totals.get(&level).copied().unwrap_or(0),
                key_accounts: self
                    .key_levels
                    .get(&level)
                    .map(BTreeSet::len)
                    .unwrap_or(0),
            })
            .collect()
    }
}
