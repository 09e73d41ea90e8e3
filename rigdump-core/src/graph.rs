//! Bone graph construction
//!
//! Bones reference their parent by name. The graph indexes every bone by
//! name, links children to parents, and exposes two views over the same set:
//! the nested tree (roots at the top) and the flat source order.
//!
//! Referential problems are structural-integrity errors. They are reported,
//! never silently dropped: duplicate names and parent cycles always fail the
//! build, unknown parents fail it unless [`OrphanPolicy::PromoteToRoot`] is
//! set, in which case the bone becomes a root and the problem is kept as a
//! warning.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scene::BoneSource;

/// Deepest parent chain accepted; the nested view is one JSON level per bone
pub const MAX_DEPTH: usize = 1024;

/// What to do with a bone whose parent does not exist
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OrphanPolicy {
    /// Fail the build. A single bad parent reference then aborts the whole
    /// export, which the serializer reports as an error document.
    #[default]
    Reject,

    /// Place the bone at the top level and report a warning
    PromoteToRoot,
}

/// A bone naming a parent that is not part of the armature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingParent {
    pub bone: String,
    pub parent: String,
}

impl fmt::Display for DanglingParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bone '{}' references unknown parent '{}'",
            self.bone, self.parent
        )
    }
}

/// Structural-integrity errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("duplicate bone name '{0}'")]
    DuplicateBone(String),

    #[error("{} unresolved parent reference(s): {}", .0.len(), join(.0))]
    UnknownParent(Vec<DanglingParent>),

    #[error("parent cycle through bones: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("bone '{bone}' is nested deeper than {limit} levels")]
    TooDeep { bone: String, limit: usize },
}

fn join(dangling: &[DanglingParent]) -> String {
    dangling
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default)]
struct BoneNode {
    parent: Option<String>,
    children: Vec<String>,
}

/// Nested view of the bone forest, keyed by bone name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HierarchyTree(pub IndexMap<String, TreeNode>);

/// One bone in the nested view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub children: HierarchyTree,
}

impl HierarchyTree {
    /// Every bone name reachable from the top level, depth first
    pub fn names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        let mut stack: Vec<(&String, &TreeNode)> = self.0.iter().rev().collect();
        while let Some((name, node)) = stack.pop() {
            names.push(name.as_str());
            stack.extend(node.children.0.iter().rev());
        }
    }

    /// Top-level bone names
    pub fn roots(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Option<&TreeNode> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Name-indexed bone forest
#[derive(Debug, Clone, Default)]
pub struct BoneGraph {
    nodes: IndexMap<String, BoneNode>,
    roots: Vec<String>,
    promoted: Vec<DanglingParent>,
}

impl BoneGraph {
    /// Index and link bones given in host iteration order
    pub fn build(bones: &[&dyn BoneSource], policy: OrphanPolicy) -> Result<Self, GraphError> {
        let mut nodes: IndexMap<String, BoneNode> = IndexMap::with_capacity(bones.len());
        for bone in bones {
            let name = bone.name().to_string();
            if nodes.contains_key(&name) {
                return Err(GraphError::DuplicateBone(name));
            }
            nodes.insert(
                name,
                BoneNode {
                    parent: bone.parent_name().map(str::to_string),
                    children: Vec::new(),
                },
            );
        }

        let mut roots = Vec::new();
        let mut dangling = Vec::new();
        for index in 0..nodes.len() {
            let (name, node) = match nodes.get_index(index) {
                Some((name, node)) => (name.clone(), node.parent.clone()),
                None => continue,
            };
            match node {
                None => roots.push(name),
                Some(parent) => {
                    if let Some(parent_node) = nodes.get_mut(&parent) {
                        parent_node.children.push(name);
                        continue;
                    }
                    if policy == OrphanPolicy::PromoteToRoot {
                        tracing::warn!("bone {} has unknown parent {}, promoting to root", name, parent);
                        if let Some((_, orphan)) = nodes.get_index_mut(index) {
                            orphan.parent = None;
                        }
                        roots.push(name.clone());
                    }
                    dangling.push(DanglingParent { bone: name, parent });
                }
            }
        }

        if !dangling.is_empty() && policy == OrphanPolicy::Reject {
            return Err(GraphError::UnknownParent(dangling));
        }

        let graph = Self {
            nodes,
            roots,
            promoted: dangling,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Bones on a parent cycle are unreachable from every root
    fn check_acyclic(&self) -> Result<(), GraphError> {
        let mut reached = vec![false; self.nodes.len()];
        let mut stack: Vec<(&str, usize)> = self.roots.iter().map(|r| (r.as_str(), 1)).collect();
        while let Some((name, depth)) = stack.pop() {
            if depth > MAX_DEPTH {
                return Err(GraphError::TooDeep {
                    bone: name.to_string(),
                    limit: MAX_DEPTH,
                });
            }
            if let Some((index, _, node)) = self.nodes.get_full(name) {
                reached[index] = true;
                stack.extend(node.children.iter().map(|c| (c.as_str(), depth + 1)));
            }
        }

        let cycle: Vec<String> = self
            .nodes
            .keys()
            .zip(reached)
            .filter(|(_, reached)| !reached)
            .map(|(name, _)| name.clone())
            .collect();
        if cycle.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Cycle(cycle))
        }
    }

    /// Nested view rooted at the top-level bones
    pub fn tree(&self) -> HierarchyTree {
        // Post-order: a node is assembled once all of its children are
        let mut built: HashMap<&str, TreeNode> = HashMap::with_capacity(self.nodes.len());
        let mut stack: Vec<(&str, bool)> = self.roots.iter().rev().map(|r| (r.as_str(), false)).collect();

        while let Some((name, expanded)) = stack.pop() {
            if expanded {
                let children = self.assemble(self.children_of(name), &mut built);
                built.insert(name, TreeNode { children });
            } else {
                stack.push((name, true));
                stack.extend(self.children_of(name).iter().rev().map(|c| (c.as_str(), false)));
            }
        }

        self.assemble(&self.roots, &mut built)
    }

    fn assemble(&self, names: &[String], built: &mut HashMap<&str, TreeNode>) -> HierarchyTree {
        HierarchyTree(
            names
                .iter()
                .filter_map(|name| built.remove(name.as_str()).map(|node| (name.clone(), node)))
                .collect(),
        )
    }

    /// Bone names in source order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Top-level bones in source order
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Resolved parent; `None` for roots, including promoted orphans
    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.nodes.get(name)?.parent.as_deref()
    }

    /// Children in discovery order
    pub fn children_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Orphans placed at the top level under [`OrphanPolicy::PromoteToRoot`]
    pub fn promoted_orphans(&self) -> &[DanglingParent] {
        &self.promoted
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::BoneSnapshot;
    use std::collections::BTreeSet;

    fn bones(layout: &[(&str, Option<&str>)]) -> Vec<BoneSnapshot> {
        layout.iter()
            .map(|(name, parent)| BoneSnapshot::new(name, *parent))
            .collect()
    }

    fn build(bones: &[BoneSnapshot], policy: OrphanPolicy) -> Result<BoneGraph, GraphError> {
        let sources: Vec<&dyn BoneSource> = bones.iter().map(|b| b as &dyn BoneSource).collect();
        BoneGraph::build(&sources, policy)
    }

    fn assert_views_agree(graph: &BoneGraph) {
        let tree = graph.tree();
        let tree_names = tree.names();
        let tree_set: BTreeSet<&str> = tree_names.iter().copied().collect();
        let flat_set: BTreeSet<&str> = graph.names().collect();
        assert_eq!(tree_set, flat_set);
        // Every bone appears exactly once in the tree
        assert_eq!(tree_names.len(), graph.len());
    }

    #[test]
    fn test_two_root_forest() {
        let bones = bones(&[
            ("Root.A", None),
            ("Root.B", None),
            ("Root.A.1", Some("Root.A")),
        ]);
        let graph = build(&bones, OrphanPolicy::Reject).unwrap();
        let tree = graph.tree();

        assert_eq!(tree.len(), 2);
        let a = tree.get("Root.A").unwrap();
        assert_eq!(a.children.len(), 1);
        assert!(a.children.get("Root.A.1").unwrap().children.is_empty());
        assert!(tree.get("Root.B").unwrap().children.is_empty());
        assert_views_agree(&graph);
    }

    #[test]
    fn test_children_in_discovery_order() {
        let bones = bones(&[
            ("hips", None),
            ("thigh.R", Some("hips")),
            ("spine", Some("hips")),
            ("thigh.L", Some("hips")),
            ("shin.L", Some("thigh.L")),
        ]);
        let graph = build(&bones, OrphanPolicy::Reject).unwrap();
        assert_eq!(graph.children_of("hips"), ["thigh.R", "spine", "thigh.L"]);
        assert_eq!(graph.parent_of("shin.L"), Some("thigh.L"));
        assert_eq!(graph.parent_of("hips"), None);
        assert_eq!(graph.roots(), ["hips"]);

        let json = serde_json::to_value(graph.tree()).unwrap();
        let keys: Vec<&String> = json["hips"]["children"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["thigh.R", "spine", "thigh.L"]);
        assert_views_agree(&graph);
    }

    #[test]
    fn test_child_listed_before_parent() {
        let bones = bones(&[("hand.L", Some("forearm.L")), ("forearm.L", None)]);
        let graph = build(&bones, OrphanPolicy::Reject).unwrap();
        assert_eq!(graph.roots(), ["forearm.L"]);
        assert_eq!(graph.children_of("forearm.L"), ["hand.L"]);
        assert_views_agree(&graph);
    }

    #[test]
    fn test_each_child_once_under_parent() {
        let bones = bones(&[
            ("root", None),
            ("a", Some("root")),
            ("b", Some("root")),
            ("c", Some("a")),
        ]);
        let graph = build(&bones, OrphanPolicy::Reject).unwrap();
        for bone in &bones {
            if let Some(parent) = &bone.parent {
                let count = graph
                    .children_of(parent)
                    .iter()
                    .filter(|c| **c == bone.name)
                    .count();
                assert_eq!(count, 1);
            }
        }
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let bones = bones(&[("root", None), ("hand.L", Some("forearm.L"))]);
        let err = build(&bones, OrphanPolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownParent(vec![DanglingParent {
                bone: "hand.L".into(),
                parent: "forearm.L".into(),
            }])
        );
        assert!(err.to_string().contains("forearm.L"));
    }

    #[test]
    fn test_unknown_parent_promoted() {
        let bones = bones(&[("root", None), ("hand.L", Some("forearm.L"))]);
        let graph = build(&bones, OrphanPolicy::PromoteToRoot).unwrap();
        assert_eq!(graph.roots(), ["root", "hand.L"]);
        assert_eq!(graph.parent_of("hand.L"), None);
        assert_eq!(graph.promoted_orphans().len(), 1);
        assert_views_agree(&graph);
    }

    #[test]
    fn test_duplicate_names() {
        let bones = bones(&[("root", None), ("root", None)]);
        assert_eq!(
            build(&bones, OrphanPolicy::PromoteToRoot).unwrap_err(),
            GraphError::DuplicateBone("root".into())
        );
    }

    #[test]
    fn test_cycle_detected() {
        let bones = bones(&[("root", None), ("a", Some("b")), ("b", Some("a")), ("self", Some("self"))]);
        assert_eq!(
            build(&bones, OrphanPolicy::Reject).unwrap_err(),
            GraphError::Cycle(vec!["a".into(), "b".into(), "self".into()])
        );
    }

    fn chain(len: usize) -> Vec<BoneSnapshot> {
        (0..len)
            .map(|i| {
                let parent = (i > 0).then(|| format!("bone_{}", i - 1));
                BoneSnapshot::new(&format!("bone_{}", i), parent.as_deref())
            })
            .collect()
    }

    #[test]
    fn test_tree_roots_are_top_level_only() {
        let bones = bones(&[("hips", None), ("spine", Some("hips")), ("head", Some("spine"))]);
        let tree = build(&bones, OrphanPolicy::Reject).unwrap().tree();
        assert_eq!(tree.roots(), vec!["hips"]);
        assert_eq!(tree.names(), vec!["hips", "spine", "head"]);
    }

    #[test]
    fn test_deep_chain_at_limit() {
        let bones = chain(MAX_DEPTH);
        let graph = build(&bones, OrphanPolicy::Reject).unwrap();
        let tree = graph.tree();
        assert_eq!(tree.roots(), vec!["bone_0"]);
        assert_views_agree(&graph);
    }

    #[test]
    fn test_chain_past_limit_rejected() {
        let bones = chain(MAX_DEPTH + 1);
        let err = build(&bones, OrphanPolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            GraphError::TooDeep {
                bone: format!("bone_{}", MAX_DEPTH),
                limit: MAX_DEPTH,
            }
        );
    }

    #[test]
    fn test_empty() {
        let graph = build(&[], OrphanPolicy::Reject).unwrap();
        assert!(graph.is_empty());
        assert!(graph.tree().is_empty());
    }
}
