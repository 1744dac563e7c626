//! Dependency graph over proposals and completed specifications.
//!
//! Built fresh from the tree on every query; never persisted. Edges point
//! from a proposal to the slugs its spec declares under "Depends on".

use crate::core::error::SpecdeckError;
use crate::core::fields;
use crate::core::layout::SPEC_DOC;
use crate::core::repo::Repository;
use crate::core::state::WorkspaceState;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;

pub const DEPENDS_ON_FIELD: &str = "Depends on";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub slug: String,
    pub depends_on: Vec<String>,
    pub completed: bool,
    pub active: bool,
}

pub type Graph = BTreeMap<String, Node>;

/// Status of a dependency edge's target, as shown in tree output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DepStatus {
    Completed,
    Pending,
    Missing,
}

impl DepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepStatus::Completed => "completed",
            DepStatus::Pending => "pending",
            DepStatus::Missing => "missing",
        }
    }
}

/// Parse the "Depends on" field of a spec document.
pub fn parse_depends_on(spec: &str) -> Vec<String> {
    let Some(value) = fields::field_value(spec, DEPENDS_ON_FIELD) else {
        return Vec::new();
    };
    if value.is_empty() || value.eq_ignore_ascii_case("none") || fields::is_placeholder(&value) {
        return Vec::new();
    }
    fields::split_list(&value)
}

pub fn build(repo: &dyn Repository, state: &WorkspaceState) -> Result<Graph, SpecdeckError> {
    let mut nodes = Graph::new();
    for slug in repo.list_completed()? {
        nodes.insert(
            slug.clone(),
            Node {
                slug,
                depends_on: Vec::new(),
                completed: true,
                active: false,
            },
        );
    }
    for slug in repo.list_proposals()? {
        let depends_on = repo
            .read_text(&slug, SPEC_DOC)?
            .map(|spec| parse_depends_on(&spec))
            .unwrap_or_default();
        let completed = nodes.get(&slug).is_some_and(|n| n.completed);
        let active = state.is_active(&slug);
        nodes.insert(
            slug.clone(),
            Node {
                slug,
                depends_on,
                completed,
                active,
            },
        );
    }
    Ok(nodes)
}

pub fn dep_status(nodes: &Graph, dep: &str) -> DepStatus {
    match nodes.get(dep) {
        Some(n) if n.completed => DepStatus::Completed,
        Some(_) => DepStatus::Pending,
        None => DepStatus::Missing,
    }
}

/// Declared dependencies of `slug` that are not completed specifications.
pub fn missing_dependencies(nodes: &Graph, slug: &str) -> Vec<String> {
    nodes
        .get(slug)
        .map(|n| {
            n.depends_on
                .iter()
                .filter(|d| dep_status(nodes, d) != DepStatus::Completed)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Slugs that declare a dependency on `slug`, sorted.
pub fn dependents(nodes: &Graph, slug: &str) -> Vec<String> {
    nodes
        .values()
        .filter(|n| n.depends_on.iter().any(|d| d == slug))
        .map(|n| n.slug.clone())
        .collect()
}

/// Every cycle found by a DFS from each unvisited node in slug order. Each
/// cycle is the path from the repeated node's first occurrence through the
/// current node, closed by the repeated node again.
pub fn detect_cycles(nodes: &Graph) -> Vec<Vec<String>> {
    fn dfs<'a>(
        slug: &'a str,
        nodes: &'a Graph,
        visited: &mut FxHashSet<&'a str>,
        on_stack: &mut FxHashSet<&'a str>,
        path: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        visited.insert(slug);
        on_stack.insert(slug);
        path.push(slug);

        if let Some(node) = nodes.get(slug) {
            for dep in &node.depends_on {
                let dep = dep.as_str();
                if on_stack.contains(dep) {
                    if let Some(start) = path.iter().position(|s| *s == dep) {
                        let mut cycle: Vec<String> =
                            path[start..].iter().map(|s| s.to_string()).collect();
                        cycle.push(dep.to_string());
                        cycles.push(cycle);
                    }
                } else if !visited.contains(dep) && nodes.contains_key(dep) {
                    dfs(dep, nodes, visited, on_stack, path, cycles);
                }
            }
        }

        path.pop();
        on_stack.remove(slug);
    }

    let mut visited = FxHashSet::default();
    let mut on_stack = FxHashSet::default();
    let mut path = Vec::new();
    let mut cycles = Vec::new();
    for slug in nodes.keys() {
        if !visited.contains(slug.as_str()) {
            dfs(slug, nodes, &mut visited, &mut on_stack, &mut path, &mut cycles);
        }
    }
    cycles
}

/// Cycles that pass through `slug`.
pub fn cycles_through(cycles: &[Vec<String>], slug: &str) -> Vec<Vec<String>> {
    cycles
        .iter()
        .filter(|c| c.iter().any(|s| s == slug))
        .cloned()
        .collect()
}

/// `slug`, everything it transitively depends on, and everything that
/// transitively depends on it. Unknown slug → empty.
pub fn relevant_subgraph(nodes: &Graph, slug: &str) -> Graph {
    let mut keep: FxHashSet<&str> = FxHashSet::default();
    let Some((root, _)) = nodes.get_key_value(slug) else {
        return Graph::new();
    };
    keep.insert(root.as_str());

    let mut queue: VecDeque<&str> = VecDeque::from([root.as_str()]);
    while let Some(current) = queue.pop_front() {
        if let Some(node) = nodes.get(current) {
            for dep in &node.depends_on {
                if let Some((key, _)) = nodes.get_key_value(dep.as_str()) {
                    if keep.insert(key.as_str()) {
                        queue.push_back(key.as_str());
                    }
                }
            }
        }
    }

    let mut reverse: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for node in nodes.values() {
        for dep in &node.depends_on {
            reverse
                .entry(dep.as_str())
                .or_default()
                .push(node.slug.as_str());
        }
    }
    let mut seen_up: FxHashSet<&str> = FxHashSet::from_iter([root.as_str()]);
    let mut queue: VecDeque<&str> = VecDeque::from([root.as_str()]);
    while let Some(current) = queue.pop_front() {
        for &dependent in reverse.get(current).into_iter().flatten() {
            if seen_up.insert(dependent) {
                keep.insert(dependent);
                queue.push_back(dependent);
            }
        }
    }

    nodes
        .iter()
        .filter(|(k, _)| keep.contains(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Text tree: one block per node with its dependency and dependent lines.
pub fn render_tree(nodes: &Graph) -> String {
    let mut out = String::new();
    for node in nodes.values() {
        let mut flags = Vec::new();
        if node.completed {
            flags.push("completed");
        }
        if node.active {
            flags.push("active");
        }
        if flags.is_empty() {
            let _ = writeln!(out, "{}", node.slug);
        } else {
            let _ = writeln!(out, "{} [{}]", node.slug, flags.join(", "));
        }
        for dep in &node.depends_on {
            let _ = writeln!(out, "  depends on: {} ({})", dep, dep_status(nodes, dep).as_str());
        }
        for blocked in dependents(nodes, &node.slug) {
            let _ = writeln!(out, "  blocks: {}", blocked);
        }
    }
    out
}

/// Graphviz DOT. Targets that are not nodes are drawn dashed.
pub fn render_dot(nodes: &Graph) -> String {
    let mut out = String::from("digraph dependencies {\n  rankdir=LR;\n");
    for node in nodes.values() {
        let style = if node.completed {
            "style=filled, fillcolor=palegreen"
        } else if node.active {
            "style=filled, fillcolor=lightblue"
        } else {
            "shape=box"
        };
        let _ = writeln!(out, "  \"{}\" [{}];", node.slug, style);
    }
    let mut missing: Vec<&str> = nodes
        .values()
        .flat_map(|n| n.depends_on.iter())
        .map(String::as_str)
        .filter(|d| !nodes.contains_key(*d))
        .collect();
    missing.sort_unstable();
    missing.dedup();
    for slug in missing {
        let _ = writeln!(out, "  \"{}\" [style=dashed];", slug);
    }
    for node in nodes.values() {
        for dep in &node.depends_on {
            let _ = writeln!(out, "  \"{}\" -> \"{}\";", node.slug, dep);
        }
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::repo::MemRepository;

    fn node(slug: &str, deps: &[&str]) -> (String, Node) {
        (
            slug.to_string(),
            Node {
                slug: slug.to_string(),
                depends_on: deps.iter().map(|d| d.to_string()).collect(),
                completed: false,
                active: false,
            },
        )
    }

    fn graph(edges: &[(&str, &[&str])]) -> Graph {
        edges.iter().map(|(s, d)| node(s, d)).collect()
    }

    #[test]
    fn depends_on_parsing() {
        assert_eq!(parse_depends_on("**Depends on**: a, b"), vec!["a", "b"]);
        assert_eq!(parse_depends_on("Depends on: None"), Vec::<String>::new());
        assert_eq!(parse_depends_on("Depends on:   "), Vec::<String>::new());
        assert_eq!(
            parse_depends_on("**Depends on**: [other-proposal-slugs]"),
            Vec::<String>::new()
        );
        assert_eq!(
            parse_depends_on("Depends on: auth <!-- comma separated -->"),
            vec!["auth"]
        );
        assert_eq!(parse_depends_on("# no field"), Vec::<String>::new());
    }

    #[test]
    fn build_marks_completed_and_active() {
        let repo = MemRepository::new()
            .with_completed("db", "# DB")
            .with_proposal("auth", &[("spec.md", "Depends on: db")])
            .with_proposal("ui", &[]);
        let mut state = WorkspaceState::default();
        state.activate("auth", Default::default());
        let nodes = build(&repo, &state).unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(nodes["db"].completed);
        assert!(nodes["auth"].active);
        assert_eq!(nodes["auth"].depends_on, vec!["db"]);
        assert!(nodes["ui"].depends_on.is_empty());
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let g = graph(&[("a", &["b", "c"]), ("b", &["c"]), ("c", &[]), ("d", &["a"])]);
        assert!(detect_cycles(&g).is_empty());
    }

    #[test]
    fn two_node_cycle_is_reported_once() {
        let g = graph(&[("a", &["b"]), ("b", &["a"])]);
        let cycles = detect_cycles(&g);
        assert_eq!(cycles, vec![vec!["a", "b", "a"]]);
    }

    #[test]
    fn closing_edge_reports_exactly_the_cycle_nodes() {
        let mut g = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["d"]), ("d", &[]), ("x", &["a"])]);
        assert!(detect_cycles(&g).is_empty());
        g.get_mut("d").unwrap().depends_on.push("b".into());
        let cycles = detect_cycles(&g);
        assert_eq!(cycles.len(), 1);
        let mut members: Vec<_> = cycles[0][..cycles[0].len() - 1].to_vec();
        members.sort();
        assert_eq!(members, vec!["b", "c", "d"]);
        assert_eq!(cycles[0].first(), cycles[0].last());
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let g = graph(&[("a", &["a"])]);
        assert_eq!(detect_cycles(&g), vec![vec!["a", "a"]]);
    }

    #[test]
    fn missing_dependencies_are_not_traversed() {
        let g = graph(&[("a", &["ghost"])]);
        assert!(detect_cycles(&g).is_empty());
        assert_eq!(missing_dependencies(&g, "a"), vec!["ghost"]);
        assert_eq!(dep_status(&g, "ghost"), DepStatus::Missing);
    }

    #[test]
    fn subgraph_is_both_closures() {
        let g = graph(&[
            ("root", &["mid"]),
            ("mid", &["leaf"]),
            ("leaf", &[]),
            ("user", &["root"]),
            ("top", &["user"]),
            ("unrelated", &["leaf"]),
            ("island", &[]),
        ]);
        let sub = relevant_subgraph(&g, "root");
        let keys: Vec<_> = sub.keys().cloned().collect();
        assert_eq!(keys, vec!["leaf", "mid", "root", "top", "user"]);
        assert!(relevant_subgraph(&g, "nope").is_empty());
        assert_eq!(relevant_subgraph(&g, "island").len(), 1);
    }

    #[test]
    fn tree_render_shows_status_and_blocks() {
        let mut g = graph(&[("auth", &["db", "cache", "ghost"]), ("cache", &[])]);
        g.insert(
            "db".into(),
            Node {
                slug: "db".into(),
                depends_on: vec![],
                completed: true,
                active: false,
            },
        );
        let text = render_tree(&g);
        assert!(text.contains("  depends on: db (completed)"));
        assert!(text.contains("  depends on: cache (pending)"));
        assert!(text.contains("  depends on: ghost (missing)"));
        assert!(text.contains("db [completed]\n  blocks: auth"));
    }

    #[test]
    fn dot_render_has_one_edge_per_dependency() {
        let g = graph(&[("a", &["b", "ghost"]), ("b", &[])]);
        let dot = render_dot(&g);
        assert!(dot.starts_with("digraph dependencies {"));
        assert_eq!(dot.matches("->").count(), 2);
        assert!(dot.contains("\"ghost\" [style=dashed];"));
    }
}
