//! Path tree: groups flat `(path, value)` entries into a forest by segment-aligned prefix containment.
//!
//! Grouping runs in two passes over an arena of entries. The first pass picks a parent index for
//! every entry (the longest proper ancestor, first in input order among equals); the second
//! assembles the nodes. Siblings are ordered by descending path length, then lexically, then by
//! input order, so the result does not depend on iteration order.

use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteNode<T> {
    pub path: String,
    pub value: T,
    pub children: Vec<RouteNode<T>>,
}

impl<T> RouteNode<T> {
    pub fn leaf(path: impl Into<String>, value: T) -> Self {
        RouteNode {
            path: path.into(),
            value,
            children: Vec::new(),
        }
    }

    /// Depth-first, parents before children.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a RouteNode<T>, usize)) {
        self.walk_at(0, f);
    }

    fn walk_at<'a>(&'a self, depth: usize, f: &mut impl FnMut(&'a RouteNode<T>, usize)) {
        f(self, depth);
        for child in &self.children {
            child.walk_at(depth + 1, f);
        }
    }

    pub fn map<U>(self, f: &mut impl FnMut(T) -> U) -> RouteNode<U> {
        RouteNode {
            path: self.path,
            value: f(self.value),
            children: self.children.into_iter().map(|c| c.map(f)).collect(),
        }
    }

    pub fn flatten(&self) -> Vec<&RouteNode<T>> {
        let mut out = Vec::new();
        self.walk(&mut |node, _| out.push(node));
        out
    }

    /// Number of nodes in this subtree, including self.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(RouteNode::count).sum::<usize>()
    }
}

/// True when `child` lies strictly below `parent` on a segment boundary.
///
/// `/users` contains `/users/:id` but not `/users-admin`; `/` contains nothing.
pub fn is_ancestor(parent: &str, child: &str) -> bool {
    child.len() > parent.len()
        && child.starts_with(parent)
        && child.as_bytes()[parent.len()] == b'/'
}

/// Group entries into a forest. Duplicate paths stay siblings, in input order.
pub fn group<T>(entries: Vec<(String, T)>) -> Vec<RouteNode<T>> {
    let n = entries.len();
    let paths: Vec<&str> = entries.iter().map(|(p, _)| p.as_str()).collect();

    let mut parent: Vec<Option<usize>> = vec![None; n];
    for (i, slot) in parent.iter_mut().enumerate() {
        for j in 0..n {
            if i == j || !is_ancestor(paths[j], paths[i]) {
                continue;
            }
            match *slot {
                Some(best) if paths[best].len() >= paths[j].len() => {}
                _ => *slot = Some(j),
            }
        }
    }

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, p) in parent.iter().enumerate() {
        match p {
            Some(p) => children[*p].push(i),
            None => roots.push(i),
        }
    }

    let order = |a: &usize, b: &usize| {
        paths[*b]
            .len()
            .cmp(&paths[*a].len())
            .then_with(|| paths[*a].cmp(paths[*b]))
            .then_with(|| a.cmp(b))
    };
    roots.sort_by(order);
    for list in children.iter_mut() {
        list.sort_by(order);
    }

    let mut slots: Vec<Option<(String, T)>> = entries.into_iter().map(Some).collect();
    roots
        .iter()
        .filter_map(|&i| assemble(i, &mut slots, &children))
        .collect()
}

fn assemble<T>(
    idx: usize,
    slots: &mut [Option<(String, T)>],
    children: &[Vec<usize>],
) -> Option<RouteNode<T>> {
    let (path, value) = slots.get_mut(idx)?.take()?;
    let kids = children[idx]
        .iter()
        .filter_map(|&c| assemble(c, slots, children))
        .collect();
    Some(RouteNode {
        path,
        value,
        children: kids,
    })
}

/// Join path pieces with `/`, collapsing repeated slashes and dropping a trailing one.
pub fn join(parts: &[&str]) -> String {
    let mut out = String::new();
    for segment in parts
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty())
    {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
