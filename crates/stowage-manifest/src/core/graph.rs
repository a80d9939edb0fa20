use std::collections::HashSet;

use crate::data::Manifest;

/// Find the first dependency cycle reachable from `root`.
///
/// Returns the cycle as a closed path, e.g. `["a", "b", "a"]`. Names that are
/// not in the manifest are leaves.
pub fn find_cycle<'a>(manifest: &'a Manifest, root: &'a str) -> Option<Vec<String>> {
    let mut path = Vec::new();
    let mut visited = HashSet::new();
    dfs(manifest, root, &mut path, &mut visited)
}

fn dfs<'a>(
    manifest: &'a Manifest,
    name: &'a str,
    path: &mut Vec<&'a str>,
    visited: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    if let Some(start) = path.iter().position(|n| *n == name) {
        let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
        cycle.push(name.to_string());
        return Some(cycle);
    }

    if visited.contains(name) {
        return None;
    }

    path.push(name);
    for dep in manifest.dependencies_of(name) {
        if let Some(cycle) = dfs(manifest, dep, path, visited) {
            return Some(cycle);
        }
    }
    path.pop();
    visited.insert(name);

    None
}
