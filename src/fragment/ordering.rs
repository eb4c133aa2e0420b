//! Absolute and relative fragment ordering.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use thiserror::Error;

use crate::fragment::{Fragment, OrderingEntry};

/// Configuration errors detected while ordering fragments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    #[error("ordering cycle between fragments: {}", .participants.join(", "))]
    Cycle { participants: Vec<String> },

    #[error("`others` declared more than once in {location}")]
    DuplicateOthers { location: String },

    #[error("fragment name `{0}` declared more than once")]
    DuplicateFragment(String),
}

/// Produce the final fragment sequence.
///
/// With an absolute list, relative constraints are ignored and unlisted
/// fragments are dropped unless the list contains `others`. Without one, the
/// fragments' `before`/`after` constraints are sorted topologically, keeping
/// discovery order wherever the constraints leave a choice.
pub fn order(
    fragments: &[Fragment],
    absolute_order: Option<&[OrderingEntry]>,
) -> Result<Vec<String>, OrderingError> {
    let mut seen = HashSet::new();
    for fragment in fragments {
        if !seen.insert(fragment.name.as_str()) {
            return Err(OrderingError::DuplicateFragment(fragment.name.clone()));
        }
    }

    let ordered = match absolute_order {
        Some(list) => order_absolute(fragments, list)?,
        None => order_relative(fragments)?,
    };
    tracing::info!(order = ?ordered, "Fragments ordered");
    Ok(ordered)
}

fn order_absolute(
    fragments: &[Fragment],
    list: &[OrderingEntry],
) -> Result<Vec<String>, OrderingError> {
    if list.iter().filter(|e| e.is_others()).count() > 1 {
        return Err(OrderingError::DuplicateOthers {
            location: "absolute ordering".to_string(),
        });
    }

    let known: HashSet<&str> = fragments.iter().map(|f| f.name.as_str()).collect();
    let listed: HashSet<&str> = list.iter().filter_map(OrderingEntry::name).collect();

    let mut out: Vec<String> = Vec::with_capacity(fragments.len());
    let mut emitted = HashSet::new();
    for entry in list {
        match entry {
            OrderingEntry::Named(name) => {
                if !known.contains(name.as_str()) {
                    tracing::warn!(fragment = %name, "Absolute ordering names an unknown fragment");
                    continue;
                }
                if emitted.insert(name.clone()) {
                    out.push(name.clone());
                }
            }
            OrderingEntry::Others => {
                for fragment in fragments {
                    if !listed.contains(fragment.name.as_str()) && emitted.insert(fragment.name.clone()) {
                        out.push(fragment.name.clone());
                    }
                }
            }
        }
    }

    for fragment in fragments {
        if !emitted.contains(&fragment.name) {
            tracing::info!(fragment = %fragment.name, "Fragment excluded by absolute ordering");
        }
    }
    Ok(out)
}

fn order_relative(fragments: &[Fragment]) -> Result<Vec<String>, OrderingError> {
    let position: HashMap<&str, usize> = fragments
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.as_str(), i))
        .collect();

    // At most one `others` sentinel across all fragments.
    let declarers: Vec<&str> = fragments
        .iter()
        .flat_map(|f| {
            f.before
                .iter()
                .chain(f.after.iter())
                .filter(|e| e.is_others())
                .map(move |_| f.name.as_str())
        })
        .collect();
    if declarers.len() > 1 {
        let mut named = declarers.clone();
        named.dedup();
        let location = match named.as_slice() {
            [single] => format!("fragment `{}`", single),
            _ => format!("fragments {}", named.join(", ")),
        };
        return Err(OrderingError::DuplicateOthers { location });
    }
    let declarer = declarers.first().copied();

    let mut mentioned = HashSet::new();
    for fragment in fragments {
        for name in fragment.before.iter().chain(fragment.after.iter()).filter_map(OrderingEntry::name) {
            if position.contains_key(name) {
                mentioned.insert(name);
            } else {
                tracing::warn!(
                    fragment = %fragment.name,
                    reference = %name,
                    "Ordering constraint names an unknown fragment"
                );
            }
        }
    }

    // `others` = neither named anywhere nor the `others` declarer itself.
    let others: Vec<usize> = (0..fragments.len())
        .filter(|&i| {
            let name = fragments[i].name.as_str();
            !mentioned.contains(name) && declarer != Some(name)
        })
        .collect();

    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); fragments.len()];
    let mut add_edge = |from: usize, to: usize| {
        if !edges[from].contains(&to) {
            edges[from].push(to);
        }
    };
    for (i, fragment) in fragments.iter().enumerate() {
        for entry in &fragment.before {
            match entry {
                OrderingEntry::Named(name) => {
                    if let Some(&j) = position.get(name.as_str()) {
                        add_edge(i, j);
                    }
                }
                OrderingEntry::Others => others.iter().filter(|&&j| j != i).for_each(|&j| add_edge(i, j)),
            }
        }
        for entry in &fragment.after {
            match entry {
                OrderingEntry::Named(name) => {
                    if let Some(&j) = position.get(name.as_str()) {
                        add_edge(j, i);
                    }
                }
                OrderingEntry::Others => others.iter().filter(|&&j| j != i).for_each(|&j| add_edge(j, i)),
            }
        }
    }

    let sorted = stable_topological_sort(&edges);
    if sorted.len() == fragments.len() {
        return Ok(sorted.into_iter().map(|i| fragments[i].name.clone()).collect());
    }

    let placed: HashSet<usize> = sorted.into_iter().collect();
    let participants = cycle_participants(&edges, &placed)
        .into_iter()
        .map(|i| fragments[i].name.clone())
        .collect();
    Err(OrderingError::Cycle { participants })
}

/// Kahn's algorithm; among ready nodes the lowest index goes first.
/// Nodes on or behind a cycle are left out of the result.
fn stable_topological_sort(edges: &[Vec<usize>]) -> Vec<usize> {
    let mut in_degree = vec![0usize; edges.len()];
    for targets in edges {
        for &to in targets {
            in_degree[to] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut out = Vec::with_capacity(edges.len());
    while let Some(Reverse(node)) = ready.pop() {
        out.push(node);
        for &to in &edges[node] {
            in_degree[to] -= 1;
            if in_degree[to] == 0 {
                ready.push(Reverse(to));
            }
        }
    }
    out
}

/// Unplaced nodes minus those that only sit downstream of a cycle.
fn cycle_participants(edges: &[Vec<usize>], placed: &HashSet<usize>) -> Vec<usize> {
    let mut remaining: HashSet<usize> = (0..edges.len()).filter(|i| !placed.contains(i)).collect();
    loop {
        let sinks: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&n| !edges[n].iter().any(|to| remaining.contains(to)))
            .collect();
        if sinks.is_empty() {
            break;
        }
        for n in sinks {
            remaining.remove(&n);
        }
    }
    let mut participants: Vec<usize> = remaining.into_iter().collect();
    participants.sort_unstable();
    participants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn index_of(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_relative_before_after() {
        let fragments = vec![
            Fragment::new("F1").after("F2"),
            Fragment::new("F2"),
            Fragment::new("F3").before("F1"),
        ];
        let result = order(&fragments, None).unwrap();
        assert!(index_of(&result, "F2") < index_of(&result, "F1"));
        assert!(index_of(&result, "F3") < index_of(&result, "F1"));
        assert_eq!(result, names(&["F2", "F3", "F1"]));
    }

    #[test]
    fn test_relative_without_constraints_keeps_discovery_order() {
        let fragments = vec![Fragment::new("c"), Fragment::new("a"), Fragment::new("b")];
        assert_eq!(order(&fragments, None).unwrap(), names(&["c", "a", "b"]));
    }

    #[test]
    fn test_cycle_names_both() {
        let fragments = vec![Fragment::new("A").before("B"), Fragment::new("B").before("A")];
        let err = order(&fragments, None).unwrap_err();
        assert_eq!(
            err,
            OrderingError::Cycle {
                participants: names(&["A", "B"])
            }
        );
    }

    #[test]
    fn test_cycle_excludes_downstream_nodes() {
        let fragments = vec![
            Fragment::new("A").before("B"),
            Fragment::new("B").before("A").before("C"),
            Fragment::new("C"),
            Fragment::new("D"),
        ];
        match order(&fragments, None) {
            Err(OrderingError::Cycle { participants }) => assert_eq!(participants, names(&["A", "B"])),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let fragments = vec![Fragment::new("A").after("A")];
        assert!(matches!(order(&fragments, None), Err(OrderingError::Cycle { .. })));
    }

    #[test]
    fn test_before_others() {
        let fragments = vec![
            Fragment::new("a"),
            Fragment::new("b"),
            Fragment::new("first").before_others(),
        ];
        assert_eq!(order(&fragments, None).unwrap(), names(&["first", "a", "b"]));
    }

    #[test]
    fn test_after_others_with_named_constraint() {
        // `z` is named by `y`, so it is not part of `last`'s others.
        let fragments = vec![
            Fragment::new("last").after_others(),
            Fragment::new("x"),
            Fragment::new("y").before("z"),
            Fragment::new("z"),
        ];
        let result = order(&fragments, None).unwrap();
        assert_eq!(result, names(&["x", "y", "last", "z"]));
    }

    #[test]
    fn test_others_in_two_fragments_is_error() {
        let fragments = vec![
            Fragment::new("p"),
            Fragment::new("second").before_others(),
            Fragment::new("first").after_others(),
        ];
        assert_eq!(
            order(&fragments, None),
            Err(OrderingError::DuplicateOthers {
                location: "fragments second, first".to_string()
            })
        );
    }

    #[test]
    fn test_others_twice_in_one_fragment_is_error() {
        let fragments = vec![Fragment::new("a").before_others().after_others(), Fragment::new("b")];
        assert!(matches!(
            order(&fragments, None),
            Err(OrderingError::DuplicateOthers { .. })
        ));
    }

    #[test]
    fn test_duplicate_fragment_name() {
        let fragments = vec![Fragment::new("a"), Fragment::new("a")];
        assert_eq!(
            order(&fragments, None),
            Err(OrderingError::DuplicateFragment("a".to_string()))
        );
    }

    #[test]
    fn test_absolute_with_others() {
        let fragments = vec![Fragment::new("F1"), Fragment::new("F2"), Fragment::new("F3")];
        let absolute = vec![
            OrderingEntry::named("F3"),
            OrderingEntry::Others,
            OrderingEntry::named("F1"),
        ];
        assert_eq!(
            order(&fragments, Some(&absolute)).unwrap(),
            names(&["F3", "F2", "F1"])
        );
    }

    #[test]
    fn test_absolute_drops_unlisted_and_ignores_relative() {
        let fragments = vec![
            Fragment::new("F1").before("F2"),
            Fragment::new("F2"),
            Fragment::new("F3"),
        ];
        let absolute = vec![OrderingEntry::named("F2"), OrderingEntry::named("F1"), OrderingEntry::named("ghost")];
        assert_eq!(order(&fragments, Some(&absolute)).unwrap(), names(&["F2", "F1"]));
    }

    #[test]
    fn test_absolute_duplicate_others() {
        let fragments = vec![Fragment::new("F1")];
        let absolute = vec![OrderingEntry::Others, OrderingEntry::Others];
        assert!(matches!(
            order(&fragments, Some(&absolute)),
            Err(OrderingError::DuplicateOthers { .. })
        ));
    }

    #[test]
    fn test_unknown_constraint_ignored() {
        let fragments = vec![Fragment::new("a").after("missing"), Fragment::new("b")];
        assert_eq!(order(&fragments, None).unwrap(), names(&["a", "b"]));
    }
}
