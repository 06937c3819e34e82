//! Property-based tests for package graph invariants.
//!
//! - Every dependency lands in an earlier publish level than its dependents
//! - Packages in one level never depend on each other
//! - Propagation does not depend on seed order and is idempotent

use proptest::prelude::*;
use releasekit_graph::{PackageGraph, PackageNodeData};
use std::collections::HashMap;

#[derive(Clone, Debug)]
struct PropPackage {
    deps: Vec<String>,
}

impl PackageNodeData for PropPackage {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.deps.iter().map(String::as_str)
    }
}

fn package_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,8}".prop_map(String::from)
}

/// Generate an acyclic package set: each package may only depend on
/// packages generated before it.
fn dag_strategy(
    min_packages: usize,
    max_packages: usize,
) -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    (min_packages..=max_packages).prop_flat_map(|count| {
        proptest::collection::vec(package_name_strategy(), count).prop_flat_map(move |names| {
            let unique: Vec<String> = names
                .into_iter()
                .enumerate()
                .map(|(i, name)| format!("{name}-{i}"))
                .collect();

            let dep_strategies: Vec<_> = (0..count)
                .map(|i| {
                    if i == 0 {
                        Just(vec![]).boxed()
                    } else {
                        proptest::collection::vec(
                            proptest::sample::select(unique[..i].to_vec()),
                            0..=i.min(3),
                        )
                        .boxed()
                    }
                })
                .collect();

            let unique = unique.clone();
            dep_strategies.prop_map(move |deps| {
                unique.iter().cloned().zip(deps).collect::<Vec<_>>()
            })
        })
    })
}

fn build(packages: &[(String, Vec<String>)]) -> PackageGraph<PropPackage> {
    PackageGraph::from_packages(
        packages
            .iter()
            .map(|(name, deps)| (name.clone(), PropPackage { deps: deps.clone() })),
    )
}

proptest! {
    #[test]
    fn dependencies_publish_in_earlier_levels(packages in dag_strategy(1, 25)) {
        let graph = build(&packages);
        let levels = graph.publish_levels().unwrap();

        let level_of: HashMap<&str, usize> = levels
            .iter()
            .enumerate()
            .flat_map(|(i, names)| names.iter().map(move |n| (n.as_str(), i)))
            .collect();

        prop_assert_eq!(level_of.len(), packages.len());
        for (name, deps) in &packages {
            for dep in deps {
                prop_assert!(level_of[dep.as_str()] < level_of[name.as_str()]);
            }
        }
    }

    #[test]
    fn levels_have_no_internal_edges(packages in dag_strategy(1, 25)) {
        let graph = build(&packages);
        for level in graph.publish_levels().unwrap() {
            for name in &level {
                let deps = graph.dependencies_of(name).unwrap();
                prop_assert!(deps.iter().all(|d| !level.contains(d)));
            }
        }
    }

    #[test]
    fn propagation_is_order_independent_and_idempotent(
        packages in dag_strategy(1, 20),
        seed_picks in proptest::collection::vec((any::<prop::sample::Index>(), 0u8..4), 0..6),
    ) {
        let graph = build(&packages);
        let seeds: Vec<(String, u8)> = seed_picks
            .iter()
            .map(|(idx, value)| (packages[idx.index(packages.len())].0.clone(), *value))
            .collect();

        let mut forward = HashMap::new();
        for (name, value) in &seeds {
            let slot = forward.entry(name.clone()).or_insert(*value);
            *slot = (*slot).max(*value);
        }
        let mut backward = HashMap::new();
        for (name, value) in seeds.iter().rev() {
            let slot = backward.entry(name.clone()).or_insert(*value);
            *slot = (*slot).max(*value);
        }

        let cap = |v: u8| v.min(1);
        let a = graph.propagate(&forward, cap);
        let b = graph.propagate(&backward, cap);
        prop_assert_eq!(&a, &b);

        let again = graph.propagate(&a, cap);
        prop_assert_eq!(a, again);
    }

    #[test]
    fn back_edge_always_reports_cycle(packages in dag_strategy(2, 15)) {
        // Close a two-node cycle between the first and last package.
        let mut packages = packages;
        let last = packages[packages.len() - 1].0.clone();
        let first = packages[0].0.clone();
        packages[0].1.push(last.clone());
        packages.last_mut().unwrap().1.push(first.clone());

        let graph = build(&packages);
        let err = graph.publish_levels().unwrap_err();
        let members = err.cycle_members();
        prop_assert!(members.contains(&first));
        prop_assert!(members.contains(&last));
    }
}
