//! Unit tests for bastion-hierarchy

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use bastion_types::{AccessError, GraphKind, RoleName};
use proptest::prelude::*;
use test_case::test_case;

use crate::HierarchyGraph;

fn role(name: &str) -> RoleName {
    RoleName::new(name)
}

fn roles(names: &[&str]) -> BTreeSet<RoleName> {
    names.iter().map(|n| role(n)).collect()
}

/// r1 -> r2 -> r3 (r1 parent of r2, r2 parent of r3).
fn chain() -> HierarchyGraph<RoleName> {
    let graph = HierarchyGraph::new(GraphKind::Role);
    graph.add_edge(&role("r1"), &role("r2")).unwrap();
    graph.add_edge(&role("r2"), &role("r3")).unwrap();
    graph
}

// ============================================================================
// Closure Tests
// ============================================================================

#[test]
fn closures_are_transitive() {
    let graph = chain();

    assert!(graph.descendants(&role("r1")).contains(&role("r3")));
    assert!(graph.ascendants(&role("r3")).contains(&role("r1")));
    assert_eq!(graph.ascendants(&role("r3")), roles(&["r1", "r2"]));
    assert_eq!(graph.descendants(&role("r1")), roles(&["r2", "r3"]));
}

#[test]
fn closures_exclude_the_node_itself() {
    let graph = chain();
    assert!(!graph.ascendants(&role("r2")).contains(&role("r2")));
    assert!(!graph.descendants(&role("r2")).contains(&role("r2")));
}

#[test]
fn unknown_node_has_empty_closures() {
    let graph = chain();
    assert!(graph.ascendants(&role("ghost")).is_empty());
    assert!(graph.descendants(&role("ghost")).is_empty());
}

#[test]
fn closure_adds_ascendants_to_the_given_nodes() {
    let graph = chain();
    let closure = graph.closure([&role("r3")]);
    assert_eq!(closure, roles(&["r1", "r2", "r3"]));
}

#[test]
fn closures_follow_case_insensitive_names() {
    let graph = chain();
    assert!(graph.is_ascendant(&role("R1"), &role("r3")));
}

#[test]
fn diamond_closures_are_deduplicated() {
    let graph = HierarchyGraph::new(GraphKind::Role);
    graph.add_edge(&role("top"), &role("left")).unwrap();
    graph.add_edge(&role("top"), &role("right")).unwrap();
    graph.add_edge(&role("left"), &role("bottom")).unwrap();
    graph.add_edge(&role("right"), &role("bottom")).unwrap();

    assert_eq!(
        graph.ascendants(&role("bottom")),
        roles(&["left", "right", "top"])
    );
}

// ============================================================================
// Mutation Tests
// ============================================================================

#[test]
fn cyclic_edge_is_rejected_and_graph_unchanged() {
    let graph = chain();
    let before = graph.snapshot();

    let result = graph.add_edge(&role("r3"), &role("r1"));

    assert!(matches!(
        result,
        Err(AccessError::CyclicRelationship {
            graph: GraphKind::Role,
            ..
        })
    ));
    let after = graph.snapshot();
    assert_eq!(before.version(), after.version());
    assert_eq!(before.edges(), after.edges());
}

#[test]
fn self_edge_is_cyclic() {
    let graph = HierarchyGraph::new(GraphKind::AdminRole);
    assert!(matches!(
        graph.add_edge(&role("a"), &role("a")),
        Err(AccessError::CyclicRelationship { .. })
    ));
}

#[test]
fn duplicate_edge_is_rejected() {
    let graph = chain();
    assert!(matches!(
        graph.add_edge(&role("r1"), &role("r2")),
        Err(AccessError::RelationshipExists { .. })
    ));
}

#[test]
fn removing_missing_edge_fails() {
    let graph = chain();
    assert!(matches!(
        graph.remove_edge(&role("r1"), &role("r3")),
        Err(AccessError::RelationshipNotFound { .. })
    ));
}

#[test]
fn removing_edge_invalidates_closures() {
    let graph = chain();
    assert!(graph.is_ascendant(&role("r1"), &role("r3")));

    graph.remove_edge(&role("r1"), &role("r2")).unwrap();

    assert!(!graph.is_ascendant(&role("r1"), &role("r3")));
    assert_eq!(graph.ascendants(&role("r3")), roles(&["r2"]));
}

#[test]
fn failed_persist_publishes_nothing() {
    let graph = chain();
    let before = graph.snapshot().version();

    let result = graph.add_edge_with(&role("r3"), &role("r4"), || {
        Err(AccessError::BackingStore("disk full".into()))
    });

    assert!(matches!(result, Err(AccessError::BackingStore(_))));
    assert_eq!(graph.snapshot().version(), before);
    assert!(graph.children(&role("r3")).is_empty());
}

#[test]
fn attached_node_cannot_be_removed() {
    let graph = chain();
    assert!(matches!(
        graph.remove_node(&role("r2")),
        Err(AccessError::NodeInUse { .. })
    ));
    assert!(graph.remove_node(&role("detached")).is_ok());
}

#[test]
fn relinking_removal_connects_parents_to_children() {
    let graph = chain();

    graph.remove_node_relinking(&role("r2")).unwrap();

    let snapshot = graph.snapshot();
    assert!(!snapshot.contains(&role("r2")));
    assert!(snapshot.has_edge(&role("r1"), &role("r3")));
    assert_eq!(snapshot.edge_count(), 1);
}

#[test_case(2, true; "within limit")]
#[test_case(1, false; "over limit")]
fn depth_limit_is_enforced(max_depth: usize, ok: bool) {
    let graph = HierarchyGraph::new(GraphKind::UserOrgUnit).with_max_depth(max_depth);
    graph.add_edge(&role("a"), &role("b")).unwrap();

    let result = graph.add_edge(&role("b"), &role("c"));

    assert_eq!(result.is_ok(), ok);
    if !ok {
        assert!(matches!(result, Err(AccessError::ValidationFailed(_))));
    }
}

#[test]
fn from_edges_rejects_cycles() {
    let edges = vec![
        (role("a"), role("b")),
        (role("b"), role("c")),
        (role("c"), role("a")),
    ];
    assert!(HierarchyGraph::from_edges(GraphKind::Role, 64, edges).is_err());
}

#[test]
fn from_edges_names_an_edge_on_the_cycle() {
    // a -> b -> c -> d -> b, with d -> e hanging below the loop.
    let edges = vec![
        (role("a"), role("b")),
        (role("b"), role("c")),
        (role("c"), role("d")),
        (role("d"), role("b")),
        (role("d"), role("e")),
    ];

    let err = HierarchyGraph::from_edges(GraphKind::Role, 64, edges).unwrap_err();

    let AccessError::CyclicRelationship { ref parent, ref child, .. } = err else {
        panic!("expected a cycle, got {err:?}");
    };
    let on_cycle = ["b", "c", "d"];
    assert!(on_cycle.contains(&parent.as_str()), "{parent}");
    assert!(on_cycle.contains(&child.as_str()), "{child}");
}

#[test]
fn from_edges_loads_a_long_chain() {
    let names: Vec<RoleName> = (0..1000).map(|i| RoleName::new(format!("n{i}"))).collect();
    let edges = names.windows(2).map(|w| (w[0].clone(), w[1].clone()));

    let graph = HierarchyGraph::from_edges(GraphKind::Role, 1024, edges).unwrap();

    let snapshot = graph.snapshot();
    assert_eq!(snapshot.edge_count(), 999);
    assert!(snapshot.is_ascendant(&names[0], &names[999]));
    assert_eq!(snapshot.descendants(&names[500]).len(), 499);
}

#[test]
fn replace_edges_enforces_depth_and_keeps_old_graph() {
    let graph = chain().with_max_depth(3);
    let before = graph.snapshot().version();
    let deep = vec![
        (role("a"), role("b")),
        (role("b"), role("c")),
        (role("c"), role("d")),
        (role("d"), role("e")),
    ];

    assert!(matches!(
        graph.replace_edges(deep),
        Err(AccessError::ValidationFailed(_))
    ));
    assert_eq!(graph.snapshot().version(), before);
    assert!(graph.is_ascendant(&role("r1"), &role("r3")));

    graph
        .replace_edges(vec![(role("a"), role("b")), (role("x"), role("b"))])
        .unwrap();
    assert_eq!(graph.snapshot().version(), before + 1);
    assert_eq!(graph.ascendants(&role("b")), roles(&["a", "x"]));
    assert!(!graph.snapshot().contains(&role("r1")));
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[test]
fn readers_see_whole_snapshots_during_writes() {
    let graph = Arc::new(HierarchyGraph::new(GraphKind::Role));
    let names: Vec<RoleName> = (0..40).map(|i| RoleName::new(format!("n{i}"))).collect();

    let writer = {
        let graph = Arc::clone(&graph);
        let names = names.clone();
        thread::spawn(move || {
            for pair in names.windows(2) {
                graph.add_edge(&pair[0], &pair[1]).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let graph = Arc::clone(&graph);
            let last = names[names.len() - 1].clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let snapshot = graph.snapshot();
                    // A chain snapshot with k edges gives the tail k ascendants
                    // or none at all if the tail is not linked yet.
                    let asc = snapshot.ascendants(&last).len();
                    let edges = snapshot.edge_count();
                    assert!(asc == 0 || asc == edges);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(graph.ascendants(&names[39]).len(), 39);
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn bulk_load_agrees_with_edge_by_edge(edges in prop::collection::vec((0u8..8, 0u8..8), 0..24)) {
        let edges: Vec<(RoleName, RoleName)> = edges
            .into_iter()
            .map(|(p, c)| (role(&format!("n{p}")), role(&format!("n{c}"))))
            .collect();
        let stepwise = HierarchyGraph::new(GraphKind::Role).with_max_depth(4);
        let all_added = edges.iter().all(|(p, c)| stepwise.add_edge(p, c).is_ok());

        let bulk = HierarchyGraph::from_edges(GraphKind::Role, 4, edges);

        prop_assert_eq!(bulk.is_ok(), all_added);
        if let Ok(bulk) = bulk {
            prop_assert_eq!(bulk.snapshot().edges(), stepwise.snapshot().edges());
        }
    }

    #[test]
    fn graph_stays_acyclic(edges in prop::collection::vec((0u8..8, 0u8..8), 0..40)) {
        let graph = HierarchyGraph::new(GraphKind::Role);
        for (p, c) in edges {
            let _ = graph.add_edge(&role(&format!("n{p}")), &role(&format!("n{c}")));
        }

        let snapshot = graph.snapshot();
        for node in snapshot.nodes() {
            prop_assert!(!snapshot.ascendants(&node).contains(&node));
        }
    }

    #[test]
    fn ascendants_and_descendants_mirror(edges in prop::collection::vec((0u8..8, 0u8..8), 0..40)) {
        let graph = HierarchyGraph::new(GraphKind::Role);
        for (p, c) in edges {
            let _ = graph.add_edge(&role(&format!("n{p}")), &role(&format!("n{c}")));
        }

        let snapshot = graph.snapshot();
        for a in snapshot.nodes() {
            for b in snapshot.nodes() {
                prop_assert_eq!(
                    snapshot.ascendants(&b).contains(&a),
                    snapshot.descendants(&a).contains(&b)
                );
            }
        }
    }
}
