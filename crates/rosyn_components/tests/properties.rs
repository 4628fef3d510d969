//! Random tag, move and removal sequences against the lifecycle invariants.

mod common;

use common::*;
use proptest::prelude::*;
use rosyn_components::ComponentType;
use rosyn_tree::{NodeId, TagService, Tree};

const NODES: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Tag(usize),
    Untag(usize),
    /// Target 0 is the workspace, 1 is storage, `k + 2` is node `k`.
    Move(usize, usize),
    Remove(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..NODES).prop_map(Op::Tag),
        2 => (0..NODES).prop_map(Op::Untag),
        2 => (0..NODES, 0..NODES + 2).prop_map(|(node, target)| Op::Move(node, target)),
        1 => (0..NODES).prop_map(Op::Remove),
    ]
}

/// Parent choice per node: 0 is the workspace, `k + 1` is node `k` (clamped
/// to earlier nodes).
fn arb_parents() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..NODES, NODES)
}

fn apply(world: &World, nodes: &[NodeId], op: &Op) {
    // Moves into cycles or detached nodes are rejected by the tree; that is
    // part of the sequence too.
    match *op {
        Op::Tag(i) => {
            world.tags.add_tag(nodes[i], DAMAGEABLE);
        }
        Op::Untag(i) => {
            world.tags.remove_tag(nodes[i], DAMAGEABLE);
        }
        Op::Move(i, target) => {
            let parent = match target {
                0 => world.workspace,
                1 => world.storage,
                k => nodes[k - 2],
            };
            let _ = world.tree.reparent(nodes[i], parent);
        }
        Op::Remove(i) => {
            let _ = world.tree.remove(nodes[i]);
        }
    }
}

/// Returns a description of every broken invariant.
fn violations(world: &World, nodes: &[NodeId]) -> Vec<String> {
    let health = ComponentType::of::<Health>();
    let mut found = Vec::new();
    for node in nodes {
        let expected = world.tree.contains(*node)
            && world.tags.has_tag(*node, DAMAGEABLE)
            && world.tree.is_ancestor_of(world.workspace, *node);
        let live = world.rosyn.get_component(*node, &health).is_some();
        if expected != live {
            found.push(format!("{node}: expected live={expected}, got {live}"));
        }

        let (now, peak) = alive(*node);
        if now != usize::from(live) || peak > 1 {
            found.push(format!("{node}: {now} alive, peak {peak}"));
        }
    }
    found
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// After every step, exactly the tagged in-scope nodes hold one instance;
    /// after shutdown every instance was destroyed exactly once.
    #[test]
    fn instances_track_tagged_in_scope_nodes(
        parents in arb_parents(),
        ops in prop::collection::vec(arb_op(), 1..40),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (steps, after_shutdown) = rt.block_on(async {
            let world = World::new();
            world
                .rosyn
                .register(DAMAGEABLE, &[ComponentType::of::<Health>()], world.workspace)
                .unwrap();

            let mut nodes: Vec<NodeId> = Vec::with_capacity(NODES);
            for (index, choice) in parents.iter().enumerate() {
                let parent = match (*choice, index) {
                    (0, _) | (_, 0) => world.workspace,
                    (k, _) => nodes[(k - 1).min(index - 1)],
                };
                nodes.push(world.spawn(&format!("N{index}"), parent));
            }

            let mut steps = Vec::new();
            for op in &ops {
                apply(&world, &nodes, op);
                steps.push((op.clone(), violations(&world, &nodes)));
            }

            world.rosyn.shutdown();
            let leaked: Vec<String> = nodes
                .iter()
                .filter(|node| {
                    alive(**node).0 != 0
                        || world.count(**node, "Health", Hook::Construct)
                            != world.count(**node, "Health", Hook::Destroy)
                })
                .map(ToString::to_string)
                .collect();
            (steps, leaked)
        });

        for (op, found) in steps {
            prop_assert!(found.is_empty(), "after {:?}: {:?}", op, found);
        }
        prop_assert!(after_shutdown.is_empty(), "leaked on {:?}", after_shutdown);
    }
}
