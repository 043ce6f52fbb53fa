//! Dependency graph construction through the public API
//!
//! A tiny line-based parser stands in for the external construct supplier:
//! every line whose trimmed text starts with `fn ` is an element named after
//! the function.

use edit_history::operation::Action;
use edit_history::{
    BuildConfig, BuildTask, ConstructFact, ConstructTable, EdgeKind, FileGraph, GraphBuilder,
    NoConstructs, Node, NullMonitor, Operation, OperationLog, TaskOutcome, Timestamp,
};
use edit_history::TrackedOffsets;
use std::collections::{BTreeSet, HashSet};

const PATH: &str = "src/lib.rs";

fn fn_parser(_path: &str, _index: usize, _time: Timestamp, code: &str) -> anyhow::Result<Vec<ConstructFact>> {
    let mut facts = Vec::new();
    let mut offset = 0;
    for line in code.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n');
        let body = trimmed.trim();
        if let Some(rest) = body.strip_prefix("fn ") {
            if let Some(paren) = rest.find('(') {
                let name = &rest[..paren];
                let indent = trimmed.chars().count() - trimmed.trim_start().chars().count();
                facts.push(ConstructFact {
                    name: name.to_string(),
                    qualified_name: format!("lib::{}", name),
                    start: offset + indent,
                    end: offset + indent + body.chars().count(),
                });
            }
        }
        offset += line.chars().count();
    }
    Ok(facts)
}

fn build(log: &OperationLog, config: &BuildConfig) -> FileGraph {
    GraphBuilder::new(log, config)
        .build(&fn_parser, &NullMonitor)
        .unwrap()
        .unwrap()
}

fn construct(graph: &FileGraph, name: &str, time: i64) -> edit_history::NodeId {
    graph
        .node_by_key(&format!("lib::{}@{}", name, time))
        .unwrap_or_else(|| panic!("no construct {}@{}", name, time))
}

/// "fn a() {}\nfn b() {}\n" with an `x` typed inside b's braces
fn two_functions(with_snapshot: bool) -> OperationLog {
    let mut ops = vec![
        Operation::snapshot(0, PATH, "fn a() {}\nfn b() {}\n"),
        Operation::document(1, PATH, 18, "x", ""),
    ];
    if with_snapshot {
        ops.push(Operation::snapshot(2, PATH, "fn a() {}\nfn b() {x}\n").with_action(Action::Save));
    }
    OperationLog::from_operations(ops).unwrap()
}

#[test]
fn test_edit_links_to_enclosing_function_only() {
    let graph = build(&two_functions(true), &BuildConfig::default());
    let op = graph.operation_node_at(Timestamp(1)).unwrap();

    assert_eq!(graph.src_nodes(op), vec![construct(&graph, "b", 0)]);
    assert_eq!(graph.dst_nodes(op), vec![construct(&graph, "b", 2)]);

    // a() never changed; b() was edited so it gets no NoChange edge
    let no_change: Vec<_> = graph.edges_of_kind(EdgeKind::NoChange).collect();
    assert_eq!(no_change.len(), 1);
    assert_eq!(no_change[0].src, construct(&graph, "a", 0));
    assert_eq!(no_change[0].dst, construct(&graph, "a", 2));
}

#[test]
fn test_periodic_snapshot_is_replayed() {
    let config = BuildConfig {
        snapshot_interval: Some(1),
        ..BuildConfig::default()
    };
    let graph = build(&two_functions(false), &config);
    assert_eq!(graph.snapshots().len(), 2);
    assert_eq!(graph.snapshots()[1].index, 1);

    let op = graph.operation_node_at(Timestamp(1)).unwrap();
    assert_eq!(graph.dst_nodes(op), vec![construct(&graph, "b", 1)]);
    let Some(Node::Construct(b)) = graph.node(construct(&graph, "b", 1)) else {
        panic!("expected construct");
    };
    assert_eq!((b.construct.start, b.construct.end), (10, 20));
}

#[test]
fn test_table_times_schedule_snapshots() {
    let mut table = ConstructTable::new();
    table.insert(
        PATH,
        Timestamp(1),
        vec![ConstructFact {
            name: "b".into(),
            qualified_name: "lib::b".into(),
            start: 10,
            end: 20,
        }],
    );
    let log = two_functions(false);
    let graph = GraphBuilder::new(&log, &BuildConfig::default())
        .build(&table, &NullMonitor)
        .unwrap()
        .unwrap();
    assert_eq!(graph.snapshots().len(), 2);
    let op = graph.operation_node_at(Timestamp(1)).unwrap();
    assert_eq!(graph.dst_nodes(op), vec![construct(&graph, "b", 1)]);
}

#[test]
fn test_copy_then_paste_gets_ccp_edge() {
    let log = OperationLog::from_operations(vec![
        Operation::snapshot(0, PATH, &"-".repeat(30)),
        Operation::copy(1, PATH, 5, "foo"),
        Operation::document(2, PATH, 20, "foo", "").with_action(Action::Paste),
    ])
    .unwrap();
    let graph = build(&log, &BuildConfig::default());
    let copy = graph.operation_node_at(Timestamp(1)).unwrap();
    let paste = graph.operation_node_at(Timestamp(2)).unwrap();

    assert!(graph.contains_edge(&edit_history::Edge::new(copy, paste, EdgeKind::CCP)));
    assert_eq!(graph.edges_of_kind(EdgeKind::CCP).count(), 1);
}

#[test]
fn test_no_change_across_snapshots_with_later_edits() {
    let base = format!("{}fn m() {{ body(); }}{}", " ".repeat(10), " ".repeat(20));
    let mut log = OperationLog::new(PATH, "");
    log.append(Operation::snapshot(0, PATH, &base)).unwrap();
    log.append(Operation::document(1, PATH, 35, "tail", "")).unwrap();
    log.append(Operation::document(2, PATH, 40, "", " ")).unwrap();
    let later = {
        let mut chars: Vec<char> = base.chars().collect();
        chars.splice(35..35, "tail".chars());
        chars.remove(40);
        chars.into_iter().collect::<String>()
    };
    log.append(Operation::snapshot(3, PATH, &later).with_action(Action::Save)).unwrap();

    let graph = build(&log, &BuildConfig::default());
    let older = construct(&graph, "m", 0);
    let newer = construct(&graph, "m", 3);
    assert!(graph.contains_edge(&edit_history::Edge::new(older, newer, EdgeKind::NoChange)));
    assert_eq!(graph.edges_of_kind(EdgeKind::BackwardEdit).count(), 0);
}

#[test]
fn test_query_surface() {
    let graph = build(&two_functions(true), &BuildConfig::default());
    let op = graph.operation_node_at(Timestamp(1)).unwrap();

    assert_eq!(graph.nodes_before(Timestamp(1)).len(), 2);
    assert!(graph.nodes_before(Timestamp(1)).contains(&construct(&graph, "a", 0)));
    assert_eq!(graph.nodes_after(Timestamp(1)).len(), 2);
    assert!(!graph.nodes_after(Timestamp(1)).contains(&op));

    let log = two_functions(true);
    assert_eq!(graph.operation_node_for(&log.operations()[1]), Some(op));
    assert_eq!(graph.last_build(), Some(Timestamp(2)));
    assert!(!graph.is_stale(log.last_updated()));

    let stats = graph.stats();
    assert_eq!(stats.operation_nodes, 1);
    assert_eq!(stats.construct_nodes, 4);
    assert_eq!(stats.snapshots, 2);
    assert_eq!(stats.total_edges(), graph.edge_count());
}

/// Deterministic pseudo-random editing session
fn noisy_session(steps: usize) -> OperationLog {
    let mut text: Vec<char> = "fn a() {}\nfn b() {}\nfn c() {}\n".chars().collect();
    let mut ops = vec![Operation::snapshot(0, PATH, &text.iter().collect::<String>())];
    let mut seed: u64 = 0x2545_f491;
    for step in 1..=steps {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let roll = (seed >> 33) as usize;
        let pos = roll % (text.len() + 1);
        let time = step as i64;
        if roll % 3 == 0 && pos < text.len() {
            let deleted = text.remove(pos).to_string();
            ops.push(Operation::document(time, PATH, pos, "", &deleted));
        } else if roll % 7 == 0 {
            let end = (pos + 3).min(text.len());
            let copied: String = text[pos..end].iter().collect();
            ops.push(Operation::copy(time, PATH, pos, &copied));
        } else {
            text.insert(pos, 'x');
            ops.push(Operation::document(time, PATH, pos, "x", ""));
        }
    }
    OperationLog::from_operations(ops).unwrap()
}

#[test]
fn test_edges_unique_and_ordered_forward_in_time() {
    let config = BuildConfig {
        snapshot_interval: Some(5),
        ..BuildConfig::default()
    };
    let log = noisy_session(60);
    let graph = build(&log, &config);

    let unique: HashSet<_> = graph.edges().iter().collect();
    assert_eq!(unique.len(), graph.edge_count());

    for edge in graph.edges_of_kind(EdgeKind::Ordered) {
        let src = graph.node(edge.src).unwrap();
        let dst = graph.node(edge.dst).unwrap();
        assert!(src.is_operation() && dst.is_operation());
        assert!(src.time() < dst.time());
    }
    for edge in graph.edges_of_kind(EdgeKind::NoChange) {
        assert!(graph.node(edge.src).unwrap().time() < graph.node(edge.dst).unwrap().time());
    }
}

/// Ordered edges from walking every later edit back through all earlier ones
fn ordered_by_full_walk(graph: &FileGraph, link_copies: bool) -> BTreeSet<(u32, u32)> {
    let ops: Vec<_> = graph
        .operation_nodes()
        .iter()
        .map(|&id| (id, graph.node(id).unwrap().as_operation().unwrap().span))
        .collect();
    let mut edges = BTreeSet::new();
    for (later, (dst, span)) in ops.iter().enumerate() {
        let mut tracked = TrackedOffsets::for_span(span);
        for (src, earlier) in ops[..later].iter().rev() {
            if tracked.is_empty() {
                break;
            }
            if tracked.offer(earlier, link_copies).depends {
                edges.insert((src.0, dst.0));
            }
        }
    }
    edges
}

fn ordered_edges(graph: &FileGraph) -> BTreeSet<(u32, u32)> {
    graph
        .edges_of_kind(EdgeKind::Ordered)
        .map(|edge| (edge.src.0, edge.dst.0))
        .collect()
}

#[test]
fn test_ordered_edges_match_full_history_walk() {
    let config = BuildConfig::default();
    for steps in [20, 80, 200] {
        let graph = build(&noisy_session(steps), &config);
        assert_eq!(ordered_edges(&graph), ordered_by_full_walk(&graph, config.link_copy_sources));
    }
}

#[test]
fn test_typing_at_the_end_builds_without_ordered_edges() {
    let mut log = OperationLog::new(PATH, "");
    log.append(Operation::snapshot(0, PATH, "")).unwrap();
    for step in 0..10_000usize {
        log.append(Operation::document(step as i64 + 1, PATH, step, "x", "")).unwrap();
    }
    // backspace then retype the last character
    log.append(Operation::document(10_001, PATH, 9_999, "", "x")).unwrap();
    log.append(Operation::document(10_002, PATH, 9_999, "y", "")).unwrap();

    let graph = build(&log, &BuildConfig::default());
    let ordered: Vec<_> = graph.edges_of_kind(EdgeKind::Ordered).collect();
    assert_eq!(ordered.len(), 2);
    let at = |time: i64| graph.operation_node_at(Timestamp(time)).unwrap();
    assert!(graph.src_nodes(at(10_001)).contains(&at(10_000)));
    assert_eq!(graph.src_nodes(at(10_002)), vec![at(10_001)]);
}

#[test]
fn test_graph_build_as_background_task() {
    let log = noisy_session(30);
    let task = BuildTask::spawn("graph", move |token| {
        TaskOutcome::from_result(GraphBuilder::new(&log, &BuildConfig::default()).build(&NoConstructs, token))
    });
    let graph = task.wait().completed().unwrap();
    assert_eq!(graph.path(), PATH);
    assert!(graph.node_count() > 0);
}

#[test]
fn test_cancelled_background_build_yields_no_graph() {
    let log = noisy_session(30);
    let task = BuildTask::spawn("graph", move |token| {
        while !token.is_cancelled() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        TaskOutcome::from_result(GraphBuilder::new(&log, &BuildConfig::default()).build(&NoConstructs, token))
    });
    task.cancel();
    assert!(matches!(task.wait(), TaskOutcome::Cancelled));
}

#[tokio::test]
async fn test_build_completion_is_awaitable() {
    let log = two_functions(true);
    let task = BuildTask::spawn("graph", move |token| {
        TaskOutcome::from_result(GraphBuilder::new(&log, &BuildConfig::default()).build(&fn_parser, token))
    });
    let graph = task.join().await.completed().unwrap();
    assert_eq!(graph.stats().construct_nodes, 4);
}
