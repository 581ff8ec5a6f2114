//! Integration tests for recording, compiling and executing a single graph.
//!
//! # Test Categories
//!
//! - **Ordering Tests**: Reads run after the write they consume
//! - **Culling Tests**: Passes and resources that never reach an output are removed
//! - **Lifetime Tests**: Transients are materialized and released exactly once
//! - **Failure Tests**: Record-time, compile-time and execution-time errors

mod common;

use rstest::rstest;

use common::{add_pass, color, import_target, init_logging, plan_names};
use frame_graph::backend::*;
use frame_graph::render_graph::*;
use frame_graph::{GraphConfig, GraphError, OrphanPolicy, PassError};

/// Small graph shapes used by the ordering tests
#[derive(Debug, Clone, Copy)]
enum Shape {
    Chain,
    Diamond,
    Overwrite,
    ForwardRead,
    ReadModifyWrite,
}

fn build(shape: Shape, graph: &mut RenderGraph) -> Vec<&'static str> {
    let out = import_target(graph, 1);
    let t1 = graph.create_resource(color("T1")).unwrap();
    let t2 = graph.create_resource(color("T2")).unwrap();
    let t3 = graph.create_resource(color("T3")).unwrap();

    match shape {
        Shape::Chain => {
            add_pass(graph, "A", &[], &[t1]);
            add_pass(graph, "B", &[t1], &[t2]);
            add_pass(graph, "C", &[t2], &[out]);
            vec!["A", "B", "C"]
        }
        Shape::Diamond => {
            add_pass(graph, "A", &[], &[t1]);
            add_pass(graph, "B", &[t1], &[t2]);
            add_pass(graph, "C", &[t1], &[t3]);
            add_pass(graph, "D", &[t2, t3], &[out]);
            vec!["A", "B", "C", "D"]
        }
        Shape::Overwrite => {
            add_pass(graph, "A", &[], &[t1]);
            add_pass(graph, "B", &[t1], &[t2]);
            add_pass(graph, "C", &[], &[t1]);
            add_pass(graph, "D", &[t1, t2], &[out]);
            vec!["A", "B", "C", "D"]
        }
        Shape::ForwardRead => {
            add_pass(graph, "Consumer", &[t1], &[out]);
            add_pass(graph, "Producer", &[], &[t1]);
            vec!["Producer", "Consumer"]
        }
        Shape::ReadModifyWrite => {
            add_pass(graph, "A", &[], &[t1]);
            {
                let mut builder = graph.add_pass("B", "B").unwrap();
                builder.read_write(t1).unwrap();
                builder.set_execute((), |_, _| Ok(()));
            }
            add_pass(graph, "C", &[t1], &[out]);
            vec!["A", "B", "C"]
        }
    }
}

/// Every read in `plan` runs after the write it consumes.
fn assert_reads_follow_writes(graph: &RenderGraph, plan: &CompiledPlan) {
    for &reader in plan.pass_order() {
        let node = graph.pass(reader).unwrap();
        for access in node.accesses().iter().filter(|a| a.kind == AccessKind::Read) {
            let writers: Vec<PassHandle> = graph
                .passes()
                .iter()
                .filter(|p| p.is_valid() && p.writes_resource(access.resource))
                .map(|p| p.handle())
                .collect();
            let producer = writers
                .iter()
                .rev()
                .find(|w| w.index() < reader.index())
                .or_else(|| writers.iter().find(|w| w.index() > reader.index()));

            if let Some(&producer) = producer {
                assert!(
                    plan.position(producer).unwrap() < plan.position(reader).unwrap(),
                    "'{}' ran before its producer '{}'",
                    node.name(),
                    graph.pass(producer).unwrap().name()
                );
            }
        }
    }
}

#[rstest]
#[case::chain(Shape::Chain)]
#[case::diamond(Shape::Diamond)]
#[case::overwrite(Shape::Overwrite)]
#[case::forward_read(Shape::ForwardRead)]
#[case::read_modify_write(Shape::ReadModifyWrite)]
fn test_order_respects_dependencies(#[case] shape: Shape) {
    init_logging();
    let mut graph = RenderGraph::with_config(
        "ordering",
        GraphConfig {
            orphan_policy: OrphanPolicy::Warn,
        },
    );
    let expected = build(shape, &mut graph);

    let plan = graph.compile().unwrap();

    assert_eq!(plan_names(&graph, &plan), expected);
    assert_reads_follow_writes(&graph, &plan);
}

#[rstest]
#[case::chain(Shape::Chain)]
#[case::diamond(Shape::Diamond)]
#[case::overwrite(Shape::Overwrite)]
#[case::forward_read(Shape::ForwardRead)]
fn test_compile_is_deterministic(#[case] shape: Shape) {
    let mut first = RenderGraph::new("first");
    build(shape, &mut first);
    let mut second = RenderGraph::new("second");
    build(shape, &mut second);

    let plan = first.compile().unwrap();
    assert_eq!(plan, first.compile().unwrap());
    // Separately recorded graphs of the same shape schedule identically
    let second_plan = second.compile().unwrap();
    assert_eq!(plan_names(&first, &plan), plan_names(&second, &second_plan));
}

#[test]
fn test_producer_consumer_scenario() {
    init_logging();
    let mut graph = RenderGraph::new("scenario");
    let h2 = import_target(&mut graph, 42);
    let h1 = graph.create_resource(color("H1")).unwrap();
    add_pass(&mut graph, "PassA", &[], &[h1]);
    add_pass(&mut graph, "PassB", &[h1], &[h2]);

    let plan = graph.compile().unwrap();

    assert_eq!(plan_names(&graph, &plan), vec!["PassA", "PassB"]);
    // Written at step 0, read at step 1
    let h1_life = plan.lifetime(h1).unwrap();
    assert_eq!((h1_life.first_use, h1_life.last_use), (0, 1));
    assert!(!h1_life.pinned);

    let h2_life = plan.lifetime(h2).unwrap();
    assert!(h2_life.pinned);
    assert_eq!((h2_life.first_use, h2_life.last_use), (0, plan.len() - 1));
    assert!((0..plan.len()).all(|step| plan.is_resource_alive(h2, step)));
    assert!(!plan.can_alias(h1, h2));
}

#[test]
fn test_unobserved_pass_culled_scenario() {
    init_logging();
    let mut graph = RenderGraph::new("scenario");
    let h2 = import_target(&mut graph, 42);
    let h1 = graph.create_resource(color("H1")).unwrap();
    let h3 = graph.create_resource(color("H3")).unwrap();
    add_pass(&mut graph, "PassA", &[], &[h1]);
    add_pass(&mut graph, "PassB", &[h1], &[h2]);
    let pass_c = add_pass(&mut graph, "PassC", &[], &[h3]);

    let plan = graph.compile().unwrap();

    assert_eq!(plan_names(&graph, &plan), vec!["PassA", "PassB"]);
    assert!(plan.is_pass_culled(pass_c));
    assert_eq!(plan.culled_resources(), &[h3]);
    assert!(plan.lifetime(h3).is_none());
}

#[test]
fn test_culled_chain_never_executes() {
    let mut graph = RenderGraph::new("culling");
    let out = import_target(&mut graph, 1);
    let t1 = graph.create_resource(color("T1")).unwrap();
    let t2 = graph.create_resource(color("T2")).unwrap();
    add_pass(&mut graph, "Dead A", &[], &[t1]);
    add_pass(&mut graph, "Dead B", &[t1], &[t2]);
    add_pass(&mut graph, "Output", &[], &[out]);

    let plan = graph.compile().unwrap();
    let mut backend = RecordingBackend::new();
    let report = GraphExecutor::new()
        .execute(&mut graph, &plan, &mut backend, &FrameContext::default())
        .unwrap();

    assert_eq!(report.executed, vec!["Output"]);
    assert_eq!(report.materialized, 0);
    assert_eq!(backend.allocation_count(), 0);
}

#[test]
fn test_uncullable_pass_kept() {
    let mut graph = RenderGraph::new("culling");
    let t1 = graph.create_resource(color("Readback")).unwrap();
    {
        let mut builder = graph.add_pass("Capture", "Capture").unwrap();
        builder.read_write(t1).unwrap();
        builder.allow_culling(false);
        builder.set_execute((), |_, _| Ok(()));
    }

    let plan = graph.compile().unwrap();
    assert_eq!(plan_names(&graph, &plan), vec!["Capture"]);
}

#[test]
fn test_transients_materialized_and_released_once() {
    init_logging();
    let mut graph = RenderGraph::new("lifetimes");
    build(Shape::Diamond, &mut graph);
    let plan = graph.compile().unwrap();

    let mut backend = RecordingBackend::new();
    let report = GraphExecutor::new()
        .execute(&mut graph, &plan, &mut backend, &FrameContext::default())
        .unwrap();
    assert_eq!(report.materialized, 3);
    assert_eq!(report.released, 3);

    let events = backend.events();
    for label in ["T1", "T2", "T3"] {
        let handle = graph
            .resources()
            .iter()
            .find(|r| r.name == label)
            .unwrap()
            .handle;
        let life = plan.lifetime(handle).unwrap();
        assert!(life.first_use <= life.last_use);

        let allocations: Vec<(usize, BackendResource)> = events
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e {
                BackendEvent::Allocate {
                    resource,
                    label: Some(l),
                    ..
                } if l == label => Some((i, *resource)),
                _ => None,
            })
            .collect();
        assert_eq!(allocations.len(), 1, "{label} allocated more than once");
        let (allocated_at, backing) = allocations[0];

        let releases: Vec<usize> = events
            .iter()
            .enumerate()
            .skip(allocated_at)
            .filter(|(_, e)| matches!(e, BackendEvent::Release { resource } if *resource == backing))
            .map(|(i, _)| i)
            .take(1)
            .collect();
        assert_eq!(releases.len(), 1, "{label} never released");

        // Allocated before its first user submits, released after its last
        let submits: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, BackendEvent::Submit { .. }))
            .map(|(i, _)| i)
            .collect();
        assert!(allocated_at < submits[life.first_use]);
        assert!(releases[0] > submits[life.last_use]);
    }
    assert_eq!(backend.live_resources(), 0);
}

#[test]
fn test_disjoint_lifetimes_share_backing() {
    let mut graph = RenderGraph::new("aliasing");
    let out = import_target(&mut graph, 1);
    let t1 = graph.create_resource(color("T1")).unwrap();
    let t2 = graph.create_resource(color("T2")).unwrap();
    let t3 = graph.create_resource(color("T3")).unwrap();
    add_pass(&mut graph, "A", &[], &[t1]);
    add_pass(&mut graph, "B", &[t1], &[t2]);
    add_pass(&mut graph, "C", &[t2], &[t3]);
    add_pass(&mut graph, "D", &[t3], &[out]);

    let plan = graph.compile().unwrap();
    assert!(plan.can_alias(t1, t3));
    assert!(!plan.can_alias(t1, t2));

    let mut backend = RecordingBackend::new();
    GraphExecutor::new()
        .execute(&mut graph, &plan, &mut backend, &FrameContext::default())
        .unwrap();

    let backing = |label: &str| {
        backend
            .events()
            .iter()
            .find_map(|e| match e {
                BackendEvent::Allocate {
                    resource,
                    label: Some(l),
                    reused,
                } if l == label => Some((*resource, *reused)),
                _ => None,
            })
            .unwrap()
    };
    let (t1_backing, _) = backing("T1");
    let (t3_backing, reused) = backing("T3");
    assert!(reused);
    assert_eq!(t1_backing, t3_backing);
}

#[test]
fn test_cycle_rejected_before_backend_work() {
    init_logging();
    let mut graph = RenderGraph::new("cycle");
    let out = import_target(&mut graph, 1);
    let x = graph.create_resource(color("X")).unwrap();
    let y = graph.create_resource(color("Y")).unwrap();
    add_pass(&mut graph, "First", &[x], &[y]);
    add_pass(&mut graph, "Second", &[y], &[x, out]);

    let err = graph.compile().unwrap_err();
    match err {
        GraphError::CyclicDependency { passes } => assert_eq!(passes, vec!["First", "Second"]),
        other => panic!("expected a cycle, got {other:?}"),
    }
    // Still recording, nothing to execute
    assert_eq!(graph.state(), GraphState::Recording);
}

#[test]
fn test_cycle_error_names_only_passes_on_the_cycle() {
    init_logging();
    let mut graph = RenderGraph::new("cycle");
    let out = import_target(&mut graph, 1);
    let x = graph.create_resource(color("X")).unwrap();
    let y = graph.create_resource(color("Y")).unwrap();
    add_pass(&mut graph, "First", &[x], &[y]);
    add_pass(&mut graph, "Second", &[y], &[x, out]);
    // Blocked by the cycle but not part of it
    add_pass(&mut graph, "Downstream", &[y], &[out]);

    match graph.compile().unwrap_err() {
        GraphError::CyclicDependency { passes } => assert_eq!(passes, vec!["First", "Second"]),
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[rstest]
#[case::deny(OrphanPolicy::Deny, true)]
#[case::warn(OrphanPolicy::Warn, false)]
fn test_orphaned_write_policy(#[case] policy: OrphanPolicy, #[case] fails: bool) {
    init_logging();
    let mut graph = RenderGraph::with_config("orphans", GraphConfig { orphan_policy: policy });
    let out = import_target(&mut graph, 1);
    let scratch = graph.create_resource(color("Scratch")).unwrap();
    add_pass(&mut graph, "Output", &[], &[out, scratch]);

    let result = graph.compile();
    if fails {
        assert!(matches!(
            result,
            Err(GraphError::OrphanedWrite { ref pass, ref resource }) if pass == "Output" && resource == "Scratch"
        ));
    } else {
        let plan = result.unwrap();
        let life = plan.lifetime(scratch).unwrap();
        assert_eq!((life.first_use, life.last_use), (0, 0));
    }
}

#[test]
fn test_invalid_descriptor_rejected() {
    let mut graph = RenderGraph::new("descriptors");
    let zero = TextureDescriptor::new_2d(0, 256, TextureFormat::Rgba8Unorm, TextureUsage::RENDER_ATTACHMENT)
        .with_label("Empty");
    let err = graph.create_resource(zero).unwrap_err();
    assert!(matches!(err, GraphError::InvalidDescriptor { ref name, .. } if name == "Empty"));

    let empty_buffer = BufferDescriptor::new(0, BufferUsage::STORAGE);
    assert!(graph.create_resource(empty_buffer).is_err());
    assert!(graph.resources().is_empty());
}

#[test]
fn test_foreign_handle_invalidates_pass() {
    let mut other = RenderGraph::new("other");
    let foreign = other.create_resource(color("Foreign")).unwrap();

    let mut graph = RenderGraph::new("graph");
    let out = import_target(&mut graph, 1);
    {
        let mut builder = graph.add_pass("Reader", "Reader").unwrap();
        builder.write(out, 0).unwrap();
        assert!(matches!(
            builder.read(foreign),
            Err(GraphError::UnknownHandle(h)) if h == foreign
        ));
        builder.set_execute((), |_, _| Ok(()));
    }
    add_pass(&mut graph, "Output", &[], &[out]);

    let plan = graph.compile().unwrap();
    assert_eq!(plan_names(&graph, &plan), vec!["Output"]);
}

#[test]
fn test_callback_failure_aborts_and_releases() {
    init_logging();
    let mut graph = RenderGraph::new("failure");
    build(Shape::Diamond, &mut graph);
    let t2 = graph
        .resources()
        .iter()
        .find(|r| r.name == "T2")
        .unwrap()
        .handle;
    {
        // Reaches no output, so it has to opt out of culling
        let mut builder = graph.add_pass("Broken", "Broken").unwrap();
        builder.read(t2).unwrap();
        builder.allow_culling(false);
        builder.set_execute((), |_, _| Err(PassError::failed("shader missing")));
    }

    let plan = graph.compile().unwrap();
    let mut backend = RecordingBackend::new();
    let mut executor = GraphExecutor::new();
    let err = executor
        .execute(&mut graph, &plan, &mut backend, &FrameContext::default())
        .unwrap_err();

    assert!(matches!(err, GraphError::CallbackFailure { ref pass, .. } if pass == "Broken"));
    assert_eq!(executor.live_resources(), 0);
    assert_eq!(backend.live_resources(), 0);
    assert_eq!(backend.allocation_count(), backend.release_count());
    assert!(backend.submissions().iter().all(|s| s.label != "Broken"));
    assert_eq!(graph.state(), GraphState::Retired);
}
