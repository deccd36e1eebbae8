use std::collections::HashMap;

use proptest::prelude::*;

use builddag::dag::TaskGraph;
use builddag::errors::BuilddagError;
use builddag::task::{Task, TaskAction};

/// Random DAG: task `i` may only depend on tasks declared before it.
fn arb_dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::collection::vec(0..i.max(1), 0..=i.min(3)))
            .collect::<Vec<_>>()
            .prop_map(|deps| {
                deps.into_iter()
                    .enumerate()
                    .map(|(i, ds)| ds.into_iter().filter(|&d| d < i).collect())
                    .collect()
            })
    })
}

fn tasks_from(deps: &[Vec<usize>]) -> Vec<Task> {
    deps.iter()
        .enumerate()
        .map(|(i, ds)| {
            ds.iter().fold(Task::new(format!("t{i}"), TaskAction::Noop), |t, d| {
                t.after(format!("t{d}"))
            })
        })
        .collect()
}

fn positions(order: &[&Task]) -> HashMap<String, usize> {
    order
        .iter()
        .enumerate()
        .map(|(pos, t)| (t.name().to_string(), pos))
        .collect()
}

proptest! {
    #[test]
    fn order_puts_dependencies_first(deps in arb_dag()) {
        let graph = TaskGraph::new(tasks_from(&deps)).unwrap();
        let order = graph.topological_order();
        prop_assert_eq!(order.len(), deps.len());

        let pos = positions(&order);
        for (i, ds) in deps.iter().enumerate() {
            for d in ds {
                let dep_key = format!("t{d}");
                let task_key = format!("t{i}");
                prop_assert!(pos[&dep_key] < pos[&task_key]);
            }
        }
    }

    #[test]
    fn order_is_deterministic(deps in arb_dag()) {
        let a = TaskGraph::new(tasks_from(&deps)).unwrap();
        let b = TaskGraph::new(tasks_from(&deps)).unwrap();
        let names = |g: &TaskGraph| -> Vec<String> {
            g.topological_order().iter().map(|t| t.name().to_string()).collect()
        };
        prop_assert_eq!(names(&a), names(&b));
    }

    #[test]
    fn execution_order_is_the_target_closure(deps in arb_dag(), pick in any::<prop::sample::Index>()) {
        let graph = TaskGraph::new(tasks_from(&deps)).unwrap();
        let target = format!("t{}", pick.index(deps.len()));
        let order = graph.execution_order(&target).unwrap();

        prop_assert_eq!(order.last().map(|t| t.name()), Some(target.as_str()));

        // Every listed task's dependencies are listed too, and earlier.
        let pos = positions(&order);
        for task in &order {
            for dep in task.deps() {
                prop_assert!(pos.contains_key(dep));
                prop_assert!(pos[dep] < pos[task.name()]);
            }
        }

        // Same relative order as the full topological order.
        let full = positions(&graph.topological_order());
        for pair in order.windows(2) {
            prop_assert!(full[pair[0].name()] < full[pair[1].name()]);
        }
    }
}

#[test]
fn independent_tasks_keep_declaration_order() {
    let tasks = vec![
        Task::new("docs", TaskAction::Noop),
        Task::new("generate", TaskAction::Noop),
        Task::new("compile", TaskAction::Noop).after("generate"),
        Task::new("assemble", TaskAction::Noop)
            .after("compile")
            .after("docs"),
    ];
    let graph = TaskGraph::new(tasks).unwrap();

    let names: Vec<&str> = graph.topological_order().iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["docs", "generate", "compile", "assemble"]);

    let names: Vec<&str> = graph
        .execution_order("compile")
        .unwrap()
        .iter()
        .map(|t| t.name())
        .collect();
    assert_eq!(names, vec!["generate", "compile"]);
    assert_eq!(graph.dependents_of("generate"), vec!["compile"]);
    assert_eq!(graph.dependencies_of("assemble"), vec!["docs", "compile"]);
}

#[test]
fn three_task_cycle_lists_every_member() {
    let tasks = vec![
        Task::new("a", TaskAction::Noop).after("c"),
        Task::new("b", TaskAction::Noop).after("a"),
        Task::new("c", TaskAction::Noop).after("b"),
        Task::new("d", TaskAction::Noop).after("a"),
    ];
    match TaskGraph::new(tasks) {
        Err(BuilddagError::Cycle(cycle)) => assert_eq!(cycle.tasks, vec!["a", "b", "c"]),
        other => panic!("expected cycle error, got {other:?}"),
    }
}
