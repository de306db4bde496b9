use kiln_compiler::{compile, Compiled};
use kiln_core::buffer::id;
use kiln_core::counters::GlobalCounters;
use kiln_core::debug::DebugMask;
use kiln_core::engine::ExecutionEngine;
use kiln_core::error::{ErrorStatus, ExecError, Phase};
use kiln_core::graph::Graph;
use kiln_core::op::{BOp, LoadOp, OpKind, UOp};
use kiln_core::schedule::{Schedule, Step};
use kiln_core::{BufferId, KilnError, Set};
use std::sync::Mutex;

// execute resets global counters, tests calling it must not overlap
static EXECUTE: Mutex<()> = Mutex::new(());

/// Engine that only remembers what it was asked to run.
#[derive(Default)]
struct Recorder {
    runs: Vec<Vec<BufferId>>,
    fail_on: Option<BufferId>,
    count: bool,
}

impl ExecutionEngine for Recorder {
    fn run(&mut self, schedule: &Schedule) -> Result<(), ExecError> {
        let mut run = Vec::new();
        for step in schedule.iter() {
            if Some(step.output) == self.fail_on {
                self.runs.push(run);
                return Err(ExecError::at(ErrorStatus::KernelLaunch, step.output, "injected"));
            }
            if self.count {
                GlobalCounters::record(step.numel() as u64, 0, 1);
            }
            run.push(step.output);
        }
        self.runs.push(run);
        Ok(())
    }
}

fn example() -> Compiled {
    let (x, w1) = (id(0), id(1));
    let schedule = Schedule::from(vec![
        Step::new(OpKind::Binary(BOp::Add), id(2), [w1, w1], [4]),
        Step::new(OpKind::Binary(BOp::Mul), id(3), [id(2), x], [4]),
        Step::new(OpKind::Unary(UOp::ReLU), id(4), [id(3)], [4]),
    ]);
    let roots: Set<BufferId> = [x].into_iter().collect();
    Compiled::new(schedule, &roots, DebugMask::default()).unwrap()
}

#[test]
fn static_runs_before_dynamic() -> Result<(), KilnError> {
    let _guard = EXECUTE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let compiled = example();
    let mut engine = Recorder::default();
    compiled.execute(&mut engine)?;
    assert_eq!(engine.runs, vec![vec![id(2)], vec![id(3), id(4)]]);
    Ok(())
}

#[test]
fn phases_can_run_separately() -> Result<(), KilnError> {
    let compiled = example();
    let mut engine = Recorder::default();
    compiled.run_static(&mut engine)?;
    compiled.run_dynamic(&mut engine)?;
    compiled.run_dynamic(&mut engine)?;
    assert_eq!(engine.runs, vec![vec![id(2)], vec![id(3), id(4)], vec![id(3), id(4)]]);
    Ok(())
}

#[test]
fn counters_cover_only_dynamic_phase() -> Result<(), KilnError> {
    let _guard = EXECUTE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let compiled = example();
    let mut engine = Recorder { count: true, ..Recorder::default() };
    let stats = compiled.execute(&mut engine)?;
    assert_eq!(stats.counters.kernel_count, 2);
    assert_eq!(stats.counters.global_ops, 8);
    Ok(())
}

#[test]
fn static_failure_stops_execution() {
    let _guard = EXECUTE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let compiled = example();
    let mut engine = Recorder { fail_on: Some(id(2)), ..Recorder::default() };
    let err = compiled.execute(&mut engine).unwrap_err();
    match err {
        KilnError::Exec { phase, source } => {
            assert_eq!(phase, Phase::Static);
            assert_eq!(source.status, ErrorStatus::KernelLaunch);
            assert_eq!(source.step, Some(id(2)));
        }
        err => panic!("unexpected error {err}"),
    }
    // Dynamic phase never started
    assert_eq!(engine.runs.len(), 1);
}

#[test]
fn dynamic_failure_names_phase() {
    let _guard = EXECUTE.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let compiled = example();
    let mut engine = Recorder { fail_on: Some(id(4)), ..Recorder::default() };
    let err = compiled.execute(&mut engine).unwrap_err();
    assert!(matches!(err, KilnError::Exec { phase: Phase::Dynamic, .. }));
    assert!(err.to_string().starts_with("dynamic execution failed, KernelLaunch: injected"));
    assert_eq!(engine.runs, vec![vec![id(2)], vec![id(3)]]);
}

#[test]
fn impure_schedule_executes_nothing() {
    let schedule = Schedule::from(vec![
        Step::new(OpKind::Load(LoadOp::Empty), id(1), Vec::<BufferId>::new(), [4]),
        Step::new(OpKind::Unary(UOp::Exp), id(2), [id(1)], [4]),
    ]);
    let result = Compiled::new(schedule, &Set::default(), DebugMask::default());
    assert!(matches!(result, Err(KilnError::Purity(_))));
}

#[test]
fn compile_graph() -> Result<(), KilnError> {
    let mut graph = Graph::new();
    let x = graph.input("x", [2, 3])?;
    let w = graph.weight("w", [3, 4], vec![0.5; 12])?;
    let b = graph.weight("b", [4], vec![1.0; 4])?;
    let wt = graph.push("w2", OpKind::Binary(BOp::Mul), &[w, w])?;
    let h = graph.push("h", OpKind::MatMul, &[x, wt])?;
    let y = graph.push("y", OpKind::Binary(BOp::Add), &[h, b])?;
    let z = graph.push("z", OpKind::Unary(UOp::ReLU), &[y])?;
    graph.mark_output(z)?;

    let compiled = compile(&graph, graph.outputs(), DebugMask::default())?;
    assert_eq!(compiled.partition.independent.outputs().collect::<Vec<_>>(), vec![wt]);
    assert_eq!(compiled.partition.dynamic.outputs().collect::<Vec<_>>(), vec![h, y, z]);
    assert!(compiled.depends.contains(&x));
    assert!(!compiled.depends.contains(&w));
    assert_eq!(compiled.partition.to_string(), "3 schedule items depend on the input, 1 don't");
    Ok(())
}
