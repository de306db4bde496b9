use kiln_compiler::compile;
use kiln_core::counters::GlobalCounters;
use kiln_core::debug::DebugMask;
use kiln_core::graph::Graph;
use kiln_core::op::{BOp, OpKind, UOp};
use kiln_cpu::Interpreter;

// Global counters are process wide, so this is the only test in its binary.
#[test]
fn counters_after_execute_describe_dynamic_phase() -> Result<(), Box<dyn std::error::Error>> {
    let mut graph = Graph::new();
    let x = graph.input("x", [2, 3])?;
    let w = graph.weight("w", [3], vec![1.0, 2.0, 3.0])?;
    let w2 = graph.push("w2", OpKind::Binary(BOp::Mul), &[w, w])?;
    let w3 = graph.push("w3", OpKind::Unary(UOp::Sqrt), &[w2])?;
    let y = graph.push("y", OpKind::Binary(BOp::Add), &[x, w3])?;
    graph.mark_output(y)?;

    let compiled = compile(&graph, graph.outputs(), DebugMask::default())?;
    let mut engine = Interpreter::with_weights(&graph, 0)?;
    engine.store(x, vec![2, 3], vec![0.0; 6])?;
    GlobalCounters::reset();
    let stats = compiled.execute(&mut engine)?;

    assert_eq!(stats.counters.kernel_count, 1);
    assert_eq!(stats.counters.global_ops, 6);
    // reads 6 + 3 values, writes 6
    assert_eq!(stats.counters.global_mem, 15 * 4);
    assert_eq!(GlobalCounters::snapshot().kernel_count, 1);
    assert_eq!(engine.load(y)?, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
    Ok(())
}
