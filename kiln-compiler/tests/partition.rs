use itertools::Itertools;
use kiln_compiler::{compute_dependents, partition, validate_purity, Compiled};
use kiln_core::buffer::id;
use kiln_core::debug::DebugMask;
use kiln_core::error::PurityError;
use kiln_core::op::{BOp, LoadOp, OpKind, UOp};
use kiln_core::schedule::{Schedule, Step};
use kiln_core::{BufferId, KilnError, Set};
use rand::{Rng, SeedableRng};

const NO_INPUTS: [BufferId; 0] = [];

fn set(ids: &[BufferId]) -> Set<BufferId> {
    ids.iter().copied().collect()
}

// x = b0, w1 = b1, s1: b2 = add(w1), s2: b3 = mul(b2, x), s3: b4 = relu(b3)
fn example() -> (Schedule, Set<BufferId>) {
    let (x, w1, b1, b2, b3) = (id(0), id(1), id(2), id(3), id(4));
    let schedule = Schedule::from(vec![
        Step::new(OpKind::Binary(BOp::Add), b1, [w1, w1], [4]),
        Step::new(OpKind::Binary(BOp::Mul), b2, [b1, x], [4]),
        Step::new(OpKind::Unary(UOp::ReLU), b3, [b2], [4]),
    ]);
    (schedule, set(&[x]))
}

#[test]
fn example_schedule() {
    let (schedule, roots) = example();
    let depends = compute_dependents(&schedule, &roots);
    assert_eq!(depends, set(&[id(0), id(3), id(4)]));
    let split = partition(schedule.clone(), &depends);
    assert_eq!(split.independent.to_vec(), vec![schedule[0].clone()]);
    assert_eq!(split.dynamic.to_vec(), vec![schedule[1].clone(), schedule[2].clone()]);
    assert_eq!(split.to_string(), "2 schedule items depend on the input, 1 don't");
}

#[test]
fn constants_are_static() {
    let x = id(0);
    let schedule = Schedule::from(vec![
        Step::new(OpKind::Fill { value: 1.0 }, id(1), NO_INPUTS, [4]),
        Step::new(OpKind::Binary(BOp::Add), id(2), [id(1), x], [4]),
        Step::new(OpKind::Fill { value: 2.0 }, id(3), NO_INPUTS, [4]),
    ]);
    let depends = compute_dependents(&schedule, &set(&[x]));
    assert_eq!(depends, set(&[x, id(2)]));
    let split = partition(schedule, &depends);
    assert_eq!(split.independent.outputs().collect::<Vec<_>>(), vec![id(1), id(3)]);
    assert_eq!(split.dynamic.outputs().collect::<Vec<_>>(), vec![id(2)]);
}

#[test]
fn roots_produced_by_steps_are_dynamic() {
    // A fill step that is itself declared as root
    let schedule = Schedule::from(vec![Step::new(OpKind::Fill { value: 0.0 }, id(0), NO_INPUTS, [1])]);
    let depends = compute_dependents(&schedule, &set(&[id(0)]));
    let split = partition(schedule, &depends);
    assert_eq!(split.dynamic.len(), 1);
    assert!(split.independent.is_empty());
}

#[test]
fn no_roots_everything_static() {
    let (schedule, _) = example();
    let depends = compute_dependents(&schedule, &Set::default());
    assert!(depends.is_empty());
    let split = partition(schedule, &depends);
    assert_eq!(split.to_string(), "0 schedule items depend on the input, 3 don't");
}

#[test]
fn empty_schedule() {
    let roots = set(&[id(0)]);
    let depends = compute_dependents(&Schedule::new(), &roots);
    assert_eq!(depends, roots);
    let split = partition(Schedule::new(), &depends);
    assert!(split.is_empty());
}

#[test]
fn load_ops_are_rejected() {
    let (schedule, roots) = example();
    let mut steps = schedule.to_vec();
    steps.insert(1, Step::new(OpKind::Load(LoadOp::Rand), id(9), NO_INPUTS, [4]));
    let schedule = Schedule::from(steps);
    assert_eq!(
        validate_purity(&schedule),
        Err(PurityError { position: 1, output: id(9), op: LoadOp::Rand })
    );
    let err = Compiled::new(schedule, &roots, DebugMask::default()).unwrap_err();
    assert!(matches!(err, KilnError::Purity(PurityError { position: 1, .. })));
    assert!(err.to_string().starts_with("has load ops, can't compile ahead of time"));
}

#[test]
fn pure_schedule_passes() {
    let (schedule, _) = example();
    assert_eq!(validate_purity(&schedule), Ok(()));
}

#[test]
fn plot_marks_groups() -> Result<(), KilnError> {
    let (schedule, roots) = example();
    let compiled = Compiled::new(schedule, &roots, DebugMask::default())?;
    let dot = compiled.partition.plot_dot(|x| format!("t{}", x.i()));
    assert!(dot.starts_with("strict digraph {"));
    assert!(dot.contains("2[label=\"t2"));
    assert!(dot.contains("fillcolor=\"lightblue\""));
    assert!(dot.contains("fillcolor=\"lightcoral\""));
    assert!(dot.contains("0[label=\"t0\", shape=box"));
    assert!(dot.contains("  2 -> 3"));
    assert!(dot.ends_with('}'));
    Ok(())
}

/// Random topologically ordered schedule reading from `leaves` leaf buffers.
fn random_schedule(rng: &mut rand::rngs::SmallRng, leaves: usize, steps: usize) -> Schedule {
    let mut schedule = Schedule::new();
    for i in leaves..leaves + steps {
        let op = match rng.gen_range(0..3) {
            0 => OpKind::Fill { value: 1.0 },
            1 => OpKind::Unary(UOp::Exp),
            _ => OpKind::Binary(BOp::Add),
        };
        let inputs: Vec<BufferId> = (0..op.num_parameters()).map(|_| id(rng.gen_range(0..i))).collect();
        schedule.push(Step::new(op, id(i), inputs, [1]));
    }
    schedule
}

/// Transitive closure by iterating until nothing changes, independent of order.
fn closure(schedule: &Schedule, roots: &Set<BufferId>) -> Set<BufferId> {
    let mut depends = roots.clone();
    loop {
        let n = depends.len();
        for step in schedule.iter() {
            if step.inputs.iter().any(|x| depends.contains(x)) {
                depends.insert(step.output);
            }
        }
        if depends.len() == n {
            return depends;
        }
    }
}

#[test]
fn fuzzy_partition_properties() {
    let mut rng = rand::rngs::SmallRng::seed_from_u64(21_847_091_824);
    for _ in 0..200 {
        let leaves = rng.gen_range(1..6);
        let steps = rng.gen_range(0..40);
        let schedule = random_schedule(&mut rng, leaves, steps);
        let roots: Set<BufferId> = (0..leaves).filter(|_| rng.gen_bool(0.5)).map(id).collect();

        let depends = compute_dependents(&schedule, &roots);
        // Root inclusion and closure correctness
        assert!(roots.is_subset(&depends));
        assert_eq!(depends, closure(&schedule, &roots));

        let split = partition(schedule.clone(), &depends);
        // Completeness
        assert_eq!(split.dynamic.len() + split.independent.len(), schedule.len());
        let mut outputs: Vec<BufferId> = split.dynamic.outputs().chain(split.independent.outputs()).collect();
        outputs.sort_unstable();
        assert_eq!(outputs, schedule.outputs().sorted().collect::<Vec<_>>());
        // Classification
        assert!(split.dynamic.iter().all(|step| depends.contains(&step.output)));
        assert!(split.independent.iter().all(|step| !depends.contains(&step.output)));
        // Order preservation
        for half in [&split.dynamic, &split.independent] {
            let positions: Vec<usize> =
                half.iter().map(|step| schedule.iter().position(|s| s == step).unwrap()).collect();
            assert!(positions.iter().tuple_windows().all(|(a, b)| a < b));
        }
    }
}
