use core::fmt::{Display, Formatter};
use kiln_core::schedule::{Schedule, Step};
use kiln_core::{BufferId, Set};
use std::collections::BTreeSet;

/// Schedule split into input dependent and input independent steps.
///
/// Both halves keep the relative order of the input schedule, later
/// stages rely on execution order for buffer reuse.
///
/// Steps are classified only by whether their output is in the dependency
/// set. Steps that exist because of how the graph was lowered (for example
/// kernels fusing weights with input dependent values) stay in the dynamic
/// half, no attempt is made to hoist parts of them out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// Steps that must run for every new input
    pub dynamic: Schedule,
    /// Static steps, run once ahead of time
    pub independent: Schedule,
}

/// Route each step to the dynamic half if its output is in `depends`,
/// otherwise to the independent half. Single stable pass, can not fail.
#[must_use]
pub fn partition(schedule: Schedule, depends: &Set<BufferId>) -> Partition {
    let mut partition = Partition::default();
    for step in schedule {
        if depends.contains(&step.output) {
            partition.dynamic.push(step);
        } else {
            partition.independent.push(step);
        }
    }
    partition
}

impl Partition {
    /// Total number of steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.dynamic.len() + self.independent.len()
    }

    /// Are both halves empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Puts both halves into dot language for visualization.
    /// Dynamic steps are red, static steps blue, leaves grey boxes.
    #[must_use]
    pub fn plot_dot(&self, label: impl Fn(BufferId) -> String) -> String {
        use core::fmt::Write;
        let mut res = String::from("strict digraph {\n  ordering=in\n  rank=source\n");
        let mut edges = String::new();
        let produced: BTreeSet<BufferId> = self.dynamic.outputs().chain(self.independent.outputs()).collect();
        let mut leaves = BTreeSet::new();
        let mut add_step = |res: &mut String, step: &Step, fillcolor: &str| {
            let _ = writeln!(
                res,
                "  {}[label=\"{}\\n{}\\n{:?}\", shape=oval, fillcolor=\"{fillcolor}\", style=filled]",
                step.output.i(),
                label(step.output),
                step.op,
                step.shape,
            );
            for x in &step.inputs {
                if !produced.contains(x) {
                    leaves.insert(*x);
                }
                let _ = writeln!(edges, "  {} -> {}", x.i(), step.output.i());
            }
        };
        for step in &self.independent {
            add_step(&mut res, step, "lightblue");
        }
        for step in &self.dynamic {
            add_step(&mut res, step, "lightcoral");
        }
        for x in leaves {
            let _ = writeln!(res, "  {}[label=\"{}\", shape=box, fillcolor=\"grey\", style=filled]", x.i(), label(x));
        }
        let _ = write!(res, "{edges}}}");
        res
    }
}

/// Prints the one line summary of the split.
impl Display for Partition {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!(
            "{} schedule items depend on the input, {} don't",
            self.dynamic.len(),
            self.independent.len()
        ))
    }
}
