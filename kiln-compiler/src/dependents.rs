use kiln_core::schedule::Schedule;
use kiln_core::{BufferId, Set};

/// Buffers whose value depends on at least one of the roots.
///
/// The result always contains all roots. Every step reading a buffer already
/// in the set adds its output.
///
/// Requires `schedule` to be topologically ordered, each step listed after
/// the producers of its inputs. A single forward pass is then enough, since
/// by the time a step is visited all of its inputs are classified.
/// Out of order schedules give an incomplete set.
#[must_use]
pub fn compute_dependents(schedule: &Schedule, roots: &Set<BufferId>) -> Set<BufferId> {
    let mut depends = roots.clone();
    for step in schedule {
        if step.inputs.iter().any(|x| depends.contains(x)) {
            depends.insert(step.output);
        }
    }
    depends
}
