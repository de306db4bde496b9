use kiln_core::error::PurityError;
use kiln_core::op::OpKind;
use kiln_core::schedule::Schedule;

/// Check that no step of the schedule is a load op.
///
/// The input independent part of a schedule runs exactly once and its result
/// is reused. A random draw or an external read in that part would be frozen
/// at compile time, so such schedules are rejected instead of split.
/// Fails on the first offending step.
pub fn validate_purity(schedule: &Schedule) -> Result<(), PurityError> {
    for (position, step) in schedule.iter().enumerate() {
        if let OpKind::Load(op) = step.op {
            return Err(PurityError { position, output: step.output, op });
        }
    }
    Ok(())
}
