use crate::error::ExecError;
use crate::schedule::Schedule;

/// ExecutionEngine is the plug in point for backend developers.
///
/// Kiln never executes steps by itself, it hands whole schedules to an engine.
/// `run` must execute all steps in schedule order and return only after the
/// last one finished, so that phases never interleave. Engines should record
/// every executed step in [GlobalCounters](crate::counters::GlobalCounters).
pub trait ExecutionEngine {
    /// Execute schedule to completion.
    fn run(&mut self, schedule: &Schedule) -> Result<(), ExecError>;
}

impl<E: ExecutionEngine + ?Sized> ExecutionEngine for &mut E {
    fn run(&mut self, schedule: &Schedule) -> Result<(), ExecError> {
        (**self).run(schedule)
    }
}
