use crate::{compute_dependents, partition, validate_purity, Partition};
use kiln_core::counters::{CounterSnapshot, GlobalCounters};
use kiln_core::debug::DebugMask;
use kiln_core::engine::ExecutionEngine;
use kiln_core::error::Phase;
use kiln_core::graph::ScheduleSource;
use kiln_core::schedule::Schedule;
use kiln_core::buffer::display_set;
use kiln_core::{BufferId, KilnError, Set};
use std::time::{Duration, Instant};

/// Schedule split ahead of time, ready to be executed.
#[derive(Debug, Clone)]
pub struct Compiled {
    /// The two halves of the schedule
    pub partition: Partition,
    /// Buffers depending on the roots, including the roots
    pub depends: Set<BufferId>,
    debug: DebugMask,
}

/// Build schedule for `outputs` from source and split it.
pub fn compile<S: ScheduleSource + ?Sized>(
    source: &S,
    outputs: &[BufferId],
    debug: DebugMask,
) -> Result<Compiled, KilnError> {
    let schedule = source.build_schedule(outputs)?;
    Compiled::new(schedule, &source.roots(), debug)
}

impl Compiled {
    /// Validate, analyze and split schedule.
    /// Fails without splitting if the schedule contains load ops.
    pub fn new(schedule: Schedule, roots: &Set<BufferId>, debug: DebugMask) -> Result<Compiled, KilnError> {
        let _span = tracing::info_span!("compile", steps = schedule.len()).entered();
        validate_purity(&schedule)?;
        let depends = compute_dependents(&schedule, roots);
        if debug.sched() {
            tracing::info!("roots: {}", display_set(roots));
            for (i, step) in schedule.iter().enumerate() {
                let group = if depends.contains(&step.output) { "dynamic" } else { "static" };
                tracing::info!("{i:>4} {group:<7} {step}");
            }
        }
        let partition = partition(schedule, &depends);
        tracing::info!("{partition}");
        Ok(Compiled { partition, depends, debug })
    }

    /// Run the input independent half once.
    pub fn run_static<E: ExecutionEngine + ?Sized>(&self, engine: &mut E) -> Result<Duration, KilnError> {
        run_phase(Phase::Static, &self.partition.independent, engine, self.debug)
    }

    /// Run the input dependent half.
    pub fn run_dynamic<E: ExecutionEngine + ?Sized>(&self, engine: &mut E) -> Result<Duration, KilnError> {
        run_phase(Phase::Dynamic, &self.partition.dynamic, engine, self.debug)
    }

    /// Run static half, reset global counters, run dynamic half.
    /// Returned counters describe only the dynamic half.
    pub fn execute<E: ExecutionEngine + ?Sized>(&self, engine: &mut E) -> Result<RunStats, KilnError> {
        let static_time = self.run_static(engine)?;
        tracing::info!("**** running real kernels ****");
        GlobalCounters::reset();
        let dynamic_time = self.run_dynamic(engine)?;
        let counters = GlobalCounters::snapshot();
        if self.debug.perf() {
            tracing::info!("dynamic phase: {counters}");
        }
        Ok(RunStats { static_time, dynamic_time, counters })
    }
}

fn run_phase<E: ExecutionEngine + ?Sized>(
    phase: Phase,
    schedule: &Schedule,
    engine: &mut E,
    debug: DebugMask,
) -> Result<Duration, KilnError> {
    let _span = tracing::info_span!("run", %phase, steps = schedule.len()).entered();
    let begin = Instant::now();
    engine.run(schedule).map_err(|e| KilnError::exec(phase, e))?;
    let elapsed = begin.elapsed();
    if debug.perf() {
        tracing::info!("{phase} phase took {:.3} ms", elapsed.as_secs_f64() * 1e3);
    }
    Ok(elapsed)
}

/// Timings of one [Compiled::execute] call
#[derive(Debug, Clone, Copy)]
pub struct RunStats {
    /// Wall time of the static half
    pub static_time: Duration,
    /// Wall time of the dynamic half
    pub dynamic_time: Duration,
    /// Global counters right after the dynamic half
    pub counters: CounterSnapshot,
}
