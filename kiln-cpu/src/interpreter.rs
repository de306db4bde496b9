use kiln_core::counters::GlobalCounters;
use kiln_core::engine::ExecutionEngine;
use kiln_core::error::{ErrorStatus, ExecError};
use kiln_core::graph::Graph;
use kiln_core::op::{BOp, LoadOp, OpKind, ROp, UOp};
use kiln_core::schedule::{Schedule, Step};
use kiln_core::BufferId;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Instant;

macro_rules! unary_op {
    ($ctx: expr, $step: expr, $op: expr) => {{
        let x = $ctx.get($step, 0)?;
        unary(&x.data, $op)
    }};
}

fn unary(data: &[f32], op: impl Fn(f32) -> f32 + Sync + Send) -> Vec<f32> {
    #[cfg(not(feature = "rayon"))]
    {
        data.iter().copied().map(op).collect()
    }
    #[cfg(feature = "rayon")]
    {
        data.par_iter().copied().map(op).collect()
    }
}

macro_rules! binary_op {
    ($ctx: expr, $step: expr, $op: expr) => {{
        let x = $ctx.get($step, 0)?;
        let y = $ctx.get($step, 1)?;
        let numel = $step.numel();
        for b in [x, y] {
            if b.data.is_empty() || numel % b.data.len() != 0 {
                return Err(ExecError::at(
                    ErrorStatus::ShapeMismatch,
                    $step.output,
                    format!("can not broadcast {:?} to {:?}", b.shape, $step.shape),
                ));
            }
        }
        binary(numel, &x.data, &y.data, $op)
    }};
}

/// Operands broadcast by repeating the smaller one, which is correct
/// whenever its shape is a suffix of the output shape.
fn binary(numel: usize, xdata: &[f32], ydata: &[f32], op: impl Fn(f32, f32) -> f32 + Sync + Send) -> Vec<f32> {
    let (xn, yn) = (xdata.len(), ydata.len());
    #[cfg(not(feature = "rayon"))]
    {
        (0..numel).map(|i| op(xdata[i % xn], ydata[i % yn])).collect()
    }
    #[cfg(feature = "rayon")]
    {
        (0..numel).into_par_iter().map(|i| op(xdata[i % xn], ydata[i % yn])).collect()
    }
}

/// Reduces along the last axis.
fn reduce(shape: &[usize], data: &[f32], init: f32, op: impl Fn(f32, f32) -> f32) -> Vec<f32> {
    let last = shape.last().copied().unwrap_or(1);
    if last == 0 {
        let numel: usize = shape[..shape.len() - 1].iter().product();
        return vec![init; numel.max(1)];
    }
    data.chunks(last).map(|row| row.iter().copied().fold(init, &op)).collect()
}

/// Row major [m, k] x [k, n]
fn matmul(m: usize, k: usize, n: usize, xdata: &[f32], ydata: &[f32]) -> Vec<f32> {
    let mut res = vec![0f32; m * n];
    if n == 0 {
        return res;
    }
    let row = |i: usize, out: &mut [f32]| {
        for p in 0..k {
            let a = xdata[i * k + p];
            for (j, o) in out.iter_mut().enumerate() {
                *o += a * ydata[p * n + j];
            }
        }
    };
    #[cfg(not(feature = "rayon"))]
    res.chunks_mut(n).enumerate().for_each(|(i, out)| row(i, out));
    #[cfg(feature = "rayon")]
    res.par_chunks_mut(n).enumerate().for_each(|(i, out)| row(i, out));
    res
}

#[derive(Debug, Clone)]
struct Buffer {
    shape: Vec<usize>,
    data: Vec<f32>,
}

/// Reference engine, executes schedules step by step on the cpu.
///
/// Holds one f32 buffer per [BufferId]. Roots and weights must be stored
/// before a schedule reading them runs. Outputs of steps stay stored until
/// removed, so the static phase leaves its results for the dynamic phase.
pub struct Interpreter {
    buffers: BTreeMap<BufferId, Buffer>,
    rng: SmallRng,
}

impl Interpreter {
    /// New interpreter without buffers. Seed is used by random load ops.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { buffers: BTreeMap::new(), rng: SmallRng::seed_from_u64(seed) }
    }

    /// New interpreter holding all weights of graph.
    pub fn with_weights(graph: &Graph, seed: u64) -> Result<Self, ExecError> {
        let mut interpreter = Self::new(seed);
        for (x, data) in graph.initializers() {
            let shape = graph
                .shape(x)
                .map_err(|e| ExecError::at(ErrorStatus::MissingBuffer, x, e.to_string()))?;
            interpreter.store(x, shape.into(), data.into())?;
        }
        Ok(interpreter)
    }

    /// Store buffer, replacing previous value.
    pub fn store(&mut self, x: BufferId, shape: Vec<usize>, data: Vec<f32>) -> Result<(), ExecError> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(ExecError::at(
                ErrorStatus::ShapeMismatch,
                x,
                format!("shape {shape:?} needs {numel} values, got {}", data.len()),
            ));
        }
        self.buffers.insert(x, Buffer { shape, data });
        Ok(())
    }

    /// Copy buffer out of the interpreter.
    pub fn load(&self, x: BufferId) -> Result<Vec<f32>, ExecError> {
        self.buffers
            .get(&x)
            .map(|b| b.data.clone())
            .ok_or_else(|| ExecError::at(ErrorStatus::MissingBuffer, x, format!("{x} is not stored")))
    }

    /// Shape of stored buffer
    #[must_use]
    pub fn shape(&self, x: BufferId) -> Option<&[usize]> {
        self.buffers.get(&x).map(|b| b.shape.as_slice())
    }

    /// Drop buffer, does nothing if it is not stored.
    pub fn remove(&mut self, x: BufferId) {
        self.buffers.remove(&x);
    }

    /// Is buffer stored?
    #[must_use]
    pub fn is_evaluated(&self, x: BufferId) -> bool {
        self.buffers.contains_key(&x)
    }

    fn get(&self, step: &Step, operand: usize) -> Result<&Buffer, ExecError> {
        let Some(x) = step.inputs.get(operand) else {
            return Err(ExecError::at(
                ErrorStatus::ShapeMismatch,
                step.output,
                format!("{} needs {} inputs, got {}", step.op, step.op.num_parameters(), step.inputs.len()),
            ));
        };
        self.buffers.get(x).ok_or_else(|| {
            ExecError::at(ErrorStatus::MissingBuffer, step.output, format!("{} reads {x}, which is not stored", step.output))
        })
    }

    fn evaluate(&mut self, step: &Step) -> Result<Vec<f32>, ExecError> {
        Ok(match step.op {
            OpKind::Load(LoadOp::Empty) => vec![0.0; step.numel()],
            OpKind::Load(LoadOp::Rand) => (0..step.numel()).map(|_| self.rng.gen::<f32>()).collect(),
            OpKind::Load(op @ (LoadOp::From | LoadOp::Custom)) => {
                return Err(ExecError::at(
                    ErrorStatus::Unsupported,
                    step.output,
                    format!("{op:?} needs an external source"),
                ));
            }
            OpKind::Fill { value } => vec![value; step.numel()],
            OpKind::Unary(op) => match op {
                UOp::Neg => unary_op!(self, step, |x| -x),
                UOp::ReLU => unary_op!(self, step, |x| x.max(0.0)),
                UOp::Exp => unary_op!(self, step, f32::exp),
                UOp::Ln => unary_op!(self, step, f32::ln),
                UOp::Inv => unary_op!(self, step, f32::recip),
                UOp::Sqrt => unary_op!(self, step, f32::sqrt),
                UOp::Tanh => unary_op!(self, step, f32::tanh),
                UOp::Sin => unary_op!(self, step, f32::sin),
                UOp::Cos => unary_op!(self, step, f32::cos),
            },
            OpKind::Binary(op) => match op {
                BOp::Add => binary_op!(self, step, |x, y| x + y),
                BOp::Sub => binary_op!(self, step, |x, y| x - y),
                BOp::Mul => binary_op!(self, step, |x, y| x * y),
                BOp::Div => binary_op!(self, step, |x, y| x / y),
                BOp::Pow => binary_op!(self, step, f32::powf),
                BOp::Max => binary_op!(self, step, f32::max),
                BOp::Cmplt => binary_op!(self, step, |x, y| if x < y { 1.0 } else { 0.0 }),
            },
            OpKind::Reduce(op) => {
                let x = self.get(step, 0)?;
                match op {
                    ROp::Sum => reduce(&x.shape, &x.data, 0.0, |a, b| a + b),
                    ROp::Max => reduce(&x.shape, &x.data, f32::NEG_INFINITY, f32::max),
                }
            }
            OpKind::MatMul => {
                let x = self.get(step, 0)?;
                let y = self.get(step, 1)?;
                let (&[m, k], &[k2, n]) = (x.shape.as_slice(), y.shape.as_slice()) else {
                    return Err(ExecError::at(
                        ErrorStatus::ShapeMismatch,
                        step.output,
                        format!("matmul needs two matrices, got {:?} and {:?}", x.shape, y.shape),
                    ));
                };
                if k != k2 {
                    return Err(ExecError::at(
                        ErrorStatus::ShapeMismatch,
                        step.output,
                        format!("can not multiply {:?} by {:?}", x.shape, y.shape),
                    ));
                }
                matmul(m, k, n, &x.data, &y.data)
            }
        })
    }

    /// Arithmetic ops and bytes touched by step, for global counters.
    fn cost(&self, step: &Step) -> (u64, u64) {
        let read: usize = step.inputs.iter().filter_map(|x| self.buffers.get(x)).map(|b| b.data.len()).sum();
        let numel = step.numel();
        let ops = match step.op {
            OpKind::Load(..) | OpKind::Fill { .. } => 0,
            OpKind::Unary(..) | OpKind::Binary(..) => numel,
            OpKind::Reduce(..) => read,
            OpKind::MatMul => {
                let k = step.inputs.first().and_then(|x| self.shape(*x)).and_then(|sh| sh.last().copied()).unwrap_or(0);
                2 * numel * k
            }
        };
        (ops as u64, ((read + numel) * core::mem::size_of::<f32>()) as u64)
    }
}

impl ExecutionEngine for Interpreter {
    fn run(&mut self, schedule: &Schedule) -> Result<(), ExecError> {
        for step in schedule {
            let begin = Instant::now();
            let data = self.evaluate(step)?;
            let elapsed = u64::try_from(begin.elapsed().as_nanos()).unwrap_or(u64::MAX);
            if data.len() != step.numel() {
                return Err(ExecError::at(
                    ErrorStatus::ShapeMismatch,
                    step.output,
                    format!("{} produced {} values, expected shape {:?}", step.op, data.len(), step.shape),
                ));
            }
            let (ops, mem) = self.cost(step);
            GlobalCounters::record(ops, mem, elapsed);
            tracing::trace!("{step}");
            self.buffers.insert(step.output, Buffer { shape: step.shape.clone(), data });
        }
        Ok(())
    }
}
