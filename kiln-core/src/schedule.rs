use crate::buffer::BufferId;
use crate::op::OpKind;
use core::fmt::{Display, Formatter};
use core::ops::Deref;

/// One schedule entry, a single kernel.
///
/// A step writes exactly one output buffer and reads its inputs. Inputs keep
/// operand order, since engines need it for non commutative ops.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Operation
    pub op: OpKind,
    /// Buffer written by this step
    pub output: BufferId,
    /// Buffers read by this step, in operand order
    pub inputs: Vec<BufferId>,
    /// Shape of the output buffer
    pub shape: Vec<usize>,
}

impl Step {
    /// Create new step
    #[must_use]
    pub fn new(op: OpKind, output: BufferId, inputs: impl Into<Vec<BufferId>>, shape: impl Into<Vec<usize>>) -> Self {
        Self { op, output, inputs: inputs.into(), shape: shape.into() }
    }

    /// Number of elements in the output
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("{} = {}(", self.output, self.op))?;
        for (i, x) in self.inputs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_fmt(format_args!("{x}"))?;
        }
        f.write_fmt(format_args!(") {:?}", self.shape))
    }
}

/// Ordered sequence of steps.
///
/// Schedules are topologically ordered: every input of a step is a root,
/// a realized leaf (weight) or the output of an earlier step.
/// Nothing in kiln re-verifies this, producers of schedules must uphold it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schedule(Vec<Step>);

impl Schedule {
    /// Empty schedule
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append step at the end of schedule
    pub fn push(&mut self, step: Step) {
        self.0.push(step);
    }

    /// Outputs of all steps, in schedule order
    pub fn outputs(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.0.iter().map(|step| step.output)
    }

    /// Find the step writing buffer x
    #[must_use]
    pub fn producer(&self, x: BufferId) -> Option<&Step> {
        self.0.iter().find(|step| step.output == x)
    }
}

impl Deref for Schedule {
    type Target = [Step];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Step>> for Schedule {
    fn from(steps: Vec<Step>) -> Self {
        Self(steps)
    }
}

impl FromIterator<Step> for Schedule {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Schedule {
    type Item = Step;
    type IntoIter = std::vec::IntoIter<Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a Step;
    type IntoIter = core::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
