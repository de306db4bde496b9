use crate::error::KilnError;
use core::fmt::{Display, Formatter};
use core::str::FromStr;

/// Operations whose result is not a pure function of their inputs.
/// Steps with these ops can never be computed ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadOp {
    /// Uninitialized allocation
    Empty,
    /// Random number generation
    Rand,
    /// Copy from host or another device
    From,
    /// Custom op provided by the user
    Custom,
}

/// Unary elementwise op
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UOp {
    /// Negation
    Neg,
    /// Rectified linear unit
    ReLU,
    /// Natural exponent
    Exp,
    /// Natural logarithm
    Ln,
    /// Reciprocal
    Inv,
    /// Square root
    Sqrt,
    /// Hyperbolic tangent
    Tanh,
    /// Sine
    Sin,
    /// Cosine
    Cos,
}

/// Binary elementwise op
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
    /// Division
    Div,
    /// Exponentiation
    Pow,
    /// Elementwise maximum
    Max,
    /// Compare less than, returns 1 or 0
    Cmplt,
}

/// Reduce op along the last axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ROp {
    /// Sum
    Sum,
    /// Maximum
    Max,
}

/// Operation performed by one schedule step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpKind {
    /// Stateful op, see [LoadOp]
    Load(LoadOp),
    /// Buffer filled with a constant, has no inputs
    Fill {
        /// Value of every element
        value: f32,
    },
    /// Unary op
    Unary(UOp),
    /// Binary op
    Binary(BOp),
    /// Reduce op
    Reduce(ROp),
    /// Matrix multiplication of two 2d buffers
    MatMul,
}

impl OpKind {
    /// Number of inputs this op reads.
    #[must_use]
    pub const fn num_parameters(&self) -> usize {
        match self {
            OpKind::Load(..) | OpKind::Fill { .. } => 0,
            OpKind::Unary(..) | OpKind::Reduce(..) => 1,
            OpKind::Binary(..) | OpKind::MatMul => 2,
        }
    }
}

impl Display for OpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            OpKind::Load(lop) => f.write_fmt(format_args!("Load({lop:?})")),
            OpKind::Fill { value } => f.write_fmt(format_args!("Fill({value})")),
            OpKind::Unary(uop) => f.write_fmt(format_args!("{uop:?}")),
            OpKind::Binary(bop) => f.write_fmt(format_args!("{bop:?}")),
            OpKind::Reduce(rop) => f.write_fmt(format_args!("Reduce({rop:?})")),
            OpKind::MatMul => f.write_str("MatMul"),
        }
    }
}

/// Parses op names used in model files. `fill` parses with value zero,
/// the graph loader sets the actual value.
impl FromStr for OpKind {
    type Err = KilnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "empty" => OpKind::Load(LoadOp::Empty),
            "rand" => OpKind::Load(LoadOp::Rand),
            "from" => OpKind::Load(LoadOp::From),
            "custom" => OpKind::Load(LoadOp::Custom),
            "fill" => OpKind::Fill { value: 0.0 },
            "neg" => OpKind::Unary(UOp::Neg),
            "relu" => OpKind::Unary(UOp::ReLU),
            "exp" => OpKind::Unary(UOp::Exp),
            "ln" | "log" => OpKind::Unary(UOp::Ln),
            "inv" | "reciprocal" => OpKind::Unary(UOp::Inv),
            "sqrt" => OpKind::Unary(UOp::Sqrt),
            "tanh" => OpKind::Unary(UOp::Tanh),
            "sin" => OpKind::Unary(UOp::Sin),
            "cos" => OpKind::Unary(UOp::Cos),
            "add" => OpKind::Binary(BOp::Add),
            "sub" => OpKind::Binary(BOp::Sub),
            "mul" => OpKind::Binary(BOp::Mul),
            "div" => OpKind::Binary(BOp::Div),
            "pow" => OpKind::Binary(BOp::Pow),
            "max" | "maximum" => OpKind::Binary(BOp::Max),
            "cmplt" | "less" => OpKind::Binary(BOp::Cmplt),
            "sum" | "reduce_sum" => OpKind::Reduce(ROp::Sum),
            "reduce_max" => OpKind::Reduce(ROp::Max),
            "matmul" | "dot" => OpKind::MatMul,
            _ => return Err(KilnError::parse_error(format!("unknown op {s:?}").into())),
        })
    }
}
