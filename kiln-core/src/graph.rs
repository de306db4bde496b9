//! Graph of tensor operations and the schedule source built on it.

use crate::buffer::{id, BufferId, Set};
use crate::error::KilnError;
use crate::op::{OpKind, ROp};
use crate::schedule::{Schedule, Step};
use std::collections::BTreeMap;
use std::path::Path;

/// Producer of schedules.
///
/// Kiln asks the source for a schedule computing the desired outputs and for
/// the set of root buffers, the values injected at inference time.
pub trait ScheduleSource {
    /// Topologically ordered schedule computing `outputs`.
    fn build_schedule(&self, outputs: &[BufferId]) -> Result<Schedule, KilnError>;
    /// Buffers that are provided at inference time.
    fn roots(&self) -> Set<BufferId>;
}

/// Node of the graph
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Model input, unknown at compile time
    Input {
        /// Shape of the input
        shape: Vec<usize>,
    },
    /// Realized buffer with known data, for example model weights
    Weight {
        /// Shape of the weight
        shape: Vec<usize>,
    },
    /// Computed buffer
    Op {
        /// Operation
        op: OpKind,
        /// Operands
        inputs: Vec<BufferId>,
        /// Inferred output shape
        shape: Vec<usize>,
    },
}

impl Node {
    /// Get all parameters of self.
    #[must_use]
    pub fn parameters(&self) -> &[BufferId] {
        match self {
            Node::Input { .. } | Node::Weight { .. } => &[],
            Node::Op { inputs, .. } => inputs,
        }
    }

    /// Shape of the buffer this node produces
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Node::Input { shape } | Node::Weight { shape } | Node::Op { shape, .. } => shape,
        }
    }
}

/// Arena of nodes. Buffer ids are indices into this arena.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    labels: Vec<String>,
    names: BTreeMap<String, BufferId>,
    initializers: BTreeMap<BufferId, Vec<f32>>,
    outputs: Vec<BufferId>,
}

impl Graph {
    /// Empty graph
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            labels: Vec::new(),
            names: BTreeMap::new(),
            initializers: BTreeMap::new(),
            outputs: Vec::new(),
        }
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Is the graph empty?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn insert(&mut self, name: String, node: Node) -> Result<BufferId, KilnError> {
        if self.names.contains_key(&name) {
            return Err(KilnError::parse_error(format!("duplicate name {name:?}").into()));
        }
        let nid = id(self.nodes.len());
        self.nodes.push(node);
        self.names.insert(name.clone(), nid);
        self.labels.push(name);
        Ok(nid)
    }

    /// Add model input
    pub fn input(&mut self, name: impl Into<String>, shape: impl Into<Vec<usize>>) -> Result<BufferId, KilnError> {
        self.insert(name.into(), Node::Input { shape: shape.into() })
    }

    /// Add weight with known data
    pub fn weight(
        &mut self,
        name: impl Into<String>,
        shape: impl Into<Vec<usize>>,
        data: Vec<f32>,
    ) -> Result<BufferId, KilnError> {
        let name = name.into();
        let shape = shape.into();
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(KilnError::shape_error(
                format!("weight {name:?} has shape {shape:?}, but {} values", data.len()).into(),
            ));
        }
        let nid = self.insert(name, Node::Weight { shape })?;
        self.initializers.insert(nid, data);
        Ok(nid)
    }

    /// Push new op node, output shape is inferred from inputs.
    pub fn push(&mut self, name: impl Into<String>, op: OpKind, inputs: &[BufferId]) -> Result<BufferId, KilnError> {
        let shape = self.infer_shape(op, inputs)?;
        self.insert(name.into(), Node::Op { op, inputs: inputs.into(), shape })
    }

    /// Push new op node with explicit shape. Needed for ops without inputs.
    pub fn push_wshape(
        &mut self,
        name: impl Into<String>,
        op: OpKind,
        inputs: &[BufferId],
        shape: impl Into<Vec<usize>>,
    ) -> Result<BufferId, KilnError> {
        let shape = shape.into();
        if op.num_parameters() == 0 && !inputs.is_empty() {
            return Err(KilnError::shape_error(format!("{op} takes no inputs, got {}", inputs.len()).into()));
        } else if op.num_parameters() > 0 {
            let inferred = self.infer_shape(op, inputs)?;
            if inferred != shape {
                return Err(KilnError::shape_error(
                    format!("{op} produces shape {inferred:?}, but {shape:?} was requested").into(),
                ));
            }
        }
        self.insert(name.into(), Node::Op { op, inputs: inputs.into(), shape })
    }

    /// Declare buffer as graph output
    pub fn mark_output(&mut self, x: BufferId) -> Result<(), KilnError> {
        self.node(x)?;
        self.outputs.push(x);
        Ok(())
    }

    /// Declared outputs
    #[must_use]
    pub fn outputs(&self) -> &[BufferId] {
        &self.outputs
    }

    /// Get node x
    pub fn node(&self, x: BufferId) -> Result<&Node, KilnError> {
        self.nodes.get(x.i()).ok_or_else(|| KilnError::UnknownBuffer(x.to_string().into()))
    }

    /// Shape of buffer x
    pub fn shape(&self, x: BufferId) -> Result<&[usize], KilnError> {
        Ok(self.node(x)?.shape())
    }

    /// Name of buffer x, buffer id if x is not in this graph
    #[must_use]
    pub fn label(&self, x: BufferId) -> String {
        self.labels.get(x.i()).cloned().unwrap_or_else(|| x.to_string())
    }

    /// Buffer with given name
    pub fn find(&self, name: &str) -> Result<BufferId, KilnError> {
        self.names.get(name).copied().ok_or_else(|| KilnError::UnknownBuffer(name.into()))
    }

    /// Model inputs, in insertion order
    pub fn inputs(&self) -> impl Iterator<Item = (BufferId, &[usize])> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, node)| match node {
            Node::Input { shape } => Some((id(i), shape.as_slice())),
            _ => None,
        })
    }

    /// Realized weights with their data
    pub fn initializers(&self) -> impl Iterator<Item = (BufferId, &[f32])> + '_ {
        self.initializers.iter().map(|(x, data)| (*x, data.as_slice()))
    }

    fn infer_shape(&self, op: OpKind, inputs: &[BufferId]) -> Result<Vec<usize>, KilnError> {
        if inputs.len() != op.num_parameters() {
            return Err(KilnError::shape_error(
                format!("{op} takes {} inputs, got {}", op.num_parameters(), inputs.len()).into(),
            ));
        }
        Ok(match op {
            OpKind::Load(..) | OpKind::Fill { .. } => {
                return Err(KilnError::shape_error(format!("{op} needs explicit shape").into()))
            }
            OpKind::Unary(..) => self.shape(inputs[0])?.into(),
            OpKind::Binary(..) => broadcast(self.shape(inputs[0])?, self.shape(inputs[1])?)
                .ok_or_else(|| {
                    KilnError::shape_error(
                        format!(
                            "{op} can not broadcast {:?} with {:?}",
                            self.shape(inputs[0]).unwrap_or_default(),
                            self.shape(inputs[1]).unwrap_or_default()
                        )
                        .into(),
                    )
                })?,
            OpKind::Reduce(ROp::Sum | ROp::Max) => {
                let shape = self.shape(inputs[0])?;
                if shape.len() > 1 {
                    shape[..shape.len() - 1].into()
                } else {
                    vec![1]
                }
            }
            OpKind::MatMul => {
                let xs = self.shape(inputs[0])?;
                let ys = self.shape(inputs[1])?;
                match (xs, ys) {
                    (&[m, k], &[k2, n]) if k == k2 => vec![m, n],
                    _ => return Err(KilnError::shape_error(format!("can not matmul {xs:?} with {ys:?}").into())),
                }
            }
        })
    }

    /// Load graph from json model file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KilnError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse graph from json model description.
    /// Nodes must be listed after all of their inputs.
    pub fn from_json(text: &str) -> Result<Self, KilnError> {
        let model: ModelFile = serde_json::from_str(text)?;
        let mut graph = Graph::new();
        for input in model.inputs {
            graph.input(input.name, input.shape)?;
        }
        for weight in model.weights {
            let numel = weight.shape.iter().product();
            let data = match (weight.data, weight.fill) {
                (Some(data), None) => data,
                (None, Some(value)) => vec![value; numel],
                (None, None) => vec![0.0; numel],
                (Some(_), Some(_)) => {
                    return Err(KilnError::parse_error(
                        format!("weight {:?} has both data and fill", weight.name).into(),
                    ))
                }
            };
            graph.weight(weight.name, weight.shape, data)?;
        }
        for node in model.nodes {
            let mut op: OpKind = node.op.parse()?;
            if let (OpKind::Fill { value }, Some(v)) = (&mut op, node.value) {
                *value = v;
            }
            let inputs = node.inputs.iter().map(|name| graph.find(name)).collect::<Result<Vec<BufferId>, KilnError>>()?;
            match node.shape {
                Some(shape) => graph.push_wshape(node.name, op, &inputs, shape)?,
                None => graph.push(node.name, op, &inputs)?,
            };
        }
        for name in &model.outputs {
            let x = graph.find(name)?;
            graph.mark_output(x)?;
        }
        Ok(graph)
    }
}

impl ScheduleSource for Graph {
    /// Orders op nodes reachable from outputs. Inputs and weights are not steps.
    fn build_schedule(&self, outputs: &[BufferId]) -> Result<Schedule, KilnError> {
        for &x in outputs {
            self.node(x)?;
        }
        // Make a list of visited nodes and their reference counts.
        let mut params: Vec<BufferId> = outputs.into();
        let mut rcs: BTreeMap<BufferId, u32> = BTreeMap::new();
        while let Some(nid) = params.pop() {
            rcs.entry(nid).and_modify(|rc| *rc += 1).or_insert_with(|| {
                params.extend(self.nodes[nid.i()].parameters());
                1
            });
        }
        // Order them using rcs reference counts, a node is added once all of its users were added
        let mut order = Vec::with_capacity(rcs.len());
        let mut internal_rcs: BTreeMap<BufferId, u32> = BTreeMap::new();
        let mut params: Vec<BufferId> = outputs.into();
        while let Some(nid) = params.pop() {
            let seen = internal_rcs.entry(nid).and_modify(|rc| *rc += 1).or_insert(1);
            if *seen == rcs[&nid] {
                order.push(nid);
                params.extend(self.nodes[nid.i()].parameters());
            }
        }
        Ok(order
            .into_iter()
            .rev()
            .filter_map(|nid| match &self.nodes[nid.i()] {
                Node::Op { op, inputs, shape } => Some(Step::new(*op, nid, inputs.clone(), shape.clone())),
                Node::Input { .. } | Node::Weight { .. } => None,
            })
            .collect())
    }

    fn roots(&self) -> Set<BufferId> {
        self.inputs().map(|(x, _)| x).collect()
    }
}

/// Numpy style broadcasting of trailing dimensions, one side must be a suffix
/// of the other or have a single element.
fn broadcast(xs: &[usize], ys: &[usize]) -> Option<Vec<usize>> {
    let xn: usize = xs.iter().product();
    let yn: usize = ys.iter().product();
    if xs == ys || (yn == 1 && xs.len() >= ys.len()) || xs.ends_with(ys) {
        Some(xs.into())
    } else if (xn == 1 && ys.len() >= xs.len()) || ys.ends_with(xs) {
        Some(ys.into())
    } else {
        None
    }
}

#[derive(serde::Deserialize)]
struct ModelFile {
    #[serde(default)]
    inputs: Vec<InputDef>,
    #[serde(default)]
    weights: Vec<WeightDef>,
    nodes: Vec<NodeDef>,
    outputs: Vec<String>,
}

#[derive(serde::Deserialize)]
struct InputDef {
    name: String,
    shape: Vec<usize>,
}

#[derive(serde::Deserialize)]
struct WeightDef {
    name: String,
    shape: Vec<usize>,
    #[serde(default)]
    data: Option<Vec<f32>>,
    #[serde(default)]
    fill: Option<f32>,
}

#[derive(serde::Deserialize)]
struct NodeDef {
    name: String,
    op: String,
    #[serde(default)]
    inputs: Vec<String>,
    #[serde(default)]
    shape: Option<Vec<usize>>,
    #[serde(default)]
    value: Option<f32>,
}

#[test]
fn broadcast_rules() {
    assert_eq!(broadcast(&[2, 3], &[2, 3]), Some(vec![2, 3]));
    assert_eq!(broadcast(&[2, 3], &[3]), Some(vec![2, 3]));
    assert_eq!(broadcast(&[1], &[4, 5]), Some(vec![4, 5]));
    assert_eq!(broadcast(&[2, 3], &[2]), None);
}
