use kiln_core::graph::Graph;
use kiln_core::BufferId;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Values for one model input
pub struct Input {
    pub id: BufferId,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Samples `len` values from `N(0, std^2)` using the Box-Muller transform.
pub fn randn(len: usize, std: f32, rng: &mut impl Rng) -> Vec<f32> {
    let mut values = Vec::with_capacity(len);
    while values.len() < len {
        let u1: f32 = rng.gen::<f32>().max(f32::MIN_POSITIVE);
        let u2: f32 = rng.gen::<f32>();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f32::consts::PI * u2;
        values.push(r * theta.cos() * std);
        if values.len() < len {
            values.push(r * theta.sin() * std);
        }
    }
    values
}

/// Random values for every input of graph, in declaration order.
pub fn random_inputs(graph: &Graph, seed: u64, scale: f32) -> Vec<Input> {
    let mut rng = SmallRng::seed_from_u64(seed);
    graph
        .inputs()
        .map(|(id, shape)| Input { id, shape: shape.into(), data: randn(shape.iter().product(), scale, &mut rng) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_inputs() -> Result<(), kiln_core::KilnError> {
        let mut graph = Graph::new();
        graph.input("a", [3])?;
        graph.input("b", [2, 2])?;
        let x = random_inputs(&graph, 3, 8.0);
        let y = random_inputs(&graph, 3, 8.0);
        assert_eq!(x.len(), 2);
        assert_eq!(x[0].data.len(), 3);
        assert_eq!(x[1].shape, vec![2, 2]);
        assert_eq!(x[1].data, y[1].data);
        assert_ne!(x[0].data, random_inputs(&graph, 4, 8.0)[0].data);
        Ok(())
    }

    #[test]
    fn randn_is_roughly_standard() {
        let mut rng = SmallRng::seed_from_u64(0);
        let values = randn(10_001, 1.0, &mut rng);
        assert_eq!(values.len(), 10_001);
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let var = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / values.len() as f32;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.1);
    }
}
