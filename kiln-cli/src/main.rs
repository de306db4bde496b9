//! Kiln CLI - compile a model ahead of time, run its input dependent part.

mod inputs;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kiln_compiler::{compile, Compiled};
use kiln_core::config::Config;
use kiln_core::debug::DebugMask;
use kiln_core::engine::ExecutionEngine;
use kiln_core::graph::{Graph, ScheduleSource};
use kiln_core::BufferId;
use kiln_cpu::Interpreter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Split a model schedule into static and input dependent kernels", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct ModelArgs {
    /// Path to the JSON model file
    #[arg(value_name = "GRAPH")]
    graph: PathBuf,

    /// Outputs to compute, by name (defaults to the outputs of the model)
    #[arg(short, long = "output", value_name = "NAME")]
    outputs: Vec<String>,

    /// Debug mask, 1 dev, 2 perf, 4 sched (overrides KILN_DEBUG)
    #[arg(long)]
    debug: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a model, run the static part once and the dynamic part on random inputs
    Run {
        #[command(flatten)]
        model: ModelArgs,

        /// Seed for random inputs (overrides config and KILN_SEED)
        #[arg(long)]
        seed: Option<u64>,

        /// Standard deviation of random inputs
        #[arg(long)]
        scale: Option<f32>,

        /// Write the partition as a Graphviz DOT file
        #[arg(long, value_name = "FILE")]
        dot: Option<PathBuf>,

        /// Also run the unsplit schedule and compare outputs bit for bit
        #[arg(long)]
        verify: bool,
    },
    /// Print the schedule with each step classified, without executing it
    Inspect {
        #[command(flatten)]
        model: ModelArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load();

    match cli.command {
        Commands::Run { model, seed, scale, dot, verify } => {
            if let Some(debug) = model.debug {
                config.debug = debug;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            if let Some(scale) = scale {
                config.input_scale = scale;
            }
            cmd_run(&model, &config, dot.as_deref(), verify)?;
        }
        Commands::Inspect { model } => {
            if let Some(debug) = model.debug {
                config.debug = debug;
            }
            cmd_inspect(&model, config.debug_mask())?;
        }
    }

    Ok(())
}

fn load_graph(model: &ModelArgs) -> Result<(Graph, Vec<BufferId>)> {
    let graph =
        Graph::load(&model.graph).with_context(|| format!("Failed to load model from {}", model.graph.display()))?;
    let outputs = if model.outputs.is_empty() {
        graph.outputs().to_vec()
    } else {
        model.outputs.iter().map(|name| graph.find(name)).collect::<Result<_, _>>()?
    };
    if outputs.is_empty() {
        anyhow::bail!("Model {} has no outputs, select some with --output", model.graph.display());
    }
    Ok((graph, outputs))
}

/// Compile, run static part, then dynamic part and print counters.
fn cmd_run(model: &ModelArgs, config: &Config, dot: Option<&Path>, verify: bool) -> Result<()> {
    let (graph, outputs) = load_graph(model)?;
    let compiled = compile(&graph, &outputs, config.debug_mask()).context("Failed to compile model")?;
    println!("{}", compiled.partition);

    if let Some(path) = dot {
        std::fs::write(path, compiled.partition.plot_dot(|x| graph.label(x)))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Partition written to {}", path.display());
    }

    let inputs = inputs::random_inputs(&graph, config.seed, config.input_scale);
    let mut engine = engine_with_inputs(&graph, config.seed, &inputs)?;
    let stats = compiled.execute(&mut engine)?;
    println!(
        "static {:.3} ms, dynamic {:.3} ms",
        stats.static_time.as_secs_f64() * 1e3,
        stats.dynamic_time.as_secs_f64() * 1e3
    );
    println!("{}", stats.counters);

    for &x in &outputs {
        let values = engine.load(x)?;
        let head: Vec<f32> = values.iter().copied().take(8).collect();
        let more = if values.len() > head.len() { ", ..." } else { "" };
        println!("{} {:?} = {head:?}{more}", graph.label(x), graph.shape(x)?);
    }

    if verify {
        verify_outputs(&graph, &outputs, &compiled, config.seed, &inputs, &engine)?;
    }
    Ok(())
}

fn engine_with_inputs(graph: &Graph, seed: u64, inputs: &[inputs::Input]) -> Result<Interpreter> {
    let mut engine = Interpreter::with_weights(graph, seed)?;
    for input in inputs {
        engine.store(input.id, input.shape.clone(), input.data.clone())?;
    }
    Ok(engine)
}

/// Run the unsplit schedule on a fresh engine and compare with the split run.
fn verify_outputs(
    graph: &Graph,
    outputs: &[BufferId],
    compiled: &Compiled,
    seed: u64,
    inputs: &[inputs::Input],
    split: &Interpreter,
) -> Result<()> {
    let schedule = graph.build_schedule(outputs)?;
    let mut full = engine_with_inputs(graph, seed, inputs)?;
    full.run(&schedule)?;
    for &x in outputs {
        let (a, b) = (split.load(x)?, full.load(x)?);
        if let Some(i) = a.iter().zip(&b).position(|(a, b)| a.to_bits() != b.to_bits()) {
            anyhow::bail!("Output {} differs at index {i}: {} != {}", graph.label(x), a[i], b[i]);
        }
    }
    println!("verified {} outputs over {} steps", outputs.len(), compiled.partition.len());
    Ok(())
}

/// Print every step of the schedule with its group.
fn cmd_inspect(model: &ModelArgs, debug: DebugMask) -> Result<()> {
    let (graph, outputs) = load_graph(model)?;
    let schedule = graph.build_schedule(&outputs)?;
    let compiled = Compiled::new(schedule.clone(), &graph.roots(), debug).context("Failed to compile model")?;
    for (i, step) in schedule.iter().enumerate() {
        let group = if compiled.depends.contains(&step.output) { "dynamic" } else { "static" };
        println!("{i:>4} {group:<7} {:<16} {step}", graph.label(step.output));
    }
    println!("{}", compiled.partition);
    Ok(())
}
