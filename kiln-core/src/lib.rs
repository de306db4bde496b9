//! # kiln-core
//!
//! kiln-core is the core part of kiln, an ahead-of-time compiler that splits
//! a schedule of kernels into the part that depends on model inputs and the
//! part that can be computed once and reused.
//!
//! kiln-core contains definitions of buffers, operations, steps and schedules,
//! the [Graph](graph::Graph) schedule source, the
//! [ExecutionEngine](engine::ExecutionEngine) interface backends implement,
//! process wide [counters](counters::GlobalCounters), debug mask and
//! configuration.
//!
#![forbid(unsafe_code)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::private_intra_doc_links)]
#![warn(missing_docs)]
#![forbid(rustdoc::missing_crate_level_docs)]
#![forbid(rustdoc::private_doc_tests)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]
#![forbid(rustdoc::unescaped_backticks)]
#![forbid(rustdoc::redundant_explicit_links)]

/// See [BufferId](buffer::BufferId)
pub mod buffer;
/// See [Config](config::Config)
pub mod config;
/// See [GlobalCounters](counters::GlobalCounters)
pub mod counters;
/// See [DebugMask](debug::DebugMask)
pub mod debug;
/// See [ExecutionEngine](engine::ExecutionEngine)
pub mod engine;
/// See [KilnError](error::KilnError)
pub mod error;
/// See [Graph](graph::Graph)
pub mod graph;
/// See [OpKind](op::OpKind)
pub mod op;
/// See [Schedule](schedule::Schedule)
pub mod schedule;

pub use buffer::{BufferId, Set};
pub use error::KilnError;
