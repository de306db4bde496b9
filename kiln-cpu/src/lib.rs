//! CPU only, pure rust engine for kiln
//!
//! Runs schedules step by step on f32 buffers. It is meant as a reference,
//! results are bit for bit reproducible, so partitioned and unpartitioned
//! runs can be compared exactly.
//!
//! ```rust
//! use kiln_core::{buffer::id, engine::ExecutionEngine, op::{OpKind, UOp}, schedule::{Schedule, Step}};
//! let mut engine = kiln_cpu::Interpreter::new(69420);
//! engine.store(id(0), vec![2], vec![-1.0, 2.0])?;
//! engine.run(&Schedule::from(vec![Step::new(OpKind::Unary(UOp::ReLU), id(1), [id(0)], [2])]))?;
//! assert_eq!(engine.load(id(1))?, vec![0.0, 2.0]);
//! # Ok::<(), kiln_core::error::ExecError>(())
//! ```

#![forbid(unsafe_code)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::private_intra_doc_links)]
#![warn(missing_docs)]
#![forbid(rustdoc::missing_crate_level_docs)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]

mod interpreter;

pub use interpreter::Interpreter;
