//! Kiln ahead-of-time compiler.
//!
//! Splits a schedule into steps that depend on model inputs and steps that
//! don't. The input independent steps run once, their outputs are reused by
//! every following inference, which then runs only the dependent steps.
//!
//! ```text
//! schedule -> validate_purity -> compute_dependents -> partition -> execute
//! ```

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

mod dependents;
mod driver;
mod partition;
mod purity;

pub use dependents::compute_dependents;
pub use driver::{compile, Compiled, RunStats};
pub use partition::{partition, Partition};
pub use purity::validate_purity;
