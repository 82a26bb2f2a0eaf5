//! CLI command implementations.

pub mod cart;

/// How command results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// Print JSON instead of a table.
    pub json: bool,
}
