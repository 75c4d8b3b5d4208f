//! Blockwise reconstruction of neurites from large EM volumes.
//!
//! Three stages run over a regular block grid: candidate regions per section, candidate links between
//! adjacent sections, and a 0/1 program selecting links per core. Every stage is driven by a guarantor
//! which makes its output durable for a set of blocks and reports the blocks whose inputs are missing,
//! instead of failing. The orchestrator resolves these deficits by running the upstream stage.
//!
//! Regions are extracted over windows that grow until no required region touches the window border, and
//! links over the closure of the blocks their regions reach into. Blockwise results therefore equal
//! those of a single pass over the whole volume, for any tiling.

pub mod errors;
pub mod model;
pub mod pipeline;
pub mod processes;
pub mod test_helpers;
