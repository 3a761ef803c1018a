//! Simulation Setup
//!
//! Graph construction, starting population, and the seeded event driver used by
//! the `social_sim` binary.

pub mod driver;
pub mod scenario;

pub use driver::*;
pub use scenario::*;
