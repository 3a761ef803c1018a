//! Graph Components
//!
//! Entities, stats, traits and social rules.

pub mod entity;
pub mod rules;
pub mod stat;
pub mod traits;

pub use entity::*;
pub use rules::*;
pub use stat::*;
pub use traits::*;
