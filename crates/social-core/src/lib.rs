//! Social simulation engine: agents, relationships, traits, stats and social
//! rules kept consistent over a queryable fact database.
//!
//! The [`SocialGraph`] is the entry point. Register a [`ContentLibrary`] with
//! it, add agents and relationships, attach traits, dispatch social events and
//! tick durations; rule instances follow automatically.
//!
//! [`ContentLibrary`]: social_defs::ContentLibrary

pub mod components;
pub mod config;
pub mod effects;
pub mod error;
pub mod facts;
pub mod graph;
pub mod observer;
pub mod setup;

pub use components::{AgentKey, EntityRef, RelationshipKey, SourceId};
pub use config::{ConfigError, EngineConfig};
pub use effects::{BindingContext, Effect, EffectError, EffectLibrary};
pub use error::{GraphError, StatError};
pub use facts::{FactDatabase, MemoryFactDb, Query, QueryResult};
pub use graph::{DispatchReport, ResponseReport, SocialGraph};
pub use observer::{EntityId, GraphEvent, ObserverHandle};
