//! Engine error types.

use social_defs::{AppliesTo, LoadError};
use thiserror::Error;

use crate::effects::EffectError;
use crate::facts::QueryError;

/// Errors raised by stat lookups on a known entity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatError {
    #[error("{entity} has no stat {stat:?}")]
    UnknownStat { entity: String, stat: String },
}

/// Errors raised by social graph operations.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("no schema registered for {0:?}")]
    UnknownSchema(String),
    #[error("unknown agent {0:?}")]
    UnknownAgent(String),
    #[error("no relationship from {owner:?} to {target:?}")]
    UnknownRelationship { owner: String, target: String },
    #[error("unknown trait {0:?}")]
    UnknownTrait(String),
    #[error("unknown social event {0:?}")]
    UnknownEvent(String),
    #[error("trait {trait_id:?} cannot be attached to an {expected}")]
    TraitTypeMismatch { trait_id: String, expected: AppliesTo },
    #[error("stat {stat:?} of schema {schema:?} has invalid bounds [{min}, {max}]")]
    InvalidStatBounds {
        schema: String,
        stat: String,
        min: f64,
        max: f64,
    },
    #[error("agent {0:?} already exists")]
    DuplicateAgent(String),
    /// An effect of a trait, rule or event could not be built
    #[error("{origin}: {error}")]
    Effect {
        origin: String,
        #[source]
        error: EffectError,
    },
    /// A precondition of a trait, rule or event could not be parsed
    #[error("{origin}: {error}")]
    Query {
        origin: String,
        #[source]
        error: QueryError,
    },
    #[error(transparent)]
    Stat(#[from] StatError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("unexpected graph state: {0}")]
    Unexpected(String),
}

impl GraphError {
    pub(crate) fn effect(origin: impl Into<String>, error: EffectError) -> Self {
        GraphError::Effect {
            origin: origin.into(),
            error,
        }
    }

    pub(crate) fn query(origin: impl Into<String>, error: QueryError) -> Self {
        GraphError::Query {
            origin: origin.into(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_effect_error_keeps_origin_and_source() {
        let err = GraphError::effect("friendly", EffectError::UnknownTrait("werewolf".into()));
        assert_eq!(err.to_string(), "friendly: unknown trait \"werewolf\"");
        assert!(err.source().is_some());
    }
}
