//! Effects
//!
//! Typed effects built from the effect mini-language
//! (`Name arg1 arg2 ... [duration]`). An effect holds resolved targets and
//! parameters; the social graph applies and undoes it.

pub mod context;
pub mod library;

use thiserror::Error;

use social_defs::AppliesTo;

use crate::components::{EntityRef, StatModifier};

pub use context::BindingContext;
pub use library::{EffectFactory, EffectLibrary, EffectTargets};

/// Errors raised while building an effect from text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EffectError {
    #[error("unknown effect {0:?}")]
    UnknownEffect(String),
    #[error("{effect} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        effect: String,
        expected: usize,
        actual: usize,
    },
    #[error("{effect}: invalid argument {value:?}: {reason}")]
    ArgumentFormat {
        effect: String,
        value: String,
        reason: String,
    },
    #[error("unknown entity {0:?}")]
    UnknownEntity(String),
    #[error("unknown trait {0:?}")]
    UnknownTrait(String),
    #[error("{entity} has no stat {stat:?}")]
    UnknownStat { entity: String, stat: String },
    #[error("role ?{0} is not bound")]
    UnboundRole(String),
    #[error("trait {trait_id:?} cannot be attached to an {expected}")]
    TraitTypeMismatch { trait_id: String, expected: AppliesTo },
}

/// A resolved, undoable effect
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AddTrait {
        target: EntityRef,
        trait_id: String,
        duration: Option<u32>,
        /// Set when applying actually attached the trait
        added: bool,
    },
    RemoveTrait {
        target: EntityRef,
        trait_id: String,
        /// Remaining duration of the trait this effect detached
        removed: Option<Option<u32>>,
    },
    /// Increase or decrease, depending on the modifier's sign
    ModifyStat {
        target: EntityRef,
        stat: String,
        modifier: StatModifier,
    },
    /// Several effects applied in order and undone in reverse
    Batch(Vec<Effect>),
}

impl Effect {
    pub fn add_trait(target: EntityRef, trait_id: impl Into<String>, duration: Option<u32>) -> Self {
        Effect::AddTrait {
            target,
            trait_id: trait_id.into(),
            duration,
            added: false,
        }
    }

    pub fn remove_trait(target: EntityRef, trait_id: impl Into<String>) -> Self {
        Effect::RemoveTrait {
            target,
            trait_id: trait_id.into(),
            removed: None,
        }
    }

    pub fn modify_stat(target: EntityRef, stat: impl Into<String>, modifier: StatModifier) -> Self {
        Effect::ModifyStat {
            target,
            stat: stat.into(),
            modifier,
        }
    }

    /// How long the effect lasts, `None` when it is indefinite.
    pub fn duration(&self) -> Option<u32> {
        match self {
            Effect::AddTrait { duration, .. } => *duration,
            Effect::RemoveTrait { .. } => None,
            Effect::ModifyStat { modifier, .. } => modifier.remaining,
            Effect::Batch(effects) => effects
                .iter()
                .map(Effect::duration)
                .collect::<Option<Vec<u32>>>()
                .and_then(|d| d.into_iter().max()),
        }
    }

    /// Entities this effect touches.
    pub fn targets(&self) -> Vec<EntityRef> {
        match self {
            Effect::AddTrait { target, .. }
            | Effect::RemoveTrait { target, .. }
            | Effect::ModifyStat { target, .. } => vec![*target],
            Effect::Batch(effects) => effects.iter().flat_map(Effect::targets).collect(),
        }
    }
}
