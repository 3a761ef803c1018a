//! Content Definitions
//!
//! Trait, social rule and social event records as authored by content designers.
//! These are pure data: effect strings and precondition clauses are kept as text
//! and parsed by the engine when the definitions are registered.

use serde::{Deserialize, Serialize};

/// Which kind of entity a trait can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppliesTo {
    #[default]
    Agent,
    Relationship,
}

impl std::fmt::Display for AppliesTo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppliesTo::Agent => write!(f, "agent"),
            AppliesTo::Relationship => write!(f, "relationship"),
        }
    }
}

/// How a stat modifier combines with the running total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    /// Added directly to the total
    #[default]
    Flat,
    /// Summed with adjacent percent-add modifiers, then applied once
    PercentAdd,
    /// Multiplies the total by `1 + value` on its own
    PercentMultiply,
}

impl ModifierKind {
    /// Default sort order for modifiers of this kind.
    pub fn priority(&self) -> i32 {
        match self {
            ModifierKind::Flat => 100,
            ModifierKind::PercentAdd => 200,
            ModifierKind::PercentMultiply => 300,
        }
    }
}

/// Which relationships of the rule holder a social rule is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleDirection {
    /// Relationships the holder owns; `?owner` is the holder
    #[default]
    Outgoing,
    /// Relationships pointing at the holder; `?other` is the holder
    Incoming,
    Both,
}

impl RuleDirection {
    pub fn includes_outgoing(&self) -> bool {
        matches!(self, RuleDirection::Outgoing | RuleDirection::Both)
    }

    pub fn includes_incoming(&self) -> bool {
        matches!(self, RuleDirection::Incoming | RuleDirection::Both)
    }
}

/// Stat modifier applied to the entity carrying a trait, without going through
/// the effect language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatModifierDefinition {
    pub stat: String,
    pub value: f64,
    #[serde(default)]
    pub kind: ModifierKind,
    /// Overrides the kind's default order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
}

/// A conditional (or unconditional) set of effects applied across a relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SocialRuleDefinition {
    /// Rule id; trait rules default to `<trait_id>#<index>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub description: String,
    /// Query clauses over `?owner` / `?other`; empty means always satisfied
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub direction: RuleDirection,
    /// Global rules only: agent types that receive the rule (empty = every type)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agent_types: Vec<String>,
}

impl SocialRuleDefinition {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_precondition(mut self, clause: impl Into<String>) -> Self {
        self.preconditions.push(clause.into());
        self
    }

    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effects.push(effect.into());
        self
    }

    pub fn with_direction(mut self, direction: RuleDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// A named, shareable bundle of effects and social rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TraitDefinition {
    pub id: String,
    #[serde(default)]
    pub applies_to: AppliesTo,
    #[serde(default)]
    pub display_name: String,
    /// Description with `[role]` placeholders
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub social_rules: Vec<SocialRuleDefinition>,
    /// Trait ids this trait cannot coexist with
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub stat_modifiers: Vec<StatModifierDefinition>,
}

impl TraitDefinition {
    pub fn new(id: impl Into<String>, applies_to: AppliesTo) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            applies_to,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effects.push(effect.into());
        self
    }

    pub fn with_rule(mut self, rule: SocialRuleDefinition) -> Self {
        self.social_rules.push(rule);
        self
    }

    pub fn with_conflict(mut self, trait_id: impl Into<String>) -> Self {
        self.conflicts.push(trait_id.into());
        self
    }

    pub fn with_stat_modifier(mut self, modifier: StatModifierDefinition) -> Self {
        self.stat_modifiers.push(modifier);
        self
    }
}

/// One reaction to a social event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResponseDefinition {
    #[serde(default)]
    pub preconditions: Vec<String>,
    #[serde(default)]
    pub effects: Vec<String>,
    /// Replaces the event description when this response fires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ResponseDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precondition(mut self, clause: impl Into<String>) -> Self {
        self.preconditions.push(clause.into());
        self
    }

    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        self.effects.push(effect.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A one-shot interaction between named roles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SocialEventDefinition {
    pub name: String,
    /// Role names bound positionally to the dispatched agent ids
    pub roles: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub responses: Vec<ResponseDefinition>,
}

impl SocialEventDefinition {
    pub fn new(name: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            name: name.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            description: String::new(),
            responses: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_response(mut self, response: ResponseDefinition) -> Self {
        self.responses.push(response);
        self
    }

    /// Lookup key: `name/cardinality`
    pub fn key(&self) -> String {
        event_key(&self.name, self.roles.len())
    }
}

/// Builds the `name/cardinality` lookup key for a social event.
pub fn event_key(name: &str, cardinality: usize) -> String {
    format!("{}/{}", name, cardinality)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_kind_priority_order() {
        assert!(ModifierKind::Flat.priority() < ModifierKind::PercentAdd.priority());
        assert!(ModifierKind::PercentAdd.priority() < ModifierKind::PercentMultiply.priority());
    }

    #[test]
    fn test_event_key() {
        let event = SocialEventDefinition::new("compliment", &["initiator", "target"]);
        assert_eq!(event.key(), "compliment/2");
    }

    #[test]
    fn test_trait_definition_from_toml() {
        let toml = r#"
            id = "friendly"
            display_name = "Friendly"
            description = "[owner] is friendly"
            conflicts = ["hostile"]

            [[social_rules]]
            description = "[owner] likes [other]"
            effects = ["IncreaseRelationshipStat ?owner ?other Friendship 12"]
        "#;

        let def: TraitDefinition = toml::from_str(toml).unwrap();

        assert_eq!(def.applies_to, AppliesTo::Agent);
        assert_eq!(def.conflicts, vec!["hostile".to_string()]);
        assert_eq!(def.social_rules.len(), 1);
        assert_eq!(def.social_rules[0].direction, RuleDirection::Outgoing);
        assert!(def.social_rules[0].preconditions.is_empty());
    }

    #[test]
    fn test_serialization_names() {
        assert_eq!(
            serde_json::to_string(&ModifierKind::PercentMultiply).unwrap(),
            r#""percent_multiply""#
        );
        assert_eq!(
            serde_json::to_string(&AppliesTo::Relationship).unwrap(),
            r#""relationship""#
        );
    }
}
