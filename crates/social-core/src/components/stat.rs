//! Stat Components
//!
//! A stat is a base value layered with ordered modifiers. The computed value is
//! cached and recomputed lazily after any mutation.

use serde::{Deserialize, Serialize};
use social_defs::{ModifierKind, StatSchema};
use std::cell::Cell;
use std::collections::BTreeMap;

/// Identifies whatever created a modifier (a trait instance, a rule instance,
/// an event dispatch, a restored snapshot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u64);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "src_{:06}", self.0)
    }
}

/// A single numeric adjustment to a stat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    pub value: f64,
    pub kind: ModifierKind,
    /// Sort key; lower orders apply first
    pub order: i32,
    pub source: SourceId,
    /// Ticks left before the modifier expires (`None` = indefinite)
    pub remaining: Option<u32>,
}

impl StatModifier {
    /// Creates a modifier with the kind's default order.
    pub fn new(value: f64, kind: ModifierKind, source: SourceId) -> Self {
        Self {
            value,
            kind,
            order: kind.priority(),
            source,
            remaining: None,
        }
    }

    pub fn flat(value: f64, source: SourceId) -> Self {
        Self::new(value, ModifierKind::Flat, source)
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_duration(mut self, duration: Option<u32>) -> Self {
        self.remaining = duration;
        self
    }

    /// Same modifier regardless of how much of its duration has elapsed.
    fn same_as(&self, other: &StatModifier) -> bool {
        self.value == other.value
            && self.kind == other.kind
            && self.order == other.order
            && self.source == other.source
    }
}

/// Rounds to a fixed number of decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let rounded = (value * factor).round() / factor;
    // avoid "-0" leaking into fact paths
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// A bounded numeric value with modifiers
#[derive(Debug, Clone)]
pub struct Stat {
    name: String,
    base: f64,
    min: f64,
    max: f64,
    discrete: bool,
    precision: u32,
    /// Kept sorted by order; insertion order breaks ties
    modifiers: Vec<StatModifier>,
    cached: Cell<Option<f64>>,
}

impl Stat {
    pub fn new(name: impl Into<String>, base: f64, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            base,
            min,
            max,
            discrete: false,
            precision: 4,
            modifiers: Vec::new(),
            cached: Cell::new(None),
        }
    }

    /// Builds a stat from a schema, filling absent bounds with the defaults.
    pub fn from_schema(schema: &StatSchema, default_min: f64, default_max: f64, precision: u32) -> Self {
        let mut stat = Self::new(
            schema.name.clone(),
            schema.base,
            schema.min.unwrap_or(default_min),
            schema.max.unwrap_or(default_max),
        )
        .with_precision(precision);
        stat.discrete = schema.discrete;
        stat
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self.mark_dirty();
        self
    }

    pub fn discrete(mut self) -> Self {
        self.discrete = true;
        self.mark_dirty();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> f64 {
        self.base
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn is_discrete(&self) -> bool {
        self.discrete
    }

    pub fn modifiers(&self) -> &[StatModifier] {
        &self.modifiers
    }

    fn mark_dirty(&self) {
        self.cached.set(None);
    }

    pub fn set_base(&mut self, base: f64) {
        self.base = base;
        self.mark_dirty();
    }

    /// Inserts after every modifier with an order less than or equal to its own.
    pub fn add_modifier(&mut self, modifier: StatModifier) {
        let index = self
            .modifiers
            .iter()
            .position(|m| m.order > modifier.order)
            .unwrap_or(self.modifiers.len());
        self.modifiers.insert(index, modifier);
        self.mark_dirty();
    }

    /// Removes the first matching modifier. Returns false if none matched.
    pub fn remove_modifier(&mut self, modifier: &StatModifier) -> bool {
        match self.modifiers.iter().position(|m| m.same_as(modifier)) {
            Some(index) => {
                self.modifiers.remove(index);
                self.mark_dirty();
                true
            }
            None => false,
        }
    }

    /// Removes every modifier created by `source`. Returns true if any were removed.
    pub fn remove_modifiers_from_source(&mut self, source: SourceId) -> bool {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.source != source);
        let removed = self.modifiers.len() != before;
        if removed {
            self.mark_dirty();
        }
        removed
    }

    /// Counts down timed modifiers and drops the ones reaching zero.
    /// Returns true if anything expired.
    pub fn tick(&mut self) -> bool {
        let mut expired = false;
        for modifier in self.modifiers.iter_mut() {
            if let Some(remaining) = modifier.remaining.as_mut() {
                *remaining = remaining.saturating_sub(1);
                expired |= *remaining == 0;
            }
        }
        if expired {
            self.modifiers.retain(|m| m.remaining != Some(0));
            self.mark_dirty();
        }
        expired
    }

    /// Current value, recomputed if any mutation happened since the last read.
    pub fn value(&self) -> f64 {
        if let Some(value) = self.cached.get() {
            return value;
        }
        let value = self.compute();
        self.cached.set(Some(value));
        value
    }

    /// Value mapped onto `[0, 1]` between the bounds.
    pub fn normalized(&self) -> f64 {
        let range = self.max - self.min;
        if range <= 0.0 {
            return 0.0;
        }
        round_to((self.value() - self.min) / range, self.precision)
    }

    fn compute(&self) -> f64 {
        let mut total = self.base;
        let mut percent_sum = 0.0;

        for (i, modifier) in self.modifiers.iter().enumerate() {
            match modifier.kind {
                ModifierKind::Flat => total += modifier.value,
                ModifierKind::PercentAdd => {
                    percent_sum += modifier.value;
                    let next_is_percent_add = self
                        .modifiers
                        .get(i + 1)
                        .map_or(false, |next| next.kind == ModifierKind::PercentAdd);
                    if !next_is_percent_add {
                        total *= 1.0 + percent_sum;
                        percent_sum = 0.0;
                    }
                }
                ModifierKind::PercentMultiply => total *= 1.0 + modifier.value,
            }
        }

        let mut value = total.max(self.min).min(self.max);
        if self.discrete {
            value = value.floor();
        }
        round_to(value, self.precision)
    }
}

/// A recorded value change, drained by the owner of the manager
#[derive(Debug, Clone, PartialEq)]
pub struct StatChange {
    pub stat: String,
    pub value: f64,
}

/// The named stats of one entity
#[derive(Debug, Clone, Default)]
pub struct StatManager {
    stats: BTreeMap<String, Stat>,
    changes: Vec<StatChange>,
}

impl StatManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stat, replacing any stat with the same name.
    pub fn install(&mut self, stat: Stat) {
        let name = stat.name().to_string();
        let value = stat.value();
        self.stats.insert(name.clone(), stat);
        self.changes.push(StatChange { stat: name, value });
    }

    pub fn has_stat(&self, name: &str) -> bool {
        self.stats.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Stat> {
        self.stats.get(name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.stats.get(name).map(Stat::value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stat> {
        self.stats.values()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Runs `f` against one stat and records a change if its value moved.
    fn mutate<R>(&mut self, name: &str, f: impl FnOnce(&mut Stat) -> R) -> Option<R> {
        let stat = self.stats.get_mut(name)?;
        let before = stat.value();
        let result = f(stat);
        let after = stat.value();
        if after != before {
            self.changes.push(StatChange {
                stat: name.to_string(),
                value: after,
            });
        }
        Some(result)
    }

    /// Returns false if the stat does not exist.
    pub fn set_base(&mut self, name: &str, base: f64) -> bool {
        self.mutate(name, |stat| stat.set_base(base)).is_some()
    }

    /// Returns false if the stat does not exist.
    pub fn add_modifier(&mut self, name: &str, modifier: StatModifier) -> bool {
        self.mutate(name, |stat| stat.add_modifier(modifier)).is_some()
    }

    pub fn remove_modifier(&mut self, name: &str, modifier: &StatModifier) -> bool {
        self.mutate(name, |stat| stat.remove_modifier(modifier))
            .unwrap_or(false)
    }

    /// Removes `source`'s modifiers from one stat.
    pub fn remove_modifiers_from_source_on(&mut self, name: &str, source: SourceId) -> bool {
        self.mutate(name, |stat| stat.remove_modifiers_from_source(source))
            .unwrap_or(false)
    }

    /// Removes `source`'s modifiers from every stat.
    pub fn remove_modifiers_from_source(&mut self, source: SourceId) -> bool {
        let names: Vec<String> = self.stats.keys().cloned().collect();
        let mut removed = false;
        for name in names {
            removed |= self.remove_modifiers_from_source_on(&name, source);
        }
        removed
    }

    /// Advances modifier durations on every stat.
    pub fn tick(&mut self) {
        let names: Vec<String> = self.stats.keys().cloned().collect();
        for name in names {
            self.mutate(&name, Stat::tick);
        }
    }

    /// Takes the change journal.
    pub fn drain_changes(&mut self) -> Vec<StatChange> {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRC: SourceId = SourceId(1);
    const OTHER: SourceId = SourceId(2);

    #[test]
    fn test_empty_stat_is_clamped_base() {
        let stat = Stat::new("Confidence", 150.0, 0.0, 100.0);
        assert_eq!(stat.value(), 100.0);

        let stat = Stat::new("Confidence", 12.345678, 0.0, 100.0);
        assert_eq!(stat.value(), 12.3457);
    }

    #[test]
    fn test_flat_modifiers_sum() {
        let mut stat = Stat::new("Friendship", 10.0, -100.0, 100.0);
        stat.add_modifier(StatModifier::flat(12.0, SRC));
        stat.add_modifier(StatModifier::flat(-5.0, OTHER));
        assert_eq!(stat.value(), 17.0);
    }

    #[test]
    fn test_adjacent_percent_add_stack_additively() {
        let mut stat = Stat::new("Power", 100.0, 0.0, 1000.0);
        stat.add_modifier(StatModifier::new(0.1, ModifierKind::PercentAdd, SRC));
        stat.add_modifier(StatModifier::new(0.2, ModifierKind::PercentAdd, SRC));
        // one step of 1.3, not 1.1 * 1.2
        assert_eq!(stat.value(), 130.0);
    }

    #[test]
    fn test_non_adjacent_percent_add_apply_separately() {
        let mut stat = Stat::new("Power", 100.0, 0.0, 1000.0);
        stat.add_modifier(StatModifier::new(0.1, ModifierKind::PercentAdd, SRC).with_order(1));
        stat.add_modifier(StatModifier::flat(10.0, SRC).with_order(2));
        stat.add_modifier(StatModifier::new(0.1, ModifierKind::PercentAdd, SRC).with_order(3));
        // ((100 * 1.1) + 10) * 1.1
        assert_eq!(stat.value(), 132.0);
    }

    #[test]
    fn test_percent_multiply_compounds() {
        let mut stat = Stat::new("Power", 100.0, 0.0, 1000.0);
        stat.add_modifier(StatModifier::new(0.5, ModifierKind::PercentMultiply, SRC));
        stat.add_modifier(StatModifier::new(0.5, ModifierKind::PercentMultiply, SRC));
        stat.add_modifier(StatModifier::flat(20.0, SRC));
        // flat sorts first: (100 + 20) * 1.5 * 1.5
        assert_eq!(stat.value(), 270.0);
    }

    #[test]
    fn test_discrete_floors_before_rounding() {
        let mut stat = Stat::new("Energy", 10.0, 0.0, 20.0).discrete();
        stat.add_modifier(StatModifier::flat(2.75, SRC));
        assert_eq!(stat.value(), 12.0);
    }

    #[test]
    fn test_inverted_bounds_do_not_panic() {
        let stat = Stat::new("Pride", 5.0, 10.0, 0.0);
        assert_eq!(stat.value(), 0.0);
    }

    #[test]
    fn test_normalized() {
        let stat = Stat::new("Friendship", 50.0, -100.0, 100.0);
        assert_eq!(stat.normalized(), 0.75);

        let flat = Stat::new("Degenerate", 5.0, 5.0, 5.0);
        assert_eq!(flat.normalized(), 0.0);
    }

    #[test]
    fn test_remove_modifier_and_missing_modifier() {
        let mut stat = Stat::new("Friendship", 0.0, -100.0, 100.0);
        let modifier = StatModifier::flat(12.0, SRC);
        stat.add_modifier(modifier.clone());
        assert_eq!(stat.value(), 12.0);

        assert!(stat.remove_modifier(&modifier));
        assert_eq!(stat.value(), 0.0);
        assert!(!stat.remove_modifier(&modifier));
    }

    #[test]
    fn test_remove_modifiers_from_source() {
        let mut stat = Stat::new("Friendship", 0.0, -100.0, 100.0);
        stat.add_modifier(StatModifier::flat(12.0, SRC));
        stat.add_modifier(StatModifier::flat(3.0, SRC));
        stat.add_modifier(StatModifier::flat(1.0, OTHER));

        assert!(stat.remove_modifiers_from_source(SRC));
        assert_eq!(stat.value(), 1.0);
        assert!(!stat.remove_modifiers_from_source(SRC));
    }

    #[test]
    fn test_timed_modifier_expires() {
        let mut stat = Stat::new("Confidence", 0.0, 0.0, 100.0);
        stat.add_modifier(StatModifier::flat(20.0, SRC).with_duration(Some(3)));

        assert!(!stat.tick());
        assert!(!stat.tick());
        assert_eq!(stat.value(), 20.0);
        assert!(stat.tick());
        assert_eq!(stat.value(), 0.0);
        assert!(stat.modifiers().is_empty());
    }

    #[test]
    fn test_manager_records_changes() {
        let mut stats = StatManager::new();
        stats.install(Stat::new("Confidence", 0.0, 0.0, 100.0));
        stats.drain_changes();

        assert!(stats.add_modifier("Confidence", StatModifier::flat(20.0, SRC)));
        assert!(!stats.add_modifier("Missing", StatModifier::flat(20.0, SRC)));
        // no-op mutation records nothing
        stats.set_base("Confidence", 0.0);

        let changes = stats.drain_changes();
        assert_eq!(
            changes,
            vec![StatChange {
                stat: "Confidence".into(),
                value: 20.0
            }]
        );
    }

    #[test]
    fn test_manager_remove_source_across_stats() {
        let mut stats = StatManager::new();
        stats.install(Stat::new("A", 0.0, 0.0, 100.0));
        stats.install(Stat::new("B", 0.0, 0.0, 100.0));
        stats.add_modifier("A", StatModifier::flat(1.0, SRC));
        stats.add_modifier("B", StatModifier::flat(2.0, SRC));

        assert!(stats.remove_modifiers_from_source(SRC));
        assert_eq!(stats.value("A"), Some(0.0));
        assert_eq!(stats.value("B"), Some(0.0));
    }
}
