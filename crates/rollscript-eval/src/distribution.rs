//! Frequency tables over sampled values.
//!
//! A [`Distribution`] keeps one [`Count`] per distinct value in ascending
//! value order. Cumulative fields are derived in a single ascending pass,
//! lazily, on the first read after an observation.

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::scope::Scope;
use crate::value::Value;
use indexmap::IndexMap;
use rollscript_types::ast::Expr;
use rollscript_types::{ParseNameError, ValueType};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ══════════════════════════════════════════════════════════════════════════════
// Counts
// ══════════════════════════════════════════════════════════════════════════════

/// Occurrences of one value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Count {
    pub frequency: u64,
    /// Occurrences of this value or any greater one.
    pub at_least: u64,
    /// Occurrences of this value or any lesser one.
    pub at_most: u64,
    pub relative_frequency: f64,
    pub relative_at_least: f64,
    pub relative_at_most: f64,
}

impl Count {
    fn compute(&mut self, previous: Option<&Count>, total: u64) {
        match previous {
            None => {
                self.at_least = total;
                self.at_most = self.frequency;
            }
            Some(prev) => {
                self.at_least = prev.at_least - prev.frequency;
                self.at_most = prev.at_most + self.frequency;
            }
        }
        let ratio = |n: u64| {
            if total == 0 {
                0.0
            } else {
                n as f64 / total as f64
            }
        };
        self.relative_frequency = ratio(self.frequency);
        self.relative_at_least = ratio(self.at_least);
        self.relative_at_most = ratio(self.at_most);
    }
}

/// Which field of a [`Count`] to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountSelector {
    Frequency,
    AtLeast,
    AtMost,
    #[serde(rename = "relfrequency")]
    RelativeFrequency,
    #[serde(rename = "relatleast")]
    RelativeAtLeast,
    #[serde(rename = "relatmost")]
    RelativeAtMost,
}

impl CountSelector {
    pub const ALL: [CountSelector; 6] = [
        CountSelector::Frequency,
        CountSelector::AtLeast,
        CountSelector::AtMost,
        CountSelector::RelativeFrequency,
        CountSelector::RelativeAtLeast,
        CountSelector::RelativeAtMost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CountSelector::Frequency => "frequency",
            CountSelector::AtLeast => "atleast",
            CountSelector::AtMost => "atmost",
            CountSelector::RelativeFrequency => "relfrequency",
            CountSelector::RelativeAtLeast => "relatleast",
            CountSelector::RelativeAtMost => "relatmost",
        }
    }

    /// The selected field, absolute counts widened to `f64`.
    pub fn get(&self, count: &Count) -> f64 {
        match self {
            CountSelector::Frequency => count.frequency as f64,
            CountSelector::AtLeast => count.at_least as f64,
            CountSelector::AtMost => count.at_most as f64,
            CountSelector::RelativeFrequency => count.relative_frequency,
            CountSelector::RelativeAtLeast => count.relative_at_least,
            CountSelector::RelativeAtMost => count.relative_at_most,
        }
    }
}

impl fmt::Display for CountSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountSelector {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CountSelector::ALL
            .into_iter()
            .find(|sel| sel.as_str() == s)
            .ok_or_else(|| ParseNameError::new("count selector", s))
    }
}

/// One value's selected statistic across several named distributions.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiCount {
    pub value: Value,
    pub counts: IndexMap<String, f64>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Distribution
// ══════════════════════════════════════════════════════════════════════════════

/// Ordered frequency table.
#[derive(Debug, Clone, Default)]
pub struct Distribution {
    counts: RefCell<BTreeMap<Value, Count>>,
    total: u64,
    stale: Cell<bool>,
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of observations.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of distinct values, zero-count entries included.
    pub fn len(&self) -> usize {
        self.counts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.borrow().is_empty()
    }

    /// Record one occurrence of `value`.
    pub fn incr(&mut self, value: &Value) {
        self.entry(value).frequency += 1;
        self.total += 1;
        self.stale.set(true);
    }

    /// Make sure `value` has an entry, possibly with zero occurrences.
    pub fn ensure_count(&mut self, value: &Value) {
        self.entry(value);
    }

    fn entry(&mut self, value: &Value) -> &mut Count {
        let counts = self.counts.get_mut();
        let key = if counts.contains_key(value) {
            value.clone()
        } else {
            self.stale.set(true);
            // Keys must not alias containers that user code may still mutate.
            value.deep_copy()
        };
        counts.entry(key).or_default()
    }

    /// Recompute cumulative fields if an observation invalidated them.
    fn refresh(&self) {
        if !self.stale.get() {
            return;
        }
        let mut counts = self.counts.borrow_mut();
        let mut previous: Option<Count> = None;
        for count in counts.values_mut() {
            count.compute(previous.as_ref(), self.total);
            previous = Some(*count);
        }
        self.stale.set(false);
    }

    /// All counts in ascending value order.
    pub fn counts(&self) -> Ref<'_, BTreeMap<Value, Count>> {
        self.refresh();
        self.counts.borrow()
    }

    pub fn count(&self, value: &Value) -> Option<Count> {
        self.counts().get(value).copied()
    }

    /// Distinct values in ascending order.
    pub fn values(&self) -> Vec<Value> {
        self.counts.borrow().keys().cloned().collect()
    }

    /// Remove every observation.
    pub fn clear(&mut self) {
        self.counts.get_mut().clear();
        self.total = 0;
        self.stale.set(false);
    }

    /// Evaluate `expr` as `ty` `repeats` times and count the results.
    ///
    /// Dice logging is suspended while sampling and restored afterwards,
    /// also when an evaluation fails.
    pub fn sample(
        &mut self,
        expr: &Expr,
        ctx: &mut EvaluationContext,
        scope: &Scope,
        ty: ValueType,
        repeats: u32,
    ) -> EvalResult<()> {
        let log_dice = ctx.log_dice();
        ctx.set_log_dice(false);
        tracing::debug!(repeats, expr = %expr, "sampling started");
        let result = (0..repeats).try_for_each(|_| {
            let value = ctx.evaluate_as(expr, scope, ty)?;
            self.incr(&value);
            Ok(())
        });
        ctx.set_log_dice(log_dice);
        tracing::debug!(total = self.total, distinct = self.len(), "sampling finished");
        result
    }

    // ── Statistics ───────────────────────────────────────────────────────

    /// Integer coercions of the values with their relative frequencies.
    fn weighted_integers(
        &self,
        ctx: &mut EvaluationContext,
        scope: &Scope,
    ) -> EvalResult<Vec<(i64, f64)>> {
        let entries: Vec<(Value, f64)> = self
            .counts()
            .iter()
            .map(|(v, c)| (v.clone(), c.relative_frequency))
            .collect();
        entries
            .into_iter()
            .map(|(v, f)| Ok((ctx.to_integer(scope, &v)?, f)))
            .collect()
    }

    /// Mean of the integer coercions weighted by relative frequency.
    pub fn mean(&self, ctx: &mut EvaluationContext, scope: &Scope) -> EvalResult<f64> {
        Ok(self
            .weighted_integers(ctx, scope)?
            .into_iter()
            .map(|(n, f)| n as f64 * f)
            .sum())
    }

    /// `sqrt(Σ ((x - mean) * f)²)`: deviations are weighted before squaring.
    pub fn stddev(&self, ctx: &mut EvaluationContext, scope: &Scope) -> EvalResult<f64> {
        let weighted = self.weighted_integers(ctx, scope)?;
        let mean: f64 = weighted.iter().map(|(n, f)| *n as f64 * f).sum();
        let sum: f64 = weighted
            .iter()
            .map(|(n, f)| ((*n as f64 - mean) * f).powi(2))
            .sum();
        Ok(sum.sqrt())
    }

    /// Most frequent value; the lowest one among ties.
    pub fn mode(&self) -> Option<Value> {
        let counts = self.counts.borrow();
        let mut best: Option<(&Value, u64)> = None;
        for (value, count) in counts.iter() {
            if best.map_or(true, |(_, f)| count.frequency > f) {
                best = Some((value, count.frequency));
            }
        }
        best.map(|(v, _)| v.clone())
    }

    /// First value whose relative at-most frequency reaches one half.
    pub fn median_sup(&self) -> Option<Value> {
        self.counts()
            .iter()
            .find(|(_, c)| c.relative_at_most >= 0.5)
            .map(|(v, _)| v.clone())
    }

    /// First value whose relative at-least frequency drops to one half.
    pub fn median_inf(&self) -> Option<Value> {
        self.counts()
            .iter()
            .find(|(_, c)| c.relative_at_least <= 0.5)
            .map(|(v, _)| v.clone())
    }

    /// Bounds leaving at most `risk / 2` of the observations on each side.
    pub fn confidence_interval(&self, risk: f64) -> Option<(Value, Value)> {
        let half = risk / 2.0;
        let counts = self.counts();
        let lower = interval_boundary(counts.iter(), half, CountSelector::RelativeAtMost)?;
        let upper = interval_boundary(counts.iter().rev(), half, CountSelector::RelativeAtLeast)?;
        Some((lower, upper))
    }
}

/// Last value of the scan still within `half`, or the first value.
fn interval_boundary<'a>(
    counts: impl Iterator<Item = (&'a Value, &'a Count)>,
    half: f64,
    selector: CountSelector,
) -> Option<Value> {
    let mut counts = counts.peekable();
    let mut result = counts.peek()?.0;
    for (value, count) in counts {
        if selector.get(count) > half {
            break;
        }
        result = value;
    }
    Some(result.clone())
}
