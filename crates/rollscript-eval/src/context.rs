//! Per-run evaluation state.

use crate::config::EvalConfig;
use crate::distribution::{CountSelector, Distribution, MultiCount};
use crate::error::{EvalResult, EvaluationError};
use crate::import::{ImportResolver, NoImports};
use crate::records::{DiceRecord, OutputRecord, RollRecord, SampleRecord};
use crate::scope::Scope;
use crate::value::{Value, ValueMap};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rollscript_types::ast::{Expr, OutputMode};
use rollscript_types::ValueType;
use std::collections::BTreeSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Everything one run mutates: the random stream, the global scope, the
/// records produced so far and the dice log.
///
/// A context belongs to a single run; nothing in it is shared between
/// threads.
pub struct EvaluationContext {
    seed: u64,
    rng: StdRng,
    pub config: EvalConfig,
    global: Scope,
    dice_log: Vec<DiceRecord>,
    records: Vec<OutputRecord>,
    open: Option<OutputRecord>,
    imports: Box<dyn ImportResolver>,
}

impl EvaluationContext {
    /// A context seeded with `seed`, or with the wall clock when `None`.
    pub fn new(config: EvalConfig, seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(wall_clock_seed);
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            config,
            global: Scope::root(),
            dice_log: Vec::new(),
            records: Vec::new(),
            open: None,
            imports: Box::new(NoImports),
        }
    }

    /// Builder-style: resolve imports with `resolver`.
    pub fn with_imports(mut self, resolver: impl ImportResolver + 'static) -> Self {
        self.imports = Box::new(resolver);
        self
    }

    /// Builder-style: resolve imports with an already boxed resolver.
    pub fn with_boxed_imports(mut self, resolver: Box<dyn ImportResolver>) -> Self {
        self.imports = resolver;
        self
    }

    /// The seed of the random stream, for reproducing this run.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn global_scope(&self) -> &Scope {
        &self.global
    }

    pub fn resolve_import(&mut self, address: &str) -> Option<ValueMap> {
        let resolved = self.imports.resolve(address);
        tracing::debug!(address, found = resolved.is_some(), "import resolved");
        resolved
    }

    // ── Dice log ─────────────────────────────────────────────────────────

    pub fn log_dice(&self) -> bool {
        self.config.log_dice
    }

    pub fn set_log_dice(&mut self, log_dice: bool) {
        self.config.log_dice = log_dice;
    }

    /// Log a roll, also into the open roll record if any.
    pub fn record_dice(&mut self, dice_type: &Value, outcomes: &[Value]) {
        if !self.config.log_dice {
            return;
        }
        let record = DiceRecord {
            dice_type: dice_type.clone(),
            outcomes: outcomes.to_vec(),
        };
        tracing::trace!(dice_type = %record.dice_type, rolls = outcomes.len(), "dice rolled");
        if let Some(OutputRecord::Roll(open)) = &mut self.open {
            open.dice.push(record.clone());
        }
        self.dice_log.push(record);
    }

    pub fn dice_log(&self) -> &[DiceRecord] {
        &self.dice_log
    }

    // ── Output records ───────────────────────────────────────────────────

    fn open_record(&mut self, record: OutputRecord) -> EvalResult<()> {
        if let Some(open) = &self.open {
            return Err(EvaluationError::new(format!(
                "nested output: '{}' is still open",
                open.name()
            )));
        }
        tracing::debug!(name = record.name(), mode = %record.mode(), "output opened");
        self.open = Some(record);
        Ok(())
    }

    /// Start a roll record of `expression` evaluated as `value_type`; its
    /// dice are collected until it is closed.
    pub fn open_roll(
        &mut self,
        name: impl Into<String>,
        expression: &Expr,
        value_type: ValueType,
    ) -> EvalResult<()> {
        self.open_record(OutputRecord::Roll(RollRecord {
            name: name.into(),
            expression: expression.clone(),
            value_type,
            value: Value::Undef,
            dice: Vec::new(),
        }))
    }

    /// Store the value of the open roll record.
    pub fn close_roll(&mut self, value: Value) {
        if let Some(OutputRecord::Roll(mut record)) = self.open.take() {
            tracing::debug!(name = %record.name, value = %value, "roll closed");
            record.value = value;
            self.records.push(OutputRecord::Roll(record));
        }
    }

    /// Start a sample record of `expression` evaluated as `value_type`.
    pub fn open_sample(
        &mut self,
        name: impl Into<String>,
        expression: &Expr,
        value_type: ValueType,
    ) -> EvalResult<()> {
        self.open_record(OutputRecord::Sample(SampleRecord {
            name: name.into(),
            expression: expression.clone(),
            value_type,
            distribution: Distribution::new(),
        }))
    }

    /// Store the distribution of the open sample record.
    pub fn close_sample(&mut self, distribution: Distribution) {
        if let Some(OutputRecord::Sample(mut record)) = self.open.take() {
            tracing::debug!(name = %record.name, total = distribution.total(), "sample closed");
            record.distribution = distribution;
            self.records.push(OutputRecord::Sample(record));
        }
    }

    /// Drop the open record, if any, without storing it.
    pub fn abort_record(&mut self) {
        if let Some(record) = self.open.take() {
            tracing::debug!(name = record.name(), "output aborted");
        }
    }

    /// All records in evaluation order.
    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    pub fn roll_records(&self) -> impl Iterator<Item = &RollRecord> {
        self.records.iter().filter_map(OutputRecord::as_roll)
    }

    pub fn sample_records(&self) -> impl Iterator<Item = &SampleRecord> {
        self.records.iter().filter_map(OutputRecord::as_sample)
    }

    /// Whether a record of `mode` was produced.
    pub fn has_record(&self, mode: OutputMode) -> bool {
        self.records.iter().any(|r| r.mode() == mode)
    }

    /// Forget every record and the dice log.
    pub fn clear_records(&mut self) {
        self.records.clear();
        self.dice_log.clear();
        self.open = None;
    }

    /// Align all sample records on the union of their values.
    ///
    /// Every distribution receives a zero entry for the values it never
    /// produced, then each value yields one row mapping record names to the
    /// selected statistic.
    pub fn get_multi_counts(&mut self, selector: CountSelector) -> Vec<MultiCount> {
        let values: BTreeSet<Value> = self
            .sample_records()
            .flat_map(|r| r.distribution.values())
            .collect();
        for record in self.records.iter_mut() {
            if let OutputRecord::Sample(sample) = record {
                for value in &values {
                    sample.distribution.ensure_count(value);
                }
            }
        }
        values
            .into_iter()
            .map(|value| {
                let counts: IndexMap<String, f64> = self
                    .sample_records()
                    .map(|r| {
                        let n = r
                            .distribution
                            .count(&value)
                            .map_or(0.0, |c| selector.get(&c));
                        (r.name.clone(), n)
                    })
                    .collect();
                MultiCount { value, counts }
            })
            .collect()
    }
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

impl fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("seed", &self.seed)
            .field("config", &self.config)
            .field("global", &self.global)
            .field("records", &self.records.len())
            .field("dice_log", &self.dice_log.len())
            .finish()
    }
}
