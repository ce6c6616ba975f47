//! Run driver: evaluate a list of top-level expressions in one context.

use crate::config::EvalConfig;
use crate::context::EvaluationContext;
use crate::distribution::{CountSelector, MultiCount};
use crate::error::EvalResult;
use crate::import::ImportResolver;
use crate::records::{DiceRecord, OutputRecord};
use crate::reduce::reduce_all;
use crate::value::{Value, ValueMap};
use rollscript_types::ast::{Expr, ExprKind, Import, OutputMode};
use rollscript_types::ValueType;
use serde::{Deserialize, Serialize};

/// An import evaluated in the global scope before the expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreloadedImport {
    pub address: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub names: Option<Vec<String>>,
}

impl PreloadedImport {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            alias: None,
            names: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    fn to_expr(&self) -> Expr {
        Expr::synthetic(ExprKind::Import(Box::new(Import {
            address: self.address.clone(),
            alias: self.alias.clone(),
            names: self.names.clone(),
        })))
    }
}

/// Driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub default_output_mode: OutputMode,
    pub default_type: ValueType,
    pub sample_size: u32,
    /// Reduce every expression before evaluating it.
    pub reduce: bool,
    pub count_selector: CountSelector,
    /// Wrap the last expression in an output when none of the configured
    /// mode was produced.
    pub force_output: bool,
    /// `None` seeds from the wall clock.
    pub seed: Option<u64>,
    pub imports: Vec<PreloadedImport>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            default_output_mode: OutputMode::Sample,
            default_type: ValueType::Integer,
            sample_size: 30000,
            reduce: false,
            count_selector: CountSelector::AtLeast,
            force_output: true,
            seed: None,
            imports: Vec::new(),
        }
    }
}

impl RunOptions {
    fn output_mode(&self) -> OutputMode {
        match self.default_output_mode {
            OutputMode::Default => OutputMode::Roll,
            mode => mode,
        }
    }

    fn config(&self) -> EvalConfig {
        EvalConfig {
            sample_size: self.sample_size,
            default_type: self.default_type,
            default_output_mode: self.output_mode(),
            ..EvalConfig::default()
        }
    }
}

/// What a run leaves behind.
#[derive(Debug)]
pub struct RunResult {
    /// Value of the last expression.
    pub value: Value,
    pub context: EvaluationContext,
    /// Sample records aligned on the union of their values.
    pub multi_counts: Vec<MultiCount>,
}

impl RunResult {
    pub fn records(&self) -> &[OutputRecord] {
        self.context.records()
    }

    pub fn dice_log(&self) -> &[DiceRecord] {
        self.context.dice_log()
    }

    /// The global variable table.
    pub fn globals(&self) -> ValueMap {
        self.context.global_scope().variables()
    }
}

/// Evaluate `expressions` in order in a fresh context.
///
/// All but the last are evaluated as statements. When `force_output` is
/// set and no record of the configured mode exists afterwards, the last
/// expression is wrapped in an output and evaluated again, after clearing
/// the records; the global scope keeps the bindings of the first pass.
pub fn run(
    expressions: &[Expr],
    options: &RunOptions,
    resolver: impl ImportResolver + 'static,
) -> EvalResult<RunResult> {
    let mut ctx = EvaluationContext::new(options.config(), options.seed).with_imports(resolver);
    let scope = ctx.global_scope().clone();
    tracing::debug!(seed = ctx.seed(), expressions = expressions.len(), "run started");

    for import in &options.imports {
        ctx.evaluate_statement(&import.to_expr(), &scope)?;
    }

    let reduced;
    let expressions = if options.reduce {
        reduced = reduce_all(expressions)?;
        &reduced[..]
    } else {
        expressions
    };

    let mut value = Value::Undef;
    if let Some((last, init)) = expressions.split_last() {
        for expr in init {
            ctx.evaluate_statement(expr, &scope)?;
        }
        value = ctx.evaluate(last, &scope)?;

        let mode = options.output_mode();
        if options.force_output && !ctx.has_record(mode) {
            tracing::debug!(%mode, "forcing output on last expression");
            let forced = Expr::output(mode, last.clone(), options.default_type, None)
                .at(last.location.clone());
            ctx.clear_records();
            value = ctx.evaluate(&forced, &scope)?;
        }
    }

    let multi_counts = ctx.get_multi_counts(options.count_selector);
    tracing::debug!(records = ctx.records().len(), "run finished");
    Ok(RunResult {
        value,
        context: ctx,
        multi_counts,
    })
}
