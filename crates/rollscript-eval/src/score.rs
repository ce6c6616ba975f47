//! Summary scores over a distribution.

use crate::context::EvaluationContext;
use crate::distribution::Distribution;
use crate::error::EvalResult;
use crate::scope::Scope;
use crate::value::Value;
use rollscript_types::ParseNameError;
use std::fmt;
use std::str::FromStr;

/// A statistic computed from a [`Distribution`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistributionScore {
    Mean,
    StdDev,
    Mode,
    /// Upper median.
    Median,
    /// Lower median.
    LowMedian,
    /// Bounds leaving `risk / 2` of the observations on each side.
    ConfidenceInterval { risk: f64 },
}

/// Result of a score.
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreValue {
    Number(f64),
    Value(Value),
    Interval(Value, Value),
    /// The distribution is empty.
    Missing,
}

impl DistributionScore {
    /// Scores with a fixed name, in display order.
    pub const STANDARD: [DistributionScore; 5] = [
        DistributionScore::Mean,
        DistributionScore::StdDev,
        DistributionScore::Mode,
        DistributionScore::Median,
        DistributionScore::LowMedian,
    ];

    pub fn name(&self) -> String {
        match self {
            DistributionScore::Mean => "mean".to_string(),
            DistributionScore::StdDev => "stddev".to_string(),
            DistributionScore::Mode => "mode".to_string(),
            DistributionScore::Median => "median".to_string(),
            DistributionScore::LowMedian => "lowmedian".to_string(),
            DistributionScore::ConfidenceInterval { risk } => format!("risk={risk:.2}"),
        }
    }

    /// Compute the score. Integer coercions of the values may call
    /// functions, hence the context and scope.
    pub fn get(
        &self,
        ctx: &mut EvaluationContext,
        scope: &Scope,
        distribution: &Distribution,
    ) -> EvalResult<ScoreValue> {
        let value = |v: Option<Value>| v.map_or(ScoreValue::Missing, ScoreValue::Value);
        Ok(match self {
            DistributionScore::Mean => ScoreValue::Number(distribution.mean(ctx, scope)?),
            DistributionScore::StdDev => ScoreValue::Number(distribution.stddev(ctx, scope)?),
            DistributionScore::Mode => value(distribution.mode()),
            DistributionScore::Median => value(distribution.median_sup()),
            DistributionScore::LowMedian => value(distribution.median_inf()),
            DistributionScore::ConfidenceInterval { risk } => distribution
                .confidence_interval(*risk)
                .map_or(ScoreValue::Missing, |(lo, hi)| ScoreValue::Interval(lo, hi)),
        })
    }

    /// The score as text, numbers with `precision` decimals.
    pub fn format(
        &self,
        ctx: &mut EvaluationContext,
        scope: &Scope,
        distribution: &Distribution,
        precision: usize,
    ) -> EvalResult<String> {
        Ok(match self.get(ctx, scope, distribution)? {
            ScoreValue::Number(n) => format!("{n:.precision$}"),
            ScoreValue::Value(v) => v.to_string(),
            ScoreValue::Interval(lo, hi) => format!("{lo} - {hi}"),
            ScoreValue::Missing => String::new(),
        })
    }
}

impl fmt::Display for DistributionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for DistributionScore {
    type Err = ParseNameError;

    /// Standard names, or `risk=R` for a confidence interval.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(risk) = s.strip_prefix("risk=") {
            return risk
                .parse::<f64>()
                .ok()
                .filter(|r| (0.0..=1.0).contains(r))
                .map(|risk| DistributionScore::ConfidenceInterval { risk })
                .ok_or_else(|| ParseNameError::new("score", s));
        }
        DistributionScore::STANDARD
            .into_iter()
            .find(|score| score.name() == s)
            .ok_or_else(|| ParseNameError::new("score", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvalConfig;

    fn fixture() -> Distribution {
        let mut d = Distribution::new();
        for v in [1, 2, 3, 3] {
            d.incr(&Value::Integer(v));
        }
        d
    }

    #[test]
    fn test_scores() {
        let mut ctx = EvaluationContext::new(EvalConfig::default(), Some(1));
        let scope = ctx.global_scope().clone();
        let d = fixture();
        assert_eq!(
            DistributionScore::Mean.get(&mut ctx, &scope, &d).unwrap(),
            ScoreValue::Number(2.25)
        );
        assert_eq!(
            DistributionScore::Mode.get(&mut ctx, &scope, &d).unwrap(),
            ScoreValue::Value(Value::Integer(3))
        );
        assert_eq!(
            DistributionScore::LowMedian.format(&mut ctx, &scope, &d, 2).unwrap(),
            "3"
        );
        assert_eq!(
            DistributionScore::Mean.format(&mut ctx, &scope, &d, 2).unwrap(),
            "2.25"
        );
    }

    #[test]
    fn test_stddev_weights_before_squaring() {
        let mut ctx = EvaluationContext::new(EvalConfig::default(), Some(1));
        let scope = ctx.global_scope().clone();
        let mut d = Distribution::new();
        d.incr(&Value::Integer(0));
        d.incr(&Value::Integer(2));
        // mean 1; ((0-1)*0.5)^2 + ((2-1)*0.5)^2 = 0.5
        let sd = d.stddev(&mut ctx, &scope).unwrap();
        assert!((sd - 0.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_score_names() {
        for score in DistributionScore::STANDARD {
            assert_eq!(score.name().parse::<DistributionScore>(), Ok(score));
        }
        assert_eq!(
            "risk=0.05".parse::<DistributionScore>(),
            Ok(DistributionScore::ConfidenceInterval { risk: 0.05 })
        );
        assert!("risk=2".parse::<DistributionScore>().is_err());
        assert!("average".parse::<DistributionScore>().is_err());
    }
}
