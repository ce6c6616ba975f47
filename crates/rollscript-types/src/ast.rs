//! Expression tree for the rollscript dice language.
//!
//! Every node carries a [`Location`] for diagnostics.
//! Recursive children are boxed; lambda bodies are reference counted since
//! every closure created from a lambda shares its body.
//! Maps and named arguments keep source order ([`IndexMap`]).

use crate::{Location, ParseNameError, ValueType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Name of the item variable of a `for` loop when none is given.
pub const DEFAULT_ITEM_VARIABLE: &str = "_";

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

/// An expression node with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: Location,
}

/// All expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // ── Literals ──
    /// `undef`
    Undef,
    /// `true` / `false`
    Boolean(bool),
    /// `42`
    Integer(i64),
    /// `"text"` (no interpolation)
    String(String),
    /// `"roll ${x}"`
    Interpolation(Vec<StringPart>),

    // ── Constructors ──
    /// `[a, b, c]`
    List(Vec<Expr>),
    /// `{ a: 1, b: 2 }`
    Map(IndexMap<String, Expr>),
    /// `fun (a, b: 10) { body }`
    Lambda(Box<Lambda>),

    // ── Variables & Calls ──
    /// `name`
    Variable(String),
    /// `f(a, b, name: c)`
    Call {
        function: Box<Expr>,
        positional: Vec<Expr>,
        named: IndexMap<String, Expr>,
    },

    // ── Operators ──
    /// `a + b`, `a * b`, ...
    Arithmetic {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `-x`, `+x`
    Sign { op: SignOp, operand: Box<Expr> },
    /// `a == b`, `a === b`, ...
    Comparison {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a and b and c`
    And(Vec<Expr>),
    /// `a or b or c`
    Or(Vec<Expr>),
    /// `not x`
    Not(Box<Expr>),
    /// `boolean x`, `integer x`, `list x`, ...
    Convert { target: ValueType, expr: Box<Expr> },

    // ── Control Flow ──
    /// `if c then a else b`
    Conditional {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// `a; b; c`
    Sequence(Vec<Expr>),
    /// `out for i, x in container if condition`
    ForLoop(Box<ForLoop>),
    /// `repeat x while c limit n`, `while c repeat x`
    Repeat(Box<Repeat>),

    // ── Containers ──
    /// `count x`
    Count(Box<Expr>),
    /// `draw from x`
    Draw(Box<Expr>),
    /// `draw n from x`
    DrawMultiple { n: Box<Expr>, container: Box<Expr> },
    /// `a .. b`
    Range { start: Box<Expr>, end: Box<Expr> },
    /// `x in container`
    IndexOf {
        element: Box<Expr>,
        container: Box<Expr>,
    },
    /// `container[subscript]`, `container.name`
    Subscript {
        container: Box<Expr>,
        subscript: Box<Expr>,
    },
    /// `sorted x`, `reversed x`, `shuffled x`
    Reorder { op: ReorderOp, list: Box<Expr> },

    // ── Dice ──
    /// `dX`
    Die(Box<Expr>),
    /// `NdX`
    Dice { n: Box<Expr>, dice_type: Box<Expr> },
    /// `highest of x`
    Best { op: BestOp, expr: Box<Expr> },
    /// `highest 3 of x`
    BestMultiple {
        op: BestOp,
        n: Box<Expr>,
        expr: Box<Expr>,
    },

    // ── Mutation ──
    /// `target = value`
    Assign { target: Box<Expr>, value: Box<Expr> },
    /// `target << source`
    Append { target: Box<Expr>, source: Box<Expr> },

    // ── Environment ──
    /// `import alias = "address"`
    Import(Box<Import>),
    /// `local`, `outer`, `global`
    ScopeVariables(ScopeKind),

    // ── Output ──
    /// `roll x`, `sample x integer "name"`
    Output(Box<Output>),
}

/// A part of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Literal(String),
    Expr(Expr),
}

/// `fun (positional..., named: default...) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    pub positional: Vec<String>,
    pub named: IndexMap<String, Expr>,
    pub body: Rc<Expr>,
}

/// `out for index, item in container if condition`
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub out: Expr,
    pub index: Option<String>,
    pub item: String,
    pub container: Expr,
    pub condition: Expr,
}

/// Bounded repetition collecting the value of each iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct Repeat {
    pub mode: RepeatMode,
    pub expr: Expr,
    pub condition: Expr,
    /// `None` means unlimited (still capped by the context's reroll ceiling).
    pub limit: Option<i64>,
}

/// `import alias = "address" (names...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub address: String,
    pub alias: Option<String>,
    pub names: Option<Vec<String>>,
}

/// `roll expr type name`
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub mode: OutputMode,
    pub expr: Expr,
    pub value_type: ValueType,
    pub name: Option<Expr>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators
// ══════════════════════════════════════════════════════════════════════════════

/// Integer arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

/// Unary sign operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignOp {
    Plus,
    Minus,
}

impl SignOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignOp::Plus => "+",
            SignOp::Minus => "-",
        }
    }
}

/// Comparison operators.
///
/// `Eq`..`Ge` compare integer coercions; `Same`/`NotSame` compare natural
/// values structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Same,
    NotSame,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::Same => "===",
            CompareOp::NotSame => "!==",
        }
    }

    /// Whether operands are compared as integers.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, CompareOp::Same | CompareOp::NotSame)
    }
}

/// Best-of selection operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BestOp {
    Highest,
    Lowest,
    First,
    Last,
}

impl BestOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BestOp::Highest => "highest",
            BestOp::Lowest => "lowest",
            BestOp::First => "first",
            BestOp::Last => "last",
        }
    }
}

/// List reordering operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReorderOp {
    Sorted,
    Reversed,
    Shuffled,
}

impl ReorderOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReorderOp::Sorted => "sorted",
            ReorderOp::Reversed => "reversed",
            ReorderOp::Shuffled => "shuffled",
        }
    }
}

/// Which scope's variable table a `local`/`outer`/`global` expression exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    Local,
    Outer,
    Global,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Local => "local",
            ScopeKind::Outer => "outer",
            ScopeKind::Global => "global",
        }
    }
}

/// Where the loop condition of a [`Repeat`] is tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Body first, then condition: at least one iteration.
    DoWhile,
    /// Condition first: possibly zero iterations.
    WhileDo,
}

/// How an output declaration records its expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Default,
    Roll,
    Sample,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Default => "default",
            OutputMode::Roll => "roll",
            OutputMode::Sample => "sample",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(OutputMode::Default),
            "roll" => Ok(OutputMode::Roll),
            "sample" => Ok(OutputMode::Sample),
            _ => Err(ParseNameError::new("output mode", s)),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Construction
// ══════════════════════════════════════════════════════════════════════════════

impl Expr {
    pub fn new(kind: ExprKind, location: Location) -> Self {
        Self { kind, location }
    }

    /// A node without source location.
    pub fn synthetic(kind: ExprKind) -> Self {
        Self::new(kind, Location::NONE)
    }

    pub fn undef() -> Self {
        Self::synthetic(ExprKind::Undef)
    }

    pub fn boolean(value: bool) -> Self {
        Self::synthetic(ExprKind::Boolean(value))
    }

    pub fn integer(value: i64) -> Self {
        Self::synthetic(ExprKind::Integer(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::synthetic(ExprKind::String(value.into()))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::synthetic(ExprKind::Variable(name.into()))
    }

    pub fn list(items: Vec<Expr>) -> Self {
        Self::synthetic(ExprKind::List(items))
    }

    pub fn map(entries: Vec<(&str, Expr)>) -> Self {
        Self::synthetic(ExprKind::Map(named_entries(entries)))
    }

    pub fn lambda(positional: Vec<&str>, named: Vec<(&str, Expr)>, body: Expr) -> Self {
        Self::synthetic(ExprKind::Lambda(Box::new(Lambda {
            positional: positional.into_iter().map(String::from).collect(),
            named: named_entries(named),
            body: Rc::new(body),
        })))
    }

    pub fn call(function: Expr, positional: Vec<Expr>, named: Vec<(&str, Expr)>) -> Self {
        Self::synthetic(ExprKind::Call {
            function: Box::new(function),
            positional,
            named: named_entries(named),
        })
    }

    pub fn arithmetic(op: ArithOp, left: Expr, right: Expr) -> Self {
        Self::synthetic(ExprKind::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Self::synthetic(ExprKind::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn convert(target: ValueType, expr: Expr) -> Self {
        Self::synthetic(ExprKind::Convert {
            target,
            expr: Box::new(expr),
        })
    }

    pub fn die(dice_type: Expr) -> Self {
        Self::synthetic(ExprKind::Die(Box::new(dice_type)))
    }

    pub fn dice(n: Expr, dice_type: Expr) -> Self {
        Self::synthetic(ExprKind::Dice {
            n: Box::new(n),
            dice_type: Box::new(dice_type),
        })
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::synthetic(ExprKind::Assign {
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    pub fn subscript(container: Expr, subscript: Expr) -> Self {
        Self::synthetic(ExprKind::Subscript {
            container: Box::new(container),
            subscript: Box::new(subscript),
        })
    }

    pub fn sequence(items: Vec<Expr>) -> Self {
        Self::synthetic(ExprKind::Sequence(items))
    }

    pub fn output(mode: OutputMode, expr: Expr, value_type: ValueType, name: Option<Expr>) -> Self {
        Self::synthetic(ExprKind::Output(Box::new(Output {
            mode,
            expr,
            value_type,
            name,
        })))
    }

    /// Replace the location, keeping the node.
    pub fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    // ── Static properties ────────────────────────────────────────────────

    /// The type this expression produces before any requested coercion.
    pub fn natural_type(&self) -> ValueType {
        match &self.kind {
            ExprKind::Undef | ExprKind::Import(_) => ValueType::Undef,
            ExprKind::Boolean(_)
            | ExprKind::Comparison { .. }
            | ExprKind::And(_)
            | ExprKind::Or(_)
            | ExprKind::Not(_) => ValueType::Boolean,
            ExprKind::Integer(_)
            | ExprKind::Arithmetic { .. }
            | ExprKind::Sign { .. }
            | ExprKind::Count(_) => ValueType::Integer,
            ExprKind::String(_) | ExprKind::Interpolation(_) => ValueType::String,
            ExprKind::List(_)
            | ExprKind::DrawMultiple { .. }
            | ExprKind::Range { .. }
            | ExprKind::Reorder { .. }
            | ExprKind::Dice { .. }
            | ExprKind::BestMultiple { .. }
            | ExprKind::Repeat(_) => ValueType::List,
            ExprKind::Map(_) | ExprKind::ScopeVariables(_) => ValueType::Map,
            ExprKind::Lambda(_) => ValueType::Function,
            ExprKind::Convert { target, .. } => *target,
            ExprKind::Variable(_)
            | ExprKind::Call { .. }
            | ExprKind::Conditional { .. }
            | ExprKind::Sequence(_)
            | ExprKind::ForLoop(_)
            | ExprKind::Draw(_)
            | ExprKind::IndexOf { .. }
            | ExprKind::Subscript { .. }
            | ExprKind::Die(_)
            | ExprKind::Best { .. }
            | ExprKind::Assign { .. }
            | ExprKind::Append { .. }
            | ExprKind::Output(_) => ValueType::Any,
        }
    }

    /// Whether this expression may appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        match &self.kind {
            ExprKind::Variable(_) | ExprKind::Subscript { .. } => true,
            ExprKind::List(items) => items.iter().all(Expr::is_assignable),
            ExprKind::Map(entries) => entries.values().all(Expr::is_assignable),
            _ => false,
        }
    }

    // ── Traversal ────────────────────────────────────────────────────────

    /// Rebuild this node with every direct child expression replaced by
    /// `f(child)`. Leaves are cloned; the location is kept.
    pub fn try_map_children<E, F>(&self, f: &mut F) -> Result<Expr, E>
    where
        F: FnMut(&Expr) -> Result<Expr, E>,
    {
        use ExprKind as K;
        let kind = match &self.kind {
            K::Undef
            | K::Boolean(_)
            | K::Integer(_)
            | K::String(_)
            | K::Variable(_)
            | K::Import(_)
            | K::ScopeVariables(_) => self.kind.clone(),
            K::Interpolation(parts) => K::Interpolation(
                parts
                    .iter()
                    .map(|part| match part {
                        StringPart::Literal(s) => Ok(StringPart::Literal(s.clone())),
                        StringPart::Expr(e) => f(e).map(StringPart::Expr),
                    })
                    .collect::<Result<_, E>>()?,
            ),
            K::List(items) => K::List(map_all(items, f)?),
            K::Map(entries) => K::Map(map_entries(entries, f)?),
            K::Lambda(lambda) => K::Lambda(Box::new(Lambda {
                positional: lambda.positional.clone(),
                named: map_entries(&lambda.named, f)?,
                body: Rc::new(f(&lambda.body)?),
            })),
            K::Call {
                function,
                positional,
                named,
            } => K::Call {
                function: map_box(function, f)?,
                positional: map_all(positional, f)?,
                named: map_entries(named, f)?,
            },
            K::Arithmetic { op, left, right } => K::Arithmetic {
                op: *op,
                left: map_box(left, f)?,
                right: map_box(right, f)?,
            },
            K::Sign { op, operand } => K::Sign {
                op: *op,
                operand: map_box(operand, f)?,
            },
            K::Comparison { op, left, right } => K::Comparison {
                op: *op,
                left: map_box(left, f)?,
                right: map_box(right, f)?,
            },
            K::And(operands) => K::And(map_all(operands, f)?),
            K::Or(operands) => K::Or(map_all(operands, f)?),
            K::Not(operand) => K::Not(map_box(operand, f)?),
            K::Convert { target, expr } => K::Convert {
                target: *target,
                expr: map_box(expr, f)?,
            },
            K::Conditional {
                condition,
                then_branch,
                else_branch,
            } => K::Conditional {
                condition: map_box(condition, f)?,
                then_branch: map_box(then_branch, f)?,
                else_branch: map_box(else_branch, f)?,
            },
            K::Sequence(items) => K::Sequence(map_all(items, f)?),
            K::ForLoop(fl) => K::ForLoop(Box::new(ForLoop {
                out: f(&fl.out)?,
                index: fl.index.clone(),
                item: fl.item.clone(),
                container: f(&fl.container)?,
                condition: f(&fl.condition)?,
            })),
            K::Repeat(r) => K::Repeat(Box::new(Repeat {
                mode: r.mode,
                expr: f(&r.expr)?,
                condition: f(&r.condition)?,
                limit: r.limit,
            })),
            K::Count(e) => K::Count(map_box(e, f)?),
            K::Draw(e) => K::Draw(map_box(e, f)?),
            K::DrawMultiple { n, container } => K::DrawMultiple {
                n: map_box(n, f)?,
                container: map_box(container, f)?,
            },
            K::Range { start, end } => K::Range {
                start: map_box(start, f)?,
                end: map_box(end, f)?,
            },
            K::IndexOf { element, container } => K::IndexOf {
                element: map_box(element, f)?,
                container: map_box(container, f)?,
            },
            K::Subscript {
                container,
                subscript,
            } => K::Subscript {
                container: map_box(container, f)?,
                subscript: map_box(subscript, f)?,
            },
            K::Reorder { op, list } => K::Reorder {
                op: *op,
                list: map_box(list, f)?,
            },
            K::Die(e) => K::Die(map_box(e, f)?),
            K::Dice { n, dice_type } => K::Dice {
                n: map_box(n, f)?,
                dice_type: map_box(dice_type, f)?,
            },
            K::Best { op, expr } => K::Best {
                op: *op,
                expr: map_box(expr, f)?,
            },
            K::BestMultiple { op, n, expr } => K::BestMultiple {
                op: *op,
                n: map_box(n, f)?,
                expr: map_box(expr, f)?,
            },
            K::Assign { target, value } => K::Assign {
                target: map_box(target, f)?,
                value: map_box(value, f)?,
            },
            K::Append { target, source } => K::Append {
                target: map_box(target, f)?,
                source: map_box(source, f)?,
            },
            K::Output(out) => K::Output(Box::new(Output {
                mode: out.mode,
                expr: f(&out.expr)?,
                value_type: out.value_type,
                name: out.name.as_ref().map(|n| f(n)).transpose()?,
            })),
        };
        Ok(Expr::new(kind, self.location.clone()))
    }
}

fn map_box<E, F>(expr: &Expr, f: &mut F) -> Result<Box<Expr>, E>
where
    F: FnMut(&Expr) -> Result<Expr, E>,
{
    f(expr).map(Box::new)
}

fn map_all<E, F>(items: &[Expr], f: &mut F) -> Result<Vec<Expr>, E>
where
    F: FnMut(&Expr) -> Result<Expr, E>,
{
    items.iter().map(|e| f(e)).collect()
}

fn map_entries<E, F>(
    entries: &IndexMap<String, Expr>,
    f: &mut F,
) -> Result<IndexMap<String, Expr>, E>
where
    F: FnMut(&Expr) -> Result<Expr, E>,
{
    entries
        .iter()
        .map(|(k, e)| Ok((k.clone(), f(e)?)))
        .collect()
}

fn named_entries(entries: Vec<(&str, Expr)>) -> IndexMap<String, Expr> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
