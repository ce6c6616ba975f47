//! Canonical source text for expression trees.
//!
//! Rendering inserts the minimal parentheses required by operator
//! precedence. It is used to name outputs that carry no explicit name and
//! to describe nodes in evaluation traces.

use crate::ast::*;
use std::fmt;

/// Binding strength of operators, weakest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    Sequence,
    Output,
    Assign,
    Control,
    Or,
    And,
    Not,
    Comparison,
    IndexOf,
    Append,
    Range,
    Plus,
    Mult,
    Sign,
    Best,
    Draw,
    Dice,
    Unary,
    Subscript,
    Atom,
}

impl Precedence {
    /// The next tighter level (saturating at `Atom`).
    fn tighter(self) -> Precedence {
        use Precedence::*;
        match self {
            Sequence => Output,
            Output => Assign,
            Assign => Control,
            Control => Or,
            Or => And,
            And => Not,
            Not => Comparison,
            Comparison => IndexOf,
            IndexOf => Append,
            Append => Range,
            Range => Plus,
            Plus => Mult,
            Mult => Sign,
            Sign => Best,
            Best => Draw,
            Draw => Dice,
            Dice => Unary,
            Unary => Subscript,
            Subscript | Atom => Atom,
        }
    }
}

impl Expr {
    /// Precedence of the operator at the root of this expression.
    pub fn precedence(&self) -> Precedence {
        match &self.kind {
            ExprKind::Sequence(_) => Precedence::Sequence,
            ExprKind::Output(_) => Precedence::Output,
            ExprKind::Assign { .. } => Precedence::Assign,
            ExprKind::Conditional { .. } | ExprKind::ForLoop(_) | ExprKind::Repeat(_) => {
                Precedence::Control
            }
            ExprKind::Or(_) => Precedence::Or,
            ExprKind::And(_) => Precedence::And,
            ExprKind::Not(_) => Precedence::Not,
            ExprKind::Comparison { .. } => Precedence::Comparison,
            ExprKind::IndexOf { .. } => Precedence::IndexOf,
            ExprKind::Append { .. } => Precedence::Append,
            ExprKind::Range { .. } => Precedence::Range,
            ExprKind::Arithmetic { op, .. } => match op {
                ArithOp::Add | ArithOp::Sub => Precedence::Plus,
                ArithOp::Mul | ArithOp::Div | ArithOp::Mod => Precedence::Mult,
            },
            ExprKind::Sign { .. } => Precedence::Sign,
            ExprKind::Best { .. } | ExprKind::BestMultiple { .. } => Precedence::Best,
            ExprKind::Draw(_) | ExprKind::DrawMultiple { .. } => Precedence::Draw,
            ExprKind::Die(_) | ExprKind::Dice { .. } => Precedence::Dice,
            ExprKind::Convert { .. } | ExprKind::Count(_) | ExprKind::Reorder { .. } => {
                Precedence::Unary
            }
            ExprKind::Call { .. } | ExprKind::Subscript { .. } => Precedence::Subscript,
            ExprKind::Undef
            | ExprKind::Boolean(_)
            | ExprKind::Integer(_)
            | ExprKind::String(_)
            | ExprKind::Interpolation(_)
            | ExprKind::List(_)
            | ExprKind::Map(_)
            | ExprKind::Lambda(_)
            | ExprKind::Variable(_)
            | ExprKind::Import(_)
            | ExprKind::ScopeVariables(_) => Precedence::Atom,
        }
    }

    /// Render this expression as source text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        write_expr(&mut out, self, Precedence::Sequence);
        out
    }

    fn space_as_dice_number(&self) -> bool {
        match &self.kind {
            ExprKind::Integer(_) => false,
            ExprKind::Variable(name) => !(name.chars().count() == 1 && is_capitalized(name)),
            _ => self.precedence() >= Precedence::Unary,
        }
    }

    fn space_as_dice_type(&self) -> bool {
        match &self.kind {
            ExprKind::Integer(_) => false,
            ExprKind::Variable(name) => !is_capitalized(name),
            _ => self.precedence() >= Precedence::Unary,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn is_capitalized(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

// ══════════════════════════════════════════════════════════════════════════════
// Writers
// ══════════════════════════════════════════════════════════════════════════════

fn write_expr(out: &mut String, expr: &Expr, prec: Precedence) {
    if prec > expr.precedence() {
        out.push('(');
        write_bare(out, expr);
        out.push(')');
    } else {
        write_bare(out, expr);
    }
}

fn write_bare(out: &mut String, expr: &Expr) {
    match &expr.kind {
        ExprKind::Undef => out.push_str("undef"),
        ExprKind::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        ExprKind::Integer(n) => out.push_str(&n.to_string()),
        ExprKind::String(s) => write_string(out, s),
        ExprKind::Interpolation(parts) => {
            out.push('"');
            for part in parts {
                match part {
                    StringPart::Literal(s) => escape_into(out, s, '"'),
                    StringPart::Expr(e) => {
                        out.push_str("${");
                        write_expr(out, e, Precedence::Sequence);
                        out.push('}');
                    }
                }
            }
            out.push('"');
        }

        // ── Constructors ──
        ExprKind::List(items) => {
            out.push('[');
            write_list(out, items);
            out.push(']');
        }
        ExprKind::Map(entries) => {
            if entries.is_empty() {
                out.push_str("{}");
            } else {
                out.push_str("{ ");
                write_entries(out, entries.iter());
                out.push_str(" }");
            }
        }
        ExprKind::Lambda(lambda) => {
            out.push_str("fun (");
            let mut first = true;
            for name in &lambda.positional {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                write_identifier(out, name);
            }
            for (name, default) in &lambda.named {
                if !first {
                    out.push_str(", ");
                }
                first = false;
                write_identifier(out, name);
                out.push_str(": ");
                write_expr(out, default, Precedence::Sequence);
            }
            out.push_str(") { ");
            write_expr(out, &lambda.body, Precedence::Sequence);
            out.push_str(" }");
        }

        // ── Variables & Calls ──
        ExprKind::Variable(name) => write_identifier(out, name),
        ExprKind::Call {
            function,
            positional,
            named,
        } => {
            write_expr(out, function, Precedence::Subscript);
            out.push('(');
            write_list(out, positional);
            if !positional.is_empty() && !named.is_empty() {
                out.push_str(", ");
            }
            write_entries(out, named.iter());
            out.push(')');
        }

        // ── Operators ──
        ExprKind::Arithmetic { op, left, right } => {
            let prec = expr.precedence();
            write_binary(out, left, op.as_str(), right, prec, prec.tighter());
        }
        ExprKind::Sign { op, operand } => {
            out.push_str(op.as_str());
            write_expr(out, operand, Precedence::Best);
        }
        ExprKind::Comparison { op, left, right } => {
            write_binary(out, left, op.as_str(), right, Precedence::IndexOf, Precedence::IndexOf);
        }
        ExprKind::And(operands) => write_nary(out, operands, " and ", Precedence::Not),
        ExprKind::Or(operands) => write_nary(out, operands, " or ", Precedence::And),
        ExprKind::Not(operand) => {
            out.push_str("not ");
            write_expr(out, operand, Precedence::Comparison);
        }
        ExprKind::Convert { target, expr } => {
            out.push_str(target.as_str());
            out.push(' ');
            write_expr(out, expr, Precedence::Subscript);
        }

        // ── Control Flow ──
        ExprKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            out.push_str("if ");
            write_expr(out, condition, Precedence::Or);
            out.push_str(" then ");
            write_expr(out, then_branch, Precedence::Or);
            out.push_str(" else ");
            write_expr(out, else_branch, Precedence::Or);
        }
        ExprKind::Sequence(items) => write_nary(out, items, "; ", Precedence::Output),
        ExprKind::ForLoop(l) => {
            if l.out.kind == ExprKind::Variable(l.item.clone()) {
                out.push_str("for ");
            } else {
                write_expr(out, &l.out, Precedence::Or);
                out.push_str(" for ");
            }
            if let Some(index) = &l.index {
                write_identifier(out, index);
                out.push_str(", ");
            }
            write_identifier(out, &l.item);
            out.push_str(" in ");
            write_expr(out, &l.container, Precedence::Or);
            if l.condition.kind != ExprKind::Boolean(true) {
                out.push_str(" if ");
                write_expr(out, &l.condition, Precedence::Or);
            }
        }
        ExprKind::Repeat(r) => {
            match r.mode {
                RepeatMode::WhileDo => {
                    out.push_str("while ");
                    write_expr(out, &r.condition, Precedence::Or);
                    out.push_str(" repeat ");
                    write_expr(out, &r.expr, Precedence::Or);
                }
                RepeatMode::DoWhile => {
                    out.push_str("repeat ");
                    write_expr(out, &r.expr, Precedence::Or);
                    out.push_str(if r.limit == Some(1) { " if " } else { " while " });
                    write_expr(out, &r.condition, Precedence::Or);
                }
            }
            if let Some(limit) = r.limit {
                if !(limit == 1 && r.mode == RepeatMode::DoWhile) {
                    out.push_str(" limit ");
                    out.push_str(&limit.to_string());
                }
            }
        }

        // ── Containers ──
        ExprKind::Count(container) => {
            out.push_str("count ");
            write_expr(out, container, Precedence::Subscript);
        }
        ExprKind::Draw(container) => {
            out.push_str("draw from ");
            write_expr(out, container, Precedence::Dice);
        }
        ExprKind::DrawMultiple { n, container } => {
            out.push_str("draw ");
            write_expr(out, n, Precedence::Assign);
            out.push_str(" from ");
            write_expr(out, container, Precedence::Dice);
        }
        ExprKind::Range { start, end } => {
            write_binary(out, start, "..", end, Precedence::Plus, Precedence::Plus);
        }
        ExprKind::IndexOf { element, container } => {
            write_binary(out, element, " in ", container, Precedence::Append, Precedence::Append);
        }
        ExprKind::Subscript {
            container,
            subscript,
        } => {
            write_expr(out, container, Precedence::Subscript);
            if let ExprKind::String(name) = &subscript.kind {
                out.push('.');
                write_identifier(out, name);
            } else {
                out.push('[');
                write_expr(out, subscript, Precedence::Sequence);
                out.push(']');
            }
        }
        ExprKind::Reorder { op, list } => {
            out.push_str(op.as_str());
            out.push(' ');
            write_expr(out, list, Precedence::Subscript);
        }

        // ── Dice ──
        ExprKind::Die(dice_type) => {
            out.push('d');
            if dice_type.space_as_dice_type() {
                out.push(' ');
            }
            write_expr(out, dice_type, Precedence::Unary);
        }
        ExprKind::Dice { n, dice_type } => {
            write_expr(out, n, Precedence::Unary);
            if n.space_as_dice_number() {
                out.push(' ');
            }
            out.push('d');
            if dice_type.space_as_dice_type() {
                out.push(' ');
            }
            write_expr(out, dice_type, Precedence::Unary);
        }
        ExprKind::Best { op, expr } => {
            out.push_str(op.as_str());
            out.push_str(" of ");
            write_expr(out, expr, Precedence::Draw);
        }
        ExprKind::BestMultiple { op, n, expr } => {
            out.push_str(op.as_str());
            out.push(' ');
            write_expr(out, n, Precedence::Assign);
            out.push_str(" of ");
            write_expr(out, expr, Precedence::Draw);
        }

        // ── Mutation ──
        ExprKind::Assign { target, value } => {
            write_binary(out, target, " = ", value, Precedence::Control, Precedence::Control);
        }
        ExprKind::Append { target, source } => {
            write_binary(out, target, " << ", source, Precedence::Range, Precedence::Range);
        }

        // ── Environment ──
        ExprKind::Import(import) => {
            out.push_str("import ");
            if let Some(alias) = &import.alias {
                write_identifier(out, alias);
                out.push_str(" = ");
            }
            write_string(out, &import.address);
            if let Some(names) = &import.names {
                out.push_str(" (");
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_identifier(out, name);
                }
                out.push(')');
            }
        }
        ExprKind::ScopeVariables(kind) => out.push_str(kind.as_str()),

        // ── Output ──
        ExprKind::Output(output) => {
            out.push_str(output.mode.as_str());
            out.push(' ');
            write_expr(out, &output.expr, Precedence::Assign);
            if output.value_type != crate::ValueType::Default {
                out.push(' ');
                out.push_str(output.value_type.as_str());
            }
            if let Some(name) = &output.name {
                out.push(' ');
                write_expr(out, name, Precedence::Atom);
            }
        }
    }
}

fn write_binary(
    out: &mut String,
    left: &Expr,
    op: &str,
    right: &Expr,
    left_prec: Precedence,
    right_prec: Precedence,
) {
    write_expr(out, left, left_prec);
    match op {
        ".." => out.push_str(op),
        _ if op.starts_with(' ') => out.push_str(op),
        _ => {
            out.push(' ');
            out.push_str(op);
            out.push(' ');
        }
    }
    write_expr(out, right, right_prec);
}

fn write_nary(out: &mut String, operands: &[Expr], sep: &str, prec: Precedence) {
    for (i, e) in operands.iter().enumerate() {
        if i > 0 {
            out.push_str(sep);
        }
        write_expr(out, e, prec);
    }
}

fn write_list(out: &mut String, items: &[Expr]) {
    write_nary(out, items, ", ", Precedence::Sequence);
}

fn write_entries<'a>(out: &mut String, entries: impl Iterator<Item = (&'a String, &'a Expr)>) {
    for (i, (name, value)) in entries.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_identifier(out, name);
        out.push_str(": ");
        write_expr(out, value, Precedence::Sequence);
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    escape_into(out, s, '"');
    out.push('"');
}

/// Write an identifier, quoting it when it is not a plain word.
fn write_identifier(out: &mut String, name: &str) {
    let mut chars = name.chars();
    let plain = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        out.push_str(name);
    } else {
        out.push('\'');
        escape_into(out, name, '\'');
        out.push('\'');
    }
}

fn escape_into(out: &mut String, s: &str, quote: char) {
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}
