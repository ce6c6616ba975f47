//! Integration tests for the rollscript evaluator.
//!
//! Tests key evaluator features:
//! - coercion matrix & determinism
//! - scopes, closures & argument binding
//! - loops, repeats, draws & subscripts
//! - mutation (assignment, append)
//! - imports
//! - error traces
//! - reduction & substitution

use indexmap::IndexMap;
use rollscript_eval::{
    reduce, substitute_variables, EvalConfig, EvalResult, EvaluationContext, MapImportResolver,
    Scope, Value,
};
use rollscript_types::ast::*;
use rollscript_types::ValueType;

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

fn context() -> (EvaluationContext, Scope) {
    let ctx = EvaluationContext::new(EvalConfig::default(), Some(42));
    let scope = ctx.global_scope().clone();
    (ctx, scope)
}

fn eval(expr: &Expr) -> Value {
    let (mut ctx, scope) = context();
    ctx.evaluate(expr, &scope).expect("evaluation failed")
}

fn eval_err(expr: &Expr) -> String {
    let (mut ctx, scope) = context();
    ctx.evaluate(expr, &scope)
        .expect_err("expected an evaluation error")
        .message
}

fn int(n: i64) -> Value {
    Value::Integer(n)
}

fn ints(ns: &[i64]) -> Value {
    Value::list(ns.iter().copied().map(Value::Integer).collect())
}

fn s(v: &str) -> Value {
    Value::string(v)
}

fn var(name: &str) -> Expr {
    Expr::variable(name)
}

fn int_list(ns: &[i64]) -> Expr {
    Expr::list(ns.iter().copied().map(Expr::integer).collect())
}

fn node(kind: ExprKind) -> Expr {
    Expr::synthetic(kind)
}

fn add(left: Expr, right: Expr) -> Expr {
    Expr::arithmetic(ArithOp::Add, left, right)
}

fn gt(left: Expr, right: Expr) -> Expr {
    Expr::compare(CompareOp::Gt, left, right)
}

fn for_loop(out: Expr, index: Option<&str>, item: &str, container: Expr, condition: Expr) -> Expr {
    node(ExprKind::ForLoop(Box::new(ForLoop {
        out,
        index: index.map(str::to_string),
        item: item.to_string(),
        container,
        condition,
    })))
}

fn repeat(mode: RepeatMode, expr: Expr, condition: Expr, limit: Option<i64>) -> Expr {
    node(ExprKind::Repeat(Box::new(Repeat {
        mode,
        expr,
        condition,
        limit,
    })))
}

fn import(address: &str, alias: Option<&str>, names: Option<&[&str]>) -> Expr {
    node(ExprKind::Import(Box::new(Import {
        address: address.to_string(),
        alias: alias.map(str::to_string),
        names: names.map(|ns| ns.iter().map(|n| n.to_string()).collect()),
    })))
}

// ══════════════════════════════════════════════════════════════════════════════
// Coercion
// ══════════════════════════════════════════════════════════════════════════════

fn coercion_matrix() -> EvalResult<Vec<Value>> {
    let (mut ctx, scope) = context();
    let samples = vec![
        Value::Undef,
        Value::Boolean(true),
        Value::Boolean(false),
        int(0),
        int(-7),
        s(""),
        s("12"),
        s("abc"),
        ints(&[]),
        ints(&[1, 2, 3]),
        Value::map_from([("a", int(1)), ("b", s("x"))]),
    ];
    let targets = [
        ValueType::Boolean,
        ValueType::Integer,
        ValueType::String,
        ValueType::List,
        ValueType::Map,
    ];
    let mut out = Vec::new();
    for value in &samples {
        for ty in targets {
            out.push(ctx.coerce(&scope, value.deep_copy(), ty)?);
        }
    }
    Ok(out)
}

#[test]
fn coercion_matrix_deterministic_100_iterations() {
    let reference = coercion_matrix().unwrap();
    for i in 0..100 {
        assert_eq!(
            coercion_matrix().unwrap(),
            reference,
            "coercion not deterministic at iteration {i}"
        );
    }
}

#[test]
fn coercion_integer() {
    let (mut ctx, scope) = context();
    assert_eq!(ctx.to_integer(&scope, &s("12")).unwrap(), 12);
    assert_eq!(ctx.to_integer(&scope, &s(" 12")).unwrap(), 0);
    assert_eq!(ctx.to_integer(&scope, &ints(&[1, 2, 3])).unwrap(), 6);
    assert_eq!(ctx.to_integer(&scope, &Value::Boolean(true)).unwrap(), 1);
    let m = Value::map_from([("a", int(2)), ("b", ints(&[3, 4]))]);
    assert_eq!(ctx.to_integer(&scope, &m).unwrap(), 9);
}

#[test]
fn coercion_string_and_containers() {
    let (mut ctx, scope) = context();
    let mixed = Value::list(vec![int(1), s("a"), Value::Boolean(true), Value::Boolean(false)]);
    assert_eq!(ctx.to_string(&scope, &mixed).unwrap(), "1atrue");
    assert_eq!(ctx.to_list(&scope, &int(3)).unwrap().borrow().clone(), vec![int(3)]);
    assert!(ctx.to_list(&scope, &Value::Undef).unwrap().borrow().is_empty());
    let keyed = ctx.to_map(&scope, &ints(&[7, 8])).unwrap();
    assert_eq!(keyed.borrow().get("1"), Some(&int(8)));
    let single = ctx.to_map(&scope, &int(5)).unwrap();
    assert_eq!(single.borrow().get("_"), Some(&int(5)));
}

#[test]
fn coercion_scalar_round_trip_through_list() {
    let (mut ctx, scope) = context();
    for value in [Value::Boolean(false), Value::Boolean(true), int(-3), s("orc")] {
        let list = ctx.to_list(&scope, &value).unwrap();
        let items = list.borrow().clone();
        assert_eq!(items, vec![value.clone()]);
        let unwrapped = ctx.coerce(&scope, items[0].clone(), value.value_type()).unwrap();
        assert_eq!(unwrapped, value);
    }
    assert!(ctx.to_list(&scope, &Value::Undef).unwrap().borrow().is_empty());
    assert!(ctx.to_map(&scope, &Value::Undef).unwrap().borrow().is_empty());
    assert_eq!(ctx.to_integer(&scope, &ints(&[-3])).unwrap(), -3);
}

#[test]
fn coercion_calls_nullary_functions() {
    let f = Expr::lambda(vec![], vec![], Expr::integer(3));
    assert_eq!(eval(&Expr::convert(ValueType::Integer, f)), int(3));

    let g = Expr::lambda(vec!["x"], vec![], var("x"));
    assert_eq!(eval(&Expr::convert(ValueType::Boolean, g)), Value::Boolean(false));
}

#[test]
fn coercion_list_keeps_identity() {
    let (mut ctx, scope) = context();
    let list = ints(&[1]);
    let Value::List(original) = &list else { unreachable!() };
    let converted = ctx.to_list(&scope, &list).unwrap();
    assert!(std::rc::Rc::ptr_eq(original, &converted));
}

// ══════════════════════════════════════════════════════════════════════════════
// Scopes & closures
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn scope_child_shadows_parent() {
    let root = Scope::root();
    root.set("x", int(1));
    let child = root.child();
    child.define("x", int(2));
    assert_eq!(child.get("x"), int(2));
    assert_eq!(root.get("x"), int(1));
}

#[test]
fn scope_set_updates_nearest_binding() {
    let root = Scope::root();
    root.set("x", int(1));
    let child = root.child();
    child.set("x", int(5));
    child.set("y", int(6));
    assert_eq!(root.get("x"), int(5));
    assert!(!root.has("y"));
    assert!(child.has_local("y"));
}

#[test]
fn closure_sees_defining_scope() {
    let program = Expr::sequence(vec![
        Expr::assign(var("k"), Expr::integer(10)),
        Expr::assign(
            var("f"),
            Expr::lambda(vec!["x"], vec![], add(var("x"), var("k"))),
        ),
        Expr::assign(var("k"), Expr::integer(20)),
        Expr::call(var("f"), vec![Expr::integer(1)], vec![]),
    ]);
    assert_eq!(eval(&program), int(21));
}

#[test]
fn closure_assignment_reaches_outer_variable() {
    let program = Expr::sequence(vec![
        Expr::assign(var("n"), Expr::integer(0)),
        Expr::assign(
            var("bump"),
            Expr::lambda(vec![], vec![], Expr::assign(var("n"), add(var("n"), Expr::integer(1)))),
        ),
        Expr::call(var("bump"), vec![], vec![]),
        Expr::call(var("bump"), vec![], vec![]),
        var("n"),
    ]);
    assert_eq!(eval(&program), int(2));
}

// ══════════════════════════════════════════════════════════════════════════════
// Argument binding
// ══════════════════════════════════════════════════════════════════════════════

fn call_pair(positional: Vec<Expr>, named: Vec<(&str, Expr)>) -> EvalResult<Value> {
    let (mut ctx, scope) = context();
    let f = Expr::lambda(
        vec!["a"],
        vec![("b", Expr::integer(10))],
        Expr::list(vec![var("a"), var("b")]),
    );
    ctx.evaluate(&Expr::call(f, positional, named), &scope)
}

#[test]
fn arguments_default_and_override() {
    assert_eq!(call_pair(vec![Expr::integer(1)], vec![]).unwrap(), ints(&[1, 10]));
    assert_eq!(
        call_pair(vec![Expr::integer(1), Expr::integer(2)], vec![]).unwrap(),
        ints(&[1, 2])
    );
    assert_eq!(
        call_pair(vec![Expr::integer(1)], vec![("b", Expr::integer(3))]).unwrap(),
        ints(&[1, 3])
    );
    assert_eq!(
        call_pair(vec![], vec![("a", Expr::integer(4))]).unwrap(),
        ints(&[4, 10])
    );
}

#[test]
fn arguments_surplus_positional_ignored() {
    let args = vec![Expr::integer(1), Expr::integer(2), Expr::integer(3)];
    assert_eq!(call_pair(args, vec![]).unwrap(), ints(&[1, 2]));
}

#[test]
fn arguments_errors() {
    let err = call_pair(
        vec![Expr::integer(1), Expr::integer(2)],
        vec![("b", Expr::integer(3))],
    )
    .unwrap_err();
    assert_eq!(err.message, "argument b already set");

    let err = call_pair(vec![], vec![("b", Expr::integer(3))]).unwrap_err();
    assert_eq!(err.message, "missing arguments [a]");

    let err = call_pair(vec![Expr::integer(1)], vec![("c", Expr::integer(3))]).unwrap_err();
    assert_eq!(err.message, "unknown argument c");
}

#[test]
fn call_not_a_function() {
    let err = eval_err(&Expr::call(Expr::integer(3), vec![], vec![]));
    assert_eq!(err, "not a function: 3");
}

#[test]
fn call_depth_limit() {
    let mut config = EvalConfig::default();
    config.max_call_depth = 20;
    let mut ctx = EvaluationContext::new(config, Some(1));
    let scope = ctx.global_scope().clone();
    let program = Expr::sequence(vec![
        Expr::assign(
            var("f"),
            Expr::lambda(vec![], vec![], Expr::call(var("f"), vec![], vec![])),
        ),
        Expr::call(var("f"), vec![], vec![]),
    ]);
    let err = ctx.evaluate(&program, &scope).unwrap_err();
    assert_eq!(err.message, "max call depth");
}

/// `f = fun(n) { n > 0 ? n + f(n - 1) : 0 }`
fn triangular() -> Expr {
    let n = || var("n");
    let recurse = Expr::call(
        var("f"),
        vec![Expr::arithmetic(ArithOp::Sub, n(), Expr::integer(1))],
        vec![],
    );
    let body = node(ExprKind::Conditional {
        condition: Box::new(gt(n(), Expr::integer(0))),
        then_branch: Box::new(add(n(), recurse)),
        else_branch: Box::new(Expr::integer(0)),
    });
    Expr::assign(var("f"), Expr::lambda(vec!["n"], vec![], body))
}

#[test]
fn call_depth_allows_recursion_up_to_default_limit() {
    let (mut ctx, scope) = context();
    assert_eq!(ctx.config.max_call_depth, 100);
    ctx.evaluate_statement(&triangular(), &scope).unwrap();
    let call = |n: i64| Expr::call(var("f"), vec![Expr::integer(n)], vec![]);
    assert_eq!(ctx.evaluate(&call(98), &scope).unwrap(), int(4851));
    assert_eq!(ctx.evaluate(&call(99), &scope).unwrap(), int(4950));
    let err = ctx.evaluate(&call(100), &scope).unwrap_err();
    assert_eq!(err.message, "max call depth");
}

#[test]
fn method_call_binds_owner() {
    let getter = Expr::lambda(vec![], vec![], Expr::subscript(var("this"), Expr::string("hp")));
    let program = Expr::sequence(vec![
        Expr::assign(
            var("m"),
            Expr::map(vec![("hp", Expr::integer(8)), ("get", getter)]),
        ),
        Expr::call(Expr::subscript(var("m"), Expr::string("get")), vec![], vec![]),
    ]);
    assert_eq!(eval(&program), int(8));
}

#[test]
fn call_passes_requested_type_to_body() {
    let (mut ctx, scope) = context();
    let f = Expr::lambda(vec![], vec![], int_list(&[2, 3]));
    let call = Expr::call(f, vec![], vec![]);
    assert_eq!(ctx.evaluate_as(&call, &scope, ValueType::Integer).unwrap(), int(5));
}

// ══════════════════════════════════════════════════════════════════════════════
// Operators & control
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn arithmetic_and_division_by_zero() {
    let e = add(
        Expr::integer(1),
        Expr::arithmetic(ArithOp::Mul, Expr::integer(2), Expr::integer(3)),
    );
    assert_eq!(eval(&e), int(7));
    assert_eq!(
        eval(&Expr::arithmetic(ArithOp::Div, Expr::integer(-7), Expr::integer(2))),
        int(-3)
    );
    let e = Expr::arithmetic(ArithOp::Mod, Expr::integer(5), Expr::integer(0));
    assert_eq!(eval_err(&e), "division by zero");
}

#[test]
fn arithmetic_wraps() {
    let e = add(Expr::integer(i64::MAX), Expr::integer(1));
    assert_eq!(eval(&e), int(i64::MIN));
}

#[test]
fn comparison_numeric_and_structural() {
    let numeric = Expr::compare(CompareOp::Eq, Expr::string("3"), Expr::integer(3));
    assert_eq!(eval(&numeric), Value::Boolean(true));
    let structural = Expr::compare(CompareOp::Same, Expr::string("3"), Expr::integer(3));
    assert_eq!(eval(&structural), Value::Boolean(false));
    let lists = Expr::compare(CompareOp::Same, int_list(&[1, 2]), int_list(&[1, 2]));
    assert_eq!(eval(&lists), Value::Boolean(true));
}

#[test]
fn logic_short_circuits() {
    let (mut ctx, scope) = context();
    let e = node(ExprKind::And(vec![
        Expr::boolean(false),
        Expr::assign(var("touched"), Expr::integer(1)),
    ]));
    assert_eq!(ctx.evaluate(&e, &scope).unwrap(), Value::Boolean(false));
    assert!(!scope.has("touched"));
    assert_eq!(eval(&node(ExprKind::Or(vec![]))), Value::Boolean(false));
    assert_eq!(eval(&node(ExprKind::And(vec![]))), Value::Boolean(true));
}

#[test]
fn conditional_statement_evaluates_one_branch() {
    let (mut ctx, scope) = context();
    let e = node(ExprKind::Conditional {
        condition: Box::new(Expr::boolean(true)),
        then_branch: Box::new(Expr::assign(var("x"), Expr::integer(1))),
        else_branch: Box::new(Expr::assign(var("y"), Expr::integer(2))),
    });
    ctx.evaluate_statement(&e, &scope).unwrap();
    assert_eq!(scope.get("x"), int(1));
    assert!(!scope.has("y"));
}

#[test]
fn interpolation_concatenates_strings() {
    let e = node(ExprKind::Interpolation(vec![
        StringPart::Literal("hp: ".to_string()),
        StringPart::Expr(int_list(&[3, 4])),
    ]));
    assert_eq!(eval(&e), s("hp: 34"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Loops & repeats
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn for_loop_over_list_with_filter() {
    let e = for_loop(
        Expr::arithmetic(ArithOp::Mul, var("x"), Expr::integer(2)),
        None,
        "x",
        int_list(&[1, 2, 3]),
        gt(var("x"), Expr::integer(1)),
    );
    assert_eq!(eval(&e), ints(&[4, 6]));
}

#[test]
fn for_loop_index_is_zero_based() {
    let e = for_loop(var("i"), Some("i"), "_", int_list(&[9, 9, 9]), Expr::boolean(true));
    assert_eq!(eval(&e), ints(&[0, 1, 2]));
}

#[test]
fn for_loop_over_map_keeps_keys() {
    let e = for_loop(
        Expr::list(vec![var("k"), var("v")]),
        Some("k"),
        "v",
        Expr::map(vec![("a", Expr::integer(1)), ("b", Expr::integer(5))]),
        gt(var("v"), Expr::integer(2)),
    );
    let expected = Value::map_from([("b", Value::list(vec![s("b"), int(5)]))]);
    assert_eq!(eval(&e), expected);
}

#[test]
fn for_loop_variables_do_not_leak() {
    let (mut ctx, scope) = context();
    let e = for_loop(var("x"), None, "x", int_list(&[1]), Expr::boolean(true));
    ctx.evaluate(&e, &scope).unwrap();
    assert!(!scope.has("x"));
}

#[test]
fn for_loop_invalid_container() {
    let e = for_loop(var("x"), None, "x", Expr::integer(3), Expr::boolean(true));
    assert_eq!(eval_err(&e), "invalid loop container: 3");
}

#[test]
fn repeat_limits() {
    let d6 = Expr::die(Expr::integer(6));
    let once = repeat(RepeatMode::DoWhile, d6.clone(), Expr::boolean(false), None);
    let Value::List(rolled) = eval(&once) else {
        panic!("expected a list");
    };
    assert_eq!(rolled.borrow().len(), 1);

    let never = repeat(RepeatMode::WhileDo, d6.clone(), Expr::boolean(false), None);
    assert_eq!(eval(&never), ints(&[]));

    let do_while = repeat(RepeatMode::DoWhile, Expr::integer(1), Expr::boolean(true), Some(3));
    assert_eq!(eval(&do_while), ints(&[1, 1, 1, 1]));

    let while_do = repeat(RepeatMode::WhileDo, Expr::integer(1), Expr::boolean(true), Some(3));
    assert_eq!(eval(&while_do), ints(&[1, 1, 1]));
}

#[test]
fn repeat_capped_by_max_reroll() {
    let mut config = EvalConfig::default();
    config.max_reroll = 5;
    let mut ctx = EvaluationContext::new(config, Some(1));
    let scope = ctx.global_scope().clone();
    let e = repeat(RepeatMode::WhileDo, Expr::integer(0), Expr::boolean(true), Some(50));
    let Value::List(items) = ctx.evaluate(&e, &scope).unwrap() else {
        panic!("expected a list");
    };
    assert_eq!(items.borrow().len(), 5);
}

#[test]
fn repeat_reroll_until_condition() {
    // reroll a d6 while it shows 1
    let e = repeat(
        RepeatMode::DoWhile,
        Expr::assign(var("r"), Expr::die(Expr::integer(6))),
        Expr::compare(CompareOp::Eq, var("r"), Expr::integer(1)),
        None,
    );
    let Value::List(items) = eval(&e) else {
        panic!("expected a list");
    };
    let items = items.borrow();
    let (last, init) = items.split_last().unwrap();
    assert!(init.iter().all(|v| *v == int(1)));
    assert_ne!(*last, int(1));
}

// ══════════════════════════════════════════════════════════════════════════════
// Containers
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn draw_mutates_shared_list() {
    let (mut ctx, scope) = context();
    scope.set("deck", ints(&[1, 2, 3]));
    let one = node(ExprKind::Draw(Box::new(var("deck"))));
    assert_eq!(ctx.evaluate(&one, &scope).unwrap(), int(1));
    assert_eq!(scope.get("deck"), ints(&[2, 3]));

    let many = node(ExprKind::DrawMultiple {
        n: Box::new(Expr::integer(5)),
        container: Box::new(var("deck")),
    });
    assert_eq!(ctx.evaluate(&many, &scope).unwrap(), ints(&[2, 3]));
    assert_eq!(ctx.evaluate(&one, &scope).unwrap(), Value::Undef);
}

#[test]
fn draw_negative_is_error() {
    let e = node(ExprKind::DrawMultiple {
        n: Box::new(Expr::integer(-1)),
        container: Box::new(int_list(&[1])),
    });
    assert_eq!(eval_err(&e), "cannot draw negative number: -1");
}

#[test]
fn range_both_directions() {
    let up = node(ExprKind::Range {
        start: Box::new(Expr::integer(1)),
        end: Box::new(Expr::integer(4)),
    });
    let down = node(ExprKind::Range {
        start: Box::new(Expr::integer(3)),
        end: Box::new(Expr::integer(1)),
    });
    assert_eq!(eval(&up), ints(&[1, 2, 3, 4]));
    assert_eq!(eval(&down), ints(&[3, 2, 1]));
}

#[test]
fn index_of_containers() {
    let in_list = node(ExprKind::IndexOf {
        element: Box::new(Expr::integer(5)),
        container: Box::new(int_list(&[4, 5, 5])),
    });
    assert_eq!(eval(&in_list), int(1));
    let in_map = node(ExprKind::IndexOf {
        element: Box::new(Expr::integer(2)),
        container: Box::new(Expr::map(vec![("a", Expr::integer(1)), ("b", Expr::integer(2))])),
    });
    assert_eq!(eval(&in_map), s("b"));
    let scalar = node(ExprKind::IndexOf {
        element: Box::new(Expr::integer(2)),
        container: Box::new(Expr::integer(3)),
    });
    assert_eq!(eval(&scalar), Value::Boolean(false));
}

#[test]
fn subscript_negative_and_out_of_bounds() {
    let last = Expr::subscript(int_list(&[1, 2, 3]), Expr::integer(-1));
    assert_eq!(eval(&last), int(3));
    let oob = Expr::subscript(int_list(&[1, 2, 3]), Expr::integer(3));
    assert_eq!(eval_err(&oob), "index out of bounds: length 3, index 3");
    let bad = Expr::subscript(Expr::integer(3), Expr::string("a"));
    assert_eq!(eval_err(&bad), "invalid subscript \"a\" for 3");
}

#[test]
fn best_and_reorder() {
    let pool = int_list(&[4, 1, 6, 3]);
    let highest = node(ExprKind::Best {
        op: BestOp::Highest,
        expr: Box::new(pool.clone()),
    });
    assert_eq!(eval(&highest), int(6));
    let lowest_two = node(ExprKind::BestMultiple {
        op: BestOp::Lowest,
        n: Box::new(Expr::integer(2)),
        expr: Box::new(pool.clone()),
    });
    assert_eq!(eval(&lowest_two), ints(&[1, 3]));
    let sorted = node(ExprKind::Reorder {
        op: ReorderOp::Sorted,
        list: Box::new(pool.clone()),
    });
    assert_eq!(eval(&sorted), ints(&[1, 3, 4, 6]));
    let empty = node(ExprKind::Best {
        op: BestOp::First,
        expr: Box::new(int_list(&[])),
    });
    assert_eq!(eval(&empty), Value::Undef);
}

// ══════════════════════════════════════════════════════════════════════════════
// Mutation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn assign_subscript_elementwise() {
    let (mut ctx, scope) = context();
    scope.set("l", ints(&[0, 0, 0]));
    let target = Expr::subscript(var("l"), int_list(&[0, 2]));
    ctx.evaluate(&Expr::assign(target, int_list(&[7, 9])), &scope)
        .unwrap();
    assert_eq!(scope.get("l"), ints(&[7, 0, 9]));
}

#[test]
fn append_list_and_map() {
    let (mut ctx, scope) = context();
    scope.set("l", ints(&[1]));
    scope.set("m", Value::map_from([("a", int(1))]));
    let append = |target: &str, source: Expr| {
        node(ExprKind::Append {
            target: Box::new(var(target)),
            source: Box::new(source),
        })
    };
    ctx.evaluate(&append("l", int_list(&[2, 3])), &scope).unwrap();
    assert_eq!(scope.get("l"), ints(&[1, 2, 3]));
    ctx.evaluate(&append("m", Expr::map(vec![("b", Expr::integer(2))])), &scope)
        .unwrap();
    assert_eq!(
        scope.get("m"),
        Value::map_from([("a", int(1)), ("b", int(2))])
    );

    let err = ctx.evaluate(&append("m", Expr::integer(3)), &scope).unwrap_err();
    assert_eq!(err.message, "invalid right operand for '<<', expected map: 3");
    scope.set("n", int(1));
    let err = ctx.evaluate(&append("n", Expr::integer(3)), &scope).unwrap_err();
    assert_eq!(err.message, "invalid left operand for '<<': 1");
}

#[test]
fn global_variables_are_live() {
    let (mut ctx, scope) = context();
    let assign = Expr::assign(
        Expr::subscript(node(ExprKind::ScopeVariables(ScopeKind::Global)), Expr::string("g")),
        Expr::integer(3),
    );
    ctx.evaluate(&assign, &scope).unwrap();
    assert_eq!(scope.get("g"), int(3));
}

// ══════════════════════════════════════════════════════════════════════════════
// Imports
// ══════════════════════════════════════════════════════════════════════════════

fn import_context() -> (EvaluationContext, Scope) {
    let mut stats = IndexMap::new();
    stats.insert("str".to_string(), int(16));
    stats.insert("dex".to_string(), int(12));
    let resolver = MapImportResolver::new().with_module("stats", stats);
    let ctx = EvaluationContext::new(EvalConfig::default(), Some(1)).with_imports(resolver);
    let scope = ctx.global_scope().clone();
    (ctx, scope)
}

#[test]
fn import_into_scope_and_clash() {
    let (mut ctx, scope) = import_context();
    ctx.evaluate_statement(&import("stats", None, None), &scope)
        .unwrap();
    assert_eq!(scope.get("str"), int(16));
    let err = ctx
        .evaluate_statement(&import("stats", None, None), &scope)
        .unwrap_err();
    assert_eq!(err.message, "import name clash: str");
}

#[test]
fn import_alias_with_names() {
    let (mut ctx, scope) = import_context();
    ctx.evaluate_statement(&import("stats", Some("pc"), Some(&["dex"][..])), &scope)
        .unwrap();
    assert_eq!(scope.get("pc"), Value::map_from([("dex", int(12))]));
    assert!(!scope.has("dex"));
}

#[test]
fn import_errors() {
    let (mut ctx, scope) = import_context();
    let err = ctx
        .evaluate_statement(&import("nowhere", None, None), &scope)
        .unwrap_err();
    assert_eq!(err.message, "unresolved import: nowhere");

    scope.set("x", int(3));
    let err = ctx
        .evaluate_statement(&import("stats", Some("x"), None), &scope)
        .unwrap_err();
    assert_eq!(err.message, "import alias x is not a map");
}

// ══════════════════════════════════════════════════════════════════════════════
// Error traces
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn error_trace_innermost_first() {
    let (mut ctx, scope) = context();
    let e = add(
        Expr::integer(1),
        Expr::arithmetic(ArithOp::Div, Expr::integer(2), Expr::integer(0)),
    );
    let err = ctx.evaluate(&e, &scope).unwrap_err();
    assert_eq!(err.message, "division by zero");
    let sources: Vec<&str> = err.trace.iter().map(|t| t.source.as_str()).collect();
    assert_eq!(sources, vec!["2 / 0", "1 + 2 / 0"]);
    assert!(err.report().starts_with("division by zero\n  in "));
}

#[test]
fn error_trace_through_call() {
    let (mut ctx, scope) = context();
    let program = Expr::sequence(vec![
        Expr::assign(
            var("f"),
            Expr::lambda(
                vec!["x"],
                vec![],
                Expr::arithmetic(ArithOp::Div, var("x"), Expr::integer(0)),
            ),
        ),
        Expr::call(var("f"), vec![Expr::integer(1)], vec![]),
    ]);
    let err = ctx.evaluate(&program, &scope).unwrap_err();
    let sources: Vec<&str> = err.trace.iter().map(|t| t.source.as_str()).collect();
    assert_eq!(sources.first(), Some(&"x / 0"));
    assert!(sources.contains(&"f(1)"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Reduction & substitution
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn reduction_preserves_pure_values() {
    let pure = vec![
        add(
            Expr::integer(2),
            Expr::arithmetic(ArithOp::Mul, Expr::integer(3), Expr::integer(4)),
        ),
        node(ExprKind::Conditional {
            condition: Box::new(gt(Expr::integer(2), Expr::integer(1))),
            then_branch: Box::new(Expr::string("a")),
            else_branch: Box::new(Expr::string("b")),
        }),
        node(ExprKind::Reorder {
            op: ReorderOp::Sorted,
            list: Box::new(int_list(&[3, 1, 2])),
        }),
        node(ExprKind::BestMultiple {
            op: BestOp::Highest,
            n: Box::new(Expr::integer(2)),
            expr: Box::new(int_list(&[5, 1, 4])),
        }),
        node(ExprKind::Count(Box::new(node(ExprKind::Range {
            start: Box::new(Expr::integer(1)),
            end: Box::new(Expr::integer(6)),
        })))),
        node(ExprKind::And(vec![
            Expr::boolean(true),
            gt(Expr::integer(3), Expr::integer(2)),
        ])),
        Expr::convert(ValueType::String, int_list(&[1, 2])),
    ];
    for e in &pure {
        let reduced = reduce(e).unwrap();
        assert_eq!(eval(&reduced), eval(e), "reduction changed the value of {e}");
    }
}

#[test]
fn reduction_keeps_random_and_variable_parts() {
    let (mut ctx, scope) = context();
    scope.set("x", int(4));
    let e = add(
        var("x"),
        Expr::arithmetic(ArithOp::Mul, Expr::integer(2), Expr::integer(3)),
    );
    let reduced = reduce(&e).unwrap();
    assert_eq!(reduced.render(), "x + 6");
    assert_eq!(
        ctx.evaluate(&reduced, &scope).unwrap(),
        ctx.evaluate(&e, &scope).unwrap()
    );

    let dice = Expr::dice(Expr::integer(3), Expr::integer(6));
    assert_eq!(reduce(&dice).unwrap(), dice);
}

#[test]
fn substitution_inlines_bound_variables() {
    let scope = Scope::root();
    scope.set("n", int(3));
    let e = Expr::dice(var("n"), Expr::integer(6));
    assert_eq!(substitute_variables(&e, &scope).render(), "3d6");
    let unbound = Expr::dice(var("m"), Expr::integer(6));
    assert_eq!(substitute_variables(&unbound, &scope), unbound);
}
