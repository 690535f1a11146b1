//! Condition language: compile results, errors, rendering and evaluation

use proptest::prelude::*;
use rustmemodoc::condition::{Combinator, Condition, ConditionError, Literal, Operator, compile};
use serde_json::json;

fn leaf(name: &str, op: Operator, value: Literal) -> Condition {
    Condition::predicate(name, op, value)
}

#[test]
fn test_typed_literals() {
    assert_eq!(
        compile("status == 'active'").unwrap(),
        leaf("status", Operator::Eq, Literal::Text("active".into()))
    );
    assert_eq!(
        compile("age > 18").unwrap(),
        leaf("age", Operator::Gt, Literal::Integer(18))
    );
    assert_eq!(
        compile("flag == true").unwrap(),
        leaf("flag", Operator::Eq, Literal::Bool(true))
    );
    assert_eq!(
        compile("x == null").unwrap(),
        leaf("x", Operator::Eq, Literal::Null)
    );
}

#[test]
fn test_mixed_operators_need_parentheses() {
    let err = compile("a==1 && b==2 || c==3").unwrap_err();
    assert!(matches!(err, ConditionError::MixedOperator { .. }));

    let tree = compile("(a==1 && b==2) || c==3").unwrap();
    assert_eq!(
        serde_json::to_value(&tree).unwrap(),
        json!({"or": [
            {"and": [
                {"name": "a", "op": "==", "value": 1},
                {"name": "b", "op": "==", "value": 2}
            ]},
            {"name": "c", "op": "==", "value": 3}
        ]})
    );
}

#[test]
fn test_leaves_keep_source_order() {
    let tree = compile("z < 1 && (y >= 2 || x ~ 'q%') && w != false").unwrap();
    let names: Vec<&str> = tree.predicates().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["z", "y", "x", "w"]);
}

#[test]
fn test_error_codes() {
    let cases = [
        ("", "EMPTY_CONDITION"),
        ("name == 'open", "UNTERMINATED_STRING"),
        ("== 3", "MISSING_OPERAND"),
        ("age >", "MISSING_OPERAND"),
        ("(age > 3", "UNBALANCED_PARENTHESIS"),
        ("age > 3)", "UNBALANCED_PARENTHESIS"),
        ("age > 3 age", "UNEXPECTED_TOKEN"),
    ];
    for (input, code) in cases {
        let err = compile(input).unwrap_err();
        assert_eq!(err.code(), code, "input: {input:?}");
    }
}

#[test]
fn test_tiny_decimal_survives_rendering() {
    let tree = compile("x == 0.00001").unwrap();
    assert_eq!(tree.to_string(), "x == 1e-5");
    assert_eq!(compile(&tree.to_string()).unwrap(), tree);
    assert!(tree.matches(&json!({"x": 0.00001})));
}

#[test]
fn test_text_with_both_quote_kinds_does_not_render() {
    let tree: Condition =
        serde_json::from_value(json!({"name": "q", "op": "==", "value": "it's \"x\""})).unwrap();
    assert!(compile(&tree.to_string()).is_err());
}

#[test]
fn test_compiled_condition_filters_records() {
    let tree = compile("(role == 'admin' || age >= 18) && name ~ 'a%'").unwrap();
    assert!(tree.matches(&json!({"role": "user", "age": 30, "name": "Ann"})));
    assert!(tree.matches(&json!({"role": "admin", "age": 9, "name": "al"})));
    assert!(!tree.matches(&json!({"role": "user", "age": 9, "name": "ann"})));
    assert!(!tree.matches(&json!({"role": "admin", "name": "bob"})));
}

fn literal() -> impl Strategy<Value = Literal> {
    prop_oneof![
        Just(Literal::Null),
        any::<bool>().prop_map(Literal::Bool),
        any::<i64>().prop_map(Literal::Integer),
        (-40_000i64..40_000)
            .prop_filter("fractional", |n| n % 4 != 0)
            .prop_map(|n| Literal::Float(n as f64 / 4.0)),
        any::<f64>()
            .prop_filter("finite", |x| x.is_finite())
            .prop_map(Literal::Float),
        prop::sample::select(vec![1e-5, 1e20, -4.2e-7, 6.02e23, 5e-324])
            .prop_map(Literal::Float),
        "[a-zA-Z0-9 _%-]{0,12}".prop_map(Literal::Text),
        "[a-z]{0,4}'[a-z ]{0,4}".prop_map(Literal::Text),
    ]
}

fn operator() -> impl Strategy<Value = Operator> {
    prop_oneof![
        Just(Operator::Eq),
        Just(Operator::Ne),
        Just(Operator::Gt),
        Just(Operator::Gte),
        Just(Operator::Lt),
        Just(Operator::Lte),
        Just(Operator::Like),
    ]
}

fn condition() -> impl Strategy<Value = Condition> {
    let leaf = ("[a-z][a-z0-9_.]{0,8}", operator(), literal())
        .prop_map(|(name, op, value)| Condition::predicate(name, op, value));

    leaf.prop_recursive(3, 24, 4, |inner| {
        (
            prop_oneof![Just(Combinator::And), Just(Combinator::Or)],
            prop::collection::vec(inner, 2..4),
        )
            .prop_map(|(combinator, children)| Condition::group(combinator, children))
    })
}

proptest! {
    #[test]
    fn prop_rendered_condition_compiles_to_same_tree(tree in condition()) {
        let rendered = tree.to_string();
        let compiled = compile(&rendered);
        prop_assert_eq!(compiled, Ok(tree), "rendered: {}", rendered);
    }

    #[test]
    fn prop_redundant_outer_parentheses_are_ignored(tree in condition()) {
        let wrapped = format!("({})", tree);
        prop_assert_eq!(compile(&wrapped), Ok(tree));
    }

    #[test]
    fn prop_compile_never_panics(input in "\\PC{0,40}") {
        let _ = compile(&input);
    }
}
