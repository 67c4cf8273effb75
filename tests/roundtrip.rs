//! Property tests for the reader: printing a parsed tree and reading it
//! back is stable, and evaluation of generated arithmetic agrees with Rust.

#![cfg(feature = "reader")]
#![expect(clippy::unwrap_used)] // test code OK

use proptest::prelude::*;
use tinylisp::evaluate_str;
use tinylisp::reader::parse_str;
use tinylisp::value::Value;

// ============================================================================
// Strategies for generating test inputs
// ============================================================================

/// Numbers in the form `Display` prints them
fn arb_number() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..10_000).prop_map(|n| n.to_string()),
        (1u32..1000).prop_map(|n| format!("-{n}")),
        (0u32..100, 1u32..10).prop_map(|(i, f)| format!("{i}.{f}")),
    ]
}

fn arb_string() -> impl Strategy<Value = String> {
    "[a-z ]{0,8}".prop_map(|s| format!("\"{s}\""))
}

fn arb_ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9?!-]{0,6}"
}

/// Canonical source text: single spaces, no whitespace inside parentheses
fn arb_form() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![arb_number(), arb_string(), arb_ident()];
    leaf.prop_recursive(4, 32, 5, |inner| {
        prop::collection::vec(inner, 0..5).prop_map(|items| format!("({})", items.join(" ")))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn canonical_forms_reprint_unchanged(source in arb_form()) {
        let node = parse_str(&source).unwrap();
        prop_assert_eq!(node.to_string(), source);
    }

    #[test]
    fn extra_whitespace_does_not_change_the_tree(source in arb_form()) {
        let spaced = source.replace('(', "( ").replace(')', " )\n");
        prop_assert_eq!(parse_str(&spaced).unwrap(), parse_str(&source).unwrap());
    }

    #[test]
    fn addition_matches_f64(a in -1000i32..1000, b in -1000i32..1000, c in -1000i32..1000) {
        let result = evaluate_str(&format!("(+ {a} (- {b} {c}))")).unwrap();
        prop_assert_eq!(result, Value::Number(f64::from(a) + (f64::from(b) - f64::from(c))));
    }

    #[test]
    fn comparisons_are_one_or_zero(a in -50i32..50, b in -50i32..50) {
        let lt = evaluate_str(&format!("(< {a} {b})")).unwrap();
        let ge = evaluate_str(&format!("(>= {a} {b})")).unwrap();
        prop_assert_eq!(lt, Value::Number(if a < b { 1.0 } else { 0.0 }));
        prop_assert_eq!(ge, Value::Number(if a >= b { 1.0 } else { 0.0 }));
    }
}
