//! Orca Formula - quantity formulas (memória de cálculo)
//!
//! A line item's quantity can be written as an arithmetic formula over
//! named variables, e.g. `(LARGURA * COMPRIMENTO) + 5`. The grammar is
//! closed: decimal literals (dot or comma), variable names, `+ - * /`,
//! unary minus and parentheses. Nothing is ever handed to a general
//! purpose `eval`.

mod ast;
mod editor;
mod eval;
mod parser;
mod variables;

pub use ast::{BinOp, Expr, UnaryOp};
pub use editor::{AppliedFormula, FormulaEditor};
pub use eval::{evaluate, references, substitute, Evaluator};
pub use parser::parse_expr;
pub use variables::{sanitize_name, VariableSet};

/// Variable bindings from literals: `vars! { A: 3, L: "1,25" }`.
/// Panics if a value is not a decimal literal.
#[macro_export]
macro_rules! vars {
    {} => { std::collections::HashMap::new() };
    { $($key:ident : $value:expr),* $(,)? } => {{
        let mut map = std::collections::HashMap::new();
        $(
            map.insert(
                stringify!($key).to_string(),
                orca_core::Number::from_str(&$value.to_string()).expect("numeric literal"),
            );
        )*
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_core::{Number, OrcaError, Settings};
    use std::collections::HashMap;

    fn num(s: &str) -> Number {
        Number::from_str(s).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(evaluate("2 + 3 * 4", &HashMap::new()).unwrap(), num("14"));
    }

    #[test]
    fn test_parenthesized_variables() {
        let v = vars! { A: 3, B: 4 };
        assert_eq!(evaluate("(A + B) * 2", &v).unwrap(), num("14"));
    }

    #[test]
    fn test_division_by_zero() {
        let v = vars! { A: 1, B: 0 };
        let err = evaluate("A / B", &v).unwrap_err();
        assert!(matches!(err, OrcaError::InvalidExpression { .. }));
    }

    #[test]
    fn test_longer_name_not_split() {
        let v = vars! { A1: 1, A10: 10 };
        assert_eq!(evaluate("A1 + A10", &v).unwrap(), num("11"));
    }

    #[test]
    fn test_comma_decimal_separator() {
        assert_eq!(evaluate("2,5 * 2", &HashMap::new()).unwrap(), num("5"));
        let v = vars! { L: "1,25" };
        assert_eq!(evaluate("L * 4", &v).unwrap(), num("5"));
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(evaluate("-(2 + 3) * 2", &HashMap::new()).unwrap(), num("-10"));
        let v = vars! { B: -3 };
        assert_eq!(evaluate("5 - B", &v).unwrap(), num("8"));
        assert_eq!(evaluate("5 * -B", &v).unwrap(), num("15"));
    }

    #[test]
    fn test_lowercase_formula_matches_variable() {
        let v = vars! { LARGURA: 2 };
        assert_eq!(evaluate("largura * 3", &v).unwrap(), num("6"));
    }

    #[test]
    fn test_unresolved_reference() {
        let err = evaluate("LARGURA * 2", &HashMap::new()).unwrap_err();
        assert_eq!(err, OrcaError::unresolved("LARGURA"));
    }

    #[test]
    fn test_illegal_tokens() {
        for input in ["2 ^ 3", "2 % 3", "1e5", "pi * 2", "max(1, 2)"] {
            let err = evaluate(input, &HashMap::new()).unwrap_err();
            assert!(
                matches!(err, OrcaError::UnresolvedReference { .. }),
                "{} should be rejected by the lexical pass, got {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_malformed_expressions() {
        for input in ["", "  ", "(1 + 2", "1 +", "1..2", "1 2", "()"] {
            let err = evaluate(input, &HashMap::new()).unwrap_err();
            assert!(
                matches!(err, OrcaError::InvalidExpression { .. }),
                "{:?} should be invalid, got {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_rounds_to_quantity_places() {
        assert_eq!(evaluate("10 / 3", &HashMap::new()).unwrap().to_plain_string(), "3.3333");
        assert_eq!(evaluate("2 / 3", &HashMap::new()).unwrap().to_plain_string(), "0.6667");

        let two_places = Evaluator::new(Settings::default().with_quantity_places(2));
        assert_eq!(two_places.evaluate("2 / 3", &HashMap::new()).unwrap(), num("0.67"));
    }

    #[test]
    fn test_idempotent() {
        let v = vars! { X: "1,3333", Y: 7 };
        let first = evaluate("(X * Y) / 3 - 1", &v).unwrap();
        for _ in 0..5 {
            assert_eq!(evaluate("(X * Y) / 3 - 1", &v).unwrap(), first);
        }
    }

    #[test]
    fn test_result_survives_reevaluation_after_save() {
        // The stored quantity must reproduce when the formula is reopened
        let v = vars! { A: "0,1", B: "0,2" };
        let saved = evaluate("A + B", &v).unwrap();
        let editor = FormulaEditor::open(
            Some("A + B"),
            vec![
                orca_core::Variable { id: "a".into(), name: "A".into(), value: num("0.1") },
                orca_core::Variable { id: "b".into(), name: "B".into(), value: num("0.2") },
            ],
            &saved,
            &Settings::default(),
        );
        assert_eq!(editor.preview().unwrap(), Some(saved));
    }
}
