//! Branch-condition expressions for conditional nodes
//!
//! Parses and evaluates expressions like:
//! - `verdict == 'approve'`
//! - `review.score >= 7`
//! - `tags contains 'bug' and retries < 3`
//!
//! The left-hand side is a dot path into the merged input map; literals are
//! single- or double-quoted strings, numbers, `true`/`false` and `null`.

use serde_json::Value;
use std::error::Error;

/// Parsed condition expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    True,
    False,
    Compare {
        left: String,
        op: CompareOp,
        right: Literal,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

/// Parse an expression string into an [Expression]
pub fn parse(input: &str) -> Result<Expression, Box<dyn Error + Send + Sync>> {
    let input = input.trim();

    if input == "true" {
        return Ok(Expression::True);
    }
    if input == "false" {
        return Ok(Expression::False);
    }

    // " and " / " or " split at top level, outside quotes
    if let Some(expr) = split_compound(input)? {
        return Ok(expr);
    }

    if let Some(rest) = input.strip_prefix("not ") {
        return Ok(Expression::Not(Box::new(parse(rest)?)));
    }

    parse_comparison(input)
}

/// Convenience for handlers: parse then evaluate, treating an unparseable
/// expression as not matched (logged, never fatal).
pub fn matches(expression: &str, inputs: &Value) -> bool {
    match parse(expression) {
        Ok(expr) => evaluate(&expr, inputs),
        Err(err) => {
            log::error!("Failed to parse condition '{}': {}", expression, err);
            false
        }
    }
}

/// Evaluate an expression against the merged input map
pub fn evaluate(expr: &Expression, inputs: &Value) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::Compare { left, op, right } => {
            compare(lookup_path(inputs, left), *op, right)
        }
        Expression::And(left, right) => evaluate(left, inputs) && evaluate(right, inputs),
        Expression::Or(left, right) => evaluate(left, inputs) || evaluate(right, inputs),
        Expression::Not(inner) => !evaluate(inner, inputs),
    }
}

/// Resolve a dot path (`review.score`) inside a JSON object
pub fn lookup_path<'a>(inputs: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = inputs;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn split_compound(input: &str) -> Result<Option<Expression>, Box<dyn Error + Send + Sync>> {
    let mut in_string = false;

    for (i, c) in input.char_indices() {
        if c == '\'' || c == '"' {
            in_string = !in_string;
        } else if !in_string {
            if input[i..].starts_with(" and ") {
                let left = parse(&input[..i])?;
                let right = parse(&input[i + 5..])?;
                return Ok(Some(Expression::And(Box::new(left), Box::new(right))));
            }
            if input[i..].starts_with(" or ") {
                let left = parse(&input[..i])?;
                let right = parse(&input[i + 4..])?;
                return Ok(Some(Expression::Or(Box::new(left), Box::new(right))));
            }
        }
    }

    Ok(None)
}

fn parse_comparison(input: &str) -> Result<Expression, Box<dyn Error + Send + Sync>> {
    // Longest operators first so ">=" never parses as ">"
    let operators = [
        ("!=", CompareOp::NotEq),
        (">=", CompareOp::Gte),
        ("<=", CompareOp::Lte),
        ("==", CompareOp::Eq),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
        (" contains ", CompareOp::Contains),
    ];

    for (op_str, op) in operators {
        if let Some(pos) = find_outside_quotes(input, op_str) {
            let left = input[..pos].trim().to_string();
            let right = parse_literal(input[pos + op_str.len()..].trim())?;
            return Ok(Expression::Compare { left, op, right });
        }
    }

    Err(format!("Could not parse condition: {}", input).into())
}

fn find_outside_quotes(input: &str, needle: &str) -> Option<usize> {
    let mut in_string = false;
    for (i, c) in input.char_indices() {
        if c == '\'' || c == '"' {
            in_string = !in_string;
        } else if !in_string && input[i..].starts_with(needle) {
            return Some(i);
        }
    }
    None
}

fn parse_literal(input: &str) -> Result<Literal, Box<dyn Error + Send + Sync>> {
    if input == "null" {
        return Ok(Literal::Null);
    }
    if input == "true" {
        return Ok(Literal::Boolean(true));
    }
    if input == "false" {
        return Ok(Literal::Boolean(false));
    }
    if input.len() >= 2
        && ((input.starts_with('\'') && input.ends_with('\''))
            || (input.starts_with('"') && input.ends_with('"')))
    {
        return Ok(Literal::String(input[1..input.len() - 1].to_string()));
    }
    if let Ok(n) = input.parse::<f64>() {
        return Ok(Literal::Number(n));
    }

    Err(format!("Could not parse literal: {}", input).into())
}

fn compare(left: Option<&Value>, op: CompareOp, right: &Literal) -> bool {
    match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::NotEq => !values_equal(left, right),
        CompareOp::Gt => compare_numbers(left, right, |a, b| a > b),
        CompareOp::Gte => compare_numbers(left, right, |a, b| a >= b),
        CompareOp::Lt => compare_numbers(left, right, |a, b| a < b),
        CompareOp::Lte => compare_numbers(left, right, |a, b| a <= b),
        CompareOp::Contains => check_contains(left, right),
    }
}

fn values_equal(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (None, Literal::Null) => true,
        (None, _) => false,
        (Some(Value::Null), Literal::Null) => true,
        (Some(Value::String(s)), Literal::String(rs)) => s == rs,
        (Some(Value::Number(n)), Literal::Number(rn)) => n
            .as_f64()
            .map(|f| (f - rn).abs() < f64::EPSILON)
            .unwrap_or(false),
        (Some(Value::Bool(b)), Literal::Boolean(rb)) => b == rb,
        _ => false,
    }
}

fn compare_numbers<F>(left: Option<&Value>, right: &Literal, cmp: F) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (left, right) {
        (Some(Value::Number(n)), Literal::Number(rn)) => {
            n.as_f64().map(|f| cmp(f, *rn)).unwrap_or(false)
        }
        _ => false,
    }
}

fn check_contains(left: Option<&Value>, right: &Literal) -> bool {
    match (left, right) {
        (Some(Value::String(s)), Literal::String(substr)) => s.contains(substr),
        (Some(Value::Array(arr)), Literal::String(val)) => {
            arr.iter().any(|v| v.as_str() == Some(val.as_str()))
        }
        (Some(Value::Array(arr)), Literal::Number(val)) => arr.iter().any(|v| {
            v.as_f64()
                .map(|f| (f - val).abs() < f64::EPSILON)
                .unwrap_or(false)
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_equality() {
        let expr = parse("verdict == 'approve'").unwrap();
        assert_eq!(
            expr,
            Expression::Compare {
                left: "verdict".to_string(),
                op: CompareOp::Eq,
                right: Literal::String("approve".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_numeric_and_boolean_literals() {
        assert_eq!(
            parse("score >= 7").unwrap(),
            Expression::Compare {
                left: "score".to_string(),
                op: CompareOp::Gte,
                right: Literal::Number(7.0),
            }
        );
        assert_eq!(
            parse("draft == false").unwrap(),
            Expression::Compare {
                left: "draft".to_string(),
                op: CompareOp::Eq,
                right: Literal::Boolean(false),
            }
        );
        assert_eq!(
            parse("error == null").unwrap(),
            Expression::Compare {
                left: "error".to_string(),
                op: CompareOp::Eq,
                right: Literal::Null,
            }
        );
    }

    #[test]
    fn test_parse_compound() {
        match parse("a == 'x' and b > 5").unwrap() {
            Expression::And(_, _) => {}
            other => panic!("Expected And, got {:?}", other),
        }
        match parse("a == 'x' or b > 5").unwrap() {
            Expression::Or(_, _) => {}
            other => panic!("Expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_not() {
        match parse("not done == true").unwrap() {
            Expression::Not(_) => {}
            other => panic!("Expected Not, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse("this is not parseable").is_err());
        assert!(parse("lonely ==").is_err());
    }

    #[test]
    fn test_evaluate_against_inputs() {
        let inputs = json!({
            "verdict": "approve",
            "review": { "score": 8 },
            "tags": ["bug", "urgent"],
            "retries": 1,
        });

        assert!(matches("verdict == 'approve'", &inputs));
        assert!(!matches("verdict == 'reject'", &inputs));
        assert!(matches("review.score >= 7", &inputs));
        assert!(matches("tags contains 'bug'", &inputs));
        assert!(matches("tags contains 'bug' and retries < 3", &inputs));
        assert!(matches("verdict == 'reject' or review.score > 5", &inputs));
        assert!(matches("not verdict == 'reject'", &inputs));
        assert!(matches("missing == null", &inputs));
    }

    #[test]
    fn test_string_contains_substring() {
        let inputs = json!({"text": "release notes ready"});
        assert!(matches("text contains 'notes'", &inputs));
        assert!(!matches("text contains 'missing'", &inputs));
    }

    #[test]
    fn test_quoted_operator_is_not_split() {
        let inputs = json!({"text": "a and b"});
        assert!(matches("text == 'a and b'", &inputs));
    }

    #[test]
    fn test_unparseable_condition_matches_nothing() {
        assert!(!matches("%%%", &json!({})));
    }

    #[test]
    fn test_type_mismatch_comparisons_are_false() {
        let inputs = json!({"count": "three"});
        assert!(!matches("count > 2", &inputs));
        assert!(!matches("count contains 3", &inputs));
    }
}
