//! Runs a compiled filter program against one candidate element.

use regex_lite::Regex;

use crate::error::EvalError;
use crate::evaluator::operations::{apply_binary_op, apply_match, BinaryOp};
use crate::evaluator::steps::evaluate_steps;
use crate::options::EvalOptions;
use crate::parser::types::{FilterExpr, Instruction, PathScope};
use crate::value::Value;

enum Operand<'p> {
    Value(Value),
    Pattern(&'p Regex),
}

fn pop<'p>(stack: &mut Vec<Operand<'p>>) -> Result<Operand<'p>, EvalError> {
    stack
        .pop()
        .ok_or_else(|| EvalError::Operation("filter stack underflow".to_string()))
}

fn pop_value(stack: &mut Vec<Operand<'_>>) -> Result<Value, EvalError> {
    match pop(stack)? {
        Operand::Value(value) => Ok(value),
        Operand::Pattern(_) => Err(EvalError::Operation("pattern used as a value".to_string())),
    }
}

/// Evaluate `expr` with `@` bound to `element` and `$` to `root`.
///
/// Returns `None` when an embedded path matched nothing, which leaves the
/// whole predicate without a value.
pub fn evaluate_filter(
    expr: &FilterExpr,
    element: &Value,
    root: &Value,
    options: &EvalOptions,
) -> Result<Option<Value>, EvalError> {
    let mut stack: Vec<Operand> = Vec::new();
    for instruction in &expr.program {
        match instruction {
            Instruction::Number(n) => stack.push(Operand::Value(Value::Number(n.clone()))),
            Instruction::Str(s) => stack.push(Operand::Value(Value::String(s.clone()))),
            Instruction::Bool(b) => stack.push(Operand::Value(Value::Bool(*b))),
            Instruction::Pattern(re) => stack.push(Operand::Pattern(re)),
            Instruction::Path { scope, path } => {
                let start = match scope {
                    PathScope::Root => root,
                    PathScope::Current => element,
                };
                let mut found = evaluate_steps(path.steps(), start, root, options)?;
                let value = match found.len() {
                    0 => return Ok(None),
                    1 => found.remove(0).value.into_owned(),
                    _ => Value::List(found.into_iter().map(|node| node.value.into_owned()).collect()),
                };
                stack.push(Operand::Value(value));
            }
            Instruction::Binary(op) => {
                let right = pop(&mut stack)?;
                let left = pop_value(&mut stack)?;
                let result = match right {
                    Operand::Pattern(re) if *op == BinaryOp::Match => apply_match(&left, re)?,
                    Operand::Value(right) => apply_binary_op(*op, &left, &right)?,
                    Operand::Pattern(_) => {
                        return Err(EvalError::Operation(format!(
                            "pattern is not an operand of '{}'",
                            op.symbol()
                        )))
                    }
                };
                stack.push(Operand::Value(result));
            }
            Instruction::Call(function) => {
                let arg = pop_value(&mut stack)?;
                stack.push(Operand::Value(function.apply(&arg)?));
            }
        }
    }
    pop_value(&mut stack).map(Some)
}

/// Whether `element` survives the filter. Only a boolean `true` keeps it.
pub fn keeps(expr: &FilterExpr, element: &Value, root: &Value, options: &EvalOptions) -> Result<bool, EvalError> {
    Ok(matches!(
        evaluate_filter(expr, element, root, options)?,
        Some(Value::Bool(true))
    ))
}
