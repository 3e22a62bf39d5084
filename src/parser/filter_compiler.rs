//! Compiles a filter predicate to postfix instructions with the
//! shunting-yard algorithm.

use regex_lite::Regex;
use tracing::trace;

use crate::error::{CompileError, Error, SyntaxError};
use crate::evaluator::operations::{BinaryOp, Function};
use crate::parser::lexer::{tokenize_filter, TokenType};
use crate::parser::path_parser::parse_sub_path;
use crate::parser::types::{FilterExpr, Instruction};

/// Operator stack entries that have not been emitted yet.
enum Pending {
    Op(BinaryOp, usize),
    Call(Function, usize),
    LParen(usize),
}

/// Instructions paired with the source offset they were compiled from.
type Output = Vec<(Instruction, usize)>;

/// Compile predicate `text` whose first character sits at `base` in the
/// path source. `depth` counts this filter and every filter enclosing it.
pub(crate) fn compile_filter(text: &str, base: usize, depth: usize) -> Result<FilterExpr, Error> {
    let tokens = tokenize_filter(text, base)?;
    let mut output: Output = Vec::new();
    let mut stack: Vec<Pending> = Vec::new();

    for (i, tok) in tokens.iter().enumerate() {
        let at = tok.start;
        match &tok.token_type {
            TokenType::Number(n) => output.push((Instruction::Number(n.clone()), at)),
            TokenType::Str(s) => output.push((Instruction::Str(s.clone()), at)),
            TokenType::Path(source) => {
                let (scope, path) = parse_sub_path(source, at, depth)?;
                output.push((Instruction::Path { scope, path }, at));
            }
            TokenType::Ident(name) => {
                let is_call = matches!(
                    tokens.get(i + 1).map(|t| &t.token_type),
                    Some(TokenType::LParen)
                );
                if is_call {
                    let function = Function::from_name(&name.to_lowercase()).ok_or_else(|| {
                        CompileError::UnknownFunction {
                            name: name.clone(),
                            offset: at,
                        }
                    })?;
                    stack.push(Pending::Call(function, at));
                } else {
                    let value = match name.to_lowercase().as_str() {
                        "true" => true,
                        "false" => false,
                        _ => {
                            return Err(CompileError::UnknownConstant {
                                name: name.clone(),
                                offset: at,
                            }
                            .into())
                        }
                    };
                    output.push((Instruction::Bool(value), at));
                }
            }
            TokenType::Op(symbol) => {
                let op = BinaryOp::from_symbol(symbol).ok_or_else(|| CompileError::UnknownOperator {
                    symbol: symbol.clone(),
                    offset: at,
                })?;
                while let Some(Pending::Op(top, top_at)) = stack.last() {
                    let (top, top_at) = (*top, *top_at);
                    let binds_tighter = top.precedence() > op.precedence()
                        || (top.precedence() == op.precedence() && !op.is_right_assoc());
                    if !binds_tighter {
                        break;
                    }
                    stack.pop();
                    emit_op(&mut output, top, top_at)?;
                }
                stack.push(Pending::Op(op, at));
            }
            TokenType::LParen => stack.push(Pending::LParen(at)),
            TokenType::RParen => {
                loop {
                    match stack.pop() {
                        Some(Pending::LParen(_)) => break,
                        Some(Pending::Op(op, op_at)) => emit_op(&mut output, op, op_at)?,
                        Some(Pending::Call(function, call_at)) => {
                            output.push((Instruction::Call(function), call_at))
                        }
                        None => return Err(SyntaxError::new("unbalanced ')' in filter", at).into()),
                    }
                }
                if let Some(Pending::Call(function, call_at)) = stack.last() {
                    output.push((Instruction::Call(*function), *call_at));
                    stack.pop();
                }
            }
            TokenType::Eof => break,
            _ => {
                return Err(SyntaxError::new(format!("unexpected token '{}' in filter", tok.value), at).into())
            }
        }
    }

    while let Some(pending) = stack.pop() {
        match pending {
            Pending::Op(op, at) => emit_op(&mut output, op, at)?,
            Pending::Call(function, at) => output.push((Instruction::Call(function), at)),
            Pending::LParen(at) => return Err(SyntaxError::new("unbalanced '(' in filter", at).into()),
        }
    }

    check_arity(&output, base)?;
    trace!(filter = text, instructions = output.len(), "compiled filter");
    Ok(FilterExpr {
        source: text.to_string(),
        program: output.into_iter().map(|(instruction, _)| instruction).collect(),
    })
}

/// Emit a binary operator. A string literal on the right of `=~` is compiled
/// to a pattern here so that a bad regex fails compilation.
fn emit_op(output: &mut Output, op: BinaryOp, at: usize) -> Result<(), CompileError> {
    if op == BinaryOp::Match {
        if let Some((Instruction::Str(pattern), pattern_at)) = output.last() {
            let regex = Regex::new(pattern).map_err(|e| CompileError::InvalidRegex {
                pattern: pattern.clone(),
                reason: e.to_string(),
                offset: *pattern_at,
            })?;
            let pattern_at = *pattern_at;
            output.pop();
            output.push((Instruction::Pattern(regex), pattern_at));
        }
    }
    output.push((Instruction::Binary(op), at));
    Ok(())
}

/// Simulate the value stack: every operator needs its operands, and exactly
/// one value must remain.
fn check_arity(output: &Output, base: usize) -> Result<(), SyntaxError> {
    let mut depth = 0usize;
    for (instruction, at) in output {
        match instruction {
            Instruction::Binary(op) => {
                if depth < 2 {
                    return Err(SyntaxError::new(
                        format!("missing operand for '{}'", op.symbol()),
                        *at,
                    ));
                }
                depth -= 1;
            }
            Instruction::Call(function) => {
                if depth < 1 {
                    return Err(SyntaxError::new(
                        format!("missing argument for '{}'", function.name()),
                        *at,
                    ));
                }
            }
            _ => depth += 1,
        }
    }
    if depth != 1 {
        let at = output.last().map_or(base, |(_, at)| *at);
        return Err(SyntaxError::new("malformed filter expression", at));
    }
    Ok(())
}
