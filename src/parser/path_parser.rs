//! Recursive-descent parser from path text to a list of steps.
//!
//! ```text
//! Path    := '$' Segment*
//! Segment := '.' Ident | '.' '*' | '..' (Ident | Bracket | '*') | Bracket
//! Bracket := '[' ( Keys | Slice | Filter | '*' ) ']'
//! ```

use tracing::debug;

use crate::error::{Error, SyntaxError};
use crate::parser::filter_compiler::compile_filter;
use crate::parser::lexer::{tokenize_path, Token, TokenType};
use crate::parser::types::{CompiledPath, PathScope, Step, UnionKey, MAX_FILTER_DEPTH, MAX_INPUT_SIZE};

/// Compile a `$`-rooted path.
pub fn parse_path(source: &str) -> Result<CompiledPath, Error> {
    let len = source.chars().count();
    if len > MAX_INPUT_SIZE {
        return Err(SyntaxError::new(
            format!("path source of {} characters exceeds the limit of {}", len, MAX_INPUT_SIZE),
            0,
        )
        .into());
    }
    let tokens = tokenize_path(source, 0)?;
    let mut parser = Parser::new(tokens, 0);
    let (_, steps) = parser.parse(false)?;
    debug!(path = source, steps = steps.len(), "compiled path");
    Ok(CompiledPath::new(source, steps))
}

/// Compile a path embedded in a filter predicate, rooted at either `$` or
/// `@`. `base` is the offset of `text` in the outer source and `depth` the
/// number of enclosing filters.
pub(crate) fn parse_sub_path(text: &str, base: usize, depth: usize) -> Result<(PathScope, CompiledPath), Error> {
    let tokens = tokenize_path(text, base)?;
    let mut parser = Parser::new(tokens, depth);
    let (scope, steps) = parser.parse(true)?;
    Ok((scope, CompiledPath::new(text, steps)))
}

/// Accumulates the comma or colon separated entries of one bracket.
enum BracketForm {
    Single,
    Union(Vec<UnionKey>),
    Slice(Vec<Option<i64>>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>, depth: usize) -> Self {
        Parser { tokens, pos: 0, depth }
    }

    fn peek(&self) -> &Token {
        // tokenize_path always ends with Eof, and advance never moves past it
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !tok.is_eof() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, tt: &TokenType) -> bool {
        self.peek().token_type == *tt
    }

    fn unexpected(&self, tok: &Token) -> SyntaxError {
        if tok.is_eof() {
            SyntaxError::new("unexpected end of path", tok.start)
        } else {
            SyntaxError::new(format!("unexpected token '{}'", tok.value), tok.start)
        }
    }

    fn expect(&mut self, tt: &TokenType, msg: &str) -> Result<Token, SyntaxError> {
        if !self.check(tt) {
            return Err(SyntaxError::new(msg, self.peek().start));
        }
        Ok(self.advance())
    }

    fn parse(&mut self, allow_current: bool) -> Result<(PathScope, Vec<Step>), Error> {
        let first = self.advance();
        let scope = match first.token_type {
            TokenType::Dollar => PathScope::Root,
            TokenType::At if allow_current => PathScope::Current,
            _ if allow_current => {
                return Err(SyntaxError::new("path must start with a '$' or '@'", first.start).into())
            }
            _ => return Err(SyntaxError::new("path must start with a '$'", first.start).into()),
        };

        let mut steps = Vec::new();
        while !self.peek().is_eof() {
            let tok = self.advance();
            match tok.token_type {
                TokenType::Dot => steps.push(self.parse_dot_child()?),
                TokenType::DotDot => {
                    steps.push(Step::RecursiveDescent);
                    steps.push(self.parse_deep(&tok)?);
                }
                TokenType::LBracket => steps.push(self.parse_bracket()?),
                _ => return Err(self.unexpected(&tok).into()),
            }
        }
        Ok((scope, steps))
    }

    fn parse_dot_child(&mut self) -> Result<Step, SyntaxError> {
        let tok = self.advance();
        match tok.token_type {
            TokenType::Ident(name) => Ok(Step::ChildByName(name)),
            TokenType::Star => Ok(Step::Wildcard),
            _ => Err(SyntaxError::new("expected a child name or '*' after '.'", tok.start)),
        }
    }

    /// The selector following `..`.
    fn parse_deep(&mut self, dots: &Token) -> Result<Step, Error> {
        let tok = self.advance();
        match tok.token_type {
            TokenType::Ident(name) => Ok(Step::ChildByName(name)),
            TokenType::Star => Ok(Step::Wildcard),
            TokenType::LBracket => self.parse_bracket(),
            TokenType::Eof => Err(SyntaxError::new("cannot end with a scan '..'", dots.start).into()),
            _ => Err(SyntaxError::new(
                format!("unexpected token '{}' after deep search '..'", tok.value),
                tok.start,
            )
            .into()),
        }
    }

    /// Bracket contents; the opening `[` is already consumed.
    fn parse_bracket(&mut self) -> Result<Step, Error> {
        let tok = self.peek().clone();
        match &tok.token_type {
            TokenType::Star => {
                self.advance();
                self.expect(&TokenType::RBracket, "expected ']' after '[*'")?;
                return Ok(Step::Wildcard);
            }
            TokenType::Filter(text) => {
                if self.depth >= MAX_FILTER_DEPTH {
                    return Err(SyntaxError::new(
                        format!("filters nested deeper than {} levels", MAX_FILTER_DEPTH),
                        tok.start,
                    )
                    .into());
                }
                self.advance();
                // the predicate body starts after "?("
                let expr = compile_filter(text, tok.start + 2, self.depth + 1)?;
                self.expect(&TokenType::RBracket, "expected ']' after filter expression")?;
                return Ok(Step::Filter(expr));
            }
            TokenType::RBracket => {
                return Err(SyntaxError::new("expected at least one key, index or expression", tok.start).into())
            }
            _ => {}
        }

        let mut form = BracketForm::Single;
        let mut current: Option<(UnionKey, usize)> = None;
        loop {
            let tok = self.advance();
            match tok.token_type {
                TokenType::Int(i) if current.is_none() => current = Some((UnionKey::Index(i), tok.start)),
                TokenType::Ident(name) | TokenType::Str(name) if current.is_none() => {
                    current = Some((UnionKey::Name(name), tok.start))
                }
                TokenType::Comma => {
                    if let BracketForm::Slice(_) = form {
                        return Err(SyntaxError::new("unexpected ',' in slice", tok.start).into());
                    }
                    let (key, _) = current
                        .take()
                        .ok_or_else(|| SyntaxError::new("expected a key or index before ','", tok.start))?;
                    if let BracketForm::Union(keys) = &mut form {
                        keys.push(key);
                    } else {
                        form = BracketForm::Union(vec![key]);
                    }
                }
                TokenType::Colon => {
                    if let BracketForm::Union(_) = form {
                        return Err(SyntaxError::new("unexpected ':' in union", tok.start).into());
                    }
                    let bound = slice_bound(current.take())?;
                    if let BracketForm::Slice(bounds) = &mut form {
                        if bounds.len() == 2 {
                            return Err(SyntaxError::new("bad range syntax [start:end:step]", tok.start).into());
                        }
                        bounds.push(bound);
                    } else {
                        form = BracketForm::Slice(vec![bound]);
                    }
                }
                TokenType::RBracket => {
                    return finish_bracket(form, current, tok.start);
                }
                _ => return Err(self.unexpected(&tok).into()),
            }
        }
    }
}

fn slice_bound(item: Option<(UnionKey, usize)>) -> Result<Option<i64>, SyntaxError> {
    match item {
        None => Ok(None),
        Some((UnionKey::Index(i), _)) => Ok(Some(i)),
        Some((UnionKey::Name(name), at)) => Err(SyntaxError::new(
            format!("slice bounds must be integers, got '{}'", name),
            at,
        )),
    }
}

fn finish_bracket(form: BracketForm, current: Option<(UnionKey, usize)>, close: usize) -> Result<Step, Error> {
    match form {
        BracketForm::Single => match current {
            Some((UnionKey::Name(name), _)) => Ok(Step::ChildByName(name)),
            Some((UnionKey::Index(i), _)) => Ok(Step::IndexSel(i)),
            None => Err(SyntaxError::new("expected at least one key, index or expression", close).into()),
        },
        BracketForm::Union(mut keys) => {
            let (key, _) = current.ok_or_else(|| SyntaxError::new("expected a key or index after ','", close))?;
            keys.push(key);
            Ok(Step::Union(keys))
        }
        BracketForm::Slice(mut bounds) => {
            bounds.push(slice_bound(current)?);
            let step = bounds.get(2).copied().flatten();
            if step == Some(0) {
                return Err(SyntaxError::new("slice step cannot be zero", close).into());
            }
            Ok(Step::Slice {
                start: bounds[0],
                end: bounds[1],
                step,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(source: &str) -> Vec<Step> {
        parse_path(source).unwrap().steps().to_vec()
    }

    fn syntax_error(source: &str) -> SyntaxError {
        match parse_path(source) {
            Err(Error::Syntax(e)) => e,
            other => panic!("expected a syntax error for {}, got {:?}", source, other),
        }
    }

    fn name(n: &str) -> Step {
        Step::ChildByName(n.to_string())
    }

    fn assert_steps(source: &str, expected: &[Step]) {
        let actual = steps(source);
        assert_eq!(format!("{:?}", actual), format!("{:?}", expected), "steps of {}", source);
    }

    #[test]
    fn test_root_only() {
        assert!(steps("$").is_empty());
    }

    #[test]
    fn test_dot_children() {
        assert_steps("$.a.b", &[name("a"), name("b")]);
        assert_steps("$.a.*", &[name("a"), Step::Wildcard]);
    }

    #[test]
    fn test_bracket_singletons() {
        assert_steps("$['a']", &[name("a")]);
        assert_steps("$[a]", &[name("a")]);
        assert_steps("$[\"a b\"]", &[name("a b")]);
        assert_steps("$[-1]", &[Step::IndexSel(-1)]);
        assert_steps("$[*]", &[Step::Wildcard]);
    }

    #[test]
    fn test_union_keeps_order_and_duplicates() {
        assert_steps(
            "$['C', B, 1, 'C']",
            &[Step::Union(vec![
                UnionKey::Name("C".into()),
                UnionKey::Name("B".into()),
                UnionKey::Index(1),
                UnionKey::Name("C".into()),
            ])],
        );
    }

    #[test]
    fn test_slices() {
        assert_steps("$[1:4]", &[Step::Slice { start: Some(1), end: Some(4), step: None }]);
        assert_steps("$[::-1]", &[Step::Slice { start: None, end: None, step: Some(-1) }]);
        assert_steps("$[-2:]", &[Step::Slice { start: Some(-2), end: None, step: None }]);
        assert_steps("$[:]", &[Step::Slice { start: None, end: None, step: None }]);
    }

    #[test]
    fn test_recursive_descent() {
        assert_steps("$..C", &[Step::RecursiveDescent, name("C")]);
        assert_steps("$..*", &[Step::RecursiveDescent, Step::Wildcard]);
        assert_steps("$..[0]", &[Step::RecursiveDescent, Step::IndexSel(0)]);
    }

    #[test]
    fn test_filter_step() {
        let parsed = steps("$.Cars[?(@.Brand == 'Honda')]");
        assert_eq!(parsed.len(), 2);
        match &parsed[1] {
            Step::Filter(expr) => assert_eq!(expr.source, "@.Brand == 'Honda'"),
            other => panic!("expected filter, got {:?}", other),
        }
    }

    #[test]
    fn test_must_start_with_dollar() {
        let err = syntax_error(".A");
        assert_eq!(err.message, "path must start with a '$'");
        assert_eq!(err.offset, 0);
        syntax_error("@.A");
        syntax_error("");
    }

    #[test]
    fn test_dot_errors() {
        assert_eq!(syntax_error("$.").offset, 2);
        assert_eq!(syntax_error("$.1").message, "expected a child name or '*' after '.'");
    }

    #[test]
    fn test_scan_errors() {
        assert_eq!(syntax_error("$..").message, "cannot end with a scan '..'");
        assert_eq!(
            syntax_error("$..1").message,
            "unexpected token '1' after deep search '..'"
        );
    }

    #[test]
    fn test_bracket_errors() {
        assert_eq!(
            syntax_error("$.A[]").message,
            "expected at least one key, index or expression"
        );
        assert!(syntax_error("$[\"]").message.starts_with("bad string"));
        assert_eq!(syntax_error("$[A][0").message, "unexpected end of path");
        assert_eq!(syntax_error("$[B,C").message, "unexpected end of path");
        assert_eq!(syntax_error("$.A[1,4.2]").message, "unexpected token '.'");
        assert_eq!(syntax_error("$.A[:,]").message, "unexpected ',' in slice");
        assert_eq!(syntax_error("$[1,2:3]").message, "unexpected ':' in union");
    }

    #[test]
    fn test_stray_tokens() {
        assert_eq!(syntax_error("$.A*]").message, "unexpected token '*'");
        assert_eq!(syntax_error("$.*V").message, "unexpected token 'V'");
        assert_eq!(syntax_error("$.A*]").offset, 3);
    }

    #[test]
    fn test_slice_errors() {
        let err = syntax_error("$.A[1:4:0:0]");
        assert_eq!(err.message, "bad range syntax [start:end:step]");
        assert_eq!(err.offset, 9);
        assert_eq!(syntax_error("$.A[1:4:0]").message, "slice step cannot be zero");
        assert!(syntax_error("$[C:B]").message.starts_with("slice bounds must be integers"));
    }

    #[test]
    fn test_sub_path_accepts_current() {
        let (scope, path) = parse_sub_path("@.x[0]", 5, 1).unwrap();
        assert_eq!(scope, PathScope::Current);
        assert_eq!(path.steps().len(), 2);
        let (scope, _) = parse_sub_path("$.x", 0, 1).unwrap();
        assert_eq!(scope, PathScope::Root);
    }

    #[test]
    fn test_sub_path_offsets_are_absolute() {
        match parse_sub_path("@.", 20, 1) {
            Err(Error::Syntax(e)) => assert_eq!(e.offset, 22),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_filter_error_offsets_are_absolute() {
        match parse_path("$.a[?(@.b == nope)]") {
            Err(Error::Compile(crate::error::CompileError::UnknownConstant { name, offset })) => {
                assert_eq!(name, "nope");
                assert_eq!(offset, 13);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_filter_nesting_limit() {
        let mut source = String::from("$");
        for _ in 0..MAX_FILTER_DEPTH + 1 {
            source.push_str("[?(@");
        }
        for _ in 0..MAX_FILTER_DEPTH + 1 {
            source.push_str(" == 1)]");
        }
        let err = syntax_error(&source);
        assert!(err.message.starts_with("filters nested deeper than"));
    }

    #[test]
    fn test_input_size_limit() {
        let err = syntax_error(&"x".repeat(MAX_INPUT_SIZE + 1));
        assert_eq!(err.offset, 0);
        assert!(err.message.contains("exceeds the limit"));

        let at_limit = format!("$.{}", "x".repeat(MAX_INPUT_SIZE - 2));
        assert!(parse_path(&at_limit).is_ok());
    }

    #[test]
    fn test_compiled_path_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledPath>();

        let path = parse_path("$.a[?(@ > 1)]").unwrap();
        let lens: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| path.steps().len()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(lens, vec![2; 4]);
    }
}
