//! Single-pass compiler for the condition language
//!
//! The scan walks the expression once, left to right, with one character of
//! lookahead for two-character operators. Grouping is tracked with a stack of
//! [`GroupFrame`]s, one per open parenthesis, and each frame accepts exactly
//! one kind of connective: `a && b || c` is rejected, `(a && b) || c` is not.

use super::error::ConditionError;
use super::{Combinator, Condition, Literal, Operator, Predicate};

/// Compile an expression into a predicate tree.
///
/// ```
/// use rustmemodoc::condition::{compile, Condition, Literal, Operator};
///
/// let tree = compile("age > 18").unwrap();
/// assert_eq!(tree, Condition::predicate("age", Operator::Gt, Literal::Integer(18)));
/// ```
pub fn compile(expression: &str) -> Result<Condition, ConditionError> {
    ParserState::new(expression).run()
}

/// Token kind decided once from the character(s) at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    OpenParen,
    CloseParen,
    Connective(Combinator),
    Operator(Operator),
    Quote(char),
    Word,
}

/// What the grammar accepts next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Operand,
    Operator,
    Value,
    Connective,
}

/// Predicates collected at one nesting depth.
#[derive(Debug)]
struct GroupFrame {
    combinator: Option<Combinator>,
    items: Vec<Condition>,
    opened_at: usize,
}

impl GroupFrame {
    fn new(opened_at: usize) -> Self {
        Self {
            combinator: None,
            items: Vec::new(),
            opened_at,
        }
    }

    fn join(&mut self, combinator: Combinator, position: usize) -> Result<(), ConditionError> {
        match self.combinator {
            Some(existing) if existing != combinator => {
                Err(ConditionError::MixedOperator { position })
            }
            _ => {
                self.combinator = Some(combinator);
                Ok(())
            }
        }
    }

    fn finish(self, position: usize) -> Result<Condition, ConditionError> {
        match self.combinator {
            Some(combinator) => Ok(Condition::group(combinator, self.items)),
            None => self
                .items
                .into_iter()
                .next()
                .ok_or(ConditionError::MissingOperand {
                    position,
                    expected: "condition",
                }),
        }
    }
}

/// Leaf under construction.
#[derive(Debug, Default)]
struct PendingLeaf {
    name: Option<String>,
    op: Option<Operator>,
}

struct ParserState<'a> {
    source: &'a str,
    pos: usize,
    expect: Expect,
    frames: Vec<GroupFrame>,
    pending: PendingLeaf,
}

impl<'a> ParserState<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            expect: Expect::Operand,
            frames: vec![GroupFrame::new(0)],
            pending: PendingLeaf::default(),
        }
    }

    fn run(mut self) -> Result<Condition, ConditionError> {
        if self.source.trim().is_empty() {
            return Err(ConditionError::Empty);
        }

        loop {
            self.skip_whitespace();
            let Some(kind) = self.classify()? else {
                break;
            };
            self.step(kind)?;
        }

        self.finish()
    }

    fn step(&mut self, kind: TokenKind) -> Result<(), ConditionError> {
        let position = self.pos;
        match (self.expect, kind) {
            (Expect::Operand, TokenKind::OpenParen) => {
                self.advance(1);
                self.frames.push(GroupFrame::new(position));
            }
            (Expect::Operand, TokenKind::Word) => {
                let name = self.read_word();
                self.pending.name = Some(name.to_string());
                self.expect = Expect::Operator;
            }
            (Expect::Operand, TokenKind::Operator(_)) => {
                return Err(ConditionError::MissingOperand {
                    position,
                    expected: "field name",
                });
            }
            (Expect::Operand, _) => {
                return Err(ConditionError::MissingOperand {
                    position,
                    expected: "condition",
                });
            }
            (Expect::Operator, TokenKind::Operator(op)) => {
                self.advance(op.as_str().len());
                self.pending.op = Some(op);
                self.expect = Expect::Value;
            }
            (Expect::Value, TokenKind::Quote(quote)) => {
                let text = self.read_quoted(quote)?;
                self.push_leaf(Literal::Text(text.to_string()));
            }
            (Expect::Value, TokenKind::Word) => {
                let word = self.read_word();
                self.push_leaf(classify_literal(word));
            }
            (Expect::Value, _) => {
                return Err(ConditionError::MissingOperand {
                    position,
                    expected: "value",
                });
            }
            (Expect::Connective, TokenKind::Connective(combinator)) => {
                self.advance(2);
                self.current_frame().join(combinator, position)?;
                self.expect = Expect::Operand;
            }
            (Expect::Connective, TokenKind::CloseParen) => {
                self.advance(1);
                self.close_group(position)?;
            }
            _ => return Err(self.unexpected()),
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Condition, ConditionError> {
        let end = self.source.len();
        match self.expect {
            Expect::Connective => {}
            Expect::Operand => {
                return Err(ConditionError::MissingOperand {
                    position: end,
                    expected: "condition",
                });
            }
            Expect::Operator => {
                return Err(ConditionError::MissingOperand {
                    position: end,
                    expected: "operator",
                });
            }
            Expect::Value => {
                return Err(ConditionError::MissingOperand {
                    position: end,
                    expected: "value",
                });
            }
        }

        if self.frames.len() > 1 {
            let position = self.frames.last().map(|f| f.opened_at).unwrap_or(0);
            return Err(ConditionError::UnbalancedParenthesis { position });
        }

        match self.frames.pop() {
            Some(root) => root.finish(end),
            None => Err(ConditionError::Empty),
        }
    }

    fn push_leaf(&mut self, value: Literal) {
        let pending = std::mem::take(&mut self.pending);
        // Both halves are set by the Operand and Operator steps before Value is expected.
        if let (Some(name), Some(op)) = (pending.name, pending.op) {
            let leaf = Condition::Predicate(Predicate { name, op, value });
            self.current_frame().items.push(leaf);
        }
        self.expect = Expect::Connective;
    }

    fn close_group(&mut self, position: usize) -> Result<(), ConditionError> {
        if self.frames.len() < 2 {
            return Err(ConditionError::UnbalancedParenthesis { position });
        }
        let frame = self
            .frames
            .pop()
            .ok_or(ConditionError::UnbalancedParenthesis { position })?;
        let group = frame.finish(position)?;
        self.current_frame().items.push(group);
        self.expect = Expect::Connective;
        Ok(())
    }

    fn current_frame(&mut self) -> &mut GroupFrame {
        if self.frames.is_empty() {
            self.frames.push(GroupFrame::new(self.pos));
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn classify(&self) -> Result<Option<TokenKind>, ConditionError> {
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let next = self.peek_second();
        let kind = match (c, next) {
            ('(', _) => TokenKind::OpenParen,
            (')', _) => TokenKind::CloseParen,
            ('&', Some('&')) => TokenKind::Connective(Combinator::And),
            ('|', Some('|')) => TokenKind::Connective(Combinator::Or),
            ('>', Some('=')) => TokenKind::Operator(Operator::Gte),
            ('<', Some('=')) => TokenKind::Operator(Operator::Lte),
            ('=', Some('=')) => TokenKind::Operator(Operator::Eq),
            ('!', Some('=')) => TokenKind::Operator(Operator::Ne),
            ('>', _) => TokenKind::Operator(Operator::Gt),
            ('<', _) => TokenKind::Operator(Operator::Lt),
            ('~', _) => TokenKind::Operator(Operator::Like),
            ('\'' | '"', _) => TokenKind::Quote(c),
            (c, _) if is_delimiter(c) => return Err(self.unexpected()),
            _ => TokenKind::Word,
        };
        Ok(Some(kind))
    }

    fn read_word(&mut self) -> &'a str {
        let rest = &self.source[self.pos..];
        let len = rest
            .char_indices()
            .find(|(_, c)| c.is_whitespace() || is_delimiter(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn read_quoted(&mut self, quote: char) -> Result<&'a str, ConditionError> {
        let start = self.pos;
        let body = &self.source[start + 1..];
        match body.find(quote) {
            Some(len) => {
                self.pos = start + 1 + len + 1;
                Ok(&body[..len])
            }
            None => Err(ConditionError::UnterminatedString { position: start }),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.source[self.pos..].chars().nth(1)
    }

    fn advance(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.source.len());
    }

    fn unexpected(&self) -> ConditionError {
        let rest = &self.source[self.pos..];
        let found = rest
            .split_whitespace()
            .next()
            .unwrap_or(rest)
            .chars()
            .take(16)
            .collect();
        ConditionError::UnexpectedToken {
            position: self.pos,
            found,
        }
    }
}

/// Characters that end a bare word.
fn is_delimiter(c: char) -> bool {
    matches!(
        c,
        '(' | ')' | '&' | '|' | '=' | '!' | '>' | '<' | '~' | '\'' | '"'
    )
}

/// Decide the literal type of a bare value word.
fn classify_literal(word: &str) -> Literal {
    match word {
        "true" => return Literal::Bool(true),
        "false" => return Literal::Bool(false),
        "null" => return Literal::Null,
        _ => {}
    }

    // Exponent forms like `1e-5` are what `Literal::Float` renders to
    let digits = word.strip_prefix('-').unwrap_or(word);
    let numeric = digits.starts_with(|c: char| c.is_ascii_digit())
        && digits
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));

    if numeric {
        if let Ok(i) = word.parse::<i64>() {
            return Literal::Integer(i);
        }
        if let Ok(x) = word.parse::<f64>() {
            return Literal::Float(x);
        }
    }
    Literal::Text(word.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: &str, op: Operator, value: Literal) -> Condition {
        Condition::predicate(name, op, value)
    }

    #[test]
    fn test_quoted_string_value() {
        assert_eq!(
            compile("status == 'active'").unwrap(),
            leaf("status", Operator::Eq, Literal::Text("active".into()))
        );
    }

    #[test]
    fn test_double_quoted_string_keeps_inner_quote() {
        assert_eq!(
            compile(r#"name != "o'neil""#).unwrap(),
            leaf("name", Operator::Ne, Literal::Text("o'neil".into()))
        );
    }

    #[test]
    fn test_integer_value() {
        assert_eq!(
            compile("age > 18").unwrap(),
            leaf("age", Operator::Gt, Literal::Integer(18))
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            compile("flag == true").unwrap(),
            leaf("flag", Operator::Eq, Literal::Bool(true))
        );
        assert_eq!(
            compile("x == null").unwrap(),
            leaf("x", Operator::Eq, Literal::Null)
        );
        assert_eq!(
            compile("x==false").unwrap(),
            leaf("x", Operator::Eq, Literal::Bool(false))
        );
    }

    #[test]
    fn test_keyword_prefix_is_text() {
        assert_eq!(
            compile("x == trueish").unwrap(),
            leaf("x", Operator::Eq, Literal::Text("trueish".into()))
        );
    }

    #[test]
    fn test_negative_and_decimal_numbers() {
        assert_eq!(
            compile("t <= -4").unwrap(),
            leaf("t", Operator::Lte, Literal::Integer(-4))
        );
        assert_eq!(
            compile("t >= 1.25").unwrap(),
            leaf("t", Operator::Gte, Literal::Float(1.25))
        );
    }

    #[test]
    fn test_exponent_numbers() {
        assert_eq!(
            compile("x == 1e-5").unwrap(),
            leaf("x", Operator::Eq, Literal::Float(0.00001))
        );
        assert_eq!(
            compile("x < -2.5E20").unwrap(),
            leaf("x", Operator::Lt, Literal::Float(-2.5e20))
        );
        assert_eq!(
            compile("x == 1e").unwrap(),
            leaf("x", Operator::Eq, Literal::Text("1e".into()))
        );
    }

    #[test]
    fn test_small_and_large_floats_render_back() {
        for value in [0.00001, 1e20, -3.5e-300, f64::MAX] {
            let tree = leaf("x", Operator::Eq, Literal::Float(value));
            assert_eq!(compile(&tree.to_string()).unwrap(), tree, "{value:?}");
        }
    }

    #[test]
    fn test_longest_operator_match() {
        for (src, op) in [
            ("a>=1", Operator::Gte),
            ("a<=1", Operator::Lte),
            ("a>1", Operator::Gt),
            ("a<1", Operator::Lt),
            ("a!=1", Operator::Ne),
            ("a~1", Operator::Like),
        ] {
            assert_eq!(compile(src).unwrap(), leaf("a", op, Literal::Integer(1)), "{src}");
        }
    }

    #[test]
    fn test_dotted_field_path() {
        assert_eq!(
            compile("owner.name ~ 'ann'").unwrap(),
            leaf("owner.name", Operator::Like, Literal::Text("ann".into()))
        );
    }

    #[test]
    fn test_and_group_keeps_order() {
        let tree = compile("a == 1 && b == 2 && c == 3").unwrap();
        assert_eq!(
            tree,
            Condition::And {
                and: vec![
                    leaf("a", Operator::Eq, Literal::Integer(1)),
                    leaf("b", Operator::Eq, Literal::Integer(2)),
                    leaf("c", Operator::Eq, Literal::Integer(3)),
                ]
            }
        );
    }

    #[test]
    fn test_mixed_operators_rejected() {
        let err = compile("a==1 && b==2 || c==3").unwrap_err();
        assert!(matches!(err, ConditionError::MixedOperator { position: 13 }));
    }

    #[test]
    fn test_parentheses_disambiguate() {
        let tree = compile("(a==1 && b==2) || c==3").unwrap();
        assert_eq!(
            tree,
            Condition::Or {
                or: vec![
                    Condition::And {
                        and: vec![
                            leaf("a", Operator::Eq, Literal::Integer(1)),
                            leaf("b", Operator::Eq, Literal::Integer(2)),
                        ]
                    },
                    leaf("c", Operator::Eq, Literal::Integer(3)),
                ]
            }
        );
    }

    #[test]
    fn test_trailing_group_nests_right() {
        let tree = compile("a==1 || (b==2 && (c==3 || d==4))").unwrap();
        assert_eq!(
            tree,
            Condition::Or {
                or: vec![
                    leaf("a", Operator::Eq, Literal::Integer(1)),
                    Condition::And {
                        and: vec![
                            leaf("b", Operator::Eq, Literal::Integer(2)),
                            Condition::Or {
                                or: vec![
                                    leaf("c", Operator::Eq, Literal::Integer(3)),
                                    leaf("d", Operator::Eq, Literal::Integer(4)),
                                ]
                            },
                        ]
                    },
                ]
            }
        );
    }

    #[test]
    fn test_redundant_outer_parentheses_stripped() {
        assert_eq!(
            compile("((a == 1))").unwrap(),
            leaf("a", Operator::Eq, Literal::Integer(1))
        );
        assert_eq!(
            compile("(a == 1 && b == 2)").unwrap(),
            compile("a == 1 && b == 2").unwrap()
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            compile("name == 'bob").unwrap_err(),
            ConditionError::UnterminatedString { position: 8 }
        );
    }

    #[test]
    fn test_missing_field_name() {
        assert!(matches!(
            compile("== 1").unwrap_err(),
            ConditionError::MissingOperand {
                position: 0,
                expected: "field name"
            }
        ));
        assert!(matches!(
            compile("a == 1 && >= 2").unwrap_err(),
            ConditionError::MissingOperand {
                expected: "field name",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_value_and_trailing_connective() {
        assert!(matches!(
            compile("a ==").unwrap_err(),
            ConditionError::MissingOperand {
                expected: "value",
                ..
            }
        ));
        assert!(matches!(
            compile("a == 1 &&").unwrap_err(),
            ConditionError::MissingOperand {
                expected: "condition",
                ..
            }
        ));
    }

    #[test]
    fn test_unbalanced_parentheses() {
        assert!(matches!(
            compile("(a == 1").unwrap_err(),
            ConditionError::UnbalancedParenthesis { position: 0 }
        ));
        assert!(matches!(
            compile("a == 1)").unwrap_err(),
            ConditionError::UnbalancedParenthesis { position: 6 }
        ));
    }

    #[test]
    fn test_empty_and_garbage() {
        assert_eq!(compile("   ").unwrap_err(), ConditionError::Empty);
        assert!(matches!(
            compile("a b").unwrap_err(),
            ConditionError::UnexpectedToken { .. }
        ));
        assert!(matches!(
            compile("a == 1 & b == 2").unwrap_err(),
            ConditionError::UnexpectedToken { .. }
        ));
        assert!(matches!(
            compile("()").unwrap_err(),
            ConditionError::MissingOperand { .. }
        ));
    }
}
