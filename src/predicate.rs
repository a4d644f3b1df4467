//! WHERE clause evaluation.
//!
//! A clause is tokenized once into a [Predicate] and then evaluated per row:
//! parenthesized groups are resolved recursively to a single truth value,
//! the remaining flat sequence is split into comparisons on `AND`/`OR`, and
//! the resulting truth values are folded with `AND` binding tighter than
//! `OR`. There is no expression tree.

use std::fmt;

use bitvec::prelude::*;
use tracing::warn;

use crate::{
    data_type::DataType,
    error::{DbError, Result},
    literal::{LiteralKind, cast_literal, strip_quotes},
    row::Row,
    table::Schema,
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl ComparisonOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(Self::Eq),
            "<" => Some(Self::Lt),
            ">" => Some(Self::Gt),
            "<=" => Some(Self::Le),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    /// The operator that gives the same answer with its operands swapped.
    pub fn flipped(self) -> Self {
        match self {
            Self::Eq => Self::Eq,
            Self::Lt => Self::Gt,
            Self::Gt => Self::Lt,
            Self::Le => Self::Ge,
            Self::Ge => Self::Le,
        }
    }

    /// Applies the operator. Both values must carry the same tag.
    pub fn apply(self, left: &Value, right: &Value) -> Result<bool> {
        match self {
            Self::Eq => left.eq_checked(right),
            Self::Lt => left.lt(right),
            Self::Gt => left.gt(right),
            Self::Le => left.le(right),
            Self::Ge => left.ge(right),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        })
    }
}

/// Atoms of a WHERE clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Column reference or unquoted literal (`order_id`, `126`, `-1.5`, `true`).
    Word(String),
    /// Quoted string literal, quotes retained.
    Quoted(String),
    LeftParen,
    RightParen,
    Op(ComparisonOp),
    And,
    Or,
}

/// Splits a WHERE clause into [Token]s with a left-to-right longest-match scan.
///
/// Characters that cannot start any token are skipped, as is a quote that
/// is never closed.
pub fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    let is_word_char = |c: char| c.is_alphanumeric() || c == '_' || c == '.';

    while pos < chars.len() {
        let ch = chars[pos];
        let next = chars.get(pos + 1).copied();
        match ch {
            c if c.is_whitespace() => pos += 1,
            '(' => {
                tokens.push(Token::LeftParen);
                pos += 1;
            }
            ')' => {
                tokens.push(Token::RightParen);
                pos += 1;
            }
            '<' | '>' | '=' => {
                let width = if ch != '=' && next == Some('=') { 2 } else { 1 };
                let symbol: String = chars[pos..pos + width].iter().collect();
                if let Some(op) = ComparisonOp::from_symbol(&symbol) {
                    tokens.push(Token::Op(op));
                }
                pos += width;
            }
            '"' | '\'' => match chars[pos + 1..].iter().position(|c| *c == ch) {
                Some(len) => {
                    let end = pos + 1 + len;
                    tokens.push(Token::Quoted(chars[pos..=end].iter().collect()));
                    pos = end + 1;
                }
                None => {
                    warn!(clause = text, "skipping unterminated quote");
                    pos += 1;
                }
            },
            c if is_word_char(c) || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let start = pos;
                pos += 1;
                while pos < chars.len() && is_word_char(chars[pos]) {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();
                tokens.push(match word.to_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    _ => Token::Word(word),
                });
            }
            other => {
                warn!(clause = text, character = ?other, "skipping unexpected character");
                pos += 1;
            }
        }
    }
    tokens
}

/// A tokenized WHERE clause, ready to be evaluated against rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    tokens: Vec<Token>,
}

impl Predicate {
    /// Tokenizes `text` and checks that its parentheses balance.
    ///
    /// # Errors
    /// [DbError::Syntax] for an empty clause or unbalanced parentheses.
    pub fn parse(text: &str) -> Result<Self> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(DbError::syntax(format!("empty condition {text:?}")));
        }

        let mut depth = 0usize;
        for token in &tokens {
            match token {
                Token::LeftParen => depth += 1,
                Token::RightParen => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| DbError::syntax(format!("unmatched ')' in {text:?}")))?;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(DbError::syntax(format!("unclosed '(' in {text:?}")));
        }

        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Evaluates the clause against one row described by `schema`.
    ///
    /// # Errors
    /// - [DbError::Syntax] for comparisons that are not `operand op operand`.
    /// - [DbError::UnknownIdentifier] for bare words that are neither a
    ///   column of `schema` nor a literal.
    /// - [DbError::TypeMismatch] when the two sides of a comparison disagree.
    pub fn evaluate(&self, row: &Row, schema: &Schema) -> Result<bool> {
        Evaluator { row, schema }.resolve_parens(&self.tokens)
    }

    /// Evaluates the clause against every row, returning one bit per row.
    ///
    /// Nothing is decided until every row has been evaluated, so an error
    /// leaves the caller free to abandon the statement untouched.
    pub fn select(&self, rows: &[Row], schema: &Schema) -> Result<BitVec> {
        let mut selection = BitVec::with_capacity(rows.len());
        for row in rows {
            selection.push(self.evaluate(row, schema)?);
        }
        Ok(selection)
    }
}

/// A flat-list entry: either an original token or a resolved group.
#[derive(Debug, Clone, Copy)]
enum Flat<'a> {
    Token(&'a Token),
    Truth(bool),
}

#[derive(Debug, Clone, Copy)]
enum Connector {
    And,
    Or,
}

/// Comparison operand after column lookup.
enum Operand<'a> {
    Column { ty: DataType, value: &'a Value },
    Literal { kind: LiteralKind, text: &'a str },
}

struct Evaluator<'a> {
    row: &'a Row,
    schema: &'a Schema,
}

impl<'a> Evaluator<'a> {
    /// Replaces every outermost parenthesized group with its truth value,
    /// recursing into the group's token range, then folds the flat list.
    fn resolve_parens(&self, tokens: &'a [Token]) -> Result<bool> {
        let mut flat = Vec::with_capacity(tokens.len());
        let mut pos = 0;
        while pos < tokens.len() {
            match &tokens[pos] {
                Token::LeftParen => {
                    let close = matching_paren(tokens, pos)?;
                    flat.push(Flat::Truth(self.resolve_parens(&tokens[pos + 1..close])?));
                    pos = close + 1;
                }
                Token::RightParen => return Err(DbError::syntax("unmatched ')'")),
                token => {
                    flat.push(Flat::Token(token));
                    pos += 1;
                }
            }
        }
        self.fold_flat(&flat)
    }

    /// Splits the flat list into comparisons, evaluates each one, then
    /// folds: pass one collapses `AND` pairs left to right, pass two ORs
    /// whatever is left.
    fn fold_flat(&self, flat: &[Flat<'a>]) -> Result<bool> {
        let mut truths = Vec::new();
        let mut connectors = Vec::new();
        let mut start = 0;
        for (pos, item) in flat.iter().enumerate() {
            let connector = match item {
                Flat::Token(Token::And) => Connector::And,
                Flat::Token(Token::Or) => Connector::Or,
                _ => continue,
            };
            truths.push(self.eval_comparison(&flat[start..pos])?);
            connectors.push(connector);
            start = pos + 1;
        }
        truths.push(self.eval_comparison(&flat[start..])?);

        let mut disjuncts = vec![truths[0]];
        for (connector, truth) in connectors.into_iter().zip(truths.into_iter().skip(1)) {
            match connector {
                Connector::And => {
                    if let Some(last) = disjuncts.last_mut() {
                        *last = *last && truth;
                    }
                }
                Connector::Or => disjuncts.push(truth),
            }
        }
        Ok(disjuncts.into_iter().any(|truth| truth))
    }

    fn eval_comparison(&self, items: &[Flat<'a>]) -> Result<bool> {
        match items {
            [Flat::Truth(truth)] => Ok(*truth),
            [Flat::Token(Token::Word(word))] if word == "true" || word == "false" => {
                Ok(word == "true")
            }
            [left, Flat::Token(Token::Op(op)), right] => {
                let left = self.resolve_operand(*left)?;
                let right = self.resolve_operand(*right)?;
                self.compare(left, *op, right)
            }
            [] => Err(DbError::syntax("empty comparison")),
            _ => Err(DbError::syntax(format!(
                "expected `operand op operand`, found {items:?}"
            ))),
        }
    }

    fn resolve_operand(&self, item: Flat<'a>) -> Result<Operand<'a>> {
        let word = match item {
            Flat::Truth(true) => {
                return Ok(Operand::Literal { kind: LiteralKind::Boolean, text: "true" });
            }
            Flat::Truth(false) => {
                return Ok(Operand::Literal { kind: LiteralKind::Boolean, text: "false" });
            }
            Flat::Token(Token::Quoted(text)) => {
                return Ok(Operand::Literal { kind: LiteralKind::Quoted, text });
            }
            Flat::Token(Token::Word(word)) => word.as_str(),
            Flat::Token(other) => {
                return Err(DbError::syntax(format!("{other:?} is not an operand")));
            }
        };

        if let Some(column) = self.column(word) {
            return Ok(column);
        }
        LiteralKind::classify(word)
            .map(|kind| Operand::Literal { kind, text: word })
            .ok_or_else(|| DbError::UnknownIdentifier(word.to_string()))
    }

    /// Looks `name` up as written or as a `table.column` spelling the
    /// schema knows about.
    fn column(&self, name: &str) -> Option<Operand<'a>> {
        let column = self.schema.resolve(name)?;
        let ty = self.schema.column_type(column)?;
        let value = self.row.get(column)?;
        Some(Operand::Column { ty, value })
    }

    fn compare(&self, left: Operand<'a>, op: ComparisonOp, right: Operand<'a>) -> Result<bool> {
        let (left, right) = match (left, right) {
            (Operand::Column { value: l, .. }, Operand::Column { value: r, .. }) => {
                (l.clone(), r.clone())
            }
            (Operand::Column { ty, value }, Operand::Literal { text, .. }) => {
                (value.clone(), cast_literal(text, ty)?)
            }
            (Operand::Literal { text, .. }, Operand::Column { ty, value }) => {
                (cast_literal(text, ty)?, value.clone())
            }
            (Operand::Literal { kind: lk, text: lt }, Operand::Literal { kind: rk, text: rt }) => {
                literal_pair(lk, lt, rk, rt)?
            }
        };

        // unset cells never satisfy a comparison
        if left.is_none() || right.is_none() {
            return Ok(false);
        }
        op.apply(&left, &right)
    }
}

/// Index of the `)` closing the `(` at `open`.
fn matching_paren(tokens: &[Token], open: usize) -> Result<usize> {
    let mut depth = 0usize;
    for (pos, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LeftParen => depth += 1,
            Token::RightParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(pos);
                }
            }
            _ => {}
        }
    }
    Err(DbError::syntax("unclosed '('"))
}

/// Both sides are literals: parse them by their shared kind.
fn literal_pair(
    left_kind: LiteralKind,
    left: &str,
    right_kind: LiteralKind,
    right: &str,
) -> Result<(Value, Value)> {
    match (left_kind, right_kind) {
        (LiteralKind::Numeric, LiteralKind::Numeric) => Ok((
            cast_literal(left, DataType::Double)?,
            cast_literal(right, DataType::Double)?,
        )),
        (LiteralKind::Quoted, LiteralKind::Quoted) => Ok((
            Value::from(strip_quotes(left)),
            Value::from(strip_quotes(right)),
        )),
        (LiteralKind::Boolean, LiteralKind::Boolean) => {
            Ok((Value::Bool(left == "true"), Value::Bool(right == "true")))
        }
        _ => Err(DbError::type_mismatch(format!(
            "cannot compare literals {left} and {right}"
        ))),
    }
}
