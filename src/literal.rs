//! Classification of textual operands and literal-to-[Value] casting.
//!
//! These helpers are shared by predicate evaluation and by the INSERT /
//! SET clause handling, which receive their values as raw tokens.

use crate::{
    data_type::DataType,
    error::{DbError, Result},
    value::Value,
};

/// The kind of literal a token spells, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Numeric,
    Quoted,
    Boolean,
}

impl LiteralKind {
    /// Classifies `token`. Numeric wins over the others, which are disjoint.
    pub fn classify(token: &str) -> Option<Self> {
        if is_numeric(token) {
            Some(Self::Numeric)
        } else if is_quoted_string(token) {
            Some(Self::Quoted)
        } else if is_boolean_literal(token) {
            Some(Self::Boolean)
        } else {
            None
        }
    }
}

/// Optional leading minus, digits, then optionally a decimal point and more digits.
pub fn is_numeric(token: &str) -> bool {
    let unsigned = token.strip_prefix('-').unwrap_or(token);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(whole) && fraction.is_none_or(all_digits)
}

/// `true` when `token` is wrapped in one matching pair of `'` or `"`.
pub fn is_quoted_string(token: &str) -> bool {
    let mut chars = token.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return false;
    };
    (first == '\'' || first == '"') && last == first && !chars.as_str().contains(first)
}

pub fn is_boolean_literal(token: &str) -> bool {
    token == "true" || token == "false"
}

/// Removes every quote character from `token`.
pub fn strip_quotes(token: &str) -> String {
    token.chars().filter(|c| *c != '\'' && *c != '"').collect()
}

/// Casts a literal token to a value of the given column type.
///
/// `NULL` (any case) yields [Value::None]; whether that is allowed is the
/// caller's business. Strings must be quoted, booleans are `true`/`false`
/// in any case, numbers must pass [is_numeric] and fit the target type
/// (a FLOAT or DOUBLE that would overflow to infinity does not fit).
///
/// # Errors
/// [DbError::TypeMismatch] when the token cannot represent a `ty` value.
pub fn cast_literal(token: &str, ty: DataType) -> Result<Value> {
    let token = token.trim();
    if token.eq_ignore_ascii_case("NULL") {
        return Ok(Value::None);
    }

    let mismatch = || DbError::type_mismatch(format!("{token:?} is not a valid {ty} value"));

    match ty {
        DataType::Int if is_numeric(token) => {
            token.parse::<i64>().map(Value::Int).map_err(|_| mismatch())
        }
        DataType::Float if is_numeric(token) => match token.parse::<f32>() {
            Ok(x) if x.is_finite() => Ok(Value::Float(x)),
            _ => Err(mismatch()),
        },
        DataType::Double if is_numeric(token) => match token.parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(Value::Double(x)),
            _ => Err(mismatch()),
        },
        DataType::Bool if token.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
        DataType::Bool if token.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
        DataType::Text if is_quoted_string(token) => Ok(Value::from(strip_quotes(token))),
        _ => Err(mismatch()),
    }
}
