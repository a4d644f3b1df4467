use std::{cmp::Ordering, fmt, sync::Arc};

use allocative::Allocative;

use crate::{
    data_type::DataType,
    error::{DbError, Result},
};

/// Represents a single data value stored in the database.
///
/// The variant is the value's tag: reassigning a cell replaces the whole
/// variant, so a cell takes the type of whatever was written last.
#[derive(Debug, Clone, PartialEq, Allocative)]
pub enum Value {
    /// An unset cell. Produced for omitted INSERT columns and for the
    /// missing side of an outer join; renders as `NULL`.
    None,
    /// A 64-bit signed integer value.
    Int(i64),
    /// A boolean value.
    Bool(bool),
    /// A single-precision floating-point value.
    Float(f32),
    /// A double-precision floating-point value.
    Double(f64),
    /// A UTF-8 string value, wrapped in an [Arc] for cheap cloning into
    /// joined and projected rows.
    Text(Arc<str>),
}

impl Value {
    /// Returns `true` if the value is [Value::None].
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the logical [DataType] corresponding to this value.
    ///
    /// Returns `None` for [Value::None], which carries no tag of its own.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::None => None,
            Self::Int(_) => Some(DataType::Int),
            Self::Bool(_) => Some(DataType::Bool),
            Self::Float(_) => Some(DataType::Float),
            Self::Double(_) => Some(DataType::Double),
            Self::Text(_) => Some(DataType::Text),
        }
    }

    /// Overwrites the cell. Both payload and tag come from `value`.
    pub fn set(&mut self, value: impl Into<Value>) {
        *self = value.into();
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            other => Err(other.read_mismatch(DataType::Int)),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(other.read_mismatch(DataType::Bool)),
        }
    }

    pub fn as_float(&self) -> Result<f32> {
        match self {
            Self::Float(f) => Ok(*f),
            other => Err(other.read_mismatch(DataType::Float)),
        }
    }

    pub fn as_double(&self) -> Result<f64> {
        match self {
            Self::Double(d) => Ok(*d),
            other => Err(other.read_mismatch(DataType::Double)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(other.read_mismatch(DataType::Text)),
        }
    }

    fn read_mismatch(&self, wanted: DataType) -> DbError {
        DbError::type_mismatch(format!("cannot read {self:?} as {wanted}"))
    }

    /// Orders two values of the same tag.
    ///
    /// # Errors
    /// Returns [DbError::TypeMismatch] when the tags differ or either side is
    /// [Value::None]. No coercion happens between numeric tags.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        let ordering = match (self, other) {
            (Self::Int(l), Self::Int(r)) => Some(l.cmp(r)),
            (Self::Bool(l), Self::Bool(r)) => Some(l.cmp(r)),
            (Self::Float(l), Self::Float(r)) => l.partial_cmp(r),
            (Self::Double(l), Self::Double(r)) => l.partial_cmp(r),
            (Self::Text(l), Self::Text(r)) => Some(l.cmp(r)),
            _ => {
                return Err(DbError::type_mismatch(format!(
                    "cannot compare {self:?} with {other:?}"
                )));
            }
        };
        ordering.ok_or_else(|| {
            DbError::type_mismatch(format!("{self:?} and {other:?} are unordered"))
        })
    }

    /// `==` with tag checking.
    pub fn eq_checked(&self, other: &Value) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Equal)
    }

    pub fn lt(&self, other: &Value) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Less)
    }

    pub fn gt(&self, other: &Value) -> Result<bool> {
        Ok(self.compare(other)? == Ordering::Greater)
    }

    pub fn le(&self, other: &Value) -> Result<bool> {
        Ok(self.compare(other)? != Ordering::Greater)
    }

    pub fn ge(&self, other: &Value) -> Result<bool> {
        Ok(self.compare(other)? != Ordering::Less)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("NULL"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Double(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(Arc::from(v))
    }
}
