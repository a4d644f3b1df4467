use std::fmt;

use allocative::Allocative;

/// Represents the supported data types in the database schema.
/// These types define the structure of columns and the expected format of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Allocative)]
pub enum DataType {
    /// A 64-bit signed integer (`INT`).
    Int,
    /// A boolean value (`BOOL`).
    Bool,
    /// A single-precision floating-point number (`FLOAT`).
    Float,
    /// A double-precision floating-point number (`DOUBLE`).
    Double,
    /// A variable-length UTF-8 character string (`VARCHAR`).
    Text,
}

impl DataType {
    /// Maps a type keyword from a column definition to its [DataType].
    ///
    /// Keywords are matched case-insensitively. Returns `None` for anything
    /// that is not one of `INT`, `BOOL`, `FLOAT`, `DOUBLE` or `VARCHAR`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_uppercase().as_str() {
            "INT" => Some(Self::Int),
            "BOOL" => Some(Self::Bool),
            "FLOAT" => Some(Self::Float),
            "DOUBLE" => Some(Self::Double),
            "VARCHAR" => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            Self::Int => "INT",
            Self::Bool => "BOOL",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Text => "VARCHAR",
        };
        f.write_str(keyword)
    }
}
