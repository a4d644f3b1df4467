//! Parsed statements.
//!
//! Clause bodies the engine interprets itself (column definitions, value
//! literals, ON / SET / WHERE text) are kept as raw source slices.

use crate::join::JoinKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    DropTable(DropTable),
    InsertInto(InsertInto),
    Select(Select),
    Update(Update),
    Delete(Delete),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    /// One raw definition per column, e.g. `supplier_id INT PRIMARY KEY`.
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertInto {
    pub table: String,
    pub columns: Option<Vec<String>>,
    /// Raw literal tokens, quotes retained.
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnsSelect {
    Star,
    /// Bare (`c`) or qualified (`t.c`) column names.
    ColumnsNames(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    pub on: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub columns: ColumnsSelect,
    pub table: String,
    pub join: Option<JoinClause>,
    pub where_clause: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    /// Raw `col = value, ...` text.
    pub assignments: String,
    pub where_clause: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub where_clause: Option<String>,
}
