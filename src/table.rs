use std::collections::{HashMap, HashSet};

use allocative::Allocative;
use bitvec::slice::BitSlice;

use crate::{
    data_type::DataType,
    error::{DbError, Result},
    row::Row,
    value::Value,
};

/// Column definition in the schema
#[derive(Debug, Clone, PartialEq, Allocative)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub not_null: bool,
    /// Table named by a `FOREIGN KEY REFERENCES (<table>)` modifier.
    pub references: Option<String>,
}

impl ColumnDef {
    /// A plain nullable column without modifiers.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            primary_key: false,
            not_null: false,
            references: None,
        }
    }
}

/// A column definition as written in CREATE TABLE, before the type of a
/// bare foreign-key column has been looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: Option<DataType>,
    pub primary_key: bool,
    pub not_null: bool,
    pub references: Option<String>,
}

impl ColumnSpec {
    /// Parses one column definition such as `supplier_name VARCHAR(20) NOT NULL`
    /// or `supplier_id FOREIGN KEY REFERENCES (suppliers)`.
    ///
    /// Modifiers are case-insensitive and may come in any order. The length
    /// in `VARCHAR(20)` is accepted and ignored.
    ///
    /// # Errors
    /// [DbError::Syntax] for anything that is not a well-formed definition,
    /// including a column with neither a type nor a foreign key.
    pub fn parse(text: &str) -> Result<Self> {
        let spaced = text.replace('(', " ( ").replace(')', " ) ");
        let words: Vec<&str> = spaced.split_whitespace().collect();
        let bad = |why: &str| DbError::syntax(format!("column definition {text:?}: {why}"));

        let (&name, mut rest) = words.split_first().ok_or_else(|| bad("empty"))?;
        if !is_identifier(name) {
            return Err(bad("invalid column name"));
        }

        let mut spec = Self {
            name: name.to_string(),
            data_type: None,
            primary_key: false,
            not_null: false,
            references: None,
        };

        if let Some(ty) = rest.first().and_then(|w| DataType::from_keyword(w)) {
            spec.data_type = Some(ty);
            rest = &rest[1..];
            if let ["(", len, ")", tail @ ..] = rest {
                if !len.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(bad("type length must be a number"));
                }
                rest = tail;
            }
        }

        while let Some((&word, tail)) = rest.split_first() {
            rest = match (word.to_uppercase().as_str(), tail) {
                ("PRIMARY", [key, tail @ ..]) if key.eq_ignore_ascii_case("KEY") => {
                    spec.primary_key = true;
                    tail
                }
                ("NOT", [null, tail @ ..]) if null.eq_ignore_ascii_case("NULL") => {
                    spec.not_null = true;
                    tail
                }
                ("FOREIGN", [key, refs, "(", table, ")", tail @ ..])
                    if key.eq_ignore_ascii_case("KEY") && refs.eq_ignore_ascii_case("REFERENCES") =>
                {
                    if !is_identifier(table) {
                        return Err(bad("invalid referenced table name"));
                    }
                    spec.references = Some(table.to_string());
                    tail
                }
                _ => return Err(bad(&format!("unexpected {word:?}"))),
            };
        }

        if spec.data_type.is_none() && spec.references.is_none() {
            return Err(bad("missing type"));
        }
        Ok(spec)
    }
}

pub(crate) fn is_identifier(word: &str) -> bool {
    !word.is_empty()
        && word.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !word.starts_with(|c: char| c.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Allocative)]
pub struct Schema {
    columns: Vec<ColumnDef>,
    types: HashMap<String, DataType>,
    /// `table.column` spellings that name a column of this schema.
    qualified: HashMap<String, String>,
}

impl Schema {
    /// # Errors
    /// [DbError::Syntax] if two columns share a name.
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        let mut types = HashMap::with_capacity(columns.len());
        for col in &columns {
            if types.insert(col.name.clone(), col.data_type).is_some() {
                return Err(DbError::syntax(format!("duplicate column {:?}", col.name)));
            }
        }
        Ok(Self {
            columns,
            types,
            qualified: HashMap::new(),
        })
    }

    /// Lets `qualifier.column` refer to `column`. The first registration of
    /// a spelling wins; unknown columns are ignored.
    pub fn add_qualified(&mut self, qualifier: &str, source_column: &str, column: &str) {
        if self.types.contains_key(column) {
            self.qualified
                .entry(format!("{qualifier}.{source_column}"))
                .or_insert_with(|| column.to_string());
        }
    }

    /// Resolves a column name as written, either exactly or through a
    /// registered `table.column` spelling.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        match self.types.get_key_value(name) {
            Some((column, _)) => Some(column.as_str()),
            None => self.qualified.get(name).map(String::as_str),
        }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_type(&self, name: &str) -> Option<DataType> {
        self.types.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A recorded foreign-key edge. Descriptive only: inserts are not checked
/// against it.
#[derive(Debug, Clone, PartialEq, Eq, Allocative)]
pub struct Connection {
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    /// Primary key of the referenced table (empty when it declares none).
    pub referenced_column: String,
}

#[derive(Debug, Clone, Allocative)]
pub struct Table {
    pub name: String,
    pub schema: Schema,
    primary_key: Option<String>,
    not_null: HashSet<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: String, mut schema: Schema) -> Self {
        let names: Vec<String> = schema.names().map(str::to_string).collect();
        for column in &names {
            schema.add_qualified(&name, column, column);
        }
        let primary_key = schema
            .columns()
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.clone());
        let not_null = schema
            .columns()
            .iter()
            .filter(|c| c.not_null)
            .map(|c| c.name.clone())
            .collect();
        Self {
            name,
            schema,
            primary_key,
            not_null,
            rows: Vec::new(),
        }
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    pub fn is_not_null(&self, column: &str) -> bool {
        self.not_null.contains(column)
    }

    pub fn not_null_columns(&self) -> impl Iterator<Item = &str> {
        self.not_null.iter().map(String::as_str)
    }

    /// insert a new row, values given in declared column order
    ///
    /// # Errors
    /// - [DbError::Syntax] when the value count differs from the column count.
    /// - [DbError::TypeMismatch] when a value's tag differs from its column's type.
    /// - [DbError::MissingNotNull] when a NOT NULL column receives [Value::None].
    pub fn insert(&mut self, values: Vec<Value>) -> Result<()> {
        if values.len() != self.schema.len() {
            return Err(DbError::syntax(format!(
                "table {:?} has {} columns but {} values were supplied",
                self.name,
                self.schema.len(),
                values.len()
            )));
        }

        let mut row = Row::new(self.schema.names());
        for (col, value) in self.schema.columns().iter().zip(values) {
            self.check_assignable(&col.name, &value)?;
            row.set(&col.name, value)?;
        }
        self.rows.push(row);
        Ok(())
    }

    /// Checks that `value` may be stored under `column`.
    pub fn check_assignable(&self, column: &str, value: &Value) -> Result<()> {
        let ty = self
            .schema
            .column_type(column)
            .ok_or_else(|| DbError::UnknownColumn(format!("{}.{column}", self.name)))?;
        match value.data_type() {
            None if self.is_not_null(column) => {
                Err(DbError::MissingNotNull(format!("{}.{column}", self.name)))
            }
            Some(actual) if actual != ty => Err(DbError::type_mismatch(format!(
                "column {column:?} is {ty}, got {value:?}"
            ))),
            _ => Ok(()),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn get_row(&self, row_idx: usize) -> Option<&Row> {
        self.rows.get(row_idx)
    }

    /// Overwrites `assignments` in every selected row.
    ///
    /// Assignments must already have passed [Table::check_assignable].
    pub fn update_selected(
        &mut self,
        selection: &BitSlice,
        assignments: &[(String, Value)],
    ) -> Result<usize> {
        let mut touched = 0;
        for (row, _) in self
            .rows
            .iter_mut()
            .zip(selection.iter().by_vals())
            .filter(|(_, selected)| *selected)
        {
            for (column, value) in assignments {
                row.set(column, value.clone())?;
            }
            touched += 1;
        }
        Ok(touched)
    }

    /// Removes every selected row, keeping the relative order of the rest.
    pub fn delete_selected(&mut self, selection: &BitSlice) -> usize {
        let before = self.rows.len();
        let mut flags = selection.iter().by_vals();
        self.rows.retain(|_| !flags.next().unwrap_or(false));
        before - self.rows.len()
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.rows.len();
        self.rows.clear();
        removed
    }
}
