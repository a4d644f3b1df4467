use std::{collections::HashMap, fmt};

use allocative::Allocative;
use bitvec::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    ast::{ColumnsSelect, CreateTable, Delete, InsertInto, Select, Statement, Update},
    error::{DbError, Result},
    join::{JoinCondition, nested_loop_join, resolve_projection},
    literal::cast_literal,
    parser::{parse_statement, split_top_level},
    predicate::Predicate,
    table::{ColumnDef, ColumnSpec, Connection, Schema, Table, is_identifier},
    value::Value,
};

/// What `CREATE TABLE` does when the name is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Allocative)]
pub enum DuplicateTablePolicy {
    /// Fail with [DbError::DuplicateTable].
    #[default]
    Reject,
    /// Replace the existing table and its rows.
    Overwrite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Allocative)]
pub struct Config {
    pub duplicate_tables: DuplicateTablePolicy,
}

/// The main entry point for the in-memory database engine.
/// It owns every table and orchestrates statement execution.
#[derive(Debug, Default, Allocative)]
pub struct Database {
    /// A map of table names to their respective [Table] structures.
    tables: HashMap<String, Table>,
    /// Foreign-key edges recorded by `CREATE TABLE`, in creation order.
    connections: Vec<Connection>,
    config: Config,
}

/// Represents the result of a successful `SELECT` query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// The names of the columns included in the result set.
    pub columns: Vec<String>,
    /// One vector of [Value]s per matching row, aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

/// One line per row, values separated by a single space, `NULL` for unset cells.
impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{value}")?;
            }
        }
        Ok(())
    }
}

impl Database {
    /// Creates a new, empty database with the default [Config].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Retrieves a reference to a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Retrieves a mutable reference to a table by name.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Returns the names of all tables, sorted.
    pub fn list_tables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Recorded foreign-key edges. They are never enforced.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Bytes of heap memory owned by the database (tables, rows, metadata).
    pub fn heap_size(&self) -> usize {
        allocative::size_of_unique(self)
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::UnknownTable(name.to_string()))
    }

    /// Executes a statement that modifies the database (DDL/DML).
    ///
    /// For data retrieval, use [Database::query] instead.
    ///
    /// # Errors
    /// Any [DbError] raised while parsing or executing; a `SELECT` is
    /// rejected with [DbError::Syntax].
    ///
    /// # Example
    /// ```
    /// use minidb::{Database, Value};
    /// let mut db = Database::new();
    /// db.execute("CREATE TABLE users (id INT, name VARCHAR)").unwrap();
    /// db.execute("INSERT INTO users VALUES (1, \"Alice\")").unwrap();
    /// db.execute("DELETE FROM users WHERE id > 12").unwrap();
    ///
    /// let result = db.query("SELECT * FROM users").unwrap();
    /// assert_eq!(result.rows[0][1], Value::from("Alice"));
    /// ```
    pub fn execute(&mut self, sql: &str) -> Result<()> {
        match self.run(sql)? {
            None => Ok(()),
            Some(_) => Err(DbError::syntax(
                "SELECT returns rows, use `query` instead of `execute`",
            )),
        }
    }

    /// Executes a `SELECT` statement.
    ///
    /// # Example
    /// ```
    /// use minidb::Database;
    /// let mut db = Database::new();
    /// db.execute("CREATE TABLE t (a INT, b BOOL)").unwrap();
    /// db.execute("INSERT INTO t VALUES (1, true)").unwrap();
    /// db.execute("INSERT INTO t (a) VALUES (2)").unwrap();
    ///
    /// let result = db.query("SELECT * FROM t WHERE a > 0").unwrap();
    /// assert_eq!(result.columns, ["a", "b"]);
    /// assert_eq!(result.to_string(), "1 true\n2 NULL");
    /// ```
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        match parse_statement(sql)? {
            Statement::Select(select) => self.select(&select),
            other => Err(DbError::syntax(format!(
                "{other:?} is not a query, use `execute` instead"
            ))),
        }
    }

    /// Executes any statement; only `SELECT` produces a [QueryResult].
    pub fn run(&mut self, sql: &str) -> Result<Option<QueryResult>> {
        let statement = parse_statement(sql)?;
        debug!(?statement, "executing");

        match statement {
            Statement::CreateTable(create) => self.create_table(create)?,
            Statement::DropTable(drop) => self.drop_table(&drop.name)?,
            Statement::InsertInto(insert) => self.insert(insert)?,
            Statement::Update(update) => {
                self.update(&update)?;
            }
            Statement::Delete(delete) => {
                self.delete(&delete)?;
            }
            Statement::Select(select) => return self.select(&select).map(Some),
        }
        Ok(None)
    }

    /// Creates a table from its raw column definitions.
    ///
    /// A foreign-key column without a type takes the type of the referenced
    /// table's primary key. The edge is recorded in [Database::connections]
    /// only when the referenced table exists.
    ///
    /// # Errors
    /// - [DbError::DuplicateTable] if the name is taken and the policy is
    ///   [DuplicateTablePolicy::Reject].
    /// - [DbError::Syntax] for malformed definitions, duplicate column
    ///   names or an untyped column whose type cannot be inferred.
    pub fn create_table(&mut self, create: CreateTable) -> Result<()> {
        let CreateTable { name, columns } = create;
        if !is_identifier(&name) {
            return Err(DbError::syntax(format!("invalid table name {name:?}")));
        }
        let exists = self.tables.contains_key(&name);
        if exists && self.config.duplicate_tables == DuplicateTablePolicy::Reject {
            return Err(DbError::DuplicateTable(name));
        }

        let mut defs = Vec::with_capacity(columns.len());
        let mut connections = Vec::new();
        for text in &columns {
            let spec = ColumnSpec::parse(text)?;
            let referenced = spec.references.as_deref().and_then(|t| self.tables.get(t));

            let data_type = match (spec.data_type, referenced) {
                (Some(ty), _) => ty,
                (None, Some(target)) => target
                    .primary_key()
                    .and_then(|pk| target.schema.column_type(pk))
                    .ok_or_else(|| {
                        DbError::syntax(format!(
                            "column {:?} has no type and {:?} has no primary key",
                            spec.name, target.name
                        ))
                    })?,
                (None, None) => {
                    return Err(DbError::syntax(format!(
                        "column {:?} has no type and references unknown table {:?}",
                        spec.name,
                        spec.references.as_deref().unwrap_or_default()
                    )));
                }
            };

            match (&spec.references, referenced) {
                (Some(_), Some(target)) => connections.push(Connection {
                    table: name.clone(),
                    column: spec.name.clone(),
                    referenced_table: target.name.clone(),
                    referenced_column: target.primary_key().unwrap_or_default().to_string(),
                }),
                (Some(missing), None) => warn!(
                    table = %name,
                    column = %spec.name,
                    referenced = %missing,
                    "foreign key references a table that does not exist, not recorded"
                ),
                (None, _) => {}
            }

            defs.push(ColumnDef {
                name: spec.name,
                data_type,
                primary_key: spec.primary_key,
                not_null: spec.not_null,
                references: spec.references,
            });
        }

        let schema = Schema::new(defs)?;
        if exists {
            warn!(table = %name, "overwriting existing table");
            self.connections.retain(|c| c.table != name);
        }
        info!(table = %name, columns = schema.len(), "table created");
        self.connections.extend(connections);
        self.tables.insert(name.clone(), Table::new(name, schema));
        Ok(())
    }

    /// Removes a table and its rows. Connections that mention it are kept.
    ///
    /// # Errors
    /// [DbError::UnknownTable] if the table does not exist.
    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        match self.tables.remove(name) {
            Some(table) => {
                info!(table = %name, rows = table.row_count(), "table dropped");
                Ok(())
            }
            None => Err(DbError::UnknownTable(name.to_string())),
        }
    }

    /// Inserts one row.
    ///
    /// With an explicit column list the values are mapped by name and the
    /// remaining columns are left unset.
    ///
    /// # Errors
    /// - [DbError::UnknownTable] / [DbError::UnknownColumn] for bad names.
    /// - [DbError::Syntax] when the number of values differs from the
    ///   number of columns, or a column is listed twice.
    /// - [DbError::MissingNotNull] if a NOT NULL column is left out or set to `NULL`.
    /// - [DbError::TypeMismatch] if a value cannot be cast to its column's type.
    pub fn insert(&mut self, insert: InsertInto) -> Result<()> {
        let table = self.table_mut(&insert.table)?;

        let columns: Vec<String> = match insert.columns {
            Some(columns) => columns,
            None => table.schema.names().map(str::to_string).collect(),
        };
        for (i, column) in columns.iter().enumerate() {
            if !table.schema.contains(column) {
                return Err(DbError::UnknownColumn(format!("{}.{column}", table.name)));
            }
            if columns[..i].contains(column) {
                return Err(DbError::syntax(format!("column {column:?} listed twice")));
            }
        }
        if columns.len() != insert.values.len() {
            return Err(DbError::syntax(format!(
                "{} columns but {} values",
                columns.len(),
                insert.values.len()
            )));
        }
        if let Some(missing) = table
            .not_null_columns()
            .find(|c| !columns.iter().any(|given| given == c))
        {
            return Err(DbError::MissingNotNull(format!("{}.{missing}", table.name)));
        }

        let mut provided: HashMap<&str, &str> = columns
            .iter()
            .map(String::as_str)
            .zip(insert.values.iter().map(String::as_str))
            .collect();

        let values = table
            .schema
            .columns()
            .iter()
            .map(|col| match provided.remove(col.name.as_str()) {
                Some(token) => cast_literal(token, col.data_type),
                None => Ok(Value::None),
            })
            .collect::<Result<Vec<_>>>()?;

        table.insert(values)?;
        debug!(table = %insert.table, rows = table.row_count(), "row inserted");
        Ok(())
    }

    /// Runs a `SELECT` in one of its four shapes: plain, filtered, joined,
    /// or joined and filtered.
    ///
    /// Without a join the result lists the requested columns in the
    /// table's declared order; `*` selects them all.
    pub fn select(&self, select: &Select) -> Result<QueryResult> {
        let table = self.table(&select.table)?;
        let filter = select.where_clause.as_deref().map(Predicate::parse).transpose()?;

        if let Some(join) = &select.join {
            let right = self.table(&join.table)?;
            let projection = match &select.columns {
                ColumnsSelect::Star => resolve_projection(None, table, right)?,
                ColumnsSelect::ColumnsNames(names) => {
                    resolve_projection(Some(names.as_slice()), table, right)?
                }
            };
            let condition = JoinCondition::parse(&join.on, table, right)?;
            let output = nested_loop_join(
                &projection,
                table,
                right,
                &condition,
                join.kind,
                filter.as_ref(),
            )?;

            return Ok(QueryResult {
                columns: output.schema.names().map(str::to_string).collect(),
                rows: output
                    .rows
                    .iter()
                    .map(|row| row.values().cloned().collect())
                    .collect(),
            });
        }

        let columns = plain_columns(table, &select.columns)?;
        let selection = match &filter {
            Some(predicate) => predicate.select(table.rows(), &table.schema)?,
            None => bitvec![1; table.row_count()],
        };

        let rows: Vec<Vec<Value>> = table
            .rows()
            .iter()
            .zip(selection.iter().by_vals())
            .filter(|(_, selected)| *selected)
            .map(|(row, _)| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::None))
                    .collect()
            })
            .collect();

        debug!(table = %table.name, rows = rows.len(), "select finished");
        Ok(QueryResult { columns, rows })
    }

    /// Applies `col = value, ...` to every row matching the WHERE clause
    /// (all rows without one) and returns how many rows were touched.
    ///
    /// All values are cast and checked and every row is evaluated before
    /// the first row is written, so a failing statement changes nothing.
    pub fn update(&mut self, update: &Update) -> Result<usize> {
        let table = self.table_mut(&update.table)?;

        let mut assignments: Vec<(String, Value)> = Vec::new();
        for item in split_top_level(&update.assignments, ',') {
            let (column, token) = item
                .split_once('=')
                .ok_or_else(|| DbError::syntax(format!("expected `column = value`, got {item:?}")))?;
            let column = column.trim();
            if !is_identifier(column) {
                return Err(DbError::syntax(format!("invalid column name {column:?}")));
            }
            let ty = table
                .schema
                .column_type(column)
                .ok_or_else(|| DbError::UnknownColumn(format!("{}.{column}", table.name)))?;
            let value = cast_literal(token, ty)?;
            table.check_assignable(column, &value)?;
            assignments.push((column.to_string(), value));
        }

        let selection = match update.where_clause.as_deref() {
            Some(text) => Predicate::parse(text)?.select(table.rows(), &table.schema)?,
            None => bitvec![1; table.row_count()],
        };

        let touched = table.update_selected(&selection, &assignments)?;
        debug!(table = %update.table, rows = touched, "rows updated");
        Ok(touched)
    }

    /// Removes every row matching the WHERE clause (all rows without one)
    /// and returns how many were removed. Remaining rows keep their order.
    pub fn delete(&mut self, delete: &Delete) -> Result<usize> {
        let table = self.table_mut(&delete.table)?;

        let removed = match delete.where_clause.as_deref() {
            Some(text) => {
                let selection = Predicate::parse(text)?.select(table.rows(), &table.schema)?;
                table.delete_selected(&selection)
            }
            None => table.clear(),
        };

        debug!(table = %delete.table, rows = removed, "rows deleted");
        Ok(removed)
    }
}

/// Checks the requested names against `table` and returns them in
/// declared order. `table.column` is accepted for the queried table.
fn plain_columns(table: &Table, select: &ColumnsSelect) -> Result<Vec<String>> {
    let requested = match select {
        ColumnsSelect::Star => return Ok(table.schema.names().map(str::to_string).collect()),
        ColumnsSelect::ColumnsNames(names) => names,
    };

    let mut bare = Vec::with_capacity(requested.len());
    for name in requested {
        let column = match name.split_once('.') {
            Some((qualifier, column)) if qualifier == table.name => column,
            Some(_) => return Err(DbError::UnknownColumn(name.clone())),
            None => name.as_str(),
        };
        if !table.schema.contains(column) {
            return Err(DbError::UnknownColumn(name.clone()));
        }
        if bare.contains(&column) {
            return Err(DbError::syntax(format!("column {column} is selected twice")));
        }
        bare.push(column);
    }

    Ok(table
        .schema
        .names()
        .filter(|c| bare.contains(c))
        .map(str::to_string)
        .collect())
}
