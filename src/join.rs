//! Two-table nested-loop join with INNER / LEFT / RIGHT semantics.

use std::collections::HashMap;

use tracing::debug;

use crate::{
    error::{DbError, Result},
    predicate::{ComparisonOp, Predicate, Token, tokenize},
    row::Row,
    table::{ColumnDef, Schema, Table},
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    /// Maps the keyword in front of `JOIN`; a plain `JOIN` is an inner join.
    pub fn from_keyword(keyword: Option<&str>) -> Result<Self> {
        match keyword.map(str::to_uppercase).as_deref() {
            None | Some("INNER") => Ok(Self::Inner),
            Some("LEFT") => Ok(Self::Left),
            Some("RIGHT") => Ok(Self::Right),
            Some(other) => Err(DbError::syntax(format!("unknown join kind {other:?}"))),
        }
    }
}

/// Which input table a projected column is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// A projected column of a join: its source and its output name.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub side: Side,
    pub table: String,
    pub column: String,
    pub output_name: String,
}

/// Resolves the SELECT list of a join against both tables.
///
/// Items are `table.column` or a bare column found in exactly one table;
/// `None` projects every left column followed by every right column.
/// Output columns keep their bare name unless two projected columns share
/// it, in which case both are named `table.column`.
///
/// # Errors
/// [DbError::UnknownTable], [DbError::UnknownColumn], or
/// [DbError::Syntax] for an ambiguous bare column.
pub fn resolve_projection(
    columns: Option<&[String]>,
    left: &Table,
    right: &Table,
) -> Result<Vec<ColumnRef>> {
    let mut sources: Vec<(Side, &Table, String)> = Vec::new();
    match columns {
        None => {
            for (side, table) in [(Side::Left, left), (Side::Right, right)] {
                sources.extend(table.schema.names().map(|c| (side, table, c.to_string())));
            }
        }
        Some(items) => {
            for item in items {
                sources.push(resolve_column(item, left, right)?);
            }
        }
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (_, _, column) in &sources {
        *seen.entry(column.as_str()).or_default() += 1;
    }

    Ok(sources
        .iter()
        .map(|(side, table, column)| ColumnRef {
            side: *side,
            table: table.name.clone(),
            column: column.clone(),
            output_name: if seen[column.as_str()] > 1 {
                format!("{}.{column}", table.name)
            } else {
                column.clone()
            },
        })
        .collect())
}

fn resolve_column<'t>(
    item: &str,
    left: &'t Table,
    right: &'t Table,
) -> Result<(Side, &'t Table, String)> {
    if let Some((table_name, column)) = item.split_once('.') {
        let (side, table) = side_of(table_name, left, right)?;
        if !table.schema.contains(column) {
            return Err(DbError::UnknownColumn(item.to_string()));
        }
        return Ok((side, table, column.to_string()));
    }

    match (left.schema.contains(item), right.schema.contains(item)) {
        (true, true) => Err(DbError::syntax(format!(
            "column {item:?} is ambiguous between {:?} and {:?}",
            left.name, right.name
        ))),
        (true, false) => Ok((Side::Left, left, item.to_string())),
        (false, true) => Ok((Side::Right, right, item.to_string())),
        (false, false) => Err(DbError::UnknownColumn(item.to_string())),
    }
}

fn side_of<'t>(name: &str, left: &'t Table, right: &'t Table) -> Result<(Side, &'t Table)> {
    if name == left.name {
        Ok((Side::Left, left))
    } else if name == right.name {
        Ok((Side::Right, right))
    } else {
        Err(DbError::UnknownTable(name.to_string()))
    }
}

/// `left_column OP right_column`, oriented so the left column always
/// belongs to the left table.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinCondition {
    pub left_column: String,
    pub op: ComparisonOp,
    pub right_column: String,
}

impl JoinCondition {
    /// Parses an ON clause of the shape `t1.c1 OP t2.c2`.
    ///
    /// The two qualifiers may name the tables in either order; the operator
    /// is flipped when they are swapped.
    ///
    /// # Errors
    /// - [DbError::Syntax] if the clause has any other shape.
    /// - [DbError::UnknownTable] / [DbError::UnknownColumn] for bad references.
    /// - [DbError::TypeMismatch] if the two columns are declared with different types.
    pub fn parse(text: &str, left: &Table, right: &Table) -> Result<Self> {
        let tokens = tokenize(text);
        let [Token::Word(first), Token::Op(op), Token::Word(second)] = tokens.as_slice() else {
            return Err(DbError::syntax(format!(
                "ON clause must be `table.column op table.column`, got {text:?}"
            )));
        };

        let qualified = |word: &str| -> Result<(String, String)> {
            word.split_once('.')
                .map(|(t, c)| (t.to_string(), c.to_string()))
                .ok_or_else(|| DbError::syntax(format!("ON operand {word:?} must be qualified")))
        };
        let (first_table, first_column) = qualified(first.as_str())?;
        let (second_table, second_column) = qualified(second.as_str())?;

        let condition = if first_table == left.name && second_table == right.name {
            Self {
                left_column: first_column,
                op: *op,
                right_column: second_column,
            }
        } else if first_table == right.name && second_table == left.name {
            Self {
                left_column: second_column,
                op: op.flipped(),
                right_column: first_column,
            }
        } else {
            let known = |t: &str| t == left.name || t == right.name;
            return Err(match (known(first_table.as_str()), known(second_table.as_str())) {
                (false, _) => DbError::UnknownTable(first_table),
                (_, false) => DbError::UnknownTable(second_table),
                _ => DbError::syntax(format!(
                    "ON clause must compare a column of {:?} with a column of {:?}",
                    left.name, right.name
                )),
            });
        };

        let left_type = left.schema.column_type(&condition.left_column).ok_or_else(|| {
            DbError::UnknownColumn(format!("{}.{}", left.name, condition.left_column))
        })?;
        let right_type = right.schema.column_type(&condition.right_column).ok_or_else(|| {
            DbError::UnknownColumn(format!("{}.{}", right.name, condition.right_column))
        })?;
        if left_type != right_type {
            return Err(DbError::type_mismatch(format!(
                "cannot join {} column {:?} with {} column {:?}",
                left_type, condition.left_column, right_type, condition.right_column
            )));
        }

        Ok(condition)
    }

    /// Unset cells on either side never match.
    fn matches(&self, left: &Row, right: &Row) -> Result<bool> {
        match (left.get(&self.left_column), right.get(&self.right_column)) {
            (Some(l), Some(r)) if !l.is_none() && !r.is_none() => self.op.apply(l, r),
            _ => Ok(false),
        }
    }
}

/// Rows produced by a join, together with the schema describing them.
#[derive(Debug, Clone)]
pub struct JoinOutput {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

/// Joins `left` and `right` with a nested loop.
///
/// The outer loop runs over `left` for INNER and LEFT joins and over
/// `right` for RIGHT joins. Every matching pair emits one row; for outer
/// joins an outer row without any match still emits one row whose other
/// side is [Value::None]. When `filter` is given, only rows satisfying it
/// are kept; its `table.column` operands resolve only to projected columns
/// read from that table.
pub fn nested_loop_join(
    projection: &[ColumnRef],
    left: &Table,
    right: &Table,
    condition: &JoinCondition,
    kind: JoinKind,
    filter: Option<&Predicate>,
) -> Result<JoinOutput> {
    let mut schema = Schema::new(
        projection
            .iter()
            .map(|col| {
                let source = if col.side == Side::Left { left } else { right };
                let ty = source
                    .schema
                    .column_type(&col.column)
                    .ok_or_else(|| DbError::UnknownColumn(col.column.clone()))?;
                Ok(ColumnDef::new(col.output_name.clone(), ty))
            })
            .collect::<Result<Vec<_>>>()?,
    )?;
    // `table.column` in the filter reaches a projected column of that table only
    for col in projection {
        schema.add_qualified(&col.table, &col.column, &col.output_name);
    }

    let build = |l: Option<&Row>, r: Option<&Row>| -> Result<Row> {
        let mut row = Row::new(projection.iter().map(|col| col.output_name.as_str()));
        for col in projection {
            let source = if col.side == Side::Left { l } else { r };
            let value = source
                .and_then(|src| src.get(&col.column))
                .cloned()
                .unwrap_or(Value::None);
            row.set(&col.output_name, value)?;
        }
        Ok(row)
    };

    let mut rows = Vec::new();
    let mut emit = |row: Row| -> Result<()> {
        let keep = match filter {
            Some(predicate) => predicate.evaluate(&row, &schema)?,
            None => true,
        };
        if keep {
            rows.push(row);
        }
        Ok(())
    };

    let (outer, inner) = match kind {
        JoinKind::Inner | JoinKind::Left => (left, right),
        JoinKind::Right => (right, left),
    };
    for outer_row in outer.rows() {
        let mut matched = false;
        for inner_row in inner.rows() {
            let (l, r) = match kind {
                JoinKind::Right => (inner_row, outer_row),
                _ => (outer_row, inner_row),
            };
            if condition.matches(l, r)? {
                matched = true;
                emit(build(Some(l), Some(r))?)?;
            }
        }
        match kind {
            JoinKind::Left if !matched => emit(build(Some(outer_row), None)?)?,
            JoinKind::Right if !matched => emit(build(None, Some(outer_row))?)?,
            _ => {}
        }
    }

    debug!(
        left = %left.name,
        right = %right.name,
        ?kind,
        rows = rows.len(),
        "join finished"
    );
    Ok(JoinOutput { schema, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;

    fn suppliers() -> Table {
        let schema = Schema::new(vec![
            ColumnDef::new("supplier_id", DataType::Int),
            ColumnDef::new("supplier_name", DataType::Text),
        ])
        .unwrap();
        let mut table = Table::new("suppliers".into(), schema);
        for (id, name) in [(0, "IBM"), (1, "HP"), (2, "Microsoft"), (3, "NVidia")] {
            table.insert(vec![Value::Int(id), Value::from(name)]).unwrap();
        }
        table
    }

    fn orders() -> Table {
        let schema = Schema::new(vec![
            ColumnDef::new("order_id", DataType::Int),
            ColumnDef::new("supplier_id", DataType::Int),
            ColumnDef::new("order_date", DataType::Text),
        ])
        .unwrap();
        let mut table = Table::new("orders".into(), schema);
        for (id, supplier, date) in [
            (125, 0, "05.05.2015"),
            (126, 1, "08.02.2016"),
            (127, 4, "06.01.2017"),
        ] {
            table
                .insert(vec![Value::Int(id), Value::Int(supplier), Value::from(date)])
                .unwrap();
        }
        table
    }

    fn join(
        columns: &[&str],
        left: &Table,
        right: &Table,
        on: &str,
        kind: JoinKind,
    ) -> Vec<String> {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let projection = resolve_projection(Some(columns.as_slice()), left, right).unwrap();
        let condition = JoinCondition::parse(on, left, right).unwrap();
        nested_loop_join(&projection, left, right, &condition, kind, None)
            .unwrap()
            .rows
            .iter()
            .map(Row::to_string)
            .collect()
    }

    #[test]
    fn test_join_kind_from_keyword() {
        assert_eq!(JoinKind::from_keyword(None).unwrap(), JoinKind::Inner);
        assert_eq!(JoinKind::from_keyword(Some("left")).unwrap(), JoinKind::Left);
        assert_eq!(JoinKind::from_keyword(Some("RIGHT")).unwrap(), JoinKind::Right);
        assert!(JoinKind::from_keyword(Some("OUTER")).is_err());
    }

    #[test]
    fn test_inner_join() {
        let rows = join(
            &["suppliers.supplier_name", "orders.order_date"],
            &suppliers(),
            &orders(),
            "suppliers.supplier_id = orders.supplier_id",
            JoinKind::Inner,
        );
        assert_eq!(rows, ["IBM 05.05.2015", "HP 08.02.2016"]);
    }

    #[test]
    fn test_left_join_keeps_unmatched_left_rows() {
        let rows = join(
            &["suppliers.supplier_id", "supplier_name", "order_date"],
            &suppliers(),
            &orders(),
            "suppliers.supplier_id = orders.supplier_id",
            JoinKind::Left,
        );
        assert_eq!(
            rows,
            [
                "0 IBM 05.05.2015",
                "1 HP 08.02.2016",
                "2 Microsoft NULL",
                "3 NVidia NULL",
            ]
        );
    }

    #[test]
    fn test_right_join_mirrors_left_join() {
        let rows = join(
            &["supplier_name", "order_id"],
            &suppliers(),
            &orders(),
            "suppliers.supplier_id = orders.supplier_id",
            JoinKind::Right,
        );
        assert_eq!(rows, ["IBM 125", "HP 126", "NULL 127"]);
    }

    #[test]
    fn test_inner_join_without_matches_is_empty() {
        let rows = join(
            &["supplier_name", "order_id"],
            &suppliers(),
            &orders(),
            "suppliers.supplier_id > orders.order_id",
            JoinKind::Inner,
        );
        assert!(rows.is_empty());
    }

    #[test]
    fn test_swapped_on_clause_flips_operator() {
        let condition = JoinCondition::parse(
            "orders.supplier_id > suppliers.supplier_id",
            &suppliers(),
            &orders(),
        )
        .unwrap();
        assert_eq!(condition.left_column, "supplier_id");
        assert_eq!(condition.op, ComparisonOp::Lt);

        // suppliers.supplier_id < orders.supplier_id
        let rows = join(
            &["supplier_name", "order_id"],
            &suppliers(),
            &orders(),
            "orders.supplier_id > suppliers.supplier_id",
            JoinKind::Inner,
        );
        assert_eq!(
            rows,
            ["IBM 126", "IBM 127", "HP 127", "Microsoft 127", "NVidia 127"]
        );
    }

    #[test]
    fn test_on_clause_errors() {
        let (s, o) = (suppliers(), orders());
        assert!(matches!(
            JoinCondition::parse("supplier_id = supplier_id", &s, &o),
            Err(DbError::Syntax(_))
        ));
        assert!(matches!(
            JoinCondition::parse("suppliers.supplier_id = parts.supplier_id", &s, &o),
            Err(DbError::UnknownTable(t)) if t == "parts"
        ));
        assert!(matches!(
            JoinCondition::parse("suppliers.nope = orders.supplier_id", &s, &o),
            Err(DbError::UnknownColumn(_))
        ));
        assert!(matches!(
            JoinCondition::parse("suppliers.supplier_name = orders.supplier_id", &s, &o),
            Err(DbError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_projection_names_and_star() {
        let (s, o) = (suppliers(), orders());
        let projection = resolve_projection(None, &s, &o).unwrap();
        let names: Vec<&str> = projection.iter().map(|c| c.output_name.as_str()).collect();
        assert_eq!(
            names,
            [
                "suppliers.supplier_id",
                "supplier_name",
                "order_id",
                "orders.supplier_id",
                "order_date",
            ]
        );

        assert!(matches!(
            resolve_projection(Some(["supplier_id".to_string()].as_slice()), &s, &o),
            Err(DbError::Syntax(_))
        ));
        assert!(matches!(
            resolve_projection(Some(["orders.nope".to_string()].as_slice()), &s, &o),
            Err(DbError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_filter_applies_to_joined_rows() {
        let (s, o) = (suppliers(), orders());
        let projection = resolve_projection(None, &s, &o).unwrap();
        let condition =
            JoinCondition::parse("suppliers.supplier_id = orders.supplier_id", &s, &o).unwrap();
        let filter = Predicate::parse("order_id > 125 OR supplier_name = \"NVidia\"").unwrap();

        let output =
            nested_loop_join(&projection, &s, &o, &condition, JoinKind::Left, Some(&filter))
                .unwrap();

        let rendered: Vec<String> = output.rows.iter().map(Row::to_string).collect();
        assert_eq!(rendered, ["1 HP 126 1 08.02.2016", "3 NVidia NULL NULL NULL"]);
        assert_eq!(output.schema.column_type("order_id"), Some(DataType::Int));
    }

    #[test]
    fn test_filter_qualifier_must_match_source_table() {
        let (s, o) = (suppliers(), orders());
        let columns = ["suppliers.supplier_id".to_string(), "order_id".to_string()];
        let projection = resolve_projection(Some(columns.as_slice()), &s, &o).unwrap();
        let condition =
            JoinCondition::parse("suppliers.supplier_id < orders.supplier_id", &s, &o).unwrap();
        let run = |clause: &str| {
            let filter = Predicate::parse(clause).unwrap();
            nested_loop_join(&projection, &s, &o, &condition, JoinKind::Inner, Some(&filter))
        };

        let rows: Vec<String> = run("suppliers.supplier_id = 0 AND orders.order_id > 125")
            .unwrap()
            .rows
            .iter()
            .map(Row::to_string)
            .collect();
        assert_eq!(rows, ["0 126", "0 127"]);

        // orders.supplier_id is not projected; suppliers.supplier_id must not stand in for it
        assert!(matches!(
            run("orders.supplier_id = 0"),
            Err(DbError::UnknownIdentifier(_))
        ));
    }
}
