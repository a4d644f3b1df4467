use std::{collections::HashMap, fmt};

use allocative::Allocative;

use crate::{
    error::{DbError, Result},
    value::Value,
};

/// One tuple: named values plus the column order used for display.
///
/// Every declared column has an entry from construction on; unset cells
/// hold [Value::None].
#[derive(Debug, Clone, PartialEq, Allocative)]
pub struct Row {
    order: Vec<String>,
    values: HashMap<String, Value>,
}

impl Row {
    /// Creates a row with every column set to [Value::None].
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = columns.into_iter().map(Into::into).collect();
        let values = order
            .iter()
            .map(|name| (name.clone(), Value::None))
            .collect();
        Self { order, values }
    }

    /// Column names in display order.
    pub fn columns(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Overwrites the value of an existing column.
    ///
    /// # Errors
    /// [DbError::UnknownColumn] if the row has no such column.
    pub fn set(&mut self, column: &str, value: Value) -> Result<()> {
        let cell = self
            .values
            .get_mut(column)
            .ok_or_else(|| DbError::UnknownColumn(column.to_string()))?;
        cell.set(value);
        Ok(())
    }

    /// Values in display order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.order.iter().filter_map(|name| self.values.get(name))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_row_is_all_none() {
        let row = Row::new(["id", "name"]);
        assert_eq!(row.columns(), ["id", "name"]);
        assert_eq!(row.get("id"), Some(&Value::None));
        assert_eq!(row.get("name"), Some(&Value::None));
        assert_eq!(row.get("age"), None);
    }

    #[test]
    fn test_set_and_get() {
        let mut row = Row::new(["id", "name"]);
        row.set("name", Value::from("HP")).unwrap();
        row.set("id", Value::Int(1)).unwrap();

        assert_eq!(row.get("id"), Some(&Value::Int(1)));
        assert_eq!(row.get("name"), Some(&Value::from("HP")));
    }

    #[test]
    fn test_set_unknown_column() {
        let mut row = Row::new(["id"]);
        assert!(matches!(
            row.set("nope", Value::Int(1)),
            Err(DbError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_display_follows_declared_order() {
        let mut row = Row::new(["order_id", "supplier_id", "order_date"]);
        row.set("order_date", Value::from("08.02.2016")).unwrap();
        row.set("order_id", Value::Int(126)).unwrap();

        assert_eq!(row.to_string(), "126 NULL 08.02.2016");
        let values: Vec<&Value> = row.values().collect();
        assert_eq!(values[0], &Value::Int(126));
    }
}
