pub mod ast;
pub mod data_type;
pub mod database;
pub mod error;
pub mod join;
pub mod literal;
pub mod parser;
pub mod predicate;
pub mod row;
pub mod table;
pub mod tokenizer;
pub mod value;

pub use data_type::DataType;
pub use database::{Config, Database, DuplicateTablePolicy, QueryResult};
pub use error::{DbError, Result};
pub use row::Row;
pub use table::{ColumnDef, Connection, Schema, Table};
pub use value::Value;
