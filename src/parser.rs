use crate::{
    ast::*,
    error::{DbError, Result},
    join::JoinKind,
    tokenizer::{Spanned, Token, Tokenizer},
};

/// Tokenizes and parses a single statement.
pub fn parse_statement(sql: &str) -> Result<Statement> {
    let tokens = Tokenizer::new(sql).tokenize()?;
    Parser::new(sql, tokens).parse()
}

/// Splits a script into statements on `;`, ignoring semicolons inside
/// quoted strings. Blank statements are dropped.
///
/// ```
/// # use minidb::parser::split_statements;
/// let parts = split_statements("DELETE FROM t; INSERT INTO t VALUES (\"a;b\");\n");
/// assert_eq!(parts, ["DELETE FROM t", "INSERT INTO t VALUES (\"a;b\")"]);
/// ```
pub fn split_statements(script: &str) -> Vec<String> {
    split_top_level(script, ';')
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits `text` on `separator` outside quotes and parentheses, trimming
/// each piece.
pub(crate) fn split_top_level(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ if c == separator && depth == 0 => {
                    parts.push(current.trim().to_string());
                    current.clear();
                    continue;
                }
                _ => {}
            },
        }
        current.push(c);
    }
    parts.push(current.trim().to_string());
    parts
}

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    position: usize,
}

impl<'a> Parser<'a> {
    /// `tokens` must come from tokenizing `source` and end with [Token::Eof].
    pub fn new(source: &'a str, tokens: Vec<Spanned>) -> Self {
        Self {
            source,
            tokens,
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Statement> {
        let statement = match self.current_token() {
            Token::Create => self.parse_create_table(),
            Token::Drop => self.parse_drop_table(),
            Token::Insert => self.parse_insert(),
            Token::Select => self.parse_select(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            other => Err(DbError::syntax(format!("unexpected token: {other:?}"))),
        }?;

        // semicolon is optional, skip it
        if matches!(self.current_token(), Token::Semicolon) {
            self.advance();
        }

        if !self.is_at_end() {
            return Err(DbError::syntax(format!(
                "unexpected token after statement: {:?}",
                self.current_token()
            )));
        }

        Ok(statement)
    }

    // helpers
    fn current_token(&self) -> &Token {
        &self.tokens[self.position].token
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    /// End of the statement proper: `;` or end of input.
    fn is_at_statement_end(&self) -> bool {
        matches!(self.current_token(), Token::Semicolon | Token::Eof)
    }

    fn consume(&mut self, expected: Token) -> Result<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(DbError::syntax(format!(
                "expected {expected:?}, found {:?}",
                self.current_token()
            )))
        }
    }

    fn consume_ident(&mut self) -> Result<String> {
        match self.current_token() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(DbError::syntax(format!(
                "expected identifier, found {other:?}"
            ))),
        }
    }

    /// `ident` or `ident.ident`, returned as written.
    fn consume_column_ref(&mut self) -> Result<String> {
        let first = self.consume_ident()?;
        if matches!(self.current_token(), Token::Dot) {
            self.advance();
            let column = self.consume_ident()?;
            return Ok(format!("{first}.{column}"));
        }
        Ok(first)
    }

    /// Source text covering tokens `from..to` (exclusive).
    fn slice(&self, from: usize, to: usize) -> &'a str {
        let source: &'a str = self.source;
        &source[self.tokens[from].start..self.tokens[to - 1].end]
    }

    /// Consumes tokens up to (not including) the first one matching `stop`
    /// or the statement end, and returns the source text they cover.
    fn raw_until(&mut self, what: &str, stop: impl Fn(&Token) -> bool) -> Result<String> {
        let start = self.position;
        while !self.is_at_statement_end() && !stop(self.current_token()) {
            self.advance();
        }
        if self.position == start {
            return Err(DbError::syntax(format!("expected {what}")));
        }
        Ok(self.slice(start, self.position).to_string())
    }

    /// Parses `( item, item, ... )` where each item is the raw text between
    /// top-level commas. The opening parenthesis must be current.
    fn parse_raw_list(&mut self, what: &str) -> Result<Vec<String>> {
        self.consume(Token::LeftParen)?;
        let mut items = Vec::new();
        let mut depth = 0usize;
        let mut start = self.position;

        loop {
            match self.current_token() {
                Token::Eof => return Err(DbError::syntax(format!("unclosed {what} list"))),
                Token::LeftParen => depth += 1,
                Token::RightParen if depth > 0 => depth -= 1,
                Token::RightParen | Token::Comma if depth == 0 => {
                    if self.position == start {
                        return Err(DbError::syntax(format!("empty entry in {what} list")));
                    }
                    items.push(self.slice(start, self.position).to_string());
                    let closing = matches!(self.current_token(), Token::RightParen);
                    self.advance();
                    if closing {
                        return Ok(items);
                    }
                    start = self.position;
                    continue;
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_where(&mut self) -> Result<Option<String>> {
        if !matches!(self.current_token(), Token::Where) {
            return Ok(None);
        }
        self.advance();
        self.raw_until("a condition after WHERE", |_| false).map(Some)
    }

    fn parse_create_table(&mut self) -> Result<Statement> {
        self.consume(Token::Create)?;
        self.consume(Token::Table)?;
        let name = self.consume_ident()?;
        let columns = self.parse_raw_list("column definition")?;
        Ok(Statement::CreateTable(CreateTable { name, columns }))
    }

    fn parse_drop_table(&mut self) -> Result<Statement> {
        self.consume(Token::Drop)?;
        self.consume(Token::Table)?;
        let name = self.consume_ident()?;
        Ok(Statement::DropTable(DropTable { name }))
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.consume(Token::Insert)?;
        self.consume(Token::Into)?;
        let table = self.consume_ident()?;

        let columns = if matches!(self.current_token(), Token::LeftParen) {
            self.advance();
            let mut columns = vec![];
            loop {
                columns.push(self.consume_ident()?);
                match self.current_token() {
                    Token::RightParen => {
                        self.advance();
                        break;
                    }
                    Token::Comma => {
                        self.advance();
                        continue;
                    }
                    _ => return Err(DbError::syntax("expected ',' or ')'")),
                }
            }
            Some(columns)
        } else {
            None
        };

        self.consume(Token::Values)?;
        let values = self.parse_raw_list("value")?;
        Ok(Statement::InsertInto(InsertInto {
            table,
            columns,
            values,
        }))
    }

    fn parse_select(&mut self) -> Result<Statement> {
        self.consume(Token::Select)?;

        let columns = if matches!(self.current_token(), Token::Star) {
            self.advance();
            ColumnsSelect::Star
        } else {
            let mut names = vec![self.consume_column_ref()?];
            while matches!(self.current_token(), Token::Comma) {
                self.advance();
                names.push(self.consume_column_ref()?);
            }
            ColumnsSelect::ColumnsNames(names)
        };

        self.consume(Token::From)?;
        let table = self.consume_ident()?;
        let join = self.parse_join()?;
        let where_clause = self.parse_where()?;

        Ok(Statement::Select(Select {
            columns,
            table,
            join,
            where_clause,
        }))
    }

    fn parse_join(&mut self) -> Result<Option<JoinClause>> {
        let keyword = match self.current_token() {
            Token::Join => None,
            Token::Left => Some("LEFT"),
            Token::Right => Some("RIGHT"),
            Token::Inner => Some("INNER"),
            _ => return Ok(None),
        };
        if keyword.is_some() {
            self.advance();
        }
        let kind = JoinKind::from_keyword(keyword)?;

        self.consume(Token::Join)?;
        let table = self.consume_ident()?;
        self.consume(Token::On)?;
        let on = self.raw_until("a condition after ON", |t| matches!(t, Token::Where))?;
        Ok(Some(JoinClause { kind, table, on }))
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.consume(Token::Update)?;
        let table = self.consume_ident()?;
        self.consume(Token::Set)?;
        let assignments =
            self.raw_until("assignments after SET", |t| matches!(t, Token::Where))?;
        let where_clause = self.parse_where()?;
        Ok(Statement::Update(Update {
            table,
            assignments,
            where_clause,
        }))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.consume(Token::Delete)?;
        self.consume(Token::From)?;
        let table = self.consume_ident()?;
        let where_clause = self.parse_where()?;
        Ok(Statement::Delete(Delete {
            table,
            where_clause,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(sql: &str) -> Statement {
        parse_statement(sql).unwrap()
    }

    #[test]
    fn test_parse_create_table() {
        let sql = "CREATE TABLE orders (order_id INT PRIMARY KEY, order_date VARCHAR(10) NOT NULL, \
                   supplier_id FOREIGN KEY REFERENCES (suppliers));";

        match parse(sql) {
            Statement::CreateTable(ct) => {
                assert_eq!(ct.name, "orders");
                assert_eq!(
                    ct.columns,
                    [
                        "order_id INT PRIMARY KEY",
                        "order_date VARCHAR(10) NOT NULL",
                        "supplier_id FOREIGN KEY REFERENCES (suppliers)",
                    ]
                );
            }
            other => panic!("Expected CreateTable, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_drop_table() {
        assert_eq!(
            parse("drop table orders"),
            Statement::DropTable(DropTable {
                name: "orders".into()
            })
        );
    }

    #[test]
    fn test_parse_insert_keeps_raw_literals() {
        let sql = "INSERT INTO orders (order_date, order_id) VALUES (\"05.05, 2015\", -125);";

        assert_eq!(
            parse(sql),
            Statement::InsertInto(InsertInto {
                table: "orders".into(),
                columns: Some(vec!["order_date".into(), "order_id".into()]),
                values: vec!["\"05.05, 2015\"".into(), "-125".into()],
            })
        );
    }

    #[test]
    fn test_parse_insert_without_columns() {
        match parse("INSERT INTO suppliers VALUES (0, 'IBM')") {
            Statement::InsertInto(insert) => {
                assert_eq!(insert.columns, None);
                assert_eq!(insert.values, ["0", "'IBM'"]);
            }
            other => panic!("Expected InsertInto, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_select_where() {
        assert_eq!(
            parse("SELECT * FROM orders WHERE order_id = 126 OR (order_id = 127);"),
            Statement::Select(Select {
                columns: ColumnsSelect::Star,
                table: "orders".into(),
                join: None,
                where_clause: Some("order_id = 126 OR (order_id = 127)".into()),
            })
        );
    }

    #[test]
    fn test_parse_select_join() {
        let sql = "SELECT suppliers.supplier_name, orders.order_date FROM suppliers \
                   LEFT JOIN orders ON suppliers.supplier_id = orders.supplier_id \
                   WHERE order_id > 125";

        assert_eq!(
            parse(sql),
            Statement::Select(Select {
                columns: ColumnsSelect::ColumnsNames(vec![
                    "suppliers.supplier_name".into(),
                    "orders.order_date".into(),
                ]),
                table: "suppliers".into(),
                join: Some(JoinClause {
                    kind: JoinKind::Left,
                    table: "orders".into(),
                    on: "suppliers.supplier_id = orders.supplier_id".into(),
                }),
                where_clause: Some("order_id > 125".into()),
            })
        );
    }

    #[test]
    fn test_plain_join_is_inner() {
        match parse("SELECT a FROM t JOIN u ON t.a = u.a") {
            Statement::Select(Select {
                join: Some(join), ..
            }) => assert_eq!(join.kind, JoinKind::Inner),
            other => panic!("Expected join, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_update_and_delete() {
        assert_eq!(
            parse("UPDATE orders SET order_id = 228, order_date = \"x\" WHERE supplier_id = 0;"),
            Statement::Update(Update {
                table: "orders".into(),
                assignments: "order_id = 228, order_date = \"x\"".into(),
                where_clause: Some("supplier_id = 0".into()),
            })
        );
        assert_eq!(
            parse("DELETE FROM orders"),
            Statement::Delete(Delete {
                table: "orders".into(),
                where_clause: None,
            })
        );
    }

    #[test]
    fn test_syntax_errors() {
        for sql in [
            "SELECT FROM orders",
            "INSERT INTO orders VALUES ()",
            "INSERT INTO orders VALUES (1,)",
            "DELETE FROM orders WHERE",
            "CREATE TABLE t (a INT",
            "UPDATE t SET",
            "DROP TABLE t extra",
            "EXPLAIN t",
            "SELECT # FROM t",
            "DROP TABLE t!",
            "DELETE FROM t # WHERE a = 1",
        ] {
            assert!(
                matches!(parse_statement(sql), Err(DbError::Syntax(_))),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_unknown_characters_stay_in_raw_clauses() {
        let Statement::Select(select) = parse("SELECT * FROM orders WHERE order_id = 125 #") else {
            panic!("expected SELECT");
        };
        assert_eq!(select.where_clause.as_deref(), Some("order_id = 125 #"));
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("a = 1, b = \"x,y\", c = (1, 2)", ','),
            ["a = 1", "b = \"x,y\"", "c = (1, 2)"]
        );
    }
}
