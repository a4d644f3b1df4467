use crate::error::{DbError, Result};

/// Represents the smallest meaningful units (atoms) of a statement.
///
/// Only the statement skeleton is tokenized into keywords; column types,
/// `AND`/`OR` and the like stay [Token::Ident] because the clauses they
/// appear in are handed to the engine as raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // --- Statement keywords ---
    Create,
    Table,
    Drop,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    Join,
    Left,
    Right,
    Inner,
    On,
    Update,
    Set,
    Delete,

    // --- Identifiers & Literals ---
    /// A name representing a table, a column or a type (e.g., `orders`, `VARCHAR`).
    Ident(String),
    /// A numeric literal exactly as written (e.g., `-12`, `3.5`).
    Number(String),
    /// A string literal between `'` or `"`, without its quotes.
    String(String),

    // --- Symbols ---
    /// Left parenthesis `(`
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// Comma `,`
    Comma,
    /// Semicolon `;`
    Semicolon,
    /// Wildcard `*`
    Star,
    /// Qualifier separator `.`
    Dot,
    Equal,
    Lower,
    Greater,
    LowerEqual,
    GreaterEqual,

    // --- Special ---
    /// A character no other token starts with. Raw clauses carry it through
    /// untouched; anywhere else the parser rejects it.
    Other(char),
    /// Represents the End Of File/Input.
    Eof,
}

/// A [Token] together with the byte range it covers in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// A lexical scanner (lexer) that converts a statement into a sequence of [Spanned] tokens.
pub struct Tokenizer {
    /// The input as `(byte offset, char)` pairs.
    input: Vec<(usize, char)>,
    /// Byte length of the input, used as the offset past the last char.
    len: usize,
    /// The current position in `input`.
    position: usize,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.char_indices().collect(),
            len: input.len(),
            position: 0,
        }
    }

    /// Processes the entire input. The last token is always [Token::Eof].
    ///
    /// # Errors
    /// [DbError::Syntax] for an unterminated string.
    ///
    /// # Example
    /// ```
    /// # use minidb::tokenizer::{Tokenizer, Token};
    /// let tokens = Tokenizer::new("select * from t").tokenize().unwrap();
    /// assert_eq!(tokens[0].token, Token::Select);
    /// assert_eq!((tokens[3].start, tokens[3].end), (14, 15));
    /// ```
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                break;
            }
            let start = self.offset();
            let token = self.next_token()?;
            tokens.push(Spanned {
                token,
                start,
                end: self.offset(),
            });
        }

        tokens.push(Spanned {
            token: Token::Eof,
            start: self.len,
            end: self.len,
        });
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        let single = match ch {
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '*' => Some(Token::Star),
            '.' => Some(Token::Dot),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        match ch {
            '<' | '>' => {
                self.advance();
                let or_equal = self.peek_is('=');
                if or_equal {
                    self.advance();
                }
                Ok(match (ch, or_equal) {
                    ('<', false) => Token::Lower,
                    ('<', true) => Token::LowerEqual,
                    (_, false) => Token::Greater,
                    (_, true) => Token::GreaterEqual,
                })
            }
            '\'' | '"' => self.read_string(ch),
            '-' if self.next_char().is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            _ => {
                self.advance();
                Ok(Token::Other(ch))
            }
        }
    }

    // --- Navigation Helpers ---

    fn current_char(&self) -> char {
        self.input[self.position].1
    }

    fn next_char(&self) -> Option<char> {
        self.input.get(self.position + 1).map(|(_, c)| *c)
    }

    fn peek_is(&self, expected: char) -> bool {
        !self.is_at_end() && self.current_char() == expected
    }

    /// Byte offset of the current position.
    fn offset(&self) -> usize {
        self.input.get(self.position).map_or(self.len, |(i, _)| *i)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    // --- Extraction Logic ---

    /// Keywords are matched case-insensitively.
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "CREATE" => Token::Create,
            "TABLE" => Token::Table,
            "DROP" => Token::Drop,
            "INSERT" => Token::Insert,
            "INTO" => Token::Into,
            "VALUES" => Token::Values,
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "JOIN" => Token::Join,
            "LEFT" => Token::Left,
            "RIGHT" => Token::Right,
            "INNER" => Token::Inner,
            "ON" => Token::On,
            "UPDATE" => Token::Update,
            "SET" => Token::Set,
            "DELETE" => Token::Delete,
            _ => Token::Ident(ident),
        }
    }

    /// Reads an optionally negative number with at most one decimal point.
    fn read_number(&mut self) -> Result<Token> {
        let mut number = String::new();
        if self.peek_is('-') {
            number.push('-');
            self.advance();
        }

        let mut has_dot = false;
        while !self.is_at_end() {
            let c = self.current_char();
            if c == '.' && !has_dot && self.next_char().is_some_and(|n| n.is_ascii_digit()) {
                has_dot = true;
            } else if !c.is_ascii_digit() {
                break;
            }
            number.push(c);
            self.advance();
        }

        if self.peek_is('.') && has_dot {
            return Err(DbError::syntax("multiple dots are not allowed in a number"));
        }
        Ok(Token::Number(number))
    }

    fn read_string(&mut self, quote: char) -> Result<Token> {
        self.advance(); // opening quote

        let mut string = String::new();
        while !self.is_at_end() && self.current_char() != quote {
            string.push(self.current_char());
            self.advance();
        }

        if self.is_at_end() {
            return Err(DbError::syntax("unterminated string"));
        }
        self.advance(); // closing quote

        Ok(Token::String(string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<Token> {
        Tokenizer::new(sql)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_tokenize_simple() {
        assert_eq!(
            kinds("CREATE TABLE orders"),
            vec![
                Token::Create,
                Token::Table,
                Token::Ident("orders".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("select * From suppliers left join orders on"),
            vec![
                Token::Select,
                Token::Star,
                Token::From,
                Token::Ident("suppliers".into()),
                Token::Left,
                Token::Join,
                Token::Ident("orders".into()),
                Token::On,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_qualified_comparison() {
        assert_eq!(
            kinds("suppliers.supplier_id >= orders.supplier_id"),
            vec![
                Token::Ident("suppliers".into()),
                Token::Dot,
                Token::Ident("supplier_id".into()),
                Token::GreaterEqual,
                Token::Ident("orders".into()),
                Token::Dot,
                Token::Ident("supplier_id".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(
            kinds("42, -7, 3.5"),
            vec![
                Token::Number("42".into()),
                Token::Comma,
                Token::Number("-7".into()),
                Token::Comma,
                Token::Number("3.5".into()),
                Token::Eof,
            ]
        );
        assert!(Tokenizer::new("1.2.3").tokenize().is_err());
    }

    #[test]
    fn test_tokenize_strings_both_quotes() {
        assert_eq!(
            kinds("'Alice', \"05.05.2015\", 'it\"s'"),
            vec![
                Token::String("Alice".into()),
                Token::Comma,
                Token::String("05.05.2015".into()),
                Token::Comma,
                Token::String("it\"s".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_spans_cover_source_text() {
        let sql = "WHERE name = \"HP\" ;";
        let tokens = Tokenizer::new(sql).tokenize().unwrap();

        assert_eq!(&sql[tokens[1].start..tokens[1].end], "name");
        assert_eq!(&sql[tokens[3].start..tokens[3].end], "\"HP\"");
        assert_eq!(tokens.last().unwrap().start, sql.len());
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            Tokenizer::new("'hello").tokenize(),
            Err(DbError::Syntax(_))
        ));
    }

    #[test]
    fn test_unknown_character_is_kept() {
        let tokens = Tokenizer::new("a ! #b").tokenize().unwrap();
        let kinds: Vec<_> = tokens.into_iter().map(|s| (s.token, s.start, s.end)).collect();
        assert_eq!(
            kinds,
            vec![
                (Token::Ident("a".into()), 0, 1),
                (Token::Other('!'), 2, 3),
                (Token::Other('#'), 4, 5),
                (Token::Ident("b".into()), 5, 6),
                (Token::Eof, 6, 6),
            ]
        );
    }
}
