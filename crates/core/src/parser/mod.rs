/// Statement parser over the token stream produced by [`crate::lexer`].
/// Every statement carries provenance (file, line and column of its opening
/// keyword). No validation is done here -- that is the validator's job.
///
/// The grammar is LL(1): the first word of a statement selects its rule and
/// each rule consumes a fixed shape, so a valid input has exactly one parse.
use crate::ast::{Provenance, Statement};
use crate::error::ParseError;
use crate::lexer::{self, Spanned, Token};

mod permissions;
mod statements;

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    filename: String,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned], filename: &str) -> Self {
        Parser {
            tokens,
            pos: 0,
            filename: filename.to_owned(),
        }
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    fn prov(&self) -> Provenance {
        let cur = self.cur();
        Provenance {
            file: self.filename.clone(),
            line: cur.line,
            column: cur.column,
        }
    }

    fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        let cur = self.cur();
        ParseError::new(&self.filename, cur.line, cur.column, msg)
    }

    /// Keywords are case-insensitive.
    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Word(w) if w.eq_ignore_ascii_case(kw))
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), ParseError> {
        if self.is_keyword(kw) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!(
                "expected '{}', got {}",
                kw,
                self.peek().describe()
            )))
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if self.peek() == &token {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!(
                "expected {}, got {}",
                token.describe(),
                self.peek().describe()
            )))
        }
    }

    /// Simple statements end with `;`.
    fn expect_semi(&mut self) -> Result<(), ParseError> {
        if self.peek() == &Token::Semi {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!(
                "expected ';' to end statement, got {}",
                self.peek().describe()
            )))
        }
    }

    fn take_word(&mut self) -> Result<String, ParseError> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.err(format!(
                "expected identifier, got {}",
                self.peek().describe()
            )))
        }
    }

    fn take_str(&mut self, what: &str) -> Result<String, ParseError> {
        if let Token::Str(s) = self.peek().clone() {
            self.advance();
            Ok(s)
        } else {
            Err(self.err(format!(
                "expected quoted {}, got {}",
                what,
                self.peek().describe()
            )))
        }
    }

    // -- Sequences ----------------------------------------------

    pub fn parse_file(&mut self) -> Result<Vec<Statement>, ParseError> {
        let mut statements = Vec::new();
        while self.peek() != &Token::Eof {
            if self.peek() == &Token::RBrace {
                return Err(self.err("unexpected '}' without matching '{'"));
            }
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    /// `{ statement* }`
    fn parse_block(&mut self) -> Result<Vec<Statement>, ParseError> {
        let open = self.prov();
        self.expect(Token::LBrace)?;
        let mut statements = Vec::new();
        loop {
            match self.peek() {
                Token::RBrace => {
                    self.advance();
                    return Ok(statements);
                }
                Token::Eof => {
                    return Err(ParseError::new(
                        &self.filename,
                        open.line,
                        open.column,
                        "unterminated block: missing '}'",
                    ));
                }
                _ => statements.push(self.parse_statement()?),
            }
        }
    }
}

/// Parse a token stream into top-level statements. A stream that does not
/// end in [`Token::Eof`] is treated as if it did.
pub fn parse(tokens: &[Spanned], filename: &str) -> Result<Vec<Statement>, ParseError> {
    if tokens.last().map(|t| &t.token) != Some(&Token::Eof) {
        let (line, column) = tokens.last().map_or((1, 1), |t| (t.line, t.column));
        let mut terminated = tokens.to_vec();
        terminated.push(Spanned {
            token: Token::Eof,
            line,
            column,
        });
        return Parser::new(&terminated, filename).parse_file();
    }
    Parser::new(tokens, filename).parse_file()
}

/// Lex and parse script source text in one step.
pub fn parse_source(src: &str, filename: &str) -> Result<Vec<Statement>, ParseError> {
    let tokens = lexer::lex(src, filename)?;
    parse(&tokens, filename)
}

#[cfg(test)]
mod tests;
