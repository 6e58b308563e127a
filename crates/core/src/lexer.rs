use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Keywords, privilege names and flag names. Distinguished in the parser.
    Word(String),
    /// Quoted string literal (content without quotes, escapes resolved)
    Str(String),
    Semi,
    Comma,
    Eq,
    LBrace,
    RBrace,
    Eof,
}

impl Token {
    /// Human-readable rendering for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("'{}'", w),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Semi => "';'".to_owned(),
            Token::Comma => "','".to_owned(),
            Token::Eq => "'='".to_owned(),
            Token::LBrace => "'{'".to_owned(),
            Token::RBrace => "'}'".to_owned(),
            Token::Eof => "end of input".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub line: u32,
    pub column: u32,
}

/// Character cursor tracking 1-based line and column.
struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Cursor {
            chars: src.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                _ => break,
            }
        }
    }

    /// Body of a string literal; the opening quote is already consumed.
    fn string_body(&mut self) -> Result<String, &'static str> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err("unterminated string literal"),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err("unterminated escape in string"),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }

    /// Keywords and privilege names: `jcr:read`, `rep:glob`, `my-flag`.
    fn word(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self
            .peek()
            .filter(|&c| c.is_alphanumeric() || matches!(c, '_' | ':' | '.' | '-'))
        {
            out.push(c);
            self.bump();
        }
        out
    }
}

fn punctuation(c: char) -> Option<Token> {
    Some(match c {
        ';' => Token::Semi,
        ',' => Token::Comma,
        '=' => Token::Eq,
        '{' => Token::LBrace,
        '}' => Token::RBrace,
        _ => return None,
    })
}

/// Tokenize `src`. The result always ends with [`Token::Eof`].
pub fn lex(src: &str, filename: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut cur = Cursor::new(src);
    let mut tokens = Vec::new();

    loop {
        cur.skip_trivia();
        let (line, column) = (cur.line, cur.column);
        let Some(c) = cur.peek() else {
            tokens.push(Spanned {
                token: Token::Eof,
                line,
                column,
            });
            return Ok(tokens);
        };

        let token = if c == '"' {
            cur.bump();
            Token::Str(
                cur.string_body()
                    .map_err(|msg| ParseError::new(filename, line, column, msg))?,
            )
        } else if let Some(p) = punctuation(c) {
            cur.bump();
            p
        } else if c.is_alphabetic() || c == '_' {
            Token::Word(cur.word())
        } else {
            return Err(ParseError::new(
                filename,
                line,
                column,
                format!("unexpected character '{}'", c),
            ));
        };
        tokens.push(Spanned {
            token,
            line,
            column,
        });
    }
}
