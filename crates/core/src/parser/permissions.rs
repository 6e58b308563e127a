use super::Parser;
use crate::ast::{Effect, PrincipalKind, Provenance, RawCheck, Statement};
use crate::error::ParseError;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    /// `<priv>[, <priv>]*` -- privilege names are bare words.
    fn parse_privileges(&mut self) -> Result<Vec<String>, ParseError> {
        let mut privileges = Vec::new();
        loop {
            match self.peek().clone() {
                Token::Word(w) if !w.eq_ignore_ascii_case("on") => {
                    self.advance();
                    privileges.push(w);
                }
                other => {
                    return Err(self.err(format!(
                        "expected privilege name, got {}",
                        other.describe()
                    )))
                }
            }
            if self.peek() == &Token::Comma {
                self.advance();
            } else {
                return Ok(privileges);
            }
        }
    }

    /// `<privs> on "<path>" for "<principal>"`, shared by permission
    /// statements and permission checks.
    pub(super) fn parse_grant_target(
        &mut self,
    ) -> Result<(Vec<String>, String, String), ParseError> {
        let privileges = self.parse_privileges()?;
        self.expect_keyword("on")?;
        let path = self.take_str("path")?;
        self.expect_keyword("for")?;
        let principal = self.take_str("principal id")?;
        Ok((privileges, path, principal))
    }

    /// `<key> = "<value>"[, ...]`. Keys may be bare words (`rep:glob`) or
    /// quoted strings.
    pub(super) fn parse_restrictions(&mut self) -> Result<Vec<(String, String)>, ParseError> {
        let mut restrictions = Vec::new();
        loop {
            let key = match self.peek().clone() {
                Token::Word(w) | Token::Str(w) => {
                    self.advance();
                    w
                }
                other => {
                    return Err(self.err(format!(
                        "expected restriction name, got {}",
                        other.describe()
                    )))
                }
            };
            self.expect(Token::Eq)?;
            let value = self.take_str("restriction value")?;
            restrictions.push((key, value));
            if self.peek() == &Token::Comma {
                self.advance();
            } else {
                return Ok(restrictions);
            }
        }
    }

    /// ```text
    /// check exists "<id>" [as user|group];
    /// check not exists "<id>";
    /// check allow|deny <privs> on "<path>" for "<principal>";
    /// ```
    pub(super) fn parse_check(&mut self, prov: Provenance) -> Result<Statement, ParseError> {
        self.advance();
        let check = if self.is_keyword("exists") {
            self.advance();
            let id = self.take_str("principal id")?;
            let kind = if self.is_keyword("as") {
                self.advance();
                if self.is_keyword("user") {
                    self.advance();
                    Some(PrincipalKind::User)
                } else if self.is_keyword("group") {
                    self.advance();
                    Some(PrincipalKind::Group)
                } else {
                    return Err(self.err(format!(
                        "expected 'user' or 'group', got {}",
                        self.peek().describe()
                    )));
                }
            } else {
                None
            };
            RawCheck::Exists { id, kind }
        } else if self.is_keyword("not") {
            self.advance();
            self.expect_keyword("exists")?;
            let id = self.take_str("principal id")?;
            RawCheck::NotExists { id }
        } else if self.is_keyword("allow") || self.is_keyword("deny") {
            let effect = if self.is_keyword("allow") {
                Effect::Allow
            } else {
                Effect::Deny
            };
            self.advance();
            let (privileges, path, principal) = self.parse_grant_target()?;
            RawCheck::Permission {
                effect,
                privileges,
                path,
                principal,
            }
        } else {
            return Err(self.err(format!(
                "expected 'exists', 'not exists', 'allow' or 'deny' after 'check', got {}",
                self.peek().describe()
            )));
        };
        self.expect_semi()?;
        Ok(Statement::Check { check, prov })
    }
}
