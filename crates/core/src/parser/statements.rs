use super::Parser;
use crate::ast::{Effect, Provenance, Statement};
use crate::error::ParseError;
use crate::lexer::Token;

impl<'a> Parser<'a> {
    pub(super) fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        let prov = self.prov();
        let word = match self.peek().clone() {
            Token::Word(w) => w,
            other => {
                return Err(self.err(format!(
                    "expected statement keyword, got {}",
                    other.describe()
                )))
            }
        };
        match word.to_ascii_lowercase().as_str() {
            "create" => self.parse_create(prov),
            "add" => self.parse_membership(prov, true),
            "remove" => self.parse_membership(prov, false),
            "allow" => self.parse_permission(prov, Effect::Allow),
            "deny" => self.parse_permission(prov, Effect::Deny),
            "set" => self.parse_set(prov),
            "copy" => self.parse_transfer(prov, false),
            "move" => self.parse_transfer(prov, true),
            "delete" => self.parse_delete(prov),
            "purge" => self.parse_purge(prov),
            "include" => self.parse_include(prov),
            "define" => self.parse_define(prov),
            "if" => self.parse_if(prov),
            "check" => self.parse_check(prov),
            _ => Err(self.err(format!("unknown keyword '{}'", word))),
        }
    }

    /// `create user|group "<id>" [at "<path>"];`
    fn parse_create(&mut self, prov: Provenance) -> Result<Statement, ParseError> {
        self.advance();
        let is_user = if self.is_keyword("user") {
            true
        } else if self.is_keyword("group") {
            false
        } else {
            return Err(self.err(format!(
                "expected 'user' or 'group' after 'create', got {}",
                self.peek().describe()
            )));
        };
        self.advance();
        let id = self.take_str("id")?;
        let path = if self.is_keyword("at") {
            self.advance();
            Some(self.take_str("path")?)
        } else {
            None
        };
        self.expect_semi()?;
        Ok(if is_user {
            Statement::CreateUser { id, path, prov }
        } else {
            Statement::CreateGroup { id, path, prov }
        })
    }

    /// `add "<member>" to "<group>";` / `remove "<member>" from "<group>";`
    fn parse_membership(&mut self, prov: Provenance, add: bool) -> Result<Statement, ParseError> {
        self.advance();
        let member = self.take_str("member id")?;
        self.expect_keyword(if add { "to" } else { "from" })?;
        let group = self.take_str("group id")?;
        self.expect_semi()?;
        Ok(if add {
            Statement::AddToGroup {
                member,
                group,
                prov,
            }
        } else {
            Statement::RemoveFromGroup {
                member,
                group,
                prov,
            }
        })
    }

    /// `allow|deny <privs> on "<path>" for "<principal>" [with k = "v", ...];`
    fn parse_permission(&mut self, prov: Provenance, effect: Effect) -> Result<Statement, ParseError> {
        self.advance();
        let (privileges, path, principal) = self.parse_grant_target()?;
        let restrictions = if self.is_keyword("with") {
            self.advance();
            self.parse_restrictions()?
        } else {
            Vec::new()
        };
        self.expect_semi()?;
        Ok(Statement::Permission {
            effect,
            privileges,
            path,
            principal,
            restrictions,
            prov,
        })
    }

    /// `set "<key>" = "<value>" on "<path>";`
    fn parse_set(&mut self, prov: Provenance) -> Result<Statement, ParseError> {
        self.advance();
        let key = self.take_str("property name")?;
        self.expect(Token::Eq)?;
        let value = self.take_str("property value")?;
        self.expect_keyword("on")?;
        let path = self.take_str("path")?;
        self.expect_semi()?;
        Ok(Statement::SetProperty {
            path,
            key,
            value,
            prov,
        })
    }

    /// `copy|move "<src>" to "<dst>";`
    fn parse_transfer(&mut self, prov: Provenance, is_move: bool) -> Result<Statement, ParseError> {
        self.advance();
        let from = self.take_str("source path")?;
        self.expect_keyword("to")?;
        let to = self.take_str("destination path")?;
        self.expect_semi()?;
        Ok(if is_move {
            Statement::Move { from, to, prov }
        } else {
            Statement::Copy { from, to, prov }
        })
    }

    fn parse_delete(&mut self, prov: Provenance) -> Result<Statement, ParseError> {
        self.advance();
        let path = self.take_str("path")?;
        self.expect_semi()?;
        Ok(Statement::Delete { path, prov })
    }

    /// `purge "<path>" [for "<principal>"];`
    fn parse_purge(&mut self, prov: Provenance) -> Result<Statement, ParseError> {
        self.advance();
        let path = self.take_str("path")?;
        let principal = if self.is_keyword("for") {
            self.advance();
            Some(self.take_str("principal id")?)
        } else {
            None
        };
        self.expect_semi()?;
        Ok(Statement::Purge {
            path,
            principal,
            prov,
        })
    }

    fn parse_include(&mut self, prov: Provenance) -> Result<Statement, ParseError> {
        self.advance();
        let target = self.take_str("script identifier")?;
        self.expect_semi()?;
        Ok(Statement::Include { target, prov })
    }

    /// `define <flag> = true|false;`
    fn parse_define(&mut self, prov: Provenance) -> Result<Statement, ParseError> {
        self.advance();
        let flag = self.take_word()?;
        self.expect(Token::Eq)?;
        let value = if self.is_keyword("true") {
            true
        } else if self.is_keyword("false") {
            false
        } else {
            return Err(self.err(format!(
                "expected 'true' or 'false', got {}",
                self.peek().describe()
            )));
        };
        self.advance();
        self.expect_semi()?;
        Ok(Statement::Define { flag, value, prov })
    }

    /// `if [not] <flag> { ... } [else { ... } | else if ...]`
    fn parse_if(&mut self, prov: Provenance) -> Result<Statement, ParseError> {
        self.advance();
        let negated = if self.is_keyword("not") {
            self.advance();
            true
        } else {
            false
        };
        let flag = self.take_word()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.is_keyword("else") {
            self.advance();
            if self.is_keyword("if") {
                let nested = self.prov();
                vec![self.parse_if(nested)?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };
        Ok(Statement::If {
            flag,
            negated,
            then_branch,
            else_branch,
            prov,
        })
    }
}
