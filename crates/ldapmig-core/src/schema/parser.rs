//! Recursive descent parser for attribute type and object class
//! definitions.

use super::attribute::AttributeType;
use super::class::{ClassKind, ObjectClass};
use super::error::SchemaParseError;
use super::lexer::{tokenize, SpannedToken, Token};
use super::strip_ordering_prefix;

/// Parse an attribute type definition.
pub fn parse_attribute_type(definition: &str) -> Result<AttributeType, SchemaParseError> {
    let mut parser = Parser::new(strip_ordering_prefix(definition))?;
    parser.parse_attribute_type()
}

/// Parse an object class definition.
pub fn parse_object_class(definition: &str) -> Result<ObjectClass, SchemaParseError> {
    let mut parser = Parser::new(strip_ordering_prefix(definition))?;
    parser.parse_object_class()
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, SchemaParseError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            end: source.len(),
        })
    }

    fn parse_attribute_type(&mut self) -> Result<AttributeType, SchemaParseError> {
        let oid = self.parse_header()?;
        let mut attr = AttributeType::new(oid, String::new());
        attr.names.clear();

        while let Some(keyword) = self.next_keyword()? {
            match keyword.to_ascii_uppercase().as_str() {
                "NAME" => attr.names = self.parse_qdescrs()?,
                "DESC" => attr.desc = Some(self.expect_quoted()?),
                "OBSOLETE" => attr.obsolete = true,
                "SUP" => attr.sup = Some(self.expect_word()?),
                "EQUALITY" => attr.equality = Some(self.expect_word()?),
                "ORDERING" => attr.ordering = Some(self.expect_word()?),
                "SUBSTR" => attr.substr = Some(self.expect_word()?),
                "SYNTAX" => attr.syntax = Some(self.expect_word()?),
                "SINGLE-VALUE" => attr.single_value = true,
                "COLLECTIVE" => attr.collective = true,
                "NO-USER-MODIFICATION" => attr.no_user_modification = true,
                "USAGE" => attr.usage = Some(self.expect_word()?),
                ext if ext.starts_with("X-") => {
                    let values = self.parse_qdstrings()?;
                    attr.extensions.push((keyword, values));
                }
                _ => return Err(self.error_before(format!("unknown attribute type keyword '{}'", keyword))),
            }
        }

        self.finish(&attr.oid, &attr.names)?;
        Ok(attr)
    }

    fn parse_object_class(&mut self) -> Result<ObjectClass, SchemaParseError> {
        let oid = self.parse_header()?;
        let mut class = ObjectClass::new(oid, String::new());
        class.names.clear();

        while let Some(keyword) = self.next_keyword()? {
            match keyword.to_ascii_uppercase().as_str() {
                "NAME" => class.names = self.parse_qdescrs()?,
                "DESC" => class.desc = Some(self.expect_quoted()?),
                "OBSOLETE" => class.obsolete = true,
                "SUP" => class.sup = self.parse_oids()?,
                "ABSTRACT" => class.kind = ClassKind::Abstract,
                "STRUCTURAL" => class.kind = ClassKind::Structural,
                "AUXILIARY" => class.kind = ClassKind::Auxiliary,
                "MUST" => class.must = self.parse_oids()?,
                "MAY" => class.may = self.parse_oids()?,
                ext if ext.starts_with("X-") => {
                    let values = self.parse_qdstrings()?;
                    class.extensions.push((keyword, values));
                }
                _ => return Err(self.error_before(format!("unknown object class keyword '{}'", keyword))),
            }
        }

        self.finish(&class.oid, &class.names)?;
        Ok(class)
    }

    /// Parse `( oid`.
    fn parse_header(&mut self) -> Result<String, SchemaParseError> {
        self.expect_token(Token::LParen)?;
        self.expect_word()
    }

    /// Next keyword, or `None` at the closing parenthesis.
    fn next_keyword(&mut self) -> Result<Option<String>, SchemaParseError> {
        match self.next_token()? {
            SpannedToken {
                token: Token::RParen,
                ..
            } => Ok(None),
            SpannedToken {
                token: Token::Word(word),
                ..
            } => Ok(Some(word)),
            other => Err(SchemaParseError::new(
                format!("expected keyword, found {:?}", other.token),
                other.offset,
            )),
        }
    }

    /// Validate the trailer and the mandatory parts once `)` was consumed.
    fn finish(&self, oid: &str, names: &[String]) -> Result<(), SchemaParseError> {
        if let Some(extra) = self.tokens.get(self.pos) {
            return Err(SchemaParseError::new(
                "unexpected input after closing parenthesis",
                extra.offset,
            ));
        }
        if names.is_empty() {
            return Err(SchemaParseError::new(
                format!("definition of {} has no NAME", oid),
                0,
            ));
        }
        Ok(())
    }

    /// `'name'` or `( 'a' 'b' )`.
    fn parse_qdescrs(&mut self) -> Result<Vec<String>, SchemaParseError> {
        self.parse_list(|token| match token {
            Token::Quoted(s) => Some(s),
            _ => None,
        })
    }

    /// Same shape as qdescrs; used for extension values.
    fn parse_qdstrings(&mut self) -> Result<Vec<String>, SchemaParseError> {
        self.parse_qdescrs()
    }

    /// `name` or `( a $ b )`. A missing `$` between elements is tolerated,
    /// some vendors emit space separated lists.
    fn parse_oids(&mut self) -> Result<Vec<String>, SchemaParseError> {
        self.parse_list(|token| match token {
            Token::Word(s) => Some(s),
            _ => None,
        })
    }

    fn parse_list(
        &mut self,
        element: impl Fn(Token) -> Option<String>,
    ) -> Result<Vec<String>, SchemaParseError> {
        let first = self.next_token()?;
        if first.token != Token::LParen {
            return match element(first.token.clone()) {
                Some(value) => Ok(vec![value]),
                None => Err(SchemaParseError::new(
                    format!("unexpected {:?}", first.token),
                    first.offset,
                )),
            };
        }

        let mut values = Vec::new();
        loop {
            let tok = self.next_token()?;
            match tok.token {
                Token::RParen => break,
                Token::Dollar => continue,
                other => match element(other.clone()) {
                    Some(value) => values.push(value),
                    None => {
                        return Err(SchemaParseError::new(
                            format!("unexpected {:?} in list", other),
                            tok.offset,
                        ))
                    }
                },
            }
        }

        if values.is_empty() {
            return Err(SchemaParseError::new("empty list", first.offset));
        }
        Ok(values)
    }

    fn expect_word(&mut self) -> Result<String, SchemaParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::Word(word) => Ok(word),
            other => Err(SchemaParseError::new(
                format!("expected identifier, found {:?}", other),
                tok.offset,
            )),
        }
    }

    fn expect_quoted(&mut self) -> Result<String, SchemaParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::Quoted(s) => Ok(s),
            other => Err(SchemaParseError::new(
                format!("expected quoted string, found {:?}", other),
                tok.offset,
            )),
        }
    }

    fn expect_token(&mut self, expected: Token) -> Result<(), SchemaParseError> {
        let tok = self.next_token()?;
        if tok.token == expected {
            Ok(())
        } else {
            Err(SchemaParseError::new(
                format!("expected {:?}, found {:?}", expected, tok.token),
                tok.offset,
            ))
        }
    }

    fn next_token(&mut self) -> Result<SpannedToken, SchemaParseError> {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(tok.clone())
            }
            None => Err(SchemaParseError::new("unexpected end of definition", self.end)),
        }
    }

    fn error_before(&self, message: String) -> SchemaParseError {
        let offset = self
            .pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.offset)
            .unwrap_or(0);
        SchemaParseError::new(message, offset)
    }
}
