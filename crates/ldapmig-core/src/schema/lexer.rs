//! Lexer for RFC 4512 schema definition strings using logos.

use super::error::SchemaParseError;
use logos::Logos;

/// Token types for attribute type and object class definitions.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("$")]
    Dollar,

    // Quoted descriptor or string (qdescr / qdstring)
    #[regex(r"'[^']*'", |lex| {
        let s = lex.slice();
        unescape_qdstring(&s[1..s.len() - 1])
    })]
    Quoted(String),

    // Numeric oid, descriptor or keyword. Syntax oids may carry a length
    // bound such as `1.3.6.1.4.1.1466.115.121.1.15{256}`.
    #[regex(r"[A-Za-z0-9][A-Za-z0-9.;_\-]*(\{[0-9]+\})?", |lex| lex.slice().to_string())]
    Word(String),
}

/// Undo the `\27` / `\5C` escaping used inside qdstrings.
fn unescape_qdstring(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find('\\') {
        result.push_str(&rest[..pos]);
        let escape = rest.get(pos + 1..pos + 3);
        match escape.map(|e| e.to_ascii_lowercase()) {
            Some(e) if e == "27" => {
                result.push('\'');
                rest = &rest[pos + 3..];
            }
            Some(e) if e == "5c" => {
                result.push('\\');
                rest = &rest[pos + 3..];
            }
            _ => {
                result.push('\\');
                rest = &rest[pos + 1..];
            }
        }
    }
    result.push_str(rest);
    result
}

/// Escape a value for use inside a qdstring.
pub fn escape_qdstring(s: &str) -> String {
    s.replace('\\', "\\5C").replace('\'', "\\27")
}

/// A token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub offset: usize,
}

/// Tokenize a definition string.
///
/// Unlike a permissive lexer, any character that does not start a token is
/// reported as an error: a definition we cannot read fully must not be
/// compared against the target.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, SchemaParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let offset = lexer.span().start;
        match result {
            Ok(token) => tokens.push(SpannedToken { token, offset }),
            Err(()) => {
                return Err(SchemaParseError::new(
                    format!("unexpected character sequence '{}'", lexer.slice()),
                    offset,
                ))
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_simple_attribute() {
        let tokens = kinds("( 2.5.4.3 NAME 'cn' SUP name )");
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Word("2.5.4.3".to_string()),
                Token::Word("NAME".to_string()),
                Token::Quoted("cn".to_string()),
                Token::Word("SUP".to_string()),
                Token::Word("name".to_string()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_syntax_length_bound() {
        let tokens = kinds("SYNTAX 1.3.6.1.4.1.1466.115.121.1.15{256}");
        assert_eq!(
            tokens[1],
            Token::Word("1.3.6.1.4.1.1466.115.121.1.15{256}".to_string())
        );
    }

    #[test]
    fn test_keywords_with_hyphen() {
        let tokens = kinds("SINGLE-VALUE NO-USER-MODIFICATION X-ORIGIN 'RFC 4519'");
        assert_eq!(tokens[0], Token::Word("SINGLE-VALUE".to_string()));
        assert_eq!(tokens[1], Token::Word("NO-USER-MODIFICATION".to_string()));
        assert_eq!(tokens[2], Token::Word("X-ORIGIN".to_string()));
        assert_eq!(tokens[3], Token::Quoted("RFC 4519".to_string()));
    }

    #[test]
    fn test_dollar_separated_list() {
        let tokens = kinds("MUST ( sn $ cn )");
        assert_eq!(tokens[2], Token::Word("sn".to_string()));
        assert_eq!(tokens[3], Token::Dollar);
    }

    #[test]
    fn test_qdstring_escapes() {
        let tokens = kinds(r"DESC 'it\27s a back\5Cslash'");
        assert_eq!(tokens[1], Token::Quoted("it's a back\\slash".to_string()));
        assert_eq!(escape_qdstring("it's a back\\slash"), r"it\27s a back\5Cslash");
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("( 1.2.3 NAME # )").unwrap_err();
        assert_eq!(err.offset, 13);
    }
}
