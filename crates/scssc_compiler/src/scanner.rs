//! Tokenizer for the expression language.
//!
//! Token classes are tried in a fixed priority order. A handful of classes
//! depend on their surroundings: `- ` (subtraction) must be followed by
//! whitespace, a unary `-` must not start a word, units only attach when not
//! preceded by whitespace, and the word operators (`and`, `or`, `not`,
//! `true`, `false`) need word boundaries on both sides.

use scssc_shared::errors::{ScssError, ScssResult};

use crate::units;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Colon,
    Comma,
    LPar,
    RPar,
    End,
    Mul,
    Div,
    Add,
    /// Binary minus; the scanner only emits it before whitespace.
    Sub,
    /// Unary minus.
    Sign,
    And,
    Or,
    Not,
    Ne,
    Inv,
    Eq,
    Le,
    Ge,
    Lt,
    Gt,
    /// Single-quoted string; the text excludes the quotes.
    Str,
    /// Double-quoted string; the text excludes the quotes.
    QStr,
    Units,
    Num,
    Bool,
    Color,
    Var,
    /// Identifier directly followed by `(`.
    Fnct,
    Id,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: &str) -> Token {
        Token {
            kind,
            text: text.to_string(),
        }
    }
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '-' || c == '_'
}

/// Tokenizes a full expression. The resulting stream always ends with a
/// single [`TokenKind::End`] token.
pub fn tokenize(input: &str) -> ScssResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut after_space = true;

    while i < chars.len() {
        let c = chars[i];
        let prev_space = after_space;
        after_space = false;

        if c == ':' {
            tokens.push(Token::new(TokenKind::Colon, ":"));
            i += 1;
        } else if c.is_whitespace() {
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            after_space = true;
        } else if c == ',' {
            tokens.push(Token::new(TokenKind::Comma, ","));
            i += 1;
        } else if c == '(' || c == '[' {
            tokens.push(Token::new(TokenKind::LPar, "("));
            i += 1;
        } else if c == ')' || c == ']' {
            tokens.push(Token::new(TokenKind::RPar, ")"));
            i += 1;
        } else if c == '*' {
            tokens.push(Token::new(TokenKind::Mul, "*"));
            i += 1;
        } else if c == '/' {
            tokens.push(Token::new(TokenKind::Div, "/"));
            i += 1;
        } else if c == '+' {
            tokens.push(Token::new(TokenKind::Add, "+"));
            i += 1;
        } else if c == '-' && matches!(chars.get(i + 1), Some(n) if n.is_whitespace()) {
            tokens.push(Token::new(TokenKind::Sub, "-"));
            i += 1;
        } else if c == '-' && !matches!(chars.get(i + 1), Some(n) if n.is_ascii_alphabetic() || *n == '_')
        {
            tokens.push(Token::new(TokenKind::Sign, "-"));
            i += 1;
        } else if let Some((kind, text)) = match_word_op(&chars, i, prev_space) {
            tokens.push(Token::new(kind, text));
            i += text.len();
        } else if c == '!' && chars.get(i + 1) == Some(&'=') {
            tokens.push(Token::new(TokenKind::Ne, "!="));
            i += 2;
        } else if c == '!' {
            tokens.push(Token::new(TokenKind::Inv, "!"));
            i += 1;
        } else if c == '=' && chars.get(i + 1) == Some(&'=') {
            tokens.push(Token::new(TokenKind::Eq, "=="));
            i += 2;
        } else if c == '<' || c == '>' {
            let eq = chars.get(i + 1) == Some(&'=');
            let kind = match (c, eq) {
                ('<', true) => TokenKind::Le,
                ('>', true) => TokenKind::Ge,
                ('<', false) => TokenKind::Lt,
                _ => TokenKind::Gt,
            };
            tokens.push(Token::new(kind, if eq { "<=" } else { "<" }));
            i += if eq { 2 } else { 1 };
        } else if c == '\'' || c == '"' {
            let quote = c;
            let mut j = i + 1;
            while j < chars.len() && chars[j] != quote {
                j += 1;
            }
            if j >= chars.len() {
                return Err(ScssError::syntax("unterminated string"));
            }
            let content: String = chars[i + 1..j].iter().collect();
            let kind = if quote == '\'' { TokenKind::Str } else { TokenKind::QStr };
            tokens.push(Token {
                kind,
                text: content,
            });
            i = j + 1;
        } else if let Some(unit) = match_unit(&chars, i, prev_space) {
            tokens.push(Token {
                kind: TokenKind::Units,
                text: unit.clone(),
            });
            i += unit.len();
        } else if c.is_ascii_digit() || (c == '.' && matches!(chars.get(i + 1), Some(n) if n.is_ascii_digit()))
        {
            let mut j = i;
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            if chars.get(j) == Some(&'.') {
                j += 1;
                while j < chars.len() && chars[j].is_ascii_digit() {
                    j += 1;
                }
            }
            let text: String = chars[i..j].iter().collect();
            tokens.push(Token {
                kind: TokenKind::Num,
                text,
            });
            i = j;
        } else if c == '#' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_ascii_hexdigit() {
                j += 1;
            }
            let digits = j - i - 1;
            if digits == 3 || digits == 6 {
                let text: String = chars[i..j].iter().collect();
                tokens.push(Token {
                    kind: TokenKind::Color,
                    text,
                });
                i = j;
            } else {
                return Err(ScssError::syntax("bad color literal"));
            }
        } else if c == '$' {
            let mut j = i + 1;
            while j < chars.len() && is_word(chars[j]) {
                j += 1;
            }
            if j == i + 1 {
                return Err(ScssError::syntax("bad variable reference"));
            }
            let text: String = chars[i..j].iter().collect();
            tokens.push(Token {
                kind: TokenKind::Var,
                text,
            });
            i = j;
        } else if is_ident_start(c) {
            let mut j = i;
            while j < chars.len() && is_word(chars[j]) {
                j += 1;
            }
            let text: String = chars[i..j].iter().collect();
            let kind = if chars.get(j) == Some(&'(') {
                TokenKind::Fnct
            } else {
                TokenKind::Id
            };
            tokens.push(Token { kind, text });
            i = j;
        } else {
            return Err(ScssError::Syntax(format!("unexpected character `{c}`")));
        }
    }

    tokens.push(Token::new(TokenKind::End, ""));
    Ok(tokens)
}

/// Matches `and`/`or`/`not` and `true`/`false` with word boundaries.
fn match_word_op(chars: &[char], i: usize, prev_space: bool) -> Option<(TokenKind, &'static str)> {
    let candidates: [(&str, TokenKind); 5] = [
        ("and", TokenKind::And),
        ("or", TokenKind::Or),
        ("not", TokenKind::Not),
        ("true", TokenKind::Bool),
        ("false", TokenKind::Bool),
    ];
    let bounded_before = prev_space || i == 0 || !is_word(chars[i - 1]);
    if !bounded_before {
        return None;
    }
    for (word, kind) in candidates {
        if chars[i..].starts_with(&word.chars().collect::<Vec<_>>()[..])
            && !matches!(chars.get(i + word.len()), Some(c) if is_word(*c))
        {
            return Some((kind, word));
        }
    }
    None
}

/// Matches a known unit, only directly after its number (no whitespace) and
/// not as a prefix of a longer word.
fn match_unit(chars: &[char], i: usize, prev_space: bool) -> Option<String> {
    if prev_space {
        return None;
    }
    let mut best: Option<&str> = None;
    for unit in units::UNITS {
        let unit_chars: Vec<char> = unit.chars().collect();
        if chars[i..].starts_with(&unit_chars[..])
            && !matches!(chars.get(i + unit_chars.len()), Some(c) if is_word(*c))
            && best.map_or(true, |b| unit.len() > b.len())
        {
            best = Some(unit);
        }
    }
    best.map(String::from)
}

#[cfg(test)]
mod tests {
    use super::{tokenize, TokenKind};

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn numbers_and_units() {
        assert_eq!(
            kinds("1px + 2px"),
            vec![
                TokenKind::Num,
                TokenKind::Units,
                TokenKind::Add,
                TokenKind::Num,
                TokenKind::Units,
                TokenKind::End
            ]
        );
    }

    #[test]
    fn unit_needs_adjacency() {
        // a space before `px` demotes it to an identifier
        assert_eq!(
            kinds("1 px"),
            vec![TokenKind::Num, TokenKind::Id, TokenKind::End]
        );
    }

    #[test]
    fn subtraction_needs_space() {
        assert_eq!(
            kinds("5 - 3"),
            vec![TokenKind::Num, TokenKind::Sub, TokenKind::Num, TokenKind::End]
        );
        // a hyphenated identifier survives
        assert_eq!(kinds("font-size"), vec![TokenKind::Id, TokenKind::End]);
        // unary minus before a number
        assert_eq!(
            kinds("-3"),
            vec![TokenKind::Sign, TokenKind::Num, TokenKind::End]
        );
    }

    #[test]
    fn word_operators_are_bounded() {
        assert_eq!(
            kinds("$a and $b"),
            vec![TokenKind::Var, TokenKind::And, TokenKind::Var, TokenKind::End]
        );
        assert_eq!(kinds("android"), vec![TokenKind::Id, TokenKind::End]);
        assert_eq!(kinds("sandy"), vec![TokenKind::Id, TokenKind::End]);
    }

    #[test]
    fn function_calls() {
        assert_eq!(
            kinds("rgb(255, 0, 0)"),
            vec![
                TokenKind::Fnct,
                TokenKind::LPar,
                TokenKind::Num,
                TokenKind::Comma,
                TokenKind::Num,
                TokenKind::Comma,
                TokenKind::Num,
                TokenKind::RPar,
                TokenKind::End
            ]
        );
        assert_eq!(
            kinds("-moz-calc(1)"),
            vec![
                TokenKind::Fnct,
                TokenKind::LPar,
                TokenKind::Num,
                TokenKind::RPar,
                TokenKind::End
            ]
        );
    }

    #[test]
    fn colors_and_strings() {
        let tokens = tokenize("#f00 \"a b\" 'c'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Color);
        assert_eq!(tokens[0].text, "#f00");
        assert_eq!(tokens[1].kind, TokenKind::QStr);
        assert_eq!(tokens[1].text, "a b");
        assert_eq!(tokens[2].kind, TokenKind::Str);
        assert_eq!(tokens[2].text, "c");
    }

    #[test]
    fn comparison_operators() {
        assert_eq!(
            kinds("1 <= 2 != 3"),
            vec![
                TokenKind::Num,
                TokenKind::Le,
                TokenKind::Num,
                TokenKind::Ne,
                TokenKind::Num,
                TokenKind::End
            ]
        );
    }

    #[test]
    fn bad_input() {
        assert!(tokenize("\"unterminated").is_err());
        assert!(tokenize("@").is_err());
    }
}
