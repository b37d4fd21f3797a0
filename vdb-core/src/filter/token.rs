use vdb_common::LexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Operator,
    Keyword,
    LParen,
    RParen,
    Comma,
    LBracket,
    RBracket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    And,
    Or,
    Not,
    In,
    Like,
    Is,
    Null,
    True,
    False,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Keyword> {
        const TABLE: [(&str, Keyword); 9] = [
            ("AND", Keyword::And),
            ("OR", Keyword::Or),
            ("NOT", Keyword::Not),
            ("IN", Keyword::In),
            ("LIKE", Keyword::Like),
            ("IS", Keyword::Is),
            ("NULL", Keyword::Null),
            ("TRUE", Keyword::True),
            ("FALSE", Keyword::False),
        ];
        TABLE
            .iter()
            .find(|(kw, _)| word.eq_ignore_ascii_case(kw))
            .map(|(_, k)| *k)
    }
}

/// One lexed token. `text` is the cooked value: keywords are uppercased,
/// string literals are unquoted and unescaped, `<>` is normalized to `!=`.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
    pub keyword: Option<Keyword>,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            position,
            keyword: None,
        }
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.keyword == Some(kw)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '(' | ')' | ',' | '[' | ']' => {
                chars.next();
                let kind = match c {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    ',' => TokenKind::Comma,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::RBracket,
                };
                tokens.push(Token::new(kind, c.to_string(), pos));
            }
            '=' | '<' | '>' | '!' => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let op = match (c, next) {
                    ('<', Some('=')) | ('>', Some('=')) | ('!', Some('=')) => {
                        chars.next();
                        format!("{c}=")
                    }
                    ('<', Some('>')) => {
                        chars.next();
                        "!=".to_string()
                    }
                    ('!', _) => {
                        return Err(LexError {
                            message: "expected '=' after '!'".into(),
                            position: pos,
                        })
                    }
                    _ => c.to_string(),
                };
                tokens.push(Token::new(TokenKind::Operator, op, pos));
            }
            '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some((_, esc)) => value.push(esc),
                            None => break,
                        },
                        '\'' => {
                            // '' inside a literal is an escaped quote
                            if matches!(chars.peek(), Some(&(_, '\''))) {
                                chars.next();
                                value.push('\'');
                            } else {
                                closed = true;
                                break;
                            }
                        }
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err(LexError {
                        message: "unterminated string literal".into(),
                        position: pos,
                    });
                }
                tokens.push(Token::new(TokenKind::String, value, pos));
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                tokens.push(lex_number(input, &mut chars, pos)?);
            }
            c if is_ident_start(c) => {
                let mut end = pos;
                while let Some(&(i, ch)) = chars.peek() {
                    if !is_ident_char(ch) {
                        break;
                    }
                    end = i + ch.len_utf8();
                    chars.next();
                }
                let word = &input[pos..end];
                match Keyword::lookup(word) {
                    Some(kw) => {
                        let mut tok = Token::new(TokenKind::Keyword, word.to_ascii_uppercase(), pos);
                        tok.keyword = Some(kw);
                        tokens.push(tok);
                    }
                    None => tokens.push(Token::new(TokenKind::Identifier, word, pos)),
                }
            }
            other => {
                return Err(LexError {
                    message: format!("illegal character '{other}'"),
                    position: pos,
                })
            }
        }
    }
    Ok(tokens)
}

fn lex_number(
    input: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    start: usize,
) -> Result<Token, LexError> {
    let mut end = start;
    let mut seen_digit = false;
    let mut prev = None;
    while let Some(&(i, ch)) = chars.peek() {
        let accept = match ch {
            '0'..='9' => {
                seen_digit = true;
                true
            }
            '-' => i == start || matches!(prev, Some('e') | Some('E')),
            '+' => matches!(prev, Some('e') | Some('E')),
            '.' | 'e' | 'E' => true,
            _ => false,
        };
        if !accept {
            break;
        }
        prev = Some(ch);
        end = i + ch.len_utf8();
        chars.next();
    }
    let text = &input[start..end];
    let valid = seen_digit
        && if text.contains(['.', 'e', 'E']) {
            text.parse::<f64>().is_ok()
        } else {
            text.parse::<i64>().is_ok()
        };
    if !valid {
        return Err(LexError {
            message: format!("malformed number '{text}'"),
            position: start,
        });
    }
    Ok(Token::new(TokenKind::Number, text, start))
}
