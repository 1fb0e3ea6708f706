//! Token source for C header text
//!
//! One pass over the raw text: backslash-newline continuations are spliced,
//! comments are stripped (string and char literals stay verbatim), and the
//! remainder becomes the token stream shared by the preprocessor and the
//! declaration parser. Physical line numbers are tracked through splices so
//! later stages can report accurate locations.

use hdrscan_core::{Error, IntFlags, Result, Token, TokenKind};

/// Tokenize header text. The only fatal outcomes are unterminated
/// string/char literals and unterminated block comments.
pub fn tokenize(file: &str, text: &str) -> Result<Vec<Token>> {
    Lexer::new(file, text).run()
}

struct Lexer<'a> {
    file: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: u32,
}

const PUNCTS3: &[&str] = &["<<=", ">>=", "..."];
const PUNCTS2: &[&str] = &[
    "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "##", "::",
];

impl<'a> Lexer<'a> {
    fn new(file: &'a str, text: &str) -> Self {
        Self {
            file,
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    /// Consume a backslash-newline continuation if one starts here.
    fn eat_splice(&mut self) -> bool {
        if self.peek() == Some('\\') {
            match self.peek_at(1) {
                Some('\n') => {
                    self.pos += 2;
                    self.line += 1;
                    return true;
                }
                Some('\r') if self.peek_at(2) == Some('\n') => {
                    self.pos += 3;
                    self.line += 1;
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    fn fatal(&self, message: &str) -> Error {
        Error::Tokenize(format!("{}:{}: {}", self.file, self.line, message))
    }

    fn run(mut self) -> Result<Vec<Token>> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut space = false;
        let mut line_start = true;

        loop {
            if self.eat_splice() {
                continue;
            }
            let c = match self.peek() {
                Some(c) => c,
                None => break,
            };

            match c {
                ' ' | '\t' | '\r' => {
                    self.pos += 1;
                    space = true;
                }
                '\n' => {
                    tokens.push(Token::new(TokenKind::Newline, "\n", self.line));
                    self.pos += 1;
                    self.line += 1;
                    space = false;
                    line_start = true;
                }
                '/' if self.peek_at(1) == Some('/') => {
                    self.skip_line_comment();
                    space = true;
                }
                '/' if self.peek_at(1) == Some('*') => {
                    self.skip_block_comment()?;
                    space = true;
                }
                '"' => {
                    let tok = self.scan_quoted('"', TokenKind::Str)?;
                    Self::push(&mut tokens, tok, &mut space, &mut line_start);
                }
                '\'' => {
                    let tok = self.scan_quoted('\'', TokenKind::Char)?;
                    Self::push(&mut tokens, tok, &mut space, &mut line_start);
                }
                '#' if line_start => {
                    let tok = Token::new(TokenKind::Hash, "#", self.line);
                    self.pos += 1;
                    Self::push(&mut tokens, tok, &mut space, &mut line_start);
                }
                c if c.is_ascii_digit() => {
                    let tok = self.scan_number();
                    Self::push(&mut tokens, tok, &mut space, &mut line_start);
                }
                '.' if self.peek_at(1).map_or(false, |d| d.is_ascii_digit()) => {
                    let tok = self.scan_number();
                    Self::push(&mut tokens, tok, &mut space, &mut line_start);
                }
                c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                    let tok = self.scan_ident();
                    Self::push(&mut tokens, tok, &mut space, &mut line_start);
                }
                _ => {
                    let tok = self.scan_punct();
                    Self::push(&mut tokens, tok, &mut space, &mut line_start);
                }
            }
        }

        Ok(tokens)
    }

    fn push(tokens: &mut Vec<Token>, mut tok: Token, space: &mut bool, line_start: &mut bool) {
        tok.space_before = *space;
        tokens.push(tok);
        *space = false;
        *line_start = false;
    }

    fn skip_line_comment(&mut self) {
        self.pos += 2;
        loop {
            if self.eat_splice() {
                // comment continues on the next physical line
                continue;
            }
            match self.peek() {
                None | Some('\n') => break,
                _ => self.pos += 1,
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        self.pos += 2;
        loop {
            match self.peek() {
                None => return Err(self.fatal("unterminated block comment")),
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.pos += 2;
                    return Ok(());
                }
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn scan_quoted(&mut self, quote: char, kind: TokenKind) -> Result<Token> {
        let line = self.line;
        let mut text = String::new();
        text.push(quote);
        self.pos += 1;
        loop {
            if self.eat_splice() {
                continue;
            }
            match self.peek() {
                None | Some('\n') => {
                    let what = if quote == '"' { "string" } else { "char" };
                    return Err(self.fatal(&format!("unterminated {} literal", what)));
                }
                Some('\\') => {
                    text.push('\\');
                    self.pos += 1;
                    if let Some(escaped) = self.peek() {
                        text.push(escaped);
                        self.pos += 1;
                    }
                }
                Some(c) if c == quote => {
                    text.push(c);
                    self.pos += 1;
                    return Ok(Token::new(kind, text, line));
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn scan_number(&mut self) -> Token {
        let line = self.line;
        let mut text = String::new();
        let mut flags = IntFlags {
            base: 10,
            ..Default::default()
        };
        let mut is_float = false;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            flags.base = 16;
            text.push(self.chars[self.pos]);
            text.push(self.chars[self.pos + 1]);
            self.pos += 2;
            loop {
                if self.eat_splice() {
                    continue;
                }
                match self.peek() {
                    Some(c) if c.is_ascii_hexdigit() => {
                        text.push(c);
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
        } else {
            let mut seen_dot = false;
            let mut seen_exp = false;
            loop {
                if self.eat_splice() {
                    continue;
                }
                match self.peek() {
                    Some(c) if c.is_ascii_digit() => {
                        text.push(c);
                        self.pos += 1;
                    }
                    Some('.') if !seen_dot && !seen_exp => {
                        seen_dot = true;
                        is_float = true;
                        text.push('.');
                        self.pos += 1;
                    }
                    Some(c @ ('e' | 'E')) if !seen_exp => {
                        let next = self.peek_at(1);
                        let sign_digit = matches!(next, Some('+') | Some('-'))
                            && self.peek_at(2).map_or(false, |d| d.is_ascii_digit());
                        let plain_digit = next.map_or(false, |d| d.is_ascii_digit());
                        if !sign_digit && !plain_digit {
                            break;
                        }
                        seen_exp = true;
                        is_float = true;
                        text.push(c);
                        self.pos += 1;
                        if let Some(s @ ('+' | '-')) = self.peek() {
                            text.push(s);
                            self.pos += 1;
                        }
                    }
                    _ => break,
                }
            }
            if !is_float
                && text.len() > 1
                && text.starts_with('0')
                && text[1..].bytes().all(|b| (b'0'..=b'7').contains(&b))
            {
                flags.base = 8;
            }
        }

        // suffixes
        if is_float {
            while let Some(c @ ('f' | 'F' | 'l' | 'L')) = self.peek() {
                text.push(c);
                self.pos += 1;
            }
            Token::new(TokenKind::Float, text, line)
        } else {
            loop {
                match self.peek() {
                    Some(c @ ('u' | 'U')) => {
                        flags.unsigned = true;
                        text.push(c);
                        self.pos += 1;
                    }
                    Some(c @ ('l' | 'L')) => {
                        if flags.long {
                            flags.long_long = true;
                        }
                        flags.long = true;
                        text.push(c);
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
            Token::new(TokenKind::Int(flags), text, line)
        }
    }

    fn scan_ident(&mut self) -> Token {
        let line = self.line;
        let mut text = String::new();
        loop {
            if self.eat_splice() {
                continue;
            }
            match self.peek() {
                Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '$' => {
                    text.push(c);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        Token::new(TokenKind::Ident, text, line)
    }

    fn scan_punct(&mut self) -> Token {
        let line = self.line;
        let rest: String = self.chars[self.pos..self.chars.len().min(self.pos + 3)]
            .iter()
            .collect();
        for p in PUNCTS3 {
            if rest.starts_with(p) {
                self.pos += 3;
                return Token::new(TokenKind::Punct, *p, line);
            }
        }
        for p in PUNCTS2 {
            if rest.starts_with(p) {
                self.pos += 2;
                return Token::new(TokenKind::Punct, *p, line);
            }
        }
        let c = self.chars[self.pos];
        self.pos += 1;
        Token::new(TokenKind::Punct, c.to_string(), line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .map(|t| t.text.as_str())
            .collect()
    }

    #[test]
    fn test_comments_stripped_strings_kept() {
        let tokens = tokenize("t.h", "int a; /* comment */ char *s = \"/* not */\"; // tail").unwrap();
        let texts = texts(&tokens);
        assert_eq!(
            texts,
            vec!["int", "a", ";", "char", "*", "s", "=", "\"/* not */\"", ";"]
        );
    }

    #[test]
    fn test_block_comment_counts_lines() {
        let tokens = tokenize("t.h", "/* a\nb\nc */ int x;").unwrap();
        assert_eq!(tokens[0].text, "int");
        assert_eq!(tokens[0].line, 3);
        assert!(tokens[0].space_before);
    }

    #[test]
    fn test_splice_preserves_line_numbers() {
        let tokens = tokenize("t.h", "#define A 1 \\\n + 2\nint x;").unwrap();
        let plus = tokens.iter().find(|t| t.is_punct("+")).unwrap();
        assert_eq!(plus.line, 2);
        // the spliced newline is consumed; only the real line break remains
        let newline_count = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Newline)
            .count();
        assert_eq!(newline_count, 1);
        let x = tokens.iter().find(|t| t.is_ident("x")).unwrap();
        assert_eq!(x.line, 3);
    }

    #[test]
    fn test_unterminated_string_is_fatal() {
        assert!(tokenize("t.h", "char *s = \"oops;\n").is_err());
        assert!(tokenize("t.h", "/* never closed").is_err());
    }

    #[test]
    fn test_int_literal_flags() {
        let tokens = tokenize("t.h", "0x1FUL 42 0755 3ULL").unwrap();
        match tokens[0].kind {
            TokenKind::Int(flags) => {
                assert_eq!(flags.base, 16);
                assert!(flags.unsigned);
                assert!(flags.long);
            }
            _ => panic!("expected int"),
        }
        match tokens[1].kind {
            TokenKind::Int(flags) => assert_eq!(flags.base, 10),
            _ => panic!("expected int"),
        }
        match tokens[2].kind {
            TokenKind::Int(flags) => assert_eq!(flags.base, 8),
            _ => panic!("expected int"),
        }
        match tokens[3].kind {
            TokenKind::Int(flags) => {
                assert!(flags.unsigned);
                assert!(flags.long_long);
            }
            _ => panic!("expected int"),
        }
    }

    #[test]
    fn test_float_literals() {
        let tokens = tokenize("t.h", "1.0 1.1e1 -1.1E-1 .5").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[1].kind, TokenKind::Float);
        // leading '-' is a separate punctuator
        assert!(tokens[2].is_punct("-"));
        assert_eq!(tokens[3].kind, TokenKind::Float);
        assert_eq!(tokens[4].kind, TokenKind::Float);
        assert_eq!(tokens[4].text, ".5");
    }

    #[test]
    fn test_hash_only_at_line_start() {
        let tokens = tokenize("t.h", "#define A\nint a # b;").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Hash);
        let mid = tokens.iter().filter(|t| t.text == "#").nth(1).unwrap();
        assert_eq!(mid.kind, TokenKind::Punct);
    }

    #[test]
    fn test_multichar_punctuators() {
        let tokens = tokenize("t.h", "a <<= b ... c -> d").unwrap();
        let p: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Punct)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(p, vec!["<<=", "...", "->"]);
    }

    #[test]
    fn test_char_literal_with_escape() {
        let tokens = tokenize("t.h", r"char c = '\n';").unwrap();
        let lit = tokens.iter().find(|t| t.kind == TokenKind::Char).unwrap();
        assert_eq!(lit.text, r"'\n'");
    }
}
