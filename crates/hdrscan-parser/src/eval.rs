//! Constant expression evaluation
//!
//! Evaluates preprocessor conditions and declaration initializers over the
//! token stream. Integer arithmetic is 64-bit two's complement. Anything
//! that does not reduce in a declaration context comes back as
//! `Value::Symbolic` carrying the original tokens; in a preprocessor
//! condition unknown identifiers evaluate to 0 instead.

use crate::macros::{Macro, MacroTable};
use hdrscan_core::{Diagnostic, IntFlags, Location, Token, TokenKind, Value};
use std::collections::HashSet;

/// Extra names visible to the evaluator (enum members, earlier values).
pub trait SymbolEnv {
    fn resolve_symbol(&self, name: &str) -> Option<Value>;
}

/// An empty symbol environment
pub struct NoSymbols;

impl SymbolEnv for NoSymbols {
    fn resolve_symbol(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Type spellings accepted inside a C-style cast
const CAST_TYPE_WORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "bool",
    "_Bool", "size_t", "ssize_t", "wchar_t", "time_t", "int8_t", "uint8_t", "int16_t", "uint16_t",
    "int32_t", "uint32_t", "int64_t", "uint64_t",
];

/// Constant expression evaluator
pub struct Evaluator<'a> {
    macros: Option<&'a MacroTable>,
    symbols: Option<&'a dyn SymbolEnv>,
    /// Preprocessor-condition mode: undefined identifiers count as 0 and
    /// `defined` is a primitive
    zero_undefined: bool,
    file: &'a str,
    active: HashSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> Evaluator<'a> {
    /// Evaluator for `#if`/`#elif` conditions.
    pub fn for_condition(macros: &'a MacroTable, file: &'a str) -> Self {
        Self {
            macros: Some(macros),
            symbols: None,
            zero_undefined: true,
            file,
            active: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Evaluator for initializers and macro values.
    pub fn new(
        macros: Option<&'a MacroTable>,
        symbols: Option<&'a dyn SymbolEnv>,
        file: &'a str,
    ) -> Self {
        Self {
            macros,
            symbols,
            zero_undefined: false,
            file,
            active: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Reduce `tokens` to a value; irreducible input comes back symbolic.
    pub fn eval_value(&mut self, tokens: &[Token]) -> Value {
        match self.eval_opt(tokens) {
            Some(v) => v,
            None => Value::Symbolic(
                tokens
                    .iter()
                    .filter(|t| t.kind != TokenKind::Newline)
                    .cloned()
                    .collect(),
            ),
        }
    }

    /// Evaluate a preprocessor condition. Malformed or irreducible
    /// conditions draw a warning and count as false.
    pub fn eval_condition(&mut self, tokens: &[Token]) -> bool {
        match self.eval_opt(tokens).as_ref().and_then(truthy) {
            Some(b) => b,
            None => {
                let line = tokens.first().map(|t| t.line).unwrap_or(0);
                self.diagnostics.push(Diagnostic::warning(
                    Some(Location::new(self.file, line)),
                    format!(
                        "could not evaluate preprocessor condition '{}'; assuming false",
                        hdrscan_core::token::render(tokens)
                    ),
                ));
                false
            }
        }
    }

    fn eval_opt(&mut self, tokens: &[Token]) -> Option<Value> {
        let toks: Vec<Token> = tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .cloned()
            .collect();
        if toks.is_empty() {
            return None;
        }
        let mut parser = ExprParser {
            toks,
            pos: 0,
            ev: self,
        };
        let value = parser.parse_conditional()?;
        if parser.pos != parser.toks.len() {
            return None;
        }
        Some(value)
    }

    fn resolve_ident(&mut self, name: &str) -> Option<Value> {
        if let Some(symbols) = self.symbols {
            if let Some(v) = symbols.resolve_symbol(name) {
                return Some(v);
            }
        }
        if let Some(table) = self.macros {
            if let Some(Macro::Object(m)) = table.lookup(name) {
                if self.active.contains(name) {
                    return None;
                }
                let body = m.body.clone();
                self.active.insert(name.to_string());
                let result = self.eval_opt(&body);
                self.active.remove(name);
                if let Some(v) = result {
                    return Some(v);
                }
            }
        }
        if self.zero_undefined {
            return Some(Value::Int(0));
        }
        None
    }
}

struct ExprParser<'e, 'a> {
    toks: Vec<Token>,
    pos: usize,
    ev: &'e mut Evaluator<'a>,
}

impl<'e, 'a> ExprParser<'e, 'a> {
    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.toks.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.peek().map_or(false, |t| t.is_punct(p)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_conditional(&mut self) -> Option<Value> {
        let cond = self.parse_binary(0)?;
        if !self.eat_punct("?") {
            return Some(cond);
        }
        let then_val = self.parse_conditional()?;
        if !self.eat_punct(":") {
            return None;
        }
        let else_val = self.parse_conditional()?;
        if truthy(&cond)? {
            Some(then_val)
        } else {
            Some(else_val)
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Option<Value> {
        let mut lhs = self.parse_unary()?;
        loop {
            let (op, prec) = match self.peek() {
                Some(t) if t.kind == TokenKind::Punct => match precedence_of(&t.text) {
                    Some(pair) => pair,
                    None => break,
                },
                _ => break,
            };
            if prec < min_prec {
                break;
            }
            let line = self.peek().map(|t| t.line).unwrap_or(0);
            self.pos += 1;
            let rhs = self.parse_binary(prec + 1)?;
            lhs = self.apply_binary(&op, lhs, rhs, line)?;
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Value> {
        let tok = self.peek()?.clone();
        if tok.kind == TokenKind::Punct {
            match tok.text.as_str() {
                "+" => {
                    self.pos += 1;
                    return self.parse_unary();
                }
                "-" => {
                    self.pos += 1;
                    let v = self.parse_unary()?;
                    return match v {
                        Value::Int(n) => Some(Value::Int(n.wrapping_neg())),
                        Value::UInt(n) => Some(Value::Int((n as i64).wrapping_neg())),
                        Value::Float(x) => Some(Value::Float(-x)),
                        _ => None,
                    };
                }
                "!" => {
                    self.pos += 1;
                    let v = self.parse_unary()?;
                    return Some(Value::Int(if truthy(&v)? { 0 } else { 1 }));
                }
                "~" => {
                    self.pos += 1;
                    let v = self.parse_unary()?;
                    return Some(Value::Int(!to_i64(&v)?));
                }
                _ => {}
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Option<Value> {
        let tok = self.peek()?.clone();
        match tok.kind {
            TokenKind::Int(flags) => {
                self.pos += 1;
                parse_int_literal(&tok.text, flags)
            }
            TokenKind::Float => {
                self.pos += 1;
                parse_float_literal(&tok.text)
            }
            TokenKind::Char => {
                self.pos += 1;
                let inner = tok.text.trim_matches('\'');
                let unescaped = unescape(inner);
                unescaped.chars().next().map(|c| Value::Int(c as i64))
            }
            TokenKind::Str => {
                self.pos += 1;
                let mut s = unescape(tok.text.trim_matches('"'));
                // adjacent string literals concatenate
                while let Some(next) = self.peek() {
                    if next.kind == TokenKind::Str {
                        s.push_str(&unescape(next.text.trim_matches('"')));
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Some(Value::Str(s))
            }
            TokenKind::Ident if tok.text == "defined" && self.ev.zero_undefined => {
                self.pos += 1;
                self.parse_defined()
            }
            TokenKind::Ident => {
                self.pos += 1;
                self.ev.resolve_ident(&tok.text)
            }
            TokenKind::Punct if tok.text == "(" => {
                if let Some(result) = self.try_cast() {
                    return result;
                }
                self.pos += 1;
                let v = self.parse_conditional()?;
                if self.eat_punct(")") {
                    Some(v)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn parse_defined(&mut self) -> Option<Value> {
        let table = self.ev.macros?;
        let parenthesized = self.eat_punct("(");
        let name = match self.bump() {
            Some(t) if t.kind == TokenKind::Ident => t.text,
            _ => return None,
        };
        if parenthesized && !self.eat_punct(")") {
            return None;
        }
        Some(Value::Int(if table.is_defined(&name) { 1 } else { 0 }))
    }

    /// Recognize `( type-words ) operand` and apply an int/float coercion.
    /// Returns None when this is not a cast; the caller then falls back to
    /// a parenthesized subexpression.
    fn try_cast(&mut self) -> Option<Option<Value>> {
        let start = self.pos;
        let mut j = start + 1;
        let mut words: Vec<&Token> = Vec::new();
        loop {
            let tok = self.toks.get(j)?;
            if tok.is_punct(")") {
                break;
            }
            if tok.kind == TokenKind::Ident || tok.is_punct("*") {
                words.push(tok);
                j += 1;
            } else {
                return None;
            }
        }
        if words.is_empty() {
            return None;
        }
        // an operand must follow the closing paren
        let after = self.toks.get(j + 1)?;
        let operand_follows = matches!(
            after.kind,
            TokenKind::Int(_) | TokenKind::Float | TokenKind::Char | TokenKind::Str
        ) || after.kind == TokenKind::Ident
            || (after.kind == TokenKind::Punct
                && matches!(after.text.as_str(), "(" | "+" | "-" | "!" | "~"));
        if !operand_follows {
            return None;
        }
        let has_pointer = words.iter().any(|t| t.is_punct("*"));
        let first = &words[0].text;
        let known_type = CAST_TYPE_WORDS.contains(&first.as_str());
        if !known_type && !has_pointer {
            // a name that resolves to a value is a value, not a type
            if self.ev.resolve_ident(first).is_some() {
                return None;
            }
        }
        let to_float = words
            .iter()
            .any(|t| t.text == "float" || t.text == "double");
        self.pos = j + 1;
        let operand = match self.parse_unary() {
            Some(v) => v,
            None => return Some(None),
        };
        if has_pointer {
            // pointer casts keep the operand as-is
            return Some(Some(operand));
        }
        let coerced = if to_float {
            operand.as_f64().map(Value::Float)
        } else {
            match operand {
                Value::Float(x) => Some(Value::Int(x as i64)),
                other => to_i64(&other).map(Value::Int),
            }
        };
        Some(coerced)
    }

    fn apply_binary(&mut self, op: &str, lhs: Value, rhs: Value, line: u32) -> Option<Value> {
        let float_math = matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_));
        match op {
            "||" | "&&" => {
                let a = truthy(&lhs)?;
                let b = truthy(&rhs)?;
                let r = if op == "||" { a || b } else { a && b };
                Some(Value::Int(r as i64))
            }
            "==" | "!=" | "<" | "<=" | ">" | ">=" => {
                if float_math {
                    let a = lhs.as_f64()?;
                    let b = rhs.as_f64()?;
                    Some(Value::Int(compare(op, a.partial_cmp(&b)?) as i64))
                } else if let (Value::Str(a), Value::Str(b)) = (&lhs, &rhs) {
                    match op {
                        "==" => Some(Value::Int((a == b) as i64)),
                        "!=" => Some(Value::Int((a != b) as i64)),
                        _ => None,
                    }
                } else {
                    let a = to_i64(&lhs)?;
                    let b = to_i64(&rhs)?;
                    Some(Value::Int(compare(op, a.cmp(&b)) as i64))
                }
            }
            "+" | "-" | "*" => {
                if float_math {
                    let a = lhs.as_f64()?;
                    let b = rhs.as_f64()?;
                    let r = match op {
                        "+" => a + b,
                        "-" => a - b,
                        _ => a * b,
                    };
                    Some(Value::Float(r))
                } else {
                    let a = to_i64(&lhs)?;
                    let b = to_i64(&rhs)?;
                    let r = match op {
                        "+" => a.wrapping_add(b),
                        "-" => a.wrapping_sub(b),
                        _ => a.wrapping_mul(b),
                    };
                    Some(Value::Int(r))
                }
            }
            "/" => {
                if float_math {
                    let a = lhs.as_f64()?;
                    let b = rhs.as_f64()?;
                    if b == 0.0 {
                        self.division_by_zero(line);
                        return Some(Value::Int(0));
                    }
                    Some(Value::Float(a / b))
                } else {
                    let a = to_i64(&lhs)?;
                    let b = to_i64(&rhs)?;
                    if b == 0 {
                        self.division_by_zero(line);
                        return Some(Value::Int(0));
                    }
                    Some(Value::Int(a.wrapping_div(b)))
                }
            }
            "%" => {
                let a = to_i64(&lhs)?;
                let b = to_i64(&rhs)?;
                if b == 0 {
                    self.division_by_zero(line);
                    return Some(Value::Int(0));
                }
                Some(Value::Int(a.wrapping_rem(b)))
            }
            "<<" | ">>" => {
                let a = to_i64(&lhs)?;
                let b = to_i64(&rhs)?;
                let shift = (b & 63) as u32;
                let r = if op == "<<" {
                    a.wrapping_shl(shift)
                } else {
                    a.wrapping_shr(shift)
                };
                Some(Value::Int(r))
            }
            "&" | "|" | "^" => {
                let a = to_i64(&lhs)?;
                let b = to_i64(&rhs)?;
                let r = match op {
                    "&" => a & b,
                    "|" => a | b,
                    _ => a ^ b,
                };
                Some(Value::Int(r))
            }
            _ => None,
        }
    }

    fn division_by_zero(&mut self, line: u32) {
        self.ev.diagnostics.push(Diagnostic::warning(
            Some(Location::new(self.ev.file, line)),
            "division by zero in constant expression; result is 0",
        ));
    }
}

fn precedence_of(op: &str) -> Option<(String, u8)> {
    let prec = match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | "<=" | ">" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    };
    Some((op.to_string(), prec))
}

fn compare(op: &str, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        "==" => ord == Equal,
        "!=" => ord != Equal,
        "<" => ord == Less,
        "<=" => ord != Greater,
        ">" => ord == Greater,
        _ => ord != Less,
    }
}

fn truthy(v: &Value) -> Option<bool> {
    match v {
        Value::Int(n) => Some(*n != 0),
        Value::UInt(n) => Some(*n != 0),
        Value::Float(x) => Some(*x != 0.0),
        Value::Str(_) => Some(true),
        _ => None,
    }
}

fn to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Int(n) => Some(*n),
        Value::UInt(n) => Some(*n as i64),
        _ => None,
    }
}

/// Parse an integer literal's text (suffix included) into a value.
pub fn parse_int_literal(text: &str, flags: IntFlags) -> Option<Value> {
    let digits = text.trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
    let (digits, radix) = match flags.base {
        16 => (digits.trim_start_matches("0x").trim_start_matches("0X"), 16),
        8 => (digits.trim_start_matches('0'), 8),
        _ => (digits, 10),
    };
    if digits.is_empty() {
        // "0" in octal trims to nothing
        return if flags.base == 8 { Some(Value::Int(0)) } else { None };
    }
    let value = u64::from_str_radix(digits, radix).ok()?;
    if value > i64::MAX as u64 {
        Some(Value::UInt(value))
    } else {
        Some(Value::Int(value as i64))
    }
}

/// Parse a float literal's text (suffix included) into a value.
pub fn parse_float_literal(text: &str) -> Option<Value> {
    let digits = text.trim_end_matches(|c| matches!(c, 'f' | 'F' | 'l' | 'L'));
    digits.parse::<f64>().ok().map(Value::Float)
}

/// Resolve C escape sequences in a string or char literal body.
fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('x') => {
                let mut hex = String::new();
                while hex.len() < 2 {
                    match chars.peek() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            hex.push(*h);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    out.push(byte as char);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::macros::MacroTable;
    use hdrscan_core::ObjectMacro;

    fn table_with(defs: &[(&str, &str)]) -> MacroTable {
        let mut table = MacroTable::new();
        for (name, body) in defs {
            table.define(
                *name,
                Macro::Object(ObjectMacro {
                    body: tokenize("m.h", body).unwrap(),
                    location: None,
                }),
            );
        }
        table
    }

    fn eval(text: &str) -> Value {
        let table = MacroTable::new();
        let tokens = tokenize("t.h", text).unwrap();
        let mut ev = Evaluator::new(Some(&table), None, "t.h");
        ev.eval_value(&tokens)
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(eval("1 + 2 * 3"), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3"), Value::Int(9));
        assert_eq!(eval("10 % 3"), Value::Int(1));
    }

    #[test]
    fn test_shifts_and_bitops() {
        assert_eq!(eval("1 << 1"), Value::Int(2));
        assert_eq!(eval("(2U << 2)"), Value::Int(8));
        assert_eq!(eval("(0X000002UL << 3)"), Value::Int(16));
        assert_eq!(eval("0xF0 | 0x0F"), Value::Int(0xFF));
        assert_eq!(eval("~0"), Value::Int(-1));
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("0x000001U"), Value::Int(1));
        assert_eq!(eval("-2U"), Value::Int(-2));
        assert_eq!(eval("+ 3UL"), Value::Int(3));
        assert_eq!(eval("1.1e1"), Value::Float(11.0));
        assert_eq!(eval("-1.1E-1"), Value::Float(-0.11));
        assert_eq!(eval("'A'"), Value::Int(65));
        assert_eq!(eval("'\\n'"), Value::Int(10));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(eval("\"foo\" \"bar\""), Value::Str("foobar".into()));
        assert_eq!(eval("\"test\""), Value::Str("test".into()));
    }

    #[test]
    fn test_ternary_and_logical() {
        assert_eq!(eval("1 ? 10 : 20"), Value::Int(10));
        assert_eq!(eval("0 ? 10 : 20"), Value::Int(20));
        assert_eq!(eval("1 && 0"), Value::Int(0));
        assert_eq!(eval("1 || 0"), Value::Int(1));
        assert_eq!(eval("!3"), Value::Int(0));
    }

    #[test]
    fn test_division_by_zero_is_zero_with_diagnostic() {
        let table = MacroTable::new();
        let tokens = tokenize("t.h", "5 / 0").unwrap();
        let mut ev = Evaluator::new(Some(&table), None, "t.h");
        assert_eq!(ev.eval_value(&tokens), Value::Int(0));
        assert_eq!(ev.diagnostics.len(), 1);
        assert!(ev.diagnostics[0].message.contains("division by zero"));
    }

    #[test]
    fn test_cast_coercion() {
        assert_eq!(eval("(int)1.9"), Value::Int(1));
        assert_eq!(eval("(double)3"), Value::Float(3.0));
        assert_eq!(eval("(unsigned long)7"), Value::Int(7));
    }

    #[test]
    fn test_macro_resolution() {
        let table = table_with(&[("V", "128"), ("W", "V | 1")]);
        let tokens = tokenize("t.h", "(W)").unwrap();
        let mut ev = Evaluator::new(Some(&table), None, "t.h");
        assert_eq!(ev.eval_value(&tokens), Value::Int(129));
    }

    #[test]
    fn test_paren_macro_is_not_a_cast() {
        let table = table_with(&[("M", "3")]);
        let tokens = tokenize("t.h", "(M) + 2").unwrap();
        let mut ev = Evaluator::new(Some(&table), None, "t.h");
        assert_eq!(ev.eval_value(&tokens), Value::Int(5));
    }

    #[test]
    fn test_symbolic_fallback_keeps_tokens() {
        let tokens = tokenize("t.h", "UNKNOWN + 1").unwrap();
        let table = MacroTable::new();
        let mut ev = Evaluator::new(Some(&table), None, "t.h");
        match ev.eval_value(&tokens) {
            Value::Symbolic(kept) => {
                assert_eq!(hdrscan_core::token::render(&kept), "UNKNOWN + 1");
            }
            other => panic!("expected symbolic, got {:?}", other),
        }
    }

    #[test]
    fn test_condition_mode() {
        let table = table_with(&[("M", "")]);
        let mut ev = Evaluator::for_condition(&table, "t.h");
        let t = |s: &str| tokenize("t.h", s).unwrap();
        assert!(ev.eval_condition(&t("defined M")));
        assert!(ev.eval_condition(&t("defined(M)")));
        assert!(!ev.eval_condition(&t("defined N")));
        // unknown identifiers are 0 in conditions
        assert!(!ev.eval_condition(&t("SOME_UNKNOWN")));
        assert!(ev.eval_condition(&t("SOME_UNKNOWN + 1")));
    }

    #[test]
    fn test_macro_cycle_is_symbolic() {
        let table = table_with(&[("A", "B"), ("B", "A")]);
        let tokens = tokenize("t.h", "A").unwrap();
        let mut ev = Evaluator::new(Some(&table), None, "t.h");
        assert!(ev.eval_value(&tokens).is_symbolic());
    }
}
