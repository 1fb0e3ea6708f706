//! Preprocessor directive walker
//!
//! Consumes the lexed token stream line by line, maintains the macro
//! table, the conditional-inclusion stack, and the `#pragma pack` stack,
//! and emits the macro-expanded tokens of the regions selected for
//! inclusion. Directives never survive into the output.
//!
//! `#include` is deliberately not handled: callers supply every header.

use crate::eval::Evaluator;
use crate::macros::{Expander, Macro, MacroTable};
use hdrscan_core::{
    Diagnostic, FunctionMacro, Location, ObjectMacro, ParserConfig, Token, TokenKind,
};
use tracing::debug;

/// One frame of the `#pragma pack` stack
#[derive(Debug, Clone, PartialEq)]
pub struct PackFrame {
    pub label: Option<String>,
    pub value: Option<u32>,
}

/// Conditional-inclusion frame: one per open `#if`/`#ifdef`
#[derive(Debug, Clone)]
struct CondFrame {
    /// This branch is selected and every enclosing frame includes
    including: bool,
    /// Some branch of this chain has been taken
    branch_taken: bool,
    seen_else: bool,
}

/// Pack-change events: (line, active pack value)
pub type PackEvents = Vec<(u32, Option<u32>)>;

/// The preprocessor. One instance spans all input files of a parse so
/// macros accumulate; conditional and pack state resets per file.
pub struct Preprocessor<'a> {
    config: &'a ParserConfig,
    pub table: MacroTable,
    cond_stack: Vec<CondFrame>,
    pack_base: Option<u32>,
    pack_stack: Vec<PackFrame>,
    file: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(config: &'a ParserConfig) -> Self {
        Self {
            config,
            table: MacroTable::new(),
            cond_stack: Vec::new(),
            pack_base: None,
            pack_stack: Vec::new(),
            file: String::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Walk one file's tokens. Returns the included, macro-expanded tokens
    /// (newlines and directives removed) and the pack-change events needed
    /// to attribute pack values to struct declarations by line.
    pub fn process_file(&mut self, file: &str, tokens: &[Token]) -> (Vec<Token>, PackEvents) {
        self.file = file.to_string();
        self.cond_stack.clear();
        self.pack_base = None;
        self.pack_stack.clear();

        let mut out: Vec<Token> = Vec::new();
        let mut events: PackEvents = Vec::new();

        let mut i = 0;
        while i < tokens.len() {
            let mut j = i;
            while j < tokens.len() && tokens[j].kind != TokenKind::Newline {
                j += 1;
            }
            let line_toks = &tokens[i..j];
            i = j + 1;
            if line_toks.is_empty() {
                continue;
            }
            if line_toks[0].kind == TokenKind::Hash {
                self.handle_directive(&line_toks[1..], line_toks[0].line, &mut events);
            } else if self.including() {
                let mut expander =
                    Expander::new(&self.table, &self.file, self.config.max_expansion);
                let expanded = expander.expand(line_toks);
                self.diagnostics.append(&mut expander.diagnostics);
                out.extend(expanded);
            }
        }

        if !self.cond_stack.is_empty() {
            self.diagnostics.push(Diagnostic::warning(
                Some(Location::new(&self.file, tokens.last().map(|t| t.line).unwrap_or(0))),
                format!(
                    "{} conditional block(s) still open at end of file",
                    self.cond_stack.len()
                ),
            ));
        }

        (out, events)
    }

    /// The `#pragma pack` value in effect right now.
    pub fn pack_current(&self) -> Option<u32> {
        match self.pack_stack.last() {
            Some(frame) => frame.value,
            None => self.pack_base,
        }
    }

    /// The open pack frames, bottom first.
    pub fn pack_stack(&self) -> &[PackFrame] {
        &self.pack_stack
    }

    fn including(&self) -> bool {
        self.cond_stack.last().map_or(true, |f| f.including)
    }

    /// Are all frames *enclosing* the top frame including?
    fn parent_including(&self) -> bool {
        if self.cond_stack.len() >= 2 {
            self.cond_stack[self.cond_stack.len() - 2].including
        } else {
            true
        }
    }

    fn warn(&mut self, line: u32, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(Some(Location::new(&self.file, line)), message));
    }

    fn handle_directive(&mut self, rest: &[Token], hash_line: u32, events: &mut PackEvents) {
        let name_tok = match rest.first() {
            Some(t) => t,
            None => return, // null directive
        };
        if name_tok.kind != TokenKind::Ident {
            self.warn(hash_line, "malformed preprocessor directive");
            return;
        }
        let directive = name_tok.text.clone();
        let line = name_tok.line;
        let rest = &rest[1..];

        match directive.as_str() {
            "define" => {
                if self.including() {
                    self.handle_define(rest, line);
                }
            }
            "undef" => {
                if !self.including() {
                    return;
                }
                match rest.first() {
                    Some(t) if t.kind == TokenKind::Ident => {
                        self.table.undef(&t.text);
                    }
                    _ => self.warn(line, "malformed #undef"),
                }
            }
            "ifdef" | "ifndef" => {
                let defined = match rest.first() {
                    Some(t) if t.kind == TokenKind::Ident => self.table.is_defined(&t.text),
                    _ => {
                        self.warn(line, format!("malformed #{}", directive));
                        directive == "ifndef" // resulting condition is false
                    }
                };
                let cond = if directive == "ifdef" { defined } else { !defined };
                let selected = self.including() && cond;
                self.cond_stack.push(CondFrame {
                    including: selected,
                    branch_taken: selected,
                    seen_else: false,
                });
            }
            "if" => {
                let selected = if self.including() {
                    self.eval_directive_condition(rest)
                } else {
                    false
                };
                self.cond_stack.push(CondFrame {
                    including: selected,
                    branch_taken: selected,
                    seen_else: false,
                });
            }
            "elif" => {
                if self.cond_stack.is_empty() {
                    self.warn(line, "#elif without matching #if");
                    return;
                }
                let (branch_taken, seen_else) = {
                    let frame = &self.cond_stack[self.cond_stack.len() - 1];
                    (frame.branch_taken, frame.seen_else)
                };
                if seen_else {
                    self.warn(line, "#elif after #else");
                }
                let selected = if !branch_taken && !seen_else && self.parent_including() {
                    self.eval_directive_condition(rest)
                } else {
                    false
                };
                let top = self.cond_stack.len() - 1;
                let frame = &mut self.cond_stack[top];
                frame.including = selected;
                frame.branch_taken |= selected;
            }
            "else" => {
                if self.cond_stack.is_empty() {
                    self.warn(line, "#else without matching #if");
                    return;
                }
                let parent = self.parent_including();
                let top = self.cond_stack.len() - 1;
                let duplicate = self.cond_stack[top].seen_else;
                if duplicate {
                    self.warn(line, "duplicate #else");
                }
                let frame = &mut self.cond_stack[top];
                frame.including = parent && !frame.branch_taken && !duplicate;
                frame.branch_taken = true;
                frame.seen_else = true;
            }
            "endif" => {
                if self.cond_stack.pop().is_none() {
                    self.warn(line, "#endif without matching #if");
                }
            }
            "pragma" => {
                if self.including() {
                    self.handle_pragma(rest, line, events);
                }
            }
            other => {
                if self.including() {
                    self.warn(line, format!("ignoring unsupported directive #{}", other));
                }
            }
        }
    }

    fn eval_directive_condition(&mut self, rest: &[Token]) -> bool {
        // `defined X` must be answered before macro expansion gets at X
        let rewritten = self.rewrite_defined(rest);
        let mut expander = Expander::new(&self.table, &self.file, self.config.max_expansion);
        let expanded = expander.expand(&rewritten);
        self.diagnostics.append(&mut expander.diagnostics);

        let mut evaluator = Evaluator::for_condition(&self.table, &self.file);
        let result = evaluator.eval_condition(&expanded);
        self.diagnostics.append(&mut evaluator.diagnostics);
        result
    }

    fn rewrite_defined(&self, tokens: &[Token]) -> Vec<Token> {
        let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            if tok.is_ident("defined") {
                // defined NAME  |  defined ( NAME )
                let (name, consumed) = if tokens.get(i + 1).map_or(false, |t| t.is_any_ident()) {
                    (Some(tokens[i + 1].text.clone()), 2)
                } else if tokens.get(i + 1).map_or(false, |t| t.is_punct("("))
                    && tokens.get(i + 2).map_or(false, |t| t.is_any_ident())
                    && tokens.get(i + 3).map_or(false, |t| t.is_punct(")"))
                {
                    (Some(tokens[i + 2].text.clone()), 4)
                } else {
                    (None, 1)
                };
                if let Some(name) = name {
                    let digit = if self.table.is_defined(&name) { "1" } else { "0" };
                    let mut replacement =
                        Token::new(TokenKind::Int(Default::default()), digit, tok.line);
                    replacement.space_before = tok.space_before;
                    out.push(replacement);
                    i += consumed;
                    continue;
                }
            }
            out.push(tok.clone());
            i += 1;
        }
        out
    }

    fn handle_define(&mut self, rest: &[Token], line: u32) {
        let name_tok = match rest.first() {
            Some(t) if t.kind == TokenKind::Ident => t.clone(),
            _ => {
                self.warn(line, "malformed #define");
                return;
            }
        };
        let name = name_tok.text.clone();
        let location = Some(Location::new(&self.file, line));

        // a paren glued to the name makes it function-like
        let function_like = rest
            .get(1)
            .map_or(false, |t| t.is_punct("(") && !t.space_before);

        if function_like {
            let mut params: Vec<String> = Vec::new();
            let mut variadic = false;
            let mut i = 2;
            loop {
                match rest.get(i) {
                    Some(t) if t.is_punct(")") => {
                        i += 1;
                        break;
                    }
                    Some(t) if t.kind == TokenKind::Ident => {
                        params.push(t.text.clone());
                        i += 1;
                        if rest.get(i).map_or(false, |t| t.is_punct(",")) {
                            i += 1;
                        }
                    }
                    Some(t) if t.is_punct("...") => {
                        variadic = true;
                        i += 1;
                    }
                    _ => {
                        self.warn(line, format!("malformed parameter list in #define {}", name));
                        return;
                    }
                }
            }
            let body = rest[i..].to_vec();
            debug!(macro_name = %name, params = params.len(), "registering function-like macro");
            self.table.define(
                name,
                Macro::Function(FunctionMacro {
                    params,
                    body,
                    variadic,
                    location,
                }),
            );
            return;
        }

        let body = rest[1..].to_vec();
        // `#define ALIAS FNMACRO` redefines ALIAS as that function-like macro
        if body.len() == 1 && body[0].kind == TokenKind::Ident {
            if let Some(Macro::Function(f)) = self.table.lookup(&body[0].text) {
                let mut alias = f.clone();
                alias.location = location;
                debug!(macro_name = %name, target = %body[0].text, "aliasing function-like macro");
                self.table.define(name, Macro::Function(alias));
                return;
            }
        }
        debug!(macro_name = %name, "registering object-like macro");
        self.table
            .define(name, Macro::Object(ObjectMacro { body, location }));
    }

    fn handle_pragma(&mut self, rest: &[Token], line: u32, events: &mut PackEvents) {
        match rest.first() {
            Some(t) if t.is_ident("pack") => {}
            Some(t) => {
                // other pragmas (omp, once, ...) pass silently
                debug!(pragma = %t.text, "ignoring pragma");
                return;
            }
            None => return,
        }

        // macro names are legal inside pack arguments
        let mut expander = Expander::new(&self.table, &self.file, self.config.max_expansion);
        let expanded = expander.expand(&rest[1..]);
        self.diagnostics.append(&mut expander.diagnostics);

        if !expanded.first().map_or(false, |t| t.is_punct("("))
            || !expanded.last().map_or(false, |t| t.is_punct(")"))
        {
            self.warn(line, "malformed #pragma pack");
            return;
        }
        let inner = &expanded[1..expanded.len() - 1];

        let mut pushpop: Option<String> = None;
        let mut label: Option<String> = None;
        let mut value: Option<u32> = None;
        for tok in inner {
            match tok.kind {
                TokenKind::Punct if tok.text == "," => {}
                TokenKind::Int(flags) => {
                    match crate::eval::parse_int_literal(&tok.text, flags)
                        .and_then(|v| v.as_i64())
                    {
                        Some(n) if n > 0 => {
                            let n = n as u32;
                            if !matches!(n, 1 | 2 | 4 | 8 | 16) {
                                self.warn(line, format!("unusual pack value {}", n));
                            }
                            value = Some(n);
                        }
                        _ => self.warn(line, "bad pack value"),
                    }
                }
                TokenKind::Ident if tok.text == "push" || tok.text == "pop" => {
                    pushpop = Some(tok.text.clone());
                }
                TokenKind::Ident => label = Some(tok.text.clone()),
                _ => {
                    self.warn(line, "malformed #pragma pack argument");
                    return;
                }
            }
        }

        match pushpop.as_deref() {
            None => self.pack_set(value),
            Some("push") => {
                let v = value.or(self.pack_current());
                self.pack_stack.push(PackFrame { label, value: v });
            }
            Some(_) => {
                // pop
                if let Some(wanted) = label {
                    match self
                        .pack_stack
                        .iter()
                        .rposition(|f| f.label.as_deref() == Some(wanted.as_str()))
                    {
                        Some(idx) => self.pack_stack.truncate(idx),
                        None => self.warn(
                            line,
                            format!("#pragma pack(pop, {}) has no matching push", wanted),
                        ),
                    }
                } else if self.pack_stack.pop().is_none() {
                    self.warn(line, "#pragma pack(pop) with empty pack stack");
                }
                if value.is_some() {
                    self.pack_set(value);
                }
            }
        }

        debug!(line, packing = ?self.pack_current(), "pack changed");
        events.push((line, self.pack_current()));
    }

    fn pack_set(&mut self, value: Option<u32>) {
        match self.pack_stack.last_mut() {
            Some(frame) => frame.value = value,
            None => self.pack_base = value,
        }
    }
}

/// Look up the pack value in effect at `line` given a file's pack events.
pub fn packing_at(events: &[(u32, Option<u32>)], line: u32) -> Option<u32> {
    let mut packing = None;
    for (event_line, value) in events {
        if *event_line <= line {
            packing = *value;
        } else {
            break;
        }
    }
    packing
}
