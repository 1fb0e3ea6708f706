//! Macro table and token-level substitution
//!
//! The table owns every live `#define`. Substitution is lazy: replacement
//! lists are stored unexpanded and expanded at each use, with a per-frame
//! hide set so self-referential macros terminate, and a per-pass budget so
//! runaway expansions stop with a diagnostic instead of hanging.

use hdrscan_core::{Diagnostic, FunctionMacro, Location, ObjectMacro, Token, TokenKind};
use std::collections::{HashMap, HashSet};

/// A macro definition of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Macro {
    Object(ObjectMacro),
    Function(FunctionMacro),
}

/// The set of currently defined macros, in definition order
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    map: HashMap<String, Macro>,
    order: Vec<String>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a macro. Redefinition silently replaces the old body but
    /// keeps the original position in definition order.
    pub fn define(&mut self, name: impl Into<String>, macro_def: Macro) {
        let name = name.into();
        if !self.map.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.map.insert(name, macro_def);
    }

    /// Remove a macro; removing an unknown name is a no-op.
    pub fn undef(&mut self, name: &str) -> bool {
        if self.map.remove(name).is_some() {
            self.order.retain(|n| n != name);
            true
        } else {
            false
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Macro> {
        self.map.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Capture the current table state.
    pub fn snapshot(&self) -> MacroTable {
        self.clone()
    }

    /// Replace the table state with a snapshot.
    pub fn restore(&mut self, snapshot: MacroTable) {
        *self = snapshot;
    }

    /// Iterate macros in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Macro)> {
        self.order
            .iter()
            .filter_map(move |n| self.map.get(n).map(|m| (n.as_str(), m)))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Expands macros in token sequences against a table.
pub struct Expander<'a> {
    table: &'a MacroTable,
    file: &'a str,
    max_expansion: u32,
    budget: u32,
    exhausted: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> Expander<'a> {
    pub fn new(table: &'a MacroTable, file: &'a str, max_expansion: u32) -> Self {
        Self {
            table,
            file,
            max_expansion,
            budget: max_expansion,
            exhausted: false,
            diagnostics: Vec::new(),
        }
    }

    /// Expand every macro in `tokens`. Invocations that cannot be expanded
    /// (wrong arity, missing parentheses, budget exhausted) are left in
    /// place, flagged where that is worth a diagnostic.
    pub fn expand(&mut self, tokens: &[Token]) -> Vec<Token> {
        self.budget = self.max_expansion;
        self.exhausted = false;
        self.expand_inner(tokens, &HashSet::new())
    }

    fn expand_inner(&mut self, tokens: &[Token], hide: &HashSet<String>) -> Vec<Token> {
        let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
        let mut i = 0;

        while i < tokens.len() {
            let tok = &tokens[i];
            if tok.kind != TokenKind::Ident || hide.contains(&tok.text) {
                out.push(tok.clone());
                i += 1;
                continue;
            }

            match self.table.lookup(&tok.text) {
                Some(Macro::Object(m)) => {
                    if !self.take_budget(tok) {
                        out.push(tok.clone());
                        i += 1;
                        continue;
                    }
                    let mut inner_hide = hide.clone();
                    inner_hide.insert(tok.text.clone());
                    let mut expanded = self.expand_inner(&m.body, &inner_hide);
                    adopt_spacing(&mut expanded, tok);
                    out.extend(expanded);
                    i += 1;
                }
                Some(Macro::Function(m)) => {
                    if !tokens.get(i + 1).map_or(false, |t| t.is_punct("(")) {
                        // bare use of a function-like macro name
                        out.push(tok.clone());
                        i += 1;
                        continue;
                    }
                    let (mut args, next) = match collect_args(tokens, i + 2) {
                        Some(found) => found,
                        None => {
                            // unbalanced call, leave it alone
                            out.push(tok.clone());
                            i += 1;
                            continue;
                        }
                    };
                    if m.params.is_empty() && args.len() == 1 && args[0].is_empty() {
                        args.clear();
                    }
                    let arity_ok = if m.variadic {
                        args.len() >= m.params.len()
                    } else {
                        args.len() == m.params.len()
                    };
                    if !arity_ok {
                        self.diagnostics.push(Diagnostic::warning(
                            Some(Location::new(self.file, tok.line)),
                            format!(
                                "macro '{}' expects {} argument(s), got {}; expansion skipped",
                                tok.text,
                                m.params.len(),
                                args.len()
                            ),
                        ));
                        out.push(tok.clone());
                        i += 1;
                        continue;
                    }
                    if !self.take_budget(tok) {
                        out.push(tok.clone());
                        i += 1;
                        continue;
                    }
                    let expanded_args: Vec<Vec<Token>> = args
                        .iter()
                        .map(|arg| self.expand_inner(arg, hide))
                        .collect();
                    let substituted = substitute(m, &expanded_args);
                    let mut inner_hide = hide.clone();
                    inner_hide.insert(tok.text.clone());
                    let mut expanded = self.expand_inner(&substituted, &inner_hide);
                    adopt_spacing(&mut expanded, tok);
                    out.extend(expanded);
                    i = next;
                }
                None => {
                    out.push(tok.clone());
                    i += 1;
                }
            }
        }

        out
    }

    fn take_budget(&mut self, tok: &Token) -> bool {
        if self.exhausted {
            return false;
        }
        if self.budget == 0 {
            self.exhausted = true;
            self.diagnostics.push(Diagnostic::warning(
                Some(Location::new(self.file, tok.line)),
                format!(
                    "macro expansion limit ({}) reached near '{}'; partial expansion kept",
                    self.max_expansion, tok.text
                ),
            ));
            return false;
        }
        self.budget -= 1;
        true
    }
}

/// Split the argument tokens of an invocation whose opening paren is at
/// `start - 1`. Returns the arguments and the index just past `)`.
fn collect_args(tokens: &[Token], start: usize) -> Option<(Vec<Vec<Token>>, usize)> {
    let mut args: Vec<Vec<Token>> = vec![Vec::new()];
    let mut depth = 1u32;
    let mut j = start;
    while j < tokens.len() {
        let tok = &tokens[j];
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth -= 1;
            if depth == 0 {
                return Some((args, j + 1));
            }
        } else if tok.is_punct(",") && depth == 1 {
            args.push(Vec::new());
            j += 1;
            continue;
        } else if tok.kind == TokenKind::Newline {
            j += 1;
            continue;
        }
        if let Some(last) = args.last_mut() {
            last.push(tok.clone());
        }
        j += 1;
    }
    None
}

/// Replace parameter markers in a function-like macro body with the
/// (already expanded) arguments.
fn substitute(m: &FunctionMacro, args: &[Vec<Token>]) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(m.body.len());
    for tok in &m.body {
        if tok.kind == TokenKind::Ident {
            if let Some(idx) = m.params.iter().position(|p| p == &tok.text) {
                let mut arg = args[idx].clone();
                adopt_spacing(&mut arg, tok);
                out.extend(arg);
                continue;
            }
            if m.variadic && tok.text == "__VA_ARGS__" {
                let mut rest: Vec<Token> = Vec::new();
                for (k, arg) in args[m.params.len()..].iter().enumerate() {
                    if k > 0 {
                        rest.push(Token::new(TokenKind::Punct, ",", tok.line));
                    }
                    rest.extend(arg.iter().cloned());
                }
                adopt_spacing(&mut rest, tok);
                out.extend(rest);
                continue;
            }
        }
        out.push(tok.clone());
    }
    out
}

fn adopt_spacing(expanded: &mut [Token], source: &Token) {
    if let Some(first) = expanded.first_mut() {
        first.space_before = source.space_before;
    }
}
