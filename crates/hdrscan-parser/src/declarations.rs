//! C declaration parser
//!
//! A tolerant recursive-descent grammar over the preprocessed token
//! stream. It extracts typedefs, struct/union/enum definitions, function
//! prototypes, and variable declarations into the definition store, and
//! skips anything it cannot make sense of after leaving a diagnostic.
//!
//! Unknown type names are recorded verbatim; inline function bodies are
//! skipped at brace depth rather than parsed.

use crate::eval::{Evaluator, SymbolEnv};
use crate::macros::MacroTable;
use crate::preprocess::{packing_at, PackEvents};
use crate::store::DefinitionStore;
use hdrscan_core::{
    ArraySize, Diagnostic, Field, FunctionDef, FunctionSig, Location, Param, ParserConfig,
    RecordDef, RecordKind, Token, TokenKind, Type, TypeBase, TypeModifier, Value, VariableDef,
};
use std::collections::HashMap;
use tracing::debug;

const STORAGE_CLASSES: &[&str] = &["static", "extern", "inline", "auto", "register"];
const SIGN_SIZE_WORDS: &[&str] = &["signed", "unsigned", "short", "long"];

type PResult<T> = Result<T, String>;

/// Collected declaration specifiers
struct Specs {
    storage: Vec<String>,
    quals: Vec<String>,
    base: Option<TypeBase>,
    is_typedef: bool,
    line: u32,
}

/// Declarator parts not yet attached to a base type
#[derive(Default)]
struct RawDecl {
    name: Option<String>,
    modifiers: Vec<TypeModifier>,
    quals: Vec<String>,
}

/// Symbol scope used while evaluating enum member expressions: members of
/// the enum being parsed shadow everything already in the store.
struct EnumScope<'x> {
    local: &'x HashMap<String, i64>,
    store: &'x DefinitionStore,
}

impl<'x> SymbolEnv for EnumScope<'x> {
    fn resolve_symbol(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.local.get(name) {
            return Some(Value::Int(*v));
        }
        self.store.resolve_symbol(name)
    }
}

/// Parses one file's preprocessed tokens into the store.
pub struct DeclParser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    config: &'a ParserConfig,
    store: &'a mut DefinitionStore,
    macros: &'a MacroTable,
    pack_events: &'a PackEvents,
    file: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> DeclParser<'a> {
    pub fn new(
        tokens: Vec<Token>,
        config: &'a ParserConfig,
        store: &'a mut DefinitionStore,
        macros: &'a MacroTable,
        pack_events: &'a PackEvents,
        file: &str,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            config,
            store,
            macros,
            pack_events,
            file: file.to_string(),
            diagnostics: Vec::new(),
        }
    }

    /// Consume the whole stream, populating the store.
    pub fn parse(&mut self) {
        while !self.at_end() {
            if self.eat_punct(";") {
                continue;
            }
            let start = self.pos;
            if let Err(message) = self.parse_external_declaration() {
                let line = self.current_line();
                self.diagnostics.push(Diagnostic::error(
                    Some(Location::new(&self.file, line)),
                    format!("declaration dropped: {}", message),
                ));
                self.recover();
            }
            if self.pos == start {
                // never loop without progress
                self.pos += 1;
            }
        }
    }

    // --- token plumbing

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
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

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(format!(
                "expected '{}', found '{}'",
                p,
                self.peek().map_or("<eof>", |t| t.text.as_str())
            ))
        }
    }

    fn current_line(&self) -> u32 {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(0)
    }

    fn location(&self, line: u32) -> Option<Location> {
        Some(Location::new(&self.file, line))
    }

    fn warn(&mut self, line: u32, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning(self.location(line), message));
    }

    /// Skip to the next `;` at brace depth zero (or past the matching `}`).
    fn recover(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if tok.is_punct("{") {
                depth += 1;
            } else if tok.is_punct("}") {
                self.pos += 1;
                if depth == 0 {
                    return;
                }
                depth -= 1;
                continue;
            } else if tok.is_punct(";") && depth == 0 {
                self.pos += 1;
                return;
            }
            self.pos += 1;
        }
    }

    // --- evaluation helpers

    fn eval_tokens(&mut self, tokens: &[Token]) -> Value {
        let store: &DefinitionStore = &*self.store;
        let mut evaluator = Evaluator::new(Some(self.macros), Some(store), &self.file);
        let value = evaluator.eval_value(tokens);
        let mut diags = evaluator.diagnostics;
        self.diagnostics.append(&mut diags);
        value
    }

    /// Collect expression tokens up to an unnested stopper punctuator.
    fn collect_expr_tokens(&mut self, stoppers: &[&str]) -> Vec<Token> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if depth == 0 && tok.kind == TokenKind::Punct && stoppers.contains(&tok.text.as_str())
            {
                break;
            }
            match tok.text.as_str() {
                "(" | "[" | "{" if tok.kind == TokenKind::Punct => depth += 1,
                ")" | "]" | "}" if tok.kind == TokenKind::Punct => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            out.push(tok.clone());
            self.pos += 1;
        }
        out
    }

    // --- grammar

    fn parse_external_declaration(&mut self) -> PResult<()> {
        let specs = self.parse_specifiers()?;

        // `struct S { ... };`, forward declarations, stray specifiers
        if self.eat_punct(";") {
            return Ok(());
        }

        let base = specs
            .base
            .clone()
            .ok_or_else(|| "missing type specifier".to_string())?;
        let base_ty = Type {
            base,
            modifiers: vec![],
            quals: specs.quals.clone(),
        };

        loop {
            let (name, ty) = self.parse_declarator(base_ty.clone(), true)?;

            // inline function definition: skip the body at brace depth
            if ty.is_function() && self.peek().map_or(false, |t| t.is_punct("{")) {
                self.skip_braces()?;
                if name.is_none() {
                    self.warn(specs.line, "unnamed function definition skipped");
                    return Ok(());
                }
                self.finish_declarator(&specs, name, ty, None)?;
                return Ok(());
            }

            let value = if self.eat_punct("=") {
                Some(self.parse_initializer()?)
            } else {
                None
            };
            self.finish_declarator(&specs, name, ty, value)?;

            if self.eat_punct(",") {
                continue;
            }
            self.expect_punct(";")?;
            return Ok(());
        }
    }

    fn parse_specifiers(&mut self) -> PResult<Specs> {
        let line = self.current_line();
        let mut specs = Specs {
            storage: vec![],
            quals: vec![],
            base: None,
            is_typedef: false,
            line,
        };
        let start = self.pos;

        loop {
            let tok = match self.peek() {
                Some(t) if t.kind == TokenKind::Ident => t.clone(),
                _ => break,
            };
            let word = tok.text.as_str();

            if word == "typedef" {
                specs.is_typedef = true;
                self.pos += 1;
            } else if STORAGE_CLASSES.contains(&word) {
                specs.storage.push(tok.text.clone());
                self.pos += 1;
            } else if self.config.is_qualifier(word) {
                specs.quals.push(tok.text.clone());
                self.pos += 1;
            } else if self.config.is_modifier(word) || word.starts_with("__") {
                self.pos += 1;
                specs.quals.push(self.merge_attribute(&tok.text));
            } else if word == "struct" || word == "union" {
                if specs.base.is_some() {
                    break;
                }
                let kind = if word == "struct" {
                    RecordKind::Struct
                } else {
                    RecordKind::Union
                };
                let kw_line = tok.line;
                self.pos += 1;
                specs.base = Some(self.parse_record(kind, kw_line)?);
            } else if word == "enum" {
                if specs.base.is_some() {
                    break;
                }
                self.pos += 1;
                specs.base = Some(self.parse_enum(tok.line)?);
            } else if SIGN_SIZE_WORDS.contains(&word) || self.config.is_primitive(word) {
                if specs.base.is_some() {
                    break;
                }
                specs.base = Some(self.parse_primitive_words());
            } else {
                // a user type name, or the declarator's own name
                if specs.base.is_some() {
                    break;
                }
                specs.base = Some(TypeBase::Named(tok.text.clone()));
                self.pos += 1;
            }
        }

        if self.pos == start && specs.base.is_none() {
            return Err(format!(
                "expected declaration, found '{}'",
                self.peek().map_or("<eof>", |t| t.text.as_str())
            ));
        }
        Ok(specs)
    }

    /// Consume a run of sign/size/primitive words: `unsigned long long int`
    fn parse_primitive_words(&mut self) -> TypeBase {
        let mut words: Vec<String> = Vec::new();
        while let Some(tok) = self.peek() {
            if tok.kind != TokenKind::Ident {
                break;
            }
            let word = tok.text.as_str();
            if SIGN_SIZE_WORDS.contains(&word) || self.config.is_primitive(word) {
                words.push(tok.text.clone());
                self.pos += 1;
            } else {
                break;
            }
        }
        TypeBase::Primitive(words.join(" "))
    }

    /// Fold `__declspec(dllexport)`-style attributes into one qualifier
    /// string; the attribute word itself was already consumed.
    fn merge_attribute(&mut self, word: &str) -> String {
        if !self.peek().map_or(false, |t| t.is_punct("(")) {
            return word.to_string();
        }
        let mut depth = 0usize;
        let mut inner: Vec<Token> = Vec::new();
        while let Some(tok) = self.peek() {
            if tok.is_punct("(") {
                depth += 1;
            } else if tok.is_punct(")") {
                depth -= 1;
                if depth == 0 {
                    self.pos += 1;
                    break;
                }
            }
            if depth > 0 && !(depth == 1 && tok.is_punct("(")) {
                inner.push(tok.clone());
            }
            self.pos += 1;
        }
        format!("{}({})", word, hdrscan_core::token::render(&inner))
    }

    // --- declarators

    fn parse_declarator(&mut self, base: Type, allow_name: bool) -> PResult<(Option<String>, Type)> {
        let raw = self.parse_declarator_inner(allow_name)?;
        let mut ty = base;
        ty.modifiers.extend(raw.modifiers);
        ty.quals.extend(raw.quals);
        Ok((raw.name, ty))
    }

    fn parse_declarator_inner(&mut self, allow_name: bool) -> PResult<RawDecl> {
        let mut raw = RawDecl::default();

        // pointer stars with interleaved qualifiers
        loop {
            match self.peek() {
                Some(t) if t.is_punct("*") => {
                    raw.modifiers.push(TypeModifier::Pointer);
                    self.pos += 1;
                }
                Some(t)
                    if t.kind == TokenKind::Ident
                        && (self.config.is_qualifier(&t.text)
                            || self.config.is_modifier(&t.text)) =>
                {
                    raw.quals.push(t.text.clone());
                    self.pos += 1;
                }
                _ => break,
            }
        }

        // name or parenthesized sub-declarator
        let mut center: Option<RawDecl> = None;
        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident && allow_name => {
                raw.name = Some(t.text.clone());
                self.pos += 1;
            }
            Some(t) if t.is_punct("(") && self.paren_starts_sub_declarator() => {
                self.pos += 1;
                center = Some(self.parse_declarator_inner(allow_name)?);
                self.expect_punct(")")?;
            }
            _ => {}
        }

        // suffixes: one function parameter list, then array dimensions
        let mut function: Option<FunctionSig> = None;
        let mut arrays: Vec<ArraySize> = Vec::new();
        loop {
            if function.is_none() && arrays.is_empty() && self.eat_punct("(") {
                function = Some(self.parse_params()?);
            } else if self.eat_punct("[") {
                arrays.push(self.parse_array_size()?);
            } else {
                break;
            }
        }

        if let Some(sig) = function {
            raw.modifiers.push(TypeModifier::Function(sig));
        }
        for size in arrays.into_iter().rev() {
            raw.modifiers.push(TypeModifier::Array(size));
        }

        if let Some(inner) = center {
            raw.modifiers.extend(inner.modifiers);
            raw.quals.extend(inner.quals);
            if inner.name.is_some() {
                raw.name = inner.name;
            }
        }

        Ok(raw)
    }

    /// Decide whether a `(` after the specifiers opens a nested declarator
    /// (`int (*p)[2]`) or a parameter list (`int (int, int)`), consulting
    /// the live typedef set for the ambiguous identifier case.
    fn paren_starts_sub_declarator(&self) -> bool {
        // calling conventions and qualifiers may precede the pointer:
        // `int (__cdecl *fp)(void)`
        let mut k = 1;
        while let Some(t) = self.peek_at(k) {
            if t.kind == TokenKind::Ident
                && (self.config.is_qualifier(&t.text) || self.config.is_modifier(&t.text))
            {
                k += 1;
                continue;
            }
            break;
        }
        match self.peek_at(k) {
            Some(t) if t.is_punct("*") || t.is_punct("(") => true,
            Some(t) if t.kind == TokenKind::Ident => k == 1 && !self.is_type_start_word(&t.text),
            _ => false,
        }
    }

    fn is_type_start_word(&self, word: &str) -> bool {
        SIGN_SIZE_WORDS.contains(&word)
            || matches!(word, "struct" | "union" | "enum" | "void")
            || self.config.is_primitive(word)
            || self.config.is_qualifier(word)
            || self.config.is_modifier(word)
            || self.store.types.contains_key(word)
    }

    fn parse_array_size(&mut self) -> PResult<ArraySize> {
        if self.eat_punct("]") {
            return Ok(ArraySize::Unspecified);
        }
        let expr = self.collect_expr_tokens(&["]"]);
        self.expect_punct("]")?;
        if expr.is_empty() {
            return Ok(ArraySize::Unspecified);
        }
        match self.eval_tokens(&expr) {
            Value::Int(n) => Ok(ArraySize::Fixed(n)),
            Value::UInt(n) => Ok(ArraySize::Fixed(n as i64)),
            _ => Ok(ArraySize::Symbolic(hdrscan_core::token::render(&expr))),
        }
    }

    fn parse_params(&mut self) -> PResult<FunctionSig> {
        let mut sig = FunctionSig {
            params: vec![],
            variadic: false,
        };
        if self.eat_punct(")") {
            return Ok(sig);
        }
        if self.peek().map_or(false, |t| t.is_ident("void"))
            && self.peek_at(1).map_or(false, |t| t.is_punct(")"))
        {
            self.pos += 2;
            return Ok(sig);
        }
        loop {
            if self.eat_punct("...") {
                sig.variadic = true;
                break;
            }
            let specs = self.parse_specifiers()?;
            let base = specs
                .base
                .ok_or_else(|| "parameter missing type".to_string())?;
            let base_ty = Type {
                base,
                modifiers: vec![],
                quals: specs.quals,
            };
            let (pname, pty) = self.parse_declarator(base_ty, true)?;
            let default = if self.eat_punct("=") {
                let expr = self.collect_expr_tokens(&[",", ")"]);
                Some(self.eval_tokens(&expr))
            } else {
                None
            };
            sig.params.push(Param {
                name: pname,
                ty: pty,
                default,
            });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        Ok(sig)
    }

    // --- aggregates

    fn parse_record(&mut self, kind: RecordKind, kw_line: u32) -> PResult<TypeBase> {
        let name = match self.peek() {
            Some(t) if t.kind == TokenKind::Ident => {
                let n = t.text.clone();
                self.pos += 1;
                Some(n)
            }
            _ => None,
        };

        let make_base = |id: String| match kind {
            RecordKind::Struct => TypeBase::Struct(id),
            RecordKind::Union => TypeBase::Union(id),
        };

        if !self.eat_punct("{") {
            // a reference: `struct foo x;`
            let id = name.ok_or_else(|| format!("{} without name or body", kind.keyword()))?;
            if self.store.record(kind, &id).is_none() {
                let stub = RecordDef {
                    name: id.clone(),
                    kind,
                    fields: vec![],
                    pack: None,
                    location: self.location(kw_line),
                };
                self.store.insert_record(stub);
            }
            return Ok(make_base(id));
        }

        let fields = self.parse_field_list()?;
        let id = name.unwrap_or_else(|| self.store.synthetic_id(kind.keyword()));
        let pack = packing_at(self.pack_events, kw_line);

        // an empty redefinition must not clobber a complete one
        let keep_existing = matches!(
            self.store.record(kind, &id),
            Some(existing) if fields.is_empty() && !existing.fields.is_empty()
        );
        if !keep_existing {
            debug!(name = %id, kind = kind.keyword(), fields = fields.len(), "recording aggregate");
            self.store.insert_record(RecordDef {
                name: id.clone(),
                kind,
                fields,
                pack,
                location: self.location(kw_line),
            });
        }
        Ok(make_base(id))
    }

    fn parse_field_list(&mut self) -> PResult<Vec<Field>> {
        let mut fields = Vec::new();
        loop {
            if self.eat_punct("}") {
                return Ok(fields);
            }
            if self.at_end() {
                return Err("unterminated aggregate body".into());
            }
            if self.eat_punct(";") {
                continue;
            }
            if let Err(message) = self.parse_field_declaration(&mut fields) {
                let line = self.current_line();
                self.diagnostics.push(Diagnostic::error(
                    Some(Location::new(&self.file, line)),
                    format!("field dropped: {}", message),
                ));
                self.recover_in_body();
            }
        }
    }

    /// Skip to the next `;` inside an aggregate body without consuming the
    /// body's closing brace.
    fn recover_in_body(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if tok.is_punct("{") {
                depth += 1;
            } else if tok.is_punct("}") {
                if depth == 0 {
                    return;
                }
                depth -= 1;
            } else if tok.is_punct(";") && depth == 0 {
                self.pos += 1;
                return;
            }
            self.pos += 1;
        }
    }

    fn parse_field_declaration(&mut self, fields: &mut Vec<Field>) -> PResult<()> {
        let specs = self.parse_specifiers()?;
        let base = specs
            .base
            .ok_or_else(|| "field missing type specifier".to_string())?;
        let base_ty = Type {
            base,
            modifiers: vec![],
            quals: specs.quals,
        };

        // anonymous nested aggregate: `struct { ... };`
        if self.peek().map_or(false, |t| t.is_punct(";")) {
            self.pos += 1;
            if matches!(
                base_ty.base,
                TypeBase::Struct(_) | TypeBase::Union(_) | TypeBase::Enum(_)
            ) {
                fields.push(Field {
                    name: None,
                    ty: base_ty,
                    bit_width: None,
                    default: None,
                });
            } else {
                let line = specs.line;
                self.warn(line, "field declaration without declarator ignored");
            }
            return Ok(());
        }

        loop {
            let (name, ty) = if self.peek().map_or(false, |t| t.is_punct(":")) {
                // unnamed bit-field: `int : 3;`
                (None, base_ty.clone())
            } else {
                self.parse_declarator(base_ty.clone(), true)?
            };

            let bit_width = if self.eat_punct(":") {
                let expr = self.collect_expr_tokens(&[",", ";", "}"]);
                match self.eval_tokens(&expr).as_i64() {
                    Some(n) if n >= 0 => Some(n as u32),
                    _ => {
                        self.warn(specs.line, "bit-field width did not reduce to an integer");
                        None
                    }
                }
            } else {
                None
            };

            // tolerated non-standard default: `int x = 1;` inside a struct
            let default = if self.eat_punct("=") {
                Some(self.parse_initializer()?)
            } else {
                None
            };

            fields.push(Field {
                name,
                ty,
                bit_width,
                default,
            });

            if self.eat_punct(",") {
                continue;
            }
            self.expect_punct(";")?;
            return Ok(());
        }
    }

    fn parse_enum(&mut self, kw_line: u32) -> PResult<TypeBase> {
        let name = match self.peek() {
            Some(t) if t.kind == TokenKind::Ident => {
                let n = t.text.clone();
                self.pos += 1;
                Some(n)
            }
            _ => None,
        };

        if !self.eat_punct("{") {
            let id = name.ok_or_else(|| "enum without name or body".to_string())?;
            if self.store.enums.get(&id).is_none() {
                self.store.insert_enum(
                    id.clone(),
                    Vec::new(),
                    self.location(kw_line),
                );
            }
            return Ok(TypeBase::Enum(id));
        }

        let mut members: Vec<(String, i64)> = Vec::new();
        let mut local: HashMap<String, i64> = HashMap::new();
        let mut next_value: i64 = 0;

        loop {
            if self.eat_punct("}") {
                break;
            }
            let member = match self.bump() {
                Some(t) if t.kind == TokenKind::Ident => t,
                Some(t) => return Err(format!("expected enumerator name, found '{}'", t.text)),
                None => return Err("unterminated enum body".into()),
            };
            if self.eat_punct("=") {
                let expr = self.collect_expr_tokens(&[",", "}"]);
                let store: &DefinitionStore = &*self.store;
                let scope = EnumScope {
                    local: &local,
                    store,
                };
                let mut evaluator = Evaluator::new(Some(self.macros), Some(&scope), &self.file);
                let value = evaluator.eval_value(&expr);
                let mut diags = evaluator.diagnostics;
                self.diagnostics.append(&mut diags);
                match value.as_i64() {
                    Some(n) => next_value = n,
                    None => self.warn(
                        member.line,
                        format!("enumerator '{}' value did not reduce; using {}", member.text, next_value),
                    ),
                }
            }
            members.push((member.text.clone(), next_value));
            local.insert(member.text.clone(), next_value);
            next_value = next_value.wrapping_add(1);
            self.eat_punct(",");
        }

        let id = name.unwrap_or_else(|| self.store.synthetic_id("enum"));
        debug!(name = %id, members = members.len(), "recording enum");
        self.store
            .insert_enum(id.clone(), members, self.location(kw_line));
        Ok(TypeBase::Enum(id))
    }

    // --- initializers and finishing

    fn parse_initializer(&mut self) -> PResult<Value> {
        if self.eat_punct("{") {
            let mut items = Vec::new();
            loop {
                if self.eat_punct("}") {
                    break;
                }
                if self.at_end() {
                    return Err("unterminated initializer list".into());
                }
                let expr = self.collect_expr_tokens(&[",", "}"]);
                if !expr.is_empty() {
                    let v = self.eval_tokens(&expr);
                    items.push(v);
                }
                self.eat_punct(",");
            }
            return Ok(Value::List(items));
        }
        let expr = self.collect_expr_tokens(&[",", ";"]);
        if expr.is_empty() {
            return Err("missing initializer expression".into());
        }
        Ok(self.eval_tokens(&expr))
    }

    fn finish_declarator(
        &mut self,
        specs: &Specs,
        name: Option<String>,
        ty: Type,
        value: Option<Value>,
    ) -> PResult<()> {
        let name = name.ok_or_else(|| "declarator without a name".to_string())?;
        let location = self.location(specs.line);

        if specs.is_typedef {
            debug!(name = %name, ty = %ty, "recording typedef");
            self.store.types.insert(name, ty);
            return Ok(());
        }

        if ty.is_function() {
            let mut ty = ty;
            let sig = match ty.modifiers.pop() {
                Some(TypeModifier::Function(sig)) => sig,
                _ => return Err("function declarator lost its signature".into()),
            };
            let call_conv = ty
                .quals
                .iter()
                .find(|q| self.config.is_modifier(q) && !q.contains('('))
                .cloned();
            debug!(name = %name, "recording function prototype");
            self.store.functions.insert(
                name.clone(),
                FunctionDef {
                    name,
                    return_type: ty,
                    params: sig.params,
                    variadic: sig.variadic,
                    call_conv,
                    storage: specs.storage.clone(),
                    location,
                },
            );
            return Ok(());
        }

        debug!(name = %name, ty = %ty, "recording variable");
        self.store.variables.insert(
            name.clone(),
            VariableDef {
                name,
                ty,
                value,
                storage: specs.storage.clone(),
                location,
            },
        );
        Ok(())
    }

    fn skip_braces(&mut self) -> PResult<()> {
        if !self.eat_punct("{") {
            return Err("expected '{'".into());
        }
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump() {
                Some(t) if t.is_punct("{") => depth += 1,
                Some(t) if t.is_punct("}") => depth -= 1,
                Some(_) => {}
                None => return Err("unterminated function body".into()),
            }
        }
        Ok(())
    }
}
