//! Model of C declarations extracted from headers
//!
//! Everything the parser records is built from these types. A declaration's
//! type is a [`Type`]: a base spelling plus an ordered list of modifier
//! layers. Modifiers apply to the base in list order, so the outermost
//! layer (the one binding closest to the declared name) comes last:
//! `int (*p)[4]` is `[Array(4), Pointer]` while `int *p[4]` is
//! `[Pointer, Array(4)]`.

use crate::location::Location;
use crate::token::{render, Token};
use serde::{Deserialize, Serialize};

/// Default structure packing when no `#pragma pack` is in effect
pub const DEFAULT_PACK: u32 = 8;

/// The base of a canonical type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeBase {
    /// A primitive spelling such as `int` or `unsigned long long`
    Primitive(String),
    /// A user type name (typedef or unresolved spelling)
    Named(String),
    /// A struct stored in the definition store under this id
    Struct(String),
    /// A union stored in the definition store under this id
    Union(String),
    /// An enum stored in the definition store under this id
    Enum(String),
}

impl TypeBase {
    /// The bare name or id inside the base
    pub fn name(&self) -> &str {
        match self {
            TypeBase::Primitive(n)
            | TypeBase::Named(n)
            | TypeBase::Struct(n)
            | TypeBase::Union(n)
            | TypeBase::Enum(n) => n,
        }
    }
}

impl std::fmt::Display for TypeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeBase::Primitive(n) | TypeBase::Named(n) => write!(f, "{}", n),
            TypeBase::Struct(n) => write!(f, "struct {}", n),
            TypeBase::Union(n) => write!(f, "union {}", n),
            TypeBase::Enum(n) => write!(f, "enum {}", n),
        }
    }
}

/// Array length in a type modifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArraySize {
    /// `x[]`
    Unspecified,
    /// Reduced constant length
    Fixed(i64),
    /// Length expression that did not reduce; original source text
    Symbolic(String),
}

impl std::fmt::Display for ArraySize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArraySize::Unspecified => Ok(()),
            ArraySize::Fixed(n) => write!(f, "{}", n),
            ArraySize::Symbolic(s) => write!(f, "{}", s),
        }
    }
}

/// One parameter of a function signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Type,
    /// Default value, a tolerated non-standard extension
    pub default: Option<Value>,
}

/// Parameter list of a function type layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSig {
    pub params: Vec<Param>,
    pub variadic: bool,
}

/// One modifier layer of a type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeModifier {
    Pointer,
    Array(ArraySize),
    Function(FunctionSig),
}

/// Canonical type reference: base, ordered modifiers, qualifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type {
    pub base: TypeBase,
    pub modifiers: Vec<TypeModifier>,
    pub quals: Vec<String>,
}

impl Type {
    pub fn new(base: TypeBase) -> Self {
        Self {
            base,
            modifiers: vec![],
            quals: vec![],
        }
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::new(TypeBase::Primitive(name.into()))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(TypeBase::Named(name.into()))
    }

    /// Append qualifiers (keeps existing ones)
    pub fn with_quals(mut self, quals: &[String]) -> Self {
        self.quals.extend_from_slice(quals);
        self
    }

    /// Append one modifier layer (becomes the new outermost layer)
    pub fn with_modifier(mut self, modifier: TypeModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    /// Does the outermost layer make this a function declarator?
    pub fn is_function(&self) -> bool {
        matches!(self.modifiers.last(), Some(TypeModifier::Function(_)))
    }

    /// C-like rendering of this type declaring `name`
    pub fn declaration(&self, name: Option<&str>) -> String {
        let mut decl = name.unwrap_or("").to_string();
        for modifier in self.modifiers.iter().rev() {
            match modifier {
                TypeModifier::Pointer => decl = format!("*{}", decl),
                TypeModifier::Array(size) => {
                    if decl.starts_with('*') {
                        decl = format!("({})[{}]", decl, size);
                    } else {
                        decl = format!("{}[{}]", decl, size);
                    }
                }
                TypeModifier::Function(sig) => {
                    let mut params: Vec<String> = sig
                        .params
                        .iter()
                        .map(|p| p.ty.declaration(p.name.as_deref()))
                        .collect();
                    if sig.variadic {
                        params.push("...".into());
                    }
                    if decl.starts_with('*') {
                        decl = format!("({})({})", decl, params.join(", "));
                    } else {
                        decl = format!("{}({})", decl, params.join(", "));
                    }
                }
            }
        }
        let mut out = String::new();
        for q in &self.quals {
            out.push_str(q);
            out.push(' ');
        }
        out.push_str(&self.base.to_string());
        if !decl.is_empty() {
            out.push(' ');
            out.push_str(&decl);
        }
        out
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.declaration(None))
    }
}

/// A reduced (or irreducible) constant value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// Aggregate initializer `{ ... }` with every element reduced
    List(Vec<Value>),
    /// Expression that did not reduce; the original tokens
    Symbolic(Vec<Token>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::UInt(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Value::Symbolic(_))
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::UInt(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Symbolic(tokens) => write!(f, "{}", render(tokens)),
        }
    }
}

/// Object-like macro: `#define NAME tokens`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMacro {
    /// Replacement tokens, stored unexpanded
    pub body: Vec<Token>,
    pub location: Option<Location>,
}

/// Function-like macro: `#define NAME(a, b) tokens`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionMacro {
    pub params: Vec<String>,
    /// Replacement tokens, stored unexpanded; parameter names stay inline
    pub body: Vec<Token>,
    pub variadic: bool,
    pub location: Option<Location>,
}

/// Enum definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDef {
    /// Name or synthetic id for anonymous enums
    pub name: String,
    /// Members in source order with resolved values
    pub members: Vec<(String, i64)>,
    pub location: Option<Location>,
}

/// Struct or union
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Struct,
    Union,
}

impl RecordKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            RecordKind::Struct => "struct",
            RecordKind::Union => "union",
        }
    }
}

/// One field of a struct or union
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// None for anonymous nested aggregates and unnamed bit-field padding
    pub name: Option<String>,
    pub ty: Type,
    pub bit_width: Option<u32>,
    /// Tolerated non-standard `= value` field initializer
    pub default: Option<Value>,
}

/// Struct or union definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDef {
    /// Name or synthetic id for anonymous records
    pub name: String,
    pub kind: RecordKind,
    pub fields: Vec<Field>,
    /// `#pragma pack` value active at the declaration; None means default
    pub pack: Option<u32>,
    pub location: Option<Location>,
}

impl RecordDef {
    /// Effective pack value in bytes
    pub fn pack_value(&self) -> u32 {
        self.pack.unwrap_or(DEFAULT_PACK)
    }
}

/// Function prototype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub variadic: bool,
    pub call_conv: Option<String>,
    /// Linkage and storage qualifiers: `static`, `extern`, `inline`
    pub storage: Vec<String>,
    pub location: Option<Location>,
}

/// Global variable declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    pub name: String,
    pub ty: Type,
    /// Initializer, reduced where possible
    pub value: Option<Value>,
    pub storage: Vec<String>,
    pub location: Option<Location>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_order_distinguishes_declarators() {
        // int (*p)[4]
        let ptr_to_arr = Type::primitive("int")
            .with_modifier(TypeModifier::Array(ArraySize::Fixed(4)))
            .with_modifier(TypeModifier::Pointer);
        // int *p[4]
        let arr_of_ptr = Type::primitive("int")
            .with_modifier(TypeModifier::Pointer)
            .with_modifier(TypeModifier::Array(ArraySize::Fixed(4)));
        assert_ne!(ptr_to_arr, arr_of_ptr);
        assert_eq!(ptr_to_arr.declaration(Some("p")), "int (*p)[4]");
        assert_eq!(arr_of_ptr.declaration(Some("p")), "int *p[4]");
    }

    #[test]
    fn test_function_declaration_rendering() {
        let sig = FunctionSig {
            params: vec![Param {
                name: Some("x".into()),
                ty: Type::primitive("int"),
                default: None,
            }],
            variadic: false,
        };
        let fn_ptr = Type::primitive("void")
            .with_modifier(TypeModifier::Function(sig))
            .with_modifier(TypeModifier::Pointer);
        assert_eq!(fn_ptr.declaration(Some("cb")), "void (*cb)(int x)");
        assert!(!fn_ptr.is_function());
    }

    #[test]
    fn test_pack_value_default() {
        let record = RecordDef {
            name: "s".into(),
            kind: RecordKind::Struct,
            fields: vec![],
            pack: None,
            location: None,
        };
        assert_eq!(record.pack_value(), DEFAULT_PACK);
    }
}
