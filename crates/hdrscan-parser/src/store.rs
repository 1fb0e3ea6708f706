//! The definition store
//!
//! The finalized, queryable catalog of everything recognized from the
//! input headers, grouped by kind. Insertion order within a kind is
//! preserved, including across a cache round-trip. After parsing the
//! store is only handed out behind shared references, so concurrent
//! queries are safe.

use crate::canon;
use crate::eval::{Evaluator, SymbolEnv};
use crate::macros::{Macro, MacroTable};
use hdrscan_core::{
    EnumDef, FunctionDef, FunctionMacro, Location, ObjectMacro, RecordDef, RecordKind, Result,
    Type, Value, VariableDef,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// A map that remembers insertion order. Reinsertion under an existing
/// key replaces the value but keeps the original position.
#[derive(Debug, Clone)]
pub struct OrderedMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<V: PartialEq> PartialEq for OrderedMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries: Vec<(String, V)> = Vec::deserialize(deserializer)?;
        let mut map = OrderedMap::new();
        for (key, value) in entries {
            map.insert(key, value);
        }
        Ok(map)
    }
}

/// Definition kinds, as exposed to queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Types,
    Variables,
    Macros,
    FnMacros,
    Structs,
    Unions,
    Enums,
    Functions,
    Values,
}

impl Kind {
    pub const ALL: [Kind; 9] = [
        Kind::Types,
        Kind::Variables,
        Kind::Macros,
        Kind::FnMacros,
        Kind::Structs,
        Kind::Unions,
        Kind::Enums,
        Kind::Functions,
        Kind::Values,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Kind::Types => "types",
            Kind::Variables => "variables",
            Kind::Macros => "macros",
            Kind::FnMacros => "fnmacros",
            Kind::Structs => "structs",
            Kind::Unions => "unions",
            Kind::Enums => "enums",
            Kind::Functions => "functions",
            Kind::Values => "values",
        }
    }
}

/// A borrowed record of any kind
#[derive(Debug, Clone, Copy)]
pub enum Definition<'a> {
    Type(&'a Type),
    Variable(&'a VariableDef),
    Macro(&'a ObjectMacro),
    FnMacro(&'a FunctionMacro),
    Record(&'a RecordDef),
    Enum(&'a EnumDef),
    Function(&'a FunctionDef),
    Value(&'a Value),
}

/// The catalog of parsed declarations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionStore {
    pub types: OrderedMap<Type>,
    pub variables: OrderedMap<VariableDef>,
    pub macros: OrderedMap<ObjectMacro>,
    pub fnmacros: OrderedMap<FunctionMacro>,
    pub structs: OrderedMap<RecordDef>,
    pub unions: OrderedMap<RecordDef>,
    pub enums: OrderedMap<EnumDef>,
    pub functions: OrderedMap<FunctionDef>,
    pub values: OrderedMap<Value>,
    anon_counter: u32,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up one definition by kind and name.
    pub fn get(&self, kind: Kind, name: &str) -> Option<Definition<'_>> {
        match kind {
            Kind::Types => self.types.get(name).map(Definition::Type),
            Kind::Variables => self.variables.get(name).map(Definition::Variable),
            Kind::Macros => self.macros.get(name).map(Definition::Macro),
            Kind::FnMacros => self.fnmacros.get(name).map(Definition::FnMacro),
            Kind::Structs => self.structs.get(name).map(Definition::Record),
            Kind::Unions => self.unions.get(name).map(Definition::Record),
            Kind::Enums => self.enums.get(name).map(Definition::Enum),
            Kind::Functions => self.functions.get(name).map(Definition::Function),
            Kind::Values => self.values.get(name).map(Definition::Value),
        }
    }

    /// All names of a kind, in insertion order.
    pub fn iterate(&self, kind: Kind) -> Vec<(&str, Definition<'_>)> {
        match kind {
            Kind::Types => self
                .types
                .iter()
                .map(|(n, v)| (n, Definition::Type(v)))
                .collect(),
            Kind::Variables => self
                .variables
                .iter()
                .map(|(n, v)| (n, Definition::Variable(v)))
                .collect(),
            Kind::Macros => self
                .macros
                .iter()
                .map(|(n, v)| (n, Definition::Macro(v)))
                .collect(),
            Kind::FnMacros => self
                .fnmacros
                .iter()
                .map(|(n, v)| (n, Definition::FnMacro(v)))
                .collect(),
            Kind::Structs => self
                .structs
                .iter()
                .map(|(n, v)| (n, Definition::Record(v)))
                .collect(),
            Kind::Unions => self
                .unions
                .iter()
                .map(|(n, v)| (n, Definition::Record(v)))
                .collect(),
            Kind::Enums => self
                .enums
                .iter()
                .map(|(n, v)| (n, Definition::Enum(v)))
                .collect(),
            Kind::Functions => self
                .functions
                .iter()
                .map(|(n, v)| (n, Definition::Function(v)))
                .collect(),
            Kind::Values => self
                .values
                .iter()
                .map(|(n, v)| (n, Definition::Value(v)))
                .collect(),
        }
    }

    /// Resolve a type reference to its canonical form (typedef chains
    /// collapsed). Plain typedef cycles are an error.
    pub fn resolve(&self, ty: &Type) -> Result<Type> {
        canon::resolve_type(self, ty)
    }

    /// Reduce the named macro, value, or variable initializer to a value.
    pub fn eval(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.values.get(name) {
            return Some(v.clone());
        }
        if let Some(var) = self.variables.get(name) {
            if let Some(v) = &var.value {
                return Some(v.clone());
            }
        }
        if let Some(m) = self.macros.get(name) {
            let mut table = MacroTable::new();
            for (n, om) in self.macros.iter() {
                table.define(n, Macro::Object(om.clone()));
            }
            for (n, fm) in self.fnmacros.iter() {
                table.define(n, Macro::Function(fm.clone()));
            }
            let mut evaluator = Evaluator::new(Some(&table), Some(self), "<store>");
            return Some(evaluator.eval_value(&m.body));
        }
        None
    }

    /// Record access by kind for struct/union.
    pub fn record(&self, kind: RecordKind, name: &str) -> Option<&RecordDef> {
        match kind {
            RecordKind::Struct => self.structs.get(name),
            RecordKind::Union => self.unions.get(name),
        }
    }

    /// Store a struct/union definition under its name.
    pub fn insert_record(&mut self, record: RecordDef) {
        let name = record.name.clone();
        match record.kind {
            RecordKind::Struct => self.structs.insert(name, record),
            RecordKind::Union => self.unions.insert(name, record),
        }
    }

    /// Store an enum and replicate its members into `values`.
    pub fn insert_enum(
        &mut self,
        name: String,
        members: Vec<(String, i64)>,
        location: Option<Location>,
    ) {
        // an empty redefinition must not clobber a complete one
        if members.is_empty() {
            if let Some(existing) = self.enums.get(&name) {
                if !existing.members.is_empty() {
                    return;
                }
            }
        }
        for (member, value) in &members {
            self.values.insert(member.clone(), Value::Int(*value));
        }
        self.enums.insert(
            name.clone(),
            EnumDef {
                name,
                members,
                location,
            },
        );
    }

    /// Fresh id for an anonymous aggregate, e.g. `anon_struct0`.
    pub fn synthetic_id(&mut self, keyword: &str) -> String {
        let id = format!("anon_{}{}", keyword, self.anon_counter);
        self.anon_counter += 1;
        id
    }
}

impl SymbolEnv for DefinitionStore {
    fn resolve_symbol(&self, name: &str) -> Option<Value> {
        match self.values.get(name) {
            Some(v) if !v.is_symbolic() => Some(v.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn test_ordered_map_keeps_insertion_order() {
        let mut map: OrderedMap<i32> = OrderedMap::new();
        map.insert("zebra", 1);
        map.insert("apple", 2);
        map.insert("mango", 3);
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["zebra", "apple", "mango"]);

        // replacement keeps position
        map.insert("apple", 20);
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, vec!["zebra", "apple", "mango"]);
        assert_eq!(map.get("apple"), Some(&20));
    }

    #[test]
    fn test_ordered_map_serde_roundtrip() {
        let mut map: OrderedMap<i32> = OrderedMap::new();
        map.insert("b", 1);
        map.insert("a", 2);
        let json = serde_json::to_string(&map).unwrap();
        let back: OrderedMap<i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(map, back);
        let keys: Vec<&str> = back.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_synthetic_ids_are_unique() {
        let mut store = DefinitionStore::new();
        assert_eq!(store.synthetic_id("struct"), "anon_struct0");
        assert_eq!(store.synthetic_id("union"), "anon_union1");
        assert_eq!(store.synthetic_id("struct"), "anon_struct2");
    }

    #[test]
    fn test_enum_members_replicated_into_values() {
        let mut store = DefinitionStore::new();
        store.insert_enum(
            "E".into(),
            vec![("a".into(), 129), ("b".into(), 6)],
            None,
        );
        assert_eq!(store.values.get("a"), Some(&Value::Int(129)));
        assert_eq!(store.eval("b"), Some(Value::Int(6)));
    }

    #[test]
    fn test_eval_object_macro() {
        let mut store = DefinitionStore::new();
        store.macros.insert(
            "M",
            ObjectMacro {
                body: tokenize("t.h", "(1 << 4)").unwrap(),
                location: None,
            },
        );
        assert_eq!(store.eval("M"), Some(Value::Int(16)));
    }

    #[test]
    fn test_get_by_kind() {
        let mut store = DefinitionStore::new();
        store.types.insert("myint", Type::primitive("int"));
        assert!(matches!(
            store.get(Kind::Types, "myint"),
            Some(Definition::Type(_))
        ));
        assert!(store.get(Kind::Functions, "myint").is_none());
    }
}
