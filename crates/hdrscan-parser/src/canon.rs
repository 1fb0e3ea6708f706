//! Type canonicalisation
//!
//! Collapses typedef chains onto their fundamental type, concatenating
//! modifier layers so the outermost layer stays last. The raw chain stays
//! in the store untouched; only the resolved form is computed here.
//!
//! A chain that loops through plain references (`A -> B -> A`) is an
//! error. A loop that crosses a pointer or function layer is legal C
//! (self-referential structs, callback typedefs) and resolution stops at
//! the name reference instead of expanding it forever.

use crate::store::DefinitionStore;
use hdrscan_core::{Error, Result, Type, TypeBase, TypeModifier};
use std::collections::HashSet;

/// Resolve `ty` against the store's typedefs, transitively.
pub fn resolve_type(store: &DefinitionStore, ty: &Type) -> Result<Type> {
    let mut visited = HashSet::new();
    resolve_inner(store, ty, &mut visited, false)
}

fn resolve_inner(
    store: &DefinitionStore,
    ty: &Type,
    visited: &mut HashSet<String>,
    crossed_indirection: bool,
) -> Result<Type> {
    let name = match &ty.base {
        TypeBase::Named(n) => n.clone(),
        // primitives and aggregate ids terminate a chain
        _ => return Ok(ty.clone()),
    };

    if visited.contains(&name) {
        if crossed_indirection {
            // legal cycle; keep the name reference unexpanded
            return Ok(ty.clone());
        }
        return Err(Error::Parse(format!(
            "recursive typedef chain through '{}'",
            name
        )));
    }

    let inner = match store.types.get(&name) {
        Some(t) => t.clone(),
        // unknown user types stay as they are
        None => return Ok(ty.clone()),
    };
    visited.insert(name);

    let crossed = crossed_indirection
        || inner
            .modifiers
            .iter()
            .any(|m| matches!(m, TypeModifier::Pointer | TypeModifier::Function(_)));
    let resolved = resolve_inner(store, &inner, visited, crossed)?;

    // inner layers first, the referring type's own layers stay outermost
    let mut modifiers = resolved.modifiers;
    modifiers.extend(ty.modifiers.iter().cloned());
    let mut quals = resolved.quals;
    quals.extend(ty.quals.iter().cloned());

    Ok(Type {
        base: resolved.base,
        modifiers,
        quals,
    })
}
