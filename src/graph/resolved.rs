//! Bindings resolved for one key within one component

use super::ComponentPath;
use crate::binding::{
    BindingDeclaration, BindingRef, MultibindingDeclaration, OptionalBindingDeclaration, SubcomponentDeclaration,
};
use crate::key::Key;
use std::sync::Arc;

/// Every binding that satisfies a key as seen from one component, each
/// paired with the component that owns it, plus the declarations that
/// shaped the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBindings {
    pub key: Key,
    bindings: Vec<(ComponentPath, BindingRef)>,
    pub multibinding_declarations: Vec<MultibindingDeclaration>,
    pub optional_declarations: Vec<OptionalBindingDeclaration>,
    pub subcomponent_declarations: Vec<SubcomponentDeclaration>,
}

impl ResolvedBindings {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            bindings: Vec::new(),
            multibinding_declarations: Vec::new(),
            optional_declarations: Vec::new(),
            subcomponent_declarations: Vec::new(),
        }
    }

    /// Adds `binding`, owned by `owner`, unless it is already present
    pub fn add(&mut self, owner: ComponentPath, binding: BindingRef) {
        if !self.contains(&binding) {
            self.bindings.push((owner, binding));
        }
    }

    pub fn contains(&self, binding: &BindingRef) -> bool {
        self.bindings.iter().any(|(_, b)| Arc::ptr_eq(b, binding) || b == binding)
    }

    /// Bindings with their owning components
    pub fn bindings(&self) -> impl Iterator<Item = (&ComponentPath, &BindingRef)> {
        self.bindings.iter().map(|(p, b)| (p, b))
    }

    pub fn binding_refs(&self) -> impl Iterator<Item = &BindingRef> {
        self.bindings.iter().map(|(_, b)| b)
    }

    /// Bindings owned by the component at `path`
    pub fn owned_by<'a>(&'a self, path: &'a ComponentPath) -> impl Iterator<Item = &'a BindingRef> + 'a {
        self.bindings
            .iter()
            .filter(move |(p, _)| p == path)
            .map(|(_, b)| b)
    }

    pub fn owner_of(&self, binding: &BindingRef) -> Option<&ComponentPath> {
        self.bindings
            .iter()
            .find(|(_, b)| Arc::ptr_eq(b, binding))
            .map(|(p, _)| p)
    }

    /// The binding when exactly one satisfies the key
    pub fn single(&self) -> Option<(&ComponentPath, &BindingRef)> {
        match self.bindings.as_slice() {
            [(path, binding)] => Some((path, binding)),
            _ => None,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Every binding and declaration, for listing in diagnostics
    pub fn declarations(&self) -> Vec<&dyn BindingDeclaration> {
        let mut declarations: Vec<&dyn BindingDeclaration> = self
            .bindings
            .iter()
            .map(|(_, b)| b.as_ref() as &dyn BindingDeclaration)
            .collect();
        declarations.extend(
            self.multibinding_declarations
                .iter()
                .map(|d| d as &dyn BindingDeclaration),
        );
        declarations.extend(self.optional_declarations.iter().map(|d| d as &dyn BindingDeclaration));
        declarations.extend(
            self.subcomponent_declarations
                .iter()
                .map(|d| d as &dyn BindingDeclaration),
        );
        declarations
    }
}
