//! Generic instantiation: what to hand a guard factory at a use site.
//!
//! A generic type's guard is a factory taking one checker per declared
//! parameter. Wherever a field (or a free-standing use) mentions
//! `Generic(name, args)`, [`supply`] walks the arguments and asks a
//! [`Checkers`] backend for one checker each: a primitive checker, a
//! monomorphic guard, the enclosing factory's own parameter checker, a nested
//! factory application, or an inline structural checker. Parameters are never
//! inspected; they are only ever passed along.
use crate::ir::{Primitive, TypeDef, TypeRef};
use crate::resolve::ResolvedSchema;

/// Generic parameters visible at a use site.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    owner: Option<&'a str>,
    params: &'a [String],
}

impl<'a> Scope<'a> {
    /// Top-level use: nothing bound.
    pub fn empty() -> Self {
        Scope::default()
    }

    /// Inside the body of `def`.
    pub fn of(def: &'a TypeDef) -> Self {
        Scope { owner: Some(def.name()), params: def.params() }
    }

    pub fn owner(&self) -> Option<&'a str> {
        self.owner
    }

    pub fn params(&self) -> &'a [String] {
        self.params
    }

    pub fn index(&self, param: &str) -> Option<usize> {
        self.params.iter().position(|p| p == param)
    }

    /// `args` spell out exactly the enclosing type's own parameters, in order.
    fn is_identity(&self, args: &[TypeRef]) -> bool {
        args.len() == self.params.len()
            && args.iter().zip(self.params).all(|(arg, p)| {
                matches!(arg, TypeRef::Parameter(name) if name == p)
            })
    }
}

/// One application of a generic guard factory.
#[derive(Debug, Clone, Copy)]
pub struct Instantiation<'s, 'u> {
    pub def: &'s TypeDef,
    /// the `Generic` reference as written
    pub use_site: &'u TypeRef,
    /// no parameter of the enclosing scope is involved
    pub concrete: bool,
    /// the enclosing generic applied to its own parameters
    pub recursive: bool,
}

/// Produces checkers in some representation: TS expression text, or an
/// in-process validator.
pub trait Checkers {
    type Checker;

    fn primitive(&mut self, primitive: Primitive) -> Self::Checker;

    /// Guard of a monomorphic struct or union.
    fn guard(&mut self, def: &TypeDef) -> Self::Checker;

    /// Checker the enclosing factory received for parameter `index`.
    fn param(&mut self, index: usize, name: &str) -> Self::Checker;

    /// Factory of `inst.def` applied to `args`, one per declared parameter.
    fn apply(&mut self, inst: Instantiation<'_, '_>, args: Vec<Self::Checker>) -> Self::Checker;

    /// Sequence, map, tuple or nullable argument.
    fn structural(&mut self, ty: &TypeRef, scope: Scope<'_>) -> Self::Checker;

    /// Rejects everything. Only reachable for references a resolved schema
    /// cannot contain.
    fn never(&mut self) -> Self::Checker;
}

/// The checker validating values of `ty` at a use site within `scope`.
pub fn supply<C: Checkers>(
    schema: &ResolvedSchema,
    ty: &TypeRef,
    scope: Scope<'_>,
    backend: &mut C,
) -> C::Checker {
    match ty {
        TypeRef::Primitive(p) => backend.primitive(*p),
        TypeRef::Parameter(name) => match scope.index(name) {
            Some(index) => backend.param(index, name),
            None => backend.never(),
        },
        TypeRef::Named(name) => monomorphic(schema, name, backend),
        TypeRef::Generic { name, args } if args.is_empty() => monomorphic(schema, name, backend),
        TypeRef::Generic { name, args } => {
            let Some(def) = schema.get(name) else {
                return backend.never();
            };
            if def.params().len() != args.len() {
                return backend.never();
            }
            let inst = Instantiation {
                def,
                use_site: ty,
                concrete: !args.iter().any(TypeRef::mentions_param),
                recursive: scope.owner() == Some(name.as_str()) && scope.is_identity(args),
            };
            // Arguments first: nested instantiations are settled before the
            // one that consumes them.
            let checkers = args
                .iter()
                .map(|arg| supply(schema, arg, scope, backend))
                .collect();
            backend.apply(inst, checkers)
        }
        TypeRef::Sequence(_) | TypeRef::Map(_) | TypeRef::Tuple(_) | TypeRef::Nullable(_) => {
            backend.structural(ty, scope)
        }
    }
}

fn monomorphic<C: Checkers>(schema: &ResolvedSchema, name: &str, backend: &mut C) -> C::Checker {
    match schema.get(name) {
        Some(def) if !def.is_generic() => backend.guard(def),
        _ => backend.never(),
    }
}
