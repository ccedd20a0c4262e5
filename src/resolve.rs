//! Reference resolution: the gate between schema construction and emission.
//!
//! One structural pass over every definition. All problems are collected so a
//! single run reports the whole schema; emitters only ever see a
//! [`ResolvedSchema`] and do no validation of their own.
use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use crate::error::{SchemaError, SchemaErrors, Site};
use crate::ir::{AliasDef, FieldDef, Schema, TypeDef, TypeRef};

static IDENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier regex")
});

// Names that cannot become a TS type or guard name.
const RESERVED: &[&str] = &[
    "any", "await", "bigint", "boolean", "break", "bytes", "case", "catch", "class", "const",
    "continue", "debugger", "default", "delete", "do", "else", "enum", "export", "extends",
    "false", "finally", "for", "function", "if", "implements", "import", "in", "instanceof",
    "interface", "let", "never", "new", "null", "number", "object", "package", "private",
    "protected", "public", "record", "return", "static", "string", "super", "switch", "symbol",
    "this", "throw", "true", "try", "typeof", "undefined", "unknown", "var", "void", "while",
    "with", "yield",
];

pub fn is_identifier(name: &str) -> bool {
    IDENT.is_match(name) && !RESERVED.contains(&name)
}

/// Property keys may be reserved words; they only need identifier syntax.
pub(crate) fn is_plain_key(name: &str) -> bool {
    IDENT.is_match(name)
}

/// A schema that passed resolution. Immutable; share it by reference or `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    types: IndexMap<String, TypeDef>,
}

impl ResolvedSchema {
    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Definitions in schema declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    pub fn len(&self) -> usize { self.types.len() }

    pub fn is_empty(&self) -> bool { self.types.is_empty() }

    pub fn to_schema(&self) -> Schema {
        Schema { types: self.types.values().cloned().collect() }
    }

    pub fn into_schema(self) -> Schema {
        Schema { types: self.types.into_values().collect() }
    }
}

pub trait Resolve {
    fn resolve(self) -> Result<ResolvedSchema, SchemaErrors>;
}

impl Resolve for Schema {
    fn resolve(self) -> Result<ResolvedSchema, SchemaErrors> {
        resolve(self)
    }
}

/// Already resolved: nothing to check again.
impl Resolve for ResolvedSchema {
    fn resolve(self) -> Result<ResolvedSchema, SchemaErrors> {
        Ok(self)
    }
}

#[instrument(skip_all, fields(types = schema.len()))]
pub fn resolve(schema: Schema) -> Result<ResolvedSchema, SchemaErrors> {
    let mut resolver = Resolver::default();
    for def in &schema.types {
        resolver.declare(def);
    }
    for def in &schema.types {
        resolver.check_def(def);
    }
    // Expansion needs every reference to be well-formed first.
    if resolver.errors.is_empty() {
        resolver.errors.extend(cyclic_aliases(&schema.types));
    }
    if !resolver.errors.is_empty() {
        debug!(errors = resolver.errors.len(), "schema rejected");
        return Err(SchemaErrors(resolver.errors));
    }

    let mut types = IndexMap::with_capacity(schema.types.len());
    for def in schema.types {
        types.insert(def.name().to_string(), def);
    }
    debug!(types = types.len(), "schema resolved");
    Ok(ResolvedSchema { types })
}

/// Check a free-standing use-site reference (no enclosing generic scope).
pub fn check_use(schema: &ResolvedSchema, ty: &TypeRef) -> Result<(), SchemaErrors> {
    let mut resolver = Resolver::default();
    for def in schema.iter() {
        resolver.declare(def);
    }
    resolver.check_ref(ty, &Site::ty("<use>"), &[]);
    if resolver.errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaErrors(resolver.errors))
    }
}

#[derive(Default)]
struct Resolver {
    arity: HashMap<String, usize>,    // first definition wins
    errors: Vec<SchemaError>,
}

impl Resolver {
    fn declare(&mut self, def: &TypeDef) {
        let name = def.name();
        if !is_identifier(name) {
            self.errors.push(SchemaError::InvalidIdentifier {
                name: name.to_string(),
                what: "type",
            });
        }
        if self.arity.contains_key(name) {
            self.errors.push(SchemaError::DuplicateType { name: name.to_string() });
        } else {
            self.arity.insert(name.to_string(), def.params().len());
        }
    }

    fn check_def(&mut self, def: &TypeDef) {
        let site = Site::ty(def.name());
        match def {
            TypeDef::Struct(s) => {
                self.check_params(&s.name, &s.params);
                self.check_fields(&s.fields, &site, &s.params);
            }
            TypeDef::Alias(a) => {
                self.check_params(&a.name, &a.params);
                self.check_ref(&a.ty, &site, &a.params);
            }
            TypeDef::Enum(e) => {
                let mut members = HashSet::new();
                for member in &e.members {
                    if !members.insert(member.as_str()) {
                        self.errors.push(SchemaError::DuplicateMember {
                            ty: e.name.clone(),
                            member: member.clone(),
                        });
                    }
                }
            }
            TypeDef::Union(u) => {
                let mut tags = HashSet::new();
                for variant in &u.variants {
                    if !tags.insert(variant.tag.as_str()) {
                        self.errors.push(SchemaError::DuplicateTag {
                            union: u.name.clone(),
                            tag: variant.tag.clone(),
                        });
                    }
                    self.check_fields(&variant.fields, &site.in_variant(&variant.tag), &[]);
                }
            }
        }
    }

    fn check_params(&mut self, ty: &str, params: &[String]) {
        let mut seen = HashSet::new();
        for param in params {
            if !is_identifier(param) {
                self.errors.push(SchemaError::InvalidIdentifier {
                    name: param.clone(),
                    what: "parameter",
                });
            }
            if !seen.insert(param.as_str()) {
                self.errors.push(SchemaError::DuplicateParameter {
                    ty: ty.to_string(),
                    param: param.clone(),
                });
            }
        }
    }

    fn check_fields(&mut self, fields: &[FieldDef], owner: &Site, scope: &[String]) {
        let mut names = HashSet::new();
        for field in fields {
            if !names.insert(field.name.as_str()) {
                self.errors.push(SchemaError::DuplicateField {
                    owner: owner.clone(),
                    field: field.name.clone(),
                });
            }
            self.check_ref(&field.ty, &owner.at_field(&field.name), scope);
        }
    }

    fn check_ref(&mut self, ty: &TypeRef, site: &Site, scope: &[String]) {
        match ty {
            TypeRef::Primitive(_) => {}
            TypeRef::Parameter(param) => {
                if !scope.contains(param) {
                    self.errors.push(SchemaError::UnboundParameter {
                        site: site.clone(),
                        param: param.clone(),
                    });
                }
            }
            TypeRef::Named(name) => self.check_target(name, 0, site, scope),
            TypeRef::Generic { name, args } => {
                self.check_target(name, args.len(), site, scope);
                for arg in args {
                    self.check_ref(arg, site, scope);
                }
            }
            TypeRef::Sequence(inner) | TypeRef::Map(inner) | TypeRef::Nullable(inner) => {
                self.check_ref(inner, site, scope);
            }
            TypeRef::Tuple(elems) => {
                for elem in elems {
                    self.check_ref(elem, site, scope);
                }
            }
        }
    }

    fn check_target(&mut self, name: &str, found: usize, site: &Site, scope: &[String]) {
        // A bound parameter in type position would need its runtime
        // representation, which erasure removed.
        if scope.iter().any(|p| p == name) {
            self.errors.push(SchemaError::InvalidParameterUse {
                site: site.clone(),
                param: name.to_string(),
            });
            return;
        }
        match self.arity.get(name) {
            None => self.errors.push(SchemaError::UnresolvedReference {
                site: site.clone(),
                target: name.to_string(),
            }),
            Some(&expected) if expected != found => self.errors.push(SchemaError::ArityMismatch {
                site: site.clone(),
                target: name.to_string(),
                expected,
                found,
            }),
            Some(_) => {}
        }
    }
}

// Expansion steps after which an alias chain counts as cyclic.
const ALIAS_EXPANSION_LIMIT: usize = 64;

/// Aliases whose expansion reaches the alias again before any value
/// structure is consumed. Their guards would never return.
fn cyclic_aliases(types: &[TypeDef]) -> Vec<SchemaError> {
    let aliases: HashMap<&str, &AliasDef> = types
        .iter()
        .filter_map(|def| match def {
            TypeDef::Alias(a) => Some((a.name.as_str(), a)),
            _ => None,
        })
        .collect();
    types
        .iter()
        .filter_map(|def| match def {
            TypeDef::Alias(alias) => {
                let mut budget = ALIAS_EXPANSION_LIMIT;
                expands_to(&aliases, &alias.ty, &alias.name, &mut budget)
                    .then(|| SchemaError::CyclicAlias { name: alias.name.clone() })
            }
            _ => None,
        })
        .collect()
}

fn expands_to(
    aliases: &HashMap<&str, &AliasDef>,
    ty: &TypeRef,
    target: &str,
    budget: &mut usize,
) -> bool {
    let (name, args) = match ty {
        TypeRef::Nullable(inner) => return expands_to(aliases, inner, target, budget),
        TypeRef::Named(name) => (name, &[][..]),
        TypeRef::Generic { name, args } => (name, args.as_slice()),
        _ => return false,
    };
    let Some(alias) = aliases.get(name.as_str()) else {
        return false;
    };
    if name == target || *budget == 0 {
        return true;
    }
    *budget -= 1;
    expands_to(aliases, &alias.ty.substitute(&alias.params, args), target, budget)
}
