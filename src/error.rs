//! Error types of the generation pipeline.
//!
//! Resolution errors are collected, never fail-fast: one run reports every
//! problem in the schema. Guards themselves have no error type; a failed
//! validation is a plain `false`.
use std::fmt;
use std::path::PathBuf;

/// Where in the schema a reference occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub ty: String,
    pub variant: Option<String>,
    pub field: Option<String>,
}

impl Site {
    pub fn ty(ty: &str) -> Self {
        Site { ty: ty.to_string(), variant: None, field: None }
    }

    pub fn in_variant(&self, tag: &str) -> Self {
        Site { variant: Some(tag.to_string()), ..self.clone() }
    }

    pub fn at_field(&self, field: &str) -> Self {
        Site { field: Some(field.to_string()), ..self.clone() }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}", self.ty)?;
        if let Some(tag) = &self.variant {
            write!(f, "::{tag}")?;
        }
        if let Some(field) = &self.field {
            write!(f, ".{field}")?;
        }
        f.write_str("`")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate type `{name}`")]
    DuplicateType { name: String },

    #[error("{site} refers to undefined type `{target}`")]
    UnresolvedReference { site: Site, target: String },

    #[error("{site}: `{target}` takes {expected} type argument(s), {found} supplied")]
    ArityMismatch { site: Site, target: String, expected: usize, found: usize },

    #[error("{site} uses parameter `{param}` outside the generic type that declares it")]
    UnboundParameter { site: Site, param: String },

    #[error("{site} uses parameter `{param}` as a type; parameters have no runtime representation")]
    InvalidParameterUse { site: Site, param: String },

    #[error("duplicate tag `{tag}` in union `{union}`")]
    DuplicateTag { union: String, tag: String },

    #[error("duplicate field `{field}` in {owner}")]
    DuplicateField { owner: Site, field: String },

    #[error("duplicate member `{member}` in enum `{ty}`")]
    DuplicateMember { ty: String, member: String },

    #[error("alias `{name}` expands to itself without passing through a struct, union or container")]
    CyclicAlias { name: String },

    #[error("duplicate parameter `{param}` on `{ty}`")]
    DuplicateParameter { ty: String, param: String },

    #[error("`{name}` is not a usable {what} name")]
    InvalidIdentifier { name: String, what: &'static str },
}

/// Every error found in one resolution pass, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaErrors(pub Vec<SchemaError>);

impl SchemaErrors {
    pub fn iter(&self) -> impl Iterator<Item = &SchemaError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema has {} error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("{origin}: at JSON path {json_path} → {message}")]
    Parse { origin: String, json_path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    #[error("guard prefix `{0}` is not a valid identifier prefix")]
    InvalidPrefix(String),

    #[error("guard prefix `{prefix}` can produce names that clash with the generated local `{local}`")]
    ShadowedPrefix { prefix: String, local: &'static str },
}

/// Failures of the in-process guard lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UseError {
    #[error("no type named `{0}`")]
    UnknownType(String),

    #[error("`{0}` is generic; instantiate it through its factory")]
    Generic(String),

    #[error("`{0}` is monomorphic and has no factory")]
    NotGeneric(String),

    #[error("`{name}` takes {expected} checker(s), {found} supplied")]
    CheckerCount { name: String, expected: usize, found: usize },

    #[error(transparent)]
    Schema(#[from] SchemaErrors),
}
