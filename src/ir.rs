// Schema IR: named structs, generic structs, tagged unions, string-literal
// enums and aliases.
// No serde_json::Value here; values only show up in `guard::runtime`.

use std::fmt;
use serde::{Deserialize, Serialize};

/// Discriminant key every union value carries.
pub const TAG_FIELD: &str = "tag";
/// Key the variant payload is nested under.
pub const PAYLOAD_FIELD: &str = "fields";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Boolean,
    Number,
    String,
    Bytes,                   // sequence of integers in 0..=255
}

impl Primitive {
    pub const ALL: [Primitive; 4] = [
        Primitive::Boolean,
        Primitive::Number,
        Primitive::String,
        Primitive::Bytes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::Boolean => "boolean",
            Primitive::Number => "number",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Primitive(Primitive),
    Named(String),
    Generic { name: String, args: Vec<TypeRef> },
    Sequence(Box<TypeRef>),
    Parameter(String),       // only valid inside the declaring struct or alias
    Map(Box<TypeRef>),       // string keys
    Tuple(Vec<TypeRef>),     // exact arity
    Nullable(Box<TypeRef>),  // value or explicit null
}

impl TypeRef {
    pub fn boolean() -> Self { TypeRef::Primitive(Primitive::Boolean) }
    pub fn number() -> Self { TypeRef::Primitive(Primitive::Number) }
    pub fn string() -> Self { TypeRef::Primitive(Primitive::String) }
    pub fn bytes() -> Self { TypeRef::Primitive(Primitive::Bytes) }

    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn generic(name: impl Into<String>, args: Vec<TypeRef>) -> Self {
        TypeRef::Generic { name: name.into(), args }
    }

    pub fn seq(elem: TypeRef) -> Self {
        TypeRef::Sequence(Box::new(elem))
    }

    pub fn param(name: impl Into<String>) -> Self {
        TypeRef::Parameter(name.into())
    }

    pub fn map(value: TypeRef) -> Self {
        TypeRef::Map(Box::new(value))
    }

    pub fn nullable(inner: TypeRef) -> Self {
        TypeRef::Nullable(Box::new(inner))
    }

    /// True if a `Parameter` occurs anywhere in this reference.
    pub fn mentions_param(&self) -> bool {
        match self {
            TypeRef::Parameter(_) => true,
            TypeRef::Primitive(_) | TypeRef::Named(_) => false,
            TypeRef::Generic { args, .. } | TypeRef::Tuple(args) => {
                args.iter().any(TypeRef::mentions_param)
            }
            TypeRef::Sequence(inner) | TypeRef::Map(inner) | TypeRef::Nullable(inner) => {
                inner.mentions_param()
            }
        }
    }

    /// Replace each of `params` with the argument at the same position.
    /// Parameters without an argument are left alone.
    pub fn substitute(&self, params: &[String], args: &[TypeRef]) -> TypeRef {
        let each = |xs: &[TypeRef]| -> Vec<TypeRef> {
            xs.iter().map(|x| x.substitute(params, args)).collect()
        };
        match self {
            TypeRef::Parameter(p) => params
                .iter()
                .position(|q| q == p)
                .and_then(|i| args.get(i))
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeRef::Primitive(_) | TypeRef::Named(_) => self.clone(),
            TypeRef::Generic { name, args: inner } => TypeRef::generic(name.clone(), each(inner)),
            TypeRef::Tuple(elems) => TypeRef::Tuple(each(elems)),
            TypeRef::Sequence(inner) => TypeRef::seq(inner.substitute(params, args)),
            TypeRef::Map(inner) => TypeRef::map(inner.substitute(params, args)),
            TypeRef::Nullable(inner) => TypeRef::nullable(inner.substitute(params, args)),
        }
    }
}

/// Neutral notation for diagnostics and readable binding names. Not
/// injective: a user type called `Nullable` prints like the built-in.
impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, xs: &[TypeRef]) -> fmt::Result {
            for (i, x) in xs.iter().enumerate() {
                if i > 0 { f.write_str(", ")?; }
                write!(f, "{x}")?;
            }
            Ok(())
        }
        match self {
            TypeRef::Primitive(p) => f.write_str(p.as_str()),
            TypeRef::Named(name) | TypeRef::Parameter(name) => f.write_str(name),
            TypeRef::Generic { name, args } => {
                write!(f, "{name}<")?;
                list(f, args)?;
                f.write_str(">")
            }
            TypeRef::Sequence(inner) => write!(f, "Sequence<{inner}>"),
            TypeRef::Map(inner) => write!(f, "Map<{inner}>"),
            TypeRef::Tuple(elems) => {
                f.write_str("(")?;
                list(f, elems)?;
                f.write_str(")")
            }
            TypeRef::Nullable(inner) => write!(f, "Nullable<{inner}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    #[serde(default = "required_by_default")]
    pub required: bool,
}

fn required_by_default() -> bool { true }

impl FieldDef {
    pub fn required(name: impl Into<String>, ty: TypeRef) -> Self {
        FieldDef { name: name.into(), ty, required: true }
    }

    pub fn optional(name: impl Into<String>, ty: TypeRef) -> Self {
        FieldDef { name: name.into(), ty, required: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,         // empty when monomorphic
    #[serde(default)]
    pub fields: Vec<FieldDef>,       // declared order is emission order
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDef {
    pub tag: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,       // nested under `PAYLOAD_FIELD`
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionDef {
    pub name: String,
    #[serde(default)]
    pub variants: Vec<VariantDef>,
}

impl UnionDef {
    pub fn discriminant(&self) -> &'static str { TAG_FIELD }

    pub fn variant(&self, tag: &str) -> Option<&VariantDef> {
        self.variants.iter().find(|v| v.tag == tag)
    }
}

/// Closed set of string literals, e.g. `"Red" | "Green"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl EnumDef {
    pub fn contains(&self, member: &str) -> bool {
        self.members.iter().any(|m| m == member)
    }
}

/// Another name for a type reference: `type Meters = number`,
/// `type Wrapper<T> = T`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    pub ty: TypeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDef {
    Struct(StructDef),
    Union(UnionDef),
    Enum(EnumDef),
    Alias(AliasDef),
}

impl TypeDef {
    pub fn name(&self) -> &str {
        match self {
            TypeDef::Struct(s) => &s.name,
            TypeDef::Union(u) => &u.name,
            TypeDef::Enum(e) => &e.name,
            TypeDef::Alias(a) => &a.name,
        }
    }

    /// Declared generic parameters; unions and enums are always monomorphic.
    pub fn params(&self) -> &[String] {
        match self {
            TypeDef::Struct(s) => &s.params,
            TypeDef::Alias(a) => &a.params,
            TypeDef::Union(_) | TypeDef::Enum(_) => &[],
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.params().is_empty()
    }
}

impl From<StructDef> for TypeDef {
    fn from(def: StructDef) -> Self { TypeDef::Struct(def) }
}

impl From<UnionDef> for TypeDef {
    fn from(def: UnionDef) -> Self { TypeDef::Union(def) }
}

impl From<EnumDef> for TypeDef {
    fn from(def: EnumDef) -> Self { TypeDef::Enum(def) }
}

impl From<AliasDef> for TypeDef {
    fn from(def: AliasDef) -> Self { TypeDef::Alias(def) }
}

/// Definitions in insertion order. Duplicates are representable here so the
/// resolver can report them; `resolve::ResolvedSchema` is the keyed form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub types: Vec<TypeDef>,
}

impl Schema {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, def: impl Into<TypeDef>) -> Self {
        self.types.push(def.into());
        self
    }

    pub fn push(&mut self, def: impl Into<TypeDef>) {
        self.types.push(def.into());
    }

    /// Append every definition of `other`, keeping its order.
    pub fn extend(&mut self, other: Schema) {
        self.types.extend(other.types);
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.iter()
    }

    pub fn len(&self) -> usize { self.types.len() }

    pub fn is_empty(&self) -> bool { self.types.is_empty() }
}
