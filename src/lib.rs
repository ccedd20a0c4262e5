//! TypeScript type declarations and runtime type guards from a schema IR.
//!
//! `load` reads the JSON form of a [`Schema`], `resolve` checks every
//! reference once and yields a [`ResolvedSchema`], and from there `emit`
//! produces declaration and guard text while [`Guards`] runs the same
//! guards in-process over `serde_json::Value`.
pub mod cli;
pub mod decl;
pub mod emit;
pub mod error;
pub mod guard;
pub mod ir;
pub mod load;
pub mod options;
pub mod resolve;

pub use emit::{generate, Artifacts, Block, Origin};
pub use error::{LoadError, OptionsError, SchemaError, SchemaErrors, Site, UseError};
pub use guard::{Guards, Validator};
pub use ir::{
    AliasDef, EnumDef, FieldDef, Primitive, Schema, StructDef, TypeDef, TypeRef, UnionDef, VariantDef,
};
pub use options::{EmitOptions, ShapePolicy};
pub use resolve::{resolve, ResolvedSchema};
