//! TypeScript declarations, one `export type` block per schema type.
use tracing::{debug, instrument};

use crate::emit::{Block, Origin};
use crate::ir::{
    AliasDef, EnumDef, FieldDef, Primitive, StructDef, TypeDef, TypeRef, UnionDef, PAYLOAD_FIELD,
    TAG_FIELD,
};
use crate::options::EmitOptions;
use crate::resolve::{is_plain_key, ResolvedSchema};

#[instrument(skip_all, fields(types = schema.len()))]
pub fn emit_declarations(schema: &ResolvedSchema, options: &EmitOptions) -> Vec<Block> {
    let mut cg = DeclEmitter::new(options);
    for def in schema.iter() {
        cg.emit(def);
    }
    cg.into_blocks()
}

pub struct DeclEmitter<'a> {
    options: &'a EmitOptions,
    blocks: Vec<Block>,
}

impl<'a> DeclEmitter<'a> {
    pub fn new(options: &'a EmitOptions) -> Self {
        DeclEmitter { options, blocks: Vec::new() }
    }

    pub fn emit(&mut self, def: &TypeDef) {
        let text = match def {
            TypeDef::Struct(s) => self.struct_decl(s),
            TypeDef::Union(u) => self.union_decl(u),
            TypeDef::Enum(e) => self.enum_decl(e),
            TypeDef::Alias(a) => self.alias_decl(a),
        };
        debug!(ty = def.name(), "declaration emitted");
        self.blocks.push(Block::new(Origin::Type(def.name().to_string()), text));
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    fn struct_decl(&self, def: &StructDef) -> String {
        let mut out = self.head(&def.name, &def.params);
        if def.fields.is_empty() {
            out.push_str(" = {};");
            return out;
        }
        out.push_str(" = {\n");
        for field in &def.fields {
            out.push_str(&format!("  {};\n", ts_field(field)));
        }
        out.push_str("};");
        out
    }

    fn union_decl(&self, def: &UnionDef) -> String {
        let mut out = self.head(&def.name, &[]);
        out.push_str(" =");
        if def.variants.is_empty() {
            out.push_str(" never;");
            return out;
        }
        for variant in &def.variants {
            out.push_str(&format!(
                "\n  | {{ {TAG_FIELD}: {}; {PAYLOAD_FIELD}: {} }}",
                string_literal(&variant.tag),
                inline_object(&variant.fields),
            ));
        }
        out.push(';');
        out
    }

    fn enum_decl(&self, def: &EnumDef) -> String {
        let members = def.members.iter().map(|m| string_literal(m)).collect::<Vec<_>>();
        let body = if members.is_empty() { "never".to_string() } else { members.join(" | ") };
        format!("{} = {body};", self.head(&def.name, &[]))
    }

    fn alias_decl(&self, def: &AliasDef) -> String {
        format!("{} = {};", self.head(&def.name, &def.params), ts_type(&def.ty))
    }

    /// `export type Name<A, B>`
    fn head(&self, name: &str, params: &[String]) -> String {
        let mut out = format!("{}type {name}", self.options.export_kw());
        if !params.is_empty() {
            out.push_str(&format!("<{}>", params.join(", ")));
        }
        out
    }
}

/// TypeScript spelling of a type reference.
pub fn ts_type(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Primitive(Primitive::Bytes) => "number[]".to_string(),
        TypeRef::Primitive(p) => p.as_str().to_string(),
        TypeRef::Named(name) | TypeRef::Parameter(name) => name.clone(),
        TypeRef::Generic { name, args } if args.is_empty() => name.clone(),
        TypeRef::Generic { name, args } => {
            let args = args.iter().map(ts_type).collect::<Vec<_>>();
            format!("{name}<{}>", args.join(", "))
        }
        TypeRef::Sequence(inner) => match inner.as_ref() {
            TypeRef::Nullable(_) => format!("({})[]", ts_type(inner)),
            _ => format!("{}[]", ts_type(inner)),
        },
        TypeRef::Map(inner) => format!("{{ [key: string]: {} }}", ts_type(inner)),
        TypeRef::Tuple(elems) => {
            let elems = elems.iter().map(ts_type).collect::<Vec<_>>();
            format!("[{}]", elems.join(", "))
        }
        TypeRef::Nullable(inner) => format!("{} | null", ts_type(inner)),
    }
}

/// Object key, quoted unless it is a plain identifier.
pub(crate) fn prop_key(name: &str) -> String {
    if is_plain_key(name) { name.to_string() } else { string_literal(name) }
}

pub(crate) fn string_literal(s: &str) -> String {
    // JSON string syntax is valid TS string syntax.
    serde_json::Value::from(s).to_string()
}

fn ts_field(field: &FieldDef) -> String {
    let opt = if field.required { "" } else { "?" };
    format!("{}{opt}: {}", prop_key(&field.name), ts_type(&field.ty))
}

fn inline_object(fields: &[FieldDef]) -> String {
    if fields.is_empty() {
        return "{}".to_string();
    }
    let fields = fields.iter().map(ts_field).collect::<Vec<_>>();
    format!("{{ {} }}", fields.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Schema, VariantDef};
    use crate::resolve::resolve;
    use pretty_assertions::assert_eq;

    fn texts(schema: Schema, options: &EmitOptions) -> Vec<String> {
        let resolved = resolve(schema).unwrap();
        emit_declarations(&resolved, options).into_iter().map(|b| b.text).collect()
    }

    #[test]
    fn struct_with_optional_field() {
        let schema = Schema::new().with(StructDef {
            name: "Point".into(),
            params: vec![],
            fields: vec![
                FieldDef::required("X", TypeRef::number()),
                FieldDef::required("Y", TypeRef::number()),
                FieldDef::optional("label", TypeRef::string()),
            ],
        });
        assert_eq!(texts(schema, &EmitOptions::default()), vec![
            "export type Point = {\n  X: number;\n  Y: number;\n  label?: string;\n};".to_string(),
        ]);
    }

    #[test]
    fn generic_struct_references_its_parameters() {
        let schema = Schema::new().with(StructDef {
            name: "Pair".into(),
            params: vec!["A".into(), "B".into()],
            fields: vec![
                FieldDef::required("first", TypeRef::param("A")),
                FieldDef::required("rest", TypeRef::seq(TypeRef::param("B"))),
            ],
        });
        assert_eq!(texts(schema, &EmitOptions::default()), vec![
            "export type Pair<A, B> = {\n  first: A;\n  rest: B[];\n};".to_string(),
        ]);
    }

    #[test]
    fn union_carries_tag_and_nested_fields() {
        let schema = Schema::new().with(UnionDef {
            name: "Shape".into(),
            variants: vec![
                VariantDef { tag: "Circle".into(), fields: vec![FieldDef::required("radius", TypeRef::number())] },
                VariantDef { tag: "Empty".into(), fields: vec![] },
            ],
        });
        let options = EmitOptions { export: false, ..EmitOptions::default() };
        assert_eq!(texts(schema, &options), vec![
            "type Shape =\n  | { tag: \"Circle\"; fields: { radius: number } }\n  | { tag: \"Empty\"; fields: {} };".to_string(),
        ]);
    }

    #[test]
    fn empty_union_is_never() {
        let schema = Schema::new().with(UnionDef { name: "Nothing".into(), variants: vec![] });
        assert_eq!(texts(schema, &EmitOptions::default()), vec!["export type Nothing = never;".to_string()]);
    }

    #[test]
    fn enums_are_string_literal_unions() {
        let schema = Schema::new()
            .with(EnumDef { name: "Color".into(), members: vec!["Red".into(), "dark \"green\"".into()] })
            .with(EnumDef { name: "Void".into(), members: vec![] });
        assert_eq!(texts(schema, &EmitOptions::default()), vec![
            "export type Color = \"Red\" | \"dark \\\"green\\\"\";".to_string(),
            "export type Void = never;".to_string(),
        ]);
    }

    #[test]
    fn aliases_name_a_type_reference() {
        let schema = Schema::new()
            .with(AliasDef { name: "Meters".into(), params: vec![], ty: TypeRef::number() })
            .with(AliasDef {
                name: "Maybe".into(),
                params: vec!["T".into()],
                ty: TypeRef::nullable(TypeRef::param("T")),
            });
        assert_eq!(texts(schema, &EmitOptions::default()), vec![
            "export type Meters = number;".to_string(),
            "export type Maybe<T> = T | null;".to_string(),
        ]);
    }

    #[test]
    fn type_spellings() {
        assert_eq!(ts_type(&TypeRef::bytes()), "number[]");
        assert_eq!(ts_type(&TypeRef::seq(TypeRef::nullable(TypeRef::string()))), "(string | null)[]");
        assert_eq!(ts_type(&TypeRef::map(TypeRef::number())), "{ [key: string]: number }");
        assert_eq!(
            ts_type(&TypeRef::Tuple(vec![TypeRef::boolean(), TypeRef::generic("Value", vec![TypeRef::number()])])),
            "[boolean, Value<number>]",
        );
    }

    #[test]
    fn odd_field_names_are_quoted() {
        assert_eq!(prop_key("plain"), "plain");
        assert_eq!(prop_key("content-type"), "\"content-type\"");
        assert_eq!(prop_key("class"), "class");
    }
}
