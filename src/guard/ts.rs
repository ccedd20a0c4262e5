//! TypeScript guard emission.
//!
//! Output layout, in order:
//! 1. prelude: `isa_record` and the primitive checkers
//! 2. one block per schema type: `isa_T` for monomorphic types,
//!    `make_isa_T` for generic structs and aliases
//! 3. module-level instantiations of generic factories with concrete
//!    arguments, dependency-first
//!
//! Guards are `function` declarations, so they are hoisted and may refer to
//! each other in any order. Instantiations that depend on a factory's own
//! parameters live inside that factory and are created lazily on first use,
//! which keeps recursive generic types from recursing at construction time.
use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, instrument};

use super::instantiate::{supply, Checkers, Instantiation, Scope};
use crate::decl::{string_literal, ts_type};
use crate::emit::{Block, Origin};
use crate::ir::{EnumDef, FieldDef, Primitive, TypeDef, TypeRef, UnionDef, PAYLOAD_FIELD, TAG_FIELD};
use crate::options::{EmitOptions, ShapePolicy};
use crate::resolve::ResolvedSchema;

// Local name of the closure a factory returns.
const SELF_GUARD: &str = "guard";

#[instrument(skip_all, fields(types = schema.len()))]
pub fn emit_guards(schema: &ResolvedSchema, options: &EmitOptions) -> Vec<Block> {
    let mut cg = GuardEmitter::new(schema, options);
    for def in schema.iter() {
        cg.emit(def);
    }
    cg.into_blocks()
}

#[derive(Debug)]
struct Binding {
    name: String,
    ty: String,      // TS type of the instantiated guard's subject
    init: String,
}

pub struct GuardEmitter<'s> {
    schema: &'s ResolvedSchema,
    options: &'s EmitOptions,
    blocks: Vec<Block>,
    module: IndexMap<TypeRef, Binding>,          // keyed by use site
    local: Option<IndexMap<TypeRef, Binding>>,   // while emitting a factory
    taken: HashSet<String>,
    fresh: usize,
}

impl<'s> GuardEmitter<'s> {
    pub fn new(schema: &'s ResolvedSchema, options: &'s EmitOptions) -> Self {
        let mut taken: HashSet<String> = schema
            .iter()
            .flat_map(|def| [options.guard_name(def.name()), options.factory_name(def.name())])
            .collect();
        taken.insert(options.guard_name("record"));
        for p in Primitive::ALL {
            taken.insert(options.guard_name(p.as_str()));
        }
        GuardEmitter {
            schema,
            options,
            blocks: vec![Block::new(Origin::Prelude, prelude(options))],
            module: IndexMap::new(),
            local: None,
            taken,
            fresh: 0,
        }
    }

    pub fn emit(&mut self, def: &TypeDef) {
        self.fresh = 0;
        let text = if def.is_generic() { self.factory(def) } else { self.guard_fn(def) };
        debug!(ty = def.name(), generic = def.is_generic(), "guard emitted");
        self.blocks.push(Block::new(Origin::Type(def.name().to_string()), text));
    }

    pub fn into_blocks(mut self) -> Vec<Block> {
        if !self.module.is_empty() {
            let lines = self
                .module
                .values()
                .map(|b| format!("const {} = {};", b.name, b.init))
                .collect::<Vec<_>>();
            self.blocks.push(Block::new(Origin::Instantiations, lines.join("\n")));
        }
        self.blocks
    }

    fn guard_fn(&mut self, def: &TypeDef) -> String {
        let body = self.body(def);
        format!(
            "{}function {}(obj: unknown): obj is {} {{\n{}}}",
            self.options.export_kw(),
            self.options.guard_name(def.name()),
            def.name(),
            indent(&body, 1),
        )
    }

    fn factory(&mut self, def: &TypeDef) -> String {
        let params = def.params();
        let subject = format!("{}<{}>", def.name(), params.join(", "));
        let checkers = params
            .iter()
            .map(|p| format!("{}: (v: unknown) => v is {p}", param_checker(p)))
            .collect::<Vec<_>>();

        self.local = Some(IndexMap::new());
        let body = self.body(def);
        let locals = self.local.take().unwrap_or_default();

        let mut inner = String::new();
        for b in locals.values() {
            inner.push_str(&format!("let {}: ((v: unknown) => v is {}) | undefined;\n", b.name, b.ty));
        }
        inner.push_str(&format!("const {SELF_GUARD} = (obj: unknown): obj is {subject} => {{\n"));
        inner.push_str(&indent(&body, 1));
        inner.push_str("};\n");
        inner.push_str(&format!("return {SELF_GUARD};\n"));

        format!(
            "{}function {}<{}>({}): (obj: unknown) => obj is {subject} {{\n{}}}",
            self.options.export_kw(),
            self.options.factory_name(def.name()),
            params.join(", "),
            checkers.join(", "),
            indent(&inner, 1),
        )
    }

    /// Statements deciding whether `obj` is a `def`; every path returns.
    fn body(&mut self, def: &TypeDef) -> String {
        let scope = Scope::of(def);
        match def {
            TypeDef::Struct(s) => self.object_body("obj", &s.fields, scope),
            TypeDef::Union(u) => self.union_body(u, scope),
            TypeDef::Enum(e) => enum_body(e),
            TypeDef::Alias(a) => format!("return {};\n", self.check_expr(&a.ty, "obj", scope)),
        }
    }

    fn union_body(&mut self, u: &UnionDef, scope: Scope<'_>) -> String {
        let mut body = String::from("if (!") + &self.record_guard() + "(obj)) return false;\n";
        if self.options.shape == ShapePolicy::Closed {
            body.push_str(&closed_keys("obj", &[TAG_FIELD, PAYLOAD_FIELD]));
        }
        body.push_str(&format!("const {PAYLOAD_FIELD} = obj[{}];\n", string_literal(PAYLOAD_FIELD)));
        body.push_str(&format!("switch (obj[{}]) {{\n", string_literal(TAG_FIELD)));
        for variant in &u.variants {
            let payload = self.object_body(PAYLOAD_FIELD, &variant.fields, scope);
            body.push_str(&format!("  case {}: {{\n", string_literal(&variant.tag)));
            body.push_str(&indent(&payload, 2));
            body.push_str("  }\n");
        }
        body.push_str("  default:\n    return false;\n}\n");
        body
    }

    /// Statements checking that `var` is an object carrying `fields`; ends in
    /// `return true;`.
    fn object_body(&mut self, var: &str, fields: &[FieldDef], scope: Scope<'_>) -> String {
        let mut out = format!("if (!{}({var})) return false;\n", self.record_guard());
        if self.options.shape == ShapePolicy::Closed {
            let names = fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
            out.push_str(&closed_keys(var, &names));
        }
        // Presence is an own-property test; `obj["constructor"]` and friends
        // are found on the prototype of every object.
        for field in fields {
            let key = string_literal(&field.name);
            let access = format!("{var}[{key}]");
            let own = format!("Object.prototype.hasOwnProperty.call({var}, {key})");
            let check = self.check_expr(&field.ty, &access, scope);
            if field.required {
                out.push_str(&format!("if (!{own} || !({check})) return false;\n"));
            } else {
                out.push_str(&format!("if ({own} && !({check})) return false;\n"));
            }
        }
        out.push_str("return true;\n");
        out
    }

    /// Boolean expression: `var` holds a value of `ty`.
    fn check_expr(&mut self, ty: &TypeRef, var: &str, scope: Scope<'_>) -> String {
        match ty {
            TypeRef::Primitive(Primitive::Bytes) => format!("{}({var})", self.primitive(Primitive::Bytes)),
            TypeRef::Primitive(p) => format!("typeof {var} === \"{}\"", p.as_str()),
            TypeRef::Named(_) | TypeRef::Generic { .. } | TypeRef::Parameter(_) => {
                let schema = self.schema;
                let checker = supply(schema, ty, scope, self);
                format!("{checker}({var})")
            }
            TypeRef::Sequence(inner) => {
                let x = self.fresh_var();
                let check = self.check_expr(inner, &x, scope);
                format!("Array.isArray({var}) && {var}.every(({x}: unknown) => {check})")
            }
            TypeRef::Map(inner) => {
                let x = self.fresh_var();
                let check = self.check_expr(inner, &x, scope);
                format!(
                    "{}({var}) && Object.values({var}).every(({x}: unknown) => {check})",
                    self.record_guard(),
                )
            }
            TypeRef::Tuple(elems) => {
                let mut out = format!("Array.isArray({var}) && {var}.length === {}", elems.len());
                for (i, elem) in elems.iter().enumerate() {
                    let check = self.check_expr(elem, &format!("{var}[{i}]"), scope);
                    out.push_str(&format!(" && {check}"));
                }
                out
            }
            TypeRef::Nullable(inner) => {
                let check = self.check_expr(inner, var, scope);
                format!("({var} === null || {check})")
            }
        }
    }

    fn record_guard(&self) -> String {
        self.options.guard_name("record")
    }

    fn fresh_var(&mut self) -> String {
        self.fresh += 1;
        format!("x{}", self.fresh)
    }

    fn binding_name(&mut self, key: &str) -> String {
        let mut base = String::new();
        for c in key.chars() {
            let c = if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' };
            if !(c == '_' && base.ends_with('_')) {
                base.push(c);
            }
        }
        let base = self.options.guard_name(base.trim_end_matches('_'));
        let mut name = base.clone();
        let mut n = 1;
        while self.taken.contains(&name) {
            n += 1;
            name = format!("{base}_{n}");
        }
        self.taken.insert(name.clone());
        name
    }
}

impl Checkers for GuardEmitter<'_> {
    type Checker = String;

    fn primitive(&mut self, primitive: Primitive) -> String {
        self.options.guard_name(primitive.as_str())
    }

    fn guard(&mut self, def: &TypeDef) -> String {
        self.options.guard_name(def.name())
    }

    fn param(&mut self, _index: usize, name: &str) -> String {
        param_checker(name)
    }

    fn apply(&mut self, inst: Instantiation<'_, '_>, args: Vec<String>) -> String {
        if inst.recursive {
            return SELF_GUARD.to_string();
        }
        let key = inst.use_site.clone();
        let init = format!("{}({})", self.options.factory_name(inst.def.name()), args.join(", "));
        let ty = ts_type(inst.use_site);
        let lazy = !inst.concrete && self.local.is_some();

        let existing = if lazy {
            self.local.as_ref().and_then(|l| l.get(&key))
        } else {
            self.module.get(&key)
        };
        let name = match existing {
            Some(binding) => binding.name.clone(),
            None => {
                let name = self.binding_name(&inst.use_site.to_string());
                let binding = Binding { name: name.clone(), ty, init: init.clone() };
                match self.local.as_mut() {
                    Some(local) if lazy => { local.insert(key, binding); }
                    _ => { self.module.insert(key, binding); }
                }
                name
            }
        };
        if lazy { format!("({name} ??= {init})") } else { name }
    }

    fn structural(&mut self, ty: &TypeRef, scope: Scope<'_>) -> String {
        let x = self.fresh_var();
        let check = self.check_expr(ty, &x, scope);
        format!("(({x}: unknown): {x} is {} => {check})", ts_type(ty))
    }

    fn never(&mut self) -> String {
        "((_: unknown): boolean => false)".to_string()
    }
}

fn enum_body(e: &EnumDef) -> String {
    if e.members.is_empty() {
        return "return false;\n".to_string();
    }
    let alts = e
        .members
        .iter()
        .map(|m| format!("obj === {}", string_literal(m)))
        .collect::<Vec<_>>();
    format!("return {};\n", alts.join(" || "))
}

fn param_checker(param: &str) -> String {
    format!("check_{param}")
}

fn closed_keys(var: &str, allowed: &[&str]) -> String {
    if allowed.is_empty() {
        return format!("if (Object.keys({var}).length !== 0) return false;\n");
    }
    let alts = allowed
        .iter()
        .map(|name| format!("k === {}", string_literal(name)))
        .collect::<Vec<_>>();
    format!("if (!Object.keys({var}).every((k) => {})) return false;\n", alts.join(" || "))
}

fn indent(text: &str, levels: usize) -> String {
    let pad = "  ".repeat(levels);
    text.lines()
        .map(|line| if line.is_empty() { "\n".to_string() } else { format!("{pad}{line}\n") })
        .collect()
}

fn prelude(options: &EmitOptions) -> String {
    let export = options.export_kw();
    let record = options.guard_name("record");
    let mut out = format!(
        "{export}function {record}(v: unknown): v is Record<string, unknown> {{\n  \
         return typeof v === \"object\" && v !== null && !Array.isArray(v);\n}}\n"
    );
    for p in [Primitive::Boolean, Primitive::Number, Primitive::String] {
        out.push_str(&format!(
            "{export}function {}(v: unknown): v is {} {{\n  return typeof v === \"{}\";\n}}\n",
            options.guard_name(p.as_str()),
            p.as_str(),
            p.as_str(),
        ));
    }
    out.push_str(&format!(
        "{export}function {}(v: unknown): v is number[] {{\n  \
         return Array.isArray(v) && v.every((b) => Number.isInteger(b) && b >= 0 && b <= 255);\n}}",
        options.guard_name(Primitive::Bytes.as_str()),
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AliasDef, EnumDef, Schema, StructDef, VariantDef};
    use crate::resolve::resolve;
    use pretty_assertions::assert_eq;

    fn guards(schema: Schema, options: &EmitOptions) -> Vec<Block> {
        emit_guards(&resolve(schema).unwrap(), options)
    }

    fn text_of<'a>(blocks: &'a [Block], ty: &str) -> &'a str {
        blocks
            .iter()
            .find(|b| b.origin == Origin::Type(ty.to_string()))
            .map(|b| b.text.as_str())
            .unwrap()
    }

    fn point() -> StructDef {
        StructDef {
            name: "Point".into(),
            params: vec![],
            fields: vec![
                FieldDef::required("X", TypeRef::number()),
                FieldDef::required("Y", TypeRef::number()),
                FieldDef::optional("z", TypeRef::number()),
            ],
        }
    }

    fn value() -> StructDef {
        StructDef {
            name: "Value".into(),
            params: vec!["T".into()],
            fields: vec![FieldDef::required("value", TypeRef::param("T"))],
        }
    }

    #[test]
    fn monomorphic_struct_guard() {
        let blocks = guards(Schema::new().with(point()), &EmitOptions::default());
        assert_eq!(text_of(&blocks, "Point"), "\
export function isa_Point(obj: unknown): obj is Point {
  if (!isa_record(obj)) return false;
  if (!Object.prototype.hasOwnProperty.call(obj, \"X\") || !(typeof obj[\"X\"] === \"number\")) return false;
  if (!Object.prototype.hasOwnProperty.call(obj, \"Y\") || !(typeof obj[\"Y\"] === \"number\")) return false;
  if (Object.prototype.hasOwnProperty.call(obj, \"z\") && !(typeof obj[\"z\"] === \"number\")) return false;
  return true;
}");
        assert_eq!(blocks.first().map(|b| &b.origin), Some(&Origin::Prelude));
    }

    #[test]
    fn generic_guard_takes_checkers_never_type_tokens() {
        let blocks = guards(Schema::new().with(value()), &EmitOptions::default());
        assert_eq!(text_of(&blocks, "Value"), "\
export function make_isa_Value<T>(check_T: (v: unknown) => v is T): (obj: unknown) => obj is Value<T> {
  const guard = (obj: unknown): obj is Value<T> => {
    if (!isa_record(obj)) return false;
    if (!Object.prototype.hasOwnProperty.call(obj, \"value\") || !(check_T(obj[\"value\"]))) return false;
    return true;
  };
  return guard;
}");
        assert!(blocks.iter().all(|b| !b.text.contains("typeof T")));
    }

    #[test]
    fn concrete_instantiations_are_hoisted_once() {
        let holder = StructDef {
            name: "Holder".into(),
            params: vec![],
            fields: vec![
                FieldDef::required("a", TypeRef::generic("Value", vec![TypeRef::number()])),
                FieldDef::required("b", TypeRef::generic("Value", vec![TypeRef::number()])),
                FieldDef::required(
                    "c",
                    TypeRef::generic("Value", vec![TypeRef::generic("Value", vec![TypeRef::named("Point")])]),
                ),
            ],
        };
        let blocks = guards(Schema::new().with(point()).with(value()).with(holder), &EmitOptions::default());
        let last = blocks.last().unwrap();
        assert_eq!(last.origin, Origin::Instantiations);
        assert_eq!(last.text, "\
const isa_Value_number = make_isa_Value(isa_number);
const isa_Value_Point = make_isa_Value(isa_Point);
const isa_Value_Value_Point = make_isa_Value(isa_Value_Point);");
        assert!(text_of(&blocks, "Holder").contains("!(isa_Value_number(obj[\"b\"]))"));
    }

    #[test]
    fn recursive_generic_reuses_its_own_guard_and_lazily_binds_others() {
        let tree = StructDef {
            name: "Tree".into(),
            params: vec!["T".into()],
            fields: vec![
                FieldDef::required("item", TypeRef::generic("Value", vec![TypeRef::param("T")])),
                FieldDef::required("children", TypeRef::seq(TypeRef::generic("Tree", vec![TypeRef::param("T")]))),
            ],
        };
        let blocks = guards(Schema::new().with(value()).with(tree), &EmitOptions::default());
        let text = text_of(&blocks, "Tree");
        assert!(text.contains("let isa_Value_T: ((v: unknown) => v is Value<T>) | undefined;"));
        assert!(text.contains("(isa_Value_T ??= make_isa_Value(check_T))(obj[\"item\"])"));
        assert!(text.contains("obj[\"children\"].every((x1: unknown) => guard(x1))"));
        assert!(!blocks.iter().any(|b| b.origin == Origin::Instantiations));
    }

    #[test]
    fn union_switches_over_known_tags() {
        let shape = UnionDef {
            name: "Shape".into(),
            variants: vec![
                VariantDef { tag: "Circle".into(), fields: vec![FieldDef::required("radius", TypeRef::number())] },
                VariantDef { tag: "Dot".into(), fields: vec![] },
            ],
        };
        let blocks = guards(Schema::new().with(shape), &EmitOptions::default());
        assert_eq!(text_of(&blocks, "Shape"), "\
export function isa_Shape(obj: unknown): obj is Shape {
  if (!isa_record(obj)) return false;
  const fields = obj[\"fields\"];
  switch (obj[\"tag\"]) {
    case \"Circle\": {
      if (!isa_record(fields)) return false;
      if (!Object.prototype.hasOwnProperty.call(fields, \"radius\") || !(typeof fields[\"radius\"] === \"number\")) return false;
      return true;
    }
    case \"Dot\": {
      if (!isa_record(fields)) return false;
      return true;
    }
    default:
      return false;
  }
}");
    }

    #[test]
    fn closed_shape_rejects_unknown_keys() {
        let blocks = guards(Schema::new().with(point()), &EmitOptions::default().closed());
        assert!(text_of(&blocks, "Point")
            .contains("if (!Object.keys(obj).every((k) => k === \"X\" || k === \"Y\" || k === \"z\")) return false;"));
    }

    #[test]
    fn structural_arguments_become_inline_checkers() {
        let holder = StructDef {
            name: "Holder".into(),
            params: vec![],
            fields: vec![FieldDef::required(
                "v",
                TypeRef::generic("Value", vec![TypeRef::nullable(TypeRef::string())]),
            )],
        };
        let blocks = guards(Schema::new().with(value()).with(holder), &EmitOptions::default());
        assert_eq!(
            blocks.last().unwrap().text,
            "const isa_Value_Nullable_string = make_isa_Value(((x1: unknown): x1 is string | null => (x1 === null || typeof x1 === \"string\")));",
        );
    }

    #[test]
    fn look_alike_use_sites_get_separate_bindings() {
        // A user generic named `Nullable` prints like the built-in nullable.
        let nullable = StructDef {
            name: "Nullable".into(),
            params: vec!["T".into()],
            fields: vec![FieldDef::required("inner", TypeRef::param("T"))],
        };
        let holder = StructDef {
            name: "Holder".into(),
            params: vec![],
            fields: vec![
                FieldDef::required("a", TypeRef::generic("Value", vec![TypeRef::nullable(TypeRef::string())])),
                FieldDef::required(
                    "b",
                    TypeRef::generic("Value", vec![TypeRef::generic("Nullable", vec![TypeRef::string()])]),
                ),
            ],
        };
        let blocks = guards(Schema::new().with(value()).with(nullable).with(holder), &EmitOptions::default());
        assert_eq!(blocks.last().unwrap().text, "\
const isa_Value_Nullable_string = make_isa_Value(((x1: unknown): x1 is string | null => (x1 === null || typeof x1 === \"string\")));
const isa_Nullable_string = make_isa_Nullable(isa_string);
const isa_Value_Nullable_string_2 = make_isa_Value(isa_Nullable_string);");
        let text = text_of(&blocks, "Holder");
        assert!(text.contains("!(isa_Value_Nullable_string(obj[\"a\"]))"));
        assert!(text.contains("!(isa_Value_Nullable_string_2(obj[\"b\"]))"));
    }

    #[test]
    fn presence_is_an_own_property_test() {
        let node = StructDef {
            name: "Node".into(),
            params: vec![],
            fields: vec![
                FieldDef::required("__proto__", TypeRef::map(TypeRef::number())),
                FieldDef::optional("constructor", TypeRef::string()),
            ],
        };
        let blocks = guards(Schema::new().with(node), &EmitOptions::default());
        assert_eq!(text_of(&blocks, "Node"), "\
export function isa_Node(obj: unknown): obj is Node {
  if (!isa_record(obj)) return false;
  if (!Object.prototype.hasOwnProperty.call(obj, \"__proto__\") || !(isa_record(obj[\"__proto__\"]) && Object.values(obj[\"__proto__\"]).every((x1: unknown) => typeof x1 === \"number\"))) return false;
  if (Object.prototype.hasOwnProperty.call(obj, \"constructor\") && !(typeof obj[\"constructor\"] === \"string\")) return false;
  return true;
}");
        assert!(!text_of(&blocks, "Node").contains("undefined"));
    }

    #[test]
    fn enum_guard_compares_literals() {
        let color = EnumDef { name: "Color".into(), members: vec!["Red".into(), "Green".into()] };
        let void = EnumDef { name: "Void".into(), members: vec![] };
        let blocks = guards(Schema::new().with(color).with(void), &EmitOptions::default());
        assert_eq!(text_of(&blocks, "Color"), "\
export function isa_Color(obj: unknown): obj is Color {
  return obj === \"Red\" || obj === \"Green\";
}");
        assert_eq!(text_of(&blocks, "Void"), "\
export function isa_Void(obj: unknown): obj is Void {
  return false;
}");
    }

    #[test]
    fn aliases_check_their_target() {
        let meters = AliasDef { name: "Meters".into(), params: vec![], ty: TypeRef::number() };
        let maybe = AliasDef {
            name: "Maybe".into(),
            params: vec!["T".into()],
            ty: TypeRef::nullable(TypeRef::param("T")),
        };
        let blocks = guards(Schema::new().with(meters).with(maybe), &EmitOptions::default());
        assert_eq!(text_of(&blocks, "Meters"), "\
export function isa_Meters(obj: unknown): obj is Meters {
  return typeof obj === \"number\";
}");
        assert_eq!(text_of(&blocks, "Maybe"), "\
export function make_isa_Maybe<T>(check_T: (v: unknown) => v is T): (obj: unknown) => obj is Maybe<T> {
  const guard = (obj: unknown): obj is Maybe<T> => {
    return (obj === null || check_T(obj));
  };
  return guard;
}");
    }

    #[test]
    fn custom_prefix_applies_everywhere() {
        let options = EmitOptions { guard_prefix: "is".into(), export: false, ..EmitOptions::default() };
        let blocks = guards(Schema::new().with(value()), &options);
        assert!(blocks[0].text.starts_with("function isrecord(v: unknown)"));
        assert!(text_of(&blocks, "Value").starts_with("function make_isValue<T>("));
    }
}
