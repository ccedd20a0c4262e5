//! Generation pipeline: one resolved schema in, declaration and guard
//! artifacts out.
use tracing::{info, instrument};

use crate::decl::emit_declarations;
use crate::guard::emit_guards;
use crate::ir::TypeDef;
use crate::options::EmitOptions;
use crate::resolve::ResolvedSchema;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    Prelude,
    Type(String),
    Instantiations,
}

/// One piece of generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub origin: Origin,
    pub text: String,
}

impl Block {
    pub fn new(origin: Origin, text: String) -> Self {
        Block { origin, text }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub declarations: Vec<Block>,
    pub guards: Vec<Block>,
    type_names: Vec<String>,
    options: EmitOptions,
}

/// Run both emitters. They read the same schema and share nothing mutable,
/// so they run side by side.
#[instrument(skip_all, fields(types = schema.len()))]
pub fn generate(schema: &ResolvedSchema, options: &EmitOptions) -> Artifacts {
    let (declarations, guards) = rayon::join(
        || emit_declarations(schema, options),
        || emit_guards(schema, options),
    );
    info!(declarations = declarations.len(), guards = guards.len(), "artifacts generated");
    Artifacts {
        declarations,
        guards,
        type_names: schema.iter().map(TypeDef::name).map(str::to_string).collect(),
        options: options.clone(),
    }
}

impl Artifacts {
    pub fn render_declarations(&self) -> String {
        join_blocks(&self.declarations)
    }

    /// Guard module on its own; imports the declared types when
    /// `types_module` is configured.
    pub fn render_guards(&self) -> String {
        let mut out = String::new();
        if let Some(module) = &self.options.types_module {
            if !self.type_names.is_empty() {
                out.push_str(&format!(
                    "import type {{ {} }} from {};\n\n",
                    self.type_names.join(", "),
                    crate::decl::string_literal(module),
                ));
            }
        }
        out.push_str(&join_blocks(&self.guards));
        out
    }

    /// Declarations and guards as one self-contained module.
    pub fn render_bundle(&self) -> String {
        let mut out = join_blocks(&self.declarations);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&join_blocks(&self.guards));
        out
    }
}

fn join_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&block.text);
        out.push('\n');
    }
    out
}
