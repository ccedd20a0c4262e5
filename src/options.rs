use serde::{Deserialize, Serialize};

use crate::error::OptionsError;

// Names the emitted guard code binds or reads besides the guards themselves.
const LOCALS: &[&str] = &["obj", "guard", "fields", "k", "v", "b", "Object", "Array", "Number"];
// Families of generated locals: `check_T` for every factory parameter `T`.
const LOCAL_FAMILIES: &[&str] = &["check_"];

/// How guards treat keys that the schema does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ShapePolicy {
    /// extra keys are ignored
    #[default]
    Open,
    /// extra keys fail the guard
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    pub shape: ShapePolicy,
    /// guards are `<prefix><Type>`, factories `make_<prefix><Type>`
    pub guard_prefix: String,
    /// prefix declarations and guards with `export`
    pub export: bool,
    /// when set, the standalone guard artifact imports the declared types from here
    pub types_module: Option<String>,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions {
            shape: ShapePolicy::Open,
            guard_prefix: "isa_".to_string(),
            export: true,
            types_module: None,
        }
    }
}

impl EmitOptions {
    pub fn closed(mut self) -> Self {
        self.shape = ShapePolicy::Closed;
        self
    }

    /// The prefix must be an identifier, and `<prefix><Type>` must never
    /// spell one of the emitter's own local names.
    pub fn validate(&self) -> Result<(), OptionsError> {
        let prefix = self.guard_prefix.as_str();
        if !crate::resolve::is_identifier(prefix) {
            return Err(OptionsError::InvalidPrefix(prefix.to_string()));
        }
        let clash = LOCALS
            .iter()
            .find(|local| local.len() > prefix.len() && local.starts_with(prefix))
            .or_else(|| {
                LOCAL_FAMILIES
                    .iter()
                    .find(|family| family.starts_with(prefix) || prefix.starts_with(*family))
            });
        match clash {
            Some(local) => Err(OptionsError::ShadowedPrefix { prefix: prefix.to_string(), local: *local }),
            None => Ok(()),
        }
    }

    pub fn guard_name(&self, ty: &str) -> String {
        format!("{}{ty}", self.guard_prefix)
    }

    pub fn factory_name(&self, ty: &str) -> String {
        format!("make_{}{ty}", self.guard_prefix)
    }

    pub(crate) fn export_kw(&self) -> &'static str {
        if self.export { "export " } else { "" }
    }
}
