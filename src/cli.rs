//! CLI: load → resolve → (declarations | guards | bundle | check)
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, info};

use crate::emit::{Artifacts, generate};
use crate::guard::Guards;
use crate::ir::{Primitive, TypeRef};
use crate::options::{EmitOptions, ShapePolicy};
use crate::resolve::{ResolvedSchema, resolve};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate TypeScript declarations and runtime type guards from a schema IR
#[derive(Parser, Debug)]
#[command(name = "tsguard", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// more logging on stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// emit type declarations
    Declarations(EmitOut),
    /// emit type guards and guard factories
    Guards(EmitOut),
    /// emit declarations and guards as one module
    Bundle(EmitOut),
    /// run the in-process guard for a type over JSON value files
    Check(CheckArgs),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more schema files (JSON IR). May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    schema: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct OptionSettings {
    /// reject keys the schema does not declare
    #[arg(long, default_value_t = false)]
    closed: bool,

    /// guard name prefix; factories are `make_<prefix><Type>`
    #[arg(long, default_value = "isa_")]
    guard_prefix: String,

    /// omit the `export` keyword
    #[arg(long, default_value_t = false)]
    no_export: bool,

    /// module the standalone guards import declared types from
    #[arg(long)]
    types_module: Option<String>,
}

#[derive(clap::Parser, Debug)]
struct EmitOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    option_settings: OptionSettings,

    /// output .ts file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckArgs {
    #[command(flatten)]
    input_settings: InputSettings,

    /// reject keys the schema does not declare
    #[arg(long, default_value_t = false)]
    closed: bool,

    /// type to check against: a type name, a primitive, or a JSON TypeRef
    /// such as '{"generic":{"name":"Value","args":[{"primitive":"number"}]}}'
    #[arg(long = "type")]
    ty: String,

    /// JSON value files, literal paths or quoted glob patterns
    #[arg(long, num_args = 1.., required = true)]
    value: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_resolved(&self) -> Result<ResolvedSchema> {
        let paths = resolve_file_path_patterns(&self.schema)?;
        let schema = crate::load::load_schemas(&paths)?;
        info!(files = paths.len(), types = schema.len(), "schema loaded");
        Ok(resolve(schema)?)
    }
}

impl OptionSettings {
    fn to_options(&self) -> Result<EmitOptions> {
        let options = EmitOptions {
            shape: if self.closed { ShapePolicy::Closed } else { ShapePolicy::Open },
            guard_prefix: self.guard_prefix.clone(),
            export: !self.no_export,
            types_module: self.types_module.clone(),
        };
        options.validate()?;
        Ok(options)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<ExitCode> {
        match &self.cmd {
            Command::Declarations(target) => {
                let artifacts = target.generate()?;
                target.write(&artifacts.render_declarations())?;
            }
            Command::Guards(target) => {
                let artifacts = target.generate()?;
                target.write(&artifacts.render_guards())?;
            }
            Command::Bundle(target) => {
                let artifacts = target.generate()?;
                target.write(&artifacts.render_bundle())?;
            }
            Command::Check(target) => {
                if !target.run()? {
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}

impl EmitOut {
    fn generate(&self) -> Result<Artifacts> {
        let options = self.option_settings.to_options()?;
        let schema = self.input_settings.load_resolved()?;
        Ok(generate(&schema, &options))
    }

    fn write(&self, src: &str) -> Result<()> {
        match self.out.as_ref() {
            Some(out) => {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("creating {}", parent.display()))?;
                }
                std::fs::write(out, src).with_context(|| format!("writing {}", out.display()))?;
                info!(path = %out.display(), bytes = src.len(), "artifact written");
            }
            None => print!("{src}"),
        }
        Ok(())
    }
}

impl CheckArgs {
    /// True when every value passes.
    fn run(&self) -> Result<bool> {
        let options = EmitOptions {
            shape: if self.closed { ShapePolicy::Closed } else { ShapePolicy::Open },
            ..EmitOptions::default()
        };
        let schema = Arc::new(self.input_settings.load_resolved()?);
        let guards = Guards::new(schema, &options);
        let ty = parse_type_arg(&self.ty)?;
        let check = guards.validator_for(&ty)?;

        let mut all_passed = true;
        for path in resolve_file_path_patterns(&self.value)? {
            let value = read_json(&path)?;
            let passed = check(&value);
            debug!(path = %path.display(), passed, "value checked");
            if passed {
                println!("{} {}", "✅ pass".green(), path.display());
            } else {
                all_passed = false;
                println!("{} {}", "❌ fail".red(), path.display());
            }
        }
        Ok(all_passed)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// `Point`, `number`, or a TypeRef in its JSON form.
fn parse_type_arg(src: &str) -> Result<TypeRef> {
    let src = src.trim();
    if src.starts_with('{') {
        return crate::load::from_str_with_path(src, "--type").map_err(|e| anyhow!(e));
    }
    if src.is_empty() {
        bail!("empty --type");
    }
    Ok(match Primitive::from_name(src) {
        Some(p) => TypeRef::Primitive(p),
        None => TypeRef::named(src),
    })
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&source)
        .with_context(|| format!("failed to parse JSON value file {}", path.display()))
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("bad glob pattern {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
