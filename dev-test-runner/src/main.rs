//! Conformance runner: every `fixtures/*.json` holds a schema and a list of
//! values with the verdict the guards must reach.
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;

use tsguard::{EmitOptions, Guards, Primitive, Schema, ShapePolicy, TypeRef, generate, resolve};

#[derive(Debug, Deserialize)]
struct Fixture {
    schema: Schema,
    #[serde(default)]
    shape: ShapePolicy,
    cases: Vec<Case>,
}

#[derive(Debug, Deserialize)]
struct Case {
    #[serde(rename = "type")]
    ty: TypeArg,
    value: Value,
    expect: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TypeArg {
    Name(String),
    Ref(TypeRef),
}

impl TypeArg {
    fn to_type_ref(&self) -> TypeRef {
        match self {
            TypeArg::Name(name) => match Primitive::from_name(name) {
                Some(p) => TypeRef::Primitive(p),
                None => TypeRef::named(name.as_str()),
            },
            TypeArg::Ref(ty) => ty.clone(),
        }
    }
}

#[derive(Default)]
struct Tally {
    passed: usize,
    failed: usize,
}

fn load_fixture(path: &Path) -> Result<Fixture> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let de = &mut serde_json::Deserializer::from_str(&source);
    serde_path_to_error::deserialize(de).map_err(|err| {
        anyhow::anyhow!("{}: at {}: {}", path.display(), err.path(), err.inner())
    })
}

fn run_fixture(path: &Path, tally: &mut Tally) -> Result<()> {
    let fixture = load_fixture(path)?;
    let schema = Arc::new(resolve(fixture.schema)?);
    let options = EmitOptions { shape: fixture.shape, ..EmitOptions::default() };

    // emitted text must not depend on how many times we ask for it
    let first = generate(&schema, &options).render_bundle();
    let second = generate(&schema, &options).render_bundle();
    if first != second {
        tally.failed += 1;
        println!("{} {}: bundle output is not deterministic", "❌".red(), path.display());
    }

    let guards = Guards::new(schema, &options);
    for (index, case) in fixture.cases.iter().enumerate() {
        let ty = case.ty.to_type_ref();
        let check = guards
            .validator_for(&ty)
            .with_context(|| format!("{} case {index}: {ty}", path.display()))?;
        let got = check(&case.value);
        if got == case.expect {
            tally.passed += 1;
        } else {
            tally.failed += 1;
            println!(
                "{} {} case {index}: {ty} on {} expected {} got {}",
                "❌".red(),
                path.display(),
                case.value,
                case.expect,
                got,
            );
        }
    }
    Ok(())
}

fn fixture_paths() -> Result<Vec<PathBuf>> {
    let pattern = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/*.json");
    let mut paths = Vec::new();
    for entry in glob::glob(pattern)? {
        paths.push(entry?);
    }
    paths.sort();
    Ok(paths)
}

fn main() -> Result<ExitCode> {
    let mut tally = Tally::default();
    for path in fixture_paths()? {
        run_fixture(&path, &mut tally)?;
    }
    let summary = format!("{} passed, {} failed", tally.passed, tally.failed);
    if tally.failed == 0 {
        println!("{} {}", "✅".green(), summary.green());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} {}", "❌".red(), summary.red());
        Ok(ExitCode::FAILURE)
    }
}
