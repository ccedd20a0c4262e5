//! Runtime guards: emitted as TypeScript (`ts`) or run in-process (`runtime`).
//!
//! Both consult `instantiate` for every generic use site, so the two agree on
//! which checker each generic parameter receives.
pub mod instantiate;
pub mod runtime;
pub mod ts;

pub use instantiate::{supply, Checkers, Instantiation, Scope};
pub use runtime::{Factory, Guards, Validator};
pub use ts::{emit_guards, GuardEmitter};
