//! In-process guards over decoded values (`serde_json::Value`).
//!
//! Same contract as the emitted TypeScript: total, pure, `false` on any
//! mismatch. Generic types are reached through factories that take one
//! [`Validator`] per parameter; nothing ever looks at a parameter itself.
use std::sync::Arc;

use serde_json::{Map, Value};

use super::instantiate::{supply, Checkers, Instantiation, Scope};
use crate::error::UseError;
use crate::ir::{FieldDef, Primitive, TypeDef, TypeRef, UnionDef, PAYLOAD_FIELD, TAG_FIELD};
use crate::options::{EmitOptions, ShapePolicy};
use crate::resolve::{check_use, ResolvedSchema};

pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type Factory = Arc<dyn Fn(&[Validator]) -> Validator + Send + Sync>;

type Env = Arc<[Validator]>;

/// Guards for every type of a resolved schema. Cheap to clone.
#[derive(Clone)]
pub struct Guards {
    inner: Arc<Inner>,
}

struct Inner {
    schema: Arc<ResolvedSchema>,
    shape: ShapePolicy,
}

impl Guards {
    pub fn new(schema: Arc<ResolvedSchema>, options: &EmitOptions) -> Self {
        Guards { inner: Arc::new(Inner { schema, shape: options.shape }) }
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.inner.schema
    }

    pub fn primitive(primitive: Primitive) -> Validator {
        Arc::new(move |value: &Value| primitive_matches(primitive, value))
    }

    /// Guard of any monomorphic type.
    pub fn guard(&self, name: &str) -> Result<Validator, UseError> {
        match self.inner.schema.get(name) {
            None => Err(UseError::UnknownType(name.to_string())),
            Some(def) if def.is_generic() => Err(UseError::Generic(name.to_string())),
            Some(_) => Ok(self.inner.applied(name, Arc::from(Vec::new()))),
        }
    }

    /// Factory of a generic struct or alias. Supplying the wrong number of
    /// checkers yields a validator that rejects everything; [`Guards::instantiate`]
    /// reports it instead.
    pub fn factory(&self, name: &str) -> Result<Factory, UseError> {
        let expected = match self.inner.schema.get(name) {
            None => return Err(UseError::UnknownType(name.to_string())),
            Some(def) if !def.is_generic() => return Err(UseError::NotGeneric(name.to_string())),
            Some(def) => def.params().len(),
        };
        let inner = self.inner.clone();
        let name = name.to_string();
        Ok(Arc::new(move |checkers: &[Validator]| -> Validator {
            if checkers.len() != expected {
                return Arc::new(|_: &Value| false);
            }
            inner.applied(&name, Arc::from(checkers.to_vec()))
        }))
    }

    pub fn instantiate(&self, name: &str, checkers: &[Validator]) -> Result<Validator, UseError> {
        let factory = self.factory(name)?;
        let expected = self.inner.schema.get(name).map_or(0, |def| def.params().len());
        if checkers.len() != expected {
            return Err(UseError::CheckerCount {
                name: name.to_string(),
                expected,
                found: checkers.len(),
            });
        }
        Ok(factory(checkers))
    }

    /// Validator for any closed use-site reference, e.g. `Value<number>`.
    pub fn validator_for(&self, ty: &TypeRef) -> Result<Validator, UseError> {
        check_use(&self.inner.schema, ty)?;
        let env: Env = Arc::from(Vec::new());
        let mut backend = RuntimeCheckers { inner: &self.inner, env: &env };
        Ok(supply(&self.inner.schema, ty, Scope::empty(), &mut backend))
    }

    /// Convenience for monomorphic types.
    pub fn check(&self, name: &str, value: &Value) -> Result<bool, UseError> {
        Ok(self.guard(name)?(value))
    }
}

impl Inner {
    /// Validator for `name` with its parameters bound to `env`.
    fn applied(self: &Arc<Self>, name: &str, env: Env) -> Validator {
        let inner = self.clone();
        let name = name.to_string();
        Arc::new(move |value: &Value| match inner.schema.get(&name) {
            Some(def) => inner.def_matches(def, value, &env),
            None => false,
        })
    }

    fn def_matches(self: &Arc<Self>, def: &TypeDef, value: &Value, env: &Env) -> bool {
        let scope = Scope::of(def);
        match def {
            TypeDef::Struct(s) => value
                .as_object()
                .is_some_and(|obj| self.fields_match(&s.fields, obj, scope, env)),
            TypeDef::Union(u) => self.union_matches(u, value, scope, env),
            TypeDef::Enum(e) => value.as_str().is_some_and(|member| e.contains(member)),
            TypeDef::Alias(a) => self.matches(&a.ty, value, scope, env),
        }
    }

    fn union_matches(self: &Arc<Self>, u: &UnionDef, value: &Value, scope: Scope<'_>, env: &Env) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        if self.shape == ShapePolicy::Closed && !obj.keys().all(|k| k == TAG_FIELD || k == PAYLOAD_FIELD) {
            return false;
        }
        let Some(tag) = obj.get(TAG_FIELD).and_then(Value::as_str) else {
            return false;
        };
        let Some(variant) = u.variant(tag) else {
            return false;
        };
        match obj.get(PAYLOAD_FIELD).and_then(Value::as_object) {
            Some(payload) => self.fields_match(&variant.fields, payload, scope, env),
            None => false,
        }
    }

    fn fields_match(
        self: &Arc<Self>,
        fields: &[FieldDef],
        obj: &Map<String, Value>,
        scope: Scope<'_>,
        env: &Env,
    ) -> bool {
        if self.shape == ShapePolicy::Closed
            && !obj.keys().all(|k| fields.iter().any(|f| &f.name == k))
        {
            return false;
        }
        fields.iter().all(|field| match obj.get(&field.name) {
            Some(v) => self.matches(&field.ty, v, scope, env),
            None => !field.required,
        })
    }

    fn matches(self: &Arc<Self>, ty: &TypeRef, value: &Value, scope: Scope<'_>, env: &Env) -> bool {
        match ty {
            TypeRef::Primitive(p) => primitive_matches(*p, value),
            TypeRef::Parameter(name) => scope
                .index(name)
                .and_then(|i| env.get(i))
                .is_some_and(|check| check(value)),
            TypeRef::Named(name) => match self.schema.get(name) {
                Some(def) if !def.is_generic() => self.def_matches(def, value, &Arc::from(Vec::new())),
                _ => false,
            },
            TypeRef::Generic { .. } => {
                let mut backend = RuntimeCheckers { inner: self, env };
                supply(&self.schema, ty, scope, &mut backend)(value)
            }
            TypeRef::Sequence(inner) => value
                .as_array()
                .is_some_and(|xs| xs.iter().all(|x| self.matches(inner, x, scope, env))),
            TypeRef::Map(inner) => value
                .as_object()
                .is_some_and(|m| m.values().all(|x| self.matches(inner, x, scope, env))),
            TypeRef::Tuple(elems) => value.as_array().is_some_and(|xs| {
                xs.len() == elems.len()
                    && xs.iter().zip(elems).all(|(x, ty)| self.matches(ty, x, scope, env))
            }),
            TypeRef::Nullable(inner) => value.is_null() || self.matches(inner, value, scope, env),
        }
    }
}

fn primitive_matches(primitive: Primitive, value: &Value) -> bool {
    match primitive {
        Primitive::Boolean => value.is_boolean(),
        Primitive::Number => value.is_number(),
        Primitive::String => value.is_string(),
        Primitive::Bytes => value.as_array().is_some_and(|xs| {
            xs.iter().all(|x| {
                x.as_f64().is_some_and(|n| n.fract() == 0.0 && (0.0..=255.0).contains(&n))
            })
        }),
    }
}

/// Checkers as validators, for use sites inside a body whose parameters are
/// bound to `env`.
struct RuntimeCheckers<'a> {
    inner: &'a Arc<Inner>,
    env: &'a Env,
}

impl Checkers for RuntimeCheckers<'_> {
    type Checker = Validator;

    fn primitive(&mut self, primitive: Primitive) -> Validator {
        Guards::primitive(primitive)
    }

    fn guard(&mut self, def: &TypeDef) -> Validator {
        self.inner.applied(def.name(), Arc::from(Vec::new()))
    }

    fn param(&mut self, index: usize, _name: &str) -> Validator {
        match self.env.get(index) {
            Some(check) => check.clone(),
            None => self.never(),
        }
    }

    fn apply(&mut self, inst: Instantiation<'_, '_>, args: Vec<Validator>) -> Validator {
        self.inner.applied(inst.def.name(), Arc::from(args))
    }

    fn structural(&mut self, ty: &TypeRef, scope: Scope<'_>) -> Validator {
        let inner = self.inner.clone();
        let env = self.env.clone();
        let ty = ty.clone();
        let owner = scope.owner().map(str::to_string);
        Arc::new(move |value: &Value| {
            let scope = owner
                .as_deref()
                .and_then(|name| inner.schema.get(name))
                .map_or_else(Scope::empty, Scope::of);
            inner.matches(&ty, value, scope, &env)
        })
    }

    fn never(&mut self) -> Validator {
        Arc::new(|_: &Value| false)
    }
}
