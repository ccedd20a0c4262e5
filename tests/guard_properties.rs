use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Map, Value, json};

use tsguard::{
    EmitOptions, FieldDef, Guards, Primitive, Schema, StructDef, TypeRef, UnionDef, VariantDef,
    resolve,
};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(|n| json!(n)),
        (-10.0f64..10.0).prop_map(|n| json!(n)),
        "[a-z]{0,4}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[XYZ]|tag|fields|radius|value", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn guards(schema: Schema) -> Guards {
    Guards::new(Arc::new(resolve(schema).unwrap()), &EmitOptions::default())
}

fn point_guards() -> Guards {
    guards(Schema::new().with(StructDef {
        name: "Point".into(),
        params: vec![],
        fields: vec![
            FieldDef::required("X", TypeRef::number()),
            FieldDef::optional("Z", TypeRef::number()),
        ],
    }))
}

fn shape_guards() -> Guards {
    guards(Schema::new().with(UnionDef {
        name: "Shape".into(),
        variants: vec![
            VariantDef { tag: "Circle".into(), fields: vec![FieldDef::required("radius", TypeRef::number())] },
            VariantDef { tag: "Dot".into(), fields: vec![] },
        ],
    }))
}

fn record_guards() -> Guards {
    guards(Schema::new().with(StructDef {
        name: "Record".into(),
        params: vec![],
        fields: vec![
            FieldDef::required("id", TypeRef::number()),
            FieldDef::required("name", TypeRef::string()),
            FieldDef::required("active", TypeRef::boolean()),
            FieldDef::required("tags", TypeRef::seq(TypeRef::string())),
        ],
    }))
}

fn arb_record() -> impl Strategy<Value = Value> {
    (any::<i32>(), "[a-z]{0,8}", any::<bool>(), prop::collection::vec("[a-z]{1,4}", 0..4)).prop_map(
        |(id, name, active, tags)| json!({ "id": id, "name": name, "active": active, "tags": tags }),
    )
}

fn is_point(v: &Value) -> bool {
    let Some(obj) = v.as_object() else { return false };
    obj.get("X").is_some_and(Value::is_number) && obj.get("Z").is_none_or(Value::is_number)
}

fn is_shape(v: &Value) -> bool {
    let Some(obj) = v.as_object() else { return false };
    let Some(fields) = obj.get("fields").and_then(Value::as_object) else { return false };
    match obj.get("tag").and_then(Value::as_str) {
        Some("Circle") => fields.get("radius").is_some_and(Value::is_number),
        Some("Dot") => true,
        _ => false,
    }
}

proptest! {
    #[test]
    fn point_guard_matches_its_definition(v in arb_json()) {
        prop_assert_eq!(point_guards().check("Point", &v), Ok(is_point(&v)));
    }

    #[test]
    fn shape_guard_accepts_only_known_tags(v in arb_json()) {
        prop_assert_eq!(shape_guards().check("Shape", &v), Ok(is_shape(&v)));
    }

    #[test]
    fn well_formed_points_pass(x in -1e6f64..1e6, z in proptest::option::of(-1e6f64..1e6)) {
        let mut v = json!({ "X": x });
        if let Some(z) = z {
            v["Z"] = json!(z);
        }
        prop_assert_eq!(point_guards().check("Point", &v), Ok(true));
    }

    #[test]
    fn dropping_any_required_field_is_rejected(record in arb_record()) {
        let g = record_guards();
        prop_assert_eq!(g.check("Record", &record), Ok(true));
        for field in ["id", "name", "active", "tags"] {
            let mut partial = record.clone();
            partial.as_object_mut().unwrap().remove(field);
            prop_assert_eq!(g.check("Record", &partial), Ok(false), "without {}", field);
        }
    }

    #[test]
    fn generic_checkers_decide_the_parameter(v in arb_json(), p in prop::sample::select(Primitive::ALL.to_vec())) {
        let g = guards(Schema::new().with(StructDef {
            name: "Value".into(),
            params: vec!["T".into()],
            fields: vec![FieldDef::required("value", TypeRef::param("T"))],
        }));
        let check = g.instantiate("Value", &[Guards::primitive(p)]).unwrap();
        let wrapped = json!({ "value": v.clone() });
        prop_assert_eq!(check(&wrapped), Guards::primitive(p)(&v));
    }
}
