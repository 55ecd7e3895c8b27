//! Protected types seen from the outside.
//!
//! Test categories:
//! - Construction and the unwrap escape hatch
//! - Protection of returned objects and sequences
//! - Class-level forwarding
//! - A document workflow that survives dropped connections

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use pretty_assertions::assert_eq;
use serde_json::json;
use warden_core::{GuardedRef, TypeKey, Value, WardenError};
use warden_guard::{ConstructArgs, Proxy, SequenceProxy};

use crate::fixtures::{Collection, Database, Document, Harness, Record};

fn guarded(value: &Value) -> Result<&GuardedRef> {
    value.as_guarded().context("value was not wrapped")
}

fn sequence(value: &Value) -> Result<&SequenceProxy> {
    guarded(value)?
        .downcast_ref::<SequenceProxy>()
        .context("value was not a sequence proxy")
}

fn label_of(value: &Value) -> Result<Value> {
    Ok(guarded(value)?.invoke("label", &[])?)
}

#[test]
fn test_unwrap_reveals_protected_object() -> Result<()> {
    let harness = Harness::new(2)?;
    let records = harness.context.protect::<Record>();
    let proxy = records.new_proxy(ConstructArgs::Default)?;

    let object = proxy.unwrap();
    assert!(object.is::<Record>());
    assert_eq!(object.downcast_ref::<Record>(), Some(&Record::new("orig")));
    Ok(())
}

#[test]
fn test_registry_lists_protected_types() -> Result<()> {
    let harness = Harness::new(2)?;
    harness.context.protect::<Record>();
    let registry = harness.context.registry();

    assert!(registry.is_protected_type::<Record>());
    assert!(registry.protected_types().contains(&TypeKey::of::<Record>()));
    assert!(!registry.is_protected(TypeKey::of::<String>()));
    Ok(())
}

#[test]
fn test_construct_with_params() -> Result<()> {
    let harness = Harness::new(2)?;
    let records = harness.context.protect::<Record>();
    let params = BTreeMap::from([("label".to_string(), Value::from("custom"))]);

    let proxy = records.new_proxy(params.into())?;
    assert_eq!(proxy.invoke("label", &[])?, Value::from("custom"));
    Ok(())
}

#[test]
fn test_adopting_wrong_type_is_rejected() -> Result<()> {
    let harness = Harness::new(2)?;
    let foreign = Arc::new(Document { body: json!({}) });
    let result = Proxy::construct::<Record>(
        ConstructArgs::Adopt(foreign),
        harness.context.clone(),
    );
    assert!(matches!(result, Err(WardenError::InvalidArgument(_))));
    Ok(())
}

#[test]
fn test_returned_protected_object_is_safe() -> Result<()> {
    let harness = Harness::new(2)?;
    let records = harness.context.protect::<Record>();
    let proxy = records.new_proxy(ConstructArgs::Default)?;

    let sibling = proxy.invoke("sibling", &[])?;
    assert!(sibling.is_safe());
    assert_eq!(label_of(&sibling)?, Value::from("orig-sibling"));
    Ok(())
}

#[test]
fn test_returned_plain_values_are_untouched() -> Result<()> {
    let harness = Harness::new(2)?;
    let proxy = harness
        .context
        .protect::<Record>()
        .new_proxy(ConstructArgs::Default)?;

    let greeting = proxy.invoke("greeting", &[])?;
    assert!(!greeting.is_safe());
    assert_eq!(greeting, Value::from("hi from orig"));
    Ok(())
}

#[test]
fn test_sequence_of_protected_objects() -> Result<()> {
    let harness = Harness::new(2)?;
    let proxy = harness
        .context
        .protect::<Record>()
        .new_proxy(ConstructArgs::Default)?;

    let children = proxy.invoke("children", &[Value::Int64(3)])?;
    assert!(children.is_safe());
    let children = sequence(&children)?;
    assert_eq!(children.len(), 3);

    let first = children.get(0).context("first child")?;
    assert!(first.is_safe());
    assert_eq!(label_of(&first)?, Value::from("orig-1"));

    let plain = children.to_vec();
    assert!(plain.iter().all(|item| !item.is_safe()));
    let labels: Vec<_> = plain
        .iter()
        .filter_map(|item| item.as_object()?.downcast_ref::<Record>())
        .map(|record| record.label.clone())
        .collect();
    assert_eq!(labels, vec!["orig-1", "orig-2", "orig-3"]);
    Ok(())
}

#[test]
fn test_sequence_operations_through_guarded_interface() -> Result<()> {
    let harness = Harness::new(2)?;
    let records = harness.context.protect::<Record>();
    let all = records.invoke("all", &[])?;
    let all = guarded(&all)?;

    assert_eq!(all.invoke("size", &[])?, Value::Int64(3));
    assert_eq!(label_of(&all.invoke("[]", &[Value::Int64(0)])?)?, Value::from("a"));
    assert_eq!(label_of(&all.invoke("last", &[])?)?, Value::from("c"));
    assert!(matches!(all.raw(), Value::Array(items) if items.len() == 3));
    Ok(())
}

#[test]
fn test_empty_sequences_stay_plain() -> Result<()> {
    let harness = Harness::new(2)?;
    let records = harness.context.protect::<Record>();
    assert_eq!(records.invoke("none", &[])?, Value::Array(Vec::new()));
    Ok(())
}

#[test]
fn test_class_level_forwarding_is_protected() -> Result<()> {
    let harness = Harness::new(2)?;
    let records = harness.context.protect::<Record>();
    harness.server.fail_next_operations(2);

    let created = records.invoke("create", &[Value::from("fresh")])?;
    assert!(created.is_safe());
    assert_eq!(label_of(&created)?, Value::from("fresh"));
    assert_eq!(harness.manager.reconnect_count(), 2);
    Ok(())
}

#[test]
fn test_unprotected_class_returns_raw_objects() -> Result<()> {
    let harness = Harness::new(2)?;
    let records = harness.context.class::<Record>();

    let created = records.invoke("create", &[Value::from("raw")])?;
    assert!(!created.is_safe());
    assert!(created.as_object().is_some_and(|object| object.is::<Record>()));
    Ok(())
}

#[test]
fn test_document_workflow_survives_outages() -> Result<()> {
    let harness = Harness::new(3)?;
    let users = harness.collection("users")?;
    let users = guarded(&users)?;
    assert!(
        users
            .raw()
            .as_object()
            .is_some_and(|object| object.is::<Collection>())
    );

    users.invoke("insert", &[Value::from(json!({"name": "ada", "role": "admin"}))])?;
    harness.server.drop_connections();
    users.invoke("insert", &[Value::from(json!({"name": "grace", "role": "dev"}))])?;
    harness.server.fail_next_operations(2);
    assert_eq!(users.invoke("count", &[])?, Value::Int64(2));

    let found = users.invoke("find", &[])?;
    let found = sequence(&found)?;
    let names = found
        .iter()
        .map(|document| -> Result<Value> {
            Ok(guarded(&document)?.invoke("get", &[Value::from("name")])?)
        })
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(names, vec![Value::Json(json!("ada")), Value::Json(json!("grace"))]);

    assert_eq!(
        harness.server.documents("app", "users"),
        vec![
            json!({"name": "ada", "role": "admin"}),
            json!({"name": "grace", "role": "dev"}),
        ]
    );
    assert_eq!(harness.manager.reconnect_count(), 3);
    Ok(())
}

#[test]
fn test_database_handles_are_protected() -> Result<()> {
    let harness = Harness::new(2)?;
    let database = harness.context.database("audit")?;
    let database = guarded(&database)?;

    assert!(
        database
            .raw()
            .as_object()
            .and_then(|object| object.downcast_ref::<Database>())
            .is_some_and(|db| db.name == "audit_log")
    );

    let events = database.invoke("collection", &[Value::from("events")])?;
    guarded(&events)?.invoke("insert", &[Value::from(json!({"kind": "login"}))])?;
    assert_eq!(
        database.invoke("collection_names", &[])?,
        Value::Array(vec![Value::from("events")])
    );
    Ok(())
}

#[test]
fn test_missing_document_is_null() -> Result<()> {
    let harness = Harness::new(2)?;
    let empty = harness.collection("empty")?;
    assert_eq!(guarded(&empty)?.invoke("find_one", &[])?, Value::Null);
    assert_eq!(guarded(&empty)?.invoke("drop", &[])?, Value::Bool(false));
    Ok(())
}
