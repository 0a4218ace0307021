//! Generic Entity CRUD.
//!
//! One implementation of list/get/create/update/delete, instantiated per entity through the
//! `Entity` trait. Column names only ever come from the entity's descriptor; request input
//! contributes values, never identifiers.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use validator::Validate;

use crate::{
    entity::{Entity, EntityDescriptor, IntoColumns},
    error::{AppError, AppResult},
    models::MutationResponse,
    repository::Repository,
};

const MISSING_FIELD: &str = "Missing data for required field.";
const EMPTY_UPDATE: &str = "At least one valid field must be provided to update";

fn validation_error(details: Value) -> AppError {
    AppError::validation_with("validation error", details)
}

/// The body must be a JSON object.
fn parse_object(body: &[u8]) -> AppResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(validation_error(json!("expected a JSON object"))),
        Err(e) => Err(validation_error(json!(e.to_string()))),
    }
}

/// Deserializes the filtered object into `T` and runs its field constraints.
fn decode<T: DeserializeOwned + Validate>(object: Map<String, Value>) -> AppResult<T> {
    let payload: T = serde_json::from_value(Value::Object(object))
        .map_err(|e| validation_error(json!(e.to_string())))?;

    payload.validate().map_err(|errors| {
        let details = serde_json::to_value(&errors).unwrap_or_else(|_| json!(errors.to_string()));
        validation_error(details)
    })?;

    Ok(payload)
}

/// parse_create
///
/// Every required field must be present and non-null. Fields outside required ∪ optional
/// are dropped before decoding.
pub fn parse_create<E: Entity>(body: &[u8]) -> AppResult<E::Create> {
    let entity = E::DESCRIPTOR;
    let mut object = parse_object(body)?;

    let missing: Map<String, Value> = entity
        .required_fields
        .iter()
        .filter(|field| object.get(**field).is_none_or(Value::is_null))
        .map(|field| (field.to_string(), json!([MISSING_FIELD])))
        .collect();
    if !missing.is_empty() {
        return Err(validation_error(Value::Object(missing)));
    }

    object.retain(|field, _| entity.is_insertable(field));
    decode(object)
}

/// parse_update
///
/// Fields outside the update whitelist are silently dropped; nothing left is a 400.
pub fn parse_update<E: Entity>(body: &[u8]) -> AppResult<E::Update> {
    let entity = E::DESCRIPTOR;
    let mut object = parse_object(body)?;

    object.retain(|field, _| entity.is_updatable(field));
    if object.is_empty() {
        return Err(AppError::validation(EMPTY_UPDATE));
    }
    decode(object)
}

fn into_records<E: Entity>(rows: Vec<Value>) -> AppResult<Vec<E::Record>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(AppError::unexpected))
        .collect()
}

/// Every row of the entity's read projection. An empty table is not an error.
pub async fn list_entities<E: Entity>(repo: &dyn Repository) -> AppResult<Vec<E::Record>> {
    let rows = repo.fetch_records(E::DESCRIPTOR).await?;
    into_records::<E>(rows)
}

/// Zero or one record. An unknown id is an empty list, not a 404.
pub async fn get_entity<E: Entity>(repo: &dyn Repository, id: i64) -> AppResult<Vec<E::Record>> {
    let rows = repo.fetch_record(E::DESCRIPTOR, id).await?;
    into_records::<E>(rows)
}

pub async fn add_entity<E: Entity>(repo: &dyn Repository, body: &[u8]) -> AppResult<MutationResponse> {
    let entity = E::DESCRIPTOR;
    let payload = parse_create::<E>(body)?;

    let columns = payload.into_columns();
    debug_assert!(columns.iter().all(|c| entity.is_insertable(c.name)));

    let rows_affected = repo.insert_record(entity, columns).await?;
    tracing::debug!(table = entity.table, rows_affected, "Entity created");

    Ok(MutationResponse {
        message: format!("{} entry added successfully", entity.label()),
        rows_affected,
    })
}

/// update_entity
///
/// 1. Existence check, so an unknown id is a 404 whatever the payload.
/// 2. Parse, filter and validate the patch.
/// 3. Apply it. Zero rows affected (the row vanished in between) is still a 404.
pub async fn update_entity<E: Entity>(
    repo: &dyn Repository,
    id: i64,
    body: &[u8],
) -> AppResult<MutationResponse> {
    let entity = E::DESCRIPTOR;
    let not_found = || AppError::NotFound(format!("No {} entry found with ID {id}", entity.label()));

    // 1. Existence
    if !repo.record_exists(entity, id).await? {
        return Err(not_found());
    }

    // 2. Patch
    let columns: Vec<_> = parse_update::<E>(body)?
        .into_columns()
        .into_iter()
        .filter(|column| entity.is_updatable(column.name))
        .collect();
    // `{"name": null}` on a non-nullable column yields nothing to set.
    if columns.is_empty() {
        return Err(AppError::validation(EMPTY_UPDATE));
    }

    // 3. Apply
    let rows_affected = repo.update_record(entity, id, columns).await?;
    if rows_affected == 0 {
        return Err(not_found());
    }
    tracing::debug!(table = entity.table, id, rows_affected, "Entity updated");

    Ok(MutationResponse {
        message: format!("{} entry updated successfully", entity.label()),
        rows_affected,
    })
}

pub async fn delete_entity(
    repo: &dyn Repository,
    entity: &EntityDescriptor,
    id: i64,
) -> AppResult<MutationResponse> {
    let rows_affected = repo.delete_record(entity, id).await?;
    if rows_affected == 0 {
        return Err(AppError::NotFound(format!(
            "no {} found with ID {id}",
            entity.label()
        )));
    }
    tracing::debug!(table = entity.table, id, "Entity deleted");

    Ok(MutationResponse {
        message: format!("{} deleted successfully", entity.label()),
        rows_affected,
    })
}
