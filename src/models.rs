use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

// --- Identity ---

/// Role
///
/// The four roles a credential can hold. Carried as the `role` claim of every token
/// and checked by the role gate on each entity route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Buyer,
    Breeder,
    Vet,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Buyer, Role::Breeder, Role::Vet, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Breeder => "breeder",
            Role::Vet => "vet",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// User
///
/// A row of the `user` table. Only the auth service reads or writes it.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

// --- Auth Payloads ---

/// RegisterRequest
///
/// Every field is optional at the serde level so that a missing or empty field
/// produces the dedicated 400 message instead of a generic decode error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterResponse {
    pub message: String,
    pub rows_affected: u64,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

/// ProtectedResponse
///
/// Echo of the verified token's identity, served by `GET /protected`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProtectedResponse {
    pub logged_in_as: String,
    pub role: Role,
}

/// MutationResponse
///
/// Result of every create, update and delete on an entity.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MutationResponse {
    pub message: String,
    pub rows_affected: u64,
}

// --- Entity Input Schemas ---

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
/// so a patch can clear a nullable column.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct CreateDog {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(range(min = 0, max = 1))]
    pub gender: i16,
    #[validate(length(min = 1))]
    pub breed: String,
    #[serde(default)]
    pub litter_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct UpdateDog {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 1))]
    pub gender: Option<i16>,
    #[validate(length(min = 1))]
    pub breed: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<i64>)]
    #[ts(type = "number | null")]
    pub litter_id: Option<Option<i64>>,
}

/// CreateVet
///
/// A vet must be reachable: at least one of email or phone is required.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[validate(schema(function = "require_contact"))]
#[ts(export)]
pub struct CreateVet {
    #[validate(length(min = 1, max = 45))]
    pub firstname: String,
    #[validate(length(min = 1, max = 45))]
    pub lastname: String,
    #[validate(email, length(max = 45))]
    pub email: Option<String>,
    #[validate(length(max = 45))]
    pub phone: Option<String>,
}

fn require_contact(vet: &CreateVet) -> Result<(), ValidationError> {
    if vet.email.is_none() && vet.phone.is_none() {
        return Err(ValidationError::new("contact_required")
            .with_message("at least one of email or phone is required".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct UpdateVet {
    #[validate(length(min = 1, max = 45))]
    pub firstname: Option<String>,
    #[validate(length(min = 1, max = 45))]
    pub lastname: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[validate(email, length(max = 45))]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string | null")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 45))]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string | null")]
    pub phone: Option<Option<String>>,
}

/// CreateLitter
///
/// A litter's sire and dam must be two different dogs.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[validate(schema(function = "distinct_parents"))]
#[ts(export)]
pub struct CreateLitter {
    pub sire_id: i64,
    pub dam_id: i64,
    pub birthdate: NaiveDate,
    #[validate(length(min = 1, max = 135))]
    pub birthplace: String,
}

fn distinct_parents(litter: &CreateLitter) -> Result<(), ValidationError> {
    check_parents(Some(litter.sire_id), Some(litter.dam_id))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[validate(schema(function = "distinct_patched_parents"))]
#[ts(export)]
pub struct UpdateLitter {
    pub sire_id: Option<i64>,
    pub dam_id: Option<i64>,
    pub birthdate: Option<NaiveDate>,
    #[validate(length(min = 1, max = 135))]
    pub birthplace: Option<String>,
}

// A patch touching only one parent is checked by the schema's constraint instead.
fn distinct_patched_parents(litter: &UpdateLitter) -> Result<(), ValidationError> {
    check_parents(litter.sire_id, litter.dam_id)
}

fn check_parents(sire_id: Option<i64>, dam_id: Option<i64>) -> Result<(), ValidationError> {
    match (sire_id, dam_id) {
        (Some(sire), Some(dam)) if sire == dam => Err(ValidationError::new("same_parent")
            .with_message("sire and dam must be different dogs".into())),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct CreateHealthRecord {
    pub dog_id: i64,
    pub vet_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct UpdateHealthRecord {
    pub dog_id: Option<i64>,
    pub vet_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct CreateHealthProblem {
    pub health_record_id: i64,
    #[validate(length(min = 1, max = 135))]
    pub problem: String,
    pub date: NaiveDate,
    #[validate(length(max = 135))]
    #[serde(default)]
    pub treatment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, TS, ToSchema)]
#[ts(export)]
pub struct UpdateHealthProblem {
    pub health_record_id: Option<i64>,
    #[validate(length(min = 1, max = 135))]
    pub problem: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 135))]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string | null")]
    pub treatment: Option<Option<String>>,
}

// --- Entity Read Models (Output) ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Dog {
    pub id: i64,
    pub name: String,
    pub gender: i16,
    pub breed: String,
    pub litter_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Vet {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Litter
///
/// Joined with both parents to carry their names and breeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Litter {
    pub id: i64,
    pub sire_id: i64,
    pub sire_name: Option<String>,
    pub sire_breed: Option<String>,
    pub dam_id: i64,
    pub dam_name: Option<String>,
    pub dam_breed: Option<String>,
    pub birthdate: NaiveDate,
    pub birthplace: String,
}

/// HealthRecord
///
/// `vet` is the vet's full name; `dog` and `breed` come from the dog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HealthRecord {
    pub id: i64,
    pub vet_id: i64,
    pub vet: Option<String>,
    pub dog_id: i64,
    pub dog: Option<String>,
    pub breed: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HealthProblem {
    pub id: i64,
    pub vet_id: Option<i64>,
    pub vet_name: Option<String>,
    pub dog_id: Option<i64>,
    pub dog_name: Option<String>,
    pub dog_breed: Option<String>,
    pub health_record_id: i64,
    pub problem: String,
    pub date: NaiveDate,
    pub treatment: Option<String>,
}
