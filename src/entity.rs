//! Entity descriptors.
//!
//! Every table the generic CRUD layer can touch is described here, once, at compile time:
//! its name, which columns a create must carry, which it may carry, which an update may
//! change, the read projection, and which roles may use each route. SQL identifiers are
//! only ever taken from these descriptors, never from request input.

use chrono::NaiveDate;
use serde::{Serialize, de::DeserializeOwned};
use validator::Validate;

use crate::models::{
    CreateDog, CreateHealthProblem, CreateHealthRecord, CreateLitter, CreateVet, Dog,
    HealthProblem, HealthRecord, Litter, Role, UpdateDog, UpdateHealthProblem,
    UpdateHealthRecord, UpdateLitter, UpdateVet, Vet,
};

/// A bound value for one column. Nulls stay typed so PostgreSQL can infer the parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    BigInt(Option<i64>),
    SmallInt(Option<i16>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub value: ColumnValue,
}

impl Column {
    fn new(name: &'static str, value: ColumnValue) -> Self {
        Self { name, value }
    }
}

/// Payloads that can be flattened into `(column, value)` pairs.
///
/// Create payloads yield every required and optional column; update payloads yield
/// only the columns the client actually supplied.
pub trait IntoColumns {
    fn into_columns(self) -> Vec<Column>;
}

/// Roles allowed on each route of an entity.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    /// `GET` collection and `GET` by id.
    pub read: &'static [Role],
    /// `POST` and `PUT`.
    pub write: &'static [Role],
    /// `DELETE`.
    pub delete: &'static [Role],
}

#[derive(Debug)]
pub struct EntityDescriptor {
    pub table: &'static str,
    /// Collection path, e.g. `/dogs`.
    pub path: &'static str,
    pub required_fields: &'static [&'static str],
    pub optional_fields: &'static [&'static str],
    pub updatable_fields: &'static [&'static str],
    /// Read projection. Must expose an `id` column.
    pub select: &'static str,
    pub policy: AccessPolicy,
}

impl EntityDescriptor {
    /// Human label used in response messages: `health_record` reads as `health record`.
    pub fn label(&self) -> String {
        self.table.replace('_', " ")
    }

    pub fn is_insertable(&self, field: &str) -> bool {
        self.required_fields.contains(&field) || self.optional_fields.contains(&field)
    }

    pub fn is_updatable(&self, field: &str) -> bool {
        self.updatable_fields.contains(&field)
    }
}

/// Entity
///
/// Ties a descriptor to its typed input and output schemas so handlers can be written once
/// and instantiated per entity.
pub trait Entity: Send + Sync + 'static {
    const DESCRIPTOR: &'static EntityDescriptor;

    type Record: DeserializeOwned + Serialize + Send;
    type Create: DeserializeOwned + Validate + IntoColumns + Send;
    type Update: DeserializeOwned + Validate + IntoColumns + Send;
}

const EVERYONE: &[Role] = &[Role::Buyer, Role::Breeder, Role::Vet, Role::Admin];
const BREEDER_ADMIN: &[Role] = &[Role::Breeder, Role::Admin];
const ADMIN: &[Role] = &[Role::Admin];

// --- dog ---

pub struct Dogs;

pub static DOG: EntityDescriptor = EntityDescriptor {
    table: "dog",
    path: "/dogs",
    required_fields: &["name", "gender", "breed"],
    optional_fields: &["litter_id"],
    updatable_fields: &["name", "gender", "breed", "litter_id"],
    select: "SELECT id, name, gender, breed, litter_id FROM dog",
    policy: AccessPolicy {
        read: EVERYONE,
        write: &[Role::Admin, Role::Breeder],
        delete: ADMIN,
    },
};

impl Entity for Dogs {
    const DESCRIPTOR: &'static EntityDescriptor = &DOG;
    type Record = Dog;
    type Create = CreateDog;
    type Update = UpdateDog;
}

impl IntoColumns for CreateDog {
    fn into_columns(self) -> Vec<Column> {
        vec![
            Column::new("name", ColumnValue::Text(Some(self.name))),
            Column::new("gender", ColumnValue::SmallInt(Some(self.gender))),
            Column::new("breed", ColumnValue::Text(Some(self.breed))),
            Column::new("litter_id", ColumnValue::BigInt(self.litter_id)),
        ]
    }
}

impl IntoColumns for UpdateDog {
    fn into_columns(self) -> Vec<Column> {
        let mut columns = Vec::new();
        if let Some(name) = self.name {
            columns.push(Column::new("name", ColumnValue::Text(Some(name))));
        }
        if let Some(gender) = self.gender {
            columns.push(Column::new("gender", ColumnValue::SmallInt(Some(gender))));
        }
        if let Some(breed) = self.breed {
            columns.push(Column::new("breed", ColumnValue::Text(Some(breed))));
        }
        if let Some(litter_id) = self.litter_id {
            columns.push(Column::new("litter_id", ColumnValue::BigInt(litter_id)));
        }
        columns
    }
}

// --- vet ---

pub struct Vets;

pub static VET: EntityDescriptor = EntityDescriptor {
    table: "vet",
    path: "/vets",
    required_fields: &["firstname", "lastname"],
    optional_fields: &["email", "phone"],
    updatable_fields: &["firstname", "lastname", "email", "phone"],
    select: "SELECT id, firstname, lastname, email, phone FROM vet",
    policy: AccessPolicy {
        read: BREEDER_ADMIN,
        write: ADMIN,
        delete: ADMIN,
    },
};

impl Entity for Vets {
    const DESCRIPTOR: &'static EntityDescriptor = &VET;
    type Record = Vet;
    type Create = CreateVet;
    type Update = UpdateVet;
}

impl IntoColumns for CreateVet {
    fn into_columns(self) -> Vec<Column> {
        vec![
            Column::new("firstname", ColumnValue::Text(Some(self.firstname))),
            Column::new("lastname", ColumnValue::Text(Some(self.lastname))),
            Column::new("email", ColumnValue::Text(self.email)),
            Column::new("phone", ColumnValue::Text(self.phone)),
        ]
    }
}

impl IntoColumns for UpdateVet {
    fn into_columns(self) -> Vec<Column> {
        let mut columns = Vec::new();
        if let Some(firstname) = self.firstname {
            columns.push(Column::new("firstname", ColumnValue::Text(Some(firstname))));
        }
        if let Some(lastname) = self.lastname {
            columns.push(Column::new("lastname", ColumnValue::Text(Some(lastname))));
        }
        if let Some(email) = self.email {
            columns.push(Column::new("email", ColumnValue::Text(email)));
        }
        if let Some(phone) = self.phone {
            columns.push(Column::new("phone", ColumnValue::Text(phone)));
        }
        columns
    }
}

// --- health_record ---

pub struct HealthRecords;

pub static HEALTH_RECORD: EntityDescriptor = EntityDescriptor {
    table: "health_record",
    path: "/health_records",
    required_fields: &["dog_id", "vet_id"],
    optional_fields: &[],
    updatable_fields: &["dog_id", "vet_id"],
    select: "SELECT
            health_record.id,
            health_record.vet_id,
            CONCAT_WS(' ', vet.firstname, vet.lastname) AS vet,
            health_record.dog_id,
            dog.name AS dog,
            dog.breed
        FROM health_record
        JOIN dog ON health_record.dog_id = dog.id
        JOIN vet ON health_record.vet_id = vet.id",
    policy: AccessPolicy {
        read: EVERYONE,
        write: &[Role::Breeder, Role::Vet, Role::Admin],
        delete: ADMIN,
    },
};

impl Entity for HealthRecords {
    const DESCRIPTOR: &'static EntityDescriptor = &HEALTH_RECORD;
    type Record = HealthRecord;
    type Create = CreateHealthRecord;
    type Update = UpdateHealthRecord;
}

impl IntoColumns for CreateHealthRecord {
    fn into_columns(self) -> Vec<Column> {
        vec![
            Column::new("dog_id", ColumnValue::BigInt(Some(self.dog_id))),
            Column::new("vet_id", ColumnValue::BigInt(Some(self.vet_id))),
        ]
    }
}

impl IntoColumns for UpdateHealthRecord {
    fn into_columns(self) -> Vec<Column> {
        [("dog_id", self.dog_id), ("vet_id", self.vet_id)]
            .into_iter()
            .filter_map(|(name, id)| id.map(|id| Column::new(name, ColumnValue::BigInt(Some(id)))))
            .collect()
    }
}

// --- litter ---

pub struct Litters;

pub static LITTER: EntityDescriptor = EntityDescriptor {
    table: "litter",
    path: "/litters",
    required_fields: &["sire_id", "dam_id", "birthdate", "birthplace"],
    optional_fields: &[],
    updatable_fields: &["sire_id", "dam_id", "birthdate", "birthplace"],
    select: "SELECT
            litter.id,
            litter.sire_id,
            sire.name AS sire_name,
            sire.breed AS sire_breed,
            litter.dam_id,
            dam.name AS dam_name,
            dam.breed AS dam_breed,
            litter.birthdate,
            litter.birthplace
        FROM litter
        JOIN dog sire ON sire.id = litter.sire_id
        JOIN dog dam ON dam.id = litter.dam_id",
    policy: AccessPolicy {
        read: BREEDER_ADMIN,
        write: BREEDER_ADMIN,
        delete: ADMIN,
    },
};

impl Entity for Litters {
    const DESCRIPTOR: &'static EntityDescriptor = &LITTER;
    type Record = Litter;
    type Create = CreateLitter;
    type Update = UpdateLitter;
}

impl IntoColumns for CreateLitter {
    fn into_columns(self) -> Vec<Column> {
        vec![
            Column::new("sire_id", ColumnValue::BigInt(Some(self.sire_id))),
            Column::new("dam_id", ColumnValue::BigInt(Some(self.dam_id))),
            Column::new("birthdate", ColumnValue::Date(Some(self.birthdate))),
            Column::new("birthplace", ColumnValue::Text(Some(self.birthplace))),
        ]
    }
}

impl IntoColumns for UpdateLitter {
    fn into_columns(self) -> Vec<Column> {
        let mut columns = Vec::new();
        if let Some(sire_id) = self.sire_id {
            columns.push(Column::new("sire_id", ColumnValue::BigInt(Some(sire_id))));
        }
        if let Some(dam_id) = self.dam_id {
            columns.push(Column::new("dam_id", ColumnValue::BigInt(Some(dam_id))));
        }
        if let Some(birthdate) = self.birthdate {
            columns.push(Column::new("birthdate", ColumnValue::Date(Some(birthdate))));
        }
        if let Some(birthplace) = self.birthplace {
            columns.push(Column::new("birthplace", ColumnValue::Text(Some(birthplace))));
        }
        columns
    }
}

// --- health_problem ---

pub struct HealthProblems;

pub static HEALTH_PROBLEM: EntityDescriptor = EntityDescriptor {
    table: "health_problem",
    path: "/health_problems",
    required_fields: &["health_record_id", "problem", "date"],
    optional_fields: &["treatment"],
    updatable_fields: &["health_record_id", "problem", "date", "treatment"],
    select: "SELECT
            health_problem.id,
            vet.id AS vet_id,
            CONCAT_WS(' ', vet.firstname, vet.lastname) AS vet_name,
            dog.id AS dog_id,
            dog.name AS dog_name,
            dog.breed AS dog_breed,
            health_problem.health_record_id,
            health_problem.problem,
            health_problem.date,
            health_problem.treatment
        FROM health_problem
        JOIN health_record ON health_record.id = health_problem.health_record_id
        JOIN vet ON health_record.vet_id = vet.id
        JOIN dog ON health_record.dog_id = dog.id",
    policy: AccessPolicy {
        read: EVERYONE,
        write: &[Role::Vet, Role::Admin],
        delete: ADMIN,
    },
};

impl Entity for HealthProblems {
    const DESCRIPTOR: &'static EntityDescriptor = &HEALTH_PROBLEM;
    type Record = HealthProblem;
    type Create = CreateHealthProblem;
    type Update = UpdateHealthProblem;
}

impl IntoColumns for CreateHealthProblem {
    fn into_columns(self) -> Vec<Column> {
        vec![
            Column::new("health_record_id", ColumnValue::BigInt(Some(self.health_record_id))),
            Column::new("problem", ColumnValue::Text(Some(self.problem))),
            Column::new("date", ColumnValue::Date(Some(self.date))),
            Column::new("treatment", ColumnValue::Text(self.treatment)),
        ]
    }
}

impl IntoColumns for UpdateHealthProblem {
    fn into_columns(self) -> Vec<Column> {
        let mut columns = Vec::new();
        if let Some(health_record_id) = self.health_record_id {
            columns.push(Column::new(
                "health_record_id",
                ColumnValue::BigInt(Some(health_record_id)),
            ));
        }
        if let Some(problem) = self.problem {
            columns.push(Column::new("problem", ColumnValue::Text(Some(problem))));
        }
        if let Some(date) = self.date {
            columns.push(Column::new("date", ColumnValue::Date(Some(date))));
        }
        if let Some(treatment) = self.treatment {
            columns.push(Column::new("treatment", ColumnValue::Text(treatment)));
        }
        columns
    }
}

/// Every descriptor, in route registration order.
pub static ALL: [&EntityDescriptor; 5] = [&DOG, &VET, &HEALTH_RECORD, &LITTER, &HEALTH_PROBLEM];
