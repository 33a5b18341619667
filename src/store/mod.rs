pub mod json;
pub mod sqlite;

use std::path::Path;

use thiserror::Error;

use crate::model::{Expense, Group, Payment, Student, Teacher};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Which persistence backend a workspace runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Json,
}

impl BackendKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sqlite" => Some(BackendKind::Sqlite),
            "json" => Some(BackendKind::Json),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Sqlite => "sqlite",
            BackendKind::Json => "json",
        }
    }
}

/// Narrow persistence interface over the five entity collections.
///
/// `insert` assigns a fresh identity and returns the stored record. `update`
/// and `delete` report whether the id resolved. No cross-collection
/// constraints, no query filters, no pagination; callers fetch full
/// collections and filter client-side. Implementations must keep reads free
/// of side effects.
pub trait RecordStore {
    fn list_groups(&self) -> Result<Vec<Group>>;
    fn insert_group(&self, group: Group) -> Result<Group>;
    fn update_group(&self, group: &Group) -> Result<bool>;
    fn delete_group(&self, id: &str) -> Result<bool>;

    fn list_students(&self) -> Result<Vec<Student>>;
    fn insert_student(&self, student: Student) -> Result<Student>;
    fn update_student(&self, student: &Student) -> Result<bool>;
    fn delete_student(&self, id: &str) -> Result<bool>;

    fn list_teachers(&self) -> Result<Vec<Teacher>>;
    fn insert_teacher(&self, teacher: Teacher) -> Result<Teacher>;
    fn update_teacher(&self, teacher: &Teacher) -> Result<bool>;
    fn delete_teacher(&self, id: &str) -> Result<bool>;

    fn list_payments(&self) -> Result<Vec<Payment>>;
    fn insert_payment(&self, payment: Payment) -> Result<Payment>;
    fn update_payment(&self, payment: &Payment) -> Result<bool>;
    fn delete_payment(&self, id: &str) -> Result<bool>;

    fn list_expenses(&self) -> Result<Vec<Expense>>;
    fn insert_expense(&self, expense: Expense) -> Result<Expense>;
    fn update_expense(&self, expense: &Expense) -> Result<bool>;
    fn delete_expense(&self, id: &str) -> Result<bool>;
}

/// Opens the chosen backend rooted at `workspace`, creating it on first use.
pub fn open_store(workspace: &Path, kind: BackendKind) -> anyhow::Result<Box<dyn RecordStore>> {
    std::fs::create_dir_all(workspace)?;
    match kind {
        BackendKind::Sqlite => Ok(Box::new(sqlite::SqliteStore::open(workspace)?)),
        BackendKind::Json => Ok(Box::new(json::JsonStore::open(workspace)?)),
    }
}

pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
