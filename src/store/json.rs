use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::model::{Expense, Group, Payment, Student, Teacher};
use crate::store::{new_record_id, RecordStore, Result};

const GROUPS_FILE: &str = "groups.json";
const STUDENTS_FILE: &str = "students.json";
const TEACHERS_FILE: &str = "teachers.json";
const PAYMENTS_FILE: &str = "payments.json";
const EXPENSES_FILE: &str = "expenses.json";

/// File-per-collection JSON backend. Each collection is a single array file
/// under the workspace directory; every mutation rewrites the file through a
/// tmp-and-rename step. A missing file reads as an empty collection without
/// being created, so reads never write.
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(workspace)?;
        Ok(Self {
            root: workspace.to_path_buf(),
        })
    }

    fn collection_path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    fn load<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.collection_path(file);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn save<T: Serialize>(&self, file: &str, records: &[T]) -> Result<()> {
        let path = self.collection_path(file);
        let json = serde_json::to_string_pretty(records)?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            f.flush()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn insert_record<T, F>(&self, file: &str, mut record: T, set_id: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce(&mut T, String),
    {
        let mut records: Vec<T> = self.load(file)?;
        set_id(&mut record, new_record_id());
        records.push(record.clone());
        self.save(file, &records)?;
        Ok(record)
    }

    fn update_record<T, F>(&self, file: &str, record: &T, id_of: F) -> Result<bool>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: Fn(&T) -> &str,
    {
        let mut records: Vec<T> = self.load(file)?;
        let Some(slot) = records.iter_mut().find(|r| id_of(r) == id_of(record)) else {
            return Ok(false);
        };
        *slot = record.clone();
        self.save(file, &records)?;
        Ok(true)
    }

    fn delete_record<T, F>(&self, file: &str, id: &str, id_of: F) -> Result<bool>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&T) -> &str,
    {
        let mut records: Vec<T> = self.load(file)?;
        let before = records.len();
        records.retain(|r| id_of(r) != id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(file, &records)?;
        Ok(true)
    }
}

impl RecordStore for JsonStore {
    fn list_groups(&self) -> Result<Vec<Group>> {
        self.load(GROUPS_FILE)
    }

    fn insert_group(&self, group: Group) -> Result<Group> {
        self.insert_record(GROUPS_FILE, group, |g, id| g.id = id)
    }

    fn update_group(&self, group: &Group) -> Result<bool> {
        self.update_record(GROUPS_FILE, group, |g: &Group| g.id.as_str())
    }

    fn delete_group(&self, id: &str) -> Result<bool> {
        self.delete_record(GROUPS_FILE, id, |g: &Group| g.id.as_str())
    }

    fn list_students(&self) -> Result<Vec<Student>> {
        self.load(STUDENTS_FILE)
    }

    fn insert_student(&self, student: Student) -> Result<Student> {
        self.insert_record(STUDENTS_FILE, student, |s, id| s.id = id)
    }

    fn update_student(&self, student: &Student) -> Result<bool> {
        self.update_record(STUDENTS_FILE, student, |s: &Student| s.id.as_str())
    }

    fn delete_student(&self, id: &str) -> Result<bool> {
        self.delete_record(STUDENTS_FILE, id, |s: &Student| s.id.as_str())
    }

    fn list_teachers(&self) -> Result<Vec<Teacher>> {
        self.load(TEACHERS_FILE)
    }

    fn insert_teacher(&self, teacher: Teacher) -> Result<Teacher> {
        self.insert_record(TEACHERS_FILE, teacher, |t, id| t.id = id)
    }

    fn update_teacher(&self, teacher: &Teacher) -> Result<bool> {
        self.update_record(TEACHERS_FILE, teacher, |t: &Teacher| t.id.as_str())
    }

    fn delete_teacher(&self, id: &str) -> Result<bool> {
        self.delete_record(TEACHERS_FILE, id, |t: &Teacher| t.id.as_str())
    }

    fn list_payments(&self) -> Result<Vec<Payment>> {
        self.load(PAYMENTS_FILE)
    }

    fn insert_payment(&self, payment: Payment) -> Result<Payment> {
        self.insert_record(PAYMENTS_FILE, payment, |p, id| p.id = id)
    }

    fn update_payment(&self, payment: &Payment) -> Result<bool> {
        self.update_record(PAYMENTS_FILE, payment, |p: &Payment| p.id.as_str())
    }

    fn delete_payment(&self, id: &str) -> Result<bool> {
        self.delete_record(PAYMENTS_FILE, id, |p: &Payment| p.id.as_str())
    }

    fn list_expenses(&self) -> Result<Vec<Expense>> {
        self.load(EXPENSES_FILE)
    }

    fn insert_expense(&self, expense: Expense) -> Result<Expense> {
        self.insert_record(EXPENSES_FILE, expense, |e, id| e.id = id)
    }

    fn update_expense(&self, expense: &Expense) -> Result<bool> {
        self.update_record(EXPENSES_FILE, expense, |e: &Expense| e.id.as_str())
    }

    fn delete_expense(&self, id: &str) -> Result<bool> {
        self.delete_record(EXPENSES_FILE, id, |e: &Expense| e.id.as_str())
    }
}
