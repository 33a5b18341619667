use std::path::Path;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::model::{
    Expense, ExpenseCategory, Group, GroupStatus, Payment, PaymentStatus, Student, Teacher,
};
use crate::store::{new_record_id, RecordStore, Result};

const DB_FILE: &str = "educrm.sqlite3";

/// Embedded relational backend. One table per collection; the schema is
/// (re)created idempotently on open. Cross-collection consistency is the
/// handlers' job, so payments carry no foreign key to students.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(workspace.join(DB_FILE))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS groups(
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                course TEXT NOT NULL,
                days TEXT NOT NULL,
                time TEXT NOT NULL,
                student_count INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS students(
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                phone TEXT NOT NULL,
                age INTEGER NOT NULL,
                source TEXT NOT NULL,
                gender TEXT NOT NULL,
                join_date TEXT NOT NULL,
                parent_name TEXT NOT NULL,
                parent_phone TEXT NOT NULL,
                group_name TEXT NOT NULL,
                payment_amount INTEGER NOT NULL,
                comment TEXT
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS teachers(
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                phone TEXT NOT NULL,
                age INTEGER NOT NULL,
                start_date TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS payments(
                id TEXT PRIMARY KEY,
                student_id TEXT,
                student_name TEXT NOT NULL,
                course TEXT NOT NULL,
                group_name TEXT NOT NULL,
                amount INTEGER NOT NULL,
                due_date TEXT NOT NULL,
                paid_on TEXT,
                status TEXT NOT NULL,
                comment TEXT,
                next_due_date TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_payments_student ON payments(student_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS expenses(
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                amount INTEGER NOT NULL,
                date TEXT NOT NULL,
                category TEXT NOT NULL,
                comment TEXT
            )",
            [],
        )?;

        Ok(Self { conn })
    }
}

fn bad_column(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn date_column(idx: usize, raw: String) -> rusqlite::Result<NaiveDate> {
    raw.parse()
        .map_err(|_| bad_column(idx, format!("bad date: {raw}")))
}

fn opt_date_column(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    raw.map(|s| date_column(idx, s)).transpose()
}

impl RecordStore for SqliteStore {
    fn list_groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, course, days, time, student_count, status FROM groups ORDER BY name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let status: String = row.get(6)?;
                Ok(Group {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    course: row.get(2)?,
                    days: row.get(3)?,
                    time: row.get(4)?,
                    student_count: row.get(5)?,
                    status: GroupStatus::parse(&status)
                        .ok_or_else(|| bad_column(6, format!("bad group status: {status}")))?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert_group(&self, mut group: Group) -> Result<Group> {
        group.id = new_record_id();
        self.conn.execute(
            "INSERT INTO groups(id, name, course, days, time, student_count, status)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                &group.id,
                &group.name,
                &group.course,
                &group.days,
                &group.time,
                group.student_count,
                group.status.as_str(),
            ),
        )?;
        Ok(group)
    }

    fn update_group(&self, group: &Group) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE groups SET name = ?, course = ?, days = ?, time = ?, student_count = ?, status = ?
             WHERE id = ?",
            (
                &group.name,
                &group.course,
                &group.days,
                &group.time,
                group.student_count,
                group.status.as_str(),
                &group.id,
            ),
        )?;
        Ok(changed > 0)
    }

    fn delete_group(&self, id: &str) -> Result<bool> {
        let changed = self.conn.execute("DELETE FROM groups WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    fn list_students(&self) -> Result<Vec<Student>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, first_name, last_name, phone, age, source, gender, join_date,
                    parent_name, parent_phone, group_name, payment_amount, comment
             FROM students ORDER BY last_name, first_name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let join_date: String = row.get(7)?;
                Ok(Student {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    phone: row.get(3)?,
                    age: row.get(4)?,
                    source: row.get(5)?,
                    gender: row.get(6)?,
                    join_date: date_column(7, join_date)?,
                    parent_name: row.get(8)?,
                    parent_phone: row.get(9)?,
                    group: row.get(10)?,
                    payment_amount: row.get(11)?,
                    comment: row.get(12)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert_student(&self, mut student: Student) -> Result<Student> {
        student.id = new_record_id();
        self.conn.execute(
            "INSERT INTO students(
                id, first_name, last_name, phone, age, source, gender, join_date,
                parent_name, parent_phone, group_name, payment_amount, comment
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &student.id,
                &student.first_name,
                &student.last_name,
                &student.phone,
                student.age,
                &student.source,
                &student.gender,
                student.join_date.to_string(),
                &student.parent_name,
                &student.parent_phone,
                &student.group,
                student.payment_amount,
                student.comment.as_deref(),
            ),
        )?;
        Ok(student)
    }

    fn update_student(&self, student: &Student) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE students SET
                first_name = ?, last_name = ?, phone = ?, age = ?, source = ?, gender = ?,
                join_date = ?, parent_name = ?, parent_phone = ?, group_name = ?,
                payment_amount = ?, comment = ?
             WHERE id = ?",
            (
                &student.first_name,
                &student.last_name,
                &student.phone,
                student.age,
                &student.source,
                &student.gender,
                student.join_date.to_string(),
                &student.parent_name,
                &student.parent_phone,
                &student.group,
                student.payment_amount,
                student.comment.as_deref(),
                &student.id,
            ),
        )?;
        Ok(changed > 0)
    }

    fn delete_student(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM students WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    fn list_teachers(&self) -> Result<Vec<Teacher>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, first_name, last_name, phone, age, start_date
             FROM teachers ORDER BY last_name, first_name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let start_date: String = row.get(5)?;
                Ok(Teacher {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    phone: row.get(3)?,
                    age: row.get(4)?,
                    start_date: date_column(5, start_date)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert_teacher(&self, mut teacher: Teacher) -> Result<Teacher> {
        teacher.id = new_record_id();
        self.conn.execute(
            "INSERT INTO teachers(id, first_name, last_name, phone, age, start_date)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &teacher.id,
                &teacher.first_name,
                &teacher.last_name,
                &teacher.phone,
                teacher.age,
                teacher.start_date.to_string(),
            ),
        )?;
        Ok(teacher)
    }

    fn update_teacher(&self, teacher: &Teacher) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE teachers SET first_name = ?, last_name = ?, phone = ?, age = ?, start_date = ?
             WHERE id = ?",
            (
                &teacher.first_name,
                &teacher.last_name,
                &teacher.phone,
                teacher.age,
                teacher.start_date.to_string(),
                &teacher.id,
            ),
        )?;
        Ok(changed > 0)
    }

    fn delete_teacher(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM teachers WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    fn list_payments(&self) -> Result<Vec<Payment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, student_id, student_name, course, group_name, amount, due_date,
                    paid_on, status, comment, next_due_date
             FROM payments ORDER BY due_date, student_name",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let due_date: String = row.get(6)?;
                let paid_on: Option<String> = row.get(7)?;
                let status: String = row.get(8)?;
                let next_due_date: Option<String> = row.get(10)?;
                Ok(Payment {
                    id: row.get(0)?,
                    student_id: row.get(1)?,
                    student_name: row.get(2)?,
                    course: row.get(3)?,
                    group: row.get(4)?,
                    amount: row.get(5)?,
                    due_date: date_column(6, due_date)?,
                    paid_on: opt_date_column(7, paid_on)?,
                    status: PaymentStatus::parse(&status)
                        .ok_or_else(|| bad_column(8, format!("bad payment status: {status}")))?,
                    comment: row.get(9)?,
                    next_due_date: opt_date_column(10, next_due_date)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert_payment(&self, mut payment: Payment) -> Result<Payment> {
        payment.id = new_record_id();
        self.conn.execute(
            "INSERT INTO payments(
                id, student_id, student_name, course, group_name, amount, due_date,
                paid_on, status, comment, next_due_date
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &payment.id,
                payment.student_id.as_deref(),
                &payment.student_name,
                &payment.course,
                &payment.group,
                payment.amount,
                payment.due_date.to_string(),
                payment.paid_on.map(|d| d.to_string()),
                payment.status.as_str(),
                payment.comment.as_deref(),
                payment.next_due_date.map(|d| d.to_string()),
            ),
        )?;
        Ok(payment)
    }

    fn update_payment(&self, payment: &Payment) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE payments SET
                student_id = ?, student_name = ?, course = ?, group_name = ?, amount = ?,
                due_date = ?, paid_on = ?, status = ?, comment = ?, next_due_date = ?
             WHERE id = ?",
            (
                payment.student_id.as_deref(),
                &payment.student_name,
                &payment.course,
                &payment.group,
                payment.amount,
                payment.due_date.to_string(),
                payment.paid_on.map(|d| d.to_string()),
                payment.status.as_str(),
                payment.comment.as_deref(),
                payment.next_due_date.map(|d| d.to_string()),
                &payment.id,
            ),
        )?;
        Ok(changed > 0)
    }

    fn delete_payment(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM payments WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    fn list_expenses(&self) -> Result<Vec<Expense>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, amount, date, category, comment FROM expenses ORDER BY date",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let date: String = row.get(3)?;
                let category: String = row.get(4)?;
                Ok(Expense {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    amount: row.get(2)?,
                    date: date_column(3, date)?,
                    category: ExpenseCategory::parse(&category).ok_or_else(|| {
                        bad_column(4, format!("bad expense category: {category}"))
                    })?,
                    comment: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert_expense(&self, mut expense: Expense) -> Result<Expense> {
        expense.id = new_record_id();
        self.conn.execute(
            "INSERT INTO expenses(id, title, amount, date, category, comment)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &expense.id,
                &expense.title,
                expense.amount,
                expense.date.to_string(),
                expense.category.as_str(),
                expense.comment.as_deref(),
            ),
        )?;
        Ok(expense)
    }

    fn update_expense(&self, expense: &Expense) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE expenses SET title = ?, amount = ?, date = ?, category = ?, comment = ?
             WHERE id = ?",
            (
                &expense.title,
                expense.amount,
                expense.date.to_string(),
                expense.category.as_str(),
                expense.comment.as_deref(),
                &expense.id,
            ),
        )?;
        Ok(changed > 0)
    }

    fn delete_expense(&self, id: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM expenses WHERE id = ?", [id])?;
        Ok(changed > 0)
    }
}
