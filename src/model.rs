use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle of a group. Archived groups stay listed but no longer count as
/// running courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Active,
    Archived,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupStatus::Active => "active",
            GroupStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(GroupStatus::Active),
            "archived" => Some(GroupStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unpaid" => Some(PaymentStatus::Unpaid),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Rent,
    Salary,
    Utility,
    Office,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpenseCategory::Rent => "rent",
            ExpenseCategory::Salary => "salary",
            ExpenseCategory::Utility => "utility",
            ExpenseCategory::Office => "office",
            ExpenseCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rent" => Some(ExpenseCategory::Rent),
            "salary" => Some(ExpenseCategory::Salary),
            "utility" => Some(ExpenseCategory::Utility),
            "office" => Some(ExpenseCategory::Office),
            "other" => Some(ExpenseCategory::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub course: String,
    pub days: String,
    pub time: String,
    /// Cached display count. Not reconciled against actual membership.
    pub student_count: i64,
    pub status: GroupStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub age: i64,
    pub source: String,
    pub gender: String,
    pub join_date: NaiveDate,
    pub parent_name: String,
    pub parent_phone: String,
    /// Group name reference, not a foreign key.
    pub group: String,
    /// Recurring monthly due amount.
    pub payment_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub age: i64,
    pub start_date: NaiveDate,
}

/// A ledger entry. Issued unpaid against a student's monthly due, or entered
/// directly as paid income. `due_date` is fixed at creation; `paid_on` is
/// stamped on settlement, so the original obligation date is never lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    /// Identity link to the owning student. Absent for free-form income
    /// entries. The `student_name` next to it is a display snapshot taken at
    /// creation time and is deliberately not updated on rename.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    pub student_name: String,
    pub course: String,
    pub group: String,
    pub amount: i64,
    pub due_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_on: Option<NaiveDate>,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub title: String,
    pub amount: i64,
    pub date: NaiveDate,
    pub category: ExpenseCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
