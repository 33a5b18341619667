use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::model::{Expense, Payment, PaymentStatus};

/// Unpaid payments due within this many days of "today" count as upcoming.
/// Due dates further out are neither upcoming nor overdue.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

/// Reference month token for bucketing revenue and expenses ("YYYY-MM").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn parse(token: &str) -> Option<Self> {
        let (y, m) = token.split_once('-')?;
        if y.len() != 4 || m.len() != 2 {
            return None;
        }
        let year: i32 = y.parse().ok()?;
        let month: u32 = m.parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(YearMonth { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceSummary {
    /// Paid payments settled within the reference month.
    pub monthly_revenue: i64,
    /// Expenses dated within the reference month.
    pub monthly_expenses: i64,
    /// All outstanding unpaid amounts, regardless of due date.
    pub total_debt: i64,
    /// All-time paid income.
    pub total_income: i64,
    /// All-time expenses.
    pub total_expenses: i64,
    /// `total_income - total_expenses`; may go negative.
    pub net_profit: i64,
}

pub fn summarize(payments: &[Payment], expenses: &[Expense], month: YearMonth) -> FinanceSummary {
    let mut out = FinanceSummary::default();

    for p in payments {
        match p.status {
            PaymentStatus::Paid => {
                out.total_income += p.amount;
                // Revenue buckets on the settlement date, not the due date.
                if p.paid_on.map(|d| month.contains(d)).unwrap_or(false) {
                    out.monthly_revenue += p.amount;
                }
            }
            PaymentStatus::Unpaid => out.total_debt += p.amount,
        }
    }

    for e in expenses {
        out.total_expenses += e.amount;
        if month.contains(e.date) {
            out.monthly_expenses += e.amount;
        }
    }

    out.net_profit = out.total_income - out.total_expenses;
    out
}

/// Whole days from `today` to `due`; negative once the due date has passed.
pub fn days_until_due(due: NaiveDate, today: NaiveDate) -> i64 {
    (due - today).num_days()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentView {
    All,
    Overdue,
    Upcoming,
    Paid,
}

impl PaymentView {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(PaymentView::All),
            "overdue" => Some(PaymentView::Overdue),
            "upcoming" => Some(PaymentView::Upcoming),
            "paid" => Some(PaymentView::Paid),
            _ => None,
        }
    }
}

pub fn matches_view(payment: &Payment, view: PaymentView, today: NaiveDate) -> bool {
    match view {
        PaymentView::All => true,
        PaymentView::Paid => payment.status == PaymentStatus::Paid,
        PaymentView::Overdue => {
            payment.status == PaymentStatus::Unpaid
                && days_until_due(payment.due_date, today) < 0
        }
        PaymentView::Upcoming => {
            let days = days_until_due(payment.due_date, today);
            payment.status == PaymentStatus::Unpaid
                && (0..=UPCOMING_WINDOW_DAYS).contains(&days)
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewStats {
    pub count: usize,
    pub amount: i64,
}

/// Per-view counters for the ledger screen's header cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub overdue: ViewStats,
    pub upcoming: ViewStats,
    pub paid: ViewStats,
}

pub fn ledger_stats(payments: &[Payment], today: NaiveDate) -> LedgerStats {
    let mut stats = LedgerStats::default();
    for p in payments {
        for (view, slot) in [
            (PaymentView::Overdue, &mut stats.overdue),
            (PaymentView::Upcoming, &mut stats.upcoming),
            (PaymentView::Paid, &mut stats.paid),
        ] {
            if matches_view(p, view, today) {
                slot.count += 1;
                slot.amount += p.amount;
            }
        }
    }
    stats
}

/// Next monthly anniversary of a date, clamped to the end of shorter months
/// (Jan 31 -> Feb 28/29).
pub fn add_one_month(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(1)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExpenseCategory, PaymentStatus};

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("date literal")
    }

    fn payment(amount: i64, status: PaymentStatus, due: &str, paid_on: Option<&str>) -> Payment {
        Payment {
            id: "p".into(),
            student_id: None,
            student_name: "Ali Valiyev".into(),
            course: "English".into(),
            group: "A-1".into(),
            amount,
            due_date: date(due),
            paid_on: paid_on.map(date),
            status,
            comment: None,
            next_due_date: None,
        }
    }

    fn expense(amount: i64, on: &str) -> Expense {
        Expense {
            id: "e".into(),
            title: "rent".into(),
            amount,
            date: date(on),
            category: ExpenseCategory::Rent,
            comment: None,
        }
    }

    #[test]
    fn empty_collections_sum_to_zero() {
        let s = summarize(&[], &[], YearMonth::parse("2024-06").expect("month"));
        assert_eq!(s, FinanceSummary::default());
    }

    #[test]
    fn month_token_parsing() {
        assert_eq!(
            YearMonth::parse("2024-06"),
            Some(YearMonth { year: 2024, month: 6 })
        );
        assert_eq!(YearMonth::parse("2024-13"), None);
        assert_eq!(YearMonth::parse("2024-6"), None);
        assert_eq!(YearMonth::parse("garbage"), None);
        assert_eq!(YearMonth::parse("2024-06").expect("month").to_string(), "2024-06");
    }

    #[test]
    fn summary_matches_reference_month_scenario() {
        // Rent 300000 on 2024-06-05 plus a payment settled 2024-06-01.
        let payments = [payment(500_000, PaymentStatus::Paid, "2024-06-01", Some("2024-06-01"))];
        let expenses = [expense(300_000, "2024-06-05")];
        let s = summarize(&payments, &expenses, YearMonth::parse("2024-06").expect("month"));
        assert_eq!(s.monthly_revenue, 500_000);
        assert_eq!(s.monthly_expenses, 300_000);
        assert_eq!(s.net_profit, 200_000);
        assert_eq!(s.total_debt, 0);
    }

    #[test]
    fn monthly_revenue_never_exceeds_total_income() {
        let payments = [
            payment(100, PaymentStatus::Paid, "2024-05-01", Some("2024-05-20")),
            payment(250, PaymentStatus::Paid, "2024-06-01", Some("2024-06-03")),
            payment(900, PaymentStatus::Unpaid, "2024-06-10", None),
        ];
        let s = summarize(&payments, &[], YearMonth::parse("2024-06").expect("month"));
        assert!(s.monthly_revenue <= s.total_income);
        assert!(s.monthly_revenue >= 0 && s.total_income >= 0);
        assert_eq!(s.monthly_revenue, 250);
        assert_eq!(s.total_income, 350);
        assert_eq!(s.total_debt, 900);
    }

    #[test]
    fn revenue_buckets_on_settlement_date_not_due_date() {
        // Due in May, settled in June: June revenue.
        let payments = [payment(400, PaymentStatus::Paid, "2024-05-01", Some("2024-06-02"))];
        let june = summarize(&payments, &[], YearMonth::parse("2024-06").expect("month"));
        let may = summarize(&payments, &[], YearMonth::parse("2024-05").expect("month"));
        assert_eq!(june.monthly_revenue, 400);
        assert_eq!(may.monthly_revenue, 0);
    }

    #[test]
    fn net_profit_can_go_negative() {
        let expenses = [expense(1_000, "2024-06-01")];
        let s = summarize(&[], &expenses, YearMonth::parse("2024-06").expect("month"));
        assert_eq!(s.net_profit, -1_000);
    }

    #[test]
    fn overdue_payment_is_never_upcoming_or_paid() {
        // Today 2024-06-20, unpaid due 2024-06-10 => -10 days.
        let today = date("2024-06-20");
        let p = payment(500_000, PaymentStatus::Unpaid, "2024-06-10", None);
        assert_eq!(days_until_due(p.due_date, today), -10);
        assert!(matches_view(&p, PaymentView::Overdue, today));
        assert!(!matches_view(&p, PaymentView::Upcoming, today));
        assert!(!matches_view(&p, PaymentView::Paid, today));
        assert!(matches_view(&p, PaymentView::All, today));
    }

    #[test]
    fn upcoming_window_is_bounded_at_seven_days() {
        let today = date("2024-06-01");
        let due_today = payment(1, PaymentStatus::Unpaid, "2024-06-01", None);
        let due_in_7 = payment(1, PaymentStatus::Unpaid, "2024-06-08", None);
        let due_in_8 = payment(1, PaymentStatus::Unpaid, "2024-06-09", None);
        assert!(matches_view(&due_today, PaymentView::Upcoming, today));
        assert!(matches_view(&due_in_7, PaymentView::Upcoming, today));
        assert!(!matches_view(&due_in_8, PaymentView::Upcoming, today));
        assert!(!matches_view(&due_in_8, PaymentView::Overdue, today));
    }

    #[test]
    fn paid_view_ignores_dates() {
        let today = date("2020-01-01");
        let p = payment(1, PaymentStatus::Paid, "2024-06-01", Some("2024-06-15"));
        assert!(matches_view(&p, PaymentView::Paid, today));
        assert!(!matches_view(&p, PaymentView::Overdue, today));
        assert!(!matches_view(&p, PaymentView::Upcoming, today));
    }

    #[test]
    fn ledger_stats_count_amounts_per_view() {
        let today = date("2024-06-10");
        let payments = [
            payment(100, PaymentStatus::Unpaid, "2024-06-01", None),
            payment(200, PaymentStatus::Unpaid, "2024-06-12", None),
            payment(300, PaymentStatus::Paid, "2024-06-01", Some("2024-06-05")),
        ];
        let stats = ledger_stats(&payments, today);
        assert_eq!(stats.overdue, ViewStats { count: 1, amount: 100 });
        assert_eq!(stats.upcoming, ViewStats { count: 1, amount: 200 });
        assert_eq!(stats.paid, ViewStats { count: 1, amount: 300 });
    }

    #[test]
    fn add_one_month_clamps_to_month_end() {
        assert_eq!(add_one_month(date("2024-06-01")), date("2024-07-01"));
        assert_eq!(add_one_month(date("2024-01-31")), date("2024-02-29"));
        assert_eq!(add_one_month(date("2023-01-31")), date("2023-02-28"));
        assert_eq!(add_one_month(date("2024-12-15")), date("2025-01-15"));
    }
}
