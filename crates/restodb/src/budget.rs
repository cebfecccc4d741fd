//! Per-project budget summary.
//!
//! Reduces a project's budget categories and expenses into allocated / spent /
//! remaining figures per category plus project totals. Money is
//! [`Decimal`]; `numeric` columns arrive as decimal strings and deserialize
//! without loss.

use crate::client::GenericClient;
use crate::error::{OrmError, OrmResult};
use crate::query::from;
use crate::response::Response;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const PROJECTS: &str = "projects";
pub const BUDGET_CATEGORIES: &str = "budget_categories";
pub const EXPENSES: &str = "expenses";

#[derive(Debug, Clone, Deserialize)]
struct ProjectBudget {
    budget: Option<Decimal>,
}

/// A spending bucket with its planned allocation. A missing or `NULL`
/// allocation counts as zero.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BudgetCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub allocated_amount: Option<Decimal>,
}

/// A recorded expense, optionally filed under a category. A `NULL` amount
/// counts as zero.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    pub allocated: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    /// Share of the allocation already spent; 0 when nothing is allocated, may exceed 100.
    pub percent_used: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub total_budget: Decimal,
    pub total_allocated: Decimal,
    pub total_spent: Decimal,
    pub total_remaining: Decimal,
    /// Budget not yet assigned to any category.
    pub unallocated: Decimal,
    /// Spend on expenses without a (known) category.
    pub uncategorized_spent: Decimal,
    pub percent_used: Decimal,
    pub categories: Vec<CategorySummary>,
}

fn percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part * Decimal::ONE_HUNDRED / whole).round_dp(2)
}

/// Summarize spending against a project budget.
///
/// Categories keep their input order. When the project has no explicit
/// budget, the sum of category allocations stands in for it.
pub fn summarize(
    project_budget: Option<Decimal>,
    categories: &[BudgetCategory],
    expenses: &[Expense],
) -> BudgetSummary {
    let mut spent_by_category: Vec<Decimal> = vec![Decimal::ZERO; categories.len()];
    let mut uncategorized_spent = Decimal::ZERO;

    for expense in expenses {
        let amount = expense.amount.unwrap_or_default();
        let slot = expense
            .category_id
            .and_then(|id| categories.iter().position(|c| c.id == id));
        match slot {
            Some(idx) => spent_by_category[idx] += amount,
            None => uncategorized_spent += amount,
        }
    }

    let summaries: Vec<CategorySummary> = categories
        .iter()
        .zip(spent_by_category)
        .map(|(category, spent)| {
            let allocated = category.allocated_amount.unwrap_or_default();
            CategorySummary {
                id: category.id,
                name: category.name.clone(),
                allocated,
                spent,
                remaining: allocated - spent,
                percent_used: percent(spent, allocated),
            }
        })
        .collect();

    let total_allocated: Decimal = summaries.iter().map(|c| c.allocated).sum();
    let total_spent: Decimal =
        summaries.iter().map(|c| c.spent).sum::<Decimal>() + uncategorized_spent;
    let total_budget = project_budget.unwrap_or(total_allocated);

    BudgetSummary {
        total_budget,
        total_allocated,
        total_spent,
        total_remaining: total_budget - total_spent,
        unallocated: total_budget - total_allocated,
        uncategorized_spent,
        percent_used: percent(total_spent, total_budget),
        categories: summaries,
    }
}

/// Load a project's categories and expenses and summarize them.
///
/// A missing project yields the not-found envelope; any query failure is
/// returned as-is.
pub async fn load_budget_summary(
    conn: &impl GenericClient,
    project_id: i64,
) -> Response<BudgetSummary> {
    load(conn, project_id).await.into()
}

fn required<T>(resp: Response<T>) -> OrmResult<T> {
    resp.into_result()?
        .ok_or_else(|| OrmError::Other("query returned no data".to_string()))
}

async fn load(conn: &impl GenericClient, project_id: i64) -> OrmResult<BudgetSummary> {
    let project: ProjectBudget = required(
        from(PROJECTS)
            .select("id, budget")
            .eq("id", project_id)
            .single(conn)
            .await
            .decode(),
    )?;

    let categories: Vec<BudgetCategory> = required(
        from(BUDGET_CATEGORIES)
            .select("id, name, allocated_amount")
            .eq("project_id", project_id)
            .asc("name")
            .execute(conn)
            .await
            .decode(),
    )?;

    let expenses: Vec<Expense> = required(
        from(EXPENSES)
            .select("id, category_id, amount")
            .eq("project_id", project_id)
            .execute(conn)
            .await
            .decode(),
    )?;

    tracing::debug!(
        project_id,
        categories = categories.len(),
        expenses = expenses.len(),
        "summarizing budget"
    );
    Ok(summarize(project.budget, &categories, &expenses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::NOT_FOUND_CODE;
    use crate::testing::DummyClient;
    use serde_json::json;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn category(id: i64, name: &str, allocated: Decimal) -> BudgetCategory {
        BudgetCategory {
            id,
            name: name.to_string(),
            allocated_amount: Some(allocated),
        }
    }

    fn expense(id: i64, category_id: Option<i64>, amount: Decimal) -> Expense {
        Expense {
            id,
            category_id,
            amount: Some(amount),
        }
    }

    #[test]
    fn spend_is_grouped_per_category() {
        let categories = vec![
            category(1, "Body", d("2000")),
            category(2, "Engine", d("5000")),
        ];
        let expenses = vec![
            expense(1, Some(2), d("1250.50")),
            expense(2, Some(2), d("749.50")),
            expense(3, Some(1), d("500")),
        ];

        let summary = summarize(Some(d("10000")), &categories, &expenses);

        assert_eq!(summary.categories[0].name, "Body");
        assert_eq!(summary.categories[0].spent, d("500"));
        assert_eq!(summary.categories[0].remaining, d("1500"));
        assert_eq!(summary.categories[0].percent_used, d("25"));

        assert_eq!(summary.categories[1].spent, d("2000.00"));
        assert_eq!(summary.categories[1].percent_used, d("40"));

        assert_eq!(summary.total_allocated, d("7000"));
        assert_eq!(summary.total_spent, d("2500"));
        assert_eq!(summary.total_remaining, d("7500"));
        assert_eq!(summary.unallocated, d("3000"));
        assert_eq!(summary.percent_used, d("25"));
    }

    #[test]
    fn uncategorized_and_unknown_categories_are_pooled() {
        let categories = vec![category(1, "Interior", d("800"))];
        let expenses = vec![
            expense(1, None, d("40")),
            expense(2, Some(99), d("60")),
            expense(3, Some(1), d("100")),
        ];

        let summary = summarize(None, &categories, &expenses);

        assert_eq!(summary.uncategorized_spent, d("100"));
        assert_eq!(summary.total_spent, d("200"));
        assert_eq!(summary.total_budget, d("800"));
        assert_eq!(summary.unallocated, Decimal::ZERO);
    }

    #[test]
    fn zero_allocation_reports_zero_percent_and_overspend_exceeds_hundred() {
        let categories = vec![category(1, "Paint", Decimal::ZERO), category(2, "Tires", d("300"))];
        let expenses = vec![expense(1, Some(1), d("10")), expense(2, Some(2), d("450"))];

        let summary = summarize(Some(d("1000")), &categories, &expenses);

        assert_eq!(summary.categories[0].percent_used, Decimal::ZERO);
        assert_eq!(summary.categories[0].remaining, d("-10"));
        assert_eq!(summary.categories[1].percent_used, d("150"));
    }

    #[test]
    fn empty_project_is_all_zero() {
        let summary = summarize(None, &[], &[]);
        assert_eq!(summary.total_budget, Decimal::ZERO);
        assert_eq!(summary.percent_used, Decimal::ZERO);
        assert!(summary.categories.is_empty());
    }

    #[tokio::test]
    async fn load_runs_three_queries_and_summarizes() {
        let client = DummyClient::new()
            .reply_rows(vec![json!({"id": 5, "budget": "12000.00"})])
            .reply_rows(vec![
                json!({"id": 1, "name": "Body", "allocated_amount": "4000.00"}),
                json!({"id": 2, "name": "Engine", "allocated_amount": "6000.00"}),
            ])
            .reply_rows(vec![
                json!({"id": 10, "category_id": 1, "amount": "1000.00"}),
                json!({"id": 11, "category_id": null, "amount": "250.25"}),
            ]);

        let resp = load_budget_summary(&client, 5).await;
        let summary = resp.data.expect("summary expected");

        assert_eq!(summary.total_budget, d("12000"));
        assert_eq!(summary.total_spent, d("1250.25"));
        assert_eq!(summary.categories[0].spent, d("1000"));
        assert_eq!(summary.uncategorized_spent, d("250.25"));

        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].sql, "SELECT id, budget FROM projects WHERE id = $1 LIMIT 1");
        assert_eq!(
            calls[1].sql,
            "SELECT id, name, allocated_amount FROM budget_categories WHERE project_id = $1 ORDER BY name ASC"
        );
        assert_eq!(
            calls[2].sql,
            "SELECT id, category_id, amount FROM expenses WHERE project_id = $1"
        );
        assert!(calls.iter().all(|c| c.params == vec![json!(5)]));
    }

    #[tokio::test]
    async fn null_money_columns_count_as_zero() {
        let client = DummyClient::new()
            .reply_rows(vec![json!({"id": 3, "budget": null})])
            .reply_rows(vec![
                json!({"id": 1, "name": "Chrome", "allocated_amount": null}),
                json!({"id": 2, "name": "Seats", "allocated_amount": "900.00"}),
            ])
            .reply_rows(vec![
                json!({"id": 10, "category_id": 1, "amount": null}),
                json!({"id": 11, "category_id": 2, "amount": "300.00"}),
            ]);

        let resp = load_budget_summary(&client, 3).await;
        assert!(resp.error.is_none(), "{:?}", resp.error);
        let summary = resp.data.expect("summary expected");

        assert_eq!(summary.categories[0].allocated, Decimal::ZERO);
        assert_eq!(summary.categories[0].spent, Decimal::ZERO);
        assert_eq!(summary.categories[0].percent_used, Decimal::ZERO);
        assert_eq!(summary.total_budget, d("900"));
        assert_eq!(summary.total_spent, d("300"));
        assert_eq!(summary.percent_used, d("33.33"));
    }

    #[tokio::test]
    async fn missing_project_is_not_found() {
        let client = DummyClient::new().reply_rows(vec![]);
        let resp = load_budget_summary(&client, 404).await;

        assert!(resp.data.is_none());
        assert_eq!(resp.error.and_then(|e| e.code).as_deref(), Some(NOT_FOUND_CODE));
        assert_eq!(client.calls().len(), 1);
    }
}
