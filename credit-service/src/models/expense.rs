use super::Credits;
use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Salary,
    Rent,
    Utilities,
    Supplies,
    Maintenance,
    Refund,
    Other,
}

impl ExpenseCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ExpenseCategory::Salary => "Salary",
            ExpenseCategory::Rent => "Rent",
            ExpenseCategory::Utilities => "Utilities",
            ExpenseCategory::Supplies => "Supplies",
            ExpenseCategory::Maintenance => "Maintenance",
            ExpenseCategory::Refund => "Refund",
            ExpenseCategory::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: f64,
    pub date: DateTime,
    pub team_member_name: Option<String>,
    pub charged: Credits,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewExpense {
    pub category: ExpenseCategory,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(exclusive_min = 0.0, message = "Amount must be greater than zero"))]
    pub amount: f64,
    /// Defaults to the time of recording.
    pub date: Option<ChronoDateTime<Utc>>,
    #[validate(length(max = 120))]
    pub team_member_name: Option<String>,
}

/// An expense that passed the category rules and awaits its charge.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDraft {
    pub id: String,
    pub tenant_id: String,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: f64,
    pub date: DateTime,
    pub team_member_name: Option<String>,
}

impl ExpenseDraft {
    /// Salary expenses name a team member and describe themselves as
    /// "Salary for <name>"; every other category needs a description.
    pub fn new(tenant_id: &str, expense: NewExpense) -> Result<Self, &'static str> {
        let team_member = expense
            .team_member_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let description = expense
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let (description, team_member_name) = match expense.category {
            ExpenseCategory::Salary => {
                let name = team_member.ok_or("A team member is required for salary expenses")?;
                (format!("Salary for {}", name), Some(name))
            }
            _ => (
                description.ok_or("A description is required for this expense")?,
                None,
            ),
        };

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            category: expense.category,
            description,
            amount: expense.amount,
            date: expense
                .date
                .map(DateTime::from_chrono)
                .unwrap_or_else(DateTime::now),
            team_member_name,
        })
    }

    pub fn into_expense(self, charged: Credits) -> Expense {
        Expense {
            id: self.id,
            tenant_id: self.tenant_id,
            category: self.category,
            description: self.description,
            amount: self.amount,
            date: self.date,
            team_member_name: self.team_member_name,
            charged,
            created_at: DateTime::now(),
        }
    }
}
