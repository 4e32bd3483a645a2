use super::Credits;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const GLOBAL_PRICING_ID: &str = "global";

/// Platform-wide credit prices, stored as a single settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(rename = "_id")]
    pub id: String,
    pub job_card_cost: Credits,
    pub expense_cost: Credits,
    pub min_top_up: Credits,
    pub updated_at: DateTime,
}

impl PricingConfig {
    pub fn new(job_card_cost: Credits, expense_cost: Credits, min_top_up: Credits) -> Self {
        Self {
            id: GLOBAL_PRICING_ID.to_string(),
            job_card_cost,
            expense_cost,
            min_top_up,
            updated_at: DateTime::now(),
        }
    }

    pub fn cost_of(&self, action: CreditAction) -> Credits {
        match action {
            CreditAction::JobCard => self.job_card_cost,
            CreditAction::Expense => self.expense_cost,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self::new(
            Credits::from_hundredths(150),
            Credits::from_hundredths(50),
            Credits::from_whole(50),
        )
    }
}

/// Actions that consume credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditAction {
    JobCard,
    Expense,
}

impl CreditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            CreditAction::JobCard => "job_card",
            CreditAction::Expense => "expense",
        }
    }

    /// Phrase completing "You need N credits to ...".
    pub fn purpose(self) -> &'static str {
        match self {
            CreditAction::JobCard => "create a job card",
            CreditAction::Expense => "record an expense",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PricingUpdate {
    #[validate(range(min = 0.0, message = "Job card cost cannot be negative"))]
    pub job_card_cost: f64,
    #[validate(range(min = 0.0, message = "Expense cost cannot be negative"))]
    pub expense_cost: f64,
    #[validate(range(min = 0.0, message = "Minimum top-up cannot be negative"))]
    pub min_top_up: f64,
}

impl PricingUpdate {
    pub fn to_config(&self) -> Option<PricingConfig> {
        Some(PricingConfig::new(
            Credits::from_decimal(self.job_card_cost)?,
            Credits::from_decimal(self.expense_cost)?,
            Credits::from_decimal(self.min_top_up)?,
        ))
    }
}
