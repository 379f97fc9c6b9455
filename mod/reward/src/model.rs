use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Payment method & withdrawal status
// ---------------------------------------------------------------------------

/// Supported payout channels. The wire tokens are the display names
/// clients already send, spaces included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "PayPal")]
    PayPal,
    #[serde(rename = "Mobile Money")]
    MobileMoney,
    #[serde(rename = "Bank Transfer")]
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PayPal => "PayPal",
            Self::MobileMoney => "Mobile Money",
            Self::BankTransfer => "Bank Transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PayPal" => Some(Self::PayPal),
            "Mobile Money" => Some(Self::MobileMoney),
            "Bank Transfer" => Some(Self::BankTransfer),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawStatus {
    Pending,
    Completed,
    Failed,
}

impl WithdrawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger records
// ---------------------------------------------------------------------------

/// One credit for one completed task. Immutable once written; the task
/// id doubles as the idempotency key, so a task can never pay twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardEntry {
    pub task_id: i64,
    pub user_id: i64,
    pub task_title: String,
    pub amount: Decimal,
    pub created_at: String,
}

/// A worker-initiated payout of accrued balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub id: String,
    pub user_id: i64,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub status: WithdrawStatus,
    pub request_date: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// API request / response types
// ---------------------------------------------------------------------------

/// Body for `POST /reward/withdraw`. The payment method stays a plain
/// string here so an unsupported value surfaces as a validation error
/// instead of a body-decode rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawBody {
    pub amount: Decimal,
    pub payment_method: String,
}

/// One page of reward history, with the all-time sum alongside.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardHistoryPage {
    pub items: Vec<RewardEntry>,
    pub total: usize,
    /// Exact sum over the worker's entire ledger, not just this page.
    pub total_reward: Decimal,
}
