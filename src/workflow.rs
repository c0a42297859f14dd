//! Status machines for tasks and withdrawals.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

/// TaskStatus
///
/// `pending → in_progress → submitted → approved | rejected`, with `rejected → in_progress`
/// for rework. Only `approved` tasks count towards the assignee's earnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Submitted,
    Approved,
    Rejected,
}

/// Who is asking for a task status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskActor {
    Assignee,
    Reviewer,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Submitted,
        TaskStatus::Approved,
        TaskStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Submitted => "submitted",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn can_transition(self, to: TaskStatus, actor: TaskActor) -> bool {
        use TaskStatus::*;
        match actor {
            TaskActor::Assignee => matches!(
                (self, to),
                (Pending, InProgress) | (InProgress, Submitted) | (Rejected, InProgress)
            ),
            TaskActor::Reviewer => matches!((self, to), (Submitted, Approved) | (Submitted, Rejected)),
        }
    }

    /// Pending or being worked on.
    pub fn is_open(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown task status '{value}'"))
    }
}

/// WithdrawalStatus
///
/// Withdrawals start `pending`; an admin approves or rejects them, the requester may cancel.
/// Every non-pending state is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            WithdrawalStatus::Pending,
            WithdrawalStatus::Approved,
            WithdrawalStatus::Rejected,
            WithdrawalStatus::Cancelled,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
    }

    pub fn is_final(self) -> bool {
        self != WithdrawalStatus::Pending
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for WithdrawalStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown withdrawal status '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PayoutMethod {
    Bank,
    Upi,
    Cash,
}

impl PayoutMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutMethod::Bank => "bank",
            PayoutMethod::Upi => "upi",
            PayoutMethod::Cash => "cash",
        }
    }
}

impl TryFrom<String> for PayoutMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "bank" => Ok(PayoutMethod::Bank),
            "upi" => Ok(PayoutMethod::Upi),
            "cash" => Ok(PayoutMethod::Cash),
            _ => Err(format!("unknown payout method '{value}'")),
        }
    }
}
