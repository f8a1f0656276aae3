use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::services::progression::Grade;

/// One onboarded company, isolated by its own channel credentials.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Tenant {
    pub id: i32,
    pub bot_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i32,
    pub line_user_id: String,
    pub tenant_id: i32,
    pub username: Option<String>,
    /// Normalized grade letter, NULL until first graded.
    pub foot_check_result: Option<String>,
    /// "initial" after grading, "continued" after a weekly answer.
    pub last_program_type: Option<String>,
    /// Next week to deliver; 0 = just graded, not yet advanced.
    pub current_week: i32,
    pub last_response_days: Option<i32>,
    /// Reminder sent and not yet answered. Sole reminder dedup.
    pub question_sent: bool,
    /// Last state-advancing event, the reminder-eligibility clock.
    pub program_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn grade(&self) -> Option<Grade> {
        self.foot_check_result
            .as_deref()
            .and_then(|s| s.chars().next())
            .and_then(Grade::parse)
    }

    pub fn display_name(&self) -> &str {
        match self.username.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "ゲスト",
        }
    }
}

/// One completed week's response. Append-only, feeds the reporting
/// aggregates.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ExerciseHistoryEntry {
    pub id: i64,
    pub user_id: i32,
    pub tenant_id: i32,
    pub response_days: i32,
    pub response_text: String,
    pub week_number: i32,
    pub foot_check_result: String,
    pub response_date: DateTime<Utc>,
}

/// Activity-log entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Received,
    Sent,
    System,
    Error,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Received => "received",
            LogKind::Sent => "sent",
            LogKind::System => "system",
            LogKind::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>, grade: Option<&str>) -> User {
        User {
            id: 1,
            line_user_id: "U1".into(),
            tenant_id: 1,
            username: username.map(Into::into),
            foot_check_result: grade.map(Into::into),
            last_program_type: None,
            current_week: 0,
            last_response_days: None,
            question_sent: false,
            program_sent_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn display_name_falls_back_to_guest() {
        assert_eq!(user(Some("太郎"), None).display_name(), "太郎");
        assert_eq!(user(Some(""), None).display_name(), "ゲスト");
        assert_eq!(user(None, None).display_name(), "ゲスト");
    }

    #[test]
    fn stored_grade_round_trips() {
        assert_eq!(user(None, Some("B")).grade(), Some(Grade::B));
        assert_eq!(user(None, None).grade(), None);
    }
}
