//! Account lifecycle rules and bulk provisioning.

use actix_web::HttpResponse;
use metrics::increment_counter;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::AccountPolicyKind;
use crate::models::{NewUser, User};
use crate::repo::{RepoError, UserRepo};

/// Hooks the login flow calls around account creation and inactive logins.
pub trait AccountPolicy: Send + Sync {
    fn name(&self) -> &'static str;
    fn on_user_created(&self, user: NewUser) -> NewUser;
    fn on_inactive_login(&self, user: &User) -> HttpResponse;
}

/// Accounts are usable as soon as they exist.
pub struct OpenAccountPolicy;

impl AccountPolicy for OpenAccountPolicy {
    fn name(&self) -> &'static str { "open" }

    fn on_user_created(&self, user: NewUser) -> NewUser {
        user
    }

    fn on_inactive_login(&self, user: &User) -> HttpResponse {
        warn!(email = %user.email, "login refused for deactivated account");
        HttpResponse::Forbidden().json(serde_json::json!({
            "error": "account_inactive",
            "messages": ["This account has been deactivated."]
        }))
    }
}

/// New accounts wait for an administrator unless they are superusers.
pub struct ApprovalRequiredPolicy;

const PENDING_APPROVAL_PAGE: &str = r#"<!doctype html>
<html lang="ko">
<head><meta charset="utf-8"><title>승인 대기 중</title></head>
<body>
<main>
<h1>승인 대기 중입니다</h1>
<p>가입 신청이 접수되었습니다. 관리자가 계정을 승인하면 로그인할 수 있어요.</p>
</main>
</body>
</html>"#;

impl AccountPolicy for ApprovalRequiredPolicy {
    fn name(&self) -> &'static str { "approval" }

    fn on_user_created(&self, mut user: NewUser) -> NewUser {
        if user.is_superuser {
            info!(email = %user.email, "superuser signup stays active");
        } else {
            info!(email = %user.email, "signup deactivated pending approval");
            user.is_active = false;
        }
        user
    }

    fn on_inactive_login(&self, user: &User) -> HttpResponse {
        warn!(email = %user.email, "login attempt by account awaiting approval");
        HttpResponse::Forbidden()
            .content_type("text/html; charset=utf-8")
            .body(PENDING_APPROVAL_PAGE)
    }
}

pub fn policy_for(kind: AccountPolicyKind) -> Arc<dyn AccountPolicy> {
    match kind {
        AccountPolicyKind::Open => Arc::new(OpenAccountPolicy),
        AccountPolicyKind::ApprovalRequired => Arc::new(ApprovalRequiredPolicy),
    }
}

// ---------------- CSV bulk import ----------------

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV header must contain 'email' and 'name' columns")]
    MissingColumns,
    #[error("unreadable CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Default, Serialize, utoipa::ToSchema)]
pub struct ImportReport {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub messages: Vec<String>,
}

/// Creates one active, passwordless account per row of an `email,name` CSV.
/// Existing emails are skipped; row problems are reported, not raised.
pub async fn import_users_csv<R: UserRepo + ?Sized>(repo: &R, data: &[u8]) -> Result<ImportReport, ImportError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(data);
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    let column = |wanted: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(wanted));
    let (Some(email_col), Some(name_col)) = (column("email"), column("name")) else {
        return Err(ImportError::MissingColumns);
    };

    let mut report = ImportReport::default();
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                report.failed += 1;
                report.messages.push(format!("line {line}: {e}"));
                continue;
            }
        };
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let email = record.get(email_col).unwrap_or_default();
        let name = record.get(name_col).unwrap_or_default();
        if email.is_empty() {
            report.failed += 1;
            report.messages.push(format!("line {line}: email is missing"));
            continue;
        }
        if !validator::validate_email(email) {
            report.failed += 1;
            report.messages.push(format!("line {line}: '{email}' is not a valid email"));
            continue;
        }
        if repo.find_user_by_email(email).await?.is_some() {
            report.skipped += 1;
            continue;
        }
        match repo.create_user(NewUser::passwordless(email, name)).await {
            Ok(_) => {
                report.created += 1;
                increment_counter!("users_imported_total");
            }
            Err(RepoError::Conflict) => report.skipped += 1,
            Err(e) => {
                report.failed += 1;
                report.messages.push(format!("line {line}: {e}"));
            }
        }
    }
    info!(created = report.created, skipped = report.skipped, failed = report.failed, "csv user import finished");
    Ok(report)
}
