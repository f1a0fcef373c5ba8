use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use aula_common::get_current_timestamp;

/// One grant of course access. A user who buys the same course twice holds
/// two rows, and refunds revoke them one at a time, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub sale_id: Uuid,
    pub created_at: i64,
}

impl Enrollment {
    pub fn new(user_id: Uuid, course_id: Uuid, sale_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            sale_id,
            created_at: get_current_timestamp(),
        }
    }

    pub fn create_table_sql() -> &'static str {
        r#"CREATE TABLE IF NOT EXISTS "enrollments" (
            "id" UUID PRIMARY KEY,
            "user_id" UUID NOT NULL,
            "course_id" UUID NOT NULL,
            "sale_id" UUID NOT NULL,
            "created_at" BIGINT NOT NULL
        );"#
    }

    pub fn indexes_sql() -> &'static [&'static str] {
        &[
            r#"CREATE INDEX IF NOT EXISTS "idx_enrollments_user_course" ON "enrollments" ("user_id", "course_id", "created_at");"#,
        ]
    }
}
