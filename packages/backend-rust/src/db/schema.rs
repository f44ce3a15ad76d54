//! Table definitions shared by the PostgreSQL and SQLite stores.
//!
//! Statements are idempotent (`IF NOT EXISTS`) and run on every connect.

pub const MASTERY_SCHEMA_SQL: &str = r#"
-- skill catalog, referenced by bkt_states
CREATE TABLE IF NOT EXISTS "skills" (
    "id" TEXT PRIMARY KEY,
    "description" TEXT
);

CREATE TABLE IF NOT EXISTS "bkt_states" (
    "student_id" TEXT NOT NULL,
    "skill_key" TEXT NOT NULL REFERENCES "skills" ("id"),
    "p_known" DOUBLE PRECISION NOT NULL DEFAULT 0.2,
    "p_learn" DOUBLE PRECISION NOT NULL DEFAULT 0.3,
    "p_guess" DOUBLE PRECISION NOT NULL DEFAULT 0.2,
    "p_slip" DOUBLE PRECISION NOT NULL DEFAULT 0.1,
    "updated_at" BIGINT NOT NULL,
    PRIMARY KEY ("student_id", "skill_key")
);

CREATE INDEX IF NOT EXISTS "bkt_states_student_idx" ON "bkt_states" ("student_id");
"#;

pub const SELECT_STATE_SQL: &str = r#"
SELECT "student_id", "skill_key", "p_known", "p_learn", "p_guess", "p_slip", "updated_at"
FROM "bkt_states"
WHERE "student_id" = $1 AND "skill_key" = $2
LIMIT 1
"#;

pub const SELECT_STATES_PREFIX_SQL: &str = r#"SELECT "student_id", "skill_key", "p_known", "p_learn", "p_guess", "p_slip", "updated_at" FROM "bkt_states" WHERE "student_id" = "#;

pub const LIST_STATES_SQL: &str = r#"
SELECT "student_id", "skill_key", "p_known", "p_learn", "p_guess", "p_slip", "updated_at"
FROM "bkt_states"
WHERE "student_id" = $1
ORDER BY "skill_key" ASC
"#;

pub const UPSERT_STATE_SQL: &str = r#"
INSERT INTO "bkt_states" ("student_id", "skill_key", "p_known", "p_learn", "p_guess", "p_slip", "updated_at")
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT ("student_id", "skill_key") DO UPDATE SET
    "p_known" = excluded."p_known",
    "p_learn" = excluded."p_learn",
    "p_guess" = excluded."p_guess",
    "p_slip" = excluded."p_slip",
    "updated_at" = excluded."updated_at"
"#;

pub const INSERT_STATE_IF_ABSENT_SQL: &str = r#"
INSERT INTO "bkt_states" ("student_id", "skill_key", "p_known", "p_learn", "p_guess", "p_slip", "updated_at")
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT ("student_id", "skill_key") DO NOTHING
"#;

pub const UPSERT_SKILL_SQL: &str = r#"
INSERT INTO "skills" ("id", "description")
VALUES ($1, $2)
ON CONFLICT ("id") DO UPDATE SET
    "description" = COALESCE(excluded."description", "skills"."description")
"#;

/// Splits a script on `;`, ignoring separators inside quotes, and strips
/// `--` comment lines.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            ';' if !in_single_quote && !in_double_quote => {
                push_statement(&mut statements, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let sql = raw
        .lines()
        .filter(|line| !line.trim().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = sql.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}
