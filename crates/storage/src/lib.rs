use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    error::ErrorKind,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow},
    Pool, QueryBuilder, Row, Sqlite, SqliteConnection,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info, warn};

use shared::{
    domain::{
        ColumnKind, ColumnValue, Group, GroupId, Student, StudentDetails, StudentId,
        TransferRequest, TransferRequestId, DEFAULT_TRANSFER_STATUS,
    },
    protocol::{NewStudent, NewTransferRequest, SearchKind, StudentDraft, StudentPatch},
};

mod schema;

pub use sqlx::error::ErrorKind as ConstraintKind;

/// Name given to imported rows that only carry an identity code.
pub const PLACEHOLDER_STUDENT_NAME: &str = "Unknown";
const PLACEHOLDER_NATIONAL_ID_PREFIX: &str = "temp-";

/// Handle to the student record database. Cloning shares the single
/// underlying connection.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn open(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;

        let storage = Self { pool };
        storage.ensure_schema().await?;
        info!(%database_url, "student record store ready");
        Ok(storage)
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Waits for the connection to be returned and closes it.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("failed to ensure student record schema")?;
        }
        Ok(())
    }

    pub async fn list_students(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query("SELECT * FROM students ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(student_from_row).collect()
    }

    /// Case-sensitive substring match on the identity code or the name.
    pub async fn search_students(&self, query: &str, kind: SearchKind) -> Result<Vec<Student>> {
        if query.is_empty() {
            return self.list_students().await;
        }

        let sql = match kind {
            SearchKind::NationalId => {
                "SELECT * FROM students WHERE instr(national_id, ?) > 0 ORDER BY name"
            }
            SearchKind::Name => "SELECT * FROM students WHERE instr(name, ?) > 0 ORDER BY name",
        };
        let rows = sqlx::query(sql).bind(query).fetch_all(&self.pool).await?;
        rows.iter().map(student_from_row).collect()
    }

    pub async fn get_student(&self, student_id: StudentId) -> Result<Option<Student>> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_student(&mut conn, student_id).await?)
    }

    /// Inserts the non-empty fields of `student`. A duplicate identity code
    /// fails with the database's unique-constraint error.
    pub async fn create_student(&self, student: &NewStudent) -> Result<Student> {
        let mut conn = self.pool.acquire().await?;
        Ok(insert_student(&mut conn, student).await?)
    }

    /// Applies only the fields present in `patch`. Returns `None` when no
    /// student has `student_id`.
    pub async fn update_student(
        &self,
        student_id: StudentId,
        patch: &StudentPatch,
    ) -> Result<Option<Student>> {
        let mut conn = self.pool.acquire().await?;

        let mut assignments = Vec::new();
        if let Some(group_id) = patch.group_id {
            assignments.push(("group_id", ColumnValue::Integer(group_id.map(|g| g.0))));
        }
        if let Some(name) = &patch.name {
            assignments.push(("name", ColumnValue::Text(name.clone())));
        }
        if let Some(national_id) = &patch.national_id {
            assignments.push(("national_id", ColumnValue::Text(national_id.clone())));
        }
        assignments.extend(patch.details.assignments());

        if assignments.is_empty() {
            return Ok(fetch_student(&mut conn, student_id).await?);
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE students SET ");
        let mut separated = builder.separated(", ");
        for (column, value) in assignments {
            separated.push(column).push_unseparated(" = ");
            match value {
                ColumnValue::Text(value) => separated.push_bind_unseparated(value),
                ColumnValue::Integer(value) => separated.push_bind_unseparated(value),
            };
        }
        builder.push(" WHERE id = ").push_bind(student_id.0);
        builder.build().execute(&mut *conn).await?;

        Ok(fetch_student(&mut conn, student_id).await?)
    }

    /// Removes the student's transfer requests, then the student.
    pub async fn delete_student(&self, student_id: StudentId) -> Result<bool> {
        sqlx::query("DELETE FROM transfer_requests WHERE student_id = ?")
            .bind(student_id.0)
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("DELETE FROM students WHERE id = ?")
            .bind(student_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Imports `drafts` in one transaction, optionally under a new group.
    ///
    /// Rows with neither a name nor an identity code are skipped. Rows the
    /// database rejects on a constraint are logged and left out of the result;
    /// any other storage error rolls the whole batch back, group included.
    pub async fn bulk_create_students(
        &self,
        drafts: &[StudentDraft],
        group_name: Option<&str>,
    ) -> Result<Vec<Student>> {
        let mut tx = self.pool.begin().await?;

        let group_id = match group_name.filter(|name| !name.is_empty()) {
            Some(name) => Some(insert_group(&mut tx, name, Utc::now()).await?.id),
            None => None,
        };

        let mut created = Vec::with_capacity(drafts.len());
        for (index, draft) in drafts.iter().enumerate() {
            let name = draft.name.clone().filter(|v| !v.is_empty());
            let national_id = draft.national_id.clone().filter(|v| !v.is_empty());
            if name.is_none() && national_id.is_none() {
                debug!(index, "skipping import row without name or national id");
                continue;
            }

            let national_id = match national_id {
                Some(national_id) => national_id,
                None => next_placeholder_national_id(&mut tx).await?,
            };
            let student = NewStudent {
                group_id: group_id.or(draft.group_id),
                name: name.unwrap_or_else(|| PLACEHOLDER_STUDENT_NAME.to_string()),
                national_id,
                details: draft.details.clone(),
            };

            match insert_student(&mut tx, &student).await {
                Ok(inserted) => created.push(inserted),
                Err(error) if is_row_rejection(&error) => {
                    warn!(
                        index,
                        national_id = %student.national_id,
                        %error,
                        "failed to import student row"
                    );
                }
                Err(error) => {
                    return Err(error).context("student import aborted; batch rolled back");
                }
            }
        }

        tx.commit().await?;
        info!(
            requested = drafts.len(),
            imported = created.len(),
            group_id = group_id.map(|g| g.0),
            "student import committed"
        );
        Ok(created)
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query("SELECT * FROM student_groups ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(group_from_row).collect()
    }

    pub async fn create_group(&self, name: &str, created_at: DateTime<Utc>) -> Result<Group> {
        let mut conn = self.pool.acquire().await?;
        Ok(insert_group(&mut conn, name, created_at).await?)
    }

    /// Removes the group's students' transfer requests, its students, then
    /// the group itself.
    pub async fn delete_group(&self, group_id: GroupId) -> Result<bool> {
        sqlx::query(
            "DELETE FROM transfer_requests
             WHERE student_id IN (SELECT id FROM students WHERE group_id = ?)",
        )
        .bind(group_id.0)
        .execute(&self.pool)
        .await?;
        sqlx::query("DELETE FROM students WHERE group_id = ?")
            .bind(group_id.0)
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("DELETE FROM student_groups WHERE id = ?")
            .bind(group_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_transfer_request(
        &self,
        request: &NewTransferRequest,
    ) -> Result<TransferRequest> {
        let status = request
            .status
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_TRANSFER_STATUS.to_string());
        let row = sqlx::query(
            "INSERT INTO transfer_requests (student_id, from_school, to_school, transfer_reason, request_date, status)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(request.student_id.0)
        .bind(&request.from_school)
        .bind(&request.to_school)
        .bind(request.transfer_reason.as_deref().filter(|r| !r.is_empty()))
        .bind(&request.request_date)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(transfer_request_from_row(&row)?)
    }

    pub async fn list_transfer_requests_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<TransferRequest>> {
        let rows = sqlx::query("SELECT * FROM transfer_requests WHERE student_id = ? ORDER BY id")
            .bind(student_id.0)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(transfer_request_from_row)
            .collect::<Result<_, _>>()?)
    }
}

/// The database constraint kind behind `error`, if it is one.
pub fn constraint_violation(error: &anyhow::Error) -> Option<ErrorKind> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .and_then(|e| e.as_database_error())
        .map(|e| e.kind())
        .filter(|kind| !matches!(kind, ErrorKind::Other))
}

fn is_row_rejection(error: &sqlx::Error) -> bool {
    matches!(
        error.as_database_error().map(|e| e.kind()),
        Some(
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        )
    )
}

async fn fetch_student(
    conn: &mut SqliteConnection,
    student_id: StudentId,
) -> Result<Option<Student>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM students WHERE id = ?")
        .bind(student_id.0)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(student_from_row_raw).transpose()
}

async fn insert_student(
    conn: &mut SqliteConnection,
    student: &NewStudent,
) -> Result<Student, sqlx::Error> {
    let mut columns = Vec::new();
    if let Some(group_id) = student.group_id {
        columns.push(("group_id", ColumnValue::Integer(Some(group_id.0))));
    }
    if !student.name.is_empty() {
        columns.push(("name", ColumnValue::Text(Some(student.name.clone()))));
    }
    if !student.national_id.is_empty() {
        columns.push((
            "national_id",
            ColumnValue::Text(Some(student.national_id.clone())),
        ));
    }
    columns.extend(student.details.filled_columns());

    let mut builder = QueryBuilder::<Sqlite>::new("INSERT INTO students ");
    if columns.is_empty() {
        builder.push("DEFAULT VALUES");
    } else {
        builder.push("(");
        let mut names = builder.separated(", ");
        for (column, _) in &columns {
            names.push(*column);
        }
        builder.push(") VALUES (");
        let mut values = builder.separated(", ");
        for (_, value) in columns {
            match value {
                ColumnValue::Text(value) => values.push_bind(value),
                ColumnValue::Integer(value) => values.push_bind(value),
            };
        }
        builder.push(")");
    }
    builder.push(" RETURNING *");

    let row = builder.build().fetch_one(&mut *conn).await?;
    student_from_row_raw(&row)
}

async fn insert_group(
    conn: &mut SqliteConnection,
    name: &str,
    created_at: DateTime<Utc>,
) -> Result<Group, sqlx::Error> {
    let row = sqlx::query("INSERT INTO student_groups (name, created_at) VALUES (?, ?) RETURNING *")
        .bind(name)
        .bind(created_at)
        .fetch_one(&mut *conn)
        .await?;
    group_from_row_raw(&row)
}

/// Draws `temp-<n>` codes from the placeholder sequence until one is unused.
async fn next_placeholder_national_id(conn: &mut SqliteConnection) -> Result<String> {
    loop {
        let seq: i64 =
            sqlx::query_scalar("INSERT INTO national_id_placeholders DEFAULT VALUES RETURNING id")
                .fetch_one(&mut *conn)
                .await
                .context("failed to draw placeholder national id")?;
        let candidate = format!("{PLACEHOLDER_NATIONAL_ID_PREFIX}{seq}");
        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM students WHERE national_id = ?")
            .bind(&candidate)
            .fetch_optional(&mut *conn)
            .await?;
        if taken.is_none() {
            return Ok(candidate);
        }
    }
}

fn student_from_row(row: &SqliteRow) -> Result<Student> {
    Ok(student_from_row_raw(row)?)
}

fn student_from_row_raw(row: &SqliteRow) -> Result<Student, sqlx::Error> {
    let details = StudentDetails::from_columns(|column, kind| {
        Ok::<_, sqlx::Error>(match kind {
            ColumnKind::Text => ColumnValue::Text(row.try_get(column)?),
            ColumnKind::Integer => ColumnValue::Integer(row.try_get(column)?),
        })
    })?;

    Ok(Student {
        id: StudentId(row.try_get("id")?),
        group_id: row.try_get::<Option<i64>, _>("group_id")?.map(GroupId),
        name: row.try_get("name")?,
        national_id: row.try_get("national_id")?,
        details,
    })
}

fn group_from_row(row: &SqliteRow) -> Result<Group> {
    Ok(group_from_row_raw(row)?)
}

fn group_from_row_raw(row: &SqliteRow) -> Result<Group, sqlx::Error> {
    Ok(Group {
        id: GroupId(row.try_get("id")?),
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn transfer_request_from_row(row: &SqliteRow) -> Result<TransferRequest, sqlx::Error> {
    Ok(TransferRequest {
        id: TransferRequestId(row.try_get("id")?),
        student_id: StudentId(row.try_get("student_id")?),
        from_school: row.try_get("from_school")?,
        to_school: row.try_get("to_school")?,
        transfer_reason: row.try_get("transfer_reason")?,
        request_date: row.try_get("request_date")?,
        status: row
            .try_get::<Option<String>, _>("status")?
            .unwrap_or_else(|| DEFAULT_TRANSFER_STATUS.to_string()),
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
