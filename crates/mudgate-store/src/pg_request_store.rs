//! `PostgreSQL` implementation of the `RequestStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use mudgate_core::error::DomainError;
use mudgate_core::model::{
    ChangeRequest, ChangeRequestShape, Comment, Field, FieldType, Request, RequestStatus, Subfield,
};
use mudgate_core::repository::{HistoryEntry, RequestStore, RequestTransaction};

/// PostgreSQL-backed request store.
#[derive(Debug, Clone)]
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    /// Creates a new `PgRequestStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn begin(&self) -> Result<Box<dyn RequestTransaction>, DomainError> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// An open database transaction.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

fn db_error(err: sqlx::Error) -> DomainError {
    DomainError::Internal(format!("database error: {err}"))
}

fn corrupt(err: DomainError) -> DomainError {
    DomainError::Internal(format!("corrupt row: {err}"))
}

fn change_request_table(shape: ChangeRequestShape) -> &'static str {
    match shape {
        ChangeRequestShape::Open => "change_requests_open",
        ChangeRequestShape::Active => "change_requests_active",
        ChangeRequestShape::Past => "change_requests_past",
    }
}

#[derive(FromRow)]
struct RequestRow {
    id: Uuid,
    request_type: String,
    owner_id: Uuid,
    reviewer_id: Option<Uuid>,
    status: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for Request {
    type Error = DomainError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            request_type: row.request_type.parse().map_err(corrupt)?,
            owner_id: row.owner_id,
            reviewer_id: row.reviewer_id,
            status: row.status.parse().map_err(corrupt)?,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct FieldRow {
    id: Uuid,
    request_id: Uuid,
    field_type: String,
    value: String,
    status: String,
}

impl TryFrom<FieldRow> for Field {
    type Error = DomainError;

    fn try_from(row: FieldRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            request_id: row.request_id,
            field_type: row.field_type.parse().map_err(corrupt)?,
            value: row.value,
            status: row.status.parse().map_err(corrupt)?,
        })
    }
}

#[derive(FromRow)]
struct SubfieldRow {
    id: Uuid,
    field_id: Uuid,
    value: String,
    position: i64,
}

impl From<SubfieldRow> for Subfield {
    fn from(row: SubfieldRow) -> Self {
        Self {
            id: row.id,
            field_id: row.field_id,
            value: row.value,
            position: row.position,
        }
    }
}

#[derive(FromRow)]
struct ChangeRequestRow {
    id: Uuid,
    request_id: Uuid,
    field_id: Uuid,
    reviewer_id: Uuid,
    value: String,
    text: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ChangeRequestRow> for ChangeRequest {
    fn from(row: ChangeRequestRow) -> Self {
        Self {
            id: row.id,
            request_id: row.request_id,
            field_id: row.field_id,
            reviewer_id: row.reviewer_id,
            value: row.value,
            text: row.text,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    request_id: Uuid,
    field_type: String,
    version: i64,
    parent_id: Option<Uuid>,
    author_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = DomainError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            request_id: row.request_id,
            field_type: row.field_type.parse().map_err(corrupt)?,
            version: row.version,
            parent_id: row.parent_id,
            author_id: row.author_id,
            text: row.text,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct HistoryRow {
    event_id: Uuid,
    request_id: Uuid,
    event_type: String,
    payload: serde_json::Value,
    actor_id: Uuid,
    correlation_id: Uuid,
    occurred_at: DateTime<Utc>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            event_id: row.event_id,
            request_id: row.request_id,
            event_type: row.event_type,
            payload: row.payload,
            actor_id: row.actor_id,
            correlation_id: row.correlation_id,
            occurred_at: row.occurred_at,
        }
    }
}

const REQUEST_COLUMNS: &str =
    "id, request_type, owner_id, reviewer_id, status, version, created_at, updated_at";
const CHANGE_REQUEST_COLUMNS: &str =
    "id, request_id, field_id, reviewer_id, value, text, created_at, updated_at";

#[async_trait]
impl RequestTransaction for PgTransaction {
    async fn insert_request(&mut self, request: &Request) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO requests \
             (id, request_type, owner_id, reviewer_id, status, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(request.id)
        .bind(request.request_type.as_str())
        .bind(request.owner_id)
        .bind(request.reviewer_id)
        .bind(request.status.as_str())
        .bind(request.version)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn load_request(&mut self, request_id: Uuid) -> Result<Option<Request>, DomainError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, RequestRow>(&sql)
            .bind(request_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?
            .map(Request::try_from)
            .transpose()
    }

    async fn find_request(&mut self, request_id: Uuid) -> Result<Option<Request>, DomainError> {
        let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1");
        sqlx::query_as::<_, RequestRow>(&sql)
            .bind(request_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?
            .map(Request::try_from)
            .transpose()
    }

    async fn update_request(
        &mut self,
        request: &Request,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE requests \
             SET status = $2, reviewer_id = $3, version = $4, updated_at = $5 \
             WHERE id = $1 AND version = $6",
        )
        .bind(request.id)
        .bind(request.status.as_str())
        .bind(request.reviewer_id)
        .bind(request.version)
        .bind(request.updated_at)
        .bind(expected_version)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        if result.rows_affected() == 1 {
            return Ok(());
        }

        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM requests WHERE id = $1")
            .bind(request.id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;
        match actual {
            None => Err(DomainError::not_found("request", request.id)),
            Some(actual) => {
                warn!(
                    request_id = %request.id,
                    expected = expected_version,
                    actual,
                    "request version changed underneath update"
                );
                Err(DomainError::ConcurrencyConflict {
                    request_id: request.id,
                    expected: expected_version,
                    actual,
                })
            }
        }
    }

    async fn list_requests_for_owner(
        &mut self,
        owner_id: Uuid,
    ) -> Result<Vec<Request>, DomainError> {
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE owner_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, RequestRow>(&sql)
            .bind(owner_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(Request::try_from)
            .collect()
    }

    async fn list_requests_with_status(
        &mut self,
        statuses: &[RequestStatus],
    ) -> Result<Vec<Request>, DomainError> {
        let tokens: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE status = ANY($1) ORDER BY created_at, id"
        );
        sqlx::query_as::<_, RequestRow>(&sql)
            .bind(tokens)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?
            .into_iter()
            .map(Request::try_from)
            .collect()
    }

    async fn insert_field(&mut self, field: &Field) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO request_fields (id, request_id, field_type, value, status) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(field.id)
        .bind(field.request_id)
        .bind(field.field_type.as_str())
        .bind(&field.value)
        .bind(field.status.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn load_field(&mut self, field_id: Uuid) -> Result<Option<Field>, DomainError> {
        sqlx::query_as::<_, FieldRow>(
            "SELECT id, request_id, field_type, value, status FROM request_fields WHERE id = $1",
        )
        .bind(field_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?
        .map(Field::try_from)
        .transpose()
    }

    async fn list_fields(&mut self, request_id: Uuid) -> Result<Vec<Field>, DomainError> {
        sqlx::query_as::<_, FieldRow>(
            "SELECT id, request_id, field_type, value, status FROM request_fields \
             WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(Field::try_from)
        .collect()
    }

    async fn update_field(&mut self, field: &Field) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE request_fields SET value = $2, status = $3 WHERE id = $1")
            .bind(field.id)
            .bind(&field.value)
            .bind(field.status.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("field", field.id));
        }
        Ok(())
    }

    async fn insert_subfield(&mut self, subfield: &Subfield) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO request_subfields (id, field_id, value, position) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(subfield.id)
        .bind(subfield.field_id)
        .bind(&subfield.value)
        .bind(subfield.position)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn load_subfield(&mut self, subfield_id: Uuid) -> Result<Option<Subfield>, DomainError> {
        let row = sqlx::query_as::<_, SubfieldRow>(
            "SELECT id, field_id, value, position FROM request_subfields WHERE id = $1",
        )
        .bind(subfield_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(row.map(Subfield::from))
    }

    async fn list_subfields(&mut self, field_id: Uuid) -> Result<Vec<Subfield>, DomainError> {
        let rows = sqlx::query_as::<_, SubfieldRow>(
            "SELECT id, field_id, value, position FROM request_subfields \
             WHERE field_id = $1 ORDER BY position",
        )
        .bind(field_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(Subfield::from).collect())
    }

    async fn update_subfield(&mut self, subfield: &Subfield) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE request_subfields SET value = $2 WHERE id = $1")
            .bind(subfield.id)
            .bind(&subfield.value)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("subfield", subfield.id));
        }
        Ok(())
    }

    async fn delete_subfield(&mut self, subfield_id: Uuid) -> Result<(), DomainError> {
        let result = sqlx::query("DELETE FROM request_subfields WHERE id = $1")
            .bind(subfield_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("subfield", subfield_id));
        }
        Ok(())
    }

    async fn insert_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request: &ChangeRequest,
    ) -> Result<(), DomainError> {
        let sql = format!(
            "INSERT INTO {} ({CHANGE_REQUEST_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            change_request_table(shape)
        );
        sqlx::query(&sql)
            .bind(change_request.id)
            .bind(change_request.request_id)
            .bind(change_request.field_id)
            .bind(change_request.reviewer_id)
            .bind(&change_request.value)
            .bind(&change_request.text)
            .bind(change_request.created_at)
            .bind(change_request.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn load_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request_id: Uuid,
    ) -> Result<Option<ChangeRequest>, DomainError> {
        let sql = format!(
            "SELECT {CHANGE_REQUEST_COLUMNS} FROM {} WHERE id = $1",
            change_request_table(shape)
        );
        let row = sqlx::query_as::<_, ChangeRequestRow>(&sql)
            .bind(change_request_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(row.map(ChangeRequest::from))
    }

    async fn list_change_requests_for_field(
        &mut self,
        shape: ChangeRequestShape,
        field_id: Uuid,
    ) -> Result<Vec<ChangeRequest>, DomainError> {
        let sql = format!(
            "SELECT {CHANGE_REQUEST_COLUMNS} FROM {} WHERE field_id = $1 ORDER BY created_at, id",
            change_request_table(shape)
        );
        let rows = sqlx::query_as::<_, ChangeRequestRow>(&sql)
            .bind(field_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(ChangeRequest::from).collect())
    }

    async fn list_change_requests(
        &mut self,
        shape: ChangeRequestShape,
        request_id: Uuid,
    ) -> Result<Vec<ChangeRequest>, DomainError> {
        let sql = format!(
            "SELECT {CHANGE_REQUEST_COLUMNS} FROM {} WHERE request_id = $1 ORDER BY created_at, id",
            change_request_table(shape)
        );
        let rows = sqlx::query_as::<_, ChangeRequestRow>(&sql)
            .bind(request_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(ChangeRequest::from).collect())
    }

    async fn update_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request: &ChangeRequest,
    ) -> Result<(), DomainError> {
        let sql = format!(
            "UPDATE {} SET text = $2, updated_at = $3 WHERE id = $1",
            change_request_table(shape)
        );
        let result = sqlx::query(&sql)
            .bind(change_request.id)
            .bind(&change_request.text)
            .bind(change_request.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("change request", change_request.id));
        }
        Ok(())
    }

    async fn delete_change_request(
        &mut self,
        shape: ChangeRequestShape,
        change_request_id: Uuid,
    ) -> Result<(), DomainError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", change_request_table(shape));
        let result = sqlx::query(&sql)
            .bind(change_request_id)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("change request", change_request_id));
        }
        Ok(())
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO request_comments \
             (id, request_id, field_type, version, parent_id, author_id, text, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(comment.id)
        .bind(comment.request_id)
        .bind(comment.field_type.as_str())
        .bind(comment.version)
        .bind(comment.parent_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .bind(comment.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn load_comment(&mut self, comment_id: Uuid) -> Result<Option<Comment>, DomainError> {
        sqlx::query_as::<_, CommentRow>(
            "SELECT id, request_id, field_type, version, parent_id, author_id, text, created_at \
             FROM request_comments WHERE id = $1",
        )
        .bind(comment_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?
        .map(Comment::try_from)
        .transpose()
    }

    async fn list_comments(
        &mut self,
        request_id: Uuid,
        field_type: FieldType,
    ) -> Result<Vec<Comment>, DomainError> {
        sqlx::query_as::<_, CommentRow>(
            "SELECT id, request_id, field_type, version, parent_id, author_id, text, created_at \
             FROM request_comments WHERE request_id = $1 AND field_type = $2 \
             ORDER BY created_at, id",
        )
        .bind(request_id)
        .bind(field_type.as_str())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(Comment::try_from)
        .collect()
    }

    async fn append_history(&mut self, entries: &[HistoryEntry]) -> Result<(), DomainError> {
        for entry in entries {
            sqlx::query(
                "INSERT INTO request_history \
                 (event_id, request_id, event_type, payload, actor_id, correlation_id, occurred_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(entry.event_id)
            .bind(entry.request_id)
            .bind(&entry.event_type)
            .bind(&entry.payload)
            .bind(entry.actor_id)
            .bind(entry.correlation_id)
            .bind(entry.occurred_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        }
        Ok(())
    }

    async fn list_history(&mut self, request_id: Uuid) -> Result<Vec<HistoryEntry>, DomainError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT event_id, request_id, event_type, payload, actor_id, correlation_id, \
             occurred_at FROM request_history WHERE request_id = $1 ORDER BY sequence",
        )
        .bind(request_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(db_error)?;
        debug!("request transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.rollback().await.map_err(db_error)?;
        debug!("request transaction rolled back");
        Ok(())
    }
}
