/// Errors that callers of the storage layer need to branch on.
///
/// Store methods return `anyhow::Result`; the variants below are raised
/// inside that error so handlers can `downcast_ref::<StorageError>()` and
/// map them to precise HTTP statuses.
///
/// # Examples
///
/// ```rust
/// use emsurvey_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "role",
///     id: "r-99".to_string(),
/// };
/// assert!(err.to_string().contains("role"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An insert operation did not return the newly created row.
    #[error("Storage: insert of {entity} succeeded but the row could not be read back")]
    InsertReadback { entity: &'static str },

    /// A uniqueness rule was violated (checked before hitting the database).
    #[error("Storage: {entity} with {field}={value} already exists")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    /// The row exists but the operation is not allowed on it.
    #[error("Storage: {0}")]
    Rejected(String),

    /// An underlying database error.
    #[error("Storage: database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// JSON serialization or deserialization failure (e.g. `*_json` columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Whether `err` represents a unique-constraint violation, either detected
/// up front ([`StorageError::Duplicate`]) or reported by the database.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    if let Some(StorageError::Duplicate { .. }) = err.downcast_ref::<StorageError>() {
        return true;
    }
    if let Some(db_err) = err.downcast_ref::<sea_orm::DbErr>() {
        if let Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) = db_err.sql_err() {
            return true;
        }
    }
    err.to_string().contains("UNIQUE constraint")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_is_unique_violation() {
        let err: anyhow::Error = StorageError::Duplicate {
            entity: "user",
            field: "username",
            value: "alice".into(),
        }
        .into();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn other_errors_are_not_unique_violations() {
        let err: anyhow::Error = StorageError::Rejected("system role".into()).into();
        assert!(!is_unique_violation(&err));
        assert!(!is_unique_violation(&anyhow::anyhow!("connection reset")));
    }
}
