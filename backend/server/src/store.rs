//! Typed access to platform tables, plus the undo journal used by handlers that need more
//! than one write to stay consistent.

use platform::{Filter, Platform, PlatformError, Query};
use serde_json::Value;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{error::AppError, models::Table};

fn decode<T: Table>(rows: Vec<Value>) -> Result<Vec<T>, AppError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| AppError::from(PlatformError::Decode(e))))
        .collect()
}

pub async fn fetch_all<T: Table>(platform: &dyn Platform, query: Query) -> Result<Vec<T>, AppError> {
    decode(platform.select(T::NAME, &query).await?)
}

pub async fn fetch_one<T: Table>(
    platform: &dyn Platform,
    query: Query,
) -> Result<Option<T>, AppError> {
    Ok(fetch_all(platform, query.limit(1)).await?.into_iter().next())
}

pub async fn find_by_id<T: Table>(platform: &dyn Platform, id: Uuid) -> Result<Option<T>, AppError> {
    fetch_one(platform, Query::new().eq("id", id)).await
}

pub async fn insert_one<T: Table>(platform: &dyn Platform, row: Value) -> Result<T, AppError> {
    decode::<T>(platform.insert(T::NAME, vec![row]).await?)?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::InternalError(format!("Insert into {} returned no row", T::NAME)))
}

/// `None` when no row has that id.
pub async fn update_by_id<T: Table>(
    platform: &dyn Platform,
    id: Uuid,
    patch: Value,
) -> Result<Option<T>, AppError> {
    let rows = platform
        .update(T::NAME, &[Filter::eq("id", id)], patch)
        .await?;

    Ok(decode(rows)?.into_iter().next())
}

pub async fn delete_by_id<T: Table>(platform: &dyn Platform, id: Uuid) -> Result<bool, AppError> {
    let removed = platform.delete(T::NAME, &[Filter::eq("id", id)]).await?;
    Ok(!removed.is_empty())
}

/// Deletes every row matching `filters` and returns what was removed.
pub async fn delete_where<T: Table>(
    platform: &dyn Platform,
    filters: &[Filter],
) -> Result<Vec<T>, AppError> {
    decode(platform.delete(T::NAME, filters).await?)
}

enum Undo {
    Restore { table: &'static str, row: Value },
    Remove { table: &'static str, id: String },
    Reinsert { table: &'static str, row: Value },
}

/// Records how to reverse each write of a multi-step operation.
///
/// The platform offers no transaction across requests, so on failure the handler calls
/// [`Journal::unwind`], which replays the inverse writes newest first.
pub struct Journal<'a> {
    platform: &'a dyn Platform,
    undo: Vec<Undo>,
}

impl<'a> Journal<'a> {
    pub fn new(platform: &'a dyn Platform) -> Self {
        Self {
            platform,
            undo: Vec::new(),
        }
    }

    /// `previous` is the full row as it was before an update.
    pub fn updated<T: Table>(&mut self, previous: &T) -> Result<(), AppError> {
        let row = serde_json::to_value(previous).map_err(PlatformError::Decode)?;
        self.undo.push(Undo::Restore {
            table: T::NAME,
            row,
        });
        Ok(())
    }

    pub fn inserted<T: Table>(&mut self, id: Uuid) {
        self.undo.push(Undo::Remove {
            table: T::NAME,
            id: id.to_string(),
        });
    }

    pub fn deleted<T: Table>(&mut self, previous: &T) -> Result<(), AppError> {
        let row = serde_json::to_value(previous).map_err(PlatformError::Decode)?;
        self.undo.push(Undo::Reinsert {
            table: T::NAME,
            row,
        });
        Ok(())
    }

    pub async fn unwind(self) {
        let platform = self.platform;

        for undo in self.undo.into_iter().rev() {
            let result = match &undo {
                Undo::Restore { table, row } => match row.get("id").and_then(Value::as_str) {
                    Some(id) => platform
                        .update(table, &[Filter::eq("id", id)], row.clone())
                        .await
                        .map(|_| ()),
                    None => {
                        warn!("Cannot restore {table} row without id");
                        Ok(())
                    }
                },
                Undo::Remove { table, id } => platform
                    .delete(table, &[Filter::eq("id", id)])
                    .await
                    .map(|_| ()),
                Undo::Reinsert { table, row } => {
                    platform.insert(table, vec![row.clone()]).await.map(|_| ())
                }
            };

            if let Err(e) = result {
                let table = match &undo {
                    Undo::Restore { table, .. }
                    | Undo::Remove { table, .. }
                    | Undo::Reinsert { table, .. } => table,
                };
                error!("Rollback of {table} failed: {e}");
            }
        }
    }
}
