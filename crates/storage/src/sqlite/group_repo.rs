use ead_core::model::{Group, GroupId};
use ead_core::permissions::{AccessEntry, AccessKind, PermissionSelection};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, features_from_json, features_to_json, ser};
use crate::repository::{GroupRepository, StorageError};

#[async_trait::async_trait]
impl GroupRepository for SqliteRepository {
    async fn upsert_group(&self, group: &Group) -> Result<(), StorageError> {
        let features = features_to_json(group.features())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO learner_groups (id, name, description, features, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                features = excluded.features,
                updated_at = excluded.updated_at
            ",
        )
        .bind(group.id().as_str())
        .bind(group.name())
        .bind(group.description())
        .bind(features)
        .bind(group.created_at())
        .bind(group.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // the selection is replaced wholesale, like a course toggle
        sqlx::query("DELETE FROM group_access WHERE group_id = ?1")
            .bind(group.id().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for entry in group.access().entries() {
            sqlx::query(
                r"
                INSERT INTO group_access (group_id, kind, target_id, selected)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(group.id().as_str())
            .bind(entry.kind.as_str())
            .bind(entry.id)
            .bind(i64::from(entry.selected))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, description, features, created_at, updated_at
            FROM learner_groups WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => {
                let access = self.load_access(id).await?;
                group_from_row(&row, access).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, description, features, created_at, updated_at
            FROM learner_groups
            ORDER BY name ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let id = GroupId::new(row.try_get::<String, _>("id").map_err(ser)?);
            let access = self.load_access(&id).await?;
            groups.push(group_from_row(&row, access)?);
        }
        Ok(groups)
    }

    async fn delete_group(&self, id: &GroupId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM learner_groups WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

impl SqliteRepository {
    async fn load_access(&self, id: &GroupId) -> Result<PermissionSelection, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT kind, target_id, selected
            FROM group_access
            WHERE group_id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: AccessKind = row
                .try_get::<String, _>("kind")
                .map_err(ser)?
                .parse()
                .map_err(ser)?;
            entries.push(AccessEntry {
                kind,
                id: row.try_get("target_id").map_err(ser)?,
                selected: row.try_get::<i64, _>("selected").map_err(ser)? != 0,
            });
        }
        Ok(PermissionSelection::from_entries(entries))
    }
}

fn group_from_row(row: &SqliteRow, access: PermissionSelection) -> Result<Group, StorageError> {
    let features = features_from_json(&row.try_get::<String, _>("features").map_err(ser)?)?;
    Group::from_persisted(
        GroupId::new(row.try_get::<String, _>("id").map_err(ser)?),
        row.try_get("name").map_err(ser)?,
        row.try_get("description").map_err(ser)?,
        features,
        access,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}
