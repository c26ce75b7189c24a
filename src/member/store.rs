//! Member store
//!
//! CRUD against the `member` table. Each operation either runs on a
//! connection supplied by the caller, taking part in the caller's
//! transaction, or acquires a pooled connection for that single call.
//! A supplied connection is never closed or returned here.

use sqlx::any::AnyRow;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, Row};
use std::ops::{Deref, DerefMut};
use tracing::{error, info};

use super::error::MemberError;
use super::models::Member;
use crate::db::Database;

const INSERT_SQL: &str = "INSERT INTO member (member_id, money) VALUES ($1, $2)";
const SELECT_BY_ID_SQL: &str = "SELECT member_id, money FROM member WHERE member_id = $1";
const UPDATE_MONEY_SQL: &str = "UPDATE member SET money = $1 WHERE member_id = $2";
const DELETE_BY_ID_SQL: &str = "DELETE FROM member WHERE member_id = $1";
const DELETE_ALL_SQL: &str = "DELETE FROM member";

/// Connection used for one store call
enum ScopedConnection<'c> {
    Borrowed(&'c mut AnyConnection),
    /// Returned to the pool on drop, on every exit path
    Pooled(PoolConnection<Any>),
}

impl Deref for ScopedConnection<'_> {
    type Target = AnyConnection;

    fn deref(&self) -> &AnyConnection {
        match self {
            ScopedConnection::Borrowed(conn) => &**conn,
            ScopedConnection::Pooled(conn) => &**conn,
        }
    }
}

impl DerefMut for ScopedConnection<'_> {
    fn deref_mut(&mut self) -> &mut AnyConnection {
        match self {
            ScopedConnection::Borrowed(conn) => &mut **conn,
            ScopedConnection::Pooled(conn) => &mut **conn,
        }
    }
}

/// Log a driver failure at error level and translate it
fn db_error(op: &'static str, member_id: &str, e: sqlx::Error) -> MemberError {
    error!(op, member_id, error = %e, "db error");
    MemberError::from(e)
}

fn row_to_member(row: &AnyRow) -> Result<Member, sqlx::Error> {
    Ok(Member {
        member_id: row.try_get("member_id")?,
        money: row.try_get("money")?,
    })
}

/// Repository for [`Member`] rows
#[derive(Clone, Debug)]
pub struct MemberStore {
    db: Database,
}

impl MemberStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn connection<'c>(
        &self,
        conn: Option<&'c mut AnyConnection>,
        op: &'static str,
        member_id: &str,
    ) -> Result<ScopedConnection<'c>, MemberError> {
        match conn {
            Some(conn) => Ok(ScopedConnection::Borrowed(conn)),
            None => self
                .db
                .acquire()
                .await
                .map(ScopedConnection::Pooled)
                .map_err(|e| db_error(op, member_id, e)),
        }
    }

    /// Insert a new member
    ///
    /// A duplicate id fails with a constraint-violation `DataAccess` error.
    pub async fn save(
        &self,
        conn: Option<&mut AnyConnection>,
        member: Member,
    ) -> Result<Member, MemberError> {
        let mut conn = self.connection(conn, "save", &member.member_id).await?;

        let result = sqlx::query(INSERT_SQL)
            .bind(member.member_id.as_str())
            .bind(member.money)
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error("save", &member.member_id, e))?;

        info!(insert_size = result.rows_affected(), member_id = %member.member_id, "member saved");
        Ok(member)
    }

    /// Load a member by exact id
    pub async fn find_by_id(
        &self,
        conn: Option<&mut AnyConnection>,
        member_id: &str,
    ) -> Result<Member, MemberError> {
        let mut conn = self.connection(conn, "find_by_id", member_id).await?;

        let row = sqlx::query(SELECT_BY_ID_SQL)
            .bind(member_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| db_error("find_by_id", member_id, e))?;

        match row {
            Some(row) => row_to_member(&row).map_err(|e| db_error("find_by_id", member_id, e)),
            None => Err(MemberError::NotFound(member_id.to_string())),
        }
    }

    /// Set a member's money
    ///
    /// An unknown id is not an error: nothing is written and 0 is returned.
    pub async fn update(
        &self,
        conn: Option<&mut AnyConnection>,
        member_id: &str,
        money: i64,
    ) -> Result<u64, MemberError> {
        let mut conn = self.connection(conn, "update", member_id).await?;

        let result = sqlx::query(UPDATE_MONEY_SQL)
            .bind(money)
            .bind(member_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error("update", member_id, e))?;

        let update_size = result.rows_affected();
        info!(update_size, member_id, money, "member updated");
        Ok(update_size)
    }

    /// Delete a member by id; an unknown id deletes nothing and returns 0
    pub async fn delete(
        &self,
        conn: Option<&mut AnyConnection>,
        member_id: &str,
    ) -> Result<u64, MemberError> {
        let mut conn = self.connection(conn, "delete", member_id).await?;

        let result = sqlx::query(DELETE_BY_ID_SQL)
            .bind(member_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error("delete", member_id, e))?;

        let delete_size = result.rows_affected();
        info!(delete_size, member_id, "member deleted");
        Ok(delete_size)
    }

    /// Remove every member
    pub async fn delete_all(&self, conn: Option<&mut AnyConnection>) -> Result<u64, MemberError> {
        let mut conn = self.connection(conn, "delete_all", "*").await?;

        let result = sqlx::query(DELETE_ALL_SQL)
            .execute(&mut *conn)
            .await
            .map_err(|e| db_error("delete_all", "*", e))?;

        let delete_size = result.rows_affected();
        info!(delete_size, "all members deleted");
        Ok(delete_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    async fn test_store(dir: &tempfile::TempDir) -> MemberStore {
        let config = DatabaseConfig {
            url: format!(
                "sqlite://{}?mode=rwc",
                dir.path().join("member.db").display()
            ),
            max_connections: 2,
            acquire_timeout_ms: 500,
        };
        let db = Database::connect(&config).await.unwrap();
        db.ensure_schema().await.unwrap();
        MemberStore::new(db)
    }

    #[tokio::test]
    async fn test_crud() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let member = Member::new("memberV0", 10000);
        let saved = store.save(None, member.clone()).await.unwrap();
        assert_eq!(saved, member);

        let found = store.find_by_id(None, "memberV0").await.unwrap();
        assert_eq!(found, member);

        let updated = store.update(None, "memberV0", 20000).await.unwrap();
        assert_eq!(updated, 1);
        assert_eq!(
            store.find_by_id(None, "memberV0").await.unwrap().money,
            20000
        );

        assert_eq!(store.delete(None, "memberV0").await.unwrap(), 1);
        let err = store.find_by_id(None, "memberV0").await.unwrap_err();
        assert!(matches!(err, MemberError::NotFound(id) if id == "memberV0"));
    }

    #[tokio::test]
    async fn test_long_member_id_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let long_id = "member-with-a-long-identifier-0123456789";
        store.save(None, Member::new(long_id, 42)).await.unwrap();

        let found = store.find_by_id(None, long_id).await.unwrap();
        assert_eq!(found.member_id, long_id);
        assert_eq!(store.update(None, long_id, 7).await.unwrap(), 1);
        assert_eq!(store.find_by_id(None, long_id).await.unwrap().money, 7);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_member_are_no_ops() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        assert_eq!(store.update(None, "ghost", 500).await.unwrap(), 0);
        assert_eq!(store.delete(None, "ghost").await.unwrap(), 0);
        assert!(matches!(
            store.find_by_id(None, "ghost").await,
            Err(MemberError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_save_is_constraint_violation() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        store.save(None, Member::new("dup", 1)).await.unwrap();
        let err = store.save(None, Member::new("dup", 2)).await.unwrap_err();

        assert!(matches!(err, MemberError::DataAccess(_)));
        assert!(err.is_constraint_violation());
        assert!(!err.is_retryable());
        assert_eq!(store.find_by_id(None, "dup").await.unwrap().money, 1);
    }

    #[tokio::test]
    async fn test_borrowed_connection_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let mut conn = store.db.acquire().await.unwrap();
        store
            .save(Some(&mut *conn), Member::new("memberA", 100))
            .await
            .unwrap();
        store.update(Some(&mut *conn), "memberA", 50).await.unwrap();
        let found = store.find_by_id(Some(&mut *conn), "memberA").await.unwrap();
        assert_eq!(found.money, 50);

        // same connection is still usable after the store calls
        store.delete(Some(&mut *conn), "memberA").await.unwrap();
    }

    #[tokio::test]
    async fn test_pooled_connection_released_after_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        // pool holds 2 connections; repeated failures must not leak them
        for _ in 0..5 {
            assert!(store.find_by_id(None, "missing").await.is_err());
        }
        store.save(None, Member::new("after", 1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        store.save(None, Member::new("a", 1)).await.unwrap();
        store.save(None, Member::new("b", 2)).await.unwrap();
        assert_eq!(store.delete_all(None).await.unwrap(), 2);
        assert_eq!(store.delete_all(None).await.unwrap(), 0);
    }
}
