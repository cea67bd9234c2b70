use super::ErrorTranslator;
use crate::connection::Connection;
use crate::core::{Column, DataType, DbError, Row, Value};
use crate::error::{Error, Result};
use crate::facade::Database;
use crate::statement::Statement;
use crate::storage::TableSchema;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const TABLE: &str = "member";
const ID_COLUMN: &str = "member_id";
const AMOUNT_COLUMN: &str = "money";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub amount: i64,
}

impl Member {
    pub fn new(id: impl Into<String>, amount: i64) -> Self {
        Self {
            id: id.into(),
            amount,
        }
    }
}

/// Data access for members.
///
/// Every operation runs on the connection it is handed and never commits or
/// rolls back; transaction control belongs to the caller. Store errors are
/// translated through the injected [`ErrorTranslator`].
#[derive(Debug, Clone, Default)]
pub struct MemberRepository {
    translator: Arc<ErrorTranslator>,
}

impl MemberRepository {
    pub fn new(translator: ErrorTranslator) -> Self {
        Self {
            translator: Arc::new(translator),
        }
    }

    pub fn translator(&self) -> &ErrorTranslator {
        &self.translator
    }

    pub fn schema() -> std::result::Result<TableSchema, DbError> {
        TableSchema::new(
            TABLE,
            vec![
                Column::new(ID_COLUMN, DataType::Text),
                Column::new(AMOUNT_COLUMN, DataType::Integer).not_null(),
            ],
            ID_COLUMN,
        )
    }

    /// Create the member table unless it already exists.
    pub fn migrate(&self, db: &Database) -> Result<()> {
        let created = Self::schema()
            .and_then(|schema| db.create_table_if_not_exists(schema))
            .map_err(|err| self.fail("migrate", TABLE, err))?;
        if !created {
            log::debug!("Table '{}' already present", TABLE);
        }
        Ok(())
    }

    pub async fn insert(&self, conn: &mut Connection, member: &Member) -> Result<Member> {
        if member.id.is_empty() {
            return Err(Error::Validation("member id must not be empty".into()));
        }

        let stmt = Statement::insert(TABLE, &[ID_COLUMN, AMOUNT_COLUMN]);
        conn.execute(&stmt, &[Value::from(member.id.as_str()), Value::from(member.amount)])
            .await
            .map_err(|err| self.fail("insert", &member.id, err))?;

        log::info!("Inserted member {} with amount {}", member.id, member.amount);
        Ok(member.clone())
    }

    pub async fn find_by_id(&self, conn: &mut Connection, id: &str) -> Result<Member> {
        let stmt = Statement::select_by_key(TABLE, &[ID_COLUMN, AMOUNT_COLUMN]);
        let result = conn
            .execute(&stmt, &[Value::from(id)])
            .await
            .map_err(|err| self.fail("find_by_id", id, err))?;

        match result.first_row() {
            Some(row) => self.to_member(row),
            None => {
                log::debug!("Member {} not found", id);
                Err(Error::NotFound { id: id.to_string() })
            }
        }
    }

    /// Set the amount of member `id`; returns the number of rows changed,
    /// 0 when there is no such member.
    pub async fn update_amount(&self, conn: &mut Connection, id: &str, amount: i64) -> Result<u64> {
        let stmt = Statement::update_by_key(TABLE, &[AMOUNT_COLUMN]);
        let result = conn
            .execute(&stmt, &[Value::from(amount), Value::from(id)])
            .await
            .map_err(|err| self.fail("update_amount", id, err))?;

        log::debug!("Updated member {} to {} ({} row(s))", id, amount, result.affected_rows);
        Ok(result.affected_rows)
    }

    pub async fn delete(&self, conn: &mut Connection, id: &str) -> Result<u64> {
        let stmt = Statement::delete_by_key(TABLE);
        let result = conn
            .execute(&stmt, &[Value::from(id)])
            .await
            .map_err(|err| self.fail("delete", id, err))?;

        log::debug!("Deleted member {} ({} row(s))", id, result.affected_rows);
        Ok(result.affected_rows)
    }

    /// All members, ordered by id.
    pub async fn find_all(&self, conn: &mut Connection) -> Result<Vec<Member>> {
        let stmt = Statement::select_all(TABLE, &[ID_COLUMN, AMOUNT_COLUMN]);
        let result = conn
            .execute(&stmt, &[])
            .await
            .map_err(|err| self.fail("find_all", "", err))?;

        result.rows.iter().map(|row| self.to_member(row)).collect()
    }

    fn fail(&self, operation: &str, id: &str, err: DbError) -> Error {
        log::error!("{} failed for member '{}': {} (code {})", operation, id, err, err.code());
        self.translator.translate(operation, id, err)
    }

    fn to_member(&self, row: &Row) -> Result<Member> {
        match (row.first().and_then(Value::as_str), row.get(1).and_then(Value::as_i64)) {
            (Some(id), Some(amount)) => Ok(Member::new(id, amount)),
            _ => Err(Error::store(
                "read",
                DbError::TypeMismatch(format!("unexpected member row: {:?}", row)),
            )),
        }
    }
}
