use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use clientele_core::domain::address::Address;
use clientele_core::domain::customer::{Customer, CustomerDraft, CustomerId};
use clientele_core::domain::user::UserId;

use super::address::{insert_address, row_to_address, update_address, ADDRESS_COLUMNS};
use super::{CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn find_one(
        &self,
        filter: &str,
        value: i64,
    ) -> Result<Option<Customer>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_customer(&mut conn, filter, value).await
    }
}

async fn load_addresses(
    conn: &mut SqliteConnection,
    customer_id: Option<CustomerId>,
) -> Result<BTreeMap<CustomerId, Vec<Address>>, RepositoryError> {
    let rows = match customer_id {
        Some(id) => {
            sqlx::query(&format!(
                "SELECT {ADDRESS_COLUMNS} FROM address WHERE customer_id = ? ORDER BY id ASC"
            ))
            .bind(id.0)
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(&format!("SELECT {ADDRESS_COLUMNS} FROM address ORDER BY id ASC"))
                .fetch_all(&mut *conn)
                .await?
        }
    };

    let mut grouped: BTreeMap<CustomerId, Vec<Address>> = BTreeMap::new();
    for row in &rows {
        let address = row_to_address(row)?;
        grouped.entry(address.customer_id).or_default().push(address);
    }
    Ok(grouped)
}

async fn fetch_customer(
    conn: &mut SqliteConnection,
    filter: &str,
    value: i64,
) -> Result<Option<Customer>, RepositoryError> {
    let row = sqlx::query(&format!(
        "SELECT id, user_id, birth_date FROM customer WHERE {filter} = ? ORDER BY id ASC LIMIT 1"
    ))
    .bind(value)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let mut customer = row_to_customer(&row)?;
    customer.addresses =
        load_addresses(conn, Some(customer.id)).await?.remove(&customer.id).unwrap_or_default();
    Ok(Some(customer))
}

fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: i64 =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let birth_date: String =
        row.try_get("birth_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Customer {
        id: CustomerId(id),
        user_id: UserId(user_id),
        birth_date,
        addresses: Vec::new(),
    })
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_all(&self) -> Result<Vec<Customer>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query("SELECT id, user_id, birth_date FROM customer ORDER BY id ASC")
            .fetch_all(&mut *conn)
            .await?;
        let mut addresses = load_addresses(&mut conn, None).await?;

        rows.iter()
            .map(|row| {
                let mut customer = row_to_customer(row)?;
                customer.addresses = addresses.remove(&customer.id).unwrap_or_default();
                Ok(customer)
            })
            .collect::<Result<Vec<_>, _>>()
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        self.find_one("id", id.0).await
    }

    async fn find_by_user_id(&self, user_id: UserId) -> Result<Option<Customer>, RepositoryError> {
        self.find_one("user_id", user_id.0).await
    }

    async fn save(&self, draft: CustomerDraft) -> Result<Customer, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let customer_id = match draft.id {
            None => {
                let result = sqlx::query(
                    "INSERT INTO customer (user_id, birth_date, created_at, updated_at)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(draft.user_id.0)
                .bind(&draft.birth_date)
                .bind(&now)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
                CustomerId(result.last_insert_rowid())
            }
            Some(id) => {
                let result = sqlx::query(
                    "UPDATE customer SET user_id = ?, birth_date = ?, updated_at = ? WHERE id = ?",
                )
                .bind(draft.user_id.0)
                .bind(&draft.birth_date)
                .bind(&now)
                .bind(id.0)
                .execute(&mut *tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(RepositoryError::MissingRecord(format!("customer {id}")));
                }
                id
            }
        };

        for address in &draft.addresses {
            match address.id {
                Some(address_id) => {
                    update_address(&mut *tx, address_id, customer_id, &address.fields).await?
                }
                None => {
                    insert_address(&mut *tx, customer_id, &address.fields).await?;
                }
            }
        }

        // Read back before committing so a failed reload rolls the write back.
        let saved = fetch_customer(&mut tx, "id", customer_id.0)
            .await?
            .ok_or_else(|| RepositoryError::MissingRecord(format!("customer {customer_id}")))?;
        tx.commit().await?;

        Ok(saved)
    }

    async fn delete_by_id(&self, id: CustomerId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM address WHERE customer_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM customer WHERE id = ?").bind(id.0).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
