use chrono::Utc;
use sqlx::Row;

use clientele_core::domain::address::{Address, AddressFields, AddressId};
use clientele_core::domain::customer::CustomerId;

use super::{AddressRepository, RepositoryError};
use crate::DbPool;

pub(crate) const ADDRESS_COLUMNS: &str = "id, customer_id, zip_code, street, number, complement,
     neighborhood, address_type, city, state, country";

pub struct SqlAddressRepository {
    pool: DbPool,
}

impl SqlAddressRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn column<T>(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn row_to_address(row: &sqlx::sqlite::SqliteRow) -> Result<Address, RepositoryError> {
    Ok(Address {
        id: AddressId(column(row, "id")?),
        customer_id: CustomerId(column(row, "customer_id")?),
        fields: AddressFields {
            zip_code: column(row, "zip_code")?,
            street: column(row, "street")?,
            number: column(row, "number")?,
            complement: column(row, "complement")?,
            neighborhood: column(row, "neighborhood")?,
            address_type: column(row, "address_type")?,
            city: column(row, "city")?,
            state: column(row, "state")?,
            country: column(row, "country")?,
        },
    })
}

pub(crate) async fn insert_address<'e, E>(
    executor: E,
    customer_id: CustomerId,
    fields: &AddressFields,
) -> Result<AddressId, RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "INSERT INTO address (customer_id, zip_code, street, number, complement, neighborhood,
                              address_type, city, state, country, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(customer_id.0)
    .bind(&fields.zip_code)
    .bind(&fields.street)
    .bind(&fields.number)
    .bind(&fields.complement)
    .bind(&fields.neighborhood)
    .bind(&fields.address_type)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(&fields.country)
    .bind(&now)
    .bind(&now)
    .execute(executor)
    .await?;

    Ok(AddressId(result.last_insert_rowid()))
}

/// Updates an address in place; the row must already belong to `customer_id`.
pub(crate) async fn update_address<'e, E>(
    executor: E,
    id: AddressId,
    customer_id: CustomerId,
    fields: &AddressFields,
) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        "UPDATE address SET
             zip_code = ?, street = ?, number = ?, complement = ?, neighborhood = ?,
             address_type = ?, city = ?, state = ?, country = ?, updated_at = ?
         WHERE id = ? AND customer_id = ?",
    )
    .bind(&fields.zip_code)
    .bind(&fields.street)
    .bind(&fields.number)
    .bind(&fields.complement)
    .bind(&fields.neighborhood)
    .bind(&fields.address_type)
    .bind(&fields.city)
    .bind(&fields.state)
    .bind(&fields.country)
    .bind(Utc::now().to_rfc3339())
    .bind(id.0)
    .bind(customer_id.0)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::MissingRecord(format!(
            "address {id} for customer {customer_id}"
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
impl AddressRepository for SqlAddressRepository {
    async fn find_by_id(&self, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ADDRESS_COLUMNS} FROM address WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_address(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_customer_id(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM address WHERE customer_id = ? ORDER BY id ASC"
        ))
        .bind(customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_address).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, address: Address) -> Result<Address, RepositoryError> {
        update_address(&self.pool, address.id, address.customer_id, &address.fields).await?;
        self.find_by_id(address.id)
            .await?
            .ok_or_else(|| RepositoryError::MissingRecord(format!("address {}", address.id)))
    }

    async fn delete_by_id(&self, id: AddressId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM address WHERE id = ?").bind(id.0).execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clientele_core::domain::address::{AddressFields, AddressId};
    use clientele_core::domain::customer::CustomerDraft;
    use clientele_core::domain::user::UserId;

    use super::SqlAddressRepository;
    use crate::repositories::{
        AddressRepository, CustomerRepository, RepositoryError, SqlCustomerRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn fields(street: &str) -> AddressFields {
        AddressFields {
            zip_code: "12345-678".to_string(),
            street: street.to_string(),
            number: "10".to_string(),
            complement: "apt1".to_string(),
            neighborhood: "Centro".to_string(),
            address_type: "home".to_string(),
            city: "SP".to_string(),
            state: "SP".to_string(),
            country: "BR".to_string(),
        }
    }

    #[tokio::test]
    async fn addresses_are_listed_per_customer_and_updated_in_place() {
        let pool = setup().await;
        let customers = SqlCustomerRepository::new(pool.clone());
        let addresses = SqlAddressRepository::new(pool);

        let first = customers
            .save(CustomerDraft::new(
                UserId(1),
                "1990-01-01".to_string(),
                vec![fields("Main"), fields("Second")],
            ))
            .await
            .expect("save first");
        customers
            .save(CustomerDraft::new(UserId(2), "1991-01-01".to_string(), vec![fields("Other")]))
            .await
            .expect("save second");

        let listed = addresses.find_by_customer_id(first.id).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|address| address.customer_id == first.id));

        let mut changed = listed[0].clone();
        changed.fields.city = "Campinas".to_string();
        let saved = addresses.save(changed).await.expect("save address");
        assert_eq!(saved.fields.city, "Campinas");
        assert_eq!(saved.id, listed[0].id);

        let reloaded = customers.find_by_id(first.id).await.expect("find").expect("exists");
        assert_eq!(reloaded.address(saved.id).map(|a| a.fields.city.as_str()), Some("Campinas"));
    }

    #[tokio::test]
    async fn saving_unknown_address_is_an_error() {
        let pool = setup().await;
        let customers = SqlCustomerRepository::new(pool.clone());
        let addresses = SqlAddressRepository::new(pool);
        let customer = customers
            .save(CustomerDraft::new(UserId(1), "1990-01-01".to_string(), vec![fields("Main")]))
            .await
            .expect("save");

        let mut ghost = customer.addresses[0].clone();
        ghost.id = AddressId(999);
        let error = addresses.save(ghost).await.expect_err("missing row");
        assert!(matches!(error, RepositoryError::MissingRecord(_)));
    }

    #[tokio::test]
    async fn delete_removes_only_the_address() {
        let pool = setup().await;
        let customers = SqlCustomerRepository::new(pool.clone());
        let addresses = SqlAddressRepository::new(pool);
        let customer = customers
            .save(CustomerDraft::new(
                UserId(1),
                "1990-01-01".to_string(),
                vec![fields("Main"), fields("Second")],
            ))
            .await
            .expect("save");

        addresses.delete_by_id(customer.addresses[0].id).await.expect("delete");

        assert_eq!(addresses.find_by_id(customer.addresses[0].id).await.expect("find"), None);
        let remaining = addresses.find_by_customer_id(customer.id).await.expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].fields.street, "Second");
    }
}
