//! PostgreSQL implementations of the storage traits using sqlx.
//!
//! Transaction-scoped calls run on the connection owned by the open
//! `sqlx::Transaction`. The `AccountLookup` reads run on the pool for
//! callers outside a transaction.

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::db::DbPool;
use crate::models::account::BankAccount;
use crate::models::transfer::{NewTransfer, Transfer};
use crate::storage::{
    AccountLookup, AccountStore, Database, HealthProbe, StorageError, TransferStore,
};

/// Open PostgreSQL transaction.
pub type PgTx = sqlx::Transaction<'static, Postgres>;

/// Rows per INSERT statement; keeps bind parameters well under the 65535 limit.
const INSERT_CHUNK_SIZE: usize = 1000;

/// Transaction lifecycle over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgDatabase {
    pool: DbPool,
}

impl PgDatabase {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Tx = PgTx;

    async fn begin_serializable(&self) -> Result<PgTx, StorageError> {
        let mut tx = self.pool.begin().await?;
        // Must be the first statement of the transaction
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn commit(&self, tx: PgTx) -> Result<(), StorageError> {
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self, tx: PgTx) -> Result<(), StorageError> {
        tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for PgDatabase {
    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Bank account repository backed by the `bank_accounts` table.
#[derive(Debug, Clone)]
pub struct PgAccountRepository {
    pool: DbPool,
}

impl PgAccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountLookup for PgAccountRepository {
    async fn find_by_iban(&self, iban: &str) -> Result<BankAccount, StorageError> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_iban(&mut conn, iban).await
    }

    async fn list_transfers(&self, bank_account_id: i64) -> Result<Vec<Transfer>, StorageError> {
        let transfers = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, counterparty_name, counterparty_iban, counterparty_bic,
                   amount_cents, bank_account_id, description, created_at
            FROM transfers
            WHERE bank_account_id = $1
            ORDER BY id
            "#,
        )
        .bind(bank_account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(transfers)
    }
}

async fn fetch_by_iban(conn: &mut PgConnection, iban: &str) -> Result<BankAccount, StorageError> {
    sqlx::query_as::<_, BankAccount>(
        r#"
        SELECT id, organization_name, balance_cents, iban, bic
        FROM bank_accounts
        WHERE iban = $1
        "#,
    )
    .bind(iban)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| StorageError::NotFound {
        entity: "bank account",
        key: iban.to_string(),
    })
}

#[async_trait]
impl AccountStore<PgTx> for PgAccountRepository {
    async fn get_by_iban(&self, tx: &mut PgTx, iban: &str) -> Result<BankAccount, StorageError> {
        fetch_by_iban(&mut **tx, iban).await
    }

    async fn update(&self, tx: &mut PgTx, account: &BankAccount) -> Result<(), StorageError> {
        let updated = sqlx::query(
            r#"
            UPDATE bank_accounts
            SET organization_name = $1, balance_cents = $2, iban = $3, bic = $4
            WHERE id = $5
            "#,
        )
        .bind(&account.organization_name)
        .bind(account.balance_cents)
        .bind(&account.iban)
        .bind(&account.bic)
        .bind(account.id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(StorageError::NotFound {
                entity: "bank account",
                key: account.id.to_string(),
            });
        }
        Ok(())
    }
}

/// Transfer repository backed by the `transfers` table.
#[derive(Debug, Clone, Default)]
pub struct PgTransferRepository;

impl PgTransferRepository {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransferStore<PgTx> for PgTransferRepository {
    async fn create_bulk(
        &self,
        tx: &mut PgTx,
        transfers: &[NewTransfer],
    ) -> Result<(), StorageError> {
        for chunk in transfers.chunks(INSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO transfers (counterparty_name, counterparty_iban, counterparty_bic, \
                 amount_cents, bank_account_id, description) ",
            );
            builder.push_values(chunk, |mut row, t| {
                row.push_bind(&t.counterparty_name)
                    .push_bind(&t.counterparty_iban)
                    .push_bind(&t.counterparty_bic)
                    .push_bind(t.amount_cents)
                    .push_bind(t.bank_account_id)
                    .push_bind(&t.description);
            });
            builder.build().execute(&mut **tx).await?;
        }
        Ok(())
    }
}
