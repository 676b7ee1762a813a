//! Stake Storage
//!
//! SQLite-backed persistence for categories, markets, users and stakes.
//!
//! Every multi-statement operation goes through [`StakeStorage::transaction`],
//! which opens an IMMEDIATE transaction. That takes the database write lock up
//! front, so a check-then-insert or a multi-row settlement observes and
//! mutates a single consistent snapshot and is rolled back as a whole on error.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use staking_core::{
    Category, Choice, Market, NewStake, NewUser, Stake, StakeError, StakeFilter, StakeStatus,
    User, ValidMarket,
};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, error};
use uuid::Uuid;

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS categories (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS markets (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT,
        category_id TEXT REFERENCES categories(id),
        min_stake TEXT NOT NULL,
        max_stake TEXT NOT NULL,
        start_date INTEGER NOT NULL,
        end_date INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        trending INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        CHECK (start_date <= end_date)
    );

    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        wallet_address TEXT UNIQUE,
        email TEXT UNIQUE,
        full_name TEXT,
        username TEXT,
        phone TEXT,
        created_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS stakes (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL REFERENCES users(id),
        market_id TEXT NOT NULL REFERENCES markets(id),
        amount TEXT NOT NULL,
        choice TEXT NOT NULL CHECK (choice IN ('yes', 'no')),
        status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'won', 'lost')),
        created_at INTEGER NOT NULL,
        UNIQUE (user_id, market_id)
    );

    CREATE INDEX IF NOT EXISTS idx_stakes_market
    ON stakes(market_id, status);

    CREATE INDEX IF NOT EXISTS idx_stakes_user
    ON stakes(user_id);
"#;

const MARKET_COLUMNS: &str = "id, title, description, category_id, min_stake, max_stake, \
     start_date, end_date, is_active, trending, created_at, updated_at";

const USER_COLUMNS: &str =
    "id, wallet_address, email, full_name, username, phone, created_at";

const STAKE_COLUMNS: &str = "id, user_id, market_id, amount, choice, status, created_at";

/// Stake storage service using SQLite
pub struct StakeStorage {
    conn: Mutex<Connection>,
}

impl StakeStorage {
    /// Create a new StakeStorage instance
    ///
    /// Creates the database file and tables if they don't exist.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Io(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory StakeStorage (useful for testing)
    pub fn new_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run read-only queries against the current committed state
    pub fn read<T, E>(&self, f: impl FnOnce(&Queries<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let conn = self.conn.lock();
        f(&Queries { conn: &conn })
    }

    /// Run `f` inside an IMMEDIATE transaction
    ///
    /// Commits when `f` returns `Ok`; any `Err` rolls back every statement
    /// `f` issued.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&Queries<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;

        let out = f(&Queries { conn: &tx })?;

        tx.commit().map_err(StorageError::from)?;
        Ok(out)
    }

    /// Cheap round-trip used by health checks
    pub fn ping(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), StorageError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }
}

/// Row-level operations over a borrowed connection or transaction
pub struct Queries<'c> {
    conn: &'c Connection,
}

impl Queries<'_> {
    // ------------------------------------------------------------------
    // Categories
    // ------------------------------------------------------------------

    pub fn insert_category(
        &self,
        name: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Category, StorageError> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO categories (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, description, now.timestamp_millis()],
        )?;

        Ok(Category {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: from_millis(now.timestamp_millis()),
        })
    }

    pub fn list_categories(&self) -> Result<Vec<Category>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, created_at FROM categories ORDER BY created_at ASC, rowid ASC",
        )?;
        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_at: time_col(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    pub fn category_exists(&self, id: &str) -> Result<bool, StorageError> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    // ------------------------------------------------------------------
    // Markets
    // ------------------------------------------------------------------

    pub fn insert_market(
        &self,
        market: &ValidMarket,
        now: DateTime<Utc>,
    ) -> Result<Market, StorageError> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            r#"
            INSERT INTO markets (id, title, description, category_id, min_stake, max_stake,
                                 start_date, end_date, is_active, trending, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?10)
            "#,
            params![
                id,
                market.title,
                market.description,
                market.category_id,
                market.min_stake.normalize().to_string(),
                market.max_stake.normalize().to_string(),
                market.start_date.timestamp_millis(),
                market.end_date.timestamp_millis(),
                market.trending,
                now.timestamp_millis(),
            ],
        )?;

        self.get_market(&id)?
            .ok_or_else(|| StorageError::Missing(format!("market {} after insert", id)))
    }

    pub fn get_market(&self, id: &str) -> Result<Option<Market>, StorageError> {
        let market = self
            .conn
            .query_row(
                &format!("SELECT {} FROM markets WHERE id = ?1", MARKET_COLUMNS),
                params![id],
                market_from_row,
            )
            .optional()?;
        Ok(market)
    }

    pub fn list_markets(&self) -> Result<Vec<Market>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM markets ORDER BY created_at DESC, rowid DESC",
            MARKET_COLUMNS
        ))?;
        let markets = stmt
            .query_map([], market_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(markets)
    }

    /// Flip `is_active` to false if it is still true
    ///
    /// Returns the number of rows changed: 1 when this call closed the
    /// market, 0 when it was already closed (or does not exist).
    pub fn close_market(&self, id: &str, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let changed = self.conn.execute(
            "UPDATE markets SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
            params![id, now.timestamp_millis()],
        )?;
        Ok(changed)
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Insert a validated user
    ///
    /// A duplicate email or wallet address surfaces as
    /// [`StorageError::Duplicate`].
    pub fn insert_user(&self, user: &NewUser, now: DateTime<Utc>) -> Result<User, StorageError> {
        let id = Uuid::new_v4().to_string();
        let result = self.conn.execute(
            r#"
            INSERT INTO users (id, wallet_address, email, full_name, username, phone, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                id,
                user.wallet_address,
                user.email,
                user.full_name,
                user.username,
                user.phone,
                now.timestamp_millis(),
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                let message = if e.to_string().contains("users.email") {
                    "Email already exists"
                } else {
                    "Wallet address already registered"
                };
                return Err(StorageError::Duplicate(message.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        self.get_user(&id)?
            .ok_or_else(|| StorageError::Missing(format!("user {} after insert", id)))
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, StorageError> {
        self.find_user_by("id", id)
    }

    pub fn find_user_by_wallet(&self, wallet_address: &str) -> Result<Option<User>, StorageError> {
        self.find_user_by("wallet_address", wallet_address)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        self.find_user_by("email", email)
    }

    pub fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY created_at ASC, rowid ASC",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    fn find_user_by(&self, column: &'static str, value: &str) -> Result<Option<User>, StorageError> {
        let user = self
            .conn
            .query_row(
                &format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column),
                params![value],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Stakes
    // ------------------------------------------------------------------

    /// Insert a pending stake
    ///
    /// The `UNIQUE(user_id, market_id)` constraint backs the admission
    /// uniqueness check; a violation surfaces as [`StorageError::Duplicate`].
    pub fn insert_stake(&self, stake: &NewStake, now: DateTime<Utc>) -> Result<Stake, StorageError> {
        let id = Uuid::new_v4().to_string();
        let created_at = now.timestamp_millis();
        let result = self.conn.execute(
            r#"
            INSERT INTO stakes (id, user_id, market_id, amount, choice, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)
            "#,
            params![
                id,
                stake.user_id,
                stake.market_id,
                stake.amount.normalize().to_string(),
                stake.choice.as_str(),
                created_at,
            ],
        );

        match result {
            Ok(_) => Ok(Stake {
                id,
                user_id: stake.user_id.clone(),
                market_id: stake.market_id.clone(),
                amount: stake.amount.normalize(),
                choice: stake.choice,
                status: StakeStatus::Pending,
                created_at: from_millis(created_at),
            }),
            Err(e) if is_unique_violation(&e) => Err(StorageError::Duplicate(
                "User has already staked on this market".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_stake(&self, user_id: &str, market_id: &str) -> Result<Option<Stake>, StorageError> {
        let stake = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM stakes WHERE user_id = ?1 AND market_id = ?2",
                    STAKE_COLUMNS
                ),
                params![user_id, market_id],
                stake_from_row,
            )
            .optional()?;
        Ok(stake)
    }

    /// Stakes matching every filter field that is set
    pub fn list_stakes(&self, filter: &StakeFilter) -> Result<Vec<Stake>, StorageError> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM stakes
            WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR market_id = ?2)
            ORDER BY created_at ASC, rowid ASC
            "#,
            STAKE_COLUMNS
        ))?;
        let stakes = stmt
            .query_map(params![filter.user_id, filter.market_id], stake_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Loaded {} stakes for filter {:?}", stakes.len(), filter);
        Ok(stakes)
    }

    pub fn stakes_for_market(&self, market_id: &str) -> Result<Vec<Stake>, StorageError> {
        self.list_stakes(&StakeFilter {
            user_id: None,
            market_id: Some(market_id.to_string()),
        })
    }

    pub fn all_stakes(&self) -> Result<Vec<Stake>, StorageError> {
        self.list_stakes(&StakeFilter::default())
    }

    /// Move pending stakes on one side of a market to `status`
    ///
    /// `on_side = true` targets stakes whose choice equals `choice`,
    /// `false` targets every other stake. Only `pending` rows are touched,
    /// so a repeated call changes nothing.
    pub fn resolve_pending(
        &self,
        market_id: &str,
        choice: Choice,
        on_side: bool,
        status: StakeStatus,
    ) -> Result<usize, StorageError> {
        let sql = if on_side {
            "UPDATE stakes SET status = ?3 WHERE market_id = ?1 AND choice = ?2 AND status = 'pending'"
        } else {
            "UPDATE stakes SET status = ?3 WHERE market_id = ?1 AND choice != ?2 AND status = 'pending'"
        };
        let changed = self
            .conn
            .execute(sql, params![market_id, choice.as_str(), status.as_str()])?;
        Ok(changed)
    }
}

// ----------------------------------------------------------------------
// Row decoding
// ----------------------------------------------------------------------

fn market_from_row(row: &Row<'_>) -> rusqlite::Result<Market> {
    Ok(Market {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category_id: row.get(3)?,
        min_stake: decimal_col(row, 4)?,
        max_stake: decimal_col(row, 5)?,
        start_date: time_col(row, 6)?,
        end_date: time_col(row, 7)?,
        is_active: row.get(8)?,
        trending: row.get(9)?,
        created_at: time_col(row, 10)?,
        updated_at: time_col(row, 11)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        wallet_address: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        username: row.get(4)?,
        phone: row.get(5)?,
        created_at: time_col(row, 6)?,
    })
}

fn stake_from_row(row: &Row<'_>) -> rusqlite::Result<Stake> {
    let choice: String = row.get(4)?;
    let status: String = row.get(5)?;
    Ok(Stake {
        id: row.get(0)?,
        user_id: row.get(1)?,
        market_id: row.get(2)?,
        amount: decimal_col(row, 3)?,
        choice: Choice::from_str(&choice)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        status: StakeStatus::from_str(&status)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
        created_at: time_col(row, 6)?,
    })
}

/// Amounts are stored as decimal text so sums stay exact
fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {}", millis).into(),
        )
    })
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Errors that can occur during stake storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(String),

    /// A uniqueness constraint rejected the write
    #[error("{0}")]
    Duplicate(String),

    #[error("Row missing: {0}")]
    Missing(String),
}

impl From<StorageError> for StakeError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Duplicate(msg) => StakeError::Conflict(msg),
            other => {
                error!("Storage failure: {}", other);
                StakeError::Storage(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn seed_market(storage: &StakeStorage) -> Market {
        let now = Utc::now();
        let market = ValidMarket {
            title: "Will it rain tomorrow?".to_string(),
            description: Some("Resolves yes on any rainfall".to_string()),
            category_id: None,
            min_stake: dec!(1),
            max_stake: dec!(1000),
            start_date: now - Duration::hours(1),
            end_date: now + Duration::hours(1),
            trending: true,
        };
        storage
            .transaction(|q| q.insert_market(&market, now))
            .unwrap()
    }

    fn seed_user(storage: &StakeStorage, wallet: &str) -> User {
        storage
            .transaction(|q| q.insert_user(&NewUser::from_wallet(wallet), Utc::now()))
            .unwrap()
    }

    #[test]
    fn test_store_and_retrieve_market() {
        let storage = StakeStorage::new_in_memory().unwrap();
        let market = seed_market(&storage);

        let loaded = storage
            .read(|q| q.get_market(&market.id))
            .unwrap()
            .unwrap();
        assert_eq!(loaded, market);
        assert!(loaded.is_active);
        assert!(loaded.trending);
        assert_eq!(loaded.max_stake, dec!(1000));
    }

    #[test]
    fn test_duplicate_stake_is_rejected_by_constraint() {
        let storage = StakeStorage::new_in_memory().unwrap();
        let market = seed_market(&storage);
        let user = seed_user(&storage, "0xabc");

        let stake = NewStake {
            user_id: user.id.clone(),
            market_id: market.id.clone(),
            amount: dec!(10),
            choice: Choice::Yes,
        };
        storage
            .transaction(|q| q.insert_stake(&stake, Utc::now()))
            .unwrap();

        let second = storage.transaction(|q| q.insert_stake(&stake, Utc::now()));
        assert!(matches!(second, Err(StorageError::Duplicate(_))));

        let count = storage.read(|q| q.stakes_for_market(&market.id)).unwrap().len();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_amount_round_trips_exactly() {
        let storage = StakeStorage::new_in_memory().unwrap();
        let market = seed_market(&storage);
        let user = seed_user(&storage, "0xabc");

        let stake = NewStake {
            user_id: user.id,
            market_id: market.id.clone(),
            amount: dec!(0.123456789012345678),
            choice: Choice::No,
        };
        storage
            .transaction(|q| q.insert_stake(&stake, Utc::now()))
            .unwrap();

        let stored = storage.read(|q| q.all_stakes()).unwrap();
        assert_eq!(stored[0].amount, dec!(0.123456789012345678));
        assert_eq!(stored[0].choice, Choice::No);
        assert_eq!(stored[0].status, StakeStatus::Pending);
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let storage = StakeStorage::new_in_memory().unwrap();
        let market = seed_market(&storage);

        let result: Result<(), StorageError> = storage.transaction(|q| {
            q.close_market(&market.id, Utc::now())?;
            Err(StorageError::Io("injected".to_string()))
        });
        assert!(result.is_err());

        let market = storage.read(|q| q.get_market(&market.id)).unwrap().unwrap();
        assert!(market.is_active);
    }

    #[test]
    fn test_close_market_only_once() {
        let storage = StakeStorage::new_in_memory().unwrap();
        let market = seed_market(&storage);

        assert_eq!(storage.read(|q| q.close_market(&market.id, Utc::now())).unwrap(), 1);
        assert_eq!(storage.read(|q| q.close_market(&market.id, Utc::now())).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_user_identity() {
        let storage = StakeStorage::new_in_memory().unwrap();
        seed_user(&storage, "0xabc");

        let again = storage.transaction(|q| q.insert_user(&NewUser::from_wallet("0xabc"), Utc::now()));
        match again {
            Err(StorageError::Duplicate(msg)) => assert_eq!(msg, "Wallet address already registered"),
            other => panic!("expected duplicate, got {:?}", other.map(|u| u.id)),
        }

        let found = storage.read(|q| q.find_user_by_wallet("0xabc")).unwrap();
        assert!(found.is_some());
        assert_eq!(storage.read(|q| q.list_users()).unwrap().len(), 1);
    }

    #[test]
    fn test_list_stakes_filters() {
        let storage = StakeStorage::new_in_memory().unwrap();
        let market = seed_market(&storage);
        let alice = seed_user(&storage, "0xa11ce");
        let bob = seed_user(&storage, "0xb0b");

        for user in [&alice, &bob] {
            let stake = NewStake {
                user_id: user.id.clone(),
                market_id: market.id.clone(),
                amount: dec!(5),
                choice: Choice::Yes,
            };
            storage
                .transaction(|q| q.insert_stake(&stake, Utc::now()))
                .unwrap();
        }

        let filter = StakeFilter {
            user_id: Some(alice.id.clone()),
            market_id: None,
        };
        let stakes = storage.read(|q| q.list_stakes(&filter)).unwrap();
        assert_eq!(stakes.len(), 1);
        assert_eq!(stakes[0].user_id, alice.id);

        assert_eq!(storage.read(|q| q.all_stakes()).unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let err: StakeError = StorageError::Duplicate("Email already exists".to_string()).into();
        assert_eq!(err, StakeError::conflict("Email already exists"));
    }
}
