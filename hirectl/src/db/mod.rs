//! Database layer for credit packs and usage logs.
//!
//! Follows the repository pattern over SQLx with PostgreSQL:
//!
//! ```text
//! ┌──────────────────┐
//! │ PostgresPackStore│  (credits::store - PackStore impl)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │   Repositories   │  (db::handlers - queries)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │      Models      │  (db::models - table rows)
//! └────────┬─────────┘
//!          │
//!          ↓
//! ┌──────────────────┐
//! │    PostgreSQL    │
//! └──────────────────┘
//! ```
//!
//! # Transactions
//!
//! Repositories wrap a `&mut PgConnection`. Anything that writes more than one row must create
//! the repository from a transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut repo = CreditPacks::new(&mut tx);
//! if repo.increment_used(user_id, pack_id, resource_type, now).await? {
//!     repo.insert_usage(user_id, pack_id, resource_type, None, now).await?;
//! }
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded through [`crate::migrator`]:
//!
//! ```ignore
//! hirectl::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
