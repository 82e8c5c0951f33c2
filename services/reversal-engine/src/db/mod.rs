use crate::models::{ReversalState, SnapshotRecord};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

pub type Db = Pool<Postgres>;

pub async fn init_db(database_url: &str) -> anyhow::Result<Db> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Snapshots kept in memory when no database is configured
const MEMORY_CAPACITY: usize = 500;

/// Snapshot persistence. Postgres when a DATABASE_URL is configured,
/// otherwise a bounded in-memory ring for local runs.
#[derive(Clone)]
pub enum SnapshotStore {
    Postgres(Db),
    Memory(Arc<RwLock<VecDeque<SnapshotRecord>>>),
}

impl SnapshotStore {
    pub fn postgres(db: Db) -> Self {
        SnapshotStore::Postgres(db)
    }

    pub fn memory() -> Self {
        SnapshotStore::Memory(Arc::new(RwLock::new(VecDeque::new())))
    }

    /// Persist one evaluation snapshot, keyed by its evaluation timestamp.
    /// Re-evaluating the same instant overwrites rather than duplicating.
    pub async fn insert(&self, state: &ReversalState) -> anyhow::Result<SnapshotRecord> {
        let record = SnapshotRecord {
            id: Uuid::new_v4(),
            evaluated_at: state.evaluated_at,
            stage: state.stage.to_string(),
            final_score: state.final_score,
            state: serde_json::to_value(state)?,
        };

        match self {
            SnapshotStore::Postgres(db) => {
                sqlx::query(
                    "INSERT INTO reversal_snapshots (id, evaluated_at, stage, final_score, state)
                     VALUES ($1, $2, $3, $4, $5)
                     ON CONFLICT (evaluated_at) DO UPDATE
                     SET stage = EXCLUDED.stage,
                         final_score = EXCLUDED.final_score,
                         state = EXCLUDED.state",
                )
                .bind(record.id)
                .bind(record.evaluated_at)
                .bind(&record.stage)
                .bind(record.final_score)
                .bind(&record.state)
                .execute(db)
                .await?;
            }
            SnapshotStore::Memory(ring) => {
                let mut ring = ring.write().await;
                ring.retain(|r| r.evaluated_at != record.evaluated_at);
                if ring.len() >= MEMORY_CAPACITY {
                    ring.pop_front();
                }
                ring.push_back(record.clone());
            }
        }

        Ok(record)
    }

    /// Most recent snapshots, newest first
    pub async fn history(&self, limit: i64) -> anyhow::Result<Vec<SnapshotRecord>> {
        match self {
            SnapshotStore::Postgres(db) => {
                let rows = sqlx::query_as::<_, SnapshotRecord>(
                    "SELECT id, evaluated_at, stage, final_score, state
                     FROM reversal_snapshots
                     ORDER BY evaluated_at DESC
                     LIMIT $1",
                )
                .bind(limit)
                .fetch_all(db)
                .await?;
                Ok(rows)
            }
            SnapshotStore::Memory(ring) => {
                let ring = ring.read().await;
                Ok(ring
                    .iter()
                    .rev()
                    .take(limit.max(0) as usize)
                    .cloned()
                    .collect())
            }
        }
    }

    pub async fn latest(&self) -> anyhow::Result<Option<SnapshotRecord>> {
        Ok(self.history(1).await?.into_iter().next())
    }

    /// Cheap connectivity probe for readiness checks
    pub async fn ping(&self) -> anyhow::Result<()> {
        match self {
            SnapshotStore::Postgres(db) => {
                sqlx::query("SELECT 1").fetch_one(db).await?;
                Ok(())
            }
            SnapshotStore::Memory(_) => Ok(()),
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            SnapshotStore::Postgres(_) => "postgres",
            SnapshotStore::Memory(_) => "memory",
        }
    }
}
