use fanout::bail;
use fanout::error::{ErrorKind, FanoutResult};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};

/// A pipeline whose runs must not overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    MovieReplication,
    RatingReplication,
    Aggregation,
}

impl RunKind {
    /// Returns the advisory lock key of the pipeline.
    pub fn lock_key(&self) -> i64 {
        // "fanout" in ASCII, followed by the pipeline number.
        const PREFIX: i64 = 0x66_61_6e_6f_75_74 << 8;

        match self {
            RunKind::MovieReplication => PREFIX | 1,
            RunKind::RatingReplication => PREFIX | 2,
            RunKind::Aggregation => PREFIX | 3,
        }
    }

    pub fn as_static_str(&self) -> &'static str {
        match self {
            RunKind::MovieReplication => "movie_replication",
            RunKind::RatingReplication => "rating_replication",
            RunKind::Aggregation => "aggregation",
        }
    }
}

/// A session advisory lock held for the duration of a run.
///
/// The lock lives on a connection detached from the pool, so it is released when
/// [`RunLock::release`] is called or, if the process dies, when the server closes the
/// session.
#[derive(Debug)]
pub struct RunLock {
    kind: RunKind,
    connection: PgConnection,
}

impl RunLock {
    /// Takes the lock of `kind` without waiting.
    ///
    /// Fails with [`ErrorKind::ConcurrentRunDetected`] when another session holds it.
    pub async fn acquire(pool: &PgPool, kind: RunKind) -> FanoutResult<Self> {
        let mut connection = pool.acquire().await?.detach();

        let acquired: bool = sqlx::query_scalar("select pg_try_advisory_lock($1)")
            .bind(kind.lock_key())
            .fetch_one(&mut connection)
            .await?;

        if !acquired {
            bail!(
                ErrorKind::ConcurrentRunDetected,
                "Another run of the same pipeline is in progress",
                format!("advisory lock for {} is held by another session", kind.as_static_str())
            );
        }

        info!(run = kind.as_static_str(), "acquired run lock");

        Ok(Self { kind, connection })
    }

    /// Releases the lock and closes its connection.
    pub async fn release(mut self) -> FanoutResult<()> {
        let released: bool = sqlx::query_scalar("select pg_advisory_unlock($1)")
            .bind(self.kind.lock_key())
            .fetch_one(&mut self.connection)
            .await?;

        if !released {
            warn!(run = self.kind.as_static_str(), "run lock was not held when releasing it");
        }

        sqlx::Connection::close(self.connection).await?;

        info!(run = self.kind.as_static_str(), "released run lock");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_keys_are_distinct() {
        let keys = [
            RunKind::MovieReplication.lock_key(),
            RunKind::RatingReplication.lock_key(),
            RunKind::Aggregation.lock_key(),
        ];

        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_ne!(keys[0], keys[2]);
        assert!(keys.iter().all(|key| *key > 0));
    }
}
