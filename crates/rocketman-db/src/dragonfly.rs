//! `Dragonfly` (Redis-compatible) rocket storage.
//!
//! # Key Patterns
//!
//! | Pattern | Type | Description |
//! |---------|------|-------------|
//! | `rocket:{owner}:{id}` | JSON | Full rocket record |
//! | `owner:{owner}:rockets` | Set | IDs of the owner's rockets |
//! | `rockets:ids` | Set | Every rocket ID, across all owners |
//!
//! `rockets:ids` doubles as the global ID claim: `SADD` returning 0 means
//! the ID is taken, whoever owns it. A claim whose record could not be
//! written is released again.
//!
//! Owner and ID are joined with `:`, so only routable IDs (which never
//! contain `:`) may reach this module. Decoded records are still checked
//! against the requested owner and ID before they are returned.

use fred::prelude::*;
use fred::types::SetOptions;
use rocketman_types::{Rocket, RocketId};

use crate::error::DbError;

/// Global set of every rocket ID.
const GLOBAL_IDS_KEY: &str = "rockets:ids";

/// Key holding a rocket record.
pub fn rocket_key(owner: &str, id: &RocketId) -> String {
    format!("rocket:{owner}:{id}")
}

/// Key holding an owner's rocket ID index.
pub fn owner_index_key(owner: &str) -> String {
    format!("owner:{owner}:rockets")
}

/// Whether a decoded record is the one stored for `owner` and `id`.
fn belongs_to(rocket: &Rocket, owner: &str, id: &RocketId) -> bool {
    rocket.owner == owner && rocket.id == *id
}

fn not_found(owner: &str, id: &RocketId) -> DbError {
    DbError::NotFound {
        owner: owner.to_owned(),
        id: id.to_string(),
    }
}

/// Connection handle to a `Dragonfly` (Redis-compatible) instance.
///
/// Wraps a [`fred::prelude::Client`]; cloning shares the connection.
#[derive(Clone)]
pub struct DragonflyPool {
    client: Client,
}

impl DragonflyPool {
    /// Connect to `Dragonfly` at the given URL.
    ///
    /// The URL should follow the Redis URL scheme:
    /// `redis://host:port` or `redis://host:port/db`
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed.
    /// Returns [`DbError::Dragonfly`] if the connection fails.
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let config = Config::from_url(url)
            .map_err(|e| DbError::Config(format!("Invalid Dragonfly URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!("Connected to Dragonfly");
        Ok(Self { client })
    }

    /// Whether a rocket exists under `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn exists(&self, owner: &str, id: &RocketId) -> Result<bool, DbError> {
        let count: u32 = self.client.exists(rocket_key(owner, id)).await?;
        Ok(count > 0)
    }

    /// Whether any owner has a rocket with this ID.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the read fails.
    pub async fn exists_anywhere(&self, id: &RocketId) -> Result<bool, DbError> {
        let found: bool = self.client.sismember(GLOBAL_IDS_KEY, id.as_str()).await?;
        Ok(found)
    }

    /// Store a new rocket.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::AlreadyExists`] if the ID is taken by any owner.
    /// Returns [`DbError`] if serialization or a write fails.
    pub async fn create(&self, rocket: &Rocket) -> Result<(), DbError> {
        let json = serde_json::to_string(rocket)?;
        let claimed: u32 = self.client.sadd(GLOBAL_IDS_KEY, rocket.id.as_str()).await?;
        if claimed == 0 {
            return Err(DbError::AlreadyExists {
                id: rocket.id.to_string(),
            });
        }

        match self.write_claimed(rocket, &json).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DbError::AlreadyExists {
                id: rocket.id.to_string(),
            }),
            Err(e) => {
                self.release_claim(rocket).await;
                Err(e)
            }
        }
    }

    /// Write the record and owner index for an ID this caller has claimed.
    /// `Ok(false)` if a record already sits under the key.
    async fn write_claimed(&self, rocket: &Rocket, json: &str) -> Result<bool, DbError> {
        let written: Option<String> = self
            .client
            .set(
                rocket_key(&rocket.owner, &rocket.id),
                json,
                None,
                Some(SetOptions::NX),
                false,
            )
            .await?;
        if written.is_none() {
            return Ok(false);
        }
        let _: u32 = self
            .client
            .sadd(owner_index_key(&rocket.owner), rocket.id.as_str())
            .await?;
        Ok(true)
    }

    /// Undo a partially written create. Each step is attempted even if an
    /// earlier one fails.
    async fn release_claim(&self, rocket: &Rocket) {
        let id = rocket.id.as_str();
        let steps = [
            self.client.del::<u32, _>(rocket_key(&rocket.owner, &rocket.id)).await,
            self.client.srem::<u32, _, _>(owner_index_key(&rocket.owner), id).await,
            self.client.srem::<u32, _, _>(GLOBAL_IDS_KEY, id).await,
        ];
        for result in steps {
            if let Err(e) = result {
                tracing::warn!(rocket_id = id, error = %e, "failed to release rocket id claim");
            }
        }
    }

    /// Overwrite an existing rocket record.
    ///
    /// No version check is made; the last writer wins. A record that has
    /// been deleted is not recreated.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if the rocket was deleted.
    /// Returns [`DbError`] if serialization or the write fails.
    pub async fn save(&self, rocket: &Rocket) -> Result<(), DbError> {
        let json = serde_json::to_string(rocket)?;
        let written: Option<String> = self
            .client
            .set(
                rocket_key(&rocket.owner, &rocket.id),
                json.as_str(),
                None,
                Some(SetOptions::XX),
                false,
            )
            .await?;
        if written.is_none() {
            return Err(not_found(&rocket.owner, &rocket.id));
        }
        Ok(())
    }

    /// Read a rocket.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if absent.
    /// Returns [`DbError`] if the read or deserialization fails.
    pub async fn get(&self, owner: &str, id: &RocketId) -> Result<Rocket, DbError> {
        let value: Option<String> = self.client.get(rocket_key(owner, id)).await?;
        let rocket = match value {
            Some(json) => serde_json::from_str::<Rocket>(&json)?,
            None => return Err(not_found(owner, id)),
        };
        if !belongs_to(&rocket, owner, id) {
            tracing::warn!(owner, rocket_id = %id, "record under key belongs elsewhere");
            return Err(not_found(owner, id));
        }
        Ok(rocket)
    }

    /// Every rocket owned by `owner`, in no particular order.
    ///
    /// Index entries whose record has vanished are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a read or deserialization fails.
    pub async fn list_by_owner(&self, owner: &str) -> Result<Vec<Rocket>, DbError> {
        let ids: Vec<String> = self.client.smembers(owner_index_key(owner)).await?;
        let mut rockets = Vec::with_capacity(ids.len());
        for id in ids.into_iter().map(RocketId::from) {
            let value: Option<String> = self.client.get(rocket_key(owner, &id)).await?;
            match value.map(|json| serde_json::from_str::<Rocket>(&json)).transpose()? {
                Some(rocket) if belongs_to(&rocket, owner, &id) => rockets.push(rocket),
                Some(_) => tracing::warn!(owner, rocket_id = %id, "record under key belongs elsewhere"),
                None => tracing::debug!(owner, rocket_id = %id, "stale owner index entry"),
            }
        }
        Ok(rockets)
    }

    /// Remove a rocket and return the removed record.
    ///
    /// The record and both index entries are removed in one `MULTI`/`EXEC`
    /// block.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if absent.
    /// Returns [`DbError`] if a read or write fails.
    pub async fn delete(&self, owner: &str, id: &RocketId) -> Result<Rocket, DbError> {
        let rocket = self.get(owner, id).await?;
        let trx = self.client.multi();
        let _: () = trx.del(rocket_key(owner, id)).await?;
        let _: () = trx.srem(owner_index_key(owner), id.as_str()).await?;
        let _: () = trx.srem(GLOBAL_IDS_KEY, id.as_str()).await?;
        let _: fred::types::Value = trx.exec(true).await?;
        Ok(rocket)
    }

    /// Whether the client currently holds a live connection.
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the `QUIT` fails.
    pub async fn shutdown(&self) -> Result<(), DbError> {
        self.client.quit().await?;
        tracing::info!("Disconnected from Dragonfly");
        Ok(())
    }

    /// Flush all keys from the `Dragonfly` instance.
    ///
    /// **WARNING:** This deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Dragonfly`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), DbError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rocketman_types::RocketParams;

    use super::*;

    fn rocket(id: &str, owner: &str) -> Rocket {
        Rocket::new(
            RocketId::new(id),
            owner,
            RocketParams {
                num_engines: 2,
                height: 80.0,
            },
            10.0,
        )
    }

    #[test]
    fn key_patterns() {
        let id = RocketId::new("amber-falcon");
        assert_eq!(rocket_key("alice", &id), "rocket:alice:amber-falcon");
        assert_eq!(owner_index_key("alice"), "owner:alice:rockets");
    }

    #[test]
    fn colon_in_id_is_not_routable_so_keys_stay_apart() {
        // Owner "a:b" with "amber-falcon" and owner "a" with "b:amber-falcon"
        // would share a key; the second ID can never reach the store.
        let shifted = RocketId::new("b:amber-falcon");
        assert_eq!(
            rocket_key("a:b", &RocketId::new("amber-falcon")),
            rocket_key("a", &shifted)
        );
        assert!(!shifted.is_routable());
    }

    #[test]
    fn decoded_record_must_match_owner_and_id() {
        let stored = rocket("amber-falcon", "a:b");
        assert!(belongs_to(&stored, "a:b", &RocketId::new("amber-falcon")));
        assert!(!belongs_to(&stored, "a", &RocketId::new("b:amber-falcon")));
        assert!(!belongs_to(&stored, "a:b", &RocketId::new("other")));
    }

    #[tokio::test]
    #[ignore = "requires live Dragonfly instance (docker compose up -d)"]
    async fn failed_create_releases_the_id_claim() {
        let pool = DragonflyPool::connect("redis://localhost:6379").await.unwrap();
        pool.flush_all().await.unwrap();

        // A string under the owner index makes the index SADD fail (WRONGTYPE)
        // after the ID was claimed and the record written.
        let _: () = pool
            .client
            .set(owner_index_key("alice"), "not-a-set", None, None, false)
            .await
            .unwrap();

        let r = rocket("amber-falcon", "alice");
        let err = pool.create(&r).await.unwrap_err();
        assert!(matches!(err, DbError::Dragonfly(_)));
        assert!(!pool.exists_anywhere(&r.id).await.unwrap());
        assert!(!pool.exists("alice", &r.id).await.unwrap());

        let _: u32 = pool.client.del(owner_index_key("alice")).await.unwrap();
        pool.create(&r).await.unwrap();
        assert!(pool.exists_anywhere(&r.id).await.unwrap());
        pool.flush_all().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires live Dragonfly instance (docker compose up -d)"]
    async fn get_rejects_a_record_stored_for_someone_else() {
        let pool = DragonflyPool::connect("redis://localhost:6379").await.unwrap();
        pool.flush_all().await.unwrap();

        let foreign = rocket("amber-falcon", "a:b");
        let json = serde_json::to_string(&foreign).unwrap();
        let shifted = RocketId::new("b:amber-falcon");
        let _: () = pool
            .client
            .set(rocket_key("a", &shifted), json.as_str(), None, None, false)
            .await
            .unwrap();

        assert!(pool.get("a", &shifted).await.unwrap_err().is_not_found());
        pool.flush_all().await.unwrap();
    }
}
