//! Redis-backed page cache

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::{debug, error, info, instrument, warn};

use super::CacheStore;
use crate::error::Result;

/// Shared Redis client.
/// `ConnectionManager` reconnects on its own, so clones are cheap and safe.
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
    redis_url: String,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("redis_url", &self.redis_url)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis at {}", redis_url);
        let client = redis::Client::open(redis_url)?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to create Redis ConnectionManager: {}", e);
            e
        })?;

        Ok(Self {
            conn_manager,
            redis_url: redis_url.to_string(),
        })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();
        let value: Option<String> = conn.get(key).await.map_err(|e| {
            warn!("Redis GET failed: {}", e);
            e
        })?;

        debug!(hit = value.is_some(), "Redis GET");
        Ok(value)
    }

    #[instrument(skip(self, value), fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        match ttl {
            // SETEX rejects a zero expiry.
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, secs).await?;
                debug!(ttl_secs = secs, "Redis SETEX");
            }
            None => {
                conn.set::<_, _, ()>(key, value).await?;
                debug!("Redis SET without expiry");
            }
        }

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    type Commands = Arc<Mutex<Vec<Vec<String>>>>;

    /// Read one RESP array command; `None` once the client hangs up
    async fn read_command<R>(reader: &mut BufReader<R>) -> Option<Vec<String>>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;

        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            line.clear();
            reader.read_line(&mut line).await.ok()?;
            let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;

            let mut data = vec![0u8; len + 2];
            reader.read_exact(&mut data).await.ok()?;
            data.truncate(len);
            args.push(String::from_utf8(data).ok()?);
        }

        Some(args)
    }

    /// Just enough of a Redis server for GET, SET and SETEX
    async fn spawn_fake_redis() -> (String, Commands) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("redis://{}/0", listener.local_addr().unwrap());
        let commands: Commands = Arc::default();
        let store: Arc<Mutex<HashMap<String, String>>> = Arc::default();

        let seen = commands.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let seen = seen.clone();
                let store = store.clone();
                tokio::spawn(async move {
                    let (read, mut write) = socket.into_split();
                    let mut reader = BufReader::new(read);

                    while let Some(args) = read_command(&mut reader).await {
                        let name = args[0].to_ascii_uppercase();
                        let reply = match (name.as_str(), args.as_slice()) {
                            ("GET", [_, key]) => match store.lock().get(key) {
                                Some(value) => format!("${}\r\n{}\r\n", value.len(), value),
                                None => "$-1\r\n".to_string(),
                            },
                            ("SET", [_, key, value]) | ("SETEX", [_, key, _, value]) => {
                                store.lock().insert(key.clone(), value.clone());
                                "+OK\r\n".to_string()
                            }
                            ("PING", _) => "+PONG\r\n".to_string(),
                            _ => "+OK\r\n".to_string(),
                        };

                        if matches!(name.as_str(), "GET" | "SET" | "SETEX") {
                            seen.lock().push(args);
                        }
                        if write.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        (url, commands)
    }

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[tokio::test]
    async fn test_set_with_ttl_sends_setex() {
        let (url, commands) = spawn_fake_redis().await;
        let cache = RedisCache::new(&url).await.unwrap();

        cache
            .set("https://example.com", "<html/>", Some(Duration::from_secs(172_800)))
            .await
            .unwrap();

        assert_eq!(
            commands.lock().as_slice(),
            &[command(&["SETEX", "https://example.com", "172800", "<html/>"])]
        );
    }

    #[tokio::test]
    async fn test_sub_second_ttl_is_clamped() {
        let (url, commands) = spawn_fake_redis().await;
        let cache = RedisCache::new(&url).await.unwrap();

        cache
            .set("k", "v", Some(Duration::from_millis(200)))
            .await
            .unwrap();

        assert_eq!(commands.lock().as_slice(), &[command(&["SETEX", "k", "1", "v"])]);
    }

    #[tokio::test]
    async fn test_set_without_ttl_sends_plain_set() {
        let (url, commands) = spawn_fake_redis().await;
        let cache = RedisCache::new(&url).await.unwrap();

        cache.set("k", "v", None).await.unwrap();

        assert_eq!(commands.lock().as_slice(), &[command(&["SET", "k", "v"])]);
    }

    #[tokio::test]
    async fn test_get_hit_and_miss() {
        let (url, commands) = spawn_fake_redis().await;
        let cache = RedisCache::new(&url).await.unwrap();

        assert_eq!(cache.get("https://example.com").await.unwrap(), None);

        cache
            .set("https://example.com", "<p>body</p>", Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(
            cache.get("https://example.com").await.unwrap().as_deref(),
            Some("<p>body</p>")
        );

        let names: Vec<String> = commands.lock().iter().map(|args| args[0].clone()).collect();
        assert_eq!(names, vec!["GET", "SETEX", "GET"]);
        assert_eq!(cache.backend_name(), "redis");
    }
}
