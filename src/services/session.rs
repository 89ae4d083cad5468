// Short-lived checkout sessions keyed by an opaque token held in a cookie.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::CheckoutSession;

struct Entry {
    session: CheckoutSession,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Clone)]
pub struct CheckoutSessions {
    entries: Arc<RwLock<HashMap<Uuid, Entry>>>,
    ttl: Duration,
}

impl CheckoutSessions {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn get(&self, token: Uuid) -> Option<CheckoutSession> {
        let entries = self.entries.read().await;
        entries
            .get(&token)
            .filter(|e| !e.is_expired(Instant::now()))
            .map(|e| e.session.clone())
    }

    /// Stores `session` under `token`, minting a token when none is given.
    /// Every write pushes the expiry out by the full TTL.
    pub async fn put(&self, token: Option<Uuid>, session: CheckoutSession) -> Uuid {
        let token = token.unwrap_or_else(Uuid::new_v4);
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Self::evict_expired(&mut entries, now);
        entries.insert(
            token,
            Entry {
                session,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    pub async fn clear(&self, token: Uuid) {
        self.entries.write().await.remove(&token);
    }

    /// Drops expired entries and returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        Self::evict_expired(&mut entries, Instant::now())
    }

    fn evict_expired(entries: &mut HashMap<Uuid, Entry>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Evicted expired checkout sessions");
        }
        removed
    }

    /// Periodically sweeps expired sessions until the runtime shuts down.
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let sessions = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                sessions.sweep().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn session() -> CheckoutSession {
        CheckoutSession {
            ticket_id: 1,
            visit_date: NaiveDate::from_ymd_opt(2030, 4, 4).unwrap(),
            quantity: 1,
            additional_request: None,
            subtotal: Decimal::from(75_000),
            promo: None,
        }
    }

    #[tokio::test]
    async fn test_put_get_clear() {
        let sessions = CheckoutSessions::new(Duration::from_secs(60));
        let token = sessions.put(None, session()).await;

        assert_eq!(sessions.get(token).await, Some(session()));

        sessions.clear(token).await;
        assert!(sessions.get(token).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_sessions_are_invisible_and_swept() {
        let sessions = CheckoutSessions::new(Duration::ZERO);
        let token = sessions.put(None, session()).await;

        assert!(sessions.get(token).await.is_none());
        assert_eq!(sessions.sweep().await, 1);
    }

    #[tokio::test]
    async fn test_put_reuses_existing_token() {
        let sessions = CheckoutSessions::new(Duration::from_secs(60));
        let token = sessions.put(None, session()).await;

        let mut updated = session();
        updated.quantity = 3;
        let same = sessions.put(Some(token), updated.clone()).await;

        assert_eq!(same, token);
        assert_eq!(sessions.get(token).await, Some(updated));
    }
}
