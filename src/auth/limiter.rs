//! Fixed-window attempt counting, keyed by client.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: DateTime<Utc>,
    attempts: u32,
}

#[derive(Debug)]
struct Clients {
    windows: HashMap<String, Window>,
    last_prune: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_attempts: u32,
    window: Duration,
    clients: Mutex<Clients>,
}

impl RateLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            clients: Mutex::new(Clients {
                windows: HashMap::new(),
                last_prune: None,
            }),
        }
    }

    /// Five attempts per five minutes.
    pub fn for_login() -> Self {
        Self::new(5, Duration::minutes(5))
    }

    /// Records an attempt by `client` and reports whether it is allowed.
    /// Rejected attempts still count towards the current window.
    pub fn hit(&self, client: &str, now: DateTime<Utc>) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Expired windows are dropped at most once per window length.
        if clients
            .last_prune
            .map_or(true, |at| now - at >= self.window)
        {
            let window = self.window;
            clients.windows.retain(|_, w| now - w.started < window);
            clients.last_prune = Some(now);
        }

        let entry = clients.windows.entry(client.to_string()).or_insert(Window {
            started: now,
            attempts: 0,
        });
        if now - entry.started >= self.window {
            *entry = Window {
                started: now,
                attempts: 0,
            };
        }
        entry.attempts += 1;
        entry.attempts <= self.max_attempts
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .windows
            .len()
    }
}
