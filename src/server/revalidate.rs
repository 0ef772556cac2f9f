//! Per-route regeneration bookkeeping for the server
//!
//! Tracks when each route was last generated so the server can serve a
//! stale page while a fresh one is built in the background, and render
//! unknown posts on first request.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;

use crate::cache::CacheDb;

/// Upper bound on remembered missing routes
const MAX_MISSING: usize = 1024;

/// Regeneration state of one route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    /// The page on disk was generated at this time
    Ready { generated_at: SystemTime },
    /// A background regeneration is running; `previous` is restored if it fails
    Rebuilding { previous: Option<Box<PageState>> },
    /// The content source had no such post at this time
    Missing { checked_at: SystemTime },
}

/// What to answer a request with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Serve the page from disk
    Fresh,
    /// Serve the page from disk; start a regeneration when `rebuild` is set
    Stale { rebuild: bool },
    /// No page yet: serve the loading placeholder, start a generation when
    /// `rebuild` is set
    Generating { rebuild: bool },
    /// Known missing post
    NotFound,
}

/// How a regeneration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Generated,
    NotFound,
    Failed,
}

pub struct Revalidator {
    interval: Duration,
    pages: Mutex<HashMap<String, PageState>>,
}

impl Revalidator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            pages: Mutex::new(HashMap::new()),
        }
    }

    /// Seed generation times from the build manifest
    pub fn from_manifest(interval: Duration, cache: &CacheDb) -> Self {
        let pages = cache
            .pages
            .iter()
            .map(|(route, record)| {
                let generated_at =
                    SystemTime::UNIX_EPOCH + Duration::from_secs(record.generated_at);
                (route.clone(), PageState::Ready { generated_at })
            })
            .collect();

        Self {
            interval,
            pages: Mutex::new(pages),
        }
    }

    /// Decide how to answer a request for `route`
    pub async fn check(&self, route: &str, on_disk: bool) -> Decision {
        self.check_at(route, on_disk, SystemTime::now()).await
    }

    pub async fn check_at(&self, route: &str, on_disk: bool, now: SystemTime) -> Decision {
        let mut pages = self.pages.lock().await;
        let state = pages.get(route).cloned();

        match state {
            Some(PageState::Rebuilding { .. }) => {
                return if on_disk {
                    Decision::Stale { rebuild: false }
                } else {
                    Decision::Generating { rebuild: false }
                };
            }
            Some(PageState::Ready { generated_at }) if on_disk => {
                if self.is_fresh(generated_at, now) {
                    return Decision::Fresh;
                }
            }
            Some(PageState::Missing { checked_at }) if !on_disk => {
                if self.is_fresh(checked_at, now) {
                    return Decision::NotFound;
                }
            }
            _ => {}
        }

        tracing::debug!("Regenerating {} (state: {:?})", route, state);
        pages.insert(
            route.to_string(),
            PageState::Rebuilding {
                previous: state.map(Box::new),
            },
        );

        if on_disk {
            Decision::Stale { rebuild: true }
        } else {
            Decision::Generating { rebuild: true }
        }
    }

    /// Record the end of a regeneration started by [`check`](Self::check)
    pub async fn finish(&self, route: &str, outcome: Outcome) {
        self.finish_at(route, outcome, SystemTime::now()).await
    }

    pub async fn finish_at(&self, route: &str, outcome: Outcome, now: SystemTime) {
        let mut pages = self.pages.lock().await;
        match outcome {
            Outcome::Generated => {
                pages.insert(route.to_string(), PageState::Ready { generated_at: now });
            }
            Outcome::NotFound => {
                pages.insert(route.to_string(), PageState::Missing { checked_at: now });
                self.prune_missing(&mut pages, now);
            }
            Outcome::Failed => match pages.remove(route) {
                Some(PageState::Rebuilding {
                    previous: Some(previous),
                }) => {
                    pages.insert(route.to_string(), *previous);
                }
                Some(PageState::Rebuilding { previous: None }) | None => {}
                Some(other) => {
                    pages.insert(route.to_string(), other);
                }
            },
        }
    }

    pub async fn state(&self, route: &str) -> Option<PageState> {
        self.pages.lock().await.get(route).cloned()
    }

    /// Number of routes being tracked
    pub async fn tracked(&self) -> usize {
        self.pages.lock().await.len()
    }

    /// Forget expired missing routes, then the oldest ones over the cap
    fn prune_missing(&self, pages: &mut HashMap<String, PageState>, now: SystemTime) {
        pages.retain(|_, state| match state {
            PageState::Missing { checked_at } => self.is_fresh(*checked_at, now),
            _ => true,
        });

        let mut missing: Vec<(SystemTime, String)> = pages
            .iter()
            .filter_map(|(route, state)| match state {
                PageState::Missing { checked_at } => Some((*checked_at, route.clone())),
                _ => None,
            })
            .collect();
        if missing.len() <= MAX_MISSING {
            return;
        }

        missing.sort();
        let excess = missing.len() - MAX_MISSING;
        for (_, route) in missing.into_iter().take(excess) {
            pages.remove(&route);
        }
    }

    fn is_fresh(&self, since: SystemTime, now: SystemTime) -> bool {
        now.duration_since(since).unwrap_or_default() < self.interval
    }
}
