use crate::ip::NormalizedIp;
use crate::lookup::{LookupClient, LookupError};
use crate::record::BookmarkRecord;
use crate::store::{BookmarkStore, StoreError};
use crate::worker::{LookupReport, LookupWorker};

use chrono::{DateTime, Utc};
use hyper::client::connect::Connect;
use hyper::client::HttpConnector;
use hyper_tls::HttpsConnector;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("no lookup result to bookmark yet")]
    NothingToBookmark,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What applying a lookup report did, for the front end to present.
#[derive(Debug)]
pub enum LookupUpdate {
    /// A fresh lookup finished and is now the displayed record.
    Fresh { record: BookmarkRecord },
    /// A bookmark edit re-fetch finished and replaced its entry.
    Refreshed {
        old_ip: NormalizedIp,
        record: BookmarkRecord,
    },
    Failed {
        ip: NormalizedIp,
        error: LookupError,
    },
    /// The re-fetch succeeded but the bookmark list changed underneath it.
    StoreFailed { error: StoreError },
    /// Result of a superseded lookup; the displayed state was not touched.
    Stale { ip: NormalizedIp },
}

enum PendingAction {
    Lookup,
    RefreshBookmark {
        old_ip: NormalizedIp,
        added_at: Option<DateTime<Utc>>,
    },
}

struct Pending {
    generation: u64,
    action: PendingAction,
}

/// Controller tying the bookmark store to the background worker.
///
/// Owns the store (no hidden singleton), the lookup client, and the record
/// currently on display. Worker reports are applied through
/// [`App::apply_report`], which drops anything from a superseded lookup.
pub struct App<C = HttpsConnector<HttpConnector>> {
    store: BookmarkStore,
    client: LookupClient<C>,
    worker: LookupWorker,
    pending: Option<Pending>,
    current: Option<BookmarkRecord>,
}

impl<C> App<C> {
    pub fn new(
        store: BookmarkStore,
        client: LookupClient<C>,
    ) -> (Self, UnboundedReceiver<LookupReport>) {
        let (worker, reports) = LookupWorker::new();
        (
            Self {
                store,
                client,
                worker,
                pending: None,
                current: None,
            },
            reports,
        )
    }

    pub fn store(&self) -> &BookmarkStore {
        &self.store
    }

    pub fn current(&self) -> Option<&BookmarkRecord> {
        self.current.as_ref()
    }

    /// Bookmarks the currently displayed record, stamping its creation
    /// time.
    pub fn bookmark_current(&mut self) -> Result<BookmarkRecord, AppError> {
        let mut record = self.current.clone().ok_or(AppError::NothingToBookmark)?;
        record.added_at = Some(Utc::now());
        self.store.add(record.clone())?;
        Ok(record)
    }

    /// Displays a bookmarked record without any network traffic.
    pub fn show(&mut self, ip: NormalizedIp) -> Option<&BookmarkRecord> {
        let record = self.store.find(ip)?.clone();
        self.current = Some(record);
        self.current.as_ref()
    }

    pub fn remove(&mut self, ip: NormalizedIp) -> Result<BookmarkRecord, StoreError> {
        self.store.remove(ip)
    }

    /// Applies a worker report. Reports from superseded lookups are
    /// dropped by generation, so a slow result can never overwrite state
    /// the user has since navigated away from.
    pub fn apply_report(&mut self, report: LookupReport) -> LookupUpdate {
        let pending = match self.pending.take() {
            Some(pending) if pending.generation == report.generation => pending,
            other => {
                self.pending = other;
                return LookupUpdate::Stale { ip: report.ip };
            }
        };

        let details = match report.outcome {
            Ok(details) => details,
            Err(error) => {
                return LookupUpdate::Failed {
                    ip: report.ip,
                    error,
                }
            }
        };

        match pending.action {
            PendingAction::Lookup => {
                let record = BookmarkRecord {
                    ip: report.ip,
                    added_at: None,
                    details,
                };
                self.current = Some(record.clone());
                LookupUpdate::Fresh { record }
            }
            PendingAction::RefreshBookmark { old_ip, added_at } => {
                let record = BookmarkRecord {
                    ip: report.ip,
                    added_at,
                    details,
                };
                match self.store.update(old_ip, record.clone()) {
                    Ok(()) => {
                        self.current = Some(record.clone());
                        LookupUpdate::Refreshed { old_ip, record }
                    }
                    Err(error) => LookupUpdate::StoreFailed { error },
                }
            }
        }
    }
}

impl<C> App<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    /// Starts a fresh lookup, cancelling and replacing any lookup still in
    /// flight.
    pub fn lookup(&mut self, ip: NormalizedIp) {
        let generation = self.worker.start(&self.client, ip);
        self.pending = Some(Pending {
            generation,
            action: PendingAction::Lookup,
        });
    }

    /// Re-fetches `new_ip` and, once the lookup lands, replaces the
    /// bookmark held under `old_ip` in place. Collisions are rejected up
    /// front so no network call is made for an edit that cannot commit.
    pub fn refresh_bookmark(
        &mut self,
        old_ip: NormalizedIp,
        new_ip: NormalizedIp,
    ) -> Result<(), AppError> {
        let added_at = self
            .store
            .find(old_ip)
            .ok_or(StoreError::NotFound(old_ip))?
            .added_at;
        if new_ip != old_ip && self.store.find(new_ip).is_some() {
            return Err(StoreError::DuplicateIp(new_ip).into());
        }
        let generation = self.worker.start(&self.client, new_ip);
        self.pending = Some(Pending {
            generation,
            action: PendingAction::RefreshBookmark { old_ip, added_at },
        });
        Ok(())
    }
}
