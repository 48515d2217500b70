use crate::ip::NormalizedIp;
use crate::lookup::{LookupClient, LookupError};
use crate::record::IpDetails;

use hyper::client::connect::Connect;
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Outcome of one background lookup, tagged with the address it was for
/// and the generation it belongs to. A report whose generation is no
/// longer current must be discarded by the consumer.
#[derive(Debug)]
pub struct LookupReport {
    pub ip: NormalizedIp,
    pub generation: u64,
    pub outcome: Result<IpDetails, LookupError>,
}

/// One-shot lookup runner with a cancel-and-replace policy.
///
/// At most one lookup is in flight: starting a new one aborts the previous
/// task and bumps the generation counter, so a late report from a
/// superseded task can never be mistaken for the current one. Each started
/// lookup delivers at most one [`LookupReport`] on the channel returned by
/// [`LookupWorker::new`]; failures are reported, never panicked across the
/// task boundary.
pub struct LookupWorker {
    sender: mpsc::UnboundedSender<LookupReport>,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl LookupWorker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LookupReport>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender,
                generation: 0,
                handle: None,
            },
            receiver,
        )
    }

    /// Starts a lookup for `ip`, cancelling any lookup still in flight.
    /// Returns the generation the eventual report will carry.
    pub fn start<C>(&mut self, client: &LookupClient<C>, ip: NormalizedIp) -> u64
    where
        C: Connect + Clone + Send + Sync + 'static,
    {
        let client = client.clone();
        self.start_with(ip, async move { client.lookup(ip).await })
    }

    fn start_with<F>(&mut self, ip: NormalizedIp, lookup: F) -> u64
    where
        F: Future<Output = Result<IpDetails, LookupError>> + Send + 'static,
    {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation += 1;
        let generation = self.generation;
        let sender = self.sender.clone();
        self.handle = Some(tokio::spawn(async move {
            let outcome = lookup.await;
            // The receiver may already be gone on shutdown; dropping the
            // report is safe then.
            let _ = sender.send(LookupReport {
                ip,
                generation,
                outcome,
            });
        }));
        generation
    }

    pub fn is_current(&self, report: &LookupReport) -> bool {
        report.generation == self.generation
    }

    pub fn pending(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Best-effort cancellation for shutdown. The in-flight request is
    /// aborted if still running; any report it already sent goes stale.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation += 1;
    }
}
