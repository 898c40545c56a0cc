//! Outbound notices to guardians
//!
//! Delivery is best-effort. The [`Dispatcher`] retries each notice on its own a
//! bounded number of times and reports failures through logs and a
//! [`DispatchReport`]; it never returns an error, so a failed delivery cannot undo
//! the state change that produced the notice.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::domain::GuardianId;
use crate::model::EventSummary;

/// A message for one guardian
#[derive(Clone, PartialEq, Eq)]
pub enum Notice {
    /// Hand a guardian its key share (hex)
    KeyShare {
        guardian: GuardianId,
        contact: String,
        share: String,
        author: String,
    },
    /// Tell a guardian an exam was scheduled
    Schedule {
        guardian: GuardianId,
        contact: String,
        summary: EventSummary,
    },
}

impl Notice {
    #[must_use]
    pub fn guardian(&self) -> &GuardianId {
        match self {
            Notice::KeyShare { guardian, .. } | Notice::Schedule { guardian, .. } => guardian,
        }
    }

    #[must_use]
    pub fn contact(&self) -> &str {
        match self {
            Notice::KeyShare { contact, .. } | Notice::Schedule { contact, .. } => contact,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Notice::KeyShare { .. } => "key-share",
            Notice::Schedule { .. } => "schedule",
        }
    }

    /// Plain-text body as delivered
    #[must_use]
    pub fn body(&self) -> String {
        match self {
            Notice::KeyShare { share, author, .. } => format!(
                "You have been entrusted with a key share for questions set by {author}.\n\
                 Keep it private and submit it when the exam is scheduled.\n\n{share}\n"
            ),
            Notice::Schedule { summary, .. } => format!(
                "An exam has been scheduled on {} from {} to {}.\n\
                 Please submit your key share before the start time.\n",
                summary.date, summary.start_time, summary.end_time
            ),
        }
    }
}

impl fmt::Debug for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notice")
            .field("kind", &self.kind())
            .field("guardian", self.guardian())
            .field("contact", &self.contact())
            .finish_non_exhaustive()
    }
}

/// Transport for notices
pub trait Notifier: Send + Sync {
    /// # Errors
    /// Returns an error if the notice could not be delivered
    fn deliver(&self, notice: &Notice) -> anyhow::Result<()>;
}

/// Outcome of a batch of deliveries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    /// Guardians whose notice could not be delivered after every attempt
    pub failed: Vec<GuardianId>,
}

/// Best-effort delivery with per-notice retry
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    attempts: u32,
}

impl Dispatcher {
    /// Default number of attempts per notice
    pub const DEFAULT_ATTEMPTS: u32 = 3;

    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_attempts(notifier, Self::DEFAULT_ATTEMPTS)
    }

    /// `attempts` below 1 is treated as 1
    pub fn with_attempts(notifier: Arc<dyn Notifier>, attempts: u32) -> Self {
        Self {
            notifier,
            attempts: attempts.max(1),
        }
    }

    /// Tries to deliver one notice; returns whether it got through
    pub fn send(&self, notice: &Notice) -> bool {
        for attempt in 1..=self.attempts {
            match self.notifier.deliver(notice) {
                Ok(()) => {
                    info!(kind = notice.kind(), guardian = %notice.guardian(), "notice delivered");
                    return true;
                }
                Err(e) => warn!(
                    kind = notice.kind(),
                    guardian = %notice.guardian(),
                    attempt,
                    error = %e,
                    "notice delivery failed"
                ),
            }
        }
        false
    }

    /// Sends every notice independently of the others
    pub fn send_all(&self, notices: &[Notice]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for notice in notices {
            if self.send(notice) {
                report.delivered += 1;
            } else {
                report.failed.push(notice.guardian().clone());
            }
        }
        report
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

/// Keeps delivered notices in memory
///
/// Contacts registered with [`MemoryOutbox::fail_for`] always fail.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<Notice>>,
    unreachable: Mutex<HashSet<String>>,
}

impl MemoryOutbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every delivery to `contact` fail
    pub fn fail_for(&self, contact: impl Into<String>) {
        self.unreachable.lock().insert(contact.into());
    }

    #[must_use]
    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().clone()
    }
}

impl Notifier for MemoryOutbox {
    fn deliver(&self, notice: &Notice) -> anyhow::Result<()> {
        if self.unreachable.lock().contains(notice.contact()) {
            bail!("{} is unreachable", notice.contact());
        }
        self.sent.lock().push(notice.clone());
        Ok(())
    }
}

/// Writes each notice as a text file in a directory
///
/// File names are `<guardian>-<kind>-<timestamp>.txt`.
#[derive(Debug, Clone)]
pub struct DirOutbox {
    dir: PathBuf,
}

impl DirOutbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Notifier for DirOutbox {
    fn deliver(&self, notice: &Notice) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create outbox {}", self.dir.display()))?;
        let name = format!(
            "{}-{}-{}.txt",
            notice.guardian(),
            notice.kind(),
            Utc::now().format("%Y%m%dT%H%M%S%.6f")
        );
        let path = self.dir.join(name);
        let body = format!("To: {}\n\n{}", notice.contact(), notice.body());
        fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn share_notice(contact: &str) -> Notice {
        Notice::KeyShare {
            guardian: GuardianId::new(contact).unwrap(),
            contact: contact.to_string(),
            share: "01deadbeef".into(),
            author: "setter".into(),
        }
    }

    struct Flaky {
        calls: AtomicU32,
        succeed_on: u32,
    }

    impl Notifier for Flaky {
        fn deliver(&self, _notice: &Notice) -> anyhow::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < self.succeed_on {
                bail!("transient failure");
            }
            Ok(())
        }
    }

    #[test]
    fn retries_until_delivered() {
        let flaky = Arc::new(Flaky {
            calls: AtomicU32::new(0),
            succeed_on: 3,
        });
        let dispatcher = Dispatcher::with_attempts(flaky.clone(), 3);

        assert!(dispatcher.send(&share_notice("a")));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn one_failure_does_not_stop_the_batch() {
        let outbox = Arc::new(MemoryOutbox::new());
        outbox.fail_for("b");
        let dispatcher = Dispatcher::new(outbox.clone());

        let report = dispatcher.send_all(&[share_notice("a"), share_notice("b"), share_notice("c")]);

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, vec![GuardianId::new("b").unwrap()]);
        assert_eq!(outbox.sent().len(), 2);
    }

    #[test]
    fn debug_output_omits_share() {
        let rendered = format!("{:?}", share_notice("a"));
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("key-share"));
    }

    #[test]
    fn dir_outbox_writes_one_file_per_notice() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = DirOutbox::new(dir.path().join("outbox"));
        outbox.deliver(&share_notice("a")).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path().join("outbox"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        let body = fs::read_to_string(&entries[0]).unwrap();
        assert!(body.contains("01deadbeef"));
    }
}
