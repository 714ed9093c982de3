//! End-to-end tests for the monitoring cycle.
//!
//! These tests drive the real pipeline against an in-memory mail store and
//! a spooler that records what it was asked to print, so no server, no
//! converter and no printer are needed.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mailprint_core::session::ensure_connected;
use mailprint_core::{
    Error, FETCH_QUEUE_CAPACITY, MailStore, MessageEnvelope, Monitor, Result, Settings, Spooler,
    fetcher, locator,
};
use mailprint_imap::{Flag, SeqNum, SequenceSet, SessionState};
use tokio::sync::mpsc;

/// One stored message.
#[derive(Debug, Clone)]
struct Stored {
    raw: Vec<u8>,
    seen: bool,
}

/// In-memory mail store keeping a log of every call.
#[derive(Debug)]
struct MockStore {
    state: SessionState,
    folders: HashMap<String, Vec<Stored>>,
    calls: Vec<String>,
    fail_move: bool,
    fail_flag: bool,
}

impl MockStore {
    fn new() -> Self {
        let mut folders = HashMap::new();
        folders.insert("INBOX".to_string(), Vec::new());
        folders.insert("Printed".to_string(), Vec::new());
        Self {
            state: SessionState::Authenticated,
            folders,
            calls: Vec::new(),
            fail_move: false,
            fail_flag: false,
        }
    }

    fn deliver(&mut self, folder: &str, raw: &[u8]) {
        self.folders.get_mut(folder).unwrap().push(Stored {
            raw: raw.to_vec(),
            seen: false,
        });
    }

    fn folder(&self, name: &str) -> &[Stored] {
        &self.folders[name]
    }

    fn calls_starting_with(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn open(&mut self) -> mailprint_imap::Result<&mut Vec<Stored>> {
        let SessionState::Selected(name) = &self.state else {
            return Err(mailprint_imap::Error::InvalidState("no mailbox selected".into()));
        };
        let name = name.clone();
        Ok(self.folders.get_mut(&name).unwrap())
    }

    fn open_folder(&mut self, verb: &str, mailbox: &str) -> mailprint_imap::Result<u32> {
        self.calls.push(format!("{verb} {mailbox}"));
        let count = self
            .folders
            .get(mailbox)
            .map(Vec::len)
            .ok_or_else(|| mailprint_imap::Error::InvalidState(format!("no folder {mailbox}")))?;
        self.state = SessionState::Selected(mailbox.to_string());
        Ok(u32::try_from(count).unwrap())
    }
}

impl MailStore for MockStore {
    fn state(&self) -> SessionState {
        self.state.clone()
    }

    async fn reconnect(&mut self) -> mailprint_imap::Result<()> {
        self.calls.push("reconnect".into());
        self.state = SessionState::Authenticated;
        Ok(())
    }

    async fn examine(&mut self, mailbox: &str) -> mailprint_imap::Result<u32> {
        self.open_folder("examine", mailbox)
    }

    async fn select(&mut self, mailbox: &str) -> mailprint_imap::Result<u32> {
        self.open_folder("select", mailbox)
    }

    async fn search_unseen(&mut self) -> mailprint_imap::Result<Vec<SeqNum>> {
        self.calls.push("search".into());
        let folder = self.open()?;
        Ok(folder
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.seen)
            .filter_map(|(i, _)| SeqNum::new(u32::try_from(i + 1).unwrap()))
            .collect())
    }

    async fn fetch_bodies(
        &mut self,
        set: &SequenceSet,
        queue: &mpsc::Sender<MessageEnvelope>,
    ) -> mailprint_imap::Result<usize> {
        self.calls.push(format!("fetch {set}"));
        let envelopes: Vec<MessageEnvelope> = {
            let folder = self.open()?;
            set.iter()
                .map(|seq| {
                    let raw = &folder[seq.get() as usize - 1].raw;
                    MessageEnvelope {
                        seq,
                        literals: if raw.is_empty() { Vec::new() } else { vec![raw.clone()] },
                    }
                })
                .collect()
        };

        let mut delivered = 0;
        for envelope in envelopes {
            if queue.send(envelope).await.is_ok() {
                delivered += 1;
            }
        }
        Ok(delivered)
    }

    async fn move_messages(&mut self, set: &SequenceSet, mailbox: &str) -> mailprint_imap::Result<()> {
        self.calls.push(format!("move {set} {mailbox}"));
        if self.fail_move {
            return Err(mailprint_imap::Error::InvalidState("MOVE refused".into()));
        }

        let moved: Vec<Stored> = {
            let folder = self.open()?;
            let positions: Vec<usize> = set.iter().map(|s| s.get() as usize - 1).collect();
            let moved = positions.iter().map(|&i| folder[i].clone()).collect();
            for &i in positions.iter().rev() {
                folder.remove(i);
            }
            moved
        };
        self.folders.get_mut(mailbox).unwrap().extend(moved);
        Ok(())
    }

    async fn add_flags(&mut self, set: &SequenceSet, flags: &[Flag]) -> mailprint_imap::Result<()> {
        self.calls.push(format!("store {set} {}", Flag::list(flags)));
        if self.fail_flag {
            return Err(mailprint_imap::Error::InvalidState("STORE refused".into()));
        }

        let folder = self.open()?;
        for seq in set.iter() {
            folder[seq.get() as usize - 1].seen = true;
        }
        Ok(())
    }

    async fn logout(&mut self) -> mailprint_imap::Result<()> {
        self.calls.push("logout".into());
        self.state = SessionState::Disconnected;
        Ok(())
    }
}

/// A printed file and what it contained when the printer saw it.
#[derive(Debug, Clone)]
struct PrintJob {
    path: PathBuf,
    content: Vec<u8>,
}

/// Spooler that renders by copying and records print jobs.
#[derive(Clone, Default)]
struct RecordingSpooler {
    jobs: Arc<Mutex<Vec<PrintJob>>>,
}

impl RecordingSpooler {
    fn jobs(&self) -> Vec<PrintJob> {
        self.jobs.lock().unwrap().clone()
    }
}

impl Spooler for RecordingSpooler {
    async fn render_pdf(&self, html: &Path, pdf: &Path) -> Result<()> {
        tokio::fs::copy(html, pdf).await.unwrap();
        Ok(())
    }

    async fn print(&self, path: &Path) -> Result<()> {
        let content = tokio::fs::read(path).await.unwrap();
        self.jobs.lock().unwrap().push(PrintJob {
            path: path.to_path_buf(),
            content,
        });
        Ok(())
    }
}

fn settings(spool: &Path) -> Settings {
    let text = format!(
        r#"
IMAPUri: "imaps://imap.example.com"
Username: "printer@example.com"
Password: "secret"
SourceFolder: "INBOX"
DestinationFolder: "Printed"
SpoolDir: {:?}
"#,
        spool.display().to_string()
    );
    Settings::parse(&text, Path::new("settings.yaml")).unwrap()
}

fn spool_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

const PLAIN: &[u8] = b"Subject: Test\r\nFrom: a@x.com\r\nContent-Type: text/plain\r\n\r\nhello";
const HTML: &[u8] = b"Subject: Hi\r\nFrom: b@y.com\r\nContent-Type: text/html\r\n\r\n<p>hi</p>";

#[tokio::test]
async fn test_disconnected_store_reconnects_exactly_once() {
    let spool = tempfile::tempdir().unwrap();
    let mut store = MockStore::new();
    store.state = SessionState::Disconnected;
    store.deliver("INBOX", PLAIN);

    let mut monitor = Monitor::new(&settings(spool.path()), RecordingSpooler::default());
    let (store, report) = monitor.run_cycle(store).await.unwrap();

    assert_eq!(store.calls.first().map(String::as_str), Some("reconnect"));
    assert_eq!(store.calls_starting_with("reconnect"), 1);
    assert_eq!(report.found, 1);
    assert_eq!(report.moved, 1);
}

#[tokio::test]
async fn test_connected_store_is_not_reconnected() {
    let mut store = MockStore::new();
    store.state = SessionState::Connected;
    ensure_connected(&mut store).await.unwrap();

    store.state = SessionState::Selected("INBOX".into());
    ensure_connected(&mut store).await.unwrap();

    assert_eq!(store.calls_starting_with("reconnect"), 0);
}

#[tokio::test]
async fn test_no_unread_messages_is_a_noop() {
    let spool = tempfile::tempdir().unwrap();
    let store = MockStore::new();
    let spooler = RecordingSpooler::default();

    let mut monitor = Monitor::new(&settings(spool.path()), spooler.clone());
    let (store, report) = monitor.run_cycle(store).await.unwrap();

    assert_eq!(store.calls, vec!["examine INBOX", "search"]);
    assert_eq!(report.found, 0);
    assert!(spooler.jobs().is_empty());
}

#[tokio::test]
async fn test_plain_text_message_is_printed_with_header() {
    let spool = tempfile::tempdir().unwrap();
    let mut store = MockStore::new();
    store.deliver("INBOX", PLAIN);
    let spooler = RecordingSpooler::default();

    let mut monitor = Monitor::new(&settings(spool.path()), spooler.clone());
    let (store, report) = monitor.run_cycle(store).await.unwrap();

    let jobs = spooler.jobs();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].path.to_string_lossy().ends_with(".txt"));

    let content = String::from_utf8(jobs[0].content.clone()).unwrap();
    assert!(content.starts_with("From:\t\ta@x.com\n"));
    assert!(content.ends_with("hello"));

    assert_eq!(report.artifacts, 1);
    assert!(spool_is_empty(spool.path()));
    assert!(store.folder("INBOX").is_empty());
    assert_eq!(store.folder("Printed").len(), 1);
    assert!(store.folder("Printed")[0].seen);
}

#[tokio::test]
async fn test_html_message_is_converted_printed_and_removed() {
    let spool = tempfile::tempdir().unwrap();
    let mut store = MockStore::new();
    store.deliver("INBOX", HTML);
    let spooler = RecordingSpooler::default();

    let mut monitor = Monitor::new(&settings(spool.path()), spooler.clone());
    let (_store, report) = monitor.run_cycle(store).await.unwrap();

    let jobs = spooler.jobs();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].path.to_string_lossy().ends_with(".pdf"));
    assert!(String::from_utf8_lossy(&jobs[0].content).ends_with("<p>hi</p>"));
    assert_eq!(report.dispatch.printed, 1);
    assert!(spool_is_empty(spool.path()));
}

#[tokio::test]
async fn test_alternative_message_prints_html_only() {
    let spool = tempfile::tempdir().unwrap();
    let mut store = MockStore::new();
    store.deliver(
        "INBOX",
        b"From: a@x.com\r\n\
Content-Type: multipart/alternative; boundary=\"alt\"\r\n\
\r\n\
--alt\r\n\
Content-Type: text/plain\r\n\
\r\n\
hi\r\n\
--alt\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>hi</p>\r\n\
--alt--\r\n",
    );
    let spooler = RecordingSpooler::default();

    let mut monitor = Monitor::new(&settings(spool.path()), spooler.clone());
    let (_store, report) = monitor.run_cycle(store).await.unwrap();

    let jobs = spooler.jobs();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].path.to_string_lossy().ends_with(".pdf"));
    assert_eq!(report.dispatch.skipped, 1);
    assert!(spool_is_empty(spool.path()));
}

#[tokio::test]
async fn test_empty_html_alternative_prints_text() {
    let spool = tempfile::tempdir().unwrap();
    let mut store = MockStore::new();
    store.deliver(
        "INBOX",
        b"From: a@x.com\r\n\
Content-Type: multipart/alternative; boundary=\"alt\"\r\n\
\r\n\
--alt\r\n\
Content-Type: text/plain\r\n\
\r\n\
real content\r\n\
--alt\r\n\
Content-Type: text/html\r\n\
\r\n\
\r\n\
--alt--\r\n",
    );
    let spooler = RecordingSpooler::default();

    let mut monitor = Monitor::new(&settings(spool.path()), spooler.clone());
    let (store, report) = monitor.run_cycle(store).await.unwrap();

    let jobs = spooler.jobs();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].path.to_string_lossy().ends_with(".txt"));
    assert!(String::from_utf8_lossy(&jobs[0].content).ends_with("real content"));
    assert_eq!(report.artifacts, 1);
    assert_eq!(report.dispatch.skipped, 0);
    assert!(spool_is_empty(spool.path()));
    assert_eq!(store.folder("Printed").len(), 1);
}

#[tokio::test]
async fn test_only_extracted_messages_are_moved() {
    let spool = tempfile::tempdir().unwrap();
    let mut store = MockStore::new();
    store.deliver("INBOX", PLAIN);
    store.deliver("INBOX", b"");
    store.deliver("INBOX", HTML);

    let mut monitor = Monitor::new(&settings(spool.path()), RecordingSpooler::default());
    let (store, report) = monitor.run_cycle(store).await.unwrap();

    assert_eq!(report.found, 3);
    assert_eq!(report.fetched, 3);
    assert_eq!(report.extracted, 2);
    assert!(store.calls.contains(&"move 1,3 Printed".to_string()));
    assert_eq!(store.folder("INBOX").len(), 1);
    assert_eq!(store.folder("Printed").len(), 2);
}

#[tokio::test]
async fn test_flag_failure_leaves_moved_messages_unseen() {
    // Moving and flagging are separate steps; a failed flag is not rolled
    // back, so the message sits unseen in the destination until next time.
    let spool = tempfile::tempdir().unwrap();
    let mut store = MockStore::new();
    store.deliver("INBOX", PLAIN);
    store.fail_flag = true;

    let mut monitor = Monitor::new(&settings(spool.path()), RecordingSpooler::default());
    let (store, report) = monitor.run_cycle(store).await.unwrap();

    assert_eq!(report.moved, 1);
    assert_eq!(report.marked_seen, 0);
    assert_eq!(store.folder("Printed").len(), 1);
    assert!(!store.folder("Printed")[0].seen);
}

#[tokio::test]
async fn test_move_failure_still_flags_destination() {
    let spool = tempfile::tempdir().unwrap();
    let mut store = MockStore::new();
    store.deliver("INBOX", PLAIN);
    store.deliver("Printed", PLAIN);
    store.fail_move = true;

    let mut monitor = Monitor::new(&settings(spool.path()), RecordingSpooler::default());
    let (store, report) = monitor.run_cycle(store).await.unwrap();

    assert_eq!(report.moved, 0);
    assert_eq!(report.marked_seen, 1);
    assert_eq!(store.folder("INBOX").len(), 1);
    assert!(store.folder("Printed")[0].seen);
}

#[tokio::test]
async fn test_unwritable_spool_ends_cycle() {
    let spool = tempfile::tempdir().unwrap();
    let mut store = MockStore::new();
    store.deliver("INBOX", PLAIN);

    let mut monitor = Monitor::new(
        &settings(&spool.path().join("missing")),
        RecordingSpooler::default(),
    );
    let err = monitor.run_cycle(store).await.unwrap_err();
    assert!(matches!(err, Error::Extract { .. }));
}

#[tokio::test]
async fn test_missing_folder_finds_nothing() {
    let mut store = MockStore::new();
    let ids = locator::find_unread(&mut store, "Nope").await;
    assert!(ids.is_empty());
    assert_eq!(store.calls, vec!["examine Nope"]);
}

#[tokio::test]
async fn test_fetch_delivers_through_bounded_queue() {
    let mut store = MockStore::new();
    let count = FETCH_QUEUE_CAPACITY * 3;
    for _ in 0..count {
        store.deliver("INBOX", PLAIN);
    }
    store.examine("INBOX").await.unwrap();

    let set: SequenceSet = store.search_unseen().await.unwrap().into_iter().collect();
    let mut handle = fetcher::spawn(store, set);

    let mut seqs = Vec::new();
    while let Some(envelope) = handle.next().await {
        seqs.push(envelope.seq.get());
    }
    let (store, outcome) = handle.finish().await.unwrap();

    assert_eq!(seqs, (1..=u32::try_from(count).unwrap()).collect::<Vec<_>>());
    assert_eq!(outcome.unwrap(), count);
    assert_eq!(store.calls_starting_with("fetch"), 1);
}

#[tokio::test]
async fn test_fetch_returns_store_when_consumer_stops_early() {
    let mut store = MockStore::new();
    for _ in 0..FETCH_QUEUE_CAPACITY * 2 {
        store.deliver("INBOX", PLAIN);
    }
    store.examine("INBOX").await.unwrap();

    let set: SequenceSet = store.search_unseen().await.unwrap().into_iter().collect();
    let mut handle = fetcher::spawn(store, set);
    assert!(handle.next().await.is_some());

    let (store, outcome) = handle.finish().await.unwrap();
    assert!(outcome.unwrap() < FETCH_QUEUE_CAPACITY * 2);
    assert_eq!(store.state(), SessionState::Selected("INBOX".into()));
}
