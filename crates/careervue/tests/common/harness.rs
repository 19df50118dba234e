//! Test harness for running ingestion cycles without a server.
//!
//! The mailbox and classifier are scripted through shared handles, so a test
//! can change what the "server" holds between cycles while the pipeline keeps
//! owning its boxed clients.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::watch;

use careervue::classifier::ClassifierError;
use careervue::mailbox::MessageUid;
use careervue::{
    ClassificationVerdict, Classifier, CycleError, CycleReport, Database, IngestionLedger,
    IngestionPipeline, MailboxClient, MailboxError, MemoryCheckpoint, PipelineSettings,
};

#[derive(Default)]
pub struct MailboxState {
    pub messages: BTreeMap<MessageUid, Vec<u8>>,
    pub connect_failures: u32,
    pub broken_fetches: HashSet<MessageUid>,
    pub connects: u32,
    pub disconnects: u32,
    pub searches: Vec<NaiveDate>,
}

/// Mailbox whose contents are set by the test.
pub struct ScriptedMailbox {
    state: Arc<Mutex<MailboxState>>,
    connected: bool,
}

#[async_trait]
impl MailboxClient for ScriptedMailbox {
    async fn connect(&mut self) -> Result<(), MailboxError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(MailboxError::ConnectionFailed("connection refused".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    async fn list_since(&mut self, since: NaiveDate) -> Result<Vec<MessageUid>, MailboxError> {
        let mut state = self.state.lock().unwrap();
        state.searches.push(since);
        Ok(state.messages.keys().copied().collect())
    }

    async fn fetch(&mut self, uid: MessageUid) -> Result<Vec<u8>, MailboxError> {
        let state = self.state.lock().unwrap();
        if state.broken_fetches.contains(&uid) {
            return Err(MailboxError::Protocol("fetch returned no body".to_string()));
        }
        state
            .messages
            .get(&uid)
            .cloned()
            .ok_or(MailboxError::MessageNotFound(uid))
    }

    async fn disconnect(&mut self) {
        self.state.lock().unwrap().disconnects += 1;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[derive(Default)]
pub struct ClassifierState {
    pub verdicts: HashMap<String, Result<ClassificationVerdict, String>>,
    /// Subjects in the order they were classified.
    pub calls: Vec<String>,
    /// Raised after the named subject is classified.
    pub stop_after: Option<(String, watch::Sender<bool>)>,
}

/// Classifier that answers by subject. Unknown subjects are not job related.
pub struct ScriptedClassifier {
    state: Arc<Mutex<ClassifierState>>,
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        subject: &str,
        _body: &str,
    ) -> Result<ClassificationVerdict, ClassifierError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(subject.to_string());
        if let Some((trigger, stop)) = &state.stop_after {
            if trigger == subject {
                let _ = stop.send(true);
            }
        }
        match state.verdicts.get(subject) {
            Some(Ok(verdict)) => Ok(verdict.clone()),
            Some(Err(reason)) => Err(ClassifierError::Request(reason.clone())),
            None => Ok(ClassificationVerdict::NotJobRelated),
        }
    }
}

/// A pipeline over scripted collaborators and an in-memory database.
pub struct TestHarness {
    pub mailbox: Arc<Mutex<MailboxState>>,
    pub classifier: Arc<Mutex<ClassifierState>>,
    pub ledger: IngestionLedger,
    pub checkpoint: Arc<MemoryCheckpoint>,
    pub db: Database,
    pipeline: Option<IngestionPipeline>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_database(Database::open_in_memory().expect("in-memory database"))
    }

    pub fn with_database(db: Database) -> Self {
        let mailbox = Arc::new(Mutex::new(MailboxState::default()));
        let classifier = Arc::new(Mutex::new(ClassifierState::default()));
        let ledger = IngestionLedger::new(db.clone());
        let checkpoint = Arc::new(MemoryCheckpoint::default());

        let pipeline = IngestionPipeline::new(
            Box::new(ScriptedMailbox {
                state: mailbox.clone(),
                connected: false,
            }),
            Arc::new(ScriptedClassifier {
                state: classifier.clone(),
            }),
            ledger.clone(),
            checkpoint.clone(),
            PipelineSettings {
                connect_attempts: 3,
                backoff_base: Duration::from_millis(1),
                ..Default::default()
            },
        );

        Self {
            mailbox,
            classifier,
            ledger,
            checkpoint,
            db,
            pipeline: Some(pipeline),
        }
    }

    pub fn add_message(&self, uid: MessageUid, raw: Vec<u8>) {
        self.mailbox.lock().unwrap().messages.insert(uid, raw);
    }

    pub fn answer(&self, subject: &str, verdict: ClassificationVerdict) {
        self.classifier
            .lock()
            .unwrap()
            .verdicts
            .insert(subject.to_string(), Ok(verdict));
    }

    pub fn fail_classification(&self, subject: &str, reason: &str) {
        self.classifier
            .lock()
            .unwrap()
            .verdicts
            .insert(subject.to_string(), Err(reason.to_string()));
    }

    pub fn refuse_connects(&self, times: u32) {
        self.mailbox.lock().unwrap().connect_failures = times;
    }

    pub fn break_fetch(&self, uid: MessageUid) {
        self.mailbox.lock().unwrap().broken_fetches.insert(uid);
    }

    pub fn classify_calls(&self) -> usize {
        self.classifier.lock().unwrap().calls.len()
    }

    /// Returns a stop signal that is raised once `subject` is classified.
    pub fn stop_after(&self, subject: &str) -> watch::Receiver<bool> {
        let (stop_tx, stop_rx) = watch::channel(false);
        self.classifier.lock().unwrap().stop_after = Some((subject.to_string(), stop_tx));
        stop_rx
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.pipeline
            .as_mut()
            .expect("pipeline was taken by a poller")
            .run_once()
            .await
    }

    pub async fn run_cycle_until(
        &mut self,
        stop: &watch::Receiver<bool>,
    ) -> Result<CycleReport, CycleError> {
        self.pipeline
            .as_mut()
            .expect("pipeline was taken by a poller")
            .run_cycle(stop)
            .await
    }

    /// Hands the pipeline to a poller. Scripted handles keep working.
    pub fn take_pipeline(&mut self) -> IngestionPipeline {
        self.pipeline.take().expect("pipeline already taken")
    }
}
