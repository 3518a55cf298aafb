#![allow(dead_code)]

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use provkit::cert::Certificate;
use provkit::chain::ChainOrchestrator;
use provkit::pkcs12::observer::{ArchiveEntry, ArchiveObserver};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Root first, deepest CA (with key) last.
pub fn generate_chain(intermediates: u8) -> Vec<Certificate> {
    let mut orchestrator = ChainOrchestrator::default();
    let generated = orchestrator
        .generate("TestRoot", "pw1", intermediates)
        .expect("chain generation failed");
    let mut chain = generated.public_chain;
    chain.push(generated.issuing_ca);
    chain
}

pub fn ski(certificate: &Certificate) -> Vec<u8> {
    certificate
        .subject_key_identifier()
        .unwrap()
        .expect("certificate has no SKI")
        .key_identifier
}

pub fn aki(certificate: &Certificate) -> Option<Vec<u8>> {
    certificate
        .authority_key_identifier()
        .unwrap()
        .map(|aki| aki.key_identifier)
}

pub fn subjects(certificates: &[Certificate]) -> Vec<String> {
    certificates.iter().map(Certificate::subject_name).collect()
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Entry(ArchiveEntry),
    Primary(String),
    NoPrivateKey,
}

/// Collects loader callbacks for assertions.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    pub events: Rc<RefCell<Vec<Event>>>,
}

impl ArchiveObserver for RecordingObserver {
    fn entry_found(&self, entry: &ArchiveEntry) {
        self.events.borrow_mut().push(Event::Entry(entry.clone()));
    }

    fn primary_selected(&self, certificate: &Certificate) {
        self.events
            .borrow_mut()
            .push(Event::Primary(certificate.subject_name()));
    }

    fn no_private_key(&self) {
        self.events.borrow_mut().push(Event::NoPrivateKey);
    }
}
