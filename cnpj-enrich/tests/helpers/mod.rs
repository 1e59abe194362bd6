//! Shared test fixtures
//!
//! `FakeLookup` answers from a script instead of the network and records
//! every call (with the paused-clock instant it happened at).
//! `UnwritableStore` remembers identifiers but fails every append.

#![allow(dead_code)]

use cnpj_enrich::services::DedupStore;
use cnpj_enrich::types::{
    Activity, CnpjLookup, CompanyInfo, EmailEntry, LookupError, OfficePayload, PhoneEntry,
};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::time::Instant;

pub enum Scripted {
    Payload(OfficePayload),
    Fail(LookupError),
    Panic,
}

/// Scripted lookup collaborator; unknown identifiers answer `NotFound(404)`
#[derive(Default)]
pub struct FakeLookup {
    script: HashMap<String, Scripted>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl FakeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, cnpj: &str, response: Scripted) -> Self {
        self.script.insert(cnpj.to_string(), response);
        self
    }

    pub fn developer(self, cnpj: &str) -> Self {
        self.respond(
            cnpj,
            Scripted::Payload(company(cnpj, "Desenvolvimento de programas de computador sob encomenda")),
        )
    }

    pub fn non_developer(self, cnpj: &str) -> Self {
        self.respond(cnpj, Scripted::Payload(company(cnpj, "Comércio varejista de mercadorias em geral")))
    }

    pub fn failing(self, cnpj: &str, error: LookupError) -> Self {
        self.respond(cnpj, Scripted::Fail(error))
    }

    pub fn panicking(self, cnpj: &str) -> Self {
        self.respond(cnpj, Scripted::Panic)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait::async_trait]
impl CnpjLookup for FakeLookup {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn lookup(&self, cnpj: &str) -> Result<OfficePayload, LookupError> {
        self.calls
            .lock()
            .unwrap()
            .push((cnpj.to_string(), Instant::now()));

        match self.script.get(cnpj) {
            Some(Scripted::Payload(payload)) => Ok(payload.clone()),
            Some(Scripted::Fail(error)) => Err(error.clone()),
            Some(Scripted::Panic) => panic!("fake lookup exploded on {}", cnpj),
            None => Err(LookupError::NotFound(404)),
        }
    }
}

/// Dedup store on a full disk: the in-memory set updates, persisting fails
#[derive(Default)]
pub struct UnwritableStore {
    seen: HashSet<String>,
    attempts: usize,
}

impl UnwritableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl DedupStore for UnwritableStore {
    fn contains(&self, cnpj: &str) -> bool {
        self.seen.contains(cnpj)
    }

    fn record(&mut self, cnpj: &str) -> cnpj_common::Result<()> {
        self.attempts += 1;
        self.seen.insert(cnpj.to_string());
        Err(cnpj_common::Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "no space left on device",
        )))
    }

    fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Company with one phone, one email and the given main activity
pub fn company(cnpj: &str, main_activity: &str) -> OfficePayload {
    OfficePayload {
        tax_id: Some(cnpj.to_string()),
        alias: None,
        company: Some(CompanyInfo {
            name: Some(format!("Empresa {} LTDA", cnpj)),
        }),
        phones: Some(vec![PhoneEntry {
            area: Some("11".to_string()),
            number: Some("40028922".to_string()),
        }]),
        emails: Some(vec![EmailEntry {
            address: Some(format!("contato@{}.com.br", cnpj)),
        }]),
        main_activity: Some(Activity {
            text: Some(main_activity.to_string()),
        }),
        side_activities: None,
    }
}

pub fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
