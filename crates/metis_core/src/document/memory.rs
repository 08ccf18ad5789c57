//! In-process document service.
//!
//! Keeps documents in memory and mirrors the external service contract:
//! sessions, attachments, and all-or-nothing updates. Faults can be injected
//! per stage so callers can verify release on failure paths.

use crate::document::{
    DocError, DocObject, DocResult, DocumentKey, DocumentService, DocumentSession, Mutation,
};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Stage at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fault {
    Connect,
    Attach,
    Update,
    Detach,
    Close,
}

#[derive(Default)]
struct MemoryState {
    documents: BTreeMap<DocumentKey, DocObject>,
    attachments: BTreeMap<DocumentKey, usize>,
    open_sessions: usize,
    faults: BTreeSet<Fault>,
    accepted_token: Option<String>,
}

/// Document service backed by process memory.
#[derive(Default)]
pub struct MemoryDocumentService {
    state: Mutex<MemoryState>,
}

impl MemoryDocumentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only sessions opened with `token` are accepted.
    pub fn with_accepted_token(token: impl Into<String>) -> Self {
        let service = Self::default();
        service.lock().accepted_token = Some(token.into());
        service
    }

    pub fn inject_fault(&self, fault: Fault) {
        self.lock().faults.insert(fault);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Committed state of one document.
    pub fn snapshot(&self, key: &DocumentKey) -> Option<DocObject> {
        self.lock().documents.get(key).cloned()
    }

    pub fn document_count(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    /// Number of live attachments across all sessions.
    pub fn attachment_count(&self) -> usize {
        self.lock().attachments.values().sum()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentService for MemoryDocumentService {
    fn open_session(&self, token: &str) -> DocResult<Box<dyn DocumentSession + '_>> {
        let mut state = self.lock();
        if state.faults.contains(&Fault::Connect) {
            return Err(DocError::Connect("injected connect failure".to_string()));
        }
        if let Some(accepted) = state.accepted_token.as_deref() {
            if accepted != token {
                return Err(DocError::Connect("token rejected".to_string()));
            }
        }
        state.open_sessions += 1;
        debug!("event=doc_session_open module=document status=ok backend=memory");

        Ok(Box::new(MemorySession {
            service: self,
            attached: BTreeSet::new(),
            released: false,
        }))
    }
}

struct MemorySession<'a> {
    service: &'a MemoryDocumentService,
    attached: BTreeSet<DocumentKey>,
    released: bool,
}

impl MemorySession<'_> {
    fn release(&mut self) {
        if self.released {
            return;
        }
        let mut state = self.service.lock();
        for key in std::mem::take(&mut self.attached) {
            release_attachment(&mut state, &key);
        }
        state.open_sessions = state.open_sessions.saturating_sub(1);
        self.released = true;
    }

    fn ensure_attached(&self, key: &DocumentKey) -> DocResult<()> {
        if self.attached.contains(key) {
            Ok(())
        } else {
            Err(DocError::NotAttached(key.to_string()))
        }
    }
}

impl DocumentSession for MemorySession<'_> {
    fn attach(&mut self, key: &DocumentKey) -> DocResult<()> {
        let mut state = self.service.lock();
        if state.faults.contains(&Fault::Attach) {
            return Err(DocError::Attach {
                key: key.to_string(),
                reason: "injected attach failure".to_string(),
            });
        }
        state.documents.entry(key.clone()).or_default();
        if self.attached.insert(key.clone()) {
            *state.attachments.entry(key.clone()).or_default() += 1;
        }
        Ok(())
    }

    fn update(&mut self, key: &DocumentKey, mutation: &mut Mutation<'_>) -> DocResult<()> {
        self.ensure_attached(key)?;

        let mut draft = self.service.lock().documents.get(key).cloned().unwrap_or_default();
        // Callback runs without the lock held; only the commit is serialized.
        mutation(&mut draft)?;

        let mut state = self.service.lock();
        if state.faults.contains(&Fault::Update) {
            return Err(DocError::Update {
                key: key.to_string(),
                reason: "injected update failure".to_string(),
            });
        }
        state.documents.insert(key.clone(), draft);
        Ok(())
    }

    fn detach(&mut self, key: &DocumentKey) -> DocResult<()> {
        self.ensure_attached(key)?;

        let mut state = self.service.lock();
        if state.faults.contains(&Fault::Detach) {
            return Err(DocError::Detach {
                key: key.to_string(),
                reason: "injected detach failure".to_string(),
            });
        }
        self.attached.remove(key);
        release_attachment(&mut state, key);
        Ok(())
    }

    fn close(mut self: Box<Self>) -> DocResult<()> {
        let failed = self.service.lock().faults.contains(&Fault::Close);
        self.release();
        if failed {
            return Err(DocError::Close("injected close failure".to_string()));
        }
        debug!("event=doc_session_close module=document status=ok backend=memory");
        Ok(())
    }
}

impl Drop for MemorySession<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

fn release_attachment(state: &mut MemoryState, key: &DocumentKey) {
    if let Some(count) = state.attachments.get_mut(key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            state.attachments.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Fault, MemoryDocumentService};
    use crate::document::{DocError, DocumentKey, DocumentService};

    #[test]
    fn failed_mutation_leaves_document_untouched() {
        let service = MemoryDocumentService::new();
        let key = DocumentKey::new("projects", "p1");
        let mut session = service.open_session("t").unwrap();
        session.attach(&key).unwrap();

        session
            .update(&key, &mut |root| {
                root.set_string("name", "first");
                Ok(())
            })
            .unwrap();
        let err = session
            .update(&key, &mut |root| {
                root.set_string("name", "second");
                Err(DocError::InvalidContent("boom".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, DocError::InvalidContent(_)));

        let snapshot = service.snapshot(&key).unwrap();
        assert_eq!(snapshot.string("name"), Some("first"));
        session.detach(&key).unwrap();
        session.close().unwrap();
    }

    #[test]
    fn dropping_a_session_releases_attachments() {
        let service = MemoryDocumentService::new();
        let key = DocumentKey::new("projects", "p1");
        {
            let mut session = service.open_session("t").unwrap();
            session.attach(&key).unwrap();
            assert_eq!(service.attachment_count(), 1);
        }
        assert_eq!(service.attachment_count(), 0);
        assert_eq!(service.open_sessions(), 0);
    }

    #[test]
    fn update_requires_attachment() {
        let service = MemoryDocumentService::new();
        let key = DocumentKey::new("projects", "p1");
        let mut session = service.open_session("t").unwrap();
        let err = session.update(&key, &mut |_| Ok(())).unwrap_err();
        assert!(matches!(err, DocError::NotAttached(_)));
    }

    #[test]
    fn rejected_token_does_not_open_a_session() {
        let service = MemoryDocumentService::with_accepted_token("metis-server");
        assert!(matches!(
            service.open_session("other"),
            Err(DocError::Connect(_))
        ));
        service.inject_fault(Fault::Connect);
        assert!(service.open_session("metis-server").is_err());
        assert_eq!(service.open_sessions(), 0);
    }
}
