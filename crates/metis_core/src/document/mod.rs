//! Collaborative document service contract.
//!
//! # Responsibility
//! - Describe the attach / update / detach surface the core needs from the
//!   external document service.
//! - Model the key/value tree a document holds.
//!
//! # Invariants
//! - `update` applies its callback all-or-nothing: if the callback fails,
//!   no part of the mutation becomes visible.
//! - A document is addressed by `collection$document`.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod builder;
pub mod memory;

pub use builder::DocumentTreeBuilder;
pub use memory::MemoryDocumentService;

const KEY_SEPARATOR: char = '$';

pub type DocResult<T> = Result<T, DocError>;

/// Failures reported by the document service or the tree builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocError {
    /// Session could not be opened (service unreachable, token refused).
    Connect(String),
    Attach { key: String, reason: String },
    Update { key: String, reason: String },
    Detach { key: String, reason: String },
    Close(String),
    /// Document must be attached before it is mutated or detached.
    NotAttached(String),
    /// Content that cannot be written into a document.
    InvalidContent(String),
}

impl Display for DocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(reason) => write!(f, "document service connect failed: {reason}"),
            Self::Attach { key, reason } => write!(f, "attach {key} failed: {reason}"),
            Self::Update { key, reason } => write!(f, "update {key} failed: {reason}"),
            Self::Detach { key, reason } => write!(f, "detach {key} failed: {reason}"),
            Self::Close(reason) => write!(f, "document session close failed: {reason}"),
            Self::NotAttached(key) => write!(f, "document {key} is not attached"),
            Self::InvalidContent(reason) => write!(f, "invalid document content: {reason}"),
        }
    }
}

impl Error for DocError {}

/// Parse failures for the textual document key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyError(String);

impl Display for KeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid document key: `{}`", self.0)
    }
}

impl Error for KeyError {}

/// Address of one document: collection plus document name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub collection: String,
    pub document: String,
}

impl DocumentKey {
    pub fn new(collection: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            document: document.into(),
        }
    }

    /// Parses the `collection$document` form sent by the document service.
    pub fn from_bson_key(value: &str) -> Result<Self, KeyError> {
        let (collection, document) = value
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| KeyError(value.to_string()))?;
        if collection.is_empty() || document.is_empty() || document.contains(KEY_SEPARATOR) {
            return Err(KeyError(value.to_string()));
        }
        Ok(Self::new(collection, document))
    }

    pub fn to_bson_key(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.collection, self.document)
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_bson_key())
    }
}

/// Leaf or nested value inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocValue {
    Object(DocObject),
    String(String),
    Integer(i64),
    Bool(bool),
}

/// Object node of a document tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocObject {
    fields: BTreeMap<String, DocValue>,
}

impl DocObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces `key` with `object`.
    pub fn set_object(&mut self, key: &str, object: DocObject) {
        self.fields.insert(key.to_string(), DocValue::Object(object));
    }

    pub fn set_string(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .insert(key.to_string(), DocValue::String(value.into()));
    }

    pub fn set_integer(&mut self, key: &str, value: i64) {
        self.fields.insert(key.to_string(), DocValue::Integer(value));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.fields.insert(key.to_string(), DocValue::Bool(value));
    }

    pub fn get(&self, key: &str) -> Option<&DocValue> {
        self.fields.get(key)
    }

    pub fn object(&self, key: &str) -> Option<&DocObject> {
        match self.fields.get(key) {
            Some(DocValue::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(DocValue::String(text)) => Some(text),
            _ => None,
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.fields.get(key) {
            Some(DocValue::Integer(number)) => Some(*number),
            _ => None,
        }
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.fields.get(key) {
            Some(DocValue::Bool(flag)) => Some(*flag),
            _ => None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Mutation applied to a document root inside one atomic update.
pub type Mutation<'a> = dyn FnMut(&mut DocObject) -> DocResult<()> + 'a;

/// Entry point to the external document service.
pub trait DocumentService {
    /// Opens an activated client session authenticated by `token`.
    fn open_session(&self, token: &str) -> DocResult<Box<dyn DocumentSession + '_>>;
}

impl<D: DocumentService + ?Sized> DocumentService for &D {
    fn open_session(&self, token: &str) -> DocResult<Box<dyn DocumentSession + '_>> {
        (**self).open_session(token)
    }
}

/// One activated client session against the document service.
pub trait DocumentSession {
    /// Creates or opens the document and starts tracking it.
    fn attach(&mut self, key: &DocumentKey) -> DocResult<()>;
    /// Runs `mutation` against the attached document atomically.
    fn update(&mut self, key: &DocumentKey, mutation: &mut Mutation<'_>) -> DocResult<()>;
    /// Stops tracking the document; pending changes are pushed first.
    fn detach(&mut self, key: &DocumentKey) -> DocResult<()>;
    /// Deactivates and closes the session.
    fn close(self: Box<Self>) -> DocResult<()>;
}

#[cfg(test)]
mod tests {
    use super::{DocObject, DocumentKey};

    #[test]
    fn bson_key_round_trips() {
        let key = DocumentKey::new("projects", "00ff");
        assert_eq!(key.to_bson_key(), "projects$00ff");
        assert_eq!(DocumentKey::from_bson_key("projects$00ff").unwrap(), key);
    }

    #[test]
    fn malformed_bson_keys_are_rejected() {
        for value in ["projects", "$doc", "projects$", "a$b$c", ""] {
            assert!(DocumentKey::from_bson_key(value).is_err(), "{value}");
        }
    }

    #[test]
    fn set_object_replaces_previous_value() {
        let mut root = DocObject::new();
        root.set_string("project", "old");
        let mut project = DocObject::new();
        project.set_string("id", "p1");
        root.set_object("project", project);
        assert_eq!(root.object("project").unwrap().string("id"), Some("p1"));
    }
}
