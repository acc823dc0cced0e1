//! Subject records and their satellite data.

use serde::{Deserialize, Serialize};

use attest_kernel_core::{Address, Blake3Hash, ModuleId, SubjectId};

/// A registered subject (document or record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub id: SubjectId,

    /// Current owner. Only the owner configures resolvers, executors and
    /// provider overrides.
    pub owner: Address,

    /// Module (e.g. a tokenizer) associated with the subject.
    pub module: Option<Address>,

    /// Hash of the subject's content.
    pub content_hash: Blake3Hash,

    /// Parent subject, for derived documents.
    pub parent: Option<SubjectId>,

    /// Opaque extension data.
    pub extension: Vec<u8>,

    /// Resolver whose hooks are blocking.
    pub primary_resolver: Option<ModuleId>,

    /// Resolvers whose hooks are best-effort.
    pub additional_resolvers: Vec<ModuleId>,

    /// Whether the resolver configuration is frozen.
    pub resolvers_locked: bool,

    /// When the subject was registered (Unix ms).
    pub registered_at: i64,
}

impl SubjectRecord {
    /// Every resolver attached to the subject, primary first.
    pub fn resolvers(&self) -> impl Iterator<Item = &ModuleId> {
        self.primary_resolver
            .iter()
            .chain(self.additional_resolvers.iter())
    }

    pub fn has_resolver(&self, id: &ModuleId) -> bool {
        self.resolvers().any(|r| r == id)
    }
}

/// Parameters for registering a subject. The caller becomes its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubject {
    pub id: SubjectId,
    pub content_hash: Blake3Hash,
    pub module: Option<Address>,
    pub parent: Option<SubjectId>,
    pub extension: Vec<u8>,
    pub primary_resolver: Option<ModuleId>,
    pub additional_resolvers: Vec<ModuleId>,
}

impl NewSubject {
    pub fn new(id: SubjectId, content_hash: Blake3Hash) -> Self {
        Self {
            id,
            content_hash,
            module: None,
            parent: None,
            extension: Vec::new(),
            primary_resolver: None,
            additional_resolvers: Vec::new(),
        }
    }

    pub fn module(mut self, module: Address) -> Self {
        self.module = Some(module);
        self
    }

    pub fn parent(mut self, parent: SubjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn extension(mut self, extension: impl Into<Vec<u8>>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn primary_resolver(mut self, resolver: ModuleId) -> Self {
        self.primary_resolver = Some(resolver);
        self
    }

    pub fn additional_resolver(mut self, resolver: ModuleId) -> Self {
        self.additional_resolvers.push(resolver);
        self
    }
}

/// A delegate allowed to act on the owner's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorDelegation {
    pub executor: Address,
    pub authorized_at: i64,
}

/// A persisted emergency unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockRecord {
    pub subject: SubjectId,
    pub by: Address,
    pub justification: String,
    pub at: i64,
}
