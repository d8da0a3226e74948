use async_trait::async_trait;

use super::error::AuthError;

/// Documents owned by a single user and guarded per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Transaction,
    Goal,
}

impl ResourceKind {
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::Transaction => "transactions",
            ResourceKind::Goal => "goals",
        }
    }
}

/// Name of the owner reference on transaction and goal documents.
pub const OWNER_FIELD: &str = "userId";

/// Resolves who owns a transaction or goal.
#[async_trait]
pub trait ResourceOwners: Send + Sync {
    /// `None` when the resource does not exist.
    async fn owner_of(&self, kind: ResourceKind, id: &str) -> Result<Option<String>, AuthError>;
}
