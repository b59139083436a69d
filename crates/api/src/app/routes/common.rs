use std::sync::Arc;

use axum::Extension;

use kardex_core::{DocumentId, DomainError};

use crate::app::AppServices;

pub type Svc = Extension<Arc<AppServices>>;

/// Parse a document id from a path segment (422 when malformed).
pub fn parse_id(raw: &str) -> Result<DocumentId, DomainError> {
    raw.trim().parse()
}
