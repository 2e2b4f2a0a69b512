//! CurrentUser - the user events are attributed to

use serde::{Deserialize, Serialize};

use crate::Properties;

/// Identified user held by the dispatcher
///
/// An empty `id` means nobody has been identified yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,

    /// Missing properties are stored as an empty map
    #[serde(default)]
    pub properties: Properties,
}

impl CurrentUser {
    pub fn new(id: impl Into<String>, properties: Option<Properties>) -> Self {
        Self {
            id: id.into(),
            properties: properties.unwrap_or_default(),
        }
    }

    /// Whether a non-empty user id is set
    pub fn is_identified(&self) -> bool {
        !self.id.is_empty()
    }
}
