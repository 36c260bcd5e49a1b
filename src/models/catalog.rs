//! Sync scopes and the catalog entries they own

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Kind of upstream a scope points at
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScopeKind {
    Provider,
    Playlist,
}

/// A service provider or playlist whose catalog is kept in sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub id: i64,
    pub kind: ScopeKind,
    pub name: String,
    pub url: String,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewScope {
    pub kind: ScopeKind,
    pub name: String,
    pub url: String,
    pub is_enabled: bool,
}

/// Matching key of a catalog entry within its scope
pub type CatalogKey = (String, Option<String>);

/// A persisted channel row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub scope_id: i64,
    pub title: String,
    pub group: Option<String>,
    pub tvg_id: Option<String>,
    pub media_url: String,
    pub logo_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn key(&self) -> CatalogKey {
        (self.title.clone(), self.group.clone())
    }
}

/// Insert request for a catalog row
#[derive(Debug, Clone, PartialEq)]
pub struct NewCatalogEntry {
    pub scope_id: i64,
    pub title: String,
    pub group: Option<String>,
    pub tvg_id: Option<String>,
    pub media_url: String,
    pub logo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One channel as it appears in a fetched document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub title: String,
    pub group: Option<String>,
    pub tvg_id: Option<String>,
    pub media_url: String,
    pub logo_url: Option<String>,
}

impl ChannelRecord {
    pub fn key(&self) -> CatalogKey {
        (self.title.clone(), self.group.clone())
    }

    /// Records without a title or a media URL cannot be synchronised
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() || self.media_url.trim().is_empty()
    }
}

/// A scope together with every entry it owns
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeCatalog {
    pub scope: Scope,
    pub entries: Vec<CatalogEntry>,
}

/// Changes computed by a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogDelta {
    pub to_add: Vec<NewCatalogEntry>,
    pub to_update: Vec<CatalogEntry>,
    /// Entries to delete, or already marked inactive in soft mode
    pub to_retire: Vec<CatalogEntry>,
}

impl CatalogDelta {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_retire.is_empty()
    }
}
