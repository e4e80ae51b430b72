use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name used when a contact has no usable name.
pub const FALLBACK_DISPLAY_NAME: &str = "Business Partner";

/// One captured business card, as served by the catalog.
///
/// `email` is raw OCR output and may hold a comma-separated list; only the
/// first entry is canonical for dispatch purposes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub designation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
}

impl ContactRecord {
    /// Canonical email for this contact, if the raw field yields a valid one.
    pub fn canonical_email(&self) -> Option<CanonicalEmail> {
        CanonicalEmail::parse(&self.email)
    }

    /// Name shown to recipients; falls back to [`FALLBACK_DISPLAY_NAME`].
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            FALLBACK_DISPLAY_NAME.to_string()
        } else {
            name.to_string()
        }
    }
}

/// Immutable snapshot of one capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default, deserialize_with = "null_as_default")]
    pub batch_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub team: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_records: u64,
}

/// Nullable database columns arrive as `null`; read them as the default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM:SS` taken as UTC. Anything
/// unparseable reads as absent.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok());
    Ok(naive.map(|ts| ts.and_utc()))
}

/// An event recorded under an operator name (`GET /events/{name}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub batch_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub team: String,
}

/// A contact joined with the metadata of the batch it was captured in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRecord {
    #[serde(rename = "card_name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub designation: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub form_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub event: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub team: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_data: String,
}

impl SearchRecord {
    pub fn contact(&self) -> ContactRecord {
        ContactRecord {
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            company: self.company.clone(),
            designation: self.designation.clone(),
            address: self.address.clone(),
        }
    }
}

/// Which batch field a search matches on besides the operator name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Name,
    NameTeam,
    NameEvent,
}

impl std::fmt::Display for SearchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchKind::Name => write!(f, "name"),
            SearchKind::NameTeam => write!(f, "name_team"),
            SearchKind::NameEvent => write!(f, "name_event"),
        }
    }
}

/// Structured search filter.
///
/// `primary` is the operator name; `secondary` is the team or event,
/// depending on `kind`. The two values are never packed into one string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub kind: SearchKind,
    pub primary: String,
    pub secondary: Option<String>,
}

impl SearchFilter {
    pub fn by_name(primary: impl Into<String>) -> Self {
        Self {
            kind: SearchKind::Name,
            primary: primary.into(),
            secondary: None,
        }
    }

    pub fn by_name_and_team(primary: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            kind: SearchKind::NameTeam,
            primary: primary.into(),
            secondary: Some(team.into()),
        }
    }

    pub fn by_name_and_event(primary: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            kind: SearchKind::NameEvent,
            primary: primary.into(),
            secondary: Some(event.into()),
        }
    }

    /// Whether a record returned for `primary` also satisfies the secondary constraint.
    pub fn matches_secondary(&self, record: &SearchRecord) -> bool {
        let Some(secondary) = self.secondary.as_deref().map(str::trim) else {
            return true;
        };
        if secondary.is_empty() {
            return true;
        }
        let needle = secondary.to_lowercase();
        match self.kind {
            SearchKind::Name => true,
            SearchKind::NameTeam => record.team.to_lowercase().contains(&needle),
            SearchKind::NameEvent => record.event.to_lowercase().contains(&needle),
        }
    }
}

/// How an explicit selection combines with the filtered population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    All,
    Include,
    Exclude,
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionMode::All => write!(f, "all"),
            SelectionMode::Include => write!(f, "include"),
            SelectionMode::Exclude => write!(f, "exclude"),
        }
    }
}

/// Normalized email address: first comma segment, trimmed, lower-cased.
///
/// Only values containing `@` can be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalEmail(String);

impl CanonicalEmail {
    pub fn parse(raw: &str) -> Option<Self> {
        let first = raw.split(',').next()?.trim().to_lowercase();
        if first.contains('@') {
            Some(Self(first))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CanonicalEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CanonicalEmail {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CanonicalEmail::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("not an email address: {raw:?}")))
    }
}

/// One entry of a [`RecipientSet`]; serializes as `{email, name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email: CanonicalEmail,
    #[serde(rename = "name")]
    pub display_name: String,
}

/// Ordered recipients, unique by canonical email (first occurrence wins).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RecipientSet {
    recipients: Vec<Recipient>,
    #[serde(skip)]
    seen: HashSet<CanonicalEmail>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a recipient unless its email is already present.
    /// Returns `true` if it was added.
    pub fn insert(&mut self, email: CanonicalEmail, display_name: String) -> bool {
        if !self.seen.insert(email.clone()) {
            return false;
        }
        self.recipients.push(Recipient {
            email,
            display_name,
        });
        true
    }

    pub fn contains(&self, email: &CanonicalEmail) -> bool {
        self.seen.contains(email)
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Recipient> {
        self.recipients.iter()
    }

    pub fn emails(&self) -> impl Iterator<Item = &CanonicalEmail> {
        self.recipients.iter().map(|r| &r.email)
    }
}

impl<'a> IntoIterator for &'a RecipientSet {
    type Item = &'a Recipient;
    type IntoIter = std::slice::Iter<'a, Recipient>;

    fn into_iter(self) -> Self::IntoIter {
        self.recipients.iter()
    }
}

/// The two resource slots a dispatch can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Attachment,
    Signature,
}

impl ResourceKind {
    /// File extensions the backend accepts for this slot.
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::Attachment => &["pdf", "doc", "jpg", "jpeg", "png"],
            ResourceKind::Signature => &["jpg", "jpeg", "png"],
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Attachment => write!(f, "attachment"),
            ResourceKind::Signature => write!(f, "signature"),
        }
    }
}

/// A binary resource staged for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub kind: ResourceKind,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Resource {
    pub fn new(kind: ResourceKind, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            kind,
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Lower-cased extension of `file_name`, without the dot.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

/// Opaque server-side reference returned by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageRef(pub String);

impl std::fmt::Display for StorageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation id of one dispatch attempt, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DispatchId(pub Uuid);

impl DispatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DispatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire body of `POST /send-emails`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchRequest {
    pub recipients: RecipientSet,
    pub subject: String,
    pub body: String,
    pub attachment_path: Option<StorageRef>,
    pub signature_path: Option<StorageRef>,
}

/// Accepted-submission response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub count: u64,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Point-in-time snapshot of the external queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub processing: bool,
    #[serde(default)]
    pub queued: u64,
    #[serde(default)]
    pub sent: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub total: u64,
}
