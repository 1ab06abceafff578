use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

/// Static description of a persisted document, emitted by `#[derive(Document)]`.
#[derive(Debug, Clone)]
pub struct DocumentSchema {
    pub collection: &'static str,
    /// Epoch-millisecond field used as the score of every index entry.
    pub score_field: &'static str,
    pub unique: Vec<UniqueSpec>,
    pub indexes: Vec<IndexSpec>,
    /// Bool field that, while `true`, keeps the document out of secondary indexes.
    pub hidden_when: Option<&'static str>,
    /// Epoch-millisecond field after which the document is gone.
    pub expires_field: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct UniqueSpec {
    pub field: &'static str,
    pub case_insensitive: bool,
}

/// A secondary index over one or more fields.
///
/// Array fields fan out to one entry per element (single-field indexes only).
/// Null components encode as `~`; an entry whose components are all null is skipped.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub fields: Vec<&'static str>,
}

/// Trait implemented by `#[derive(Document)]`.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    fn schema() -> DocumentSchema;
}

/// Registration submitted to `inventory` for every derived document.
pub struct DocumentRegistration {
    pub type_name: &'static str,
    pub collection: &'static str,
    pub schema: fn() -> DocumentSchema,
}

inventory::collect!(DocumentRegistration);

/// All documents linked into the current binary.
pub fn registered_documents() -> impl Iterator<Item = &'static DocumentRegistration> {
    inventory::iter::<DocumentRegistration>()
}

pub fn registered_document(collection: &str) -> Option<&'static DocumentRegistration> {
    registered_documents().find(|registration| registration.collection == collection)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// 1-based offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

/// One page of results plus the totals clients use to render pagination.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub current_page: u64,
    pub total_pages: u64,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            current_page: request.page,
            total_pages: request.total_pages(total),
            total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            current_page: self.current_page,
            total_pages: self.total_pages,
            total: self.total,
        }
    }
}

static LAST_STAMP_MS: AtomicI64 = AtomicI64::new(0);

/// Current time, strictly increasing (millisecond resolution) within this process.
///
/// Index scores are creation timestamps, so two documents created in the same
/// millisecond would otherwise tie and list in id order.
pub fn monotonic_now() -> DateTime<Utc> {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_STAMP_MS.load(Ordering::Relaxed);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_STAMP_MS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return Utc.timestamp_millis_opt(next).single().unwrap_or_else(Utc::now),
            Err(observed) => last = observed,
        }
    }
}

/// Serde helpers for documents that pass through Lua's cjson, which encodes
/// an empty array as `{}`.
pub mod lenient {
    use std::collections::HashMap;

    use serde::de::{Error as _, IgnoredAny};

    use super::*;

    pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum SeqOrEmpty<T> {
            Seq(Vec<T>),
            Empty(HashMap<String, IgnoredAny>),
        }

        match SeqOrEmpty::<T>::deserialize(deserializer)? {
            SeqOrEmpty::Seq(items) => Ok(items),
            SeqOrEmpty::Empty(map) if map.is_empty() => Ok(Vec::new()),
            SeqOrEmpty::Empty(_) => Err(D::Error::custom("expected a sequence")),
        }
    }
}
