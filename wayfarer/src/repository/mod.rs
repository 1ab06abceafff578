use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    errors::RepoError,
    keys::{KeyContext, NULL_COMPONENT},
    runtime::{
        DocumentStore,
        commands::{
            DocumentDelete, DocumentGetOrCreate, DocumentInsert, DocumentPatch, EdgeSide, EdgeToggle,
            ExclusiveSetPayload, MutationCommand, PatchGuard, PatchOperation, SchemaPayload,
        },
    },
    types::{Document, DocumentSchema, Page, PageRequest, SortOrder},
};

/// Selects one sorted-set index of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    /// Every document of the collection.
    All,
    /// A declared index, values in the order its fields were declared; `None` matches null.
    Fields(Vec<(&'static str, Option<String>)>),
}

impl IndexQuery {
    pub fn eq(field: &'static str, value: impl Into<String>) -> Self {
        Self::Fields(vec![(field, Some(value.into()))])
    }

    pub fn and(self, field: &'static str, value: Option<String>) -> Self {
        match self {
            Self::All => Self::Fields(vec![(field, value)]),
            Self::Fields(mut fields) => {
                fields.push((field, value));
                Self::Fields(fields)
            }
        }
    }
}

/// Result of a get_or_create operation.
/// Contains the document and whether it was created or found.
#[derive(Debug, Clone)]
pub enum GetOrCreateResult<T> {
    /// Document was created (did not exist before)
    Created(T),
    /// Document already existed (returned as-is, no mutation)
    Found(T),
}

impl<T> GetOrCreateResult<T> {
    /// Returns the inner document regardless of whether it was created or found.
    pub fn into_inner(self) -> T {
        match self {
            Self::Created(document) => document,
            Self::Found(document) => document,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Debug, Clone)]
pub struct PatchOutcome<T> {
    /// `false` when the guard rejected the patch; `document` is then the unchanged state.
    pub applied: bool,
    pub document: T,
}

#[derive(Debug, Clone)]
pub struct EdgeOutcome<T> {
    pub active: bool,
    pub source: T,
    pub target: T,
}

/// Ordered list of field edits applied atomically to one document.
#[derive(Debug, Default)]
pub struct Patch {
    operations: Vec<PatchOperation>,
    guard: Option<PatchGuard>,
    error: Option<serde_json::Error>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn encode(&mut self, value: impl Serialize) -> Value {
        match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                self.error.get_or_insert(err);
                Value::Null
            }
        }
    }

    pub fn assign(mut self, field: &str, value: impl Serialize) -> Self {
        let value = self.encode(value);
        self.operations.push(PatchOperation::Assign {
            field: field.to_string(),
            value,
        });
        self
    }

    pub fn increment(mut self, field: &str, delta: i64) -> Self {
        self.operations.push(PatchOperation::Increment {
            field: field.to_string(),
            delta,
        });
        self
    }

    pub fn add_to_set(mut self, field: &str, member: &str, counter: Option<&str>) -> Self {
        self.operations.push(PatchOperation::AddToSet {
            field: field.to_string(),
            member: member.to_string(),
            counter: counter.map(str::to_string),
        });
        self
    }

    pub fn remove_from_set(mut self, field: &str, member: &str, counter: Option<&str>) -> Self {
        self.operations.push(PatchOperation::RemoveFromSet {
            field: field.to_string(),
            member: member.to_string(),
            counter: counter.map(str::to_string),
        });
        self
    }

    /// Flips `member` in `field`; joining also leaves `exclusive_with` (`(field, counter)`).
    pub fn toggle_member(
        mut self,
        field: &str,
        counter: &str,
        member: &str,
        exclusive_with: Option<(&str, &str)>,
    ) -> Self {
        self.operations.push(PatchOperation::ToggleMember {
            field: field.to_string(),
            counter: counter.to_string(),
            member: member.to_string(),
            exclusive_with: exclusive_with.map(|(field, counter)| ExclusiveSetPayload {
                field: field.to_string(),
                counter: counter.to_string(),
            }),
        });
        self
    }

    pub fn append(mut self, field: &str, value: impl Serialize, unique_by: Option<&str>, counter: Option<&str>) -> Self {
        let value = self.encode(value);
        self.operations.push(PatchOperation::Append {
            field: field.to_string(),
            value,
            unique_by: unique_by.map(str::to_string),
            counter: counter.map(str::to_string),
        });
        self
    }

    pub fn map_increment(mut self, field: &str, key: &str, delta: i64) -> Self {
        self.operations.push(PatchOperation::MapIncrement {
            field: field.to_string(),
            key: key.to_string(),
            delta,
        });
        self
    }

    pub fn map_assign(mut self, field: &str, key: &str, value: impl Serialize) -> Self {
        let value = self.encode(value);
        self.operations.push(PatchOperation::MapAssign {
            field: field.to_string(),
            key: key.to_string(),
            value,
        });
        self
    }

    /// Only apply while `field == equals`.
    pub fn guard(mut self, field: &str, equals: impl Serialize) -> Self {
        let equals = self.encode(equals);
        self.guard = Some(PatchGuard {
            field: field.to_string(),
            equals,
        });
        self
    }
}

/// Typed access to one document collection.
pub struct Repo<T, S>
where
    T: Document,
    S: DocumentStore,
{
    store: S,
    schema: DocumentSchema,
    payload: SchemaPayload,
    prefix: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> Clone for Repo<T, S>
where
    T: Document,
    S: DocumentStore,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            schema: self.schema.clone(),
            payload: self.payload.clone(),
            prefix: self.prefix.clone(),
            _marker: PhantomData,
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RepoError> {
    Ok(serde_json::from_value(value)?)
}

fn take_document(response: &mut Value, field: &str) -> Result<Value, RepoError> {
    match response.get_mut(field) {
        Some(document) => Ok(document.take()),
        None => Err(RepoError::Other {
            message: format!("store response is missing `{field}`").into(),
        }),
    }
}

impl<T, S> Repo<T, S>
where
    T: Document,
    S: DocumentStore,
{
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let schema = T::schema();
        let payload = SchemaPayload::from_schema(&schema, &KeyContext::new(&prefix));
        Self {
            store,
            schema,
            payload,
            prefix,
            _marker: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    pub fn key_context(&self) -> KeyContext<'_> {
        KeyContext::new(&self.prefix)
    }

    pub fn entity_key(&self, entity_id: &str) -> String {
        self.payload.entity_key(entity_id)
    }

    /// Resolves a query to its sorted-set key, rejecting indexes the document does not declare.
    pub fn index_key(&self, query: &IndexQuery) -> Result<String, RepoError> {
        let fields = match query {
            IndexQuery::All => return Ok(self.payload.all_key()),
            IndexQuery::Fields(fields) => fields,
        };
        let names: Vec<&str> = fields.iter().map(|(field, _)| *field).collect();
        let declared = self
            .schema
            .indexes
            .iter()
            .any(|index| index.fields.as_slice() == names.as_slice());
        if !declared {
            return Err(RepoError::InvalidRequest {
                message: format!("{} has no index on {}", T::COLLECTION, names.join("+")),
            });
        }
        let values: Vec<&str> = fields
            .iter()
            .map(|(_, value)| value.as_deref().unwrap_or(NULL_COMPONENT))
            .collect();
        Ok(self.key_context().index(T::COLLECTION, &names, &values))
    }

    pub async fn get(&self, entity_id: &str) -> Result<Option<T>, RepoError> {
        match self.store.fetch(&self.entity_key(entity_id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub async fn get_or_error(&self, entity_id: &str) -> Result<T, RepoError> {
        self.get(entity_id).await?.ok_or_else(|| RepoError::NotFound {
            entity_id: Some(entity_id.to_string()),
        })
    }

    /// Loads documents in the order given, skipping ids that no longer exist.
    pub async fn get_many(&self, entity_ids: &[String]) -> Result<Vec<T>, RepoError> {
        let keys: Vec<String> = entity_ids.iter().map(|id| self.entity_key(id)).collect();
        let raw = self.store.fetch_many(&keys).await?;
        raw.into_iter()
            .flatten()
            .map(|json| serde_json::from_str(&json).map_err(RepoError::from))
            .collect()
    }

    pub async fn find_by_unique(&self, field: &str, value: &str) -> Result<Option<T>, RepoError> {
        let Some(spec) = self.schema.unique.iter().find(|spec| spec.field == field) else {
            return Err(RepoError::InvalidRequest {
                message: format!("{} has no unique field `{field}`", T::COLLECTION),
            });
        };
        let value = if spec.case_insensitive {
            value.to_ascii_lowercase()
        } else {
            value.to_string()
        };
        match self.store.fetch(&self.payload.unique_key(field, &value)).await? {
            Some(owner) => self.get(&owner).await,
            None => Ok(None),
        }
    }

    pub async fn insert(&self, document: &T) -> Result<T, RepoError> {
        let command = MutationCommand::Insert(DocumentInsert {
            schema: self.payload.clone(),
            entity_id: document.id().to_string(),
            document: serde_json::to_value(document)?,
        });
        let mut response = self.store.execute(&command).await?;
        decode(take_document(&mut response, "document")?)
    }

    /// Returns the document already holding `unique_field`'s value, or inserts `document`.
    pub async fn get_or_create(&self, unique_field: &str, document: &T) -> Result<GetOrCreateResult<T>, RepoError> {
        let value = serde_json::to_value(document)?;
        let lookup_key = value
            .as_object()
            .map(|doc| self.payload.unique_claims(doc))
            .unwrap_or_default()
            .into_iter()
            .find(|claim| claim.field == unique_field)
            .map(|claim| claim.key)
            .ok_or_else(|| RepoError::InvalidRequest {
                message: format!("{} has no unique value for `{unique_field}`", T::COLLECTION),
            })?;

        let command = MutationCommand::GetOrCreate(DocumentGetOrCreate {
            schema: self.payload.clone(),
            entity_id: document.id().to_string(),
            lookup_key,
            document: value,
        });
        let mut response = self.store.execute(&command).await?;
        let created = response.get("created").and_then(Value::as_bool).unwrap_or(false);
        let document = decode(take_document(&mut response, "document")?)?;
        Ok(if created {
            GetOrCreateResult::Created(document)
        } else {
            GetOrCreateResult::Found(document)
        })
    }

    pub async fn patch(&self, entity_id: &str, patch: Patch) -> Result<PatchOutcome<T>, RepoError> {
        if let Some(err) = patch.error {
            return Err(RepoError::Serialization(err));
        }
        if let Some(operation) = patch
            .operations
            .iter()
            .find(|operation| self.schema.unique.iter().any(|spec| spec.field == operation.field()))
        {
            return Err(RepoError::InvalidRequest {
                message: format!("unique field `{}` cannot be patched", operation.field()),
            });
        }

        let command = MutationCommand::Patch(DocumentPatch {
            schema: self.payload.clone(),
            entity_id: entity_id.to_string(),
            guard: patch.guard,
            operations: patch.operations,
        });
        let mut response = self.store.execute(&command).await?;
        let applied = response.get("applied").and_then(Value::as_bool).unwrap_or(false);
        let document = decode(take_document(&mut response, "document")?)?;
        Ok(PatchOutcome { applied, document })
    }

    /// Removes the document with its claims and index entries; `None` if it was already gone.
    pub async fn delete(&self, entity_id: &str) -> Result<Option<T>, RepoError> {
        let command = MutationCommand::Delete(DocumentDelete {
            schema: self.payload.clone(),
            entity_id: entity_id.to_string(),
        });
        let mut response = self.store.execute(&command).await?;
        if response.get("deleted").and_then(Value::as_bool) != Some(true) {
            return Ok(None);
        }
        Ok(Some(decode(take_document(&mut response, "document")?)?))
    }

    /// Toggles a directed edge between two documents of this collection in one step.
    pub async fn toggle_edge(
        &self,
        source_id: &str,
        target_id: &str,
        forward: (&str, &str),
        reverse: (&str, &str),
    ) -> Result<EdgeOutcome<T>, RepoError> {
        let command = MutationCommand::ToggleEdge(EdgeToggle {
            schema: self.payload.clone(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            forward: EdgeSide {
                field: forward.0.to_string(),
                counter: forward.1.to_string(),
            },
            reverse: EdgeSide {
                field: reverse.0.to_string(),
                counter: reverse.1.to_string(),
            },
        });
        let mut response = self.store.execute(&command).await?;
        let active = response.get("active").and_then(Value::as_bool).unwrap_or(false);
        let source = decode(take_document(&mut response, "source")?)?;
        let target = decode(take_document(&mut response, "target")?)?;
        Ok(EdgeOutcome { active, source, target })
    }

    pub async fn count(&self, query: &IndexQuery) -> Result<u64, RepoError> {
        let key = self.index_key(query)?;
        self.sweep_expired(&key).await?;
        self.store.index_count(&key).await
    }

    /// One page of an index plus its total size.
    pub async fn list(&self, query: &IndexQuery, page: PageRequest, order: SortOrder) -> Result<Page<T>, RepoError> {
        let key = self.index_key(query)?;
        self.sweep_expired(&key).await?;
        let total = self.store.index_count(&key).await?;
        let ids = self
            .store
            .index_range(&key, page.offset(), Some(page.limit), order)
            .await?;
        let items = self.load_indexed(&key, &ids).await?;
        Ok(Page::new(items, page, total))
    }

    pub async fn list_all(&self, query: &IndexQuery, order: SortOrder) -> Result<Vec<T>, RepoError> {
        let key = self.index_key(query)?;
        let ids = self.store.index_range(&key, 0, None, order).await?;
        self.load_indexed(&key, &ids).await
    }

    /// `(id, score)` pairs of an index, ascending by score.
    pub async fn index_entries(&self, query: &IndexQuery) -> Result<Vec<(String, i64)>, RepoError> {
        self.store.index_entries(&self.index_key(query)?).await
    }

    pub async fn scan_all(&self) -> Result<Vec<T>, RepoError> {
        self.list_all(&IndexQuery::All, SortOrder::Asc).await
    }

    /// Removes claims and index entries whose document no longer exists.
    pub async fn prune_dangling(&self) -> Result<PruneReport, RepoError> {
        prune_collection(&self.store, &self.payload).await
    }

    /// Drops members of `index_key` whose document has expired, so counts only see live documents.
    /// Collections without an expiry field never leave such members behind.
    async fn sweep_expired(&self, index_key: &str) -> Result<u64, RepoError> {
        if self.schema.expires_field.is_none() {
            return Ok(0);
        }
        let ids: Vec<String> = self
            .store
            .index_entries(index_key)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let keys: Vec<String> = ids.iter().map(|id| self.entity_key(id)).collect();
        let documents = self.store.fetch_many(&keys).await?;
        let gone: Vec<String> = ids
            .into_iter()
            .zip(documents)
            .filter(|(_, document)| document.is_none())
            .map(|(id, _)| id)
            .collect();
        if gone.is_empty() {
            return Ok(0);
        }
        log::debug!("sweeping {} expired entries from {index_key}", gone.len());
        self.store.index_remove(index_key, &gone).await
    }

    /// Loads the ids read from `index_key`, dropping entries whose document expired.
    async fn load_indexed(&self, index_key: &str, ids: &[String]) -> Result<Vec<T>, RepoError> {
        let keys: Vec<String> = ids.iter().map(|id| self.entity_key(id)).collect();
        let raw = self.store.fetch_many(&keys).await?;
        let mut items = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for (id, json) in ids.iter().zip(raw) {
            match json {
                Some(json) => items.push(serde_json::from_str(&json)?),
                None => missing.push(id.clone()),
            }
        }
        if !missing.is_empty() {
            log::debug!("dropping {} dangling entries from {index_key}", missing.len());
            self.store.index_remove(index_key, &missing).await?;
        }
        Ok(items)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub index_entries: u64,
    pub unique_claims: u64,
}

/// Sweeps one collection for index entries and unique claims left behind by expired documents.
pub async fn prune_collection<S: DocumentStore>(store: &S, schema: &SchemaPayload) -> Result<PruneReport, RepoError> {
    let mut report = PruneReport::default();

    let index_keys = store.scan_keys(&format!("{}:idx:*", schema.key_prefix)).await?;
    for index_key in index_keys {
        let ids: Vec<String> = store
            .index_entries(&index_key)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        if ids.is_empty() {
            continue;
        }
        let keys: Vec<String> = ids.iter().map(|id| schema.entity_key(id)).collect();
        let documents = store.fetch_many(&keys).await?;
        let missing: Vec<String> = ids
            .into_iter()
            .zip(documents)
            .filter(|(_, document)| document.is_none())
            .map(|(id, _)| id)
            .collect();
        report.index_entries += store.index_remove(&index_key, &missing).await?;
    }

    let claim_keys = store.scan_keys(&format!("{}:unique:*", schema.key_prefix)).await?;
    let mut stale = Vec::new();
    for claim_key in claim_keys {
        if let Some(owner) = store.fetch(&claim_key).await?
            && store.fetch(&schema.entity_key(&owner)).await?.is_none()
        {
            stale.push(claim_key);
        }
    }
    report.unique_claims = store.delete_keys(&stale).await?;

    Ok(report)
}
