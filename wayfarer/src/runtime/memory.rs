use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};

use crate::{
    errors::RepoError,
    runtime::{
        commands::{MutationCommand, SchemaPayload},
        executor::{DocumentStore, interpret_response},
    },
    types::SortOrder,
};

/// In-process [`DocumentStore`] with the same key layout and atomicity as the Redis one.
///
/// Every command runs inside a single critical section. Expiry is lazy: a key
/// past its deadline is dropped the next time anything touches it.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live string keys (documents and unique claims).
    pub fn key_count(&self) -> usize {
        let mut state = self.state.lock();
        state.evict_expired();
        state.strings.len()
    }
}

#[derive(Default)]
struct SortedSet {
    scores: HashMap<String, i64>,
    ordered: BTreeSet<(i64, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: i64) {
        if let Some(previous) = self.scores.insert(member.to_string(), score) {
            self.ordered.remove(&(previous, member.to_string()));
        }
        self.ordered.insert((score, member.to_string()));
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(score, member.to_string()));
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
struct State {
    strings: HashMap<String, String>,
    sorted_sets: HashMap<String, SortedSet>,
    expiry: HashMap<String, i64>,
}

impl State {
    fn is_expired(&self, key: &str) -> bool {
        self.expiry
            .get(key)
            .is_some_and(|deadline| *deadline <= Utc::now().timestamp_millis())
    }

    fn evict_expired(&mut self) {
        let now = Utc::now().timestamp_millis();
        let expired: Vec<String> = self
            .expiry
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        self.expiry.remove(key);
        self.strings.remove(key).is_some() | self.sorted_sets.remove(key).is_some()
    }

    fn get(&mut self, key: &str) -> Option<String> {
        if self.is_expired(key) {
            self.remove(key);
            return None;
        }
        self.strings.get(key).cloned()
    }

    fn exists(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn load_document(&mut self, key: &str) -> Result<Option<Map<String, Value>>, RepoError> {
        match self.get(key) {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn zadd(&mut self, key: &str, member: &str, score: i64) {
        self.sorted_sets.entry(key.to_string()).or_default().insert(member, score);
    }

    fn zrem(&mut self, key: &str, member: &str) -> bool {
        let Some(set) = self.sorted_sets.get_mut(key) else {
            return false;
        };
        let removed = set.remove(member);
        if set.scores.is_empty() {
            self.sorted_sets.remove(key);
        }
        removed
    }

    fn reindex(&mut self, id: &str, old_keys: &BTreeSet<String>, new_keys: &BTreeSet<String>, score: i64) {
        for key in old_keys.difference(new_keys) {
            self.zrem(key, id);
        }
        for key in new_keys.difference(old_keys) {
            self.zadd(key, id, score);
        }
    }

    /// Writes a modified document back (TTL untouched) and moves its index entries.
    fn store_document(
        &mut self,
        schema: &SchemaPayload,
        id: &str,
        old_keys: &BTreeSet<String>,
        doc: &Map<String, Value>,
    ) -> Result<(), RepoError> {
        self.strings
            .insert(schema.entity_key(id), serde_json::to_string(doc)?);
        let new_keys = schema.index_keys(doc);
        self.reindex(id, old_keys, &new_keys, schema.score(doc));
        Ok(())
    }

    /// Returns the failure response, or `None` once everything is written.
    fn insert_document(&mut self, schema: &SchemaPayload, id: &str, document: &Value) -> Result<Option<Value>, RepoError> {
        let key = schema.entity_key(id);
        if self.exists(&key) {
            return Ok(Some(json!({"error": "document_exists", "entity_id": id})));
        }
        let Some(doc) = document.as_object() else {
            return Ok(Some(json!({"error": "invalid_request", "message": "document must be an object"})));
        };

        let claims = schema.unique_claims(doc);
        for claim in &claims {
            if let Some(owner) = self.get(&claim.key)
                && owner != id
                && self.exists(&schema.entity_key(&owner))
            {
                return Ok(Some(json!({
                    "error": "unique_constraint_violation",
                    "fields": [claim.field],
                    "existing_entity_id": owner,
                })));
            }
        }
        for claim in &claims {
            self.strings.insert(claim.key.clone(), id.to_string());
        }

        self.strings.insert(key.clone(), serde_json::to_string(doc)?);
        match schema.expires_at(doc) {
            Some(deadline) => {
                self.expiry.insert(key, deadline);
            }
            None => {
                self.expiry.remove(&key);
            }
        }
        let score = schema.score(doc);
        self.zadd(&schema.all_key(), id, score);
        self.reindex(id, &BTreeSet::new(), &schema.index_keys(doc), score);
        Ok(None)
    }

    fn run(&mut self, command: &MutationCommand) -> Result<Value, RepoError> {
        match command {
            MutationCommand::Insert(insert) => {
                if let Some(failure) = self.insert_document(&insert.schema, &insert.entity_id, &insert.document)? {
                    return Ok(failure);
                }
                Ok(json!({"document": insert.document}))
            }
            MutationCommand::GetOrCreate(request) => {
                if let Some(owner) = self.get(&request.lookup_key)
                    && let Some(existing) = self.load_document(&request.schema.entity_key(&owner))?
                {
                    return Ok(json!({"created": false, "document": existing}));
                }
                if let Some(failure) = self.insert_document(&request.schema, &request.entity_id, &request.document)? {
                    return Ok(failure);
                }
                Ok(json!({"created": true, "document": request.document}))
            }
            MutationCommand::Patch(patch) => {
                let schema = &patch.schema;
                let Some(mut doc) = self.load_document(&schema.entity_key(&patch.entity_id))? else {
                    return Ok(json!({"error": "entity_not_found", "entity_id": patch.entity_id}));
                };
                if let Some(guard) = &patch.guard
                    && !guard.matches(&doc)
                {
                    return Ok(json!({"applied": false, "document": doc}));
                }
                let old_keys = schema.index_keys(&doc);
                for operation in &patch.operations {
                    operation.apply(&mut doc);
                }
                self.store_document(schema, &patch.entity_id, &old_keys, &doc)?;
                Ok(json!({"applied": true, "document": doc}))
            }
            MutationCommand::Delete(delete) => {
                let schema = &delete.schema;
                let id = delete.entity_id.as_str();
                let key = schema.entity_key(id);
                let Some(doc) = self.load_document(&key)? else {
                    return Ok(json!({"deleted": false}));
                };
                for claim in schema.unique_claims(&doc) {
                    if self.get(&claim.key).as_deref() == Some(id) {
                        self.remove(&claim.key);
                    }
                }
                self.reindex(id, &schema.index_keys(&doc), &BTreeSet::new(), 0);
                self.zrem(&schema.all_key(), id);
                self.remove(&key);
                Ok(json!({"deleted": true, "document": doc}))
            }
            MutationCommand::ToggleEdge(toggle) => {
                if toggle.source_id == toggle.target_id {
                    return Ok(json!({"error": "invalid_request", "message": "an edge needs two distinct documents"}));
                }
                let schema = &toggle.schema;
                let Some(mut source) = self.load_document(&schema.entity_key(&toggle.source_id))? else {
                    return Ok(json!({"error": "entity_not_found", "entity_id": toggle.source_id}));
                };
                let Some(mut target) = self.load_document(&schema.entity_key(&toggle.target_id))? else {
                    return Ok(json!({"error": "entity_not_found", "entity_id": toggle.target_id}));
                };
                let source_keys = schema.index_keys(&source);
                let target_keys = schema.index_keys(&target);
                let active = toggle.apply(&mut source, &mut target);
                self.store_document(schema, &toggle.source_id, &source_keys, &source)?;
                self.store_document(schema, &toggle.target_id, &target_keys, &target)?;
                Ok(json!({"active": active, "source": source, "target": target}))
            }
        }
    }
}

/// `*`-only glob, enough for the `{prefix}:{collection}:*` patterns used here.
fn glob_match(pattern: &str, key: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return key.is_empty();
    };
    let Some(mut rest) = key.strip_prefix(first) else {
        return false;
    };
    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(position) => rest = &rest[position + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

impl DocumentStore for MemoryStore {
    async fn execute(&self, command: &MutationCommand) -> Result<Value, RepoError> {
        log::debug!("running {} command in memory", command.name());
        let response = self.state.lock().run(command)?;
        interpret_response(response)
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, RepoError> {
        Ok(self.state.lock().get(key))
    }

    async fn fetch_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, RepoError> {
        let mut state = self.state.lock();
        Ok(keys.iter().map(|key| state.get(key)).collect())
    }

    async fn index_range(
        &self,
        key: &str,
        offset: u64,
        limit: Option<u64>,
        order: SortOrder,
    ) -> Result<Vec<String>, RepoError> {
        let state = self.state.lock();
        let Some(set) = state.sorted_sets.get(key) else {
            return Ok(Vec::new());
        };
        let take = limit.map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(usize::MAX));
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let members: Box<dyn Iterator<Item = &(i64, String)>> = match order {
            SortOrder::Asc => Box::new(set.ordered.iter()),
            SortOrder::Desc => Box::new(set.ordered.iter().rev()),
        };
        Ok(members
            .skip(skip)
            .take(take)
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn index_entries(&self, key: &str) -> Result<Vec<(String, i64)>, RepoError> {
        let state = self.state.lock();
        Ok(state
            .sorted_sets
            .get(key)
            .map(|set| {
                set.ordered
                    .iter()
                    .map(|(score, member)| (member.clone(), *score))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn index_count(&self, key: &str) -> Result<u64, RepoError> {
        let state = self.state.lock();
        Ok(state.sorted_sets.get(key).map_or(0, |set| set.scores.len() as u64))
    }

    async fn index_remove(&self, key: &str, members: &[String]) -> Result<u64, RepoError> {
        let mut state = self.state.lock();
        Ok(members.iter().filter(|member| state.zrem(key, member)).count() as u64)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, RepoError> {
        let mut state = self.state.lock();
        state.evict_expired();
        let mut keys: Vec<String> = state
            .strings
            .keys()
            .chain(state.sorted_sets.keys())
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<u64, RepoError> {
        let mut state = self.state.lock();
        Ok(keys.iter().filter(|key| state.remove(key)).count() as u64)
    }
}
