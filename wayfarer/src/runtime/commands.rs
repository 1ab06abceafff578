use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    keys::{ALL_INDEX, KeyContext, NULL_COMPONENT},
    types::DocumentSchema,
};

/// A single atomic store mutation.
///
/// Each variant maps onto one Lua script in Redis and one critical section in
/// the in-process store; either way the whole command commits or nothing does.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationCommand {
    Insert(DocumentInsert),
    Patch(DocumentPatch),
    Delete(DocumentDelete),
    GetOrCreate(DocumentGetOrCreate),
    ToggleEdge(EdgeToggle),
}

impl MutationCommand {
    pub fn name(&self) -> &'static str {
        match self {
            MutationCommand::Insert(_) => "insert",
            MutationCommand::Patch(_) => "patch",
            MutationCommand::Delete(_) => "delete",
            MutationCommand::GetOrCreate(_) => "get_or_create",
            MutationCommand::ToggleEdge(_) => "toggle_edge",
        }
    }

    /// JSON handed to the script as `ARGV[1]`.
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            MutationCommand::Insert(inner) => serde_json::to_string(inner),
            MutationCommand::Patch(inner) => serde_json::to_string(inner),
            MutationCommand::Delete(inner) => serde_json::to_string(inner),
            MutationCommand::GetOrCreate(inner) => serde_json::to_string(inner),
            MutationCommand::ToggleEdge(inner) => serde_json::to_string(inner),
        }
    }
}

/// Key layout and indexing rules of one collection, in the form the scripts consume.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaPayload {
    /// `{prefix}:{collection}`
    pub key_prefix: String,
    pub score_field: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unique: Vec<UniquePayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden_when: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_field: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UniquePayload {
    pub field: String,
    pub case_insensitive: bool,
}

/// A unique value claimed by a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueClaim {
    pub field: String,
    pub key: String,
}

impl SchemaPayload {
    pub fn from_schema(schema: &DocumentSchema, keys: &KeyContext<'_>) -> Self {
        Self {
            key_prefix: keys.collection(schema.collection),
            score_field: schema.score_field.to_string(),
            unique: schema
                .unique
                .iter()
                .map(|spec| UniquePayload {
                    field: spec.field.to_string(),
                    case_insensitive: spec.case_insensitive,
                })
                .collect(),
            indexes: schema
                .indexes
                .iter()
                .map(|index| index.fields.iter().map(|field| field.to_string()).collect())
                .collect(),
            hidden_when: schema.hidden_when.map(str::to_string),
            expires_field: schema.expires_field.map(str::to_string),
        }
    }

    pub fn entity_key(&self, entity_id: &str) -> String {
        format!("{}:{}", self.key_prefix, entity_id)
    }

    pub fn all_key(&self) -> String {
        format!("{}:idx:{}", self.key_prefix, ALL_INDEX)
    }

    pub fn unique_key(&self, field: &str, value: &str) -> String {
        format!("{}:unique:{}:{}", self.key_prefix, field, value)
    }

    pub fn is_hidden(&self, doc: &Map<String, Value>) -> bool {
        self.hidden_when
            .as_deref()
            .is_some_and(|flag| doc.get(flag) == Some(&Value::Bool(true)))
    }

    /// Secondary index keys the document belongs to. Excludes the collection index.
    pub fn index_keys(&self, doc: &Map<String, Value>) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        if self.is_hidden(doc) {
            return keys;
        }
        for fields in &self.indexes {
            let name = fields.join("+");
            if let [field] = fields.as_slice()
                && let Some(Value::Array(elements)) = doc.get(field)
            {
                for element in elements {
                    if element.is_null() {
                        continue;
                    }
                    if let Some(component) = encode_component(element) {
                        keys.insert(format!("{}:idx:{}:{}", self.key_prefix, name, component));
                    }
                }
                continue;
            }

            let mut parts = Vec::with_capacity(fields.len());
            let mut present = false;
            for field in fields {
                let value = doc.get(field).unwrap_or(&Value::Null);
                match encode_component(value) {
                    Some(component) => {
                        present |= !value.is_null();
                        parts.push(component);
                    }
                    None => {
                        parts.clear();
                        break;
                    }
                }
            }
            if present && parts.len() == fields.len() {
                keys.insert(format!("{}:idx:{}:{}", self.key_prefix, name, parts.join(":")));
            }
        }
        keys
    }

    pub fn unique_claims(&self, doc: &Map<String, Value>) -> Vec<UniqueClaim> {
        self.unique
            .iter()
            .filter_map(|spec| {
                let value = doc.get(&spec.field)?.as_str()?;
                let value = if spec.case_insensitive {
                    value.to_ascii_lowercase()
                } else {
                    value.to_string()
                };
                Some(UniqueClaim {
                    field: spec.field.clone(),
                    key: self.unique_key(&spec.field, &value),
                })
            })
            .collect()
    }

    pub fn score(&self, doc: &Map<String, Value>) -> i64 {
        doc.get(&self.score_field).and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn expires_at(&self, doc: &Map<String, Value>) -> Option<i64> {
        self.expires_field
            .as_deref()
            .and_then(|field| doc.get(field))
            .and_then(Value::as_i64)
    }
}

/// Encodes a scalar as an index key component; `None` for arrays and objects.
pub fn encode_component(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(NULL_COMPONENT.to_string()),
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentInsert {
    pub schema: SchemaPayload,
    pub entity_id: String,
    pub document: Value,
}

#[derive(Debug, Serialize)]
pub struct DocumentPatch {
    pub schema: SchemaPayload,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guard: Option<PatchGuard>,
    pub operations: Vec<PatchOperation>,
}

#[derive(Debug, Serialize)]
pub struct DocumentDelete {
    pub schema: SchemaPayload,
    pub entity_id: String,
}

/// Returns the document owning `lookup_key` or inserts `document` in the same step.
#[derive(Debug, Serialize)]
pub struct DocumentGetOrCreate {
    pub schema: SchemaPayload,
    pub entity_id: String,
    pub lookup_key: String,
    pub document: Value,
}

/// Flips a directed edge recorded on both endpoints of the same collection.
#[derive(Debug, Serialize)]
pub struct EdgeToggle {
    pub schema: SchemaPayload,
    pub source_id: String,
    pub target_id: String,
    /// Set on the source holding target ids (e.g. `following`).
    pub forward: EdgeSide,
    /// Set on the target holding source ids (e.g. `followers`).
    pub reverse: EdgeSide,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeSide {
    pub field: String,
    pub counter: String,
}

impl EdgeToggle {
    /// Applies the toggle to both documents, returning whether the edge now exists.
    pub fn apply(&self, source: &mut Map<String, Value>, target: &mut Map<String, Value>) -> bool {
        let active = !contains(source, &self.forward.field, &self.target_id);
        let delta = if active { 1 } else { -1 };
        set_membership(source, &self.forward.field, &self.target_id, active);
        bump(source, &self.forward.counter, delta);
        set_membership(target, &self.reverse.field, &self.source_id, active);
        bump(target, &self.reverse.counter, delta);
        active
    }
}

/// Precondition checked inside the atomic step; a failing guard leaves the document untouched.
#[derive(Debug, Clone, Serialize)]
pub struct PatchGuard {
    pub field: String,
    pub equals: Value,
}

impl PatchGuard {
    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        doc.get(&self.field).unwrap_or(&Value::Null) == &self.equals
    }
}

/// Field-level edits applied in order within one patch. Counters never drop below zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOperation {
    Assign {
        field: String,
        value: Value,
    },
    Increment {
        field: String,
        delta: i64,
    },
    AddToSet {
        field: String,
        member: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        counter: Option<String>,
    },
    RemoveFromSet {
        field: String,
        member: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        counter: Option<String>,
    },
    /// Flips membership; joining also leaves the `exclusive_with` set.
    ToggleMember {
        field: String,
        counter: String,
        member: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exclusive_with: Option<ExclusiveSetPayload>,
    },
    /// Pushes onto an array unless an element already shares `unique_by`.
    Append {
        field: String,
        value: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        unique_by: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        counter: Option<String>,
    },
    MapIncrement {
        field: String,
        key: String,
        delta: i64,
    },
    MapAssign {
        field: String,
        key: String,
        value: Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusiveSetPayload {
    pub field: String,
    pub counter: String,
}

impl PatchOperation {
    /// Field written by this operation.
    pub fn field(&self) -> &str {
        match self {
            PatchOperation::Assign { field, .. }
            | PatchOperation::Increment { field, .. }
            | PatchOperation::AddToSet { field, .. }
            | PatchOperation::RemoveFromSet { field, .. }
            | PatchOperation::ToggleMember { field, .. }
            | PatchOperation::Append { field, .. }
            | PatchOperation::MapIncrement { field, .. }
            | PatchOperation::MapAssign { field, .. } => field,
        }
    }

    pub fn apply(&self, doc: &mut Map<String, Value>) {
        match self {
            PatchOperation::Assign { field, value } => {
                doc.insert(field.clone(), value.clone());
            }
            PatchOperation::Increment { field, delta } => bump(doc, field, *delta),
            PatchOperation::AddToSet { field, member, counter } => {
                if !contains(doc, field, member) {
                    set_membership(doc, field, member, true);
                    if let Some(counter) = counter {
                        bump(doc, counter, 1);
                    }
                }
            }
            PatchOperation::RemoveFromSet { field, member, counter } => {
                if contains(doc, field, member) {
                    set_membership(doc, field, member, false);
                    if let Some(counter) = counter {
                        bump(doc, counter, -1);
                    }
                }
            }
            PatchOperation::ToggleMember {
                field,
                counter,
                member,
                exclusive_with,
            } => {
                if contains(doc, field, member) {
                    set_membership(doc, field, member, false);
                    bump(doc, counter, -1);
                } else {
                    set_membership(doc, field, member, true);
                    bump(doc, counter, 1);
                    if let Some(other) = exclusive_with
                        && contains(doc, &other.field, member)
                    {
                        set_membership(doc, &other.field, member, false);
                        bump(doc, &other.counter, -1);
                    }
                }
            }
            PatchOperation::Append {
                field,
                value,
                unique_by,
                counter,
            } => {
                let mut items = take_array(doc, field);
                let duplicate = unique_by.as_deref().is_some_and(|key| {
                    let needle = value.get(key);
                    items.iter().any(|item| item.get(key) == needle)
                });
                if !duplicate {
                    items.push(value.clone());
                }
                doc.insert(field.clone(), Value::Array(items));
                if !duplicate && let Some(counter) = counter {
                    bump(doc, counter, 1);
                }
            }
            PatchOperation::MapIncrement { field, key, delta } => {
                let mut map = take_object(doc, field);
                let current = map.get(key).and_then(Value::as_i64).unwrap_or(0);
                map.insert(key.clone(), Value::from((current + delta).max(0)));
                doc.insert(field.clone(), Value::Object(map));
            }
            PatchOperation::MapAssign { field, key, value } => {
                let mut map = take_object(doc, field);
                map.insert(key.clone(), value.clone());
                doc.insert(field.clone(), Value::Object(map));
            }
        }
    }
}

fn contains(doc: &Map<String, Value>, field: &str, member: &str) -> bool {
    match doc.get(field) {
        Some(Value::Array(items)) => items.iter().any(|item| item.as_str() == Some(member)),
        _ => false,
    }
}

fn set_membership(doc: &mut Map<String, Value>, field: &str, member: &str, present: bool) {
    let mut items = take_array(doc, field);
    if present {
        if !items.iter().any(|item| item.as_str() == Some(member)) {
            items.push(Value::String(member.to_string()));
        }
    } else {
        items.retain(|item| item.as_str() != Some(member));
    }
    doc.insert(field.to_string(), Value::Array(items));
}

fn bump(doc: &mut Map<String, Value>, counter: &str, delta: i64) {
    let current = doc.get(counter).and_then(Value::as_i64).unwrap_or(0);
    doc.insert(counter.to_string(), Value::from((current + delta).max(0)));
}

/// Removes the array at `field`; null, missing and empty-object (`{}` from cjson) values yield an empty one.
fn take_array(doc: &mut Map<String, Value>, field: &str) -> Vec<Value> {
    match doc.remove(field) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn take_object(doc: &mut Map<String, Value>, field: &str) -> Map<String, Value> {
    match doc.remove(field) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{IndexSpec, UniqueSpec};

    fn schema() -> SchemaPayload {
        let schema = DocumentSchema {
            collection: "comments",
            score_field: "created_at",
            unique: vec![UniqueSpec {
                field: "slug",
                case_insensitive: true,
            }],
            indexes: vec![
                IndexSpec {
                    fields: vec!["parent_comment"],
                },
                IndexSpec {
                    fields: vec!["post", "parent_comment"],
                },
                IndexSpec { fields: vec!["tags"] },
            ],
            hidden_when: Some("is_deleted"),
            expires_field: None,
        };
        SchemaPayload::from_schema(&schema, &KeyContext::new("wf"))
    }

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn index_keys_skip_all_null_entries_and_fan_out_arrays() {
        let root = doc(json!({"post": "p1", "parent_comment": null, "tags": ["a", "b"], "is_deleted": false}));
        let keys: Vec<_> = schema().index_keys(&root).into_iter().collect();
        assert_eq!(
            keys,
            vec![
                "wf:comments:idx:post+parent_comment:p1:~",
                "wf:comments:idx:tags:a",
                "wf:comments:idx:tags:b",
            ]
        );
    }

    #[test]
    fn hidden_documents_leave_secondary_indexes() {
        let deleted = doc(json!({"post": "p1", "parent_comment": "c1", "is_deleted": true}));
        assert!(schema().index_keys(&deleted).is_empty());
    }

    #[test]
    fn unique_claims_lowercase_case_insensitive_values() {
        let claims = schema().unique_claims(&doc(json!({"slug": "Hello"})));
        assert_eq!(claims[0].key, "wf:comments:unique:slug:hello");
    }

    #[test]
    fn toggle_member_respects_exclusive_set() {
        let mut post = doc(json!({"likes": {}, "dislikes": ["u1"], "likes_count": 0, "dislikes_count": 1}));
        let like = PatchOperation::ToggleMember {
            field: "likes".into(),
            counter: "likes_count".into(),
            member: "u1".into(),
            exclusive_with: Some(ExclusiveSetPayload {
                field: "dislikes".into(),
                counter: "dislikes_count".into(),
            }),
        };
        like.apply(&mut post);
        assert_eq!(post["likes"], json!(["u1"]));
        assert_eq!(post["dislikes"], json!([]));
        assert_eq!(post["likes_count"], json!(1));
        assert_eq!(post["dislikes_count"], json!(0));

        like.apply(&mut post);
        assert_eq!(post["likes"], json!([]));
        assert_eq!(post["likes_count"], json!(0));
    }

    #[test]
    fn counters_clamp_at_zero() {
        let mut post = doc(json!({"views_count": 0}));
        PatchOperation::Increment {
            field: "views_count".into(),
            delta: -3,
        }
        .apply(&mut post);
        assert_eq!(post["views_count"], json!(0));
    }

    #[test]
    fn append_with_unique_key_is_idempotent() {
        let mut story = doc(json!({"viewers": [], "views_count": 0}));
        let view = PatchOperation::Append {
            field: "viewers".into(),
            value: json!({"user": "u2", "viewed_at": 1}),
            unique_by: Some("user".into()),
            counter: Some("views_count".into()),
        };
        view.apply(&mut story);
        view.apply(&mut story);
        assert_eq!(story["viewers"].as_array().map(Vec::len), Some(1));
        assert_eq!(story["views_count"], json!(1));
    }

    #[test]
    fn edge_toggle_updates_both_sides() {
        let toggle = EdgeToggle {
            schema: schema(),
            source_id: "a".into(),
            target_id: "b".into(),
            forward: EdgeSide {
                field: "following".into(),
                counter: "following_count".into(),
            },
            reverse: EdgeSide {
                field: "followers".into(),
                counter: "followers_count".into(),
            },
        };
        let mut a = doc(json!({"following": [], "following_count": 0}));
        let mut b = doc(json!({"followers": {}, "followers_count": 0}));
        assert!(toggle.apply(&mut a, &mut b));
        assert_eq!(b["followers"], json!(["a"]));
        assert_eq!(a["following_count"], json!(1));
        assert!(!toggle.apply(&mut a, &mut b));
        assert_eq!(a["following"], json!([]));
        assert_eq!(b["followers_count"], json!(0));
    }

    #[test]
    fn map_increment_clamps_and_initialises() {
        let mut chat = doc(json!({"unread_counts": []}));
        let op = |delta| PatchOperation::MapIncrement {
            field: "unread_counts".into(),
            key: "u1".into(),
            delta,
        };
        op(1).apply(&mut chat);
        op(1).apply(&mut chat);
        assert_eq!(chat["unread_counts"], json!({"u1": 2}));
        op(-5).apply(&mut chat);
        assert_eq!(chat["unread_counts"], json!({"u1": 0}));
    }
}
