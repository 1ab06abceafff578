use std::borrow::Cow;

use redis::aio::ConnectionManager;
use serde_json::Value;

use crate::{
    errors::RepoError,
    runtime::{
        commands::MutationCommand,
        scripts::{
            DOCUMENT_DELETE_SCRIPT, DOCUMENT_GET_OR_CREATE_SCRIPT, DOCUMENT_INSERT_SCRIPT, DOCUMENT_PATCH_SCRIPT,
            EDGE_TOGGLE_SCRIPT,
        },
    },
    types::SortOrder,
};

/// Storage backend for documents, claims and sorted-set indexes.
///
/// Reads are plain key lookups; every write goes through [`DocumentStore::execute`]
/// as one atomic [`MutationCommand`].
#[allow(async_fn_in_trait)]
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Runs one mutation atomically and returns the decoded response.
    async fn execute(&self, command: &MutationCommand) -> Result<Value, RepoError>;

    async fn fetch(&self, key: &str) -> Result<Option<String>, RepoError>;

    async fn fetch_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, RepoError>;

    /// Members of a sorted set by score; `limit: None` reads to the end.
    async fn index_range(
        &self,
        key: &str,
        offset: u64,
        limit: Option<u64>,
        order: SortOrder,
    ) -> Result<Vec<String>, RepoError>;

    /// Every `(member, score)` pair, ascending.
    async fn index_entries(&self, key: &str) -> Result<Vec<(String, i64)>, RepoError>;

    async fn index_count(&self, key: &str) -> Result<u64, RepoError>;

    async fn index_remove(&self, key: &str, members: &[String]) -> Result<u64, RepoError>;

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, RepoError>;

    async fn delete_keys(&self, keys: &[String]) -> Result<u64, RepoError>;
}

/// Maps the `{ "error": ... }` responses shared by all scripts onto [`RepoError`].
pub fn interpret_response(value: Value) -> Result<Value, RepoError> {
    let Some(error) = value.get("error") else {
        return Ok(value);
    };
    let Some(code) = error.as_str() else {
        return Err(RepoError::Other {
            message: Cow::Borrowed("lua_error"),
        });
    };
    let entity_id = || value.get("entity_id").and_then(|v| v.as_str()).map(|s| s.to_string());
    match code {
        "entity_not_found" => Err(RepoError::NotFound {
            entity_id: entity_id(),
        }),
        "unique_constraint_violation" => {
            let fields = value
                .get("fields")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            let existing_entity_id = value
                .get("existing_entity_id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_default();
            Err(RepoError::UniqueConstraintViolation {
                fields,
                existing_entity_id,
            })
        }
        "document_exists" => Err(RepoError::InvalidRequest {
            message: format!("document '{}' already exists", entity_id().unwrap_or_default()),
        }),
        "invalid_request" => Err(RepoError::InvalidRequest {
            message: value
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("invalid request")
                .to_string(),
        }),
        other => Err(RepoError::Other {
            message: Cow::Owned(other.to_string()),
        }),
    }
}

/// Redis-backed store: documents as JSON strings, mutations as Lua scripts.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub async fn connect(url: &str) -> Result<Self, RepoError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self::new(connection))
    }

    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

impl DocumentStore for RedisStore {
    async fn execute(&self, command: &MutationCommand) -> Result<Value, RepoError> {
        let script = match command {
            MutationCommand::Insert(_) => &*DOCUMENT_INSERT_SCRIPT,
            MutationCommand::Patch(_) => &*DOCUMENT_PATCH_SCRIPT,
            MutationCommand::Delete(_) => &*DOCUMENT_DELETE_SCRIPT,
            MutationCommand::GetOrCreate(_) => &*DOCUMENT_GET_OR_CREATE_SCRIPT,
            MutationCommand::ToggleEdge(_) => &*EDGE_TOGGLE_SCRIPT,
        };

        let payload = command.payload_json().map_err(|err| RepoError::Other {
            message: Cow::Owned(format!("failed to serialize command: {err}")),
        })?;
        log::debug!("running {} script", command.name());

        let mut conn = self.connection.clone();
        let mut invocation = script.prepare_invoke();
        invocation.arg(payload);
        let raw: String = invocation.invoke_async(&mut conn).await.map_err(RepoError::from)?;

        let value: Value = serde_json::from_str(&raw).map_err(|err| RepoError::Other {
            message: Cow::Owned(format!("failed to parse lua response: {err}")),
        })?;
        interpret_response(value)
    }

    async fn fetch(&self, key: &str) -> Result<Option<String>, RepoError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn fetch_many(&self, keys: &[String]) -> Result<Vec<Option<String>>, RepoError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn index_range(
        &self,
        key: &str,
        offset: u64,
        limit: Option<u64>,
        order: SortOrder,
    ) -> Result<Vec<String>, RepoError> {
        let start = i64::try_from(offset).unwrap_or(i64::MAX);
        let stop = match limit {
            Some(0) => return Ok(Vec::new()),
            Some(limit) => i64::try_from(offset.saturating_add(limit - 1)).unwrap_or(i64::MAX),
            None => -1,
        };
        let command = match order {
            SortOrder::Asc => "ZRANGE",
            SortOrder::Desc => "ZREVRANGE",
        };
        let mut conn = self.connection.clone();
        let members: Vec<String> = redis::cmd(command)
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    async fn index_entries(&self, key: &str) -> Result<Vec<(String, i64)>, RepoError> {
        let mut conn = self.connection.clone();
        let entries: Vec<(String, f64)> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;
        Ok(entries
            .into_iter()
            .map(|(member, score)| (member, score as i64))
            .collect())
    }

    async fn index_count(&self, key: &str) -> Result<u64, RepoError> {
        let mut conn = self.connection.clone();
        let count: u64 = redis::cmd("ZCARD").arg(key).query_async(&mut conn).await?;
        Ok(count)
    }

    async fn index_remove(&self, key: &str, members: &[String]) -> Result<u64, RepoError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let removed: u64 = redis::cmd("ZREM").arg(key).arg(members).query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, RepoError> {
        const SCAN_COUNT: usize = 1000;
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            found.extend(keys);

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        found.sort();
        found.dedup();
        Ok(found)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<u64, RepoError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let deleted: u64 = redis::cmd("DEL").arg(keys).query_async(&mut conn).await?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn passes_successful_responses_through() {
        let value = json!({"applied": true, "document": {"id": "a"}});
        assert_eq!(interpret_response(value.clone()).unwrap(), value);
    }

    #[test]
    fn maps_script_errors() {
        let err = interpret_response(json!({"error": "entity_not_found", "entity_id": "p1"})).unwrap_err();
        assert!(matches!(err, RepoError::NotFound { entity_id: Some(id) } if id == "p1"));

        let err = interpret_response(json!({
            "error": "unique_constraint_violation",
            "fields": ["email"],
            "existing_entity_id": "u1"
        }))
        .unwrap_err();
        match err {
            RepoError::UniqueConstraintViolation {
                fields,
                existing_entity_id,
            } => {
                assert_eq!(fields, vec!["email"]);
                assert_eq!(existing_entity_id, "u1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
