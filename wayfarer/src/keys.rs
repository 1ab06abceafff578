/// Common key-construction helpers used across Wayfarer.
///
/// Layout:
/// - documents: `{prefix}:{collection}:{id}`
/// - unique claims: `{prefix}:{collection}:unique:{field}:{value}`
/// - secondary indexes: `{prefix}:{collection}:idx:{field+field}:{value:value}`
/// - collection index: `{prefix}:{collection}:idx:_all`
#[derive(Debug, Clone)]
pub struct KeyContext<'a> {
    pub prefix: &'a str,
}

/// Encoded form of a null index component.
pub const NULL_COMPONENT: &str = "~";

pub const ALL_INDEX: &str = "_all";

impl<'a> KeyContext<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    /// `{prefix}:{collection}`, the root every other key of a collection hangs from.
    pub fn collection(&self, collection: &str) -> String {
        format!("{}:{}", self.prefix, collection)
    }

    pub fn entity(&self, collection: &str, entity_id: &str) -> String {
        format!("{}:{}:{}", self.prefix, collection, entity_id)
    }

    pub fn unique(&self, collection: &str, field: &str, value: &str) -> String {
        format!("{}:{}:unique:{}:{}", self.prefix, collection, field, value)
    }

    pub fn index(&self, collection: &str, fields: &[&str], values: &[&str]) -> String {
        format!(
            "{}:{}:idx:{}:{}",
            self.prefix,
            collection,
            fields.join("+"),
            values.join(":")
        )
    }

    pub fn all(&self, collection: &str) -> String {
        format!("{}:{}:idx:{}", self.prefix, collection, ALL_INDEX)
    }

    /// Glob matching every key of a collection (documents, claims and indexes).
    pub fn collection_pattern(&self, collection: &str) -> String {
        format!("{}:{}:*", self.prefix, collection)
    }
}
