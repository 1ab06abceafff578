use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Table};
use serde::Serialize;
use wayfarer::{
    DocumentStore,
    keys::KeyContext,
    repository::prune_collection,
    runtime::SchemaPayload,
    types::registered_documents,
};

use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Cleanup",
    commands: &["wayfarer purge                    # Drop index entries and claims of expired or deleted documents"],
}];

#[derive(Debug, Serialize)]
pub struct PurgedCollection {
    pub collection: &'static str,
    pub index_entries: u64,
    pub unique_claims: u64,
}

#[derive(Debug, Serialize)]
pub struct PurgeReport {
    pub collections: Vec<PurgedCollection>,
}

impl PurgeReport {
    pub fn removed(&self) -> u64 {
        self.collections
            .iter()
            .map(|purged| purged.index_entries + purged.unique_claims)
            .sum()
    }
}

impl TableDisplay for PurgeReport {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, &["Collection", "Index entries", "Unique claims"]);
        for purged in &self.collections {
            table.add_row(vec![
                Cell::new(purged.collection),
                Cell::new(purged.index_entries).set_alignment(CellAlignment::Right),
                Cell::new(purged.unique_claims).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!("removed={}", self.removed())
    }
}

/// Expired stories and notifications vanish from the store on their own; this sweeps what pointed at them.
pub async fn purge_all<S: DocumentStore>(store: &S, prefix: &str) -> Result<PurgeReport> {
    let keys = KeyContext::new(prefix);
    let mut registrations: Vec<_> = registered_documents().collect();
    registrations.sort_by_key(|registration| registration.collection);

    let mut collections = Vec::with_capacity(registrations.len());
    for registration in registrations {
        let schema = SchemaPayload::from_schema(&(registration.schema)(), &keys);
        let report = prune_collection(store, &schema).await?;
        log::debug!("pruned {}: {report:?}", registration.collection);
        collections.push(PurgedCollection {
            collection: registration.collection,
            index_entries: report.index_entries,
            unique_claims: report.unique_claims,
        });
    }
    Ok(PurgeReport { collections })
}

pub async fn handle_purge<S: DocumentStore>(store: &S, prefix: &str, output: &OutputManager) -> Result<()> {
    output.progress("Sweeping dangling index entries");
    let report = purge_all(store, prefix).await?;
    output.clear_line();
    output.display(&report)?;
    if report.removed() == 0 {
        output.success("Nothing to purge");
    } else {
        output.success(&format!("Removed {} dangling entries", report.removed()));
    }
    Ok(())
}
