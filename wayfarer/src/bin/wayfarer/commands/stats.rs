use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Table};
use serde::Serialize;
use wayfarer::{DocumentStore, keys::KeyContext, types::registered_documents};

use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Document Counts",
    commands: &[
        "wayfarer stats                    # Documents per collection",
        "wayfarer --output json stats      # Same, as JSON",
    ],
}];

#[derive(Debug, Serialize)]
pub struct CollectionStats {
    pub collection: &'static str,
    pub documents: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub prefix: String,
    pub collections: Vec<CollectionStats>,
}

impl StatsReport {
    pub fn total(&self) -> u64 {
        self.collections.iter().map(|stats| stats.documents).sum()
    }
}

impl TableDisplay for StatsReport {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, &["Collection", "Documents"]);
        for stats in &self.collections {
            table.add_row(vec![
                Cell::new(stats.collection),
                Cell::new(stats.documents).set_alignment(CellAlignment::Right),
            ]);
        }
        table.add_row(vec![
            Cell::new("total"),
            Cell::new(self.total()).set_alignment(CellAlignment::Right),
        ]);
        table
    }

    fn to_compact(&self) -> String {
        self.collections
            .iter()
            .map(|stats| format!("{}={}", stats.collection, stats.documents))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Counts every registered collection through its `_all` index.
pub async fn collect_stats<S: DocumentStore>(store: &S, prefix: &str) -> Result<StatsReport> {
    let keys = KeyContext::new(prefix);
    let mut registrations: Vec<_> = registered_documents().collect();
    registrations.sort_by_key(|registration| registration.collection);

    let mut collections = Vec::with_capacity(registrations.len());
    for registration in registrations {
        let documents = store.index_count(&keys.all(registration.collection)).await?;
        collections.push(CollectionStats {
            collection: registration.collection,
            documents,
        });
    }
    Ok(StatsReport {
        prefix: prefix.to_string(),
        collections,
    })
}

pub async fn handle_stats<S: DocumentStore>(store: &S, prefix: &str, output: &OutputManager) -> Result<()> {
    let report = collect_stats(store, prefix).await?;
    output.heading(&format!("Collections under `{prefix}`"));
    output.display(&report)
}
