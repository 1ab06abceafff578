use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Table};
use serde::Serialize;
use wayfarer::{
    Document, DocumentStore, Patch, Repo, Repos,
    models::{Comment, Post, Story, User},
};

use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};
use crate::theme::Glyph;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Counter Drift",
    commands: &[
        "wayfarer audit                    # Report counters that disagree with their sets",
        "wayfarer audit --repair           # Rewrite drifted counters from set sizes",
    ],
}];

/// A counter whose stored value differs from the size of the set it counts.
#[derive(Debug, Clone, Serialize)]
pub struct Drift {
    pub collection: &'static str,
    pub id: String,
    pub counter: &'static str,
    pub stored: u64,
    pub actual: u64,
    pub repaired: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct AuditReport {
    pub scanned: u64,
    pub drifts: Vec<Drift>,
}

impl TableDisplay for AuditReport {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.create_table();
        output.add_table_header(&mut table, &["Collection", "Id", "Counter", "Stored", "Actual", ""]);
        for drift in &self.drifts {
            table.add_row(vec![
                Cell::new(drift.collection),
                Cell::new(&drift.id),
                Cell::new(drift.counter),
                Cell::new(drift.stored).set_alignment(CellAlignment::Right),
                Cell::new(drift.actual).set_alignment(CellAlignment::Right),
                Cell::new(if drift.repaired { Glyph::Repaired.as_str() } else { "" }),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!("scanned={} drifted={}", self.scanned, self.drifts.len())
    }
}

type Counters<T> = fn(&T) -> Vec<(&'static str, u64, usize)>;

fn user_counters(user: &User) -> Vec<(&'static str, u64, usize)> {
    vec![
        ("followers_count", user.followers_count, user.followers.len()),
        ("following_count", user.following_count, user.following.len()),
    ]
}

fn post_counters(post: &Post) -> Vec<(&'static str, u64, usize)> {
    vec![
        ("likes_count", post.likes_count, post.likes.len()),
        ("dislikes_count", post.dislikes_count, post.dislikes.len()),
    ]
}

fn comment_counters(comment: &Comment) -> Vec<(&'static str, u64, usize)> {
    vec![
        ("likes_count", comment.likes_count, comment.likes.len()),
        ("dislikes_count", comment.dislikes_count, comment.dislikes.len()),
    ]
}

fn story_counters(story: &Story) -> Vec<(&'static str, u64, usize)> {
    vec![("views_count", story.views_count, story.viewers.len())]
}

async fn audit_collection<T, S>(repo: &Repo<T, S>, counters: Counters<T>, repair: bool, report: &mut AuditReport) -> Result<()>
where
    T: Document,
    S: DocumentStore,
{
    for document in repo.scan_all().await? {
        report.scanned += 1;
        let mut patch = Patch::new();
        let mut drifts = Vec::new();
        for (counter, stored, actual) in counters(&document) {
            let actual = actual as u64;
            if stored == actual {
                continue;
            }
            patch = patch.assign(counter, actual);
            drifts.push(Drift {
                collection: T::COLLECTION,
                id: document.id().to_string(),
                counter,
                stored,
                actual,
                repaired: false,
            });
        }
        if repair && !patch.is_empty() {
            repo.patch(document.id(), patch).await?;
            log::info!("repaired {} counter(s) on {}:{}", drifts.len(), T::COLLECTION, document.id());
            drifts.iter_mut().for_each(|drift| drift.repaired = true);
        }
        report.drifts.extend(drifts);
    }
    Ok(())
}

/// Compares every counter against its set across users, posts, comments and stories.
pub async fn audit_counters<S: DocumentStore>(store: &S, prefix: &str, repair: bool) -> Result<AuditReport> {
    let repos = Repos::new(store, prefix);
    let mut report = AuditReport::default();
    audit_collection(&repos.users, user_counters, repair, &mut report).await?;
    audit_collection(&repos.posts, post_counters, repair, &mut report).await?;
    audit_collection(&repos.comments, comment_counters, repair, &mut report).await?;
    audit_collection(&repos.stories, story_counters, repair, &mut report).await?;
    Ok(report)
}

pub async fn handle_audit<S: DocumentStore>(store: &S, prefix: &str, repair: bool, output: &OutputManager) -> Result<()> {
    output.progress("Auditing counters");
    let report = audit_counters(store, prefix, repair).await?;
    output.clear_line();

    if report.drifts.is_empty() {
        output.success(&format!("{} documents scanned, all counters consistent", report.scanned));
        return Ok(());
    }
    output.display(&report)?;
    if repair {
        output.success(&format!("Repaired {} counters", report.drifts.len()));
    } else {
        output.warning(&format!("{} counters drifted", report.drifts.len()));
        output.bullet("Run `wayfarer audit --repair` to rewrite them from set sizes.");
    }
    Ok(())
}
