use crate::{
    context::Wayfarer,
    errors::{AppError, AppResult, RepoError},
    id::generate_id,
    models::{
        Comment, NotificationKind, User,
        comment::{COMMENT_MAX, DELETED_PLACEHOLDER},
    },
    repository::{IndexQuery, Patch},
    runtime::DocumentStore,
    services::{NotificationEvent, ReactionOutcome, bounded_text, ensure, missing},
    types::{Page, SortOrder, monotonic_now},
};

/// Threaded comments and their reactions.
pub struct CommentService<'a, S: DocumentStore> {
    app: &'a Wayfarer<S>,
}

impl<'a, S: DocumentStore> CommentService<'a, S> {
    pub fn new(app: &'a Wayfarer<S>) -> Self {
        Self { app }
    }

    /// Loads a comment that has not been deleted.
    async fn load(&self, comment_id: &str) -> AppResult<Comment> {
        match self.app.repos().comments.get(comment_id).await? {
            Some(comment) if !comment.is_deleted => Ok(comment),
            _ => Err(AppError::not_found("comment")),
        }
    }

    pub async fn create_comment(
        &self,
        actor: &User,
        post_id: &str,
        text: &str,
        parent_comment_id: Option<&str>,
    ) -> AppResult<Comment> {
        let text = bounded_text("text", text, COMMENT_MAX, true)?;
        let post = self
            .app
            .repos()
            .posts
            .get(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post"))?;

        let parent = match parent_comment_id {
            Some(parent_id) => {
                let parent = self
                    .app
                    .repos()
                    .comments
                    .get(parent_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("parent comment"))?;
                if parent.post != post.id {
                    return Err(AppError::invalid(
                        "parent_comment_id",
                        "parent comment belongs to a different post",
                    ));
                }
                Some(parent)
            }
            None => None,
        };

        let now = monotonic_now();
        let comment = Comment {
            id: generate_id(),
            post: post.id.clone(),
            author: actor.id.clone(),
            text,
            parent_comment: parent.as_ref().map(|parent| parent.id.clone()),
            depth: parent.as_ref().map_or(0, |parent| parent.depth + 1),
            likes: Vec::new(),
            dislikes: Vec::new(),
            likes_count: 0,
            dislikes_count: 0,
            replies_count: 0,
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        let comment = self.app.repos().comments.insert(&comment).await?;

        self.app
            .repos()
            .posts
            .patch(&post.id, Patch::new().increment("comments_count", 1))
            .await
            .map_err(missing("post"))?;
        if let Some(parent) = &parent {
            self.app
                .repos()
                .comments
                .patch(&parent.id, Patch::new().increment("replies_count", 1))
                .await
                .map_err(missing("parent comment"))?;
        }

        let notifier = self.app.notifier();
        if post.owner != actor.id {
            let (kind, message, title) = if parent.is_some() {
                (
                    NotificationKind::Reply,
                    format!("{} replied to your comment", actor.username),
                    "New Reply",
                )
            } else {
                (
                    NotificationKind::Comment,
                    format!("{} commented on your post", actor.username),
                    "New Comment",
                )
            };
            notifier
                .dispatch(
                    NotificationEvent::new(&post.owner, &actor.id, kind, message)
                        .post(&post.id)
                        .comment(&comment.id)
                        .push(title),
                )
                .await;
        }
        if let Some(parent) = &parent
            && parent.author != actor.id
            && parent.author != post.owner
        {
            notifier
                .dispatch(
                    NotificationEvent::new(
                        &parent.author,
                        &actor.id,
                        NotificationKind::Reply,
                        format!("{} replied to your comment", actor.username),
                    )
                    .post(&post.id)
                    .comment(&comment.id)
                    .push("New Reply"),
                )
                .await;
        }
        Ok(comment)
    }

    async fn react(&self, comment_id: &str, patch: Patch) -> AppResult<Comment> {
        let outcome = self
            .app
            .repos()
            .comments
            .patch(comment_id, patch.guard("is_deleted", false))
            .await
            .map_err(missing("comment"))?;
        if !outcome.applied {
            return Err(AppError::not_found("comment"));
        }
        Ok(outcome.document)
    }

    pub async fn toggle_like(&self, actor: &User, comment_id: &str) -> AppResult<ReactionOutcome> {
        let comment = self
            .react(
                comment_id,
                Patch::new().toggle_member("likes", "likes_count", &actor.id, Some(("dislikes", "dislikes_count"))),
            )
            .await?;
        let outcome = reaction(&comment, &actor.id);
        if outcome.has_liked && comment.author != actor.id {
            self.app
                .notifier()
                .dispatch(
                    NotificationEvent::new(
                        &comment.author,
                        &actor.id,
                        NotificationKind::Like,
                        format!("{} liked your comment", actor.username),
                    )
                    .post(&comment.post)
                    .comment(&comment.id)
                    .push("New Like"),
                )
                .await;
        }
        Ok(outcome)
    }

    pub async fn toggle_dislike(&self, actor: &User, comment_id: &str) -> AppResult<ReactionOutcome> {
        let comment = self
            .react(
                comment_id,
                Patch::new().toggle_member("dislikes", "dislikes_count", &actor.id, Some(("likes", "likes_count"))),
            )
            .await?;
        Ok(reaction(&comment, &actor.id))
    }

    pub async fn edit_comment(&self, actor: &User, comment_id: &str, text: &str) -> AppResult<Comment> {
        let text = bounded_text("text", text, COMMENT_MAX, true)?;
        let comment = self.load(comment_id).await?;
        ensure(comment.author == actor.id, "you are not authorized to edit this comment")?;
        let patch = Patch::new()
            .assign("text", text)
            .assign("is_edited", true)
            .assign("updated_at", monotonic_now().timestamp_millis());
        self.react(comment_id, patch).await
    }

    /// Soft delete: replies stay, counters drop by exactly one.
    pub async fn delete_comment(&self, actor: &User, comment_id: &str) -> AppResult<()> {
        let comment = self.load(comment_id).await?;
        ensure(comment.author == actor.id, "you are not authorized to delete this comment")?;
        let patch = Patch::new()
            .assign("is_deleted", true)
            .assign("text", DELETED_PLACEHOLDER)
            .assign("updated_at", monotonic_now().timestamp_millis());
        self.react(comment_id, patch).await?;

        let decrement = |field: &str| Patch::new().increment(field, -1);
        tolerate_missing(
            self.app
                .repos()
                .posts
                .patch(&comment.post, decrement("comments_count"))
                .await,
        )?;
        if let Some(parent_id) = &comment.parent_comment {
            tolerate_missing(
                self.app
                    .repos()
                    .comments
                    .patch(parent_id, decrement("replies_count"))
                    .await,
            )?;
        }
        Ok(())
    }

    /// Root comments of a post, newest first.
    pub async fn post_comments(&self, post_id: &str, page: u64, limit: Option<u64>) -> AppResult<Page<Comment>> {
        let request = self.app.page(page, limit, self.app.config().pagination.comments);
        let query = IndexQuery::eq("post", post_id).and("parent_comment", None);
        Ok(self
            .app
            .repos()
            .comments
            .list(&query, request, SortOrder::Desc)
            .await?)
    }

    /// Direct replies to a comment, oldest first.
    pub async fn comment_replies(&self, comment_id: &str, page: u64, limit: Option<u64>) -> AppResult<Page<Comment>> {
        let request = self.app.page(page, limit, self.app.config().pagination.replies);
        Ok(self
            .app
            .repos()
            .comments
            .list(&IndexQuery::eq("parent_comment", comment_id), request, SortOrder::Asc)
            .await?)
    }
}

/// A counter owner deleted in the meantime is not an error.
fn tolerate_missing<T>(result: Result<T, RepoError>) -> AppResult<()> {
    match result {
        Ok(_) | Err(RepoError::NotFound { .. }) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn reaction(comment: &Comment, user_id: &str) -> ReactionOutcome {
    ReactionOutcome {
        likes_count: comment.likes_count,
        dislikes_count: comment.dislikes_count,
        has_liked: comment.has_liked(user_id),
        has_disliked: comment.has_disliked(user_id),
    }
}
