use serde::Serialize;

use crate::{
    collaborators::{MediaFolder, MediaUpload, PushMessage},
    context::Wayfarer,
    errors::{AppError, AppResult},
    id::generate_id,
    models::{MediaItem, NotificationKind, Post, PostDraft, PostType, User},
    repository::{IndexQuery, Patch},
    runtime::DocumentStore,
    services::{NotificationEvent, check_media_type, discard_media, ensure, missing, upload_media},
    types::{Page, SortOrder, monotonic_now},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub post: Post,
    pub has_liked: bool,
    pub has_disliked: bool,
}

/// Counters and the caller's state after a like or dislike toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionOutcome {
    pub likes_count: u64,
    pub dislikes_count: u64,
    pub has_liked: bool,
    pub has_disliked: bool,
}

pub struct PostService<'a, S: DocumentStore> {
    app: &'a Wayfarer<S>,
}

impl<'a, S: DocumentStore> PostService<'a, S> {
    pub fn new(app: &'a Wayfarer<S>) -> Self {
        Self { app }
    }

    async fn load(&self, post_id: &str) -> AppResult<Post> {
        self.app
            .repos()
            .posts
            .get(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("post"))
    }

    /// Uploads every file in order; if any upload fails the post is not created.
    pub async fn create_post(&self, owner: &User, draft: PostDraft, files: Vec<MediaUpload>) -> AppResult<Post> {
        if files.is_empty() {
            return Err(AppError::invalid("media", "please upload at least one media file"));
        }
        for file in &files {
            check_media_type("media", file)?;
        }

        let mut media: Vec<MediaItem> = Vec::with_capacity(files.len());
        for file in &files {
            match upload_media(self.app, file, MediaFolder::Posts).await {
                Ok(item) => media.push(item),
                Err(err) => {
                    discard_media(self.app, &media).await;
                    return Err(err);
                }
            }
        }

        let post = Post {
            id: generate_id(),
            owner: owner.id.clone(),
            media,
            caption: draft.caption.trim().to_string(),
            post_type: draft.post_type,
            location: draft.location.trim().to_string(),
            tags: draft.parsed_tags(),
            likes: Vec::new(),
            dislikes: Vec::new(),
            likes_count: 0,
            dislikes_count: 0,
            comments_count: 0,
            views_count: 0,
            shares_count: 0,
            created_at: monotonic_now(),
        };
        let post = match self.app.repos().posts.insert(&post).await {
            Ok(post) => post,
            Err(err) => {
                discard_media(self.app, &post.media).await;
                return Err(err.into());
            }
        };

        let owner = self
            .app
            .repos()
            .users
            .patch(&owner.id, Patch::new().increment("posts_count", 1))
            .await
            .map_err(missing("user"))?
            .document;

        let followers = self.app.repos().users.get_many(&owner.followers).await?;
        let tokens: Vec<String> = followers
            .into_iter()
            .filter_map(|follower| follower.push_token)
            .filter(|token| !token.is_empty())
            .collect();
        if !tokens.is_empty() {
            let message = PushMessage::new(
                "New Post",
                format!("{} shared a new {}", owner.username, post.post_type.as_str()),
            )
            .with_data("type", "post")
            .with_data("postId", post.id.clone());
            self.app.notifier().multicast(&tokens, message).await;
        }
        Ok(post)
    }

    /// Posts by the viewer and everyone they follow, newest first.
    pub async fn feed(&self, viewer_id: &str, page: u64, limit: Option<u64>) -> AppResult<Page<Post>> {
        let request = self.app.page(page, limit, self.app.config().pagination.feed);
        let viewer = self
            .app
            .repos()
            .users
            .get(viewer_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        let posts = &self.app.repos().posts;
        let mut entries: Vec<(String, i64)> = Vec::new();
        for author in std::iter::once(&viewer.id).chain(viewer.following.iter()) {
            entries.extend(posts.index_entries(&IndexQuery::eq("owner", author.as_str())).await?);
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        entries.dedup_by(|a, b| a.0 == b.0);

        let total = entries.len() as u64;
        let ids: Vec<String> = entries
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit as usize)
            .map(|(id, _)| id)
            .collect();
        let items = posts.get_many(&ids).await?;
        Ok(Page::new(items, request, total))
    }

    pub async fn user_posts(
        &self,
        owner_id: &str,
        post_type: Option<PostType>,
        page: u64,
        limit: Option<u64>,
    ) -> AppResult<Page<Post>> {
        let request = self.app.page(page, limit, self.app.config().pagination.user_posts);
        let query = match post_type {
            Some(post_type) => {
                IndexQuery::eq("owner", owner_id).and("post_type", Some(post_type.as_str().to_string()))
            }
            None => IndexQuery::eq("owner", owner_id),
        };
        Ok(self.app.repos().posts.list(&query, request, SortOrder::Desc).await?)
    }

    /// Counts a view on every call.
    pub async fn view_post(&self, viewer_id: &str, post_id: &str) -> AppResult<PostView> {
        let post = self
            .app
            .repos()
            .posts
            .patch(post_id, Patch::new().increment("views_count", 1))
            .await
            .map_err(missing("post"))?
            .document;
        Ok(PostView {
            has_liked: post.has_liked(viewer_id),
            has_disliked: post.has_disliked(viewer_id),
            post,
        })
    }

    pub async fn toggle_like(&self, actor: &User, post_id: &str) -> AppResult<ReactionOutcome> {
        let post = self
            .app
            .repos()
            .posts
            .patch(
                post_id,
                Patch::new().toggle_member("likes", "likes_count", &actor.id, Some(("dislikes", "dislikes_count"))),
            )
            .await
            .map_err(missing("post"))?
            .document;
        let outcome = reaction(&post, &actor.id);

        if outcome.has_liked && post.owner != actor.id {
            self.app
                .notifier()
                .dispatch(
                    NotificationEvent::new(
                        &post.owner,
                        &actor.id,
                        NotificationKind::Like,
                        format!("{} liked your post", actor.username),
                    )
                    .post(&post.id)
                    .push("New Like"),
                )
                .await;
        }
        Ok(outcome)
    }

    pub async fn toggle_dislike(&self, actor: &User, post_id: &str) -> AppResult<ReactionOutcome> {
        let post = self
            .app
            .repos()
            .posts
            .patch(
                post_id,
                Patch::new().toggle_member("dislikes", "dislikes_count", &actor.id, Some(("likes", "likes_count"))),
            )
            .await
            .map_err(missing("post"))?
            .document;
        Ok(reaction(&post, &actor.id))
    }

    /// Returns the new share count.
    pub async fn share_post(&self, post_id: &str) -> AppResult<u64> {
        let post = self
            .app
            .repos()
            .posts
            .patch(post_id, Patch::new().increment("shares_count", 1))
            .await
            .map_err(missing("post"))?
            .document;
        Ok(post.shares_count)
    }

    /// Removes the post's media first, then the post.
    pub async fn delete_post(&self, actor: &User, post_id: &str) -> AppResult<()> {
        let post = self.load(post_id).await?;
        ensure(post.owner == actor.id, "you are not authorized to delete this post")?;

        for item in &post.media {
            self.app.media().delete(&item.public_id).await?;
        }
        if self.app.repos().posts.delete(post_id).await?.is_none() {
            return Err(AppError::not_found("post"));
        }
        self.app
            .repos()
            .users
            .patch(&actor.id, Patch::new().increment("posts_count", -1))
            .await
            .map_err(missing("user"))?;
        Ok(())
    }
}

fn reaction(post: &Post, user_id: &str) -> ReactionOutcome {
    ReactionOutcome {
        likes_count: post.likes_count,
        dislikes_count: post.dislikes_count,
        has_liked: post.has_liked(user_id),
        has_disliked: post.has_disliked(user_id),
    }
}
