use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    collaborators::{MediaFolder, MediaUpload},
    context::Wayfarer,
    errors::{AppError, AppResult},
    id::generate_id,
    models::{
        Story, StoryView, User, UserSummary,
        story::{STORY_CAPTION_MAX, story_lifetime},
    },
    repository::{IndexQuery, Patch},
    runtime::DocumentStore,
    services::{bounded_text, check_media_type, discard_media, ensure, missing, upload_media},
    types::{SortOrder, monotonic_now},
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryItem {
    #[serde(flatten)]
    pub story: Story,
    pub has_viewed: bool,
}

/// One author's live stories, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct StoryGroup {
    pub user: UserSummary,
    pub stories: Vec<StoryItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryViewer {
    pub user: UserSummary,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub viewed_at: DateTime<Utc>,
}

/// Stories live for a fixed window and read as missing once it has passed.
pub struct StoryService<'a, S: DocumentStore> {
    app: &'a Wayfarer<S>,
}

impl<'a, S: DocumentStore> StoryService<'a, S> {
    pub fn new(app: &'a Wayfarer<S>) -> Self {
        Self { app }
    }

    async fn load_live(&self, story_id: &str) -> AppResult<Story> {
        match self.app.repos().stories.get(story_id).await? {
            Some(story) if !story.is_expired_at(Utc::now()) => Ok(story),
            _ => Err(AppError::not_found("story")),
        }
    }

    async fn live_stories_of(&self, owner_id: &str, order: SortOrder) -> AppResult<Vec<Story>> {
        let now = Utc::now();
        let stories = self
            .app
            .repos()
            .stories
            .list_all(&IndexQuery::eq("owner", owner_id), order)
            .await?;
        Ok(stories.into_iter().filter(|story| !story.is_expired_at(now)).collect())
    }

    pub async fn create_story(&self, owner: &User, caption: &str, file: Option<MediaUpload>) -> AppResult<Story> {
        let file = file.ok_or_else(|| AppError::invalid("media", "please upload a media file"))?;
        check_media_type("media", &file)?;
        let caption = bounded_text("caption", caption, STORY_CAPTION_MAX, false)?;

        let media = upload_media(self.app, &file, MediaFolder::Stories).await?;
        let now = monotonic_now();
        let story = Story {
            id: generate_id(),
            owner: owner.id.clone(),
            media,
            caption,
            viewers: Vec::new(),
            views_count: 0,
            created_at: now,
            expires_at: now + story_lifetime(),
        };
        match self.app.repos().stories.insert(&story).await {
            Ok(story) => Ok(story),
            Err(err) => {
                discard_media(self.app, std::slice::from_ref(&story.media)).await;
                Err(err.into())
            }
        }
    }

    /// Records the view once per viewer; repeat views leave the story unchanged.
    pub async fn view_story(&self, viewer_id: &str, story_id: &str) -> AppResult<Story> {
        self.load_live(story_id).await?;
        let view = StoryView {
            user: viewer_id.to_string(),
            viewed_at: monotonic_now(),
        };
        let outcome = self
            .app
            .repos()
            .stories
            .patch(
                story_id,
                Patch::new().append("viewers", &view, Some("user"), Some("views_count")),
            )
            .await
            .map_err(missing("story"))?;
        Ok(outcome.document)
    }

    /// Live stories of the viewer and everyone they follow, grouped per author.
    pub async fn following_stories(&self, viewer_id: &str) -> AppResult<Vec<StoryGroup>> {
        let viewer = self
            .app
            .repos()
            .users
            .get(viewer_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))?;

        let mut authors: Vec<String> = vec![viewer.id.clone()];
        authors.extend(viewer.following.iter().cloned());
        let users: HashMap<String, User> = self
            .app
            .repos()
            .users
            .get_many(&authors)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();

        let mut groups: Vec<(DateTime<Utc>, StoryGroup)> = Vec::new();
        for author_id in &authors {
            let Some(author) = users.get(author_id) else {
                continue;
            };
            let stories = self.live_stories_of(author_id, SortOrder::Asc).await?;
            let Some(newest) = stories.iter().map(|story| story.created_at).max() else {
                continue;
            };
            let stories = stories
                .into_iter()
                .map(|story| StoryItem {
                    has_viewed: story.has_viewed(viewer_id),
                    story,
                })
                .collect();
            groups.push((
                newest,
                StoryGroup {
                    user: author.summary(),
                    stories,
                },
            ));
        }
        groups.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(groups.into_iter().map(|(_, group)| group).collect())
    }

    /// Live stories of one user, newest first.
    pub async fn user_stories(&self, owner_id: &str) -> AppResult<Vec<Story>> {
        self.live_stories_of(owner_id, SortOrder::Desc).await
    }

    pub async fn story_viewers(&self, actor: &User, story_id: &str) -> AppResult<Vec<StoryViewer>> {
        let story = self.load_live(story_id).await?;
        ensure(story.owner == actor.id, "only the owner can see who viewed this story")?;

        let ids: Vec<String> = story.viewers.iter().map(|view| view.user.clone()).collect();
        let users: HashMap<String, User> = self
            .app
            .repos()
            .users
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();
        Ok(story
            .viewers
            .iter()
            .filter_map(|view| {
                users.get(&view.user).map(|user| StoryViewer {
                    user: user.summary(),
                    viewed_at: view.viewed_at,
                })
            })
            .collect())
    }

    pub async fn delete_story(&self, actor: &User, story_id: &str) -> AppResult<()> {
        let story = self.load_live(story_id).await?;
        ensure(story.owner == actor.id, "you are not authorized to delete this story")?;
        self.app.media().delete(&story.media.public_id).await?;
        if self.app.repos().stories.delete(story_id).await?.is_none() {
            return Err(AppError::not_found("story"));
        }
        Ok(())
    }
}
