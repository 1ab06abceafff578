use serde::Serialize;

use crate::{
    auth::{TokenKind, TokenPair},
    collaborators::{MediaFolder, MediaUpload},
    context::Wayfarer,
    errors::{AppError, AppResult, UnauthorizedKind, Validator},
    id::generate_id,
    models::{AccountType, ImageRef, NotificationKind, PublicUser, User, UserSummary, user::default_avatar_url},
    repository::{IndexQuery, Patch},
    runtime::DocumentStore,
    services::{NotificationEvent, ensure, missing},
    types::{SortOrder, monotonic_now},
    validators::{BIO_MAX, is_valid_email, is_valid_url, search_pattern, validate_registration},
};

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub account_type: AccountType,
}

/// A signed-in user with a fresh token pair.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: PublicUser,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Profile edits; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub business_email: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileUploads {
    pub profile_picture: Option<MediaUpload>,
    pub cover_photo: Option<MediaUpload>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user: PublicUser,
    pub followers: Vec<UserSummary>,
    pub following: Vec<UserSummary>,
    pub is_following: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowOutcome {
    pub is_following: bool,
    pub followers_count: u64,
    pub following_count: u64,
}

/// Accounts, credentials, profiles and the follow graph.
pub struct IdentityService<'a, S: DocumentStore> {
    app: &'a Wayfarer<S>,
}

impl<'a, S: DocumentStore> IdentityService<'a, S> {
    pub fn new(app: &'a Wayfarer<S>) -> Self {
        Self { app }
    }

    async fn load(&self, user_id: &str) -> AppResult<User> {
        self.app
            .repos()
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("user"))
    }

    /// Issues a token pair and stores its refresh half on the user.
    async fn open_session(&self, user: &User) -> AppResult<AuthSession> {
        let tokens = self.app.tokens().issue_pair(&user.id)?;
        let outcome = self
            .app
            .repos()
            .users
            .patch(&user.id, Patch::new().assign("refresh_token", &tokens.refresh_token))
            .await
            .map_err(missing("user"))?;
        Ok(AuthSession {
            user: outcome.document.public(),
            tokens,
        })
    }

    pub async fn register(&self, registration: Registration) -> AppResult<AuthSession> {
        let username = registration.username.trim().to_string();
        let email = registration.email.trim().to_ascii_lowercase();
        let full_name = registration.full_name.trim().to_string();
        validate_registration(&username, &email, &registration.password, &full_name)?;

        let user = User {
            id: generate_id(),
            password_hash: self.app.passwords().hash(&registration.password)?,
            profile_picture: ImageRef {
                public_id: None,
                url: default_avatar_url(&full_name, registration.account_type),
            },
            username,
            email,
            full_name,
            account_type: registration.account_type,
            bio: String::new(),
            cover_photo: None,
            location: String::new(),
            website: String::new(),
            business_email: String::new(),
            followers: Vec::new(),
            following: Vec::new(),
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
            push_token: None,
            refresh_token: None,
            is_verified: false,
            is_private: false,
            blocked_users: Vec::new(),
            created_at: monotonic_now(),
        };
        let user = self.app.repos().users.insert(&user).await?;
        log::debug!("registered {} ({})", user.username, user.id);
        self.open_session(&user).await
    }

    /// Accepts an email or a username; unknown users and wrong passwords fail identically.
    pub async fn login(&self, email_or_username: &str, password: &str) -> AppResult<AuthSession> {
        let identifier = email_or_username.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(AppError::invalid(
                "credentials",
                "please provide email/username and password",
            ));
        }
        let users = &self.app.repos().users;
        let user = match users.find_by_unique("email", identifier).await? {
            Some(user) => Some(user),
            None => users.find_by_unique("username", identifier).await?,
        };
        let invalid = || AppError::Unauthorized(UnauthorizedKind::InvalidCredentials);
        let user = user.ok_or_else(invalid)?;
        if !self.app.passwords().verify(password, &user.password_hash)? {
            return Err(invalid());
        }
        self.open_session(&user).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthSession> {
        if refresh_token.is_empty() {
            return Err(AppError::Unauthorized(UnauthorizedKind::Missing));
        }
        let claims = self.app.tokens().verify(refresh_token, TokenKind::Refresh)?;
        let user = self.load(&claims.sub).await?;
        if user.refresh_token.as_deref() != Some(refresh_token) {
            return Err(AppError::Unauthorized(UnauthorizedKind::Invalid));
        }
        self.open_session(&user).await
    }

    pub async fn logout(&self, user_id: &str) -> AppResult<()> {
        self.app
            .repos()
            .users
            .patch(user_id, Patch::new().assign("refresh_token", Option::<String>::None))
            .await
            .map_err(missing("user"))?;
        Ok(())
    }

    /// Resolves the caller of a request from its bearer access token.
    pub async fn authenticate(&self, access_token: Option<&str>) -> AppResult<User> {
        let token = access_token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AppError::Unauthorized(UnauthorizedKind::Missing))?;
        let claims = self.app.tokens().verify(token, TokenKind::Access)?;
        self.load(&claims.sub).await
    }

    pub async fn me(&self, user_id: &str) -> AppResult<PublicUser> {
        Ok(self.load(user_id).await?.public())
    }

    pub async fn get_profile(&self, viewer_id: &str, user_id: &str) -> AppResult<Profile> {
        let user = self.load(user_id).await?;
        let users = &self.app.repos().users;
        let followers = users.get_many(&user.followers).await?;
        let following = users.get_many(&user.following).await?;
        Ok(Profile {
            is_following: user.is_followed_by(viewer_id),
            followers: followers.iter().map(User::summary).collect(),
            following: following.iter().map(User::summary).collect(),
            user: user.public(),
        })
    }

    /// New images replace the previous ones, which are then removed from the media store.
    pub async fn update_profile(
        &self,
        user_id: &str,
        changes: ProfileChanges,
        uploads: ProfileUploads,
    ) -> AppResult<PublicUser> {
        let mut validator = Validator::new();
        if let Some(full_name) = &changes.full_name {
            validator.check(
                !full_name.trim().is_empty(),
                "full_name",
                "validation.required",
                "full name is required",
            );
        }
        if let Some(bio) = &changes.bio {
            validator.length("bio", bio, 0, BIO_MAX);
        }
        if let Some(website) = changes.website.as_deref().filter(|value| !value.is_empty()) {
            validator.check(
                is_valid_url(website),
                "website",
                "validation.url",
                "value must be a valid URL",
            );
        }
        if let Some(email) = changes.business_email.as_deref().filter(|value| !value.is_empty()) {
            validator.check(
                is_valid_email(email),
                "business_email",
                "validation.email",
                "value must be a valid email address",
            );
        }
        for (field, upload) in [
            ("profile_picture", &uploads.profile_picture),
            ("cover_photo", &uploads.cover_photo),
        ] {
            if let Some(upload) = upload {
                validator.check(upload.is_image(), field, "validation.media", "an image is required");
            }
        }
        validator.finish()?;

        let current = self.load(user_id).await?;
        let mut patch = Patch::new();
        let mut replaced = Vec::new();

        if let Some(upload) = &uploads.profile_picture {
            let folder = self.app.folder(MediaFolder::Profiles);
            let image = ImageRef::from(self.app.media().upload_image(&upload.bytes, &folder).await?);
            patch = patch.assign("profile_picture", &image);
            replaced.extend(current.profile_picture.public_id.clone());
        }
        if let Some(upload) = &uploads.cover_photo {
            let folder = self.app.folder(MediaFolder::Covers);
            let image = ImageRef::from(self.app.media().upload_image(&upload.bytes, &folder).await?);
            patch = patch.assign("cover_photo", &image);
            replaced.extend(current.cover_photo.as_ref().and_then(|cover| cover.public_id.clone()));
        }

        if let Some(full_name) = changes.full_name {
            patch = patch.assign("full_name", full_name.trim());
        }
        if let Some(bio) = changes.bio {
            patch = patch.assign("bio", bio);
        }
        if let Some(location) = changes.location {
            patch = patch.assign("location", location);
        }
        if let Some(website) = changes.website {
            patch = patch.assign("website", website);
        }
        if let Some(business_email) = changes.business_email {
            patch = patch.assign("business_email", business_email);
        }
        if let Some(is_private) = changes.is_private {
            patch = patch.assign("is_private", is_private);
        }

        let user = if patch.is_empty() {
            current
        } else {
            self.app
                .repos()
                .users
                .patch(user_id, patch)
                .await
                .map_err(missing("user"))?
                .document
        };

        for public_id in replaced {
            if let Err(err) = self.app.media().delete(&public_id).await {
                log::warn!("failed to delete replaced media {public_id}: {err}");
            }
        }
        Ok(user.public())
    }

    /// `None` clears the token and stops pushes to this user.
    pub async fn update_push_token(&self, user_id: &str, push_token: Option<String>) -> AppResult<()> {
        let push_token = push_token.filter(|token| !token.trim().is_empty());
        self.app
            .repos()
            .users
            .patch(user_id, Patch::new().assign("push_token", push_token))
            .await
            .map_err(missing("user"))?;
        Ok(())
    }

    /// Follows `target_id`, or unfollows when the edge already exists.
    pub async fn toggle_follow(&self, actor: &User, target_id: &str) -> AppResult<FollowOutcome> {
        ensure(actor.id != target_id, "you cannot follow yourself")?;
        ensure(!actor.is_business(), "business accounts cannot follow users")?;
        self.load(target_id).await?;

        let outcome = self
            .app
            .repos()
            .users
            .toggle_edge(
                &actor.id,
                target_id,
                ("following", "following_count"),
                ("followers", "followers_count"),
            )
            .await
            .map_err(missing("user"))?;
        log::debug!(
            "{} {} {}",
            actor.id,
            if outcome.active { "followed" } else { "unfollowed" },
            target_id
        );

        if outcome.active {
            self.app
                .notifier()
                .dispatch(
                    NotificationEvent::new(
                        target_id,
                        &actor.id,
                        NotificationKind::Follow,
                        format!("{} started following you", actor.username),
                    )
                    .push("New Follower"),
                )
                .await;
        }

        Ok(FollowOutcome {
            is_following: outcome.active,
            followers_count: outcome.target.followers_count,
            following_count: outcome.source.following_count,
        })
    }

    pub async fn followers(&self, user_id: &str) -> AppResult<Vec<UserSummary>> {
        let user = self.load(user_id).await?;
        let followers = self.app.repos().users.get_many(&user.followers).await?;
        Ok(followers.iter().map(User::summary).collect())
    }

    pub async fn following(&self, user_id: &str) -> AppResult<Vec<UserSummary>> {
        let user = self.load(user_id).await?;
        let following = self.app.repos().users.get_many(&user.following).await?;
        Ok(following.iter().map(User::summary).collect())
    }

    /// Case-insensitive substring match on username or full name.
    pub async fn search(&self, query: &str) -> AppResult<Vec<UserSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::invalid("query", "search query is required"));
        }
        let pattern = search_pattern(query).map_err(|e| AppError::invalid("query", e.to_string()))?;
        let users = self
            .app
            .repos()
            .users
            .list_all(&IndexQuery::All, SortOrder::Asc)
            .await?;
        Ok(users
            .iter()
            .filter(|user| pattern.is_match(&user.username) || pattern.is_match(&user.full_name))
            .take(self.app.config().pagination.search)
            .map(User::summary)
            .collect())
    }
}
