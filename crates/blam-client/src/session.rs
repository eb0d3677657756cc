//! Session service: who is signed in.
//!
//! The current user is published on a [`watch`] channel so that views can
//! follow sign-in and sign-out. Credential checks happen outside this crate;
//! signing in here means resolving the account row for an email address.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use blam_shared::constants::DEFAULT_AVATAR;
use blam_shared::{User, UserId, ValidationError};
use blam_store::rows::{from_row, to_row, NewUserRow, UserRow};
use blam_store::{Filter, RemoteStore, Row, StoreError, Table};

use crate::error::Result;

pub struct Session {
    store: Arc<dyn RemoteStore>,
    current: watch::Sender<Option<User>>,
}

impl Session {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            current: watch::Sender::new(None),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.current.borrow().as_ref().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// Follow user changes (sign-in, sign-out, profile edits).
    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }

    /// Register a new account and sign it in.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        avatar: Option<&str>,
    ) -> Result<User> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(ValidationError::EmptyField("username").into());
        }
        if email.is_empty() {
            return Err(ValidationError::EmptyField("email").into());
        }

        if self.find_user("email", email).await?.is_some() {
            return Err(ValidationError::EmailTaken.into());
        }
        if self.find_user("username", username).await?.is_some() {
            return Err(ValidationError::UsernameTaken.into());
        }

        let row = to_row(&NewUserRow {
            username: username.to_string(),
            email: email.to_string(),
            avatar: Some(avatar.unwrap_or(DEFAULT_AVATAR).to_string()),
        })?;

        // A concurrent sign-up can pass the checks above; the store's unique
        // columns settle it.
        let stored = match self.store.insert(Table::Users, row).await {
            Ok(stored) => stored,
            Err(StoreError::Constraint(msg)) => {
                warn!(username, error = %msg, "sign-up lost a uniqueness race");
                return Err(taken(&msg).into());
            }
            Err(e) => return Err(e.into()),
        };
        let user = User::from(from_row::<UserRow>(stored)?);

        info!(user = %user.id, username = %user.username, "signed up");
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    /// Sign in the account registered under `email`.
    pub async fn sign_in(&self, email: &str) -> Result<User> {
        let user = self
            .find_user("email", email.trim())
            .await?
            .ok_or(ValidationError::UnknownEmail)?;

        info!(user = %user.id, username = %user.username, "signed in");
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }

    pub fn sign_out(&self) {
        if let Some(user) = self.current.send_replace(None) {
            info!(user = %user.id, "signed out");
        }
    }

    /// Change the signed-in user's username and/or avatar.
    pub async fn update_profile(
        &self,
        username: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<User> {
        let mut user = self
            .current_user()
            .ok_or(ValidationError::NotAuthenticated)?;

        let mut patch = Row::new();
        if let Some(name) = username.map(str::trim) {
            if name.is_empty() {
                return Err(ValidationError::EmptyField("username").into());
            }
            if name != user.username {
                if self.find_user("username", name).await?.is_some() {
                    return Err(ValidationError::UsernameTaken.into());
                }
                patch.insert("username".into(), name.into());
                user.username = name.to_string();
            }
        }
        if let Some(avatar) = avatar {
            patch.insert("avatar".into(), avatar.into());
            user.avatar = Some(avatar.to_string());
        }
        if patch.is_empty() {
            return Ok(user);
        }

        let key = Filter::all().eq("id", user.id.to_string());
        if let Err(e) = self.store.update(Table::Users, &key, patch).await {
            warn!(user = %user.id, error = %e, "profile update failed");
            return Err(e.into());
        }

        // Only publish if the same user is still signed in.
        self.current.send_if_modified(|current| match current {
            Some(u) if u.id == user.id => {
                *u = user.clone();
                true
            }
            _ => false,
        });
        Ok(user)
    }

    async fn find_user(&self, column: &str, value: &str) -> Result<Option<User>> {
        let filter = Filter::all().eq(column, value);
        match self.store.query_optional(Table::Users, &filter).await? {
            Some(row) => Ok(Some(User::from(from_row::<UserRow>(row)?))),
            None => Ok(None),
        }
    }
}

/// Which account field a unique-constraint violation on `users` is about.
fn taken(constraint: &str) -> ValidationError {
    if constraint.contains("email") {
        ValidationError::EmailTaken
    } else {
        ValidationError::UsernameTaken
    }
}
