//! Repository records discovered through search

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Reasons a raw search node cannot become a [`Repository`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidRepository {
    #[error("repository id must be positive, got {0}")]
    NonPositiveId(i64),

    #[error("repository {0} is missing its name")]
    MissingName(i64),

    #[error("repository {0} is missing its owner")]
    MissingOwner(i64),

    #[error("repository {id} has a negative star count ({stars})")]
    NegativeStars { id: i64, stars: i64 },
}

/// One discovered repository
///
/// Identity is `id`; `owner/name` is only a display key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub url: String,
    pub stars: u32,
    pub created_at: Option<DateTime<Utc>>,
    pub primary_language: Option<String>,
    pub fork_count: Option<u32>,
    pub license_name: Option<String>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Repository {
    /// Builds a repository with only the required fields, checking invariants
    pub fn new(
        id: i64,
        name: impl Into<String>,
        owner: impl Into<String>,
        url: impl Into<String>,
        stars: i64,
    ) -> Result<Self, InvalidRepository> {
        let name = name.into();
        let owner = owner.into();

        if id <= 0 {
            return Err(InvalidRepository::NonPositiveId(id));
        }
        if name.trim().is_empty() {
            return Err(InvalidRepository::MissingName(id));
        }
        if owner.trim().is_empty() {
            return Err(InvalidRepository::MissingOwner(id));
        }
        if stars < 0 {
            return Err(InvalidRepository::NegativeStars { id, stars });
        }

        Ok(Self {
            id,
            name,
            owner,
            url: url.into(),
            stars: u32::try_from(stars).unwrap_or(u32::MAX),
            created_at: None,
            primary_language: None,
            fork_count: None,
            license_name: None,
            pushed_at: None,
            updated_at: None,
        })
    }

    /// Full `owner/name` identifier
    pub fn name_with_owner(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}
