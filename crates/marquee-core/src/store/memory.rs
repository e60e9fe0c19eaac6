//! In-process store backing every persistence trait.

use super::{
    MovieStore, PermissionStore, StoreDiagnostics, StoreError, TokenStore, UserStore,
    VersionedStore,
};
use crate::model::{
    Metadata, Movie, MovieDetails, MovieQuery, NewUser, PERMISSION_MOVIES_READ,
    PERMISSION_MOVIES_WRITE, Scope, SortColumn, SortDirection, TokenHash, TokenRecord, User,
};
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

const KNOWN_PERMISSIONS: &[&str] = &[PERMISSION_MOVIES_READ, PERMISSION_MOVIES_WRITE];

#[derive(Default)]
struct Inner {
    next_user_id: i64,
    users: BTreeMap<i64, User>,
    tokens: HashMap<TokenHash, TokenRecord>,
    permissions: BTreeMap<i64, BTreeSet<String>>,
    next_movie_id: i64,
    movies: BTreeMap<i64, Movie>,
}

/// Users, tokens, permissions and movies held behind one mutex.
///
/// [`MemoryStore::set_unavailable`] makes every call fail with
/// [`StoreError::Backend`], standing in for a lost database.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Number of stored tokens, live or expired.
    pub fn token_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.tokens.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::backend_msg("memory store marked unavailable"));
        }
        self.inner
            .lock()
            .map_err(|e| StoreError::backend_msg(format!("memory store lock poisoned: {e}")))
    }
}

impl StoreDiagnostics for MemoryStore {}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, record: &TokenRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.tokens.insert(record.hash, record.clone());
        Ok(())
    }

    async fn find_token(
        &self,
        hash: &TokenHash,
        scope: Scope,
    ) -> Result<Option<TokenRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .tokens
            .get(hash)
            .filter(|record| record.scope == scope)
            .cloned())
    }

    async fn delete_tokens_for_user(&self, scope: Scope, user_id: i64) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        let before = inner.tokens.len();
        inner
            .tokens
            .retain(|_, record| !(record.scope == scope && record.user_id == user_id));
        Ok((before - inner.tokens.len()) as u64)
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Vec<String>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .permissions
            .get(&user_id)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn grant_permissions(&self, user_id: i64, codes: &[String]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let granted = inner.permissions.entry(user_id).or_default();
        for code in codes {
            if KNOWN_PERMISSIONS.contains(&code.as_str()) {
                granted.insert(code.clone());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VersionedStore<User> for MemoryStore {
    async fn get(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn conditional_update(
        &self,
        record: &User,
        expected_version: i32,
    ) -> Result<Option<i32>, StoreError> {
        let mut inner = self.lock()?;
        let email_taken = inner.users.values().any(|u| {
            u.id != record.id && u.email.eq_ignore_ascii_case(&record.email)
        });
        let Some(stored) = inner.users.get_mut(&record.id) else {
            return Ok(None);
        };
        if stored.version != expected_version {
            return Ok(None);
        }
        if email_taken {
            return Err(StoreError::DuplicateEmail);
        }
        stored.name = record.name.clone();
        stored.email = record.email.clone();
        stored.password_hash = record.password_hash.clone();
        stored.activated = record.activated;
        stored.version += 1;
        Ok(Some(stored.version))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock()?;
        if inner
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::DuplicateEmail);
        }
        inner.next_user_id += 1;
        let stored = User {
            id: inner.next_user_id,
            created_at: Utc::now(),
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            activated: user.activated,
            version: 1,
        };
        inner.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl VersionedStore<Movie> for MemoryStore {
    async fn get(&self, id: i64) -> Result<Option<Movie>, StoreError> {
        Ok(self.lock()?.movies.get(&id).cloned())
    }

    async fn conditional_update(
        &self,
        record: &Movie,
        expected_version: i32,
    ) -> Result<Option<i32>, StoreError> {
        let mut inner = self.lock()?;
        match inner.movies.get_mut(&record.id) {
            Some(stored) if stored.version == expected_version => {
                stored.details = record.details.clone();
                stored.version += 1;
                Ok(Some(stored.version))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl MovieStore for MemoryStore {
    async fn insert_movie(&self, details: &MovieDetails) -> Result<Movie, StoreError> {
        let mut inner = self.lock()?;
        inner.next_movie_id += 1;
        let movie = Movie {
            id: inner.next_movie_id,
            created_at: Utc::now(),
            details: details.clone(),
            version: 1,
        };
        inner.movies.insert(movie.id, movie.clone());
        Ok(movie)
    }

    async fn delete_movie(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.lock()?.movies.remove(&id).is_some())
    }

    async fn list_movies(&self, query: &MovieQuery) -> Result<(Vec<Movie>, Metadata), StoreError> {
        let inner = self.lock()?;
        let words: Vec<String> = query
            .title
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();

        let mut matched: Vec<&Movie> = inner
            .movies
            .values()
            .filter(|movie| {
                let title = movie.details.title.to_lowercase();
                let title_words: Vec<&str> = title.split_whitespace().collect();
                words.iter().all(|w| title_words.contains(&w.as_str()))
            })
            .filter(|movie| query.genres.iter().all(|g| movie.details.genres.contains(g)))
            .collect();

        let sort = query.filters.sort();
        matched.sort_by(|a, b| {
            let primary = match sort.column {
                SortColumn::Id => a.id.cmp(&b.id),
                SortColumn::Title => a.details.title.cmp(&b.details.title),
                SortColumn::Year => a.details.year.cmp(&b.details.year),
                SortColumn::Runtime => a.details.runtime.cmp(&b.details.runtime),
            };
            let primary = match sort.direction {
                SortDirection::Asc => primary,
                SortDirection::Desc => primary.reverse(),
            };
            match primary {
                Ordering::Equal => a.id.cmp(&b.id),
                other => other,
            }
        });

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(query.filters.offset().max(0) as usize)
            .take(query.filters.limit().max(0) as usize)
            .cloned()
            .collect();
        let metadata = Metadata::calculate(total, query.filters.page, query.filters.page_size);
        Ok((page, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Filters, PasswordHash, Runtime};
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: PasswordHash::new("hash"),
            activated: false,
        }
    }

    fn details(title: &str, year: i32, genres: &[&str]) -> MovieDetails {
        MovieDetails {
            title: title.to_string(),
            year,
            runtime: Runtime(100),
            genres: genres.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_case_insensitive() {
        let store = MemoryStore::new();
        store.insert_user(&new_user("alice@example.com")).await.unwrap();
        let err = store
            .insert_user(&new_user("ALICE@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn test_conditional_update_bumps_version_once() {
        let store = MemoryStore::new();
        let mut user = store.insert_user(&new_user("bob@example.com")).await.unwrap();
        user.activated = true;

        let first = VersionedStore::<User>::conditional_update(&store, &user, 1).await.unwrap();
        assert_eq!(first, Some(2));
        let stale = VersionedStore::<User>::conditional_update(&store, &user, 1).await.unwrap();
        assert_eq!(stale, None);

        let stored = VersionedStore::<User>::get(&store, user.id).await.unwrap().unwrap();
        assert!(stored.activated);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn test_tokens_are_scoped_and_revocable() {
        let store = MemoryStore::new();
        let expiry = Utc::now() + Duration::hours(1);
        for (byte, scope) in [(1u8, Scope::Activation), (2, Scope::Activation), (3, Scope::Authentication)] {
            store
                .insert_token(&TokenRecord {
                    hash: TokenHash::from_bytes([byte; 32]),
                    user_id: 9,
                    scope,
                    expiry,
                })
                .await
                .unwrap();
        }

        let hash = TokenHash::from_bytes([1; 32]);
        assert!(store.find_token(&hash, Scope::Activation).await.unwrap().is_some());
        assert!(store.find_token(&hash, Scope::Authentication).await.unwrap().is_none());

        let removed = store.delete_tokens_for_user(Scope::Activation, 9).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.token_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_permissions_are_ignored() {
        let store = MemoryStore::new();
        store
            .grant_permissions(5, &["movies:read".to_string(), "admin".to_string()])
            .await
            .unwrap();
        assert_eq!(store.permissions_for_user(5).await.unwrap(), vec!["movies:read"]);
        assert!(store.permissions_for_user(6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.permissions_for_user(1).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        store.set_unavailable(false);
        assert!(store.permissions_for_user(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_pages() {
        let store = MemoryStore::new();
        store.insert_movie(&details("The Club", 1999, &["drama"])).await.unwrap();
        store.insert_movie(&details("Black Panther", 2018, &["action", "adventure"])).await.unwrap();
        store.insert_movie(&details("Moana", 2016, &["animation", "adventure"])).await.unwrap();

        let query = MovieQuery {
            title: String::new(),
            genres: vec!["adventure".to_string()],
            filters: Filters {
                sort: "-year".to_string(),
                ..Filters::default()
            },
        };
        let (movies, metadata) = store.list_movies(&query).await.unwrap();
        let titles: Vec<&str> = movies.iter().map(|m| m.details.title.as_str()).collect();
        assert_eq!(titles, vec!["Black Panther", "Moana"]);
        assert_eq!(metadata.total_records, 2);

        let query = MovieQuery {
            title: "club".to_string(),
            ..MovieQuery::default()
        };
        let (movies, _) = store.list_movies(&query).await.unwrap();
        assert_eq!(movies.len(), 1);

        let query = MovieQuery {
            filters: Filters {
                page: 2,
                page_size: 2,
                sort: "id".to_string(),
            },
            ..MovieQuery::default()
        };
        let (movies, metadata) = store.list_movies(&query).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(metadata.last_page, 2);
        assert_eq!(metadata.current_page, 2);
    }

    #[tokio::test]
    async fn test_delete_movie() {
        let store = MemoryStore::new();
        let movie = store.insert_movie(&details("Heat", 1995, &["crime"])).await.unwrap();
        assert!(store.delete_movie(movie.id).await.unwrap());
        assert!(!store.delete_movie(movie.id).await.unwrap());
        assert!(VersionedStore::<Movie>::get(&store, movie.id).await.unwrap().is_none());
    }
}
