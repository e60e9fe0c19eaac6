//! End-to-end control plane scenarios over the in-memory store.

use marquee_control::{
    AccessDecisionSequencer, CasOutcome, ConcurrencyGuard, DecisionCode, RateLimiter,
};
use marquee_core::config::LimiterConfig;
use marquee_core::model::{Movie, MovieDetails, Runtime};
use marquee_core::store::{MovieStore, VersionedStore};
use marquee_core::MemoryStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;

type MovieGuard = ConcurrencyGuard<Movie, dyn MovieStore>;

async fn movie_at_version(store: &Arc<MemoryStore>, version: i32) -> Movie {
    let mut movie = store
        .insert_movie(&MovieDetails {
            title: "Black Panther".to_string(),
            year: 2018,
            runtime: Runtime(134),
            genres: vec!["action".to_string(), "adventure".to_string()],
        })
        .await
        .unwrap();
    while movie.version < version {
        let next = VersionedStore::<Movie>::conditional_update(&**store, &movie, movie.version)
            .await
            .unwrap()
            .unwrap();
        movie.version = next;
    }
    movie
}

/// rps=2, burst=4: four quick requests pass, the fifth is refused, and one
/// second later exactly two more pass.
#[test]
fn test_limiter_scenario() {
    let limiter = RateLimiter::new(&LimiterConfig {
        enabled: true,
        rps: 2.0,
        burst: 4,
        sweep_interval: Duration::from_secs(60),
    });
    let t0 = Instant::now();
    let client = "10.0.0.1";

    for i in 0..4u64 {
        assert!(limiter.admit_at(client, t0 + Duration::from_millis(i * 2)).unwrap());
    }
    assert!(!limiter.admit_at(client, t0 + Duration::from_millis(10)).unwrap());

    let later = t0 + Duration::from_millis(1010);
    assert!(limiter.admit_at(client, later).unwrap());
    assert!(limiter.admit_at(client, later).unwrap());
    assert!(!limiter.admit_at(client, later).unwrap());
}

/// A client silent for more than three sweep intervals is forgotten.
#[test]
fn test_idle_client_eviction() {
    let limiter = RateLimiter::new(&LimiterConfig::default());
    let t0 = Instant::now();
    limiter.admit_at("10.0.0.1:51000", t0).unwrap();
    assert_eq!(limiter.tracked_clients(), 1);

    limiter.sweep_at(t0 + Duration::from_secs(3 * 60 + 1)).unwrap();
    assert_eq!(limiter.tracked_clients(), 0);
}

/// Client A and client B both read version 3. A commits version 4; B conflicts.
#[tokio::test]
async fn test_sequential_lost_update_is_a_conflict() {
    let store = Arc::new(MemoryStore::new());
    let movie = movie_at_version(&store, 3).await;
    assert_eq!(movie.version, 3);

    let movies: Arc<dyn MovieStore> = store.clone();
    let guard: MovieGuard = ConcurrencyGuard::new(movies);

    let a = guard
        .compare_and_swap(movie.id, 3, |m: &mut Movie| {
            m.details.runtime = Runtime(135);
            Ok::<_, ()>(())
        })
        .await
        .unwrap();
    let updated = AccessDecisionSequencer::settle(a).unwrap();
    assert_eq!(updated.version, 4);

    let b = guard
        .compare_and_swap(movie.id, 3, |m: &mut Movie| {
            m.details.title = "Black Panther II".to_string();
            Ok::<_, ()>(())
        })
        .await
        .unwrap();
    assert_eq!(b, CasOutcome::Conflict);
    assert_eq!(
        AccessDecisionSequencer::settle(b).unwrap_err().code(),
        DecisionCode::Conflict
    );

    let stored = VersionedStore::<Movie>::get(&*store, movie.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, 4);
    assert_eq!(stored.details.title, "Black Panther");
    assert_eq!(stored.details.runtime, Runtime(135));
}

/// Many writers racing on the same version: exactly one wins.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_one_winner() {
    let store = Arc::new(MemoryStore::new());
    let movie = movie_at_version(&store, 3).await;
    let movies: Arc<dyn MovieStore> = store.clone();
    let guard: MovieGuard = ConcurrencyGuard::new(movies);

    let writers = 8;
    let barrier = Arc::new(Barrier::new(writers));
    let mut handles = Vec::new();
    for n in 0..writers {
        let guard = guard.clone();
        let barrier = barrier.clone();
        let id = movie.id;
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            guard
                .compare_and_swap(id, 3, move |m: &mut Movie| {
                    m.details.title = format!("writer {n}");
                    Ok::<_, ()>(())
                })
                .await
                .unwrap()
        }));
    }

    let mut committed = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            CasOutcome::Committed(m) => {
                assert_eq!(m.version, 4);
                committed += 1;
            }
            CasOutcome::Conflict => conflicts += 1,
            CasOutcome::NotFound => panic!("movie vanished"),
        }
    }
    assert_eq!(committed, 1);
    assert_eq!(conflicts, writers - 1);

    let stored = VersionedStore::<Movie>::get(&*store, movie.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, 4);
}

/// After a delete, a writer still holding the old version sees NotFound.
#[tokio::test]
async fn test_deleted_record_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let movie = movie_at_version(&store, 2).await;
    let movies: Arc<dyn MovieStore> = store.clone();
    let guard: MovieGuard = ConcurrencyGuard::new(movies);

    store.delete_movie(movie.id).await.unwrap();
    let outcome = guard
        .compare_and_swap(movie.id, 2, |_m: &mut Movie| Ok::<_, ()>(()))
        .await
        .unwrap();
    assert_eq!(outcome, CasOutcome::NotFound);
}
