/// Job repository tests against a real PostgreSQL database
///
/// Tests cover:
/// - Enqueue and lookup
/// - Atomic claims (FIFO, concurrent workers)
/// - Guarded terminal transitions
/// - Release and stale-claim recovery
/// - Table constraints and statistics
///
/// Every test creates its own database from TEST_DATABASE_URL and is skipped
/// when that variable is unset.
mod utils;

use blunder_worker_lib::modules::analysis::{AnalysisResult, BlunderReport};
use blunder_worker_lib::modules::jobs::{
    abandoned_detail, JobRepository, JobRepositoryImpl, JobStatus, ReclaimOutcome,
};
use blunder_worker_lib::shared::errors::AppError;
use diesel::{Connection, RunQueryDsl};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use utils::db::TestDb;

fn setup() -> Option<(TestDb, Arc<JobRepositoryImpl>)> {
    let Some(db) = TestDb::try_new() else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return None;
    };
    let repo = Arc::new(JobRepositoryImpl::new(db.pool()));
    Some((db, repo))
}

fn sample_blunder() -> AnalysisResult {
    AnalysisResult::Blunder(BlunderReport {
        ply: 2,
        fen: "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1".to_string(),
        blunder_move: "e7e5".to_string(),
        blunder_san: "e5".to_string(),
        best_move: Some("c7c5".to_string()),
        evaluation_before: 10,
        evaluation_after: -160,
        swing: -170,
        mate_transition: false,
    })
}

// ================================================================================================
// ENQUEUE / CLAIM
// ================================================================================================

#[tokio::test]
async fn enqueue_and_retrieve_job() {
    let Some((_db, repo)) = setup() else { return };

    let job = repo.enqueue("MagnusCarlsen").await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.claim_count, 0);
    assert!(job.claimed_at.is_none());
    assert!(job.is_consistent());

    let stored = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.subject_handle, "MagnusCarlsen");
}

#[tokio::test]
async fn enqueue_rejects_invalid_handles() {
    let Some((_db, repo)) = setup() else { return };

    let err = repo.enqueue("a b").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(repo.get_statistics().await.unwrap().total_count, 0);
}

#[tokio::test]
async fn claim_marks_job_processing() {
    let Some((_db, repo)) = setup() else { return };
    let job = repo.enqueue("hikaru").await.unwrap();

    let claimed = repo.claim_next("worker-a").await.unwrap().expect("a pending job");
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.status, JobStatus::Processing);
    assert_eq!(claimed.claimed_by.as_deref(), Some("worker-a"));
    assert_eq!(claimed.claim_count, 1);
    assert!(claimed.claimed_at.is_some());

    assert!(repo.claim_next("worker-a").await.unwrap().is_none());
}

#[tokio::test]
async fn claims_oldest_job_first() {
    let Some((_db, repo)) = setup() else { return };
    let first = repo.enqueue("first").await.unwrap();
    let second = repo.enqueue("second").await.unwrap();

    assert_eq!(repo.claim_next("w").await.unwrap().unwrap().id, first.id);
    assert_eq!(repo.claim_next("w").await.unwrap().unwrap().id, second.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_hand_out_a_job_once() {
    let Some((_db, repo)) = setup() else { return };
    let job = repo.enqueue("hikaru").await.unwrap();

    let claims = (0..8).map(|n| {
        let repo = Arc::clone(&repo);
        tokio::spawn(async move { repo.claim_next(&format!("worker-{}", n)).await })
    });
    let results = futures::future::join_all(claims).await;

    let winners: Vec<_> = results
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .flatten()
        .collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].id, job.id);
    assert_eq!(winners[0].claim_count, 1);
}

// ================================================================================================
// TERMINAL TRANSITIONS
// ================================================================================================

#[tokio::test]
async fn complete_stores_the_verdict() {
    let Some((_db, repo)) = setup() else { return };
    let job = repo.enqueue("hikaru").await.unwrap();
    repo.claim_next("w").await.unwrap();

    let done = repo.complete(job.id, &sample_blunder()).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.completed_at.is_some());
    assert!(done.is_consistent());

    let stored = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.result, Some(sample_blunder()));
}

#[tokio::test]
async fn second_outcome_is_an_invalid_transition() {
    let Some((_db, repo)) = setup() else { return };
    let job = repo.enqueue("hikaru").await.unwrap();
    repo.claim_next("w").await.unwrap();
    repo.complete(job.id, &AnalysisResult::NoBlunder).await.unwrap();

    let again = repo.complete(job.id, &AnalysisResult::NoBlunder).await.unwrap_err();
    assert!(matches!(
        again,
        AppError::InvalidTransition { ref from, ref to, .. } if from == "COMPLETED" && to == "COMPLETED"
    ));

    let fail = repo.fail(job.id, "too late").await.unwrap_err();
    assert!(matches!(fail, AppError::InvalidTransition { .. }));

    let stored = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.error_detail.is_none());
}

#[tokio::test]
async fn unclaimed_job_cannot_be_finished() {
    let Some((_db, repo)) = setup() else { return };
    let job = repo.enqueue("hikaru").await.unwrap();

    let err = repo.fail(job.id, "nope").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { ref from, .. } if from == "PENDING"));
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let Some((_db, repo)) = setup() else { return };

    let err = repo
        .complete(uuid::Uuid::new_v4(), &AnalysisResult::NoBlunder)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn fail_records_detail() {
    let Some((_db, repo)) = setup() else { return };
    let job = repo.enqueue("hikaru").await.unwrap();
    repo.claim_next("w").await.unwrap();

    let failed = repo.fail(job.id, "[not_found] Player 'hikaru' not found").await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.result.is_none());
    assert_eq!(
        failed.error_detail.as_deref(),
        Some("[not_found] Player 'hikaru' not found")
    );
}

#[tokio::test]
async fn blocked_write_leaves_the_runtime_free() {
    let Some((db, repo)) = setup() else { return };
    let job = repo.enqueue("hikaru").await.unwrap();
    repo.claim_next("w").await.unwrap();

    // Another session holds the row lock so `complete` has to wait for it
    let (locked_tx, locked_rx) = mpsc::channel();
    let pool = db.pool();
    let job_id = job.id;
    let holder = std::thread::spawn(move || {
        let mut conn = pool.get().unwrap();
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::sql_query(format!(
                "SELECT id FROM analysis_jobs WHERE id = '{}' FOR UPDATE",
                job_id
            ))
            .execute(conn)?;
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(800));
            Ok(())
        })
        .unwrap();
    });
    locked_rx.recv().unwrap();

    let writer = {
        let repo = Arc::clone(&repo);
        tokio::spawn(async move { repo.complete(job_id, &AnalysisResult::NoBlunder).await })
    };

    // Single-threaded runtime: the timer only fires on time if the writer yields
    let started = Instant::now();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "timer delayed to {:?} while the write waited on the lock",
        started.elapsed()
    );

    let done = writer.await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    holder.join().unwrap();
}

#[tokio::test]
async fn table_rejects_inconsistent_rows() {
    let Some((db, repo)) = setup() else { return };
    let job = repo.enqueue("hikaru").await.unwrap();

    let result = db.try_execute(&format!(
        "UPDATE analysis_jobs SET status = 'COMPLETED' WHERE id = '{}'",
        job.id
    ));
    assert!(result.is_err(), "COMPLETED without a result must violate a CHECK");
}

// ================================================================================================
// RECOVERY
// ================================================================================================

#[tokio::test]
async fn release_returns_job_to_queue() {
    let Some((_db, repo)) = setup() else { return };
    let job = repo.enqueue("hikaru").await.unwrap();
    repo.claim_next("w").await.unwrap();

    repo.release(job.id).await.unwrap();
    let stored = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
    assert!(stored.claimed_by.is_none());

    let again = repo.claim_next("w2").await.unwrap().unwrap();
    assert_eq!(again.claim_count, 2);

    repo.complete(job.id, &AnalysisResult::NoBlunder).await.unwrap();
    assert!(repo.release(job.id).await.is_err());
}

#[tokio::test]
async fn reclaim_requeues_or_fails_expired_claims() {
    let Some((db, repo)) = setup() else { return };
    let stale = repo.enqueue("stale").await.unwrap();
    let crashy = repo.enqueue("crashy").await.unwrap();
    let fresh = repo.enqueue("fresh").await.unwrap();
    for _ in 0..3 {
        repo.claim_next("w").await.unwrap();
    }

    db.execute(&format!(
        "UPDATE analysis_jobs SET claimed_at = NOW() - INTERVAL '2 hours' WHERE id IN ('{}', '{}')",
        stale.id, crashy.id
    ));
    db.execute(&format!(
        "UPDATE analysis_jobs SET claim_count = 5 WHERE id = '{}'",
        crashy.id
    ));

    let outcome = repo.reclaim_stale(Duration::from_secs(3600), 3).await.unwrap();
    assert_eq!(outcome, ReclaimOutcome { requeued: 1, failed: 1 });

    let stale = repo.get_by_id(stale.id).await.unwrap().unwrap();
    assert_eq!(stale.status, JobStatus::Pending);
    assert!(stale.claimed_at.is_none());

    let crashy = repo.get_by_id(crashy.id).await.unwrap().unwrap();
    assert_eq!(crashy.status, JobStatus::Failed);
    assert_eq!(crashy.error_detail, Some(abandoned_detail(5)));

    let fresh = repo.get_by_id(fresh.id).await.unwrap().unwrap();
    assert_eq!(fresh.status, JobStatus::Processing);
}

#[tokio::test]
async fn statistics_count_each_status() {
    let Some((_db, repo)) = setup() else { return };
    let a = repo.enqueue("alpha").await.unwrap();
    let b = repo.enqueue("bravo").await.unwrap();
    repo.enqueue("charlie").await.unwrap();
    repo.enqueue("delta").await.unwrap();

    repo.claim_next("w").await.unwrap();
    repo.claim_next("w").await.unwrap();
    repo.claim_next("w").await.unwrap();
    repo.complete(a.id, &AnalysisResult::NoBlunder).await.unwrap();
    repo.fail(b.id, "[api_error] HTTP 403").await.unwrap();

    let stats = repo.get_statistics().await.unwrap();
    assert_eq!(stats.pending_count, 1);
    assert_eq!(stats.processing_count, 1);
    assert_eq!(stats.completed_count, 1);
    assert_eq!(stats.failed_count, 1);
    assert_eq!(stats.total_count, 4);
}
