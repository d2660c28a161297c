use anibridge::db::{NewJob, Store};
use anibridge::domain::{JobMode, JobStatus, Site};

async fn memory_store() -> Store {
    Store::new("sqlite::memory:").await.expect("open in-memory store")
}

fn naruto_job(id: &str) -> NewJob {
    NewJob {
        id: id.to_string(),
        mode: JobMode::Download,
        site: Site::Aniworld,
        slug: "naruto".to_string(),
        season: 1,
        episode: 1,
        language: "German Dub".to_string(),
        provider: Some("VOE".to_string()),
        title_hint: Some("Naruto".to_string()),
        absolute_number: None,
    }
}

#[tokio::test]
async fn a_freshly_submitted_job_starts_queued_and_walks_to_completed() {
    let store = memory_store().await;
    let job = store.insert_job(&naruto_job("job-1")).await.unwrap();
    assert_eq!(job.status, JobStatus::Queued.as_str());

    store.transition_job("job-1", JobStatus::Downloading, None, None).await.unwrap();
    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Downloading.as_str());

    store
        .transition_job("job-1", JobStatus::Completed, None, Some("/data/downloads/naruto.mkv".to_string()))
        .await
        .unwrap();
    let job = store.get_job("job-1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed.as_str());
    assert_eq!(job.result_path.as_deref(), Some("/data/downloads/naruto.mkv"));
    assert_eq!(job.progress_percent, 100.0);
}

#[tokio::test]
async fn a_completed_job_cannot_transition_back_to_downloading() {
    let store = memory_store().await;
    store.insert_job(&naruto_job("job-2")).await.unwrap();
    store.transition_job("job-2", JobStatus::Downloading, None, None).await.unwrap();
    store
        .transition_job("job-2", JobStatus::Completed, None, Some("out.mkv".to_string()))
        .await
        .unwrap();

    let err = store
        .transition_job("job-2", JobStatus::Downloading, None, None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("illegal transition"));
}

#[tokio::test]
async fn a_queued_job_cannot_jump_straight_to_completed() {
    let store = memory_store().await;
    store.insert_job(&naruto_job("job-3")).await.unwrap();

    let err = store
        .transition_job("job-3", JobStatus::Completed, None, Some("out.mkv".to_string()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("illegal transition"));
}

#[tokio::test]
async fn startup_reap_fails_every_non_terminal_job_left_from_a_previous_run() {
    let store = memory_store().await;
    store.insert_job(&naruto_job("dangling-1")).await.unwrap();
    store.insert_job(&naruto_job("dangling-2")).await.unwrap();
    store.transition_job("dangling-2", JobStatus::Downloading, None, None).await.unwrap();

    store.insert_job(&naruto_job("finished")).await.unwrap();
    store.transition_job("finished", JobStatus::Downloading, None, None).await.unwrap();
    store
        .transition_job("finished", JobStatus::Completed, None, Some("out.mkv".to_string()))
        .await
        .unwrap();

    let reaped = store.reap_dangling_jobs().await.unwrap();
    assert_eq!(reaped, 2);

    assert_eq!(store.get_job("dangling-1").await.unwrap().unwrap().status, JobStatus::Failed.as_str());
    assert_eq!(store.get_job("dangling-2").await.unwrap().unwrap().status, JobStatus::Failed.as_str());
    assert_eq!(store.get_job("finished").await.unwrap().unwrap().status, JobStatus::Completed.as_str());
}

#[tokio::test]
async fn jobs_completed_before_a_cutoff_are_listed_for_ttl_cleanup_and_newer_ones_are_not() {
    let store = memory_store().await;
    store.insert_job(&naruto_job("old")).await.unwrap();
    store.transition_job("old", JobStatus::Downloading, None, None).await.unwrap();
    store
        .transition_job("old", JobStatus::Completed, None, Some("/downloads/old.mkv".to_string()))
        .await
        .unwrap();

    store.insert_job(&naruto_job("fresh")).await.unwrap();
    store.transition_job("fresh", JobStatus::Downloading, None, None).await.unwrap();
    store
        .transition_job("fresh", JobStatus::Completed, None, Some("/downloads/fresh.mkv".to_string()))
        .await
        .unwrap();

    let far_future_cutoff = chrono::Utc::now() + chrono::Duration::hours(1);
    let due = store.list_jobs_completed_before(far_future_cutoff).await.unwrap();
    assert_eq!(due.len(), 2);

    let far_past_cutoff = chrono::Utc::now() - chrono::Duration::hours(1);
    let due = store.list_jobs_completed_before(far_past_cutoff).await.unwrap();
    assert!(due.is_empty());
}
