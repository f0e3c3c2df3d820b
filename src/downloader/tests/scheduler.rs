use super::*;

#[tokio::test]
async fn admits_in_order_up_to_capacity() {
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = Arc::new(ScriptedFetcher::gated(gate.clone()));
    let (downloader, dir) =
        create_test_downloader(2, fetcher, Arc::new(CopyingTagger::default())).await;
    let dest = dir.path().join("downloads");

    let ids = downloader.add_jobs(jobs(&dest, 3)).await.unwrap();
    wait_for_status(&downloader, ids[1], Status::Downloading).await;

    assert_eq!(downloader.slots().await, vec![Some(ids[0]), Some(ids[1])]);
    assert_eq!(downloader.queued().await, vec![ids[2]]);
    assert_eq!(downloader.task(ids[2]).await.unwrap().status, Status::Pending);

    gate.add_permits(1000);
    wait_idle(&downloader).await;
    for id in ids {
        assert_eq!(downloader.task(id).await.unwrap().status, Status::Completed);
    }
}

#[tokio::test]
async fn never_exceeds_capacity() {
    let fetcher = Arc::new(ScriptedFetcher::new().with_step_delay(Duration::from_millis(2)));
    let (downloader, dir) =
        create_test_downloader(3, fetcher.clone(), Arc::new(CopyingTagger::default())).await;
    let dest = dir.path().join("downloads");

    let ids = downloader.add_jobs(jobs(&dest, 10)).await.unwrap();
    wait_idle(&downloader).await;

    assert!(fetcher.max_active() <= 3, "max active {}", fetcher.max_active());
    assert_eq!(fetcher.calls().len(), 10);
    let stats = downloader.stats().await;
    assert_eq!(stats.completed, ids.len());
    assert_eq!(stats.active, 0);
    assert!(downloader.is_finished().await);
}

#[tokio::test]
async fn started_events_carry_lowest_free_slot() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (downloader, dir) =
        create_test_downloader(2, fetcher, Arc::new(CopyingTagger::default())).await;
    let mut events = downloader.subscribe();
    let dest = dir.path().join("downloads");

    let ids = downloader.add_jobs(jobs(&dest, 2)).await.unwrap();
    let seen = collect_until(&mut events, |e| {
        matches!(e, Event::Started { id, .. } if *id == ids[1])
    })
    .await;

    let started: Vec<(TaskId, usize, bool)> = seen
        .iter()
        .filter_map(|e| match e {
            Event::Started { id, slot, resumed } => Some((*id, *slot, *resumed)),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![(ids[0], 0, false), (ids[1], 1, false)]);
    wait_idle(&downloader).await;
}

#[tokio::test]
async fn failed_task_frees_its_slot() {
    let fetcher = Arc::new(ScriptedFetcher::new().fail_on("https://example.com/0"));
    let (downloader, dir) =
        create_test_downloader(1, fetcher, Arc::new(CopyingTagger::default())).await;
    let dest = dir.path().join("downloads");

    let ids = downloader.add_jobs(jobs(&dest, 2)).await.unwrap();
    wait_idle(&downloader).await;

    let failed = downloader.task(ids[0]).await.unwrap();
    assert_eq!(failed.status, Status::Error);
    assert!(failed.status_text().contains("HTTP Error 404"));
    assert_eq!(downloader.task(ids[1]).await.unwrap().status, Status::Completed);
}

#[tokio::test]
async fn existing_artifact_is_not_fetched_again() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let tagger = Arc::new(CopyingTagger::default());
    let (downloader, dir) = create_test_downloader(2, fetcher.clone(), tagger.clone()).await;
    let dest = dir.path().join("downloads");
    std::fs::write(dest.join("Job 0.mp4"), b"existing").unwrap();

    let ids = downloader.add_jobs(jobs(&dest, 2)).await.unwrap();
    wait_idle(&downloader).await;

    let skipped = downloader.task(ids[0]).await.unwrap();
    assert_eq!(skipped.status_text(), "Completed (Exists)");
    assert!(fetcher.calls_for("https://example.com/0").is_empty());
    assert_eq!(fetcher.calls_for("https://example.com/1").len(), 1);
    assert_eq!(tagger.runs(), 1);
    assert_eq!(std::fs::read(dest.join("Job 0.mp4")).unwrap(), b"existing");
}

#[tokio::test]
async fn tag_failure_still_completes() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let (downloader, dir) = create_test_downloader(1, fetcher, Arc::new(FailingTagger)).await;
    let dest = dir.path().join("downloads");

    let id = downloader.add_job(jobs(&dest, 1).remove(0)).await.unwrap();
    wait_idle(&downloader).await;

    let info = downloader.task(id).await.unwrap();
    assert_eq!(info.status_text(), "Completed (No Metadata)");
    assert!(matches!(info.metadata, MetadataStatus::Failed(_)));
    assert_eq!(std::fs::read(dest.join("Job 0.mp4")).unwrap(), vec![b'x'; 1000]);
    assert!(!dest.join("Job 0_meta.mp4").exists());
}
