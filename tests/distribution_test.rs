//! Pool distribution and lifecycle scenarios, run against scripted browser
//! sessions so no real browser is needed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kw_scraper::{
    AgentManager, AppError, AppResult, BrowserSession, Config, ResultSink, SaveFormat,
    SessionFactory, StorageResult, TaskStatus, WorkDistributor,
};
use kw_scraper::session::Element;

/// A scripted session: every protocol step succeeds (or the availability
/// probe fails, when configured), each navigation taking `nav_delay`.
struct MockSession {
    nav_delay: Duration,
    available: bool,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn navigate(&self, _url: &str) -> AppResult<()> {
        tokio::time::sleep(self.nav_delay).await;
        Ok(())
    }

    async fn find(&self, selector: &str) -> AppResult<Element> {
        if selector.contains("przyciskWydruk") && !self.available {
            return Err(AppError::Automation(format!(
                "element '{}' not found",
                selector
            )));
        }
        Ok(Element {
            text: String::new(),
        })
    }

    async fn find_all(&self, selector: &str) -> AppResult<Vec<Element>> {
        if selector == "div.left" {
            Ok(["KW 1", "grunt", "ozn", "zapis", "", "Bielsko-Biała", "Jan Kowalski"]
                .iter()
                .map(|t| Element {
                    text: (*t).to_string(),
                })
                .collect())
        } else {
            Ok(Vec::new())
        }
    }

    async fn fill(&self, _selector: &str, _value: &str) -> AppResult<()> {
        Ok(())
    }

    async fn click(&self, _selector: &str) -> AppResult<()> {
        Ok(())
    }

    async fn page_content(&self) -> AppResult<String> {
        Ok("<html><body>rejestr</body></html>".to_string())
    }

    async fn print_pdf(&self) -> AppResult<Vec<u8>> {
        Ok(b"%PDF-1.4".to_vec())
    }

    async fn screenshot(&self, _path: &Path) -> AppResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> AppResult<()> {
        Ok(())
    }
}

struct MockFactory {
    nav_delay: Duration,
    available: bool,
    created: AtomicUsize,
}

impl MockFactory {
    fn new(nav_delay: Duration, available: bool) -> Self {
        Self {
            nav_delay,
            available,
            created: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn create(&self) -> AppResult<Box<dyn BrowserSession>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            nav_delay: self.nav_delay,
            available: self.available,
        }))
    }
}

/// In-memory sink recording every save call. When `existing` is set it
/// reports every artifact as already present.
#[derive(Default)]
struct MemorySink {
    saves: Mutex<Vec<(SaveFormat, String)>>,
    existing: bool,
}

impl ResultSink for MemorySink {
    fn save(&self, format: SaveFormat, _content: &[u8], filename: &str) -> StorageResult {
        self.saves
            .lock()
            .unwrap()
            .push((format, filename.to_string()));
        StorageResult::ok(PathBuf::from(format!("{}.{}", filename, format.extension())))
    }

    fn file_exists(&self, _filename: &str, _format: SaveFormat) -> bool {
        self.existing
    }

    fn file_path(&self, filename: &str, format: SaveFormat) -> PathBuf {
        PathBuf::from(format!("{}.{}", filename, format.extension()))
    }
}

fn test_config(worker_count: usize) -> Config {
    Config {
        worker_count,
        save_formats: vec!["html".to_string(), "json".to_string()],
        task_delay_ms: 0,
        settle_delay_ms: 0,
        progress_poll_ms: 20,
        ..Config::default()
    }
}

async fn test_distributor(
    worker_count: usize,
    factory: Arc<MockFactory>,
    sink: Arc<MemorySink>,
) -> WorkDistributor {
    WorkDistributor::with_collaborators(test_config(worker_count), factory, sink)
        .await
        .expect("distributor construction")
}

fn manager_only(worker_count: usize) -> (AgentManager, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::default());
    let factory = Arc::new(MockFactory::new(Duration::ZERO, true));
    let manager = AgentManager::new(
        Arc::new(test_config(worker_count)),
        factory,
        Arc::clone(&sink) as Arc<dyn ResultSink>,
    );
    (manager, sink)
}

#[tokio::test]
async fn four_tasks_two_agents_alternate() {
    let (manager, _sink) = manager_only(2);
    let a1 = manager.create_agent().await;
    let a2 = manager.create_agent().await;

    // agents never started, so queues only grow
    let t1 = manager.submit("BB1B/00000001/4").await;
    let t2 = manager.submit("BB1B/00000002/1").await;
    let t3 = manager.submit("BB1B/00000003/8").await;
    let t4 = manager.submit("BB1B/00000004/5").await;

    let assignments = manager.assignments().await;
    assert_eq!(assignments[&a1], vec![t1, t3]);
    assert_eq!(assignments[&a2], vec![t2, t4]);
}

#[tokio::test]
async fn queue_lengths_sum_to_batch_size() {
    let (manager, _sink) = manager_only(3);
    for _ in 0..3 {
        manager.create_agent().await;
    }

    let batch: Vec<String> = (0..7).map(|i| format!("BB1B/{:08}/0", i + 1)).collect();
    manager.submit_batch(batch).await;

    let statuses = manager.status_all().await;
    let queued: usize = statuses.values().map(|s| s.queue_len).sum();
    let completed: usize = statuses.values().map(|s| s.completed).sum();
    let failed: usize = statuses.values().map(|s| s.failed).sum();
    assert_eq!(queued + completed + failed, 7);
}

#[tokio::test]
async fn assignment_keeps_queue_spread_tight() {
    let (manager, _sink) = manager_only(3);
    for _ in 0..3 {
        manager.create_agent().await;
    }

    // after every single submit the max/min queue spread stays within 1
    for i in 0..10 {
        manager.submit(format!("BB1B/{:08}/0", i + 1)).await;
        let statuses = manager.status_all().await;
        let max = statuses.values().map(|s| s.queue_len).max().unwrap();
        let min = statuses.values().map(|s| s.queue_len).min().unwrap();
        assert!(max - min <= 1, "spread widened to {} after submit {}", max - min, i);
    }
}

#[tokio::test]
async fn unknown_agent_ids_are_noops() {
    let (manager, _sink) = manager_only(1);
    let id = manager.create_agent().await;
    manager.remove_agent(id).await;

    // second removal and start/stop of the gone agent must not panic
    manager.remove_agent(id).await;
    manager.start_agent(id).await;
    manager.stop_agent(id).await;
    assert!(manager.agent_status(id).await.is_none());
}

#[tokio::test]
async fn stop_waits_for_in_flight_task() {
    let factory = Arc::new(MockFactory::new(Duration::from_millis(300), true));
    let sink = Arc::new(MemorySink::default());
    let distributor = test_distributor(1, Arc::clone(&factory), Arc::clone(&sink)).await;

    distributor
        .start_processing(vec!["BB1B/00000001/4".to_string()])
        .await;
    // let the agent dequeue and get stuck in the slow navigation
    tokio::time::sleep(Duration::from_millis(100)).await;

    distributor.stop_processing().await;

    // stop returned only after the in-flight task resolved to a result
    let results = distributor.results().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, TaskStatus::Success);
}

#[tokio::test]
async fn wrong_control_digit_is_corrected_before_dispatch() {
    let factory = Arc::new(MockFactory::new(Duration::ZERO, true));
    let sink = Arc::new(MemorySink::default());
    let distributor = test_distributor(1, factory, Arc::clone(&sink)).await;

    distributor
        .start_processing(vec!["BB1B/00000001/9".to_string()])
        .await;
    let progress = distributor.wait_until_drained().await;
    distributor.stop_processing().await;

    assert_eq!(progress.completed, 1);
    let results = distributor.results().await;
    assert_eq!(results[0].kw_number, "BB1B/00000001/4");

    // artifacts were stored under the corrected number
    let saves = sink.saves.lock().unwrap();
    assert!(saves
        .iter()
        .all(|(_, filename)| filename == "BB1B.00000001.4"));
    assert_eq!(saves.len(), 2); // html + json
}

#[tokio::test]
async fn unavailable_content_fails_without_killing_agent() {
    let factory = Arc::new(MockFactory::new(Duration::ZERO, false));
    let sink = Arc::new(MemorySink::default());
    let distributor = test_distributor(1, factory, Arc::clone(&sink)).await;

    distributor
        .start_processing(vec![
            "BB1B/00000001/4".to_string(),
            "BB1B/00000002/1".to_string(),
        ])
        .await;
    let progress = distributor.wait_until_drained().await;
    distributor.stop_processing().await;

    // both tasks failed, the agent survived both
    assert_eq!(progress.failed, 2);
    assert_eq!(progress.completed, 0);
    let results = distributor.results().await;
    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.error.as_deref(), Some("content unavailable"));
    }
    assert!(sink.saves.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_number_fails_without_browser_io() {
    let factory = Arc::new(MockFactory::new(Duration::ZERO, true));
    let sink = Arc::new(MemorySink::default());
    let distributor = test_distributor(1, Arc::clone(&factory), Arc::clone(&sink)).await;

    // 'Q' is outside the court-code mapping table
    distributor
        .start_processing(vec!["QQ1Q/00000001/1".to_string()])
        .await;
    let progress = distributor.wait_until_drained().await;
    distributor.stop_processing().await;

    assert_eq!(progress.failed, 1);
    // the task failed during validation, so no session was ever opened
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn progress_total_is_monotone() {
    let factory = Arc::new(MockFactory::new(Duration::from_millis(20), true));
    let sink = Arc::new(MemorySink::default());
    let distributor = test_distributor(2, factory, sink).await;

    let batch: Vec<String> = (0..6).map(|i| format!("BB1B/{:08}/0", i + 1)).collect();
    distributor.start_processing(batch).await;

    let mut last_total = 0;
    loop {
        let progress = distributor.progress().await;
        assert!(
            progress.total >= last_total,
            "total dropped from {} to {}",
            last_total,
            progress.total
        );
        last_total = progress.total;
        if progress.is_drained() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    distributor.stop_processing().await;

    let final_progress = distributor.progress().await;
    assert_eq!(final_progress.total, 6);
    assert_eq!(final_progress.completed, 6);
    assert_eq!(final_progress.success_rate, Some(1.0));
}

#[tokio::test]
async fn second_batch_layers_onto_running_pool() {
    let factory = Arc::new(MockFactory::new(Duration::ZERO, true));
    let sink = Arc::new(MemorySink::default());
    let distributor = test_distributor(2, factory, sink).await;

    distributor
        .start_processing(vec!["BB1B/00000001/4".to_string()])
        .await;
    distributor
        .start_processing(vec!["BB1B/00000002/1".to_string()])
        .await;

    let progress = distributor.wait_until_drained().await;
    distributor.stop_processing().await;
    assert_eq!(progress.completed, 2);
}

#[tokio::test]
async fn pause_keeps_session_and_queue() {
    let factory = Arc::new(MockFactory::new(Duration::ZERO, true));
    let sink = Arc::new(MemorySink::default());
    let manager = AgentManager::new(
        Arc::new(test_config(1)),
        Arc::clone(&factory) as Arc<dyn SessionFactory>,
        sink as Arc<dyn ResultSink>,
    );
    let id = manager.create_agent().await;

    manager.start_agent(id).await;
    manager.submit("BB1B/00000001/4").await;
    loop {
        let status = manager.agent_status(id).await.unwrap();
        if status.completed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    manager.pause_agent(id).await;
    manager.submit("BB1B/00000002/1").await;
    let status = manager.agent_status(id).await.unwrap();
    assert!(!status.running);
    assert_eq!(status.queue_len, 1);

    // resume drains the task queued while paused, on the same session
    manager.start_agent(id).await;
    loop {
        let status = manager.agent_status(id).await.unwrap();
        if status.completed == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    manager.stop_agent(id).await;
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn existing_artifacts_are_skipped_without_browser_io() {
    let factory = Arc::new(MockFactory::new(Duration::ZERO, true));
    let sink = Arc::new(MemorySink {
        existing: true,
        ..MemorySink::default()
    });
    let config = Config {
        skip_existing: true,
        ..test_config(1)
    };
    let distributor =
        WorkDistributor::with_collaborators(
            config,
            Arc::clone(&factory) as Arc<dyn SessionFactory>,
            Arc::clone(&sink) as Arc<dyn ResultSink>,
        )
        .await
        .expect("distributor construction");

    distributor
        .start_processing(vec!["BB1B/00000001/4".to_string()])
        .await;
    let progress = distributor.wait_until_drained().await;
    distributor.stop_processing().await;

    // the complete on-disk copy satisfied the task without a session
    assert_eq!(progress.completed, 1);
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    assert!(sink.saves.lock().unwrap().is_empty());
    let results = distributor.results().await;
    assert_eq!(results[0].files.len(), 2); // html + json paths reported
}

#[tokio::test]
async fn sessions_are_opened_lazily_and_reused() {
    let factory = Arc::new(MockFactory::new(Duration::ZERO, true));
    let sink = Arc::new(MemorySink::default());
    let distributor = test_distributor(1, Arc::clone(&factory), sink).await;

    // nothing processed yet, so no session either
    assert_eq!(factory.created.load(Ordering::SeqCst), 0);

    let batch: Vec<String> = (0..3).map(|i| format!("BB1B/{:08}/0", i + 1)).collect();
    distributor.start_processing(batch).await;
    distributor.wait_until_drained().await;
    distributor.stop_processing().await;

    // one agent, three tasks, still a single session
    assert_eq!(factory.created.load(Ordering::SeqCst), 1);
}
