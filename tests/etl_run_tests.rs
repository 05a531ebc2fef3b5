/// End-to-end runs of the extraction pipeline against an in-memory DuckDB
/// table and a recording delivery target.
///
/// Covers:
/// - First run and follow-up run windows
/// - No-op runs on an empty table
/// - Batching of delivered records
/// - Replay after a failed watermark write
/// - Delivery failures leaving the watermark untouched
/// - Mutual exclusion through the run lock
/// - Malformed rows being skipped
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use tsp_mysql::config::{Config, Settings};
use tsp_mysql::delivery::{
    Delivery, DeliveryError, MeasurementRecord, TRANSACTION_COUNT_METRIC, TRANSACTION_TIME_METRIC,
};
use tsp_mysql::pipeline::{EtlRunner, RunError, RunOutcome};
use tsp_mysql::source::{Connector, DataSource, DuckDbSource, LowerBound, SourceError};
use tsp_mysql::storage::{RunLock, Watermark, WatermarkStore};

#[cfg(test)]
mod tests {
    use super::*;

    fn wm(s: &str) -> Watermark {
        s.parse().unwrap()
    }

    /// Helper: config with state files inside `dir`
    fn config_in(dir: &Path, batch_size: usize) -> Config {
        let mut settings = Settings::default();
        settings.state.lock_file = dir.join("etl.lock");
        settings.state.last_record_file = dir.join("etl.last");
        settings.delivery.batch_size = batch_size;

        Config::from_lookup(settings, |key| match key {
            "TSI_APP_ID" => Some("shop".to_string()),
            _ => Some("unused".to_string()),
        })
        .unwrap()
    }

    /// Hands out clones of one in-memory database and counts connections.
    struct SharedConnector {
        source: DuckDbSource,
        connects: AtomicUsize,
    }

    impl SharedConnector {
        async fn with_rows(rows: &[(&str, i64, i64)]) -> Self {
            let source = DuckDbSource::in_memory().unwrap();
            source
                .execute_batch(
                    "CREATE TABLE ol_transactions (dt TIMESTAMP, total INTEGER, duration INTEGER);",
                )
                .await
                .unwrap();
            let connector = Self {
                source,
                connects: AtomicUsize::new(0),
            };
            connector.insert(rows).await;
            connector
        }

        async fn insert(&self, rows: &[(&str, i64, i64)]) {
            for (dt, total, duration) in rows {
                self.source
                    .execute_batch(&format!(
                        "INSERT INTO ol_transactions VALUES ('{dt}', {total}, {duration});"
                    ))
                    .await
                    .unwrap();
            }
        }

        fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for SharedConnector {
        async fn connect(&self) -> Result<Box<dyn DataSource>, SourceError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(self.source.clone()))
        }
    }

    struct FailingConnector;

    #[async_trait]
    impl Connector for FailingConnector {
        async fn connect(&self) -> Result<Box<dyn DataSource>, SourceError> {
            Err(SourceError::Connect("connection refused".to_string()))
        }
    }

    /// Records every submitted batch; can be told to fail a given batch.
    #[derive(Default)]
    struct RecordingDelivery {
        batches: Mutex<Vec<Vec<MeasurementRecord>>>,
        fail_on_batch: Option<usize>,
    }

    impl RecordingDelivery {
        fn batches(&self) -> Vec<Vec<MeasurementRecord>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Delivery for RecordingDelivery {
        async fn submit_batch(&self, batch: &[MeasurementRecord]) -> Result<(), DeliveryError> {
            let mut batches = self.batches.lock().unwrap();
            if self.fail_on_batch == Some(batches.len()) {
                return Err(DeliveryError::Api {
                    status: 502,
                    message: "bad gateway".to_string(),
                });
            }
            batches.push(batch.to_vec());
            Ok(())
        }
    }

    /// Tries to take the run lock from inside a delivery, i.e. mid-run.
    struct LockProbeDelivery {
        lock_path: std::path::PathBuf,
        saw_busy: Mutex<Vec<bool>>,
    }

    #[async_trait]
    impl Delivery for LockProbeDelivery {
        async fn submit_batch(&self, _batch: &[MeasurementRecord]) -> Result<(), DeliveryError> {
            let mut lock = RunLock::open(&self.lock_path).unwrap();
            let busy = lock.try_acquire().is_err();
            self.saw_busy.lock().unwrap().push(busy);
            Ok(())
        }
    }

    fn completed(outcome: RunOutcome) -> tsp_mysql::pipeline::RunReport {
        match outcome {
            RunOutcome::Completed(report) => report,
            other => panic!("expected a completed run, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_run_then_incremental_run() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 10);
        let connector = SharedConnector::with_rows(&[
            ("2016-04-05 10:00:00", 5, 100),
            ("2016-04-05 10:05:00", 7, 200),
            ("2016-04-05 10:10:00", 9, 300),
        ])
        .await;
        let delivery = RecordingDelivery::default();
        let runner = EtlRunner::new(&config, &connector, &delivery);

        // First run: inclusive of the table minimum.
        let report = completed(runner.run().await.unwrap());
        assert_eq!(report.window.min_dt, wm("2016-04-05 10:00:00"));
        assert_eq!(report.window.max_dt, wm("2016-04-05 10:10:00"));
        assert_eq!(report.window.lower, LowerBound::Inclusive);
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.records_sent, 6);
        assert_eq!(report.batches_sent, 1);

        let batches = delivery.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 6);
        let values: Vec<(&str, i64)> = batches[0].iter().map(|r| (r.metric, r.value)).collect();
        assert_eq!(
            values,
            vec![
                (TRANSACTION_COUNT_METRIC, 5),
                (TRANSACTION_TIME_METRIC, 100),
                (TRANSACTION_COUNT_METRIC, 7),
                (TRANSACTION_TIME_METRIC, 200),
                (TRANSACTION_COUNT_METRIC, 9),
                (TRANSACTION_TIME_METRIC, 300),
            ]
        );
        assert!(batches[0].iter().all(|r| r.properties.app_id == "shop"));

        let store = WatermarkStore::new(&config.state.last_record_file);
        assert_eq!(store.load().unwrap(), Some(wm("2016-04-05 10:10:00")));

        // Second run: only the new row, boundary row excluded.
        connector.insert(&[("2016-04-05 10:15:00", 4, 50)]).await;
        let report = completed(runner.run().await.unwrap());
        assert_eq!(report.window.min_dt, wm("2016-04-05 10:10:00"));
        assert_eq!(report.window.max_dt, wm("2016-04-05 10:15:00"));
        assert_eq!(report.window.lower, LowerBound::Exclusive);
        assert_eq!(report.rows_read, 1);
        assert_eq!(report.records_sent, 2);

        let batches = delivery.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 2);
        assert_eq!(batches[1][0].value, 4);
        assert_eq!(batches[1][1].value, 50);
        assert_eq!(store.load().unwrap(), Some(wm("2016-04-05 10:15:00")));
    }

    #[tokio::test]
    async fn test_rerun_without_new_rows_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 10);
        let connector = SharedConnector::with_rows(&[("2016-04-05 10:00:00", 1, 1)]).await;
        let delivery = RecordingDelivery::default();
        let runner = EtlRunner::new(&config, &connector, &delivery);

        completed(runner.run().await.unwrap());
        let report = completed(runner.run().await.unwrap());

        assert_eq!(report.rows_read, 0);
        assert_eq!(report.batches_sent, 0);
        assert_eq!(report.watermark, wm("2016-04-05 10:00:00"));
        assert_eq!(delivery.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_table_is_noop() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 10);
        let connector = SharedConnector::with_rows(&[]).await;
        let delivery = RecordingDelivery::default();

        let outcome = EtlRunner::new(&config, &connector, &delivery)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::NoOp);
        assert!(delivery.batches().is_empty());
        assert!(!config.state.last_record_file.exists());
    }

    #[tokio::test]
    async fn test_empty_table_keeps_existing_watermark() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 10);
        let store = WatermarkStore::new(&config.state.last_record_file);
        store.save(&wm("2016-04-05 09:00:00")).unwrap();

        let connector = SharedConnector::with_rows(&[]).await;
        let delivery = RecordingDelivery::default();
        let outcome = EtlRunner::new(&config, &connector, &delivery)
            .run()
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::NoOp);
        assert_eq!(store.load().unwrap(), Some(wm("2016-04-05 09:00:00")));
    }

    #[tokio::test]
    async fn test_records_split_into_batches() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 10);
        // 12 rows -> 24 records -> batches of 10, 10, 4
        let rows: Vec<(String, i64, i64)> = (0..12)
            .map(|i| (format!("2016-04-05 10:{:02}:00", i), i, i * 10))
            .collect();
        let rows: Vec<(&str, i64, i64)> = rows.iter().map(|(d, t, u)| (d.as_str(), *t, *u)).collect();
        let connector = SharedConnector::with_rows(&rows).await;
        let delivery = RecordingDelivery::default();

        let report = completed(
            EtlRunner::new(&config, &connector, &delivery)
                .run()
                .await
                .unwrap(),
        );

        assert_eq!(report.records_sent, 24);
        assert_eq!(report.batches_sent, 3);
        let sizes: Vec<usize> = delivery.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![10, 10, 4]);

        let counts: Vec<i64> = delivery
            .batches()
            .concat()
            .iter()
            .filter(|r| r.metric == TRANSACTION_COUNT_METRIC)
            .map(|r| r.value)
            .collect();
        assert_eq!(counts, (0..12).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_watermark() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 2);
        let connector = SharedConnector::with_rows(&[
            ("2016-04-05 10:00:00", 5, 100),
            ("2016-04-05 10:05:00", 7, 200),
        ])
        .await;
        let delivery = RecordingDelivery {
            fail_on_batch: Some(1),
            ..Default::default()
        };

        let err = EtlRunner::new(&config, &connector, &delivery)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Delivery(DeliveryError::Api { status: 502, .. })));
        assert_eq!(delivery.batches().len(), 1);
        assert!(!config.state.last_record_file.exists());

        // Lock was released: a healthy follow-up run re-extracts the whole window.
        let retry = RecordingDelivery::default();
        let report = completed(
            EtlRunner::new(&config, &connector, &retry)
                .run()
                .await
                .unwrap(),
        );
        assert_eq!(report.records_sent, 4);
        assert_eq!(report.window.lower, LowerBound::Inclusive);
    }

    #[tokio::test]
    async fn test_persist_failure_replays_same_records() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path(), 10);
        // The parent directory does not exist, so saving fails after delivery.
        config.state.last_record_file = dir.path().join("missing").join("etl.last");

        let connector = SharedConnector::with_rows(&[
            ("2016-04-05 10:00:00", 5, 100),
            ("2016-04-05 10:05:00", 7, 200),
        ])
        .await;

        let first = RecordingDelivery::default();
        let err = EtlRunner::new(&config, &connector, &first)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Persist(_)));

        let second = RecordingDelivery::default();
        let err = EtlRunner::new(&config, &connector, &second)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Persist(_)));

        assert_eq!(first.batches().concat().len(), 4);
        assert_eq!(first.batches(), second.batches());
    }

    #[tokio::test]
    async fn test_busy_lock_skips_run() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 10);
        let connector = SharedConnector::with_rows(&[("2016-04-05 10:00:00", 1, 1)]).await;
        let delivery = RecordingDelivery::default();

        let mut held = RunLock::open(&config.state.lock_file).unwrap();
        let guard = held.try_acquire().unwrap();

        let outcome = EtlRunner::new(&config, &connector, &delivery)
            .run()
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Busy);
        assert_eq!(connector.connects(), 0);
        assert!(delivery.batches().is_empty());
        assert!(!config.state.last_record_file.exists());

        drop(guard);
        completed(
            EtlRunner::new(&config, &connector, &delivery)
                .run()
                .await
                .unwrap(),
        );
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_lock_held_for_whole_run() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 1);
        let connector = SharedConnector::with_rows(&[("2016-04-05 10:00:00", 1, 1)]).await;
        let delivery = LockProbeDelivery {
            lock_path: config.state.lock_file.clone(),
            saw_busy: Mutex::new(Vec::new()),
        };

        completed(
            EtlRunner::new(&config, &connector, &delivery)
                .run()
                .await
                .unwrap(),
        );

        assert_eq!(delivery.saw_busy.into_inner().unwrap(), vec![true, true]);

        // Released afterwards.
        let mut lock = RunLock::open(&config.state.lock_file).unwrap();
        assert!(lock.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_connection_failure_releases_lock() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 10);
        let delivery = RecordingDelivery::default();

        let err = EtlRunner::new(&config, &FailingConnector, &delivery)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Connection(SourceError::Connect(_))));

        let mut lock = RunLock::open(&config.state.lock_file).unwrap();
        assert!(lock.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn test_corrupt_watermark_fails_run() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 10);
        std::fs::write(&config.state.last_record_file, "garbage").unwrap();
        let connector = SharedConnector::with_rows(&[("2016-04-05 10:00:00", 1, 1)]).await;
        let delivery = RecordingDelivery::default();

        let err = EtlRunner::new(&config, &connector, &delivery)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Persist(_)));
        assert_eq!(connector.connects(), 0);
        assert_eq!(
            std::fs::read_to_string(&config.state.last_record_file).unwrap(),
            "garbage"
        );
    }

    #[tokio::test]
    async fn test_malformed_rows_skipped() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), 10);

        let source = DuckDbSource::in_memory().unwrap();
        source
            .execute_batch(
                "CREATE TABLE ol_transactions (dt TIMESTAMP, total VARCHAR, duration VARCHAR);
                 INSERT INTO ol_transactions VALUES
                    ('2016-04-05 10:00:00', '5', '100'),
                    ('2016-04-05 10:05:00', 'n/a', '200'),
                    ('2016-04-05 10:07:00', '6', NULL),
                    ('2016-04-05 10:10:00', '9', '300');",
            )
            .await
            .unwrap();
        let connector = SharedConnector {
            source,
            connects: AtomicUsize::new(0),
        };
        let delivery = RecordingDelivery::default();

        let report = completed(
            EtlRunner::new(&config, &connector, &delivery)
                .run()
                .await
                .unwrap(),
        );

        assert_eq!(report.rows_read, 4);
        assert_eq!(report.rows_skipped, 2);
        assert_eq!(report.records_sent, 4);
        assert_eq!(report.watermark, wm("2016-04-05 10:10:00"));
    }
}
