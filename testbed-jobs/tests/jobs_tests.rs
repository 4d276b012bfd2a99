use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use testbed_job_queue::{Job, JobCallbacks, JobKind, JobQueue, QueueConfig};
use testbed_jobs::{
    bench_result, BenchConfig, BenchParams, BenchTarget, BenchmarkTask, CommandBenchRunner,
    JobResults, TestbedJob, TestbedTask,
};
use tokio::time::Instant;
use uuid::Uuid;

const TICK: Duration = Duration::from_secs(1);

fn bench_config(name: &str) -> BenchConfig {
    BenchConfig {
        name: name.into(),
        params: BenchParams {
            num_objects: 100,
            object_size: "1MiB".into(),
            duration: "1m".into(),
        },
        targets: BTreeMap::from([(
            "s3gw".into(),
            BenchTarget {
                image: "quay.io/s3gw/s3gw:latest".into(),
                args: None,
                port: 7480,
                access_key: "test".into(),
                secret_key: "test".into(),
            },
        )]),
    }
}

#[derive(Default)]
struct Events {
    started: Mutex<Vec<(Uuid, Instant)>>,
    finished: Mutex<Vec<(Uuid, Instant)>>,
}

fn recording(events: &Arc<Events>) -> JobCallbacks<TestbedTask> {
    let on_start = Arc::clone(events);
    let on_finish = Arc::clone(events);
    JobCallbacks::new(
        move |job: Arc<TestbedJob>| {
            let events = Arc::clone(&on_start);
            async move { events.started.lock().push((job.uuid(), Instant::now())) }
        },
        move |job: Arc<TestbedJob>| {
            let events = Arc::clone(&on_finish);
            async move { events.finished.lock().push((job.uuid(), Instant::now())) }
        },
    )
}

#[tokio::test(start_paused = true)]
async fn benchmark_with_missing_tool_fails_cleanly() {
    let queue: JobQueue<TestbedTask> = JobQueue::new(QueueConfig::default().with_tick(TICK));
    queue.start().unwrap();
    let events = Arc::new(Events::default());

    let runner = Arc::new(CommandBenchRunner::new("testbed-no-such-benchmark-tool"));
    let task = TestbedTask::from(BenchmarkTask::new(bench_config("t1"), runner));
    assert_eq!(task.kind(), JobKind::Benchmark);
    let job = Arc::new(Job::new(task));

    let submitted = Instant::now();
    queue
        .submit(Arc::clone(&job), JobKind::Benchmark, recording(&events))
        .await;
    tokio::time::sleep(TICK * 4).await;

    let started = events.started.lock().clone();
    let finished = events.finished.lock().clone();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].0, job.uuid());
    assert!(started[0].1 - submitted <= TICK);
    assert_eq!(finished.len(), 1);
    assert!(finished[0].1 - started[0].1 <= TICK);

    let outcome = job.results();
    assert!(outcome.is_error);
    assert_eq!(outcome.error.as_deref(), Some("tool not found"));
    assert!(matches!(outcome.results, JobResults::Benchmark(ref out) if out.results.is_empty()));

    let record = bench_result(&job).expect("benchmark record");
    assert!(record.is_error);
    assert_eq!(record.error.as_deref(), Some("tool not found"));
    assert_eq!(record.config.name, "t1");
    assert!(record.progress.is_done);

    queue.shutdown().await;
}

#[cfg(unix)]
#[tokio::test]
async fn command_runners_drive_scripts() {
    use std::os::unix::fs::PermissionsExt;
    use testbed_jobs::{
        BenchmarkRunner, ComplianceRunner, CommandComplianceRunner, ContainerConfig,
        ContainerSpec, TargetSpec, TargetState, TestsConfig,
    };

    let dir = tempfile::tempdir().unwrap();
    let write_script = |name: &str, body: &str| {
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_str().unwrap().to_owned()
    };
    let find_output = r#"out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; shift; fi
  shift
done
"#;

    let bench = write_script(
        "bench.sh",
        &format!(
            "{find_output}echo 'Preparing: 50.0%'\necho 'Benchmarking: 100%'\n\
             echo '[{{\"op\":\"PUT\",\"duration_ms\":2.0}}]' > \"$out\"\n"
        ),
    );
    let suite = write_script(
        "suite.sh",
        &format!(
            "{find_output}echo 'progress: 1/1'\n\
             echo '{{\"results\":[[\"test_bucket_list\",\"ok\"]],\"errors\":{{}}}}' > \"$out\"\n"
        ),
    );
    let failing = write_script("fail.sh", "echo 'bucket missing' >&2\nexit 3\n");

    let config = bench_config("script");
    let spec = TargetSpec {
        name: "s3gw".into(),
        target: config.targets["s3gw"].clone(),
        host_port: 54800,
    };
    let seen = Mutex::new(Vec::new());
    let progress = |state: TargetState, value: f64| seen.lock().push((state, value));

    let runner = CommandBenchRunner::new(bench);
    runner.check().await.unwrap();
    let samples = runner
        .run("run", &spec, &config.params, &progress)
        .await
        .unwrap();
    assert!(samples.contains("PUT"));
    assert_eq!(
        *seen.lock(),
        vec![(TargetState::Preparing, 50.0), (TargetState::Running, 100.0)]
    );

    let err = CommandBenchRunner::new(failing)
        .run("run", &spec, &config.params, &progress)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bucket missing"));

    let container = ContainerSpec {
        name: "s3tests-run".into(),
        host_port: 54801,
        container: ContainerConfig {
            image: "s3gw".into(),
            target_port: 7480,
        },
    };
    let counts = Mutex::new(None);
    let output = CommandComplianceRunner::new(suite)
        .run(
            "s3tests-run",
            &container,
            &TestsConfig::default(),
            &|total: u64, run: u64| *counts.lock() = Some((total, run)),
        )
        .await
        .unwrap();
    assert_eq!(output.results, vec![("test_bucket_list".into(), "ok".into())]);
    assert_eq!(*counts.lock(), Some((1, 1)));
}
