use asyncerator::config::RetryOptions;
use asyncerator::prelude::*;
use asyncerator::{all, from_reader, operator, series, sink, worker};
use futures_lite::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn sequence_fills_gaps_between_slow_values() {
    let slow = all([(25u64, 123), (40, 456)].map(|(ms, value)| async move {
        sleep(Duration::from_millis(ms)).await;
        Ok::<_, Error>(value)
    }));
    let out = pipeline!(
        slow,
        operator::sequence(|index| async move {
            sleep(Duration::from_millis(17)).await;
            Ok::<_, Error>(index as i32)
        }),
        sink::to_array
    )
    .await
    .unwrap();
    assert_eq!(out, [0, 123, 1, 456]);
}

#[tokio::test]
async fn sequence_ignores_ready_input() {
    let out = pipeline!(
        vec![-1, -2, -3],
        operator::sequence(|index| async move { Ok::<_, Error>(index as i32) }),
        sink::to_array
    )
    .await
    .unwrap();
    assert_eq!(out, [-1, -2, -3]);
}

#[tokio::test]
async fn reader_to_writer() {
    let input = Cursor::new(b"alpha\nbeta\ngamma".to_vec());
    let mut written = Vec::new();
    pipeline!(
        from_reader(input),
        operator::split("\n", None),
        operator::race(|line: String| async move {
            Ok::<_, Error>(format!("{}:{}\n", line, line.len()))
        }),
        sink::to_writer(Cursor::new(&mut written))
    )
    .await
    .unwrap();

    let text = String::from_utf8(written).unwrap();
    let mut lines: Vec<_> = text.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, ["alpha:5", "beta:4", "gamma:5"]);
}

#[tokio::test]
async fn retried_workers_inside_race() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let flaky = move |n: u32| {
        let first = counter.fetch_add(1, Ordering::SeqCst) % 2 == 0;
        async move {
            if first {
                Err(Error::other("first try fails"))
            } else {
                Ok(n)
            }
        }
    };
    let options = RetryOptions::new(Duration::ZERO, 1).unwrap();
    let mut out = from(vec![1u32])
        .race(worker::retry(flaky, options))
        .to_array()
        .await
        .unwrap();
    out.sort_unstable();
    assert_eq!(out, [1]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn timed_out_worker_rejects() {
    let slow = worker::with_timeout(Duration::from_millis(10), |n: u64| async move {
        sleep(Duration::from_millis(n)).await;
        Ok::<_, Error>(n)
    });
    let err = from(vec![0u64, 5_000]).race(slow).to_array().await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn hooks_observe_the_end() {
    let completed = Arc::new(AtomicU32::new(0));
    let flag = completed.clone();
    let text = pipeline!(
        series([from(vec!["a", "b"]), from(vec!["c"])]),
        operator::before("<"),
        operator::after(">"),
        operator::on_complete(move || {
            flag.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(())
        }),
        sink::to_string
    )
    .await
    .unwrap();
    assert_eq!(text, "<abc>");
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_hook_turns_failure_into_end() {
    let failing = Asyncerator::new(futures_lite::stream::iter(vec![
        Ok("kept"),
        Err(Error::other("dropped")),
    ]));
    let out = pipeline!(
        failing,
        operator::on_error(|err: &Error| {
            assert_eq!(err.to_string(), "dropped");
            Ok::<_, Error>(())
        }),
        sink::to_array
    )
    .await
    .unwrap();
    assert_eq!(out, ["kept"]);
}

#[tokio::test]
async fn runs_on_a_spawned_task() {
    let handle = tokio::spawn(async {
        pipeline!(
            (1..=10).collect::<Vec<u64>>(),
            operator::race(|n| async move { Ok::<_, Error>(n * n) }),
            sink::reduce(|acc, n: u64, _| acc + n, 0)
        )
        .await
    });
    assert_eq!(handle.await.unwrap().unwrap(), 385);
}
