//! Ordering and failure isolation of the evaluation queue.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tank_headless::queue::{EvaluationQueue, QueueError};

#[tokio::test]
async fn test_failed_task_does_not_stop_queue() {
    let queue = EvaluationQueue::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = queue.submit(async { Err::<&str, _>("t1 failed") });
    let log2 = Arc::clone(&log);
    let second = queue.submit(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        log2.lock().unwrap().push("t2");
        Ok::<_, &str>("t2")
    });
    let log3 = Arc::clone(&log);
    let third = queue.submit(async move {
        log3.lock().unwrap().push("t3");
        Ok::<_, &str>("t3")
    });
    assert!(queue.is_running());

    assert!(matches!(first.await, Err(QueueError::Task("t1 failed"))));
    assert_eq!(second.await.unwrap(), "t2");
    assert_eq!(third.await.unwrap(), "t3");

    assert_eq!(*log.lock().unwrap(), vec!["t2", "t3"]);
    assert!(!queue.is_running());
}

#[tokio::test]
async fn test_panicking_task_is_isolated() {
    let queue = EvaluationQueue::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let first = queue.submit(async {
        if true {
            panic!("t1 exploded");
        }
        Ok::<u32, String>(0)
    });
    let log2 = Arc::clone(&log);
    let second = queue.submit(async move {
        log2.lock().unwrap().push(2);
        Ok::<u32, String>(2)
    });
    let log3 = Arc::clone(&log);
    let third = queue.submit(async move {
        log3.lock().unwrap().push(3);
        Ok::<u32, String>(3)
    });

    match first.await {
        Err(QueueError::Panicked(message)) => assert!(message.contains("t1 exploded")),
        other => panic!("expected panic, got {other:?}"),
    }
    assert_eq!(second.await.unwrap(), 2);
    assert_eq!(third.await.unwrap(), 3);
    assert_eq!(*log.lock().unwrap(), vec![2, 3]);
    assert!(!queue.is_running());
}

#[tokio::test]
async fn test_one_task_at_a_time() {
    let queue = EvaluationQueue::new();
    let active = Arc::new(Mutex::new(0_u32));
    let peak = Arc::new(Mutex::new(0_u32));

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            queue.submit(async move {
                {
                    let mut now = active.lock().unwrap();
                    *now += 1;
                    let mut max = peak.lock().unwrap();
                    *max = (*max).max(*now);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                *active.lock().unwrap() -= 1;
                Ok::<_, ()>(i)
            })
        })
        .collect();

    let mut order = Vec::new();
    for handle in handles {
        order.push(handle.await.unwrap());
    }
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    assert_eq!(*peak.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_dropped_handle_still_runs() {
    let queue = EvaluationQueue::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let log1 = Arc::clone(&log);
    drop(queue.submit(async move {
        log1.lock().unwrap().push(1);
        Ok::<_, ()>(())
    }));
    let log2 = Arc::clone(&log);
    queue
        .submit(async move {
            log2.lock().unwrap().push(2);
            Ok::<_, ()>(())
        })
        .await
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec![1, 2]);
}
