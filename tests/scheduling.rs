//! Scheduling guarantees exercised through the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use taskflow::{
    BlockCondition, GroupTask, MutuallyExclusive, QueueConfig, RetryTask, Task, TaskContext,
    TaskError, TaskQueue, WaitStrategy,
};

/// Start/end stamps taken from one shared counter.
#[derive(Default)]
struct Clock {
    tick: AtomicUsize,
}

impl Clock {
    fn now(&self) -> usize {
        self.tick.fetch_add(1, Ordering::SeqCst)
    }
}

type Stamps = Arc<Mutex<Vec<(usize, usize)>>>;

fn stamped(name: String, clock: Arc<Clock>, stamps: Stamps, idx: usize) -> Task {
    Task::from_fn(name, move |_| {
        let clock = clock.clone();
        let stamps = stamps.clone();
        async move {
            let start = clock.now();
            let jitter = rand::rng().random_range(0..3);
            tokio::time::sleep(Duration::from_millis(jitter)).await;
            let end = clock.now();
            stamps.lock()[idx] = (start, end);
            Ok(())
        }
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn random_dag_runs_in_topological_order() {
    const N: usize = 24;
    let clock = Arc::new(Clock::default());
    let stamps = Arc::new(Mutex::new(vec![(0, 0); N]));
    let tasks: Vec<Task> = (0..N)
        .map(|i| stamped(format!("n{i}"), clock.clone(), stamps.clone(), i))
        .collect();

    let mut rng = rand::rng();
    let mut edges = Vec::new();
    for i in 1..N {
        for j in 0..i {
            if rng.random_bool(0.2) {
                tasks[i].add_dependency(&tasks[j]).unwrap();
                edges.push((j, i));
            }
        }
    }

    let queue = TaskQueue::new(QueueConfig {
        max_concurrent: 3,
        ..QueueConfig::named("dag")
    });
    // reverse insertion order so dependents are usually added before their dependencies
    queue.add_all(tasks.iter().rev().cloned()).unwrap();
    queue.wait_until_idle().await;

    let stamps = stamps.lock();
    for (dep, task) in edges {
        assert!(
            stamps[dep].1 < stamps[task].0,
            "n{task} started before its dependency n{dep} ended"
        );
    }
}

#[tokio::test]
async fn failing_condition_is_the_only_error() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let i = invoked.clone();
    let task = Task::from_fn("gated", move |_| {
        i.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    });
    task.add_condition(BlockCondition::new("gate", || Err(TaskError::fail("x"))))
        .unwrap();

    TaskQueue::default().add(task.clone()).unwrap();
    assert_eq!(task.finished().await, vec![TaskError::fail("x")]);
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exclusive_category_preserves_enqueue_order() {
    let clock = Arc::new(Clock::default());
    let stamps = Arc::new(Mutex::new(vec![(0, 0); 5]));
    let tasks: Vec<Task> = (0..5)
        .map(|i| {
            let t = stamped(format!("k{i}"), clock.clone(), stamps.clone(), i);
            t.add_condition(MutuallyExclusive::new("K")).unwrap();
            t
        })
        .collect();
    let unrelated = Task::noop("free");

    let queue = TaskQueue::default();
    queue.add_all(tasks.iter().cloned()).unwrap();
    queue.add(unrelated.clone()).unwrap();
    queue.wait_until_idle().await;

    let stamps = stamps.lock();
    for pair in stamps.windows(2) {
        assert!(pair[0].1 < pair[1].0, "category members overlapped: {pair:?}");
    }
    assert!(unrelated.is_finished());
    assert!(queue.exclusivity().is_empty());
}

#[tokio::test]
async fn group_outlives_produced_child() {
    let child = Task::from_fn("c", |_| async {
        tokio::time::sleep(Duration::from_millis(25)).await;
        Ok(())
    });
    let a = Task::from_fn("a", {
        let child = child.clone();
        move |ctx: TaskContext| {
            let child = child.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                ctx.produce(child).map_err(|e| TaskError::fail(e.to_string()))
            }
        }
    });
    let b = Task::noop("b");
    let group = GroupTask::new("g", vec![a, b]);

    TaskQueue::default().add(group.task().clone()).unwrap();
    group.task().finished().await;
    assert!(child.is_finished());
}

#[tokio::test]
async fn cancelled_group_hands_its_error_to_members() {
    let members: Vec<Task> = (0..3).map(|i| Task::noop(format!("m{i}"))).collect();
    let group = GroupTask::new("g", members.clone());
    let e = TaskError::fail("E");
    group.task().cancel_with(vec![e.clone()]);

    TaskQueue::default().add(group.task().clone()).unwrap();
    group.task().finished().await;

    for member in &members {
        assert!(member.is_finished());
        assert_eq!(
            member.errors(),
            vec![TaskError::ParentCancelledWithErrors {
                errors: vec![e.clone()]
            }]
        );
    }
}

#[tokio::test]
async fn retry_stops_after_max_count() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = attempts.clone();
    let retry = RetryTask::builder("always failing")
        .max_count(3)
        .wait(WaitStrategy::Fixed(Duration::from_millis(1)))
        .build(move || {
            let a = a.clone();
            Task::from_fn("attempt", move |_| {
                a.fetch_add(1, Ordering::SeqCst);
                async { Err(TaskError::fail("down")) }
            })
        });

    TaskQueue::default().add(retry.task().clone()).unwrap();
    retry.task().finished().await;

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(retry.historical_errors().len(), 2);
}

#[test]
fn wait_strategies_follow_their_shape() {
    let d = Duration::from_millis(40);
    assert!(WaitStrategy::Fixed(d).delays().take(16).all(|x| x == d));

    let cap = Duration::from_secs(2);
    let exp: Vec<Duration> = WaitStrategy::Exponential {
        period: Duration::from_millis(10),
        max: cap,
    }
    .delays()
    .take(12)
    .collect();
    let below_cap: Vec<&Duration> = exp.iter().take_while(|x| **x < cap).collect();
    assert!(below_cap.windows(2).all(|w| w[0] < w[1]));
    assert!(exp.iter().all(|x| *x <= cap));
    assert_eq!(exp.last(), Some(&cap));
}
