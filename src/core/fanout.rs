use crate::core::aggregator::Aggregator;
use crate::core::fetcher::log_outcome;
use crate::core::{Deadline, Fetcher, NumberSet, Target};
use crate::utils::error::FetchError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{Id, JoinError, JoinSet};

/// Which side of the join-or-timeout race resolved first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceOutcome {
    AllFinished,
    DeadlineReached { aborted: usize },
}

/// 單一請求的彙總結果
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub numbers: NumberSet,
    pub race: RaceOutcome,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Per-request outcome counts; `pending` maps task ids to targets so cancelled fetches can still be reported.
#[derive(Debug, Default)]
struct Tally {
    succeeded: usize,
    failed: usize,
    aborted: usize,
    pending: HashMap<Id, Target>,
}

impl Tally {
    fn record(&mut self, joined: Result<(Id, bool), JoinError>, deadline: Deadline) {
        match joined {
            Ok((id, merged)) => {
                self.pending.remove(&id);
                if merged {
                    self.succeeded += 1;
                } else {
                    self.failed += 1;
                }
            }
            Err(e) if e.is_cancelled() => {
                self.failed += 1;
                self.aborted += 1;
                // a cancelled fetch never reached its own outcome log
                if let Some(target) = self.pending.remove(&e.id()) {
                    let timed_out = FetchError::RequestTimedOut {
                        target: target.to_string(),
                        waited: deadline.elapsed(),
                    };
                    log_outcome(&target, &Err(timed_out));
                }
            }
            Err(e) => {
                self.failed += 1;
                self.pending.remove(&e.id());
                tracing::warn!(error = %e, "Fetch task ended abnormally");
            }
        }
    }
}

/// 解析呼叫端提供的目標；無法解析的值記錄後略過
pub fn parse_targets<'a, I>(raw_values: I) -> Vec<Target>
where
    I: IntoIterator<Item = &'a str>,
{
    raw_values
        .into_iter()
        .filter_map(|raw| match Target::parse(raw) {
            Ok(target) => Some(target),
            Err(e) => {
                tracing::warn!(kind = %e.kind(), detail = %e, "⚠️ Ignoring malformed target");
                None
            }
        })
        .collect()
}

/// Fans out one fetch per target, merges every successful fragment, and finalizes once
/// either every fetch has finished or the shared deadline is reached.
///
/// Fetches still running when the deadline fires are aborted and logged as timed out; the
/// returned numbers are exactly what was merged before finalize.
pub async fn aggregate(
    fetcher: Arc<dyn Fetcher>,
    targets: Vec<Target>,
    deadline: Deadline,
) -> Aggregation {
    let aggregator = Arc::new(Aggregator::new());
    let mut tasks = JoinSet::new();
    let mut tally = Tally::default();

    for target in targets {
        let fetcher = Arc::clone(&fetcher);
        let aggregator = Arc::clone(&aggregator);
        let task_target = target.clone();
        let handle = tasks.spawn(async move {
            match fetcher.fetch(&task_target, deadline).await {
                Ok(fragment) => {
                    aggregator.merge(fragment);
                    true
                }
                // the fetcher already logged the failure
                Err(_) => false,
            }
        });
        tally.pending.insert(handle.id(), target);
    }
    tracing::debug!(
        spawned = tasks.len(),
        budget = ?deadline.budget(),
        remaining = ?deadline.remaining(),
        "Dispatched fetchers"
    );

    let all_finished = tokio::select! {
        biased;
        () = drain(&mut tasks, &mut tally, deadline) => true,
        () = tokio::time::sleep_until(deadline.instant()) => false,
    };

    let race = if all_finished {
        tracing::debug!("All fetchers finished");
        RaceOutcome::AllFinished
    } else {
        tasks.abort_all();
        // Aborted tasks resolve right away; tasks that finished in the meantime keep their result.
        drain(&mut tasks, &mut tally, deadline).await;
        tracing::info!(aborted = tally.aborted, "⏱️ Deadline reached, aborted outstanding fetchers");
        RaceOutcome::DeadlineReached {
            aborted: tally.aborted,
        }
    };

    let numbers = aggregator.finalize();
    Aggregation {
        numbers,
        race,
        succeeded: tally.succeeded,
        failed: tally.failed,
        elapsed: deadline.elapsed(),
    }
}

async fn drain(tasks: &mut JoinSet<bool>, tally: &mut Tally, deadline: Deadline) {
    while let Some(joined) = tasks.join_next_with_id().await {
        tally.record(joined, deadline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FetchOutcome;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Script {
        Numbers(Vec<i64>),
        Fail,
        Hang,
    }

    /// Answers by host name and honours the deadline like the real fetcher.
    struct ScriptedFetcher {
        scripts: HashMap<String, (Duration, Script)>,
    }

    impl ScriptedFetcher {
        fn new(entries: &[(&str, u64, Script)]) -> Arc<Self> {
            let scripts = entries
                .iter()
                .map(|(host, delay_ms, script)| {
                    (host.to_string(), (Duration::from_millis(*delay_ms), script.clone()))
                })
                .collect();
            Arc::new(Self { scripts })
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, target: &Target, deadline: Deadline) -> FetchOutcome {
            let host = target.url().host_str().unwrap_or_default().to_string();
            let (delay, script) = self.scripts.get(&host).cloned().unwrap_or((
                Duration::ZERO,
                Script::Fail,
            ));

            let work = async move {
                tokio::time::sleep(delay).await;
                match script {
                    Script::Numbers(numbers) => Ok(NumberSet::from(numbers)),
                    Script::Fail => Err(FetchError::UnexpectedResponse {
                        target: target.to_string(),
                        reason: "scripted failure".to_string(),
                    }),
                    Script::Hang => std::future::pending().await,
                }
            };

            tokio::time::timeout_at(deadline.instant(), work)
                .await
                .unwrap_or_else(|_| {
                    Err(FetchError::RequestTimedOut {
                        target: target.to_string(),
                        waited: deadline.elapsed(),
                    })
                })
        }
    }

    /// Ignores the deadline entirely; only the coordinator can stop it.
    struct StubbornFetcher {
        completed: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl Fetcher for StubbornFetcher {
        async fn fetch(&self, _target: &Target, _deadline: Deadline) -> FetchOutcome {
            tokio::time::sleep(self.delay).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(NumberSet::from(vec![1, 2, 3]))
        }
    }

    /// Hangs until the deadline, then counts the timeouts it got to report itself.
    struct ReportingFetcher {
        reported: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetcher for ReportingFetcher {
        async fn fetch(&self, target: &Target, deadline: Deadline) -> FetchOutcome {
            let outcome = match tokio::time::timeout_at(deadline.instant(), std::future::pending())
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(FetchError::RequestTimedOut {
                    target: target.to_string(),
                    waited: deadline.elapsed(),
                }),
            };
            self.reported.fetch_add(1, Ordering::SeqCst);
            outcome
        }
    }

    fn targets(hosts: &[&str]) -> Vec<Target> {
        hosts
            .iter()
            .map(|host| Target::parse(&format!("http://{}/numbers", host)).unwrap())
            .collect()
    }

    #[test]
    fn test_parse_targets_skips_malformed() {
        let parsed = parse_targets([
            "http://localhost:8079/primes",
            "definitely not a url",
            "",
            "https://numbers.test/fibo",
        ]);
        let urls: Vec<&str> = parsed.iter().map(Target::as_str).collect();
        assert_eq!(
            urls,
            vec!["http://localhost:8079/primes", "https://numbers.test/fibo"]
        );
    }

    #[tokio::test]
    async fn test_zero_targets_yields_empty_set() {
        let fetcher = ScriptedFetcher::new(&[]);
        let result = aggregate(fetcher, vec![], Deadline::after(Duration::from_millis(500))).await;

        assert!(result.numbers.is_empty());
        assert_eq!(result.race, RaceOutcome::AllFinished);
        assert!(result.elapsed < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_merges_and_dedups_across_targets() {
        let fetcher = ScriptedFetcher::new(&[
            ("a.test", 5, Script::Numbers(vec![5, 3])),
            ("b.test", 0, Script::Numbers(vec![3, 1])),
            ("c.test", 10, Script::Numbers(vec![5])),
        ]);
        let result = aggregate(
            fetcher,
            targets(&["a.test", "b.test", "c.test"]),
            Deadline::after(Duration::from_millis(500)),
        )
        .await;

        assert_eq!(result.numbers.into_vec(), vec![1, 3, 5]);
        assert_eq!(result.race, RaceOutcome::AllFinished);
        assert_eq!(result.succeeded, 3);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn test_partial_failure_contributes_nothing() {
        let fetcher = ScriptedFetcher::new(&[
            ("ok.test", 0, Script::Numbers(vec![1, 2, 3])),
            ("broken.test", 0, Script::Fail),
        ]);
        let result = aggregate(
            fetcher,
            targets(&["ok.test", "broken.test", "unknown.test"]),
            Deadline::after(Duration::from_millis(500)),
        )
        .await;

        assert_eq!(result.numbers.into_vec(), vec![1, 2, 3]);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 2);
    }

    #[tokio::test]
    async fn test_hanging_target_is_cut_at_deadline() {
        let fetcher = ScriptedFetcher::new(&[
            ("fast.test", 0, Script::Numbers(vec![7, 8])),
            ("hang.test", 0, Script::Hang),
        ]);
        let started = tokio::time::Instant::now();
        let result = aggregate(
            fetcher,
            targets(&["fast.test", "hang.test"]),
            Deadline::after(Duration::from_millis(200)),
        )
        .await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(190), "returned early: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(300), "returned late: {:?}", elapsed);
        assert_eq!(result.numbers.into_vec(), vec![7, 8]);
    }

    #[tokio::test]
    async fn test_deadline_aborts_fetchers_that_ignore_it() {
        let completed = Arc::new(AtomicUsize::new(0));
        let fetcher = Arc::new(StubbornFetcher {
            completed: Arc::clone(&completed),
            delay: Duration::from_millis(400),
        });

        let started = tokio::time::Instant::now();
        let result = aggregate(
            fetcher,
            targets(&["one.test", "two.test", "three.test"]),
            Deadline::after(Duration::from_millis(100)),
        )
        .await;

        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(result.race, RaceOutcome::DeadlineReached { aborted: 3 });
        assert!(result.numbers.is_empty());

        // aborted tasks never get to finish their sleep
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_every_timed_out_fetch_is_reported_once() {
        let hosts: Vec<String> = (0..20).map(|i| format!("hang-{}.test", i)).collect();
        let hosts: Vec<&str> = hosts.iter().map(String::as_str).collect();

        for _ in 0..30 {
            let reported = Arc::new(AtomicUsize::new(0));
            let fetcher = Arc::new(ReportingFetcher {
                reported: Arc::clone(&reported),
            });

            let result =
                aggregate(fetcher, targets(&hosts), Deadline::after(Duration::from_millis(30))).await;

            // whatever the fetcher did not get to report, the coordinator reported as aborted
            let aborted = match result.race {
                RaceOutcome::AllFinished => 0,
                RaceOutcome::DeadlineReached { aborted } => aborted,
            };
            assert_eq!(reported.load(Ordering::SeqCst) + aborted, hosts.len());
            assert_eq!(result.failed, hosts.len());
            assert_eq!(result.succeeded, 0);
            assert!(result.numbers.is_empty());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_fan_out_loses_no_element() {
        let fan_out = 200usize;
        let per_target = 1_000i64;

        let entries: Vec<(String, u64, Script)> = (0..fan_out)
            .map(|i| {
                let start = i as i64 * per_target;
                (
                    format!("source-{}.test", i),
                    (i % 7) as u64,
                    Script::Numbers((start..start + per_target).collect()),
                )
            })
            .collect();
        let borrowed: Vec<(&str, u64, Script)> = entries
            .iter()
            .map(|(host, delay, script)| (host.as_str(), *delay, script.clone()))
            .collect();
        let fetcher = ScriptedFetcher::new(&borrowed);

        let hosts: Vec<&str> = entries.iter().map(|(host, _, _)| host.as_str()).collect();
        // every target twice, so half of all merged numbers are duplicates
        let mut all_targets = targets(&hosts);
        all_targets.extend(targets(&hosts));

        let result = aggregate(fetcher, all_targets, Deadline::after(Duration::from_secs(5))).await;

        assert_eq!(result.race, RaceOutcome::AllFinished);
        assert_eq!(result.succeeded, fan_out * 2);
        assert_eq!(result.numbers.len(), fan_out * per_target as usize);
        assert!(result.numbers.is_strictly_ascending());
    }
}
