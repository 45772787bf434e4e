//! Identical inputs must give identical resumption sequences.

use depot_core::{Environment, EventKind, Executor, Resource, SimTime, TraceRecord};

fn busy_depot() -> Vec<TraceRecord> {
    let env = Environment::new();
    env.enable_trace();
    let dock = Resource::new(&env, "dock", 2).unwrap();

    for i in 0..6u32 {
        let sim = env.clone();
        let dock = dock.clone();
        env.process(format!("worker {i}"), async move {
            sim.timeout(f64::from(i % 3))?.await;
            let helpers: Vec<_> = (0..2)
                .map(|j| {
                    let helper = sim.clone();
                    sim.process(format!("worker {i} helper {j}"), async move {
                        helper.timeout(f64::from(j + 1))?.await;
                        Ok(())
                    })
                })
                .collect();
            sim.all_of(helpers).await?;
            let mut slot = dock.acquire().await;
            sim.timeout(4.0)?.await;
            slot.release()
        });
    }

    env.run(None).unwrap();
    env.trace()
}

#[test]
fn repeated_runs_produce_identical_traces() {
    let first = busy_depot();
    let second = busy_depot();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn trace_times_never_decrease() {
    let trace = busy_depot();
    assert!(trace.windows(2).all(|w| w[0].time <= w[1].time));
}

#[test]
fn same_time_starts_follow_registration_order() {
    let trace = busy_depot();
    let starts: Vec<&str> = trace
        .iter()
        .filter(|r| r.kind == EventKind::Start && r.time == SimTime::zero())
        .map(|r| r.process.as_str())
        .take(6)
        .collect();
    assert_eq!(
        starts,
        vec!["worker 0", "worker 1", "worker 2", "worker 3", "worker 4", "worker 5"]
    );
}

#[test]
fn stepping_matches_running() {
    let stepped = {
        let env = Environment::new();
        env.enable_trace();
        let sim = env.clone();
        env.process("ticker", async move {
            for _ in 0..5 {
                sim.timeout(1.5)?.await;
            }
            Ok(())
        });
        while env.step().unwrap() {}
        env.trace()
    };
    let executed = {
        let env = Environment::new();
        env.enable_trace();
        let sim = env.clone();
        env.process("ticker", async move {
            for _ in 0..5 {
                sim.timeout(1.5)?.await;
            }
            Ok(())
        });
        env.execute(Executor::unbound()).unwrap();
        env.trace()
    };
    assert_eq!(stepped, executed);
    assert_eq!(stepped.last().map(|r| r.time), Some(SimTime::from(7.5)));
}
