//! End-to-end scenarios mixing timeouts, resources and joins.

use std::cell::RefCell;
use std::rc::Rc;

use depot_core::{Environment, ProcessState, Resource, SimError, SimTime};

type Log = Rc<RefCell<Vec<(String, f64)>>>;

fn note(log: &Log, what: impl Into<String>, env: &Environment) {
    log.borrow_mut().push((what.into(), env.now().as_f64()));
}

#[test]
fn capacity_one_serializes_holders() {
    let env = Environment::new();
    let dock = Resource::new(&env, "dock", 1).unwrap();
    let log: Log = Rc::default();

    for name in ["A", "B"] {
        let sim = env.clone();
        let dock = dock.clone();
        let log = Rc::clone(&log);
        env.process(name, async move {
            let mut request = dock.request();
            request.granted().await;
            note(&log, format!("{name} acquired"), &sim);
            sim.timeout(10.0)?.await;
            request.release()?;
            note(&log, format!("{name} released"), &sim);
            Ok(())
        });
    }

    env.run(None).unwrap();
    assert_eq!(
        *log.borrow(),
        vec![
            ("A acquired".to_string(), 0.0),
            ("A released".to_string(), 10.0),
            ("B acquired".to_string(), 10.0),
            ("B released".to_string(), 20.0),
        ]
    );
    assert_eq!(dock.count(), 0);
}

#[test]
fn waiters_are_granted_in_request_order() {
    let env = Environment::new();
    let dock = Resource::new(&env, "dock", 1).unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    // Requests are issued at 0, 1, 2 and 3 while the first holder keeps the slot.
    for (i, name) in ["first", "second", "third", "fourth"].into_iter().enumerate() {
        let sim = env.clone();
        let dock = dock.clone();
        let order = Rc::clone(&order);
        env.process(name, async move {
            sim.timeout(i as f64)?.await;
            let _slot = dock.acquire().await;
            order.borrow_mut().push(name);
            sim.timeout(5.0)?.await;
            Ok(())
        });
    }

    env.run(None).unwrap();
    assert_eq!(*order.borrow(), vec!["first", "second", "third", "fourth"]);
    assert_eq!(env.now(), SimTime::from(20.0));
}

#[test]
fn capacity_two_runs_two_holders_in_parallel() {
    let env = Environment::new();
    let trucks = Resource::new(&env, "trucks", 2).unwrap();
    let finished = Rc::new(RefCell::new(Vec::new()));

    for i in 0..3 {
        let sim = env.clone();
        let trucks = trucks.clone();
        let finished = Rc::clone(&finished);
        env.process(format!("delivery {i}"), async move {
            let mut truck = trucks.acquire().await;
            sim.timeout(20.0)?.await;
            truck.release()?;
            finished.borrow_mut().push(sim.now().as_f64());
            Ok(())
        });
    }

    env.run(None).unwrap();
    assert_eq!(*finished.borrow(), vec![20.0, 20.0, 40.0]);
}

#[test]
fn join_waits_for_slowest_child() {
    let env = Environment::new();
    let sim = env.clone();
    let parent = env.process("order", async move {
        let children = [5.0, 8.0, 3.0].map(|t| {
            let child = sim.clone();
            sim.process(format!("sector after {t}"), async move {
                child.timeout(t)?.await;
                Ok(child.now())
            })
        });
        let finished = sim.all_of(children).await?;
        Ok((sim.now(), finished))
    });

    env.run(None).unwrap();
    let (resumed, finished) = parent.value().unwrap().unwrap();
    assert_eq!(resumed, SimTime::from(8.0));
    assert_eq!(
        finished,
        vec![SimTime::from(5.0), SimTime::from(8.0), SimTime::from(3.0)]
    );
}

#[test]
fn run_until_stops_before_boundary() {
    let env = Environment::new();
    let log: Log = Rc::default();

    let sim = env.clone();
    let log1 = Rc::clone(&log);
    let late = env.process("late", async move {
        sim.timeout(20.0)?.await;
        note(&log1, "late resumed", &sim);
        Ok(())
    });
    let sim = env.clone();
    let log2 = Rc::clone(&log);
    env.process("exact", async move {
        sim.timeout(15.0)?.await;
        note(&log2, "exact resumed", &sim);
        Ok(())
    });

    env.run(Some(SimTime::from(15.0))).unwrap();
    assert_eq!(env.now(), SimTime::from(15.0));
    assert!(log.borrow().is_empty());
    assert_eq!(late.state(), Some(ProcessState::Suspended));
}

#[test]
fn nested_processes_propagate_failures_upward() {
    let env = Environment::new();
    let sim = env.clone();
    let outer = env.process("order", async move {
        let inner_env = sim.clone();
        let inner = sim.process("sector", async move {
            inner_env.timeout(1.0)?.await;
            Err::<(), _>(SimError::Process("shelf empty".to_string()))
        });
        sim.all_of(vec![inner]).await?;
        Ok(())
    });

    let err = env.run(None).unwrap_err();
    match &err {
        SimError::ProcessFailure { process, source } => {
            assert_eq!(process, "order");
            assert!(matches!(**source, SimError::ProcessFailure { ref process, .. } if process == "sector"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.root_cause(), &SimError::Process("shelf empty".to_string()));
    assert_eq!(outer.state(), Some(ProcessState::Failed));
}

#[test]
fn failed_holder_returns_its_slot() {
    let env = Environment::new();
    let dock = Resource::new(&env, "dock", 1).unwrap();

    let sim = env.clone();
    let dock1 = dock.clone();
    let failing = env.process("clumsy", async move {
        let _slot = dock1.acquire().await;
        sim.timeout(3.0)?.await;
        Err::<(), _>(SimError::Process("dropped a pallet".to_string()))
    });
    failing.watch();

    let sim = env.clone();
    let dock2 = dock.clone();
    let next = env.process("careful", async move {
        let mut slot = dock2.acquire().await;
        let got_it = sim.now();
        slot.release()?;
        Ok(got_it)
    });

    env.run(None).unwrap();
    assert!(matches!(failing.value(), Some(Err(SimError::ProcessFailure { .. }))));
    assert_eq!(next.value(), Some(Ok(SimTime::from(3.0))));
}

#[test]
fn invalid_arguments_fail_at_call_site() {
    let env = Environment::new();
    assert!(matches!(
        Resource::new(&env, "nothing", 0),
        Err(SimError::InvalidCapacity { .. })
    ));
    assert!(matches!(
        env.timeout(-0.5),
        Err(SimError::InvalidDuration { .. })
    ));

    let dock = Resource::new(&env, "dock", 1).unwrap();
    let mut request = dock.request();
    request.release().unwrap();
    assert!(matches!(
        request.release(),
        Err(SimError::InvalidRelease { .. })
    ));
}
