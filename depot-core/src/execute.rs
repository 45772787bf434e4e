use crate::{Environment, SimError, SimTime};

/// A stopping rule for the event loop.
///
/// [`Environment::execute`] hands the environment to an `Execute` value, which calls
/// [`Environment::step`] until its rule says stop. A process failing with no observer
/// ends the loop early with that error.
pub trait Execute {
    fn execute(self, env: &Environment) -> Result<(), SimError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndCondition {
    Time(SimTime),
    NoEvents,
    Steps(usize),
}

/// The stock stopping rules: drain the queue, stop at a time, or take a fixed number
/// of steps.
///
/// [`Environment::run`] covers the first two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Executor {
    end_condition: EndCondition,
}

impl Executor {
    /// Stop once the event queue is empty.
    #[must_use]
    pub fn unbound() -> Self {
        Self {
            end_condition: EndCondition::NoEvents,
        }
    }

    /// Every event firing strictly before `time` is processed, then the clock is set to
    /// `time` even if the queue ran dry earlier.
    #[must_use]
    pub fn timed(time: SimTime) -> Self {
        Self {
            end_condition: EndCondition::Time(time),
        }
    }

    /// Process at most `steps` events. Stops earlier if the queue empties.
    #[must_use]
    pub fn steps(steps: usize) -> Self {
        Self {
            end_condition: EndCondition::Steps(steps),
        }
    }

    /// Call `func` after every processed event, with the clock at that event's time.
    #[must_use]
    pub fn side_effect<F>(self, func: F) -> ExecutorWithSideEffect<F>
    where
        F: FnMut(&Environment),
    {
        ExecutorWithSideEffect {
            end_condition: self.end_condition,
            side_effect: func,
        }
    }
}

impl Execute for Executor {
    fn execute(self, env: &Environment) -> Result<(), SimError> {
        run_with(env, self.end_condition, |_| {})
    }
}

/// An [`Executor`] with a per-event callback, built by [`Executor::side_effect`].
pub struct ExecutorWithSideEffect<F>
where
    F: FnMut(&Environment),
{
    end_condition: EndCondition,
    side_effect: F,
}

impl<F> Execute for ExecutorWithSideEffect<F>
where
    F: FnMut(&Environment),
{
    fn execute(self, env: &Environment) -> Result<(), SimError> {
        run_with(env, self.end_condition, self.side_effect)
    }
}

fn run_with<F>(env: &Environment, end_condition: EndCondition, mut side_effect: F) -> Result<(), SimError>
where
    F: FnMut(&Environment),
{
    let mut step = |env: &Environment| -> Result<bool, SimError> {
        let stepped = env.step()?;
        if stepped {
            side_effect(env);
        }
        Ok(stepped)
    };
    match end_condition {
        EndCondition::Time(time) => execute_until(env, time, &mut step),
        EndCondition::NoEvents => {
            while step(env)? {}
            Ok(())
        }
        EndCondition::Steps(steps) => {
            for _ in 0..steps {
                if !step(env)? {
                    break;
                }
            }
            Ok(())
        }
    }
}

fn execute_until<F>(env: &Environment, time: SimTime, step: &mut F) -> Result<(), SimError>
where
    F: FnMut(&Environment) -> Result<bool, SimError>,
{
    let now = env.now();
    if time < now {
        return Err(SimError::InvalidUntil {
            until: time.as_f64(),
            now: now.as_f64(),
        });
    }
    while env.peek().is_some_and(|next| next < time) {
        step(env)?;
    }
    env.advance_to(time);
    Ok(())
}

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    /// A process that ticks every two units, ten times.
    fn ticker(env: &Environment) -> Rc<Cell<usize>> {
        let counter = Rc::new(Cell::new(0));
        let count = Rc::clone(&counter);
        let sim = env.clone();
        env.process("ticker", async move {
            loop {
                count.set(count.get() + 1);
                if count.get() >= 10 {
                    return Ok(());
                }
                sim.timeout(2.0)?.await;
            }
        });
        counter
    }

    #[test]
    fn test_create_executor() {
        assert_eq!(
            Executor::unbound(),
            Executor {
                end_condition: EndCondition::NoEvents
            }
        );
        assert_eq!(
            Executor::timed(SimTime::zero()),
            Executor {
                end_condition: EndCondition::Time(SimTime::zero())
            }
        );
        assert_eq!(
            Executor::steps(7),
            Executor {
                end_condition: EndCondition::Steps(7)
            }
        );
    }

    #[test]
    fn test_steps() {
        let env = Environment::new();
        let counter = ticker(&env);
        Executor::steps(10).execute(&env).unwrap();
        assert_eq!(counter.get(), 10);
    }

    #[test]
    fn test_steps_stops_before() {
        let env = Environment::new();
        let counter = ticker(&env);
        // After 10 steps there are no events, so it will not execute all 100
        Executor::steps(100).execute(&env).unwrap();
        assert_eq!(counter.get(), 10);
        assert_eq!(env.now(), SimTime::from(18.0));
    }

    #[test]
    fn test_timed_excludes_boundary() {
        let env = Environment::new();
        let counter = ticker(&env);
        Executor::timed(SimTime::from(6.0)).execute(&env).unwrap();
        // Ticks at 0, 2 and 4; the one due at 6 stays queued.
        assert_eq!(counter.get(), 3);
        assert_eq!(env.now(), SimTime::from(6.0));
        assert_eq!(env.pending_events(), 1);
    }

    #[test]
    fn test_timed_clock_moves_past_last_event() {
        let env = Environment::new();
        let counter = ticker(&env);
        Executor::timed(SimTime::from(50.0)).execute(&env).unwrap();
        assert_eq!(counter.get(), 10);
        assert_eq!(env.now(), SimTime::from(50.0));
    }

    #[test]
    fn test_side_effect_runs_after_each_step() {
        let env = Environment::new();
        let _counter = ticker(&env);
        let mut seen = Vec::new();
        Executor::unbound()
            .side_effect(|env: &Environment| seen.push(env.now()))
            .execute(&env)
            .unwrap();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen.last(), Some(&SimTime::from(18.0)));
    }
}
