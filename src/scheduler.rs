//! Main loop — cooperative single-context dispatcher
//!
//! Each dispatch cycle visits every registered source once (round-robin,
//! registration order) and services at most one event per ready source,
//! then fires every timed event that has expired. A cycle that found no
//! work hands control to the idle hook. Handlers run to completion; the
//! only suspension point is the idle hook at the top of the cycle.
//!
//! Author: Moroya Sakamoto

use heapless::Vec;
use log::{debug, error, info, warn};

use crate::clock::{Clock, Millis};
use crate::error::{Error, Result};
use crate::idle::{Idle, WaitForInterrupt};
use crate::signal::{Flow, Priority, Source};
use crate::timed::{TimerId, TimerList, Timers};

/// Maximum registered sources
pub const MAX_SOURCES: usize = 8;

/// Dispatch strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Round-robin over sources in registration order, one event per
    /// ready source per cycle. Priority hints are ignored.
    #[default]
    Fair,
}

/// Execution context handed to handlers and timer callbacks
///
/// `'s` is how long a source registered through [`Context::register`]
/// must stay borrowed: the scheduler's own lifetime.
pub struct Context<'c, 's, A> {
    /// Application state
    pub app: &'c mut A,
    timers: Option<&'c mut TimerList<A>>,
    pending: Option<&'c mut Vec<Registration<'s, A>, MAX_SOURCES>>,
    /// Registration slots not taken by the scheduler table
    room: usize,
    clock: &'c dyn Clock,
    quit: bool,
}

impl<'c, 's, A> Context<'c, 's, A> {
    /// Context with no scheduler behind it (unit-testing handlers)
    pub fn detached(app: &'c mut A, clock: &'c dyn Clock) -> Self {
        Self {
            app,
            timers: None,
            pending: None,
            room: 0,
            clock,
            quit: false,
        }
    }

    /// Add a source from inside a handler or callback
    ///
    /// Takes effect at the end of the current cycle; the source is first
    /// visited on the next one.
    pub fn register(&mut self, source: &'s mut dyn Source<A>, priority: Priority) -> Result<()> {
        let pending = self.pending.as_deref_mut().ok_or(Error::NoScheduler)?;
        if pending.len() >= self.room {
            return Err(Error::TooManySources);
        }
        pending
            .push(Registration {
                dropped_seen: source.dropped(),
                source,
                priority,
            })
            .map_err(|_| Error::TooManySources)
    }

    /// Current time
    pub fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    /// Arm a timed event relative to now
    pub fn link(&mut self, id: TimerId) -> Result<()> {
        self.timers().link(id)
    }

    /// Cancel a timed event
    pub fn unlink(&mut self, id: TimerId) -> Result<()> {
        self.timers().unlink(id)
    }

    pub fn is_linked(&self, id: TimerId) -> bool {
        self.timers.as_ref().map_or(false, |t| t.is_linked(id))
    }

    /// Timer handle pinned to now
    pub fn timers(&mut self) -> Timers<'_, A> {
        let now = self.now();
        Timers::new(self.timers.as_deref_mut(), now)
    }

    /// Application state and timer handle, borrowed together
    pub fn split(&mut self) -> (&mut A, Timers<'_, A>) {
        let now = self.now();
        (&mut *self.app, Timers::new(self.timers.as_deref_mut(), now))
    }

    /// Stop the scheduler after the current cycle
    pub fn quit(&mut self) {
        self.quit = true;
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }
}

/// Outcome of one dispatch cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cycle {
    /// Source dispatches performed
    pub dispatched: u32,
    /// Timer callbacks fired
    pub fired: u32,
    /// A handler or callback asked to stop
    pub quit: bool,
}

impl Cycle {
    /// Nothing was ready and nothing was due
    pub fn is_idle(&self) -> bool {
        self.dispatched == 0 && self.fired == 0
    }
}

/// Cumulative scheduler statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Dispatch cycles completed
    pub cycles: u32,
    /// Source dispatches
    pub dispatched: u32,
    /// Timer callbacks fired
    pub timers_fired: u32,
    /// Cycles that ended in the idle hook
    pub idle_cycles: u32,
}

struct Registration<'a, A> {
    source: &'a mut dyn Source<A>,
    priority: Priority,
    /// Drop counter at last check, for overflow warnings
    dropped_seen: usize,
}

/// The reactor main loop
///
/// Borrows everything it dispatches; queues, bindings and timer lists
/// belong to the application and outlive the scheduler by construction.
pub struct Scheduler<'a, A, I = WaitForInterrupt> {
    sources: Vec<Registration<'a, A>, MAX_SOURCES>,
    /// Registered from handlers, merged at the end of a cycle
    pending: Vec<Registration<'a, A>, MAX_SOURCES>,
    timers: Option<&'a mut TimerList<A>>,
    clock: &'a dyn Clock,
    strategy: Strategy,
    idle: I,
    running: bool,
    quit: bool,
    stats: RunStats,
}

impl<'a, A> Scheduler<'a, A, WaitForInterrupt> {
    /// Scheduler that sleeps with WFI between empty cycles
    pub fn new(clock: &'a dyn Clock, strategy: Strategy) -> Self {
        Self::with_idle(clock, strategy, WaitForInterrupt)
    }
}

impl<'a, A, I: Idle> Scheduler<'a, A, I> {
    pub fn with_idle(clock: &'a dyn Clock, strategy: Strategy, idle: I) -> Self {
        Self {
            sources: Vec::new(),
            pending: Vec::new(),
            timers: None,
            clock,
            strategy,
            idle,
            running: false,
            quit: false,
            stats: RunStats::default(),
        }
    }

    /// Add a source to the dispatch set
    ///
    /// Handlers register through [`Context::register`] while running.
    pub fn register(&mut self, source: &'a mut dyn Source<A>, priority: Priority) -> Result<()> {
        self.sources
            .push(Registration {
                dropped_seen: source.dropped(),
                source,
                priority,
            })
            .map_err(|_| Error::TooManySources)?;
        debug!(
            "source {} registered (priority {})",
            self.sources.len() - 1,
            priority.0
        );
        Ok(())
    }

    /// Poll `timers` alongside the sources every cycle
    pub fn register_timer_source(&mut self, timers: &'a mut TimerList<A>) {
        debug!("timer list registered ({} timers)", timers.timer_count());
        self.timers = Some(timers);
    }

    /// Request a stop after the current cycle
    pub fn quit(&mut self) {
        self.quit = true;
    }

    /// Run until a handler or callback quits
    ///
    /// A handler error is fatal: the loop stops and the error is returned.
    pub fn run(&mut self, app: &mut A) -> Result<RunStats> {
        self.run_until(app, None)
    }

    /// Run at most `max_cycles` cycles (or until quit)
    pub fn run_for(&mut self, app: &mut A, max_cycles: u32) -> Result<RunStats> {
        self.run_until(app, Some(max_cycles))
    }

    fn run_until(&mut self, app: &mut A, limit: Option<u32>) -> Result<RunStats> {
        self.running = true;
        info!(
            "reactor running: {} sources, {:?} strategy",
            self.sources.len(),
            self.strategy
        );

        let mut cycles = 0u32;
        while limit.map_or(true, |max| cycles < max) {
            let cycle = match self.cycle(app) {
                Ok(cycle) => cycle,
                Err(e) => {
                    self.running = false;
                    error!("reactor stopped: {}", e);
                    return Err(e);
                }
            };
            cycles += 1;

            if cycle.quit || self.quit {
                self.quit = false;
                break;
            }
            if cycle.is_idle() {
                self.stats.idle_cycles = self.stats.idle_cycles.wrapping_add(1);
                self.idle.idle();
            }
        }

        self.running = false;
        info!("reactor stopped after {} cycles", self.stats.cycles);
        Ok(self.stats)
    }

    /// Perform one dispatch cycle
    pub fn cycle(&mut self, app: &mut A) -> Result<Cycle> {
        let mut cycle = Cycle::default();
        let room = MAX_SOURCES - self.sources.len();

        match self.strategy {
            Strategy::Fair => {
                for (idx, reg) in self.sources.iter_mut().enumerate() {
                    let dropped = reg.source.dropped();
                    if dropped != reg.dropped_seen {
                        warn!(
                            "source {} overflowed, {} events dropped",
                            idx,
                            dropped.wrapping_sub(reg.dropped_seen)
                        );
                        reg.dropped_seen = dropped;
                    }

                    if !reg.source.is_ready() {
                        continue;
                    }

                    let mut cx = Context {
                        app: &mut *app,
                        timers: self.timers.as_deref_mut(),
                        pending: Some(&mut self.pending),
                        room,
                        clock: self.clock,
                        quit: false,
                    };
                    let flow = reg.source.dispatch(&mut cx)?;
                    cycle.dispatched += 1;
                    cycle.quit |= flow == Flow::Quit || cx.quit;
                }
            }
        }

        if let Some(timers) = self.timers.as_deref_mut() {
            for id in timers.due(self.clock.now_ms()) {
                let callback = timers.callback(id)?;
                let mut cx = Context {
                    app: &mut *app,
                    timers: Some(&mut *timers),
                    pending: Some(&mut self.pending),
                    room,
                    clock: self.clock,
                    quit: false,
                };
                callback(id, &mut cx)?;
                cycle.fired += 1;
                cycle.quit |= cx.quit;
            }
        }

        for reg in core::mem::take(&mut self.pending) {
            self.sources
                .push(reg)
                .map_err(|_| Error::TooManySources)?;
            debug!("source {} registered during run", self.sources.len() - 1);
        }

        self.stats.cycles = self.stats.cycles.wrapping_add(1);
        self.stats.dispatched = self.stats.dispatched.wrapping_add(cycle.dispatched);
        self.stats.timers_fired = self.stats.timers_fired.wrapping_add(cycle.fired);
        Ok(cycle)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Priority hint given at registration
    pub fn priority(&self, idx: usize) -> Option<Priority> {
        self.sources.get(idx).map(|r| r.priority)
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn now_ms(&self) -> Millis {
        self.clock.now_ms()
    }
}
