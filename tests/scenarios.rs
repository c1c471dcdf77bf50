//! End-to-end reactor scenarios: button stream → gesture → LED stream
//!
//! Mirrors the timed-blink board application: a button interrupt feeds a
//! queue, the button handler drives a `DoubleClick`, gestures go out on
//! an LED queue, and the LED handler records what would be shown.

use alice_reactor::{
    bind, Clock, Consumer, Context, DoubleClick, Error, EventQueue, Flow, Gesture, ManualClock,
    NoIdle, Priority, Producer, Result, Scheduler, Strategy, TickCounter, TimerId, TimerList,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Button {
    Zero,
}

struct Board<'q> {
    clicks: DoubleClick,
    leds: Producer<'q, Gesture, 8>,
    shown: heapless::Vec<Gesture, 16>,
}

fn on_button(rx: &mut Consumer<'_, Button, 8>, cx: &mut Context<'_, '_, Board<'_>>) -> Result<Flow> {
    let Some(Button::Zero) = rx.peek() else {
        return Err(Error::Fault("button handler woke on empty queue"));
    };
    let (board, mut timers) = cx.split();
    if let Some(gesture) = board.clicks.on_press(&mut timers)? {
        board.leds.push(gesture);
    }
    Ok(Flow::Continue)
}

fn on_timeout(_: TimerId, cx: &mut Context<'_, '_, Board<'_>>) -> Result<()> {
    if let Some(gesture) = cx.app.clicks.on_timeout() {
        cx.app.leds.push(gesture);
    }
    Ok(())
}

fn on_led(rx: &mut Consumer<'_, Gesture, 8>, cx: &mut Context<'_, '_, Board<'_>>) -> Result<Flow> {
    if let Some(gesture) = rx.pop() {
        let _ = cx.app.shown.push(gesture);
    }
    Ok(Flow::Continue)
}

fn count(g: Gesture, shown: &[Gesture]) -> usize {
    shown.iter().filter(|&&s| s == g).count()
}

#[test]
fn test_single_press_emits_single() {
    let clock = ManualClock::new(0);
    let mut buttons = EventQueue::<Button, 8>::new();
    let mut leds = EventQueue::<Gesture, 8>::new();
    let (mut button_tx, button_rx) = buttons.split();
    let (led_tx, led_rx) = leds.split();

    let mut timers = TimerList::new();
    let timeout = timers.add(250, on_timeout).unwrap();
    let mut board = Board {
        clicks: DoubleClick::new(timeout),
        leds: led_tx,
        shown: heapless::Vec::new(),
    };

    let mut button_stream = bind(button_rx, on_button);
    let mut led_stream = bind(led_rx, on_led);
    let mut sched = Scheduler::with_idle(&clock, Strategy::Fair, || clock.advance(1));
    sched.register(&mut button_stream, Priority::HIGH).unwrap();
    sched.register(&mut led_stream, Priority::NORMAL).unwrap();
    sched.register_timer_source(&mut timers);

    assert!(button_tx.push(Button::Zero));
    sched.run_for(&mut board, 1000).unwrap();

    assert_eq!(board.shown.as_slice(), &[Gesture::Single]);
    assert_eq!(count(Gesture::Double, &board.shown), 0);
    assert!(clock.now_ms() >= 250);
}

#[test]
fn test_second_press_within_window_emits_double() {
    let clock = ManualClock::new(0);
    let mut buttons = EventQueue::<Button, 8>::new();
    let mut leds = EventQueue::<Gesture, 8>::new();
    let (mut button_tx, button_rx) = buttons.split();
    let (led_tx, led_rx) = leds.split();

    let mut timers = TimerList::new();
    let timeout = timers.add(250, on_timeout).unwrap();
    let mut board = Board {
        clicks: DoubleClick::new(timeout),
        leds: led_tx,
        shown: heapless::Vec::new(),
    };

    let mut button_stream = bind(button_rx, on_button);
    let mut led_stream = bind(led_rx, on_led);
    {
        let mut sched = Scheduler::with_idle(&clock, Strategy::Fair, || clock.advance(1));
        sched.register(&mut button_stream, Priority::HIGH).unwrap();
        sched.register(&mut led_stream, Priority::NORMAL).unwrap();
        sched.register_timer_source(&mut timers);

        button_tx.push(Button::Zero);
        sched.run_for(&mut board, 100).unwrap();
        assert!(clock.now_ms() < 250);
        assert!(board.shown.is_empty());

        button_tx.push(Button::Zero);
        sched.run_for(&mut board, 1000).unwrap();
        assert!(clock.now_ms() > 250);
    }

    assert_eq!(board.shown.as_slice(), &[Gesture::Double]);
    assert_eq!(count(Gesture::Single, &board.shown), 0);
    assert!(!timers.is_linked(timeout));
    assert!(timers.is_empty());
}

#[test]
fn test_burst_fills_queue_to_capacity() {
    let clock = ManualClock::new(0);
    let mut buttons = EventQueue::<Button, 8>::new();
    let mut leds = EventQueue::<Gesture, 8>::new();
    let (mut button_tx, button_rx) = buttons.split();
    let (led_tx, led_rx) = leds.split();

    let mut timers = TimerList::new();
    let timeout = timers.add(250, on_timeout).unwrap();
    let mut board = Board {
        clicks: DoubleClick::new(timeout),
        leds: led_tx,
        shown: heapless::Vec::new(),
    };

    // Eight presses before any dispatch: all fit
    for _ in 0..8 {
        assert!(button_tx.push(Button::Zero));
    }
    assert_eq!(button_tx.dropped(), 0);
    // A ninth before any consumption is dropped
    assert!(!button_tx.push(Button::Zero));
    assert_eq!(button_tx.dropped(), 1);
    assert_eq!(button_tx.len(), 8);

    let mut button_stream = bind(button_rx, on_button);
    let mut led_stream = bind(led_rx, on_led);
    let mut sched = Scheduler::with_idle(&clock, Strategy::Fair, || clock.advance(1));
    sched.register(&mut button_stream, Priority::HIGH).unwrap();
    sched.register(&mut led_stream, Priority::NORMAL).unwrap();
    sched.register_timer_source(&mut timers);
    sched.run_for(&mut board, 1000).unwrap();

    // Consecutive presses pair up into doubles
    assert_eq!(count(Gesture::Double, &board.shown), 4);
    assert_eq!(count(Gesture::Single, &board.shown), 0);
}

#[test]
fn test_link_then_unlink_never_fires() {
    fn must_not_fire(_: TimerId, _: &mut Context<'_, '_, u32>) -> Result<()> {
        Err(Error::Fault("cancelled timer fired"))
    }

    let clock = ManualClock::new(0);
    let mut timers = TimerList::new();
    let id = timers.add(10, must_not_fire).unwrap();
    timers.link(id, clock.now_ms()).unwrap();
    timers.unlink(id).unwrap();

    let mut sched = Scheduler::with_idle(&clock, Strategy::Fair, || clock.advance(1));
    sched.register_timer_source(&mut timers);
    let mut app = 0u32;
    let stats = sched.run_for(&mut app, 100).unwrap();
    assert_eq!(stats.timers_fired, 0);
}

#[test]
fn test_equal_delays_fire_in_link_order() {
    fn record(id: TimerId, cx: &mut Context<'_, '_, heapless::Vec<TimerId, 4>>) -> Result<()> {
        let _ = cx.app.push(id);
        if cx.app.is_full() {
            cx.quit();
        }
        Ok(())
    }

    let clock = ManualClock::new(1_000);
    let mut timers = TimerList::new();
    let ids: [TimerId; 4] = core::array::from_fn(|_| timers.add(40, record).unwrap());
    for &id in ids.iter().rev() {
        timers.link(id, clock.now_ms()).unwrap();
    }

    let mut sched = Scheduler::with_idle(&clock, Strategy::Fair, || clock.advance(1));
    sched.register_timer_source(&mut timers);
    let mut fired = heapless::Vec::new();
    let stats = sched.run(&mut fired).unwrap();

    let expected: heapless::Vec<TimerId, 4> = ids.iter().rev().copied().collect();
    assert_eq!(fired, expected);
    assert_eq!(stats.timers_fired, 4);
    assert_eq!(clock.now_ms(), 1_040);
}

#[test]
fn test_tick_counter_drives_timeouts_across_wrap() {
    fn stop(_: TimerId, cx: &mut Context<'_, '_, u32>) -> Result<()> {
        *cx.app = cx.now();
        cx.quit();
        Ok(())
    }

    static TICKS: TickCounter = TickCounter::new();
    TICKS.advance(u32::MAX - 49);

    let mut timers = TimerList::new();
    let id = timers.add(100, stop).unwrap();
    timers.link(id, TICKS.now_ms()).unwrap();

    let mut sched = Scheduler::with_idle(&TICKS, Strategy::Fair, || TICKS.tick());
    sched.register_timer_source(&mut timers);
    let mut fired_at = 0u32;
    sched.run(&mut fired_at).unwrap();
    assert_eq!(fired_at, 50);
}

#[test]
fn test_interrupt_thread_feeds_main_loop() {
    const PRESSES: u32 = 500;

    fn on_press(rx: &mut Consumer<'_, u32, 8>, cx: &mut Context<'_, '_, u32>) -> Result<Flow> {
        let seq = rx.pop().ok_or(Error::Fault("empty"))?;
        if seq != *cx.app {
            return Err(Error::Fault("out of order"));
        }
        *cx.app += 1;
        Ok(if *cx.app == PRESSES {
            Flow::Quit
        } else {
            Flow::Continue
        })
    }

    let clock = ManualClock::new(0);
    let mut queue = EventQueue::<u32, 8>::new();
    let (mut tx, rx) = queue.split();
    let mut stream = bind(rx, on_press);

    std::thread::scope(|s| {
        s.spawn(move || {
            let mut seq = 0;
            while seq < PRESSES {
                if tx.push(seq) {
                    seq += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });

        let mut sched = Scheduler::with_idle(&clock, Strategy::Fair, NoIdle);
        sched.register(&mut stream, Priority::HIGH).unwrap();
        let mut received = 0u32;
        sched.run(&mut received).unwrap();
        assert_eq!(received, PRESSES);
    });
}
