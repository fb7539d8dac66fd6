use std::time::Duration;

use stockfeed::feed::connection::{Action, ConnectionEvent, ConnectionMachine, ConnectionState};

const DELAY: Duration = Duration::from_secs(3);

/// Minimal stand-in for the socket driver: tracks live sockets and pending
/// reconnect timers the way the real driver does.
#[derive(Default)]
struct FakeDriver {
    opens: usize,
    live_sockets: usize,
    pending_timers: usize,
}

impl FakeDriver {
    fn run(&mut self, machine: &mut ConnectionMachine, event: ConnectionEvent) {
        for action in machine.handle(event) {
            match action {
                Action::Open => {
                    self.opens += 1;
                    self.live_sockets += 1;
                }
                Action::CloseSocket => self.live_sockets = self.live_sockets.saturating_sub(1),
                Action::ScheduleRetry(delay) => {
                    assert_eq!(delay, DELAY);
                    self.pending_timers += 1;
                }
                Action::CancelRetry => self.pending_timers = self.pending_timers.saturating_sub(1),
            }
        }
    }

    fn close_from_peer(&mut self, machine: &mut ConnectionMachine) {
        self.live_sockets = self.live_sockets.saturating_sub(1);
        self.run(machine, ConnectionEvent::Closed);
    }

    fn fire_timer(&mut self, machine: &mut ConnectionMachine) {
        if self.pending_timers > 0 {
            self.pending_timers -= 1;
            self.run(machine, ConnectionEvent::RetryElapsed);
        }
    }
}

#[test]
/// Verifies a close immediately followed by an error leaves exactly one
/// reconnect timer pending.
fn close_then_error_leaves_one_pending_timer() {
    let mut m = ConnectionMachine::new(DELAY);
    let mut d = FakeDriver::default();
    d.run(&mut m, ConnectionEvent::Start);
    d.run(&mut m, ConnectionEvent::Opened);

    d.close_from_peer(&mut m);
    d.run(&mut m, ConnectionEvent::Errored("connection reset".into()));

    assert_eq!(d.pending_timers, 1);
    assert_eq!(d.live_sockets, 0);
    assert_eq!(m.state(), ConnectionState::RetryPending);
}

#[test]
/// Verifies error then close (the usual browser-style ordering) also yields one timer.
fn error_then_close_leaves_one_pending_timer() {
    let mut m = ConnectionMachine::new(DELAY);
    let mut d = FakeDriver::default();
    d.run(&mut m, ConnectionEvent::Start);
    d.run(&mut m, ConnectionEvent::Opened);

    d.run(&mut m, ConnectionEvent::Errored("tls alert".into()));
    d.run(&mut m, ConnectionEvent::Closed);

    assert_eq!(d.pending_timers, 1);
    assert_eq!(d.live_sockets, 0);
}

#[test]
/// Verifies a second start while connected opens nothing.
fn start_twice_while_connected_opens_once() {
    let mut m = ConnectionMachine::new(DELAY);
    let mut d = FakeDriver::default();
    d.run(&mut m, ConnectionEvent::Start);
    d.run(&mut m, ConnectionEvent::Opened);
    d.run(&mut m, ConnectionEvent::Start);

    assert_eq!(d.opens, 1);
    assert_eq!(d.live_sockets, 1);
}

#[test]
/// Verifies teardown cancels the pending timer and nothing reconnects afterwards.
fn teardown_cancels_pending_reconnect() {
    let mut m = ConnectionMachine::new(DELAY);
    let mut d = FakeDriver::default();
    d.run(&mut m, ConnectionEvent::Start);
    d.run(&mut m, ConnectionEvent::Opened);
    d.close_from_peer(&mut m);
    assert_eq!(d.pending_timers, 1);

    d.run(&mut m, ConnectionEvent::Stop);
    assert_eq!(d.pending_timers, 0);

    // A timer that raced teardown must not reopen either.
    d.run(&mut m, ConnectionEvent::RetryElapsed);
    assert_eq!(d.opens, 1);
    assert_eq!(m.state(), ConnectionState::Stopped);
}

#[test]
/// Verifies long outages keep retrying with the same delay and never stack timers.
fn flapping_connection_keeps_at_most_one_socket_and_timer() {
    let mut m = ConnectionMachine::new(DELAY);
    let mut d = FakeDriver::default();
    d.run(&mut m, ConnectionEvent::Start);

    for round in 0..25 {
        if round % 3 == 0 {
            d.run(&mut m, ConnectionEvent::Opened);
            d.close_from_peer(&mut m);
            d.run(&mut m, ConnectionEvent::Errored("late".into()));
        } else {
            d.run(&mut m, ConnectionEvent::Errored("refused".into()));
        }
        assert!(d.live_sockets <= 1);
        assert_eq!(d.pending_timers, 1);
        d.fire_timer(&mut m);
        assert_eq!(d.pending_timers, 0);
    }
    assert_eq!(d.opens, 26);
    assert_eq!(m.attempt(), 26);
}
