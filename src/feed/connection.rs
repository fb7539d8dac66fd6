//! Connection lifecycle as a pure state machine.
//!
//! Socket and timer callbacks are fed in as [`ConnectionEvent`]s; the machine
//! answers with the [`Action`]s the driver must perform. Keeping the rules here
//! means the "one socket, at most one pending retry" guarantees can be tested
//! without any I/O.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    RetryPending,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Start,
    Opened,
    Closed,
    Errored(String),
    RetryElapsed,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Open,
    CloseSocket,
    ScheduleRetry(Duration),
    CancelRetry,
}

#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    retry_delay: Duration,
    attempt: u32,
}

impl ConnectionMachine {
    pub fn new(retry_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_delay,
            attempt: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connection attempts made so far, including the one in flight.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn retry_pending(&self) -> bool {
        self.state == ConnectionState::RetryPending
    }

    pub fn handle(&mut self, event: ConnectionEvent) -> Vec<Action> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        match (self.state, event) {
            (S::Disconnected, E::Start) | (S::RetryPending, E::RetryElapsed) => {
                self.state = S::Connecting;
                self.attempt += 1;
                vec![Action::Open]
            }
            (S::Connecting, E::Opened) => {
                self.state = S::Connected;
                Vec::new()
            }
            (S::Connecting | S::Connected, E::Closed) => {
                self.state = S::RetryPending;
                vec![Action::ScheduleRetry(self.retry_delay)]
            }
            (S::Connecting | S::Connected, E::Errored(_)) => {
                self.state = S::RetryPending;
                vec![Action::CloseSocket, Action::ScheduleRetry(self.retry_delay)]
            }
            (S::Connecting | S::Connected, E::Stop) => {
                self.state = S::Stopped;
                vec![Action::CloseSocket]
            }
            (S::RetryPending, E::Stop) => {
                self.state = S::Stopped;
                vec![Action::CancelRetry]
            }
            (S::Disconnected, E::Stop) => {
                self.state = S::Stopped;
                Vec::new()
            }
            // Reentrant start, late socket events after a transition, and
            // anything after teardown.
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(3);

    fn connected() -> ConnectionMachine {
        let mut m = ConnectionMachine::new(DELAY);
        assert_eq!(m.handle(ConnectionEvent::Start), vec![Action::Open]);
        assert!(m.handle(ConnectionEvent::Opened).is_empty());
        assert_eq!(m.state(), ConnectionState::Connected);
        m
    }

    fn retries(actions: &[Action]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, Action::ScheduleRetry(_)))
            .count()
    }

    #[test]
    fn start_is_idempotent() {
        let mut m = connected();
        assert!(m.handle(ConnectionEvent::Start).is_empty());
        assert_eq!(m.attempt(), 1);

        let mut m = ConnectionMachine::new(DELAY);
        m.handle(ConnectionEvent::Start);
        assert!(m.handle(ConnectionEvent::Start).is_empty());
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn close_then_error_schedules_one_retry() {
        let mut m = connected();
        let mut actions = m.handle(ConnectionEvent::Closed);
        actions.extend(m.handle(ConnectionEvent::Errored("reset".into())));
        assert_eq!(retries(&actions), 1);
        assert!(m.retry_pending());
    }

    #[test]
    fn error_forces_close_and_trailing_close_is_ignored() {
        let mut m = connected();
        let actions = m.handle(ConnectionEvent::Errored("reset".into()));
        assert_eq!(actions, vec![Action::CloseSocket, Action::ScheduleRetry(DELAY)]);
        assert!(m.handle(ConnectionEvent::Closed).is_empty());
    }

    #[test]
    fn failed_connect_retries_with_constant_delay() {
        let mut m = ConnectionMachine::new(DELAY);
        let mut next = ConnectionEvent::Start;
        for attempt in 1..=4 {
            assert_eq!(m.handle(next), vec![Action::Open]);
            assert_eq!(m.attempt(), attempt);
            next = ConnectionEvent::RetryElapsed;
            let actions = m.handle(ConnectionEvent::Errored("refused".into()));
            assert_eq!(actions.last(), Some(&Action::ScheduleRetry(DELAY)));
        }
    }

    #[test]
    fn stop_cancels_pending_retry_and_is_terminal() {
        let mut m = connected();
        m.handle(ConnectionEvent::Closed);
        assert_eq!(m.handle(ConnectionEvent::Stop), vec![Action::CancelRetry]);
        assert!(m.handle(ConnectionEvent::RetryElapsed).is_empty());
        assert!(m.handle(ConnectionEvent::Start).is_empty());
        assert_eq!(m.state(), ConnectionState::Stopped);
    }

    #[test]
    fn stop_while_connected_closes_socket() {
        let mut m = connected();
        assert_eq!(m.handle(ConnectionEvent::Stop), vec![Action::CloseSocket]);
        assert!(m.handle(ConnectionEvent::Errored("late".into())).is_empty());
    }
}
