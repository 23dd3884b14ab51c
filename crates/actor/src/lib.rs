//! A lightweight actor runtime.
//!
//! An actor owns a piece of state and mutates it only from its own task,
//! one message at a time. This gives single-writer semantics without any
//! locking, which is what the dispatcher relies on to keep its transcript
//! ordered.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod handle;
mod mailbox;
mod scheduler;

pub use error::MailboxClosed;
pub use handle::Actor;
pub use mailbox::Message;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use super::*;

    #[derive(Default)]
    struct Counter {
        value: u32,
        parked: Vec<oneshot::Sender<u32>>,
    }

    #[derive(Debug)]
    struct AddMessage(u32);

    impl Message<Counter> for AddMessage {
        fn handle(self, state: &mut Counter, _handle: &Actor<Counter>) {
            state.value += self.0;
        }
    }

    #[derive(Debug)]
    struct AddTwiceMessage(u32);

    impl Message<Counter> for AddTwiceMessage {
        fn handle(self, state: &mut Counter, handle: &Actor<Counter>) {
            state.value += self.0;
            handle.send(AddMessage(self.0)).unwrap();
        }
    }

    #[derive(Debug)]
    struct ParkMessage(oneshot::Sender<u32>);

    impl Message<Counter> for ParkMessage {
        fn handle(self, state: &mut Counter, _handle: &Actor<Counter>) {
            state.parked.push(self.0);
        }
    }

    #[tokio::test]
    async fn test_send_and_ask() {
        let actor =
            Actor::spawn(Counter::default(), None, CancellationToken::new());
        actor.send(AddMessage(40)).unwrap();
        actor.send(AddTwiceMessage(1)).unwrap();

        // The message re-sent by the handler lands behind the first query.
        actor.ask(|_: &mut Counter| ()).await.unwrap();
        let value = actor.ask(|state: &mut Counter| state.value).await;
        assert_eq!(value, Ok(42));
    }

    #[tokio::test]
    async fn test_shutdown_drops_state() {
        let token = CancellationToken::new();
        let actor = Actor::spawn(Counter::default(), Some("test"), token);

        let (tx, rx) = oneshot::channel();
        actor.send(ParkMessage(tx)).unwrap();
        actor.ask(|_: &mut Counter| ()).await.unwrap();

        actor.shutdown();
        assert!(actor.is_closed());

        // The parked sender is dropped together with the state.
        let res = timeout(Duration::from_millis(500), rx).await.unwrap();
        assert!(res.is_err());
        assert_eq!(
            actor.ask(|state: &mut Counter| state.value).await,
            Err(MailboxClosed)
        );
    }
}
