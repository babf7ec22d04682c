use crate::message::{Request, Response};
use tokio::sync::oneshot;
use tracing::trace;

/// A request as handed out by [`MessageBus::pull`](crate::MessageBus::pull).
///
/// Carries the reply slot of a unicast push that awaits its response, and
/// whether the request was pushed before the bus was configured.
#[derive(Debug)]
pub struct Envelope {
    request: Request,
    reply: Option<oneshot::Sender<Response>>,
    startup: bool,
}

impl Envelope {
    pub(crate) const fn new(
        request: Request,
        reply: Option<oneshot::Sender<Response>>,
        startup: bool,
    ) -> Self {
        Self { request, reply, startup }
    }

    #[must_use]
    pub const fn request(&self) -> &Request {
        &self.request
    }

    /// Whether the request was pushed while applications were still starting.
    #[must_use]
    pub const fn is_startup(&self) -> bool {
        self.startup
    }

    /// Whether a pusher is waiting for the response.
    #[must_use]
    pub const fn expects_reply(&self) -> bool {
        self.reply.is_some()
    }

    #[must_use]
    pub fn into_parts(self) -> (Request, Responder) {
        (self.request, Responder(self.reply))
    }
}

/// The reply half of an [`Envelope`]. Dropping it unanswered lets the pusher
/// fail fast instead of running into its timeout.
#[derive(Debug)]
pub struct Responder(Option<oneshot::Sender<Response>>);

impl Responder {
    /// Sends `response` to the waiting pusher, if any.
    ///
    /// Returns `false` when nobody waits anymore (fire-and-forget push, or the
    /// pusher already timed out).
    pub fn respond(self, response: Response) -> bool {
        let Some(reply) = self.0 else {
            return false;
        };
        let delivered = reply.send(response).is_ok();
        if !delivered {
            trace!("Response dropped: pusher is gone");
        }
        delivered
    }

    #[must_use]
    pub const fn is_waiting(&self) -> bool {
        self.0.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responder_delivers_once() {
        let (tx, rx) = oneshot::channel();
        let envelope = Envelope::new(Request::command("ping").to("system"), Some(tx), false);
        assert!(envelope.expects_reply());

        let (request, responder) = envelope.into_parts();
        assert_eq!(request.name(), "ping");
        assert!(responder.respond(Response::ok("pong")));
        assert_eq!(rx.await.unwrap().data(), Some(&serde_json::json!("pong")));
    }

    #[test]
    fn test_responder_without_waiter() {
        let envelope = Envelope::new(Request::event("system.tick"), None, true);
        assert!(envelope.is_startup());
        let (_, responder) = envelope.into_parts();
        assert!(!responder.respond(Response::empty()));
    }
}
