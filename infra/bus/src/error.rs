use crate::message::Request;
use std::borrow::Cow;
use std::time::Duration;

/// Errors returned by [`MessageBus`](crate::MessageBus) and [`BusClient`](crate::BusClient)
/// operations.
#[hearth_derive::hearth_error]
pub enum BusError {
    /// The request is structurally malformed (blank names, blank target).
    #[error("Invalid parameter{}: {message}", format_context(.context))]
    InvalidParameter { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The request does not carry exactly one of `command`/`event`.
    #[error("Invalid message{}: {message}", format_context(.context))]
    InvalidMessage { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The named client is not subscribed to the bus.
    #[error("Invalid module{}: \"{module}\" is not subscribed", format_context(.context))]
    InvalidModule { module: String, context: Option<Cow<'static, str>> },

    /// A unicast push did not get a response in time.
    ///
    /// Carries the original request for diagnostics.
    #[error("No response from \"{target}\" after {timeout:?}{}", format_context(.context))]
    NoResponse {
        target: String,
        timeout: Duration,
        request: Box<Request>,
        context: Option<Cow<'static, str>>,
    },

    /// `pull` found nothing before its timeout. Expected while a client is idle.
    #[error("No message available for \"{module}\"{}", format_context(.context))]
    NoMessageAvailable { module: String, context: Option<Cow<'static, str>> },

    /// The bus has been stopped; no more pushes are accepted.
    #[error("Bus stopped{}", format_context(.context))]
    Stopped { context: Option<Cow<'static, str>> },

    /// A queue failed underneath an operation (closed while in use, reply dropped).
    #[error("Bus queue fault{}: {message}", format_context(.context))]
    Queue { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Generic failure, e.g. a client targeting itself through the bus.
    #[error("{message}{}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl BusError {
    pub(crate) fn invalid_module(module: impl Into<String>) -> Self {
        Self::InvalidModule { module: module.into(), context: None }
    }

    pub(crate) const fn stopped() -> Self {
        Self::Stopped { context: None }
    }

    /// Whether the error kind is fatal to the bus itself (stopped or broken queue).
    #[must_use]
    pub const fn is_bus_failure(&self) -> bool {
        matches!(self, Self::Stopped { .. } | Self::Queue { .. })
    }
}
