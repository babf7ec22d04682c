use crate::dispatch::CommandError;
use crate::error::BusError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named arguments of a request. A JSON object; key order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Deserializes parameter `key` into `T`.
    ///
    /// # Errors
    /// [`CommandError::Failed`] when the key is absent or has the wrong shape, so
    /// handlers can use `?` and the caller sees a readable failure.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, CommandError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| CommandError::failed(format!("Parameter \"{key}\" is missing")))?;
        decode(key, value)
    }

    /// Like [`Params::get`] but an absent or `null` key yields `None`.
    ///
    /// # Errors
    /// [`CommandError::Failed`] when the key has the wrong shape.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CommandError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => decode(key, value).map(Some),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: &Value) -> Result<T, CommandError> {
    T::deserialize(value)
        .map_err(|e| CommandError::failed(format!("Parameter \"{key}\" is invalid: {e}")))
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A command invocation or an event notification travelling on the bus.
///
/// Build one with [`Request::command`] or [`Request::event`]; the sender is
/// stamped by the bus when the request is pushed.
///
/// ```rust
/// use hearth_bus::{Params, Request};
///
/// let request = Request::command("turn_on")
///     .to("lights")
///     .with_params(Params::new().with("light_id", "kitchen"));
/// assert!(!request.is_broadcast());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<String>,
    #[serde(default)]
    is_core_event: bool,
    #[serde(default)]
    params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    #[serde(default)]
    sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    peer_infos: Option<Params>,
}

impl Request {
    fn empty() -> Self {
        Self {
            command: None,
            event: None,
            is_core_event: false,
            params: Params::new(),
            to: None,
            sender: String::new(),
            device_id: None,
            peer_infos: None,
        }
    }

    pub fn command(name: impl Into<String>) -> Self {
        Self { command: Some(name.into()), ..Self::empty() }
    }

    pub fn event(name: impl Into<String>) -> Self {
        Self { event: Some(name.into()), ..Self::empty() }
    }

    /// Targets a single client. Requests without a target are broadcast.
    #[must_use]
    pub fn to(mut self, target: impl Into<String>) -> Self {
        self.to = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Marks the event as relayed from an external peer.
    #[must_use]
    pub fn with_peer_infos(mut self, peer_infos: Params) -> Self {
        self.peer_infos = Some(peer_infos);
        self
    }

    /// Marks the event as originated by the platform itself.
    #[must_use]
    pub const fn as_core_event(mut self) -> Self {
        self.is_core_event = true;
        self
    }

    #[must_use]
    pub fn command_name(&self) -> Option<&str> {
        self.command.as_deref()
    }

    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        self.event.as_deref()
    }

    /// The command or event name, whichever is set.
    #[must_use]
    pub fn name(&self) -> &str {
        self.command.as_deref().or(self.event.as_deref()).unwrap_or_default()
    }

    #[must_use]
    pub const fn is_command(&self) -> bool {
        self.command.is_some()
    }

    #[must_use]
    pub const fn is_event(&self) -> bool {
        self.event.is_some()
    }

    #[must_use]
    pub const fn is_core_event(&self) -> bool {
        self.is_core_event
    }

    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.to.as_deref()
    }

    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.to.is_none()
    }

    /// Name of the client that pushed the request. Empty until pushed.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    #[must_use]
    pub const fn peer_infos(&self) -> Option<&Params> {
        self.peer_infos.as_ref()
    }

    /// Whether the event was relayed from an external peer.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        self.peer_infos.is_some()
    }

    pub(crate) fn stamp_sender(&mut self, sender: &str) {
        sender.clone_into(&mut self.sender);
    }

    /// Checks the request shape before routing.
    ///
    /// # Errors
    /// [`BusError::InvalidMessage`] unless exactly one of command/event is set,
    /// [`BusError::InvalidParameter`] for blank names or a blank target.
    pub fn validate(&self) -> Result<(), BusError> {
        let name = match (&self.command, &self.event) {
            (Some(name), None) | (None, Some(name)) => name,
            (Some(_), Some(_)) => {
                return Err(BusError::InvalidMessage {
                    message: "Request cannot be both a command and an event".into(),
                    context: None,
                });
            },
            (None, None) => {
                return Err(BusError::InvalidMessage {
                    message: "Request must be a command or an event".into(),
                    context: None,
                });
            },
        };

        if name.trim().is_empty() {
            return Err(BusError::InvalidParameter {
                message: "Command or event name cannot be empty".into(),
                context: None,
            });
        }
        if self.to.as_deref().is_some_and(|to| to.trim().is_empty()) {
            return Err(BusError::InvalidParameter {
                message: "Target name cannot be empty".into(),
                context: Some(name.clone().into()),
            });
        }
        Ok(())
    }
}

/// Result of a command, or the acknowledgement of an event push.
///
/// Fields are private so a failed response can never carry data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ResponseRepr")]
pub struct Response {
    error: bool,
    message: String,
    data: Option<Value>,
    broadcast: bool,
}

#[derive(Deserialize)]
struct ResponseRepr {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    broadcast: bool,
}

impl From<ResponseRepr> for Response {
    fn from(raw: ResponseRepr) -> Self {
        let data = if raw.error || raw.broadcast { None } else { raw.data };
        Self { error: raw.error, message: raw.message, data, broadcast: raw.broadcast }
    }
}

impl Response {
    /// Successful response. `null` is stored as "no data".
    #[must_use]
    pub fn ok(data: impl Into<Value>) -> Self {
        let data = data.into();
        Self { error: false, message: String::new(), data: (!data.is_null()).then_some(data), broadcast: false }
    }

    /// Successful response without data.
    #[must_use]
    pub const fn empty() -> Self {
        Self { error: false, message: String::new(), data: None, broadcast: false }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self { error: true, message: message.into(), data: None, broadcast: false }
    }

    /// Not an error, but carries a message for the caller and no data.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self { error: false, message: message.into(), data: None, broadcast: false }
    }

    /// Acknowledgement of a broadcast push. Never carries data.
    #[must_use]
    pub const fn broadcast() -> Self {
        Self { error: false, message: String::new(), data: None, broadcast: true }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.broadcast
    }

    /// Splits the response into its data or its error message.
    ///
    /// # Errors
    /// Returns the response message when `error` is set.
    pub fn into_result(self) -> Result<Option<Value>, String> {
        if self.error { Err(self.message) } else { Ok(self.data) }
    }
}
