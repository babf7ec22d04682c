//! # Hearth Bus
//!
//! The in-process message bus every Hearth application talks through.
//!
//! ## Overview
//!
//! A [`MessageBus`] owns one FIFO queue per subscribed client. A [`Request`]
//! without a target is broadcast to every subscriber except its sender; a
//! targeted request goes to exactly one queue and may wait, for a bounded
//! time, for the target's [`Response`].
//!
//! Applications implement [`Application`] and run inside a [`BusClient`],
//! which pulls their queue, dispatches commands through a [`CommandTable`]
//! and hands events to [`Application::on_event`]. Faults inside handlers
//! become error responses and are reported to a [`CrashReporter`].
//!
//! ## Startup
//!
//! Until [`MessageBus::app_configured`] runs, broadcasts are held back and a
//! targeted push may wait up to [`BusConfig::startup_timeout`] for its target
//! to subscribe. Held broadcasts are delivered to the clients subscribed at
//! configuration time.
//!
//! # Example
//!
//! ```rust
//! use hearth_bus::{
//!     Application, Bootstrap, BusClient, BusConfig, Command, CommandTable, MessageBus, Params,
//! };
//!
//! struct Echo;
//!
//! impl Application for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn commands(&self) -> CommandTable<Self> {
//!         CommandTable::new().register(Command::new("echo").required("p"), |_, params| async move {
//!             params.get::<serde_json::Value>("p")
//!         })
//!     }
//! }
//!
//! struct Caller;
//!
//! impl Application for Caller {
//!     fn name(&self) -> &str {
//!         "caller"
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), hearth_bus::BusError> {
//! let bootstrap = Bootstrap::new(MessageBus::new(BusConfig::default()));
//! let echo = BusClient::new(Echo, &bootstrap);
//! let caller = BusClient::new(Caller, &bootstrap);
//! echo.start()?;
//! caller.start()?;
//! bootstrap.bus.app_configured();
//!
//! let response = caller.send_command("echo", "echo", Params::new().with("p", "hi")).await?;
//! assert_eq!(response.data(), Some(&serde_json::json!("hi")));
//!
//! bootstrap.bus.stop();
//! caller.stop().await;
//! echo.stop().await;
//! # Ok(())
//! # }
//! ```

mod bootstrap;
mod bus;
mod client;
mod config;
mod crash;
mod dispatch;
mod envelope;
mod error;
mod message;
mod registry;

pub use bootstrap::Bootstrap;
pub use bus::MessageBus;
pub use client::{Application, BusClient};
pub use config::BusConfig;
pub use crash::{CrashContext, CrashReporter, LogCrashReporter};
pub use dispatch::{Command, CommandError, CommandErrorExt, CommandResult, CommandTable, INTERNAL_ERROR};
pub use envelope::{Envelope, Responder};
pub use error::{BusError, BusErrorExt};
pub use message::{Params, Request, Response};
