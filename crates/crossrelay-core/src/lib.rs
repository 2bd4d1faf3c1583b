//! CrossRelay Core - relay engine, routing, translation and platform adapters.
//!
//! A relay engine takes inbound events from one chat platform, resolves the
//! configured routes and delivers each message to every destination, keeping
//! formatting intact while translating the visible text.

pub mod app;
pub mod channel;
pub mod config;
pub mod dedup;
pub mod delivery;
pub mod links;
pub mod providers;
pub mod routing;
pub mod runtime;
pub mod translate;

#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;

pub use app::RelayApp;
pub use config::{ConfigError, RelayConfig};
pub use dedup::DedupGuard;
pub use delivery::{DeliveryExecutor, RetryPolicy};
pub use links::ReplyLinkStore;
pub use routing::{ResolvedRoute, Route, RouteResolver, RouteTable};
pub use runtime::{Collaborators, MediaGroupAggregator, RelayContext, RelayEngine};
pub use translate::EntityTranslator;
