//! Route resolution - maps a source location to its destinations.
//!
//! Each source `(chat, thread)` has at most one primary route plus any number
//! of fan-out destinations. Every resolved edge carries its own translate
//! flag.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crossrelay_traits::{ChatId, Destination, ThreadId, UserId, normalize_thread};

use crate::config::{ConfigError, RelayConfig};

/// Normalized `(chat, thread)` location key.
pub type LocationKey = (ChatId, ThreadId);

/// A configured primary route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub source: LocationKey,
    pub dest: Destination,
    pub sender_restriction: Option<UserId>,
    pub translate_override: Option<bool>,
}

impl Route {
    pub fn new(
        source_chat: ChatId,
        source_thread: Option<ThreadId>,
        dest_chat: ChatId,
        dest_thread: Option<ThreadId>,
    ) -> Self {
        Self {
            source: (source_chat, normalize_thread(source_thread)),
            dest: Destination::new(dest_chat, normalize_thread(dest_thread)),
            sender_restriction: None,
            translate_override: None,
        }
    }

    pub fn with_sender(mut self, sender: UserId) -> Self {
        self.sender_restriction = Some(sender);
        self
    }

    pub fn with_translate(mut self, translate: bool) -> Self {
        self.translate_override = Some(translate);
        self
    }
}

/// One destination produced by [`RouteResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub dest: Destination,
    pub translate: bool,
}

/// Immutable routing graph built once at startup.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: HashMap<LocationKey, Route>,
    fanout: HashMap<LocationKey, Vec<Destination>>,
    no_translate: HashSet<(LocationKey, Destination)>,
    translation_enabled: bool,
    anonymous_admin_id: UserId,
}

impl RouteTable {
    pub fn new(anonymous_admin_id: UserId, translation_enabled: bool) -> Self {
        Self {
            routes: HashMap::new(),
            fanout: HashMap::new(),
            no_translate: HashSet::new(),
            translation_enabled,
            anonymous_admin_id,
        }
    }

    /// Build and validate the table from configuration.
    pub fn from_config(config: &RelayConfig) -> Result<Self, ConfigError> {
        let mut table = Self::new(
            config.telegram.anonymous_admin_id,
            config.translation.is_enabled(),
        );

        for route in &config.routes {
            let mut entry = Route::new(
                route.source_chat,
                route.source_thread,
                route.dest_chat,
                route.dest_thread,
            );
            entry.sender_restriction = route.sender;
            entry.translate_override = route.translate;
            table.add_route(entry)?;
        }

        for edge in &config.fanout {
            table.add_fanout(
                (edge.source_chat, normalize_thread(edge.source_thread)),
                Destination::new(edge.dest_chat, normalize_thread(edge.dest_thread)),
            );
        }

        for edge in &config.no_translate {
            table.add_no_translate(
                (edge.source_chat, normalize_thread(edge.source_thread)),
                Destination::new(edge.dest_chat, normalize_thread(edge.dest_thread)),
            );
        }

        table.check_loops()?;
        Ok(table)
    }

    /// Override whether a translation provider is available.
    pub fn with_translation_enabled(mut self, enabled: bool) -> Self {
        self.translation_enabled = enabled;
        self
    }

    pub fn add_route(&mut self, route: Route) -> Result<(), ConfigError> {
        if self.routes.contains_key(&route.source) {
            return Err(ConfigError::Invalid(format!(
                "duplicate route for source {}:{}",
                route.source.0, route.source.1
            )));
        }
        self.routes.insert(route.source, route);
        Ok(())
    }

    pub fn add_fanout(&mut self, source: LocationKey, dest: Destination) {
        self.fanout.entry(source).or_default().push(dest);
    }

    pub fn add_no_translate(&mut self, source: LocationKey, dest: Destination) {
        self.no_translate.insert((source, dest));
    }

    /// Reject tables where a destination is also a source.
    ///
    /// A relayed copy landing in a source location would be picked up again.
    pub fn check_loops(&self) -> Result<(), ConfigError> {
        let sources: HashSet<LocationKey> = self
            .routes
            .keys()
            .chain(self.fanout.keys())
            .copied()
            .collect();

        let mut offending: Vec<Destination> = self
            .destinations()
            .into_iter()
            .filter(|dest| sources.contains(&(dest.chat, dest.thread)))
            .collect();
        offending.sort_by_key(|dest| (dest.chat, dest.thread));

        match offending.first() {
            Some(dest) => Err(ConfigError::RouteLoop {
                chat: dest.chat,
                thread: dest.thread,
            }),
            None => Ok(()),
        }
    }

    /// Every distinct destination of primary and fan-out edges.
    pub fn destinations(&self) -> HashSet<Destination> {
        self.routes
            .values()
            .map(|route| route.dest)
            .chain(self.fanout.values().flatten().copied())
            .collect()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn fanout_count(&self) -> usize {
        self.fanout.values().map(Vec::len).sum()
    }

    pub fn translation_enabled(&self) -> bool {
        self.translation_enabled
    }

    /// Routes sorted by source for display.
    pub fn sorted_routes(&self) -> Vec<&Route> {
        let mut routes: Vec<&Route> = self.routes.values().collect();
        routes.sort_by_key(|route| route.source);
        routes
    }

    /// Fan-out edges sorted by source for display.
    pub fn sorted_fanout(&self) -> Vec<(LocationKey, Destination)> {
        let mut edges: Vec<(LocationKey, Destination)> = self
            .fanout
            .iter()
            .flat_map(|(source, dests)| dests.iter().map(move |dest| (*source, *dest)))
            .collect();
        edges.sort_by_key(|(source, dest)| (*source, dest.chat, dest.thread));
        edges
    }

    /// Whether the edge `source -> dest` carries translated content.
    pub fn edge_translates(
        &self,
        source: LocationKey,
        dest: Destination,
        route_override: Option<bool>,
    ) -> bool {
        self.translation_enabled
            && route_override != Some(false)
            && !self.no_translate.contains(&(source, dest))
    }
}

/// Pure lookup over a [`RouteTable`].
#[derive(Debug, Clone)]
pub struct RouteResolver {
    table: RouteTable,
}

impl RouteResolver {
    pub fn new(table: RouteTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Resolve destinations for a post from `sender` in `location`/`thread`.
    ///
    /// Returns an empty list when nothing matches.
    pub fn resolve(
        &self,
        location: ChatId,
        thread: Option<ThreadId>,
        sender: Option<UserId>,
    ) -> Vec<ResolvedRoute> {
        let source = (location, normalize_thread(thread));
        let mut resolved: Vec<ResolvedRoute> = Vec::new();

        if let Some(route) = self.table.routes.get(&source) {
            if self.sender_allowed(route, sender) {
                resolved.push(ResolvedRoute {
                    dest: route.dest,
                    translate: self.table.edge_translates(
                        source,
                        route.dest,
                        route.translate_override,
                    ),
                });
            } else {
                debug!(
                    source_chat = location,
                    thread = source.1,
                    sender = ?sender,
                    "Sender restriction filtered primary route"
                );
            }
        }

        if let Some(dests) = self.table.fanout.get(&source) {
            for dest in dests {
                if resolved.iter().any(|existing| existing.dest == *dest) {
                    continue;
                }
                resolved.push(ResolvedRoute {
                    dest: *dest,
                    translate: self.table.edge_translates(source, *dest, None),
                });
            }
        }

        debug!(
            source_chat = location,
            thread = source.1,
            destinations = resolved.len(),
            "Resolved routes"
        );
        resolved
    }

    fn sender_allowed(&self, route: &Route, sender: Option<UserId>) -> bool {
        match route.sender_restriction {
            None => true,
            Some(restriction) => {
                sender == Some(restriction) || sender == Some(self.table.anonymous_admin_id)
            }
        }
    }
}
