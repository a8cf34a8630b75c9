//! Router: maps events to physical exchange names.
//!
//! Two tables are configured at startup:
//! - exchanges: `alias -> exchange name` (the broker's identifier)
//! - routes: `key -> "alias1, alias2"`
//!
//! A route key is either a full type identity, a short name (last path
//! segment), or one of the reserved keys [`ALL_ROUTE`] / [`OTHERS_ROUTE`].

use std::collections::HashMap;

use crate::error::{BusError, Result};
use crate::event::Event;

/// Catch-all route key.
pub const ALL_ROUTE: &str = "_all";
/// Route key used when nothing more specific matched.
pub const OTHERS_ROUTE: &str = "_others";

#[derive(Debug, Clone)]
pub struct Router {
    routes: HashMap<String, String>,
    exchanges: HashMap<String, String>,
}

impl Router {
    /// Build a router. Fails with `EmptyExchangeList` when no exchange is
    /// configured.
    pub fn new(routes: HashMap<String, String>, exchanges: HashMap<String, String>) -> Result<Self> {
        if exchanges.is_empty() {
            return Err(BusError::EmptyExchangeList);
        }
        Ok(Self { routes, exchanges })
    }

    /// Resolve the exchanges an event must be published to.
    ///
    /// Lookup order: full type identity, short name, `_all`, `_others`.
    /// No match yields an empty list. Every alias in the matched rule must be
    /// configured, otherwise the whole call fails.
    pub fn exchanges_for_event(&self, event: &Event) -> Result<Vec<String>> {
        let rule = self
            .routes
            .get(&event.event_type)
            .or_else(|| self.routes.get(event.short_name()))
            .or_else(|| self.routes.get(ALL_ROUTE))
            .or_else(|| self.routes.get(OTHERS_ROUTE));

        let Some(rule) = rule else {
            return Ok(Vec::new());
        };

        rule.split(',')
            .map(|alias| self.exchange_for_alias(alias.trim()).map(str::to_string))
            .collect()
    }

    /// Physical exchange name for an alias.
    pub fn exchange_for_alias(&self, alias: &str) -> Result<&str> {
        self.exchanges
            .get(alias)
            .map(String::as_str)
            .ok_or_else(|| BusError::InvalidExchange(alias.to_string()))
    }

    /// Configured aliases, sorted.
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.exchanges.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }
}
