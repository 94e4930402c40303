use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::events::tick::RoutedTick;
use crate::observability::metrics;
use crate::types::asset::AssetClass;
use crate::types::ids::ConnectionId;

/// Message delivered to one downstream connection's outbound queue. The
/// transport layer serializes it; delivery never blocks the router.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    #[serde(rename_all = "camelCase")]
    Subscribed {
        asset_class: AssetClass,
        symbols: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Unsubscribed {
        asset_class: AssetClass,
        symbols: Vec<String>,
    },
    Snapshot {
        ticks: Vec<RoutedTick>,
    },
    Tick {
        #[serde(flatten)]
        tick: RoutedTick,
    },
    Error {
        code: String,
        message: String,
    },
    Pong,
}

struct ConnectionEntry {
    sender: mpsc::UnboundedSender<OutboundMessage>,
    symbols: HashSet<String>,
    asset_classes: HashSet<AssetClass>,
}

/// Who is interested in what. Concurrent by construction: the maps are
/// sharded, so subscribe/unsubscribe/lookup on unrelated connections never
/// contend on one global lock.
///
/// `remove_connection` is the only full-cleanup path and must run on every
/// disconnect; a missed call leaks the connection's group memberships.
pub struct SubscriptionRegistry {
    connections: DashMap<ConnectionId, ConnectionEntry>,
    by_symbol: DashMap<String, HashSet<ConnectionId>>,
    by_class: DashMap<AssetClass, HashSet<ConnectionId>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        SubscriptionRegistry {
            connections: DashMap::new(),
            by_symbol: DashMap::new(),
            by_class: DashMap::new(),
        }
    }

    /// Attach a new connection with its outbound queue.
    pub fn register(&self, id: ConnectionId, sender: mpsc::UnboundedSender<OutboundMessage>) {
        self.connections.insert(
            id,
            ConnectionEntry {
                sender,
                symbols: HashSet::new(),
                asset_classes: HashSet::new(),
            },
        );
        metrics::ACTIVE_CONNECTIONS.set(self.connections.len() as i64);
    }

    /// Join the per-symbol groups. Idempotent: re-subscribing to a symbol is
    /// a no-op. An empty symbol list is a caller error, never silently
    /// accepted.
    pub fn subscribe(
        &self,
        id: ConnectionId,
        asset_class: AssetClass,
        symbols: &[String],
    ) -> Result<Vec<String>> {
        if symbols.is_empty() {
            return Err(Error::NoSymbols);
        }
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(Error::UnknownConnection(id))?;

        let mut joined = Vec::new();
        for symbol in symbols {
            if entry.symbols.insert(symbol.clone()) {
                self.by_symbol
                    .entry(symbol.clone())
                    .or_default()
                    .insert(id);
                joined.push(symbol.clone());
            }
        }
        tracing::debug!(connection = %id, %asset_class, joined = joined.len(), "subscribed");
        Ok(joined)
    }

    /// Leave the per-symbol groups. Unsubscribing from a symbol never joined
    /// is a no-op.
    pub fn unsubscribe(&self, id: ConnectionId, symbols: &[String]) -> Result<()> {
        if symbols.is_empty() {
            return Err(Error::NoSymbols);
        }
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(Error::UnknownConnection(id))?;

        for symbol in symbols {
            if entry.symbols.remove(symbol) {
                if let Some(mut set) = self.by_symbol.get_mut(symbol) {
                    set.remove(&id);
                }
            }
        }
        Ok(())
    }

    /// Join a whole asset-class group (every symbol of that class).
    pub fn subscribe_class(&self, id: ConnectionId, asset_class: AssetClass) -> Result<()> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(Error::UnknownConnection(id))?;
        if entry.asset_classes.insert(asset_class) {
            self.by_class.entry(asset_class).or_default().insert(id);
        }
        Ok(())
    }

    pub fn unsubscribe_class(&self, id: ConnectionId, asset_class: AssetClass) -> Result<()> {
        let mut entry = self
            .connections
            .get_mut(&id)
            .ok_or(Error::UnknownConnection(id))?;
        if entry.asset_classes.remove(&asset_class) {
            if let Some(mut set) = self.by_class.get_mut(&asset_class) {
                set.remove(&id);
            }
        }
        Ok(())
    }

    /// Full cleanup on disconnect, normal or abnormal.
    pub fn remove_connection(&self, id: ConnectionId) {
        if let Some((_, entry)) = self.connections.remove(&id) {
            for symbol in &entry.symbols {
                if let Some(mut set) = self.by_symbol.get_mut(symbol) {
                    set.remove(&id);
                }
            }
            for class in &entry.asset_classes {
                if let Some(mut set) = self.by_class.get_mut(class) {
                    set.remove(&id);
                }
            }
        }
        self.by_symbol.retain(|_, set| !set.is_empty());
        self.by_class.retain(|_, set| !set.is_empty());
        metrics::ACTIVE_CONNECTIONS.set(self.connections.len() as i64);
    }

    /// Targets for one symbol: the symbol group plus its asset-class group.
    pub fn subscribers_for(
        &self,
        symbol: &str,
        asset_class: AssetClass,
    ) -> Vec<(ConnectionId, mpsc::UnboundedSender<OutboundMessage>)> {
        let mut ids: HashSet<ConnectionId> = HashSet::new();
        if let Some(set) = self.by_symbol.get(symbol) {
            ids.extend(set.iter().copied());
        }
        if let Some(set) = self.by_class.get(&asset_class) {
            ids.extend(set.iter().copied());
        }
        ids.into_iter()
            .filter_map(|id| {
                self.connections
                    .get(&id)
                    .map(|entry| (id, entry.sender.clone()))
            })
            .collect()
    }

    /// Push a message onto one connection's queue.
    pub fn send_to(&self, id: ConnectionId, message: OutboundMessage) -> Result<()> {
        let entry = self
            .connections
            .get(&id)
            .ok_or(Error::UnknownConnection(id))?;
        entry
            .sender
            .send(message)
            .map_err(|_| Error::ConnectionClosed)?;
        Ok(())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// The symbol set a connection currently holds; test and debug surface.
    pub fn symbols_of(&self, id: ConnectionId) -> Option<HashSet<String>> {
        self.connections.get(&id).map(|e| e.symbols.clone())
    }

    pub fn symbol_subscribers(&self, symbol: &str) -> HashSet<ConnectionId> {
        self.by_symbol
            .get(symbol)
            .map(|set| set.clone())
            .unwrap_or_default()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
