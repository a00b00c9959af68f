//! Protocol implementations.
//!
//! The handshake names a sub-protocol with `-proto <id>`. The [`Registry`]
//! maps each id to a factory that builds the [`Reactions`] for a new session.
//! It is filled in before the listener starts and only read afterwards.
//!
//! ## Protocols
//! - `it`: display-driver control channel (render, IPR, stop, selection)

pub mod it;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::command::Command;
use crate::error::DispatchError;
use crate::session::Reactions;

/// Builds session reactions from the handshake command.
pub type SessionFactory = Arc<dyn Fn(&Command) -> Box<dyn Reactions> + Send + Sync>;

/// Table of protocol id to session factory.
#[derive(Clone, Default)]
pub struct Registry {
    factories: HashMap<String, SessionFactory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every protocol shipped in this crate.
    pub fn builtin() -> Self {
        Self::new().register(it::PROTOCOL_ID, |handshake| {
            Box::new(it::ItHandler::new(handshake))
        })
    }

    /// Add or replace a protocol. Registration consumes the registry so
    /// that a shared registry cannot change while connections are served.
    pub fn register<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Command) -> Box<dyn Reactions> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
        self
    }

    /// Look up the factory for a protocol id.
    pub fn resolve(&self, id: &str) -> Result<&SessionFactory, DispatchError> {
        self.factories
            .get(id)
            .ok_or_else(|| DispatchError::UnknownProtocol(id.to_string()))
    }

    /// Registered protocol ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("protocols", &self.ids())
            .finish()
    }
}
