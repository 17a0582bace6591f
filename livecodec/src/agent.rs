//! Instrumentation agent
//!
//! The host attaches an agent to a running worker once and hands it an
//! [`Instrumentation`] handle: the right to push new code into the system
//! loader after startup. The handle is published in a process-wide slot so
//! the rest of the session can reach it.
//!
//! The agent component only makes sense in the system loader: a handle
//! stored by a copy living in an isolated session loader would be invisible
//! to everything else, so loading it there fails immediately.
//!
//! The slot is written once. A second attach is rejected and the first
//! handle stays in place.

use crate::error::{LiveError, LiveResult};
use crate::loader::Loader;
use crate::namespace::{Namespace, Var};
use crate::symbol::QualifiedSymbol;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{info, warn};

static AGENT: Agent = Agent::new();

/// Capability to inject or redefine code in the running process.
#[derive(Debug, Clone)]
pub struct Instrumentation {
    target: Arc<Loader>,
}

impl Instrumentation {
    pub fn new(target: Arc<Loader>) -> Self {
        Instrumentation { target }
    }

    /// A handle over the system loader.
    pub fn for_system() -> Self {
        Self::new(Loader::system())
    }

    pub fn loader(&self) -> &Arc<Loader> {
        &self.target
    }

    /// Rebind `symbol`; the next resolution anywhere in the process sees it.
    pub fn redefine(&self, symbol: &QualifiedSymbol, var: Var) -> LiveResult<()> {
        self.target.define(symbol, var)
    }

    /// Push the source of a namespace that has not been loaded yet.
    pub fn provide<F>(&self, namespace: impl Into<String>, source: F) -> LiveResult<()>
    where
        F: Fn(&Loader, &Namespace) -> LiveResult<()> + Send + Sync + 'static,
    {
        self.target.provide(namespace, source)
    }

    pub fn reload(&self, namespace: &str) -> LiveResult<()> {
        self.target.reload(namespace).map(|_| ())
    }
}

/// Write-once holder for the process's instrumentation handle.
#[derive(Debug)]
pub struct Agent {
    slot: OnceCell<Instrumentation>,
}

impl Agent {
    pub const fn new() -> Self {
        Agent {
            slot: OnceCell::new(),
        }
    }

    /// Load the agent component through `loader`. Only the system loader may
    /// do so.
    pub fn load(loader: &Loader) -> LiveResult<&'static Agent> {
        if !loader.is_system() {
            return Err(LiveError::WrongLoader(loader.name().to_string()));
        }
        Ok(&AGENT)
    }

    /// Attach entry point. `args` is the host's agent argument string; it is
    /// logged and otherwise ignored.
    pub fn agentmain(&self, args: &str, instrumentation: Instrumentation) -> LiveResult<()> {
        match self.slot.set(instrumentation) {
            Ok(()) => {
                info!(args, "instrumentation attached");
                Ok(())
            }
            Err(_) => {
                warn!(args, "instrumentation already attached, keeping the first handle");
                Err(LiveError::AlreadyAttached)
            }
        }
    }

    pub fn instrumentation(&self) -> Option<&Instrumentation> {
        self.slot.get()
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}

/// The handle attached to this process, if any.
pub fn instrumentation() -> Option<&'static Instrumentation> {
    AGENT.instrumentation()
}
