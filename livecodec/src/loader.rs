//! Loaders - namespace tables with on-demand loading
//!
//! A loader owns namespace *sources* (code pushed into the process but not
//! yet evaluated) and loaded *namespaces*. `require` evaluates a source the
//! first time its namespace is touched; later requires are plain lookups.
//!
//! There is exactly one system loader per process. Sessions create isolated
//! child loaders on top of it: a child answers from its own namespaces first
//! and falls back to its parent for anything it does not define.

use crate::builtin;
use crate::error::{poisoned, LiveError, LiveResult};
use crate::namespace::{
    DecodeFn, EncodeFn, Namespace, NamespaceSource, RegistrationFn, Var,
};
use crate::symbol::QualifiedSymbol;
use crate::value::RecordType;
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, ThreadId};
use tracing::{debug, info};

static SYSTEM_LOADER: Lazy<Arc<Loader>> = Lazy::new(|| Loader::new_root("system"));

pub struct Loader {
    name: String,
    parent: Option<Arc<Loader>>,
    sources: RwLock<HashMap<String, NamespaceSource>>,
    namespaces: RwLock<HashMap<String, Arc<Namespace>>>,
    /// Namespaces currently being loaded, per thread, for cycle detection
    loading: RwLock<HashMap<ThreadId, Vec<String>>>,
    /// In-flight first loads; late arrivals wait here instead of re-running the source
    gates: Mutex<HashMap<String, Arc<OnceCell<Arc<Namespace>>>>>,
}

impl Loader {
    /// The process-wide loader.
    pub fn system() -> Arc<Loader> {
        SYSTEM_LOADER.clone()
    }

    /// A standalone root loader with the built-in helper namespace provided.
    /// It shares nothing with the system loader.
    pub fn new_root(name: impl Into<String>) -> Arc<Loader> {
        Arc::new(Self::empty(name.into(), None, builtin::sources()))
    }

    /// A child loader for session code, delegating to `parent`.
    pub fn isolated(name: impl Into<String>, parent: Arc<Loader>) -> Arc<Loader> {
        Arc::new(Self::empty(name.into(), Some(parent), HashMap::new()))
    }

    fn empty(
        name: String,
        parent: Option<Arc<Loader>>,
        sources: HashMap<String, NamespaceSource>,
    ) -> Self {
        Loader {
            name,
            parent,
            sources: RwLock::new(sources),
            namespaces: RwLock::new(HashMap::new()),
            loading: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_system(&self) -> bool {
        std::ptr::eq(self, Arc::as_ptr(&*SYSTEM_LOADER))
    }

    /// Register the source of a namespace. If the namespace is already
    /// loaded the new source only takes effect on `reload`.
    pub fn provide<F>(&self, namespace: impl Into<String>, source: F) -> LiveResult<()>
    where
        F: Fn(&Loader, &Namespace) -> LiveResult<()> + Send + Sync + 'static,
    {
        let namespace = namespace.into();
        debug!(loader = %self.name, namespace = %namespace, "namespace source provided");
        let source: NamespaceSource = Arc::new(source);
        self.sources
            .write()
            .map_err(poisoned)?
            .insert(namespace, source);
        Ok(())
    }

    /// True if this loader or an ancestor has the namespace loaded or can load it.
    pub fn provides(&self, namespace: &str) -> LiveResult<bool> {
        if self.has_local(namespace)? {
            return Ok(true);
        }
        match &self.parent {
            Some(parent) => parent.provides(namespace),
            None => Ok(false),
        }
    }

    fn has_local(&self, namespace: &str) -> LiveResult<bool> {
        Ok(self
            .namespaces
            .read()
            .map_err(poisoned)?
            .contains_key(namespace)
            || self.sources.read().map_err(poisoned)?.contains_key(namespace))
    }

    /// Ensure `namespace` is loaded, here and in whichever ancestor provides it.
    pub fn require(&self, namespace: &str) -> LiveResult<Arc<Namespace>> {
        let local = self.require_local(namespace)?;
        let inherited = match &self.parent {
            Some(parent) if parent.provides(namespace)? => Some(parent.require(namespace)?),
            _ => None,
        };
        local
            .or(inherited)
            .ok_or_else(|| LiveError::NamespaceNotFound(namespace.to_string()))
    }

    fn require_local(&self, namespace: &str) -> LiveResult<Option<Arc<Namespace>>> {
        if let Some(ns) = self.loaded(namespace)? {
            return Ok(Some(ns));
        }
        let source = match self.sources.read().map_err(poisoned)?.get(namespace) {
            Some(source) => source.clone(),
            None => return Ok(None),
        };
        // A re-entrant require would wait on its own gate.
        self.check_cycle(namespace)?;

        let gate = self
            .gates
            .lock()
            .map_err(poisoned)?
            .entry(namespace.to_string())
            .or_default()
            .clone();
        let result = gate
            .get_or_try_init(|| -> LiveResult<Arc<Namespace>> {
                if let Some(ns) = self.loaded(namespace)? {
                    return Ok(ns);
                }
                let ns = Arc::new(Namespace::new(namespace));
                self.evaluate(&ns, &source)?;
                self.namespaces
                    .write()
                    .map_err(poisoned)?
                    .insert(namespace.to_string(), ns.clone());
                info!(loader = %self.name, namespace, "namespace loaded");
                Ok(ns)
            })
            .cloned();

        let mut gates = self.gates.lock().map_err(poisoned)?;
        if gates
            .get(namespace)
            .map_or(false, |current| Arc::ptr_eq(current, &gate))
        {
            gates.remove(namespace);
        }
        result.map(Some)
    }

    fn loaded(&self, namespace: &str) -> LiveResult<Option<Arc<Namespace>>> {
        Ok(self
            .namespaces
            .read()
            .map_err(poisoned)?
            .get(namespace)
            .cloned())
    }

    fn check_cycle(&self, namespace: &str) -> LiveResult<()> {
        let loading = self.loading.read().map_err(poisoned)?;
        match loading.get(&thread::current().id()) {
            Some(stack) if stack.iter().any(|n| n == namespace) => {
                let mut cycle = stack.clone();
                cycle.push(namespace.to_string());
                Err(LiveError::CircularDependency(cycle))
            }
            _ => Ok(()),
        }
    }

    /// Run `source` against `ns` with cycle detection.
    fn evaluate(&self, ns: &Namespace, source: &NamespaceSource) -> LiveResult<()> {
        self.check_cycle(ns.name())?;
        let thread_id = thread::current().id();
        self.loading
            .write()
            .map_err(poisoned)?
            .entry(thread_id)
            .or_default()
            .push(ns.name().to_string());

        let result = source(self, ns);

        let mut loading = self.loading.write().map_err(poisoned)?;
        if let Some(stack) = loading.get_mut(&thread_id) {
            stack.pop();
            if stack.is_empty() {
                loading.remove(&thread_id);
            }
        }
        result
    }

    /// Re-run the source of an already provided namespace in place. Bindings
    /// the source no longer defines are kept.
    pub fn reload(&self, namespace: &str) -> LiveResult<Arc<Namespace>> {
        let source = self.sources.read().map_err(poisoned)?.get(namespace).cloned();
        let Some(source) = source else {
            return match &self.parent {
                Some(parent) => parent.reload(namespace),
                None => Err(LiveError::NamespaceNotFound(namespace.to_string())),
            };
        };
        let existing = self.namespaces.read().map_err(poisoned)?.get(namespace).cloned();
        match existing {
            Some(ns) => {
                self.evaluate(&ns, &source)?;
                info!(loader = %self.name, namespace, "namespace reloaded");
                Ok(ns)
            }
            None => self
                .require_local(namespace)?
                .ok_or_else(|| LiveError::NamespaceNotFound(namespace.to_string())),
        }
    }

    /// Bind `symbol` in this loader, loading its namespace from a local
    /// source first so the new binding wins over the source's.
    pub fn define(&self, symbol: &QualifiedSymbol, var: Var) -> LiveResult<()> {
        let ns = match self.require_local(symbol.namespace())? {
            Some(ns) => ns,
            None => self
                .namespaces
                .write()
                .map_err(poisoned)?
                .entry(symbol.namespace().to_string())
                .or_insert_with(|| Arc::new(Namespace::new(symbol.namespace())))
                .clone(),
        };
        debug!(loader = %self.name, symbol = %symbol, kind = var.kind(), "symbol defined");
        ns.define(symbol.name(), var)
    }

    /// Resolve `symbol`, loading its namespace on demand.
    pub fn resolve(&self, symbol: &QualifiedSymbol) -> LiveResult<Var> {
        self.require(symbol.namespace())?;
        self.find(symbol)?
            .ok_or_else(|| LiveError::SymbolNotFound {
                namespace: symbol.namespace().to_string(),
                name: symbol.name().to_string(),
            })
    }

    fn find(&self, symbol: &QualifiedSymbol) -> LiveResult<Option<Var>> {
        let local = self
            .namespaces
            .read()
            .map_err(poisoned)?
            .get(symbol.namespace())
            .cloned();
        if let Some(ns) = local {
            if let Some(var) = ns.get(symbol.name())? {
                return Ok(Some(var));
            }
        }
        match &self.parent {
            Some(parent) => parent.find(symbol),
            None => Ok(None),
        }
    }

    pub fn resolve_registration(&self, symbol: &QualifiedSymbol) -> LiveResult<RegistrationFn> {
        match self.resolve(symbol)? {
            Var::Registration(f) => Ok(f),
            other => Err(not_callable(symbol, "registration routine", &other)),
        }
    }

    pub fn resolve_encoder(&self, symbol: &QualifiedSymbol) -> LiveResult<EncodeFn> {
        match self.resolve(symbol)? {
            Var::Encoder(f) => Ok(f),
            other => Err(not_callable(symbol, "encoder", &other)),
        }
    }

    pub fn resolve_decoder(&self, symbol: &QualifiedSymbol) -> LiveResult<DecodeFn> {
        match self.resolve(symbol)? {
            Var::Decoder(f) => Ok(f),
            other => Err(not_callable(symbol, "decoder", &other)),
        }
    }

    /// Record types declared in every loaded namespace visible from here.
    /// A child's declaration shadows an ancestor's of the same name.
    pub fn record_types(&self) -> LiveResult<Vec<RecordType>> {
        let mut types = match &self.parent {
            Some(parent) => parent.record_types()?,
            None => Vec::new(),
        };
        let namespaces: Vec<Arc<Namespace>> = self
            .namespaces
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect();
        for ns in namespaces {
            for record_type in ns.record_types()? {
                types.retain(|t| t.name() != record_type.name());
                types.push(record_type);
            }
        }
        types.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(types)
    }

    /// Names of the namespaces loaded in this loader (not its ancestors).
    pub fn loaded_namespaces(&self) -> LiveResult<Vec<String>> {
        let mut names: Vec<String> = self
            .namespaces
            .read()
            .map_err(poisoned)?
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

fn not_callable(symbol: &QualifiedSymbol, expected: &'static str, found: &Var) -> LiveError {
    LiveError::NotCallable {
        symbol: symbol.to_string(),
        expected,
        found: found.kind(),
    }
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .field("namespaces", &self.loaded_namespaces().unwrap_or_default())
            .finish()
    }
}
