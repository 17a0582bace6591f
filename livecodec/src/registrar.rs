//! Serializer registrar
//!
//! The codec setup hook. Which serializers a worker gets is decided by the
//! session, not at compile time: the registrar only knows the name of a
//! registration routine (from configuration), resolves it against the loader
//! and hands it the registry.

use crate::builtin::{self, HELPER_NAMESPACE};
use crate::codec::{CodecRegistrator, CodecRegistry};
use crate::config::WorkerConf;
use crate::error::LiveResult;
use crate::loader::Loader;
use crate::symbol::QualifiedSymbol;
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration key naming the registration routine as `<namespace>/<name>`.
pub const CUSTOMIZER_KEY: &str = "livecodec.codec.customizer";

/// Routine used when [`CUSTOMIZER_KEY`] is unset.
pub const DEFAULT_CUSTOMIZER: &str = "livecodec.codec/customizer";

#[derive(Debug, Clone)]
pub struct Registrar {
    loader: Arc<Loader>,
    conf: WorkerConf,
}

impl Registrar {
    pub fn new(loader: Arc<Loader>, conf: WorkerConf) -> Self {
        Registrar { loader, conf }
    }

    /// The routine this registrar will run, as configured.
    pub fn customizer_name(&self) -> &str {
        self.conf.get_or(CUSTOMIZER_KEY, DEFAULT_CUSTOMIZER)
    }
}

impl CodecRegistrator for Registrar {
    fn register_types(&self, registry: &mut CodecRegistry) -> LiveResult<()> {
        // Session serializers lean on the helpers whatever routine is configured.
        self.loader.require(HELPER_NAMESPACE)?;

        let configured = self.customizer_name();
        let symbol = QualifiedSymbol::parse(configured)?;
        debug!(customizer = %symbol, "resolving registration routine");
        self.loader.require(symbol.namespace())?;
        let routine = self.loader.resolve_registration(&symbol)?;

        let before = registry.len();
        routine(self.loader.as_ref(), registry)?;
        info!(
            customizer = %symbol,
            installed = registry.len() - before,
            default = configured == DEFAULT_CUSTOMIZER,
            "registration routine finished"
        );
        Ok(())
    }
}

/// The symbol of the default routine.
pub fn default_customizer() -> LiveResult<QualifiedSymbol> {
    builtin::helper(builtin::CUSTOMIZER)
}
