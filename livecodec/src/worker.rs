// Worker environment: configuration plus a codec set up once before first use

use crate::codec::Codec;
use crate::config::WorkerConf;
use crate::error::LiveResult;
use crate::loader::Loader;
use crate::registrar::Registrar;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct WorkerEnv {
    conf: WorkerConf,
    loader: Arc<Loader>,
    codec: OnceCell<Codec>,
}

impl WorkerEnv {
    pub fn new(conf: WorkerConf, loader: Arc<Loader>) -> Self {
        WorkerEnv {
            conf,
            loader,
            codec: OnceCell::new(),
        }
    }

    /// A worker bound to the process's system loader.
    pub fn system(conf: WorkerConf) -> Self {
        Self::new(conf, Loader::system())
    }

    pub fn conf(&self) -> &WorkerConf {
        &self.conf
    }

    pub fn loader(&self) -> &Arc<Loader> {
        &self.loader
    }

    /// The worker's codec. The registrar runs on first call only; a failed
    /// setup is returned to the caller and retried on the next call.
    pub fn codec(&self) -> LiveResult<&Codec> {
        self.codec.get_or_try_init(|| {
            info!(loader = self.loader.name(), "setting up worker codec");
            let registrar = Registrar::new(self.loader.clone(), self.conf.clone());
            Codec::configure(&registrar)
        })
    }

    pub fn is_configured(&self) -> bool {
        self.codec.get().is_some()
    }
}
