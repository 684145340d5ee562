use crate::backend::{Backend, RawDriver};
use crate::session::Session;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

static GLOBAL: OnceLock<Context> = OnceLock::new();

/// Handle to the wrapped library's context and this application's session
/// slot. Cloning is cheap and every clone refers to the same context.
///
/// Acquisition libraries tend to misbehave (or hang) when their context is
/// created more than once per process. Create one `Context` at startup and
/// pass it around, or use [`Context::global_or_init`].
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    backend: Arc<dyn Backend>,
    session: Mutex<Option<Session>>,
}

impl Context {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self::from_backend(Arc::new(backend))
    }

    pub fn from_backend(backend: Arc<dyn Backend>) -> Self {
        log::debug!("Creating context");
        Self {
            inner: Arc::new(ContextInner {
                backend,
                session: Mutex::new(None),
            }),
        }
    }

    /// The process-wide context, created by `init` on the first call.
    /// Later calls return the existing context and never run `init`.
    pub fn global_or_init(init: impl FnOnce() -> Arc<dyn Backend>) -> Context {
        GLOBAL
            .get_or_init(|| {
                log::info!("Creating process-wide context");
                Context::from_backend(init())
            })
            .clone()
    }

    /// The process-wide context, if [`Context::global_or_init`] ran before.
    pub fn global() -> Option<Context> {
        GLOBAL.get().cloned()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    pub fn driver_names(&self) -> Vec<String> {
        self.inner
            .backend
            .drivers()
            .iter()
            .map(|driver| driver.name().to_string())
            .collect()
    }

    pub fn driver(&self, name: &str) -> Option<Arc<dyn RawDriver>> {
        self.inner
            .backend
            .drivers()
            .into_iter()
            .find(|driver| driver.name() == name)
    }

    pub fn ptr_eq(a: &Context, b: &Context) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    pub(crate) fn session_slot(&self) -> MutexGuard<'_, Option<Session>> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("drivers", &self.driver_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::DemoBackend;

    #[test]
    fn test_driver_lookup() {
        let context = Context::new(DemoBackend::default());
        assert_eq!(context.driver_names(), vec!["demo"]);
        assert_eq!(context.driver("demo").unwrap().long_name(), "Demo driver and pattern generator");
        assert!(context.driver("rdtech-dps").is_none());
    }

    #[test]
    fn test_clones_share_context() {
        let context = Context::new(DemoBackend::default());
        let other = context.clone();
        assert!(Context::ptr_eq(&context, &other));
        assert!(!Context::ptr_eq(&context, &Context::new(DemoBackend::default())));
    }

    #[test]
    fn test_global_created_once() {
        let first = Context::global_or_init(|| Arc::new(DemoBackend::default()));
        let second = Context::global_or_init(|| unreachable!("context must not be created twice"));
        assert!(Context::ptr_eq(&first, &second));
        assert!(Context::ptr_eq(&first, &Context::global().unwrap()));
    }
}
