//! Hot-swappable route table.
//!
//! Updates are staged and installed at the start of the next request, never
//! while one is being dispatched. The live table sits behind an `ArcSwap`, so
//! a request sees one whole table from lookup to response.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;

use crate::routing::table::RouteTable;

/// Holds the live table and at most one staged replacement.
pub struct RouteStore {
    current: ArcSwap<RouteTable>,
    staged: Mutex<Option<Arc<RouteTable>>>,
    has_staged: AtomicBool,
    version: AtomicU64,
}

impl RouteStore {
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
            staged: Mutex::new(None),
            has_staged: AtomicBool::new(false),
            version: AtomicU64::new(1),
        }
    }

    fn staged(&self) -> MutexGuard<'_, Option<Arc<RouteTable>>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live table, without installing staged changes.
    pub fn current(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    /// Install any staged table, then return the table this request will use.
    pub fn begin_request(&self) -> Arc<RouteTable> {
        if self.has_staged.load(Ordering::Acquire) {
            let mut staged = self.staged();
            if let Some(table) = staged.take() {
                self.current.store(table);
                let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::info!(version, routes = self.current.load().routes().len(), "Route table installed");
            }
            self.has_staged.store(false, Ordering::Release);
        }
        self.current.load_full()
    }

    /// Replace whatever is staged with `table`.
    pub fn stage(&self, table: RouteTable) {
        let mut staged = self.staged();
        *staged = Some(Arc::new(table));
        self.has_staged.store(true, Ordering::Release);
    }

    /// Derive a new staged table from the latest one (staged if present, else live).
    ///
    /// Concurrent updates are serialized, so two admin calls never lose each other's change.
    pub fn update<F, E>(&self, f: F) -> Result<Arc<RouteTable>, E>
    where
        F: FnOnce(&RouteTable) -> Result<RouteTable, E>,
    {
        let mut staged = self.staged();
        let latest = staged.clone().unwrap_or_else(|| self.current.load_full());
        let next = Arc::new(f(&latest)?);
        *staged = Some(next.clone());
        self.has_staged.store(true, Ordering::Release);
        Ok(next)
    }

    /// Number of tables installed so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, GatewayConfig, RouteConfig};
    use crate::http::local::HandlerRegistry;
    use crate::routing::router::Route;

    fn route(name: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            proxy_enable: true,
            proxy_servers: vec![BackendConfig { name: "b".into(), url: "http://127.0.0.1:1".into() }],
            ..Default::default()
        }
    }

    fn store() -> RouteStore {
        let config = GatewayConfig { routes: vec![route("a")], ..Default::default() };
        RouteStore::new(RouteTable::build(&config, &HandlerRegistry::with_builtins()).unwrap())
    }

    #[test]
    fn test_staged_table_installed_on_next_request() {
        let store = store();
        let in_flight = store.begin_request();

        store
            .update(|t| Ok::<_, ()>(t.with_route(Route::compile(&route("b"), &HandlerRegistry::with_builtins()).unwrap())))
            .unwrap();

        // The request already running keeps its table; the live one is untouched until the next request.
        assert_eq!(in_flight.routes().len(), 1);
        assert_eq!(store.current().routes().len(), 1);
        assert_eq!(store.version(), 1);

        let next = store.begin_request();
        assert_eq!(next.routes().len(), 2);
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn test_updates_build_on_staged_table() {
        let store = store();
        let registry = HandlerRegistry::with_builtins();
        store
            .update(|t| Ok::<_, ()>(t.with_route(Route::compile(&route("b"), &registry).unwrap())))
            .unwrap();
        store
            .update(|t| Ok::<_, ()>(t.with_route(Route::compile(&route("c"), &registry).unwrap())))
            .unwrap();

        let names: Vec<String> = store
            .begin_request()
            .routes()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_failed_update_leaves_table_unchanged() {
        let store = store();
        let result = store.update(|_| Err::<RouteTable, _>("rejected"));
        assert_eq!(result.unwrap_err(), "rejected");
        assert_eq!(store.begin_request().routes().len(), 1);
        assert_eq!(store.version(), 1);
    }
}
