//! Live collection snapshots.
//!
//! A [`Directory`] owns the last fetched snapshot of one collection and replaces it
//! wholesale on every fetch. Change notifications from the [`DataSource`] carry no
//! payload; they only prompt a full refetch.

use crate::{
    catalog::CatalogItem,
    log,
    utils::{slug::SlugPolicy, watch::watch_file},
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::{
    cmp::Ordering,
    fs,
    ops::Deref,
    path::PathBuf,
    sync::{
        Arc, Weak,
        atomic::{self, AtomicU64},
    },
};
use thiserror::Error;

/// One raw record as the data store hands it out.
pub type Row = serde_json::Map<String, Value>;

pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error when reading `{0}`")]
    Io(
        PathBuf,
        #[source] std::io::Error,
    ),

    #[error("`{0}` is not a JSON array of records")]
    Malformed(
        PathBuf,
        #[source] serde_json::Error,
    ),

    #[error("record decoding error")]
    Decode(#[source] serde_json::Error),

    #[error("failed to watch `{0}` for changes")]
    Watch(
        PathBuf,
        #[source] notify::Error,
    ),

    #[error("unknown table `{0}`")]
    UnknownTable(String),
}

/// "All records of `table`, ordered by `order_by` descending."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub table: String,
    pub order_by: String,
}

impl Query {
    pub fn new(table: impl Into<String>, order_by: impl Into<String>) -> Self {
        Self { table: table.into(), order_by: order_by.into() }
    }
}

/// Detaches from change notifications when dropped.
pub struct Subscription(Option<Box<dyn FnOnce() + Send>>);

impl Subscription {
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(detach)))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(detach) = self.0.take() {
            detach();
        }
    }
}

pub trait DataSource: Send + Sync {
    fn fetch(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    fn subscribe(&self, table: &str, on_change: ChangeCallback) -> Result<Subscription, StoreError>;
}

/// Sorts rows descending by `field`. Rows without the field go last.
pub fn sort_rows_desc(rows: &mut [Row], field: &str) {
    fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (Some(Value::Number(a)), Some(Value::Number(b))) => {
                let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
                b.partial_cmp(&a).unwrap_or(Ordering::Equal)
            }
            (Some(Value::String(a)), Some(Value::String(b))) => b.cmp(a),
            (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
            (Some(Value::Null) | None, _) => Ordering::Greater,
            (_, Some(Value::Null) | None) => Ordering::Less,
            _ => Ordering::Equal,
        }
    }

    rows.sort_by(|a, b| compare(a.get(field), b.get(field)));
}

/// Reads `<data_dir>/<table>.json`, an array of objects, and watches it for changes.
pub struct JsonSource {
    data_dir: PathBuf,
}

impl JsonSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{table}.json"))
    }
}

impl DataSource for JsonSource {
    fn fetch(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let path = self.table_path(&query.table);
        let content = fs::read_to_string(&path).map_err(|err| StoreError::Io(path.clone(), err))?;
        let mut rows: Vec<Row> =
            serde_json::from_str(&content).map_err(|err| StoreError::Malformed(path, err))?;

        sort_rows_desc(&mut rows, &query.order_by);
        Ok(rows)
    }

    fn subscribe(&self, table: &str, on_change: ChangeCallback) -> Result<Subscription, StoreError> {
        let path = self.table_path(table);
        let watcher = watch_file(&path, move || on_change())
            .map_err(|err| StoreError::Watch(path.clone(), err))?;

        log!("watch"; "watching {} for changes", path.display());
        Ok(Subscription::new(move || drop(watcher)))
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub items: Arc<Vec<T>>,

    // a fetch is in flight
    pub loading: bool,

    // at least one fetch has succeeded since the last teardown
    pub loaded: bool,

    // message of the last failed fetch, cleared by the next successful one
    pub error: Option<String>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self { items: Arc::new(Vec::new()), loading: false, loaded: false, error: None }
    }
}

impl<T: CatalogItem + Clone> Snapshot<T> {
    /// Resolves against this snapshot only. Building the slug back from the same `items`
    /// gives the rank the record was found under.
    pub fn resolve(&self, slug: &str, policy: SlugPolicy) -> Lookup<T> {
        if !self.loaded {
            return Lookup::NotLoaded;
        }

        match policy.resolve(slug, &self.items) {
            Some(item) => Lookup::Found(item.clone()),
            None => Lookup::NotFound,
        }
    }
}

/// Outcome of resolving a slug against a directory.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// The initial fetch has not completed, nothing can be said yet.
    NotLoaded,
    NotFound,
    Found(T),
}

type Decoder<T> = Box<dyn Fn(Row) -> Result<T, StoreError> + Send + Sync>;

#[derive(Default)]
struct Live {
    subscribers: usize,
    subscription: Option<Subscription>,
}

pub struct Directory<T> {
    source: Arc<dyn DataSource>,
    query: Query,
    decode: Decoder<T>,
    state: RwLock<Snapshot<T>>,
    live: Mutex<Live>,

    // held for a whole fetch, results are installed in the order fetches started
    fetching: Mutex<()>,

    // bumped on teardown so fetches that started before it are discarded
    generation: AtomicU64,
}

impl<T> Directory<T>
where
    T: CatalogItem + Clone + Send + Sync + 'static,
{
    pub fn new(
        source: Arc<dyn DataSource>,
        query: Query,
        decode: impl Fn(Row) -> Result<T, StoreError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            source,
            query,
            decode: Box::new(decode),
            state: RwLock::new(Snapshot::default()),
            live: Mutex::new(Live::default()),
            fetching: Mutex::new(()),
            generation: AtomicU64::new(0),
        })
    }

    pub fn table(&self) -> &str {
        &self.query.table
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.state.read().clone()
    }

    pub fn items(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.state.read().items)
    }

    /// Fetches the whole collection and swaps it in.
    ///
    /// On failure the previous items stay in place and the error message is recorded.
    /// Concurrent calls run one after another.
    pub fn refetch(&self) -> Result<(), StoreError> {
        let _fetching = self.fetching.lock();
        let generation = self.generation.load(atomic::Ordering::Acquire);
        self.state.write().loading = true;

        let fetched = self
            .source
            .fetch(&self.query)
            .and_then(|rows| rows.into_iter().map(&self.decode).collect::<Result<Vec<_>, _>>());

        let mut state = self.state.write();
        if generation != self.generation.load(atomic::Ordering::Acquire) {
            return Ok(());
        }
        state.loading = false;

        match fetched {
            Ok(items) => {
                log!("fetch"; "{} records from `{}`", items.len(), self.query.table);
                state.items = Arc::new(items);
                state.loaded = true;
                state.error = None;
                Ok(())
            }
            Err(err) => {
                state.error = Some(format!("failed to fetch `{}`: {err}", self.query.table));
                Err(err)
            }
        }
    }

    /// Registers a subscriber. The first one performs the initial fetch and, with `watch`,
    /// attaches to the source's change notifications.
    ///
    /// A failed initial fetch is not an error here, it shows up in [`Snapshot::error`].
    pub fn subscribe(self: &Arc<Self>, watch: bool) -> Result<DirectoryHandle<T>, StoreError> {
        let mut live = self.live.lock();

        if live.subscribers == 0 {
            if watch {
                let directory = Arc::downgrade(self);
                let on_change: ChangeCallback = Arc::new(move || refetch_weak(&directory));
                live.subscription = Some(self.source.subscribe(&self.query.table, on_change)?);
            }

            if let Err(err) = self.refetch() {
                log!("store"; "initial fetch of `{}` failed: {err}", self.query.table);
            }
        }

        live.subscribers += 1;
        Ok(DirectoryHandle { directory: Arc::clone(self) })
    }

    fn release(&self) {
        let mut live = self.live.lock();
        live.subscribers = live.subscribers.saturating_sub(1);

        if live.subscribers == 0 {
            live.subscription = None;
            self.generation.fetch_add(1, atomic::Ordering::AcqRel);
            *self.state.write() = Snapshot::default();
            log!("store"; "released `{}`", self.query.table);
        }
    }

    /// Resolves once against the current snapshot and hands out an owned record, so later
    /// refetches that shift duplicate ranks do not change what the caller holds.
    pub fn resolve(&self, slug: &str, policy: SlugPolicy) -> Lookup<T> {
        self.state.read().resolve(slug, policy)
    }
}

fn refetch_weak<T>(directory: &Weak<Directory<T>>)
where
    T: CatalogItem + Clone + Send + Sync + 'static,
{
    let Some(directory) = directory.upgrade() else { return };

    log!("watch"; "`{}` changed, refetching", directory.table());
    if let Err(err) = directory.refetch() {
        log!("error"; "{err}");
    }
}

/// Keeps a [`Directory`] live while held.
pub struct DirectoryHandle<T>
where
    T: CatalogItem + Clone + Send + Sync + 'static,
{
    directory: Arc<Directory<T>>,
}

impl<T> Deref for DirectoryHandle<T>
where
    T: CatalogItem + Clone + Send + Sync + 'static,
{
    type Target = Directory<T>;

    fn deref(&self) -> &Self::Target {
        &self.directory
    }
}

impl<T> Drop for DirectoryHandle<T>
where
    T: CatalogItem + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.directory.release();
    }
}


#[cfg(test)]
mod tests {
    use super::fixture::MemorySource;
    use super::*;
    use crate::catalog::Tool;
    use serde_json::json;
    use std::{
        sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
        thread,
        time::{Duration, Instant},
    };

    const TABLE: &str = "ainsider_store_directory";

    fn tools_directory(source: Arc<MemorySource>) -> Arc<Directory<Tool>> {
        Directory::new(source, Query::new(TABLE, "created"), Tool::from_row)
    }

    fn foo_tools() -> Vec<Value> {
        vec![
            json!({ "id": 1, "name": "Foo", "created": "2024-01-01T00:00:00Z" }),
            json!({ "id": 5, "name": "Foo", "created": "2024-03-01T00:00:00Z" }),
            json!({ "id": 9, "name": "Foo", "created": "2024-02-01T00:00:00Z" }),
        ]
    }

    #[test]
    fn sort_rows_descending_with_missing_last() {
        let mut rows: Vec<Row> = [json!({ "id": 1 }), json!({ "id": 3, "date": "2024-01-02" }), json!({ "id": 2, "date": "2024-05-01" }), json!({ "id": 4, "date": null })]
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect();
        sort_rows_desc(&mut rows, "date");
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 1, 4]);

        sort_rows_desc(&mut rows, "id");
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn resolve_before_load_is_not_loaded() {
        let directory = tools_directory(MemorySource::with_table(TABLE, foo_tools()));

        assert_eq!(directory.resolve("foo", SlugPolicy::NameRank), Lookup::NotLoaded);
        directory.refetch().unwrap();
        assert!(matches!(directory.resolve("foo", SlugPolicy::NameRank), Lookup::Found(tool) if tool.id == 1));
        assert_eq!(directory.resolve("bar", SlugPolicy::NameRank), Lookup::NotFound);
    }

    #[test]
    fn refetch_orders_and_clears_loading() {
        let directory = tools_directory(MemorySource::with_table(TABLE, foo_tools()));
        directory.refetch().unwrap();

        let snapshot = directory.snapshot();
        assert!(snapshot.loaded);
        assert!(!snapshot.loading);
        assert_eq!(snapshot.error, None);
        let ids: Vec<_> = snapshot.items.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![5, 9, 1]);
    }

    #[test]
    fn failed_refetch_keeps_previous_snapshot() {
        let source = MemorySource::with_table(TABLE, foo_tools());
        let directory = tools_directory(Arc::clone(&source));
        directory.refetch().unwrap();

        source.fail_with(Some("store unreachable"));
        assert!(directory.refetch().is_err());

        let snapshot = directory.snapshot();
        assert_eq!(snapshot.items.len(), 3);
        assert!(snapshot.loaded);
        assert!(snapshot.error.as_deref().is_some_and(|e| e.contains("store unreachable")));

        source.fail_with(None);
        directory.refetch().unwrap();
        assert_eq!(directory.snapshot().error, None);
    }

    #[test]
    fn undecodable_row_fails_the_whole_fetch() {
        let source = MemorySource::with_table(TABLE, vec![json!({ "id": 1, "name": "Ok" }), json!({ "name": "no id" })]);
        let directory = tools_directory(source);

        assert!(matches!(directory.refetch(), Err(StoreError::Decode(_))));
        assert!(!directory.snapshot().loaded);
    }

    #[test]
    fn change_signal_triggers_full_refetch() {
        let source = MemorySource::with_table(TABLE, foo_tools());
        let directory = tools_directory(Arc::clone(&source));
        let handle = directory.subscribe(true).unwrap();

        assert_eq!(source.listener_count(TABLE), 1);
        assert_eq!(handle.resolve("foo-2", SlugPolicy::NameRank), Lookup::Found(handle.items()[0].clone()));

        let mut rows = foo_tools();
        rows.push(json!({ "id": 0, "name": "Foo", "created": "2023-01-01T00:00:00Z" }));
        source.set_table(TABLE, rows);
        source.emit_change(TABLE);

        assert_eq!(handle.items().len(), 4);
        assert!(matches!(handle.resolve("foo-2", SlugPolicy::NameRank), Lookup::Found(tool) if tool.id == 1));
    }

    #[test]
    fn lifecycle_follows_subscribers() {
        let source = MemorySource::with_table(TABLE, foo_tools());
        let directory = tools_directory(Arc::clone(&source));

        let first = directory.subscribe(true).unwrap();
        let second = directory.subscribe(true).unwrap();
        assert_eq!(source.fetch_calls.load(AtomicOrdering::Relaxed), 1);
        assert_eq!(source.listener_count(TABLE), 1);

        drop(first);
        assert!(directory.snapshot().loaded);
        assert_eq!(source.listener_count(TABLE), 1);

        drop(second);
        assert_eq!(source.listener_count(TABLE), 0);
        assert!(!directory.snapshot().loaded);
        assert!(directory.items().is_empty());

        let _third = directory.subscribe(false).unwrap();
        assert_eq!(source.fetch_calls.load(AtomicOrdering::Relaxed), 2);
        assert_eq!(source.listener_count(TABLE), 0);
        assert!(directory.snapshot().loaded);
    }

    #[test]
    fn failed_initial_fetch_is_reported_on_the_snapshot() {
        let source = MemorySource::with_table(TABLE, foo_tools());
        source.fail_with(Some("offline"));
        let directory = tools_directory(source);
        let handle = directory.subscribe(false).unwrap();

        let snapshot = handle.snapshot();
        assert!(!snapshot.loaded);
        assert!(snapshot.error.is_some());
        assert_eq!(handle.resolve("foo", SlugPolicy::NameRank), Lookup::NotLoaded);
    }


    #[test]
    fn held_snapshot_keeps_its_ranks_across_refetch() {
        let source = MemorySource::with_table(TABLE, foo_tools());
        let directory = tools_directory(Arc::clone(&source));
        directory.refetch().unwrap();
        let held = directory.snapshot();

        let mut rows = foo_tools();
        rows.push(json!({ "id": 0, "name": "Foo", "created": "2023-01-01T00:00:00Z" }));
        source.set_table(TABLE, rows);
        directory.refetch().unwrap();

        let Lookup::Found(tool) = held.resolve("foo-2", SlugPolicy::NameRank) else { panic!("foo-2 not found") };
        assert_eq!(tool.id, 5);
        assert_eq!(SlugPolicy::NameRank.build(&tool, &held.items), "foo-2");
        assert!(matches!(directory.resolve("foo-2", SlugPolicy::NameRank), Lookup::Found(tool) if tool.id == 1));
    }

    // first fetch is slow, every fetch returns a single record numbered by call order
    #[derive(Default)]
    struct NumberedSource {
        calls: AtomicUsize,
    }

    impl DataSource for NumberedSource {
        fn fetch(&self, _query: &Query) -> Result<Vec<Row>, StoreError> {
            let call = self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            if call == 0 {
                thread::sleep(Duration::from_millis(150));
            }
            let row = json!({ "id": call + 1, "name": "Numbered" });
            Ok(row.as_object().cloned().into_iter().collect())
        }

        fn subscribe(&self, _table: &str, _on_change: ChangeCallback) -> Result<Subscription, StoreError> {
            Ok(Subscription::new(|| {}))
        }
    }

    #[test]
    fn overlapping_refetches_install_the_latest_result() {
        let directory: Arc<Directory<Tool>> =
            Directory::new(Arc::new(NumberedSource::default()), Query::new(TABLE, "created"), Tool::from_row);

        let slow = {
            let directory = Arc::clone(&directory);
            thread::spawn(move || directory.refetch())
        };
        thread::sleep(Duration::from_millis(30));
        directory.refetch().unwrap();
        slow.join().unwrap().unwrap();

        let snapshot = directory.snapshot();
        assert_eq!(snapshot.items.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
        assert!(!snapshot.loading);
    }

    #[test]
    fn json_source_picks_up_the_last_of_a_burst_of_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{TABLE}.json"));
        fs::write(&path, r#"[{"id": 1, "name": "A"}]"#).unwrap();

        let source = Arc::new(JsonSource::new(dir.path()));
        let directory = Directory::new(source, Query::new(TABLE, "created"), Tool::from_row);
        let handle = directory.subscribe(true).unwrap();
        assert_eq!(handle.items()[0].id, 1);

        fs::write(&path, r#"[{"id": 1, "na"#).unwrap();
        thread::sleep(Duration::from_millis(20));
        fs::write(&path, r#"[{"id": 2, "name": "B"}]"#).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snapshot = handle.snapshot();
            let ids: Vec<_> = snapshot.items.iter().map(|t| t.id).collect();
            if ids == vec![2] && snapshot.error.is_none() {
                break;
            }
            assert!(Instant::now() < deadline, "stale snapshot: ids={ids:?} error={:?}", snapshot.error);
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn json_source_reads_and_orders_table() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(format!("{TABLE}.json")),
            r#"[{"id": 1, "name": "Old", "created": "2023-01-01"}, {"id": 2, "name": "New", "created": "2024-01-01"}]"#,
        )
        .unwrap();

        let source = JsonSource::new(dir.path());
        let rows = source.fetch(&Query::new(TABLE, "created")).unwrap();
        assert_eq!(rows[0]["name"], "New");

        assert!(matches!(source.fetch(&Query::new("missing", "id")), Err(StoreError::Io(..))));

        fs::write(dir.path().join("broken.json"), r#"{"id": 1}"#).unwrap();
        assert!(matches!(source.fetch(&Query::new("broken", "id")), Err(StoreError::Malformed(..))));
    }
}
