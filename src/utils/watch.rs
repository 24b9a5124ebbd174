use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::{
    path::Path,
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    time::Duration,
};

const DEBOUNCE: Duration = Duration::from_millis(50);

/// Calls `on_change` whenever `path` is created, modified or removed.
///
/// The parent directory is watched instead of the file itself, so editors and sync tools that
/// replace the file by renaming over it are still picked up. A burst of events produces one
/// call, made once [`DEBOUNCE`] has passed without a new event.
#[rustfmt::skip]
pub fn watch_file(path: &Path, on_change: impl Fn() + Send + 'static) -> notify::Result<RecommendedWatcher> {
    let file_name = path.file_name().map(ToOwned::to_owned);
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else { return };
        let touches_file = event.paths.iter().any(|p| p.file_name() == file_name.as_deref());
        if touches_file && should_process_event(&event) { tx.send(()).ok(); }
    })?;

    watcher.watch(&parent, RecursiveMode::NonRecursive)?;

    // exits once the watcher, and with it the sender, is dropped
    std::thread::spawn(move || debounce(&rx, DEBOUNCE, on_change));
    Ok(watcher)
}

/// Trailing-edge debounce: one `on_change` per burst, after `quiet` without a new signal.
/// A burst cut short by the sender going away is dropped.
fn debounce(rx: &Receiver<()>, quiet: Duration, on_change: impl Fn()) {
    while rx.recv().is_ok() {
        loop {
            match rx.recv_timeout(quiet) {
                Ok(()) => continue,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        on_change();
    }
}

fn should_process_event(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_))
}
