//! In-memory port fakes shared by unit tests.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::context::ServiceContext;
use crate::ports::filesystem::PortError;
use crate::ports::{
    AvailabilityFuture, Clock, FileSystem, GitRepo, IssueTracker, ShellExecutor, ShellOutput,
    TrackerError, TrackerFuture,
};

/// In-memory filesystem with switchable failures.
#[derive(Default)]
pub struct MemFs {
    files: Mutex<BTreeMap<PathBuf, String>>,
    dirs: Mutex<Vec<PathBuf>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_renames: AtomicBool,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: &str) {
        self.files.lock().unwrap().insert(path.into(), contents.to_string());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    pub fn created_dirs(&self) -> Vec<PathBuf> {
        self.dirs.lock().unwrap().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_renames(&self, fail: bool) {
        self.fail_renames.store(fail, Ordering::SeqCst);
    }
}

impl FileSystem for MemFs {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err("injected read failure".into());
        }
        self.contents(path).ok_or_else(|| format!("File not found: {}", path.display()).into())
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err("injected write failure".into());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert(path, contents);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), PortError> {
        self.dirs.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), PortError> {
        if self.fail_renames.load(Ordering::SeqCst) {
            return Err("injected rename failure".into());
        }
        let mut files = self.files.lock().unwrap();
        let contents =
            files.remove(from).ok_or_else(|| format!("File not found: {}", from.display()))?;
        files.insert(to.to_path_buf(), contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<(), PortError> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}

/// Clock pinned to a settable instant.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(secs: i64) -> Self {
        Self { now: Mutex::new(Utc.timestamp_opt(secs, 0).unwrap()) }
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock().unwrap() += Duration::seconds(secs);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Git repository with fixed answers, or failing when `author` is `None`.
pub struct FakeGit {
    pub author: Option<String>,
}

impl GitRepo for FakeGit {
    fn current_commit(&self) -> Result<String, PortError> {
        self.author.as_ref().map(|_| "c0ffee".to_string()).ok_or_else(|| "no repo".into())
    }

    fn last_commit_author(&self) -> Result<String, PortError> {
        self.author.clone().ok_or_else(|| "no repo".into())
    }

    fn last_commit_subject(&self) -> Result<String, PortError> {
        self.author.as_ref().map(|_| "Fix flaky test".to_string()).ok_or_else(|| "no repo".into())
    }
}

/// Shell that replays scripted outputs and records invocations.
#[derive(Default)]
pub struct FakeShell {
    outputs: Mutex<VecDeque<ShellOutput>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeShell {
    pub fn with_outputs(outputs: Vec<ShellOutput>) -> Self {
        Self { outputs: Mutex::new(outputs.into()), calls: Mutex::default() }
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ShellExecutor for FakeShell {
    fn run(&self, program: &str, args: &[String]) -> Result<ShellOutput, PortError> {
        self.calls.lock().unwrap().push((program.to_string(), args.to_vec()));
        self.outputs.lock().unwrap().pop_front().ok_or_else(|| "no scripted output".into())
    }
}

/// Shell whose every run blocks for a while and succeeds with a new issue URL.
///
/// Tracks how many runs were in flight at once.
pub struct SlowShell {
    delay: StdDuration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl SlowShell {
    pub fn new(delay: StdDuration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ShellExecutor for SlowShell {
    fn run(&self, _program: &str, _args: &[String]) -> Result<ShellOutput, PortError> {
        let number = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(ShellOutput {
            exit_code: 0,
            stdout: format!("https://github.com/acme/app/issues/{number}\n"),
            stderr: String::new(),
        })
    }
}

impl ShellExecutor for Arc<SlowShell> {
    fn run(&self, program: &str, args: &[String]) -> Result<ShellOutput, PortError> {
        self.as_ref().run(program, args)
    }
}

/// One call observed by [`FakeTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCall {
    Available,
    Create { title: String, labels: Vec<String> },
    Close { number: u64, comment: Option<String> },
    Reopen { number: u64, comment: Option<String> },
}

/// Tracker that hands out sequential issue numbers and records calls.
pub struct FakeTracker {
    available: bool,
    next_number: AtomicUsize,
    failing_titles: Mutex<HashSet<String>>,
    fail_all: AtomicBool,
    calls: Mutex<Vec<TrackerCall>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self {
            available: true,
            next_number: AtomicUsize::new(100),
            failing_titles: Mutex::default(),
            fail_all: AtomicBool::new(false),
            calls: Mutex::default(),
        }
    }

    pub fn unavailable() -> Self {
        Self { available: false, ..Self::new() }
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    pub fn fail_title_containing(&self, needle: &str) {
        self.failing_titles.lock().unwrap().insert(needle.to_string());
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutation_calls(&self) -> Vec<TrackerCall> {
        self.calls().into_iter().filter(|c| *c != TrackerCall::Available).collect()
    }

    fn check_failure(&self, text: &str) -> Result<(), TrackerError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(TrackerError::Unavailable("injected failure".into()));
        }
        if self.failing_titles.lock().unwrap().iter().any(|n| text.contains(n.as_str())) {
            return Err(TrackerError::Api { status: 500, message: "injected failure".into() });
        }
        Ok(())
    }
}

impl IssueTracker for FakeTracker {
    fn is_available(&self) -> AvailabilityFuture<'_> {
        self.calls.lock().unwrap().push(TrackerCall::Available);
        let available = self.available;
        Box::pin(async move { available })
    }

    fn create_issue<'a>(
        &'a self,
        title: &'a str,
        _body: &'a str,
        labels: &'a [String],
    ) -> TrackerFuture<'a> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(TrackerCall::Create { title: title.to_string(), labels: labels.to_vec() });
            self.check_failure(title)?;
            Ok(self.next_number.fetch_add(1, Ordering::SeqCst) as u64)
        })
    }

    fn close_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(TrackerCall::Close { number, comment: comment.map(String::from) });
            self.check_failure(comment.unwrap_or_default())?;
            Ok(number)
        })
    }

    fn reopen_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(TrackerCall::Reopen { number, comment: comment.map(String::from) });
            self.check_failure(comment.unwrap_or_default())?;
            Ok(number)
        })
    }
}

impl IssueTracker for Arc<FakeTracker> {
    fn is_available(&self) -> AvailabilityFuture<'_> {
        self.as_ref().is_available()
    }

    fn create_issue<'a>(
        &'a self,
        title: &'a str,
        body: &'a str,
        labels: &'a [String],
    ) -> TrackerFuture<'a> {
        self.as_ref().create_issue(title, body, labels)
    }

    fn close_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a> {
        self.as_ref().close_issue(number, comment)
    }

    fn reopen_issue<'a>(&'a self, number: u64, comment: Option<&'a str>) -> TrackerFuture<'a> {
        self.as_ref().reopen_issue(number, comment)
    }
}

impl Clock for Arc<FixedClock> {
    fn now(&self) -> DateTime<Utc> {
        self.as_ref().now()
    }
}

impl FileSystem for Arc<MemFs> {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        self.as_ref().read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        self.as_ref().write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        self.as_ref().exists(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), PortError> {
        self.as_ref().create_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), PortError> {
        self.as_ref().rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> Result<(), PortError> {
        self.as_ref().remove_file(path)
    }
}

/// Shared handles to the fakes behind a [`ServiceContext`].
pub struct Fakes {
    pub fs: Arc<MemFs>,
    pub clock: Arc<FixedClock>,
    pub tracker: Arc<FakeTracker>,
}

impl Fakes {
    pub fn new() -> Self {
        Self::with_tracker(FakeTracker::new())
    }

    pub fn with_tracker(tracker: FakeTracker) -> Self {
        Self {
            fs: Arc::new(MemFs::new()),
            clock: Arc::new(FixedClock::at(1_700_000_000)),
            tracker: Arc::new(tracker),
        }
    }

    /// Builds a context wired to these fakes, with a git repo that knows its author.
    pub fn context(&self) -> ServiceContext {
        ServiceContext {
            clock: Box::new(Arc::clone(&self.clock)),
            fs: Box::new(Arc::clone(&self.fs)),
            git: Box::new(FakeGit { author: Some("Grace Hopper".into()) }),
            issues: Box::new(Arc::clone(&self.tracker)),
        }
    }
}
