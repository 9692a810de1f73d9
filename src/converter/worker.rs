//! Background conversion worker.
//!
//! One worker runs one PyInstaller invocation on its own thread and reports
//! back over a channel. Workers are not reused: every conversion builds a
//! fresh one from a [`ConversionRequest`] snapshot.

use std::io::{self, BufRead, BufReader};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::formats::executable_extension;
use super::packager::{locate_artifact, workpath_collides, Artifact, Packager, PackagerError};
use super::progress::{self, ProgressTracker, Trigger, PYINSTALLER_TRIGGERS};
use super::request::{ConversionOutcome, ConversionRequest};

/// Lifecycle of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    /// Created, not started
    #[default]
    Idle,
    /// Building the command line and spawning the process
    Launching,
    /// Reading process output
    StreamingOutput,
    /// Artifact verified
    Succeeded,
    /// Any failure
    Failed,
}

impl WorkerState {
    /// Check if the worker has reported its outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Succeeded | WorkerState::Failed)
    }

    /// Get a display string for the state.
    pub fn display(&self) -> &'static str {
        match self {
            WorkerState::Idle => "Idle",
            WorkerState::Launching => "Launching",
            WorkerState::StreamingOutput => "Converting",
            WorkerState::Succeeded => "Done",
            WorkerState::Failed => "Failed",
        }
    }
}

/// Events from the worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// A line for the log view
    LogLine(String),
    /// Progress moved forward (0-100)
    Progress(u8),
    /// Worker moved to a new state
    State(WorkerState),
    /// Terminal outcome, always the last event
    Finished(ConversionOutcome),
}

/// Runs one conversion.
pub struct ConversionWorker {
    request: ConversionRequest,
    packager: Packager,
    triggers: &'static [Trigger],
    state: WorkerState,
    progress: ProgressTracker,
    events: Sender<WorkerEvent>,
}

impl ConversionWorker {
    pub fn new(request: ConversionRequest, packager: Packager, events: Sender<WorkerEvent>) -> Self {
        Self {
            request,
            packager,
            triggers: PYINSTALLER_TRIGGERS,
            state: WorkerState::Idle,
            progress: ProgressTracker::new(),
            events,
        }
    }

    /// Replace the output trigger table.
    pub fn with_triggers(mut self, triggers: &'static [Trigger]) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Start the worker on a background thread.
    pub fn spawn(request: ConversionRequest, packager: Packager) -> WorkerHandle {
        let (event_tx, event_rx) = unbounded::<WorkerEvent>();
        let worker = Self::new(request, packager, event_tx);

        let handle = thread::Builder::new()
            .name("conversion-worker".to_string())
            .spawn(move || {
                worker.run();
            });

        match handle {
            Ok(handle) => WorkerHandle {
                events: event_rx,
                handle: Some(handle),
                finished: false,
            },
            Err(e) => {
                log::error!("Failed to start conversion thread: {}", e);
                let (tx, rx) = unbounded();
                let outcome = ConversionOutcome::failure(format!("Error during conversion: {}", e));
                let _ = tx.send(WorkerEvent::Finished(outcome));
                WorkerHandle {
                    events: rx,
                    handle: None,
                    finished: false,
                }
            }
        }
    }

    /// Run the conversion to completion on the current thread.
    ///
    /// Emits events as it goes and always ends with exactly one
    /// [`WorkerEvent::Finished`].
    pub fn run(mut self) -> ConversionOutcome {
        let outcome = match self.execute() {
            Ok(artifact) => {
                self.transition(WorkerState::Succeeded);
                self.report_progress(progress::VERIFIED);
                log::info!(
                    "Conversion of {} produced {:?} ({} bytes)",
                    self.request.script_filename(),
                    artifact.path,
                    artifact.size_bytes
                );
                ConversionOutcome::success(artifact.path, artifact.size_bytes)
            }
            Err(e) => {
                self.transition(WorkerState::Failed);
                log::error!("Conversion of {} failed: {}", self.request.script_filename(), e);
                // ConversionFailed already logged the captured stderr
                if !matches!(e, PackagerError::ConversionFailed(_)) {
                    self.log(format!("Error: {}", e));
                }
                ConversionOutcome::failure(e.to_string())
            }
        };

        let _ = self.events.send(WorkerEvent::Finished(outcome.clone()));
        outcome
    }

    fn execute(&mut self) -> Result<Artifact, PackagerError> {
        self.transition(WorkerState::Launching);
        self.log("Starting conversion process...".to_string());
        self.report_progress(progress::LAUNCHED);

        let command = self.packager.command_for(&self.request);
        log::info!("Running {}", command);
        self.log(format!("Running command: {}", command));
        self.report_progress(progress::DISPATCHED);

        if workpath_collides(&self.request, executable_extension()) {
            log::warn!(
                "{} builds into PyInstaller's work directory",
                self.request.script_filename()
            );
            self.log(format!(
                "Warning: the executable for {} shares its path with the build directory; \
                 rename the script if PyInstaller fails",
                self.request.script_filename()
            ));
        }

        let mut process = self.packager.spawn(&command)?;
        self.transition(WorkerState::StreamingOutput);

        if let Some(stdout) = process.take_stdout() {
            if let Err(e) = self.stream_output(BufReader::new(stdout)) {
                // Don't report an outcome while PyInstaller may still be writing
                if let Err(reap) = process.abort() {
                    log::warn!("Failed to stop PyInstaller after read error: {}", reap);
                }
                return Err(PackagerError::Io(e));
            }
        }

        let exit = process.wait()?;
        log::debug!("PyInstaller exited with {}", exit.status);

        if !exit.status.success() {
            let error = if exit.stderr.trim().is_empty() {
                format!("PyInstaller exited with {}", exit.status)
            } else {
                exit.stderr
            };
            self.log(format!("Error: {}", error));
            return Err(PackagerError::ConversionFailed(error));
        }

        locate_artifact(&self.request)
    }

    /// Forward each output line and map it to a checkpoint.
    fn stream_output<R: BufRead>(&mut self, mut reader: R) -> io::Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(());
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']).to_string();

            let checkpoint = progress::match_trigger(self.triggers, &line);
            self.log(line);
            if let Some(percent) = checkpoint {
                self.report_progress(percent);
            }
        }
    }

    fn transition(&mut self, next: WorkerState) {
        log::debug!("Worker {} -> {}", self.state.display(), next.display());
        self.state = next;
        let _ = self.events.send(WorkerEvent::State(next));
    }

    fn log(&self, line: String) {
        let _ = self.events.send(WorkerEvent::LogLine(line));
    }

    fn report_progress(&mut self, percent: u8) {
        if let Some(percent) = self.progress.advance(percent) {
            let _ = self.events.send(WorkerEvent::Progress(percent));
        }
    }
}

/// Caller's side of a running worker.
pub struct WorkerHandle {
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
    finished: bool,
}

impl WorkerHandle {
    /// Poll for worker events (non-blocking).
    pub fn poll_events(&mut self) -> Vec<WorkerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            self.observe(&event);
            events.push(event);
        }
        events
    }

    /// Block until the next event. `None` once the outcome has been delivered.
    pub fn recv(&mut self) -> Option<WorkerEvent> {
        if self.finished {
            return None;
        }
        let event = self.events.recv().ok()?;
        self.observe(&event);
        Some(event)
    }

    /// The outcome has been received.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn observe(&mut self, event: &WorkerEvent) {
        if matches!(event, WorkerEvent::Finished(_)) {
            self.finished = true;
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::converter::formats::{executable_extension, PackagingMode};
    use crate::converter::packager::expected_artifact_path;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable shell script standing in for PyInstaller.
    fn fake_packager(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-pyinstaller");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Shell snippet that pulls the --distpath value into $dist.
    const PARSE_DIST: &str = r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --distpath) dist="$2"; shift ;;
  esac
  shift
done
"#;

    fn request_in(dir: &Path, mode: PackagingMode) -> ConversionRequest {
        let script = dir.join("build.py");
        fs::write(&script, "print('hello')\n").unwrap();
        let out = dir.join("out");
        fs::create_dir_all(&out).unwrap();
        ConversionRequest::new(script, out, mode, true)
    }

    fn run_collecting(request: ConversionRequest, tool: PathBuf) -> (ConversionOutcome, Vec<WorkerEvent>) {
        let (tx, rx) = unbounded();
        let outcome = ConversionWorker::new(request, Packager::new(tool), tx).run();
        (outcome, rx.try_iter().collect())
    }

    fn percentages(events: &[WorkerEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    fn states(events: &[WorkerEvent]) -> Vec<WorkerState> {
        events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::State(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    fn log_lines(events: &[WorkerEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::LogLine(l) => Some(l.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_successful_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path(), PackagingMode::SingleFile);
        let body = format!(
            "echo '12 INFO: Analyzing build.py'\n\
             echo '34 INFO: Processing standard module hook'\n\
             echo '56 INFO: Copying bootloader EXE'\n\
             echo '78 INFO: Building EXE from EXE-00.toc'\n\
             {}\n\
             head -c 5242880 /dev/zero > \"$dist/build\"",
            PARSE_DIST
        );
        let tool = fake_packager(dir.path(), &body);

        let (outcome, events) = run_collecting(request.clone(), tool);

        let expected = expected_artifact_path(
            request.script_path(),
            request.output_dir(),
            executable_extension(),
        );
        assert!(outcome.succeeded, "{}", outcome.message);
        assert_eq!(outcome.artifact_path, Some(expected));
        assert_eq!(outcome.artifact_size_bytes, Some(5_242_880));
        assert!(outcome.message.contains("Size: 5.00 MB"));

        assert_eq!(percentages(&events), vec![10, 20, 40, 60, 80, 90, 100]);
        assert_eq!(
            states(&events),
            vec![
                WorkerState::Launching,
                WorkerState::StreamingOutput,
                WorkerState::Succeeded
            ]
        );
        assert_eq!(events.last(), Some(&WorkerEvent::Finished(outcome)));

        let lines = log_lines(&events);
        assert_eq!(lines[0], "Starting conversion process...");
        assert!(lines[1].starts_with("Running command: "));
        assert!(lines[1].contains("--onefile"));
        assert!(lines.contains(&"12 INFO: Analyzing build.py".to_string()));
    }

    #[test]
    fn test_progress_plateaus_without_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path(), PackagingMode::SingleFile);
        let body = format!("echo 'nothing useful'\n{}\nprintf 'x' > \"$dist/build\"", PARSE_DIST);
        let tool = fake_packager(dir.path(), &body);

        let (outcome, events) = run_collecting(request, tool);

        assert!(outcome.succeeded);
        assert_eq!(outcome.artifact_size_bytes, Some(1));
        assert_eq!(percentages(&events), vec![10, 20, 100]);
    }

    #[test]
    fn test_out_of_order_triggers_stay_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path(), PackagingMode::SingleFile);
        let body = "echo Copying\necho Analyzing\necho Building\necho Processing\nexit 3";
        let tool = fake_packager(dir.path(), body);

        let (outcome, events) = run_collecting(request, tool);

        assert!(!outcome.succeeded);
        let seen = percentages(&events);
        assert_eq!(seen, vec![10, 20, 80, 90]);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_non_zero_exit_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path(), PackagingMode::SingleFile);
        let tool = fake_packager(
            dir.path(),
            "echo 'INFO: Analyzing build.py'\necho 'ModuleNotFoundError: No module named foo' >&2\nexit 1",
        );

        let (outcome, events) = run_collecting(request, tool);

        assert!(!outcome.succeeded);
        assert!(outcome.message.contains("No module named foo"));
        assert!(outcome.artifact_path.is_none());
        assert!(percentages(&events).iter().all(|p| *p < 100));
        assert_eq!(
            states(&events),
            vec![
                WorkerState::Launching,
                WorkerState::StreamingOutput,
                WorkerState::Failed
            ]
        );
        assert!(log_lines(&events)
            .iter()
            .any(|l| l.starts_with("Error: ") && l.contains("No module named foo")));
    }

    #[test]
    fn test_clean_exit_without_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path(), PackagingMode::SingleFile);
        let tool = fake_packager(dir.path(), "echo 'INFO: Building EXE'\nexit 0");

        let (outcome, events) = run_collecting(request, tool);

        assert!(!outcome.succeeded);
        assert!(outcome.message.contains("artifact not found"));
        assert_eq!(percentages(&events).last(), Some(&90));
        assert_eq!(
            states(&events),
            vec![
                WorkerState::Launching,
                WorkerState::StreamingOutput,
                WorkerState::Failed
            ]
        );
    }

    #[test]
    fn test_onedir_artifact_inside_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path(), PackagingMode::SingleDirectory);
        let body = format!(
            "{}\nmkdir -p \"$dist/build\"\nprintf 'abc' > \"$dist/build/build\"",
            PARSE_DIST
        );
        let tool = fake_packager(dir.path(), &body);

        let (outcome, _) = run_collecting(request.clone(), tool);

        assert!(outcome.succeeded, "{}", outcome.message);
        assert_eq!(
            outcome.artifact_path,
            Some(request.output_dir().join("build").join("build"))
        );
        assert_eq!(outcome.artifact_size_bytes, Some(3));
    }

    #[test]
    fn test_spawn_failure_is_an_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path(), PackagingMode::SingleFile);

        let (outcome, events) = run_collecting(request, dir.path().join("does-not-exist"));

        assert!(!outcome.succeeded);
        assert!(outcome.message.contains("Failed to spawn"));
        assert_eq!(percentages(&events), vec![10, 20]);
        assert_eq!(states(&events), vec![WorkerState::Launching, WorkerState::Failed]);
        assert!(matches!(events.last(), Some(WorkerEvent::Finished(_))));
    }

    #[test]
    fn test_spawned_worker_delivers_outcome_once() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path(), PackagingMode::SingleFile);
        let body = format!("echo Analyzing\n{}\nprintf 'ok' > \"$dist/build\"", PARSE_DIST);
        let tool = fake_packager(dir.path(), &body);

        let mut handle = ConversionWorker::spawn(request, Packager::new(tool));
        let mut events = Vec::new();
        while let Some(event) = handle.recv() {
            events.push(event);
        }

        assert!(handle.is_finished());
        let finished: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, WorkerEvent::Finished(_)))
            .collect();
        assert_eq!(finished.len(), 1);
        assert!(matches!(finished[0], WorkerEvent::Finished(o) if o.succeeded));
        assert!(handle.poll_events().is_empty());
    }

    #[test]
    fn test_custom_trigger_table() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path(), PackagingMode::SingleFile);
        let body = format!(
            "echo 'Analyzing build.py'\necho 'Compiling bytecode'\n{}\nprintf 'x' > \"$dist/build\"",
            PARSE_DIST
        );
        let tool = fake_packager(dir.path(), &body);

        let (tx, rx) = unbounded();
        let outcome = ConversionWorker::new(request, Packager::new(tool), tx)
            .with_triggers(&[("Compiling", 50)])
            .run();
        let events: Vec<_> = rx.try_iter().collect();

        assert!(outcome.succeeded, "{}", outcome.message);
        assert_eq!(percentages(&events), vec![10, 20, 50, 100]);
    }

    #[test]
    fn test_build_script_warns_about_workpath() {
        let dir = tempfile::tempdir().unwrap();
        let request = request_in(dir.path(), PackagingMode::SingleDirectory);
        let tool = fake_packager(dir.path(), "exit 1");

        let (_, events) = run_collecting(request, tool);

        assert!(log_lines(&events)
            .iter()
            .any(|l| l.starts_with("Warning: ") && l.contains("build directory")));
    }

    /// Reader that yields one line and then fails.
    struct BrokenPipe {
        served: bool,
    }

    impl std::io::Read for BrokenPipe {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.served {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"));
            }
            self.served = true;
            let line = b"INFO: Analyzing build.py\n";
            buf[..line.len()].copy_from_slice(line);
            Ok(line.len())
        }
    }

    #[test]
    fn test_read_error_stops_streaming() {
        let (tx, rx) = unbounded();
        let mut worker = ConversionWorker::new(
            ConversionRequest::new("build.py", "/tmp", PackagingMode::SingleFile, true),
            Packager::new("/nonexistent"),
            tx,
        );

        let err = worker
            .stream_output(BufReader::new(BrokenPipe { served: false }))
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(log_lines(&events), vec!["INFO: Analyzing build.py".to_string()]);
        assert_eq!(percentages(&events), vec![40]);
    }

    #[test]
    fn test_worker_state_transitions() {
        assert!(!WorkerState::Idle.is_terminal());
        assert!(!WorkerState::StreamingOutput.is_terminal());
        assert!(WorkerState::Succeeded.is_terminal());
        assert!(WorkerState::Failed.is_terminal());

        let (tx, _rx) = unbounded();
        let worker = ConversionWorker::new(
            ConversionRequest::new("a.py", "/tmp", PackagingMode::SingleFile, true),
            Packager::new("/nonexistent"),
            tx,
        );
        assert_eq!(worker.state(), WorkerState::Idle);
    }
}
