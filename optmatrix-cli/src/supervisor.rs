//! Process Supervisor
//!
//! Runs one optimizer invocation per job and classifies its outcome.
//!
//! The child gets a single pipe for both stdout and stderr, so the captured
//! stream keeps the interleaving the optimizer produced. It runs in its own
//! process group; on timeout the whole group receives SIGTERM, then SIGKILL
//! once the grace period has passed.

use optmatrix_core::{MarkerGrammar, TestJob, TestResult};
use std::fs::File;
use std::io::Read;
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failures while running a single job
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to create output pipe: {0}")]
    Pipe(#[source] std::io::Error),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for optimizer: {0}")]
    Wait(#[source] std::io::Error),

    #[error("failed to resolve workload path {path}: {source}")]
    WorkloadPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write log {path}: {source}")]
    LogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How the optimizer is invoked
#[derive(Debug, Clone)]
pub struct OptimizerCommand {
    /// Executable
    pub program: String,
    /// Arguments placed before the mode flag
    pub args: Vec<String>,
    /// Pass `-o`
    pub optimize_pass: bool,
    /// Value of `-c`
    pub cores_per_job: u32,
    /// Working directory of the child, if not the current one
    pub working_dir: Option<PathBuf>,
}

impl OptimizerCommand {
    /// Full argument list for `job`:
    /// `<args...> --<mode> [-o] -c <cores> <workload>`
    pub fn arguments(&self, job: &TestJob) -> Result<Vec<String>, SupervisorError> {
        let mut args = self.args.clone();
        args.push(job.mode.flag());
        if self.optimize_pass {
            args.push("-o".to_string());
        }
        args.push("-c".to_string());
        args.push(self.cores_per_job.to_string());
        args.push(self.workload_arg(&job.workload_path)?);
        Ok(args)
    }

    /// The command line prefix without per-job arguments, for reports
    pub fn prefix(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    // A relative path would resolve against the child's working directory.
    fn workload_arg(&self, path: &Path) -> Result<String, SupervisorError> {
        if self.working_dir.is_none() || path.is_absolute() {
            return Ok(path.display().to_string());
        }
        std::path::absolute(path)
            .map(|p| p.display().to_string())
            .map_err(|source| SupervisorError::WorkloadPath {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Time limits applied to every job
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    /// Wall-clock limit per job
    pub time_limit: Duration,
    /// Delay between SIGTERM and SIGKILL
    pub kill_grace: Duration,
    /// How often a running child is checked for exit
    pub poll_interval: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(300),
            kill_grace: Duration::from_millis(500),
            poll_interval: Duration::from_millis(20),
        }
    }
}

/// How a child ended
enum Exit {
    Completed(ExitStatus),
    TimedOut,
}

/// Runs jobs as optimizer child processes
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    command: OptimizerCommand,
    limits: RunLimits,
    grammar: MarkerGrammar,
}

impl ProcessRunner {
    /// Create a runner
    pub fn new(command: OptimizerCommand, limits: RunLimits, grammar: MarkerGrammar) -> Self {
        Self {
            command,
            limits,
            grammar,
        }
    }

    /// The optimizer invocation
    pub fn command(&self) -> &OptimizerCommand {
        &self.command
    }

    /// The time limits
    pub fn limits(&self) -> RunLimits {
        self.limits
    }

    /// Run `job` to completion, timeout or failure. Never fails: every outcome,
    /// including spawn errors, becomes a result with a log file written.
    pub fn run(&self, job: &TestJob) -> TestResult {
        let start = Instant::now();
        match self.execute(job, start) {
            Ok(result) => result,
            Err(e) => {
                let message = e.to_string();
                tracing::debug!(job = %job.label(), error = %message, "job failed");
                write_error_log(job, &message);
                TestResult::error(job, message, start.elapsed())
            }
        }
    }

    fn execute(&self, job: &TestJob, start: Instant) -> Result<TestResult, SupervisorError> {
        let args = self.command.arguments(job)?;
        let (read_fd, write_fd) = create_pipe().map_err(SupervisorError::Pipe)?;
        let reader = unsafe { File::from_raw_fd(read_fd) };
        let stdout = unsafe { File::from_raw_fd(write_fd) };
        let stderr = stdout.try_clone().map_err(SupervisorError::Pipe)?;

        let mut command = Command::new(&self.command.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .process_group(0);
        if let Some(dir) = &self.command.working_dir {
            command.current_dir(dir);
        }

        tracing::debug!(
            job = %job.label(),
            program = %self.command.program,
            args = ?args,
            "spawning optimizer"
        );
        let spawned = command.spawn();
        // Closes the parent's copies of the write end so EOF is seen when the child exits.
        drop(command);
        let mut child = spawned.map_err(|source| SupervisorError::Spawn {
            program: self.command.program.clone(),
            source,
        })?;

        let capture = OutputCapture::start(reader);
        let exit = self.wait(&mut child, start);
        let elapsed = start.elapsed();

        let exit = match exit {
            Ok(exit) => exit,
            Err(e) => {
                kill_group(&mut child);
                capture.wait_eof(self.limits.kill_grace);
                return Err(e);
            }
        };

        match exit {
            Exit::Completed(status) => {
                // Descendants may still hold the pipe open after the child exits.
                if !capture.wait_eof(self.limits.kill_grace) {
                    tracing::debug!(job = %job.label(), "output still open after exit, killing group");
                    signal_group(child.id(), libc::SIGKILL);
                    capture.wait_eof(self.limits.kill_grace);
                }
                let output = capture.take();
                write_log(&job.log_path(), &output)?;

                let text = String::from_utf8_lossy(&output);
                let parsed = self.grammar.parse(&text);
                Ok(TestResult::success(job, parsed, status.code(), elapsed))
            }
            Exit::TimedOut => {
                capture.wait_eof(self.limits.kill_grace);
                let partial = capture.take();
                let mut body = format!("TIMEOUT after {:.1}s\n", self.limits.time_limit.as_secs_f64())
                    .into_bytes();
                body.extend_from_slice(&partial);
                write_log(&job.log_path(), &body)?;
                Ok(TestResult::timeout(job, self.limits.time_limit, elapsed))
            }
        }
    }

    /// Poll the child until it exits or the time limit expires.
    fn wait(&self, child: &mut Child, start: Instant) -> Result<Exit, SupervisorError> {
        loop {
            if let Some(status) = child.try_wait().map_err(SupervisorError::Wait)? {
                return Ok(Exit::Completed(status));
            }

            let remaining = self.limits.time_limit.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                // Graceful timeout: SIGTERM -> grace -> SIGKILL
                self.terminate(child);
                return Ok(Exit::TimedOut);
            }
            std::thread::sleep(remaining.min(self.limits.poll_interval));
        }
    }

    fn terminate(&self, child: &mut Child) {
        signal_group(child.id(), libc::SIGTERM);

        let deadline = Instant::now() + self.limits.kill_grace;
        while Instant::now() < deadline {
            if matches!(child.try_wait(), Ok(Some(_))) {
                break;
            }
            std::thread::sleep(self.limits.poll_interval.min(Duration::from_millis(10)));
        }

        // The leader may have exited while group members linger.
        signal_group(child.id(), libc::SIGKILL);
        let _ = child.wait();
    }
}

/// Write an `ERROR: <message>` log for `job`. Best effort: a failure is logged
/// and otherwise ignored since the job is already an error.
pub(crate) fn write_error_log(job: &TestJob, message: &str) {
    let path = job.log_path();
    if let Err(e) = write_log(&path, format!("ERROR: {message}\n").as_bytes()) {
        tracing::warn!(path = %path.display(), error = %e, "could not write error log");
    }
}

fn write_log(path: &Path, contents: &[u8]) -> Result<(), SupervisorError> {
    std::fs::write(path, contents).map_err(|source| SupervisorError::LogWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Background reader collecting the child's merged output
struct OutputCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    eof: mpsc::Receiver<()>,
    _thread: Option<JoinHandle<()>>,
}

impl OutputCapture {
    fn start(mut reader: File) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (tx, eof) = mpsc::channel();
        let sink = Arc::clone(&buffer);

        let thread = std::thread::Builder::new()
            .name("optmatrix-capture".to_string())
            .spawn(move || {
                let mut chunk = [0u8; 8192];
                loop {
                    match reader.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if let Ok(mut buf) = sink.lock() {
                                buf.extend_from_slice(&chunk[..n]);
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            tracing::warn!(error = %e, "error reading optimizer output");
                            break;
                        }
                    }
                }
                let _ = tx.send(());
            });

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Without a reader the pipe would fill and stall the child.
                tracing::warn!(error = %e, "could not start output reader");
                None
            }
        };

        Self {
            buffer,
            eof,
            _thread: thread,
        }
    }

    /// Wait up to `timeout` for the stream to close. True once EOF was seen.
    fn wait_eof(&self, timeout: Duration) -> bool {
        match self.eof.recv_timeout(timeout) {
            Ok(()) => true,
            Err(mpsc::RecvTimeoutError::Disconnected) => true,
            Err(mpsc::RecvTimeoutError::Timeout) => false,
        }
    }

    /// Everything captured so far
    fn take(&self) -> Vec<u8> {
        match self.buffer.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

/// Create a pipe pair with close-on-exec on both ends, returning (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    // The child's copies are installed as fd 1/2 by dup2, which clears the flag there.
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

/// Send `signal` to the process group led by `pid`. Errors (group already gone) are ignored.
fn signal_group(pid: u32, signal: libc::c_int) {
    let ret = unsafe { libc::kill(-(pid as libc::pid_t), signal) };
    if ret == -1 {
        tracing::trace!(pid, signal, error = %std::io::Error::last_os_error(), "signal not delivered");
    }
}

fn kill_group(child: &mut Child) {
    signal_group(child.id(), libc::SIGKILL);
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use optmatrix_core::{JobStatus, Mode};

    fn sh_runner(script: &str, time_limit: Duration) -> ProcessRunner {
        ProcessRunner::new(
            OptimizerCommand {
                program: "/bin/sh".to_string(),
                args: vec!["-c".to_string(), script.to_string(), "optimizer".to_string()],
                optimize_pass: true,
                cores_per_job: 1,
                working_dir: None,
            },
            RunLimits {
                time_limit,
                kill_grace: Duration::from_millis(200),
                poll_interval: Duration::from_millis(10),
            },
            MarkerGrammar::default(),
        )
    }

    fn job(dir: &Path) -> TestJob {
        TestJob::new(dir.join("prog.s"), Mode::new("sym").unwrap(), dir)
    }

    #[test]
    fn test_arguments_layout() {
        let command = OptimizerCommand {
            program: "racket".to_string(),
            args: vec!["optimize.rkt".to_string()],
            optimize_pass: true,
            cores_per_job: 2,
            working_dir: None,
        };
        let job = TestJob::new("programs/add.s", Mode::new("stoch").unwrap(), "out");
        assert_eq!(
            command.arguments(&job).unwrap(),
            vec!["optimize.rkt", "--stoch", "-o", "-c", "2", "programs/add.s"]
        );
        assert_eq!(command.prefix(), vec!["racket", "optimize.rkt"]);

        let no_pass = OptimizerCommand {
            optimize_pass: false,
            ..command
        };
        assert!(!no_pass.arguments(&job).unwrap().contains(&"-o".to_string()));
    }

    #[test]
    fn test_working_dir_makes_workload_absolute() {
        let command = OptimizerCommand {
            program: "racket".to_string(),
            args: Vec::new(),
            optimize_pass: false,
            cores_per_job: 1,
            working_dir: Some(PathBuf::from("/tmp")),
        };
        let job = TestJob::new("programs/add.s", Mode::new("sym").unwrap(), "out");
        let args = command.arguments(&job).unwrap();
        assert!(Path::new(args.last().unwrap()).is_absolute());
    }

    #[test]
    fn test_success_captures_merged_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = sh_runner(
            "echo '>>> original cost: 42'; echo 'New cost: 40' 1>&2; echo 'Improvement: 2'; exit 3",
            Duration::from_secs(10),
        );
        let result = runner.run(&job(dir.path()));

        assert_eq!(result.status, JobStatus::Success);
        assert_eq!(result.exit_code, Some(3));
        assert_eq!(result.original_cost, Some(42));
        assert_eq!(result.new_cost, Some(40));
        assert_eq!(result.improvement.as_deref(), Some("2"));

        let log = std::fs::read_to_string(&result.log_path).unwrap();
        assert_eq!(log, ">>> original cost: 42\nNew cost: 40\nImprovement: 2\n");
    }

    #[test]
    fn test_child_receives_job_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let runner = sh_runner("echo \"$@\"", Duration::from_secs(10));
        let job = job(dir.path());
        let result = runner.run(&job);

        let log = std::fs::read_to_string(&result.log_path).unwrap();
        assert_eq!(
            log.trim_end(),
            format!("--sym -o -c 1 {}", job.workload_path.display())
        );
    }

    #[test]
    fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let limit = Duration::from_millis(300);
        let runner = sh_runner("echo started; sleep 30", limit);
        let start = Instant::now();
        let result = runner.run(&job(dir.path()));

        assert_eq!(result.status, JobStatus::Timeout);
        assert!(result.elapsed >= limit);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(result.original_cost.is_none());

        let log = std::fs::read_to_string(&result.log_path).unwrap();
        assert!(log.starts_with("TIMEOUT after 0.3s\n"));
        assert!(log.contains("started"));
    }

    #[test]
    fn test_timeout_kills_ignoring_child() {
        let dir = tempfile::tempdir().unwrap();
        let runner = sh_runner("trap '' TERM; sleep 30", Duration::from_millis(200));
        let start = Instant::now();
        let result = runner.run(&job(dir.path()));

        assert_eq!(result.status, JobStatus::Timeout);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_spawn_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner::new(
            OptimizerCommand {
                program: dir.path().join("no-such-optimizer").display().to_string(),
                args: Vec::new(),
                optimize_pass: false,
                cores_per_job: 1,
                working_dir: None,
            },
            RunLimits::default(),
            MarkerGrammar::default(),
        );
        let result = runner.run(&job(dir.path()));

        assert_eq!(result.status, JobStatus::Error);
        let message = result.message.clone().unwrap();
        assert!(message.contains("failed to spawn"));
        let log = std::fs::read_to_string(&result.log_path).unwrap();
        assert!(log.starts_with("ERROR: failed to spawn"));
    }

    #[test]
    fn test_unwritable_log_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = sh_runner("echo hi", Duration::from_secs(10));
        let job = TestJob::new(
            dir.path().join("prog.s"),
            Mode::new("sym").unwrap(),
            dir.path().join("missing-dir"),
        );
        let result = runner.run(&job);

        assert_eq!(result.status, JobStatus::Error);
        assert!(result.message.unwrap().contains("failed to write log"));
    }
}
