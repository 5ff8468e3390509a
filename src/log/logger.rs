use crate::{
    config::LogSettings,
    log::{
        clock::timestamp_for_filename, log_level::LogLevel, log_msg::LogMsg,
        logger_handle::LoggerHandle,
    },
};

use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError, TrySendError},
    thread,
    time::Duration,
};

/// Flush to disk every 100 lines if debugging/tracing.
#[cfg(feature = "log-debug")]
const FLUSH_BATCH_SIZE: u32 = 100;

/// Flush to disk every 1000 lines otherwise.
#[cfg(not(feature = "log-debug"))]
const FLUSH_BATCH_SIZE: u32 = 1_000;

/// The worker also flushes whenever the queue has been idle this long.
const IDLE_FLUSH: Duration = Duration::from_millis(250);

/// Bounded, non-blocking logger that appends to a per-process log file.
///
/// # Architecture
///
/// 1. **Producers**: session threads call `try_log` through a [`LoggerHandle`].
/// 2. **Queue**: a bounded `mpsc` channel buffers records.
/// 3. **Consumer**: a dedicated `logger-worker` thread formats each record as
///    one line, appends it to the file and optionally echoes it to stderr.
pub struct Logger {
    handle: LoggerHandle,
    _thread: Option<thread::JoinHandle<()>>,
    file_path: PathBuf,
}

impl Logger {
    /// Starts the logger described by `settings`.
    ///
    /// With no configured directory the file goes to `logs/` next to the
    /// executable.
    #[must_use]
    pub fn start(settings: &LogSettings, cap: usize) -> Self {
        let app_name = settings.file_name.as_deref();
        match &settings.dir {
            Some(dir) => Self::start_in_dir(dir, app_name, cap, settings.echo),
            None => Self::start_default(app_name, cap, settings.echo),
        }
    }

    /// Creates a `logs/` directory next to the executable and starts the logger there.
    #[must_use]
    pub fn start_default(app_name: Option<&str>, cap: usize, echo: bool) -> Self {
        let base = exe_dir_fallback_cwd().join("logs");
        Self::start_in_dir(base, app_name, cap, echo)
    }

    /// Starts the logger in a specific directory.
    ///
    /// The file is named `<app_name>-<YYYYMMDD_HHMMSS>-pid<pid>.log`. If the
    /// file cannot be opened the worker falls back to a file in the temp
    /// directory, and finally to `io::sink()`; it never panics.
    pub fn start_in_dir<D: AsRef<Path>>(
        dir: D,
        app_name: Option<&str>,
        cap: usize,
        echo: bool,
    ) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let _ = fs::create_dir_all(&dir);

        let ts = timestamp_for_filename();
        let pid = std::process::id();
        let fname = match app_name {
            Some(name) => format!("{name}-{ts}-pid{pid}.log"),
            None => format!("{ts}-pid{pid}.log"),
        };
        let file_path = dir.join(fname);

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap.max(1));
        let handle = LoggerHandle { tx };

        let file_path_clone = file_path.clone();
        let _thread = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || run_worker(&file_path_clone, &rx, echo))
            .ok();

        Self {
            handle,
            _thread,
            file_path,
        }
    }

    /// Attempts to enqueue a log message without blocking the current thread.
    ///
    /// # Errors
    /// Returns the rejected record if the queue is full or the worker is gone.
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), TrySendError<LogMsg>> {
        self.handle.try_log(level, text, target)
    }

    /// Returns a cloneable handle to the logger sink.
    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    /// Path of the active log file.
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn run_worker(file_path: &Path, rx: &mpsc::Receiver<LogMsg>, echo: bool) {
    let writer: Box<dyn Write + Send> = if let Ok(f) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)
    {
        Box::new(f)
    } else {
        let fallback = std::env::temp_dir().join("courier-fallback.log");
        match OpenOptions::new().create(true).append(true).open(&fallback) {
            Ok(f) => Box::new(f),
            Err(_) => Box::new(io::sink()),
        }
    };

    let mut out: BufWriter<Box<dyn Write + Send>> = BufWriter::new(writer);
    let mut lines_written: u32 = 0;

    loop {
        match rx.recv_timeout(IDLE_FLUSH) {
            Ok(m) => {
                let line = m.to_line();
                let _ = writeln!(&mut out, "{line}");
                if echo {
                    eprintln!("{line}");
                }
                lines_written = lines_written.wrapping_add(1);

                if lines_written.is_multiple_of(FLUSH_BATCH_SIZE)
                    || matches!(m.level, LogLevel::Error)
                {
                    let _ = out.flush();
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                let _ = out.flush();
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let _ = out.flush();
}

/// Directory of the running executable, or the current working directory on error.
fn exe_dir_fallback_cwd() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
