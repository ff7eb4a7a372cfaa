use chrono::Local;
use log::LevelFilter;
use std::io::{self, Write};

use env_logger::{Builder, Target};

/// Environment variable consulted when `--log-file` is not given.
pub const LOG_FILE_ENV: &str = "GATEWAY_LOG_FILE";

/// Multi-writer for logging to both file and stderr
struct DualWriter {
    file: std::fs::File,
    stderr: io::Stderr,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        self.stderr.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.stderr.flush()?;
        Ok(())
    }
}

fn builder() -> Builder {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env();
    builder
}

fn open_log_file(path: &str) -> io::Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

/// Install the process-wide logger.
///
/// Records go to stderr, and additionally to `log_file` (or
/// `$GATEWAY_LOG_FILE`) when one is given. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_logging(log_file: Option<&str>) {
    let path = log_file
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_FILE_ENV).ok());

    let mut builder = builder();
    match path.as_deref().map(|path| (path, open_log_file(path))) {
        Some((_, Ok(file))) => {
            builder.target(Target::Pipe(Box::new(DualWriter {
                file,
                stderr: io::stderr(),
            })));
        }
        Some((path, Err(err))) => {
            eprintln!("Failed to open log file '{path}': {err}");
            builder.target(Target::Stderr);
        }
        None => {
            builder.target(Target::Stderr);
        }
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
        return;
    }
    if let Some(path) = path {
        log::debug!("Logging to {path}");
    }
}
