use std::io::Write;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use env_logger::{Builder, Env};
use log::LevelFilter;
use parking_lot::RwLock;
use termcolor::{Color, ColorSpec, WriteColor};

use super::error::MatrixError;

pub use log::{debug, error, info, trace, warn};

pub fn init_logger() {
    let mut builder = Builder::from_env(
        Env::default().default_filter_or("ledmatrix=info,apps=info"),
    );
    builder.filter_module("png", LevelFilter::Warn);

    builder.format(|_buf, record| {
        let writer =
            termcolor::BufferWriter::stdout(termcolor::ColorChoice::Auto);
        let mut buffer = writer.buffer();
        let mut spec = ColorSpec::new();

        spec.set_fg(Some(match record.level() {
            log::Level::Trace => Color::Cyan,
            log::Level::Debug => Color::Blue,
            log::Level::Info => Color::Green,
            log::Level::Warn => Color::Yellow,
            log::Level::Error => Color::Red,
        }));

        buffer.set_color(&spec)?;
        let module_path = record.module_path().unwrap_or("<unknown>");
        write!(buffer, "[{}][{}]", record.level(), module_path)?;
        buffer.reset()?;
        writeln!(buffer, " {}", record.args())?;
        writer.print(&buffer)?;
        Ok(())
    });

    let _ = builder.try_init();
}

pub type FailureHook = Box<dyn Fn(&MatrixError) + Send + Sync + 'static>;

static FAILURE_HOOK: LazyLock<RwLock<Option<FailureHook>>> =
    LazyLock::new(|| RwLock::new(None));

static FAILURE_COUNT: AtomicU64 = AtomicU64::new(0);

/// The single seam every swallowed plugin or persistence failure goes
/// through. Logs the error, counts it and forwards it to the installed hook.
pub fn report_failure(err: &MatrixError) {
    FAILURE_COUNT.fetch_add(1, Ordering::Relaxed);

    match err {
        MatrixError::Tick { .. } => warn!("{}", err),
        _ => error!("{}", err),
    }

    if let Some(hook) = FAILURE_HOOK.read().as_ref() {
        hook(err);
    }
}

pub fn set_failure_hook<F>(hook: F)
where
    F: Fn(&MatrixError) + Send + Sync + 'static,
{
    *FAILURE_HOOK.write() = Some(Box::new(hook));
}

pub fn clear_failure_hook() {
    *FAILURE_HOOK.write() = None;
}

pub fn failure_count() -> u64 {
    FAILURE_COUNT.load(Ordering::Relaxed)
}
