//! `log` backend writing to a console, typically UART0.

extern crate alloc;

use {
    alloc::boxed::Box,
    core::{
        cell::RefCell,
        fmt::Write,
        sync::atomic::{AtomicUsize, Ordering},
    },
};

struct ConsoleLogger<W> {
    console: critical_section::Mutex<RefCell<W>>,
    /// Milliseconds since boot, if a tick source is running.
    tick_count: Option<&'static AtomicUsize>,
}

impl<W> ConsoleLogger<W> {
    fn new(console: W, tick_count: Option<&'static AtomicUsize>) -> Self {
        Self {
            console: critical_section::Mutex::new(RefCell::new(console)),
            tick_count,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.console.into_inner().into_inner()
    }
}

impl<W: Send + Write> log::Log for ConsoleLogger<W> {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let seconds = self
            .tick_count
            .map(|t| t.load(Ordering::Relaxed) as f32 / 1000.0)
            .unwrap_or(0.0);
        critical_section::with(|cs| {
            writeln!(
                self.console.borrow(cs).borrow_mut(),
                "{} {} [{}] {}",
                record.level(),
                seconds,
                record.module_path().unwrap_or("aes-dma"),
                record.args()
            )
            .ok();
        })
    }

    fn flush(&self) {}
}

/// Installs a logger writing to `console`. Only the first call has an effect.
pub fn init_logging<W: Send + Write + 'static>(
    console: W,
    tick_count: Option<&'static AtomicUsize>,
) {
    log::set_max_level(log::LevelFilter::Debug);
    log::set_logger(Box::leak(Box::new(ConsoleLogger::new(console, tick_count)))).ok();
}
