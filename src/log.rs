//! Minimal logging facade.
//!
//! Mirrors the shape of `anyos_std::log_info!`/`log_error!` — a
//! process-wide sink plus macros that build the message in a stack buffer
//! — except the transport is an injected [`LogSink`](crate::collab::LogSink)
//! rather than a hardcoded named pipe, since a bare-metal core has no
//! `logd` daemon to talk to.

use crate::collab::{LogSink, NoopCollaborator};
use core::cell::Cell;
use core::fmt::Write;

struct SinkCell(Cell<*const dyn LogSink>);

// Single-threaded cooperative model (see spec §5) — no concurrent access.
unsafe impl Sync for SinkCell {}

static NOOP: NoopCollaborator = NoopCollaborator;
static SINK: SinkCell = SinkCell(Cell::new(&NOOP as *const dyn LogSink));

/// Install the log transport. The sink must outlive every subsequent call
/// into this crate; pass a `'static` reference.
pub fn set_log_sink(sink: &'static dyn LogSink) {
    SINK.0.set(sink as *const dyn LogSink);
}

/// Format `args` into a fixed stack buffer and forward it to the installed
/// sink. Messages longer than the buffer are truncated rather than heap
/// allocated, matching the bare-metal "no allocation on the logging path"
/// discipline `anyos_std::log::log_msg` follows.
pub fn log_msg(args: core::fmt::Arguments) {
    struct BufWriter<'a> {
        buf: &'a mut [u8],
        pos: usize,
    }
    impl<'a> Write for BufWriter<'a> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            let bytes = s.as_bytes();
            let avail = self.buf.len() - self.pos;
            let n = bytes.len().min(avail);
            self.buf[self.pos..self.pos + n].copy_from_slice(&bytes[..n]);
            self.pos += n;
            Ok(())
        }
    }

    let mut buf = [0u8; 256];
    let mut writer = BufWriter { buf: &mut buf, pos: 0 };
    let _ = core::fmt::write(&mut writer, args);
    let len = writer.pos;

    // Safety: the pointer is either `&NOOP` or a caller-supplied `'static`
    // reference installed through `set_log_sink`.
    let sink = unsafe { &*SINK.0.get() };
    if let Ok(s) = core::str::from_utf8(&buf[..len]) {
        sink.write(s);
    }
}

/// Log a diagnostic message through the installed sink.
#[macro_export]
macro_rules! dll_log {
    ($($arg:tt)*) => {
        $crate::log::log_msg(format_args!($($arg)*))
    };
}
