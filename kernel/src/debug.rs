// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2026.

//! Support for in-kernel debugging.
//!
//! The board registers one output sink with [`set_debug_writer`], usually a
//! polled UART. Until a sink is registered every message is dropped, so
//! capsules can log unconditionally.
//!
//! Usage
//! -----
//!
//! ```rust,ignore
//! use kernel::debug;
//!
//! debug!("erase of sector {} done", sector);
//! debug_verbose!("status {:#04x}", status);
//! ```

use core::fmt::{self, Write};
use core::ptr::addr_of;

/// A byte sink the debug macros format into.
pub trait IoWrite {
    /// Write `buf` out, returning the number of bytes accepted.
    fn write(&self, buf: &[u8]) -> usize;
}

struct DebugWriterWrapper {
    writer: &'static dyn IoWrite,
}

impl Write for DebugWriterWrapper {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // A sink that cannot keep up truncates the message.
        let _ = self.writer.write(s.as_bytes());
        Ok(())
    }
}

// Written once during board setup before interrupts are enabled, read-only
// afterwards.
static mut DEBUG_WRITER: Option<&'static dyn IoWrite> = None;

/// Register the sink used by `debug!`.
///
/// # Safety
///
/// Must be called during board initialization, before any interrupt handler
/// or other code that may log is running.
pub unsafe fn set_debug_writer(writer: &'static dyn IoWrite) {
    *core::ptr::addr_of_mut!(DEBUG_WRITER) = Some(writer);
}

fn writer() -> Option<&'static dyn IoWrite> {
    // SAFETY: only `set_debug_writer` writes the static, before any reader
    // runs, and the value is `Copy`.
    unsafe { *addr_of!(DEBUG_WRITER) }
}

/// Formats `args` followed by a line break into the registered sink.
pub fn debug_println(args: fmt::Arguments) {
    if let Some(writer) = writer() {
        let mut wrapper = DebugWriterWrapper { writer };
        let _ = wrapper.write_fmt(args);
        let _ = wrapper.write_str("\r\n");
    }
}

/// Like [`debug_println`], prefixed with the source location of the call.
pub fn debug_verbose_println(args: fmt::Arguments, file_line: &(&'static str, u32)) {
    let (file, line) = *file_line;
    debug_println(format_args!("{}:{}: {}", file, line, args))
}

/// In-kernel `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug_verbose!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_println(format_args!("{}", $msg))
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_println(format_args!($fmt, $($arg)+))
    });
}

/// In-kernel `println()` debugging that includes the file and line.
#[macro_export]
macro_rules! debug_verbose {
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_verbose_println(format_args!("{}", $msg), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_verbose_println(format_args!($fmt, $($arg)+), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
}

#[cfg(test)]
mod tests {
    use super::IoWrite;
    use std::boxed::Box;
    use std::string::String;
    use std::sync::Mutex;
    use std::vec::Vec;

    struct Capture(Mutex<Vec<u8>>);

    impl IoWrite for Capture {
        fn write(&self, buf: &[u8]) -> usize {
            self.0.lock().unwrap().extend_from_slice(buf);
            buf.len()
        }
    }

    #[test]
    fn debug_formats_into_registered_writer() {
        let capture: &'static Capture = Box::leak(Box::new(Capture(Mutex::new(Vec::new()))));
        unsafe { super::set_debug_writer(capture) };

        debug!("page {} of {}", 3, 4096);
        debug_verbose!("status {:#04x}", 0x03);

        let text = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("page 3 of 4096\r\n"));
        assert!(text.contains("debug.rs:"));
        assert!(text.contains("status 0x03\r\n"));
    }
}
