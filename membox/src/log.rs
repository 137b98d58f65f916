//! Allocation-free console output.
//!
//! Pool diagnostics can run while the caller is itself inside an allocator or
//! an interrupt-masked section, so formatting goes into a fixed line buffer and
//! is flushed straight to the file descriptor with `write(2)`.

use spin::Mutex;
use std::fmt;
use std::fmt::Write;

#[doc(hidden)]
#[cold]
pub fn _print(args: fmt::Arguments<'_>, new_line: bool, stderr: bool) {
    let mut log = if stderr { ERR.lock() } else { OUT.lock() };
    let _ = log.write_fmt(args);
    if new_line {
        log.put_char(b'\n');
    }
    log.flush();
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {{
        $crate::log::_print(format_args!($($arg)*), false, false);
    }};
}

#[macro_export]
macro_rules! println {
    () => {{
        $crate::log::_print(format_args!(""), true, false);
    }};
    ($($arg:tt)*) => {{
        $crate::log::_print(format_args!($($arg)*), true, false);
    }};
}

#[macro_export]
macro_rules! eprint {
    ($($arg:tt)*) => {{
        $crate::log::_print(format_args!($($arg)*), false, true);
    }};
}

#[macro_export]
macro_rules! eprintln {
    () => {{
        $crate::log::_print(format_args!(""), true, true);
    }};
    ($($arg:tt)*) => {{
        $crate::log::_print(format_args!($($arg)*), true, true);
    }};
}

/// `fmt::Write` sink over [`print!`], for code written against a writer.
pub struct Console;

impl Write for Console {
    fn write_str(&mut self, s: &str) -> Result<(), fmt::Error> {
        _print(format_args!("{}", s), false, false);
        Ok(())
    }
}

static OUT: Mutex<Log> = Mutex::new(Log::new(libc::STDOUT_FILENO));
static ERR: Mutex<Log> = Mutex::new(Log::new(libc::STDERR_FILENO));

struct Log {
    fd: libc::c_int,
    cursor: usize,
    buffer: [u8; 80],
}

impl Log {
    const fn new(fd: libc::c_int) -> Self {
        Self {
            fd,
            cursor: 0,
            buffer: [0; 80],
        }
    }

    #[cold]
    fn flush(&mut self) {
        let mut written = 0;
        while written < self.cursor {
            let n = unsafe {
                libc::write(
                    self.fd,
                    self.buffer[written..].as_ptr() as _,
                    self.cursor - written,
                )
            };
            if n <= 0 {
                break;
            }
            written += n as usize;
        }
        self.cursor = 0;
    }

    #[inline(always)]
    fn put_char(&mut self, c: u8) {
        self.buffer[self.cursor] = c;
        self.cursor += 1;
        if self.cursor >= self.buffer.len() {
            self.flush();
        }
    }
}

impl Write for Log {
    fn write_str(&mut self, s: &str) -> Result<(), fmt::Error> {
        for b in s.bytes() {
            self.put_char(b);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_lines_flush_in_chunks() {
        let mut log = Log::new(libc::STDOUT_FILENO);
        let line = "x".repeat(200);
        log.write_str(&line).unwrap();
        assert!(log.cursor < log.buffer.len());
        assert_eq!(log.cursor, 200 % log.buffer.len());
        log.flush();
        assert_eq!(log.cursor, 0);
    }
}
