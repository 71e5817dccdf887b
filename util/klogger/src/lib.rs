// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate log;

use core::{
    fmt::{self, Write},
    str::FromStr,
};

#[cfg(not(any(test, feature = "std")))]
use crate_interface::call_interface;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
pub use log::{debug, error, info, trace, warn};

macro_rules! color_fmt {
    ($color_code:expr, $($arg:tt)*) => {
        format_args!("\u{1B}[{}m{}\u{1B}[m", $color_code as u8, format_args!($($arg)*))
    };
}

#[repr(u8)]
enum AnsiColor {
    Red = 31,
    Green = 32,
    Yellow = 33,
    Cyan = 36,
    White = 37,
    BrightBlack = 90,
}

/// Implemented by the platform to put log output somewhere.
#[crate_interface::def_interface]
pub trait LoggerAdapter {
    fn write_str(s: &str);
    fn hart_id() -> Option<usize>;
}

struct FirmwareLogger;

impl Write for FirmwareLogger {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        cfg_if::cfg_if! {
            if #[cfg(any(test, feature = "std"))] {
                std::print!("{s}");
            } else {
                call_interface!(LoggerAdapter::write_str, s);
            }
        }
        Ok(())
    }
}

impl Log for FirmwareLogger {
    #[inline]
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = record.level();
        let line = record.line().unwrap_or(0);
        let path = record.target();
        let color = match level {
            Level::Error => AnsiColor::Red,
            Level::Warn => AnsiColor::Yellow,
            Level::Info => AnsiColor::Green,
            Level::Debug => AnsiColor::Cyan,
            Level::Trace => AnsiColor::BrightBlack,
        };

        cfg_if::cfg_if! {
            if #[cfg(any(test, feature = "std"))] {
                let _ = print_fmt(color_fmt!(
                    AnsiColor::White,
                    "[{time} {path}:{line}] {args}\n",
                    time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
                    path = path,
                    line = line,
                    args = color_fmt!(color, "{}", record.args()),
                ));
            } else {
                let _ = match call_interface!(LoggerAdapter::hart_id) {
                    Some(h) => print_fmt(color_fmt!(
                        AnsiColor::White,
                        "[M{h} {path}:{line}] {args}\n",
                        h = h,
                        path = path,
                        line = line,
                        args = color_fmt!(color, "{}", record.args()),
                    )),
                    None => print_fmt(color_fmt!(
                        AnsiColor::White,
                        "[M {path}:{line}] {args}\n",
                        path = path,
                        line = line,
                        args = color_fmt!(color, "{}", record.args()),
                    )),
                };
            }
        }
    }

    fn flush(&self) {}
}

/// Writes formatted output, serialized against other writers.
pub fn print_fmt(args: fmt::Arguments) -> fmt::Result {
    use kspin::SpinNoIrq;
    static LOCK: SpinNoIrq<()> = SpinNoIrq::new(());

    let _guard = LOCK.lock();
    FirmwareLogger.write_fmt(args)
}

/// Installs the logger with a `warn` filter.
///
/// Must run once on the boot hart, before machine interrupts are enabled.
pub fn init_klogger() -> Result<(), SetLoggerError> {
    // SAFETY: no other hart runs and no trap can be taken yet, so nothing
    // observes the logger while it is being set.
    unsafe { log::set_logger_racy(&FirmwareLogger)? };
    log::set_max_level(LevelFilter::Warn);
    Ok(())
}

/// Sets the filter from a level name; anything unparsable turns logging off.
pub fn set_log_level(level: &str) {
    let lf = LevelFilter::from_str(level)
        .ok()
        .unwrap_or(LevelFilter::Off);
    log::set_max_level(lf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_and_filter() {
        assert!(print_fmt(format_args!("klogger {}\n", 1)).is_ok());

        set_log_level("trace");
        assert_eq!(log::max_level(), LevelFilter::Trace);
        set_log_level("not-a-level");
        assert_eq!(log::max_level(), LevelFilter::Off);
        set_log_level("debug");
        assert_eq!(log::max_level(), LevelFilter::Debug);
    }

    #[test]
    fn test_logger_formats_record() {
        FirmwareLogger.log(
            &Record::builder()
                .args(format_args!("tlb fill"))
                .level(Level::Trace)
                .target("kfirm::tlb")
                .line(Some(42))
                .build(),
        );
    }
}
