// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An injected logging capability, replacing the process-wide logging
//! macros the source uses (spec §9 Design Notes: "Replace process-wide
//! logging macros with an injected logger capability on the Context").
//!
//! Session keys and other secret material are never passed to a [`Logger`]
//! — see spec §3's "never logged" invariant on session keys.

/// Severity of a single log call, mirroring the `log` crate's levels so
/// [`LogCrateLogger`] can forward without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Trace,
    Debug,
    Warn,
    Error,
}

/// An object-safe logging sink.
///
/// Taken as `&dyn Logger` by [`crate::Context`] — logging is diagnostic
/// only, off the command hot path, so the dynamic dispatch cost is
/// immaterial and avoids a third generic parameter on every type in the
/// stack for a capability most callers leave at [`NullLogger`].
pub trait Logger {
    fn log(&self, level: Level, args: core::fmt::Arguments<'_>);

    fn trace(&self, args: core::fmt::Arguments<'_>) {
        self.log(Level::Trace, args)
    }
    fn debug(&self, args: core::fmt::Arguments<'_>) {
        self.log(Level::Debug, args)
    }
    fn warn(&self, args: core::fmt::Arguments<'_>) {
        self.log(Level::Warn, args)
    }
    fn error(&self, args: core::fmt::Arguments<'_>) {
        self.log(Level::Error, args)
    }
}

/// The default logger: discards everything.
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Level, _args: core::fmt::Arguments<'_>) {}
}

/// An adapter forwarding to the `log` crate's global facade, for host
/// applications that already wire up `log` + a sink like `env_logger`
/// (grounded in how the source tree's one std host binary does logging).
///
/// This is sugar over the capability, not a substitute for it: the core
/// state machines never call `log::*` directly, only through `&dyn Logger`.
#[cfg(feature = "std")]
pub struct LogCrateLogger;

#[cfg(feature = "std")]
impl Logger for LogCrateLogger {
    fn log(&self, level: Level, args: core::fmt::Arguments<'_>) {
        let level = match level {
            Level::Trace => log::Level::Trace,
            Level::Debug => log::Level::Debug,
            Level::Warn => log::Level::Warn,
            Level::Error => log::Level::Error,
        };
        log::log!(level, "{}", args);
    }
}

/// Convenience macros mirroring `log`'s call shape, used internally so
/// call sites read like ordinary logging rather than manual
/// `Arguments::new_v1` plumbing.
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {
        $logger.trace(format_args!($($arg)*))
    };
}
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(format_args!($($arg)*))
    };
}
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(format_args!($($arg)*))
    };
}

pub(crate) use log_debug;
pub(crate) use log_trace;
pub(crate) use log_warn;
