//! `concurrent/rw_lock`: `Concurrent::RWLock`
//!
//! Acquire and release are separate calls, so the lock tracks its holders
//! explicitly instead of handing out guards.

use super::namespace;
use crate::builtins::{BuiltinResult, Call, Interrupt};
use crate::class::Builtin;
use crate::error::ErrorKind;
use crate::object::NativeHandle;
use crate::value::Value;
use crate::vm::ClassRegistry;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Reader-writer lock driven by explicit acquire and release calls
#[derive(Debug, Default)]
pub struct ReadWriteLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

#[derive(Debug, Default)]
struct LockState {
    readers: usize,
    writer: bool,
}

impl ReadWriteLock {
    /// Block until no writer holds the lock, then take a read share
    pub fn acquire_read(&self) {
        let mut state = self.state.lock();
        while state.writer {
            self.changed.wait(&mut state);
        }
        state.readers += 1;
    }

    /// Drop a read share; false if none was held
    pub fn release_read(&self) -> bool {
        let mut state = self.state.lock();
        if state.readers == 0 {
            return false;
        }
        state.readers -= 1;
        self.changed.notify_all();
        true
    }

    /// Block until the lock is free, then take it exclusively
    pub fn acquire_write(&self) {
        let mut state = self.state.lock();
        while state.writer || state.readers > 0 {
            self.changed.wait(&mut state);
        }
        state.writer = true;
    }

    /// Drop the exclusive hold; false if it was not held
    pub fn release_write(&self) -> bool {
        let mut state = self.state.lock();
        if !state.writer {
            return false;
        }
        state.writer = false;
        self.changed.notify_all();
        true
    }
}

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("acquire_read_lock", |c| {
        c.expect_argc(0)?;
        this(c)?.acquire_read();
        Ok(c.receiver.clone())
    }),
    Builtin::new("acquire_write_lock", |c| {
        c.expect_argc(0)?;
        this(c)?.acquire_write();
        Ok(c.receiver.clone())
    }),
    Builtin::new("release_read_lock", |c| {
        let released = this(c)?.release_read();
        released_or_error(c, released, "read")
    }),
    Builtin::new("release_write_lock", |c| {
        let released = this(c)?.release_write();
        released_or_error(c, released, "write")
    }),
    Builtin::new("with_read_lock", with_read_lock),
    Builtin::new("with_write_lock", with_write_lock),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", new_lock)];

pub(super) fn install(classes: &ClassRegistry) {
    let concurrent = namespace(classes, "Concurrent");
    let class = classes.define_class("RWLock", false, concurrent);
    classes.install_builtin(class, INSTANCE_METHODS, false);
    classes.install_builtin(class, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<Arc<ReadWriteLock>, Interrupt> {
    match &call.receiver {
        Value::Native(handle) => handle
            .downcast::<Arc<ReadWriteLock>>()
            .cloned()
            .ok_or_else(|| call.wrong_type("RWLock", &call.receiver)),
        other => Err(call.wrong_type("RWLock", other)),
    }
}

fn released_or_error(call: &Call<'_>, released: bool, kind: &str) -> BuiltinResult {
    if !released {
        return Err(call.error(
            ErrorKind::InternalError,
            format!("Can't release a {} lock that is not held", kind),
        ));
    }
    Ok(call.receiver.clone())
}

fn new_lock(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let class = call
        .receiver
        .as_class()
        .ok_or_else(|| call.wrong_type("Class", &call.receiver))?;
    let lock = Arc::new(ReadWriteLock::default());
    Ok(Value::Native(NativeHandle::new(class, "RWLock", lock)))
}

/// Run the block holding a read share; the share is dropped on any exit
fn with_read_lock(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let lock = this(call)?;
    let block = call.require_block()?;
    lock.acquire_read();
    let result = call.call_block(&block, Vec::new());
    lock.release_read();
    result
}

fn with_write_lock(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let lock = this(call)?;
    let block = call.require_block()?;
    lock.acquire_write();
    let result = call.call_block(&block, Vec::new());
    lock.release_write();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_readers_share() {
        let lock = ReadWriteLock::default();
        lock.acquire_read();
        lock.acquire_read();
        assert!(lock.release_read());
        assert!(lock.release_read());
        assert!(!lock.release_read());
    }

    #[test]
    fn test_release_without_hold() {
        let lock = ReadWriteLock::default();
        assert!(!lock.release_write());
        lock.acquire_write();
        assert!(lock.release_write());
    }

    #[test]
    fn test_writer_waits_for_readers() {
        let lock = Arc::new(ReadWriteLock::default());
        let written = Arc::new(AtomicBool::new(false));
        lock.acquire_read();

        let writer = {
            let lock = lock.clone();
            let written = written.clone();
            std::thread::spawn(move || {
                lock.acquire_write();
                written.store(true, Ordering::SeqCst);
                lock.release_write();
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!written.load(Ordering::SeqCst));
        lock.release_read();
        writer.join().unwrap();
        assert!(written.load(Ordering::SeqCst));
    }
}
