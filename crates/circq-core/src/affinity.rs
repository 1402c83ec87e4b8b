//! Pinning threads to CPU cores.
//!
//! Useful for benchmarking queue contention with producers and consumers on
//! known cores. Only Linux is supported; elsewhere the pin calls return
//! [`CircqError::Unsupported`].

use std::thread::JoinHandle;

use crate::error::{CircqError, Result};

/// Number of online CPUs.
pub fn available_cores() -> usize {
    num_cpus::get()
}

fn check_core(core: usize) -> Result<()> {
    let available = available_cores();
    if core >= available {
        return Err(CircqError::CoreOutOfRange { core, available });
    }
    Ok(())
}

/// Pin the calling thread to `core`.
pub fn pin_current_thread(core: usize) -> Result<()> {
    check_core(core)?;
    imp::pin_current(core)
}

/// Pin an already spawned thread to `core`.
pub fn pin_thread<T>(handle: &JoinHandle<T>, core: usize) -> Result<()> {
    check_core(core)?;
    imp::pin_handle(handle, core)
}

#[cfg(target_os = "linux")]
mod imp {
    use std::io;
    use std::os::unix::thread::JoinHandleExt;
    use std::thread::JoinHandle;

    use crate::error::{CircqError, Result};

    fn set_affinity(thread: libc::pthread_t, core: usize) -> Result<()> {
        let rc = unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(core, &mut set);
            libc::pthread_setaffinity_np(thread, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(CircqError::Affinity {
                core,
                source: io::Error::from_raw_os_error(rc),
            })
        }
    }

    pub(super) fn pin_current(core: usize) -> Result<()> {
        set_affinity(unsafe { libc::pthread_self() }, core)
    }

    pub(super) fn pin_handle<T>(handle: &JoinHandle<T>, core: usize) -> Result<()> {
        set_affinity(handle.as_pthread_t(), core)
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use std::thread::JoinHandle;

    use crate::error::{CircqError, Result};

    pub(super) fn pin_current(_core: usize) -> Result<()> {
        Err(CircqError::Unsupported("thread affinity".into()))
    }

    pub(super) fn pin_handle<T>(_handle: &JoinHandle<T>, _core: usize) -> Result<()> {
        Err(CircqError::Unsupported("thread affinity".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn at_least_one_core() {
        assert!(available_cores() >= 1);
    }

    #[test]
    fn out_of_range_core_is_rejected() {
        let core = available_cores();
        match pin_current_thread(core) {
            Err(CircqError::CoreOutOfRange { core: c, available }) => {
                assert_eq!(c, core);
                assert_eq!(available, core);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn pins_current_thread_to_core_zero() {
        // Containers may restrict the allowed set; only assert when permitted.
        let result = thread::spawn(|| pin_current_thread(0)).join().unwrap();
        if let Err(e) = result {
            assert!(matches!(e, CircqError::Affinity { core: 0, .. }), "{e}");
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn pins_spawned_thread_by_handle() {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let _ = rx.recv();
        });
        let result = pin_thread(&handle, 0);
        tx.send(()).unwrap();
        handle.join().unwrap();
        if let Err(e) = result {
            assert!(matches!(e, CircqError::Affinity { core: 0, .. }), "{e}");
        }
    }
}
