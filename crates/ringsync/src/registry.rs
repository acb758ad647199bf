//! Process-wide name registry for rings.
//!
//! [`Ring::create`](crate::Ring::create) registers a ring under a name and
//! [`Ring::lookup`](crate::Ring::lookup) hands out further `Arc` handles to
//! it from anywhere in the process. Entries are type-erased; a lookup with
//! the wrong element type fails with `TypeMismatch` rather than aliasing the
//! slots as another type.

use crate::{Ring, RingError};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::debug;

/// Names must be strictly shorter than this many bytes.
pub const NAME_MAX_LEN: usize = 32;

type Entry = Arc<dyn Any + Send + Sync>;

fn table() -> MutexGuard<'static, HashMap<String, Entry>> {
    static RINGS: OnceLock<Mutex<HashMap<String, Entry>>> = OnceLock::new();
    // The map stays consistent even if a holder panicked.
    RINGS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn validate_name(name: &str) -> Result<(), RingError> {
    if name.is_empty() || name.len() >= NAME_MAX_LEN {
        return Err(RingError::InvalidName {
            name: name.to_owned(),
            max_len: NAME_MAX_LEN,
        });
    }
    Ok(())
}

/// Builds and registers a ring under `name`, holding the table lock across
/// construction so two racing creators cannot both succeed.
pub(crate) fn register<T, F>(name: &str, build: F) -> Result<Arc<Ring<T>>, RingError>
where
    T: Copy + Send + 'static,
    F: FnOnce() -> Result<Ring<T>, RingError>,
{
    validate_name(name)?;

    let mut rings = table();
    if rings.contains_key(name) {
        return Err(RingError::AlreadyExists {
            name: name.to_owned(),
        });
    }

    let ring = Arc::new(build()?);
    rings.insert(name.to_owned(), ring.clone());
    debug!(
        name,
        capacity = ring.capacity(),
        size = ring.size(),
        mode = ?ring.mode(),
        "ring created"
    );
    Ok(ring)
}

pub(crate) fn lookup<T>(name: &str) -> Result<Arc<Ring<T>>, RingError>
where
    T: Copy + Send + 'static,
{
    let entry = table().get(name).cloned();
    let Some(entry) = entry else {
        debug!(name, "ring lookup missed");
        return Err(RingError::NotFound {
            name: name.to_owned(),
        });
    };
    entry.downcast::<Ring<T>>().map_err(|_| RingError::TypeMismatch {
        name: name.to_owned(),
    })
}

/// Removes `name` if it still maps to the ring at `ring`. A stale handle
/// must not unregister a newer ring that reused the name.
pub(crate) fn unregister(name: &str, ring: *const ()) -> bool {
    let mut rings = table();
    let same = rings
        .get(name)
        .is_some_and(|entry| Arc::as_ptr(entry).cast::<()>() == ring);
    if same {
        rings.remove(name);
        debug!(name, "ring destroyed");
    }
    same
}

/// Names of all registered rings, sorted.
pub fn names() -> Vec<String> {
    let mut names: Vec<String> = table().keys().cloned().collect();
    names.sort_unstable();
    names
}
