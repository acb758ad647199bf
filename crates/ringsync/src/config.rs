use crate::RingError;
use std::fmt;

/// Largest capacity a ring supports.
///
/// Cursors are 32-bit and wrap, so the distance between a producer and a
/// consumer cursor must stay within half the counter space.
pub const MAX_CAPACITY: u32 = 1 << 31;

/// Which side of the ring an operation or worker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => f.write_str("producer"),
            Self::Consumer => f.write_str("consumer"),
        }
    }
}

/// Synchronization discipline of one side of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncType {
    /// Exactly one thread ever operates on this side. No CAS.
    Single,
    /// Any number of threads; CAS reservation plus ordered tail publication.
    Multi,
    /// Any number of threads; head and tail packed into one word, one
    /// operation in flight at a time.
    Hts,
}

impl SyncType {
    /// Whether this side supports the two-phase start/finish operations.
    #[inline]
    pub const fn supports_peek(self) -> bool {
        matches!(self, Self::Single | Self::Hts)
    }
}

/// Producer and consumer sync types, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RingMode {
    pub producer: SyncType,
    pub consumer: SyncType,
}

impl RingMode {
    /// Single producer, single consumer.
    pub const SPSC: Self = Self::new(SyncType::Single, SyncType::Single);
    /// Multi producer, multi consumer.
    pub const MPMC: Self = Self::new(SyncType::Multi, SyncType::Multi);
    /// Head-tail-sync on both sides.
    pub const HTS: Self = Self::new(SyncType::Hts, SyncType::Hts);

    pub const fn new(producer: SyncType, consumer: SyncType) -> Self {
        Self { producer, consumer }
    }

    #[inline]
    pub const fn side(&self, role: Role) -> SyncType {
        match role {
            Role::Producer => self.producer,
            Role::Consumer => self.consumer,
        }
    }
}

impl Default for RingMode {
    fn default() -> Self {
        Self::MPMC
    }
}

/// Configuration for a [`Ring`](crate::Ring).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    /// Usable slot count. Must be a power of two unless `exact_size` is set.
    pub capacity: u32,
    /// Sync discipline per side.
    pub mode: RingMode,
    /// Preferred NUMA socket for the slot array (`None` = any).
    pub socket: Option<u32>,
    /// Accept any capacity and round the slot array up to a power of two.
    pub exact_size: bool,
    /// Enable metrics collection (slight overhead)
    pub enable_metrics: bool,
}

impl RingConfig {
    /// Creates a configuration with the given capacity and mode.
    pub const fn new(capacity: u32, mode: RingMode) -> Self {
        Self {
            capacity,
            mode,
            socket: None,
            exact_size: false,
            enable_metrics: false,
        }
    }

    pub const fn with_socket(mut self, socket: u32) -> Self {
        self.socket = Some(socket);
        self
    }

    pub const fn with_exact_size(mut self, exact: bool) -> Self {
        self.exact_size = exact;
        self
    }

    pub const fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Validates the capacity and derives the slot array geometry.
    pub(crate) fn geometry(&self) -> Result<Geometry, RingError> {
        let invalid = RingError::InvalidCapacity {
            requested: self.capacity,
            max: MAX_CAPACITY,
        };
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(invalid);
        }

        let size = if self.exact_size {
            self.capacity.next_power_of_two()
        } else if self.capacity.is_power_of_two() {
            self.capacity
        } else {
            return Err(invalid);
        };

        Ok(Geometry {
            size,
            capacity: self.capacity,
        })
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self::new(1024, RingMode::MPMC)
    }
}

/// Validated sizes of a ring. `capacity <= size`, `size` a power of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub size: u32,
    pub capacity: u32,
}

/// Small SPSC ring for a dedicated core pair (1K slots).
pub const SPSC_CONFIG: RingConfig = RingConfig::new(1024, RingMode::SPSC);

/// Shared MPMC ring for worker fan-in/fan-out (2K slots).
pub const MPMC_CONFIG: RingConfig = RingConfig::new(2048, RingMode::MPMC);

/// HTS ring for overcommitted hosts where preempted writers hurt MPMC (1K slots).
pub const HTS_CONFIG: RingConfig = RingConfig::new(1024, RingMode::HTS);
