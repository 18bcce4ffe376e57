//! Memory map acquisition.
//!
//! `GetMemoryMap` has to be called twice: once with an empty buffer to learn
//! the required size, then again with a buffer at least that large. The
//! buffer comes from the pool allocator, and allocating it can split a free
//! region and add descriptors to the very map being measured. The buffer is
//! therefore oversized by a few descriptors ([`MemoryMapConfig::slack_entries`]),
//! and if the map still does not fit the whole negotiation is repeated, up to
//! [`MemoryMapConfig::max_attempts`] times.
//!
//! The acquirer talks to firmware only through [`MemoryServices`].
//! [`BootServices`](super::BootServices) implements it; tests implement it
//! with a simulated firmware.
//!
//! Descriptors are read at `index * descriptor_size`. The firmware-reported
//! stride may exceed `size_of::<EfiMemoryDescriptor>()`, and the extra bytes
//! are never read.

use core::fmt;
use core::iter::FusedIterator;
use core::mem::{ManuallyDrop, size_of};
use core::ops::Deref;
use core::ptr::{self, NonNull};

use log::{debug, trace, warn};

use crate::EfiStatus;
use crate::memory::{EfiMemoryDescriptor, EfiMemoryType};

/// The boot services a memory map acquisition needs.
pub trait MemoryServices {
    /// `GetMemoryMap`.
    ///
    /// On entry `size` is the capacity of `buffer`. On return it holds the
    /// size of the map, which on [`EfiStatus::BUFFER_TOO_SMALL`] is the size
    /// required.
    ///
    /// # Safety
    ///
    /// `buffer` must be null with `*size == 0`, or valid for writes of
    /// `*size` bytes.
    unsafe fn get_memory_map(
        &self,
        size: &mut usize,
        buffer: *mut u8,
        map_key: &mut usize,
        descriptor_size: &mut usize,
        descriptor_version: &mut u32,
    ) -> EfiStatus;

    /// `AllocatePool`. The returned memory is 8-byte aligned.
    ///
    /// # Errors
    ///
    /// Returns the firmware status if the pool is exhausted or the type is
    /// invalid.
    fn allocate_pool(
        &self,
        memory_type: EfiMemoryType,
        size: usize,
    ) -> Result<NonNull<u8>, EfiStatus>;

    /// `FreePool`.
    ///
    /// # Errors
    ///
    /// Returns the firmware status if `buffer` was not pool memory.
    ///
    /// # Safety
    ///
    /// `buffer` must come from [`allocate_pool`](Self::allocate_pool) on the
    /// same services and must not be used afterwards.
    unsafe fn free_pool(&self, buffer: NonNull<u8>) -> Result<(), EfiStatus>;
}

// ── Configuration ────────────────────────────────────────────────────

/// Tuning for [`MemoryMap::try_acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMapConfig {
    /// Extra descriptors' worth of buffer allocated beyond the probed size.
    pub slack_entries: usize,
    /// Allocate-and-query rounds before giving up. Zero is treated as one.
    pub max_attempts: usize,
    /// Pool type of the map buffer.
    pub pool_type: EfiMemoryType,
}

impl MemoryMapConfig {
    /// Four slack entries, four attempts, loader data.
    pub const DEFAULT: Self = Self {
        slack_entries: 4,
        max_attempts: 4,
        pool_type: EfiMemoryType::LOADER_DATA,
    };

    /// Sets [`slack_entries`](Self::slack_entries).
    #[must_use]
    pub const fn with_slack_entries(mut self, slack_entries: usize) -> Self {
        self.slack_entries = slack_entries;
        self
    }

    /// Sets [`max_attempts`](Self::max_attempts).
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets [`pool_type`](Self::pool_type).
    #[must_use]
    pub const fn with_pool_type(mut self, pool_type: EfiMemoryType) -> Self {
        self.pool_type = pool_type;
        self
    }
}

impl Default for MemoryMapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── Errors ───────────────────────────────────────────────────────────

/// Why a memory map could not be acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MemoryMapError {
    /// The pool could not supply the map buffer.
    #[error("failed to allocate {size} bytes for the memory map: {status}")]
    Allocation {
        /// Requested buffer size.
        size: usize,
        /// Status returned by `AllocatePool`.
        status: EfiStatus,
    },
    /// `GetMemoryMap` failed with something other than a short buffer.
    #[error("GetMemoryMap failed: {0}")]
    Firmware(EfiStatus),
    /// The map outgrew every buffer allocated for it.
    #[error("memory map kept growing after {attempts} attempts")]
    MapGrew {
        /// Rounds performed.
        attempts: usize,
    },
    /// The reported stride cannot hold a descriptor.
    #[error("invalid memory descriptor size {0}")]
    BadDescriptorSize(usize),
    /// The map size is not a whole number of descriptors.
    #[error("memory map size {size} is not a multiple of descriptor size {descriptor_size}")]
    RaggedMap {
        /// Reported map size.
        size: usize,
        /// Reported stride.
        descriptor_size: usize,
    },
    /// The firmware reported a map larger than the buffer it was given.
    #[error("memory map size {size} exceeds its {capacity}-byte buffer")]
    Overrun {
        /// Reported map size.
        size: usize,
        /// Buffer capacity.
        capacity: usize,
    },
    /// The map has no buffer to refresh into.
    #[error("memory map has no buffer")]
    NoBuffer,
}

impl From<MemoryMapError> for EfiStatus {
    fn from(error: MemoryMapError) -> Self {
        match error {
            MemoryMapError::Allocation { status, .. } | MemoryMapError::Firmware(status) => status,
            MemoryMapError::MapGrew { .. } => Self::BUFFER_TOO_SMALL,
            MemoryMapError::BadDescriptorSize(_)
            | MemoryMapError::RaggedMap { .. }
            | MemoryMapError::Overrun { .. } => Self::BAD_BUFFER_SIZE,
            MemoryMapError::NoBuffer => Self::NOT_READY,
        }
    }
}

/// Every entry is read as a 40-byte descriptor prefix, so a smaller stride
/// would read past the end of the last entry.
fn validate(size: usize, descriptor_size: usize, capacity: usize) -> Result<(), MemoryMapError> {
    if descriptor_size < size_of::<EfiMemoryDescriptor>() || descriptor_size % 8 != 0 {
        return Err(MemoryMapError::BadDescriptorSize(descriptor_size));
    }
    if size > capacity {
        return Err(MemoryMapError::Overrun { size, capacity });
    }
    if size % descriptor_size != 0 {
        return Err(MemoryMapError::RaggedMap {
            size,
            descriptor_size,
        });
    }
    Ok(())
}

// ── Pool buffer ──────────────────────────────────────────────────────

/// Pool memory returned to its allocator on drop.
struct PoolBuffer<'s, S: MemoryServices + ?Sized> {
    services: &'s S,
    ptr: NonNull<u8>,
    capacity: usize,
}

impl<'s, S: MemoryServices + ?Sized> PoolBuffer<'s, S> {
    fn allocate(
        services: &'s S,
        memory_type: EfiMemoryType,
        capacity: usize,
    ) -> Result<Self, MemoryMapError> {
        let ptr = services
            .allocate_pool(memory_type, capacity)
            .map_err(|status| MemoryMapError::Allocation {
                size: capacity,
                status,
            })?;
        Ok(Self {
            services,
            ptr,
            capacity,
        })
    }

    fn leak(self) -> NonNull<u8> {
        ManuallyDrop::new(self).ptr
    }
}

impl<S: MemoryServices + ?Sized> Drop for PoolBuffer<'_, S> {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `allocate_pool` on `services` and is only
        // freed here.
        if let Err(status) = unsafe { self.services.free_pool(self.ptr) } {
            warn!("failed to free {}-byte memory map buffer: {status}", self.capacity);
        }
    }
}

// ── Raw map ──────────────────────────────────────────────────────────

/// A memory map that does not own its buffer.
///
/// This is the form a map takes once boot services are gone and its pool
/// buffer can no longer be freed. An empty map has a null buffer, size 0,
/// and key 0.
pub struct RawMemoryMap {
    buffer: *const u8,
    size: usize,
    descriptor_size: usize,
    descriptor_version: u32,
    map_key: usize,
}

impl RawMemoryMap {
    /// A map with no descriptors.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            buffer: ptr::null(),
            size: 0,
            descriptor_size: 0,
            descriptor_version: 0,
            map_key: 0,
        }
    }

    /// Wraps a map written by `GetMemoryMap`.
    ///
    /// # Safety
    ///
    /// `buffer` must be valid for reads of `size` bytes for as long as the
    /// map is used, and must not be written in that time.
    #[must_use]
    pub const unsafe fn from_raw_parts(
        buffer: *const u8,
        size: usize,
        descriptor_size: usize,
        descriptor_version: u32,
        map_key: usize,
    ) -> Self {
        Self {
            buffer,
            size,
            descriptor_size,
            descriptor_version,
            map_key,
        }
    }

    /// Start of the buffer. Null for an empty map.
    #[must_use]
    pub const fn buffer(&self) -> *const u8 {
        self.buffer
    }

    /// Size of the map in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Distance between descriptors.
    #[must_use]
    pub const fn descriptor_size(&self) -> usize {
        self.descriptor_size
    }

    /// Descriptor format version.
    #[must_use]
    pub const fn descriptor_version(&self) -> u32 {
        self.descriptor_version
    }

    /// The key `ExitBootServices` expects for this snapshot.
    #[must_use]
    pub const fn map_key(&self) -> usize {
        self.map_key
    }

    /// Number of descriptors.
    #[must_use]
    pub const fn len(&self) -> usize {
        if self.descriptor_size == 0 {
            0
        } else {
            self.size / self.descriptor_size
        }
    }

    /// Returns `true` if the map holds no descriptors.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The descriptor at `index`.
    ///
    /// Returns `None` past the end, or if the stride cannot hold a
    /// descriptor.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<EfiMemoryDescriptor> {
        if index >= self.len() || self.descriptor_size < size_of::<EfiMemoryDescriptor>() {
            return None;
        }
        // SAFETY: `index < len` and the stride covers a descriptor, so the
        // whole descriptor lies within the `size` readable bytes. Pool memory
        // is aligned, but `from_raw_parts` callers may not be.
        Some(unsafe {
            self.buffer
                .add(index * self.descriptor_size)
                .cast::<EfiMemoryDescriptor>()
                .read_unaligned()
        })
    }

    /// Iterates over the descriptors.
    #[must_use]
    pub fn iter(&self) -> Descriptors<'_> {
        Descriptors {
            map: self,
            front: 0,
            back: if self.descriptor_size < size_of::<EfiMemoryDescriptor>() {
                0
            } else {
                self.len()
            },
        }
    }

    /// Total pages of the given type.
    #[must_use]
    pub fn pages_of_type(&self, memory_type: EfiMemoryType) -> u64 {
        self.iter()
            .filter(|desc| desc.memory_type == memory_type)
            .map(|desc| desc.number_of_pages)
            .sum()
    }

    /// The descriptor whose range contains `address`.
    #[must_use]
    pub fn find(&self, address: u64) -> Option<EfiMemoryDescriptor> {
        self.iter().find(|desc| desc.contains(address))
    }
}

impl fmt::Debug for RawMemoryMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMemoryMap")
            .field("len", &self.len())
            .field("size", &self.size)
            .field("descriptor_size", &self.descriptor_size)
            .field("descriptor_version", &self.descriptor_version)
            .field("map_key", &self.map_key)
            .finish_non_exhaustive()
    }
}

impl<'a> IntoIterator for &'a RawMemoryMap {
    type Item = EfiMemoryDescriptor;
    type IntoIter = Descriptors<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the descriptors of a map, by value.
#[derive(Debug, Clone)]
pub struct Descriptors<'a> {
    map: &'a RawMemoryMap,
    front: usize,
    back: usize,
}

impl Iterator for Descriptors<'_> {
    type Item = EfiMemoryDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        let desc = self.map.get(self.front);
        self.front += 1;
        desc
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for Descriptors<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        self.map.get(self.back)
    }
}

impl ExactSizeIterator for Descriptors<'_> {}

impl FusedIterator for Descriptors<'_> {}

// ── Owned map ────────────────────────────────────────────────────────

/// A memory map in pool memory, freed on drop.
///
/// Dereferences to [`RawMemoryMap`] for access to the descriptors.
pub struct MemoryMap<'s, S: MemoryServices + ?Sized> {
    raw: RawMemoryMap,
    buffer: Option<PoolBuffer<'s, S>>,
}

impl<'s, S: MemoryServices + ?Sized> MemoryMap<'s, S> {
    /// A map with no descriptors and no buffer.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            raw: RawMemoryMap::empty(),
            buffer: None,
        }
    }

    /// Acquires the map with the default configuration.
    ///
    /// Failures are logged and produce the empty map; check
    /// [`is_empty`](RawMemoryMap::is_empty) before use.
    #[must_use]
    pub fn acquire(services: &'s S) -> Self {
        match Self::try_acquire(services, &MemoryMapConfig::DEFAULT) {
            Ok(map) => map,
            Err(error) => {
                warn!("memory map unavailable: {error}");
                Self::empty()
            }
        }
    }

    /// Acquires the map.
    ///
    /// # Errors
    ///
    /// - [`MemoryMapError::Allocation`] if the pool cannot supply the buffer.
    /// - [`MemoryMapError::MapGrew`] if the map outgrew the buffer on every
    ///   attempt.
    /// - [`MemoryMapError::Firmware`] for any other `GetMemoryMap` failure.
    /// - [`MemoryMapError::BadDescriptorSize`], [`MemoryMapError::RaggedMap`],
    ///   or [`MemoryMapError::Overrun`] if the result is malformed.
    ///
    /// No buffer outlives a failed acquisition.
    pub fn try_acquire(services: &'s S, config: &MemoryMapConfig) -> Result<Self, MemoryMapError> {
        let mut size = 0;
        let mut map_key = 0;
        let mut descriptor_size = 0;
        let mut descriptor_version = 0;

        // SAFETY: null buffer with zero size.
        let status = unsafe {
            services.get_memory_map(
                &mut size,
                ptr::null_mut(),
                &mut map_key,
                &mut descriptor_size,
                &mut descriptor_version,
            )
        };
        trace!("memory map probe: {status}, {size} bytes, descriptor size {descriptor_size}");

        let max_attempts = config.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let capacity = size.saturating_add(config.slack_entries.saturating_mul(descriptor_size));
            let buffer = PoolBuffer::allocate(services, config.pool_type, capacity)?;

            size = capacity;
            // SAFETY: `buffer` is valid for writes of `capacity` bytes.
            let status = unsafe {
                services.get_memory_map(
                    &mut size,
                    buffer.ptr.as_ptr(),
                    &mut map_key,
                    &mut descriptor_size,
                    &mut descriptor_version,
                )
            };

            if status == EfiStatus::BUFFER_TOO_SMALL {
                warn!(
                    "memory map grew to {size} bytes past a {capacity}-byte buffer \
                     (attempt {attempt} of {max_attempts})"
                );
                continue;
            }
            status.to_result().map_err(MemoryMapError::Firmware)?;
            validate(size, descriptor_size, capacity)?;

            // SAFETY: the firmware wrote `size <= capacity` bytes into the
            // buffer, which lives as long as `self.buffer`.
            let raw = unsafe {
                RawMemoryMap::from_raw_parts(
                    buffer.ptr.as_ptr(),
                    size,
                    descriptor_size,
                    descriptor_version,
                    map_key,
                )
            };
            debug!(
                "memory map: {} descriptors of {descriptor_size} bytes, version {descriptor_version}, key {map_key:#x}",
                raw.len()
            );
            return Ok(Self {
                raw,
                buffer: Some(buffer),
            });
        }

        Err(MemoryMapError::MapGrew {
            attempts: max_attempts,
        })
    }

    /// Re-reads the map into the existing buffer, renewing the key.
    ///
    /// Neither allocates nor logs, so it is safe to call between failed
    /// `ExitBootServices` attempts. On error the previous snapshot is kept.
    ///
    /// # Errors
    ///
    /// [`MemoryMapError::NoBuffer`] for the empty map,
    /// [`MemoryMapError::Firmware`] if the map no longer fits or the call
    /// fails, or a validation error.
    pub fn refresh(&mut self) -> Result<(), MemoryMapError> {
        let buffer = self.buffer.as_ref().ok_or(MemoryMapError::NoBuffer)?;

        let mut size = buffer.capacity;
        let mut map_key = 0;
        let mut descriptor_size = 0;
        let mut descriptor_version = 0;
        // SAFETY: the buffer is valid for writes of `capacity` bytes.
        let status = unsafe {
            buffer.services.get_memory_map(
                &mut size,
                buffer.ptr.as_ptr(),
                &mut map_key,
                &mut descriptor_size,
                &mut descriptor_version,
            )
        };
        status.to_result().map_err(MemoryMapError::Firmware)?;
        validate(size, descriptor_size, buffer.capacity)?;

        // SAFETY: as in `try_acquire`.
        self.raw = unsafe {
            RawMemoryMap::from_raw_parts(
                buffer.ptr.as_ptr(),
                size,
                descriptor_size,
                descriptor_version,
                map_key,
            )
        };
        Ok(())
    }

    /// Gives up ownership of the buffer.
    ///
    /// The pool memory is never freed, which is what a map handed across
    /// `ExitBootServices` needs.
    #[must_use]
    pub fn into_raw(self) -> RawMemoryMap {
        let Self { raw, buffer } = self;
        if let Some(buffer) = buffer {
            buffer.leak();
        }
        raw
    }
}

impl<S: MemoryServices + ?Sized> Deref for MemoryMap<'_, S> {
    type Target = RawMemoryMap;

    fn deref(&self) -> &RawMemoryMap {
        &self.raw
    }
}

impl<S: MemoryServices + ?Sized> fmt::Debug for MemoryMap<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMap")
            .field("raw", &self.raw)
            .field("owned", &self.buffer.is_some())
            .finish()
    }
}
