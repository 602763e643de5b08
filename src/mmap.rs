//! Mapping hardware-owned buffers into a user address space.
//!
//! Buffers stay permanently mapped for the whole session; copying a received
//! buffer out before the hardware reuses it is the application's job. Each
//! granted mapping bumps a per-session counter that the hardware layer uses
//! to pick the buffer area backing the next request.

use core::sync::atomic::{AtomicUsize, Ordering};

use memory_addr::{PhysAddr, VirtAddrRange, is_aligned};

use crate::config::MsgLevel;
use crate::error::{NicResult, nic_err};
use crate::ops::{AddressSpace, UserCaps, UserOps};

/// A granted mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRegion {
    /// Position of this mapping within the session.
    pub index: usize,
    /// User virtual range.
    pub range: VirtAddrRange,
    /// Physical base backing the range.
    pub paddr: PhysAddr,
}

/// Validates and installs buffer mappings.
pub struct MappingService {
    /// Mappings granted in the current session.
    mapped: AtomicUsize,
    page_size: usize,
}

impl MappingService {
    /// Creates a service requiring `page_size` alignment.
    pub const fn new(page_size: usize) -> Self {
        Self {
            mapped: AtomicUsize::new(0),
            page_size,
        }
    }

    /// Number of mappings granted in this session.
    pub fn mapped_count(&self) -> usize {
        self.mapped.load(Ordering::Acquire)
    }

    /// Forgets the mappings of the previous session.
    pub fn reset(&self) {
        self.mapped.store(0, Ordering::Release);
    }

    /// Maps the buffer area selected by the hardware layer at `range`.
    ///
    /// Both ends of `range` must be page aligned. A request reserves the next
    /// slot before calling into the hardware layer and the address space, so
    /// concurrent requests never share a slot hint and no lock is held while
    /// `remap` runs. A failed request gives its slot back unless a later one
    /// already claimed the slot after it.
    pub fn map<A: AddressSpace + ?Sized>(
        &self,
        range: VirtAddrRange,
        ops: &dyn UserOps,
        aspace: &mut A,
        msg_level: MsgLevel,
    ) -> NicResult<MappedRegion> {
        if !is_aligned(range.start.as_usize(), self.page_size)
            || !is_aligned(range.end.as_usize(), self.page_size)
        {
            return nic_err!(
                InvalidArgument,
                "not aligned vaddrs (vm_start={:#x} vm_end={:#x})",
                range.start.as_usize(),
                range.end.as_usize()
            );
        }
        if range.is_empty() {
            return nic_err!(InvalidArgument, "empty mapping request");
        }
        if !ops.capabilities().contains(UserCaps::MMAP) {
            return nic_err!(InvalidArgument, "hardware layer cannot resolve buffer pages");
        }

        let size = range.size();
        let index = self.mapped.fetch_add(1, Ordering::AcqRel);
        let result = match ops.resolve_page(size, index) {
            Some(paddr) => aspace
                .remap(range.start, paddr, size)
                .map(|_| paddr)
                .map_err(Into::into),
            None => nic_err!(InvalidArgument, "failed to get pfn (nr_user_mmap={})", index),
        };

        if msg_level.contains(MsgLevel::DRV) {
            debug!(
                "mmapped [{}] result={:?} va={:#x} size={}",
                index,
                result,
                range.start.as_usize(),
                size
            );
        }
        match result {
            Ok(paddr) => Ok(MappedRegion {
                index,
                range,
                paddr,
            }),
            Err(err) => {
                let _ = self.mapped.compare_exchange(
                    index + 1,
                    index,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::error::NicError;
    use axerrno::{AxError, AxResult, ax_err};
    use memory_addr::{PAGE_SIZE_4K, VirtAddr};
    use std::vec::Vec;

    struct Buffers {
        caps: UserCaps,
    }

    impl UserOps for Buffers {
        fn capabilities(&self) -> UserCaps {
            self.caps
        }

        fn resolve_page(&self, size: usize, slot_hint: usize) -> Option<PhysAddr> {
            // Two buffer areas, each at most 4 pages
            if slot_hint >= 2 || size > 4 * PAGE_SIZE_4K {
                return None;
            }
            Some(PhysAddr::from(0x4000_0000 + slot_hint * 0x10_0000))
        }
    }

    #[derive(Default)]
    struct Space {
        maps: Vec<(VirtAddr, PhysAddr, usize)>,
        fail: bool,
    }

    impl AddressSpace for Space {
        fn remap(&mut self, vaddr: VirtAddr, paddr: PhysAddr, size: usize) -> AxResult {
            if self.fail {
                return ax_err!(NoMemory);
            }
            self.maps.push((vaddr, paddr, size));
            Ok(())
        }
    }

    fn range(start: usize, size: usize) -> VirtAddrRange {
        VirtAddrRange::from_start_size(VirtAddr::from(start), size)
    }

    fn mmap_ops() -> Buffers {
        Buffers {
            caps: UserCaps::MMAP,
        }
    }

    #[test]
    fn test_map_uses_counter_as_hint() {
        let svc = MappingService::new(PAGE_SIZE_4K);
        let ops = mmap_ops();
        let mut space = Space::default();

        let r0 = svc.map(range(0x10000, 0x2000), &ops, &mut space, MsgLevel::DRV).unwrap();
        let r1 = svc.map(range(0x20000, 0x1000), &ops, &mut space, MsgLevel::empty()).unwrap();
        assert_eq!(r0.index, 0);
        assert_eq!(r1.index, 1);
        assert_eq!(r1.paddr, PhysAddr::from(0x4010_0000));
        assert_eq!(svc.mapped_count(), 2);
        assert_eq!(space.maps.len(), 2);
        assert_eq!(space.maps[0].2, 0x2000);

        // Out of buffer areas
        assert_eq!(
            svc.map(range(0x30000, 0x1000), &ops, &mut space, MsgLevel::empty()),
            Err(NicError::InvalidArgument)
        );
        assert_eq!(svc.mapped_count(), 2);

        svc.reset();
        assert_eq!(svc.mapped_count(), 0);
    }

    #[test]
    fn test_map_rejects_misaligned() {
        let svc = MappingService::new(PAGE_SIZE_4K);
        let ops = mmap_ops();
        let mut space = Space::default();

        assert_eq!(
            svc.map(range(0x10010, 0x1000), &ops, &mut space, MsgLevel::empty()),
            Err(NicError::InvalidArgument)
        );
        assert_eq!(
            svc.map(range(0x10000, 0x800), &ops, &mut space, MsgLevel::empty()),
            Err(NicError::InvalidArgument)
        );
        assert_eq!(svc.mapped_count(), 0);
        assert!(space.maps.is_empty());
    }

    #[test]
    fn test_map_requires_capability() {
        let svc = MappingService::new(PAGE_SIZE_4K);
        let ops = Buffers {
            caps: UserCaps::empty(),
        };
        let mut space = Space::default();
        assert_eq!(
            svc.map(range(0x10000, 0x1000), &ops, &mut space, MsgLevel::empty()),
            Err(NicError::InvalidArgument)
        );
    }

    #[test]
    fn test_remap_failure_keeps_counter() {
        let svc = MappingService::new(PAGE_SIZE_4K);
        let ops = mmap_ops();
        let mut space = Space {
            fail: true,
            ..Default::default()
        };
        assert_eq!(
            svc.map(range(0x10000, 0x1000), &ops, &mut space, MsgLevel::empty()),
            Err(NicError::Collaborator(AxError::NoMemory))
        );
        assert_eq!(svc.mapped_count(), 0);
    }

    /// Issues a second mapping from inside `remap`, as a page-table walk
    /// racing with another request would.
    struct Nested<'a> {
        svc: &'a MappingService,
        ops: &'a Buffers,
        inner: Option<NicResult<MappedRegion>>,
    }

    impl AddressSpace for Nested<'_> {
        fn remap(&mut self, _vaddr: VirtAddr, _paddr: PhysAddr, _size: usize) -> AxResult {
            let mut space = Space::default();
            self.inner = Some(self.svc.map(
                range(0x40000, 0x1000),
                self.ops,
                &mut space,
                MsgLevel::empty(),
            ));
            Ok(())
        }
    }

    #[test]
    fn test_remap_runs_unlocked_with_distinct_slots() {
        let svc = MappingService::new(PAGE_SIZE_4K);
        let ops = mmap_ops();
        let mut nested = Nested {
            svc: &svc,
            ops: &ops,
            inner: None,
        };

        let outer = svc
            .map(range(0x10000, 0x1000), &ops, &mut nested, MsgLevel::empty())
            .unwrap();
        let inner = nested.inner.unwrap().unwrap();
        assert_eq!(outer.index, 0);
        assert_eq!(inner.index, 1);
        assert_ne!(outer.paddr, inner.paddr);
        assert_eq!(svc.mapped_count(), 2);
    }
}
