use tracing::error;

use crate::{Error, Result};

/// Slot index into a descriptor heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorIndex(pub u32);

/// CPU-visible descriptor address, used when writing views into a heap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CpuDescriptor(pub usize);

/// GPU-visible descriptor address, used when binding descriptor tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct GpuDescriptor(pub u64);

/// Location and stride of a descriptor heap, as reported by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorHeapLayout {
    pub cpu_start: CpuDescriptor,
    /// Zero for heaps that are not shader-visible.
    pub gpu_start: GpuDescriptor,
    pub increment: u32,
    pub capacity: u32,
}

impl DescriptorHeapLayout {
    #[must_use]
    pub fn cpu(&self, index: DescriptorIndex) -> CpuDescriptor {
        CpuDescriptor(self.cpu_start.0 + self.increment as usize * index.0 as usize)
    }

    #[must_use]
    pub fn gpu(&self, index: DescriptorIndex) -> GpuDescriptor {
        GpuDescriptor(self.gpu_start.0 + u64::from(self.increment) * u64::from(index.0))
    }
}

/// Bump allocator over the shader-visible SRV heap.
///
/// Slots are handed out in order and never returned. The first `reserved`
/// slots belong to an external collaborator (the debug UI's font atlas lives
/// in slot 0) and are never handed out.
pub struct DescriptorAllocator {
    layout: DescriptorHeapLayout,
    reserved: u32,
    next: u32,
}

impl DescriptorAllocator {
    /// Fails if the reserved slots alone do not fit in the heap.
    pub fn new(layout: DescriptorHeapLayout, reserved: u32) -> Result<Self> {
        if reserved > layout.capacity {
            return Err(Error::DescriptorHeapExhausted {
                used: reserved,
                capacity: layout.capacity,
            });
        }

        Ok(Self {
            layout,
            reserved,
            next: reserved,
        })
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> &DescriptorHeapLayout {
        &self.layout
    }

    /// Total number of slots in use, reserved slots included.
    #[inline]
    #[must_use]
    pub fn used(&self) -> u32 {
        self.next
    }

    #[inline]
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.layout.capacity
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.layout.capacity - self.next
    }

    /// One of the slots set aside at construction.
    #[must_use]
    pub fn reserved(&self, n: u32) -> Option<DescriptorIndex> {
        (n < self.reserved).then_some(DescriptorIndex(n))
    }

    /// Fails if the heap has no free slot left. Lets callers bail out before
    /// doing expensive work whose result could not be bound anyway.
    pub fn ensure_available(&self) -> Result<()> {
        if self.next < self.layout.capacity {
            Ok(())
        } else {
            error!("SRV limit exceeded ({}/{})", self.next, self.layout.capacity);
            Err(Error::DescriptorHeapExhausted {
                used: self.next,
                capacity: self.layout.capacity,
            })
        }
    }

    pub fn allocate(&mut self) -> Result<DescriptorIndex> {
        self.ensure_available()?;
        let index = DescriptorIndex(self.next);
        self.next += 1;
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: DescriptorHeapLayout = DescriptorHeapLayout {
        cpu_start: CpuDescriptor(0x1000),
        gpu_start: GpuDescriptor(0x8000_0000),
        increment: 32,
        capacity: 4,
    };

    #[test]
    fn handles() {
        assert_eq!(LAYOUT.cpu(DescriptorIndex(0)), CpuDescriptor(0x1000));
        assert_eq!(LAYOUT.cpu(DescriptorIndex(3)), CpuDescriptor(0x1000 + 96));
        assert_eq!(LAYOUT.gpu(DescriptorIndex(2)), GpuDescriptor(0x8000_0000 + 64));
    }

    #[test]
    fn exhaustion() {
        let mut allocator = DescriptorAllocator::new(LAYOUT, 1).unwrap();

        assert_eq!(allocator.reserved(0), Some(DescriptorIndex(0)));
        assert_eq!(allocator.reserved(1), None);

        assert_eq!(allocator.allocate().unwrap(), DescriptorIndex(1));
        assert_eq!(allocator.allocate().unwrap(), DescriptorIndex(2));
        assert_eq!(allocator.allocate().unwrap(), DescriptorIndex(3));
        assert_eq!(allocator.remaining(), 0);

        // Exhaustion is sticky and never wraps around into used slots.
        for _ in 0..3 {
            assert!(matches!(
                allocator.allocate(),
                Err(Error::DescriptorHeapExhausted {
                    used: 4,
                    capacity: 4
                })
            ));
        }
        assert_eq!(allocator.used(), 4);
    }

    #[test]
    fn reserving_more_than_the_heap_fails() {
        assert!(matches!(
            DescriptorAllocator::new(LAYOUT, 5),
            Err(Error::DescriptorHeapExhausted {
                used: 5,
                capacity: 4
            })
        ));

        // Reserving the whole heap is allowed; nothing is left to hand out.
        let mut allocator = DescriptorAllocator::new(LAYOUT, 4).unwrap();
        assert_eq!(allocator.remaining(), 0);
        assert!(allocator.allocate().is_err());
    }
}
