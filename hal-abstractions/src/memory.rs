//! Free-memory probe used by the queue eviction policy

pub trait MemoryProbe {
    /// Bytes currently available to the application
    fn free_bytes(&self) -> usize;
}

impl<T: MemoryProbe + ?Sized> MemoryProbe for &T {
    fn free_bytes(&self) -> usize {
        (**self).free_bytes()
    }
}
