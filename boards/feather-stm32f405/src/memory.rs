//! Free-memory probe for the queue eviction policy
//!
//! There is no heap; what the queues compete with is the stack, which
//! grows down toward the end of static data. Free memory is the distance
//! between the two, capped at the configured budget.

#![allow(unsafe_code)] // Required for the linker symbol

use hal_abstractions::MemoryProbe;

extern "C" {
    /// First address past `.bss`, provided by cortex-m-rt's link.x
    static __sheap: u8;
}

pub struct StackHeadroom {
    budget: usize,
}

impl StackHeadroom {
    pub const fn new(budget: usize) -> Self {
        Self { budget }
    }
}

impl MemoryProbe for StackHeadroom {
    fn free_bytes(&self) -> usize {
        // SAFETY: only the address of the symbol is taken, never its value
        let static_end = unsafe { core::ptr::addr_of!(__sheap) } as usize;
        let sp = cortex_m::register::msp::read() as usize;
        sp.saturating_sub(static_end).min(self.budget)
    }
}
