//! Boundary to the device under test.
//!
//! The testbench only ever touches the device through its signals. A [`Device`] is the
//! behavioral stand-in for the RTL an HDL simulator would elaborate: it declares its ports
//! and is evaluated on every rising edge of its clock.

use crate::TbResult;

pub use crate::native::PortIo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Port {
    pub name: &'static str,
    pub width: u32,
}

impl Port {
    pub const fn new(name: &'static str, width: u32) -> Self {
        Port { name, width }
    }
}

pub trait Device {
    /// Instance name, used as the root scope of all port names.
    fn name(&self) -> &str;
    fn ports(&self) -> Vec<Port>;
    fn clock(&self) -> &str {
        "clk"
    }
    fn on_rising_edge(&mut self, io: &mut PortIo<'_>) -> TbResult<()>;
}
