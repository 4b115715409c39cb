use crate::sim_if::SIM_IF;
use crate::trigger::Trigger;
use crate::TbResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimObject {
    pub(crate) handle: usize,
    pub(crate) kind: ObjectKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    // bit vector of the given width
    Int(u32),
    Hier,
}

impl SimObject {
    pub fn handle(&self) -> usize {
        self.handle
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> TbResult<String> {
        SIM_IF.get_full_name(self)
    }

    pub fn size(&self) -> Option<u32> {
        match self.kind {
            ObjectKind::Int(size) => Some(size),
            ObjectKind::Hier => None,
        }
    }

    pub fn get_root() -> TbResult<Self> {
        SIM_IF.get_root_object()
    }

    /// Child object by its name relative to this one, e.g. `dut.c("clk")`.
    pub fn c(&self, name: &str) -> TbResult<Self> {
        let mut child_name = self.name()?;
        child_name.push('.');
        child_name.push_str(name);
        SIM_IF.get_object_by_name(&child_name)
    }

    pub fn u32(&self) -> TbResult<u32> {
        // values are masked to the signal width, which is at most 32 for integer access
        SIM_IF.get_value(self).map(|v| v as u32)
    }

    pub fn u64(&self) -> TbResult<u64> {
        SIM_IF.get_value(self)
    }

    /// Schedules a write. The new value is visible after the current delta cycle.
    pub fn set_u32(&self, val: u32) -> TbResult<()> {
        SIM_IF.set_value(self, u64::from(val))
    }

    pub fn set_u64(&self, val: u64) -> TbResult<()> {
        SIM_IF.set_value(self, val)
    }

    // convenience functions to get edge triggers for this signal
    pub fn rising_edge(self) -> Trigger {
        Trigger::rising_edge(self)
    }
    pub fn falling_edge(self) -> Trigger {
        Trigger::falling_edge(self)
    }
    pub fn edge(self) -> Trigger {
        Trigger::edge(self)
    }
}
