use std::fmt;
use std::str::FromStr;

use crate::native::NativeSim;
use crate::signal::SimObject;
use crate::{TbError, TbResult};
use lazy_static::lazy_static;

lazy_static! {
    pub static ref SIM_IF: Box<dyn SimIf + Sync> = new_interface();
}

fn new_interface() -> Box<dyn SimIf + Sync> {
    Box::new(NativeSim)
}

#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    // relative delay in sim steps when registering, absolute time when reacting
    Time(u64),
    Edge(usize),
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Fs,
    Ps,
    Ns,
    Us,
    Ms,
    Sec,
}

impl TimeUnit {
    fn exponent(self) -> i8 {
        match self {
            TimeUnit::Fs => -15,
            TimeUnit::Ps => -12,
            TimeUnit::Ns => -9,
            TimeUnit::Us => -6,
            TimeUnit::Ms => -3,
            TimeUnit::Sec => 0,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeUnit::Fs => "fs",
            TimeUnit::Ps => "ps",
            TimeUnit::Ns => "ns",
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
            TimeUnit::Sec => "sec",
        };
        f.write_str(s)
    }
}

impl FromStr for TimeUnit {
    type Err = TbError;

    fn from_str(s: &str) -> TbResult<Self> {
        match s {
            "fs" => Ok(TimeUnit::Fs),
            "ps" => Ok(TimeUnit::Ps),
            "ns" => Ok(TimeUnit::Ns),
            "us" => Ok(TimeUnit::Us),
            "ms" => Ok(TimeUnit::Ms),
            "sec" => Ok(TimeUnit::Sec),
            _ => Err(TbError::Config(format!("unknown time unit '{}'", s))),
        }
    }
}

pub trait SimIf {
    fn set_value(&self, obj: &SimObject, value: u64) -> TbResult<()>;
    fn get_value(&self, obj: &SimObject) -> TbResult<u64>;
    fn get_object_by_name(&self, name: &str) -> TbResult<SimObject>;
    fn get_root_object(&self) -> TbResult<SimObject>;
    fn get_full_name(&self, obj: &SimObject) -> TbResult<String>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn log(&self, msg: &str);
    fn register_callback(&self, cb: SimCallback) -> TbResult<usize>;
    fn cancel_callback(&self, cb_hdl: usize) -> TbResult<()>;

    fn get_sim_time(&self, unit: TimeUnit) -> f64 {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        ldexp10(t, self.get_sim_precision() - unit.exponent())
    }
    fn get_sim_steps(&self, time: u64, unit: TimeUnit) -> TbResult<u64> {
        let exp = unit.exponent() - self.get_sim_precision();
        if exp < 0 {
            return Err(TbError::Config(format!(
                "can't convert {}{} to sim steps without rounding",
                time, unit
            )));
        }
        10_u64
            .checked_pow(exp as u32)
            .and_then(|scale| time.checked_mul(scale))
            .ok_or_else(|| TbError::Config(format!("{}{} overflows the sim time", time, unit)))
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}
