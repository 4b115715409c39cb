use crate::prelude::*;

/*
 * CLOCK
 */
pub async fn clock(clk: SimObject, period: u64, unit: TimeUnit) -> TbResult {
    let high_t = period / 2;
    let low_t = period - high_t;
    if period % 2 != 0 {
        SIM_IF.log(&format!(
            "Warning: Clock period {period}{unit} not dividable by 2. High time will be {high_t}{unit}; low time will be {low_t}{unit}."
        ));
    }
    if high_t == 0 {
        return Err(TbError::Config(format!("clock period {}{} is too short", period, unit)));
    }
    loop {
        clk.set_u32(0)?;
        Trigger::timer(low_t, unit).await?;
        clk.set_u32(1)?;
        Trigger::timer(high_t, unit).await?;
    }
}
