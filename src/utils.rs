use crate::prelude::*;

pub async fn clock_cycles(signal: SimObject, n_cycles: u32) -> TbResult {
    for _ in 0..n_cycles {
        signal.rising_edge().await?;
    }
    Ok(())
}

pub async fn falling_edges(signal: SimObject, n_edges: u32) -> TbResult {
    for _ in 0..n_edges {
        signal.falling_edge().await?;
    }
    Ok(())
}
