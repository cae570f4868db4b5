// CPU 负载片段：在固定的墙钟时间内反复做平方根运算，不产生任何有用结果。
use crate::config::LoadConfig;
use std::hint::black_box;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyTaskSettings {
    pub slice: Duration,
    pub iterations_per_round: u64,
}

impl BusyTaskSettings {
    pub fn new(slice: Duration, iterations_per_round: u64) -> Self {
        Self {
            slice,
            iterations_per_round: iterations_per_round.max(1),
        }
    }
}

impl Default for BusyTaskSettings {
    fn default() -> Self {
        Self::from(&LoadConfig::default())
    }
}

impl From<&LoadConfig> for BusyTaskSettings {
    fn from(config: &LoadConfig) -> Self {
        Self::new(config.slice(), config.iterations_per_round)
    }
}

/// 占用 CPU 约 `settings.slice` 时长，返回完成的轮数。
///
/// 每轮结束才检查时间，因此实际耗时会略超过 `slice`（不超过一轮）。
pub fn burn_cpu(settings: &BusyTaskSettings) -> u64 {
    let end = Instant::now() + settings.slice;
    let mut rounds = 0u64;
    while Instant::now() < end {
        for i in 0..settings.iterations_per_round {
            black_box((i as f64).sqrt());
        }
        rounds += 1;
    }
    rounds
}
