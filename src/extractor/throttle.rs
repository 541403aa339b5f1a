// src/extractor/throttle.rs

use log::debug;
use std::time::Duration;
use tokio::{sync::Mutex as TokioMutex, time::Instant};

/// 单个提取器实例内的最小调用间隔，不在实例之间共享。
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_call: TokioMutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: TokioMutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 距上次调用不足 `min_interval` 时先等待，然后记录本次调用时间
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(prev) = *last_call {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                debug!("限速: 等待 {:?}", remaining);
                tokio::time::sleep(remaining).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
