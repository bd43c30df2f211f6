//! Random station readings for when no live feed is available.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;

use super::{SensorError, SensorFeed, SensorSample};

/// Uniform random values over typical urban ranges.
#[derive(Debug, Clone, Default)]
pub struct SimulatedFeed;

impl SimulatedFeed {
    pub fn new() -> Self {
        Self
    }

    pub fn sample(&self) -> SensorSample {
        let mut rng = rand::thread_rng();
        SensorSample {
            timestamp: Utc::now(),
            pm25: rng.gen_range(15.0..70.0),
            pm10: rng.gen_range(30.0..100.0),
            no2: rng.gen_range(30.0..80.0),
            co: rng.gen_range(2.0..8.0),
            temperature: Some(rng.gen_range(18.0..28.0)),
        }
    }
}

#[async_trait]
impl SensorFeed for SimulatedFeed {
    async fn latest(&self) -> Result<SensorSample, SensorError> {
        Ok(self.sample())
    }

    fn feed_name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_ranges() {
        let feed = SimulatedFeed::new();
        for _ in 0..100 {
            let s = feed.sample();
            assert!((15.0..70.0).contains(&s.pm25));
            assert!((30.0..100.0).contains(&s.pm10));
            assert!((30.0..80.0).contains(&s.no2));
            assert!((2.0..8.0).contains(&s.co));
        }
    }

    #[test]
    fn test_feed_never_fails() {
        let feed = SimulatedFeed::new();
        let sample = tokio_test::block_on(feed.latest()).unwrap();
        assert_eq!(feed.feed_name(), "simulated");
        assert!(sample.temperature.is_some());
    }
}
