use std::time::Duration;

use crashsim_ingest_core::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Constant simulated speed for the whole run (km/h)
    pub speed_kmh: f64,
    pub scenario: Scenario,
    /// Only consulted for `Scenario::Accident`
    pub collision: Option<CollisionType>,
    /// Nominal publish period
    pub tick: Duration,
    /// Fixed seed for reproducible noise; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            speed_kmh: 0.0,
            scenario: Scenario::Urban,
            collision: None,
            tick: DEFAULT_TICK,
            seed: None,
        }
    }
}

/// Draws one sample from `profile` at `elapsed_s` seconds into a run.
pub fn generate<R: Rng + ?Sized>(elapsed_s: f64, speed_kmh: f64, profile: &Profile, rng: &mut R) -> Sample {
    let accel_n: f64 = StandardNormal.sample(rng);
    let gyro_n: f64 = StandardNormal.sample(rng);
    Sample {
        elapsed_s,
        speed_kmh,
        acceleration: speed_kmh / profile.divisor + accel_n * profile.accel_noise,
        gyroscope: gyro_n * profile.gyro_noise,
        gps: profile.gps.to_string(),
    }
}

/// Profile-bound sample generator with its own noise source.
pub struct Generator {
    speed_kmh: f64,
    profile: Profile,
    rng: StdRng,
}

impl Generator {
    pub fn new(cfg: &SyntheticConfig) -> Result<Self, IngestError> {
        let profile = resolve_profile(cfg.scenario, cfg.collision)?;
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self { speed_kmh: cfg.speed_kmh, profile, rng })
    }

    pub fn generate(&mut self, elapsed_s: f64) -> Sample {
        generate(elapsed_s, self.speed_kmh, &self.profile, &mut self.rng)
    }
}

pub struct SyntheticSource { cfg: SyntheticConfig }
impl SyntheticSource { pub fn new(cfg: SyntheticConfig) -> Self { Self { cfg } } }

#[async_trait::async_trait]
impl TelemetrySource for SyntheticSource {
    async fn run(&self, tx: TelemetryTx, mut shutdown: ShutdownRx) -> Result<(), IngestError> {
        let mut gen = Generator::new(&self.cfg)?;
        let started = Instant::now();

        let mut ticker = time::interval(self.cfg.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            scenario = %self.cfg.scenario,
            collision = ?self.cfg.collision,
            speed_kmh = self.cfg.speed_kmh,
            tick_ms = self.cfg.tick.as_millis() as u64,
            "synthetic source started"
        );

        let mut published = 0u64;
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    // sender gone counts as stop
                    if changed.is_err() || *shutdown.borrow() { break; }
                }
                _ = ticker.tick() => {
                    if *shutdown.borrow() { break; }
                    let sample = gen.generate(started.elapsed().as_secs_f64());
                    trace!(elapsed_s = sample.elapsed_s, acceleration = sample.acceleration, "publish");
                    tx.send(sample).map_err(|_| IngestError::ChannelClosed)?;
                    published += 1;
                }
            }
        }

        debug!(published, "synthetic source stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(scenario: Scenario, collision: Option<CollisionType>) -> SyntheticConfig {
        SyntheticConfig { speed_kmh: 50.0, scenario, collision, seed: Some(7), ..Default::default() }
    }

    #[test]
    fn gps_label_is_fixed_per_profile() {
        let mut pairs: Vec<(Scenario, Option<CollisionType>)> = vec![
            (Scenario::Urban, None),
            (Scenario::Highway, None),
            (Scenario::OffRoad, None),
        ];
        pairs.extend(CollisionType::ALL.into_iter().map(|c| (Scenario::Accident, Some(c))));

        for (scenario, collision) in pairs {
            let mut gen = Generator::new(&config(scenario, collision)).unwrap();
            let expected = resolve_profile(scenario, collision).unwrap().gps;
            for i in 0..20 {
                let s = gen.generate(i as f64 * 0.1);
                assert_eq!(s.gps, expected);
                assert_eq!(s.speed_kmh, 50.0);
                assert_eq!(s.elapsed_s, i as f64 * 0.1);
            }
        }
    }

    #[test]
    fn accident_without_collision_is_unknown_profile() {
        let err = Generator::new(&config(Scenario::Accident, None)).err().unwrap();
        assert!(matches!(err, IngestError::UnknownProfile { .. }));
    }

    #[test]
    fn same_seed_same_noise() {
        let mut a = Generator::new(&config(Scenario::OffRoad, None)).unwrap();
        let mut b = Generator::new(&config(Scenario::OffRoad, None)).unwrap();
        for i in 0..10 {
            assert_eq!(a.generate(i as f64), b.generate(i as f64));
        }
    }

    #[test]
    fn acceleration_centres_on_linear_model() {
        let mut gen = Generator::new(&config(Scenario::Highway, None)).unwrap();
        let n = 20_000;
        let (mut acc, mut gyro) = (0.0, 0.0);
        for _ in 0..n {
            let s = gen.generate(0.0);
            acc += s.acceleration;
            gyro += s.gyroscope;
        }
        // 50 / 5 = 10, noise sd 0.2 and 2.0
        assert!((acc / n as f64 - 10.0).abs() < 0.05);
        assert!((gyro / n as f64).abs() < 0.1);
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_once_per_tick_until_shutdown() {
        let (tx, rx) = channel();
        let (stop_tx, stop_rx) = shutdown_channel();
        let src = SyntheticSource::new(config(Scenario::Highway, None));
        let task = tokio::spawn(async move { src.run(tx, stop_rx).await });

        time::sleep(Duration::from_millis(450)).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        let samples: Vec<Sample> = rx.try_iter().collect();
        assert_eq!(samples.len(), 5);
        assert!(samples.windows(2).all(|w| w[0].elapsed_s < w[1].elapsed_s));

        // nothing trickles in after the task is done
        time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_consumer_ends_run() {
        let (tx, rx) = channel();
        let (_stop_tx, stop_rx) = shutdown_channel();
        drop(rx);
        let src = SyntheticSource::new(config(Scenario::Urban, None));
        let err = src.run(tx, stop_rx).await.unwrap_err();
        assert!(matches!(err, IngestError::ChannelClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn bad_profile_fails_before_publishing() {
        let (tx, rx) = channel();
        let (_stop_tx, stop_rx) = shutdown_channel();
        let src = SyntheticSource::new(config(Scenario::Accident, None));
        assert!(src.run(tx, stop_rx).await.is_err());
        assert!(rx.try_recv().is_err());
    }
}
