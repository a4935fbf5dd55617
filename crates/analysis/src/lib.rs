use model::Sample;
use serde::Serialize;

/// Everything a chart backend needs for one redraw.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct ChartFrame {
    pub speed: Series,
    pub acceleration: Series,
    pub gyroscope: Series,
    /// One marker per buffered sample, plotted against its index.
    pub gps: Vec<GpsMark>,
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct Series {
    pub title: &'static str,
    pub unit: &'static str,
    /// `[elapsed_s, value]` pairs in arrival order
    pub points: Vec<[f64; 2]>,
    pub stats: Option<ChannelStats>,
}

#[derive(Clone, Copy, Serialize, Debug, PartialEq)]
pub struct ChannelStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct GpsMark {
    pub index: usize,
    pub label: String,
}

impl ChartFrame {
    pub fn empty() -> Self {
        chart_frame(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.gps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.gps.len()
    }

    /// Time span covered by the frame, `None` when empty.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        let first = self.speed.points.first()?;
        let last = self.speed.points.last()?;
        Some((first[0], last[0]))
    }
}

pub fn chart_frame(samples: &[Sample]) -> ChartFrame {
    ChartFrame {
        speed: series("Speed", "km/h", samples, |s| s.speed_kmh),
        acceleration: series("Acceleration", "m/s^2", samples, |s| s.acceleration),
        gyroscope: series("Gyroscope", "deg/s", samples, |s| s.gyroscope),
        gps: samples
            .iter()
            .enumerate()
            .map(|(index, s)| GpsMark { index, label: s.gps.clone() })
            .collect(),
    }
}

fn series(title: &'static str, unit: &'static str, samples: &[Sample], f: impl Fn(&Sample) -> f64) -> Series {
    let points: Vec<[f64; 2]> = samples.iter().map(|s| [s.elapsed_s, f(s)]).collect();
    let stats = stats_of(points.iter().map(|p| p[1]));
    Series { title, unit, points, stats }
}

fn stats_of(values: impl Iterator<Item = f64>) -> Option<ChannelStats> {
    let (mut min, mut max, mut sum, mut n) = (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize);
    for v in values {
        if v < min { min = v; }
        if v > max { max = v; }
        sum += v;
        n += 1;
    }
    if n == 0 {
        return None;
    }
    Some(ChannelStats { min, max, mean: sum / n as f64 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_samples() -> Vec<Sample> {
        vec![
            Sample {
                elapsed_s: 0.0,
                speed_kmh: 50.0,
                acceleration: 9.0,
                gyroscope: -2.0,
                gps: model::HIGHWAY_GPS.into(),
            },
            Sample {
                elapsed_s: 0.1,
                speed_kmh: 50.0,
                acceleration: 11.0,
                gyroscope: 1.0,
                gps: model::HIGHWAY_GPS.into(),
            },
            Sample {
                elapsed_s: 0.2,
                speed_kmh: 50.0,
                acceleration: 10.0,
                gyroscope: 4.0,
                gps: model::HIGHWAY_GPS.into(),
            },
        ]
    }

    #[test]
    fn test_chart_frame_series() {
        let frame = chart_frame(&create_test_samples());
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.speed.points, vec![[0.0, 50.0], [0.1, 50.0], [0.2, 50.0]]);
        assert_eq!(frame.acceleration.points[1], [0.1, 11.0]);
        assert_eq!(frame.gyroscope.unit, "deg/s");
        assert_eq!(frame.time_range(), Some((0.0, 0.2)));

        let acc = frame.acceleration.stats.unwrap();
        assert_eq!(acc.min, 9.0);
        assert_eq!(acc.max, 11.0);
        assert!((acc.mean - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_gps_marks_follow_index() {
        let frame = chart_frame(&create_test_samples());
        let idx: Vec<usize> = frame.gps.iter().map(|m| m.index).collect();
        assert_eq!(idx, vec![0, 1, 2]);
        assert!(frame.gps.iter().all(|m| m.label == model::HIGHWAY_GPS));
    }

    #[test]
    fn test_empty_frame() {
        let frame = ChartFrame::empty();
        assert!(frame.is_empty());
        assert!(frame.speed.points.is_empty());
        assert!(frame.speed.stats.is_none());
        assert_eq!(frame.time_range(), None);
    }

    #[test]
    fn test_frame_serializes() {
        let v = serde_json::to_value(chart_frame(&create_test_samples())).unwrap();
        assert!(v["speed"]["points"].is_array());
        assert_eq!(v["gps"][2]["index"], 2);
    }
}
