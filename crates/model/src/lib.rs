use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum Scenario {
    #[serde(rename = "Urban Driving")]
    Urban,
    #[serde(rename = "Highway Driving")]
    Highway,
    #[serde(rename = "Off-road Driving")]
    OffRoad,
    #[serde(rename = "Accident")]
    Accident,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [Scenario::Urban, Scenario::Highway, Scenario::OffRoad, Scenario::Accident];

    pub fn label(&self) -> &'static str {
        match self {
            Scenario::Urban => "Urban Driving",
            Scenario::Highway => "Highway Driving",
            Scenario::OffRoad => "Off-road Driving",
            Scenario::Accident => "Accident",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Scenario::Urban => &["urban"],
            Scenario::Highway => &["highway"],
            Scenario::OffRoad => &["off-road", "offroad"],
            Scenario::Accident => &["crash"],
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum CollisionType {
    #[serde(rename = "Car to Car")]
    Car,
    #[serde(rename = "Car to Bike")]
    Bike,
    #[serde(rename = "Car to Bus")]
    Bus,
    #[serde(rename = "Car to Pedestrian")]
    Pedestrian,
    #[serde(rename = "Car to Truck")]
    Truck,
    #[serde(rename = "Car to Motorcycle")]
    Motorcycle,
    #[serde(rename = "Car to Bicycle")]
    Bicycle,
}

impl CollisionType {
    pub const ALL: [CollisionType; 7] = [
        CollisionType::Car,
        CollisionType::Bike,
        CollisionType::Bus,
        CollisionType::Pedestrian,
        CollisionType::Truck,
        CollisionType::Motorcycle,
        CollisionType::Bicycle,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CollisionType::Car => "Car to Car",
            CollisionType::Bike => "Car to Bike",
            CollisionType::Bus => "Car to Bus",
            CollisionType::Pedestrian => "Car to Pedestrian",
            CollisionType::Truck => "Car to Truck",
            CollisionType::Motorcycle => "Car to Motorcycle",
            CollisionType::Bicycle => "Car to Bicycle",
        }
    }

    // "car-to-bus" and bare "bus" both resolve
    fn short(&self) -> &'static str {
        match self {
            CollisionType::Car => "car",
            CollisionType::Bike => "bike",
            CollisionType::Bus => "bus",
            CollisionType::Pedestrian => "pedestrian",
            CollisionType::Truck => "truck",
            CollisionType::Motorcycle => "motorcycle",
            CollisionType::Bicycle => "bicycle",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for CollisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Scenario(String),
    CollisionType(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Scenario(s) => write!(f, "unknown scenario '{s}'"),
            ParseError::CollisionType(s) => write!(f, "unknown collision type '{s}'"),
        }
    }
}

impl std::error::Error for ParseError {}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace(['_', ' '], "-")
}

impl FromStr for Scenario {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize(s);
        Scenario::ALL
            .into_iter()
            .find(|sc| normalize(sc.label()) == key || sc.aliases().contains(&key.as_str()))
            .ok_or_else(|| ParseError::Scenario(s.to_string()))
    }
}

impl FromStr for CollisionType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = normalize(s);
        CollisionType::ALL
            .into_iter()
            .find(|c| normalize(c.label()) == key || c.short() == key)
            .ok_or_else(|| ParseError::CollisionType(s.to_string()))
    }
}

/// Distribution recipe for one scenario branch.
///
/// `acceleration = speed / divisor + N(0,1) * accel_noise`,
/// `gyroscope = N(0,1) * gyro_noise`.
#[derive(Clone, Copy, Serialize, Debug, PartialEq)]
pub struct Profile {
    pub divisor: f64,
    pub accel_noise: f64,
    pub gyro_noise: f64,
    pub gps: &'static str,
}

pub const URBAN_GPS: &str = "37.7749° N, 122.4194° W";
pub const HIGHWAY_GPS: &str = "34.0522° N, 118.2437° W";
pub const OFF_ROAD_GPS: &str = "36.7783° N, 119.4179° W";
pub const ACCIDENT_GPS: &str = "40.7128° N, 74.0060° W";

const fn profile(divisor: f64, accel_noise: f64, gyro_noise: f64, gps: &'static str) -> Profile {
    Profile { divisor, accel_noise, gyro_noise, gps }
}

const URBAN: Profile = profile(10.0, 0.5, 5.0, URBAN_GPS);
const HIGHWAY: Profile = profile(5.0, 0.2, 2.0, HIGHWAY_GPS);
const OFF_ROAD: Profile = profile(8.0, 1.0, 15.0, OFF_ROAD_GPS);

const fn collision_profile(c: CollisionType) -> Profile {
    match c {
        CollisionType::Car => profile(1.0, 2.0, 30.0, ACCIDENT_GPS),
        CollisionType::Bike => profile(1.2, 2.5, 35.0, ACCIDENT_GPS),
        CollisionType::Bus => profile(0.8, 1.8, 25.0, ACCIDENT_GPS),
        CollisionType::Pedestrian => profile(1.5, 3.0, 40.0, ACCIDENT_GPS),
        CollisionType::Truck => profile(0.7, 2.0, 20.0, ACCIDENT_GPS),
        CollisionType::Motorcycle => profile(1.1, 2.8, 33.0, ACCIDENT_GPS),
        CollisionType::Bicycle => profile(1.3, 3.2, 38.0, ACCIDENT_GPS),
    }
}

/// Looks up the profile for a scenario. The collision type only matters for
/// [`Scenario::Accident`]; an accident without one has no profile.
pub fn profile_for(scenario: Scenario, collision: Option<CollisionType>) -> Option<Profile> {
    match (scenario, collision) {
        (Scenario::Urban, _) => Some(URBAN),
        (Scenario::Highway, _) => Some(HIGHWAY),
        (Scenario::OffRoad, _) => Some(OFF_ROAD),
        (Scenario::Accident, Some(c)) => Some(collision_profile(c)),
        (Scenario::Accident, None) => None,
    }
}

/// One timestamped telemetry reading.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Sample {
    pub elapsed_s: f64,
    pub speed_kmh: f64,
    pub acceleration: f64,
    pub gyroscope: f64,
    pub gps: String,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Running => f.write_str("running"),
        }
    }
}
