// Operator commands: raw form input in, one status line out.
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crashsim_ingest_core::{CollisionType, Scenario};
use model::{profile_for, ParseError};

use crate::session::{AppSession, SessionError, StartRequest, INVALID_SPEED};

pub const STATUS_RUNNING: &str = "Status: Simulation Running";
pub const STATUS_STOPPED: &str = "Status: Simulation Stopped";
pub const STATUS_CLEARED: &str = "Data cleared";

fn status_error(e: &SessionError) -> String {
    format!("Error: {e}")
}

/// Parses the form fields and starts a run.
pub fn parse_start(speed: &str, scenario: &str, collision: Option<&str>) -> Result<StartRequest, SessionError> {
    let speed_kmh: f64 = speed
        .trim()
        .parse()
        .map_err(|_| SessionError::Validation(INVALID_SPEED.into()))?;
    let scenario: Scenario = scenario.parse().map_err(|e| SessionError::Validation(format!("{e}")))?;
    let collision = match collision.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => Some(c.parse::<CollisionType>().map_err(|e| SessionError::Validation(format!("{e}")))?),
        None => None,
    };
    Ok(StartRequest { speed_kmh, scenario, collision })
}

pub async fn start(sess: &AppSession, speed: &str, scenario: &str, collision: Option<&str>) -> Result<String, String> {
    let req = parse_start(speed, scenario, collision).map_err(|e| {
        warn!(error = %e, "start rejected");
        status_error(&e)
    })?;
    start_request(sess, req).await
}

async fn start_request(sess: &AppSession, req: StartRequest) -> Result<String, String> {
    match sess.start(req).await {
        Ok(info) => Ok(format!("{STATUS_RUNNING} (run {} started {})", info.id, info.started_at)),
        Err(e) => {
            warn!(error = %e, "start rejected");
            Err(status_error(&e))
        }
    }
}

pub async fn stop(sess: &AppSession) -> Result<String, String> {
    sess.stop().await;
    Ok(STATUS_STOPPED.into())
}

pub fn save(sess: &AppSession, dest: Option<&Path>) -> Result<String, String> {
    match sess.save(dest) {
        Ok(Some(_)) => Ok(format!("Data saved to {}", dest.map(|p| p.display().to_string()).unwrap_or_default())),
        Ok(None) => Ok("No destination chosen".into()),
        Err(e) => {
            warn!(error = %e, "save failed");
            Err(status_error(&e))
        }
    }
}

pub fn clear(sess: &AppSession) -> Result<String, String> {
    sess.clear().map_err(|e| status_error(&e))?;
    Ok(STATUS_CLEARED.into())
}

pub fn status(sess: &AppSession) -> String {
    let s = sess.status();
    let mut line = format!(
        "Status: {} | history {}/{} | log {}",
        s.state, s.history_len, s.history_capacity, s.log_len
    );
    if let Some(run) = &s.run {
        line.push_str(&format!(" | run {} {} @ {} km/h", run.id, run.scenario, run.speed_kmh));
        if let Some(c) = run.collision {
            line.push_str(&format!(" ({c})"));
        }
    }
    if let Some(fault) = &s.fault {
        line.push_str(&format!(" | fault: {fault}"));
    }
    line
}

pub const CONSOLE_HELP: &str =
    "commands: start <speed> [scenario] [collision] | stop | save [path] | clear | status | help | quit";

/// Splits `<speed> [scenario] [collision]` where both names may span several
/// words. The scenario is the longest leading run of words that names one;
/// whatever follows is the collision type.
pub fn parse_start_line(args: &str) -> Result<StartRequest, SessionError> {
    let mut words = args.split_whitespace();
    let speed = words.next().unwrap_or("");
    let rest: Vec<&str> = words.collect();
    if rest.is_empty() {
        return parse_start(speed, Scenario::Urban.label(), None);
    }

    let split = (1..=rest.len())
        .rev()
        .find(|&k| rest[..k].join(" ").parse::<Scenario>().is_ok())
        .ok_or_else(|| SessionError::Validation(ParseError::Scenario(rest.join(" ")).to_string()))?;
    let collision = rest[split..].join(" ");
    parse_start(speed, &rest[..split].join(" "), Some(&collision))
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleReply {
    Silent,
    Line(String),
    Quit,
}

/// Runs one console line against the session.
pub async fn execute(sess: &AppSession, line: &str) -> ConsoleReply {
    let line = line.trim();
    let (cmd, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let reply = match cmd.to_ascii_lowercase().as_str() {
        "" => return ConsoleReply::Silent,
        "start" => match parse_start_line(args) {
            Ok(req) => start_request(sess, req).await,
            Err(e) => {
                warn!(error = %e, "start rejected");
                Err(status_error(&e))
            }
        },
        "stop" => stop(sess).await,
        "save" => {
            let dest = args.trim();
            save(sess, (!dest.is_empty()).then(|| Path::new(dest)))
        }
        "clear" => clear(sess),
        "status" => Ok(status(sess)),
        "help" => Ok(CONSOLE_HELP.into()),
        "quit" | "exit" => {
            sess.stop().await;
            return ConsoleReply::Quit;
        }
        other => Err(format!("Error: unknown command '{other}'")),
    };
    match reply {
        Ok(s) | Err(s) => ConsoleReply::Line(s),
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileRow {
    pub scenario: Scenario,
    pub collision: Option<CollisionType>,
    pub divisor: f64,
    pub accel_noise: f64,
    pub gyro_noise: f64,
    pub gps: &'static str,
}

/// Every (scenario, collision type) pair that has a profile.
pub fn profiles() -> Vec<ProfileRow> {
    let mut keys: Vec<(Scenario, Option<CollisionType>)> = Scenario::ALL
        .into_iter()
        .filter(|s| *s != Scenario::Accident)
        .map(|s| (s, None))
        .collect();
    keys.extend(CollisionType::ALL.into_iter().map(|c| (Scenario::Accident, Some(c))));

    keys.into_iter()
        .filter_map(|(scenario, collision)| {
            profile_for(scenario, collision).map(|p| ProfileRow {
                scenario,
                collision,
                divisor: p.divisor,
                accel_noise: p.accel_noise,
                gyro_noise: p.gyro_noise,
                gps: p.gps,
            })
        })
        .collect()
}
