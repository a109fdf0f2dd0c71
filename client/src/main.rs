use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use client::api::{AttendanceApi, HttpAttendanceApi};
use client::error::ClientError;
use client::location::{
    DeviceFix, DeviceLocationProvider, Fallback, LocationError, resolve,
};
use client::workflow::{CaptureSession, Feedback, FrameSource, encode_frame};
use util::config::PresetLocation;
use util::geo::Location;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Attendance capture client")]
struct Cli {
    /// Server root, e.g. http://127.0.0.1:3000
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Bearer token; falls back to the ROLLCALL_TOKEN environment variable
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print a token for subsequent commands
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Check capture quality without enrolling
    Quality {
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Enroll (or replace) the face template
    Enroll {
        #[arg(short, long)]
        image: PathBuf,
        /// Additional captures to attempt when quality is too low
        #[arg(short, long, default_value = "0")]
        retakes: u32,
    },
    /// Mark attendance for an open session
    Mark {
        #[arg(short, long)]
        session: i64,
        #[arg(short, long)]
        image: PathBuf,
        /// Manual latitude (requires --lng)
        #[arg(long)]
        lat: Option<String>,
        /// Manual longitude (requires --lat)
        #[arg(long)]
        lng: Option<String>,
        /// Named preset from PRESET_LOCATIONS
        #[arg(long)]
        preset: Option<String>,
    },
    /// List sessions currently open for marking
    Sessions,
    /// Show own attendance history
    History,
}

/// Reads one image file per capture attempt.
struct FileFrameSource {
    path: PathBuf,
}

#[async_trait]
impl FrameSource for FileFrameSource {
    async fn capture(&mut self) -> Result<String, ClientError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let subtype = match self.path.extension().and_then(|e| e.to_str()) {
            Some("png") => "png",
            _ => "jpeg",
        };
        Ok(encode_frame(&bytes, subtype))
    }
}

/// Client-side preset table, read from the PRESET_LOCATIONS environment
/// variable (a JSON map of name -> { lat, lng }).
fn preset_table() -> HashMap<String, PresetLocation> {
    std::env::var("PRESET_LOCATIONS")
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

/// Bridges to the host's positioning service by running the command in
/// `ROLLCALL_LOCATION_CMD` (e.g. a gpspipe or termux-location wrapper)
/// and parsing `lat lng [accuracy_m]` from its stdout.
struct CommandLocationProvider {
    command: String,
}

#[async_trait]
impl DeviceLocationProvider for CommandLocationProvider {
    async fn current_fix(&self, _max_age: Duration) -> Result<DeviceFix, LocationError> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output()
            .await
            .map_err(|e| LocationError::Platform(e.to_string()))?;
        if !output.status.success() {
            return Err(LocationError::PositionUnavailable);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut parts = stdout.split_whitespace();
        let (Some(lat), Some(lng)) = (parts.next(), parts.next()) else {
            return Err(LocationError::Platform(format!(
                "unparseable fix output: {stdout:?}"
            )));
        };
        let lat: f64 = lat
            .parse()
            .map_err(|_| LocationError::Platform(format!("bad latitude {lat:?}")))?;
        let lng: f64 = lng
            .parse()
            .map_err(|_| LocationError::Platform(format!("bad longitude {lng:?}")))?;
        let accuracy_m = parts.next().and_then(|a| a.parse().ok()).unwrap_or(0.0);

        let location = Location::new(lat, lng, accuracy_m)
            .map_err(|e| LocationError::Platform(e.to_string()))?;
        Ok(DeviceFix {
            location,
            age: Duration::ZERO,
        })
    }
}

/// Device fix first when ROLLCALL_LOCATION_CMD is set, then manual
/// coordinates or a preset.
async fn resolve_location(
    lat: Option<String>,
    lng: Option<String>,
    preset: Option<String>,
) -> Result<Location, String> {
    let provider = std::env::var("ROLLCALL_LOCATION_CMD")
        .ok()
        .map(|command| CommandLocationProvider { command });

    let fallback = match (lat, lng, preset) {
        (Some(lat), Some(lng), _) => Fallback::Coordinates { lat, lng },
        (_, _, Some(name)) => Fallback::Preset {
            presets: preset_table(),
            name,
        },
        _ => Fallback::None,
    };

    if provider.is_none() && matches!(fallback, Fallback::None) {
        return Err(
            "provide --lat and --lng, --preset, or set ROLLCALL_LOCATION_CMD".to_string(),
        );
    }

    resolve(
        provider.as_ref().map(|p| p as &dyn DeviceLocationProvider),
        &fallback,
    )
    .await
    .map_err(|e| e.to_string())
}

fn describe(feedback: &Feedback) -> String {
    match feedback {
        Feedback::LoggedIn => "Logged in".to_string(),
        Feedback::Accepted { distance_m } => {
            format!("Attendance recorded ({distance_m:.0} m from session)")
        }
        Feedback::Rejected {
            failed,
            distance_m,
            radius_m,
        } => format!(
            "Verification failed ({}): {distance_m:.0} m from session, radius {radius_m:.0} m",
            failed.join(", ")
        ),
        Feedback::Enrolled { quality_score } => {
            format!("Face enrolled (quality {quality_score:.2})")
        }
        Feedback::QualityOk { score } => format!("Capture quality acceptable ({score:.2})"),
        Feedback::QualityTooLow { score, suggestions } => format!(
            "Capture quality {score:.2} too low:\n  - {}",
            suggestions.join("\n  - ")
        ),
        Feedback::AlreadyMarked => "Attendance already recorded for this session".to_string(),
        Feedback::SessionClosed => "This session is not open for marking".to_string(),
        Feedback::NoTemplate => "No face template enrolled yet; run `rollcall enroll`".to_string(),
        Feedback::NotEnrolled => "You are not enrolled in this session's course".to_string(),
        Feedback::SessionExpired => "Session expired; log in again".to_string(),
        Feedback::Failed(msg) => format!("Request failed: {msg}"),
    }
}

fn frames_for(image: &Path) -> FileFrameSource {
    FileFrameSource {
        path: image.to_path_buf(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("client=info")),
        )
        .init();

    let cli = Cli::parse();
    let api = Arc::new(HttpAttendanceApi::new(cli.server.clone()));

    if let Err(msg) = run(cli, api).await {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, api: Arc<HttpAttendanceApi>) -> Result<(), String> {
    let token = cli.token.or_else(|| std::env::var("ROLLCALL_TOKEN").ok());
    let mut session = CaptureSession::new(api.clone());
    if let Some(token) = &token {
        session.adopt_token(token.clone());
    }

    match cli.command {
        Commands::Login { username, password } => {
            let reply = api
                .login(&username, &password)
                .await
                .map_err(|e| e.to_string())?;
            match reply.data()["token"].as_str() {
                Some(token) => {
                    println!("{token}");
                    Ok(())
                }
                None => Err(format!("Login failed: {}", reply.message())),
            }
        }
        Commands::Quality { image } => {
            let mut frames = frames_for(&image);
            let feedback = session
                .check_quality(&mut frames)
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", describe(&feedback));
            Ok(())
        }
        Commands::Enroll { image, retakes } => {
            let mut frames = frames_for(&image);
            let feedback = session
                .enroll_face(&mut frames, retakes)
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", describe(&feedback));
            Ok(())
        }
        Commands::Mark {
            session: session_id,
            image,
            lat,
            lng,
            preset,
        } => {
            let location = resolve_location(lat, lng, preset).await?;
            let mut frames = frames_for(&image);
            let feedback = session
                .mark_attendance(&mut frames, session_id, location)
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", describe(&feedback));
            Ok(())
        }
        Commands::Sessions => {
            let token = token.ok_or_else(|| "set --token or ROLLCALL_TOKEN".to_string())?;
            let reply = api
                .active_sessions(&token)
                .await
                .map_err(|e| e.to_string())?;
            print_listing(reply.data(), &["id", "title", "start_time", "end_time"]);
            Ok(())
        }
        Commands::History => {
            let token = token.ok_or_else(|| "set --token or ROLLCALL_TOKEN".to_string())?;
            let reply = api.history(&token).await.map_err(|e| e.to_string())?;
            print_listing(reply.data(), &["session_id", "marked_at", "distance_m"]);
            Ok(())
        }
    }
}

fn print_listing(data: &serde_json::Value, columns: &[&str]) {
    let Some(rows) = data.as_array() else {
        println!("(no data)");
        return;
    };
    if rows.is_empty() {
        println!("(none)");
        return;
    }
    for row in rows {
        let line: Vec<String> = columns
            .iter()
            .map(|c| format!("{}={}", c, row[*c]))
            .collect();
        println!("{}", line.join("  "));
    }
}
