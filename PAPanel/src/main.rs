use pappanel::{PanelSession, UploadFile, spawn_pollers};
use papclient::PlaylistEntry;
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ========== PHASE 1 : Infrastructure ==========

    tracing_subscriber::fmt::init();

    let config = papconfig::get_config();
    info!("📡 Connecting to device at {}", config.get_device_base_url());

    let session = PanelSession::from_config(&config)?;

    // ========== PHASE 2 : Pollers ==========

    // Status and playlist loops run until the process exits
    let pollers = spawn_pollers(session.clone());

    info!("✅ PAPanel is ready!");
    println!("Power Audio Panel. Type 'help' for commands, 'quit' to exit.");

    // ========== PHASE 3 : Boucle interactive ==========

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let args: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, rest)) = args.split_first() else {
            continue;
        };
        if matches!(command, "quit" | "exit") {
            break;
        }

        if let Err(err) = run_command(&session, &mut lines, command, rest).await {
            warn!("Command failed: {}", err);
        }
    }

    pollers.abort();
    info!("Bye");
    Ok(())
}

async fn run_command(
    session: &PanelSession,
    lines: &mut Lines<BufReader<Stdin>>,
    command: &str,
    args: &[&str],
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        "help" => print_help(),
        "status" => print_status(session),
        "list" => print_playlist(&session.playlist()),

        "play" => match args.first() {
            Some(file) => {
                session.play_file(file).await?;
                println!("Playing {}", file);
            }
            None => {
                let state = session.toggle_play_stop().await?;
                println!("{}", state.as_str());
            }
        },
        "stop" => {
            if session.playback().is_playing() {
                let state = session.toggle_play_stop().await?;
                println!("{}", state.as_str());
            } else {
                println!("Already stopped");
            }
        }
        "pause" => session.pause().await?,
        "next" => session.next().await?,
        "prev" => session.previous().await?,
        "loop" => {
            let looping = session.toggle_loop().await?;
            println!("Loop {}", if looping { "on" } else { "off" });
        }
        "vol" => {
            let value: u8 = parse_arg(args, 0, "vol LEVEL")?;
            if session.set_volume(value) {
                println!("Volume -> {}", value.min(100));
            } else {
                println!("Volume unchanged (delta too small)");
            }
        }

        "delete" => {
            let file = *require_arg(args, 0, "delete FILE")?;
            if confirm(lines, &format!("Delete '{}' from the device?", file)).await? {
                let playlist = session.delete_file(file).await?;
                print_playlist(&playlist);
            }
        }
        "upload" => {
            if args.is_empty() {
                return Err("usage: upload PATH...".into());
            }
            let mut files = Vec::with_capacity(args.len());
            for path in args {
                let path = std::path::Path::new(path);
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| format!("Bad path: {}", path.display()))?;
                files.push(UploadFile::new(filename, tokio::fs::read(path).await?));
            }
            let report = session.upload_files(files).await?;
            for outcome in &report.outcomes {
                match &outcome.error {
                    None => println!("[{:3}%] {} uploaded", outcome.progress_pct, outcome.filename),
                    Some(err) => println!("[{:3}%] {} FAILED: {}", outcome.progress_pct, outcome.filename, err),
                }
            }
            if !report.all_succeeded() {
                println!("{} file(s) failed", report.failed_count());
            }
        }

        "timers" => print_timers(session),
        "timer-add" => {
            let datetime = *require_arg(args, 0, "timer-add DATETIME play|stop")?;
            let action = *require_arg(args, 1, "timer-add DATETIME play|stop")?;
            session.add_timer(datetime, action).await?;
            print_timers(session);
        }
        "timer-del" => {
            let id = *require_arg(args, 0, "timer-del ID")?;
            if confirm(lines, &format!("Remove timer '{}'?", id)).await? {
                session.remove_timer(id).await?;
                print_timers(session);
            }
        }
        "sync-time" => {
            if session.sync_time().await? {
                println!("Clock synchronized via NTP");
            } else {
                println!("Device could not reach an NTP server");
            }
        }
        "set-time" => {
            let datetime = *require_arg(args, 0, "set-time YYYY-MM-DDTHH:MM")?;
            session.set_time(datetime).await?;
        }
        "tz" => {
            let offset: i32 = parse_arg(args, 0, "tz OFFSET_HOURS")?;
            session.set_timezone(offset).await?;
        }

        "reset-wifi" => {
            if confirm(lines, "Reset WiFi credentials? The device will restart.").await? {
                session.reset_wifi().await?;
                println!("WiFi reset requested, device is restarting");
            }
        }
        "clear-nvs" => {
            if confirm(lines, "Erase ALL persisted settings? The device will restart.").await? {
                session.clear_nvs().await?;
                println!("Settings cleared, device is restarting");
            }
        }
        "cmd" => {
            let name = *require_arg(args, 0, "cmd NAME")?;
            session.send_command(name).await?;
        }

        other => println!("Unknown command '{}', try 'help'", other),
    }
    Ok(())
}

// ============================================================================
// Display
// ============================================================================

fn print_status(session: &PanelSession) {
    let Some(status) = session.status_snapshot() else {
        println!("No status received yet");
        return;
    };

    println!("Playback : {}", session.playback().as_str());
    if let Some(track) = status.track.as_deref().filter(|t| !t.is_empty()) {
        let position = format_track_time(status.track_position);
        let duration = format_track_time(status.track_duration);
        println!("Track    : {} ({} / {})", track, position, duration);
    }
    println!("Volume   : {}", session.last_volume());
    println!("Loop     : {}", if session.looping() { "on" } else { "off" });
    if let Some(wifi) = status.wifi {
        println!("WiFi     : {:?}", wifi);
    }
    if let Some(time) = status.time {
        match time.date {
            Some(date) => println!("Clock    : {} {}", time, date),
            None => println!("Clock    : {}", time),
        }
    }
    if let Some(offset) = status.timezone {
        println!("Timezone : UTC{:+}", offset);
    }
    if let Some(temperature) = status.temperature {
        println!("Temp     : {:.1}°C", temperature);
    }
}

fn print_playlist(playlist: &[PlaylistEntry]) {
    if playlist.is_empty() {
        println!("Playlist is empty");
        return;
    }
    for entry in playlist {
        println!("  {}", entry);
    }
}

fn print_timers(session: &PanelSession) {
    let timers = session.timers();
    if timers.is_empty() {
        println!("No timers scheduled");
        return;
    }
    for timer in &timers {
        println!("  {} : {} at {}", timer.id, timer.action, timer.datetime);
    }
}

fn print_help() {
    println!("  status                    show the last device status");
    println!("  list                      show the playlist");
    println!("  play [FILE]               toggle play/stop, or play a file");
    println!("  stop | pause | next | prev");
    println!("  loop                      toggle loop playback");
    println!("  vol LEVEL                 set volume (0-100, debounced)");
    println!("  upload PATH...            upload audio files (mp3/m4a/aac/wav)");
    println!("  delete FILE               delete a file from the device");
    println!("  timers                    list scheduled timers");
    println!("  timer-add DATETIME ACTION schedule a play/stop timer");
    println!("  timer-del ID              remove a timer");
    println!("  sync-time                 synchronize the clock via NTP");
    println!("  set-time DATETIME         set the clock manually");
    println!("  tz OFFSET                 set the UTC offset in hours");
    println!("  reset-wifi | clear-nvs    device maintenance (confirmed)");
    println!("  cmd NAME                  raw command passthrough");
    println!("  quit");
}

/// Format a track position in seconds as `m:ss`, like the progress bar of
/// the embedded web page
fn format_track_time(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) if s.is_finite() && s >= 0.0 => {
            let total = s as u64;
            format!("{}:{:02}", total / 60, total % 60)
        }
        _ => "-:--".to_string(),
    }
}

// ============================================================================
// Input helpers
// ============================================================================

fn require_arg<'a>(args: &'a [&'a str], index: usize, usage: &str) -> Result<&'a &'a str, String> {
    args.get(index).ok_or_else(|| format!("usage: {}", usage))
}

fn parse_arg<T: std::str::FromStr>(args: &[&str], index: usize, usage: &str) -> Result<T, String> {
    require_arg(args, index, usage)?
        .parse()
        .map_err(|_| format!("usage: {}", usage))
}

/// Ask before a destructive command; anything but y/Y declines
async fn confirm(
    lines: &mut Lines<BufReader<Stdin>>,
    question: &str,
) -> Result<bool, std::io::Error> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let answer = lines.next_line().await?;
    Ok(matches!(answer, Some(a) if a.trim().eq_ignore_ascii_case("y")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_track_time() {
        assert_eq!(format_track_time(Some(0.0)), "0:00");
        assert_eq!(format_track_time(Some(65.4)), "1:05");
        assert_eq!(format_track_time(Some(600.0)), "10:00");
        assert_eq!(format_track_time(None), "-:--");
        assert_eq!(format_track_time(Some(f64::NAN)), "-:--");
    }

    #[test]
    fn test_parse_arg() {
        assert_eq!(parse_arg::<u8>(&["42"], 0, "vol LEVEL").unwrap(), 42);
        assert!(parse_arg::<u8>(&["loud"], 0, "vol LEVEL").is_err());
        assert!(parse_arg::<u8>(&[], 0, "vol LEVEL").is_err());
    }
}
