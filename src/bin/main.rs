use ipmark::app::{App, LookupUpdate};
use ipmark::config::{parse_config, Config};
use ipmark::ip::NormalizedIp;
use ipmark::lookup::LookupClient;
use ipmark::map;
use ipmark::record::BookmarkRecord;
use ipmark::store::{BookmarkStore, StoreError};

use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ipmark.toml".to_owned());

    let config = if Path::new(&config_path).exists() {
        parse_config(&config_path)?
    } else {
        Config::default()
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> anyhow::Result<()> {
    simple_logger::init_with_level(config.log_level)?;

    let store = match BookmarkStore::load(&config.bookmarks_file) {
        Ok(store) => store,
        Err(error @ StoreError::CorruptStore { .. }) => {
            log::warn!("{error}; starting with an empty bookmark list");
            BookmarkStore::empty(&config.bookmarks_file)
        }
        Err(error) => return Err(error.into()),
    };
    log::info!("{} bookmarks loaded from {:?}", store.len(), store.path());

    let client = LookupClient::new(
        config.endpoint,
        config.api_token,
        config.lookup_timeout.into(),
    );
    let (mut app, mut reports) = App::new(store, client);

    let mut lines = stdin_lines();
    print_help();
    prompt();

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line else { break };
                if !handle_line(&mut app, line.trim()) {
                    break;
                }
                prompt();
            }
            report = reports.recv() => {
                // the channel cannot close while `app` holds the worker
                let Some(report) = report else { break };
                print_update(app.apply_report(report));
                prompt();
            }
        }
    }
    Ok(())
}

/// Stdin is read on its own thread so lookups keep running while the
/// process waits for input.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (sender, receiver) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

fn handle_line(app: &mut App, line: &str) -> bool {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some(command) => command,
        None => return true,
    };
    match (command, words.next(), words.next()) {
        ("quit" | "exit", None, None) => return false,
        ("help", ..) => print_help(),
        ("list", None, None) => print_list(app.store().list()),
        ("lookup", Some(text), None) => start_lookup(app, text),
        ("bookmark", None, None) => match app.bookmark_current() {
            Ok(record) => println!("bookmarked {}", record.ip),
            Err(error) => println!("{error}"),
        },
        ("show", Some(text), None) => {
            if let Some(ip) = parse_ip(text) {
                match app.show(ip) {
                    Some(record) => print_record(record),
                    None => println!("{}", StoreError::NotFound(ip)),
                }
            }
        }
        ("edit", Some(old), Some(new)) => {
            if let (Some(old_ip), Some(new_ip)) = (parse_ip(old), parse_ip(new)) {
                match app.refresh_bookmark(old_ip, new_ip) {
                    Ok(()) => println!("fetching {new_ip}..."),
                    Err(error) => println!("{error}"),
                }
            }
        }
        ("remove", Some(text), None) => {
            if let Some(ip) = parse_ip(text) {
                match app.remove(ip) {
                    Ok(record) => println!("removed {}", record.ip),
                    Err(error) => println!("{error}"),
                }
            }
        }
        ("map", path, None) => write_map(app, path.unwrap_or("map.html")),
        // a bare address is a lookup
        (text, None, None) if text.parse::<NormalizedIp>().is_ok() => start_lookup(app, text),
        _ => println!(r#"unrecognized command, try "help""#),
    }
    true
}

fn parse_ip(text: &str) -> Option<NormalizedIp> {
    match text.parse() {
        Ok(ip) => Some(ip),
        Err(error) => {
            println!("{error}");
            None
        }
    }
}

fn start_lookup(app: &mut App, text: &str) {
    if let Some(ip) = parse_ip(text) {
        app.lookup(ip);
        println!("looking up {ip}...");
    }
}

fn write_map(app: &App, path: &str) {
    let record = match app.current() {
        Some(record) => record,
        None => {
            println!("nothing to map yet, run a lookup first");
            return;
        }
    };
    if record.details.coordinates().is_none() {
        println!(
            "no coordinates for {}, writing a placeholder page",
            record.ip
        );
    }
    match std::fs::write(path, map::map_page(&record.details)) {
        Ok(()) => println!("wrote {path}"),
        Err(error) => println!("cannot write {path}: {error}"),
    }
}

fn print_update(update: LookupUpdate) {
    match update {
        LookupUpdate::Fresh { record } => {
            println!();
            print_record(&record);
        }
        LookupUpdate::Refreshed { old_ip, record } => {
            println!();
            println!("bookmark {} now tracks {}", old_ip, record.ip);
            print_record(&record);
        }
        LookupUpdate::Failed { ip, error } => println!("\nlookup for {ip} failed: {error}"),
        LookupUpdate::StoreFailed { error } => println!("\ncould not update bookmark: {error}"),
        LookupUpdate::Stale { ip } => log::debug!("dropping stale lookup result for {ip}"),
    }
}

fn print_record(record: &BookmarkRecord) {
    let field = |value: &Option<String>| value.as_deref().unwrap_or("-").to_owned();
    println!("ip:           {}", record.ip);
    println!("hostname:     {}", field(&record.details.hostname));
    println!("city:         {}", field(&record.details.city));
    println!("region:       {}", field(&record.details.region));
    println!("country:      {}", field(&record.details.country));
    println!("organization: {}", field(&record.details.org));
    if let Some((lat, lon)) = record.details.coordinates() {
        println!("coordinates:  {lat}, {lon}");
    }
}

fn print_list(records: &[BookmarkRecord]) {
    if records.is_empty() {
        println!("no bookmarks yet");
        return;
    }
    for record in records {
        println!(
            "{} ({})",
            record.ip,
            record.details.city.as_deref().unwrap_or("unknown")
        );
    }
}

fn print_help() {
    println!("commands:");
    println!("  lookup <ip> (or just <ip>)  fetch geolocation details");
    println!("  bookmark                    save the displayed result");
    println!("  list                        show saved bookmarks");
    println!("  show <ip>                   display a saved bookmark");
    println!("  edit <old-ip> <new-ip>      re-fetch and replace a bookmark");
    println!("  remove <ip>                 delete a bookmark");
    println!("  map [file]                  write the map page (default map.html)");
    println!("  quit");
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
