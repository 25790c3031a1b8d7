extern crate chrono_tz;
extern crate flexi_logger;
extern crate getopts;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

mod arrivals;
mod drawing;
mod map;
mod poller;
mod position;
mod result;
mod server;

use std::sync::Arc;

struct Config {
    one_shot: bool,
    png_out: Option<String>,
    port: Option<String>,
    log_dir: String,
    poller: poller::PollerConfig,
}

fn build_options() -> getopts::Options {
    let mut opts = getopts::Options::new();
    opts.optflag("o", "one-shot", "fetch and draw once, then exit");
    opts.optopt("i", "save-image", "Where to put a png of the markers.", "FILENAME");
    opts.optopt("p", "port", "Serve the live map over HTTP on this port.", "PORT");
    opts.optopt("u", "url", "Arrivals endpoint to poll.", "URL");
    opts.optopt("n", "interval", "Seconds between polls (default 15).", "SECONDS");
    opts.optopt("z", "timezone", "Zone for displayed times (default Europe/London).", "TZ");
    opts.optopt("l", "log-dir", "Where log files go (default .).", "DIR");
    opts.optflag("h", "help", "print this help");
    return opts;
}

fn parse_config(matches: &getopts::Matches) -> result::DlrMapResult<Config> {
    let mut poller_config = poller::PollerConfig::dlr();

    if let Some(url) = matches.opt_str("url") {
        poller_config.url = url;
    }

    if let Some(interval) = matches.opt_str("interval") {
        let seconds: u64 = interval.parse().map_err(|_| result::make_error(
            &format!("Invalid interval: {}", interval)))?;
        if seconds == 0 {
            return Err(result::make_error("Interval must be at least one second"));
        }
        poller_config.interval = std::time::Duration::from_secs(seconds);
    }

    if let Some(tz_name) = matches.opt_str("timezone") {
        poller_config.timezone = tz_name.parse::<chrono_tz::Tz>().map_err(|err| result::make_error(
            &format!("Unknown time zone '{}': {}", tz_name, err)))?;
    }

    return Ok(Config{
        one_shot: matches.opt_present("one-shot"),
        png_out: matches.opt_str("save-image"),
        port: matches.opt_str("port"),
        log_dir: matches.opt_str("log-dir").unwrap_or(".".to_string()),
        poller: poller_config,
    });
}

fn setup_logging(log_dir: &str) -> result::DlrMapResult<flexi_logger::LoggerHandle> {
    let handle = flexi_logger::Logger::try_with_env_or_str("info")?
        .log_to_file(flexi_logger::FileSpec::default().directory(log_dir))
        .duplicate_to_stderr(flexi_logger::Duplicate::Info)
        .format(flexi_logger::detailed_format)
        .start()?;
    return Ok(handle);
}

struct DlrMap {
    markers: map::SharedMarkerLayer,
    latest: poller::LatestSnapshot,
    png_out: Option<String>,
}

impl DlrMap {
    fn new(png_out: Option<String>) -> DlrMap {
        return DlrMap{
            markers: map::SharedMarkerLayer::new(),
            latest: poller::LatestSnapshot::new(),
            png_out: png_out,
        };
    }

    fn show(&mut self, snapshot: Arc<poller::Snapshot>) -> result::DlrMapResult<()> {
        let markers = position::compute_markers(&snapshot);
        info!("Snapshot #{}: {} trains", snapshot.sequence, markers.len());
        if markers.is_empty() {
            warn!("Snapshot #{} has no trains in it", snapshot.sequence);
        }

        position::redraw(&mut self.markers, &markers);
        self.latest.publish(snapshot);

        if let Some(ref png_out) = self.png_out {
            drawing::save_markers_png(&markers, png_out)?;
        }

        return Ok(());
    }

    fn server_state(&self, config: &Config) -> server::ServerState {
        return server::ServerState{
            view: map::MapView::london(),
            markers: self.markers.clone(),
            snapshot: self.latest.clone(),
            refresh: config.poller.interval,
            local_png: self.png_out.clone(),
            log_dir: config.log_dir.clone(),
        };
    }
}

fn run(config: Config) -> result::DlrMapResult<()> {
    let _logger = setup_logging(&config.log_dir)?;

    info!("Running. one-shot={} port={:?} save-image={:?}",
          config.one_shot, config.port, config.png_out);

    let mut dlrmap = DlrMap::new(config.png_out.clone());

    if let Some(ref port) = config.port {
        let port = port.clone();
        let state = dlrmap.server_state(&config);
        std::thread::Builder::new()
            .name("map-server".to_string())
            .spawn(move || {
                if let Err(err) = server::run_map_server(&port, state) {
                    error!("Map server stopped: {}", err);
                }
            })?;
    }

    let mut arrivals_poller = poller::Poller::new(config.poller, Box::new(arrivals::real_fetch));

    if config.one_shot {
        let snapshot = arrivals_poller.poll_once()?;
        return dlrmap.show(Arc::new(snapshot));
    }

    let (handle, subscriber) = poller::spawn(arrivals_poller)?;
    for snapshot in subscriber {
        if let Err(err) = dlrmap.show(snapshot) {
            error!("Error showing snapshot: {}", err);
        }
    }
    handle.cancel();

    return Ok(());
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let opts = build_options();

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("{}\n{}", err, opts.usage("Usage: dlrmap [options]"));
            std::process::exit(2);
        }
    };

    if matches.opt_present("help") {
        println!("{}", opts.usage("Usage: dlrmap [options]"));
        return;
    }

    let result = parse_config(&matches).and_then(run);
    if let Err(err) = result {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
