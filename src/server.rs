extern crate pretty_bytes;
extern crate querystring;
extern crate serde_json;
extern crate std;
extern crate tiny_http;

use crate::map;
use crate::poller;
use crate::result;

const MAP_PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<title>DLR live map</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/ol@v9.2.4/ol.css">
<script src="https://cdn.jsdelivr.net/npm/ol@v9.2.4/dist/ol.js"></script>
<style>body { margin: 0; }</style>
</head>
<body>
<div id="map" style="width: 100%; height: %HEIGHT_PX%px;"></div>
<script>
const trainLayer = new ol.layer.Vector({
  source: new ol.source.Vector(),
  style: new ol.style.Style({
    image: new ol.style.Icon({src: %ICON_URL%, scale: %ICON_SCALE%}),
  }),
});

const map = new ol.Map({
  target: 'map',
  layers: [new ol.layer.Tile({source: new ol.source.OSM({url: %TILE_URL%})}), trainLayer],
  view: new ol.View({center: [%CENTER_X%, %CENTER_Y%], zoom: %ZOOM%}),
});

let lastSequence = -1;

async function refreshMarkers() {
  try {
    const response = await fetch('/markers.json');
    const markerSet = await response.json();
    if (markerSet.sequence === lastSequence) {
      return;
    }
    lastSequence = markerSet.sequence;
    const features = markerSet.markers.map((m) => new ol.Feature({
      geometry: new ol.geom.Point([m.coordinate.x, m.coordinate.y]),
    }));
    trainLayer.getSource().clear();
    trainLayer.getSource().addFeatures(features);
  } catch (error) {
    console.log(error);
  }
}

refreshMarkers();
setInterval(refreshMarkers, %REFRESH_MS%);
</script>
</body>
</html>
"#;

pub struct ServerState {
    pub view: map::MapView,
    pub markers: map::SharedMarkerLayer,
    pub snapshot: poller::LatestSnapshot,
    pub refresh: std::time::Duration,
    pub local_png: Option<String>,
    pub log_dir: String,
}

#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok(content_type: &'static str, body: Vec<u8>) -> Reply {
        return Reply{status: 200, content_type: content_type, body: body};
    }

    fn not_found() -> Reply {
        return Reply{
            status: 404,
            content_type: "text/html",
            body: "<h1>404</h1><p>Not found!<p>".as_bytes().to_vec(),
        };
    }
}

pub fn run_map_server(port: &str, state: ServerState) -> result::DlrMapResult<()> {
    let addr = format!("0.0.0.0:{}", port);
    let server = tiny_http::Server::http(&addr)
        .map_err(|err| result::make_error(&format!("Couldn't listen on {}: {}", addr, err)))?;

    info!("Running map HTTP server on port {}", port);

    for request in server.incoming_requests() {
        let reply = route(&state, request.method(), request.url());
        debug!("{} {} -> {}", request.method(), request.url(), reply.status);

        let content_type = tiny_http::Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes())
            .map_err(|_| result::make_error(&format!("Bad content type: {}", reply.content_type)))?;
        let response = tiny_http::Response::from_data(reply.body)
            .with_status_code(reply.status)
            .with_header(content_type);

        if let Err(err) = request.respond(response) {
            warn!("Error writing HTTP response: {}", err);
        }
    }

    return Ok(());
}

pub fn route(state: &ServerState, method: &tiny_http::Method, url: &str) -> Reply {
    let (path, query) = match url.find('?') {
        Some(i) => (&url[..i], &url[i + 1..]),
        None => (url, ""),
    };

    let reply = match (method, path) {
        (&tiny_http::Method::Get, "/") => Ok(map_page(state)),
        (&tiny_http::Method::Get, "/markers.json") => markers_json(state),
        (&tiny_http::Method::Get, "/snapshot.json") => snapshot_json(state),
        (&tiny_http::Method::Get, "/current_image") => Ok(current_image(state.local_png.as_ref().map(String::as_str))),
        (&tiny_http::Method::Get, "/logs") => log_listing(&state.log_dir),
        (&tiny_http::Method::Get, "/dumplog") => Ok(dump_log(&state.log_dir, query)),
        (_, _) => Ok(Reply::not_found()),
    };

    return match reply {
        Ok(reply) => reply,
        Err(err) => {
            error!("Error serving {}: {}", url, err);
            Reply{
                status: 500,
                content_type: "text/plain",
                body: format!("{}", err).into_bytes(),
            }
        }
    };
}

fn js_string(value: &str) -> String {
    // A JSON string literal is a valid JS string literal.
    return serde_json::Value::String(value.to_string()).to_string();
}

fn map_page(state: &ServerState) -> Reply {
    let center = state.view.center();
    let body = MAP_PAGE_TEMPLATE
        .replace("%HEIGHT_PX%", &state.view.height_px.to_string())
        .replace("%ICON_URL%", &js_string(&state.view.icon_url))
        .replace("%ICON_SCALE%", &state.view.icon_scale.to_string())
        .replace("%TILE_URL%", &js_string(&state.view.tile_url))
        .replace("%CENTER_X%", &center.x.to_string())
        .replace("%CENTER_Y%", &center.y.to_string())
        .replace("%ZOOM%", &state.view.zoom.to_string())
        .replace("%REFRESH_MS%", &state.refresh.as_millis().to_string());

    return Reply::ok("text/html; charset=utf-8", body.into_bytes());
}

fn markers_json(state: &ServerState) -> result::DlrMapResult<Reply> {
    let body = serde_json::to_vec(&state.markers.markers())?;
    return Ok(Reply::ok("application/json", body));
}

fn snapshot_json(state: &ServerState) -> result::DlrMapResult<Reply> {
    let body = match state.snapshot.get() {
        Some(snapshot) => serde_json::to_vec(&*snapshot)?,
        None => b"null".to_vec(),
    };
    return Ok(Reply::ok("application/json", body));
}

fn current_image(local_png: Option<&str>) -> Reply {
    return match local_png.map(std::fs::read) {
        Some(Ok(bytes)) => Reply::ok("image/png", bytes),
        _ => Reply::not_found(),
    };
}

fn which_log(query: &str) -> Option<String> {
    for (k, v) in querystring::querify(query) {
        if k == "log" && v.ends_with(".log") && !v.contains('/') && !v.contains("..") {
            return Some(v.to_string());
        }
    }

    return None;
}

fn dump_log(log_dir: &str, query: &str) -> Reply {
    let filename = match which_log(query) {
        Some(filename) => filename,
        None => return Reply::not_found(),
    };

    return match std::fs::read(std::path::Path::new(log_dir).join(filename)) {
        Ok(contents) => Reply::ok("text/plain; charset=utf-8", contents),
        Err(_) => Reply::not_found(),
    };
}

fn log_listing(log_dir: &str) -> result::DlrMapResult<Reply> {
    let mut body = format!("<html><body><h1>dlrmap</h1><div>Version {}</div>",
                           env!("CARGO_PKG_VERSION"));

    body.push_str("<div><h2>Log files</h2><ul>");
    let mut entries = vec![];
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let filename = entry.file_name().to_string_lossy().to_string();
        if filename.ends_with(".log") {
            entries.push((filename, entry.metadata()?.len()));
        }
    }
    entries.sort();
    for (filename, len) in entries {
        body.push_str(&format!("<li><a href='/dumplog?log={}'>{}</a> [{}]</li>",
                               filename, filename, pretty_bytes::converter::convert(len as f64)));
    }
    body.push_str("</ul></div>");

    body.push_str("</body></html>");

    return Ok(Reply::ok("text/html; charset=utf-8", body.into_bytes()));
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::map::MarkerLayer;
    use crate::position::{Coordinate, Marker, MarkerSet};

    fn state(log_dir: &str) -> super::ServerState {
        return super::ServerState{
            view: crate::map::MapView::london(),
            markers: crate::map::SharedMarkerLayer::new(),
            snapshot: crate::poller::LatestSnapshot::new(),
            refresh: std::time::Duration::from_secs(15),
            local_png: None,
            log_dir: log_dir.to_string(),
        };
    }

    fn get(state: &super::ServerState, url: &str) -> super::Reply {
        return super::route(state, &tiny_http::Method::Get, url);
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("dlrmap-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        return dir;
    }

    #[test]
    fn map_page_has_view_settings() {
        let reply = get(&state("."), "/");
        assert_eq!(200, reply.status);

        let page = String::from_utf8(reply.body).expect("utf8");
        assert!(page.contains("zoom: 10"));
        assert!(page.contains("height: 500px"));
        assert!(page.contains(r#"src: "https://github.com/dracos/underground-live-map/blob/master/i/pacmanS.png?raw=true", scale: 0.5"#));
        assert!(page.contains("setInterval(refreshMarkers, 15000)"));
        for placeholder in &["%HEIGHT_PX%", "%ICON_URL%", "%TILE_URL%", "%CENTER_X%", "%ZOOM%", "%REFRESH_MS%"] {
            assert!(!page.contains(placeholder), "{} left in page", placeholder);
        }
    }

    #[test]
    fn markers_json_follows_the_layer() {
        let mut state = state(".");
        let reply = get(&state, "/markers.json");
        let json: serde_json::Value = serde_json::from_slice(&reply.body).expect("json");
        assert_eq!(0, json["sequence"]);
        assert!(json["markers"].as_array().expect("markers").is_empty());

        state.markers.replace_all(&MarkerSet{
            sequence: 2,
            markers: vec![Marker{id: "a".to_string(), coordinate: Coordinate{x: 10000.0, y: -10.0}}],
        });

        let reply = get(&state, "/markers.json");
        assert_eq!("application/json", reply.content_type);
        let json: serde_json::Value = serde_json::from_slice(&reply.body).expect("json");
        assert_eq!(2, json["sequence"]);
        assert_eq!("a", json["markers"][0]["id"]);
        assert_eq!(10000.0, json["markers"][0]["coordinate"]["x"]);
        assert_eq!(-10.0, json["markers"][0]["coordinate"]["y"]);
    }

    #[test]
    fn snapshot_json_is_null_until_published() {
        let state = state(".");
        assert_eq!(b"null".to_vec(), get(&state, "/snapshot.json").body);

        state.snapshot.publish(Arc::new(crate::poller::Snapshot{
            sequence: 1,
            fetched_at: time::OffsetDateTime::UNIX_EPOCH,
            arrivals: crate::arrivals::parse_arrivals(
                &std::fs::read_to_string("testdata/dlr_arrivals.json").expect("read testdata"),
                chrono_tz::Europe::London).expect("parse"),
        }));

        let json: serde_json::Value = serde_json::from_slice(&get(&state, "/snapshot.json").body).expect("json");
        assert_eq!(4, json["arrivals"].as_array().expect("arrivals").len());
        assert_eq!("Canning Town DLR Station", json["arrivals"][0]["stationName"]);
        assert_eq!("03:03:09 PM", json["arrivals"][0]["timestamp"]);
    }

    #[test]
    fn current_image_needs_a_png() {
        let mut state = state(".");
        assert_eq!(404, get(&state, "/current_image").status);

        let dir = scratch_dir("image");
        let png = dir.join("map.png");
        crate::drawing::save_markers_png(&MarkerSet::empty(), png.to_str().expect("path")).expect("save png");
        state.local_png = Some(png.to_string_lossy().to_string());

        let reply = get(&state, "/current_image");
        assert_eq!(200, reply.status);
        assert_eq!("image/png", reply.content_type);
        assert_eq!(&[0x89, b'P', b'N', b'G'], &reply.body[..4]);
    }

    #[test]
    fn logs_are_listed_and_dumped() {
        let dir = scratch_dir("logs");
        std::fs::write(dir.join("dlrmap_r1.log"), "INFO poll ok\n").expect("write log");
        std::fs::write(dir.join("notes.txt"), "not a log").expect("write txt");
        let state = state(dir.to_str().expect("path"));

        let listing = String::from_utf8(get(&state, "/logs").body).expect("utf8");
        assert!(listing.contains("/dumplog?log=dlrmap_r1.log"));
        assert!(!listing.contains("notes.txt"));

        let dump = get(&state, "/dumplog?log=dlrmap_r1.log");
        assert_eq!(200, dump.status);
        assert_eq!(b"INFO poll ok\n".to_vec(), dump.body);

        assert_eq!(404, get(&state, "/dumplog?log=../etc/passwd.log").status);
        assert_eq!(404, get(&state, "/dumplog?log=notes.txt").status);
        assert_eq!(404, get(&state, "/dumplog").status);
    }

    #[test]
    fn unknown_routes_are_404() {
        let state = state(".");
        assert_eq!(404, get(&state, "/nope").status);
        assert_eq!(404, super::route(&state, &tiny_http::Method::Post, "/markers.json").status);
    }

    #[test]
    fn missing_log_dir_is_a_500() {
        let state = state("/definitely/not/a/dir");
        assert_eq!(500, get(&state, "/logs").status);
    }
}
