// Toy placement model: each modeled destination gets its own vertical rail,
// and a train sits `time_to_station` seconds' worth of travel along it.
// Inbound trains go up, everything else goes down. This is not track
// geometry and is not meant to be.
use crate::arrivals;
use crate::map;
use crate::poller;

/// Assumed train speed in map units per second.
pub const TRAIN_SPEED: f64 = 1000.0 / 3600.0;

/// x offset between the Stratford and Lewisham rails.
pub const LINE_SPACING: f64 = 10000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate{x: 0.0, y: 0.0};
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSet {
    pub sequence: u64,
    pub markers: Vec<Marker>,
}

impl MarkerSet {
    pub fn empty() -> MarkerSet {
        return MarkerSet{
            sequence: 0,
            markers: vec![],
        };
    }

    pub fn len(&self) -> usize {
        return self.markers.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.markers.is_empty();
    }
}

fn rail_x(destination_name: &str) -> Option<f64> {
    return match destination_name {
        "Stratford" => Some(0.0),
        "Lewisham" => Some(LINE_SPACING),
        _ => None,
    };
}

pub fn estimate_position(arrival: &arrivals::Arrival) -> Coordinate {
    let distance = TRAIN_SPEED * arrival.time_to_station;
    let direction_multiplier = if arrival.is_inbound() { 1.0 } else { -1.0 };

    // TODO: Unmodeled destinations (Bank, Beckton, Woolwich Arsenal,
    // ...) all pile up on the origin until someone decides where they go.
    return match rail_x(&arrival.destination_name) {
        Some(x) => Coordinate{x: x, y: distance * direction_multiplier},
        None => Coordinate::ORIGIN,
    };
}

/// One marker per arrival, in snapshot order. Nothing is filtered out.
pub fn compute_markers(snapshot: &poller::Snapshot) -> MarkerSet {
    return MarkerSet{
        sequence: snapshot.sequence,
        markers: snapshot.arrivals.iter().map(|arrival| Marker{
            id: arrival.id.clone(),
            coordinate: estimate_position(arrival),
        }).collect(),
    };
}

pub fn redraw(layer: &mut dyn map::MarkerLayer, markers: &MarkerSet) {
    layer.replace_all(markers);
}
