extern crate std;

use std::sync::{Arc, Mutex};

use crate::position;

const EARTH_RADIUS_M: f64 = 6378137.0;

/// What the browser map is told at startup. The widget owns pan/zoom after that.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub center_lon_lat: (f64, f64),
    pub zoom: u8,
    pub tile_url: String,
    pub icon_url: String,
    pub icon_scale: f64,
    pub height_px: u32,
}

impl MapView {
    pub fn london() -> MapView {
        return MapView{
            center_lon_lat: (-0.1276, 51.5074),
            zoom: 10,
            tile_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            icon_url: "https://github.com/dracos/underground-live-map/blob/master/i/pacmanS.png?raw=true".to_string(),
            icon_scale: 0.5,
            height_px: 500,
        };
    }

    pub fn center(&self) -> position::Coordinate {
        return from_lon_lat(self.center_lon_lat.0, self.center_lon_lat.1);
    }
}

/// EPSG:4326 -> EPSG:3857, same as the map widget's fromLonLat.
pub fn from_lon_lat(lon: f64, lat: f64) -> position::Coordinate {
    return position::Coordinate{
        x: EARTH_RADIUS_M * lon.to_radians(),
        y: EARTH_RADIUS_M * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
    };
}

/// A vector layer of train markers.
pub trait MarkerLayer {
    fn clear(&mut self);

    fn add_features(&mut self, markers: &[position::Marker]);

    fn replace_all(&mut self, markers: &position::MarkerSet) {
        self.clear();
        self.add_features(&markers.markers);
    }
}

/// Marker layer shared with the HTTP server. Clones see the same markers.
#[derive(Clone)]
pub struct SharedMarkerLayer {
    markers: Arc<Mutex<position::MarkerSet>>,
}

impl SharedMarkerLayer {
    pub fn new() -> SharedMarkerLayer {
        return SharedMarkerLayer{
            markers: Arc::new(Mutex::new(position::MarkerSet::empty())),
        };
    }

    pub fn markers(&self) -> position::MarkerSet {
        return self.lock().clone();
    }

    fn lock(&self) -> std::sync::MutexGuard<position::MarkerSet> {
        return self.markers.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    }
}

impl MarkerLayer for SharedMarkerLayer {
    fn clear(&mut self) {
        self.lock().markers.clear();
    }

    fn add_features(&mut self, markers: &[position::Marker]) {
        self.lock().markers.extend_from_slice(markers);
    }

    // Swapped under one lock so readers never see the cleared layer.
    fn replace_all(&mut self, markers: &position::MarkerSet) {
        *self.lock() = markers.clone();
    }
}
