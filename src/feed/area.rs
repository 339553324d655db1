use super::Coordinates;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Axis-aligned box in decimal degrees, `[min_lon, min_lat, max_lon, max_lat]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    pub fn contains(&self, point: &Coordinates) -> bool {
        (self.min_lon..=self.max_lon).contains(&point.lon)
            && (self.min_lat..=self.max_lat).contains(&point.lat)
    }

    pub fn center(&self) -> Coordinates {
        Coordinates::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        let corners = [
            Coordinates::new(self.min_lat, self.min_lon),
            Coordinates::new(self.max_lat, self.max_lon),
        ];
        if corners.iter().any(|c| !c.is_valid()) {
            return Err("bounding box corners are outside WGS84 ranges".to_string());
        }
        if self.min_lon > self.max_lon || self.min_lat > self.max_lat {
            return Err("bounding box minimum exceeds maximum".to_string());
        }
        Ok(())
    }
}

/// Geographic filter applied to records before they reach a store.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AreaFilter {
    BoundingBox(BoundingBox),
    Radius { center: Coordinates, radius_km: f64 },
}

impl AreaFilter {
    pub fn contains(&self, point: &Coordinates) -> bool {
        match self {
            AreaFilter::BoundingBox(bbox) => bbox.contains(point),
            AreaFilter::Radius { center, radius_km } => haversine_km(center, point) <= *radius_km,
        }
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        match self {
            AreaFilter::BoundingBox(bbox) => bbox.check(),
            AreaFilter::Radius { center, radius_km } => {
                if !center.is_valid() {
                    return Err("radius centre is outside WGS84 ranges".to_string());
                }
                if !radius_km.is_finite() || *radius_km <= 0.0 {
                    return Err(format!("radius_km must be positive, got {}", radius_km));
                }
                Ok(())
            }
        }
    }
}

/// Great-circle distance between two points.
pub fn haversine_km(a: &Coordinates, b: &Coordinates) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}
