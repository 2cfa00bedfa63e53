// src/services/geo.rs
// DOCUMENTATION: Geographic helpers
// PURPOSE: Distances, bounding boxes and GeoJSON output for the farm map

use crate::errors::FarmError;
use crate::models::Farm;
use geo_types::{coord, Point, Rect};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Rough envelope of Great Britain and Northern Ireland
pub const UK_LAT_RANGE: (f64, f64) = (49.8, 60.9);
pub const UK_LNG_RANGE: (f64, f64) = (-8.7, 1.8);

/// Great-circle distance between two points in kilometers
pub fn haversine_km(a: Point<f64>, b: Point<f64>) -> f64 {
    let (lat1, lat2) = (a.y().to_radians(), b.y().to_radians());
    let dlat = (b.y() - a.y()).to_radians();
    let dlng = (b.x() - a.x()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().asin()
}

pub fn farm_point(lat: f64, lng: f64) -> Point<f64> {
    Point::new(lng, lat)
}

pub fn within_uk(lat: f64, lng: f64) -> bool {
    (UK_LAT_RANGE.0..=UK_LAT_RANGE.1).contains(&lat)
        && (UK_LNG_RANGE.0..=UK_LNG_RANGE.1).contains(&lng)
}

/// Parse "west,south,east,north" into a rectangle
pub fn parse_bbox(raw: &str) -> Result<Rect<f64>, FarmError> {
    let parts: Vec<f64> = raw
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| FarmError::InvalidInput(format!("bbox is not numeric: {}", raw)))?;

    let (west, south, east, north) = match parts.as_slice() {
        [w, s, e, n] => (*w, *s, *e, *n),
        _ => {
            return Err(FarmError::InvalidInput(
                "bbox must be west,south,east,north".to_string(),
            ))
        }
    };

    if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) || south > north {
        return Err(FarmError::InvalidInput(format!("bbox latitudes out of range: {}", raw)));
    }
    if !(-180.0..=180.0).contains(&west) || !(-180.0..=180.0).contains(&east) || west > east {
        return Err(FarmError::InvalidInput(format!("bbox longitudes out of range: {}", raw)));
    }

    Ok(Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north }))
}

/// Map pins for the interactive map
/// DOCUMENTATION: One Point feature per farm, id = slug
pub fn farms_to_feature_collection(farms: &[Farm]) -> FeatureCollection {
    let features = farms
        .iter()
        .map(|farm| {
            let point = farm_point(farm.latitude, farm.longitude);
            let mut properties = JsonObject::new();
            properties.insert("slug".into(), json!(farm.slug));
            properties.insert("name".into(), json!(farm.name));
            properties.insert("county".into(), json!(farm.county));
            properties.insert("verified".into(), json!(farm.verified));

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::from(&point))),
                id: Some(Id::String(farm.slug.clone())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_london_to_manchester() {
        let london = farm_point(51.5074, -0.1278);
        let manchester = farm_point(53.4808, -2.2426);
        let d = haversine_km(london, manchester);
        assert!((d - 262.0).abs() < 5.0, "got {}", d);
        assert!(haversine_km(london, london).abs() < 1e-9);
    }

    #[test]
    fn test_within_uk() {
        assert!(within_uk(52.37, -2.72));
        assert!(!within_uk(48.85, 2.35)); // Paris
        assert!(!within_uk(0.0, 0.0));
    }

    #[test]
    fn test_parse_bbox() {
        let rect = parse_bbox("-3.0, 51.0, -1.5, 52.5").unwrap();
        assert_eq!(rect.min().x, -3.0);
        assert_eq!(rect.max().y, 52.5);

        assert!(parse_bbox("1,2,3").is_err());
        assert!(parse_bbox("a,b,c,d").is_err());
        assert!(parse_bbox("0,53,1,52").is_err());
    }

    #[test]
    fn test_feature_collection_uses_lng_lat_order() {
        let now = chrono::Utc::now();
        let farm = Farm {
            id: uuid::Uuid::new_v4(),
            slug: "hollow-farm-ludlow".into(),
            name: "Hollow Farm".into(),
            description: None,
            address: "Hollow Lane".into(),
            city: Some("Ludlow".into()),
            county: "Shropshire".into(),
            postcode: "SY8 1AA".into(),
            latitude: 52.37,
            longitude: -2.72,
            phone: None,
            email: None,
            website: None,
            opening_hours: None,
            offerings: vec![],
            verified: true,
            status: crate::models::FarmStatus::Active,
            owner_email: None,
            google_place_id: None,
            created_at: now,
            updated_at: now,
            distance_km: None,
        };

        let fc = farms_to_feature_collection(&[farm]);
        let json = serde_json::to_value(&fc).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][0]["id"], "hollow-farm-ludlow");
        assert_eq!(json["features"][0]["geometry"]["coordinates"][0], -2.72);
        assert_eq!(json["features"][0]["geometry"]["coordinates"][1], 52.37);
        assert_eq!(json["features"][0]["properties"]["verified"], true);
    }
}
