// src/services/import_service.rs
// DOCUMENTATION: Bulk farm import
// PURPOSE: Validate, clean, de-duplicate and upsert farms produced by the
// data pipeline (farms.uk.json)

use crate::db::{db_error, FarmRepository};
use crate::errors::FarmError;
use crate::models::{Farm, FarmStatus, NewFarm};
use crate::services::coverage::needs_description;
use crate::services::farm_service::farm_path;
use crate::services::geo::{farm_point, haversine_km, within_uk};
use crate::services::postcode_client::normalize_postcode;
use crate::services::slug::{farm_slug, normalize_name, slugify};
use crate::services::{IndexNowClient, PostcodeClient};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Two records with the same name closer than this are the same shop
pub const DUPLICATE_DISTANCE_KM: f64 = 0.05;

/// Records upserted between progress log lines
const UPSERT_CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportLocation {
    #[serde(default)]
    pub address: String,
    pub city: Option<String>,
    pub county: Option<String>,
    pub postcode: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportContact {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

/// One farm as produced by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmImportRecord {
    /// Pipeline id, only used in error messages
    pub id: Option<String>,
    pub name: String,
    pub slug: Option<String>,
    pub location: ImportLocation,
    #[serde(default)]
    pub contact: ImportContact,
    #[serde(default)]
    pub offerings: Vec<String>,
    pub hours: Option<Value>,
    pub description: Option<String>,
    #[serde(default)]
    pub verified: bool,
    pub place_id: Option<String>,
}

impl FarmImportRecord {
    fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{} ({})", self.name, id),
            None => self.name.clone(),
        }
    }
}

/// Body of POST /admin/import
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub farms: Vec<FarmImportRecord>,
    #[serde(default)]
    pub validate_postcodes: bool,
}

/// Import statistics
/// DOCUMENTATION: Tracks results of one import batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStats {
    /// Records in the request
    pub received: u32,
    pub created: u32,
    pub updated: u32,
    /// Invalid records and in-batch duplicates
    pub skipped: u32,
    /// Records the database refused
    pub failed: u32,
    /// Imported farms with a website but no description
    pub needs_description: u32,
    pub errors: Vec<String>,
    pub duration_seconds: u64,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl ImportStats {
    pub fn new(received: u32) -> Self {
        Self {
            received,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            needs_description: 0,
            errors: Vec::new(),
            duration_seconds: 0,
            started_at: Utc::now().to_rfc3339(),
            completed_at: None,
        }
    }

    /// Mark import as completed
    pub fn complete(&mut self, duration: u64) {
        self.duration_seconds = duration;
        self.completed_at = Some(Utc::now().to_rfc3339());
    }
}

/// Reason a record cannot be imported, if any
pub fn validate_record(record: &FarmImportRecord) -> Result<(), String> {
    if record.name.trim().is_empty() {
        return Err("missing name".to_string());
    }

    let (lat, lng) = (record.location.lat, record.location.lng);
    if !within_uk(lat, lng) {
        return Err(format!("coordinates {},{} are outside the UK", lat, lng));
    }

    Ok(())
}

/// Stand-in the scraper writes when it has no postcode
const PLACEHOLDER_POSTCODE: &str = "UK";

/// Normalize the postcode and tidy free-text fields in place
pub fn clean_record(record: &mut FarmImportRecord) {
    record.name = record.name.trim().to_string();
    record.location.postcode = record
        .location
        .postcode
        .as_deref()
        .filter(|p| !p.trim().eq_ignore_ascii_case(PLACEHOLDER_POSTCODE))
        .map(normalize_postcode)
        .filter(|p| !p.is_empty());
    record.location.county = record
        .location
        .county
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);
    record.contact.website = record
        .contact
        .website
        .as_deref()
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string);
}

/// Drop in-batch duplicates, keeping the first occurrence
/// DOCUMENTATION: Same place id, else same normalized name and postcode,
/// else same normalized name within 50 m. Returns (kept, dropped count).
pub fn dedupe(records: Vec<FarmImportRecord>) -> (Vec<FarmImportRecord>, u32) {
    let mut place_ids = HashSet::new();
    let mut name_postcodes = HashSet::new();
    let mut by_name: HashMap<String, Vec<(f64, f64)>> = HashMap::new();
    let mut kept = Vec::with_capacity(records.len());
    let mut dropped = 0;

    for record in records {
        let key = normalize_name(&record.name);
        let point = (record.location.lat, record.location.lng);

        let duplicate = match record.place_id.as_deref().filter(|p| !p.is_empty()) {
            Some(place_id) if place_ids.contains(place_id) => true,
            _ => match record.location.postcode.as_deref() {
                Some(postcode) if name_postcodes.contains(&(key.clone(), postcode.to_string())) => true,
                _ => by_name.get(&key).map_or(false, |points| {
                    points.iter().any(|&(lat, lng)| {
                        haversine_km(farm_point(lat, lng), farm_point(point.0, point.1))
                            < DUPLICATE_DISTANCE_KM
                    })
                }),
            },
        };

        if duplicate {
            log::debug!("Skipping duplicate import record {}", record.label());
            dropped += 1;
            continue;
        }

        if let Some(place_id) = record.place_id.as_deref().filter(|p| !p.is_empty()) {
            place_ids.insert(place_id.to_string());
        }
        if let Some(postcode) = record.location.postcode.as_deref() {
            name_postcodes.insert((key.clone(), postcode.to_string()));
        }
        by_name.entry(key).or_default().push(point);
        kept.push(record);
    }

    (kept, dropped)
}

/// Farm row for a clean record; `slug` is decided by the caller
fn to_new_farm(record: &FarmImportRecord, slug: String) -> NewFarm {
    NewFarm {
        slug,
        name: record.name.clone(),
        description: record
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        address: record.location.address.trim().to_string(),
        city: record.location.city.clone(),
        county: record.location.county.clone().unwrap_or_default(),
        postcode: record.location.postcode.clone().unwrap_or_default(),
        latitude: record.location.lat,
        longitude: record.location.lng,
        phone: record.contact.phone.clone(),
        email: record.contact.email.clone(),
        website: record.contact.website.clone(),
        opening_hours: record.hours.clone(),
        offerings: record.offerings.clone(),
        verified: record.verified,
        status: FarmStatus::Active,
        google_place_id: record.place_id.clone().filter(|p| !p.is_empty()),
    }
}

/// A stored farm in the pipeline's `farms.uk.json` shape
pub fn export_record(farm: &Farm) -> FarmImportRecord {
    let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());

    FarmImportRecord {
        id: Some(farm.id.to_string()),
        name: farm.name.clone(),
        slug: Some(farm.slug.clone()),
        location: ImportLocation {
            address: farm.address.clone(),
            city: farm.city.clone(),
            county: non_empty(&farm.county),
            postcode: non_empty(&farm.postcode),
            lat: farm.latitude,
            lng: farm.longitude,
        },
        contact: ImportContact {
            phone: farm.phone.clone(),
            email: farm.email.clone(),
            website: farm.website.clone(),
        },
        offerings: farm.offerings.clone(),
        hours: farm.opening_hours.clone(),
        description: farm.description.clone(),
        verified: farm.verified,
        place_id: farm.google_place_id.clone(),
    }
}

/// Slug the record asks for, or one derived from name and place
fn base_slug(record: &FarmImportRecord) -> String {
    match record.slug.as_deref().map(slugify).filter(|s| !s.is_empty()) {
        Some(slug) => slug,
        None => farm_slug(
            &record.name,
            record.location.city.as_deref(),
            record.location.county.as_deref().unwrap_or_default(),
        ),
    }
}

pub struct ImportService;

impl ImportService {
    /// Import one batch
    /// DOCUMENTATION:
    /// 1. Validate and clean each record
    /// 2. Optionally bulk-validate postcodes and backfill counties
    /// 3. Drop in-batch duplicates
    /// 4. Upsert (google_place_id when present, else slug)
    /// 5. Notify IndexNow about public farms that changed
    pub async fn import(
        pool: &PgPool,
        postcodes: &PostcodeClient,
        indexnow: &Arc<IndexNowClient>,
        req: ImportRequest,
    ) -> Result<ImportStats, FarmError> {
        let start_time = Instant::now();
        let mut stats = ImportStats::new(req.farms.len() as u32);

        log::info!("Starting import of {} farms", stats.received);

        let mut valid = Vec::with_capacity(req.farms.len());
        for mut record in req.farms {
            clean_record(&mut record);
            match validate_record(&record) {
                Ok(()) => valid.push(record),
                Err(reason) => {
                    stats.skipped += 1;
                    stats.errors.push(format!("{}: {}", record.label(), reason));
                }
            }
        }

        if req.validate_postcodes {
            Self::backfill_from_postcodes(postcodes, &mut valid, &mut stats).await;
        }

        let (records, duplicates) = dedupe(valid);
        stats.skipped += duplicates;

        let mut changed = Vec::new();
        let mut chunk_stats = vec![stats];
        for (idx, chunk) in records.chunks(UPSERT_CHUNK_SIZE).enumerate() {
            let chunk_result = Self::upsert_chunk(pool, chunk, &mut changed).await;
            log::info!(
                "Import chunk {}: {} created, {} updated, {} failed",
                idx + 1,
                chunk_result.created,
                chunk_result.updated,
                chunk_result.failed
            );
            chunk_stats.push(chunk_result);
        }

        let mut stats = Self::aggregate(&chunk_stats);

        indexnow.notify_in_background(changed);

        stats.complete(start_time.elapsed().as_secs());

        log::info!(
            "Import completed: {} created, {} updated, {} skipped, {} failed in {}s",
            stats.created,
            stats.updated,
            stats.skipped,
            stats.failed,
            stats.duration_seconds
        );

        Ok(stats)
    }

    /// Upsert one chunk of clean, de-duplicated records
    async fn upsert_chunk(pool: &PgPool, records: &[FarmImportRecord], changed: &mut Vec<String>) -> ImportStats {
        let mut stats = ImportStats::new(0);

        for record in records {
            let slug = match Self::slug_for(pool, record).await {
                Ok(slug) => slug,
                Err(e) => {
                    stats.failed += 1;
                    stats.errors.push(format!("{}: {}", record.label(), e));
                    continue;
                }
            };

            let new_farm = to_new_farm(record, slug);
            match FarmRepository::upsert_import(pool, &new_farm).await {
                Ok((farm, created)) => {
                    if created {
                        stats.created += 1;
                    } else {
                        stats.updated += 1;
                    }
                    if needs_description(farm.website.as_deref(), farm.description.as_deref()) {
                        stats.needs_description += 1;
                    }
                    if farm.is_public() {
                        changed.push(farm_path(&farm.slug));
                    }
                }
                Err(e) => {
                    stats.failed += 1;
                    let error_msg = format!("Failed to store {}: {}", record.label(), e);
                    log::warn!("{}", error_msg);
                    stats.errors.push(error_msg);
                }
            }
        }

        stats
    }

    /// Existing slug for a known place, otherwise a free one
    /// DOCUMENTATION: Records without a place id upsert on their slug, so
    /// re-importing the same record updates it instead of creating a copy
    async fn slug_for(pool: &PgPool, record: &FarmImportRecord) -> Result<String, FarmError> {
        let base = base_slug(record);

        let Some(place_id) = record.place_id.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(base);
        };

        if let Some(existing) = FarmRepository::get_by_place_id(pool, place_id).await? {
            return Ok(existing.slug);
        }

        let mut conn = pool.acquire().await.map_err(db_error("Acquire connection failed"))?;
        FarmRepository::next_free_slug(&mut conn, &base).await
    }

    /// Canonical postcodes and missing counties from postcodes.io
    /// DOCUMENTATION: Records without a postcode get the nearest one to
    /// their coordinates. Lookup failures are recorded and the batch
    /// continues with the data it has.
    async fn backfill_from_postcodes(
        postcodes: &PostcodeClient,
        records: &mut [FarmImportRecord],
        stats: &mut ImportStats,
    ) {
        for record in records.iter_mut().filter(|r| r.location.postcode.is_none()) {
            match postcodes.nearest_postcode(record.location.lat, record.location.lng).await {
                Ok(Some(info)) => {
                    log::debug!("Nearest postcode for {} is {}", record.label(), info.postcode);
                    if record.location.county.is_none() {
                        record.location.county = info.county().map(str::to_string);
                    }
                    record.location.postcode = Some(info.postcode);
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Reverse postcode lookup unavailable: {}", e);
                    stats.errors.push(format!("reverse postcode lookup skipped: {}", e));
                    break;
                }
            }
        }

        let queries: Vec<String> = records
            .iter()
            .filter_map(|r| r.location.postcode.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        if queries.is_empty() {
            return;
        }

        let results = match postcodes.bulk_validate(&queries).await {
            Ok(results) => results,
            Err(e) => {
                log::warn!("Postcode validation unavailable: {}", e);
                stats.errors.push(format!("postcode validation skipped: {}", e));
                return;
            }
        };

        let lookup: HashMap<String, _> = results
            .into_iter()
            .map(|r| (normalize_postcode(&r.query), r.info))
            .collect();

        for record in records.iter_mut() {
            let Some(postcode) = record.location.postcode.clone() else {
                continue;
            };

            match lookup.get(&postcode) {
                Some(Some(info)) => {
                    record.location.postcode = Some(info.postcode.clone());
                    if record.location.county.is_none() {
                        record.location.county = info.county().map(str::to_string);
                    }
                }
                Some(None) => {
                    log::debug!("Unknown postcode {} for {}", postcode, record.label());
                }
                None => {}
            }
        }
    }

    /// Every active farm as import records, ordered by name
    /// DOCUMENTATION: The output feeds straight back into `import`
    pub async fn export(pool: &PgPool) -> Result<Vec<FarmImportRecord>, FarmError> {
        let farms = FarmRepository::list_for_map(pool, None).await?;
        log::info!("Exporting {} active farms", farms.len());
        Ok(farms.iter().map(export_record).collect())
    }

    /// Combine stats from several batches
    pub fn aggregate(stats_list: &[ImportStats]) -> ImportStats {
        let mut aggregated = ImportStats::new(0);

        for stats in stats_list {
            aggregated.received += stats.received;
            aggregated.created += stats.created;
            aggregated.updated += stats.updated;
            aggregated.skipped += stats.skipped;
            aggregated.failed += stats.failed;
            aggregated.needs_description += stats.needs_description;
            aggregated.duration_seconds += stats.duration_seconds;
            aggregated.errors.extend(stats.errors.iter().cloned());
        }

        if let Some(first) = stats_list.first() {
            aggregated.started_at = first.started_at.clone();
        }
        aggregated.completed_at = Some(Utc::now().to_rfc3339());
        aggregated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(name: &str, postcode: Option<&str>, lat: f64, lng: f64, place_id: Option<&str>) -> FarmImportRecord {
        FarmImportRecord {
            id: None,
            name: name.to_string(),
            slug: None,
            location: ImportLocation {
                address: "Hollow Lane".into(),
                city: Some("Ludlow".into()),
                county: Some("Shropshire".into()),
                postcode: postcode.map(str::to_string),
                lat,
                lng,
            },
            contact: ImportContact::default(),
            offerings: vec![],
            hours: None,
            description: None,
            verified: false,
            place_id: place_id.map(str::to_string),
        }
    }

    #[test]
    fn test_validate_record() {
        assert!(validate_record(&record("Hollow Farm", None, 52.37, -2.72, None)).is_ok());
        assert!(validate_record(&record("  ", None, 52.37, -2.72, None)).is_err());
        // Paris
        assert!(validate_record(&record("Ferme", None, 48.85, 2.35, None)).is_err());
    }

    #[test]
    fn test_clean_record_normalizes_postcode() {
        let mut r = record(" Hollow Farm ", Some("sy81aa"), 52.37, -2.72, None);
        r.location.county = Some("  ".into());
        clean_record(&mut r);

        assert_eq!(r.name, "Hollow Farm");
        assert_eq!(r.location.postcode.as_deref(), Some("SY8 1AA"));
        assert_eq!(r.location.county, None);

        let mut r = record("Hollow Farm", Some(" uk "), 52.37, -2.72, None);
        clean_record(&mut r);
        assert_eq!(r.location.postcode, None);
    }

    #[test]
    fn test_dedupe_rules() {
        let records = vec![
            record("Hollow Farm", Some("SY8 1AA"), 52.3700, -2.7200, Some("p1")),
            // same place id
            record("Hollow Farm Shop", Some("SY8 2BB"), 53.0, -2.0, Some("p1")),
            // same name and postcode
            record("The Hollow Farm", Some("SY8 1AA"), 52.5, -2.5, None),
            // same name about 20 m away
            record("Hollow Farm Ltd", None, 52.3702, -2.7200, None),
            // same name far away
            record("Hollow Farm", None, 51.0, -1.0, None),
            record("Green Acres", Some("SY8 1AA"), 52.3700, -2.7200, None),
        ];

        let (kept, dropped) = dedupe(records);
        assert_eq!(dropped, 3);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[1].location.lat, 51.0);
        assert_eq!(kept[2].name, "Green Acres");
    }

    #[test]
    fn test_to_new_farm() {
        let mut r = record("Hollow Farm", Some("SY8 1AA"), 52.37, -2.72, Some(""));
        r.description = Some("  ".into());
        let farm = to_new_farm(&r, base_slug(&r));

        assert_eq!(farm.slug, "hollow-farm-ludlow");
        assert_eq!(farm.description, None);
        assert_eq!(farm.google_place_id, None);
        assert_eq!(farm.status, FarmStatus::Active);

        r.slug = Some("Hollow Farm Shop".into());
        assert_eq!(base_slug(&r), "hollow-farm-shop");
    }

    #[test]
    fn test_export_round_trips_through_import() {
        let farm = Farm {
            id: Uuid::new_v4(),
            slug: "hollow-farm-ludlow".into(),
            name: "Hollow Farm".into(),
            description: Some("Eggs, lamb and seasonal veg.".into()),
            address: "Hollow Lane".into(),
            city: Some("Ludlow".into()),
            county: "Shropshire".into(),
            postcode: "SY8 1AA".into(),
            latitude: 52.37,
            longitude: -2.72,
            phone: Some("01584 000000".into()),
            email: None,
            website: Some("https://hollowfarm.co.uk".into()),
            opening_hours: Some(serde_json::json!({"sat": "9-5"})),
            offerings: vec!["eggs".into(), "lamb".into()],
            verified: true,
            status: FarmStatus::Active,
            owner_email: Some("owner@hollowfarm.co.uk".into()),
            google_place_id: Some("ChIJ123".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            distance_km: None,
        };

        let exported = serde_json::to_value(vec![export_record(&farm)]).unwrap();
        assert!(exported[0].get("owner_email").is_none());

        let req: ImportRequest = serde_json::from_value(serde_json::json!({ "farms": exported })).unwrap();
        let mut record = req.farms.into_iter().next().unwrap();
        clean_record(&mut record);
        assert!(validate_record(&record).is_ok());

        let new_farm = to_new_farm(&record, base_slug(&record));
        assert_eq!(new_farm.slug, farm.slug);
        assert_eq!(new_farm.postcode, farm.postcode);
        assert_eq!(new_farm.county, farm.county);
        assert_eq!(new_farm.description, farm.description);
        assert_eq!(new_farm.offerings, farm.offerings);
        assert_eq!(new_farm.opening_hours, farm.opening_hours);
        assert_eq!(new_farm.google_place_id, farm.google_place_id);
        assert!(new_farm.verified);
    }

    #[test]
    fn test_aggregate() {
        let mut a = ImportStats::new(10);
        a.created = 6;
        a.skipped = 4;
        a.errors.push("x".into());
        let mut b = ImportStats::new(5);
        b.updated = 4;
        b.failed = 1;
        b.needs_description = 2;

        let total = ImportService::aggregate(&[a, b]);
        assert_eq!(total.received, 15);
        assert_eq!(total.created, 6);
        assert_eq!(total.updated, 4);
        assert_eq!(total.skipped, 4);
        assert_eq!(total.failed, 1);
        assert_eq!(total.needs_description, 2);
        assert_eq!(total.errors, vec!["x"]);
        assert!(total.completed_at.is_some());
    }
}
