//! Registry of recurring, individually identified animals.
//!
//! Identities are partitioned into buckets keyed by (tenant, species). The
//! outer map lock is only held to find or insert a bucket; every mutation of a
//! bucket happens under that bucket's own mutex, so workers generating
//! different tenants or species never contend.

use crate::error::{GeneratorError, Result};
use crate::random::SimRng;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Number of recent media ids kept per identity.
pub const MATCH_HISTORY_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub species: String,
    pub sex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    pub historical_matches: u32,
    pub match_media_ids: Vec<String>,
}

/// Names available for one sex of a species.
#[derive(Debug, Clone, Copy)]
pub struct NamePool {
    pub sex: &'static str,
    pub names: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BucketKey {
    pub tenant_id: String,
    pub species: String,
}

impl BucketKey {
    pub fn new(tenant_id: &str, species: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            species: species.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Bucket {
    identities: Vec<Identity>,
    minted: u32,
}

impl Bucket {
    fn reuse_candidate(&self, rng: &mut SimRng, exclude: &[String]) -> Option<usize> {
        let mut candidates: Vec<usize> = (0..self.identities.len())
            .filter(|i| !exclude.contains(&self.identities[*i].id))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        // Most recently seen first; never-seen identities last, then by id
        candidates.sort_by(|a, b| {
            let (a, b) = (&self.identities[*a], &self.identities[*b]);
            b.last_seen.cmp(&a.last_seen).then_with(|| a.id.cmp(&b.id))
        });
        let weights = (0..candidates.len()).map(|rank| 1.0 / (rank as f64 + 1.0));
        let dist = WeightedIndex::new(weights).ok()?;
        Some(candidates[dist.sample(rng)])
    }

    fn mint(&mut self, species: &str, pools: &[NamePool], rng: &mut SimRng) -> Result<usize> {
        let pool = *pools
            .choose(rng)
            .ok_or_else(|| GeneratorError::invariant(format!("species {species} has no name pools")))?;
        let name = self.next_name(&pool);

        self.minted += 1;
        self.identities.push(Identity {
            id: format!("{}-{:03}", species, self.minted),
            name,
            species: species.to_string(),
            sex: pool.sex.to_string(),
            first_seen: None,
            last_seen: None,
            historical_matches: 0,
            match_media_ids: Vec::new(),
        });
        Ok(self.identities.len() - 1)
    }

    /// First unused name of the pool; once every name is taken, names repeat
    /// with a round number appended ("Big Eight 2").
    fn next_name(&self, pool: &NamePool) -> String {
        if pool.names.is_empty() {
            return format!("{} {}", pool.sex, self.minted + 1);
        }
        let taken = |candidate: &str| self.identities.iter().any(|i| i.name == candidate);
        let mut round = 1u32;
        loop {
            for base in pool.names {
                let candidate = if round == 1 {
                    base.to_string()
                } else {
                    format!("{base} {round}")
                };
                if !taken(&candidate) {
                    return candidate;
                }
            }
            round += 1;
        }
    }

    fn sighting(&mut self, index: usize, timestamp: DateTime<Utc>, media_id: &str) -> Identity {
        let identity = &mut self.identities[index];
        identity.first_seen = Some(identity.first_seen.map_or(timestamp, |t| t.min(timestamp)));
        identity.last_seen = Some(identity.last_seen.map_or(timestamp, |t| t.max(timestamp)));
        identity.historical_matches += 1;
        identity.match_media_ids.push(media_id.to_string());
        if identity.match_media_ids.len() > MATCH_HISTORY_LEN {
            let excess = identity.match_media_ids.len() - MATCH_HISTORY_LEN;
            identity.match_media_ids.drain(..excess);
        }
        identity.clone()
    }

    fn choose(
        &mut self,
        species: &str,
        pools: &[NamePool],
        recurrence_probability: f64,
        exclude: &[String],
        rng: &mut SimRng,
    ) -> Result<usize> {
        if rng.gen_bool(recurrence_probability.clamp(0.0, 1.0)) {
            if let Some(index) = self.reuse_candidate(rng, exclude) {
                return Ok(index);
            }
        }
        self.mint(species, pools, rng)
    }
}

/// Process-scoped store of identities. One registry per generation run,
/// shared by `Arc` across workers.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    buckets: RwLock<HashMap<BucketKey, Arc<Mutex<Bucket>>>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, key: &BucketKey) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self.buckets.read().get(key) {
            return Arc::clone(bucket);
        }
        let mut buckets = self.buckets.write();
        Arc::clone(buckets.entry(key.clone()).or_default())
    }

    fn existing_bucket(&self, key: &BucketKey) -> Option<Arc<Mutex<Bucket>>> {
        self.buckets.read().get(key).map(Arc::clone)
    }

    /// Reuse an identity of the bucket with `recurrence_probability`,
    /// otherwise mint a new one from the species name pools.
    pub fn get_or_create(
        &self,
        tenant_id: &str,
        species: &str,
        pools: &[NamePool],
        rng: &mut SimRng,
        recurrence_probability: f64,
    ) -> Result<Identity> {
        let key = BucketKey::new(tenant_id, species);
        let bucket = self.bucket(&key);
        let mut bucket = bucket.lock();
        let index = bucket.choose(species, pools, recurrence_probability, &[], rng)?;
        Ok(bucket.identities[index].clone())
    }

    /// Record that `identity_id` appeared in `media_id` at `timestamp`.
    pub fn record_sighting(
        &self,
        tenant_id: &str,
        species: &str,
        identity_id: &str,
        timestamp: DateTime<Utc>,
        media_id: &str,
    ) -> Result<Identity> {
        let key = BucketKey::new(tenant_id, species);
        let unknown = || {
            GeneratorError::invariant(format!(
                "unknown identity {identity_id} for tenant {tenant_id} species {species}"
            ))
        };

        let bucket = self.existing_bucket(&key).ok_or_else(unknown)?;
        let mut bucket = bucket.lock();
        let index = bucket
            .identities
            .iter()
            .position(|i| i.id == identity_id)
            .ok_or_else(unknown)?;
        Ok(bucket.sighting(index, timestamp, media_id))
    }

    /// Get-or-create and record a sighting in one critical section.
    ///
    /// Identities listed in `exclude` (already present in the same frame) are
    /// not reused.
    #[allow(clippy::too_many_arguments)]
    pub fn observe(
        &self,
        tenant_id: &str,
        species: &str,
        pools: &[NamePool],
        timestamp: DateTime<Utc>,
        media_id: &str,
        recurrence_probability: f64,
        exclude: &[String],
        rng: &mut SimRng,
    ) -> Result<Identity> {
        let key = BucketKey::new(tenant_id, species);
        let bucket = self.bucket(&key);
        let mut bucket = bucket.lock();
        let index = bucket.choose(species, pools, recurrence_probability, exclude, rng)?;
        Ok(bucket.sighting(index, timestamp, media_id))
    }

    /// All identities, ordered by bucket then id.
    pub fn snapshot(&self) -> Vec<(BucketKey, Identity)> {
        let buckets: Vec<(BucketKey, Arc<Mutex<Bucket>>)> = self
            .buckets
            .read()
            .iter()
            .map(|(k, b)| (k.clone(), Arc::clone(b)))
            .collect();

        let mut all: Vec<(BucketKey, Identity)> = buckets
            .into_iter()
            .flat_map(|(key, bucket)| {
                let identities = bucket.lock().identities.clone();
                identities.into_iter().map(move |i| (key.clone(), i))
            })
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        all
    }

    pub fn len(&self) -> usize {
        self.buckets
            .read()
            .values()
            .map(|b| b.lock().identities.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rng_from_seed;
    use chrono::{Duration, TimeZone};

    const POOLS: &[NamePool] = &[
        NamePool {
            sex: "buck",
            names: &["Big Eight", "Wide Spread"],
        },
        NamePool {
            sex: "doe",
            names: &["Lead Doe"],
        },
    ];

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_new_identity_ids_are_sequential_per_bucket() {
        let registry = IdentityRegistry::new();
        let mut rng = rng_from_seed(1);

        let a = registry.get_or_create("tenant-001", "whitetail", POOLS, &mut rng, 0.0).unwrap();
        let b = registry.get_or_create("tenant-001", "whitetail", POOLS, &mut rng, 0.0).unwrap();
        let other = registry.get_or_create("tenant-002", "whitetail", POOLS, &mut rng, 0.0).unwrap();

        assert_eq!(a.id, "whitetail-001");
        assert_eq!(b.id, "whitetail-002");
        assert_eq!(other.id, "whitetail-001");
        assert_eq!(a.historical_matches, 0);
        assert!(a.first_seen.is_none());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_names_follow_sex_pool_and_suffix_when_exhausted() {
        let registry = IdentityRegistry::new();
        let mut rng = rng_from_seed(2);
        let mut names = Vec::new();
        for _ in 0..12 {
            let identity = registry.get_or_create("t", "whitetail", POOLS, &mut rng, 0.0).unwrap();
            let pool = POOLS.iter().find(|p| p.sex == identity.sex).unwrap();
            assert!(pool.names.iter().any(|n| identity.name.starts_with(n)));
            names.push(identity.name);
        }
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
        assert!(names.iter().any(|n| n.ends_with(" 2")));
    }

    #[test]
    fn test_full_recurrence_reuses_existing() {
        let registry = IdentityRegistry::new();
        let mut rng = rng_from_seed(3);
        let first = registry.get_or_create("t", "coyote", POOLS, &mut rng, 1.0).unwrap();
        for _ in 0..20 {
            let again = registry.get_or_create("t", "coyote", POOLS, &mut rng, 1.0).unwrap();
            assert_eq!(again.id, first.id);
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_record_sighting_folds_bounds() {
        let registry = IdentityRegistry::new();
        let mut rng = rng_from_seed(4);
        let identity = registry.get_or_create("t", "whitetail", POOLS, &mut rng, 0.0).unwrap();

        let middle = t0();
        let late = t0() + Duration::days(3);
        let early = t0() - Duration::days(2);
        registry.record_sighting("t", "whitetail", &identity.id, middle, "media-1").unwrap();
        registry.record_sighting("t", "whitetail", &identity.id, late, "media-2").unwrap();
        let updated = registry
            .record_sighting("t", "whitetail", &identity.id, early, "media-3")
            .unwrap();

        assert_eq!(updated.first_seen, Some(early));
        assert_eq!(updated.last_seen, Some(late));
        assert_eq!(updated.historical_matches, 3);
        assert_eq!(updated.match_media_ids, vec!["media-1", "media-2", "media-3"]);
    }

    #[test]
    fn test_match_history_is_bounded() {
        let registry = IdentityRegistry::new();
        let mut rng = rng_from_seed(5);
        let identity = registry.get_or_create("t", "bobcat", POOLS, &mut rng, 0.0).unwrap();
        let mut last = identity.clone();
        for i in 0..8 {
            last = registry
                .record_sighting("t", "bobcat", &identity.id, t0(), &format!("media-{i}"))
                .unwrap();
        }
        assert_eq!(last.match_media_ids.len(), MATCH_HISTORY_LEN);
        assert_eq!(last.match_media_ids[0], "media-3");
        assert_eq!(last.match_media_ids[4], "media-7");
        assert_eq!(last.historical_matches, 8);
    }

    #[test]
    fn test_unknown_identity_is_invariant_error() {
        let registry = IdentityRegistry::new();
        let err = registry
            .record_sighting("t", "whitetail", "whitetail-999", t0(), "media-1")
            .unwrap_err();
        assert!(matches!(err, GeneratorError::GenerationInvariant(_)));

        let mut rng = rng_from_seed(6);
        registry.get_or_create("t", "whitetail", POOLS, &mut rng, 0.0).unwrap();
        let err = registry
            .record_sighting("t", "whitetail", "whitetail-999", t0(), "media-1")
            .unwrap_err();
        assert!(matches!(err, GeneratorError::GenerationInvariant(_)));
    }

    #[test]
    fn test_observe_excludes_identities_in_frame() {
        let registry = IdentityRegistry::new();
        let mut rng = rng_from_seed(7);
        let first = registry
            .observe("t", "axis", POOLS, t0(), "media-1", 1.0, &[], &mut rng)
            .unwrap();
        let second = registry
            .observe("t", "axis", POOLS, t0(), "media-1", 1.0, &[first.id.clone()], &mut rng)
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(second.historical_matches, 1);
    }

    #[test]
    fn test_reuse_prefers_recent_individuals() {
        let registry = IdentityRegistry::new();
        let mut rng = rng_from_seed(8);
        let old = registry.observe("t", "axis", POOLS, t0(), "m-0", 0.0, &[], &mut rng).unwrap();
        let recent = registry
            .observe("t", "axis", POOLS, t0() + Duration::days(5), "m-1", 0.0, &[], &mut rng)
            .unwrap();

        let mut recent_hits = 0;
        let mut old_hits = 0;
        for _ in 0..2_000 {
            let chosen = registry.get_or_create("t", "axis", POOLS, &mut rng, 1.0).unwrap();
            if chosen.id == recent.id {
                recent_hits += 1;
            } else if chosen.id == old.id {
                old_hits += 1;
            }
        }
        // Weights 1 and 1/2
        assert!(recent_hits > old_hits);
        assert_eq!(recent_hits + old_hits, 2_000);
    }

    #[test]
    fn test_concurrent_observations_are_all_counted() {
        let registry = Arc::new(IdentityRegistry::new());
        let handles: Vec<_> = (0..8u64)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut rng = rng_from_seed(worker);
                    for i in 0..250 {
                        registry
                            .observe(
                                "t",
                                "nilgai",
                                POOLS,
                                t0() + Duration::minutes(i),
                                &format!("media-{worker}-{i}"),
                                0.9,
                                &[],
                                &mut rng,
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let total: u32 = registry.snapshot().iter().map(|(_, i)| i.historical_matches).sum();
        assert_eq!(total, 2_000);
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = IdentityRegistry::new();
        let mut rng = rng_from_seed(9);
        registry.get_or_create("tenant-b", "ibex", POOLS, &mut rng, 0.0).unwrap();
        registry.get_or_create("tenant-a", "ibex", POOLS, &mut rng, 0.0).unwrap();
        registry.get_or_create("tenant-a", "addax", POOLS, &mut rng, 0.0).unwrap();

        let keys: Vec<(String, String)> = registry
            .snapshot()
            .into_iter()
            .map(|(k, i)| (k.tenant_id, i.id))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("tenant-a".to_string(), "addax-001".to_string()),
                ("tenant-a".to_string(), "ibex-001".to_string()),
                ("tenant-b".to_string(), "ibex-001".to_string()),
            ]
        );
    }
}
