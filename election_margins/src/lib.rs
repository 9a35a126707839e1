mod config;
use log::{debug, info};

use std::collections::{BTreeMap, HashMap};

pub use crate::config::*;

// **** Normalization ****

/// Normalizes a raw county label: trims whitespace, strips a trailing
/// "County" word (case-insensitively) and title-cases the rest.
///
/// Returns `None` for blank input; callers are expected to skip such rows.
///
/// ```
/// use election_margins::normalize_county;
///
/// assert_eq!(normalize_county("Dane County"), Some("Dane".to_string()));
/// assert_eq!(normalize_county("  milwaukee "), Some("Milwaukee".to_string()));
/// assert_eq!(normalize_county(""), None);
/// ```
pub fn normalize_county(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() > 1 {
        if let Some(last) = words.last() {
            if last.eq_ignore_ascii_case("county") {
                words.pop();
            }
        }
    }
    let titled: Vec<String> = words.iter().map(|w| title_case_word(w)).collect();
    Some(titled.join(" "))
}

// Title-cases one word: the first letter and every letter following a
// non-alphabetic character are upper-cased ("st." -> "St.", "o'brien" -> "O'Brien").
fn title_case_word(word: &str) -> String {
    let mut res = String::with_capacity(word.len());
    let mut upper_next = true;
    for c in word.chars() {
        if c.is_alphabetic() {
            if upper_next {
                res.extend(c.to_uppercase());
            } else {
                res.extend(c.to_lowercase());
            }
            upper_next = false;
        } else {
            res.push(c);
            upper_next = true;
        }
    }
    res
}

/// The fixed lookup tables used during aggregation: raw party labels to
/// normalized party codes, and recognized statewide office labels to the
/// office keys of the aggregated document.
///
/// The tables are immutable once built. `Normalizer::new` loads the
/// standard OpenElections tables.
pub struct Normalizer {
    parties: HashMap<String, Party>,
    offices: HashMap<String, String>,
}

impl Normalizer {
    pub fn new() -> Normalizer {
        let parties: HashMap<String, Party> = [
            ("DEM", Party::Dem),
            ("DEMOCRATIC", Party::Dem),
            ("D", Party::Dem),
            // Minnesota labeling, seen in a few border-county exports.
            ("DFL", Party::Dem),
            ("REP", Party::Rep),
            ("REPUBLICAN", Party::Rep),
            ("R", Party::Rep),
            ("GRN", Party::Grn),
            // Wisconsin Green
            ("WGR", Party::Grn),
            ("GREEN", Party::Grn),
            ("LIB", Party::Lib),
            ("LIBERTARIAN", Party::Lib),
            ("IND", Party::Ind),
            ("INDEPENDENT", Party::Ind),
            ("CON", Party::Con),
            ("CONSTITUTION", Party::Con),
            // Non-partisan rows carry no usable party signal.
            ("NP", Party::Oth),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();

        let offices: HashMap<String, String> = [
            ("President", "presidential"),
            ("U.S. Senate", "us_senate"),
            // OpenElections format
            ("Senate", "us_senate"),
            ("Governor", "governor"),
            ("Attorney General", "attorney_general"),
            ("Secretary of State", "secretary_of_state"),
            ("State Treasurer", "state_treasurer"),
            ("Lieutenant Governor", "lieutenant_governor"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Normalizer { parties, offices }
    }

    /// Normalizes a raw party label. Total: any unrecognized or blank label
    /// maps to `Party::Oth`.
    pub fn normalize_party(&self, raw: &str) -> Party {
        let key = raw.trim().to_uppercase();
        if key.is_empty() {
            return Party::Oth;
        }
        self.parties.get(&key).copied().unwrap_or(Party::Oth)
    }

    /// The office key for a recognized statewide office label, or `None`
    /// for offices that are excluded from aggregation.
    pub fn office_key(&self, office: &str) -> Option<&str> {
        self.offices.get(office.trim()).map(String::as_str)
    }
}

impl Default for Normalizer {
    fn default() -> Normalizer {
        Normalizer::new()
    }
}

// **** Competitiveness classification ****

// (lower bound, label, code, color) per bucket, evaluated top-down with
// inclusive lower bounds: exactly 40.00 is Annihilation, exactly 30.00 is
// Dominant, and so on. Below 0.5 everything is a tossup.
const DEM_BUCKETS: [(f64, &str, &str, &str); 7] = [
    (40.0, "Annihilation", "D_ANNIHILATION", "#08306b"),
    (30.0, "Dominant", "D_DOMINANT", "#08519c"),
    (20.0, "Stronghold", "D_STRONGHOLD", "#3182bd"),
    (10.0, "Safe", "D_SAFE", "#6baed6"),
    (5.5, "Likely", "D_LIKELY", "#9ecae1"),
    (1.0, "Lean", "D_LEAN", "#c6dbef"),
    (0.5, "Tilt", "D_TILT", "#e1f5fe"),
];

const REP_BUCKETS: [(f64, &str, &str, &str); 7] = [
    (40.0, "Annihilation", "R_ANNIHILATION", "#67000d"),
    (30.0, "Dominant", "R_DOMINANT", "#a50f15"),
    (20.0, "Stronghold", "R_STRONGHOLD", "#cb181d"),
    (10.0, "Safe", "R_SAFE", "#ef3b2c"),
    (5.5, "Likely", "R_LIKELY", "#fb6a4a"),
    (1.0, "Lean", "R_LEAN", "#fcae91"),
    (0.5, "Tilt", "R_TILT", "#fee8c8"),
];

/// Classifies how decisively a county favored one party, from the absolute
/// margin percentage and the winning side. Ties and contests without a
/// two-party outcome are tossups.
pub fn classify(margin_pct: f64, winner: Winner) -> Competitiveness {
    let (party, buckets) = match winner {
        Winner::Dem => ("Democratic", &DEM_BUCKETS),
        Winner::Rep => ("Republican", &REP_BUCKETS),
        Winner::Tie | Winner::NotApplicable => return Competitiveness::tossup(),
    };
    let abs_margin = margin_pct.abs();
    for (floor, label, code, color) in buckets.iter() {
        if abs_margin >= *floor {
            return Competitiveness {
                category: format!("{} {}", label, party),
                party: party.to_string(),
                code: (*code).to_string(),
                color: (*color).to_string(),
            };
        }
    }
    Competitiveness::tossup()
}

// **** Aggregation ****

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Aggregates the raw records of one office within one year into a per-county
/// contest.
///
/// Records are partitioned by their raw county label; rows whose county
/// cannot be normalized are dropped. Within each county, votes are summed by
/// normalized party and the first-seen candidate name of each major party is
/// kept as the display candidate.
///
/// The margin percentage uses `total_votes` (all parties) as denominator, so
/// that third-party heavy contests are not overstated.
///
/// ```
/// use election_margins::{aggregate_contest, Normalizer, RawRecord, Winner};
///
/// let rows = vec![RawRecord {
///     county: "Dane County".to_string(),
///     office: "President".to_string(),
///     party: "DEM".to_string(),
///     candidate: "Cand A".to_string(),
///     votes: 1000,
/// }];
/// let contest = aggregate_contest(&rows, "President", 2024, &Normalizer::new());
/// assert_eq!(contest.results["Dane"].winner, Winner::Dem);
/// ```
pub fn aggregate_contest(
    records: &[RawRecord],
    contest_name: &str,
    year: u16,
    norm: &Normalizer,
) -> Contest {
    info!(
        "aggregate_contest: {} {}: {} input rows",
        contest_name,
        year,
        records.len()
    );

    // Partition by raw county label, keeping the first-seen label order so
    // that a collision of normalized names resolves deterministically.
    let mut county_order: Vec<String> = Vec::new();
    let mut by_county: HashMap<String, Vec<&RawRecord>> = HashMap::new();
    for r in records.iter() {
        if !by_county.contains_key(&r.county) {
            county_order.push(r.county.clone());
        }
        by_county.entry(r.county.clone()).or_default().push(r);
    }

    let mut results: BTreeMap<String, CountyResult> = BTreeMap::new();
    for raw_county in county_order.iter() {
        let county = match normalize_county(raw_county) {
            Some(c) => c,
            None => {
                debug!(
                    "aggregate_contest: dropping {} rows with blank county label",
                    by_county[raw_county].len()
                );
                continue;
            }
        };
        let rows = &by_county[raw_county];

        let mut party_votes: BTreeMap<Party, u64> = BTreeMap::new();
        let mut dem_candidate = String::new();
        let mut rep_candidate = String::new();
        for r in rows.iter() {
            let party = norm.normalize_party(&r.party);
            *party_votes.entry(party).or_insert(0) += r.votes;
            let candidate = r.candidate.trim();
            match party {
                Party::Dem if dem_candidate.is_empty() && !candidate.is_empty() => {
                    dem_candidate = candidate.to_string();
                }
                Party::Rep if rep_candidate.is_empty() && !candidate.is_empty() => {
                    rep_candidate = candidate.to_string();
                }
                _ => {}
            }
        }
        // Only keep parties that actually received votes in this county.
        party_votes.retain(|_, v| *v > 0);

        let dem_votes = party_votes.get(&Party::Dem).copied().unwrap_or(0);
        let rep_votes = party_votes.get(&Party::Rep).copied().unwrap_or(0);
        let total_votes: u64 = party_votes.values().sum();
        let other_votes = total_votes - dem_votes - rep_votes;
        let two_party_total = dem_votes + rep_votes;
        let margin = dem_votes as i64 - rep_votes as i64;

        let (margin_pct, winner) = if total_votes > 0 {
            let pct = round2(margin as f64 / total_votes as f64 * 100.0);
            let winner = if margin > 0 {
                Winner::Dem
            } else if margin < 0 {
                Winner::Rep
            } else if two_party_total > 0 {
                Winner::Tie
            } else {
                Winner::NotApplicable
            };
            (pct, winner)
        } else {
            (0.0, Winner::NotApplicable)
        };

        let competitiveness = classify(margin_pct, winner);
        debug!(
            "aggregate_contest: {} {}: {:?} margin_pct {}",
            county, year, winner, margin_pct
        );

        results.insert(
            county.clone(),
            CountyResult {
                county,
                contest: contest_name.to_string(),
                year: year.to_string(),
                dem_candidate,
                rep_candidate,
                dem_votes,
                rep_votes,
                other_votes,
                total_votes,
                two_party_total,
                margin,
                margin_pct,
                winner,
                competitiveness,
                all_parties: party_votes,
            },
        );
    }

    Contest {
        contest_name: contest_name.to_string(),
        results,
    }
}
