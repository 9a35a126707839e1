// ********* Input data structures ***********

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One row of an election results export: the votes received by one
/// candidate of one party, in one county, for one office.
///
/// The county, office and party labels are raw strings as found in the
/// source file. They get normalized during aggregation.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub county: String,
    pub office: String,
    pub party: String,
    pub candidate: String,
    pub votes: u64,
}

/// The normalized party codes.
///
/// The mapping from raw labels is deliberately lossy: anything that is not
/// recognized (including blank labels and non-partisan markers) collapses
/// into `Oth`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Party {
    Dem,
    Rep,
    Grn,
    Lib,
    Ind,
    Con,
    Oth,
}

// ******** Output data structures *********

/// The winning side of a county contest, as determined by the signed margin.
///
/// `Tie` requires an actual two-party contest (two_party_total > 0);
/// a county with no major-party votes at all is `NotApplicable`.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Winner {
    #[serde(rename = "DEM")]
    Dem,
    #[serde(rename = "REP")]
    Rep,
    #[serde(rename = "TIE")]
    Tie,
    #[serde(rename = "N/A")]
    NotApplicable,
}

/// The competitiveness bucket of a county contest, with the display
/// attributes expected by the map front end.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Competitiveness {
    pub category: String,
    pub party: String,
    pub code: String,
    pub color: String,
}

impl Competitiveness {
    pub fn tossup() -> Competitiveness {
        Competitiveness {
            category: "Tossup".to_string(),
            party: "Tossup".to_string(),
            code: "TOSSUP".to_string(),
            color: "#f7f7f7".to_string(),
        }
    }
}

/// The aggregated outcome for one (county, contest) pair.
///
/// Invariants: `total_votes` is the sum of `all_parties`,
/// `two_party_total == dem_votes + rep_votes` and
/// `margin == dem_votes - rep_votes`.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CountyResult {
    pub county: String,
    pub contest: String,
    pub year: String,
    pub dem_candidate: String,
    pub rep_candidate: String,
    pub dem_votes: u64,
    pub rep_votes: u64,
    pub other_votes: u64,
    pub total_votes: u64,
    pub two_party_total: u64,
    pub margin: i64,
    pub margin_pct: f64,
    pub winner: Winner,
    pub competitiveness: Competitiveness,
    /// Vote totals by normalized party. Only parties that received votes in
    /// this county are present.
    pub all_parties: BTreeMap<Party, u64>,
}

/// One race within the aggregated document, keyed `{office_key}_{year}`.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contest {
    pub contest_name: String,
    pub results: BTreeMap<String, CountyResult>,
}

/// office key -> contest key -> contest. The sub-tree of the document
/// covering one election year.
pub type YearResults = BTreeMap<String, BTreeMap<String, Contest>>;

// ******** Persisted document *********

pub const STATE_NAME: &str = "Wisconsin";
pub const STATE_CODE: &str = "WI";
/// Wisconsin has 72 counties.
pub const COUNTY_COUNT: u32 = 72;
pub const DATA_SOURCE: &str = "OpenElections Wisconsin";

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub state: String,
    pub state_code: String,
    pub total_counties: u32,
    pub years_covered: Vec<u16>,
    pub data_source: String,
    pub generated_date: String,
}

/// The whole aggregated artifact. It is read, extended and rewritten in
/// full on each run; years are only ever replaced wholesale, never edited
/// field by field.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedDocument {
    pub metadata: Metadata,
    pub results_by_year: BTreeMap<String, YearResults>,
}

impl AggregatedDocument {
    pub fn new(generated_date: &str) -> AggregatedDocument {
        AggregatedDocument {
            metadata: Metadata {
                state: STATE_NAME.to_string(),
                state_code: STATE_CODE.to_string(),
                total_counties: COUNTY_COUNT,
                years_covered: Vec::new(),
                data_source: DATA_SOURCE.to_string(),
                generated_date: generated_date.to_string(),
            },
            results_by_year: BTreeMap::new(),
        }
    }

    /// Replaces the whole sub-tree for one year and recomputes the covered
    /// years. Other years are left untouched.
    pub fn merge_year(&mut self, year: u16, results: YearResults) {
        self.results_by_year.insert(year.to_string(), results);
        let mut years: Vec<u16> = self
            .results_by_year
            .keys()
            .filter_map(|k| k.parse::<u16>().ok())
            .collect();
        years.sort_unstable();
        self.metadata.years_covered = years;
    }
}
