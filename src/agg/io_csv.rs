// Primitives for reading the election results csv exports.

use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::{debug, warn};
use snafu::prelude::*;

use election_margins::RawRecord;

use crate::agg::{AggResult, CsvOpenSnafu, CsvRowSnafu};

/// Reads the raw records of one csv export.
///
/// Returns `None` when the file does not carry the expected results columns
/// (county, office, party, candidate, votes) and cannot be aggregated. Rows
/// with an unparseable vote count are skipped with a diagnostic; they never
/// abort the run.
pub fn read_records(path: &Path) -> AggResult<Option<Vec<RawRecord>>> {
    let path_str = path.display().to_string();
    let rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu {
            path: path_str.clone(),
        })?;
    read_from(rdr, &path_str)
}

fn read_from<R: Read>(mut rdr: csv::Reader<R>, path: &str) -> AggResult<Option<Vec<RawRecord>>> {
    let headers = rdr.headers().context(CsvRowSnafu { path })?.clone();
    let columns = match Columns::from_headers(&headers) {
        Some(c) => c,
        None => {
            debug!("{}: missing results columns in header {:?}", path, headers);
            return Ok(None);
        }
    };

    let mut res: Vec<RawRecord> = Vec::new();
    for (idx, row_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let row = row_r.context(CsvRowSnafu { path })?;
        let votes_raw = field(&row, columns.votes);
        let votes = match parse_votes(&votes_raw) {
            Some(v) => v,
            None => {
                warn!(
                    "{}: line {}: unparseable vote count {:?}, skipping row",
                    path, lineno, votes_raw
                );
                continue;
            }
        };
        res.push(RawRecord {
            county: field(&row, columns.county),
            office: field(&row, columns.office),
            party: field(&row, columns.party),
            candidate: field(&row, columns.candidate),
            votes,
        });
    }
    Ok(Some(res))
}

// The positions of the results columns. The ward-level exports carry more
// columns (ward, total votes, ...); they are simply ignored.
struct Columns {
    county: usize,
    office: usize,
    party: usize,
    candidate: usize,
    votes: usize,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Option<Columns> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        Some(Columns {
            county: find("county")?,
            office: find("office")?,
            party: find("party")?,
            candidate: find("candidate")?,
            votes: find("votes")?,
        })
    }
}

fn field(row: &StringRecord, idx: usize) -> String {
    row.get(idx).unwrap_or("").trim().to_string()
}

// The pdf-derived exports write thousands separators in the vote counts.
fn parse_votes(raw: &str) -> Option<u64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse::<u64>().ok()
}
