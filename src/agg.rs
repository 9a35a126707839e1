// Aggregation pipeline: discovers the election exports, aggregates them by
// county through the election_margins library and merges the outcome into
// the persistent json document.

pub mod document;
pub mod io_csv;

use log::{info, warn};
use snafu::{prelude::*, Snafu};

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use election_margins::*;
use text_diff::print_diff;

use crate::args::Args;

#[derive(Debug, Snafu)]
pub enum AggError {
    #[snafu(display("Error opening csv file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading a csv row in {path}"))]
    CsvRow { source: csv::Error, path: String },
    #[snafu(display("Error listing the data directory {path}"))]
    ListingData {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading file {path}"))]
    ReadingDocument {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing json document {path}"))]
    ParsingDocument {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingDocument {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error serializing the aggregated document"))]
    SerializingDocument { source: serde_json::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AggResult<T> = Result<T, AggError>;

pub fn run_aggregation(args: &Args) -> AggResult<()> {
    let norm = Normalizer::new();
    let inputs = collect_inputs(args)?;
    if inputs.is_empty() {
        whatever!("No election csv files found under {}", args.data_dir);
    }

    let generated_date = chrono::Local::now().format("%Y-%m-%d").to_string();
    let out_path = Path::new(&args.out);
    let mut doc = document::load_document(out_path, &generated_date)?;

    // Several files may cover the same year (e.g. a ward-level export plus a
    // county-level one for the races it lacks); their office trees are folded
    // together before the whole-year merge into the document.
    let mut per_year: BTreeMap<u16, YearResults> = BTreeMap::new();
    for (year, path) in inputs.iter() {
        info!("{}: processing {}", year, path.display());
        let records = match io_csv::read_records(path)? {
            Some(records) => records,
            None => {
                if args.input.is_some() {
                    whatever!(
                        "{} does not look like an election results export",
                        path.display()
                    );
                }
                warn!(
                    "{}: not an election results export, skipping",
                    path.display()
                );
                continue;
            }
        };
        let year_results = aggregate_file(&records, *year, &norm);
        if year_results.is_empty() {
            warn!("{}: no statewide races found", path.display());
            continue;
        }
        fold_year_results(per_year.entry(*year).or_default(), year_results);
    }

    for (year, tree) in per_year {
        doc.merge_year(year, tree);
    }

    document::save_document(&doc, out_path)?;
    log_summary(&doc);

    if let Some(reference) = &args.reference {
        check_reference(&doc, reference)?;
    }
    Ok(())
}

// The input files with the election year each one covers.
fn collect_inputs(args: &Args) -> AggResult<Vec<(u16, PathBuf)>> {
    if let Some(input) = &args.input {
        let path = PathBuf::from(input);
        if !path.is_file() {
            whatever!("Input file not found: {}", input);
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        let year = match args.year.or_else(|| year_from_filename(name)) {
            Some(y) => y,
            None => {
                whatever!(
                    "Cannot determine the election year of {}; pass --year",
                    input
                )
            }
        };
        return Ok(vec![(year, path)]);
    }
    discover_csv_files(Path::new(&args.data_dir))
}

fn discover_csv_files(data_dir: &Path) -> AggResult<Vec<(u16, PathBuf)>> {
    let dir_str = data_dir.display().to_string();
    let entries = fs::read_dir(data_dir).context(ListingDataSnafu {
        path: dir_str.clone(),
    })?;
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.context(ListingDataSnafu {
            path: dir_str.clone(),
        })?;
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if name.ends_with(".csv") && name.contains("__wi__general") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut res: Vec<(u16, PathBuf)> = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        match year_from_filename(&name) {
            Some(year) => res.push((year, path)),
            None => warn!("Skipping {} - couldn't extract the election year", name),
        }
    }
    info!("Found {} election csv files", res.len());
    Ok(res)
}

// File names follow the OpenElections convention and start with the
// election date, e.g. `20001107__wi__general__ward.csv`.
fn year_from_filename(name: &str) -> Option<u16> {
    let prefix: String = name.chars().take(4).collect();
    if prefix.len() == 4 && prefix.chars().all(|c| c.is_ascii_digit()) {
        prefix.parse::<u16>().ok()
    } else {
        None
    }
}

/// Aggregates all the recognized statewide races of one export into the
/// office tree of its year. Rows of unrecognized offices are excluded.
fn aggregate_file(records: &[RawRecord], year: u16, norm: &Normalizer) -> YearResults {
    // Group the rows per office key, in input order. Grouping by the key
    // rather than the raw label keeps aliases of the same office ("Senate"
    // and "U.S. Senate") in a single contest.
    let mut office_order: Vec<String> = Vec::new();
    let mut labels: HashMap<String, String> = HashMap::new();
    let mut by_office: HashMap<String, Vec<RawRecord>> = HashMap::new();
    for r in records.iter() {
        let office_key = match norm.office_key(&r.office) {
            Some(k) => k.to_string(),
            None => continue,
        };
        if !by_office.contains_key(&office_key) {
            office_order.push(office_key.clone());
            // The first-seen raw label becomes the contest name.
            labels.insert(office_key.clone(), r.office.clone());
        }
        by_office.entry(office_key).or_default().push(r.clone());
    }

    let mut res = YearResults::new();
    for office_key in office_order.iter() {
        let contest_name = &labels[office_key];
        let contest_key = format!("{}_{}", office_key, year);
        let contest = aggregate_contest(&by_office[office_key], contest_name, year, norm);
        info!("{}: {}: {} counties", year, contest_name, contest.results.len());
        res.entry(office_key.clone())
            .or_default()
            .insert(contest_key, contest);
    }
    res
}

// Folds the office tree of one file into the year tree under construction.
// When two files contribute to the same contest, their county maps are
// merged; counties present in both keep the later file's result.
fn fold_year_results(tree: &mut YearResults, year_results: YearResults) {
    use std::collections::btree_map::Entry;

    for (office_key, contests) in year_results {
        let office_tree = tree.entry(office_key).or_default();
        for (contest_key, contest) in contests {
            match office_tree.entry(contest_key) {
                Entry::Vacant(e) => {
                    e.insert(contest);
                }
                Entry::Occupied(mut e) => {
                    e.get_mut().results.extend(contest.results);
                }
            }
        }
    }
}

fn log_summary(doc: &AggregatedDocument) {
    let years = &doc.metadata.years_covered;
    if let (Some(first), Some(last)) = (years.first(), years.last()) {
        info!("Years covered: {} - {} ({} elections)", first, last, years.len());
    }
    let mut office_years: BTreeMap<&String, usize> = BTreeMap::new();
    for offices in doc.results_by_year.values() {
        for office in offices.keys() {
            *office_years.entry(office).or_insert(0) += 1;
        }
    }
    for (office, count) in office_years {
        info!("  {}: {} years", office, count);
    }
}

// The reference document, if provided for comparison.
fn check_reference(doc: &AggregatedDocument, reference_path: &str) -> AggResult<()> {
    let contents = fs::read_to_string(reference_path).context(ReadingDocumentSnafu {
        path: reference_path.to_string(),
    })?;
    let reference: serde_json::Value =
        serde_json::from_str(&contents).context(ParsingDocumentSnafu {
            path: reference_path.to_string(),
        })?;
    // Compare through `Value` on both sides so that key ordering is
    // canonical and the diff only shows semantic differences.
    let doc_value = serde_json::to_value(doc).context(SerializingDocumentSnafu {})?;
    let pretty_ref =
        serde_json::to_string_pretty(&reference).context(SerializingDocumentSnafu {})?;
    let pretty_doc =
        serde_json::to_string_pretty(&doc_value).context(SerializingDocumentSnafu {})?;
    if pretty_ref != pretty_doc {
        warn!("Found differences with the reference document");
        print_diff(pretty_ref.as_str(), pretty_doc.as_str(), "\n");
        whatever!("Difference detected between aggregated document and reference document");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(county: &str, office: &str, votes: u64) -> RawRecord {
        RawRecord {
            county: county.to_string(),
            office: office.to_string(),
            party: "DEM".to_string(),
            candidate: "Cand A".to_string(),
            votes,
        }
    }

    #[test]
    fn year_from_filename_examples() {
        assert_eq!(
            year_from_filename("20001107__wi__general__ward.csv"),
            Some(2000)
        );
        assert_eq!(year_from_filename("2024_pres.csv"), Some(2024));
        assert_eq!(year_from_filename("wi__general.csv"), None);
        assert_eq!(year_from_filename("202__wi.csv"), None);
        assert_eq!(year_from_filename(""), None);
    }

    #[test]
    fn aggregate_file_filters_unrecognized_offices() {
        let norm = Normalizer::new();
        let records = vec![
            rec("Dane", "President", 10),
            rec("Dane", "State Assembly", 10),
            rec("Dane", "Governor", 10),
        ];
        let res = aggregate_file(&records, 2022, &norm);
        assert_eq!(res.len(), 2);
        assert!(res["presidential"].contains_key("presidential_2022"));
        assert!(res["governor"].contains_key("governor_2022"));
        assert_eq!(
            res["presidential"]["presidential_2022"].contest_name,
            "President"
        );
        assert_eq!(
            res["governor"]["governor_2022"].results["Dane"].dem_votes,
            10
        );
    }

    #[test]
    fn aggregate_file_folds_office_aliases_into_one_contest() {
        // "U.S. Senate" and "Senate" are the same office key; counties
        // recorded under either label must end up in the same contest.
        let norm = Normalizer::new();
        let records = vec![rec("Dane", "U.S. Senate", 100), rec("Rock", "Senate", 50)];
        let res = aggregate_file(&records, 2022, &norm);
        assert_eq!(res.len(), 1);
        let contest = &res["us_senate"]["us_senate_2022"];
        assert_eq!(contest.contest_name, "U.S. Senate");
        assert_eq!(contest.results.len(), 2);
        assert_eq!(contest.results["Dane"].dem_votes, 100);
        assert_eq!(contest.results["Rock"].dem_votes, 50);
    }

    #[test]
    fn fold_year_results_merges_contests_across_files() {
        let norm = Normalizer::new();
        let mut tree = YearResults::new();
        fold_year_results(
            &mut tree,
            aggregate_file(&[rec("Dane", "President", 10)], 2020, &norm),
        );
        fold_year_results(
            &mut tree,
            aggregate_file(
                &[rec("Rock", "President", 20), rec("Dane", "Governor", 5)],
                2020,
                &norm,
            ),
        );
        // The second file extends the presidential contest instead of
        // replacing it.
        let pres = &tree["presidential"]["presidential_2020"];
        assert_eq!(pres.results.len(), 2);
        assert_eq!(pres.results["Dane"].dem_votes, 10);
        assert_eq!(pres.results["Rock"].dem_votes, 20);
        assert!(tree["governor"].contains_key("governor_2020"));
    }

    #[test]
    fn freshly_written_document_matches_itself_as_reference() {
        let dir = std::env::temp_dir().join(format!("wielect_ref_{}", std::process::id()));
        let path = dir.join("aggregated.json");

        let norm = Normalizer::new();
        let mut doc = AggregatedDocument::new("2026-08-29");
        doc.merge_year(
            2024,
            aggregate_file(
                &[rec("Dane", "President", 10), rec("Rock", "Governor", 5)],
                2024,
                &norm,
            ),
        );
        document::save_document(&doc, &path).unwrap();

        // The check must be insensitive to the key ordering of the written
        // artifact.
        check_reference(&doc, path.to_str().unwrap()).unwrap();

        let _ = fs::remove_dir_all(&dir);
    }
}
