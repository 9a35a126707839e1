// Loading and safe rewriting of the aggregated json document.

use log::info;
use snafu::prelude::*;

use std::fs;
use std::path::Path;

use election_margins::AggregatedDocument;

use crate::agg::{
    AggResult, ParsingDocumentSnafu, ReadingDocumentSnafu, SerializingDocumentSnafu,
    WritingDocumentSnafu,
};

/// Loads the existing aggregated document, or starts a fresh one when none
/// exists yet. An existing document that cannot be read or parsed is fatal:
/// silently dropping years that were aggregated earlier would be worse.
pub fn load_document(path: &Path, generated_date: &str) -> AggResult<AggregatedDocument> {
    if !path.exists() {
        info!(
            "No aggregated document at {} yet, starting fresh",
            path.display()
        );
        return Ok(AggregatedDocument::new(generated_date));
    }
    let path_str = path.display().to_string();
    let contents = fs::read_to_string(path).context(ReadingDocumentSnafu {
        path: path_str.clone(),
    })?;
    let mut doc: AggregatedDocument =
        serde_json::from_str(&contents).context(ParsingDocumentSnafu {
            path: path_str.clone(),
        })?;
    info!("Loaded {} ({} years)", path_str, doc.results_by_year.len());
    doc.metadata.generated_date = generated_date.to_string();
    Ok(doc)
}

/// Rewrites the whole document. The content goes to a sibling temp file
/// first and is swapped in with a rename, so an interrupted run cannot
/// truncate the previous artifact.
pub fn save_document(doc: &AggregatedDocument, path: &Path) -> AggResult<()> {
    let path_str = path.display().to_string();
    let contents = serde_json::to_string_pretty(doc).context(SerializingDocumentSnafu {})?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(WritingDocumentSnafu {
                path: parent.display().to_string(),
            })?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).context(WritingDocumentSnafu {
        path: tmp.display().to_string(),
    })?;
    fs::rename(&tmp, path).context(WritingDocumentSnafu {
        path: path_str.clone(),
    })?;
    info!("Aggregated data saved to {}", path_str);
    Ok(())
}
