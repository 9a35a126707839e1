use clap::Parser;

/// This program aggregates Wisconsin election results by county.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (directory path) The directory scanned for election CSV exports. Only files whose
    /// name contains `__wi__general` are considered, and the leading four digits of the
    /// file name select the election year (e.g. `20001107__wi__general__ward.csv`).
    #[clap(short, long, value_parser, default_value = "data")]
    pub data_dir: String,

    /// (file path) If specified, aggregate this single CSV file instead of scanning the
    /// data directory. Useful for folding one new election into an existing document.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (4-digit year) The election year of the --input file, when the file name does not
    /// start with one.
    #[clap(short, long, value_parser)]
    pub year: Option<u16>,

    /// (file path) The aggregated JSON document. It is created on the first run; later
    /// runs load it, replace the years being aggregated and rewrite it in full.
    #[clap(short, long, value_parser, default_value = "data/wi_elections_aggregated.json")]
    pub out: String,

    /// (file path) A reference document in JSON format. If provided, the freshly written
    /// document is checked against the reference and the differences are printed.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
