use serde::{Deserialize, Deserializer};
use std::io::Read;

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateRow {
    pub(crate) application_id: String,
    pub(crate) applicant_id: String,
    pub(crate) club_id: String,
    pub(crate) priority: u32,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub(crate) rank: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CapacityRow {
    pub(crate) club_id: String,
    pub(crate) max_members: u32,
}

pub(crate) fn parse_rows<T, R>(reader: R) -> Result<Vec<T>, csv::Error>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv_reader.deserialize::<T>().collect()
}

/// Spreadsheet exports leave unranked cells empty.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
