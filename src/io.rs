use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;
use std::str::FromStr;

use itertools::Itertools;
use rayon::prelude::*;

use crate::embeddings::ItemEmbeddings;
use crate::errors::{MetricError, Result};

pub type UserId = u32;
pub type ItemId = u64;

/// One line of a predictions file: the recommendation list and the items the
/// user actually interacted with.
pub type Evaluation = (Vec<ItemId>, Vec<ItemId>);

fn parse_field<T: FromStr>(raw: Option<&str>, line: usize, name: &str) -> Result<T> {
    raw.map(str::trim)
        .ok_or_else(|| MetricError::parse(line, format!("missing column '{}'", name)))?
        .parse::<T>()
        .map_err(|_| MetricError::parse(line, format!("column '{}' is not a number", name)))
}

/// Reads a tab separated interaction log with a header line.
///
/// The first two columns are the user id and the item id, further columns
/// (e.g. a timestamp) are ignored.
pub fn read_interactions(path: &str) -> Result<Vec<(UserId, ItemId)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| MetricError::io(path, err.to_string()))?;

    reader
        .records()
        .map(|result| -> Result<(UserId, ItemId)> {
            let record = result?;
            let line = record
                .position()
                .map(|position| position.line() as usize)
                .unwrap_or_default();
            Ok((
                parse_field(record.get(0), line, "user_id")?,
                parse_field(record.get(1), line, "item_id")?,
            ))
        })
        .collect()
}

/// Groups interactions per user, users in ascending order.
pub fn group_by_user(interactions: &[(UserId, ItemId)]) -> (Vec<UserId>, Vec<Vec<ItemId>>) {
    interactions
        .iter()
        .copied()
        .into_group_map()
        .into_iter()
        .sorted_by_key(|(user_id, _items)| *user_id)
        .unzip()
}

fn create_buffered_line_reader<P>(filename: P) -> io::Result<io::Lines<io::BufReader<File>>>
where
    P: AsRef<Path>,
{
    let file = File::open(filename)?;
    Ok(io::BufReader::new(file).lines())
}

fn parse_item_list(raw: &str, line: usize) -> Result<Vec<ItemId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<ItemId>()
                .map_err(|_| MetricError::parse(line, format!("'{}' is not an item id", item)))
        })
        .collect()
}

/// Parses `rec1,rec2,...;hist1,hist2,...`.
pub fn parse_evaluation(rawline: &str, line: usize) -> Result<Evaluation> {
    let (recos, history) = rawline
        .split_once(';')
        .ok_or_else(|| MetricError::parse(line, "expected 'recommendations;history'"))?;
    Ok((parse_item_list(recos, line)?, parse_item_list(history, line)?))
}

/// Reads a predictions file, one evaluation per non-empty line.
pub fn read_evaluations(path: &str) -> Result<Vec<Evaluation>> {
    let lines: Vec<String> = create_buffered_line_reader(path)
        .and_then(|lines| lines.collect::<io::Result<Vec<_>>>())
        .map_err(|err| MetricError::io(path, err.to_string()))?;

    lines
        .par_iter()
        .enumerate()
        .filter(|(_position, rawline)| !rawline.trim().is_empty())
        .map(|(position, rawline)| parse_evaluation(rawline, position + 1))
        .collect()
}

/// Reads a tab separated embedding table without header: `item_id<TAB>v1<TAB>v2...`.
pub fn read_embeddings(path: &str) -> Result<ItemEmbeddings<ItemId>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|err| MetricError::io(path, err.to_string()))?;

    let mut items = Vec::new();
    let mut vectors = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record
            .position()
            .map(|position| position.line() as usize)
            .unwrap_or_default();
        items.push(parse_field::<ItemId>(record.get(0), line, "item_id")?);
        let vector = record
            .iter()
            .skip(1)
            .map(|value| parse_field::<f64>(Some(value), line, "embedding"))
            .collect::<Result<Vec<_>>>()?;
        vectors.push(vector);
    }
    ItemEmbeddings::new(items, vectors)
}
