//! Point normalizer.
//!
//! Turns typed source records into [`MetricPoint`]s. Every record exposes its
//! attributes through [`Record::attributes`]; attributes named in the caller's
//! tag set become string tags, everything else stays a field.

use crate::point::{Measurements, MetricPoint, Value};
use std::collections::BTreeMap;

/// A flat, typed snapshot record that can be listed as named attributes.
pub trait Record {
    /// Every attribute of the record, in declaration order.
    fn attributes(&self) -> Vec<(&'static str, Value)>;
}

/// Lists a record's attributes with `prefix` prepended to each name.
pub fn prefixed<R: Record + ?Sized>(record: &R, prefix: &str) -> Vec<(String, Value)> {
    record
        .attributes()
        .into_iter()
        .map(|(name, value)| (format!("{prefix}{name}"), value))
        .collect()
}

/// Partitions attributes into tags (names in `tag_names`) and fields.
///
/// Nothing is dropped: every input name ends up on exactly one side.
pub fn split_tags_and_fields<I>(attributes: I, tag_names: &[&str]) -> MetricPoint
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut point = MetricPoint::new();
    for (name, value) in attributes {
        if tag_names.contains(&name.as_str()) {
            point.tags.insert(name, value.to_string());
        } else {
            point.fields.insert(name, value);
        }
    }
    point
}

/// Prefixes and partitions a single record.
pub fn parse<R: Record + ?Sized>(record: &R, prefix: &str, tag_names: &[&str]) -> MetricPoint {
    split_tags_and_fields(prefixed(record, prefix), tag_names)
}

/// One point per list item, keyed `<item_prefix><index>`.
pub fn items_from_list<R: Record>(
    items: &[R],
    item_prefix: &str,
    prefix: &str,
    tag_names: &[&str],
) -> Measurements {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| (format!("{item_prefix}{index}"), parse(item, prefix, tag_names)))
        .collect()
}

/// One point per map entry, keyed `<item_prefix><device>`.
pub fn items_from_map<R: Record>(
    items: &BTreeMap<String, R>,
    item_prefix: &str,
    prefix: &str,
    tag_names: &[&str],
) -> Measurements {
    items
        .iter()
        .map(|(key, item)| (format!("{item_prefix}{key}"), parse(item, prefix, tag_names)))
        .collect()
}
