//! Record shapes and per-record column resolution.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::spec::{EnumRecordValue, SpecColumnHead, SpecContentProperty, SpecHeadMapping};
use crate::util::derive_overflow_col_start;

////////////////////////////////////////////////////////////////////////////////
// #region Records

/// Named-field access on a record, in place of run-time reflection.
///
/// `field_names` order decides where undeclared fields land in the overflow
/// area. It is whatever the implementor exposes: insertion order for
/// `IndexMap`, key order for `BTreeMap`, unspecified for `HashMap`.
pub trait NamedFieldSource {
    fn field_names(&self) -> Vec<String>;

    fn get(&self, name: &str) -> Option<EnumRecordValue>;
}

impl NamedFieldSource for IndexMap<String, EnumRecordValue> {
    fn field_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn get(&self, name: &str) -> Option<EnumRecordValue> {
        IndexMap::get(self, name).cloned()
    }
}

impl NamedFieldSource for BTreeMap<String, EnumRecordValue> {
    fn field_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn get(&self, name: &str) -> Option<EnumRecordValue> {
        BTreeMap::get(self, name).cloned()
    }
}

impl NamedFieldSource for HashMap<String, EnumRecordValue> {
    fn field_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn get(&self, name: &str) -> Option<EnumRecordValue> {
        HashMap::get(self, name).cloned()
    }
}

/// One logical row of input data.
pub enum EnumRecord {
    /// Values paired with declared columns by position.
    Positional(Vec<EnumRecordValue>),
    /// Values paired with declared columns by field name.
    Named(Box<dyn NamedFieldSource + Send + Sync>),
}

impl EnumRecord {
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<EnumRecordValue>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<T: NamedFieldSource + Send + Sync + 'static>(source: T) -> Self {
        Self::Named(Box::new(source))
    }

    /// Insertion-ordered named record from `(name, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<EnumRecordValue>,
    {
        let dict_fields: IndexMap<String, EnumRecordValue> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::named(dict_fields)
    }
}

impl fmt::Debug for EnumRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional(l_values) => f.debug_tuple("Positional").field(l_values).finish(),
            Self::Named(source) => f
                .debug_tuple("Named")
                .field(&source.field_names())
                .finish(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnResolution

/// One value paired with its destination column.
#[derive(Debug, Clone)]
pub struct SpecResolvedCell<'a> {
    pub value: EnumRecordValue,
    pub col_idx: usize,
    /// Declared head; `None` for overflow columns.
    pub head: Option<&'a SpecColumnHead>,
    /// Declared binding; `None` for overflow columns.
    pub content_property: Option<&'a SpecContentProperty>,
    pub if_overflow: bool,
}

/// Resolve every value of `record` to a distinct column of one row.
///
/// `l_content_properties` must be the column-ordered properties of `head`.
/// Null values are kept so that callers can account for them; they still
/// occupy their column.
pub fn resolve_record_cells<'a>(
    record: &EnumRecord,
    head: &'a SpecHeadMapping,
    l_content_properties: &'a [SpecContentProperty],
) -> Vec<SpecResolvedCell<'a>> {
    match record {
        EnumRecord::Positional(l_values) => {
            resolve_positional_cells(l_values, head, l_content_properties)
        }
        EnumRecord::Named(source) => {
            resolve_named_cells(source.as_ref(), head, l_content_properties)
        }
    }
}

fn resolve_positional_cells<'a>(
    l_values: &[EnumRecordValue],
    head: &'a SpecHeadMapping,
    l_content_properties: &'a [SpecContentProperty],
) -> Vec<SpecResolvedCell<'a>> {
    let mut l_cells = Vec::with_capacity(l_values.len());
    let mut n_col_last: Option<usize> = None;

    for (value, content_property) in l_values.iter().zip(l_content_properties) {
        n_col_last = Some(content_property.col_idx);
        l_cells.push(SpecResolvedCell {
            value: value.clone(),
            col_idx: content_property.col_idx,
            head: head.get(content_property.col_idx),
            content_property: Some(content_property),
            if_overflow: false,
        });
    }

    let n_values_declared = l_cells.len();
    if n_values_declared < l_values.len() {
        let mut n_col = derive_overflow_col_start(n_col_last.or(head.last_col_idx()));
        for value in &l_values[n_values_declared..] {
            l_cells.push(SpecResolvedCell {
                value: value.clone(),
                col_idx: n_col,
                head: None,
                content_property: None,
                if_overflow: true,
            });
            n_col += 1;
        }
    }

    l_cells
}

fn resolve_named_cells<'a>(
    source: &(dyn NamedFieldSource + Send + Sync),
    head: &'a SpecHeadMapping,
    l_content_properties: &'a [SpecContentProperty],
) -> Vec<SpecResolvedCell<'a>> {
    let mut set_names_remaining: IndexSet<String> = source.field_names().into_iter().collect();
    let mut l_cells = Vec::with_capacity(set_names_remaining.len());
    let mut n_col_last: Option<usize> = None;

    for content_property in l_content_properties {
        n_col_last = Some(content_property.col_idx);
        if !set_names_remaining.shift_remove(content_property.field_name.as_str()) {
            continue;
        }
        l_cells.push(SpecResolvedCell {
            value: source
                .get(&content_property.field_name)
                .unwrap_or(EnumRecordValue::Null),
            col_idx: content_property.col_idx,
            head: head.get(content_property.col_idx),
            content_property: Some(content_property),
            if_overflow: false,
        });
    }

    let mut n_col = derive_overflow_col_start(n_col_last);
    for name in set_names_remaining {
        l_cells.push(SpecResolvedCell {
            value: source.get(&name).unwrap_or(EnumRecordValue::Null),
            col_idx: n_col,
            head: None,
            content_property: None,
            if_overflow: true,
        });
        n_col += 1;
    }

    l_cells
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn head_sparse() -> SpecHeadMapping {
        SpecHeadMapping::new()
            .with_column(SpecColumnHead::new(1, "a"))
            .and_then(|h| h.with_column(SpecColumnHead::new(4, "b")))
            .and_then(|h| h.with_column(SpecColumnHead::new(6, "c")))
            .expect("head")
    }

    fn cols(l_cells: &[SpecResolvedCell<'_>]) -> Vec<usize> {
        l_cells.iter().map(|c| c.col_idx).collect()
    }

    #[test]
    fn positional_short_record_uses_declared_columns_only() {
        let head = head_sparse();
        let l_props = head.derive_content_properties();
        let record = EnumRecord::positional([10, 20]);

        let l_cells = resolve_record_cells(&record, &head, &l_props);
        assert_eq!(cols(&l_cells), vec![1, 4]);
        assert!(l_cells.iter().all(|c| !c.if_overflow));
        assert_eq!(l_cells[1].value, EnumRecordValue::Integer(20));
    }

    #[test]
    fn positional_long_record_overflows_after_last_declared() {
        let head = head_sparse();
        let l_props = head.derive_content_properties();
        let record = EnumRecord::positional([1, 2, 3, 4, 5]);

        let l_cells = resolve_record_cells(&record, &head, &l_props);
        assert_eq!(cols(&l_cells), vec![1, 4, 6, 7, 8]);
        assert_eq!(l_cells[3].value, EnumRecordValue::Integer(4));
        assert!(l_cells[3].if_overflow && l_cells[3].head.is_none());
    }

    #[test]
    fn positional_without_head_starts_at_zero() {
        let head = SpecHeadMapping::new();
        let record = EnumRecord::positional(["x", "y"]);

        let l_cells = resolve_record_cells(&record, &head, &[]);
        assert_eq!(cols(&l_cells), vec![0, 1]);
    }

    #[test]
    fn single_column_at_zero_does_not_collide_with_overflow() {
        let head = SpecHeadMapping::from_names(["only"]);
        let l_props = head.derive_content_properties();
        let record = EnumRecord::positional(["a", "b", "c"]);

        let l_cells = resolve_record_cells(&record, &head, &l_props);
        assert_eq!(cols(&l_cells), vec![0, 1, 2]);
    }

    #[test]
    fn named_record_matches_names_and_overflows_extras() {
        let head = SpecHeadMapping::from_names(["id", "name"]);
        let l_props = head.derive_content_properties();
        let record = EnumRecord::from_pairs([
            ("extra", EnumRecordValue::Boolean(true)),
            ("name", "ann".into()),
            ("id", 7.into()),
        ]);

        let l_cells = resolve_record_cells(&record, &head, &l_props);
        assert_eq!(cols(&l_cells), vec![0, 1, 2]);
        assert_eq!(l_cells[0].value, EnumRecordValue::Integer(7));
        assert_eq!(l_cells[1].value, EnumRecordValue::String("ann".to_string()));
        assert_eq!(l_cells[2].value, EnumRecordValue::Boolean(true));
        assert!(l_cells[2].if_overflow);
    }

    #[test]
    fn named_overflow_columns_are_distinct() {
        let head = SpecHeadMapping::from_names(["k"]);
        let l_props = head.derive_content_properties();
        let dict_fields: HashMap<String, EnumRecordValue> = (0..20)
            .map(|n| (format!("f{n}"), EnumRecordValue::Integer(n)))
            .collect();
        let record = EnumRecord::named(dict_fields);

        let l_cells = resolve_record_cells(&record, &head, &l_props);
        let set_cols: BTreeSet<usize> = l_cells.iter().map(|c| c.col_idx).collect();
        assert_eq!(l_cells.len(), 20);
        assert_eq!(set_cols, (1..21).collect::<BTreeSet<_>>());
    }

    #[test]
    fn named_missing_declared_field_keeps_later_columns() {
        let head = head_sparse();
        let l_props = head.derive_content_properties();
        let record = EnumRecord::from_pairs([("c", 3), ("z", 9)]);

        let l_cells = resolve_record_cells(&record, &head, &l_props);
        assert_eq!(cols(&l_cells), vec![6, 7]);
        assert!(l_cells[1].if_overflow);
    }

    #[test]
    fn empty_record_resolves_nothing() {
        let head = SpecHeadMapping::from_names(["a"]);
        let l_props = head.derive_content_properties();
        assert!(resolve_record_cells(&EnumRecord::Positional(vec![]), &head, &l_props).is_empty());
        assert!(
            resolve_record_cells(
                &EnumRecord::named(BTreeMap::<String, EnumRecordValue>::new()),
                &head,
                &l_props
            )
            .is_empty()
        );
    }
}
