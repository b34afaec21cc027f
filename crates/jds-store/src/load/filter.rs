use chrono::{DateTime, Utc};

use crate::codec;
use crate::connection::SqlValue;
use crate::dialect::Dialect;

/// Most values bound into one `IN` list
pub const IN_LIST_LIMIT: usize = 500;

pub(crate) const OVERVIEW_SELECT: &str = "SELECT o.uuid, o.edit_version, o.entity_id, o.parent_uuid, \
     o.date_created, o.date_modified FROM jds_entity_overview o";

/// Which instances a load returns
///
/// Every variant except `ByVersionRange` returns the latest edit version
/// of each matching instance only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFilter {
    All,
    ByUuids(Vec<String>),
    /// Instances nested under the given parent instance
    ByParent(String),
    /// Every stored version `from..=to` of the given instances
    ByVersionRange { uuids: Vec<String>, from: i32, to: i32 },
    /// Instances whose latest save falls in `from..=to`
    ModifiedBetween { from: DateTime<Utc>, to: DateTime<Utc> },
}

impl LoadFilter {
    pub fn by_uuid(uuid: impl Into<String>) -> Self {
        LoadFilter::ByUuids(vec![uuid.into()])
    }

    fn uuids(&self) -> Option<&[String]> {
        match self {
            LoadFilter::ByUuids(uuids) | LoadFilter::ByVersionRange { uuids, .. } => Some(uuids),
            _ => None,
        }
    }

    fn latest_only(&self) -> bool {
        !matches!(self, LoadFilter::ByVersionRange { .. })
    }

    /// Overview queries for this filter, one per `IN`-list chunk
    ///
    /// An explicit but empty uuid list yields no query at all.
    pub(crate) fn overview_queries(&self, dialect: &dyn Dialect, type_id: u64) -> Vec<(String, Vec<SqlValue>)> {
        match self.uuids() {
            Some(uuids) => uuids
                .chunks(IN_LIST_LIMIT)
                .map(|chunk| self.overview_query(dialect, type_id, Some(chunk)))
                .collect(),
            None => vec![self.overview_query(dialect, type_id, None)],
        }
    }

    fn overview_query(
        &self,
        dialect: &dyn Dialect,
        type_id: u64,
        uuids: Option<&[String]>,
    ) -> (String, Vec<SqlValue>) {
        let mut binder = Binder::new(dialect);
        let mut sql = format!(
            "{} WHERE EXISTS (SELECT 1 FROM jds_entity_instance i WHERE i.uuid = o.uuid AND i.entity_id = {})",
            OVERVIEW_SELECT,
            binder.bind(SqlValue::Integer(type_id as i64))
        );

        if let Some(uuids) = uuids {
            let list = binder.bind_all(uuids.iter().map(|u| SqlValue::from(u.as_str())));
            sql.push_str(&format!(" AND o.uuid IN ({})", list));
        }
        match self {
            LoadFilter::ByParent(parent) => {
                sql.push_str(&format!(
                    " AND o.parent_uuid = {}",
                    binder.bind(SqlValue::from(parent.as_str()))
                ));
            }
            LoadFilter::ByVersionRange { from, to, .. } => {
                let low = binder.bind(SqlValue::from(*from));
                let high = binder.bind(SqlValue::from(*to));
                sql.push_str(&format!(" AND o.edit_version BETWEEN {} AND {}", low, high));
            }
            LoadFilter::ModifiedBetween { from, to } => {
                let low = binder.bind(codec::encode_timestamp(from));
                let high = binder.bind(codec::encode_timestamp(to));
                sql.push_str(&format!(" AND o.date_modified BETWEEN {} AND {}", low, high));
            }
            LoadFilter::All | LoadFilter::ByUuids(_) => {}
        }
        if self.latest_only() {
            sql.push_str(
                " AND o.edit_version = (SELECT MAX(l.edit_version) FROM jds_entity_overview l WHERE l.uuid = o.uuid)",
            );
        }
        sql.push_str(" ORDER BY o.date_created, o.uuid, o.edit_version");
        (sql, binder.into_params())
    }
}

/// Collects parameters while rendering dialect placeholders in order
pub(crate) struct Binder<'d> {
    dialect: &'d dyn Dialect,
    params: Vec<SqlValue>,
}

impl<'d> Binder<'d> {
    pub(crate) fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    pub(crate) fn bind(&mut self, value: SqlValue) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len())
    }

    /// Comma-separated placeholders for an `IN` list
    pub(crate) fn bind_all(&mut self, values: impl IntoIterator<Item = SqlValue>) -> String {
        values
            .into_iter()
            .map(|v| self.bind(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub(crate) fn into_params(self) -> Vec<SqlValue> {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectKind;

    #[test]
    fn test_empty_uuid_list_has_no_query() {
        let filter = LoadFilter::ByUuids(Vec::new());
        assert!(filter
            .overview_queries(DialectKind::Sqlite.adapter(), 1)
            .is_empty());
    }

    #[test]
    fn test_long_uuid_list_is_chunked() {
        let uuids: Vec<String> = (0..IN_LIST_LIMIT + 1).map(|i| format!("u{}", i)).collect();
        let queries = LoadFilter::ByUuids(uuids).overview_queries(DialectKind::Sqlite.adapter(), 1);

        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].1.len(), IN_LIST_LIMIT + 1);
        assert_eq!(queries[1].1.len(), 2);
    }

    #[test]
    fn test_version_range_keeps_every_version() {
        let filter = LoadFilter::ByVersionRange {
            uuids: vec!["a".into()],
            from: 1,
            to: 3,
        };
        let (sql, params) = filter
            .overview_queries(DialectKind::PostgreSql.adapter(), 7)
            .remove(0);

        assert!(!sql.contains("MAX("));
        assert!(sql.contains("BETWEEN $3 AND $4"));
        assert_eq!(params, vec![
            SqlValue::Integer(7),
            SqlValue::from("a"),
            SqlValue::Integer(1),
            SqlValue::Integer(3),
        ]);
    }

    #[test]
    fn test_latest_only_for_parent_filter() {
        let (sql, _) = LoadFilter::ByParent("p".into())
            .overview_queries(DialectKind::Sqlite.adapter(), 1)
            .remove(0);
        assert!(sql.contains("o.parent_uuid = ?"));
        assert!(sql.contains("MAX(l.edit_version)"));
    }
}
