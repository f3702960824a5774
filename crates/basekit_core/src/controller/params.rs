//! List query-string extraction.

use crate::config::CrudConfig;
use crate::model::schema::ValidationError;
use crate::model::value::FieldValue;
use crate::service::crud_service::ListRequest;
use std::collections::BTreeMap;

const PAGE_PARAM: &str = "page";
const COUNT_PARAM: &str = "count";
const SEARCH_PARAM: &str = "search";

/// Splits raw query parameters into a [`ListRequest`].
///
/// `page`, `count` and `search` are reserved; every other key becomes an
/// untyped filter coerced later against the schema.
pub fn parse_list_query(
    entity: &str,
    query: &BTreeMap<String, String>,
    config: &CrudConfig,
) -> Result<ListRequest, ValidationError> {
    let page = match query.get(PAGE_PARAM) {
        Some(raw) => parse_positive(entity, PAGE_PARAM, raw)?,
        None => config.default_page,
    };
    let count = match query.get(COUNT_PARAM) {
        Some(raw) => parse_positive(entity, COUNT_PARAM, raw)?,
        None => config.default_count,
    };
    if count > config.max_count {
        return Err(ValidationError::single(
            entity,
            COUNT_PARAM,
            format!("count must not exceed {}", config.max_count),
        ));
    }

    let mut request = ListRequest::new(page, count);
    request.search = query.get(SEARCH_PARAM).cloned();
    request.filters = query
        .iter()
        .filter(|(key, _)| ![PAGE_PARAM, COUNT_PARAM, SEARCH_PARAM].contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), FieldValue::Text(value.clone())))
        .collect();
    Ok(request)
}

fn parse_positive(entity: &str, param: &str, raw: &str) -> Result<u64, ValidationError> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(ValidationError::single(
            entity,
            param,
            format!("{param} must be a positive integer"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_list_query;
    use crate::config::CrudConfig;
    use crate::model::value::FieldValue;
    use std::collections::BTreeMap;

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_and_other_keys_become_filters() {
        let request = parse_list_query(
            "users",
            &query(&[("search", "jo"), ("role_id", "r1")]),
            &CrudConfig::default(),
        )
        .expect("valid query");
        assert_eq!(request.page, 1);
        assert_eq!(request.count, 25);
        assert_eq!(request.search.as_deref(), Some("jo"));
        assert_eq!(request.filters.get("role_id"), Some(&FieldValue::from("r1")));
    }

    #[test]
    fn rejects_non_numeric_zero_and_oversized_values() {
        let config = CrudConfig::default();
        for pairs in [
            [("page", "two")],
            [("page", "0")],
            [("count", "-1")],
            [("count", "101")],
        ] {
            let err = parse_list_query("users", &query(&pairs), &config)
                .expect_err("invalid pagination");
            assert!(err.mentions(pairs[0].0));
        }
    }
}
