//! Turning raw list parameters into checked [`ListOptions`].
//!
//! Field names are checked against the Run entity; an unknown name is an
//! error here, never silently ignored downstream.

use runguard_engine::{
    Filter, FilterContext, ListOptions, PredicateOp, ResourceKey, ResourceType, SortSpec,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

use crate::domain::error::{ApiResult, RunApiError};

/// Run fields usable in `sort_by` and filter predicates.
pub const RUN_SORTABLE_FIELDS: &[&str] = &[
    "id",
    "name",
    "created_at",
    "description",
    "scheduled_at",
    "storage_state",
    "status",
];

/// Prefix selecting a reported metric value by name.
pub const METRIC_FIELD_PREFIX: &str = "metric:";

fn is_run_field(key: &str) -> bool {
    if let Some(metric) = key.strip_prefix(METRIC_FIELD_PREFIX) {
        return !metric.is_empty();
    }
    RUN_SORTABLE_FIELDS.contains(&key)
}

fn page_size(requested: i32) -> ApiResult<usize> {
    match usize::try_from(requested) {
        Err(_) => Err(RunApiError::invalid_input(format!(
            "Invalid page size {}. It must be non-negative.",
            requested
        ))),
        Ok(0) => Ok(DEFAULT_PAGE_SIZE),
        Ok(n) => Ok(n.min(MAX_PAGE_SIZE)),
    }
}

fn parse_sort(sort_by: &str) -> ApiResult<SortSpec> {
    let mut parts = sort_by.split_whitespace();
    let Some(field) = parts.next() else {
        return Ok(SortSpec::default());
    };
    let descending = match parts.next() {
        None => false,
        Some(dir) if dir.eq_ignore_ascii_case("asc") => false,
        Some(dir) if dir.eq_ignore_ascii_case("desc") => true,
        Some(dir) => {
            return Err(RunApiError::invalid_input(format!(
                "Invalid sorting order {:?}. Expected asc or desc.",
                dir
            )))
        }
    };
    if parts.next().is_some() {
        return Err(RunApiError::invalid_input(format!(
            "Invalid sort_by {:?}. Expected \"<field> [asc|desc]\".",
            sort_by
        )));
    }
    let sort = SortSpec {
        field: field.to_string(),
        descending,
    };
    check_sort(&sort)?;
    Ok(sort)
}

fn check_sort(sort: &SortSpec) -> ApiResult<()> {
    if !is_run_field(&sort.field) {
        return Err(RunApiError::invalid_input(format!(
            "Invalid sorting field {:?} on run",
            sort.field
        )));
    }
    Ok(())
}

fn parse_filter(filter: &str) -> ApiResult<Filter> {
    if filter.trim().is_empty() {
        return Ok(Filter::default());
    }
    let parsed: Filter = serde_json::from_str(filter)
        .map_err(|e| RunApiError::invalid_input(format!("Invalid filter {:?}: {}", filter, e)))?;
    check_filter(&parsed)?;
    Ok(parsed)
}

fn check_filter(filter: &Filter) -> ApiResult<()> {
    for predicate in &filter.predicates {
        if !is_run_field(&predicate.key) {
            return Err(RunApiError::invalid_input(format!(
                "Invalid filter field {:?} on run",
                predicate.key
            )));
        }
        match predicate.op {
            PredicateOp::In if !predicate.value.is_array() => {
                return Err(RunApiError::invalid_input(format!(
                    "Filter on {:?} with IN needs an array value",
                    predicate.key
                )))
            }
            PredicateOp::IsSubstring if !predicate.value.is_string() => {
                return Err(RunApiError::invalid_input(format!(
                    "Filter on {:?} with IS_SUBSTRING needs a string value",
                    predicate.key
                )))
            }
            _ => {}
        }
    }
    Ok(())
}

/// Build engine list options from raw request parameters.
///
/// A non-empty `page_token` resumes an earlier listing and supersedes
/// `sort_by` and `filter`.
pub fn validated_list_options(
    page_token: &str,
    requested_page_size: i32,
    sort_by: &str,
    filter: &str,
) -> ApiResult<ListOptions> {
    build_list_options(page_token, requested_page_size, sort_by, filter)
        .map_err(|e| e.context("Failed to create list options"))
}

fn build_list_options(
    page_token: &str,
    requested_page_size: i32,
    sort_by: &str,
    filter: &str,
) -> ApiResult<ListOptions> {
    let page_size = page_size(requested_page_size)?;
    if !page_token.is_empty() {
        // Cursor contents are caller-supplied.
        let opts = ListOptions::from_page_token(page_token, page_size)?;
        check_sort(&opts.sort)?;
        check_filter(&opts.filter)?;
        return Ok(opts);
    }
    Ok(ListOptions::new(
        page_size,
        parse_sort(sort_by)?,
        parse_filter(filter)?,
    ))
}

/// Extract the authorization-scoping part of a list request.
pub fn validate_filter(reference_key: Option<&ResourceKey>) -> ApiResult<FilterContext> {
    match reference_key {
        Some(key) if key.resource_type == ResourceType::Unknown => Err(
            RunApiError::invalid_input(format!("Unrecognized resource reference type {}", key)),
        ),
        other => Ok(FilterContext {
            reference_key: other.cloned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorKind;

    #[test]
    fn page_size_bounds() {
        assert_eq!(validated_list_options("", 0, "", "").unwrap().page_size, 20);
        assert_eq!(validated_list_options("", 7, "", "").unwrap().page_size, 7);
        assert_eq!(validated_list_options("", 5000, "", "").unwrap().page_size, 200);
        let err = validated_list_options("", -1, "", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().starts_with("Failed to create list options"));
    }

    #[test]
    fn sort_parsing() {
        let opts = validated_list_options("", 0, "name desc", "").unwrap();
        assert_eq!(opts.sort.field, "name");
        assert!(opts.sort.descending);

        let opts = validated_list_options("", 0, "metric:accuracy", "").unwrap();
        assert_eq!(opts.sort.field, "metric:accuracy");
        assert!(!opts.sort.descending);

        assert_eq!(
            validated_list_options("", 0, "", "").unwrap().sort,
            SortSpec::default()
        );

        for bad in ["owner", "name sideways", "name asc extra", "metric:"] {
            let err = validated_list_options("", 0, bad, "").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", bad);
        }
    }

    #[test]
    fn filter_parsing() {
        let opts = validated_list_options(
            "",
            0,
            "",
            r#"{"predicates":[{"key":"status","op":"IN","value":["Running","Failed"]}]}"#,
        )
        .unwrap();
        assert_eq!(opts.filter.predicates.len(), 1);

        for bad in [
            r#"{"predicates":[{"key":"owner","op":"EQUALS","value":"x"}]}"#,
            r#"{"predicates":[{"key":"name","op":"IN","value":"x"}]}"#,
            r#"{"predicates":[{"key":"name","op":"IS_SUBSTRING","value":3}]}"#,
            r#"{"predicates":[{"key":"name","op":"LIKE","value":"x"}]}"#,
            "not json",
        ] {
            let err = validated_list_options("", 0, "", bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", bad);
        }
    }

    #[test]
    fn page_token_supersedes_sort_and_filter() {
        let first = validated_list_options("", 1, "name desc", "").unwrap();
        let token = first.next_page_token(1, 3);

        let resumed = validated_list_options(&token, 1, "id", "garbage ignored").unwrap();
        assert_eq!(resumed.sort, first.sort);
        assert_eq!(resumed.offset, 1);

        let err = validated_list_options("zz", 1, "", "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn page_token_fields_are_checked() {
        let forged = [
            r#"{"sort":{"field":"owner"},"filter":{"predicates":[]},"offset":0}"#,
            r#"{"sort":{"field":"name"},"filter":{"predicates":[{"key":"namespace","op":"NOT_EQUALS","value":"x"}]},"offset":0}"#,
            r#"{"sort":{"field":"name"},"filter":{"predicates":[{"key":"status","op":"IN","value":"Failed"}]},"offset":0}"#,
            r#"{"sort":{"field":"name"},"filter":{"predicates":[{"key":"name","op":"IS_SUBSTRING","value":1}]},"offset":0}"#,
        ];
        for cursor in forged {
            let token = hex::encode(cursor);
            let err = validated_list_options(&token, 1, "", "").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "{}", cursor);
            assert!(err.to_string().starts_with("Failed to create list options"));
        }

        let ok = hex::encode(
            r#"{"sort":{"field":"metric:accuracy","descending":true},"filter":{"predicates":[]},"offset":4}"#,
        );
        let opts = validated_list_options(&ok, 2, "", "").unwrap();
        assert_eq!(opts.offset, 4);
        assert!(opts.sort.descending);
    }

    #[test]
    fn unknown_reference_type_rejected() {
        let err = validate_filter(Some(&ResourceKey::new(ResourceType::Unknown, "x"))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        assert_eq!(validate_filter(None).unwrap(), FilterContext::default());
        let key = ResourceKey::namespace("team-a");
        assert_eq!(
            validate_filter(Some(&key)).unwrap().reference_key,
            Some(key)
        );
    }
}
