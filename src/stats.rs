use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Label used for categorical dimensions with no value.
pub const UNASSIGNED: &str = "Unassigned";
/// Label used for free-text dimensions (academic year) with no value.
pub const UNSPECIFIED: &str = "Unspecified";

pub const DEFAULT_PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("unknown dimension: {0}")]
    InvalidDimension(String),

    #[error("unknown metric: {0}")]
    InvalidMetric(String),

    #[error("{0}")]
    BadFilter(String),
}

impl StatsError {
    pub fn code(&self) -> &'static str {
        match self {
            StatsError::InvalidDimension(_) => "invalid_dimension",
            StatsError::InvalidMetric(_) => "invalid_metric",
            StatsError::BadFilter(_) => "bad_params",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonKind {
    Student,
    Faculty,
}

impl PersonKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" | "students" => Some(PersonKind::Student),
            "faculty" => Some(PersonKind::Faculty),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PersonKind::Student => "students",
            PersonKind::Faculty => "faculty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRefs {
    pub course: Option<CategoryRef>,
    pub department: Option<CategoryRef>,
    pub employment_type: Option<String>,
    pub position: Option<String>,
    pub academic_year: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NumericAttrs {
    pub salary: Option<f64>,
    pub gpa: Option<f64>,
}

/// A student or faculty member as read from the record store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    pub id: i64,
    pub kind: PersonKind,
    pub code: String,
    pub name: String,
    pub email: Option<String>,
    pub category_refs: CategoryRefs,
    pub numeric_attrs: NumericAttrs,
    pub joined_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Course,
    Department,
    EmploymentType,
    Position,
    AcademicYear,
}

impl Dimension {
    pub fn parse(raw: &str) -> Result<Self, StatsError> {
        match raw.trim() {
            "course" => Ok(Dimension::Course),
            "department" => Ok(Dimension::Department),
            "employment_type" | "employmentType" => Ok(Dimension::EmploymentType),
            "position" => Ok(Dimension::Position),
            "academic_year" | "academicYear" => Ok(Dimension::AcademicYear),
            other => Err(StatsError::InvalidDimension(other.to_string())),
        }
    }

    /// Key used for the label inside a serialized group entry.
    pub fn wire_key(self) -> &'static str {
        match self {
            Dimension::Course => "course",
            Dimension::Department => "department",
            Dimension::EmploymentType => "type",
            Dimension::Position => "position",
            Dimension::AcademicYear => "year",
        }
    }

    pub fn sentinel(self) -> &'static str {
        match self {
            Dimension::AcademicYear => UNSPECIFIED,
            _ => UNASSIGNED,
        }
    }

    fn raw_value(self, record: &PersonRecord) -> Option<&str> {
        let refs = &record.category_refs;
        match self {
            Dimension::Course => refs.course.as_ref().map(|c| c.name.as_str()),
            Dimension::Department => refs.department.as_ref().map(|d| d.name.as_str()),
            Dimension::EmploymentType => refs.employment_type.as_deref(),
            Dimension::Position => refs.position.as_deref(),
            Dimension::AcademicYear => refs.academic_year.as_deref(),
        }
    }

    /// The group label for `record`: its trimmed value, or the sentinel when
    /// the value is missing or blank.
    pub fn label_for(self, record: &PersonRecord) -> String {
        match self.raw_value(record).map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => self.sentinel().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Salary,
    Gpa,
}

impl Metric {
    pub fn parse(raw: &str) -> Result<Self, StatsError> {
        match raw.trim() {
            "salary" => Ok(Metric::Salary),
            "gpa" => Ok(Metric::Gpa),
            other => Err(StatsError::InvalidMetric(other.to_string())),
        }
    }

    fn value(self, record: &PersonRecord) -> Option<f64> {
        match self {
            Metric::Salary => record.numeric_attrs.salary,
            Metric::Gpa => record.numeric_attrs.gpa,
        }
    }
}

/// Conjunctive record filters. `None` means the predicate is not applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub academic_year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl FilterCriteria {
    pub fn matches(&self, record: &PersonRecord) -> bool {
        let refs = &record.category_refs;

        if let Some(want) = self.department_id {
            if refs.department.as_ref().map(|d| d.id) != Some(want) {
                return false;
            }
        }
        if let Some(want) = self.course_id {
            if refs.course.as_ref().map(|c| c.id) != Some(want) {
                return false;
            }
        }
        if let Some(want) = self.employment_type.as_deref() {
            match refs.employment_type.as_deref() {
                Some(have) if have.trim().eq_ignore_ascii_case(want) => {}
                _ => return false,
            }
        }
        if let Some(want) = self.academic_year.as_deref() {
            match refs.academic_year.as_deref() {
                Some(have) if have.contains(want) => {}
                _ => return false,
            }
        }
        if let Some(needle) = self.search.as_deref() {
            let needle = needle.to_lowercase();
            let hit = [
                Some(record.name.as_str()),
                Some(record.code.as_str()),
                record.email.as_deref(),
                refs.position.as_deref(),
                refs.academic_year.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Reads an optional integer id. Numeric strings are accepted; `null` and
/// blank strings mean unset. The error names `key`.
pub fn parse_optional_id(raw: Option<&serde_json::Value>, key: &str) -> Result<Option<i64>, String> {
    let bad = || format!("{} must be an integer", key);
    match raw {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            if let Some(n) = v.as_i64() {
                return Ok(Some(n));
            }
            match v.as_str().map(str::trim) {
                Some("") => Ok(None),
                Some(s) => s.parse::<i64>().map(Some).map_err(|_| bad()),
                None => Err(bad()),
            }
        }
    }
}

fn optional_id(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> Result<Option<i64>, StatsError> {
    parse_optional_id(obj.get(key), key).map_err(StatsError::BadFilter)
}

fn optional_text(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<String>, StatsError> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(StatsError::BadFilter(format!("{} must be a string", key)));
            };
            let t = s.trim();
            if t.is_empty() {
                Ok(None)
            } else {
                Ok(Some(t.to_string()))
            }
        }
    }
}

/// Reads filter criteria from a JSON object. Integer ids may arrive as numeric
/// strings; empty strings and `null` leave a predicate unset, as does the
/// employment type `"all"`.
pub fn parse_filters(raw: Option<&serde_json::Value>) -> Result<FilterCriteria, StatsError> {
    let Some(raw) = raw else {
        return Ok(FilterCriteria::default());
    };
    if raw.is_null() {
        return Ok(FilterCriteria::default());
    }
    let Some(obj) = raw.as_object() else {
        return Err(StatsError::BadFilter("filters must be an object".into()));
    };

    let employment_type = optional_text(obj, "employment_type")?
        .filter(|t| !t.eq_ignore_ascii_case("all"));

    Ok(FilterCriteria {
        department_id: optional_id(obj, "department_id")?,
        course_id: optional_id(obj, "course_id")?,
        employment_type,
        academic_year: optional_text(obj, "academic_year")?,
        search: optional_text(obj, "search")?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    #[serde(rename = "category")]
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_salary: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_gpa: Option<f64>,
}

impl DerivedMetrics {
    fn compute(records: &[&PersonRecord], metrics: &[Metric]) -> Self {
        let mut out = DerivedMetrics::default();
        for metric in metrics {
            let mean = mean_positive(records, *metric);
            match metric {
                Metric::Salary => out.average_salary = Some(mean),
                Metric::Gpa => out.average_gpa = Some(mean),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub dimension: Dimension,
    pub total: usize,
    pub groups: Vec<GroupCount>,
    pub derived_metrics: DerivedMetrics,
}

pub fn apply_filters<'a>(
    records: &'a [PersonRecord],
    filters: &FilterCriteria,
) -> Vec<&'a PersonRecord> {
    records.iter().filter(|r| filters.matches(r)).collect()
}

fn sorted_groups(counts: HashMap<String, usize>) -> Vec<GroupCount> {
    let mut groups: Vec<GroupCount> = counts
        .into_iter()
        .map(|(label, count)| GroupCount { label, count })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    groups
}

pub fn group_counts(records: &[&PersonRecord], dimension: Dimension) -> Vec<GroupCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        *counts.entry(dimension.label_for(record)).or_insert(0) += 1;
    }
    sorted_groups(counts)
}

/// Like [`group_counts`], but every catalog label appears even when no record
/// falls into it.
pub fn group_counts_with_catalog<S: AsRef<str>>(
    records: &[&PersonRecord],
    dimension: Dimension,
    catalog: &[S],
) -> Vec<GroupCount> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in catalog {
        let label = label.as_ref().trim();
        if !label.is_empty() {
            counts.entry(label.to_string()).or_insert(0);
        }
    }
    for record in records {
        *counts.entry(dimension.label_for(record)).or_insert(0) += 1;
    }
    sorted_groups(counts)
}

/// Mean of the strictly positive values of `metric`; `0.0` when there are none.
pub fn mean_positive(records: &[&PersonRecord], metric: Metric) -> f64 {
    let mut sum = 0.0;
    let mut n: usize = 0;
    for record in records {
        if let Some(v) = metric.value(record) {
            if v.is_finite() && v > 0.0 {
                sum += v;
                n += 1;
            }
        }
    }
    if n > 0 {
        sum / (n as f64)
    } else {
        0.0
    }
}

/// Output of [`aggregate`]: the filtered total and the requested derived
/// metrics once, plus one grouping per dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub total: usize,
    pub derived_metrics: DerivedMetrics,
    pub results: Vec<AggregationResult>,
}

/// Groups the filtered records once per requested dimension.
///
/// Dimension and metric names are validated before anything is computed, so an
/// unknown name fails the whole call. Repeated dimension names are reported once.
/// Derived metrics are computed even when no dimension is requested.
pub fn aggregate<D, M>(
    records: &[PersonRecord],
    dimensions: &[D],
    metrics: &[M],
    filters: &FilterCriteria,
) -> Result<Aggregation, StatsError>
where
    D: AsRef<str>,
    M: AsRef<str>,
{
    let mut dims: Vec<Dimension> = Vec::with_capacity(dimensions.len());
    for name in dimensions {
        let d = Dimension::parse(name.as_ref())?;
        if !dims.contains(&d) {
            dims.push(d);
        }
    }
    let mut wanted: Vec<Metric> = Vec::with_capacity(metrics.len());
    for name in metrics {
        let m = Metric::parse(name.as_ref())?;
        if !wanted.contains(&m) {
            wanted.push(m);
        }
    }

    let filtered = apply_filters(records, filters);
    let derived = DerivedMetrics::compute(&filtered, &wanted);

    let results = dims
        .into_iter()
        .map(|dimension| AggregationResult {
            dimension,
            total: filtered.len(),
            groups: group_counts(&filtered, dimension),
            derived_metrics: derived.clone(),
        })
        .collect();
    Ok(Aggregation {
        total: filtered.len(),
        derived_metrics: derived,
        results,
    })
}

/// First `limit` records passing `filters`, in source order.
pub fn preview<'a>(
    records: &'a [PersonRecord],
    filters: &FilterCriteria,
    limit: usize,
) -> Vec<&'a PersonRecord> {
    records
        .iter()
        .filter(|r| filters.matches(r))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person(id: i64) -> PersonRecord {
        PersonRecord {
            id,
            kind: PersonKind::Student,
            code: format!("S{:04}", id),
            name: format!("Person {}", id),
            email: None,
            category_refs: CategoryRefs::default(),
            numeric_attrs: NumericAttrs::default(),
            joined_at: None,
        }
    }

    fn with_dept(id: i64, dept: Option<(i64, &str)>) -> PersonRecord {
        let mut p = person(id);
        p.category_refs.department = dept.map(|(id, name)| CategoryRef {
            id,
            name: name.to_string(),
        });
        p
    }

    fn with_salary(id: i64, salary: Option<f64>) -> PersonRecord {
        let mut p = person(id);
        p.kind = PersonKind::Faculty;
        p.numeric_attrs.salary = salary;
        p
    }

    fn mixed_records() -> Vec<PersonRecord> {
        (1..=10)
            .map(|i| {
                let mut p = match i % 3 {
                    0 => with_dept(i, Some((1, "CS"))),
                    1 => with_dept(i, Some((2, "ENG"))),
                    _ => with_dept(i, None),
                };
                p.category_refs.academic_year = if i % 2 == 0 {
                    Some("2024-2025".into())
                } else {
                    None
                };
                p.category_refs.course = if i <= 4 {
                    Some(CategoryRef {
                        id: 7,
                        name: "BSCS".into(),
                    })
                } else {
                    None
                };
                p
            })
            .collect()
    }

    fn group(label: &str, count: usize) -> GroupCount {
        GroupCount {
            label: label.to_string(),
            count,
        }
    }

    #[test]
    fn department_scenario_groups_with_sentinel() {
        let records = vec![
            with_dept(1, Some((1, "CS"))),
            with_dept(2, Some((1, "CS"))),
            with_dept(3, None),
            with_dept(4, Some((2, "ENG"))),
        ];
        let out = aggregate(&records, &["department"], &[] as &[&str], &FilterCriteria::default())
            .expect("aggregate");
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].total, 4);
        assert_eq!(
            out.results[0].groups,
            vec![group("CS", 2), group("ENG", 1), group(UNASSIGNED, 1)]
        );
    }

    #[test]
    fn salary_mean_skips_missing_values_but_counts_them_in_total() {
        let records = vec![
            with_salary(1, Some(60000.0)),
            with_salary(2, None),
            with_salary(3, Some(90000.0)),
        ];
        let out = aggregate(&records, &["position"], &["salary"], &FilterCriteria::default())
            .expect("aggregate");
        assert_eq!(out.results[0].total, 3);
        assert_eq!(out.results[0].derived_metrics.average_salary, Some(75000.0));
        assert_eq!(out.results[0].derived_metrics.average_gpa, None);
    }

    #[test]
    fn metrics_without_dimensions_still_report_averages() {
        let records = vec![with_salary(1, Some(60000.0)), with_salary(2, Some(90000.0))];
        let out = aggregate(&records, &[] as &[&str], &["salary"], &FilterCriteria::default())
            .expect("aggregate");
        assert!(out.results.is_empty());
        assert_eq!(out.total, 2);
        assert_eq!(out.derived_metrics.average_salary, Some(75000.0));

        let none = aggregate(&[], &[] as &[&str], &["gpa"], &FilterCriteria::default())
            .expect("aggregate");
        assert_eq!(none.derived_metrics.average_gpa, Some(0.0));
    }

    #[test]
    fn zero_salary_is_treated_as_unset() {
        let records = vec![with_salary(1, Some(0.0)), with_salary(2, Some(50000.0))];
        let refs: Vec<&PersonRecord> = records.iter().collect();
        assert_eq!(mean_positive(&refs, Metric::Salary), 50000.0);
    }

    #[test]
    fn empty_input_yields_zero_result() {
        let out = aggregate(
            &[],
            &["course", "department", "academic_year"],
            &["salary", "gpa"],
            &FilterCriteria::default(),
        )
        .expect("aggregate");
        assert_eq!(out.results.len(), 3);
        assert_eq!(out.total, 0);
        for r in out.results {
            assert_eq!(r.total, 0);
            assert!(r.groups.is_empty());
            assert_eq!(r.derived_metrics.average_salary, Some(0.0));
            assert_eq!(r.derived_metrics.average_gpa, Some(0.0));
        }
    }

    #[test]
    fn no_qualifying_metric_value_is_zero_not_nan() {
        let records = vec![with_salary(1, None), with_salary(2, Some(-5.0))];
        let refs: Vec<&PersonRecord> = records.iter().collect();
        let v = mean_positive(&refs, Metric::Salary);
        assert_eq!(v, 0.0);
        assert!(!v.is_nan());
    }

    #[test]
    fn unknown_dimension_is_rejected_before_work() {
        let records = mixed_records();
        let e = aggregate(&records, &["department", "shoe_size"], &[] as &[&str], &FilterCriteria::default())
            .expect_err("unknown dimension");
        assert_eq!(e, StatsError::InvalidDimension("shoe_size".into()));
        assert_eq!(e.code(), "invalid_dimension");

        let e = aggregate(&[], &["nope"], &[] as &[&str], &FilterCriteria::default())
            .expect_err("unknown dimension on empty input");
        assert_eq!(e.code(), "invalid_dimension");
    }

    #[test]
    fn unknown_metric_is_rejected() {
        let e = aggregate(&[], &["course"], &["height"], &FilterCriteria::default())
            .expect_err("unknown metric");
        assert_eq!(e, StatsError::InvalidMetric("height".into()));
    }

    #[test]
    fn total_is_independent_of_dimensions_and_partitions_are_complete() {
        let records = mixed_records();
        let filters = FilterCriteria {
            academic_year: Some("2024".into()),
            ..Default::default()
        };
        let expected = records.iter().filter(|r| filters.matches(r)).count();

        let out = aggregate(
            &records,
            &["course", "department", "employment_type", "position", "academic_year"],
            &[] as &[&str],
            &filters,
        )
        .expect("aggregate");
        assert_eq!(out.results.len(), 5);
        for r in &out.results {
            assert_eq!(r.total, expected);
            let sum: usize = r.groups.iter().map(|g| g.count).sum();
            assert_eq!(sum, r.total, "partition of {:?}", r.dimension);
        }

        let single = aggregate(&records, &["position"], &[] as &[&str], &filters).expect("aggregate");
        assert_eq!(single.total, expected);
    }

    #[test]
    fn blank_values_fall_into_sentinels() {
        let mut a = person(1);
        a.category_refs.academic_year = Some("   ".into());
        a.category_refs.position = Some("".into());
        let b = person(2);
        let records = vec![a, b];

        let out = aggregate(&records, &["academic_year", "position"], &[] as &[&str], &FilterCriteria::default())
            .expect("aggregate");
        assert_eq!(out.results[0].groups, vec![group(UNSPECIFIED, 2)]);
        assert_eq!(out.results[1].groups, vec![group(UNASSIGNED, 2)]);
    }

    #[test]
    fn ties_sort_by_label_and_repeat_identically() {
        let records = vec![
            with_dept(1, Some((3, "Math"))),
            with_dept(2, Some((1, "Biology"))),
            with_dept(3, Some((2, "Art"))),
            with_dept(4, Some((1, "Biology"))),
        ];
        let first = aggregate(&records, &["department"], &[] as &[&str], &FilterCriteria::default())
            .expect("aggregate");
        assert_eq!(
            first.results[0].groups,
            vec![group("Biology", 2), group("Art", 1), group("Math", 1)]
        );
        for _ in 0..5 {
            let again = aggregate(&records, &["department"], &[] as &[&str], &FilterCriteria::default())
                .expect("aggregate");
            assert_eq!(again, first);
        }
    }

    #[test]
    fn repeated_dimension_names_are_reported_once() {
        let records = mixed_records();
        let out = aggregate(
            &records,
            &["department", "department", "academicYear"],
            &[] as &[&str],
            &FilterCriteria::default(),
        )
        .expect("aggregate");
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].dimension, Dimension::Department);
        assert_eq!(out.results[1].dimension, Dimension::AcademicYear);
    }

    #[test]
    fn department_filter_limits_preview_and_total() {
        let records = mixed_records();
        let filters = FilterCriteria {
            department_id: Some(1),
            ..Default::default()
        };

        let rows = preview(&records, &filters, DEFAULT_PREVIEW_LIMIT);
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 6, 9]);

        let out = aggregate(&records, &["department"], &[] as &[&str], &filters).expect("aggregate");
        assert_eq!(out.results[0].total, 3);
        assert_eq!(out.results[0].groups, vec![group("CS", 3)]);
    }

    #[test]
    fn preview_respects_limit_and_source_order() {
        let records = mixed_records();
        let rows = preview(&records, &FilterCriteria::default(), 4);
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(preview(&records, &FilterCriteria::default(), 0).is_empty());
    }

    #[test]
    fn filter_on_absent_field_never_matches() {
        let records = vec![with_dept(1, None), person(2)];
        let filters = FilterCriteria {
            department_id: Some(1),
            employment_type: Some("full_time".into()),
            ..Default::default()
        };
        assert!(apply_filters(&records, &filters).is_empty());
    }

    #[test]
    fn filters_combine_conjunctively() {
        let records = mixed_records();
        let filters = FilterCriteria {
            department_id: Some(2),
            course_id: Some(7),
            ..Default::default()
        };
        let ids: Vec<i64> = apply_filters(&records, &filters).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn search_matches_name_code_and_email_case_insensitively() {
        let mut a = person(1);
        a.name = "Ada Lovelace".into();
        let mut b = person(2);
        b.email = Some("GRACE@example.edu".into());
        let records = vec![a, b, person(3)];

        let by_name = FilterCriteria {
            search: Some("lovelace".into()),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &by_name).len(), 1);

        let by_email = FilterCriteria {
            search: Some("grace@".into()),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &by_email)[0].id, 2);

        let by_code = FilterCriteria {
            search: Some("s0003".into()),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &by_code)[0].id, 3);
    }

    #[test]
    fn catalog_seeding_keeps_partition_complete() {
        let records = vec![with_dept(1, Some((1, "CS"))), with_dept(2, None)];
        let refs: Vec<&PersonRecord> = records.iter().collect();
        let groups = group_counts_with_catalog(&refs, Dimension::Department, &["CS", "History"]);
        assert_eq!(
            groups,
            vec![group("CS", 1), group(UNASSIGNED, 1), group("History", 0)]
        );
        assert_eq!(groups.iter().map(|g| g.count).sum::<usize>(), 2);
    }

    #[test]
    fn parse_filters_accepts_strings_and_ignores_blanks() {
        let raw = json!({
            "department_id": "3",
            "course_id": 9,
            "academic_year": "",
            "employment_type": "ALL",
            "search": null
        });
        let parsed = parse_filters(Some(&raw)).expect("parse filters");
        assert_eq!(parsed.department_id, Some(3));
        assert_eq!(parsed.course_id, Some(9));
        assert_eq!(parsed.academic_year, None);
        assert_eq!(parsed.employment_type, None);
        assert_eq!(parsed.search, None);
    }

    #[test]
    fn parse_filters_rejects_non_numeric_ids() {
        let raw = json!({ "department_id": "abc" });
        let e = parse_filters(Some(&raw)).expect_err("bad id");
        assert_eq!(e.code(), "bad_params");

        let e = parse_filters(Some(&json!([1, 2]))).expect_err("not an object");
        assert_eq!(e.code(), "bad_params");
    }

    #[test]
    fn shared_id_parser_reads_numbers_and_numeric_strings() {
        assert_eq!(parse_optional_id(Some(&json!(4)), "courseId"), Ok(Some(4)));
        assert_eq!(parse_optional_id(Some(&json!(" 12 ")), "courseId"), Ok(Some(12)));
        assert_eq!(parse_optional_id(Some(&json!("")), "courseId"), Ok(None));
        assert_eq!(parse_optional_id(None, "courseId"), Ok(None));
        assert_eq!(
            parse_optional_id(Some(&json!(true)), "courseId"),
            Err("courseId must be an integer".to_string())
        );
    }

    #[test]
    fn filter_echo_omits_unset_predicates() {
        let filters = FilterCriteria {
            department_id: Some(1),
            ..Default::default()
        };
        assert_eq!(json!(filters), json!({ "department_id": 1 }));
    }
}
