use crate::stats::{self, Dimension, FilterCriteria, GroupCount, Metric, PersonRecord};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Groups for one dimension, serialized as `[{ "<key>": label, "count": n }]`
/// where the key comes from [`Dimension::wire_key`].
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedGroups {
    pub dimension: Dimension,
    pub groups: Vec<GroupCount>,
}

impl KeyedGroups {
    fn build(records: &[&PersonRecord], dimension: Dimension, catalog: Option<&[String]>) -> Self {
        let groups = match catalog {
            Some(labels) => stats::group_counts_with_catalog(records, dimension, labels),
            None => stats::group_counts(records, dimension),
        };
        KeyedGroups { dimension, groups }
    }

    #[cfg(test)]
    fn counted(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }
}

struct KeyedGroup<'a> {
    key: &'static str,
    group: &'a GroupCount,
}

impl Serialize for KeyedGroup<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.key, &self.group.label)?;
        map.serialize_entry("count", &self.group.count)?;
        map.end()
    }
}

impl Serialize for KeyedGroups {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let key = self.dimension.wire_key();
        let mut seq = serializer.serialize_seq(Some(self.groups.len()))?;
        for group in &self.groups {
            seq.serialize_element(&KeyedGroup { key, group })?;
        }
        seq.end()
    }
}

/// Catalog labels used to seed zero-count groups on the dashboard.
#[derive(Debug, Clone, Default)]
pub struct CatalogLabels {
    pub departments: Vec<String>,
    pub courses: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStatistics {
    pub total: usize,
    pub by_course: KeyedGroups,
    pub by_department: KeyedGroups,
    pub by_academic_year: KeyedGroups,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacultyStatistics {
    pub total: usize,
    pub by_department: KeyedGroups,
    pub by_employment_type: KeyedGroups,
    pub by_position: KeyedGroups,
    pub average_salary: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report<T> {
    pub records: Vec<PersonRecord>,
    pub statistics: T,
    pub filters: FilterCriteria,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardModel {
    pub students: StudentStatistics,
    pub faculty: FacultyStatistics,
}

pub fn student_statistics(
    filtered: &[&PersonRecord],
    catalog: Option<&CatalogLabels>,
) -> StudentStatistics {
    StudentStatistics {
        total: filtered.len(),
        by_course: KeyedGroups::build(
            filtered,
            Dimension::Course,
            catalog.map(|c| c.courses.as_slice()),
        ),
        by_department: KeyedGroups::build(
            filtered,
            Dimension::Department,
            catalog.map(|c| c.departments.as_slice()),
        ),
        by_academic_year: KeyedGroups::build(filtered, Dimension::AcademicYear, None),
    }
}

pub fn faculty_statistics(
    filtered: &[&PersonRecord],
    catalog: Option<&CatalogLabels>,
) -> FacultyStatistics {
    FacultyStatistics {
        total: filtered.len(),
        by_department: KeyedGroups::build(
            filtered,
            Dimension::Department,
            catalog.map(|c| c.departments.as_slice()),
        ),
        by_employment_type: KeyedGroups::build(filtered, Dimension::EmploymentType, None),
        by_position: KeyedGroups::build(filtered, Dimension::Position, None),
        average_salary: stats::mean_positive(filtered, Metric::Salary),
    }
}

fn preview_rows(records: &[PersonRecord], filters: &FilterCriteria, limit: usize) -> Vec<PersonRecord> {
    stats::preview(records, filters, limit)
        .into_iter()
        .cloned()
        .collect()
}

pub fn student_report(
    records: &[PersonRecord],
    filters: &FilterCriteria,
    limit: usize,
) -> Report<StudentStatistics> {
    let filtered = stats::apply_filters(records, filters);
    Report {
        records: preview_rows(records, filters, limit),
        statistics: student_statistics(&filtered, None),
        filters: filters.clone(),
    }
}

pub fn faculty_report(
    records: &[PersonRecord],
    filters: &FilterCriteria,
    limit: usize,
) -> Report<FacultyStatistics> {
    let filtered = stats::apply_filters(records, filters);
    Report {
        records: preview_rows(records, filters, limit),
        statistics: faculty_statistics(&filtered, None),
        filters: filters.clone(),
    }
}

pub fn dashboard(
    students: &[PersonRecord],
    faculty: &[PersonRecord],
    catalog: &CatalogLabels,
) -> DashboardModel {
    let all_students: Vec<&PersonRecord> = students.iter().collect();
    let all_faculty: Vec<&PersonRecord> = faculty.iter().collect();
    DashboardModel {
        students: student_statistics(&all_students, Some(catalog)),
        faculty: faculty_statistics(&all_faculty, Some(catalog)),
    }
}
