//! Job Registry
//!
//! Central registry of every job. Allows lookup and instantiation by name.

use crate::error::{JobError, Result};
use crate::jobs::{
    ChangeIndicatorJob, ChangeJob, Job, LinearPredictionsJob, LinearR2Job, LinearRegressionJob,
    QuadraticRegressionJob, RangeMembershipJob, SlopeJob, SlopeTrendJob, StandardDeviationJob,
    VolatilityJob,
};
use std::collections::HashMap;

/// Job categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobCategory {
    /// Period-over-period change
    Change,
    /// Band membership flags
    Range,
    /// Standard deviation based
    Dispersion,
    /// Slopes over calendar days
    Trend,
    /// Regressions with forecast rows
    Regression,
}

/// Job metadata
#[derive(Debug, Clone, Copy)]
pub struct JobInfo {
    /// Job name (unique identifier)
    pub name: &'static str,
    /// Job category
    pub category: JobCategory,
    /// Constructor with the default configuration
    pub build: fn() -> Box<dyn Job>,
}

impl JobInfo {
    /// Instantiate the job.
    pub fn job(&self) -> Box<dyn Job> {
        (self.build)()
    }
}

/// Get all registered jobs, in the order they are listed
pub fn available_jobs() -> Vec<JobInfo> {
    vec![
        JobInfo {
            name: "change",
            category: JobCategory::Change,
            build: || Box::new(ChangeJob),
        },
        JobInfo {
            name: "change-indicator",
            category: JobCategory::Change,
            build: || Box::new(ChangeIndicatorJob),
        },
        JobInfo {
            name: "within-range",
            category: JobCategory::Range,
            build: || Box::new(RangeMembershipJob::within_range()),
        },
        JobInfo {
            name: "within-2std-range",
            category: JobCategory::Range,
            build: || Box::new(RangeMembershipJob::within_2std_range()),
        },
        JobInfo {
            name: "volatility",
            category: JobCategory::Dispersion,
            build: || Box::new(VolatilityJob),
        },
        JobInfo {
            name: "standard-deviation",
            category: JobCategory::Dispersion,
            build: || Box::new(StandardDeviationJob),
        },
        JobInfo {
            name: "slope",
            category: JobCategory::Trend,
            build: || Box::new(SlopeJob::default()),
        },
        JobInfo {
            name: "slope-trend",
            category: JobCategory::Trend,
            build: || Box::new(SlopeTrendJob::default()),
        },
        JobInfo {
            name: "linear-regression",
            category: JobCategory::Regression,
            build: || Box::new(LinearRegressionJob::default()),
        },
        JobInfo {
            name: "quadratic-regression",
            category: JobCategory::Regression,
            build: || Box::new(QuadraticRegressionJob::default()),
        },
        JobInfo {
            name: "linear-predictions",
            category: JobCategory::Regression,
            build: || Box::new(LinearPredictionsJob::default()),
        },
        JobInfo {
            name: "linear-r2",
            category: JobCategory::Regression,
            build: || Box::new(LinearR2Job),
        },
    ]
}

/// Get jobs by category
pub fn jobs_by_category(category: JobCategory) -> Vec<JobInfo> {
    available_jobs()
        .into_iter()
        .filter(|j| j.category == category)
        .collect()
}

/// Get job info by name
pub fn get_job_info(name: &str) -> Option<JobInfo> {
    available_jobs().into_iter().find(|j| j.name == name)
}

/// Instantiate a job by name
pub fn job_by_name(name: &str) -> Result<Box<dyn Job>> {
    get_job_info(name)
        .map(|info| info.job())
        .ok_or_else(|| JobError::UnknownJob(name.to_string()))
}

/// Get a map of all jobs indexed by name
pub fn job_map() -> HashMap<&'static str, JobInfo> {
    available_jobs().into_iter().map(|j| (j.name, j)).collect()
}

/// List all job names
pub fn list_job_names() -> Vec<&'static str> {
    available_jobs().into_iter().map(|j| j.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldp_data::Column;

    #[test]
    fn test_available_jobs_count() {
        assert_eq!(available_jobs().len(), 12);
        assert_eq!(job_map().len(), 12);
    }

    #[test]
    fn test_registered_name_matches_job() {
        for info in available_jobs() {
            assert_eq!(info.job().name(), info.name);
        }
    }

    #[test]
    fn test_jobs_by_category() {
        assert_eq!(jobs_by_category(JobCategory::Change).len(), 2);
        assert_eq!(jobs_by_category(JobCategory::Range).len(), 2);
        assert_eq!(jobs_by_category(JobCategory::Dispersion).len(), 2);
        assert_eq!(jobs_by_category(JobCategory::Trend).len(), 2);
        assert_eq!(jobs_by_category(JobCategory::Regression).len(), 4);
    }

    #[test]
    fn test_job_by_name() {
        let job = job_by_name("slope").unwrap();
        assert_eq!(job.columns(), &[Column::Steigung]);

        assert!(matches!(
            job_by_name("nonexistent_job"),
            Err(JobError::UnknownJob(name)) if name == "nonexistent_job"
        ));
    }

    #[test]
    fn test_every_derived_column_has_a_job() {
        let names = list_job_names();
        assert!(names.contains(&"quadratic-regression"));

        for info in ldp_data::schema::derived_columns() {
            assert!(
                available_jobs().iter().any(|j| j.job().columns().contains(&info.column)),
                "No job writes {}",
                info.column
            );
        }
    }
}
