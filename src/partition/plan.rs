//! Maps a matrix job coordinate to its slice of the search space
//!
//! The active dimensions are the shortest prefix of the plan whose cells
//! outnumber the jobs. Cells are numbered by mixed radix with the first
//! dimension varying fastest, and job `i` owns every cell `c` with
//! `c % job_count == i`, so any job count yields a disjoint cover.

use crate::config::{DimensionConfig, PartitionConfig};
use crate::partition::bucket::Dimension;
use crate::partition::{defaults, QueryDescriptor};
use crate::{PartitionError, PartitionResult};
use tracing::{debug, warn};

/// Platform ceiling on results returned for one query and sort order
pub const MAX_RESULTS_PER_QUERY: u32 = 1000;

/// Configurable partition plan, the QueryPartitioner of the crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    base_qualifiers: Vec<String>,
    sort: String,
    alternate_sort: String,
    fallbacks: bool,
    single_job_bands: Dimension,
    dimensions: Vec<Dimension>,
}

impl PartitionPlan {
    /// Built-in plan: stars, language, created, license, topic, size
    pub fn builtin() -> PartitionResult<Self> {
        Ok(Self {
            base_qualifiers: vec!["is:public".to_string()],
            sort: "updated".to_string(),
            alternate_sort: "stars".to_string(),
            fallbacks: true,
            single_job_bands: Dimension::int_ranges(
                "stars",
                "stars",
                defaults::SINGLE_JOB_STAR_CUT_POINTS,
            )?,
            dimensions: vec![
                Dimension::int_ranges("stars", "stars", defaults::STAR_CUT_POINTS)?,
                Dimension::terms("language", "language", defaults::LANGUAGES)?,
                Dimension::date_ranges_from_strings(
                    "created",
                    "created",
                    defaults::CREATED_CUT_POINTS,
                )?,
                Dimension::terms("license", "license", defaults::LICENSES)?,
                Dimension::terms("topic", "topic", defaults::TOPICS)?,
                Dimension::int_ranges("size", "size", defaults::SIZE_CUT_POINTS)?,
            ],
        })
    }

    /// Builds a plan from the `[partition]` config section
    pub fn from_config(config: &PartitionConfig) -> PartitionResult<Self> {
        let dimensions = config
            .dimensions
            .iter()
            .map(|dim| match dim {
                DimensionConfig::Terms {
                    name,
                    qualifier,
                    values,
                } => Dimension::terms(name, qualifier, values),
                DimensionConfig::IntRange {
                    name,
                    qualifier,
                    cut_points,
                } => Dimension::int_ranges(name, qualifier, cut_points),
                DimensionConfig::DateRange {
                    name,
                    qualifier,
                    cut_points,
                } => Dimension::date_ranges_from_strings(name, qualifier, cut_points),
            })
            .collect::<PartitionResult<Vec<_>>>()?;

        let single_job_cut_points = config
            .single_job_star_cut_points
            .as_deref()
            .unwrap_or(defaults::SINGLE_JOB_STAR_CUT_POINTS);

        Ok(Self {
            base_qualifiers: config.base_qualifiers.clone(),
            sort: config.sort.clone(),
            alternate_sort: config.alternate_sort.clone(),
            fallbacks: config.fallbacks,
            single_job_bands: Dimension::int_ranges("stars", "stars", single_job_cut_points)?,
            dimensions,
        })
    }

    /// Uses the config section when present, the built-in plan otherwise
    pub fn resolve(config: Option<&PartitionConfig>) -> PartitionResult<Self> {
        match config {
            Some(config) => Self::from_config(config),
            None => Self::builtin(),
        }
    }

    /// Disables or enables fallback queries
    pub fn with_fallbacks(mut self, fallbacks: bool) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Shortest dimension prefix with at least `job_count` cells
    ///
    /// Returns every dimension when even the full product is too small.
    pub fn active_dimensions(&self, job_count: u64) -> &[Dimension] {
        let mut product: u64 = 1;
        for (i, dim) in self.dimensions.iter().enumerate() {
            if product >= job_count {
                return &self.dimensions[..i];
            }
            product = product.saturating_mul(dim.cardinality() as u64);
        }
        &self.dimensions
    }

    /// Generates the ordered queries for one job
    ///
    /// # Arguments
    ///
    /// * `job_index` - 0-based matrix index
    /// * `job_count` - Number of matrix jobs (at least 1)
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<QueryDescriptor>)` - Primary queries, then fallbacks
    /// * `Err(PartitionError)` - Invalid job coordinate or plan
    pub fn generate(&self, job_index: u64, job_count: u64) -> PartitionResult<Vec<QueryDescriptor>> {
        if job_count == 0 || job_index >= job_count {
            return Err(PartitionError::InvalidJob {
                index: job_index,
                count: job_count,
            });
        }

        if job_count == 1 {
            return self.single_job_queries();
        }

        let active = self.active_dimensions(job_count);
        let cells = cell_count(active);

        let owned: Vec<u64> = if job_index < cells {
            let mut owned = Vec::new();
            let mut cell = Some(job_index);
            while let Some(c) = cell.filter(|&c| c < cells) {
                owned.push(c);
                cell = c.checked_add(job_count);
            }
            owned
        } else {
            warn!(
                job_index,
                job_count, cells, "More jobs than partition cells; this job overlaps another"
            );
            vec![job_index % cells]
        };

        let mut queries = Vec::with_capacity(owned.len() + 2);
        for &cell in &owned {
            let terms = decode_cell(active, cell);
            queries.push(QueryDescriptor::new(
                self.render(&terms, &self.sort),
                format!(
                    "job {}/{} cell {}: {}",
                    job_index,
                    job_count,
                    cell,
                    terms.join(", ")
                ),
                None,
            )?);
        }

        if self.fallbacks {
            let first = decode_cell(active, owned[0]);
            queries.extend(self.fallback_queries(job_index, &first)?);
        }

        debug!(
            job_index,
            job_count,
            active = active.len(),
            queries = queries.len(),
            "Generated partition queries"
        );
        Ok(queries)
    }

    fn single_job_queries(&self) -> PartitionResult<Vec<QueryDescriptor>> {
        (0..self.single_job_bands.cardinality())
            .filter_map(|i| self.single_job_bands.term(i).map(|term| (i, term)))
            .map(|(i, term)| {
                let sort = if i % 2 == 0 {
                    &self.sort
                } else {
                    &self.alternate_sort
                };
                QueryDescriptor::new(
                    self.render(std::slice::from_ref(&term), sort),
                    format!("band {}: {}", i, term),
                    Some(MAX_RESULTS_PER_QUERY),
                )
            })
            .collect()
    }

    /// Relaxed variants of the first cell: alternate sort, then one term dropped
    fn fallback_queries(
        &self,
        job_index: u64,
        terms: &[String],
    ) -> PartitionResult<Vec<QueryDescriptor>> {
        let mut fallbacks = Vec::with_capacity(2);

        if self.alternate_sort != self.sort {
            fallbacks.push(QueryDescriptor::new(
                self.render(terms, &self.alternate_sort),
                format!("job {} fallback: sort:{}", job_index, self.alternate_sort),
                None,
            )?);
        }

        if terms.len() >= 2 {
            let relaxed = &terms[..terms.len() - 1];
            fallbacks.push(QueryDescriptor::new(
                self.render(relaxed, &self.sort),
                format!("job {} fallback: {}", job_index, relaxed.join(", ")),
                None,
            )?);
        }

        Ok(fallbacks)
    }

    fn render(&self, terms: &[String], sort: &str) -> String {
        let sort = format!("sort:{}", sort);
        self.base_qualifiers
            .iter()
            .map(String::as_str)
            .chain(terms.iter().map(String::as_str))
            .chain(std::iter::once(sort.as_str()))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn cell_count(active: &[Dimension]) -> u64 {
    active
        .iter()
        .fold(1u64, |acc, dim| acc.saturating_mul(dim.cardinality() as u64))
}

/// Mixed-radix decode of a cell into one rendered term per dimension
fn decode_cell(active: &[Dimension], cell: u64) -> Vec<String> {
    let mut rest = cell;
    active
        .iter()
        .filter_map(|dim| {
            let radix = dim.cardinality() as u64;
            let index = rest % radix;
            rest /= radix;
            dim.term(index as usize)
        })
        .collect()
}
