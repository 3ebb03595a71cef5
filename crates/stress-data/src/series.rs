//! Series key expansion.
//!
//! A template `measurement` + `host=server,region=us` expands into keys of
//! the form `measurement,host=server-<a>,region=us-<b>`. The requested count
//! is prime factorised and each prime power is assigned, smallest first and
//! round-robin, to a tag slot. Item `i` uses `i mod bucket` for every slot, so
//! the buckets are pairwise coprime and every key below the count is distinct.

use std::collections::BTreeMap;

use crate::error::DataError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesTemplate {
    measurement: String,
    tags: Vec<(String, String)>,
}

impl SeriesTemplate {
    pub fn new(measurement: &str, tags: &str) -> Result<Self, DataError> {
        let measurement = measurement.trim();
        if measurement.is_empty() {
            return Err(DataError::EmptyMeasurement);
        }
        Ok(Self {
            measurement: measurement.to_string(),
            tags: parse_tags(tags)?,
        })
    }

    /// Parse a full template such as `cpu,host=server` where the first
    /// comma separated part is the measurement.
    pub fn parse(template: &str) -> Result<Self, DataError> {
        match template.split_once(',') {
            Some((measurement, tags)) if !measurement.contains('=') => Self::new(measurement, tags),
            _ => Err(DataError::InvalidSeriesTemplate(template.to_string())),
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// Per-tag cardinalities whose product is `count`.
    pub fn cardinalities(&self, count: usize) -> Vec<usize> {
        let mut buckets = vec![1usize; self.tags.len()];
        for (i, (prime, power)) in prime_factorization(count).into_iter().enumerate() {
            buckets[i % self.tags.len()] *= prime.pow(power);
        }
        buckets
    }

    /// Expand the template into `count` distinct series keys.
    pub fn keys(&self, count: usize) -> Vec<Vec<u8>> {
        let buckets = self.cardinalities(count);
        (0..count)
            .map(|i| {
                let mut key = self.measurement.clone();
                for ((tag, value), bucket) in self.tags.iter().zip(&buckets) {
                    key.push(',');
                    key.push_str(tag);
                    key.push('=');
                    key.push_str(value);
                    key.push('-');
                    key.push_str(&(i % bucket).to_string());
                }
                key.into_bytes()
            })
            .collect()
    }
}

/// Parse `k1=v1,k2=v2` into ordered pairs.
pub fn parse_tags(template: &str) -> Result<Vec<(String, String)>, DataError> {
    let invalid = || DataError::InvalidSeriesTemplate(template.to_string());
    if template.trim().is_empty() {
        return Err(invalid());
    }
    template
        .split(',')
        .map(|part| {
            let (key, value) = part.split_once('=').ok_or_else(invalid)?;
            let key = key.trim();
            if key.is_empty() {
                return Err(invalid());
            }
            Ok((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Prime factors of `n` with their multiplicity, ascending.
pub fn prime_factorization(mut n: usize) -> BTreeMap<usize, u32> {
    let mut factors = BTreeMap::new();
    let mut p = 2;
    while n > 1 {
        if p * p > n {
            *factors.entry(n).or_insert(0) += 1;
            break;
        }
        if n % p == 0 {
            n /= p;
            *factors.entry(p).or_insert(0) += 1;
        } else {
            p += 1;
        }
    }
    factors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_prime_factorization() {
        let f = prime_factorization(360);
        assert_eq!(f.into_iter().collect::<Vec<_>>(), vec![(2, 3), (3, 2), (5, 1)]);
        assert!(prime_factorization(1).is_empty());
        assert!(prime_factorization(0).is_empty());
        assert_eq!(prime_factorization(97).into_iter().collect::<Vec<_>>(), vec![(97, 1)]);
    }

    #[test]
    fn test_cardinalities_spread_across_tags() {
        let tmpl = SeriesTemplate::new("cpu", "host=server,region=us").unwrap();
        assert_eq!(tmpl.cardinalities(100_000), vec![32, 3125]);
        assert_eq!(tmpl.cardinalities(360), vec![8 * 5, 9]);
        assert_eq!(tmpl.cardinalities(1), vec![1, 1]);
    }

    #[test]
    fn test_keys_are_distinct() {
        let tmpl = SeriesTemplate::new("cpu", "host=server,region=us,rack=r").unwrap();
        let keys = tmpl.keys(210);
        assert_eq!(keys.len(), 210);
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), 210);
        assert_eq!(keys[0], b"cpu,host=server-0,region=us-0,rack=r-0".to_vec());
    }

    #[test]
    fn test_zero_count_yields_no_keys() {
        let tmpl = SeriesTemplate::new("cpu", "host=server").unwrap();
        assert!(tmpl.keys(0).is_empty());
    }

    #[test]
    fn test_parse_full_template() {
        let tmpl = SeriesTemplate::parse("ctr,some=tag").unwrap();
        assert_eq!(tmpl.measurement(), "ctr");
        assert_eq!(tmpl.tags(), &[("some".to_string(), "tag".to_string())]);
        assert!(SeriesTemplate::parse("ctr").is_err());
        assert!(SeriesTemplate::parse("some=tag").is_err());
        assert!(SeriesTemplate::new("", "a=b").is_err());
        assert!(SeriesTemplate::new("cpu", "nope").is_err());
    }
}
