//! Ready-made linkage jobs between a space-exploration dataset (`space`) and
//! DBpedia (`dbpedia`).
//!
//! The caller registers stores under those two names and passes the job to
//! [`run_matcher`](crate::matcher::run_matcher).

use crate::comparator::{ComparatorSpec, ContainsString, ExactString, Jaro};
use crate::dataset::DatasetDefinition;
use crate::error::LinkResult;
use crate::matcher::LinkJob;

/// Store reference of the space-exploration dataset.
pub const SPACE_STORE: &str = "space";
/// Store reference of DBpedia.
pub const DBPEDIA_STORE: &str = "dbpedia";

const FOAF_NAME: &str = "http://xmlns.com/foaf/0.1/name";
const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
const DC_TITLE: &str = "http://purl.org/dc/elements/1.1/title";
const SPACE_COUNTRY: &str = "http://purl.org/net/schemas/space/country";

const JARO_THRESHOLD: f64 = 0.9;

fn datasets(space_class: &str, dbpedia_class: &str) -> LinkResult<(DatasetDefinition, DatasetDefinition)> {
    let left = DatasetDefinition::new(SPACE_STORE, format!("?resource a <{space_class}>"))?;
    let right = DatasetDefinition::new(DBPEDIA_STORE, format!("?resource a <{dbpedia_class}>"))?;
    Ok((left, right))
}

/// Exact and Jaro comparisons of `field` against both `foaf:name` (10, 1)
/// and `rdfs:label` (5, 1).
fn name_and_label_specs(field: &str) -> LinkResult<Vec<ComparatorSpec>> {
    let jaro = Jaro::new(JARO_THRESHOLD)?;
    Ok(vec![
        ComparatorSpec::new(ExactString, field, FOAF_NAME, 10.0),
        ComparatorSpec::new(jaro, field, FOAF_NAME, 1.0),
        ComparatorSpec::new(ExactString, field, RDFS_LABEL, 5.0),
        ComparatorSpec::new(jaro, field, RDFS_LABEL, 1.0),
    ])
}

/// Astronauts (`foaf:Person`) against DBpedia astronauts.
///
/// # Errors
/// Never in practice; the definitions are constant.
pub fn astronauts() -> LinkResult<LinkJob> {
    let (left, right) = datasets(
        "http://xmlns.com/foaf/0.1/Person",
        "http://dbpedia.org/ontology/Astronaut",
    )?;
    let jaro = Jaro::new(JARO_THRESHOLD)?;

    Ok(LinkJob::new(
        left,
        right,
        vec![
            ComparatorSpec::new(ExactString, FOAF_NAME, FOAF_NAME, 10.0),
            ComparatorSpec::new(ContainsString, FOAF_NAME, FOAF_NAME, 2.0),
            ComparatorSpec::new(jaro, FOAF_NAME, FOAF_NAME, 1.0),
            ComparatorSpec::new(ExactString, FOAF_NAME, RDFS_LABEL, 5.0),
            ComparatorSpec::new(jaro, FOAF_NAME, RDFS_LABEL, 1.0),
        ],
    ))
}

/// Missions (by `dc:title`) against DBpedia space missions.
///
/// # Errors
/// Never in practice; the definitions are constant.
pub fn missions() -> LinkResult<LinkJob> {
    let (left, right) = datasets(
        "http://purl.org/net/schemas/space/Mission",
        "http://dbpedia.org/ontology/SpaceMission",
    )?;
    Ok(LinkJob::new(left, right, name_and_label_specs(DC_TITLE)?))
}

/// Launch sites (by country) against DBpedia countries.
///
/// # Errors
/// Never in practice; the definitions are constant.
pub fn launch_sites() -> LinkResult<LinkJob> {
    let (left, right) = datasets(
        "http://purl.org/net/schemas/space/LaunchSite",
        "http://dbpedia.org/ontology/Country",
    )?;
    Ok(LinkJob::new(left, right, name_and_label_specs(SPACE_COUNTRY)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{Matcher, DEFAULT_MATCH_PREDICATE};

    #[test]
    fn test_presets_build_valid_matchers() {
        for job in [astronauts(), missions(), launch_sites()] {
            let job = job.unwrap();
            assert_eq!(job.match_predicate, DEFAULT_MATCH_PREDICATE);
            assert_eq!(job.left.store_ref(), SPACE_STORE);
            assert_eq!(job.right.store_ref(), DBPEDIA_STORE);
            assert!(Matcher::new(&job.left, &job.right, job.comparators.clone()).is_ok());
        }
    }

    #[test]
    fn test_astronaut_weights() {
        let job = astronauts().unwrap();
        let weights: Vec<f64> = job.comparators.iter().map(|s| s.weight).collect();
        assert_eq!(weights, [10.0, 2.0, 1.0, 5.0, 1.0]);

        let names: Vec<&str> = job.comparators.iter().map(|s| s.comparator.name()).collect();
        assert_eq!(names, ["exact", "contains", "jaro", "exact", "jaro"]);
    }

    #[test]
    fn test_launch_site_predicates() {
        let job = launch_sites().unwrap();
        let matcher = Matcher::new(&job.left, &job.right, job.comparators).unwrap();
        assert_eq!(
            matcher.left().predicates().iter().collect::<Vec<_>>(),
            [SPACE_COUNTRY]
        );
        assert_eq!(matcher.right().predicates().len(), 2);
        assert!(job.right.selection_pattern().contains("Country"));
    }
}
