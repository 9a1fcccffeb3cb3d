use omop_mapper::batch::run_batch;
use omop_mapper::config::{Backend, MapperConfig};
use omop_mapper::mapping::build_mapper;
use omop_mapper::mock_map_clinical_term;
use std::fs;

#[test]
fn test_mock() {
    let term = "Blood Pressure";
    let result = mock_map_clinical_term(term);
    assert_eq!(result.concept_id, "12345");
    assert!(result.reason.contains("Blood Pressure"));
}

#[tokio::test]
async fn test_batch_with_configured_mock_backend() {
    let config = MapperConfig::from_lookup(|key| match key {
        "OMOP_MAPPER_BACKEND" => Some("mock".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.backend, Backend::Mock);
    let mapper = build_mapper(&config).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input_terms.csv");
    let output = dir.path().join("output_mappings.csv");
    fs::write(&input, "term\nBlood Pressure\nType 2 diabetes mellitus\nBody temperature\n").unwrap();

    let summary = run_batch(mapper.as_ref(), &input, &output).await.unwrap();
    assert_eq!(summary.terms, 3);

    let mut rdr = csv::Reader::from_path(&output).unwrap();
    let headers: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(headers, vec!["CONCEPT_ID", "CODE", "NAME", "REASON"]);

    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].get(0), Some("12345"));
    assert!(rows[1].get(3).unwrap().contains("Type 2 diabetes mellitus"));
}
