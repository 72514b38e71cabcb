use std::error::Error;
use std::fs;

use serde_json::{Value, json};

use batchdag::config::expand::load_document;

type TestResult = Result<(), Box<dyn Error>>;

fn load_str(yaml: &str) -> Result<Value, anyhow::Error> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("doc.yaml");
    fs::write(&path, yaml).expect("write doc");
    load_document(&path)
}

#[test]
fn range_directive_expands_inclusive() -> TestResult {
    let doc = load_str("counts: !range 1..4\n")?;
    assert_eq!(doc["counts"], json!([1, 2, 3, 4]));
    Ok(())
}

#[test]
fn malformed_range_is_a_parse_error() {
    let err = load_str("counts: !range 1..x\n").expect_err("must fail").to_string();
    assert!(err.contains("malformed range"), "got: {err}");
    assert!(err.contains("1..x"), "error should carry the offending text: {err}");
}

#[test]
fn include_directive_splices_sibling_document() -> TestResult {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("shared.yaml"), "genome: hg38\nthreads: 8\n")?;
    fs::write(dir.path().join("doc.yaml"), "common: !include shared.yaml\n")?;

    let doc = load_document(dir.path().join("doc.yaml"))?;
    assert_eq!(doc["common"]["genome"], json!("hg38"));
    assert_eq!(doc["common"]["threads"], json!(8));
    Ok(())
}

#[test]
fn ref_directive_resolves_against_own_document() -> TestResult {
    let doc = load_str("paths:\n  workdir: /work\nlater: !ref paths.workdir\n")?;
    assert_eq!(doc["later"], json!("/work"));
    Ok(())
}

#[test]
fn ref_to_missing_key_fails_with_path() {
    let err = load_str("a: 1\nb: !ref a.b.c\n").expect_err("must fail").to_string();
    assert!(err.contains("a.b.c"), "got: {err}");
}

#[test]
fn mapping_directive_becomes_local_oss_pair() -> TestResult {
    let doc = load_str("bam: !mapping \"/data/s1.bam:oss://bucket/s1.bam\"\n")?;
    assert_eq!(doc["bam"]["local"], json!("/data/s1.bam"));
    assert_eq!(doc["bam"]["oss"], json!("oss://bucket/s1.bam"));
    Ok(())
}

#[test]
fn plan_directive_elements_form() -> TestResult {
    let doc = load_str("methods: !plan \"deseq;edger;limma\"\n")?;
    assert_eq!(doc["methods"]["elements"], json!(["deseq", "edger", "limma"]));
    Ok(())
}

#[test]
fn plan_directive_contrast_form() -> TestResult {
    let doc = load_str("contrast: !plan \"~tumor|normal@ttest\"\n")?;
    assert_eq!(doc["contrast"]["case"], json!("tumor"));
    assert_eq!(doc["contrast"]["control"], json!("normal"));
    assert_eq!(doc["contrast"]["method"], json!("ttest"));
    Ok(())
}

#[test]
fn plan_directive_rejects_single_element() {
    let err = load_str("methods: !plan \"deseq\"\n").expect_err("must fail").to_string();
    assert!(err.contains("malformed plan"), "got: {err}");
}
