use std::error::Error;
use std::path::Path;

use serde_json::json;

use batchdag::app::FileSpec;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn generated_path_uses_first_format_and_fixed_length_id() -> TestResult {
    let mut spec: FileSpec = serde_json::from_value(json!({"formats": ["bam", "sam"]}))?;
    spec.resolve_path(Path::new("/data"));

    let path = spec.path().expect("path generated").to_string();
    let file = Path::new(&path);
    assert_eq!(file.extension().and_then(|e| e.to_str()), Some("bam"));
    assert_eq!(file.file_stem().map(|s| s.len()), Some(32));
    assert!(path.starts_with("/data/"));
    Ok(())
}

#[test]
fn resolving_twice_is_idempotent() -> TestResult {
    let mut spec: FileSpec = serde_json::from_value(json!({"formats": ["vcf"]}))?;
    spec.resolve_path(Path::new("/data"));
    let first = spec.path().map(str::to_string);
    spec.resolve_path(Path::new("/data"));
    assert_eq!(spec.path().map(str::to_string), first);
    Ok(())
}

#[test]
fn explicit_path_is_kept() -> TestResult {
    let mut spec: FileSpec =
        serde_json::from_value(json!({"formats": ["fa"], "path": "/ref/hg38.fa"}))?;
    spec.resolve_path(Path::new("/data"));
    assert_eq!(spec.path(), Some("/ref/hg38.fa"));
    Ok(())
}
