use std::error::Error;

use serde_json::{Map, Value, json};

use batchdag::app::AppDefinition;
use batchdag::config::model::{BuildDoc, DependEntry};
use batchdag::render::{plan_owner, render_app};

type TestResult = Result<(), Box<dyn Error>>;

fn app(name: &str, yaml: &str) -> AppDefinition {
    let mut def: AppDefinition = serde_yaml::from_str(yaml).expect("valid app definition");
    def.name = name.to_string();
    def
}

fn entry(yaml: &str) -> DependEntry {
    serde_yaml::from_str(yaml).expect("valid dependency entry")
}

fn build(yaml: &str) -> BuildDoc {
    serde_yaml::from_str(yaml).expect("valid build document")
}

fn block(value: Value) -> Map<String, Value> {
    value.as_object().expect("object").clone()
}

const NO_SAMPLES: &str = "CommonParameters:\n  ContractID: P1\n  project_description: test\n";

#[test]
fn sample_bound_template_renders_once_per_sample() -> TestResult {
    let def = app(
        "align",
        "parameters:\n  threads: {type: number, prefix: \"-t\", separator: \" \", default: 4}\ncmd_template: \"bwa {{ fastq }} {{ threads }}\"\n",
    );
    let entry = entry("sh_file: \"shell/{{ sample_name }}.align.sh\"\ndepends: []\n");
    let build = build(
        "CommonParameters:\n  ContractID: P1\n  project_description: test\nSamples:\n  - {sample_name: S1, fastq: /fq/s1.fq}\n  - {sample_name: S2, fastq: /fq/s2.fq}\n",
    );

    let renderings = render_app(&def, &entry, &build, &block(json!({})))?;
    assert_eq!(renderings.len(), 2);

    let first = &renderings[0];
    assert_eq!(first.name, "S1.align");
    assert_eq!(first.sample.as_deref(), Some("S1"));
    assert_eq!(first.script.to_str(), Some("shell/S1.align.sh"));
    assert_eq!(first.content, "bwa /fq/s1.fq -t 4");

    assert_eq!(renderings[1].content, "bwa /fq/s2.fq -t 4");
    Ok(())
}

#[test]
fn list_valued_parameters_expand_as_cross_product() -> TestResult {
    let def = app(
        "asm",
        "parameters:\n  kmer: {type: number, prefix: \"-k\", separator: \" \"}\n  mode: {type: string, prefix: \"-m\", separator: \" \"}\ncmd_template: \"tool {{ kmer }} {{ mode }}\"\n",
    );
    let entry = entry("sh_file: shell/asm.sh\ndepends: []\n");
    let build = build(NO_SAMPLES);

    let renderings =
        render_app(&def, &entry, &build, &block(json!({"kmer": [21, 31], "mode": ["fast", "slow"]})))?;
    assert_eq!(renderings.len(), 4);

    let names: Vec<&str> = renderings.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"asm.kmer.21-mode.fast"), "got: {names:?}");
    assert!(names.contains(&"asm.kmer.31-mode.slow"), "got: {names:?}");

    let point = renderings
        .iter()
        .find(|r| r.name == "asm.kmer.21-mode.fast")
        .expect("rendering for the first point");
    assert_eq!(point.content, "tool -k 21 -m fast");
    assert_eq!(point.script.to_str(), Some("shell/asm.kmer.21-mode.fast.sh"));
    Ok(())
}

#[test]
fn plan_values_escape_path_separators_in_names() -> TestResult {
    let def = app(
        "count",
        "parameters:\n  db: {type: string, prefix: \"-d\", separator: \" \"}\ncmd_template: \"count {{ db }}\"\n",
    );
    let entry = entry("sh_file: shell/count.sh\ndepends: []\n");
    let build = build(NO_SAMPLES);

    let renderings =
        render_app(&def, &entry, &build, &block(json!({"db": ["ref/a", "ref/b"]})))?;
    let names: Vec<&str> = renderings.iter().map(|r| r.name.as_str()).collect();
    assert!(names.contains(&"count.db.ref_a"), "got: {names:?}");
    Ok(())
}

#[test]
fn array_typed_parameters_are_not_plan_axes() -> TestResult {
    let def = app(
        "filter",
        "parameters:\n  taxid: {type: array, prefix: \"-taxid\", separator: \"=\", item: {separator: \",\"}}\ncmd_template: \"filter {{ taxid }}\"\n",
    );
    let entry = entry("sh_file: shell/filter.sh\ndepends: []\n");
    let build = build(NO_SAMPLES);

    let renderings = render_app(&def, &entry, &build, &block(json!({"taxid": [4, 5, 6]})))?;
    assert_eq!(renderings.len(), 1);
    assert_eq!(renderings[0].content, "filter -taxid=4,5,6");
    Ok(())
}

#[test]
fn two_plan_owning_apps_in_one_module_is_ambiguous() {
    let asm = app(
        "asm",
        "parameters:\n  kmer: {type: number, prefix: \"-k\", separator: \" \"}\ncmd_template: \"a {{ kmer }}\"\n",
    );
    let count = app(
        "count",
        "parameters:\n  bin: {type: number, prefix: \"-b\", separator: \" \"}\ncmd_template: \"c {{ bin }}\"\n",
    );

    let apps = vec![
        ("asm".to_string(), block(json!({"kmer": [21, 31]}))),
        ("count".to_string(), block(json!({"bin": [10, 20]}))),
    ];
    let err = plan_owner(&apps, |name| match name {
        "asm" => Some(asm.clone()),
        "count" => Some(count.clone()),
        _ => None,
    })
    .expect_err("must fail")
    .to_string();

    assert!(err.contains("ambiguous plan"), "got: {err}");
    assert!(err.contains("asm") && err.contains("count"), "got: {err}");
}
