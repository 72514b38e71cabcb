use std::error::Error;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use batchdag::config::load_build_doc;
use batchdag::graph::{self, BuildOptions, GraphStore};
use batchdag::instance::InstanceCatalog;
use batchdag::registry::Registry;

type TestResult = Result<(), Box<dyn Error>>;

const PLAIN_APP: &str = "requirements:\n  container: {type: docker, image: repo/tool}\n  resources: {cpu: 2, mem: 4G}\ninputs:\n  bam: {formats: [bam], required: true}\noutputs:\n  results: {formats: [txt]}\ncmd_template: \"tool {{ bam }} > {{ results }}\"\n";

const SAMPLE_APP: &str = "requirements:\n  container: {type: docker, image: repo/tool}\n  resources: {cpu: 2, mem: 4G}\ncmd_template: \"tool {{ sample_name }}\"\n";

fn write(path: impl AsRef<Path>, content: &str) {
    let path = path.as_ref();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn options(dir: &TempDir, overwrite: bool) -> BuildOptions {
    let workspace = dir.path().join("workspace");
    BuildOptions {
        graph_path: workspace.join("graph.json"),
        digest_path: workspace.join("depends.txt"),
        workspace,
        overwrite,
        dry_run: false,
    }
}

fn compile(dir: &TempDir, build_yaml: &str, overwrite: bool) -> anyhow::Result<graph::BuildReport> {
    let build_path = dir.path().join("build.yaml");
    fs::write(&build_path, build_yaml).unwrap();

    let build = load_build_doc(&build_path)?;
    let registry = Registry::load(&dir.path().join("pipeline"))?;
    let catalog = InstanceCatalog::builtin();
    graph::compile(&registry, &build, &catalog, &options(dir, overwrite))
}

#[test]
fn single_app_without_dependencies_builds_one_task() -> TestResult {
    let dir = TempDir::new()?;
    write(
        dir.path().join("pipeline/modA/depend.yaml"),
        "name: modA\ncaller:\n  sh_file: shell/caller.sh\n  depends: []\n",
    );
    write(dir.path().join("pipeline/modA/caller/app.yaml"), PLAIN_APP);

    let report = compile(
        &dir,
        "CommonParameters: {ContractID: P1, project_description: test}\nSamples:\n  - {sample_name: S1}\nmodA:\n  caller: {}\n",
        true,
    )?;

    assert_eq!(report.tasks, 1);
    assert_eq!(report.edges, 0);

    let store = GraphStore::load(&dir.path().join("workspace/graph.json"))?;
    assert_eq!(store.project.name, "P1");
    assert_eq!(store.tasks.len(), 1);
    assert_eq!(store.tasks[0].cpu, 2);
    assert_eq!(store.tasks[0].mem, "4G");
    assert_eq!(store.tasks[0].instance, "ecs.sn1ne.large");
    assert!(store.edges.is_empty());

    // Script written, digest present and empty.
    assert!(dir.path().join("workspace/shell/caller.sh").is_file());
    let digest = fs::read_to_string(dir.path().join("workspace/depends.txt"))?;
    assert!(digest.is_empty());
    Ok(())
}

#[test]
fn sample_bound_apps_link_sample_by_sample() -> TestResult {
    let dir = TempDir::new()?;
    write(
        dir.path().join("pipeline/modA/depend.yaml"),
        "name: modA\nalign:\n  sh_file: \"shell/{{ sample_name }}.align.sh\"\n  depends: []\ncalmd:\n  sh_file: \"shell/{{ sample_name }}.calmd.sh\"\n  depends: [align]\n",
    );
    write(dir.path().join("pipeline/modA/align/app.yaml"), SAMPLE_APP);
    write(dir.path().join("pipeline/modA/calmd/app.yaml"), SAMPLE_APP);

    let report = compile(
        &dir,
        "CommonParameters: {ContractID: P1, project_description: test}\nSamples:\n  - {sample_name: S1}\n  - {sample_name: S2}\nmodA:\n  align: {}\n  calmd: {}\n",
        true,
    )?;

    assert_eq!(report.tasks, 4);
    assert_eq!(report.edges, 2);

    let store = GraphStore::load(&dir.path().join("workspace/graph.json"))?;
    for (up, down) in &store.edges {
        let up = &store.tasks[*up];
        let down = &store.tasks[*down];
        assert_eq!(up.app_name, "align");
        assert_eq!(down.app_name, "calmd");
        // Never an edge between tasks of different samples.
        assert_eq!(up.sample, down.sample);
    }
    Ok(())
}

#[test]
fn unbound_downstream_cross_links_to_every_upstream_task() -> TestResult {
    let dir = TempDir::new()?;
    write(
        dir.path().join("pipeline/modA/depend.yaml"),
        "name: modA\nalign:\n  sh_file: \"shell/{{ sample_name }}.align.sh\"\n  depends: []\nmerge:\n  sh_file: shell/merge.sh\n  depends: [align]\n",
    );
    write(dir.path().join("pipeline/modA/align/app.yaml"), SAMPLE_APP);
    write(
        dir.path().join("pipeline/modA/merge/app.yaml"),
        "requirements:\n  resources: {cpu: 4, mem: 8G}\ncmd_template: \"merge all\"\n",
    );

    let report = compile(
        &dir,
        "CommonParameters: {ContractID: P1, project_description: test}\nSamples:\n  - {sample_name: S1}\n  - {sample_name: S2}\nmodA:\n  align: {}\n  merge: {}\n",
        true,
    )?;

    assert_eq!(report.tasks, 3);
    assert_eq!(report.edges, 2);

    let store = GraphStore::load(&dir.path().join("workspace/graph.json"))?;
    for (up, down) in &store.edges {
        assert_eq!(store.tasks[*up].app_name, "align");
        assert_eq!(store.tasks[*down].app_name, "merge");
    }

    let digest = fs::read_to_string(dir.path().join("workspace/depends.txt"))?;
    let lines: Vec<&str> = digest.lines().collect();
    assert_eq!(lines.len(), 2);
    for line in lines {
        let (up, down) = line.split_once('\t').expect("tab-separated pair");
        assert!(up.ends_with(":4G"), "got: {up}");
        assert!(down.ends_with(":8G"), "got: {down}");
    }
    Ok(())
}

#[test]
fn upstream_owned_by_two_modules_is_ambiguous() -> TestResult {
    let dir = TempDir::new()?;
    write(
        dir.path().join("pipeline/align/app.yaml"),
        "requirements:\n  resources: {cpu: 2, mem: 4G}\ncmd_template: \"align\"\n",
    );
    write(
        dir.path().join("pipeline/modB/depend.yaml"),
        "name: modB\nalign:\n  sh_file: shell/b.align.sh\n  depends: []\n",
    );
    write(
        dir.path().join("pipeline/modC/depend.yaml"),
        "name: modC\nalign:\n  sh_file: shell/c.align.sh\n  depends: []\n",
    );
    write(
        dir.path().join("pipeline/modD/depend.yaml"),
        "name: modD\nreport:\n  sh_file: shell/report.sh\n  depends: [align]\n",
    );
    write(
        dir.path().join("pipeline/modD/report/app.yaml"),
        "cmd_template: \"report\"\n",
    );

    let err = compile(
        &dir,
        "CommonParameters: {ContractID: P1, project_description: test}\nmodB:\n  align: {}\nmodD:\n  report: {}\n",
        true,
    )
    .expect_err("must fail")
    .to_string();

    assert!(err.contains("multiple modules"), "got: {err}");
    assert!(err.contains("modB") && err.contains("modC"), "got: {err}");
    Ok(())
}

#[test]
fn same_module_declaration_takes_precedence_over_other_modules() -> TestResult {
    let dir = TempDir::new()?;
    write(
        dir.path().join("pipeline/align/app.yaml"),
        "requirements:\n  resources: {cpu: 2, mem: 4G}\ncmd_template: \"align\"\n",
    );
    write(
        dir.path().join("pipeline/modE/depend.yaml"),
        "name: modE\nalign:\n  sh_file: shell/e.align.sh\n  depends: []\nreport:\n  sh_file: shell/report.sh\n  depends: [align]\n",
    );
    write(
        dir.path().join("pipeline/modE/report/app.yaml"),
        "cmd_template: \"report\"\n",
    );
    write(
        dir.path().join("pipeline/modF/depend.yaml"),
        "name: modF\nalign:\n  sh_file: shell/f.align.sh\n  depends: []\n",
    );

    let report = compile(
        &dir,
        "CommonParameters: {ContractID: P1, project_description: test}\nmodE:\n  align: {}\n  report: {}\n",
        true,
    )?;

    assert_eq!(report.edges, 1);
    let store = GraphStore::load(&dir.path().join("workspace/graph.json"))?;
    let (up, down) = store.edges.iter().next().copied().unwrap();
    assert_eq!(store.tasks[up].app_name, "align");
    assert!(store.tasks[up].script.ends_with("shell/e.align.sh"));
    assert_eq!(store.tasks[down].app_name, "report");
    Ok(())
}

#[test]
fn identical_mappings_persist_once() -> TestResult {
    let dir = TempDir::new()?;
    write(
        dir.path().join("pipeline/modA/depend.yaml"),
        "name: modA\ncaller:\n  sh_file: \"shell/{{ sample_name }}.caller.sh\"\n  depends: []\n",
    );
    write(dir.path().join("pipeline/modA/caller/app.yaml"), PLAIN_APP);

    compile(
        &dir,
        "CommonParameters: {ContractID: P1, project_description: test}\nSamples:\n  - {sample_name: S1}\n  - {sample_name: S2}\nmodA:\n  caller:\n    bam: !mapping \"/data/in.bam:oss://bucket/in.bam\"\n",
        true,
    )?;

    let store = GraphStore::load(&dir.path().join("workspace/graph.json"))?;
    assert_eq!(store.tasks.len(), 2);
    assert_eq!(store.mappings.len(), 1);

    let mapping = &store.mappings[0];
    assert_eq!(mapping.name, "bam");
    assert_eq!(mapping.source, "oss://bucket/in.bam");
    assert_eq!(mapping.destination, "/data/in.bam");
    assert!(!mapping.is_write);

    for task in &store.tasks {
        assert_eq!(task.mappings, vec![mapping.id]);
    }
    Ok(())
}

#[test]
fn incremental_build_extends_and_skips_duplicates() -> TestResult {
    let dir = TempDir::new()?;
    write(
        dir.path().join("pipeline/modA/depend.yaml"),
        "name: modA\ncaller:\n  sh_file: shell/caller.sh\n  depends: []\n",
    );
    write(dir.path().join("pipeline/modA/caller/app.yaml"), PLAIN_APP);
    write(
        dir.path().join("pipeline/modB/depend.yaml"),
        "name: modB\nreport:\n  sh_file: shell/report.sh\n  depends: []\n",
    );
    write(
        dir.path().join("pipeline/modB/report/app.yaml"),
        "cmd_template: \"report\"\n",
    );

    let first = "CommonParameters: {ContractID: P1, project_description: test}\nmodA:\n  caller: {}\n";
    compile(&dir, first, true)?;

    // Same module again: the duplicate script is skipped, nothing grows.
    compile(&dir, first, false)?;
    let store = GraphStore::load(&dir.path().join("workspace/graph.json"))?;
    assert_eq!(store.tasks.len(), 1);

    // A new module's entities are added to the existing graph.
    compile(
        &dir,
        "CommonParameters: {ContractID: P1, project_description: test}\nmodB:\n  report: {}\n",
        false,
    )?;
    let store = GraphStore::load(&dir.path().join("workspace/graph.json"))?;
    assert_eq!(store.tasks.len(), 2);
    assert_eq!(store.modules.len(), 2);
    Ok(())
}
