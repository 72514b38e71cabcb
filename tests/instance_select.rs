use std::error::Error;

use batchdag::instance::{Instance, InstanceCatalog, mem_to_gib};

type TestResult = Result<(), Box<dyn Error>>;

fn catalog() -> InstanceCatalog {
    let rows = [
        ("small", 2, "4G", 0.2),
        ("medium", 4, "8G", 0.5),
        ("large", 4, "16G", 0.9),
    ];
    InstanceCatalog::new(
        rows.iter()
            .map(|(name, cpu, mem, price)| Instance {
                name: name.to_string(),
                cpu: *cpu,
                mem: mem.to_string(),
                disk_type: None,
                disk_size: None,
                price: *price,
            })
            .collect(),
    )
}

#[test]
fn picks_cheapest_satisfying_row() -> TestResult {
    let cat = catalog();
    let selected = cat.select(4, "8G", None)?;
    assert_eq!(selected.name, "medium");
    assert_eq!(selected.price, 0.5);
    Ok(())
}

#[test]
fn unsatisfiable_request_is_fatal() {
    let err = catalog().select(8, "8G", None).expect_err("must fail").to_string();
    assert!(err.contains("no proper instance found"), "got: {err}");
}

#[test]
fn explicit_name_bypasses_cost_search() -> TestResult {
    let cat = catalog();
    let selected = cat.select(1, "1G", Some("large"))?;
    assert_eq!(selected.name, "large");
    Ok(())
}

#[test]
fn unknown_explicit_name_is_fatal() {
    let err = catalog().select(1, "1G", Some("huge")).expect_err("must fail").to_string();
    assert!(err.contains("no proper instance found"), "got: {err}");
    assert!(err.contains("huge"), "got: {err}");
}

#[test]
fn memory_sizes_normalise_to_gib() -> TestResult {
    assert_eq!(mem_to_gib("512M")?, 0.5);
    assert_eq!(mem_to_gib("8G")?, 8.0);
    assert_eq!(mem_to_gib("2")?, 2.0);
    assert!(mem_to_gib("lots").is_err());
    Ok(())
}

#[test]
fn megabyte_rows_compare_against_gigabyte_requests() -> TestResult {
    let catalog = InstanceCatalog::new(vec![Instance {
        name: "tiny".to_string(),
        cpu: 2,
        mem: "2048M".to_string(),
        disk_type: None,
        disk_size: None,
        price: 0.1,
    }]);
    assert_eq!(catalog.select(1, "2G", None)?.name, "tiny");
    Ok(())
}
